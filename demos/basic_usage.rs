//! Basic usage example for the Anedya client
//!
//! Run with: ANEDYA_API_KEY=<your-key> cargo run --example basic_usage

use std::time::Duration;

use anedya_sdk::resources::nodes::{CreateNodeRequest, ListNodesRequest, Tag};
use anedya_sdk::resources::value_store::{Namespace, SetValueRequest, ValueKey};
use anedya_sdk::{Client, ClientConfig, Context, ErrorKind};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let config = ClientConfig::from_env()?;
    let client = Client::with_config(config)?;
    let ctx = Context::with_timeout(Duration::from_secs(60));

    // Create a node
    info!("Creating node 'demo-sensor'...");
    let mut req = CreateNodeRequest::new("demo-sensor");
    req.node_desc = "Created by the basic usage example".into();
    req.tags.push(Tag::new("env", "demo"));
    let node = client.nodes().create_node(&ctx, req).await?;
    info!("Created node {}", node.node_id);

    // List nodes
    info!("Listing nodes...");
    let page = client
        .nodes()
        .list_nodes(&ctx, ListNodesRequest::default())
        .await?;
    info!("{} of {} nodes", page.current_count, page.total_count);
    for node_id in &page.nodes {
        info!("  - {}", node_id);
    }

    // Store and read back a value scoped to the node
    let namespace = Namespace::node(node.node_id.clone());
    info!("Storing 'mode' in the node namespace...");
    client
        .value_store()
        .set_value(&ctx, SetValueRequest::new(namespace.clone(), "mode", "auto"))
        .await?;

    match client
        .value_store()
        .get_value(&ctx, ValueKey::new(namespace, "mode"))
        .await
    {
        Ok(value) => info!("Retrieved: {:?} ({} bytes)", value.value, value.size),
        Err(e) if e.is(ErrorKind::NotFound) => warn!("Key not found"),
        Err(e) => return Err(e.into()),
    }

    info!("Example completed successfully!");
    Ok(())
}
