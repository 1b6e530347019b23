//! Async client for the Anedya IoT platform REST API
//!
//! Every call follows the same pipeline: the request is validated locally,
//! encoded as JSON, POSTed to `{base_url}/v1/...`, and the response envelope
//! is decoded and classified into a typed result or an [`Error`] carrying an
//! [`ErrorKind`].
//!
//! # Features
//! - Nodes, variables, value store, health, data, aggregations, commands and
//!   access tokens
//! - Validation before any network I/O
//! - Bearer token authentication over HTTP/1.1 or HTTP/2 with rustls
//! - Per-call cancellation and deadlines through [`Context`]
//! - Pluggable [`Transport`] for testing
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use anedya_sdk::{Client, Context};
//! use anedya_sdk::resources::nodes::{CreateNodeRequest, ListNodesRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), anedya_sdk::Error> {
//!     let client = Client::new("https://api.ap-in-1.anedya.io", "your-api-key")?;
//!     let ctx = Context::background();
//!
//!     let node = client
//!         .nodes()
//!         .create_node(&ctx, CreateNodeRequest::new("sensor-1"))
//!         .await?;
//!     println!("Created node {}", node.node_id);
//!
//!     let page = client.nodes().list_nodes(&ctx, ListNodesRequest::default()).await?;
//!     println!("{} of {} nodes", page.current_count, page.total_count);
//!
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod registry;
pub mod resources;
pub mod transport;
pub mod validate;

pub use client::Client;
pub use config::{ClientConfig, Region};
pub use context::Context;
pub use error::{Error, ErrorKind, Result};
pub use executor::{Executor, Operation};
pub use registry::ReasonCodeRegistry;
pub use transport::{BearerAuth, HyperTransport, Transport};
pub use validate::SortOrder;
