//! Node management: `/v1/node/*`

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::executor::{Empty, Executor, Operation};
use crate::resources::is_zero;
use crate::transport::Transport;
use crate::validate::{check_limit, require, require_ids, SortOrder, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

/// Key/value label attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name
    pub key: String,
    /// Tag value
    pub value: String,
}

impl Tag {
    /// Create a tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A node as reported by the platform.
///
/// Plain data: operations on a node go through [`NodeManager`] with the
/// node's id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Node {
    pub node_id: String,
    pub node_name: String,
    pub node_description: String,
    pub node_identifier: String,
    pub binding_status: bool,
    pub node_binding_key: String,
    pub connection_key: String,
    pub created_at: String,
    pub suspended: bool,
    pub modified: String,
    pub tags: Vec<Tag>,
    pub preauth_id: String,
}

/// Register a new node.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateNodeRequest {
    pub node_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub node_desc: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub preauth_id: String,
}

impl CreateNodeRequest {
    /// Request for a node with the given name and nothing else.
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateNodePayload {
    #[serde(rename = "nodeId")]
    node_id: String,
}

impl Operation for CreateNodeRequest {
    const PATH: &'static str = "/v1/node/create";
    const NAME: &'static str = "create node";
    type Payload = CreateNodePayload;
    type Output = Node;

    fn validate(&self) -> Result<()> {
        require(&self.node_name, "node_name")?;
        for tag in &self.tags {
            require(&tag.key, "tag key")?;
        }
        Ok(())
    }

    fn into_output(self, payload: CreateNodePayload) -> Result<Node> {
        Ok(Node {
            node_id: payload.node_id,
            node_name: self.node_name,
            node_description: self.node_desc,
            tags: self.tags,
            preauth_id: self.preauth_id,
            ..Default::default()
        })
    }
}

/// Page through node ids.
#[derive(Debug, Clone, Serialize)]
pub struct ListNodesRequest {
    pub limit: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
}

impl Default for ListNodesRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
            order: None,
        }
    }
}

/// One page of node ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeList {
    pub current_count: u64,
    pub total_count: u64,
    pub offset: u64,
    pub nodes: Vec<String>,
}

impl Operation for ListNodesRequest {
    const PATH: &'static str = "/v1/node/list";
    const NAME: &'static str = "list nodes";
    type Payload = NodeList;
    type Output = NodeList;

    fn validate(&self) -> Result<()> {
        check_limit(self.limit, MAX_PAGE_LIMIT)
    }

    fn into_output(self, payload: NodeList) -> Result<NodeList> {
        Ok(payload)
    }
}

/// Fetch full records for a set of nodes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetNodeDetailsRequest {
    pub nodes: Vec<String>,
}

impl GetNodeDetailsRequest {
    /// Request details for the given node ids.
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NodeDetailsPayload {
    #[serde(default)]
    data: HashMap<String, Node>,
}

impl Operation for GetNodeDetailsRequest {
    const PATH: &'static str = "/v1/node/details";
    const NAME: &'static str = "get node details";
    type Payload = NodeDetailsPayload;
    type Output = HashMap<String, Node>;

    fn validate(&self) -> Result<()> {
        require_ids(&self.nodes, "nodes")
    }

    fn into_output(self, payload: NodeDetailsPayload) -> Result<HashMap<String, Node>> {
        Ok(payload.data)
    }
}

/// One change applied by [`UpdateNodeRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum NodeUpdate {
    /// Rename the node
    #[serde(rename = "node_name")]
    Name { value: String },
    /// Replace the description
    #[serde(rename = "node_desc")]
    Description { value: String },
    /// Add or update a tag
    #[serde(rename = "tag")]
    Tag { tag: Tag },
}

/// Apply one or more updates to a node.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateNodeRequest {
    #[serde(rename = "nodeid")]
    pub node_id: String,
    pub updates: Vec<NodeUpdate>,
}

impl UpdateNodeRequest {
    /// Empty update for `node_id`; add changes with [`push`](Self::push).
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            updates: Vec::new(),
        }
    }

    /// Append an update.
    pub fn push(mut self, update: NodeUpdate) -> Self {
        self.updates.push(update);
        self
    }
}

impl Operation for UpdateNodeRequest {
    const PATH: &'static str = "/v1/node/update";
    const NAME: &'static str = "update node";
    type Payload = Empty;
    type Output = ();

    fn validate(&self) -> Result<()> {
        require(&self.node_id, "nodeid")?;
        if self.updates.is_empty() {
            return Err(Error::input_required("at least one update is required"));
        }
        for update in &self.updates {
            match update {
                NodeUpdate::Name { value } => require(value, "node_name")?,
                NodeUpdate::Description { value } => require(value, "node_desc")?,
                NodeUpdate::Tag { tag } => require(&tag.key, "tag key")?,
            }
        }
        Ok(())
    }

    fn into_output(self, _: Empty) -> Result<()> {
        Ok(())
    }
}

/// Delete a node.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteNodeRequest {
    #[serde(rename = "nodeid")]
    pub node_id: String,
}

impl DeleteNodeRequest {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }
}

impl Operation for DeleteNodeRequest {
    const PATH: &'static str = "/v1/node/delete";
    const NAME: &'static str = "delete node";
    type Payload = Empty;
    type Output = ();

    fn validate(&self) -> Result<()> {
        require(&self.node_id, "nodeid")
    }

    fn into_output(self, _: Empty) -> Result<()> {
        Ok(())
    }
}

/// Fetch the key a device uses to connect as this node.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetConnectionKeyRequest {
    #[serde(rename = "nodeid")]
    pub node_id: String,
}

impl GetConnectionKeyRequest {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectionKeyPayload {
    #[serde(rename = "connectionKey")]
    connection_key: String,
}

impl Operation for GetConnectionKeyRequest {
    const PATH: &'static str = "/v1/node/getConnectionKey";
    const NAME: &'static str = "get connection key";
    type Payload = ConnectionKeyPayload;
    type Output = String;

    fn validate(&self) -> Result<()> {
        require(&self.node_id, "nodeid")
    }

    fn into_output(self, payload: ConnectionKeyPayload) -> Result<String> {
        Ok(payload.connection_key)
    }
}

/// Bind a physical device to a node.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthorizeDeviceRequest {
    #[serde(rename = "nodeid")]
    pub node_id: String,
    #[serde(rename = "deviceid")]
    pub device_id: String,
}

impl AuthorizeDeviceRequest {
    pub fn new(node_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            device_id: device_id.into(),
        }
    }
}

impl Operation for AuthorizeDeviceRequest {
    const PATH: &'static str = "/v1/node/authorize";
    const NAME: &'static str = "authorize device";
    type Payload = Empty;
    type Output = ();

    fn validate(&self) -> Result<()> {
        require(&self.node_id, "nodeid")?;
        require(&self.device_id, "deviceid")
    }

    fn into_output(self, _: Empty) -> Result<()> {
        Ok(())
    }
}

/// Child entry for [`AddChildNodesRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewChildNode {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    pub alias: String,
}

impl NewChildNode {
    pub fn new(node_id: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            alias: alias.into(),
        }
    }
}

/// Attach child nodes to a parent.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChildNodesRequest {
    pub parent_id: String,
    pub child_nodes: Vec<NewChildNode>,
}

impl Operation for AddChildNodesRequest {
    const PATH: &'static str = "/v1/node/child/add";
    const NAME: &'static str = "add child nodes";
    type Payload = Empty;
    type Output = ();

    fn validate(&self) -> Result<()> {
        require(&self.parent_id, "parentId")?;
        if self.child_nodes.is_empty() {
            return Err(Error::input_required("at least one child node is required"));
        }
        for child in &self.child_nodes {
            require(&child.node_id, "child nodeId")?;
            require(&child.alias, "child alias")?;
        }
        Ok(())
    }

    fn into_output(self, _: Empty) -> Result<()> {
        Ok(())
    }
}

/// Detach one child from a parent.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveChildNodeRequest {
    pub parent_id: String,
    pub child_node: String,
}

impl Operation for RemoveChildNodeRequest {
    const PATH: &'static str = "/v1/node/child/remove";
    const NAME: &'static str = "remove child node";
    type Payload = Empty;
    type Output = ();

    fn validate(&self) -> Result<()> {
        require(&self.parent_id, "parentId")?;
        require(&self.child_node, "childNode")
    }

    fn into_output(self, _: Empty) -> Result<()> {
        Ok(())
    }
}

/// Detach every child from a parent.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearChildNodesRequest {
    pub parent_id: String,
}

impl Operation for ClearChildNodesRequest {
    const PATH: &'static str = "/v1/node/child/clear";
    const NAME: &'static str = "clear child nodes";
    type Payload = Empty;
    type Output = ();

    fn validate(&self) -> Result<()> {
        require(&self.parent_id, "parentId")
    }

    fn into_output(self, _: Empty) -> Result<()> {
        Ok(())
    }
}

/// Page through a parent's children.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListChildNodesRequest {
    pub parent_id: String,
    pub limit: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub offset: u32,
}

impl ListChildNodesRequest {
    /// First page of children of `parent_id` with the default page size.
    pub fn new(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// A child relationship
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildNode {
    pub child_id: String,
    pub alias: String,
    pub created_at: i64,
}

/// One page of children
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChildNodeList {
    pub total_count: u64,
    pub count: u64,
    pub next: u64,
    #[serde(rename = "data")]
    pub nodes: Vec<ChildNode>,
}

impl Operation for ListChildNodesRequest {
    const PATH: &'static str = "/v1/node/child/list";
    const NAME: &'static str = "list child nodes";
    type Payload = ChildNodeList;
    type Output = ChildNodeList;

    fn validate(&self) -> Result<()> {
        require(&self.parent_id, "parentId")?;
        check_limit(self.limit, MAX_PAGE_LIMIT)
    }

    fn into_output(self, payload: ChildNodeList) -> Result<ChildNodeList> {
        Ok(payload)
    }
}

/// Node lifecycle, connection keys and parent/child hierarchy.
#[derive(Debug, Clone)]
pub struct NodeManager {
    executor: Executor,
}

impl NodeManager {
    /// Manager over an authenticated transport.
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self::from_executor(Executor::new(transport, base_url))
    }

    pub(crate) fn from_executor(executor: Executor) -> Self {
        Self { executor }
    }

    /// Create a node. The returned record carries the server-assigned id.
    pub async fn create_node(&self, ctx: &Context, req: CreateNodeRequest) -> Result<Node> {
        self.executor.execute(ctx, req).await
    }

    /// List node ids, one page at a time.
    pub async fn list_nodes(&self, ctx: &Context, req: ListNodesRequest) -> Result<NodeList> {
        self.executor.execute(ctx, req).await
    }

    /// Fetch details for each requested node, keyed by node id.
    pub async fn get_node_details(
        &self,
        ctx: &Context,
        req: GetNodeDetailsRequest,
    ) -> Result<HashMap<String, Node>> {
        self.executor.execute(ctx, req).await
    }

    pub async fn update_node(&self, ctx: &Context, req: UpdateNodeRequest) -> Result<()> {
        self.executor.execute(ctx, req).await
    }

    pub async fn delete_node(&self, ctx: &Context, req: DeleteNodeRequest) -> Result<()> {
        self.executor.execute(ctx, req).await
    }

    pub async fn get_connection_key(
        &self,
        ctx: &Context,
        req: GetConnectionKeyRequest,
    ) -> Result<String> {
        self.executor.execute(ctx, req).await
    }

    pub async fn authorize_device(&self, ctx: &Context, req: AuthorizeDeviceRequest) -> Result<()> {
        self.executor.execute(ctx, req).await
    }

    pub async fn add_child_nodes(&self, ctx: &Context, req: AddChildNodesRequest) -> Result<()> {
        self.executor.execute(ctx, req).await
    }

    pub async fn remove_child_node(
        &self,
        ctx: &Context,
        req: RemoveChildNodeRequest,
    ) -> Result<()> {
        self.executor.execute(ctx, req).await
    }

    pub async fn clear_child_nodes(
        &self,
        ctx: &Context,
        req: ClearChildNodesRequest,
    ) -> Result<()> {
        self.executor.execute(ctx, req).await
    }

    pub async fn list_child_nodes(
        &self,
        ctx: &Context,
        req: ListChildNodesRequest,
    ) -> Result<ChildNodeList> {
        self.executor.execute(ctx, req).await
    }
}
