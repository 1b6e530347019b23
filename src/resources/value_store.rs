//! Key-value store: `/v1/valuestore/*`
//!
//! Values live in a [`Namespace`], either project-wide (`global`) or under a
//! node. Each value is one of four types and travels as native JSON, except
//! binary values which are base64 encoded on the wire.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::context::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::executor::{Empty, Executor, Operation};
use crate::resources::is_zero;
use crate::transport::Transport;
use crate::validate::{check_limit, require, wire_enum, SortOrder, MAX_PAGE_LIMIT};

wire_enum! {
    /// Level at which a value is stored.
    pub enum Scope: "namespace scope" {
        Global => "global",
        Node => "node",
    }
}

wire_enum! {
    /// Stored value type.
    pub enum ValueType: "value type" {
        String => "string",
        Float => "float",
        Boolean => "boolean",
        Binary => "binary",
    }
}

wire_enum! {
    /// Sort key for [`ScanValuesRequest`].
    pub enum ScanOrderBy: "orderby" {
        Namespace => "namespace",
        Key => "key",
        Created => "created",
    }
}

/// Where a value is stored.
///
/// For [`Scope::Global`] the id is any project-wide identifier; for
/// [`Scope::Node`] it must be a node id (checked by the server).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub scope: Scope,
    pub id: String,
}

impl Namespace {
    pub fn global(id: impl Into<String>) -> Self {
        Self {
            scope: Scope::Global,
            id: id.into(),
        }
    }

    pub fn node(node_id: impl Into<String>) -> Self {
        Self {
            scope: Scope::Node,
            id: node_id.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        require(&self.id, "namespace id")
    }
}

/// A stored value accessed as the wrong type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("value is {actual}, not {expected}")]
pub struct TypeMismatch {
    /// Type that was asked for
    pub expected: ValueType,
    /// Type actually held
    pub actual: ValueType,
}

/// A value held in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    String(String),
    Float(f64),
    Boolean(bool),
    Binary(Vec<u8>),
}

impl StoreValue {
    /// Type tag sent alongside the value
    pub fn value_type(&self) -> ValueType {
        match self {
            StoreValue::String(_) => ValueType::String,
            StoreValue::Float(_) => ValueType::Float,
            StoreValue::Boolean(_) => ValueType::Boolean,
            StoreValue::Binary(_) => ValueType::Binary,
        }
    }

    pub fn as_str(&self) -> std::result::Result<&str, TypeMismatch> {
        match self {
            StoreValue::String(s) => Ok(s),
            other => Err(other.mismatch(ValueType::String)),
        }
    }

    pub fn as_f64(&self) -> std::result::Result<f64, TypeMismatch> {
        match self {
            StoreValue::Float(f) => Ok(*f),
            other => Err(other.mismatch(ValueType::Float)),
        }
    }

    pub fn as_bool(&self) -> std::result::Result<bool, TypeMismatch> {
        match self {
            StoreValue::Boolean(b) => Ok(*b),
            other => Err(other.mismatch(ValueType::Boolean)),
        }
    }

    pub fn as_bytes(&self) -> std::result::Result<&[u8], TypeMismatch> {
        match self {
            StoreValue::Binary(b) => Ok(b),
            other => Err(other.mismatch(ValueType::Binary)),
        }
    }

    fn mismatch(&self, expected: ValueType) -> TypeMismatch {
        TypeMismatch {
            expected,
            actual: self.value_type(),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            StoreValue::String(s) if s.is_empty() => Err(Error::input_required("value is required")),
            StoreValue::Binary(b) if b.is_empty() => Err(Error::input_required("value is required")),
            StoreValue::Float(f) if !f.is_finite() => {
                Err(Error::validation(format!("float value must be finite, got {}", f)))
            }
            _ => Ok(()),
        }
    }

    fn to_wire(&self) -> serde_json::Value {
        match self {
            StoreValue::String(s) => serde_json::Value::from(s.as_str()),
            StoreValue::Float(f) => serde_json::Value::from(*f),
            StoreValue::Boolean(b) => serde_json::Value::from(*b),
            StoreValue::Binary(b) => serde_json::Value::from(STANDARD.encode(b)),
        }
    }

    /// Rebuild a value from its wire type tag and JSON value.
    fn from_wire(value_type: ValueType, value: serde_json::Value) -> Result<Self> {
        let decoded = match (value_type, &value) {
            (ValueType::String, serde_json::Value::String(s)) => Some(StoreValue::String(s.clone())),
            (ValueType::Float, serde_json::Value::Number(n)) => n.as_f64().map(StoreValue::Float),
            (ValueType::Boolean, serde_json::Value::Bool(b)) => Some(StoreValue::Boolean(*b)),
            (ValueType::Binary, serde_json::Value::String(s)) => {
                let bytes = STANDARD.decode(s).map_err(|e| {
                    Error::new(
                        ErrorKind::ResponseDecodeFailed,
                        format!("invalid base64 in binary value: {}", e),
                    )
                })?;
                Some(StoreValue::Binary(bytes))
            }
            _ => None,
        };
        decoded.ok_or_else(|| {
            Error::new(
                ErrorKind::ResponseDecodeFailed,
                format!("value {} does not match declared type {}", value, value_type),
            )
        })
    }
}

impl From<String> for StoreValue {
    fn from(value: String) -> Self {
        StoreValue::String(value)
    }
}

impl From<&str> for StoreValue {
    fn from(value: &str) -> Self {
        StoreValue::String(value.to_string())
    }
}

impl From<f64> for StoreValue {
    fn from(value: f64) -> Self {
        StoreValue::Float(value)
    }
}

impl From<bool> for StoreValue {
    fn from(value: bool) -> Self {
        StoreValue::Boolean(value)
    }
}

impl From<Vec<u8>> for StoreValue {
    fn from(value: Vec<u8>) -> Self {
        StoreValue::Binary(value)
    }
}

/// Store or overwrite a value.
#[derive(Debug, Clone, PartialEq)]
pub struct SetValueRequest {
    pub namespace: Namespace,
    pub key: String,
    pub value: StoreValue,
}

impl SetValueRequest {
    pub fn new(namespace: Namespace, key: impl Into<String>, value: impl Into<StoreValue>) -> Self {
        Self {
            namespace,
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Serialize for SetValueRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SetValueRequest", 4)?;
        state.serialize_field("namespace", &self.namespace)?;
        state.serialize_field("key", &self.key)?;
        state.serialize_field("type", &self.value.value_type())?;
        state.serialize_field("value", &self.value.to_wire())?;
        state.end()
    }
}

impl Operation for SetValueRequest {
    const PATH: &'static str = "/v1/valuestore/setValue";
    const NAME: &'static str = "set value";
    type Payload = Empty;
    type Output = ();

    fn validate(&self) -> Result<()> {
        self.namespace.validate()?;
        require(&self.key, "key")?;
        self.value.validate()
    }

    fn into_output(self, _: Empty) -> Result<()> {
        Ok(())
    }
}

/// Address of one stored value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueKey {
    pub namespace: Namespace,
    pub key: String,
}

impl ValueKey {
    pub fn new(namespace: Namespace, key: impl Into<String>) -> Self {
        Self {
            namespace,
            key: key.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        self.namespace.validate()?;
        require(&self.key, "key")
    }
}

/// Read one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GetValueRequest(pub ValueKey);

/// A stored value with its address and size
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub namespace: Namespace,
    pub key: String,
    pub value: StoreValue,
    /// Size in bytes as reported by the server
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub struct GetValuePayload {
    namespace: Namespace,
    key: String,
    #[serde(rename = "type")]
    value_type: ValueType,
    #[serde(default)]
    size: u64,
    value: serde_json::Value,
}

impl Operation for GetValueRequest {
    const PATH: &'static str = "/v1/valuestore/getValue";
    const NAME: &'static str = "get value";
    type Payload = GetValuePayload;
    type Output = Value;

    fn validate(&self) -> Result<()> {
        self.0.validate()
    }

    fn into_output(self, payload: GetValuePayload) -> Result<Value> {
        Ok(Value {
            value: StoreValue::from_wire(payload.value_type, payload.value)?,
            namespace: payload.namespace,
            key: payload.key,
            size: payload.size,
        })
    }
}

/// Delete one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeleteValueRequest(pub ValueKey);

impl Operation for DeleteValueRequest {
    const PATH: &'static str = "/v1/valuestore/delete";
    const NAME: &'static str = "delete value";
    type Payload = Empty;
    type Output = ();

    fn validate(&self) -> Result<()> {
        self.0.validate()
    }

    fn into_output(self, _: Empty) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFilter {
    pub namespace: Namespace,
}

/// List the keys stored in one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanValuesRequest {
    pub filter: ScanFilter,
    #[serde(rename = "orderby")]
    pub order_by: ScanOrderBy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "is_zero")]
    pub offset: u32,
}

impl ScanValuesRequest {
    /// Scan `namespace` ordered by key, with the server's default page size.
    pub fn new(namespace: Namespace) -> Self {
        Self {
            filter: ScanFilter { namespace },
            order_by: ScanOrderBy::Key,
            order: None,
            limit: None,
            offset: 0,
        }
    }
}

/// Metadata of one stored key
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValueItem {
    pub namespace: Namespace,
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub size: u64,
}

/// One page of scan results
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValueList {
    pub count: u64,
    /// Offset of the next page
    pub next: u64,
    pub data: Vec<ValueItem>,
}

impl Operation for ScanValuesRequest {
    const PATH: &'static str = "/v1/valuestore/scan";
    const NAME: &'static str = "scan values";
    type Payload = ValueList;
    type Output = ValueList;

    fn validate(&self) -> Result<()> {
        self.filter.namespace.validate()?;
        if let Some(limit) = self.limit {
            check_limit(limit, MAX_PAGE_LIMIT)?;
        }
        Ok(())
    }

    fn into_output(self, payload: ValueList) -> Result<ValueList> {
        Ok(payload)
    }
}

/// Typed key-value storage scoped globally or per node.
#[derive(Debug, Clone)]
pub struct ValueStoreManager {
    executor: Executor,
}

impl ValueStoreManager {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self::from_executor(Executor::new(transport, base_url))
    }

    pub(crate) fn from_executor(executor: Executor) -> Self {
        Self { executor }
    }

    pub async fn set_value(&self, ctx: &Context, req: SetValueRequest) -> Result<()> {
        self.executor.execute(ctx, req).await
    }

    /// Read a value. A type tag that does not match the value fails with
    /// `ResponseDecodeFailed`.
    pub async fn get_value(&self, ctx: &Context, key: ValueKey) -> Result<Value> {
        self.executor.execute(ctx, GetValueRequest(key)).await
    }

    pub async fn delete_value(&self, ctx: &Context, key: ValueKey) -> Result<()> {
        self.executor.execute(ctx, DeleteValueRequest(key)).await
    }

    pub async fn scan_values(&self, ctx: &Context, req: ScanValuesRequest) -> Result<ValueList> {
        self.executor.execute(ctx, req).await
    }
}
