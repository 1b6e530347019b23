//! Device commands: `/v1/commands/*`

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::executor::{Empty, Executor, Operation};
use crate::resources::is_zero;
use crate::transport::Transport;
use crate::validate::{check_limit, require, wire_enum};

/// Largest page size accepted by the command list endpoint.
pub const MAX_COMMAND_PAGE_LIMIT: u32 = 100;

wire_enum! {
    /// Encoding of command data and acknowledgements.
    pub enum CommandDataType: "command data type" {
        String => "string",
        Binary => "binary",
    }
}

/// Delivery state of a command.
///
/// Statuses this client does not know decode as [`CommandStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    /// Queued, not yet received by the device
    Pending,
    Received,
    Processing,
    Success,
    Failure,
    /// Cancelled before execution
    Invalidated,
    #[serde(other)]
    Unknown,
}

impl CommandStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Received => "received",
            CommandStatus::Processing => "processing",
            CommandStatus::Success => "success",
            CommandStatus::Failure => "failure",
            CommandStatus::Invalidated => "invalidated",
            CommandStatus::Unknown => "unknown",
        }
    }

    /// Whether the command has reached a final state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CommandStatus::Success | CommandStatus::Failure | CommandStatus::Invalidated
        )
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode an optional data type, treating `""` as absent.
fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<CommandDataType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Encode an optional Unix timestamp as a decimal string.
fn timestamp_as_string<S>(value: &Option<i64>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(ts) => serializer.collect_str(ts),
        None => serializer.serialize_none(),
    }
}

/// Queue a command for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCommandRequest {
    pub node_id: String,
    /// Command identifier understood by the device
    pub command: String,
    pub data: String,
    #[serde(rename = "type")]
    pub data_type: CommandDataType,
    /// Seconds until the command expires; 0 means the platform default
    #[serde(skip_serializing_if = "is_zero")]
    pub expiry: u64,
}

impl SendCommandRequest {
    pub fn new(
        node_id: impl Into<String>,
        command: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            command: command.into(),
            data: data.into(),
            data_type: CommandDataType::String,
            expiry: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendCommandPayload {
    #[serde(rename = "commandId")]
    command_id: String,
}

impl Operation for SendCommandRequest {
    const PATH: &'static str = "/v1/commands/send";
    const NAME: &'static str = "send command";
    type Payload = SendCommandPayload;
    type Output = String;

    fn validate(&self) -> Result<()> {
        require(&self.node_id, "nodeId")?;
        require(&self.command, "command")?;
        require(&self.data, "data")
    }

    fn into_output(self, payload: SendCommandPayload) -> Result<String> {
        Ok(payload.command_id)
    }
}

/// Criteria for [`ListCommandsRequest`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFilter {
    /// Unix seconds, sent as a string
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "timestamp_as_string")]
    pub issued_after: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "timestamp_as_string")]
    pub issued_before: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<CommandStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

/// List commands, optionally filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListCommandsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<CommandFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "is_zero")]
    pub offset: u32,
}

/// Summary of one command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandInfo {
    #[serde(rename = "id", alias = "commandId")]
    pub id: String,
    #[serde(default, alias = "command")]
    pub identifier: String,
    pub status: CommandStatus,
    #[serde(default)]
    pub updated_on: i64,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub expiry: i64,
    #[serde(default)]
    pub issued_at: i64,
}

/// One page of commands
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandList {
    pub count: u64,
    pub total_count: u64,
    #[serde(rename = "data")]
    pub commands: Vec<CommandInfo>,
    /// Cursor for the next page, absent on the last page
    pub next: Option<String>,
}

impl Operation for ListCommandsRequest {
    const PATH: &'static str = "/v1/commands/list";
    const NAME: &'static str = "list commands";
    type Payload = CommandList;
    type Output = CommandList;

    fn validate(&self) -> Result<()> {
        if let Some(limit) = self.limit {
            check_limit(limit, MAX_COMMAND_PAGE_LIMIT)?;
        }
        if let Some(filter) = &self.filter {
            if let (Some(after), Some(before)) = (filter.issued_after, filter.issued_before) {
                if after > before {
                    return Err(Error::validation("issuedAfter must not be later than issuedBefore"));
                }
            }
        }
        Ok(())
    }

    fn into_output(self, payload: CommandList) -> Result<CommandList> {
        Ok(payload)
    }
}

/// Full record of one command, including the device acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDetails {
    #[serde(rename = "commandId", alias = "id")]
    pub command_id: String,
    #[serde(default, rename = "command", alias = "identifier")]
    pub identifier: String,
    pub status: CommandStatus,
    #[serde(default)]
    pub updated_on: i64,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub expiry: i64,
    #[serde(default)]
    pub issued_at: i64,
    #[serde(default, rename = "ackdata", alias = "ackData")]
    pub ack_data: String,
    #[serde(
        default,
        rename = "ackdatatype",
        alias = "ackDataType",
        deserialize_with = "empty_as_none"
    )]
    pub ack_data_type: Option<CommandDataType>,
    #[serde(default)]
    pub data: String,
    #[serde(
        default,
        rename = "datatype",
        alias = "dataType",
        deserialize_with = "empty_as_none"
    )]
    pub data_type: Option<CommandDataType>,
}

/// Reference to one command by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandId {
    #[serde(rename = "commandId")]
    pub command_id: String,
}

impl CommandId {
    pub fn new(command_id: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
        }
    }
}

/// Fetch one command's details and status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GetCommandDetailsRequest(pub CommandId);

impl Operation for GetCommandDetailsRequest {
    const PATH: &'static str = "/v1/commands/getDetails";
    const NAME: &'static str = "get command details";
    type Payload = CommandDetails;
    type Output = CommandDetails;

    fn validate(&self) -> Result<()> {
        require(&self.0.command_id, "commandId")
    }

    fn into_output(self, payload: CommandDetails) -> Result<CommandDetails> {
        Ok(payload)
    }
}

/// Cancel a command that has not yet executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InvalidateCommandRequest(pub CommandId);

impl Operation for InvalidateCommandRequest {
    const PATH: &'static str = "/v1/commands/invalidate";
    const NAME: &'static str = "invalidate command";
    type Payload = Empty;
    type Output = ();

    fn validate(&self) -> Result<()> {
        require(&self.0.command_id, "commandId")
    }

    fn into_output(self, _: Empty) -> Result<()> {
        Ok(())
    }
}

/// Commands sent to devices.
#[derive(Debug, Clone)]
pub struct CommandManager {
    executor: Executor,
}

impl CommandManager {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self::from_executor(Executor::new(transport, base_url))
    }

    pub(crate) fn from_executor(executor: Executor) -> Self {
        Self { executor }
    }

    /// Queue a command and return its id.
    pub async fn send_command(&self, ctx: &Context, req: SendCommandRequest) -> Result<String> {
        self.executor.execute(ctx, req).await
    }

    pub async fn list_commands(&self, ctx: &Context, req: ListCommandsRequest) -> Result<CommandList> {
        self.executor.execute(ctx, req).await
    }

    pub async fn get_command_details(
        &self,
        ctx: &Context,
        command_id: CommandId,
    ) -> Result<CommandDetails> {
        self.executor
            .execute(ctx, GetCommandDetailsRequest(command_id))
            .await
    }

    pub async fn invalidate_command(&self, ctx: &Context, command_id: CommandId) -> Result<()> {
        self.executor
            .execute(ctx, InvalidateCommandRequest(command_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_send_wire_shape() {
        let mut req = SendCommandRequest::new("n-1", "reboot", "now");
        req.expiry = 60;
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "nodeId": "n-1",
                "command": "reboot",
                "data": "now",
                "type": "string",
                "expiry": 60
            })
        );
    }

    #[test]
    fn test_send_validation() {
        let err = SendCommandRequest::new("", "reboot", "now").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputRequired);

        let err = SendCommandRequest::new("n-1", "reboot", "").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputRequired);
    }

    #[test]
    fn test_data_type_parse() {
        assert_eq!(
            "BINARY".parse::<CommandDataType>().unwrap(),
            CommandDataType::Binary
        );
        let err = "json".parse::<CommandDataType>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_list_limit() {
        let req = ListCommandsRequest {
            limit: Some(100),
            ..Default::default()
        };
        assert!(req.validate().is_ok());

        let req = ListCommandsRequest {
            limit: Some(101),
            ..Default::default()
        };
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_list_filter_wire_shape() {
        let req = ListCommandsRequest {
            filter: Some(CommandFilter {
                node_id: Some("n-1".into()),
                status: vec![CommandStatus::Pending, CommandStatus::Failure],
                ..Default::default()
            }),
            limit: Some(10),
            offset: 0,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "filter": {"nodeId": "n-1", "status": ["pending", "failure"]},
                "limit": 10
            })
        );
    }

    #[test]
    fn test_filter_timestamps_sent_as_strings() {
        let req = ListCommandsRequest {
            filter: Some(CommandFilter {
                issued_after: Some(1_700_000_000),
                issued_before: Some(1_700_086_400),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(req.validate().is_ok());
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "filter": {"issuedAfter": "1700000000", "issuedBefore": "1700086400"}
            })
        );

        let reversed = ListCommandsRequest {
            filter: Some(CommandFilter {
                issued_after: Some(1_700_086_400),
                issued_before: Some(1_700_000_000),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(reversed.validate().unwrap_err().kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_unknown_status_tolerated() {
        let list: CommandList = serde_json::from_str(
            r#"{"success":true,"count":2,"totalCount":2,"data":[
                {"id":"c-1","identifier":"reboot","status":"success","updatedOn":1,"expired":false,"expiry":2,"issuedAt":0},
                {"id":"c-2","identifier":"reboot","status":"rerouted"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(list.commands[0].status, CommandStatus::Success);
        assert_eq!(list.commands[1].status, CommandStatus::Unknown);
        assert!(list.next.is_none());
    }

    #[test]
    fn test_details_decode() {
        let details: CommandDetails = serde_json::from_str(
            r#"{"success":true,"commandId":"c-1","command":"reboot","status":"received",
                "updatedOn":5,"ackdata":"","ackdatatype":"","expired":false,"expiry":9,
                "issuedAt":1,"data":"now","datatype":"string"}"#,
        )
        .unwrap();
        assert_eq!(details.command_id, "c-1");
        assert_eq!(details.identifier, "reboot");
        assert_eq!(details.ack_data_type, None);
        assert_eq!(details.data_type, Some(CommandDataType::String));
        assert!(!details.status.is_terminal());
    }

    #[test]
    fn test_command_id_required() {
        let err = InvalidateCommandRequest(CommandId::new(""))
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputRequired);
    }
}
