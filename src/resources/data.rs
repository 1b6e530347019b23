//! Telemetry reads: `/v1/data/*`

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::executor::{Executor, Operation};
use crate::transport::Transport;
use crate::validate::{check_limit, check_time_range, require, require_ids, SortOrder, MAX_PAGE_LIMIT};

/// Latitude/longitude pair for `geo` variables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoValue {
    pub lat: f64,
    pub long: f64,
}

/// A data point read as the wrong variable type.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("data point does not hold a {expected} value")]
pub struct DataTypeMismatch {
    pub expected: &'static str,
}

/// Value of one data point, by variable type.
///
/// Anything that is neither a number nor a `{lat, long}` pair is kept as
/// raw JSON in `Other`, so one odd point does not fail the whole response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Float(f64),
    Geo(GeoValue),
    Other(serde_json::Value),
}

impl Default for DataValue {
    fn default() -> Self {
        DataValue::Other(serde_json::Value::Null)
    }
}

impl DataValue {
    pub fn as_f64(&self) -> std::result::Result<f64, DataTypeMismatch> {
        match self {
            DataValue::Float(v) => Ok(*v),
            _ => Err(DataTypeMismatch { expected: "float" }),
        }
    }

    pub fn as_geo(&self) -> std::result::Result<GeoValue, DataTypeMismatch> {
        match self {
            DataValue::Geo(v) => Ok(*v),
            _ => Err(DataTypeMismatch { expected: "geo" }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Unix time in milliseconds
    pub timestamp: i64,
    #[serde(default)]
    pub value: DataValue,
}

/// Read a variable's history over a time range.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetDataRequest {
    pub variable: String,
    pub nodes: Vec<String>,
    pub from: i64,
    pub to: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
}

/// Historical points per node id
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistoricalData {
    pub variable: String,
    pub count: u64,
    pub data: HashMap<String, Vec<DataPoint>>,
}

impl Operation for GetDataRequest {
    const PATH: &'static str = "/v1/data/getData";
    const NAME: &'static str = "get data";
    type Payload = HistoricalData;
    type Output = HistoricalData;

    fn validate(&self) -> Result<()> {
        require(&self.variable, "variable")?;
        require_ids(&self.nodes, "nodes")?;
        check_time_range(self.from, self.to)?;
        if let Some(limit) = self.limit {
            check_limit(limit, MAX_PAGE_LIMIT)?;
        }
        Ok(())
    }

    fn into_output(self, payload: HistoricalData) -> Result<HistoricalData> {
        Ok(payload)
    }
}

/// One point per node id
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LatestData {
    pub count: u64,
    pub data: HashMap<String, DataPoint>,
}

/// Snapshot results share the shape of [`LatestData`].
pub type Snapshot = LatestData;

/// Read the most recent point of a variable for each node.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetLatestDataRequest {
    pub nodes: Vec<String>,
    pub variable: String,
}

impl Operation for GetLatestDataRequest {
    const PATH: &'static str = "/v1/data/latest";
    const NAME: &'static str = "get latest data";
    type Payload = LatestData;
    type Output = LatestData;

    fn validate(&self) -> Result<()> {
        require(&self.variable, "variable")?;
        require_ids(&self.nodes, "nodes")
    }

    fn into_output(self, payload: LatestData) -> Result<LatestData> {
        Ok(payload)
    }
}

/// Read the value of a variable for each node as of `timestamp`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetSnapshotRequest {
    pub timestamp: i64,
    pub variable: String,
    pub nodes: Vec<String>,
}

impl Operation for GetSnapshotRequest {
    const PATH: &'static str = "/v1/data/snapshot";
    const NAME: &'static str = "get snapshot";
    type Payload = Snapshot;
    type Output = Snapshot;

    fn validate(&self) -> Result<()> {
        require(&self.variable, "variable")?;
        if self.timestamp <= 0 {
            return Err(Error::validation("timestamp must be greater than 0"));
        }
        require_ids(&self.nodes, "nodes")
    }

    fn into_output(self, payload: Snapshot) -> Result<Snapshot> {
        Ok(payload)
    }
}

/// Read access to variable time series.
#[derive(Debug, Clone)]
pub struct DataAccessManager {
    executor: Executor,
}

impl DataAccessManager {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self::from_executor(Executor::new(transport, base_url))
    }

    pub(crate) fn from_executor(executor: Executor) -> Self {
        Self { executor }
    }

    pub async fn get_data(&self, ctx: &Context, req: GetDataRequest) -> Result<HistoricalData> {
        self.executor.execute(ctx, req).await
    }

    pub async fn get_latest_data(
        &self,
        ctx: &Context,
        req: GetLatestDataRequest,
    ) -> Result<LatestData> {
        self.executor.execute(ctx, req).await
    }

    pub async fn get_snapshot(&self, ctx: &Context, req: GetSnapshotRequest) -> Result<Snapshot> {
        self.executor.execute(ctx, req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn history() -> GetDataRequest {
        GetDataRequest {
            variable: "temperature".into(),
            nodes: vec!["n-1".into()],
            from: 1_700_000_000,
            to: 1_700_003_600,
            ..Default::default()
        }
    }

    #[test]
    fn test_get_data_validation() {
        assert!(history().validate().is_ok());

        let mut req = history();
        req.from = req.to + 1;
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::ValidationFailed);

        let mut req = history();
        req.nodes.clear();
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::InputRequired);

        let mut req = history();
        req.limit = Some(0);
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_latest_rejects_empty_node_id() {
        let req = GetLatestDataRequest {
            nodes: vec!["n-1".into(), String::new()],
            variable: "temperature".into(),
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputRequired);
        assert!(err.message().contains("nodes[1]"));
    }

    #[test]
    fn test_snapshot_requires_timestamp() {
        let req = GetSnapshotRequest {
            timestamp: 0,
            variable: "temperature".into(),
            nodes: vec!["n-1".into()],
        };
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_data_value_decodes_both_shapes() {
        let data: HistoricalData = serde_json::from_str(
            r#"{"success":true,"variable":"pos","count":2,"data":{"n-1":[
                {"timestamp":1,"value":21.5},
                {"timestamp":2,"value":{"lat":12.97,"long":77.59}}
            ]}}"#,
        )
        .unwrap();
        let points = &data.data["n-1"];
        assert_eq!(points[0].value.as_f64().unwrap(), 21.5);
        assert!(points[0].value.as_geo().is_err());

        let geo = points[1].value.as_geo().unwrap();
        assert_eq!(geo.lat, 12.97);
        assert_eq!(
            points[1].value.as_f64().unwrap_err().to_string(),
            "data point does not hold a float value"
        );
    }

    #[test]
    fn test_unexpected_value_only_fails_its_accessor() {
        let data: LatestData = serde_json::from_str(
            r#"{"success":true,"count":3,"data":{
                "n-1":{"timestamp":1,"value":20.0},
                "n-2":{"timestamp":2,"value":null},
                "n-3":{"timestamp":3,"value":"offline"}
            }}"#,
        )
        .unwrap();
        assert_eq!(data.data["n-1"].value.as_f64().unwrap(), 20.0);

        let null = &data.data["n-2"].value;
        assert_eq!(*null, DataValue::Other(serde_json::Value::Null));
        assert_eq!(null.as_f64().unwrap_err().expected, "float");
        assert_eq!(null.as_geo().unwrap_err().expected, "geo");
        assert!(data.data["n-3"].value.as_f64().is_err());
    }

    #[test]
    fn test_get_data_wire_shape() {
        let mut req = history();
        req.order = Some(SortOrder::Asc);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "variable": "temperature",
                "nodes": ["n-1"],
                "from": 1_700_000_000,
                "to": 1_700_003_600,
                "order": "asc"
            })
        );
    }
}
