//! Time-bucketed aggregates: `/v1/aggregates/variable/byTime`

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::executor::{Executor, Operation};
use crate::transport::Transport;
use crate::validate::{check_time_range, require, wire_enum};

wire_enum! {
    /// Function applied to each time bucket.
    pub enum AggregationMethod: "aggregation method" {
        Sum => "sum",
        Avg => "avg",
        Median => "median",
        Min => "min",
        Max => "max",
        Diff => "diff",
        DeltaSum => "deltasum",
        StdDev => "stddev",
    }
}

wire_enum! {
    /// Unit of a time bucket.
    pub enum IntervalMeasure: "interval measure" {
        Year => "year",
        Month => "month",
        Week => "week",
        Day => "day",
        Hour => "hour",
        Minute => "minute",
    }
}

wire_enum! {
    /// Whether a node filter selects or excludes its nodes.
    pub enum FilterType: "filter type" {
        Include => "include",
        Exclude => "exclude",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub compute: AggregationMethod,
    /// Aggregate each node separately instead of across all nodes
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub for_each_node: bool,
}

/// Bucket width, e.g. 15 minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub measure: IntervalMeasure,
    pub interval: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseOptions {
    /// IANA zone used to align buckets; UTC when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFilter {
    pub nodes: Vec<String>,
    #[serde(rename = "type")]
    pub filter_type: FilterType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationConfig {
    pub aggregation: Aggregation,
    pub interval: Interval,
    #[serde(default)]
    pub response_options: ResponseOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<NodeFilter>,
}

impl AggregationConfig {
    /// Config computing `compute` over buckets of `interval` × `measure`.
    pub fn new(compute: AggregationMethod, measure: IntervalMeasure, interval: u32) -> Self {
        Self {
            aggregation: Aggregation {
                compute,
                for_each_node: false,
            },
            interval: Interval { measure, interval },
            response_options: ResponseOptions::default(),
            filter: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.interval.interval == 0 {
            return Err(Error::validation("interval must be greater than zero"));
        }
        if let Some(filter) = &self.filter {
            if filter.nodes.is_empty() {
                return Err(Error::validation(
                    "filter nodes cannot be empty when filter is provided",
                ));
            }
        }
        Ok(())
    }
}

/// Aggregate one variable over a time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateByTimeRequest {
    pub variable: String,
    pub from: i64,
    pub to: i64,
    pub config: AggregationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatePoint {
    pub timestamp: i64,
    pub aggregate: f64,
}

/// Buckets keyed by node id, or by a single combined key when
/// `for_each_node` is off.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggregationResult {
    #[serde(default)]
    pub variable: String,
    pub config: Option<AggregationConfig>,
    #[serde(default)]
    pub data: HashMap<String, Vec<AggregatePoint>>,
}

impl Operation for AggregateByTimeRequest {
    const PATH: &'static str = "/v1/aggregates/variable/byTime";
    const NAME: &'static str = "aggregate by time";
    type Payload = AggregationResult;
    type Output = AggregationResult;

    fn validate(&self) -> Result<()> {
        require(&self.variable, "variable")?;
        check_time_range(self.from, self.to)?;
        self.config.validate()
    }

    fn into_output(self, mut payload: AggregationResult) -> Result<AggregationResult> {
        if payload.config.is_none() {
            payload.config = Some(self.config);
        }
        Ok(payload)
    }
}

/// Server-side aggregation of time series.
#[derive(Debug, Clone)]
pub struct AggregationManager {
    executor: Executor,
}

impl AggregationManager {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self::from_executor(Executor::new(transport, base_url))
    }

    pub(crate) fn from_executor(executor: Executor) -> Self {
        Self { executor }
    }

    pub async fn aggregate_by_time(
        &self,
        ctx: &Context,
        req: AggregateByTimeRequest,
    ) -> Result<AggregationResult> {
        self.executor.execute(ctx, req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn request() -> AggregateByTimeRequest {
        AggregateByTimeRequest {
            variable: "temperature".into(),
            from: 1_700_000_000,
            to: 1_700_086_400,
            config: AggregationConfig::new(AggregationMethod::Avg, IntervalMeasure::Hour, 1),
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut req = request();
        req.config.interval.interval = 0;
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_empty_filter_rejected() {
        let mut req = request();
        req.config.filter = Some(NodeFilter {
            nodes: vec![],
            filter_type: FilterType::Exclude,
        });
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_bad_range_rejected() {
        let mut req = request();
        req.from = 0;
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(
            "DeltaSum".parse::<AggregationMethod>().unwrap(),
            AggregationMethod::DeltaSum
        );
        let err = "mode".parse::<AggregationMethod>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(AggregationMethod::ALL.len(), 8);
        assert_eq!(IntervalMeasure::ALL.len(), 6);
    }

    #[test]
    fn test_wire_shape() {
        let mut req = request();
        req.config.aggregation.for_each_node = true;
        req.config.response_options.timezone = Some("Asia/Kolkata".into());
        req.config.filter = Some(NodeFilter {
            nodes: vec!["n-1".into()],
            filter_type: FilterType::Include,
        });
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "variable": "temperature",
                "from": 1_700_000_000,
                "to": 1_700_086_400,
                "config": {
                    "aggregation": {"compute": "avg", "forEachNode": true},
                    "interval": {"measure": "hour", "interval": 1},
                    "responseOptions": {"timezone": "Asia/Kolkata"},
                    "filter": {"nodes": ["n-1"], "type": "include"}
                }
            })
        );
    }

    #[test]
    fn test_result_falls_back_to_request_config() {
        let payload: AggregationResult = serde_json::from_str(
            r#"{"success":true,"variable":"temperature","data":{"n-1":[{"timestamp":1700000000,"aggregate":21.25}]}}"#,
        )
        .unwrap();
        let result = request().into_output(payload).unwrap();
        assert_eq!(result.config, Some(request().config));
        assert_eq!(result.data["n-1"][0].aggregate, 21.25);
    }
}
