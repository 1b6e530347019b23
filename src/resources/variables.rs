//! Variable definitions: `/v1/variables/*`

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::Result;
use crate::executor::{Empty, Executor, Operation};
use crate::resources::is_zero;
use crate::transport::Transport;
use crate::validate::{check_limit, require, wire_enum, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

wire_enum! {
    /// Data type of a variable's time series.
    pub enum VariableType: "variable type" {
        Float => "float",
        Geo => "geo",
    }
}

/// A variable definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variable {
    #[serde(rename = "variableId")]
    pub variable_id: String,
    #[serde(rename = "type")]
    pub variable_type: String,
    pub name: String,
    #[serde(rename = "desc")]
    pub description: String,
    /// Identifier used when submitting data
    pub variable: String,
    /// Retention in seconds; 0 means the platform default
    pub ttl: u64,
}

/// Define a new variable.
///
/// `variable_type` is matched case-insensitively against [`VariableType`] and
/// sent as given.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateVariableRequest {
    #[serde(rename = "type")]
    pub variable_type: String,
    pub name: String,
    #[serde(rename = "desc", skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub variable: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub ttl: u64,
}

impl CreateVariableRequest {
    pub fn new(
        variable_type: VariableType,
        name: impl Into<String>,
        variable: impl Into<String>,
    ) -> Self {
        Self {
            variable_type: variable_type.as_str().to_string(),
            name: name.into(),
            variable: variable.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateVariablePayload {
    #[serde(rename = "variableId")]
    variable_id: String,
}

impl Operation for CreateVariableRequest {
    const PATH: &'static str = "/v1/variables/create";
    const NAME: &'static str = "create variable";
    type Payload = CreateVariablePayload;
    type Output = Variable;

    fn validate(&self) -> Result<()> {
        require(&self.name, "name")?;
        require(&self.variable, "variable")?;
        require(&self.variable_type, "type")?;
        self.variable_type.parse::<VariableType>().map(|_| ())
    }

    fn into_output(self, payload: CreateVariablePayload) -> Result<Variable> {
        Ok(Variable {
            variable_id: payload.variable_id,
            variable_type: self.variable_type,
            name: self.name,
            description: self.description,
            variable: self.variable,
            ttl: self.ttl,
        })
    }
}

/// Page through variable definitions.
#[derive(Debug, Clone, Serialize)]
pub struct ListVariablesRequest {
    pub limit: u32,
    pub offset: u32,
}

impl Default for ListVariablesRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// One page of variables
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableList {
    pub current_count: u64,
    pub total_count: u64,
    pub offset: u64,
    #[serde(rename = "nodeParams")]
    pub variables: Vec<Variable>,
}

impl Operation for ListVariablesRequest {
    const PATH: &'static str = "/v1/variables/list";
    const NAME: &'static str = "list variables";
    type Payload = VariableList;
    type Output = VariableList;

    fn validate(&self) -> Result<()> {
        check_limit(self.limit, MAX_PAGE_LIMIT)
    }

    fn into_output(self, payload: VariableList) -> Result<VariableList> {
        Ok(payload)
    }
}

/// Delete a variable by its identifier.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteVariableRequest {
    pub variable: String,
}

impl DeleteVariableRequest {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl Operation for DeleteVariableRequest {
    const PATH: &'static str = "/v1/variables/delete";
    const NAME: &'static str = "delete variable";
    type Payload = Empty;
    type Output = ();

    fn validate(&self) -> Result<()> {
        require(&self.variable, "variable")
    }

    fn into_output(self, _: Empty) -> Result<()> {
        Ok(())
    }
}

/// Variable definitions.
#[derive(Debug, Clone)]
pub struct VariableManager {
    executor: Executor,
}

impl VariableManager {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self::from_executor(Executor::new(transport, base_url))
    }

    pub(crate) fn from_executor(executor: Executor) -> Self {
        Self { executor }
    }

    /// Create a variable and return it with its server-assigned id.
    pub async fn create_variable(
        &self,
        ctx: &Context,
        req: CreateVariableRequest,
    ) -> Result<Variable> {
        self.executor.execute(ctx, req).await
    }

    pub async fn list_variables(
        &self,
        ctx: &Context,
        req: ListVariablesRequest,
    ) -> Result<VariableList> {
        self.executor.execute(ctx, req).await
    }

    pub async fn delete_variable(&self, ctx: &Context, req: DeleteVariableRequest) -> Result<()> {
        self.executor.execute(ctx, req).await
    }
}
