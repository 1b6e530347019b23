//! Scoped access tokens: `/v1/access/tokens/*`

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::executor::{Empty, Executor, Operation};
use crate::transport::Transport;
use crate::validate::{require, wire_enum};

/// Longest token lifetime: 90 days, in seconds.
pub const MAX_TOKEN_TTL_SECS: u64 = 7_776_000;

wire_enum! {
    /// Action a token may perform.
    pub enum Permission: "permission" {
        DataGetSnapshot => "data::getsnapshot",
        DataGetLatest => "data::getlatest",
        DataGetHistorical => "data::gethistorical",
        CmdSendCommand => "cmd::sendcommand",
        CmdListCommands => "cmd::listcommands",
        CmdGetStatus => "cmd::getstatus",
        CmdInvalidate => "cmd::invalidate",
        VsGetValue => "vs::getvalue",
        VsSetValue => "vs::setvalue",
        VsScanKeys => "vs::scankeys",
        VsDeleteKeys => "vs::deletekeys",
        StreamsConnect => "streams::connect",
        HealthGetHbStats => "health::gethbstats",
        HealthGetStatus => "health::getstatus",
    }
}

/// What a token may do, and on which resources.
///
/// `resources` is passed through to the platform untouched, e.g.
/// `{"nodes": ["n-1"], "variables": ["temperature"]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub allow: Vec<Permission>,
}

impl Policy {
    pub fn allow<I: IntoIterator<Item = Permission>>(permissions: I) -> Self {
        Self {
            resources: BTreeMap::new(),
            allow: permissions.into_iter().collect(),
        }
    }

    /// Restrict the policy to a resource set.
    pub fn with_resource(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.resources.insert(name.into(), value);
        self
    }
}

/// Issue a new token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccessTokenRequest {
    pub ttl_sec: u64,
    pub policy: Policy,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccessTokenPayload {
    token_id: String,
    token: String,
}

/// A newly issued token
#[derive(Clone, PartialEq)]
pub struct AccessToken {
    pub token_id: String,
    /// Secret value; shown once by the platform
    pub token: String,
    pub ttl_sec: u64,
    pub policy: Policy,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_id", &self.token_id)
            .field("token", &"<redacted>")
            .field("ttl_sec", &self.ttl_sec)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Operation for CreateAccessTokenRequest {
    const PATH: &'static str = "/v1/access/tokens/create";
    const NAME: &'static str = "create access token";
    type Payload = CreateAccessTokenPayload;
    type Output = AccessToken;

    fn validate(&self) -> Result<()> {
        if self.ttl_sec == 0 || self.ttl_sec > MAX_TOKEN_TTL_SECS {
            return Err(Error::validation(format!(
                "ttlSec must be between 1 and {}",
                MAX_TOKEN_TTL_SECS
            )));
        }
        if self.policy.allow.is_empty() {
            return Err(Error::input_required("policy must allow at least one permission"));
        }
        Ok(())
    }

    fn into_output(self, payload: CreateAccessTokenPayload) -> Result<AccessToken> {
        Ok(AccessToken {
            token_id: payload.token_id,
            token: payload.token,
            ttl_sec: self.ttl_sec,
            policy: self.policy,
        })
    }
}

/// Revoke a token before it expires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevokeAccessTokenRequest {
    #[serde(rename = "tokenId")]
    pub token_id: String,
}

impl RevokeAccessTokenRequest {
    pub fn new(token_id: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
        }
    }
}

impl Operation for RevokeAccessTokenRequest {
    const PATH: &'static str = "/v1/access/tokens/revoke";
    const NAME: &'static str = "revoke access token";
    type Payload = Empty;
    type Output = ();

    fn validate(&self) -> Result<()> {
        require(&self.token_id, "tokenId")
    }

    fn into_output(self, _: Empty) -> Result<()> {
        Ok(())
    }
}

/// Short-lived tokens with restricted permissions.
#[derive(Debug, Clone)]
pub struct AccessTokenManager {
    executor: Executor,
}

impl AccessTokenManager {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self::from_executor(Executor::new(transport, base_url))
    }

    pub(crate) fn from_executor(executor: Executor) -> Self {
        Self { executor }
    }

    pub async fn create_token(
        &self,
        ctx: &Context,
        req: CreateAccessTokenRequest,
    ) -> Result<AccessToken> {
        self.executor.execute(ctx, req).await
    }

    pub async fn revoke_token(&self, ctx: &Context, req: RevokeAccessTokenRequest) -> Result<()> {
        self.executor.execute(ctx, req).await
    }
}
