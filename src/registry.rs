//! Mapping from server reason codes to [`ErrorKind`]

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::ErrorKind;

/// Reason codes known to this client, grouped by API namespace.
const STANDARD_CODES: &[(&str, ErrorKind)] = &[
    // generic
    ("generic::malformedrequest", ErrorKind::ValidationFailed),
    ("auth::accessdenied", ErrorKind::Unauthorized),
    // nodes
    ("node::devidexists", ErrorKind::Conflict),
    ("node::childexists", ErrorKind::Conflict),
    ("node::uniquealiasviolation", ErrorKind::Conflict),
    ("node::uniquechildviolation", ErrorKind::Conflict),
    ("node::childnotfound", ErrorKind::NotFound),
    ("node::nodenotfound", ErrorKind::NotFound),
    ("node::devicenotfound", ErrorKind::NotFound),
    ("node::invalidparentid", ErrorKind::ValidationFailed),
    ("node::invalidchildid", ErrorKind::ValidationFailed),
    ("node::invaliduuid", ErrorKind::ValidationFailed),
    // data
    ("data::invalidorder", ErrorKind::ValidationFailed),
    ("data::invalidnodeid", ErrorKind::ValidationFailed),
    ("data::variablenotfound", ErrorKind::NotFound),
    // device logs
    ("logs::invalidnodeid", ErrorKind::ValidationFailed),
    ("logs::invalidtimerange", ErrorKind::ValidationFailed),
    // variables
    ("variable::namerequired", ErrorKind::InputRequired),
    ("variable::variablerequired", ErrorKind::InputRequired),
    ("variable::typerequired", ErrorKind::InputRequired),
    // health
    ("health::limitexceeded", ErrorKind::ResourceLimitExceeded),
    // aggregations
    ("aggregates::missingaggregationmethod", ErrorKind::InputRequired),
    ("aggregates::invalidaggregationmethod", ErrorKind::ValidationFailed),
    ("aggregates::invalidintervalmeasure", ErrorKind::ValidationFailed),
    ("aggregates::invalidinterval", ErrorKind::ValidationFailed),
    ("aggregates::invalidtimezone", ErrorKind::ValidationFailed),
    ("aggregates::invalidfiltertype", ErrorKind::ValidationFailed),
    ("aggregates::invalidtimerange", ErrorKind::ValidationFailed),
    // access tokens
    ("fa::invalidexpiry", ErrorKind::ValidationFailed),
    ("fa::tokennofound", ErrorKind::NotFound),
    // commands
    ("cmd::invalidexpiry", ErrorKind::ValidationFailed),
    ("cmd::unknowntype", ErrorKind::ValidationFailed),
    ("cmd::invalidfilter", ErrorKind::ValidationFailed),
    ("cmd::cmdidtoolong", ErrorKind::ValidationFailed),
    ("cmd::notfound", ErrorKind::NotFound),
    // value store
    ("vs::invalidscope", ErrorKind::ValidationFailed),
    ("vs::invalidtype", ErrorKind::ValidationFailed),
    ("vs::invalidns", ErrorKind::ValidationFailed),
    ("vs::invalidrequest", ErrorKind::ValidationFailed),
    ("vs::keynotfound", ErrorKind::NotFound),
];

/// Immutable lookup table from reason code to [`ErrorKind`].
///
/// Lookups are total: a code absent from the table classifies as
/// [`ErrorKind::Unknown`]. The table only grows through [`with`](Self::with),
/// which refuses to replace an existing mapping, so extending it never changes
/// how a known code classifies.
#[derive(Debug, Clone, Default)]
pub struct ReasonCodeRegistry {
    codes: HashMap<String, ErrorKind>,
}

impl ReasonCodeRegistry {
    /// An empty registry; every code classifies as `Unknown`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Shared registry holding the standard Anedya reason codes.
    ///
    /// Built on first use and never mutated afterwards.
    pub fn standard() -> Arc<Self> {
        static STANDARD: OnceLock<Arc<ReasonCodeRegistry>> = OnceLock::new();
        STANDARD
            .get_or_init(|| {
                let codes = STANDARD_CODES
                    .iter()
                    .map(|(code, kind)| (code.to_string(), *kind))
                    .collect();
                Arc::new(ReasonCodeRegistry { codes })
            })
            .clone()
    }

    /// Add a mapping. Existing mappings are kept as they are.
    pub fn with(mut self, code: impl Into<String>, kind: ErrorKind) -> Self {
        self.codes.entry(code.into()).or_insert(kind);
        self
    }

    /// Classify a reason code.
    pub fn classify(&self, code: &str) -> ErrorKind {
        self.codes.get(code).copied().unwrap_or(ErrorKind::Unknown)
    }

    /// Number of known codes
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns true if no codes are registered
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
