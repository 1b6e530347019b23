//! Resource managers
//!
//! Each manager binds a group of endpoints to the shared [`Executor`]. Request
//! records implement [`Operation`](crate::executor::Operation) directly, so a
//! manager method is a single `execute` call.

pub mod access_tokens;
pub mod aggregations;
pub mod commands;
pub mod data;
pub mod health;
pub mod nodes;
pub mod value_store;
pub mod variables;

pub use access_tokens::AccessTokenManager;
pub use aggregations::AggregationManager;
pub use commands::CommandManager;
pub use data::DataAccessManager;
pub use health::HealthManager;
pub use nodes::NodeManager;
pub use value_store::ValueStoreManager;
pub use variables::VariableManager;

/// serde helper for `skip_serializing_if` on numeric fields.
pub(crate) fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}
