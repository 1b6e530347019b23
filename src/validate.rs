//! Validation helpers shared by the resource managers
//!
//! Every check here is pure: it inspects the request and never touches the
//! network.

use crate::error::{Error, Result};

/// Largest page size accepted by paginated list endpoints.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Page size used by request constructors.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Fails with `InputRequired` if `value` is empty.
pub fn require(value: &str, field: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::input_required(format!("{} is required", field)));
    }
    Ok(())
}

/// Fails with `InputRequired` if the list is empty, or if any id in it is empty.
pub fn require_ids(ids: &[String], field: &str) -> Result<()> {
    if ids.is_empty() {
        return Err(Error::input_required(format!(
            "at least one entry in {} is required",
            field
        )));
    }
    if let Some(index) = ids.iter().position(|id| id.is_empty()) {
        return Err(Error::input_required(format!(
            "{}[{}] must not be empty",
            field, index
        )));
    }
    Ok(())
}

/// Fails with `ValidationFailed` unless `1 <= limit <= max`.
///
/// Out-of-range limits are rejected rather than clamped.
pub fn check_limit(limit: u32, max: u32) -> Result<()> {
    if limit == 0 || limit > max {
        return Err(Error::validation(format!(
            "limit must be between 1 and {}",
            max
        )));
    }
    Ok(())
}

/// Fails with `ValidationFailed` unless `0 < from <= to`.
pub fn check_time_range(from: i64, to: i64) -> Result<()> {
    if from <= 0 || to <= 0 || from > to {
        return Err(Error::validation(format!(
            "invalid from/to time range: from={} to={}",
            from, to
        )));
    }
    Ok(())
}

/// Declares a string-valued wire enum: serde names, `as_str`, `Display` and a
/// case-insensitive `FromStr` that fails with `ValidationFailed`.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant ),+
        }

        impl $name {
            /// Every value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire representation
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| {
                        $crate::error::Error::validation(format!(
                            "invalid {} '{}'", $label, s
                        ))
                    })
            }
        }
    };
}

pub(crate) use wire_enum;

wire_enum! {
    /// Sort direction accepted by list and range endpoints.
    pub enum SortOrder: "order" {
        Asc => "asc",
        Desc => "desc",
    }
}
