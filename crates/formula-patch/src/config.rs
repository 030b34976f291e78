use serde::{Deserialize, Serialize};

/// Compatibility switches that change how `Patch` calls are type checked.
///
/// These are threaded explicitly through every [`crate::TypeSystem`] call made by the signature
/// checker instead of being read from global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchFeatures {
    /// Allow change-records whose field types differ from the table schema to be coerced to it.
    pub allow_coercion: bool,
    /// Treat `Date` and `DateTime` as interchangeable without coercion.
    pub legacy_date_time: bool,
    /// Accept any number of change-records after the base record.
    ///
    /// When `false`, calls take 3 or 4 arguments.
    pub variadic: bool,
}

impl Default for PatchFeatures {
    fn default() -> Self {
        Self {
            allow_coercion: true,
            legacy_date_time: false,
            variadic: false,
        }
    }
}

impl PatchFeatures {
    pub const MIN_ARITY: usize = 3;
    pub const MAX_FIXED_ARITY: usize = 4;

    /// Maximum accepted argument count; `None` when unbounded.
    #[must_use]
    pub fn max_arity(&self) -> Option<usize> {
        if self.variadic {
            None
        } else {
            Some(Self::MAX_FIXED_ARITY)
        }
    }

    #[must_use]
    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= Self::MIN_ARITY && self.max_arity().map_or(true, |max| count <= max)
    }
}
