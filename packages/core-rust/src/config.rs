use serde::{Deserialize, Serialize};

use crate::path::FieldPath;
use crate::scope::AccessScope;

/// How absent fields and supplied values are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    /// Missing required fields are errors; missing optional fields take
    /// their default.
    #[default]
    Full,
    /// Missing fields, required or not, are omitted from the output.
    Provided,
    /// No casting, requirement or missing checks: supplied values are
    /// trusted verbatim and missing fields are omitted.
    None,
}

/// Caller-supplied options for one validation call.
///
/// Nested forms are validated with the same options; only `parent_path`
/// changes as the validator descends.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Treatment of absent fields and supplied values.
    pub mode: ValidationMode,
    /// Caller's access scope. `None` grants access to every field.
    pub access_scope: Option<AccessScope>,
    /// Stop AND requirements at the first failing sub-requirement.
    pub optimized_requirement_checks: bool,
    /// Cast values whose shape does not match the declared type instead of
    /// rejecting them.
    pub lenient_types: bool,
    /// Build field paths for error locations.
    pub detailed_location: bool,
    /// Location of the form being validated inside its parent, for nested calls.
    pub parent_path: Option<FieldPath>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::Full,
            access_scope: None,
            optimized_requirement_checks: true,
            lenient_types: false,
            detailed_location: false,
            parent_path: None,
        }
    }
}

impl ValidationConfig {
    #[must_use]
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_access_scope(mut self, scope: AccessScope) -> Self {
        self.access_scope = Some(scope);
        self
    }

    #[must_use]
    pub fn lenient(mut self) -> Self {
        self.lenient_types = true;
        self
    }

    #[must_use]
    pub fn exhaustive_requirements(mut self) -> Self {
        self.optimized_requirement_checks = false;
        self
    }

    #[must_use]
    pub fn detailed(mut self) -> Self {
        self.detailed_location = true;
        self
    }

    /// Path of the form being validated, or `None` when paths are disabled.
    pub(crate) fn base_path(&self) -> Option<FieldPath> {
        self.detailed_location
            .then(|| self.parent_path.clone().unwrap_or_default())
    }

    /// Options for a nested form located at `path`.
    pub(crate) fn nested(&self, path: Option<FieldPath>) -> Self {
        Self {
            parent_path: path,
            ..self.clone()
        }
    }
}
