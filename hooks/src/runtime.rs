//! The file-based contract with the hook runtime.
//!
//! The runtime communicates through files named by environment variables: the binding contexts
//! that triggered the hook, the current module values, and a file the hook writes its values
//! patch to.
use crate::binding::BindingContext;
use crate::error::{self, Result};
use crate::values::PatchableValues;

use serde_json::Value;
use snafu::{OptionExt, ResultExt};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{event, Level};

pub const BINDING_CONTEXT_PATH_ENV_VAR: &str = "BINDING_CONTEXT_PATH";
pub const VALUES_PATH_ENV_VAR: &str = "VALUES_PATH";
pub const VALUES_JSON_PATCH_PATH_ENV_VAR: &str = "VALUES_JSON_PATCH_PATH";

/// Locations of the files shared with the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookEnvironment {
    pub binding_context_path: Option<PathBuf>,
    pub values_path: Option<PathBuf>,
    pub values_json_patch_path: Option<PathBuf>,
}

impl HookEnvironment {
    pub fn from_env() -> Self {
        HookEnvironment {
            binding_context_path: path_from_env(BINDING_CONTEXT_PATH_ENV_VAR),
            values_path: path_from_env(VALUES_PATH_ENV_VAR),
            values_json_patch_path: path_from_env(VALUES_JSON_PATCH_PATH_ENV_VAR),
        }
    }

    /// Reads the binding contexts, oldest first. A missing binding context file is an error.
    pub fn read_binding_contexts(&self) -> Result<Vec<BindingContext>> {
        let path = required(&self.binding_context_path, BINDING_CONTEXT_PATH_ENV_VAR)?;
        let raw = read_file(path)?;
        serde_json::from_str(&raw).context(error::ParseBindingContextSnafu { path })
    }

    /// Reads the current module values. Without a values file, hooks start from an empty
    /// document.
    pub fn read_values(&self) -> Result<PatchableValues> {
        let path = match self.values_path.as_deref() {
            Some(path) if path.exists() => path,
            _ => {
                event!(Level::DEBUG, "No values file provided, starting from empty values.");
                return Ok(PatchableValues::default());
            }
        };

        let raw = read_file(path)?;
        let values: Value =
            serde_json::from_str(&raw).context(error::ParseValuesSnafu { path })?;
        Ok(PatchableValues::new(values))
    }

    /// Writes the recorded values changes for the runtime to apply.
    pub fn write_values_patch(&self, values: &PatchableValues) -> Result<()> {
        let path = required(&self.values_json_patch_path, VALUES_JSON_PATCH_PATH_ENV_VAR)?;
        let patch =
            serde_json::to_string(values.patches()).context(error::SerializeValuesPatchSnafu)?;

        event!(
            Level::DEBUG,
            operations = values.patches().len(),
            path = %path.display(),
            "Writing values patch."
        );
        fs::write(path, patch).context(error::WriteFileSnafu { path })
    }
}

fn path_from_env(variable: &str) -> Option<PathBuf> {
    env::var_os(variable)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn required<'a>(path: &'a Option<PathBuf>, variable: &str) -> Result<&'a Path> {
    path.as_deref().context(error::MissingPathSnafu { variable })
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).context(error::ReadFileSnafu { path })
}
