use crate::values::ValuesError;
use models::telemetry::TelemetryConfigError;

use snafu::Snafu;
use std::path::PathBuf;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to create client: '{}'", source))]
    ClientCreate { source: kube::Error },

    #[snafu(display("Environment variable '{}' must name a file", variable))]
    MissingPath { variable: String },

    #[snafu(display("Unable to read '{}': '{}'", path.display(), source))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("Unable to write '{}': '{}'", path.display(), source))]
    WriteFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("Unable to parse binding contexts in '{}': '{}'", path.display(), source))]
    ParseBindingContext {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[snafu(display("Unable to parse values in '{}': '{}'", path.display(), source))]
    ParseValues {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[snafu(display("Unable to serialize values patch: '{}'", source))]
    SerializeValuesPatch { source: serde_json::Error },

    #[snafu(display("Unable to serialize hook configuration: '{}'", source))]
    SerializeConfig { source: serde_yaml::Error },

    #[snafu(display("Unable to set module value: '{}'", source))]
    SetValue { source: ValuesError },

    #[snafu(display(
        "Module objects were only partially removed, {} operation(s) failed: {}",
        failed,
        summary
    ))]
    TeardownIncomplete { failed: usize, summary: String },

    #[snafu(display("Error configuring telemetry: '{}'", source))]
    TelemetryInit { source: TelemetryConfigError },
}
