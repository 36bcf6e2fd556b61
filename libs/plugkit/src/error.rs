use std::path::PathBuf;

use thiserror::Error;

/// Failure to list the extension root. Nested subtrees never surface here.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read extension root '{}'", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reasons a single route entry is skipped.
#[derive(Debug, Error)]
pub enum RouteDecodeError {
    #[error("route key '{key}' has no path")]
    MissingPath { key: String },
    #[error("route path '{path}' in key '{key}' must start with '/'")]
    RelativePath { key: String, path: String },
    #[error("route key '{key}' has unknown method '{method}'")]
    UnknownMethod { key: String, method: String },
    #[error("handler reference '{reference}' must look like 'module.action'")]
    MalformedReference { reference: String },
    #[error("route key '{key}' has no handler reference")]
    EmptyTarget { key: String },
    #[error(transparent)]
    Unresolved(#[from] ResolveError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("controller module '{module}' not found")]
    ModuleNotFound { module: String },
    #[error("controller module '{module}' has no action '{action}'")]
    ActionNotFound { module: String, action: String },
}

/// Reading or parsing an extension's configuration or package file.
#[derive(Debug, Error)]
pub enum ConfError {
    #[error("cannot read '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse '{}'", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("'{}' must contain a JSON object", path.display())]
    NotAnObject { path: PathBuf },
}

/// Main-module failures. All of these degrade the extension to "no instance".
#[derive(Debug, Error)]
pub enum ExtensionLoadError {
    #[error("factory for extension '{extension}' failed")]
    Factory {
        extension: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("factory for extension '{extension}' panicked: {message}")]
    Panicked { extension: String, message: String },
    #[error(
        "extension '{extension}' targets api version {found}, host supports {expected}"
    )]
    ApiVersionMismatch {
        extension: String,
        expected: u32,
        found: u32,
    },
    #[error("extension '{0}' is already registered")]
    DuplicateRegistration(String),
}

/// Render a caught panic payload for logs.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
