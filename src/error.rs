#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskOutlineError {
    #[error("-- UNDEFINED TASK -- ({0})")]
    UndefinedTask(String),

    #[error("this feature is not available in multi-root workspaces")]
    MultiScopeUnsupported,

    #[error("failed to execute task '{task}': {msg}")]
    ExecutionRejected { task: String, msg: String },

    #[error("task configuration unreadable at {path}: {msg}")]
    ConfigurationUnreadable { path: PathBuf, msg: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid config key '{0}'")]
    InvalidConfigKey(String),

    #[error("invalid config value for '{key}': {msg}")]
    InvalidConfigValue { key: String, msg: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error at {path}: {source}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}
