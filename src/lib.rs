#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmdline;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod outline;
pub mod output;
pub mod task;
pub mod tui;
