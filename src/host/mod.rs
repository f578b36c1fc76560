#![forbid(unsafe_code)]

pub mod local;
pub mod workspace;
