#![forbid(unsafe_code)]

pub mod buffer;
pub mod launcher;
pub mod matcher;
pub mod session;
