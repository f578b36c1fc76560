#![forbid(unsafe_code)]

pub mod declarations;
pub mod model;
pub mod registry;
pub mod slot;
pub mod storage;
