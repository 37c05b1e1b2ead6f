//! Support crate for the bucket size tracking pipeline: configuration,
//! logging, the size-history record store, and object storage access.

pub mod config;
pub mod log;
pub mod memory;
pub mod records;
pub mod storage;
