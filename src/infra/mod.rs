//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod pages;
pub mod spooler;
pub mod telemetry;
