//! Application services: rendering, confirmation and print dispatch.

pub mod error;
pub mod gate;
pub mod print;
pub mod render;
