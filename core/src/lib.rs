pub mod artifacts;
pub mod core;
pub mod error;
mod filesystem;
mod output;
pub mod structs;
mod utils;
