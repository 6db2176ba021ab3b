// src/lib.rs

pub mod backup;
pub mod constants;
pub mod errors;
pub mod log;
pub mod orchestrator;
pub mod store;
pub mod tweaks;
pub mod utils;

#[cfg(test)]
mod testing;
