// src/utils.rs

pub mod elevation;
pub mod registry;
pub mod services;
