// src/config/mod.rs
pub mod advisor;
pub mod regions;
pub mod service;

pub use advisor::AdvisorConfig;
pub use service::ServiceConfig;
