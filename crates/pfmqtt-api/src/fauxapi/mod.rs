//! Client for the pfSense FauxAPI package.

pub mod client;
pub mod models;

pub use client::FauxApiClient;
pub use models::{ConfigPatch, FilterConfig, FilterPatch, FilterRule, SystemConfig};
