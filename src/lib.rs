//! Flight delay prediction: a shared feature encoding, an offline trainer
//! and an inference pipeline served over HTTP.

pub mod config;
pub mod encoding;
pub mod error;
pub mod forest;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod server;
pub mod trainer;
pub mod types;

#[cfg(test)]
mod testing;
