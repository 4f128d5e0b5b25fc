pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod pipeline;
pub mod repo;
pub mod telemetry;
