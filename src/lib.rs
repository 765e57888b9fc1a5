// Library exports for testing
pub mod api;
pub mod auth;
pub mod chart;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod metadata;
pub mod stats;
pub mod tracker;
