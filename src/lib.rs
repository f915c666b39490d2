pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod indexer;
pub mod metrics;
pub mod relay;
pub mod rpc;
pub mod utils;
