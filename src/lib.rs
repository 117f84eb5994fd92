pub mod config;
pub mod fetch;
pub mod infra;
pub mod model;
pub mod output;
pub mod polyline;
pub mod poller;
pub mod reconciler;
pub mod search;
pub mod services;
pub mod summary;
