pub mod config;
pub mod filter;
pub mod graph;
pub mod handle;
pub mod metrics;
pub mod profile;
pub mod session;
pub mod xrpc;

pub mod error;
