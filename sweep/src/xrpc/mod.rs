pub mod client;
pub mod errors;
pub mod types;

pub use client::XrpcClient;
pub use errors::XrpcError;
pub use types::*;
