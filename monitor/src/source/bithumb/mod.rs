pub mod client;
pub mod errors;
pub mod types;

pub use client::BithumbClient;
pub use errors::BithumbError;
