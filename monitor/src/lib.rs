pub mod bootstrap;
pub mod config;
pub mod cycle;
pub mod db;
pub mod model;
pub mod notify;
pub mod source;
pub mod store;
pub mod watermark;

pub mod error;
pub mod time;
