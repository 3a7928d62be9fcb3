pub mod config;
pub mod request;
pub mod server;
pub mod tenor;
