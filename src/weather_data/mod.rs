pub mod client;
pub mod error;
pub mod loader;
pub mod parser;
pub mod store;
