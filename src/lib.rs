pub mod agent;
pub mod chat;
pub mod config;
pub mod critique;
pub mod error;
pub mod llm;
pub mod server;
pub mod vision;

pub use error::{Error, ErrorKind, Result};
