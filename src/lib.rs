pub mod config;
pub mod error;
pub mod identity;
pub mod session;
pub mod cli;
