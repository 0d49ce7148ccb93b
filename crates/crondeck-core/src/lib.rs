pub mod config;
pub mod error;
pub mod layout;
pub mod safety;
pub mod types;
pub mod validate;
