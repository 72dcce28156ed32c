pub mod binding;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod link;
pub mod media;
pub mod platform;
pub mod reader;
pub mod registration;
pub mod session;
pub mod store;
