pub mod config;
pub mod error;
pub mod identity;
pub mod index;
pub mod listing;
pub mod paths;
pub mod policy;
pub mod search;
pub mod server;
