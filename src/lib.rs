pub mod config;
pub mod db;
pub mod error;
pub mod oauth;
pub mod scope;
pub mod store;
