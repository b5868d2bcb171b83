pub mod migration;
pub mod models;
pub mod pool;
pub mod queries;
