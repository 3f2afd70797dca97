//! Persistence layer — libSQL-backed storage behind the `EngineStore` trait.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::EngineStore;
