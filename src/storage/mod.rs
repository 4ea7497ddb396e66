//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - authors(id, email, name, hashed_password)
//! - entries(id, author_id, slug, title, markdown, html, published, updated)

pub mod connection;
pub mod pool;
pub mod row;
pub mod schema;

pub use connection::{ConnectOptions, Database, Target};
pub use pool::{MAX_POOL_SIZE, Pool, PooledConnection};
pub use row::Row;
