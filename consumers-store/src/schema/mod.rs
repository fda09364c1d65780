//! Water usage schema module
//!
//! This module defines the consumer entity, its filters, and the CRUD
//! statements run against the `water_usage` and `geodata` schemas.

pub mod consumer;
pub mod types;

pub use consumer::{
    build_list_query, create_consumer, delete_consumer, get_consumer, list_consumers,
    update_consumer,
};
pub use types::{Consumer, ConsumerFilter, ConsumerUpdate, NewConsumer};

/// Migrations creating the tables, the schema-update registry and its triggers
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
