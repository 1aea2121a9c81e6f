//! Postgres-backed store for `booking-core`, built on diesel-async with bb8
//! pooling. Ships the embedded migrations for the booking tables.

pub mod models;
pub mod schema;
mod store;

pub use store::{PgStore, PgStoreConfig, MIGRATIONS};
