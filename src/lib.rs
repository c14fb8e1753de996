//! # Series Store
//!
//! A catalog of TV series held in memory and synchronized to a CSV file of
//! record. Supports listing, lookup by id, equality filters and
//! create/update/delete, each mutation rewriting the file.
//!
//! ## Design Principles
//!
//! - **One canonical schema**: unknown field names are rejected by filters and
//!   creates, ignored by updates
//! - **Exact scores**: decimal columns use `rust_decimal`, so equality filters
//!   and reloads are exact
//! - **No divergence**: a failed file rewrite rolls the mutation back
//! - **Serialized writes**: one `RwLock` per store; readers get owned copies
//!
//! ## Example
//!
//! ```no_run
//! use series_store::SeriesStore;
//! use serde_json::json;
//!
//! let store = SeriesStore::load("data/series.csv").unwrap();
//! let criteria = json!({"rating": 18});
//! let adults = store.filter(criteria.as_object().unwrap()).unwrap();
//! println!("{} series rated 18", adults.len());
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod field;
pub mod score;
pub mod serie;
pub mod store;

pub use api::{ApiResponse, SeriesApi};
pub use config::Config;
pub use error::{Result, StoreError};
pub use field::{Field, FieldValue};
pub use score::Score;
pub use serie::{Serie, SerieRow};
pub use store::{read_records, write_records, Fields, SeriesStore};
