pub mod bigquery_db;
pub mod group_db;
pub mod keyword_db;
pub mod warehouse;

pub use bigquery_db::*;
pub use warehouse::*;
