//! Query engine: tables, columns, filters and their execution

pub mod column;
pub mod executor;
pub mod filter;
pub mod query;
pub mod stats;
pub mod tables;
pub mod value;

pub use executor::{execute_query, ExecutionContext, Scan};
pub use query::{ParsedRequest, Query};
