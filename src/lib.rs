//! lql - a Livestatus compatible query engine
//!
//! lql answers Livestatus requests against the live state of a monitoring
//! core. Tables are virtual: rows are borrowed straight from the core's
//! objects and projected into results while filters, stats, authorization
//! and output formats are applied on the fly.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lql::engine::ExecutionContext;
//! use lql::monitoring::{LiveCore, Snapshot};
//! use lql::server::Store;
//!
//! let snapshot = Snapshot::load("site.json".as_ref()).unwrap();
//! let store = Store::new(Arc::new(LiveCore::new(snapshot)), ExecutionContext::default(), None);
//! let answer = store.answer_request("GET hosts\nColumns: name state\n", &|| false);
//! print!("{}", answer.output);
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod eventconsole;
pub mod monitoring;
pub mod output;
pub mod parser;
pub mod security;
pub mod server;

pub use config::Config;
pub use engine::{execute_query, ExecutionContext, Query};
pub use error::{LqlError, Result};
pub use monitoring::{LiveCore, MonitoringCore, Snapshot};
pub use output::OutputFormat;
pub use parser::{parse_request, Request};
pub use server::{Answer, Store};
