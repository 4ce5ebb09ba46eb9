//! Parser module for Livestatus requests

pub mod ast;
pub mod grammar;

pub use ast::*;
pub use grammar::{parse_condition, parse_external_command, parse_header, parse_request};
