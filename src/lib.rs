//! Exports the articles of a paginated WordPress RSS feed to an OpenDocument
//! spreadsheet.
//!
//! The binary wires these modules together; they are exposed as a library so
//! integration tests can drive a full run against a mock server.

pub mod app;
pub mod config;
pub mod export;
pub mod feed;
pub mod logging;
pub mod util;
