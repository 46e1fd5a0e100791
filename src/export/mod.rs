//! Spreadsheet export.
//!
//! Articles are written as an OpenDocument spreadsheet (`.ods`) with a single
//! `Articles` sheet. The file is replaced atomically on every run.

mod ods;

pub use ods::{render_ods, write_ods, WriteError, COLUMNS, SHEET_NAME};
