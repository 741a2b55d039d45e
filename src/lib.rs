//! Bookcourier Core Library
//!
//! This library finds book records on an archive search page, resolves a
//! chosen record to a downloadable file through the archive's fast-download
//! API, sniffs the file's real format, and delivers it either to a local
//! directory or to an e-reader inbox over SMTP.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`metadata`] - Free-text "language, format, size" parsing
//! - [`search`] - Search page fetch and best-effort record extraction
//! - [`sniff`] - File format detection from headers and magic bytes
//! - [`delivery`] - Resolve, fetch, classify and dispatch with dedup and fallback
//! - [`book`] - The [`BookRecord`] value type shared by search and delivery

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod book;
pub mod delivery;
pub mod http;
pub mod metadata;
pub mod search;
pub mod sniff;
mod user_agent;

// Re-export commonly used types
pub use book::BookRecord;
pub use delivery::{
    Courier, DeliveryConfig, DeliveryError, DeliveryErrorKind, DeliveryOutcome, DeliveryRequest,
    FallbackOutcome, SmtpSettings, SuppressionTable, deliver_with_fallback, sanitize_filename,
};
pub use metadata::{BookMeta, parse_meta_information};
pub use search::{
    DEFAULT_BASE_URL, SearchClient, SearchError, clean_title, extract_records,
    sort_by_preferred_format,
};
pub use sniff::{FileFormat, detect_file_format};
