//! `emlinfo`: metadata extraction for EML message files.
//!
//! This crate parses raw RFC 5322 messages, extracts a typed metadata record
//! from their headers (with recovery for known exporter damage), links the
//! records into a reply/reference graph, and writes them as an `<Emails>`
//! markup document.

pub mod batch;
pub mod config;
pub mod emit;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod parser;
pub mod thread;
