//! Message parsing: raw header/body tree, header decoding, MIME handling, and EML sources.

pub mod eml;
pub mod header;
pub mod message;
pub mod mime;
