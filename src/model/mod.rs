//! Core data model types: extracted records, addresses, and attachment descriptors.

pub mod address;
pub mod attachment;
pub mod record;
