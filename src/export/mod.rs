//! Export functionality: attachment storage.

pub mod attachment;
