//! Token values: credential output, cached header state, and the redacting secret wrapper.

pub mod access;
pub mod cached;
pub mod secret;
