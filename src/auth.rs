//! Token request contexts and the token values produced for them.

pub mod context;
pub mod token;

pub use context::*;
pub use token::{access::*, cached::*, secret::*};
