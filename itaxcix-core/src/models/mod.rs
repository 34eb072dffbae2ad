//! Data models for the iTaxCix client
//!
//! Wire-format records for the REST API and the push channel. These are
//! plain values: created on deserialization, replaced wholesale.

mod realtime;
mod types;

pub use realtime::*;
pub use types::*;
