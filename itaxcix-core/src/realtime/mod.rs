//! Real-time trip dispatch
//!
//! ```text
//! WSS frame ──► decoder ──► mpsc (arrival order) ──► DispatchRouter ──► view model state
//! ```

mod channel;
pub mod decoder;
mod router;
pub mod ws;

pub use channel::PushChannel;
pub use decoder::{decode, encode, DecodeError, MessageKind, RealtimeMessage};
pub use router::{DispatchRouter, Handler, Subscription};
