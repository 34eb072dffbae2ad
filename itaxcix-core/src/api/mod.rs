//! REST API access

mod client;

pub use client::{error_message_from_body, ApiClient};
