//! IPC Module for the log API
//!
//! Wire payloads and the handler that maps them onto [`LogApi`](crate::ports::LogApi).

pub mod handler;
pub mod payloads;

pub use handler::LogRequestHandler;
pub use payloads::*;
