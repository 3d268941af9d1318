//! HTTP transport
//!
//! Client sessions used by scenario runs, and the bounded pool that caps
//! how many run concurrently.

mod client;
mod pool;

pub use client::{ClientHandle, HttpRequest, HttpResponse, TransportError};
pub use pool::ClientPool;
