//! Echo/checksum protocol implementation.
//!
//! There is no framing: whatever one read call returns is one message.
//!
//! ```text
//! Request:  <bytes, first byte not 'U'>
//! Response: <the same bytes>
//!
//! Request:  U<bytes>
//! Response: <one byte: sum of all request bytes mod 128>
//!
//! Example:
//! Request:  hello              Response: hello
//! Request:  U\x01\x01 ... \x01 Response: \x5f   (85 + 10 = 95)
//! ```
//!
//! ## Use Cases
//!
//! 1. **Downstream traffic**: echo mode returns every byte, so the response
//!    volume matches the request volume.
//!
//! 2. **Upstream traffic**: checksum mode answers a large request with a
//!    single byte, so load generators can push bulk data one way and still
//!    verify it arrived intact.

pub mod handler;
pub mod mode;

pub use handler::{handle_connection, BUFFER_CAPACITY};
