//! Test helpers shared by unit tests, integration tests and benchmarks.
//!
//! Compiled for `cfg(test)` and behind the `test-util` feature so the
//! integration tests under `tests/` can drive a shipper without a network.

pub mod http_server;
mod scripted_transport;
mod shared_buf;

pub use http_server::CapturedRequest;
pub use scripted_transport::{ScriptedTransport, SentBatch};
pub use shared_buf::SharedBuf;
