//! Integration test binary -- all integration tests consolidated into a single
//! binary to keep link times down.

// Allow unwrap/expect in test code
#![allow(clippy::unwrap_used, clippy::expect_used)]


mod automation_bridge;
mod config_file;
mod confirmation_timeout;
mod dispatch_flow;
mod session_locking;
