//! Integration tests for fxrack
//!
//! The tests live in `rack_integration.rs` and drive the rack through its
//! public API only.
