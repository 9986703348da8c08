//! Property-based tests for realtime-link.
//!
//! Run with: cargo test --test property_tests

pub mod backoff;
