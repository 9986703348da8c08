//! Test organization:
//! - panics.rs: a panicking listener never stops delivery
//! - listener_set.rs: ordering, removal and snapshot semantics

mod panics;
