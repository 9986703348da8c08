//! Test organization:
//! - lifecycle.rs: connect, disconnect, emit and single-flight connects
//! - reconnect.rs: backoff schedule, attempt cap and fatal errors
//! - heartbeat.rs: liveness probes and forced reconnects
//! - subscriptions.rs: scoped listeners, leases and idle teardown
//! - typed.rs: typed server and client messages

mod heartbeat;
mod lifecycle;
