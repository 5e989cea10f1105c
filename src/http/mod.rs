//! JSON front-end for the exchange plus a typed client for it. The server exposes every exchange
//! operation over HTTP so non-Rust clients can trade against a running market; the client wraps
//! the same routes for Rust callers and round-trips the exact types the server returns.
pub mod bourse_v1;
