//! # What is Bourse?
//!
//! Bourse simulates a single-exchange securities market behind a JSON server. Traders hold cash
//! and share positions and submit plain limit orders against a continuous double-auction book.
//! An incoming order matches immediately against resting opposite-side orders at the resting
//! order's price, with price-time priority, and any remainder rests on the book. The library can
//! also be used directly for testing and for building scenarios within Rust.
//!
//! # Implementation
//!
//! A running exchange is composed of:
//! - A ledger, which owns trader records: cash, reserved funds, holdings, open orders and
//! transaction history. The ledger only provides per-trader mutation primitives, all execution
//! logic lives above it.
//! - A catalog, which owns stock records and, per stock, the order book. The book assigns order
//! ids from a per-stock insertion counter and those ids double as the time component of
//! price-time priority.
//! - An exchange implementation, [BourseV1](crate::exchange::bourse_v1::BourseV1), which binds
//! the two together: it validates submissions, walks the opposing book, settles each fill
//! against the ledger and keeps the exchange inventory account's standing quote in sync with
//! the reference price.
//! - An input, [Demeter](crate::input::demeter::Demeter), which parses the bootstrap catalog
//! that seeds stocks and traders (plus generators for tests and benches).
//! - A price feed applying a bounded random walk to reference prices on a timer.
//! - The server implementation returning JSON responses over the exchange impl, and a client
//! providing a Rust API for the server.
//!
//! Mutating operations serialize per symbol: each call holds that stock's entry in the catalog
//! for its whole duration, so traffic on different symbols runs in parallel while a single
//! symbol's book never interleaves. The periodic price tick goes through the same entry, so it
//! cannot race a trade on the symbol it is repricing.
//!
//! ``
//! cargo run --bin bourse_server_v1 [ipv4_address] [port] [dataset_path]
//! ``
//!
//! Without a dataset path the server starts from the built-in sample dataset.
pub mod catalog;
pub mod exchange;
pub mod feed;
pub mod http;
pub mod input;
pub mod ledger;
