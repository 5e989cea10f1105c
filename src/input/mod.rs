//! Inputs describe the state of the market before the first order arrives: the stocks that can
//! be traded and the traders allowed to trade them. The exchange bootstraps itself from an input
//! and never touches it again, so inputs carry no behaviour beyond construction and loading.
//!
//! Datasets can be loaded from disk, generated randomly for tests and benchmarks, or built up
//! by hand through the `add_*` methods.
pub mod demeter;
