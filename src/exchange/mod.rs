//! The exchange is the interface presented to clients. It binds the ledger and the catalog
//! together: submissions are validated against both, then the matching walk executes fills and
//! settles them trader by trader. The exchange holds the per-symbol catalog entry for the whole
//! call, so everything inside one submit, cancel or tick is serial with respect to that symbol
//! and parallel with respect to every other.
pub mod bourse_v1;
