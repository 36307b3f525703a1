//! Predicates for inspecting instances, history, and logs.
//!
//! ## Contents
//! - [`Filter`] optional half-open time window (`after <= t < before`)
//! - [`Query`] a filter composed with exact-match uuid/kind and bitmask
//!   state/level criteria
//!
//! Matching is structural per target type: a query carrying a level
//! criterion never matches a state record, and one carrying a state
//! criterion never matches a log record. An unset query matches everything.

mod filter;
#[allow(clippy::module_inception)]
mod query;

pub use filter::Filter;
pub use query::Query;
