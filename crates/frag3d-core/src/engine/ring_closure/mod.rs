//! Ring closure for assembled structures.
//!
//! Ring-closing attractors (`ATP`, `ATM`, `ATN` pseudo-atoms) mark where a ring
//! bond may form. For each candidate pairing of attractors the evaluator asks a
//! [`ConformationalSearch`](search::ConformationalSearch) for a geometry biased
//! towards closure, tests every pair for closability, bonds the closable ones and
//! finally saturates the remaining attractors. Candidates are returned ranked.
//!
//! - [`rca`] finds attractors and enumerates pairings
//! - [`closability`] judges the geometry of one prospective ring bond
//! - [`search`] is the external search boundary and its Tinker implementation
//! - [`saturation`] replaces attractors with dummies or capping atoms
//! - [`ranking`] orders evaluated candidates
//! - [`evaluator`] drives the whole process

pub mod closability;
pub mod evaluator;
pub mod ranking;
pub mod rca;
pub mod saturation;
pub mod search;

pub use evaluator::RingClosureEvaluator;
pub use ranking::Candidate;
pub use search::{ConformationalSearch, SearchRequest, TinkerSearch};
