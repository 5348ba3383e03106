//! # Domain Services
//!
//! Business rules that span several entities and need no I/O.
//!
//! - **CandidateFilter**: discovery filtering (exclusions, gender, age, distance) and ranking

mod candidate_filter;

pub use candidate_filter::*;
