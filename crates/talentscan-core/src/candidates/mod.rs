//! Saved candidate records.

mod model;
mod repository;

pub use model::{Candidate, CandidateId, CandidateQuery};
pub use repository::{CandidateRepository, most_recent_first};
