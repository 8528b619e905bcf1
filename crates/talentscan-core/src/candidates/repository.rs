//! Candidate retrieval contract.

use std::cmp::Reverse;

use async_trait::async_trait;

use super::model::{Candidate, CandidateQuery};
use crate::Result;

/// Read access to saved candidate records.
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    /// Returns at most `limit` records, most recently created first.
    ///
    /// # Errors
    ///
    /// Returns an error if the records could not be fetched.
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Candidate>>;

    /// Returns records matching `query`, in server order.
    ///
    /// # Errors
    ///
    /// Returns an error if the records could not be fetched.
    async fn search(&self, query: &CandidateQuery) -> Result<Vec<Candidate>>;
}

/// Orders records newest first.
///
/// The sort is stable: records with equal or missing timestamps keep their
/// relative order, and undated records follow all dated ones.
#[must_use]
pub fn most_recent_first(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by_cached_key(|c| Reverse(c.created_at_time()));
    candidates
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn candidate(name: &str, created_at: Option<&str>) -> Candidate {
        Candidate {
            name: Some(name.into()),
            created_at: created_at.map(str::to_string),
            ..Candidate::default()
        }
    }

    fn names(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(Candidate::display_name).collect()
    }

    #[test]
    fn test_newest_first_with_undated_last() {
        let sorted = most_recent_first(vec![
            candidate("undated-a", None),
            candidate("old", Some("2024-01-01T00:00:00")),
            candidate("new", Some("2024-03-01T00:00:00Z")),
            candidate("undated-b", Some("not a date")),
            candidate("mid", Some("2024-02-01T00:00:00")),
        ]);
        assert_eq!(
            names(&sorted),
            vec!["new", "mid", "old", "undated-a", "undated-b"]
        );
    }

    #[test]
    fn test_ties_keep_server_order() {
        let sorted = most_recent_first(vec![
            candidate("first", Some("2024-01-01T00:00:00")),
            candidate("second", Some("2024-01-01T00:00:00")),
        ]);
        assert_eq!(names(&sorted), vec!["first", "second"]);
    }
}
