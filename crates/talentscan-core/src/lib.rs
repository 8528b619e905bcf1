//! # talentscan-core
//!
//! Scan orchestration for talentscan.
//!
//! This crate provides:
//! - [`ScanSession`]: starts a server-side mailbox scan, polls its progress
//!   and reconciles the candidate records it added
//! - [`CandidateRepository`]: read access to saved candidates, newest first
//! - [`ApiClient`]: HTTP implementation of the scan and candidate endpoints
//! - [`ClientConfig`]: persisted client settings

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod api;
pub mod candidates;
pub mod config;
mod error;
pub mod scan;

pub use api::ApiClient;
pub use candidates::{Candidate, CandidateId, CandidateQuery, CandidateRepository};
pub use config::{ClientConfig, SessionBackendKind};
pub use error::{Error, Result};
pub use scan::{
    ScanApi, ScanFailure, ScanHandle, ScanNotice, ScanProgress, ScanReport, ScanRequest,
    ScanSession, ScanSnapshot, ScanState, ScanStatus, ScanTimings,
};
