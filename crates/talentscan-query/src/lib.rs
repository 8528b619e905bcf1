//! # talentscan-query
//!
//! Translates independent mailbox filter facets into a single provider
//! search expression (Gmail search syntax).
//!
//! ## Facets
//!
//! - **Keyword**: a preset subject expression or a custom subject phrase
//! - **Time range**: a relative age (`newer_than:7d`) or an explicit date window
//! - **Attachments**: one or more file kinds, OR-combined under `has:attachment`
//! - **Sources**: named job boards and/or a custom sender address, OR-combined
//! - **Statuses**: mailbox states, each one an independent (AND-ed) term
//!
//! ## Example
//!
//! ```
//! use talentscan_query::{AttachmentKind, FilterFacets, KeywordPreset, TimeRange, compile};
//!
//! let facets = FilterFacets::new()
//!     .with_keyword_preset(KeywordPreset::Job)
//!     .with_time_range(TimeRange::Last7Days)
//!     .with_attachment(AttachmentKind::Pdf);
//!
//! let query = compile(&facets);
//! assert!(query.as_str().contains("newer_than:7d"));
//! assert!(query.as_str().ends_with("has:attachment (filename:pdf)"));
//! ```
//!
//! Compilation is total and pure: it never fails, performs no I/O and yields
//! byte-identical output for identical selections. An empty selection
//! compiles to the empty string, meaning "no filter".

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod compile;
mod error;
pub mod facet;

pub use compile::{CompiledQuery, FRAGMENT_SEPARATOR, compile};
pub use error::{ParseFacetError, Result};
pub use facet::{
    AttachmentKind, FilterFacets, KeywordPreset, KeywordSelection, MailStatus, SourceBoard,
    TimeRange,
};
