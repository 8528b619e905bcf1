//! Facet → query compilation.

use std::fmt;

use crate::facet::{FilterFacets, KeywordSelection, TimeRange};

/// Separator placed between query fragments.
pub const FRAGMENT_SEPARATOR: &str = " ";

/// Provider date form for `after:`/`before:` terms.
const PROVIDER_DATE_FORMAT: &str = "%Y/%m/%d";

/// A compiled provider search expression.
///
/// Fragments always appear in facet order: keyword, time, attachment,
/// source, status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CompiledQuery(String);

impl CompiledQuery {
    /// Returns the query text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if no facet contributed a fragment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Query text for the scan request, `None` meaning "unfiltered".
    #[must_use]
    pub fn as_search_query(&self) -> Option<&str> {
        (!self.0.is_empty()).then_some(self.0.as_str())
    }

    /// Consumes the query, returning the text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CompiledQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compiles facet selections into a single provider query.
#[must_use]
pub fn compile(facets: &FilterFacets) -> CompiledQuery {
    let mut fragments: Vec<String> = Vec::new();

    fragments.extend(keyword_fragment(&facets.keyword));
    fragments.extend(time_fragments(&facets.time_range));
    fragments.extend(attachment_fragment(facets));
    fragments.extend(source_fragment(facets));
    fragments.extend(
        facets
            .statuses
            .iter()
            .map(|status| status.query().to_string()),
    );

    CompiledQuery(fragments.join(FRAGMENT_SEPARATOR))
}

fn keyword_fragment(keyword: &KeywordSelection) -> Option<String> {
    match keyword {
        KeywordSelection::None => None,
        KeywordSelection::Preset(preset) => Some(preset.query().to_string()),
        KeywordSelection::Custom(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| format!("subject:({text})"))
        }
    }
}

fn time_fragments(range: &TimeRange) -> Vec<String> {
    match range {
        TimeRange::Custom {
            from: Some(from),
            to,
        } => {
            let mut parts = vec![format!("after:{}", from.format(PROVIDER_DATE_FORMAT))];
            if let Some(to) = to {
                parts.push(format!("before:{}", to.format(PROVIDER_DATE_FORMAT)));
            }
            parts
        }
        other => other
            .preset_query()
            .map(str::to_string)
            .into_iter()
            .collect(),
    }
}

fn attachment_fragment(facets: &FilterFacets) -> Option<String> {
    if facets.attachments.is_empty() {
        return None;
    }
    let terms: Option<Vec<&str>> = facets.attachments.iter().map(|kind| kind.query()).collect();
    match terms {
        Some(terms) => Some(format!("has:attachment ({})", terms.join(" OR "))),
        // `any` widens the group to every filename
        None => Some("has:attachment".to_string()),
    }
}

fn source_fragment(facets: &FilterFacets) -> Option<String> {
    let mut terms: Vec<String> = facets
        .sources
        .iter()
        .map(|board| board.query().to_string())
        .collect();

    let address = facets.source_address.trim();
    if !address.is_empty() {
        terms.push(format!("from:{address}"));
    }

    (!terms.is_empty()).then(|| format!("({})", terms.join(" OR ")))
}
