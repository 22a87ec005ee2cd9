//! Document seam and tolerant field extraction.
//!
//! The site's markup is the protocol, but markup-selection mechanics are an
//! external collaborator: the core only ever sees the [`Document`] trait.
//! A caller plugs in an HTML engine by implementing [`MarkupParser`];
//! the test suite plugs in map-backed fakes.

use crate::error::{Result, SimError};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A parsed page. Selection always takes the first match.
pub trait Document: Send + Sync {
    /// Evaluates a selector and returns the first matching text value,
    /// untrimmed, or `None` when the selector matches nothing.
    fn select_first(&self, selector: &str) -> Option<String>;

    /// Evaluates a selector and returns every matching node as a
    /// sub-document (used for table-row iteration).
    fn select_nodes(&self, selector: &str) -> Vec<Box<dyn Document>>;
}

/// Turns a fetched response body into a [`Document`].
pub trait MarkupParser: Send + Sync {
    /// Parses a body. Must be tolerant of malformed markup; selection on
    /// the result simply yields no matches for anything unrecoverable.
    fn parse(&self, body: &str) -> Box<dyn Document>;
}

/// How a single field is located, and whether its absence is fatal.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Selector evaluated against the document.
    pub selector: &'static str,
    /// Required fields raise [`SimError::ExtractionIncomplete`] when the
    /// selector yields zero matches; optional fields resolve to `None`.
    pub required: bool,
}

impl FieldSpec {
    /// An optional field: absence degrades to `None` with a warning.
    #[must_use]
    pub const fn optional(selector: &'static str) -> Self {
        Self {
            selector,
            required: false,
        }
    }

    /// A required field: absence aborts extraction.
    #[must_use]
    pub const fn required(selector: &'static str) -> Self {
        Self {
            selector,
            required: true,
        }
    }
}

/// Extracts a field set from a document.
///
/// Each value is trimmed of surrounding whitespace. No further coercion is
/// performed here; decimal parsing, percentage stripping and the like are
/// the caller's job (see [`clean_decimal`] / [`clean_integer`]).
///
/// # Errors
/// Returns [`SimError::ExtractionIncomplete`] naming the first required
/// field whose selector yields zero matches.
pub fn extract(
    doc: &dyn Document,
    fields: &[(&'static str, FieldSpec)],
) -> Result<HashMap<&'static str, Option<String>>> {
    let mut out = HashMap::with_capacity(fields.len());
    for (name, spec) in fields {
        match doc.select_first(spec.selector) {
            Some(raw) => {
                out.insert(*name, Some(raw.trim().to_string()));
            }
            None if spec.required => {
                return Err(SimError::extraction_incomplete(*name));
            }
            None => {
                tracing::warn!(field = *name, "field absent from document");
                out.insert(*name, None);
            }
        }
    }
    Ok(out)
}

/// Coerces a scraped money/number string (`"$1,234.56"`, `"12.5%"`,
/// `"(NYSE)"`-free) into a `Decimal`. Returns `None` for anything that
/// does not parse, including the site's `"n/a"` placeholder.
#[must_use]
pub fn clean_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%' | '+'))
        .collect();
    cleaned.parse().ok()
}

/// Coerces a scraped integer string (`"1,000"`) into an `i64`.
#[must_use]
pub fn clean_integer(raw: &str) -> Option<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse().ok()
}
