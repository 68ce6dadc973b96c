//! Detail fragment extraction and positional correlation.
//!
//! The details endpoint answers one request per cycle with an HTML blob
//! holding a `<div>...</div>` fragment per requested id, in request order.
//! Fragment `i` belongs to raw report `i`. The blob carries no ids, so the
//! correlation is positional only.

use std::sync::LazyLock;

use regex::Regex;
use road_reports_report_models::{RawReport, Report};

/// One detail fragment. Case-insensitive, does not span lines.
static FRAGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<div>(.*?)</div>").unwrap_or_else(|_| unreachable!()));

/// Extracts every fragment body from a details response, in order.
#[must_use]
pub fn extract_fragments(blob: &str) -> Vec<String> {
    FRAGMENT_RE
        .captures_iter(blob)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Result of merging raw reports with their detail fragments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Reports with geometry, in accumulator order.
    pub reports: Vec<Report>,
    /// Raw reports dropped for lacking geometry.
    pub dropped_without_geometry: usize,
    /// Kept reports that received no fragment.
    pub missing_detail: usize,
}

/// Attaches fragment `i` to raw report `i` and drops reports without
/// geometry.
///
/// A short or empty fragment list leaves the trailing reports without
/// detail. Extra fragments are ignored. Neither case is an error.
#[must_use]
pub fn merge(raw_reports: Vec<RawReport>, fragments: Vec<String>) -> MergeOutcome {
    if fragments.len() != raw_reports.len() {
        log::warn!(
            "Detail fragment count ({}) differs from report count ({}); \
             unmatched reports will have no detail",
            fragments.len(),
            raw_reports.len(),
        );
    }

    let mut outcome = MergeOutcome::default();
    let mut fragments = fragments.into_iter();

    for raw in raw_reports {
        let detail = fragments.next();
        match Report::from_raw(raw, detail) {
            Some(report) => {
                if report.detail_html.is_none() {
                    outcome.missing_detail += 1;
                }
                outcome.reports.push(report);
            }
            None => outcome.dropped_without_geometry += 1,
        }
    }

    log::debug!(
        "Merged {} reports ({} without geometry dropped, {} without detail)",
        outcome.reports.len(),
        outcome.dropped_without_geometry,
        outcome.missing_detail,
    );
    outcome
}
