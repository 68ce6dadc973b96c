//! In-memory collection of the current cycle's reports.

use std::fmt;

use road_reports_report_models::Report;

use crate::sort::SortOrder;

/// Count of visible reports out of the registry total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilitySummary {
    /// Reports not hidden by the archive filter.
    pub visible: usize,
    /// All reports in the registry.
    pub total: usize,
}

impl fmt::Display for VisibilitySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} reports", self.visible, self.total)
    }
}

/// Returns `true` if `report` is shown under the given filter.
#[must_use]
pub const fn is_visible(report: &Report, hide_archived: bool) -> bool {
    !(report.archived && hide_archived)
}

/// The authoritative set of reports for the current fetch cycle.
///
/// Ids are expected to be unique. If a cycle delivers duplicates, both
/// are kept and [`Registry::get`] resolves to the later one.
#[derive(Debug, Default)]
pub struct Registry {
    reports: Vec<Report>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every report, returning the previous set.
    pub fn replace(&mut self, reports: Vec<Report>) -> Vec<Report> {
        std::mem::replace(&mut self.reports, reports)
    }

    /// Number of reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// `true` if there are no reports.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Reports in their current (sorted) order.
    #[must_use]
    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Iterates over every report.
    pub fn iter(&self) -> std::slice::Iter<'_, Report> {
        self.reports.iter()
    }

    /// Mutable access to every report.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Report> {
        self.reports.iter_mut()
    }

    /// Iterates over the reports shown under the given filter.
    pub fn visible(&self, hide_archived: bool) -> impl Iterator<Item = &Report> {
        self.reports
            .iter()
            .filter(move |report| is_visible(report, hide_archived))
    }

    /// Looks up a report by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Report> {
        self.reports.iter().rev().find(|report| report.id == id)
    }

    /// Looks up a report by id for mutation.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Report> {
        self.reports.iter_mut().rev().find(|report| report.id == id)
    }

    /// Counts visible reports under the given filter.
    #[must_use]
    pub fn summary(&self, hide_archived: bool) -> VisibilitySummary {
        VisibilitySummary {
            visible: self.visible(hide_archived).count(),
            total: self.reports.len(),
        }
    }

    /// Sorts the reports in place. Ties keep their current relative order.
    pub fn sort(&mut self, order: &SortOrder) {
        order.sort(&mut self.reports);
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a Report;
    type IntoIter = std::slice::Iter<'a, Report>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
