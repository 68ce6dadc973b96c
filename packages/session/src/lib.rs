#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Runtime state of a road reports session.
//!
//! A [`Session`] owns everything that used to be ambient: the loaded
//! [`Settings`], the [`Registry`] of the current fetch cycle, the active
//! [`SortOrder`], and the [`SelectionController`]. It renders into a
//! [`MapHost`] and writes settings back after every mutating action.
//!
//! Every action that mutates or rebuilds reports collapses the selection
//! first, so the host never holds an open popover on a marker that is
//! about to be replaced.

pub mod archive;
pub mod host;
pub mod registry;
pub mod selection;
pub mod sort;

#[cfg(test)]
pub(crate) mod test_support;

use std::fmt;
use std::sync::Arc;

use road_reports_report_models::{Report, ReportCategory};
use road_reports_settings::Settings;
use road_reports_settings::store::KeyValueStore;
use road_reports_source::coordinator::{FetchCoordinator, FetchCycle, FetchFailure};
use road_reports_source::progress::ProgressCallback;

use crate::host::MapHost;
use crate::registry::{Registry, VisibilitySummary, is_visible};
use crate::selection::{SelectionController, SelectionEvent, Transition};
use crate::sort::{SortKeyError, SortOrder};

/// Errors returned by session actions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No report with this id is in the registry.
    #[error("Unknown report: {id}")]
    UnknownReport {
        /// The id that was looked up.
        id: String,
    },

    /// The report is archived and the archive filter hides it.
    #[error("Report {id} is archived and hidden")]
    HiddenReport {
        /// The hidden report's id.
        id: String,
    },

    /// A sort key could not be parsed.
    #[error(transparent)]
    SortKey(#[from] SortKeyError),
}

/// Non-fatal messages surfaced to the user through [`MapHost::notify`].
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Stored settings could not be read; defaults are in use.
    SettingsUnavailable {
        /// Underlying error.
        message: String,
    },
    /// Settings could not be written; changes last for this session only.
    SettingsNotSaved {
        /// Underlying error.
        message: String,
    },
    /// A category feed contributed no reports.
    CategoryFailed {
        /// The category.
        category: ReportCategory,
        /// Why it failed.
        failure: FetchFailure,
    },
    /// Report details could not be fetched.
    DetailsFailed {
        /// Why it failed.
        failure: FetchFailure,
    },
    /// A manual refresh finished.
    Refreshed(VisibilitySummary),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SettingsUnavailable { message } => {
                write!(f, "Saved settings could not be loaded, using defaults ({message})")
            }
            Self::SettingsNotSaved { message } => {
                write!(f, "Settings could not be saved ({message})")
            }
            Self::CategoryFailed { category, failure } => {
                write!(f, "{} reports unavailable: {failure}", category.title())
            }
            Self::DetailsFailed { failure } => {
                write!(f, "Report details unavailable: {failure}")
            }
            Self::Refreshed(summary) => write!(f, "Reports refreshed ({summary})"),
        }
    }
}

/// One user's session against one report feed.
pub struct Session<H: MapHost> {
    host: H,
    store: Arc<dyn KeyValueStore>,
    settings_key: String,
    version: String,
    new_version: bool,
    settings: Settings,
    registry: Registry,
    sort_order: SortOrder,
    selection: SelectionController,
}

impl<H: MapHost> Session<H> {
    /// Loads settings from `store` and prepares an empty session.
    ///
    /// A missing record yields default settings. An unreadable record also
    /// yields defaults, with a [`Notice::SettingsUnavailable`].
    pub fn open(
        mut host: H,
        store: Arc<dyn KeyValueStore>,
        settings_key: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let settings_key = settings_key.into();
        let version = version.into();

        let settings = match Settings::load(store.as_ref(), &settings_key) {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(e) => {
                log::warn!("Failed to load settings, using defaults: {e}");
                host.notify(&Notice::SettingsUnavailable {
                    message: e.to_string(),
                });
                Settings::default()
            }
        };
        let new_version = settings.is_new_version(&version);
        host.set_layer_visible(settings.layer_visible);
        let selection = SelectionController::with_zoom(host.zoom());

        Self {
            host,
            store,
            settings_key,
            version,
            new_version,
            settings,
            registry: Registry::new(),
            sort_order: SortOrder::default(),
            selection,
        }
    }

    /// Replaces the default sort order.
    #[must_use]
    pub fn with_sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = order;
        self
    }

    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    pub const fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn sort_order(&self) -> &SortOrder {
        &self.sort_order
    }

    /// Id of the report whose popover is expanded.
    #[must_use]
    pub fn pinned(&self) -> Option<&str> {
        self.selection.pinned()
    }

    /// `true` if the stored settings were last saved by another version.
    #[must_use]
    pub const fn is_new_version(&self) -> bool {
        self.new_version
    }

    /// Reports shown under the current archive filter, in display order.
    pub fn visible_reports(&self) -> impl Iterator<Item = &Report> {
        self.registry.visible(self.settings.hide_archived)
    }

    /// Visible-of-total count under the current filter.
    #[must_use]
    pub fn summary(&self) -> VisibilitySummary {
        self.registry.summary(self.settings.hide_archived)
    }

    /// Runs one fetch cycle and installs its reports.
    #[allow(clippy::future_not_send)]
    pub async fn load(
        &mut self,
        coordinator: &FetchCoordinator,
        progress: Arc<dyn ProgressCallback>,
    ) -> VisibilitySummary {
        let cycle = coordinator.run(progress).await;
        self.apply_cycle(cycle)
    }

    /// Like [`Session::load`], then posts [`Notice::Refreshed`].
    #[allow(clippy::future_not_send)]
    pub async fn refresh(
        &mut self,
        coordinator: &FetchCoordinator,
        progress: Arc<dyn ProgressCallback>,
    ) -> VisibilitySummary {
        self.collapse_all();
        let summary = self.load(coordinator, progress).await;
        self.host.notify(&Notice::Refreshed(summary));
        summary
    }

    /// Posts notices for the failures of `cycle`, then installs its reports.
    pub fn apply_cycle(&mut self, cycle: FetchCycle) -> VisibilitySummary {
        for (category, failure) in cycle.failed_categories {
            self.host
                .notify(&Notice::CategoryFailed { category, failure });
        }
        if let Some(failure) = cycle.details_failure {
            self.host.notify(&Notice::DetailsFailed { failure });
        }
        self.replace_reports(cycle.reports)
    }

    /// Discards the current reports and installs `reports`: reconciles
    /// archive state, sorts, and renders markers and rows.
    pub fn replace_reports(&mut self, reports: Vec<Report>) -> VisibilitySummary {
        self.collapse_all();
        self.registry.replace(reports);
        archive::reconcile(self.registry.iter_mut(), &self.settings);
        self.registry.sort(&self.sort_order);
        self.render();
        log::info!("Showing {}", self.summary());
        self.summary()
    }

    /// Replaces the sort order and re-renders the table.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SortKey`] if any key fails to parse. The
    /// current order is kept in that case.
    pub fn set_sort_keys<I, S>(&mut self, keys: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let order = SortOrder::parse(keys)?;
        self.apply_sort(order);
        Ok(())
    }

    /// Makes `key` the primary sort key, flipping its direction if it
    /// already was.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SortKey`] if `key` fails to parse.
    pub fn sort_by_column(&mut self, key: &str) -> Result<(), SessionError> {
        let mut order = self.sort_order.clone();
        order.promote(key.parse()?);
        self.apply_sort(order);
        Ok(())
    }

    fn apply_sort(&mut self, order: SortOrder) {
        self.collapse_all();
        self.sort_order = order;
        self.registry.sort(&self.sort_order);
        self.render();
    }

    /// Expands the popover of `id`, or collapses it if it is already
    /// expanded. Returns the id pinned afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownReport`] if `id` is not loaded and
    /// [`SessionError::HiddenReport`] if the archive filter hides it.
    pub fn toggle_selection(&mut self, id: &str) -> Result<Option<&str>, SessionError> {
        let report = self.require(id)?;
        if !is_visible(report, self.settings.hide_archived) && self.pinned() != Some(id) {
            return Err(SessionError::HiddenReport { id: id.to_string() });
        }
        self.dispatch(SelectionEvent::Toggle(id.to_string()));
        Ok(self.selection.pinned())
    }

    /// The host map moved to `zoom`.
    pub fn on_map_moved(&mut self, zoom: u32) {
        self.dispatch(SelectionEvent::MapMoved { zoom });
    }

    /// The host switched editing mode.
    pub fn on_mode_changed(&mut self) {
        self.dispatch(SelectionEvent::ModeChanged);
    }

    /// Collapses any expanded popover.
    pub fn collapse_all(&mut self) {
        self.dispatch(SelectionEvent::CollapseAll);
    }

    /// Archives or un-archives one report and persists.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownReport`] if `id` is not loaded.
    pub fn set_archived(&mut self, id: &str, archived: bool) -> Result<(), SessionError> {
        self.require(id)?;
        self.collapse_all();

        let hide = self.settings.hide_archived;
        let Some(report) = self.registry.get_mut(id) else {
            return Err(SessionError::UnknownReport { id: id.to_string() });
        };
        if archive::set_archived(report, &mut self.settings, archived) {
            log::info!(
                "{} report {id}",
                if archived { "Archived" } else { "Un-archived" }
            );
        }
        show_state(&mut self.host, report, hide);

        self.persist();
        self.host.show_count(self.summary());
        Ok(())
    }

    /// Flips the archive state of one report. Returns the new state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownReport`] if `id` is not loaded.
    pub fn toggle_archived(&mut self, id: &str) -> Result<bool, SessionError> {
        let archived = !self.require(id)?.archived;
        self.set_archived(id, archived)?;
        Ok(archived)
    }

    /// Archives every loaded report, persisting once. Returns how many
    /// changed.
    pub fn archive_all(&mut self) -> usize {
        self.set_all_archived(true)
    }

    /// Un-archives every loaded report, persisting once. Returns how many
    /// changed.
    pub fn unarchive_all(&mut self) -> usize {
        self.set_all_archived(false)
    }

    fn set_all_archived(&mut self, archived: bool) -> usize {
        self.collapse_all();
        let changed =
            archive::set_all_archived(self.registry.iter_mut(), &mut self.settings, archived);
        log::info!(
            "{} {changed} reports",
            if archived { "Archived" } else { "Un-archived" }
        );
        self.refresh_visibility();
        self.persist();
        changed
    }

    /// Shows or hides archived reports and persists.
    pub fn set_hide_archived(&mut self, hide: bool) {
        self.collapse_all();
        self.settings.hide_archived = hide;
        self.refresh_visibility();
        self.persist();
    }

    /// Shows or hides the report layer and persists.
    pub fn set_layer_visible(&mut self, visible: bool) {
        self.settings.layer_visible = visible;
        self.host.set_layer_visible(visible);
        self.persist();
    }

    /// Records the region label shown in prompts and persists.
    pub fn set_region(&mut self, region: impl Into<String>) {
        self.settings.state = Some(region.into());
        self.persist();
    }

    /// Writes the settings, stamped with the running version.
    ///
    /// A failed write is logged and surfaced as
    /// [`Notice::SettingsNotSaved`]; in-memory state is kept either way.
    /// Returns `true` if the write succeeded.
    pub fn persist(&mut self) -> bool {
        self.settings.last_version = Some(self.version.clone());
        match self.settings.save(self.store.as_ref(), &self.settings_key) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to save settings: {e}");
                self.host.notify(&Notice::SettingsNotSaved {
                    message: e.to_string(),
                });
                false
            }
        }
    }

    /// Collapses the selection, persists, and returns the host.
    pub fn shutdown(mut self) -> H {
        self.collapse_all();
        self.persist();
        self.host
    }

    fn require(&self, id: &str) -> Result<&Report, SessionError> {
        self.registry
            .get(id)
            .ok_or_else(|| SessionError::UnknownReport { id: id.to_string() })
    }

    fn dispatch(&mut self, event: SelectionEvent) {
        self.selection.push(event);
        while let Some(transition) = self.selection.process_next() {
            self.apply_transition(&transition);
        }
    }

    fn apply_transition(&mut self, transition: &Transition) {
        if let Some(report) = transition.collapsed.as_deref().and_then(|id| self.registry.get(id)) {
            if let Some(marker) = report.marker {
                self.host.set_popover_expanded(marker, false);
            }
            if let Some(row) = report.row {
                self.host.set_row_highlighted(row, false);
            }
        }
        if let Some(report) = transition.expanded.as_deref().and_then(|id| self.registry.get(id)) {
            if let Some(marker) = report.marker {
                self.host.set_popover_expanded(marker, true);
            }
            if let Some(row) = report.row {
                self.host.set_row_highlighted(row, true);
            }
            self.host.center_on(report.coordinates);
        }
    }

    fn render(&mut self) {
        self.host.clear();
        let hide = self.settings.hide_archived;
        for report in self.registry.iter_mut() {
            report.marker = Some(self.host.add_marker(report));
            report.row = Some(self.host.add_row(report));
            show_state(&mut self.host, report, hide);
        }
        self.host.show_count(self.registry.summary(hide));
    }

    fn refresh_visibility(&mut self) {
        let hide = self.settings.hide_archived;
        for report in self.registry.iter() {
            show_state(&mut self.host, report, hide);
        }
        self.host.show_count(self.registry.summary(hide));
    }
}

/// Pushes a report's archive and visibility state to its marker and row.
fn show_state<H: MapHost>(host: &mut H, report: &Report, hide_archived: bool) {
    let visible = is_visible(report, hide_archived);
    if let Some(marker) = report.marker {
        host.set_marker_archived(marker, report.archived);
        host.set_marker_visible(marker, visible);
    }
    if let Some(row) = report.row {
        host.set_row_archived(row, report.archived);
        host.set_row_visible(row, visible);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use road_reports_report_models::ReportCategory::{
        Construction, HighImpactIncident, Incident, WeatherClosure,
    };
    use road_reports_settings::store::MemoryStore;
    use road_reports_source::progress::null_progress;

    use super::*;
    use crate::test_support::{
        BrokenStore, CountingStore, RecordingHost, StaticFeed, numbered, report,
    };

    const KEY: &str = "va_dot_report_settings";

    fn session_with(store: Arc<dyn KeyValueStore>) -> Session<RecordingHost> {
        Session::open(RecordingHost::default(), store, KEY, "1.0.0")
    }

    fn session() -> Session<RecordingHost> {
        session_with(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn open_without_record_uses_defaults() {
        let session = session();
        assert!(session.settings().layer_visible);
        assert!(session.settings().hide_archived);
        assert!(session.settings().archive.is_empty());
        assert!(session.is_new_version());
        assert_eq!(session.host().layer_visible, Some(true));
        assert!(session.host().notices.is_empty());
    }

    #[test]
    fn open_with_unreadable_store_falls_back_with_notice() {
        let session = session_with(Arc::new(BrokenStore));
        assert_eq!(session.settings(), &Settings::default());
        assert!(matches!(
            session.host().notices.as_slice(),
            [Notice::SettingsUnavailable { .. }]
        ));
    }

    #[test]
    fn stored_archive_entry_hides_report_five() {
        let store = MemoryStore::new();
        store
            .set(
                KEY,
                r#"{"lastVersion":"1.0.0","layerVisible":true,"hideArchivedReports":true,
                    "archivedReports":{"5":{"updateNumber":"5"}}}"#,
            )
            .unwrap();
        let mut session = session_with(Arc::new(store));
        assert!(!session.is_new_version());

        let summary = session.replace_reports(numbered(8));

        for report in session.registry() {
            assert_eq!(report.archived, report.id == "5");
        }
        assert_eq!(summary, VisibilitySummary { visible: 7, total: 8 });
        assert!(!session.visible_reports().any(|r| r.id == "5"));
        assert!(!session.host().visible_row_ids().contains(&"5"));
        assert_eq!(session.host().visible_row_ids().len(), 7);
        assert_eq!(session.host().counts.last(), Some(&summary));
    }

    #[test]
    fn archive_survives_reload() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut first = session_with(Arc::clone(&store));
        first.replace_reports(numbered(3));
        first.set_archived("2", true).unwrap();
        drop(first.shutdown());

        let mut second = session_with(store);
        assert!(!second.is_new_version());
        second.replace_reports(numbered(3));
        assert!(second.registry().get("2").unwrap().archived);
        assert!(!second.registry().get("1").unwrap().archived);
    }

    #[test]
    fn reports_are_rendered_in_sort_order() {
        let mut session = session();
        let mut reports = numbered(3);
        reports.reverse();
        session.replace_reports(reports);
        assert_eq!(session.host().row_order(), vec!["1", "2", "3"]);

        session.set_sort_keys(["-properties.location_description"]).unwrap();
        assert_eq!(session.host().row_order(), vec!["3", "2", "1"]);

        session.sort_by_column("properties.location_description").unwrap();
        assert_eq!(session.host().row_order(), vec!["1", "2", "3"]);
    }

    #[test]
    fn bad_sort_key_keeps_current_order() {
        let mut session = session();
        session.replace_reports(numbered(2));
        assert!(matches!(
            session.set_sort_keys(["nope"]),
            Err(SessionError::SortKey(SortKeyError::UnknownField(_)))
        ));
        assert_eq!(session.sort_order(), &SortOrder::default());
    }

    #[test]
    fn at_most_one_report_is_pinned() {
        let mut session = session();
        session.replace_reports(numbered(3));

        assert_eq!(session.toggle_selection("1").unwrap(), Some("1"));
        assert_eq!(session.host().expanded_ids(), vec!["1"]);
        assert_eq!(session.host().highlighted_ids(), vec!["1"]);

        assert_eq!(session.toggle_selection("2").unwrap(), Some("2"));
        assert_eq!(session.host().expanded_ids(), vec!["2"]);
        assert_eq!(session.host().highlighted_ids(), vec!["2"]);
        assert_eq!(session.host().centered.len(), 2);

        assert_eq!(session.toggle_selection("2").unwrap(), None);
        assert!(session.host().expanded_ids().is_empty());
        assert!(session.host().highlighted_ids().is_empty());
    }

    #[test]
    fn toggling_an_unknown_report_fails() {
        let mut session = session();
        session.replace_reports(numbered(1));
        assert!(matches!(
            session.toggle_selection("42"),
            Err(SessionError::UnknownReport { id }) if id == "42"
        ));
        assert!(session.set_archived("42", true).is_err());
    }

    #[test]
    fn hidden_report_cannot_be_selected() {
        let mut session = session();
        session.replace_reports(numbered(2));
        session.set_archived("1", true).unwrap();

        assert!(matches!(
            session.toggle_selection("1"),
            Err(SessionError::HiddenReport { id }) if id == "1"
        ));
        assert_eq!(session.pinned(), None);
        assert!(session.host().expanded_ids().is_empty());
        assert!(session.host().centered.is_empty());

        session.set_hide_archived(false);
        assert_eq!(session.toggle_selection("1").unwrap(), Some("1"));
    }

    #[test]
    fn first_zoom_change_after_open_collapses() {
        let host = RecordingHost {
            zoom: 12,
            ..RecordingHost::default()
        };
        let mut session = Session::open(host, Arc::new(MemoryStore::new()), KEY, "1.0.0");
        session.replace_reports(numbered(2));
        session.toggle_selection("1").unwrap();

        session.on_map_moved(12);
        assert_eq!(session.pinned(), Some("1"));

        session.on_map_moved(14);
        assert_eq!(session.pinned(), None);
        assert!(session.host().expanded_ids().is_empty());
        assert!(session.host().highlighted_ids().is_empty());
    }

    #[test]
    fn malformed_archive_entry_is_kept_across_persist() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(KEY, r#"{"archivedReports":{"5":{},"7":{"updateNumber":"7"}}}"#)
            .unwrap();
        let mut session = session_with(store.clone());
        assert!(session.host().notices.is_empty());
        session.set_layer_visible(true);

        session.replace_reports(numbered(8));
        assert!(session.registry().get("5").unwrap().archived);
        assert!(session.registry().get("7").unwrap().archived);

        let stored: serde_json::Value =
            serde_json::from_str(&store.get(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(
            stored["archivedReports"],
            serde_json::json!({"5": {"updateNumber": "5"}, "7": {"updateNumber": "7"}})
        );
    }

    #[test]
    fn archiving_collapses_and_persists() {
        let store = Arc::new(CountingStore::default());
        let mut session = session_with(store.clone());
        session.replace_reports(numbered(3));
        session.toggle_selection("1").unwrap();

        assert!(session.toggle_archived("1").unwrap());

        assert_eq!(session.pinned(), None);
        assert!(session.host().expanded_ids().is_empty());
        assert_eq!(store.writes(), 1);
        assert!(session.settings().is_archived("1"));
        assert_eq!(session.summary(), VisibilitySummary { visible: 2, total: 3 });
        assert_eq!(session.host().archived_markers.len(), 1);

        assert!(!session.toggle_archived("1").unwrap());
        assert!(!session.settings().is_archived("1"));
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn bulk_actions_persist_once() {
        let store = Arc::new(CountingStore::default());
        let mut session = session_with(store.clone());
        session.replace_reports(numbered(4));
        session.toggle_selection("3").unwrap();

        assert_eq!(session.archive_all(), 4);
        assert_eq!(store.writes(), 1);
        assert_eq!(session.pinned(), None);
        assert_eq!(session.summary(), VisibilitySummary { visible: 0, total: 4 });
        for report in session.registry() {
            assert_eq!(report.archived, session.settings().is_archived(&report.id));
        }

        assert_eq!(session.unarchive_all(), 4);
        assert_eq!(store.writes(), 2);
        assert!(session.settings().archive.is_empty());
        assert_eq!(session.host().visible_row_ids().len(), 4);
    }

    #[test]
    fn save_failure_keeps_in_memory_state() {
        let mut session = session_with(Arc::new(BrokenStore));
        session.replace_reports(numbered(2));

        session.set_archived("1", true).unwrap();

        assert!(session.registry().get("1").unwrap().archived);
        assert!(session.settings().is_archived("1"));
        assert!(
            session
                .host()
                .notices
                .iter()
                .any(|n| matches!(n, Notice::SettingsNotSaved { .. }))
        );
    }

    #[test]
    fn hide_archived_filter_toggles_visibility() {
        let mut session = session();
        session.replace_reports(vec![report("1", "a", false), report("2", "b", false)]);
        session.set_archived("1", true).unwrap();
        assert_eq!(session.host().visible_row_ids(), vec!["2"]);

        session.set_hide_archived(false);
        assert_eq!(session.host().visible_row_ids(), vec!["1", "2"]);
        assert_eq!(session.summary(), VisibilitySummary { visible: 2, total: 2 });
        assert!(!session.settings().hide_archived);
    }

    #[test]
    fn zoom_change_collapses_but_pan_does_not() {
        let mut session = session();
        session.replace_reports(numbered(2));
        session.on_map_moved(12);
        session.toggle_selection("1").unwrap();

        session.on_map_moved(12);
        assert_eq!(session.pinned(), Some("1"));

        session.on_map_moved(13);
        assert_eq!(session.pinned(), None);
        assert!(session.host().expanded_ids().is_empty());
    }

    #[test]
    fn mode_change_collapses() {
        let mut session = session();
        session.replace_reports(numbered(2));
        session.toggle_selection("2").unwrap();
        session.on_mode_changed();
        assert_eq!(session.pinned(), None);
    }

    #[test]
    fn rebuild_collapses_before_clearing() {
        let mut session = session();
        session.replace_reports(numbered(2));
        session.toggle_selection("1").unwrap();

        session.replace_reports(numbered(3));

        assert_eq!(session.pinned(), None);
        assert_eq!(session.host().clears, 2);
        assert_eq!(session.registry().len(), 3);
    }

    #[test]
    fn layer_visibility_persists() {
        let store = Arc::new(CountingStore::default());
        let mut session = session_with(store.clone());
        session.set_layer_visible(false);
        assert_eq!(session.host().layer_visible, Some(false));
        assert_eq!(store.writes(), 1);

        let reopened = session_with(store);
        assert!(!reopened.settings().layer_visible);
        assert_eq!(reopened.host().layer_visible, Some(false));
    }

    #[test]
    fn shutdown_stamps_running_version() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = session_with(Arc::clone(&store));
        session.shutdown();

        let stored = Settings::load(store.as_ref(), KEY).unwrap().unwrap();
        assert_eq!(stored.last_version.as_deref(), Some("1.0.0"));
    }

    #[tokio::test]
    async fn refresh_runs_a_cycle_and_reports_failures() {
        let feed = StaticFeed::default()
            .with(WeatherClosure, &[1, 2])
            .with(Incident, &[3, 4])
            .with(HighImpactIncident, &[7, 8]);
        let coordinator = FetchCoordinator::new(Arc::new(feed), ReportCategory::ALL.to_vec())
            .with_timeouts(Duration::from_secs(5), Duration::from_secs(5));
        let mut session = session();

        let summary = session.refresh(&coordinator, null_progress()).await;

        assert_eq!(summary, VisibilitySummary { visible: 6, total: 6 });
        assert_eq!(session.registry().get("3").unwrap().detail_html.as_deref(), Some("Detail 3"));
        let notices = &session.host().notices;
        assert!(matches!(
            notices.first(),
            Some(Notice::CategoryFailed { category: Construction, .. })
        ));
        assert_eq!(notices.last(), Some(&Notice::Refreshed(summary)));
        assert_eq!(notices.last().unwrap().to_string(), "Reports refreshed (6 of 6 reports)");
    }
}
