use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use road_reports_report_models::{
    Coordinates, LOCATION_DESCRIPTION_KEY, MarkerHandle, RawReport, Report, ReportCategory,
    RowHandle,
};
use road_reports_settings::SettingsError;
use road_reports_settings::store::{KeyValueStore, MemoryStore};
use road_reports_source::SourceError;
use road_reports_source::coordinator::ReportFeed;

use crate::Notice;
use crate::host::MapHost;
use crate::registry::VisibilitySummary;

pub fn raw(id: &str, location: &str) -> RawReport {
    let mut properties = serde_json::Map::new();
    properties.insert(
        LOCATION_DESCRIPTION_KEY.to_string(),
        serde_json::Value::String(location.to_string()),
    );
    RawReport {
        id: id.to_string(),
        category: ReportCategory::Incident,
        coordinates: Some(Coordinates::new(-77.0, 38.0)),
        properties,
    }
}

pub fn report(id: &str, location: &str, archived: bool) -> Report {
    let mut report = Report::from_raw(raw(id, location), None).unwrap();
    report.archived = archived;
    report
}

/// Reports "1".."=n" with distinct locations sorting in id order.
pub fn numbered(n: u32) -> Vec<Report> {
    (1..=n)
        .map(|i| report(&i.to_string(), &format!("Location {i:02}"), false))
        .collect()
}

#[derive(Debug, Default)]
pub struct RecordingHost {
    pub(crate) next_handle: u64,
    pub clears: usize,
    pub markers: HashMap<MarkerHandle, String>,
    pub rows: Vec<(RowHandle, String)>,
    pub hidden_markers: HashSet<MarkerHandle>,
    pub hidden_rows: HashSet<RowHandle>,
    pub archived_markers: HashSet<MarkerHandle>,
    pub archived_rows: HashSet<RowHandle>,
    pub expanded: HashSet<MarkerHandle>,
    pub highlighted: HashSet<RowHandle>,
    pub centered: Vec<Coordinates>,
    pub zoom: u32,
    pub layer_visible: Option<bool>,
    pub counts: Vec<VisibilitySummary>,
    pub notices: Vec<Notice>,
}

impl RecordingHost {
    pub fn expanded_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.expanded.iter().map(|m| self.markers[m].as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn highlighted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .rows
            .iter()
            .filter(|(row, _)| self.highlighted.contains(row))
            .map(|(_, id)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn row_order(&self) -> Vec<&str> {
        self.rows.iter().map(|(_, id)| id.as_str()).collect()
    }

    pub fn visible_row_ids(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|(row, _)| !self.hidden_rows.contains(row))
            .map(|(_, id)| id.as_str())
            .collect()
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl MapHost for RecordingHost {
    fn clear(&mut self) {
        self.clears += 1;
        self.markers.clear();
        self.rows.clear();
        self.hidden_markers.clear();
        self.hidden_rows.clear();
        self.archived_markers.clear();
        self.archived_rows.clear();
        assert!(self.expanded.is_empty(), "cleared while a popover was open");
        assert!(self.highlighted.is_empty(), "cleared while a row was highlighted");
    }

    fn add_marker(&mut self, report: &Report) -> MarkerHandle {
        let handle = MarkerHandle(self.handle());
        self.markers.insert(handle, report.id.clone());
        handle
    }

    fn add_row(&mut self, report: &Report) -> RowHandle {
        let handle = RowHandle(self.handle());
        self.rows.push((handle, report.id.clone()));
        handle
    }

    fn set_marker_visible(&mut self, marker: MarkerHandle, visible: bool) {
        if visible {
            self.hidden_markers.remove(&marker);
        } else {
            self.hidden_markers.insert(marker);
        }
    }

    fn set_marker_archived(&mut self, marker: MarkerHandle, archived: bool) {
        if archived {
            self.archived_markers.insert(marker);
        } else {
            self.archived_markers.remove(&marker);
        }
    }

    fn set_row_visible(&mut self, row: RowHandle, visible: bool) {
        if visible {
            self.hidden_rows.remove(&row);
        } else {
            self.hidden_rows.insert(row);
        }
    }

    fn set_row_archived(&mut self, row: RowHandle, archived: bool) {
        if archived {
            self.archived_rows.insert(row);
        } else {
            self.archived_rows.remove(&row);
        }
    }

    fn set_row_highlighted(&mut self, row: RowHandle, highlighted: bool) {
        if highlighted {
            assert!(self.highlighted.is_empty(), "two rows highlighted");
            self.highlighted.insert(row);
        } else {
            self.highlighted.remove(&row);
        }
    }

    fn set_popover_expanded(&mut self, marker: MarkerHandle, expanded: bool) {
        assert!(self.markers.contains_key(&marker), "stale marker handle");
        if expanded {
            assert!(self.expanded.is_empty(), "two popovers expanded");
            self.expanded.insert(marker);
        } else {
            self.expanded.remove(&marker);
        }
    }

    fn zoom(&self) -> u32 {
        self.zoom
    }

    fn center_on(&mut self, coordinates: Coordinates) {
        self.centered.push(coordinates);
    }

    fn set_layer_visible(&mut self, visible: bool) {
        self.layer_visible = Some(visible);
    }

    fn show_count(&mut self, summary: VisibilitySummary) {
        self.counts.push(summary);
    }

    fn notify(&mut self, notice: &Notice) {
        self.notices.push(notice.clone());
    }
}

/// Memory store that counts writes.
#[derive(Debug, Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub writes: AtomicUsize,
}

impl CountingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for CountingStore {
    fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }
}

/// Store whose every operation fails.
#[derive(Debug, Default)]
pub struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, SettingsError> {
        Err(SettingsError::Io(std::io::Error::other("storage unavailable")))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), SettingsError> {
        Err(SettingsError::Io(std::io::Error::other("storage unavailable")))
    }
}

/// Feed answering from canned bodies. Categories without a body fail.
#[derive(Debug, Default)]
pub struct StaticFeed {
    pub bodies: HashMap<ReportCategory, String>,
    pub details: String,
}

impl StaticFeed {
    pub fn with(mut self, category: ReportCategory, ids: &[u32]) -> Self {
        let features: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "geometry": {"type": "Point", "coordinates": [-77.4, 37.5]},
                    "properties": {"location_description": format!("Location {id:02}")}
                })
            })
            .collect();
        self.bodies.insert(
            category,
            format!("cb({})", serde_json::json!({"features": features})),
        );
        for id in ids {
            self.details.push_str(&format!("<div>Detail {id}</div>"));
        }
        self
    }
}

#[async_trait]
impl ReportFeed for StaticFeed {
    async fn fetch_category(&self, category: ReportCategory) -> Result<String, SourceError> {
        self.bodies
            .get(&category)
            .cloned()
            .ok_or_else(|| SourceError::Io(std::io::Error::other("connection reset")))
    }

    async fn fetch_details(&self, _ids: &[String]) -> Result<String, SourceError> {
        Ok(self.details.clone())
    }
}
