//! Terminal rendering of a session.
//!
//! [`ConsoleHost`] keeps the marker and row state a map application would
//! hold, prints popovers and notices as they happen, and renders the report
//! table on demand.

use std::collections::HashMap;

use console::style;
use road_reports_report_models::{Coordinates, MarkerHandle, Report, RowHandle};
use road_reports_session::Notice;
use road_reports_session::host::MapHost;
use road_reports_session::registry::VisibilitySummary;
use road_reports_source::config::FeedConfig;

struct Marker {
    report: Report,
    icon_url: Option<String>,
    visible: bool,
}

struct Row {
    handle: RowHandle,
    id: String,
    title: &'static str,
    description: String,
    visible: bool,
    archived: bool,
    highlighted: bool,
}

/// [`MapHost`] that renders to the terminal.
pub struct ConsoleHost {
    config: FeedConfig,
    next_handle: u64,
    markers: HashMap<MarkerHandle, Marker>,
    rows: Vec<Row>,
    layer_visible: bool,
    summary: VisibilitySummary,
}

impl ConsoleHost {
    #[must_use]
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            next_handle: 0,
            markers: HashMap::new(),
            rows: Vec::new(),
            layer_visible: true,
            summary: VisibilitySummary {
                visible: 0,
                total: 0,
            },
        }
    }

    /// Latest visible-of-total count.
    #[must_use]
    pub const fn summary(&self) -> VisibilitySummary {
        self.summary
    }

    #[must_use]
    pub const fn layer_visible(&self) -> bool {
        self.layer_visible
    }

    /// Renders the report table in display order. Hidden rows are left
    /// out unless `include_hidden` is set.
    #[must_use]
    pub fn table(&self, include_hidden: bool) -> Vec<String> {
        let mut lines = vec![format!(
            "  {:<3} {:<22} {:<10} {}",
            "ARC", "TYPE", "ID", "DESCRIPTION"
        )];
        for row in self.rows.iter().filter(|row| include_hidden || row.visible) {
            let pointer = if row.highlighted { ">" } else { " " };
            let checkbox = if row.archived { "[x]" } else { "[ ]" };
            let line = format!(
                "{pointer} {checkbox} {:<22} {:<10} {}",
                row.title, row.id, row.description
            );
            lines.push(if row.archived {
                style(line).dim().to_string()
            } else if row.highlighted {
                style(line).bold().to_string()
            } else {
                line
            });
        }
        lines
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn row_mut(&mut self, handle: RowHandle) -> Option<&mut Row> {
        self.rows.iter_mut().find(|row| row.handle == handle)
    }
}

impl MapHost for ConsoleHost {
    fn clear(&mut self) {
        self.markers.clear();
        self.rows.clear();
    }

    fn add_marker(&mut self, report: &Report) -> MarkerHandle {
        let handle = MarkerHandle(self.handle());
        self.markers.insert(
            handle,
            Marker {
                report: report.clone(),
                icon_url: self.config.icon_url(report.category),
                visible: true,
            },
        );
        handle
    }

    fn add_row(&mut self, report: &Report) -> RowHandle {
        let handle = RowHandle(self.handle());
        self.rows.push(Row {
            handle,
            id: report.id.clone(),
            title: report.category.title(),
            description: report.location_description.clone(),
            visible: true,
            archived: report.archived,
            highlighted: false,
        });
        handle
    }

    fn set_marker_visible(&mut self, marker: MarkerHandle, visible: bool) {
        if let Some(marker) = self.markers.get_mut(&marker) {
            marker.visible = visible;
        }
    }

    fn set_marker_archived(&mut self, marker: MarkerHandle, archived: bool) {
        if let Some(marker) = self.markers.get_mut(&marker) {
            marker.report.archived = archived;
        }
    }

    fn set_row_visible(&mut self, row: RowHandle, visible: bool) {
        if let Some(row) = self.row_mut(row) {
            row.visible = visible;
        }
    }

    fn set_row_archived(&mut self, row: RowHandle, archived: bool) {
        if let Some(row) = self.row_mut(row) {
            row.archived = archived;
        }
    }

    fn set_row_highlighted(&mut self, row: RowHandle, highlighted: bool) {
        if let Some(row) = self.row_mut(row) {
            row.highlighted = highlighted;
        }
    }

    fn set_popover_expanded(&mut self, marker: MarkerHandle, expanded: bool) {
        let Some(marker) = self.markers.get(&marker) else {
            log::warn!("Popover requested for unknown marker {marker:?}");
            return;
        };
        if !expanded {
            log::debug!("Closed popover for report {}", marker.report.id);
            return;
        }
        println!();
        println!("{}", style(marker.report.category.title()).bold());
        if let Some(icon) = &marker.icon_url {
            println!("{}", style(icon).dim());
        }
        if !marker.visible {
            println!("{}", style("(hidden by the archive filter)").dim());
        }
        println!("{}", marker.report.popover_text());
        println!();
    }

    /// The terminal has no map view, so the zoom never changes.
    fn zoom(&self) -> u32 {
        0
    }

    fn center_on(&mut self, coordinates: Coordinates) {
        let (x, y) = coordinates.to_web_mercator();
        log::info!(
            "Centering map on {:.5}, {:.5} (EPSG:3857 {x:.1}, {y:.1})",
            coordinates.latitude,
            coordinates.longitude,
        );
    }

    fn set_layer_visible(&mut self, visible: bool) {
        self.layer_visible = visible;
        log::debug!("Report layer {}", if visible { "shown" } else { "hidden" });
    }

    fn show_count(&mut self, summary: VisibilitySummary) {
        self.summary = summary;
    }

    fn notify(&mut self, notice: &Notice) {
        match notice {
            Notice::Refreshed(_) => println!("{}", style(notice).cyan()),
            _ => println!("{}", style(notice).yellow()),
        }
    }
}
