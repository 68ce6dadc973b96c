//! The map application a session renders into.

use road_reports_report_models::{Coordinates, MarkerHandle, Report, RowHandle};

use crate::Notice;
use crate::registry::VisibilitySummary;

/// Rendering surface supplied by the host map application.
///
/// Handles returned by [`MapHost::add_marker`] and [`MapHost::add_row`]
/// stay valid until the next [`MapHost::clear`].
pub trait MapHost {
    /// Removes every marker and row.
    fn clear(&mut self);

    /// Draws a marker for `report`.
    fn add_marker(&mut self, report: &Report) -> MarkerHandle;

    /// Appends a table row for `report`. Rows are added in display order.
    fn add_row(&mut self, report: &Report) -> RowHandle;

    fn set_marker_visible(&mut self, marker: MarkerHandle, visible: bool);

    /// Dims or restores a marker to reflect archive state.
    fn set_marker_archived(&mut self, marker: MarkerHandle, archived: bool);

    fn set_row_visible(&mut self, row: RowHandle, visible: bool);

    /// Updates the archive checkbox of a row.
    fn set_row_archived(&mut self, row: RowHandle, archived: bool);

    fn set_row_highlighted(&mut self, row: RowHandle, highlighted: bool);

    /// Opens or closes the detail popover anchored on `marker`.
    fn set_popover_expanded(&mut self, marker: MarkerHandle, expanded: bool);

    /// Current zoom level of the map.
    fn zoom(&self) -> u32;

    /// Centers the map on `coordinates`.
    fn center_on(&mut self, coordinates: Coordinates);

    /// Shows or hides the whole report layer.
    fn set_layer_visible(&mut self, visible: bool);

    /// Updates the "visible of total" label.
    fn show_count(&mut self, summary: VisibilitySummary);

    /// Shows a transient, non-fatal message.
    fn notify(&mut self, notice: &Notice);
}
