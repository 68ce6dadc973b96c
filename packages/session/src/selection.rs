//! Single-selection state for report popovers.
//!
//! The controller is a two-state machine fed by a queue of
//! [`SelectionEvent`]s. Each processed event yields one [`Transition`]
//! carrying both the report to collapse and the report to expand, so the
//! host applies a switch between reports as one step.

use std::collections::VecDeque;

/// Current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionState {
    /// No popover expanded.
    #[default]
    Idle,
    /// The report with this id has its popover expanded and row highlighted.
    Pinned(String),
}

/// Inbound events driving the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    /// The user clicked a report's marker or row.
    Toggle(String),
    /// Anything that is about to mutate or rebuild reports.
    CollapseAll,
    /// The host map moved. Only a zoom change collapses.
    MapMoved {
        /// Zoom level after the move.
        zoom: u32,
    },
    /// The host switched editing mode.
    ModeChanged,
}

/// Effect of one processed event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// Report whose popover closes and row unhighlights.
    pub collapsed: Option<String>,
    /// Report whose popover opens, row highlights, and map centers on.
    pub expanded: Option<String>,
}

impl Transition {
    /// `true` if the transition changes nothing.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.collapsed.is_none() && self.expanded.is_none()
    }
}

/// Enforces that at most one report is pinned.
#[derive(Debug, Default)]
pub struct SelectionController {
    state: SelectionState,
    queue: VecDeque<SelectionEvent>,
    last_zoom: Option<u32>,
}

impl SelectionController {
    /// Creates an idle controller with no known zoom level. The first
    /// [`SelectionEvent::MapMoved`] then only records the zoom.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an idle controller seeded with the map's current zoom, so
    /// the first zoom change already collapses.
    #[must_use]
    pub fn with_zoom(zoom: u32) -> Self {
        Self {
            last_zoom: Some(zoom),
            ..Self::default()
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Id of the pinned report, if any.
    #[must_use]
    pub fn pinned(&self) -> Option<&str> {
        match &self.state {
            SelectionState::Idle => None,
            SelectionState::Pinned(id) => Some(id),
        }
    }

    /// Queues an event for processing.
    pub fn push(&mut self, event: SelectionEvent) {
        self.queue.push_back(event);
    }

    /// Processes the oldest queued event. Returns `None` once the queue is
    /// empty.
    pub fn process_next(&mut self) -> Option<Transition> {
        let event = self.queue.pop_front()?;
        Some(self.apply(event))
    }

    fn apply(&mut self, event: SelectionEvent) -> Transition {
        match event {
            SelectionEvent::Toggle(id) => match std::mem::take(&mut self.state) {
                SelectionState::Idle => {
                    self.state = SelectionState::Pinned(id.clone());
                    Transition {
                        collapsed: None,
                        expanded: Some(id),
                    }
                }
                SelectionState::Pinned(current) if current == id => Transition {
                    collapsed: Some(current),
                    expanded: None,
                },
                SelectionState::Pinned(current) => {
                    self.state = SelectionState::Pinned(id.clone());
                    Transition {
                        collapsed: Some(current),
                        expanded: Some(id),
                    }
                }
            },
            SelectionEvent::CollapseAll | SelectionEvent::ModeChanged => self.collapse(),
            SelectionEvent::MapMoved { zoom } => {
                let zoom_changed = self.last_zoom.is_some_and(|last| last != zoom);
                self.last_zoom = Some(zoom);
                if zoom_changed {
                    self.collapse()
                } else {
                    Transition::default()
                }
            }
        }
    }

    fn collapse(&mut self) -> Transition {
        match std::mem::take(&mut self.state) {
            SelectionState::Idle => Transition::default(),
            SelectionState::Pinned(id) => Transition {
                collapsed: Some(id),
                expanded: None,
            },
        }
    }
}
