use serde::{Deserialize, Serialize};

use crate::geometry::RawPoint;

use super::InputEvent;

/// A finalized selection, still in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewportSelection {
    Point(RawPoint),
    #[serde(rename_all = "camelCase")]
    Region {
        top_left: RawPoint,
        bottom_right: RawPoint,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionMode {
    Point,
    Region,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionState {
    Idle,
    PointArmed,
    RegionArmed {
        first_corner: Option<RawPoint>,
        /// Last pointer position after the first corner was fixed; drawing
        /// feedback only, never part of the selection.
        live_corner: Option<RawPoint>,
    },
    Finalized(ViewportSelection),
    Closed,
}

impl SelectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SelectionState::Finalized(_) | SelectionState::Closed)
    }
}

/// What a single input did to the machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Ignored,
    Armed,
    ModeChanged(SelectionMode),
    CornerFixed(RawPoint),
    PreviewMoved(RawPoint),
    /// Second region corner was not below and to the right of the first.
    Rejected,
    Finalized(ViewportSelection),
    Closed,
}

/// Point/region selection over the screenshot overlay.
///
/// Owns a single state value; [`SelectionMachine::handle`] is the only way it
/// changes. Holding the modifier switches to region mode, releasing it drops
/// back to point mode and abandons any half-drawn region. Regions are drawn
/// top-left to bottom-right only.
#[derive(Debug, Clone)]
pub struct SelectionMachine {
    state: SelectionState,
}

impl Default for SelectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self {
            state: SelectionState::Idle,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn mode(&self) -> Option<SelectionMode> {
        match self.state {
            SelectionState::PointArmed => Some(SelectionMode::Point),
            SelectionState::RegionArmed { .. } => Some(SelectionMode::Region),
            _ => None,
        }
    }

    pub fn overlay_visible(&self) -> bool {
        matches!(
            self.state,
            SelectionState::PointArmed | SelectionState::RegionArmed { .. }
        )
    }

    /// Corners of the box to draw while a region is being dragged.
    pub fn preview_box(&self) -> Option<(RawPoint, RawPoint)> {
        match self.state {
            SelectionState::RegionArmed {
                first_corner: Some(first),
                live_corner: Some(live),
            } => Some((first, live)),
            _ => None,
        }
    }

    pub fn finalized(&self) -> Option<ViewportSelection> {
        match self.state {
            SelectionState::Finalized(selection) => Some(selection),
            _ => None,
        }
    }

    /// Leave `Idle` once the screenshot is available.
    pub fn arm(&mut self) -> Transition {
        if self.state != SelectionState::Idle {
            return Transition::Ignored;
        }
        self.state = SelectionState::PointArmed;
        Transition::Armed
    }

    pub fn handle(&mut self, event: InputEvent) -> Transition {
        let (next, transition) = step(self.state, event);
        self.state = next;
        transition
    }
}

fn step(state: SelectionState, event: InputEvent) -> (SelectionState, Transition) {
    use SelectionState::*;

    match (state, event) {
        (Closed, _) => (state, Transition::Ignored),
        (Finalized(_), InputEvent::CloseRequested) => (Closed, Transition::Closed),
        (Finalized(_), _) => (state, Transition::Ignored),
        (_, InputEvent::Escape | InputEvent::CloseRequested) => (Closed, Transition::Closed),
        (Idle, _) => (state, Transition::Ignored),

        (PointArmed, InputEvent::ModifierDown) => (
            RegionArmed {
                first_corner: None,
                live_corner: None,
            },
            Transition::ModeChanged(SelectionMode::Region),
        ),
        (PointArmed, InputEvent::Click(point)) => {
            let selection = ViewportSelection::Point(point);
            (Finalized(selection), Transition::Finalized(selection))
        }
        (PointArmed, _) => (state, Transition::Ignored),

        (RegionArmed { .. }, InputEvent::ModifierUp) => (
            PointArmed,
            Transition::ModeChanged(SelectionMode::Point),
        ),
        (
            RegionArmed {
                first_corner: None, ..
            },
            InputEvent::Click(point),
        ) => (
            RegionArmed {
                first_corner: Some(point),
                live_corner: None,
            },
            Transition::CornerFixed(point),
        ),
        (
            RegionArmed {
                first_corner: Some(first),
                ..
            },
            InputEvent::Click(point),
        ) => {
            if point.viewport_x > first.viewport_x && point.viewport_y > first.viewport_y {
                let selection = ViewportSelection::Region {
                    top_left: first,
                    bottom_right: point,
                };
                (Finalized(selection), Transition::Finalized(selection))
            } else {
                (state, Transition::Rejected)
            }
        }
        (
            RegionArmed {
                first_corner: Some(first),
                ..
            },
            InputEvent::PointerMove(point),
        ) => (
            RegionArmed {
                first_corner: Some(first),
                live_corner: Some(point),
            },
            Transition::PreviewMoved(point),
        ),
        (RegionArmed { .. }, _) => (state, Transition::Ignored),
    }
}
