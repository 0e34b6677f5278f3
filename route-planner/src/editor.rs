//! Dragging a path with the secondary mouse button pulls a section of it through a new point.
//! On release, both halves of the detour are routed along real ways and spliced into the path.

use std::rc::Rc;

use log::{debug, info, warn};

use route_planner_model::{Coordinate, Waypoint};

use crate::path_index::PathIndex;
use crate::store::RouteStore;
use crate::Result;

/// `MouseEvent.buttons` while only the secondary (right) button is held
pub const DRAG_BUTTONS: u16 = 2;

#[derive(Clone, PartialEq, Debug)]
pub struct DragState {
    /// The path point the drag started from
    pub anchor: Waypoint,
    pub bracket_before: Option<Waypoint>,
    pub bracket_after: Option<Waypoint>,
    pub preview_point: Option<Coordinate>,
}

#[derive(Clone, PartialEq, Debug)]
enum Mode {
    Idle,
    Dragging(DragState),
}

pub struct RouteEditor {
    store: Rc<RouteStore>,
    mode: Mode,
}

impl RouteEditor {
    pub fn new(store: Rc<RouteStore>) -> RouteEditor {
        RouteEditor {
            store,
            mode: Mode::Idle,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.mode, Mode::Dragging(_))
    }

    pub fn drag_state(&self) -> Option<&DragState> {
        match self.mode {
            Mode::Idle => None,
            Mode::Dragging(ref state) => Some(state),
        }
    }

    /// Returns true if the event belongs to a drag, so the map shouldn't pan.
    pub fn on_pointer_drag(&mut self, pt: Coordinate, buttons: u16) -> bool {
        if buttons != DRAG_BUTTONS {
            return false;
        }

        match self.mode {
            Mode::Idle => {
                let Some(anchor) = self.store.nearest_path_point(pt) else {
                    return false;
                };
                debug!("Start dragging the path at {:?}", anchor.coordinate());
                self.mode = Mode::Dragging(DragState {
                    anchor,
                    bracket_before: None,
                    bracket_after: None,
                    preview_point: None,
                });
                true
            }
            Mode::Dragging(ref mut state) => {
                let snap_distance = self.store.config().snap_distance;
                let dist = state.anchor.dist_to(pt);
                if dist <= snap_distance {
                    state.bracket_before = None;
                    state.bracket_after = None;
                    state.preview_point = None;
                    return true;
                }

                let indexed = self.store.indexed_path();
                let (before, after) = find_brackets(&indexed.path, &state.anchor, dist / 1_000.0);
                state.preview_point = (before.is_some() && after.is_some()).then_some(pt);
                state.bracket_before = before;
                state.bracket_after = after;
                true
            }
        }
    }

    /// Ends the gesture. Returns true if the path was re-routed. Routing failures are logged and
    /// otherwise ignored, leaving the path as it was.
    pub async fn on_pointer_up(&mut self) -> bool {
        match self.release() {
            Some(detour) => detour.apply(&self.store).await,
            None => false,
        }
    }

    /// Ends the gesture without waiting on the network, handing back the prepared detour if
    /// there is one.
    pub fn release(&mut self) -> Option<Detour> {
        let Mode::Dragging(state) = std::mem::replace(&mut self.mode, Mode::Idle) else {
            return None;
        };
        match (state.bracket_before, state.preview_point, state.bracket_after) {
            (Some(before), Some(pointer), Some(after)) => Some(Detour {
                before,
                pointer,
                after,
            }),
            _ => {
                debug!("Drag ended without a detour");
                None
            }
        }
    }

    /// `before → pointer → after`, while a detour is prepared
    pub fn preview(&self) -> Option<[Coordinate; 3]> {
        let state = self.drag_state()?;
        Some([
            state.bracket_before.as_ref()?.coordinate(),
            state.preview_point?,
            state.bracket_after.as_ref()?.coordinate(),
        ])
    }
}

/// A re-route prepared by a finished drag
#[derive(Clone, PartialEq, Debug)]
pub struct Detour {
    pub before: Waypoint,
    pub pointer: Coordinate,
    pub after: Waypoint,
}

impl Detour {
    pub async fn apply(self, store: &RouteStore) -> bool {
        let path = match self.route(store).await {
            Ok(path) => path,
            Err(err) => {
                warn!("Couldn't re-route dragged path: {err}");
                return false;
            }
        };
        info!("Re-routed path through {:?}", self.pointer);
        if let Err(err) = store.adopt_path(path).await {
            warn!("Re-routed path adopted, but the walk time table failed: {err}");
        }
        true
    }

    async fn route(&self, store: &RouteStore) -> Result<Vec<Waypoint>> {
        let leading = store
            .route_between(self.before.coordinate(), self.pointer)
            .await?;
        let trailing = store
            .route_between(self.pointer, self.after.coordinate())
            .await?;
        let path = store.path().current_value();
        Ok(splice_detour(
            &path,
            &self.before,
            leading,
            trailing,
            &self.after,
            store.config().reroute_tolerance,
        ))
    }
}

/// The path points around `anchor` that are at least `distance` km away from it along the path,
/// the closest such point on either side
pub fn find_brackets(
    path: &[Waypoint],
    anchor: &Waypoint,
    distance: f64,
) -> (Option<Waypoint>, Option<Waypoint>) {
    let before = path
        .iter()
        .rev()
        .find(|waypt| anchor.accumulated_distance - waypt.accumulated_distance >= distance);
    let after = path
        .iter()
        .find(|waypt| waypt.accumulated_distance - anchor.accumulated_distance >= distance);
    (before.cloned(), after.cloned())
}

/// Replaces everything strictly between `before` and `after` with the two routed shapes. Parts
/// of the shapes running along the existing path are trimmed off first. Distances aren't
/// recalculated here.
pub fn splice_detour(
    path: &[Waypoint],
    before: &Waypoint,
    mut leading: Vec<Coordinate>,
    mut trailing: Vec<Coordinate>,
    after: &Waypoint,
    tolerance: f64,
) -> Vec<Waypoint> {
    let index = PathIndex::new(path);

    // The leading shape starts on the path, the trailing shape ends on it
    let first_new = leading
        .iter()
        .position(|pt| !index.covers(*pt, tolerance))
        .unwrap_or(leading.len());
    leading.drain(..first_new);
    leading.insert(0, before.coordinate());

    let last_new = trailing
        .iter()
        .rposition(|pt| !index.covers(*pt, tolerance))
        .map_or(0, |idx| idx + 1);
    trailing.truncate(last_new);
    trailing.push(after.coordinate());

    let inserted: Vec<Coordinate> = leading.into_iter().chain(trailing).collect();
    let last = inserted.len().saturating_sub(1).max(1) as f64;
    let detour = inserted.into_iter().enumerate().map(|(idx, pt)| {
        // Elevation is unknown until the backend sees the path; interpolate meanwhile
        let h = before.h + (after.h - before.h) * idx as f64 / last;
        Waypoint::new(pt, h, before.accumulated_distance)
    });

    let mut result: Vec<Waypoint> = path
        .iter()
        .filter(|waypt| waypt.accumulated_distance <= before.accumulated_distance)
        .cloned()
        .collect();
    result.extend(detour);
    result.extend(
        path.iter()
            .filter(|waypt| waypt.accumulated_distance >= after.accumulated_distance)
            .cloned(),
    );
    result.dedup_by(|b, a| a.same_position(b.coordinate()));
    result
}

#[cfg(test)]
mod tests {
    use route_planner_model::{is_monotonic, recompute_accumulated_distances};

    use super::*;

    fn line() -> Vec<Waypoint> {
        let mut path: Vec<Waypoint> = (0..=10)
            .map(|i| Waypoint::new(Coordinate::new(i as f64 * 100.0, 500.0), 600.0, 0.0))
            .collect();
        recompute_accumulated_distances(&mut path);
        path
    }

    #[test]
    fn brackets_are_the_closest_far_enough_points() {
        let path = line();
        let anchor = path[5].clone();

        let (before, after) = find_brackets(&path, &anchor, 0.15);
        assert_eq!(before.unwrap().x, 300.0);
        assert_eq!(after.unwrap().x, 700.0);

        // Too close to the start
        let (before, after) = find_brackets(&path, &path[1], 0.15);
        assert!(before.is_none());
        assert_eq!(after.unwrap().x, 300.0);
    }

    #[test]
    fn splice_trims_overlap_and_dedups() {
        let path = line();
        let before = path[3].clone();
        let after = path[7].clone();
        let leading = vec![
            Coordinate::new(300.0, 500.0),
            Coordinate::new(310.0, 505.0),
            Coordinate::new(400.0, 600.0),
            Coordinate::new(500.0, 700.0),
        ];
        let trailing = vec![
            Coordinate::new(500.0, 700.0),
            Coordinate::new(600.0, 600.0),
            Coordinate::new(690.0, 510.0),
            Coordinate::new(700.0, 500.0),
        ];
        let mut result = splice_detour(&path, &before, leading, trailing, &after, 20.0);

        let xy: Vec<(f64, f64)> = result.iter().map(|w| (w.x, w.y)).collect();
        assert_eq!(
            xy,
            vec![
                (0.0, 500.0),
                (100.0, 500.0),
                (200.0, 500.0),
                (300.0, 500.0),
                (400.0, 600.0),
                (500.0, 700.0),
                (600.0, 600.0),
                (700.0, 500.0),
                (800.0, 500.0),
                (900.0, 500.0),
                (1000.0, 500.0),
            ]
        );
        assert!(result.iter().all(|w| w.h == 600.0));

        recompute_accumulated_distances(&mut result);
        assert!(is_monotonic(&result));
    }
}
