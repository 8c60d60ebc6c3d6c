// Selected-route state shared by the map, route browser and schedule
use crate::atd_models::{RouteId, RouteRecord};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    NoSelection,
    Selected(RouteId),
}

/// Result of a selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Changed { previous: Option<RouteId>, current: RouteId },
    /// The id was already selected; nothing to do.
    Unchanged,
    /// The id is not part of the current snapshot.
    Ignored,
}

/// Owned by the top-level view. Children read `selected()` and hand requested
/// ids back to the owner, which applies them with `select`.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    current: Selection,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Selection {
        self.current
    }

    pub fn selected(&self) -> Option<RouteId> {
        match self.current {
            Selection::NoSelection => None,
            Selection::Selected(id) => Some(id),
        }
    }

    pub fn is_selected(&self, id: RouteId) -> bool {
        self.selected() == Some(id)
    }

    /// Re-selecting the current id is idempotent; there is no toggle-off.
    pub fn select(&mut self, id: RouteId, routes: &[RouteRecord]) -> SelectionChange {
        if !routes.iter().any(|r| r.id == id) {
            debug!("Ignoring selection of unknown route {}", id);
            return SelectionChange::Ignored;
        }
        if self.is_selected(id) {
            return SelectionChange::Unchanged;
        }
        let previous = self.selected();
        self.current = Selection::Selected(id);
        debug!("Route selection {:?} -> {}", previous, id);
        SelectionChange::Changed { previous, current: id }
    }

    pub fn selected_route<'a>(&self, routes: &'a [RouteRecord]) -> Option<&'a RouteRecord> {
        let id = self.selected()?;
        routes.iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atd_models::Passengers;

    fn routes(ids: &[RouteId]) -> Vec<RouteRecord> {
        ids.iter()
            .map(|&id| RouteRecord {
                id,
                name: format!("Route {}", id),
                route_number: id.to_string(),
                status: "active".to_string(),
                current_location: None,
                passengers: Passengers::default(),
                bus_stops: Vec::new(),
                incidents: Vec::new(),
                driver: None,
                vehicle_info: None,
            })
            .collect()
    }

    #[test]
    fn starts_without_selection() {
        let state = SelectionState::new();
        assert_eq!(state.current(), Selection::NoSelection);
        assert_eq!(state.selected(), None);
    }

    #[test]
    fn selecting_moves_to_selected() {
        let routes = routes(&[1, 5]);
        let mut state = SelectionState::new();
        assert_eq!(
            state.select(5, &routes),
            SelectionChange::Changed { previous: None, current: 5 }
        );
        assert_eq!(state.current(), Selection::Selected(5));
        assert_eq!(state.selected_route(&routes).map(|r| r.id), Some(5));
    }

    #[test]
    fn reselecting_same_id_is_idempotent() {
        let routes = routes(&[5]);
        let mut state = SelectionState::new();
        state.select(5, &routes);
        assert_eq!(state.select(5, &routes), SelectionChange::Unchanged);
        assert_eq!(state.selected(), Some(5));
    }

    #[test]
    fn switching_reports_previous() {
        let routes = routes(&[1, 2]);
        let mut state = SelectionState::new();
        state.select(1, &routes);
        assert_eq!(
            state.select(2, &routes),
            SelectionChange::Changed { previous: Some(1), current: 2 }
        );
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let routes = routes(&[1]);
        let mut state = SelectionState::new();
        state.select(1, &routes);
        assert_eq!(state.select(99, &routes), SelectionChange::Ignored);
        assert_eq!(state.selected(), Some(1));
    }
}
