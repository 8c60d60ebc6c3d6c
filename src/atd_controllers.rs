// Controllers for the Amana transit dashboard
use crate::atd_config::{Command, DashboardConfig};
use crate::atd_dashboard::{ATDDashboard, DashboardSummary};
use crate::atd_map::{MapLayer, MapViewport};
use crate::atd_models::{ATDModels, Result, RouteId, RouteRecord};
use crate::atd_selection::{SelectionChange, SelectionState};
use crate::atd_views::ATDViews;
use chrono::Utc;
use log::info;
use std::io::{self, Write};

// ============================================================================
// Session State
// ============================================================================

/// One fetched snapshot plus the UI state derived from user interaction.
/// The top-level view owns it; children only read it.
#[derive(Debug, Clone)]
pub struct DashboardSession {
    pub routes: Vec<RouteRecord>,
    pub selection: SelectionState,
    pub viewport: MapViewport,
    config: DashboardConfig,
}

impl DashboardSession {
    pub fn load(config: DashboardConfig) -> Self {
        let routes = ATDModels::fetch_routes(&config);
        Self::from_routes(config, routes)
    }

    pub fn from_routes(config: DashboardConfig, routes: Vec<RouteRecord>) -> Self {
        Self {
            routes,
            selection: SelectionState::new(),
            viewport: MapViewport::initial(config.map, None),
            config,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Replaces the snapshot. Selection and viewport start over.
    pub fn replace_routes(&mut self, routes: Vec<RouteRecord>) {
        self.routes = routes;
        self.selection = SelectionState::new();
        self.viewport = MapViewport::initial(self.config.map, None);
    }

    pub fn reload(&mut self) {
        let routes = ATDModels::fetch_routes(&self.config);
        self.replace_routes(routes);
    }

    pub fn summary(&self) -> DashboardSummary {
        DashboardSummary::from_routes(&self.routes)
    }

    pub fn service_day(&self) -> String {
        ATDDashboard::service_day(Utc::now(), self.config.timezone)
    }

    pub fn selected_route(&self) -> Option<&RouteRecord> {
        self.selection.selected_route(&self.routes)
    }

    pub fn map_layer(&self) -> MapLayer {
        MapLayer::build(&self.routes, self.selection.selected())
    }

    /// Applies a selection and starts the map fly-to when it changed.
    /// Re-selecting the current route only brings its popup back.
    pub fn select(&mut self, id: RouteId) -> SelectionChange {
        let change = self.selection.select(id, &self.routes);
        match change {
            SelectionChange::Changed { current, .. } => {
                if let Some(route) = self.routes.iter().find(|r| r.id == current) {
                    self.viewport.fly_to(route);
                }
            }
            SelectionChange::Unchanged => {
                if self.routes.iter().any(|r| r.id == id && r.position().is_some()) {
                    self.viewport.reopen_popup(id);
                }
            }
            SelectionChange::Ignored => {}
        }
        change
    }

    /// Matches a route number (case-insensitive) first, then a numeric id.
    pub fn find_route(&self, input: &str) -> Option<&RouteRecord> {
        let input = input.trim();
        self.routes
            .iter()
            .find(|r| r.route_number.eq_ignore_ascii_case(input))
            .or_else(|| {
                let id: RouteId = input.parse().ok()?;
                self.routes.iter().find(|r| r.id == id)
            })
    }

    pub fn suggestions(&self, input: &str) -> Vec<&RouteRecord> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.routes
            .iter()
            .filter(|r| {
                r.route_number.to_lowercase().contains(&needle) || r.name.to_lowercase().contains(&needle)
            })
            .take(5)
            .collect()
    }
}

// ============================================================================
// Controllers
// ============================================================================

pub struct ATDControllers;

impl ATDControllers {
    /// One-shot commands print and return.
    pub fn run_command(config: DashboardConfig, command: &Command) -> Result<()> {
        let session = DashboardSession::load(config);
        let summary = session.summary();

        match command {
            Command::Summary { json: true } => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Command::Summary { json: false } => {
                ATDViews::show_header(&summary, &session.service_day(), &session.routes);
                ATDViews::show_summary_figures(&summary);
            }
            Command::Routes => ATDViews::show_route_list(&session.routes, None),
            Command::Schedule => ATDViews::show_schedule(&ATDDashboard::schedule_rows(&session.routes)),
            Command::Map { geojson: true } => {
                println!("{}", serde_json::to_string_pretty(&session.map_layer().to_geojson())?);
            }
            Command::Map { geojson: false } => {
                ATDViews::show_map(&session.map_layer(), &session.viewport, &summary);
            }
            // The window is started from main; here both fall back to the menu
            Command::Menu | Command::Gui => Self::run(session),
        }
        Ok(())
    }

    /// Main application loop
    pub fn run(mut session: DashboardSession) {
        Self::show_welcome_screen();
        info!("Menu started against {}", session.config().feed_url);

        if session.routes.is_empty() {
            ATDViews::empty_feed_notice();
        } else {
            println!("\n✓ {} routes loaded", session.routes.len());
        }

        loop {
            ATDViews::show_menu(session.selected_route());

            let choice = Self::read_input();

            match choice.trim() {
                "1" => {
                    let summary = session.summary();
                    ATDViews::show_header(&summary, &session.service_day(), &session.routes);
                    ATDViews::show_summary_figures(&summary);
                    Self::pause();
                }
                "2" => {
                    ATDViews::show_map(&session.map_layer(), &session.viewport, &session.summary());
                    Self::pause();
                }
                "3" => {
                    ATDViews::show_route_list(&session.routes, session.selection.selected());
                    Self::pause();
                }
                "4" => {
                    ATDViews::show_schedule(&ATDDashboard::schedule_rows(&session.routes));
                    Self::pause();
                }
                "5" => {
                    Self::handle_route_selection(&mut session);
                    Self::pause();
                }
                "6" => {
                    ATDViews::show_loading("Reloading transit feed");
                    session.reload();
                    ATDViews::clear_loading();
                    info!("Reloaded feed: {} routes", session.routes.len());
                    if session.routes.is_empty() {
                        ATDViews::empty_feed_notice();
                    } else {
                        println!("✓ {} routes loaded, selection cleared", session.routes.len());
                    }
                    Self::pause();
                }
                "0" => {
                    ATDViews::goodbye_message();
                    break;
                }
                "" => {
                    // Just pressed Enter, show menu again
                }
                _ => {
                    println!("\n✗ Invalid option '{}'. Please select 0-6.", choice.trim());
                    Self::pause();
                }
            }
        }
    }

    fn show_welcome_screen() {
        println!("\n{}", "═".repeat(70));
        println!("  ╔═══════════════════════════════════════════════════════════╗");
        println!("  ║          🚌 AMANA TRANSIT - KUALA LUMPUR NETWORK          ║");
        println!("  ║               Real-Time Transit Dashboard                 ║");
        println!("  ╚═══════════════════════════════════════════════════════════╝");
        println!("{}", "═".repeat(70));
        println!("\n  📡 Features:");
        println!("     • Live bus positions, stops and route paths");
        println!("     • Active and maintenance route overview");
        println!("     • Next stop and arrival for every route");
        println!("     • Service status at a glance");
        println!("\n{}", "═".repeat(70));
    }

    fn handle_route_selection(session: &mut DashboardSession) {
        let input = ATDViews::prompt_route();

        if input.is_empty() {
            println!("\n⚠️  No input provided");
            return;
        }

        let Some(id) = session.find_route(&input).map(|r| r.id) else {
            ATDViews::invalid_route(&input);
            let suggestions = session.suggestions(&input);
            if !suggestions.is_empty() {
                ATDViews::show_route_suggestions(&suggestions);
            }
            return;
        };

        match session.select(id) {
            SelectionChange::Changed { .. } => {
                // No animation in the terminal: finish the flight right away.
                if let Some(event) = session.viewport.complete() {
                    session.viewport.on_animation_finished(event);
                }
                if let Some(route) = session.selected_route() {
                    ATDViews::show_route_selected(route);
                }
            }
            SelectionChange::Unchanged => {
                if let Some(route) = session.selected_route() {
                    ATDViews::route_already_selected(route);
                }
            }
            SelectionChange::Ignored => ATDViews::invalid_route(&input),
        }
    }

    /// Simple pause - wait for Enter key
    fn pause() {
        print!("\n📌 Press Enter to continue...");
        let _ = io::stdout().flush();
        let mut dummy = String::new();
        let _ = io::stdin().read_line(&mut dummy);
    }

    fn read_input() -> String {
        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            // EOF: behave like quit so piped input does not spin forever
            Ok(0) => "0".to_string(),
            Ok(_) => input,
            Err(e) => {
                eprintln!("⚠️  Error reading input: {}", e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atd_models::ATDModels;
    use serde_json::json;

    fn session() -> DashboardSession {
        let config = DashboardConfig::new("https://example.com/feed", "UTC", None).unwrap();
        let routes = ATDModels::routes_from_json(&json!({
            "bus_lines": [
                { "id": 1, "route_number": "B101", "name": "City Loop", "status": "Active",
                  "current_location": { "latitude": 3.15, "longitude": 101.70, "address": "KLCC" } },
                { "id": 5, "route_number": "B205", "name": "Airport Express", "status": "active",
                  "current_location": { "latitude": 2.75, "longitude": 101.71, "address": "KLIA" } },
                { "id": 9, "route_number": "M9", "name": "Depot Shuttle", "status": "Maintenance" }
            ]
        }))
        .unwrap();
        DashboardSession::from_routes(config, routes)
    }

    #[test]
    fn finds_routes_by_number_or_id() {
        let s = session();
        assert_eq!(s.find_route("b205").map(|r| r.id), Some(5));
        assert_eq!(s.find_route(" 9 ").map(|r| r.id), Some(9));
        assert!(s.find_route("X1").is_none());
    }

    #[test]
    fn suggestions_match_partial_names() {
        let s = session();
        let ids: Vec<_> = s.suggestions("express").iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5]);
        assert!(s.suggestions("  ").is_empty());
    }

    #[test]
    fn selecting_twice_does_not_restart_flight() {
        let mut s = session();
        assert!(matches!(s.select(5), SelectionChange::Changed { .. }));
        let event = s.viewport.complete().unwrap();
        s.viewport.on_animation_finished(event);
        let center = s.viewport.center();

        assert_eq!(s.select(5), SelectionChange::Unchanged);
        assert_eq!(s.selection.selected(), Some(5));
        assert!(!s.viewport.is_animating());
        assert_eq!(s.viewport.center(), center);
        assert_eq!(s.viewport.open_popup(), Some(5));
    }

    #[test]
    fn reselecting_brings_back_dismissed_popup() {
        let mut s = session();
        s.select(5);
        let event = s.viewport.complete().unwrap();
        s.viewport.on_animation_finished(event);
        s.viewport.close_popup();
        assert_eq!(s.viewport.open_popup(), None);

        assert_eq!(s.select(5), SelectionChange::Unchanged);
        assert_eq!(s.viewport.open_popup(), Some(5));
        assert!(!s.viewport.is_animating());
    }

    #[test]
    fn replacing_routes_resets_selection() {
        let mut s = session();
        s.select(1);
        s.replace_routes(Vec::new());
        assert_eq!(s.selection.selected(), None);
        assert!(!s.viewport.is_animating());
        assert_eq!(s.viewport.center(), s.config().map.center);
    }

    #[test]
    fn map_layer_follows_selection() {
        let mut s = session();
        s.select(1);
        let layer = s.map_layer();
        assert!(layer.bus(1).unwrap().selected);
        assert!(!layer.bus(5).unwrap().selected);
        assert!(layer.bus(9).is_none());
    }
}
