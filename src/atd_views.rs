// Terminal views for the Amana transit dashboard
use crate::atd_dashboard::{ATDDashboard, DashboardSummary, RouteGroups, ScheduleRow, ServiceStatus, StatusBucket};
use crate::atd_map::{MapLayer, MapViewport};
use crate::atd_models::{RouteId, RouteRecord};
use std::io::{self, Write};

pub struct ATDViews;

impl ATDViews {
    /// Show main menu
    pub fn show_menu(selected: Option<&RouteRecord>) {
        println!("\n{}", "═".repeat(60));
        println!("     🚌 AMANA TRANSIT - REAL-TIME DASHBOARD");
        println!("{}", "═".repeat(60));
        println!("\n📋 MENU OPTIONS");
        println!("  1️⃣  Dashboard 📊");
        println!("  2️⃣  Live map 🗺️");
        println!("  3️⃣  Routes 🛣️");
        println!("  4️⃣  Schedule ⏰");
        println!("  5️⃣  Select a route");
        println!("  6️⃣  Reload feed 🔄");
        println!("  0️⃣  Quit application");
        match selected {
            Some(route) => println!("\n  ✓ Selected: Route {} - {}", route.route_number, route.name),
            None => println!("\n  ℹ️  No route selected"),
        }
        println!("\n{}", "─".repeat(60));
        print!("➜ Your choice: ");
        let _ = io::stdout().flush();
    }

    pub fn prompt_route() -> String {
        print!("\n🚌 Enter route number or id\n");
        print!("   Examples: 'B101', '3'\n");
        print!("➜ Route: ");
        let _ = io::stdout().flush();
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return String::new();
        }
        input.trim().to_string()
    }

    // ========================================================================
    // Header
    // ========================================================================

    pub fn show_header(summary: &DashboardSummary, service_day: &str, routes: &[RouteRecord]) {
        let badge_color = match summary.service_status {
            ServiceStatus::Normal => "10b981",
            ServiceStatus::Issues => "ef4444",
        };

        println!("\n{}", "═".repeat(70));
        println!("  REAL-TIME TRANSIT DASHBOARD");
        println!("  Track buses in real-time, discover routes, stay ahead with service updates.");
        println!("{}", "═".repeat(70));
        println!(
            "\n  {}",
            Self::badge(&format!("{} {}", summary.service_status.icon(), summary.service_status), badge_color)
        );
        println!();
        println!("  📅 Service Day    {:>6}   Current schedule", service_day);
        println!("  🛣️  Routes         {:>6}   Routes in the network", summary.total_routes);
        println!("  🚌 Buses Online   {:>6}   Live tracking enabled", summary.buses_online());

        println!("\n{}", "─".repeat(70));
        println!("  🚌 Active Routes — {} routes currently running", routes.len());
        let preview = ATDDashboard::preview(routes);
        if preview.is_empty() {
            println!("\n     No Active Routes");
            println!("     Routes will appear here when they become available");
        } else {
            for route in preview {
                let bucket = route.bucket();
                let hint = if bucket == StatusBucket::Active { "On time" } else { "Check schedule" };
                println!(
                    "     {} Route {:<8} {}  {}",
                    if bucket == StatusBucket::Active { "●" } else { "○" },
                    route.route_number,
                    Self::badge(&route.status, bucket.color()),
                    hint
                );
            }
        }
        println!("{}", "═".repeat(70));
    }

    pub fn show_summary_figures(summary: &DashboardSummary) {
        println!("\n📊 Summary");
        println!("{}", "─".repeat(60));
        println!("  Total Routes:     {}", summary.total_routes);
        println!("  Active:           {}", summary.active_route_count);
        println!("  Maintenance:      {}", summary.maintenance_route_count);
        println!("  Total Capacity:   {}", summary.total_capacity);
        println!("  Passengers:       {}", summary.total_passengers);
        println!(
            "  Avg Utilization:  {}%",
            ATDDashboard::format_percentage((summary.average_utilization * 10.0).round() / 10.0)
        );
        println!("  Open Incidents:   {}", summary.incident_count);
        println!("{}", "─".repeat(60));
    }

    // ========================================================================
    // Route Browser
    // ========================================================================

    pub fn show_route_list(routes: &[RouteRecord], selected: Option<RouteId>) {
        let groups = RouteGroups::from_routes(routes);
        let summary = DashboardSummary::from_routes(routes);

        println!("\n{}", "═".repeat(70));
        println!("🛣️  ROUTE OVERVIEW");
        println!("{}", "═".repeat(70));

        if routes.is_empty() {
            println!("\n  No routes available");
            println!("  Routes will appear here when they become available");
            println!("{}", "═".repeat(70));
            return;
        }

        println!("\n🟢 {} Routes ({})", StatusBucket::Active.label(), groups.active.len());
        println!("{}", "─".repeat(70));
        for route in &groups.active {
            Self::display_route_card(route, selected == Some(route.id));
        }

        if !groups.maintenance.is_empty() {
            println!("\n🟠 {} ({})", StatusBucket::Maintenance.label(), groups.maintenance.len());
            println!("{}", "─".repeat(70));
            for route in &groups.maintenance {
                println!(
                    "\n  {} {}",
                    Self::badge(&route.route_number, StatusBucket::Maintenance.color()),
                    route.name
                );
                println!("     🔧 Under maintenance");
            }
        }

        if !groups.other.is_empty() {
            println!("\n⚪ Other ({})", groups.other.len());
            println!("{}", "─".repeat(70));
            for route in &groups.other {
                let bucket = route.bucket();
                println!(
                    "\n  {} {} - {} {}",
                    Self::badge(&route.route_number, bucket.color()),
                    route.name,
                    ATDDashboard::display_status(&route.status),
                    Self::badge(bucket.label(), bucket.color())
                );
            }
        }

        println!("\n{}", "─".repeat(70));
        println!(
            "  Total Routes: {} | Active: {} | Maintenance: {} | Total Capacity: {}",
            summary.total_routes,
            summary.active_route_count,
            summary.maintenance_route_count,
            summary.total_capacity
        );
        println!("{}", "═".repeat(70));
    }

    fn display_route_card(route: &RouteRecord, is_selected: bool) {
        let p = &route.passengers;
        let marker = if is_selected { "▶" } else { " " };

        println!(
            "\n{} {} {}  {}",
            marker,
            Self::badge(&route.route_number, if is_selected { "059669" } else { "10b981" }),
            route.name,
            route.status
        );
        println!("     👥 {}/{} passengers", p.current, p.capacity);
        println!("     {}", Self::utilization_bar(p.utilization_percentage, 30));
        if route.has_incidents() {
            println!("     ⚠️  {}", ATDDashboard::issue_label(route.incidents.len()));
        }
    }

    // ========================================================================
    // Schedule
    // ========================================================================

    pub fn show_schedule(rows: &[ScheduleRow]) {
        println!("\n{}", "═".repeat(70));
        println!("⏰ ROUTES — NEXT STOP & ARRIVAL");
        println!("{}", "═".repeat(70));

        if rows.is_empty() {
            println!("\n  🚌 No routes available");
            println!("  Routes will appear here when they become available");
            println!("{}", "═".repeat(70));
            return;
        }

        for (i, row) in rows.iter().enumerate() {
            println!("\n  {}  {}", row.route_name, Self::badge(&row.status, row.bucket.color()));
            println!("     Route: {}", row.route_number);
            println!("     📍 Next Stop: {}", row.next_stop_name);
            println!("     ⏰ Arrival: {}", row.arrival);
            println!("     👤 Driver: {}", row.driver);
            println!("     🚌 Vehicle: {} ({})", row.vehicle, row.license_plate);
            println!("     👥 Passengers: {}", row.passengers);
            if i < rows.len() - 1 {
                println!("{}", "  ┄".repeat(23));
            }
        }
        println!("{}", "═".repeat(70));
    }

    // ========================================================================
    // Map
    // ========================================================================

    pub fn show_map(layer: &MapLayer, viewport: &MapViewport, summary: &DashboardSummary) {
        let center = viewport.center();

        println!("\n{}", "═".repeat(70));
        println!("🗺️  LIVE MAP");
        println!(
            "   Centre ({:.4}, {:.4}) | Zoom {:.0}",
            center.latitude,
            center.longitude,
            viewport.zoom()
        );
        if let Some(bounds) = layer.bounds() {
            println!(
                "   Coverage lat {:.4}..{:.4} | lon {:.4}..{:.4}",
                bounds.min().y,
                bounds.max().y,
                bounds.min().x,
                bounds.max().x
            );
        }
        println!("{}", "═".repeat(70));

        if layer.is_empty() {
            println!("\n  Nothing to show: no active routes with a known position");
        }

        for bus in &layer.buses {
            println!(
                "\n  {} Route {} at ({:.4}, {:.4})",
                Self::badge("🚌", bus.color),
                bus.route_number,
                bus.position.latitude,
                bus.position.longitude
            );
            if viewport.open_popup() == Some(bus.route_id) {
                println!("     ┌{}", "─".repeat(44));
                for line in bus.popup_lines() {
                    println!("     │ {}", line);
                }
                println!("     └{}", "─".repeat(44));
            }

            for stop in layer.stops.iter().filter(|s| s.route_id == bus.route_id) {
                println!(
                    "     {} {} - ETA {}{}",
                    Self::badge("●", stop.color),
                    stop.name,
                    stop.estimated_arrival,
                    if stop.is_next_stop { "  (Next Stop)" } else { "" }
                );
            }
        }

        println!("\n{}", "─".repeat(70));
        println!(
            "  Legend: {} Selected route  {} Active routes  {} Next stop  {} Bus stops",
            Self::badge(" ", crate::atd_map::SELECTED_COLOR),
            Self::badge(" ", crate::atd_map::ROUTE_COLOR),
            Self::badge(" ", crate::atd_map::NEXT_STOP_COLOR),
            Self::badge(" ", crate::atd_map::STOP_COLOR)
        );
        println!(
            "  Total Routes: {} | Active: {}",
            summary.total_routes, summary.active_route_count
        );
        println!("{}", "═".repeat(70));
    }

    // ========================================================================
    // Selection Messages
    // ========================================================================

    pub fn show_route_selected(route: &RouteRecord) {
        println!("\n{}", "─".repeat(60));
        println!(
            "✓ Route selected: {} - {}",
            Self::badge(&route.route_number, route.bucket().color()),
            route.name
        );
        match &route.current_location {
            Some(location) => println!("  📌 Location: {}", location.address),
            None => println!("  📌 Location unknown, the map stays where it is"),
        }
        println!("{}", "─".repeat(60));
    }

    pub fn route_already_selected(route: &RouteRecord) {
        println!("\nℹ️  Route {} is already selected", route.route_number);
    }

    pub fn invalid_route(input: &str) {
        println!("\n{}", "─".repeat(60));
        println!("✗ Route '{}' not found", input);
        println!("\n💡 Tips:");
        println!("  • Use the route number shown on the card (e.g., 'B101')");
        println!("  • Or the numeric route id");
        println!("  • Use option 3 to browse all routes");
        println!("{}", "─".repeat(60));
    }

    pub fn show_route_suggestions(routes: &[&RouteRecord]) {
        println!("\n💡 Did you mean one of these routes?");
        println!("{}", "─".repeat(60));
        for route in routes {
            println!("  • {} {} (id {})", route.route_number, route.name, route.id);
        }
        println!("{}", "─".repeat(60));
    }

    // ========================================================================
    // Status Messages
    // ========================================================================

    pub fn empty_feed_notice() {
        println!("\n{}", "═".repeat(60));
        println!("⚠️  NO DATA");
        println!("{}", "═".repeat(60));
        println!("\nThe transit feed returned no routes.");
        println!("\n💡 Troubleshooting:");
        println!("  • Check your internet connection");
        println!("  • The transit API might be temporarily unavailable");
        println!("  • Use option 6 to reload the feed");
        println!("\n{}", "═".repeat(60));
    }

    pub fn show_loading(message: &str) {
        print!("\r🔄 {}...", message);
        let _ = io::stdout().flush();
    }

    pub fn clear_loading() {
        print!("\r{}\r", " ".repeat(60));
        let _ = io::stdout().flush();
    }

    pub fn goodbye_message() {
        println!("\n{}", "═".repeat(60));
        println!("       👋 Thank you for riding with Amana Transit!");
        println!("{}", "═".repeat(60));
        println!();
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Text on a coloured ANSI background with a contrasting foreground
    fn badge(text: &str, hex_color: &str) -> String {
        let (r, g, b) = Self::parse_hex_color(hex_color);
        let luminance = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) / 255.0;
        let text_color = if luminance > 0.5 { "30" } else { "97" };

        format!(
            "\x1b[48;2;{};{};{}m\x1b[{}m {} \x1b[0m",
            r, g, b, text_color, text
        )
    }

    pub fn parse_hex_color(hex_color: &str) -> (u8, u8, u8) {
        let hex = hex_color.trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return (128, 128, 128);
        }
        let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(128);
        let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(128);
        let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(128);
        (r, g, b)
    }

    /// Utilization bar, clamped to 0-100%
    pub fn utilization_bar(percentage: f64, width: usize) -> String {
        let clamped = percentage.clamp(0.0, 100.0);
        let filled = ((clamped / 100.0) * width as f64).round() as usize;
        format!(
            "[{}{}] {}%",
            "█".repeat(filled),
            "░".repeat(width - filled),
            ATDDashboard::format_percentage(clamped)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(ATDViews::parse_hex_color("10b981"), (0x10, 0xb9, 0x81));
        assert_eq!(ATDViews::parse_hex_color("#3b82f6"), (0x3b, 0x82, 0xf6));
        assert_eq!(ATDViews::parse_hex_color("zz"), (128, 128, 128));
        assert_eq!(ATDViews::parse_hex_color("ééé"), (128, 128, 128));
    }

    #[test]
    fn utilization_bar_is_clamped() {
        assert_eq!(ATDViews::utilization_bar(50.0, 10), "[█████░░░░░] 50%");
        assert_eq!(ATDViews::utilization_bar(140.0, 4), "[████] 100%");
        assert_eq!(ATDViews::utilization_bar(-3.0, 4), "[░░░░] 0%");
    }

    #[test]
    fn badge_picks_contrasting_text() {
        assert!(ATDViews::badge("A", "ffffff").contains("\x1b[30m"));
        assert!(ATDViews::badge("A", "000000").contains("\x1b[97m"));
    }
}
