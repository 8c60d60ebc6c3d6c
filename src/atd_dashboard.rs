// View-model derivation: everything the header, route browser and schedule show
use crate::atd_models::{BusStop, RouteRecord, NOT_AVAILABLE, NO_STOP};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;

/// Number of routes shown in the header preview.
pub const PREVIEW_SIZE: usize = 5;

// ============================================================================
// Status Buckets
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusBucket {
    Active,
    Maintenance,
    Delayed,
    Unknown,
}

impl StatusBucket {
    pub fn from_status(status: &str) -> Self {
        match status.to_lowercase().as_str() {
            "active" => StatusBucket::Active,
            "maintenance" => StatusBucket::Maintenance,
            "delayed" => StatusBucket::Delayed,
            _ => StatusBucket::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusBucket::Active => "Active",
            StatusBucket::Maintenance => "Maintenance",
            StatusBucket::Delayed => "Delayed",
            StatusBucket::Unknown => "Unknown",
        }
    }

    /// Badge colour as a hex string without the leading '#'.
    pub fn color(self) -> &'static str {
        match self {
            StatusBucket::Active => "10b981",
            StatusBucket::Maintenance => "f59e0b",
            StatusBucket::Delayed => "d97706",
            StatusBucket::Unknown => "94a3b8",
        }
    }
}

impl RouteRecord {
    pub fn bucket(&self) -> StatusBucket {
        StatusBucket::from_status(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.bucket() == StatusBucket::Active
    }
}

// ============================================================================
// Service Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceStatus {
    #[serde(rename = "Service normal")]
    Normal,
    #[serde(rename = "Service issues")]
    Issues,
}

impl ServiceStatus {
    pub fn icon(self) -> &'static str {
        match self {
            ServiceStatus::Normal => "✔️",
            ServiceStatus::Issues => "⚠️",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Normal => write!(f, "Service normal"),
            ServiceStatus::Issues => write!(f, "Service issues"),
        }
    }
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_routes: usize,
    pub active_route_count: usize,
    pub maintenance_route_count: usize,
    pub service_status: ServiceStatus,
    pub incident_count: usize,
    pub total_capacity: u64,
    pub total_passengers: u64,
    pub average_utilization: f64,
}

impl DashboardSummary {
    pub fn from_routes(routes: &[RouteRecord]) -> Self {
        DashboardSummary {
            total_routes: routes.len(),
            active_route_count: ATDDashboard::active_route_count(routes),
            maintenance_route_count: ATDDashboard::maintenance_route_count(routes),
            service_status: ATDDashboard::service_status(routes),
            incident_count: routes.iter().map(|r| r.incidents.len()).sum(),
            total_capacity: ATDDashboard::total_capacity(routes),
            total_passengers: routes.iter().map(|r| u64::from(r.passengers.current)).sum(),
            average_utilization: ATDDashboard::average_utilization(routes),
        }
    }

    /// Buses currently reporting as in service.
    pub fn buses_online(&self) -> usize {
        self.active_route_count
    }
}

// ============================================================================
// Schedule Rows
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRow {
    pub route_id: i64,
    pub route_name: String,
    pub route_number: String,
    pub status: String,
    pub bucket: StatusBucket,
    pub next_stop_name: String,
    pub arrival: String,
    pub driver: String,
    pub vehicle: String,
    pub license_plate: String,
    pub passengers: String,
}

impl ScheduleRow {
    pub fn from_route(route: &RouteRecord) -> Self {
        let next = ATDDashboard::next_stop(&route.bus_stops);
        let p = &route.passengers;

        ScheduleRow {
            route_id: route.id,
            route_name: route.name.clone(),
            route_number: route.route_number.clone(),
            status: ATDDashboard::display_status(&route.status),
            bucket: route.bucket(),
            next_stop_name: next.map_or(NO_STOP, |s| s.name.as_str()).to_string(),
            arrival: next.map_or(NOT_AVAILABLE, |s| s.estimated_arrival.as_str()).to_string(),
            driver: route
                .driver
                .as_ref()
                .map_or(NOT_AVAILABLE, |d| d.name.as_str())
                .to_string(),
            vehicle: route
                .vehicle_info
                .as_ref()
                .map_or(NOT_AVAILABLE, |v| v.model.as_str())
                .to_string(),
            license_plate: route
                .vehicle_info
                .as_ref()
                .map_or(NOT_AVAILABLE, |v| v.license_plate.as_str())
                .to_string(),
            passengers: format!(
                "{}/{} ({}%)",
                p.current,
                p.capacity,
                ATDDashboard::format_percentage(p.utilization_percentage)
            ),
        }
    }
}

// ============================================================================
// Route Groups
// ============================================================================

#[derive(Debug, Default)]
pub struct RouteGroups<'a> {
    pub active: Vec<&'a RouteRecord>,
    pub maintenance: Vec<&'a RouteRecord>,
    pub other: Vec<&'a RouteRecord>,
}

impl<'a> RouteGroups<'a> {
    pub fn from_routes(routes: &'a [RouteRecord]) -> Self {
        let mut groups = RouteGroups::default();
        for route in routes {
            match route.bucket() {
                StatusBucket::Active => groups.active.push(route),
                StatusBucket::Maintenance => groups.maintenance.push(route),
                StatusBucket::Delayed | StatusBucket::Unknown => groups.other.push(route),
            }
        }
        groups
    }
}

// ============================================================================
// Main Implementation
// ============================================================================

pub struct ATDDashboard;

impl ATDDashboard {
    pub fn active_route_count(routes: &[RouteRecord]) -> usize {
        routes.iter().filter(|r| r.is_active()).count()
    }

    pub fn maintenance_route_count(routes: &[RouteRecord]) -> usize {
        routes
            .iter()
            .filter(|r| r.bucket() == StatusBucket::Maintenance)
            .count()
    }

    pub fn service_status(routes: &[RouteRecord]) -> ServiceStatus {
        if routes.iter().any(RouteRecord::has_incidents) {
            ServiceStatus::Issues
        } else {
            ServiceStatus::Normal
        }
    }

    /// First stop flagged as next; otherwise the first stop in sequence.
    pub fn next_stop(stops: &[BusStop]) -> Option<&BusStop> {
        stops.iter().find(|s| s.is_next_stop).or_else(|| stops.first())
    }

    pub fn total_capacity(routes: &[RouteRecord]) -> u64 {
        routes.iter().map(|r| u64::from(r.passengers.capacity)).sum()
    }

    /// Unweighted mean of the feed's utilization figures, 0 for no routes.
    pub fn average_utilization(routes: &[RouteRecord]) -> f64 {
        if routes.is_empty() {
            return 0.0;
        }
        let total: f64 = routes.iter().map(|r| r.passengers.utilization_percentage).sum();
        total / routes.len() as f64
    }

    pub fn schedule_rows(routes: &[RouteRecord]) -> Vec<ScheduleRow> {
        routes.iter().map(ScheduleRow::from_route).collect()
    }

    pub fn preview(routes: &[RouteRecord]) -> &[RouteRecord] {
        &routes[..routes.len().min(PREVIEW_SIZE)]
    }

    /// Lower-cased raw status with its first letter upper-cased.
    pub fn display_status(status: &str) -> String {
        let lower = status.trim().to_lowercase();
        let mut chars = lower.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => "Unknown".to_string(),
        }
    }

    /// Short weekday name, e.g. "Mon", in the network's time zone.
    pub fn service_day(now: DateTime<Utc>, timezone: Tz) -> String {
        now.with_timezone(&timezone).format("%a").to_string()
    }

    /// Drops a trailing ".0" so whole percentages print like the feed sends them.
    pub fn format_percentage(value: f64) -> String {
        if value.fract() == 0.0 {
            format!("{}", value as i64)
        } else {
            format!("{:.1}", value)
        }
    }

    pub fn issue_label(count: usize) -> String {
        if count == 1 {
            "1 issue".to_string()
        } else {
            format!("{} issues", count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atd_models::{Driver, GeoPoint, Incident, Location, Passengers, VehicleInfo};
    use chrono::TimeZone;

    fn route(id: i64, status: &str, incidents: usize) -> RouteRecord {
        RouteRecord {
            id,
            name: format!("Route {}", id),
            route_number: format!("B{}", id),
            status: status.to_string(),
            current_location: Some(Location {
                point: GeoPoint { latitude: 3.1, longitude: 101.6 },
                address: "Jalan Ampang".to_string(),
            }),
            passengers: Passengers::default(),
            bus_stops: Vec::new(),
            incidents: (0..incidents)
                .map(|i| Incident {
                    id: i as i64,
                    kind: "Delay".to_string(),
                    description: "Traffic".to_string(),
                    reported_by: "Driver".to_string(),
                    reported_time: "10:00".to_string(),
                    status: "Active".to_string(),
                    priority: "Low".to_string(),
                })
                .collect(),
            driver: None,
            vehicle_info: None,
        }
    }

    fn stop(id: i64, is_next_stop: bool) -> BusStop {
        BusStop {
            id,
            name: format!("Stop {}", id),
            coordinates: None,
            estimated_arrival: format!("10:{:02}", id),
            is_next_stop,
        }
    }

    fn with_utilization(mut r: RouteRecord, capacity: u32, utilization: f64) -> RouteRecord {
        r.passengers = Passengers {
            current: capacity / 2,
            capacity,
            utilization_percentage: utilization,
        };
        r
    }

    #[test]
    fn scenario_active_and_maintenance_with_incident() {
        let routes = vec![route(1, "Active", 0), route(2, "Maintenance", 1)];
        let summary = DashboardSummary::from_routes(&routes);
        assert_eq!(summary.total_routes, 2);
        assert_eq!(summary.active_route_count, 1);
        assert_eq!(summary.maintenance_route_count, 1);
        assert_eq!(summary.service_status, ServiceStatus::Issues);
        assert_eq!(summary.service_status.to_string(), "Service issues");
        assert_eq!(summary.incident_count, 1);
    }

    #[test]
    fn scenario_empty_feed() {
        let summary = DashboardSummary::from_routes(&[]);
        assert_eq!(summary.total_routes, 0);
        assert_eq!(summary.active_route_count, 0);
        assert_eq!(summary.service_status, ServiceStatus::Normal);
        assert_eq!(summary.service_status.to_string(), "Service normal");
        assert_eq!(summary.average_utilization, 0.0);
        assert!(!summary.average_utilization.is_nan());
        assert_eq!(summary.total_capacity, 0);
    }

    #[test]
    fn active_count_never_exceeds_total() {
        let statuses = ["active", "ACTIVE", "Active ", "delayed", "", "maintenance", "inactive"];
        for n in 0..=statuses.len() {
            let routes: Vec<_> = statuses[..n]
                .iter()
                .enumerate()
                .map(|(i, s)| route(i as i64, s, 0))
                .collect();
            let summary = DashboardSummary::from_routes(&routes);
            assert!(summary.active_route_count <= summary.total_routes);
        }
    }

    #[test]
    fn service_normal_without_incidents() {
        let routes = vec![route(1, "Active", 0), route(2, "Delayed", 0)];
        assert_eq!(ATDDashboard::service_status(&routes), ServiceStatus::Normal);
    }

    #[test]
    fn next_stop_prefers_flagged_stop() {
        let stops = vec![stop(1, false), stop(2, true)];
        assert_eq!(ATDDashboard::next_stop(&stops).map(|s| s.id), Some(2));
    }

    #[test]
    fn next_stop_falls_back_to_first() {
        let stops = vec![stop(1, false), stop(2, false)];
        assert_eq!(ATDDashboard::next_stop(&stops).map(|s| s.id), Some(1));
    }

    #[test]
    fn next_stop_first_flag_wins() {
        let stops = vec![stop(1, false), stop(2, true), stop(3, true)];
        assert_eq!(ATDDashboard::next_stop(&stops).map(|s| s.id), Some(2));
    }

    #[test]
    fn next_stop_of_empty_sequence_is_none() {
        assert!(ATDDashboard::next_stop(&[]).is_none());
    }

    #[test]
    fn bucketing_is_case_insensitive_and_total() {
        for s in ["ACTIVE", "active", "Active"] {
            assert_eq!(StatusBucket::from_status(s), StatusBucket::Active);
        }
        assert_eq!(StatusBucket::from_status("Maintenance"), StatusBucket::Maintenance);
        assert_eq!(StatusBucket::from_status("DELAYED"), StatusBucket::Delayed);
        for s in ["", "out_of_service", "actif", "🚌", "active!", " active "] {
            assert_eq!(StatusBucket::from_status(s), StatusBucket::Unknown);
        }
    }

    #[test]
    fn bucket_labels_match_badges() {
        assert_eq!(StatusBucket::from_status("MAINTENANCE").label(), "Maintenance");
        assert_eq!(StatusBucket::from_status("delayed").label(), "Delayed");
        assert_eq!(StatusBucket::from_status("retired").label(), "Unknown");
        assert_eq!(StatusBucket::Active.label(), "Active");
    }

    #[test]
    fn utilization_is_unweighted_mean() {
        let routes = vec![
            with_utilization(route(1, "Active", 0), 100, 80.0),
            with_utilization(route(2, "Active", 0), 10, 20.0),
        ];
        assert!((ATDDashboard::average_utilization(&routes) - 50.0).abs() < f64::EPSILON);
        assert_eq!(ATDDashboard::total_capacity(&routes), 110);
        assert_eq!(DashboardSummary::from_routes(&routes).total_passengers, 55);
    }

    #[test]
    fn schedule_row_with_no_stops_uses_placeholders() {
        let row = ScheduleRow::from_route(&route(4, "Active", 0));
        assert_eq!(row.next_stop_name, "—");
        assert_eq!(row.arrival, "N/A");
        assert_eq!(row.driver, "N/A");
        assert_eq!(row.vehicle, "N/A");
        assert_eq!(row.license_plate, "N/A");
        assert_eq!(row.passengers, "0/0 (0%)");
    }

    #[test]
    fn schedule_row_full() {
        let mut r = with_utilization(route(5, "out_of_service", 0), 60, 53.5);
        r.bus_stops = vec![stop(1, false), stop(7, true)];
        r.driver = Some(Driver { name: "Ahmad".to_string() });
        r.vehicle_info = Some(VehicleInfo {
            model: "Volvo B8RLE".to_string(),
            license_plate: "WKL 2891".to_string(),
        });

        let row = ScheduleRow::from_route(&r);
        assert_eq!(row.status, "Out_of_service");
        assert_eq!(row.bucket, StatusBucket::Unknown);
        assert_eq!(row.next_stop_name, "Stop 7");
        assert_eq!(row.arrival, "10:07");
        assert_eq!(row.driver, "Ahmad");
        assert_eq!(row.vehicle, "Volvo B8RLE");
        assert_eq!(row.passengers, "30/60 (53.5%)");
    }

    #[test]
    fn groups_keep_feed_order() {
        let routes = vec![
            route(1, "maintenance", 0),
            route(2, "active", 0),
            route(3, "delayed", 0),
            route(4, "Active", 0),
        ];
        let groups = RouteGroups::from_routes(&routes);
        let ids = |v: &[&RouteRecord]| v.iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(ids(&groups.active), vec![2, 4]);
        assert_eq!(ids(&groups.maintenance), vec![1]);
        assert_eq!(ids(&groups.other), vec![3]);
    }

    #[test]
    fn preview_is_capped() {
        let routes: Vec<_> = (0..8).map(|i| route(i, "active", 0)).collect();
        assert_eq!(ATDDashboard::preview(&routes).len(), PREVIEW_SIZE);
        assert_eq!(ATDDashboard::preview(&routes[..2]).len(), 2);
        assert!(ATDDashboard::preview(&[]).is_empty());
    }

    #[test]
    fn display_status_capitalizes() {
        assert_eq!(ATDDashboard::display_status("ACTIVE"), "Active");
        assert_eq!(ATDDashboard::display_status("delayed"), "Delayed");
        assert_eq!(ATDDashboard::display_status(""), "Unknown");
    }

    #[test]
    fn service_day_uses_timezone() {
        // Sunday 20:00 UTC is already Monday in Kuala Lumpur.
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 20, 0, 0).unwrap();
        assert_eq!(ATDDashboard::service_day(now, chrono_tz::UTC), "Sun");
        assert_eq!(ATDDashboard::service_day(now, chrono_tz::Asia::Kuala_Lumpur), "Mon");
    }

    #[test]
    fn issue_labels() {
        assert_eq!(ATDDashboard::issue_label(1), "1 issue");
        assert_eq!(ATDDashboard::issue_label(3), "3 issues");
    }

    #[test]
    fn summary_serializes_status_text() {
        let summary = DashboardSummary::from_routes(&[route(1, "Active", 2)]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["service_status"], "Service issues");
        assert_eq!(json["active_route_count"], 1);
    }
}
