// Map layer derivation, viewport animation and GeoJSON export
use crate::atd_config::MapDefaults;
use crate::atd_dashboard::ATDDashboard;
use crate::atd_models::{GeoPoint, RouteId, RouteRecord};
use geo::BoundingRect;
use geo_types::{MultiPoint, Rect};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use log::debug;
use serde_json::json;
use std::time::Duration;

pub const SELECTED_COLOR: &str = "10b981";
pub const ROUTE_COLOR: &str = "3b82f6";
pub const NEXT_STOP_COLOR: &str = "f97316";
pub const STOP_COLOR: &str = "64748b";

pub const SELECTED_WEIGHT: f32 = 4.0;
pub const ROUTE_WEIGHT: f32 = 2.0;

/// Web Mercator tile size in pixels.
const TILE_SIZE: f64 = 256.0;

// ============================================================================
// Layer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BusMarker {
    pub route_id: RouteId,
    pub position: GeoPoint,
    pub route_number: String,
    pub name: String,
    pub status: String,
    pub passengers: String,
    pub utilization: String,
    pub address: String,
    pub incident_count: usize,
    pub selected: bool,
    pub color: &'static str,
}

impl BusMarker {
    /// Text shown in the marker popup, one entry per line.
    pub fn popup_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Route {}", self.route_number),
            self.name.clone(),
            format!("Status: {}", self.status),
            format!("Passengers: {}", self.passengers),
            format!("Capacity: {}%", self.utilization),
            format!("Current Location: {}", self.address),
        ];
        if self.incident_count > 0 {
            lines.push(format!("Issues: {}", ATDDashboard::issue_label(self.incident_count)));
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopMarker {
    pub route_id: RouteId,
    pub stop_id: i64,
    pub name: String,
    pub route_number: String,
    pub position: GeoPoint,
    pub estimated_arrival: String,
    pub is_next_stop: bool,
    pub color: &'static str,
}

impl StopMarker {
    pub fn popup_lines(&self) -> Vec<String> {
        let mut lines = vec![
            self.name.clone(),
            format!("Route {}", self.route_number),
            format!("ETA: {}", self.estimated_arrival),
        ];
        if self.is_next_stop {
            lines.push("Next Stop".to_string());
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutePath {
    pub route_id: RouteId,
    pub points: Vec<GeoPoint>,
    pub selected: bool,
    pub color: &'static str,
    pub weight: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapLayer {
    pub buses: Vec<BusMarker>,
    pub stops: Vec<StopMarker>,
    pub paths: Vec<RoutePath>,
}

impl MapLayer {
    /// Only active routes are drawn.
    pub fn build(routes: &[RouteRecord], selected: Option<RouteId>) -> Self {
        let mut layer = MapLayer::default();

        for route in routes.iter().filter(|r| r.is_active()) {
            let is_selected = selected == Some(route.id);

            if let Some(location) = &route.current_location {
                let p = &route.passengers;
                layer.buses.push(BusMarker {
                    route_id: route.id,
                    position: location.point,
                    route_number: route.route_number.clone(),
                    name: route.name.clone(),
                    status: route.status.clone(),
                    passengers: format!("{}/{}", p.current, p.capacity),
                    utilization: ATDDashboard::format_percentage(p.utilization_percentage),
                    address: location.address.clone(),
                    incident_count: route.incidents.len(),
                    selected: is_selected,
                    color: if is_selected { SELECTED_COLOR } else { ROUTE_COLOR },
                });
            }

            for stop in &route.bus_stops {
                let Some(position) = stop.coordinates else {
                    continue;
                };
                layer.stops.push(StopMarker {
                    route_id: route.id,
                    stop_id: stop.id,
                    name: stop.name.clone(),
                    route_number: route.route_number.clone(),
                    position,
                    estimated_arrival: stop.estimated_arrival.clone(),
                    is_next_stop: stop.is_next_stop,
                    color: if stop.is_next_stop { NEXT_STOP_COLOR } else { STOP_COLOR },
                });
            }

            if let Some(points) = Self::route_path(route) {
                layer.paths.push(RoutePath {
                    route_id: route.id,
                    points,
                    selected: is_selected,
                    color: if is_selected { SELECTED_COLOR } else { ROUTE_COLOR },
                    weight: if is_selected { SELECTED_WEIGHT } else { ROUTE_WEIGHT },
                });
            }
        }

        debug!(
            "Map layer: {} buses, {} stops, {} paths",
            layer.buses.len(),
            layer.stops.len(),
            layer.paths.len()
        );
        layer
    }

    /// Vehicle position followed by the stops in feed order. Needs a located
    /// vehicle and at least two placed stops.
    pub fn route_path(route: &RouteRecord) -> Option<Vec<GeoPoint>> {
        let start = route.position()?;
        let stops: Vec<GeoPoint> = route.bus_stops.iter().filter_map(|s| s.coordinates).collect();
        if stops.len() < 2 {
            return None;
        }
        let mut points = Vec::with_capacity(stops.len() + 1);
        points.push(start);
        points.extend(stops);
        Some(points)
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty() && self.stops.is_empty()
    }

    pub fn bus(&self, route_id: RouteId) -> Option<&BusMarker> {
        self.buses.iter().find(|b| b.route_id == route_id)
    }

    /// Bounding rectangle of every marker, x = longitude, y = latitude.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let points: Vec<(f64, f64)> = self
            .buses
            .iter()
            .map(|b| b.position)
            .chain(self.stops.iter().map(|s| s.position))
            .map(|p| (p.longitude, p.latitude))
            .collect();
        MultiPoint::from(points).bounding_rect()
    }

    pub fn to_geojson(&self) -> FeatureCollection {
        let mut features = Vec::with_capacity(self.buses.len() + self.stops.len() + self.paths.len());

        for bus in &self.buses {
            features.push(Self::feature(
                geojson::Value::Point(vec![bus.position.longitude, bus.position.latitude]),
                json!({
                    "kind": "bus",
                    "route_id": bus.route_id,
                    "route_number": bus.route_number,
                    "name": bus.name,
                    "status": bus.status,
                    "passengers": bus.passengers,
                    "utilization_percentage": bus.utilization,
                    "address": bus.address,
                    "incidents": bus.incident_count,
                    "selected": bus.selected,
                    "color": format!("#{}", bus.color),
                }),
            ));
        }

        for stop in &self.stops {
            features.push(Self::feature(
                geojson::Value::Point(vec![stop.position.longitude, stop.position.latitude]),
                json!({
                    "kind": "stop",
                    "route_id": stop.route_id,
                    "stop_id": stop.stop_id,
                    "name": stop.name,
                    "route_number": stop.route_number,
                    "estimated_arrival": stop.estimated_arrival,
                    "is_next_stop": stop.is_next_stop,
                    "color": format!("#{}", stop.color),
                }),
            ));
        }

        for path in &self.paths {
            let coordinates = path
                .points
                .iter()
                .map(|p| vec![p.longitude, p.latitude])
                .collect();
            features.push(Self::feature(
                geojson::Value::LineString(coordinates),
                json!({
                    "kind": "route",
                    "route_id": path.route_id,
                    "selected": path.selected,
                    "color": format!("#{}", path.color),
                    "weight": path.weight,
                }),
            ));
        }

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    fn feature(value: geojson::Value, properties: serde_json::Value) -> Feature {
        let properties: Option<JsonObject> = match properties {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        };
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(value)),
            id: None,
            properties,
            foreign_members: None,
        }
    }
}

/// Web Mercator projection to world pixel coordinates at `zoom`.
pub fn project(point: GeoPoint, zoom: f64) -> (f64, f64) {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let lat = point.latitude.clamp(-85.051_128_78, 85.051_128_78).to_radians();
    let x = (point.longitude + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0 * scale;
    (x, y)
}

// ============================================================================
// Viewport
// ============================================================================

/// Raised when a fly-to reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFinished {
    pub route_id: Option<RouteId>,
}

#[derive(Debug, Clone, PartialEq)]
struct Flight {
    from: GeoPoint,
    from_zoom: f64,
    to: GeoPoint,
    to_zoom: f64,
    elapsed: Duration,
    duration: Duration,
    route_id: RouteId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapViewport {
    center: GeoPoint,
    zoom: f64,
    flight: Option<Flight>,
    pending_popup: Option<RouteId>,
    open_popup: Option<RouteId>,
    defaults: MapDefaults,
}

impl MapViewport {
    pub fn new(defaults: MapDefaults) -> Self {
        Self {
            center: defaults.center,
            zoom: defaults.zoom,
            flight: None,
            pending_popup: None,
            open_popup: None,
            defaults,
        }
    }

    /// Starts on the selected route when it has a location.
    pub fn initial(defaults: MapDefaults, selected: Option<&RouteRecord>) -> Self {
        let mut viewport = Self::new(defaults);
        if let Some(center) = selected.and_then(RouteRecord::position) {
            viewport.center = center;
        }
        viewport
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn is_animating(&self) -> bool {
        self.flight.is_some()
    }

    pub fn pending_popup(&self) -> Option<RouteId> {
        self.pending_popup
    }

    pub fn open_popup(&self) -> Option<RouteId> {
        self.open_popup
    }

    pub fn close_popup(&mut self) {
        self.open_popup = None;
    }

    /// Reopens the popup of a route the map already rests on.
    /// While a flight is running its pending popup wins.
    pub fn reopen_popup(&mut self, route_id: RouteId) {
        if self.flight.is_none() {
            self.open_popup = Some(route_id);
        }
    }

    /// Starts flying toward the route. The popup opens on `AnimationFinished`.
    pub fn fly_to(&mut self, route: &RouteRecord) {
        self.open_popup = None;
        let Some(target) = route.position() else {
            debug!("Route {} has no location, viewport stays put", route.id);
            self.flight = None;
            self.pending_popup = None;
            return;
        };
        self.pending_popup = Some(route.id);
        self.flight = Some(Flight {
            from: self.center,
            from_zoom: self.zoom,
            to: target,
            to_zoom: self.defaults.focus_zoom,
            elapsed: Duration::ZERO,
            duration: self.defaults.fly_duration,
            route_id: route.id,
        });
    }

    /// Moves the animation forward by `dt`.
    pub fn advance(&mut self, dt: Duration) -> Option<AnimationFinished> {
        let flight = self.flight.as_mut()?;
        flight.elapsed = (flight.elapsed + dt).min(flight.duration);

        let t = if flight.duration.is_zero() {
            1.0
        } else {
            flight.elapsed.as_secs_f64() / flight.duration.as_secs_f64()
        };
        if t >= 1.0 {
            self.center = flight.to;
            self.zoom = flight.to_zoom;
            let route_id = flight.route_id;
            self.flight = None;
            return Some(AnimationFinished { route_id: Some(route_id) });
        }

        let eased = 1.0 - (1.0 - t).powi(3);
        self.center = GeoPoint {
            latitude: lerp(flight.from.latitude, flight.to.latitude, eased),
            longitude: lerp(flight.from.longitude, flight.to.longitude, eased),
        };
        self.zoom = lerp(flight.from_zoom, flight.to_zoom, eased);
        None
    }

    /// Jumps to the end of any running flight.
    pub fn complete(&mut self) -> Option<AnimationFinished> {
        let remaining = self
            .flight
            .as_ref()
            .map(|f| f.duration.saturating_sub(f.elapsed))?;
        self.advance(remaining)
    }

    pub fn on_animation_finished(&mut self, event: AnimationFinished) {
        if event.route_id.is_some() && event.route_id == self.pending_popup {
            self.open_popup = self.pending_popup.take();
        }
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atd_models::{BusStop, Location, Passengers};

    fn stop(id: i64, lat: f64, lon: f64, next: bool) -> BusStop {
        BusStop {
            id,
            name: format!("Stop {}", id),
            coordinates: Some(GeoPoint { latitude: lat, longitude: lon }),
            estimated_arrival: "10:00".to_string(),
            is_next_stop: next,
        }
    }

    fn route(id: RouteId, status: &str, stops: Vec<BusStop>) -> RouteRecord {
        RouteRecord {
            id,
            name: format!("Line {}", id),
            route_number: format!("B{}", id),
            status: status.to_string(),
            current_location: Some(Location {
                point: GeoPoint { latitude: 3.0 + id as f64 * 0.01, longitude: 101.0 },
                address: "Jalan Ampang".to_string(),
            }),
            passengers: Passengers { current: 20, capacity: 40, utilization_percentage: 50.0 },
            bus_stops: stops,
            incidents: Vec::new(),
            driver: None,
            vehicle_info: None,
        }
    }

    #[test]
    fn only_active_routes_are_drawn() {
        let routes = vec![
            route(1, "Active", vec![stop(1, 3.1, 101.1, false)]),
            route(2, "Maintenance", vec![stop(2, 3.2, 101.2, false)]),
        ];
        let layer = MapLayer::build(&routes, None);
        assert_eq!(layer.buses.len(), 1);
        assert_eq!(layer.buses[0].route_id, 1);
        assert_eq!(layer.stops.len(), 1);
    }

    #[test]
    fn selected_route_is_highlighted() {
        let routes = vec![
            route(1, "active", vec![stop(1, 3.1, 101.1, false), stop(2, 3.2, 101.2, true)]),
            route(2, "active", vec![stop(3, 3.3, 101.3, false), stop(4, 3.4, 101.4, false)]),
        ];
        let layer = MapLayer::build(&routes, Some(2));
        assert_eq!(layer.bus(1).unwrap().color, ROUTE_COLOR);
        assert_eq!(layer.bus(2).unwrap().color, SELECTED_COLOR);
        let path = layer.paths.iter().find(|p| p.route_id == 2).unwrap();
        assert!(path.selected);
        assert_eq!(path.weight, SELECTED_WEIGHT);
        assert_eq!(layer.stops[1].color, NEXT_STOP_COLOR);
        assert_eq!(layer.stops[0].color, STOP_COLOR);
    }

    #[test]
    fn path_starts_at_vehicle_and_keeps_stop_order() {
        let r = route(1, "active", vec![stop(1, 3.5, 101.5, false), stop(2, 3.1, 101.1, false)]);
        let path = MapLayer::route_path(&r).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], r.position().unwrap());
        assert_eq!(path[1].latitude, 3.5);
        assert_eq!(path[2].latitude, 3.1);
    }

    #[test]
    fn path_needs_two_stops() {
        assert!(MapLayer::route_path(&route(1, "active", vec![])).is_none());
        assert!(MapLayer::route_path(&route(1, "active", vec![stop(1, 3.0, 101.0, true)])).is_none());
    }

    #[test]
    fn bounds_cover_all_markers() {
        let routes = vec![route(1, "active", vec![stop(1, 2.5, 100.5, false), stop(2, 3.5, 102.0, false)])];
        let rect = MapLayer::build(&routes, None).bounds().unwrap();
        assert_eq!(rect.min().x, 100.5);
        assert_eq!(rect.max().x, 102.0);
        assert_eq!(rect.min().y, 2.5);
        assert_eq!(rect.max().y, 3.5);
        assert!(MapLayer::build(&[], None).bounds().is_none());
    }

    #[test]
    fn geojson_has_one_feature_per_shape() {
        let routes = vec![route(1, "active", vec![stop(1, 3.1, 101.1, false), stop(2, 3.2, 101.2, true)])];
        let collection = MapLayer::build(&routes, Some(1)).to_geojson();
        assert_eq!(collection.features.len(), 4);

        let json = serde_json::to_value(&collection).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][0]["properties"]["kind"], "bus");
        assert_eq!(json["features"][0]["geometry"]["coordinates"][0], 101.0);
        assert_eq!(json["features"][3]["geometry"]["type"], "LineString");
    }

    #[test]
    fn popup_mentions_issues_only_when_present() {
        let mut r = route(1, "active", vec![]);
        let layer = MapLayer::build(std::slice::from_ref(&r), None);
        assert_eq!(layer.buses[0].popup_lines().len(), 6);

        r.incidents.push(crate::atd_models::Incident {
            id: 1,
            kind: "Delay".to_string(),
            description: "Traffic".to_string(),
            reported_by: "Driver".to_string(),
            reported_time: "10:00".to_string(),
            status: "Open".to_string(),
            priority: "High".to_string(),
        });
        let layer = MapLayer::build(std::slice::from_ref(&r), None);
        assert_eq!(layer.buses[0].popup_lines().last().unwrap(), "Issues: 1 issue");
    }

    #[test]
    fn projection_is_monotonic() {
        let (x0, y0) = project(GeoPoint { latitude: 0.0, longitude: 0.0 }, 0.0);
        assert!((x0 - 128.0).abs() < 1e-9);
        assert!((y0 - 128.0).abs() < 1e-9);
        let (x1, y1) = project(GeoPoint { latitude: 10.0, longitude: 10.0 }, 0.0);
        assert!(x1 > x0);
        assert!(y1 < y0);
    }

    #[test]
    fn popup_opens_only_after_animation_finishes() {
        let defaults = MapDefaults::default();
        let r = route(5, "active", vec![]);
        let mut viewport = MapViewport::new(defaults);

        viewport.fly_to(&r);
        assert!(viewport.is_animating());
        assert_eq!(viewport.pending_popup(), Some(5));
        assert_eq!(viewport.open_popup(), None);

        assert!(viewport.advance(defaults.fly_duration / 2).is_none());
        assert_eq!(viewport.open_popup(), None);

        let event = viewport.advance(defaults.fly_duration).unwrap();
        viewport.on_animation_finished(event);
        assert_eq!(viewport.open_popup(), Some(5));
        assert_eq!(viewport.center(), r.position().unwrap());
        assert_eq!(viewport.zoom(), defaults.focus_zoom);
        assert!(!viewport.is_animating());
    }

    #[test]
    fn stale_animation_event_does_not_open_popup() {
        let defaults = MapDefaults::default();
        let mut viewport = MapViewport::new(defaults);
        viewport.fly_to(&route(1, "active", vec![]));
        let stale = viewport.complete().unwrap();
        viewport.fly_to(&route(2, "active", vec![]));
        viewport.on_animation_finished(stale);
        assert_eq!(viewport.open_popup(), None);
        assert_eq!(viewport.pending_popup(), Some(2));
    }

    #[test]
    fn dismissed_popup_can_be_reopened_at_rest() {
        let defaults = MapDefaults::default();
        let mut viewport = MapViewport::new(defaults);
        viewport.fly_to(&route(5, "active", vec![]));
        let event = viewport.complete().unwrap();
        viewport.on_animation_finished(event);
        viewport.close_popup();
        assert_eq!(viewport.open_popup(), None);

        viewport.reopen_popup(5);
        assert_eq!(viewport.open_popup(), Some(5));
        assert!(!viewport.is_animating());
    }

    #[test]
    fn reopening_during_flight_waits_for_animation() {
        let defaults = MapDefaults::default();
        let mut viewport = MapViewport::new(defaults);
        viewport.fly_to(&route(2, "active", vec![]));
        viewport.reopen_popup(2);
        assert_eq!(viewport.open_popup(), None);
        assert_eq!(viewport.pending_popup(), Some(2));
    }

    #[test]
    fn stop_popup_names_route_and_arrival() {
        let routes = vec![route(1, "active", vec![stop(1, 3.1, 101.1, false), stop(2, 3.2, 101.2, true)])];
        let layer = MapLayer::build(&routes, None);
        let plain = layer.stops.iter().find(|s| s.stop_id == 1).unwrap();
        assert_eq!(plain.popup_lines(), vec!["Stop 1", "Route B1", "ETA: 10:00"]);
        let next = layer.stops.iter().find(|s| s.stop_id == 2).unwrap();
        assert_eq!(next.popup_lines().last().map(String::as_str), Some("Next Stop"));
    }

    #[test]
    fn route_without_location_keeps_viewport() {
        let defaults = MapDefaults::default();
        let mut viewport = MapViewport::new(defaults);
        let mut r = route(1, "active", vec![]);
        r.current_location = None;
        viewport.fly_to(&r);
        assert!(!viewport.is_animating());
        assert_eq!(viewport.center(), defaults.center);
        assert!(viewport.complete().is_none());
    }

    #[test]
    fn initial_viewport_centres_on_selection() {
        let defaults = MapDefaults::default();
        let r = route(3, "active", vec![]);
        assert_eq!(MapViewport::initial(defaults, Some(&r)).center(), r.position().unwrap());
        assert_eq!(MapViewport::initial(defaults, None).center(), defaults.center);
    }
}
