// GUI implementation for the Amana transit dashboard using egui/eframe
use crate::atd_config::DashboardConfig;
use crate::atd_controllers::DashboardSession;
use crate::atd_dashboard::{ATDDashboard, RouteGroups, ServiceStatus, StatusBucket};
use crate::atd_map::{self, MapLayer, StopMarker};
use crate::atd_models::{ATDModels, GeoPoint, RouteId, RouteRecord};
use crate::atd_selection::SelectionChange;
use crate::atd_views::ATDViews;
use chrono::{DateTime, Local};
use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, RichText, Sense, Stroke, Ui};
use egui_extras::{Column, TableBuilder};
use log::{debug, info};
use std::time::{Duration, Instant};

const MAP_HEIGHT: f32 = 480.0;
const BUS_RADIUS: f32 = 9.0;
const STOP_RADIUS: f32 = 5.0;
const CLICK_TOLERANCE: f32 = 14.0;

// ============================================================================
// Application State
// ============================================================================

/// What a click on the map asks the owner to do.
enum MapAction {
    Select(RouteId),
    Dismiss,
}

#[derive(PartialEq, Clone, Copy)]
enum AppView {
    Dashboard,
    LiveMap,
    Routes,
    Schedule,
}

pub struct ATDApp {
    config: DashboardConfig,
    session: Option<DashboardSession>,

    // Loading state
    is_loading: bool,
    loading_message: String,
    load_promise: Option<poll_promise::Promise<Vec<RouteRecord>>>,

    current_view: AppView,

    // Drives the map animation
    last_frame: Option<Instant>,
}

// ============================================================================
// GUI Implementation
// ============================================================================

impl ATDApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: DashboardConfig) -> Self {
        let mut app = Self {
            config,
            session: None,
            is_loading: true,
            loading_message: "Initializing...".to_string(),
            load_promise: None,
            current_view: AppView::Dashboard,
            last_frame: None,
        };

        // Start loading data in background
        app.start_loading();

        app
    }

    fn start_loading(&mut self) {
        let config = self.config.clone();
        let promise = poll_promise::Promise::spawn_thread("feed", move || ATDModels::fetch_routes(&config));
        self.load_promise = Some(promise);
        self.is_loading = true;
        self.loading_message = "Loading transit feed...".to_string();
    }

    fn check_loading(&mut self) {
        let Some(promise) = &self.load_promise else {
            return;
        };
        let Some(routes) = promise.ready() else {
            return;
        };

        let routes = routes.clone();
        info!("Window received {} routes", routes.len());
        match self.session.as_mut() {
            Some(session) => session.replace_routes(routes),
            None => self.session = Some(DashboardSession::from_routes(self.config.clone(), routes)),
        }
        self.is_loading = false;
        self.load_promise = None;
        self.last_frame = None;
    }

    /// Advances the fly-to and opens the pending popup once it lands.
    fn animate(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        let dt = self.last_frame.map(|t| now - t).unwrap_or_default();
        self.last_frame = Some(now);

        if let Some(session) = self.session.as_mut() {
            if let Some(event) = session.viewport.advance(dt) {
                debug!("Map animation finished for {:?}", event.route_id);
                session.viewport.on_animation_finished(event);
            }
            if session.viewport.is_animating() {
                ctx.request_repaint();
            }
        }
    }
}

impl eframe::App for ATDApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.check_loading();
        self.animate(ctx);

        // Top panel with header
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("🚌 Amana Transit - Real-Time Dashboard");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let now: DateTime<Local> = Local::now();
                    ui.label(now.format("%H:%M:%S").to_string());
                });
            });
        });

        if self.is_loading {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.centered_and_justified(|ui| {
                    ui.vertical_centered(|ui| {
                        ui.spinner();
                        ui.label(&self.loading_message);
                    });
                });
            });
            ctx.request_repaint_after(Duration::from_millis(100));
            return;
        }

        let mut reload = false;
        let mut requested: Option<RouteId> = None;
        let mut dismiss_popup = false;
        let mut view = self.current_view;

        let Some(session) = self.session.as_mut() else {
            return;
        };

        // Left panel with navigation
        egui::SidePanel::left("nav_panel").min_width(200.0).show(ctx, |ui| {
            ui.heading("Navigation");
            ui.separator();

            if ui.selectable_label(view == AppView::Dashboard, "📊 Dashboard").clicked() {
                view = AppView::Dashboard;
            }
            if ui.selectable_label(view == AppView::LiveMap, "🗺️ Live Map").clicked() {
                view = AppView::LiveMap;
            }
            if ui.selectable_label(view == AppView::Routes, "🚌 Routes").clicked() {
                view = AppView::Routes;
            }
            if ui.selectable_label(view == AppView::Schedule, "⏰ Schedule").clicked() {
                view = AppView::Schedule;
            }

            ui.add_space(20.0);
            ui.separator();
            ui.label("Current Selection:");
            match session.selected_route() {
                Some(route) => ui.label(format!("Route {} - {}", route.route_number, route.name)),
                None => ui.label("Route: None"),
            };

            ui.add_space(20.0);
            if ui.button("🔄 Reload feed").clicked() {
                reload = true;
            }
        });

        // Central panel with main content
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| match view {
                AppView::Dashboard => Self::show_dashboard(ui, session),
                AppView::LiveMap => {
                    ui.columns(2, |columns| {
                        match Self::show_map(&mut columns[0], session) {
                            Some(MapAction::Select(id)) => requested = Some(id),
                            Some(MapAction::Dismiss) => dismiss_popup = true,
                            None => {}
                        }
                        if let Some(id) = Self::show_route_list(&mut columns[1], session) {
                            requested = Some(id);
                        }
                    });
                }
                AppView::Routes => {
                    if let Some(id) = Self::show_route_list(ui, session) {
                        requested = Some(id);
                    }
                }
                AppView::Schedule => Self::show_schedule(ui, session),
            });
        });

        if dismiss_popup {
            session.viewport.close_popup();
        }
        if let Some(id) = requested {
            if let SelectionChange::Changed { .. } = session.select(id) {
                ctx.request_repaint();
            }
        }

        self.current_view = view;
        if reload {
            self.start_loading();
        }
    }
}

// ============================================================================
// View Implementations
// ============================================================================

impl ATDApp {
    fn show_dashboard(ui: &mut Ui, session: &DashboardSession) {
        let summary = session.summary();
        let (badge_color, badge_fill) = match summary.service_status {
            ServiceStatus::Normal => (Color32::from_rgb(4, 120, 87), Color32::from_rgb(209, 250, 229)),
            ServiceStatus::Issues => (Color32::from_rgb(185, 28, 28), Color32::from_rgb(254, 226, 226)),
        };

        ui.vertical_centered(|ui| {
            egui::Frame::none()
                .fill(badge_fill)
                .rounding(12.0)
                .inner_margin(8.0)
                .show(ui, |ui| {
                    ui.label(
                        RichText::new(format!("{} {}", summary.service_status.icon(), summary.service_status))
                            .color(badge_color)
                            .strong(),
                    );
                });
            ui.add_space(8.0);
            ui.heading(RichText::new("Real-Time Transit Dashboard").size(28.0).strong());
            ui.label("Track buses in real-time, discover the fastest routes, and stay ahead with instant service updates.");
        });

        ui.add_space(16.0);
        ui.columns(3, |columns| {
            Self::stat_card(&mut columns[0], "📅", "Service Day", &session.service_day(), "Current schedule");
            Self::stat_card(&mut columns[1], "🛣️", "Routes", &summary.total_routes.to_string(), "Routes in the network");
            Self::stat_card(&mut columns[2], "🚌", "Buses Online", &summary.buses_online().to_string(), "Live tracking enabled");
        });

        ui.add_space(16.0);
        ui.group(|ui| {
            ui.strong(format!("🚌 Active Routes — {} routes currently running", session.routes.len()));
            ui.separator();
            let preview = ATDDashboard::preview(&session.routes);
            if preview.is_empty() {
                ui.label(RichText::new("No Active Routes").strong());
                ui.label("Routes will appear here when they become available");
            }
            for route in preview {
                let bucket = route.bucket();
                ui.horizontal(|ui| {
                    ui.colored_label(hex_color(bucket.color()), "●");
                    ui.strong(format!("Route {}", route.route_number));
                    ui.colored_label(hex_color(bucket.color()), &route.status);
                    ui.label(if bucket == StatusBucket::Active { "On time" } else { "Check schedule" });
                });
            }
        });

        ui.add_space(10.0);
        ui.group(|ui| {
            ui.strong("Summary");
            ui.separator();
            ui.label(format!("Total capacity: {}", summary.total_capacity));
            ui.label(format!("Passengers on board: {}", summary.total_passengers));
            ui.label(format!(
                "Average utilization: {}%",
                ATDDashboard::format_percentage((summary.average_utilization * 10.0).round() / 10.0)
            ));
            ui.label(format!("Open incidents: {}", summary.incident_count));
        });
    }

    fn stat_card(ui: &mut Ui, icon: &str, label: &str, value: &str, description: &str) {
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.vertical_centered(|ui| {
                ui.label(RichText::new(icon).size(28.0));
                ui.label(RichText::new(value).size(22.0).strong());
                ui.strong(label);
                ui.small(description);
            });
        });
    }

    fn show_map(ui: &mut Ui, session: &DashboardSession) -> Option<MapAction> {
        ui.heading("🗺️ Live Map");
        ui.label("Real-time bus locations across the city.");
        ui.separator();

        let layer = session.map_layer();
        let viewport = &session.viewport;
        let desired = egui::vec2(ui.available_width(), MAP_HEIGHT);
        let (response, painter) = ui.allocate_painter(desired, Sense::click());
        let rect = response.rect;

        painter.rect_filled(rect, 8.0, Color32::from_rgb(236, 242, 238));
        painter.rect_stroke(rect, 8.0, Stroke::new(1.0, Color32::from_gray(200)));

        let zoom = viewport.zoom();
        let (cx, cy) = atd_map::project(viewport.center(), zoom);
        let to_screen = |p: GeoPoint| -> Pos2 {
            let (x, y) = atd_map::project(p, zoom);
            rect.center() + egui::vec2((x - cx) as f32, (y - cy) as f32)
        };

        // Paths under stops under buses
        for path in &layer.paths {
            let points: Vec<Pos2> = path.points.iter().map(|p| to_screen(*p)).collect();
            painter.add(egui::Shape::line(
                points,
                Stroke::new(path.weight, hex_color(path.color).gamma_multiply(0.7)),
            ));
        }
        for stop in &layer.stops {
            painter.circle(
                to_screen(stop.position),
                STOP_RADIUS,
                hex_color(stop.color),
                Stroke::new(2.0, Color32::WHITE),
            );
        }
        for bus in &layer.buses {
            let pos = to_screen(bus.position);
            painter.circle(pos, BUS_RADIUS, hex_color(bus.color), Stroke::new(3.0, Color32::WHITE));
            painter.text(
                pos - egui::vec2(0.0, BUS_RADIUS + 2.0),
                Align2::CENTER_BOTTOM,
                &bus.route_number,
                FontId::proportional(11.0),
                Color32::from_gray(60),
            );
        }

        if let Some(bus) = viewport.open_popup().and_then(|id| layer.bus(id)) {
            Self::paint_popup(&painter, to_screen(bus.position), &bus.popup_lines());
        }

        // Stop details on hover, drawn above the bus popup
        if let Some(pointer) = response.hover_pos() {
            if let Some(stop) = Self::stop_at(&layer, pointer, &to_screen) {
                Self::paint_popup(&painter, to_screen(stop.position), &stop.popup_lines());
            }
        }

        if layer.is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No active routes to display",
                FontId::proportional(16.0),
                Color32::from_gray(110),
            );
        }

        Self::paint_legend(&painter, rect);

        let mut action = None;
        if response.clicked() {
            if let Some(pointer) = response.interact_pointer_pos() {
                action = match Self::bus_at(&layer, pointer, &to_screen) {
                    Some(id) => Some(MapAction::Select(id)),
                    None if viewport.open_popup().is_some() => Some(MapAction::Dismiss),
                    None => None,
                };
            }
        }

        ui.add_space(6.0);
        let summary = session.summary();
        ui.horizontal(|ui| {
            ui.label(format!("Total Routes: {}", summary.total_routes));
            ui.colored_label(hex_color(atd_map::SELECTED_COLOR), format!("Active: {}", summary.active_route_count));
        });

        action
    }

    fn bus_at(layer: &MapLayer, pointer: Pos2, to_screen: &dyn Fn(GeoPoint) -> Pos2) -> Option<RouteId> {
        layer
            .buses
            .iter()
            .map(|b| (b.route_id, to_screen(b.position).distance(pointer)))
            .filter(|(_, d)| *d <= CLICK_TOLERANCE)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    fn stop_at<'a>(
        layer: &'a MapLayer,
        pointer: Pos2,
        to_screen: &dyn Fn(GeoPoint) -> Pos2,
    ) -> Option<&'a StopMarker> {
        layer
            .stops
            .iter()
            .map(|s| (s, to_screen(s.position).distance(pointer)))
            .filter(|(_, d)| *d <= STOP_RADIUS + 3.0)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(s, _)| s)
    }

    fn paint_popup(painter: &egui::Painter, anchor: Pos2, lines: &[String]) {
        let line_height = 16.0;
        let size = egui::vec2(230.0, lines.len() as f32 * line_height + 12.0);
        let popup = egui::Rect::from_min_size(anchor - egui::vec2(size.x / 2.0, size.y + BUS_RADIUS + 18.0), size);

        painter.rect_filled(popup, 6.0, Color32::WHITE);
        painter.rect_stroke(popup, 6.0, Stroke::new(1.0, Color32::from_gray(180)));
        for (i, line) in lines.iter().enumerate() {
            let font = if i == 0 { FontId::proportional(13.0) } else { FontId::proportional(11.5) };
            painter.text(
                popup.left_top() + egui::vec2(8.0, 6.0 + i as f32 * line_height),
                Align2::LEFT_TOP,
                line,
                font,
                Color32::from_gray(40),
            );
        }
    }

    fn paint_legend(painter: &egui::Painter, rect: egui::Rect) {
        let entries = [
            (atd_map::SELECTED_COLOR, "Selected Route"),
            (atd_map::ROUTE_COLOR, "Active Routes"),
            (atd_map::NEXT_STOP_COLOR, "Next Stop"),
            (atd_map::STOP_COLOR, "Bus Stops"),
        ];
        let origin = rect.left_bottom() + egui::vec2(12.0, -(entries.len() as f32 * 16.0 + 30.0));
        let frame = egui::Rect::from_min_size(origin, egui::vec2(130.0, entries.len() as f32 * 16.0 + 22.0));
        painter.rect_filled(frame, 6.0, Color32::from_white_alpha(235));
        painter.text(
            frame.left_top() + egui::vec2(8.0, 4.0),
            Align2::LEFT_TOP,
            "Legend",
            FontId::proportional(11.0),
            Color32::from_gray(60),
        );
        for (i, (color, label)) in entries.iter().enumerate() {
            let y = frame.top() + 24.0 + i as f32 * 16.0;
            painter.circle_filled(egui::pos2(frame.left() + 14.0, y), 5.0, hex_color(color));
            painter.text(
                egui::pos2(frame.left() + 26.0, y),
                Align2::LEFT_CENTER,
                *label,
                FontId::proportional(11.0),
                Color32::from_gray(80),
            );
        }
    }

    /// Returns the route id of a clicked card.
    fn show_route_list(ui: &mut Ui, session: &DashboardSession) -> Option<RouteId> {
        ui.heading("Route Overview");
        ui.label("Browse available bus routes and select your route.");
        ui.separator();

        if session.routes.is_empty() {
            ui.label(RichText::new("No routes available").strong());
            ui.label("Routes will appear here when they become available");
            return None;
        }

        let groups = RouteGroups::from_routes(&session.routes);
        let selected = session.selection.selected();
        let mut clicked = None;

        ui.colored_label(
            hex_color(StatusBucket::Active.color()),
            RichText::new(format!("● {} Routes ({})", StatusBucket::Active.label(), groups.active.len())).strong(),
        );
        for route in &groups.active {
            if Self::show_route_card(ui, route, selected == Some(route.id)) {
                clicked = Some(route.id);
            }
        }

        if !groups.maintenance.is_empty() {
            ui.add_space(10.0);
            ui.colored_label(
                hex_color(StatusBucket::Maintenance.color()),
                RichText::new(format!("● {} ({})", StatusBucket::Maintenance.label(), groups.maintenance.len())).strong(),
            );
            for route in &groups.maintenance {
                egui::Frame::group(ui.style())
                    .fill(Color32::from_rgb(255, 251, 235))
                    .show(ui, |ui| {
                        ui.horizontal(|ui| {
                            ui.colored_label(
                                hex_color(StatusBucket::Maintenance.color()),
                                RichText::new(&route.route_number).size(16.0).strong(),
                            );
                            ui.vertical(|ui| {
                                ui.strong(&route.name);
                                ui.label("Under maintenance");
                            });
                        });
                    });
                ui.add_space(5.0);
            }
        }

        if !groups.other.is_empty() {
            ui.add_space(10.0);
            ui.strong(format!("● Other ({})", groups.other.len()));
            for route in &groups.other {
                let bucket = route.bucket();
                ui.horizontal(|ui| {
                    ui.colored_label(hex_color(bucket.color()), RichText::new(&route.route_number).strong());
                    ui.label(&route.name);
                    ui.colored_label(hex_color(bucket.color()), bucket.label());
                });
            }
        }

        let summary = session.summary();
        ui.add_space(10.0);
        ui.separator();
        ui.strong("Summary");
        ui.horizontal_wrapped(|ui| {
            ui.label(format!("Total Routes: {}", summary.total_routes));
            ui.label(format!("Active: {}", summary.active_route_count));
            ui.label(format!("Maintenance: {}", summary.maintenance_route_count));
            ui.label(format!("Total Capacity: {}", summary.total_capacity));
        });

        clicked
    }

    fn show_route_card(ui: &mut Ui, route: &RouteRecord, is_selected: bool) -> bool {
        let mut clicked = false;
        let fill = if is_selected {
            Color32::from_rgb(209, 250, 229)
        } else {
            Color32::from_rgb(240, 253, 244)
        };

        egui::Frame::group(ui.style()).fill(fill).show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.colored_label(
                    hex_color(StatusBucket::Active.color()),
                    RichText::new(&route.route_number).size(18.0).strong(),
                );

                ui.vertical(|ui| {
                    ui.strong(&route.name);
                    let p = &route.passengers;
                    ui.label(format!("{}/{} passengers", p.current, p.capacity));
                    let fraction = (p.utilization_percentage / 100.0).clamp(0.0, 1.0) as f32;
                    ui.add(
                        egui::ProgressBar::new(fraction)
                            .desired_width(160.0)
                            .text(format!("{}%", ATDDashboard::format_percentage(p.utilization_percentage))),
                    );
                    if route.has_incidents() {
                        ui.colored_label(
                            Color32::from_rgb(234, 88, 12),
                            format!("⚠️ {}", ATDDashboard::issue_label(route.incidents.len())),
                        );
                    }
                });

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Locate on map").clicked() {
                        clicked = true;
                    }
                    ui.small(&route.status);
                });
            });
        });
        ui.add_space(5.0);
        clicked
    }

    fn show_schedule(ui: &mut Ui, session: &DashboardSession) {
        ui.heading("Routes — Next Stop & Arrival");
        ui.label("Upcoming departures & arrivals for selected routes.");
        ui.separator();

        let rows = ATDDashboard::schedule_rows(&session.routes);
        if rows.is_empty() {
            ui.vertical_centered(|ui| {
                ui.label(RichText::new("🚌").size(28.0));
                ui.label(RichText::new("No routes available").strong());
                ui.label("Routes will appear here when they become available");
            });
            return;
        }

        TableBuilder::new(ui)
            .striped(true)
            .vscroll(false)
            .resizable(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(Column::auto().at_least(140.0))
            .columns(Column::auto(), 7)
            .column(Column::remainder())
            .header(22.0, |mut header| {
                for title in [
                    "Route", "Number", "Status", "Next Stop", "Arrival", "Driver", "Vehicle", "Plate", "Passengers",
                ] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for row in &rows {
                    body.row(22.0, |mut cells| {
                        cells.col(|ui| {
                            ui.label(&row.route_name);
                        });
                        cells.col(|ui| {
                            ui.label(&row.route_number);
                        });
                        cells.col(|ui| {
                            ui.colored_label(hex_color(row.bucket.color()), RichText::new(&row.status).strong());
                        });
                        cells.col(|ui| {
                            ui.label(&row.next_stop_name);
                        });
                        cells.col(|ui| {
                            ui.label(&row.arrival);
                        });
                        cells.col(|ui| {
                            ui.label(&row.driver);
                        });
                        cells.col(|ui| {
                            ui.label(&row.vehicle);
                        });
                        cells.col(|ui| {
                            ui.label(&row.license_plate);
                        });
                        cells.col(|ui| {
                            ui.label(&row.passengers);
                        });
                    });
                }
            });
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn hex_color(hex: &str) -> Color32 {
    let (r, g, b) = ATDViews::parse_hex_color(hex);
    Color32::from_rgb(r, g, b)
}

// ============================================================================
// Public entry point
// ============================================================================

pub fn run_gui(config: DashboardConfig) -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Amana Transit Dashboard",
        options,
        Box::new(|cc| Ok(Box::new(ATDApp::new(cc, config)))),
    )
}
