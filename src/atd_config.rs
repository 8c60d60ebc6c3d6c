// Command-line and environment configuration for the dashboard
use crate::atd_models::{ATDError, ATDModels, GeoPoint, Result};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use reqwest::Url;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "atd", version, about = "Amana real-time transit dashboard")]
pub struct Cli {
    /// Transit feed endpoint returning `{ "bus_lines": [...] }`
    #[arg(long, env = "ATD_FEED_URL", default_value = ATDModels::DEFAULT_FEED_URL)]
    pub feed_url: String,

    /// IANA time zone used for the service day
    #[arg(long, env = "ATD_TIMEZONE", default_value = "Asia/Kuala_Lumpur")]
    pub timezone: String,

    /// HTTP timeout in seconds (client default when omitted)
    #[arg(long, env = "ATD_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Interactive terminal menu (default)
    Menu,
    /// Print the status header and aggregate figures
    Summary {
        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the route browser
    Routes,
    /// Print next stop and arrival for every route
    Schedule,
    /// Print the map layer
    Map {
        /// Emit the layer as a GeoJSON FeatureCollection
        #[arg(long)]
        geojson: bool,
    },
    /// Open the desktop dashboard
    Gui,
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Map defaults applied before any route is selected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapDefaults {
    pub center: GeoPoint,
    pub zoom: f64,
    /// Zoom used when flying to a selected route.
    pub focus_zoom: f64,
    /// Duration of the fly-to animation in the window.
    pub fly_duration: Duration,
}

impl Default for MapDefaults {
    fn default() -> Self {
        Self {
            // Kuala Lumpur
            center: GeoPoint { latitude: 3.1390, longitude: 101.6869 },
            zoom: 11.0,
            focus_zoom: 13.0,
            fly_duration: Duration::from_millis(800),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub feed_url: Url,
    pub timezone: Tz,
    pub request_timeout: Option<Duration>,
    pub map: MapDefaults,
}

impl DashboardConfig {
    pub fn new(feed_url: &str, timezone: &str, timeout_secs: Option<u64>) -> Result<Self> {
        let feed_url = Url::parse(feed_url)
            .map_err(|e| ATDError::Config(format!("Invalid feed URL '{}': {}", feed_url, e)))?;
        if !matches!(feed_url.scheme(), "http" | "https") {
            return Err(ATDError::Config(format!(
                "Feed URL must use http or https, got '{}'",
                feed_url.scheme()
            )));
        }

        let timezone: Tz = timezone
            .parse()
            .map_err(|e| ATDError::Config(format!("Unknown time zone '{}': {}", timezone, e)))?;

        let request_timeout = match timeout_secs {
            Some(0) => return Err(ATDError::Config("Timeout must be at least 1 second".to_string())),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(Self {
            feed_url,
            timezone,
            request_timeout,
            map: MapDefaults::default(),
        })
    }

    pub fn from_cli(cli: &Cli) -> Result<Self> {
        Self::new(&cli.feed_url, &cli.timezone, cli.timeout_secs)
    }
}
