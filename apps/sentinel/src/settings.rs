//! Host-level settings. Everything a module or service reads arrives through
//! its own settings payload; nothing here is process-global.

use sentinel_core::{ModuleSettings, PriorityConfig, ServiceSettings};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Bus topics shared between the feed, the screens and the host.
pub mod topics {
    pub const DETECTION: &str = "services.mqtt.detection";
    pub const FLIGHTS: &str = "services.mqtt.flights";
    pub const STATUS: &str = "services.mqtt.status";
    pub const RESTART: &str = "system.restart";
    pub const ALERT: &str = "ui.alert";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreSettings {
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Module to show first; "auto" means the first registered module
    #[serde(default = "default_startup_screen")]
    pub startup_screen: String,
    #[serde(default = "default_width")]
    pub screen_width: usize,
}

fn default_fps() -> u32 {
    30
}

fn default_startup_screen() -> String {
    "camera".to_string()
}

fn default_width() -> usize {
    48
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            startup_screen: default_startup_screen(),
            screen_width: default_width(),
        }
    }
}

/// Everything the host needs to bootstrap (and re-bootstrap) the dashboard.
#[derive(Debug, Clone)]
pub struct Settings {
    pub core: CoreSettings,
    pub modules: Vec<(String, ModuleSettings)>,
    pub services: Vec<(String, ServiceSettings)>,
    pub priorities: PriorityConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            core: CoreSettings::default(),
            modules: default_modules(),
            services: default_services(),
            priorities: PriorityConfig::stock(),
        }
    }
}

pub fn default_modules() -> Vec<(String, ModuleSettings)> {
    vec![
        (
            "camera".to_string(),
            ModuleSettings::new(
                "camera",
                json!({
                    "camera_name": "default",
                    "bbox_delay": 0.4,
                    "zoom_labels": ["person", "car"],
                    "alert_zones": { "warning": ["street", "driveway"], "danger": ["porch"] },
                }),
            ),
        ),
        (
            "radar".to_string(),
            ModuleSettings::new(
                "radar",
                json!({
                    "map_latitude": 0.0,
                    "map_longitude": 0.0,
                    "min_flight_altitude_ft": 1000,
                    "flight_screen_timeout": 10,
                }),
            ),
        ),
        (
            "neo_tracker".to_string(),
            ModuleSettings::new("neo_tracker", json!({})),
        ),
        (
            "eonet_globe".to_string(),
            ModuleSettings::new("eonet_globe", json!({})),
        ),
    ]
}

pub fn default_services() -> Vec<(String, ServiceSettings)> {
    vec![(
        "feed".to_string(),
        ServiceSettings::new("scripted_feed", json!({ "loop": true, "script": demo_script() })),
    )]
}

/// A short replay: a person walks up the driveway onto the porch, a flight
/// passes overhead, then everything goes quiet.
pub fn demo_script() -> Value {
    json!([
        { "delay": 2.0, "topic": topics::DETECTION, "payload": {
            "type": "new",
            "after": { "id": "evt-1", "camera": "default", "label": "person", "score": 0.81,
                       "entered_zones": ["driveway"] } } },
        { "delay": 4.0, "topic": topics::DETECTION, "payload": {
            "type": "update",
            "after": { "id": "evt-1", "camera": "default", "label": "person", "score": 0.92,
                       "entered_zones": ["driveway", "porch"] } } },
        { "delay": 6.0, "topic": topics::DETECTION, "payload": {
            "type": "end",
            "after": { "id": "evt-1", "camera": "default", "label": "person" } } },
        { "delay": 3.0, "topic": topics::FLIGHTS, "payload": [
            { "id": "BAW123", "callsign": "BAW123", "altitude": 12000,
              "latitude": 0.05, "longitude": 0.02 },
            { "id": "G-ABCD", "callsign": "G-ABCD", "altitude": 600,
              "latitude": 0.01, "longitude": 0.01 } ] },
        { "delay": 25.0, "topic": topics::FLIGHTS, "payload": [] },
    ])
}
