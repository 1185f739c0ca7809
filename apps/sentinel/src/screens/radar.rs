//! Overhead flight radar.

use crate::geo::haversine_km;
use crate::host::SentinelApp;
use crate::settings::topics;
use crate::surface::TextSurface;
use sentinel_core::{EventBus, ModuleContext, ScreenModule, StateReport, StateReporter, SubscriptionId};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RadarSettings {
    pub map_latitude: f64,
    pub map_longitude: f64,
    /// Flights below this altitude are ignored
    pub min_flight_altitude_ft: f64,
    /// How long a sighting keeps the radar on screen without a new update
    pub flight_screen_timeout: f64,
}

impl Default for RadarSettings {
    fn default() -> Self {
        Self {
            map_latitude: 0.0,
            map_longitude: 0.0,
            min_flight_altitude_ft: 1000.0,
            flight_screen_timeout: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Flight {
    pub id: Option<String>,
    pub callsign: Option<String>,
    pub altitude: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip)]
    pub distance_km: f64,
}

#[derive(Debug, Default)]
struct Traffic {
    flights: Vec<Flight>,
    closest: Option<Flight>,
}

/// Accept a list of flights, a single flight, or anything else as "no traffic".
fn parse_flights(payload: &Value) -> Vec<Flight> {
    let items: Vec<Value> = match payload {
        Value::Array(items) => items.clone(),
        Value::Object(_) => vec![payload.clone()],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

impl Traffic {
    fn refresh(&mut self, settings: &RadarSettings, payload: &Value) {
        let mut flights: Vec<Flight> = parse_flights(payload)
            .into_iter()
            .filter(|f| f.altitude.is_some_and(|alt| alt >= settings.min_flight_altitude_ft))
            .collect();
        for flight in &mut flights {
            flight.distance_km = haversine_km(
                settings.map_latitude,
                settings.map_longitude,
                flight.latitude,
                flight.longitude,
            );
        }
        self.closest = flights
            .iter()
            .min_by(|a, b| a.distance_km.total_cmp(&b.distance_km))
            .cloned();
        self.flights = flights;
    }
}

/// Report `air-traffic` for the closest flight, or clear when the sky is empty.
fn report_traffic(reporter: &StateReporter, settings: &RadarSettings, traffic: &Traffic) -> sentinel_core::Result<()> {
    match &traffic.closest {
        Some(closest) => {
            let report = StateReport::new()
                .expires_in(settings.flight_screen_timeout)
                .with("flights", traffic.flights.len())
                .with("callsign", closest.callsign.clone().unwrap_or_default())
                .with("distance_km", closest.distance_km);
            reporter.report_state(Some("air-traffic"), report)?;
        }
        None => reporter.clear_state()?,
    }
    Ok(())
}

pub struct RadarScreen {
    settings: Arc<RadarSettings>,
    traffic: Arc<Mutex<Traffic>>,
    sweep_deg: f64,
    app: Option<Arc<SentinelApp>>,
    bus: Option<Arc<EventBus>>,
    subscription: Option<SubscriptionId>,
}

impl RadarScreen {
    pub fn new(settings: RadarSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            traffic: Arc::new(Mutex::new(Traffic::default())),
            sweep_deg: 0.0,
            app: None,
            bus: None,
            subscription: None,
        }
    }

    pub fn from_settings(settings: &Value) -> anyhow::Result<Self> {
        Ok(Self::new(super::parse_settings("radar", settings)?))
    }
}

impl ScreenModule<SentinelApp> for RadarScreen {
    fn on_load(&mut self, cx: &ModuleContext<SentinelApp>) -> sentinel_core::Result<()> {
        let bus = cx
            .event_bus()
            .ok_or_else(|| anyhow::anyhow!("radar needs an event bus"))?;
        let settings = Arc::clone(&self.settings);
        let traffic = Arc::clone(&self.traffic);
        let reporter = cx.reporter();
        // Runs on the publishing thread.
        let id = bus.subscribe(topics::FLIGHTS, move |payload| {
            let mut traffic = traffic.lock().unwrap_or_else(PoisonError::into_inner);
            traffic.refresh(&settings, payload);
            report_traffic(&reporter, &settings, &traffic)
        });

        self.subscription = Some(id);
        self.bus = Some(bus);
        self.app = Some(Arc::clone(cx.app()));
        Ok(())
    }

    fn on_unload(&mut self) -> sentinel_core::Result<()> {
        if let (Some(bus), Some(id)) = (self.bus.take(), self.subscription.take()) {
            bus.unsubscribe(topics::FLIGHTS, id);
        }
        self.app = None;
        Ok(())
    }

    fn on_show(&mut self) {
        if let Some(app) = &self.app {
            app.set_title("S.E.N.T.I.N.E.L. // RADAR");
        }
    }

    fn update(&mut self, dt: f64) {
        self.sweep_deg = (self.sweep_deg + 90.0 * dt) % 360.0;
    }

    fn render(&mut self, surface: &mut TextSurface) {
        let traffic = self.traffic.lock().unwrap_or_else(PoisonError::into_inner);
        surface.field("SWEEP:", format!("{:03.0}", self.sweep_deg));
        surface.field("CONTACTS:", traffic.flights.len().to_string());
        surface.rule();
        match &traffic.closest {
            Some(flight) => {
                surface.field(
                    "CALLSIGN:",
                    flight.callsign.as_deref().or(flight.id.as_deref()).unwrap_or("UNKNOWN"),
                );
                surface.field("ALTITUDE:", format!("{:.0} FT", flight.altitude.unwrap_or_default()));
                surface.field("DISTANCE:", format!("{:.1} KM", flight.distance_km));
            }
            None => surface.line("NO DATA"),
        }
    }
}
