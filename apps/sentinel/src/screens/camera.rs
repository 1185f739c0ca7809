//! Security camera screen: tracks detections and raises alert levels.

use crate::host::SentinelApp;
use crate::settings::topics;
use crate::surface::{InputEvent, TextSurface};
use sentinel_core::{EventBus, ModuleContext, ScreenModule, StateReport, StateReporter, SubscriptionId};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

/// Re-report an ongoing alert this often so it outlives the state timeout.
const REFRESH_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub camera_name: String,
    /// Seconds a detection is held back so its box lines up with the video
    pub bbox_delay: f64,
    /// Only these labels count toward the alert level
    pub zoom_labels: Vec<String>,
    pub alert_zones: AlertZones,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            camera_name: "default".to_string(),
            bbox_delay: 0.4,
            zoom_labels: vec!["person".to_string(), "car".to_string()],
            alert_zones: AlertZones::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertZones {
    pub warning: Vec<String>,
    pub danger: Vec<String>,
}

impl Default for AlertZones {
    fn default() -> Self {
        Self {
            warning: vec!["street".to_string(), "driveway".to_string()],
            danger: vec!["porch".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    None,
    Warning,
    Danger,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Warning => "warning",
            AlertLevel::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Detection {
    id: String,
    camera: String,
    label: String,
    score: f64,
    entered_zones: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetectionEvent {
    #[serde(rename = "type")]
    kind: String,
    after: Option<Detection>,
}

/// Detections queued by the bus handler, stamped with the screen's clock.
#[derive(Default)]
struct Inbox {
    elapsed: f64,
    pending: VecDeque<(f64, Value)>,
}

pub struct CameraScreen {
    settings: CameraSettings,
    inbox: Arc<Mutex<Inbox>>,
    detections: BTreeMap<String, Detection>,
    alert_level: AlertLevel,
    since_report: f64,
    last_event_time: String,
    target_label: String,
    target_score: String,
    app: Option<Arc<SentinelApp>>,
    bus: Option<Arc<EventBus>>,
    reporter: Option<StateReporter>,
    subscription: Option<SubscriptionId>,
}

impl CameraScreen {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            inbox: Arc::new(Mutex::new(Inbox::default())),
            detections: BTreeMap::new(),
            alert_level: AlertLevel::None,
            since_report: 0.0,
            last_event_time: "--".to_string(),
            target_label: "--".to_string(),
            target_score: "--".to_string(),
            app: None,
            bus: None,
            reporter: None,
            subscription: None,
        }
    }

    pub fn from_settings(settings: &Value) -> anyhow::Result<Self> {
        Ok(Self::new(super::parse_settings("camera", settings)?))
    }

    fn drain_ready(&self, dt: f64) -> Vec<Value> {
        let mut inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
        inbox.elapsed += dt;
        let now = inbox.elapsed;
        let mut ready = Vec::new();
        while inbox
            .pending
            .front()
            .is_some_and(|(queued, _)| now - queued > self.settings.bbox_delay)
        {
            if let Some((_, payload)) = inbox.pending.pop_front() {
                ready.push(payload);
            }
        }
        ready
    }

    fn apply(&mut self, payload: Value) {
        let event: DetectionEvent = match serde_json::from_value(payload) {
            Ok(event) => event,
            Err(e) => {
                log::debug!("camera: dropping malformed detection: {}", e);
                return;
            }
        };
        let Some(detection) = event.after else {
            return;
        };
        if detection.camera != self.settings.camera_name || detection.id.is_empty() {
            return;
        }

        if event.kind == "end" {
            self.detections.remove(&detection.id);
            return;
        }
        self.last_event_time = chrono::Local::now().format("%H:%M:%S").to_string();
        self.target_label = detection.label.to_uppercase();
        self.target_score = format!("{:.1}%", detection.score * 100.0);
        self.detections.insert(detection.id.clone(), detection);
    }

    /// Danger zones beat warning zones; labels outside `zoom_labels` are ignored.
    fn evaluate(&self) -> AlertLevel {
        let zones = &self.settings.alert_zones;
        self.detections
            .values()
            .filter(|d| self.settings.zoom_labels.contains(&d.label))
            .map(|d| {
                if d.entered_zones.iter().any(|z| zones.danger.contains(z)) {
                    AlertLevel::Danger
                } else if d.entered_zones.iter().any(|z| zones.warning.contains(z)) {
                    AlertLevel::Warning
                } else {
                    AlertLevel::None
                }
            })
            .max()
            .unwrap_or(AlertLevel::None)
    }

    fn report(&mut self) {
        self.since_report = 0.0;
        let Some(reporter) = &self.reporter else {
            return;
        };
        let result = match self.alert_level {
            AlertLevel::None => reporter.clear_state(),
            level => reporter.report_state(
                Some(level.as_str()),
                StateReport::new()
                    .with("detections", self.detections.len())
                    .with("target", self.target_label.clone()),
            ),
        };
        if let Err(e) = result {
            log::warn!("camera: unable to report state: {}", e);
        }
    }
}

impl ScreenModule<SentinelApp> for CameraScreen {
    fn on_load(&mut self, cx: &ModuleContext<SentinelApp>) -> sentinel_core::Result<()> {
        let bus = cx
            .event_bus()
            .ok_or_else(|| anyhow::anyhow!("camera needs an event bus"))?;
        let inbox = Arc::clone(&self.inbox);
        let id = bus.subscribe(topics::DETECTION, move |payload| {
            let mut inbox = inbox.lock().unwrap_or_else(PoisonError::into_inner);
            let stamp = inbox.elapsed;
            inbox.pending.push_back((stamp, payload.clone()));
            Ok(())
        });

        self.subscription = Some(id);
        self.bus = Some(bus);
        self.app = Some(Arc::clone(cx.app()));
        self.reporter = Some(cx.reporter());
        Ok(())
    }

    fn on_unload(&mut self) -> sentinel_core::Result<()> {
        if let (Some(bus), Some(id)) = (self.bus.take(), self.subscription.take()) {
            bus.unsubscribe(topics::DETECTION, id);
        }
        self.reporter = None;
        self.app = None;
        Ok(())
    }

    fn on_show(&mut self) {
        if let Some(app) = &self.app {
            app.set_title("S.E.N.T.I.N.E.L. // CAMERA");
        }
    }

    fn update(&mut self, dt: f64) {
        for payload in self.drain_ready(dt) {
            self.apply(payload);
        }

        let level = self.evaluate();
        if level != self.alert_level {
            log::info!("camera: alert level {} -> {}", self.alert_level.as_str(), level.as_str());
            self.alert_level = level;
            self.report();
            if let Some(bus) = &self.bus {
                bus.publish(topics::ALERT, json!({ "level": level.as_str() }));
            }
            return;
        }

        self.since_report += dt;
        if self.alert_level != AlertLevel::None && self.since_report >= REFRESH_SECONDS {
            self.report();
        }
    }

    fn render(&mut self, surface: &mut TextSurface) {
        surface.field("CAMERA:", self.settings.camera_name.to_uppercase());
        surface.field("ALERT:", self.alert_level.as_str().to_uppercase());
        surface.field("LAST EVENT:", &self.last_event_time);
        surface.field("TARGET:", &self.target_label);
        surface.field("CONFIDENCE:", &self.target_score);
        surface.rule();
        if self.detections.is_empty() {
            surface.line("NO ACTIVE DETECTIONS");
        }
        for d in self.detections.values() {
            surface.line(format!(
                "{} [{:.0}%] {}",
                d.label.to_uppercase(),
                d.score * 100.0,
                d.entered_zones.join(",")
            ));
        }
    }

    fn handle_event(&mut self, event: &InputEvent) {
        if *event == InputEvent::Key('x') {
            log::info!("camera: clearing {} detections", self.detections.len());
            self.detections.clear();
        }
    }
}
