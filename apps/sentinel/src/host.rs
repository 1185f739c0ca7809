//! The application object shared with modules and services.

use crate::surface::{InputEvent, TextSurface};
use sentinel_core::{EventBus, Host, Payload};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_TITLE: &str = "S.E.N.T.I.N.E.L. v1.0";

/// Header state driven by `ui.alert` and screen `on_show` hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub title: String,
    pub alert_level: String,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            alert_level: "none".to_string(),
        }
    }
}

pub struct SentinelApp {
    bus: Arc<EventBus>,
    header: Mutex<Header>,
    current_screen: Mutex<Option<String>>,
    reset_pending: AtomicBool,
}

impl SentinelApp {
    pub fn new(bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            header: Mutex::new(Header::default()),
            current_screen: Mutex::new(None),
            reset_pending: AtomicBool::new(false),
        })
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn header(&self) -> Header {
        self.header.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_title(&self, title: &str) {
        self.header.lock().unwrap_or_else(PoisonError::into_inner).title = title.to_string();
    }

    /// Apply a `ui.alert` payload: either a bare level string or
    /// `{ "level": ..., "title": ... }`.
    pub fn apply_alert(&self, payload: &Payload) {
        let (level, title) = match payload {
            Payload::String(level) => (level.as_str(), None),
            Payload::Object(map) => (
                map.get("level").and_then(Payload::as_str).unwrap_or("none"),
                map.get("title").and_then(Payload::as_str),
            ),
            _ => ("none", None),
        };
        let fallback = match level {
            "danger" => "DANGER",
            "warning" => "WARNING",
            _ => DEFAULT_TITLE,
        };

        let mut header = self.header.lock().unwrap_or_else(PoisonError::into_inner);
        header.alert_level = level.to_string();
        header.title = title.unwrap_or(fallback).to_string();
    }

    pub fn current_screen(&self) -> Option<String> {
        self.current_screen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_reset(&self) {
        self.reset_pending.store(true, Ordering::Release);
    }

    /// Returns true once per requested reset.
    pub fn take_reset(&self) -> bool {
        self.reset_pending.swap(false, Ordering::AcqRel)
    }

    /// Frame the surface under a header line.
    pub fn compose(&self, surface: &TextSurface) -> String {
        let header = self.header();
        let screen = self.current_screen().unwrap_or_else(|| "--".to_string());
        let mut out = format!(
            "[{}] {} <{}> {}\n",
            chrono::Local::now().format("%H:%M:%S"),
            header.title,
            header.alert_level,
            screen
        );
        if surface.is_empty() {
            out.push_str("NO SIGNAL\n");
        }
        for row in surface.rows() {
            out.push_str(row);
            out.push('\n');
        }
        out
    }
}

impl Host for SentinelApp {
    type Surface = TextSurface;
    type Event = InputEvent;

    fn set_current_screen(&self, name: &str) {
        *self
            .current_screen
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(name.to_string());
    }

    fn event_bus(&self) -> Option<Arc<EventBus>> {
        Some(Arc::clone(&self.bus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alert_payload_forms() {
        let app = SentinelApp::new(Arc::new(EventBus::new()));

        app.apply_alert(&json!("danger"));
        assert_eq!(app.header().title, "DANGER");
        assert_eq!(app.header().alert_level, "danger");

        app.apply_alert(&json!({ "level": "warning", "title": "DRIVEWAY" }));
        assert_eq!(app.header().title, "DRIVEWAY");

        app.apply_alert(&json!(null));
        assert_eq!(app.header(), Header::default());
    }

    #[test]
    fn test_reset_flag_is_taken_once() {
        let app = SentinelApp::new(Arc::new(EventBus::new()));
        assert!(!app.take_reset());
        app.request_reset();
        app.request_reset();
        assert!(app.take_reset());
        assert!(!app.take_reset());
    }
}
