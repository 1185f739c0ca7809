//! Natural-event globe: an idle screen showing events on the visible hemisphere.

use crate::host::SentinelApp;
use crate::surface::TextSurface;
use sentinel_core::{ModuleContext, ScreenModule};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct NaturalEvent {
    pub title: String,
    #[serde(default)]
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EonetSettings {
    pub rotation_speed_deg: f64,
    pub events: Vec<NaturalEvent>,
}

impl Default for EonetSettings {
    fn default() -> Self {
        Self {
            rotation_speed_deg: 15.0,
            events: Vec::new(),
        }
    }
}

pub struct EonetGlobeScreen {
    settings: EonetSettings,
    /// Longitude facing the viewer
    center_lon: f64,
    app: Option<Arc<SentinelApp>>,
}

/// Signed difference `a - b` folded into [-180, 180).
fn lon_delta(a: f64, b: f64) -> f64 {
    (a - b + 180.0).rem_euclid(360.0) - 180.0
}

impl EonetGlobeScreen {
    pub fn new(settings: EonetSettings) -> Self {
        Self {
            settings,
            center_lon: 0.0,
            app: None,
        }
    }

    pub fn from_settings(settings: &Value) -> anyhow::Result<Self> {
        Ok(Self::new(super::parse_settings("eonet_globe", settings)?))
    }

    fn visible(&self) -> impl Iterator<Item = &NaturalEvent> {
        self.settings
            .events
            .iter()
            .filter(|e| lon_delta(e.longitude, self.center_lon).abs() < 90.0)
    }
}

impl ScreenModule<SentinelApp> for EonetGlobeScreen {
    fn on_load(&mut self, cx: &ModuleContext<SentinelApp>) -> sentinel_core::Result<()> {
        self.app = Some(Arc::clone(cx.app()));
        Ok(())
    }

    fn on_unload(&mut self) -> sentinel_core::Result<()> {
        self.app = None;
        Ok(())
    }

    fn on_show(&mut self) {
        if let Some(app) = &self.app {
            app.set_title("S.E.N.T.I.N.E.L. // EONET");
        }
    }

    fn update(&mut self, dt: f64) {
        self.center_lon = lon_delta(self.center_lon + self.settings.rotation_speed_deg * dt, 0.0);
    }

    fn render(&mut self, surface: &mut TextSurface) {
        surface.field("FACING:", format!("{:+.0} LON", self.center_lon));
        surface.field("EVENTS:", self.settings.events.len().to_string());
        surface.rule();
        let mut shown = 0;
        for event in self.visible() {
            surface.line(format!(
                "{} [{}] {:+.1},{:+.1}",
                event.title.to_uppercase(),
                event.category,
                event.latitude,
                event.longitude
            ));
            shown += 1;
        }
        if shown == 0 {
            surface.line("NO EVENTS IN VIEW");
        }
    }
}
