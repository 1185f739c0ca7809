//! Near-earth object tracker: an idle screen.

use crate::host::SentinelApp;
use crate::surface::TextSurface;
use sentinel_core::{ModuleContext, ScreenModule};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct NeoObject {
    pub name: String,
    pub miss_distance_km: f64,
    #[serde(default)]
    pub diameter_m: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NeoSettings {
    pub rotation_speed_deg: f64,
    pub objects: Vec<NeoObject>,
}

impl Default for NeoSettings {
    fn default() -> Self {
        Self {
            rotation_speed_deg: 20.0,
            objects: Vec::new(),
        }
    }
}

pub struct NeoTrackerScreen {
    settings: NeoSettings,
    rotation_deg: f64,
    app: Option<Arc<SentinelApp>>,
}

impl NeoTrackerScreen {
    pub fn new(settings: NeoSettings) -> Self {
        Self {
            settings,
            rotation_deg: 0.0,
            app: None,
        }
    }

    pub fn from_settings(settings: &Value) -> anyhow::Result<Self> {
        Ok(Self::new(super::parse_settings("neo_tracker", settings)?))
    }

    fn closest(&self) -> Option<&NeoObject> {
        self.settings
            .objects
            .iter()
            .min_by(|a, b| a.miss_distance_km.total_cmp(&b.miss_distance_km))
    }
}

impl ScreenModule<SentinelApp> for NeoTrackerScreen {
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
            app.set_title("S.E.N.T.I.N.E.L. // DEEP SPACE");
        }
    }

    // Keeps spinning off-screen so the sphere does not jump on show.
    fn update(&mut self, dt: f64) {
        self.rotation_deg = (self.rotation_deg + self.settings.rotation_speed_deg * dt).rem_euclid(360.0);
    }

    fn render(&mut self, surface: &mut TextSurface) {
        surface.field("ROTATION:", format!("{:03.0}", self.rotation_deg));
        surface.field("TRACKED:", self.settings.objects.len().to_string());
        surface.rule();
        match self.closest() {
            Some(neo) => {
                surface.field("CLOSEST:", neo.name.to_uppercase());
                surface.field("MISS DIST:", format!("{:.0} KM", neo.miss_distance_km));
                surface.field("DIAMETER:", format!("{:.0} M", neo.diameter_m));
            }
            None => surface.line("NO DATA"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closest_object_and_rotation() {
        let mut screen = NeoTrackerScreen::from_settings(&json!({
            "rotation_speed_deg": 100.0,
            "objects": [
                { "name": "2024 AB", "miss_distance_km": 900000.0 },
                { "name": "Apophis", "miss_distance_km": 38000.0, "diameter_m": 370.0 },
            ],
        }))
        .unwrap();
        assert_eq!(screen.closest().map(|n| n.name.as_str()), Some("Apophis"));

        screen.update(4.0);
        assert!((screen.rotation_deg - 40.0).abs() < 1e-9);
    }
}
