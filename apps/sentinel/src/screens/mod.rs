//! The dashboard's screen modules and their factory table.

mod camera;
mod eonet;
mod neo;
mod radar;

pub use camera::CameraScreen;
pub use eonet::EonetGlobeScreen;
pub use neo::NeoTrackerScreen;
pub use radar::RadarScreen;

use crate::host::SentinelApp;
use anyhow::Context;
use sentinel_core::{ModuleFactories, ScreenModule};
use serde::de::DeserializeOwned;
use serde_json::Value;

type BoxedScreen = Box<dyn ScreenModule<SentinelApp>>;

/// Factory keys usable as module targets in the settings.
pub fn module_factories() -> ModuleFactories<SentinelApp> {
    let mut factories = ModuleFactories::new();
    factories.register("camera", |settings: &Value| {
        Ok(Box::new(CameraScreen::from_settings(settings)?) as BoxedScreen)
    });
    factories.register("radar", |settings: &Value| {
        Ok(Box::new(RadarScreen::from_settings(settings)?) as BoxedScreen)
    });
    factories.register("neo_tracker", |settings: &Value| {
        Ok(Box::new(NeoTrackerScreen::from_settings(settings)?) as BoxedScreen)
    });
    factories.register("eonet_globe", |settings: &Value| {
        Ok(Box::new(EonetGlobeScreen::from_settings(settings)?) as BoxedScreen)
    });
    factories
}

/// Deserialize a screen's settings payload; a missing payload means defaults.
fn parse_settings<T: DeserializeOwned + Default>(screen: &str, settings: &Value) -> anyhow::Result<T> {
    if settings.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(settings.clone()).with_context(|| format!("invalid {} settings", screen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_default_module_has_a_factory() {
        let factories = module_factories();
        for (_, settings) in crate::settings::default_modules() {
            assert!(factories.create_from_config(&settings).is_ok(), "{}", settings.target);
        }
    }

    #[test]
    fn test_bad_settings_fail_construction() {
        let factories = module_factories();
        let err = factories
            .create("radar", &json!({ "flight_screen_timeout": "soon" }))
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("invalid radar settings"));
    }
}
