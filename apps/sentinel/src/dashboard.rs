//! Owns the manager, the services and the drawing surface, and drives one
//! frame at a time.

use crate::host::SentinelApp;
use crate::screens::module_factories;
use crate::services::service_factories;
use crate::settings::{topics, Settings};
use crate::surface::{InputEvent, TextSurface};
use sentinel_core::{bootstrap, EventBus, ModuleFactories, ModuleManager, ServiceManager, SubscriptionId};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub struct Dashboard {
    app: Arc<SentinelApp>,
    settings: Settings,
    factories: ModuleFactories<SentinelApp>,
    manager: ModuleManager<SentinelApp>,
    services: ServiceManager<SentinelApp>,
    surface: TextSurface,
    host_subscriptions: Vec<(&'static str, SubscriptionId)>,
}

impl Dashboard {
    pub fn new(settings: Settings) -> Self {
        let bus = Arc::new(EventBus::new());
        let app = SentinelApp::new(Arc::clone(&bus));

        // Handlers hold the app weakly; the app owns the bus.
        let restart_app = Arc::downgrade(&app);
        let restart = bus.subscribe(topics::RESTART, move |_| {
            if let Some(app) = restart_app.upgrade() {
                log::info!("restart requested; flagging for reset");
                app.request_reset();
            }
            Ok(())
        });
        let alert_app = Arc::downgrade(&app);
        let alert = bus.subscribe(topics::ALERT, move |payload| {
            if let Some(app) = alert_app.upgrade() {
                app.apply_alert(payload);
            }
            Ok(())
        });

        let factories = module_factories();
        let manager = Self::build_manager(&app, &settings, &factories);
        let services = ServiceManager::new(Arc::clone(&app), settings.services.clone(), service_factories());
        let surface = TextSurface::new(settings.core.screen_width);

        Self {
            app,
            settings,
            factories,
            manager,
            services,
            surface,
            host_subscriptions: vec![(topics::RESTART, restart), (topics::ALERT, alert)],
        }
    }

    fn build_manager(
        app: &Arc<SentinelApp>,
        settings: &Settings,
        factories: &ModuleFactories<SentinelApp>,
    ) -> ModuleManager<SentinelApp> {
        bootstrap(
            Arc::clone(app),
            &settings.modules,
            factories,
            settings.priorities.clone(),
            Some(settings.core.startup_screen.as_str()),
        )
    }

    pub fn app(&self) -> &Arc<SentinelApp> {
        &self.app
    }

    pub fn manager(&self) -> &ModuleManager<SentinelApp> {
        &self.manager
    }

    pub fn start_services(&mut self) -> usize {
        self.services.start_all()
    }

    /// One frame: a pending reset replaces the frame; otherwise arbitrate
    /// and redraw the active screen.
    pub fn frame(&mut self, dt: f64) {
        if self.app.take_reset() {
            self.hard_reset();
            return;
        }
        self.manager.update(dt);
        self.surface.clear();
        self.manager.render(&mut self.surface);
    }

    pub fn compose(&self) -> String {
        self.app.compose(&self.surface)
    }

    /// Keyboard input: a digit jumps to that module, `r` requests a
    /// restart, `q` quits, anything else goes to the active screen.
    pub fn input(&mut self, line: &str) -> Control {
        let line = line.trim();
        let mut chars = line.chars();
        let (Some(key), None) = (chars.next(), chars.next()) else {
            if line.is_empty() {
                self.manager.handle_event(&InputEvent::Tap);
            }
            return Control::Continue;
        };

        match key {
            'q' => return Control::Quit,
            'r' => {
                self.app.bus().publish(topics::RESTART, serde_json::Value::Null);
            }
            '1'..='9' => {
                let index = key as usize - '1' as usize;
                if let Some(name) = self.manager.module_names().get(index).cloned() {
                    self.manager.set_active(&name);
                }
            }
            other => self.manager.handle_event(&InputEvent::Key(other)),
        }
        Control::Continue
    }

    /// Stop services, rebuild every module from settings, restart services.
    pub fn hard_reset(&mut self) {
        log::info!("executing hard reset");
        self.services.stop_all();
        self.manager.shutdown();
        self.manager = Self::build_manager(&self.app, &self.settings, &self.factories);
        let started = self.services.start_all();
        log::info!("hard reset complete ({} service(s) restarted)", started);
    }

    pub fn shutdown(&mut self) {
        log::info!("closing dashboard");
        self.manager.shutdown();
        self.services.stop_all();
        for (topic, id) in self.host_subscriptions.drain(..) {
            self.app.bus().unsubscribe(topic, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quiet_settings() -> Settings {
        Settings {
            services: Vec::new(),
            ..Settings::default()
        }
    }

    fn detection(kind: &str, zones: &[&str]) -> serde_json::Value {
        json!({
            "type": kind,
            "after": { "id": "evt", "camera": "default", "label": "person", "score": 0.9,
                       "entered_zones": zones },
        })
    }

    #[test]
    fn test_startup_screen_and_idle_cycle() {
        let mut dash = Dashboard::new(quiet_settings());
        assert_eq!(dash.manager().current_screen(), Some("camera"));
        assert_eq!(
            dash.manager().idle_cycle(),
            &["camera".to_string(), "neo_tracker".to_string(), "eonet_globe".to_string()]
        );

        for _ in 0..21 {
            dash.frame(1.0);
        }
        assert_eq!(dash.manager().current_screen(), Some("neo_tracker"));
        assert_eq!(dash.app().header().title, "S.E.N.T.I.N.E.L. // DEEP SPACE");
        assert!(dash.compose().contains("ROTATION:"));
    }

    #[test]
    fn test_porch_detection_takes_over_and_alerts() {
        let mut dash = Dashboard::new(quiet_settings());
        dash.input("3");
        assert_eq!(dash.manager().current_screen(), Some("neo_tracker"));

        let bus = Arc::clone(dash.app().bus());
        bus.publish(topics::DETECTION, detection("new", &["porch"]));
        // The camera reports while being ticked, so the same frame resolves it.
        dash.frame(0.5);
        assert_eq!(dash.app().header().alert_level, "danger");
        assert_eq!(dash.manager().current_screen(), Some("camera"));
        assert_eq!(dash.manager().state_of("camera").unwrap().state, "danger");

        bus.publish(topics::DETECTION, detection("end", &[]));
        dash.frame(0.5);
        assert!(dash.manager().state_of("camera").is_none());
        assert_eq!(dash.app().header().alert_level, "none");
    }

    #[test]
    fn test_flights_report_from_bus_thread() {
        let mut dash = Dashboard::new(quiet_settings());
        let bus = Arc::clone(dash.app().bus());
        let publisher = std::thread::spawn(move || {
            bus.publish(
                topics::FLIGHTS,
                json!([{ "id": "A1", "callsign": "A1", "altitude": 9000, "latitude": 0.2, "longitude": 0.0 }]),
            )
        });
        assert_eq!(publisher.join().unwrap(), 1);

        dash.frame(0.1);
        assert_eq!(dash.manager().current_screen(), Some("radar"));
        let state = dash.manager().state_of("radar").unwrap();
        assert_eq!(state.expires_in, Some(10.0));
        assert_eq!(state.metadata["callsign"], "A1");
    }

    #[test]
    fn test_restart_rebuilds_modules() {
        let mut dash = Dashboard::new(quiet_settings());
        dash.app().bus().publish(
            topics::FLIGHTS,
            json!({ "id": "A1", "altitude": 9000 }),
        );
        dash.frame(0.1);
        assert_eq!(dash.manager().current_screen(), Some("radar"));

        assert_eq!(dash.input("r"), Control::Continue);
        dash.frame(0.1);
        assert_eq!(dash.manager().current_screen(), Some("camera"));
        assert!(dash.manager().state_of("radar").is_none());

        // Exactly one live subscription per topic after the rebuild.
        assert_eq!(dash.app().bus().subscriber_count(topics::FLIGHTS), 1);
        assert_eq!(dash.app().bus().subscriber_count(topics::DETECTION), 1);
    }

    #[test]
    fn test_input_routing() {
        let mut dash = Dashboard::new(quiet_settings());
        assert_eq!(dash.input("q"), Control::Quit);
        assert_eq!(dash.input("9"), Control::Continue);
        assert_eq!(dash.manager().current_screen(), Some("camera"));
        assert_eq!(dash.input("2"), Control::Continue);
        assert_eq!(dash.manager().current_screen(), Some("radar"));
        assert_eq!(dash.input("hello"), Control::Continue);

        dash.shutdown();
        assert!(dash.manager().module_names().is_empty());
        assert_eq!(dash.app().bus().subscriber_count(topics::ALERT), 0);
    }
}
