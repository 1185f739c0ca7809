//! Background data producers.
//!
//! Services talk to the core only by publishing on the event bus; the
//! manager never sees them. [`ServiceManager`] just starts and stops them.

use crate::error::panic_message;
use crate::factory::{ServiceContext, ServiceFactories};
use crate::module::Host;
use crate::settings::ServiceSettings;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A long-running producer (MQTT client, video capture, pollers, ...).
///
/// `start` should hand its work to a thread or task and return promptly.
pub trait Service: Send {
    fn start(&mut self) -> crate::Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> crate::Result<()> {
        Ok(())
    }
}

/// Instantiates and coordinates the configured services.
pub struct ServiceManager<H: Host> {
    app: Arc<H>,
    definitions: Vec<(String, ServiceSettings)>,
    factories: ServiceFactories<H>,
    instances: Vec<(String, Box<dyn Service>)>,
}

impl<H: Host> ServiceManager<H> {
    pub fn new(
        app: Arc<H>,
        definitions: Vec<(String, ServiceSettings)>,
        factories: ServiceFactories<H>,
    ) -> Self {
        Self {
            app,
            definitions,
            factories,
            instances: Vec::new(),
        }
    }

    /// Instantiate and start every enabled service that is not already
    /// running. A service that fails to build or start is logged and
    /// skipped. Returns how many services were started by this call.
    pub fn start_all(&mut self) -> usize {
        let mut started = 0;
        for (name, settings) in &self.definitions {
            if !settings.enabled || self.instances.iter().any(|(n, _)| n == name) {
                continue;
            }

            let cx = ServiceContext {
                app: Arc::clone(&self.app),
                settings: settings.settings.clone(),
                event_bus: self.app.event_bus(),
            };
            let mut instance = match self.factories.create(&settings.target, cx) {
                Ok(instance) => instance,
                Err(e) => {
                    log::warn!("ServiceManager: unable to create service '{}': {:#}", name, e);
                    continue;
                }
            };
            if let Err(e) = instance.start() {
                log::warn!("ServiceManager: service '{}' failed to start: {:#}", name, e);
                continue;
            }

            log::info!("ServiceManager: started '{}'", name);
            self.instances.push((name.clone(), instance));
            started += 1;
        }
        started
    }

    /// Stop every running service. Failures are logged per instance and do
    /// not prevent the rest from stopping.
    pub fn stop_all(&mut self) {
        for (name, mut instance) in self.instances.drain(..) {
            match catch_unwind(AssertUnwindSafe(|| instance.stop())) {
                Ok(Ok(())) => log::info!("ServiceManager: stopped '{}'", name),
                Ok(Err(e)) => log::error!("ServiceManager: error stopping '{}': {:#}", name, e),
                Err(panic) => log::error!(
                    "ServiceManager: '{}' panicked while stopping: {}",
                    name,
                    panic_message(panic.as_ref())
                ),
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Service> {
        self.instances
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.as_ref())
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names of running services in start order.
    pub fn running(&self) -> Vec<&str> {
        self.instances.iter().map(|(n, _)| n.as_str()).collect()
    }
}

impl<H: Host> Drop for ServiceManager<H> {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventBus;
    use serde_json::json;
    use std::sync::Mutex;

    struct BusHost {
        bus: Arc<EventBus>,
    }

    impl Host for BusHost {
        type Surface = ();
        type Event = ();

        fn event_bus(&self) -> Option<Arc<EventBus>> {
            Some(self.bus.clone())
        }
    }

    struct Recording {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
        fail_stop: bool,
    }

    impl Service for Recording {
        fn start(&mut self) -> crate::Result<()> {
            self.log.lock().unwrap().push(format!("start:{}", self.name));
            Ok(())
        }

        fn stop(&mut self) -> crate::Result<()> {
            self.log.lock().unwrap().push(format!("stop:{}", self.name));
            if self.fail_stop {
                anyhow::bail!("stuck");
            }
            Ok(())
        }
    }

    fn setup(
        defs: Vec<(String, ServiceSettings)>,
    ) -> (ServiceManager<BusHost>, Arc<Mutex<Vec<String>>>, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        let app = Arc::new(BusHost { bus: bus.clone() });
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut factories = ServiceFactories::new();
        let l = log.clone();
        factories.register("recording", move |cx: ServiceContext<BusHost>| {
            if let Some(bus) = &cx.event_bus {
                bus.publish("services.created", cx.settings.clone());
            }
            Ok(Box::new(Recording {
                name: cx.settings["name"].as_str().unwrap_or("?").to_string(),
                log: l.clone(),
                fail_stop: cx.settings["fail_stop"].as_bool().unwrap_or(false),
            }) as Box<dyn Service>)
        });
        factories.register("broken", |_cx: ServiceContext<BusHost>| {
            anyhow::bail!("no such device")
        });

        (ServiceManager::new(app, defs, factories), log, bus)
    }

    #[test]
    fn test_start_all_is_idempotent_and_skips_disabled() {
        let (mut mgr, log, bus) = setup(vec![
            ("one".into(), ServiceSettings::new("recording", json!({"name": "one"}))),
            ("off".into(), ServiceSettings::new("recording", json!({"name": "off"})).disabled()),
            ("two".into(), ServiceSettings::new("recording", json!({"name": "two"}))),
        ]);
        let created = Arc::new(Mutex::new(0));
        let c = created.clone();
        bus.subscribe("services.created", move |_| {
            *c.lock().unwrap() += 1;
            Ok(())
        });

        assert_eq!(mgr.start_all(), 2);
        assert_eq!(mgr.start_all(), 0);
        assert_eq!(*created.lock().unwrap(), 2);
        assert_eq!(mgr.running(), vec!["one", "two"]);
        assert!(!mgr.is_running("off"));
        assert_eq!(*log.lock().unwrap(), vec!["start:one", "start:two"]);
    }

    #[test]
    fn test_failed_construction_is_skipped() {
        let (mut mgr, _log, _bus) = setup(vec![
            ("bad".into(), ServiceSettings::new("broken", json!({}))),
            ("unknown".into(), ServiceSettings::new("nope", json!({}))),
            ("good".into(), ServiceSettings::new("recording", json!({"name": "good"}))),
        ]);
        assert_eq!(mgr.start_all(), 1);
        assert_eq!(mgr.running(), vec!["good"]);
    }

    #[test]
    fn test_stop_all_continues_past_failures() {
        let (mut mgr, log, _bus) = setup(vec![
            ("one".into(), ServiceSettings::new("recording", json!({"name": "one", "fail_stop": true}))),
            ("two".into(), ServiceSettings::new("recording", json!({"name": "two"}))),
        ]);
        mgr.start_all();
        mgr.stop_all();

        assert!(mgr.running().is_empty());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start:one", "start:two", "stop:one", "stop:two"]
        );

        // Restart after a full stop.
        assert_eq!(mgr.start_all(), 2);
    }
}
