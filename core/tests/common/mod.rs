#![allow(dead_code)]

use sentinel_core::{EventBus, Host, ModuleContext, ScreenModule, StateReporter};
use std::sync::{Arc, Mutex};

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn clear(log: &Log) {
    log.lock().unwrap().clear();
}

pub struct TestApp {
    pub current_screen: Mutex<Option<String>>,
    pub bus: Arc<EventBus>,
}

impl TestApp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current_screen: Mutex::new(None),
            bus: Arc::new(EventBus::new()),
        })
    }

    pub fn screen(&self) -> Option<String> {
        self.current_screen.lock().unwrap().clone()
    }
}

impl Host for TestApp {
    type Surface = Vec<String>;
    type Event = String;

    fn set_current_screen(&self, name: &str) {
        *self.current_screen.lock().unwrap() = Some(name.to_string());
    }

    fn event_bus(&self) -> Option<Arc<EventBus>> {
        Some(self.bus.clone())
    }
}

/// Records every hook call as "<hook>:<label>".
pub struct Recorder {
    pub label: String,
    pub log: Log,
    pub reporter: Arc<Mutex<Option<StateReporter>>>,
    pub fail_unload: bool,
}

impl Recorder {
    pub fn new(label: &str, log: &Log) -> Self {
        Self {
            label: label.to_string(),
            log: log.clone(),
            reporter: Arc::new(Mutex::new(None)),
            fail_unload: false,
        }
    }

    pub fn boxed(label: &str, log: &Log) -> Box<dyn ScreenModule<TestApp>> {
        Box::new(Self::new(label, log))
    }

    fn push(&self, hook: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", hook, self.label));
    }
}

impl ScreenModule<TestApp> for Recorder {
    fn on_load(&mut self, cx: &ModuleContext<TestApp>) -> sentinel_core::Result<()> {
        *self.reporter.lock().unwrap() = Some(cx.reporter());
        self.push("load");
        Ok(())
    }

    fn on_unload(&mut self) -> sentinel_core::Result<()> {
        self.push("unload");
        if self.fail_unload {
            anyhow::bail!("unload failed");
        }
        Ok(())
    }

    fn on_show(&mut self) {
        self.push("show");
    }

    fn on_hide(&mut self) {
        self.push("hide");
    }

    fn update(&mut self, _dt: f64) {
        self.push("update");
    }

    fn render(&mut self, surface: &mut Vec<String>) {
        surface.push(self.label.clone());
    }

    fn handle_event(&mut self, event: &String) {
        self.push(&format!("event({})", event));
    }
}
