//! Scripted stand-in for the MQTT client: replays timed bus messages.

use crate::host::SentinelApp;
use crate::settings::topics;
use anyhow::Context;
use sentinel_core::{EventBus, Service, ServiceContext};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptStep {
    /// Seconds to wait before publishing
    #[serde(default)]
    pub delay: f64,
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub script: Vec<ScriptStep>,
    #[serde(rename = "loop")]
    pub repeat: bool,
    /// Playback speed multiplier
    pub speed: f64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            script: Vec::new(),
            repeat: false,
            speed: 1.0,
        }
    }
}

pub struct ScriptedFeed {
    bus: Arc<EventBus>,
    settings: Arc<FeedSettings>,
    runtime: Handle,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl ScriptedFeed {
    pub fn from_context(cx: ServiceContext<SentinelApp>) -> anyhow::Result<Self> {
        let bus = cx
            .event_bus
            .ok_or_else(|| anyhow::anyhow!("scripted feed needs an event bus"))?;
        let mut settings: FeedSettings = if cx.settings.is_null() {
            FeedSettings::default()
        } else {
            serde_json::from_value(cx.settings).context("invalid scripted feed settings")?
        };
        if !(settings.speed.is_finite() && settings.speed > 0.0) {
            settings.speed = 1.0;
        }
        let runtime = Handle::try_current().context("scripted feed needs a tokio runtime")?;

        Ok(Self {
            bus,
            settings: Arc::new(settings),
            runtime,
            shutdown: None,
            task: None,
        })
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

async fn replay(bus: Arc<EventBus>, settings: Arc<FeedSettings>, mut shutdown: watch::Receiver<bool>) {
    loop {
        for step in &settings.script {
            let secs = step.delay / settings.speed;
            let wait = Duration::from_secs_f64(if secs.is_finite() && secs > 0.0 { secs } else { 0.0 });
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => return,
            }
            let delivered = bus.publish(&step.topic, step.payload.clone());
            log::debug!("feed: {} -> {} handler(s)", step.topic, delivered);
        }
        if !settings.repeat || settings.script.is_empty() {
            break;
        }
    }
    log::info!("feed: script finished");
}

impl Service for ScriptedFeed {
    fn start(&mut self) -> sentinel_core::Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let (tx, rx) = watch::channel(false);
        self.task = Some(
            self.runtime
                .spawn(replay(Arc::clone(&self.bus), Arc::clone(&self.settings), rx)),
        );
        self.shutdown = Some(tx);
        self.bus.publish(topics::STATUS, json!("CONNECTED"));
        Ok(())
    }

    fn stop(&mut self) -> sentinel_core::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            // The task may already have finished on its own.
            let _ = tx.send(true);
        }
        self.task = None;
        self.bus.publish(topics::STATUS, json!("DISCONNECTED"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn context(bus: &Arc<EventBus>, settings: Value) -> ServiceContext<SentinelApp> {
        ServiceContext {
            app: SentinelApp::new(Arc::clone(bus)),
            settings,
            event_bus: Some(Arc::clone(bus)),
        }
    }

    fn capture(bus: &EventBus, topic: &str) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        bus.subscribe(topic, move |payload| {
            s.lock().unwrap().push(payload.clone());
            Ok(())
        });
        seen
    }

    #[test]
    fn test_needs_a_runtime() {
        let bus = Arc::new(EventBus::new());
        let err = ScriptedFeed::from_context(context(&bus, Value::Null)).err().unwrap();
        assert!(err.to_string().contains("tokio runtime"));
    }

    #[tokio::test]
    async fn test_replays_script_in_order() {
        let bus = Arc::new(EventBus::new());
        let seen = capture(&bus, "t");
        let status = capture(&bus, topics::STATUS);
        let mut feed = ScriptedFeed::from_context(context(
            &bus,
            json!({ "script": [
                { "topic": "t", "payload": 1 },
                { "topic": "t", "payload": 2, "delay": 0.01 },
            ] }),
        ))
        .unwrap();

        feed.start().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*seen.lock().unwrap(), vec![json!(1), json!(2)]);
        assert!(!feed.is_running());

        feed.stop().unwrap();
        assert_eq!(*status.lock().unwrap(), vec![json!("CONNECTED"), json!("DISCONNECTED")]);
    }

    #[tokio::test]
    async fn test_stop_interrupts_pending_step() {
        let bus = Arc::new(EventBus::new());
        let seen = capture(&bus, "t");
        let mut feed = ScriptedFeed::from_context(context(
            &bus,
            json!({ "loop": true, "script": [{ "topic": "t", "delay": 30.0 }] }),
        ))
        .unwrap();

        feed.start().unwrap();
        assert!(feed.is_running());
        feed.stop().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(seen.lock().unwrap().is_empty());
        assert!(!feed.is_running());
    }
}
