//! Priority rules, idle settings and the resolver.
//!
//! Configuration arrives as an in-memory `serde_json::Value` (usually
//! hand-edited). [`PriorityConfig::from_value`] is deliberately lenient:
//! malformed entries are skipped with a warning instead of failing, so a
//! dashboard keeps running with an imperfect configuration.

use crate::state::ModuleState;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_TIMEOUT_SECONDS: f64 = 15.0;
pub const DEFAULT_DWELL_SECONDS: f64 = 20.0;

/// Maps a module+state condition to a weight and a target screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PriorityRule {
    /// Module whose reported state is watched
    pub module: String,
    /// Acceptable state labels; empty matches any state
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub weight: i64,
    /// Screen to activate on match
    pub screen: String,
}

impl PriorityRule {
    /// A rule whose screen is the watched module itself.
    pub fn new(module: &str, states: &[&str], weight: i64) -> Self {
        Self {
            module: module.to_string(),
            states: states.iter().map(|s| s.to_string()).collect(),
            weight,
            screen: module.to_string(),
        }
    }

    pub fn with_screen(mut self, screen: &str) -> Self {
        self.screen = screen.to_string();
        self
    }

    pub fn matches(&self, state: &ModuleState) -> bool {
        self.states.is_empty() || self.states.iter().any(|s| *s == state.state)
    }
}

/// Round-robin settings used when no rule matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IdleConfig {
    #[serde(default)]
    pub cycle: Vec<String>,
    #[serde(default = "default_dwell")]
    pub dwell_seconds: f64,
}

fn default_dwell() -> f64 {
    DEFAULT_DWELL_SECONDS
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            cycle: Vec::new(),
            dwell_seconds: DEFAULT_DWELL_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PriorityConfig {
    /// Default state lifetime; zero or negative never expires
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    #[serde(default)]
    pub idle: IdleConfig,
    #[serde(default)]
    pub rules: Vec<PriorityRule>,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            idle: IdleConfig::default(),
            rules: Vec::new(),
        }
    }
}

impl PriorityConfig {
    /// The stock dashboard: security alerts outrank air traffic, and the
    /// camera, NEO tracker and event globe take turns otherwise.
    pub fn stock() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            idle: IdleConfig {
                cycle: vec![
                    "camera".to_string(),
                    "neo_tracker".to_string(),
                    "eonet_globe".to_string(),
                ],
                dwell_seconds: DEFAULT_DWELL_SECONDS,
            },
            rules: vec![
                PriorityRule::new("camera", &["danger", "warning"], 100),
                PriorityRule::new("radar", &["air-traffic"], 80),
            ],
        }
    }

    /// Build a configuration from a loosely-typed mapping.
    ///
    /// Recognised keys: `timeout_seconds`, `idle.cycle` (list or single
    /// name), `idle.dwell_seconds`, and `rules[]` entries of the form
    /// `{ when: { module, state }, weight, screen }`.
    pub fn from_value(raw: &Value) -> Self {
        let mut config = Self::default();
        let Some(root) = raw.as_object() else {
            if !raw.is_null() {
                log::warn!("Priority config is not a mapping; using defaults");
            }
            return config;
        };

        if let Some(timeout) = root.get("timeout_seconds").and_then(Value::as_f64) {
            config.timeout_seconds = timeout;
        }

        if let Some(idle) = root.get("idle").and_then(Value::as_object) {
            match idle.get("cycle") {
                Some(Value::Array(items)) => {
                    config.idle.cycle = items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect();
                }
                Some(Value::String(name)) => config.idle.cycle = vec![name.clone()],
                _ => {}
            }
            if let Some(dwell) = idle.get("dwell_seconds").and_then(Value::as_f64) {
                config.idle.dwell_seconds = dwell.max(0.0);
            }
        }

        if let Some(rules) = root.get("rules").and_then(Value::as_array) {
            config.rules = rules.iter().enumerate().filter_map(|(i, r)| parse_rule(i, r)).collect();
        }

        config
    }
}

fn parse_rule(index: usize, raw: &Value) -> Option<PriorityRule> {
    let Some(rule) = raw.as_object() else {
        log::warn!("Skipping priority rule #{}: not a mapping", index);
        return None;
    };
    let when = rule.get("when").and_then(Value::as_object);
    let module = match when.and_then(|w| w.get("module")).and_then(Value::as_str) {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => {
            log::warn!("Skipping priority rule #{}: missing when.module", index);
            return None;
        }
    };

    let states = match when.and_then(|w| w.get("state")) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(other) => {
            log::warn!("Skipping priority rule #{}: unusable state {}", index, other);
            return None;
        }
    };

    let weight = rule.get("weight").map_or(0, coerce_weight);
    let screen = match rule.get("screen").and_then(Value::as_str) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => module.clone(),
    };

    Some(PriorityRule {
        module,
        states,
        weight,
        screen,
    })
}

/// Integer coercion for rule weights. Anything unusable becomes 0.
fn coerce_weight(raw: &Value) -> i64 {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

/// Walk `rules` in declaration order and return the screen of the heaviest
/// match. A later rule must be strictly heavier to win, so ties go to the
/// earlier declaration.
pub fn resolve<'a>(rules: &'a [PriorityRule], states: &HashMap<String, ModuleState>) -> Option<&'a str> {
    let mut best: Option<(i64, &'a str)> = None;
    for rule in rules {
        let Some(state) = states.get(&rule.module) else {
            continue;
        };
        if !rule.matches(state) {
            continue;
        }
        let weight = state.weight_override.unwrap_or(rule.weight);
        if best.map_or(true, |(w, _)| weight > w) {
            best = Some((weight, rule.screen.as_str()));
        }
    }
    best.map(|(_, screen)| screen)
}

/// JSON Schema of [`PriorityConfig`], for editors and config tooling.
pub fn config_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(PriorityConfig)).unwrap_or(Value::Null)
}
