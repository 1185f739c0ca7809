use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One entry of the modules section: which factory builds it and with what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModuleSettings {
    /// Factory key, e.g. "camera"
    #[serde(default, alias = "module", alias = "path")]
    pub target: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Module-specific settings (the module interprets these)
    #[serde(default, alias = "config")]
    pub settings: serde_json::Value,
}

/// One entry of the services section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceSettings {
    #[serde(default, alias = "service", alias = "path")]
    pub target: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, alias = "config")]
    pub settings: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

impl ModuleSettings {
    pub fn new(target: &str, settings: serde_json::Value) -> Self {
        Self {
            target: target.to_string(),
            enabled: true,
            settings,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl ServiceSettings {
    pub fn new(target: &str, settings: serde_json::Value) -> Self {
        Self {
            target: target.to_string(),
            enabled: true,
            settings,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_settings_aliases_and_defaults() {
        let parsed: ModuleSettings = serde_json::from_value(json!({
            "module": "camera",
            "config": { "camera_name": "porch" }
        }))
        .unwrap();
        assert_eq!(parsed.target, "camera");
        assert!(parsed.enabled);
        assert_eq!(parsed.settings["camera_name"], "porch");
    }

    #[test]
    fn test_service_settings_disabled() {
        let parsed: ServiceSettings = serde_json::from_value(json!({
            "service": "mqtt",
            "enabled": false
        }))
        .unwrap();
        assert_eq!(parsed, ServiceSettings::new("mqtt", serde_json::Value::Null).disabled());
    }
}
