use serde_derive::{Deserialize, Serialize};
use serdeconv;
use std::path::Path;

pub const DEFAULT_CLIENT_PORT: u16 = 9000;

/// Per-severity annunciation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertSettings {
    pub buzzer_enabled: bool,
    pub screen_popup_enabled: bool,
    pub screen_popup_lifetime_secs: u32,
}

impl Default for AlertSettings {
    fn default() -> AlertSettings {
        AlertSettings {
            buzzer_enabled: false,
            screen_popup_enabled: true,
            screen_popup_lifetime_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpboxSettings {
    /// Robot peer address.
    pub client: String,
    pub client_port: u16,
    pub diag_server_port: u16,
    pub use_custom_diag_server_ip: bool,
    pub custom_diag_server_ip: String,
    pub warning_alerts: AlertSettings,
    pub error_alerts: AlertSettings,
}

impl Default for OpboxSettings {
    fn default() -> OpboxSettings {
        OpboxSettings {
            client: "localhost".to_string(),
            client_port: DEFAULT_CLIENT_PORT,
            diag_server_port: 8080,
            use_custom_diag_server_ip: false,
            custom_diag_server_ip: String::new(),
            warning_alerts: AlertSettings::default(),
            error_alerts: AlertSettings {
                buzzer_enabled: true,
                ..AlertSettings::default()
            },
        }
    }
}

/// A partial settings file: only the keys present override the base.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpboxSettingsPatch {
    pub client: Option<String>,
    pub client_port: Option<u16>,
    pub diag_server_port: Option<u16>,
    pub use_custom_diag_server_ip: Option<bool>,
    pub custom_diag_server_ip: Option<String>,
    pub warning_alerts: Option<AlertSettings>,
    pub error_alerts: Option<AlertSettings>,
}

impl OpboxSettingsPatch {
    pub fn apply_to(self, settings: &mut OpboxSettings) {
        if let Some(client) = self.client {
            settings.client = client;
        }
        if let Some(client_port) = self.client_port {
            settings.client_port = client_port;
        }
        if let Some(diag_server_port) = self.diag_server_port {
            settings.diag_server_port = diag_server_port;
        }
        if let Some(use_custom) = self.use_custom_diag_server_ip {
            settings.use_custom_diag_server_ip = use_custom;
        }
        if let Some(ip) = self.custom_diag_server_ip {
            settings.custom_diag_server_ip = ip;
        }
        if let Some(warning_alerts) = self.warning_alerts {
            settings.warning_alerts = warning_alerts;
        }
        if let Some(error_alerts) = self.error_alerts {
            settings.error_alerts = error_alerts;
        }
    }
}

impl OpboxSettings {
    /// Loads settings from a TOML file. Missing keys take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> OpboxSettings {
        serdeconv::from_toml_file(path).expect("Error loading opbox settings file")
    }

    /// Base file plus an optional override file layered on top. A missing
    /// override file is not an error.
    pub fn load_with_overrides<P: AsRef<Path>>(base: P, overrides: P) -> OpboxSettings {
        let mut settings = Self::load(base);

        if overrides.as_ref().exists() {
            let patch: OpboxSettingsPatch = serdeconv::from_toml_file(overrides)
                .expect("Error loading opbox settings override file");
            patch.apply_to(&mut settings);
        }

        settings
    }

    /// Writes the settings out as TOML.
    pub fn save<P: AsRef<Path>>(&self, path: P) {
        serdeconv::to_toml_file(self, path).expect("Error writing opbox settings file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = OpboxSettings::default();

        assert_eq!(settings.client, "localhost");
        assert_eq!(settings.client_port, DEFAULT_CLIENT_PORT);
        assert!(!settings.warning_alerts.buzzer_enabled);
        assert!(settings.error_alerts.buzzer_enabled);
        assert_eq!(settings.error_alerts.screen_popup_lifetime_secs, 15);
    }

    #[test]
    fn test_partial_file_fills_with_defaults() {
        let settings: OpboxSettings = serdeconv::from_toml_str(
            r#"
client = "10.0.1.17"
client_port = 9500
"#,
        )
        .unwrap();

        assert_eq!(settings.client, "10.0.1.17");
        assert_eq!(settings.client_port, 9500);
        assert_eq!(settings.diag_server_port, 8080);
        assert_eq!(settings.warning_alerts, AlertSettings::default());
    }

    #[test]
    fn test_nested_alert_settings_parse() {
        let settings: OpboxSettings = serdeconv::from_toml_str(
            r#"
client = "localhost"

[error_alerts]
buzzer_enabled = true
screen_popup_enabled = false
screen_popup_lifetime_secs = 60
"#,
        )
        .unwrap();

        assert!(settings.error_alerts.buzzer_enabled);
        assert!(!settings.error_alerts.screen_popup_enabled);
        assert_eq!(settings.error_alerts.screen_popup_lifetime_secs, 60);
    }

    #[test]
    fn test_save_load_round_trip() {
        let path = std::env::temp_dir().join(format!("opboxd-settings-{}", std::process::id()));

        let mut settings = OpboxSettings::default();
        settings.client = "192.168.1.30".to_string();
        settings.client_port = 9200;
        settings.warning_alerts.buzzer_enabled = true;

        settings.save(&path);
        let loaded = OpboxSettings::load(&path);

        assert_eq!(loaded, settings);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_patch_overrides_only_present_keys() {
        let mut settings = OpboxSettings::default();

        let patch: OpboxSettingsPatch = serdeconv::from_toml_str(
            r#"
client_port = 9100
"#,
        )
        .unwrap();
        patch.apply_to(&mut settings);

        assert_eq!(settings.client_port, 9100);
        assert_eq!(settings.client, "localhost");
        assert_eq!(settings.diag_server_port, 8080);
    }
}
