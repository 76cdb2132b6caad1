use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment override for the scan timeout, in seconds
pub const SCAN_TIMEOUT_ENV: &str = "WANDKIT_SCAN_TIMEOUT_SECS";
/// Environment override for the verbosity level
pub const VERBOSITY_ENV: &str = "WANDKIT_LOG_LEVEL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "wandkit".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Bound on scan + connect
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
    /// Advertised name prefix, matched case-insensitively
    #[serde(default = "default_device_name_prefix")]
    pub device_name_prefix: String,
    /// 0 = info, 1 = debug, 2 = warn
    #[serde(default)]
    pub verbosity: u8,

    #[serde(default = "default_true")]
    pub enable_mouse_click: bool,
    #[serde(default = "default_true")]
    pub enable_gestures: bool,
    /// Log every service, characteristic and descriptor after connecting
    #[serde(default = "default_true")]
    pub dump_descriptors: bool,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_timeout_secs: default_scan_timeout_secs(),
            device_name_prefix: default_device_name_prefix(),
            verbosity: 0,
            enable_mouse_click: true,
            enable_gestures: true,
            dump_descriptors: true,
            log_settings: LogSettings::default(),
        }
    }
}

fn default_scan_timeout_secs() -> u64 {
    10
}
fn default_device_name_prefix() -> String {
    "Kano-Wand".to_string()
}

impl Settings {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    /// Filter directive for a verbosity level
    pub fn log_level(&self) -> &'static str {
        match self.verbosity {
            1 => "debug",
            2 => "warn",
            _ => "info",
        }
    }

    /// Apply overrides from `lookup`, normally the process environment.
    /// Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secs) = lookup(SCAN_TIMEOUT_ENV).and_then(|v| v.trim().parse().ok()) {
            self.scan_timeout_secs = secs;
        }
        if let Some(level) = lookup(VERBOSITY_ENV).and_then(|v| v.trim().parse().ok()) {
            self.verbosity = level;
        }
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    /// Load from the user config directory, falling back to defaults
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::from_path(settings_path))
    }

    pub fn from_path(settings_path: PathBuf) -> Self {
        let mut settings = Self::load_from_file(&settings_path).unwrap_or_default();
        settings.apply_overrides(|key| std::env::var(key).ok());
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("WandKit");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }
}
