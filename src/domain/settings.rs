use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
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
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

/// Shape of the synthetic BPM ramp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeBpmSettings {
    #[serde(default = "default_fake_min")]
    pub min: i32,
    #[serde(default = "default_fake_max")]
    pub max: i32,
    #[serde(default = "default_fake_step")]
    pub step: i32,
    #[serde(default = "default_fake_interval_ms")]
    pub interval_ms: u64,
}

impl Default for FakeBpmSettings {
    fn default() -> Self {
        Self {
            min: default_fake_min(),
            max: default_fake_max(),
            step: default_fake_step(),
            interval_ms: default_fake_interval_ms(),
        }
    }
}

impl FakeBpmSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

fn default_level() -> String {
    "info".to_string()
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
    "heart_rate_bridge".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}
fn default_fake_min() -> i32 {
    60
}
fn default_fake_max() -> i32 {
    180
}
fn default_fake_step() -> i32 {
    1
}
fn default_fake_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Peripheral
    #[serde(default = "default_device_name")]
    pub device_name: String,

    // HTTP bridge
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_http_start_timeout_ms")]
    pub http_start_timeout_ms: u64,
    #[serde(default = "default_http_grace_period_ms")]
    pub http_grace_period_ms: u64,
    #[serde(default = "default_http_stop_timeout_ms")]
    pub http_stop_timeout_ms: u64,

    #[serde(default)]
    pub fake_bpm: FakeBpmSettings,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            http_port: default_http_port(),
            http_start_timeout_ms: default_http_start_timeout_ms(),
            http_grace_period_ms: default_http_grace_period_ms(),
            http_stop_timeout_ms: default_http_stop_timeout_ms(),
            fake_bpm: FakeBpmSettings::default(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_device_name() -> String {
    "Heart Rate Bridge".to_string()
}
fn default_http_port() -> u16 {
    12345
}
fn default_http_start_timeout_ms() -> u64 {
    5000
}
fn default_http_grace_period_ms() -> u64 {
    1000
}
fn default_http_stop_timeout_ms() -> u64 {
    5000
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        Self::open(Self::get_settings_path()?)
    }

    /// Load `settings_path`; on first run the defaults are written there.
    pub fn open(settings_path: PathBuf) -> anyhow::Result<Self> {
        let first_run = !settings_path.exists();
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        let service = Self {
            settings,
            settings_path,
        };
        if first_run {
            service.save()?;
        }
        Ok(service)
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("HeartRateBridge");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }
}
