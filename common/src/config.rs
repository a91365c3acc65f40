use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub led: LedConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// `"http"` polls a still-frame endpoint, `"synthetic"` renders a test pattern.
    #[serde(default = "default_camera_source")]
    pub source: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_camera_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MotionConfig {
    /// Per-pixel absolute luma difference that counts as "changed" (0-255).
    #[serde(default = "default_pixel_threshold")]
    pub pixel_threshold: u8,
    /// Motion is reported when more than this many pixels changed.
    #[serde(default = "default_min_changed_pixels")]
    pub min_changed_pixels: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_acquisition_interval_ms")]
    pub acquisition_interval_ms: u64,
    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,
    #[serde(default = "default_auto_policy_interval_ms")]
    pub auto_policy_interval_ms: u64,
    #[serde(default = "default_flash_duration_ms")]
    pub flash_duration_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedConfig {
    /// `"log"` only records the color, `"sysfs"` drives Linux PWM channels.
    #[serde(default = "default_led_driver")]
    pub driver: String,
    #[serde(default = "default_pwm_chip")]
    pub pwm_chip: PathBuf,
    /// PWM channel numbers for red, green and blue.
    #[serde(default = "default_pwm_channels")]
    pub channels: [u32; 3],
    #[serde(default = "default_period_ns")]
    pub period_ns: u64,
    #[serde(default = "default_true")]
    pub common_anode: bool,
    #[serde(default = "default_off_epsilon")]
    pub off_epsilon: f32,
    #[serde(default = "default_true")]
    pub auto_on_start: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_snapshot_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_stream_width")]
    pub width: u32,
    #[serde(default = "default_stream_height")]
    pub height: u32,
    #[serde(default = "default_stream_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_stream_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_pushover_url")]
    pub api_url: String,
    #[serde(default)]
    pub user_key: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default = "default_notify_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.camera.source.as_str() {
            "synthetic" => {}
            "http" if self.camera.url.is_empty() => {
                return Err(ConfigError::Invalid(
                    "camera.url is required when camera.source = \"http\"".into(),
                ));
            }
            "http" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown camera.source '{other}', expected 'http' or 'synthetic'"
                )));
            }
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid("camera width/height must be non-zero".into()));
        }
        if self.stream.width == 0 || self.stream.height == 0 {
            return Err(ConfigError::Invalid("stream width/height must be non-zero".into()));
        }

        let t = &self.timing;
        for (name, value) in [
            ("timing.acquisition_interval_ms", t.acquisition_interval_ms),
            ("timing.render_interval_ms", t.render_interval_ms),
            ("timing.auto_policy_interval_ms", t.auto_policy_interval_ms),
            ("stream.interval_ms", self.stream.interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
            }
        }

        if !matches!(self.led.driver.as_str(), "log" | "sysfs") {
            return Err(ConfigError::Invalid(format!(
                "unknown led.driver '{}', expected 'log' or 'sysfs'",
                self.led.driver
            )));
        }
        if !(0.0..0.5).contains(&self.led.off_epsilon) {
            return Err(ConfigError::Invalid("led.off_epsilon must be in [0, 0.5)".into()));
        }
        if self.notify.queue_depth == 0 {
            return Err(ConfigError::Invalid("notify.queue_depth must be greater than 0".into()));
        }
        Ok(())
    }

    /// Settings that load fine but are probably a mistake. Returned rather
    /// than logged because the config is read before logging is set up.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.notify.enabled && (self.notify.user_key.is_empty() || self.notify.api_token.is_empty())
        {
            warnings.push(
                "notifications enabled without user_key/api_token, Pushover will reject them"
                    .to_string(),
            );
        }
        warnings
    }
}

impl TimingConfig {
    pub fn acquisition_interval(&self) -> Duration {
        Duration::from_millis(self.acquisition_interval_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn auto_policy_interval(&self) -> Duration {
        Duration::from_millis(self.auto_policy_interval_ms)
    }

    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_duration_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: default_camera_source(),
            url: String::new(),
            timeout_ms: default_camera_timeout_ms(),
            width: default_camera_width(),
            height: default_camera_height(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            pixel_threshold: default_pixel_threshold(),
            min_changed_pixels: default_min_changed_pixels(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            acquisition_interval_ms: default_acquisition_interval_ms(),
            render_interval_ms: default_render_interval_ms(),
            auto_policy_interval_ms: default_auto_policy_interval_ms(),
            flash_duration_ms: default_flash_duration_ms(),
        }
    }
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            driver: default_led_driver(),
            pwm_chip: default_pwm_chip(),
            channels: default_pwm_channels(),
            period_ns: default_period_ns(),
            common_anode: true,
            off_epsilon: default_off_epsilon(),
            auto_on_start: true,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: default_snapshot_dir(),
            jpeg_quality: default_snapshot_quality(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: default_stream_width(),
            height: default_stream_height(),
            interval_ms: default_stream_interval_ms(),
            jpeg_quality: default_stream_quality(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_pushover_url(),
            user_key: String::new(),
            api_token: String::new(),
            queue_depth: default_queue_depth(),
            timeout_ms: default_notify_timeout_ms(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_camera_source() -> String {
    "synthetic".into()
}
fn default_camera_timeout_ms() -> u64 {
    2000
}
fn default_camera_width() -> u32 {
    1920
}
fn default_camera_height() -> u32 {
    1080
}
fn default_pixel_threshold() -> u8 {
    25
}
fn default_min_changed_pixels() -> usize {
    5000
}
fn default_acquisition_interval_ms() -> u64 {
    33
}
fn default_render_interval_ms() -> u64 {
    100
}
fn default_auto_policy_interval_ms() -> u64 {
    1000
}
fn default_flash_duration_ms() -> u64 {
    2000
}
fn default_led_driver() -> String {
    "log".into()
}
fn default_pwm_chip() -> PathBuf {
    PathBuf::from("/sys/class/pwm/pwmchip0")
}
fn default_pwm_channels() -> [u32; 3] {
    [0, 1, 2]
}
fn default_period_ns() -> u64 {
    500_000
}
fn default_off_epsilon() -> f32 {
    0.02
}
fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("captures")
}
fn default_snapshot_quality() -> u8 {
    90
}
fn default_stream_width() -> u32 {
    1280
}
fn default_stream_height() -> u32 {
    720
}
fn default_stream_interval_ms() -> u64 {
    33
}
fn default_stream_quality() -> u8 {
    80
}
fn default_pushover_url() -> String {
    "https://api.pushover.net/1/messages.json".into()
}
fn default_queue_depth() -> usize {
    32
}
fn default_notify_timeout_ms() -> u64 {
    5000
}
fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_log_level() -> String {
    "info".into()
}
