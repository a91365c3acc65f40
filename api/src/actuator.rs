use std::path::{Path, PathBuf};
use std::time::Duration;

use picam_common::config::LedConfig;
use picam_controller::led::{duty_cycles, Color, Polarity};
use picam_controller::ports::{Actuator, ActuatorError};
use tracing::{debug, info};

/// Build the LED driver selected by `led.driver`.
pub fn from_config(config: &LedConfig) -> Result<Box<dyn Actuator>, ActuatorError> {
    let polarity = if config.common_anode {
        Polarity::CommonAnode
    } else {
        Polarity::CommonCathode
    };
    match config.driver.as_str() {
        "sysfs" => Ok(Box::new(SysfsPwmLed::open(
            &config.pwm_chip,
            config.channels,
            config.period_ns,
            polarity,
            config.off_epsilon,
        )?)),
        "log" => Ok(Box::new(LogLed::new(polarity, config.off_epsilon))),
        other => Err(ActuatorError::Unavailable(format!("unknown LED driver '{other}'"))),
    }
}

/// Driver that only logs color changes. Used when no PWM hardware exists.
pub struct LogLed {
    polarity: Polarity,
    off_epsilon: f32,
    last: Option<Color>,
}

impl LogLed {
    pub fn new(polarity: Polarity, off_epsilon: f32) -> Self {
        Self {
            polarity,
            off_epsilon,
            last: None,
        }
    }
}

impl Actuator for LogLed {
    fn drive(&mut self, color: Color) -> Result<(), ActuatorError> {
        if self.last != Some(color) {
            let duty = duty_cycles(color, self.polarity, self.off_epsilon);
            info!(color = %color, name = color.name(), ?duty, "LED output");
            self.last = Some(color);
        }
        Ok(())
    }
}

struct PwmChannel {
    dir: PathBuf,
    last_duty_ns: Option<u64>,
}

/// RGB LED on three Linux sysfs PWM channels (`/sys/class/pwm/pwmchipN/pwmM`).
pub struct SysfsPwmLed {
    channels: [PwmChannel; 3],
    period_ns: u64,
    polarity: Polarity,
    off_epsilon: f32,
}

impl SysfsPwmLed {
    const EXPORT_ATTEMPTS: u32 = 20;

    /// Export (if needed), configure and enable the three channels.
    pub fn open(
        chip: &Path,
        channels: [u32; 3],
        period_ns: u64,
        polarity: Polarity,
        off_epsilon: f32,
    ) -> Result<Self, ActuatorError> {
        let opened = channels.map(|n| chip.join(format!("pwm{n}")));
        for (n, dir) in channels.iter().zip(&opened) {
            if !dir.exists() {
                write_attr(&chip.join("export"), *n)?;
                wait_for_export(dir)?;
            }
            // duty_cycle must never exceed period, so clear it first.
            write_attr(&dir.join("duty_cycle"), 0)?;
            write_attr(&dir.join("period"), period_ns)?;
            write_attr(&dir.join("enable"), 1)?;
            debug!(channel = n, path = %dir.display(), "PWM channel enabled");
        }
        info!(chip = %chip.display(), ?channels, period_ns, "sysfs PWM LED ready");

        Ok(Self {
            channels: opened.map(|dir| PwmChannel {
                dir,
                last_duty_ns: None,
            }),
            period_ns,
            polarity,
            off_epsilon,
        })
    }
}

impl Actuator for SysfsPwmLed {
    fn drive(&mut self, color: Color) -> Result<(), ActuatorError> {
        let duty = duty_cycles(color, self.polarity, self.off_epsilon);
        for (channel, fraction) in self.channels.iter_mut().zip(duty) {
            let duty_ns = (self.period_ns as f64 * fraction as f64).round() as u64;
            if channel.last_duty_ns == Some(duty_ns) {
                continue;
            }
            write_attr(&channel.dir.join("duty_cycle"), duty_ns)?;
            channel.last_duty_ns = Some(duty_ns);
        }
        Ok(())
    }
}

fn write_attr(path: &Path, value: impl ToString) -> Result<(), ActuatorError> {
    std::fs::write(path, value.to_string()).map_err(|source| ActuatorError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// The channel directory shows up asynchronously after an export.
fn wait_for_export(dir: &Path) -> Result<(), ActuatorError> {
    for _ in 0..SysfsPwmLed::EXPORT_ATTEMPTS {
        if dir.exists() {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    Err(ActuatorError::Unavailable(format!(
        "{} did not appear after export",
        dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_chip(channels: [u32; 3]) -> tempfile::TempDir {
        let chip = tempfile::tempdir().unwrap();
        for n in channels {
            std::fs::create_dir(chip.path().join(format!("pwm{n}"))).unwrap();
        }
        chip
    }

    fn read(chip: &Path, channel: u32, attr: &str) -> String {
        std::fs::read_to_string(chip.join(format!("pwm{channel}")).join(attr)).unwrap()
    }

    #[test]
    fn open_configures_channels() {
        let chip = fake_chip([0, 1, 2]);
        SysfsPwmLed::open(chip.path(), [0, 1, 2], 500_000, Polarity::CommonAnode, 0.02).unwrap();
        for n in 0..3 {
            assert_eq!(read(chip.path(), n, "period"), "500000");
            assert_eq!(read(chip.path(), n, "enable"), "1");
            assert_eq!(read(chip.path(), n, "duty_cycle"), "0");
        }
    }

    #[test]
    fn common_anode_duty_is_inverted() {
        let chip = fake_chip([3, 4, 5]);
        let mut led =
            SysfsPwmLed::open(chip.path(), [3, 4, 5], 1000, Polarity::CommonAnode, 0.02).unwrap();

        led.drive(Color::new(1.0, 0.0, 0.25)).unwrap();
        assert_eq!(read(chip.path(), 3, "duty_cycle"), "0");
        assert_eq!(read(chip.path(), 4, "duty_cycle"), "1000");
        assert_eq!(read(chip.path(), 5, "duty_cycle"), "750");

        // Nearly-off snaps fully off.
        led.drive(Color::new(0.01, 0.0, 0.0)).unwrap();
        assert_eq!(read(chip.path(), 3, "duty_cycle"), "1000");
    }

    #[test]
    fn missing_channel_without_export_fails() {
        let chip = tempfile::tempdir().unwrap();
        let err = SysfsPwmLed::open(chip.path(), [0, 1, 2], 1000, Polarity::CommonAnode, 0.02)
            .err()
            .unwrap();
        assert!(matches!(err, ActuatorError::Unavailable(_)));
    }

    #[test]
    fn log_driver_accepts_everything() {
        let mut led = LogLed::new(Polarity::CommonCathode, 0.02);
        led.drive(Color::BLUE).unwrap();
        led.drive(Color::BLUE).unwrap();
        assert_eq!(led.last, Some(Color::BLUE));
    }

    #[test]
    fn from_config_picks_driver() {
        let config = LedConfig::default();
        assert!(from_config(&config).is_ok());

        let bad = LedConfig {
            driver: "gpio".into(),
            ..LedConfig::default()
        };
        assert!(from_config(&bad).is_err());
    }
}
