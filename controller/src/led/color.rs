use std::fmt;

/// Requested intensity per channel, 0.0 (off) to 1.0 (full on).
///
/// Values are always finite and inside [0, 1]; how they map onto a physical
/// output is decided by [`duty_cycles`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const OFF: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };
    pub const BLUE: Color = Color { r: 0.0, g: 0.0, b: 1.0 };

    /// Clamps each channel into [0, 1]. NaN becomes 0.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: sanitize(r),
            g: sanitize(g),
            b: sanitize(b),
        }
    }

    /// Build from percentages (0-100) as sent by the request layer.
    /// Non-finite inputs count as 0 for that channel.
    pub fn from_percentages(r: f64, g: f64, b: f64) -> Self {
        let scale = |v: f64| if v.is_finite() { (v / 100.0) as f32 } else { 0.0 };
        Self::new(scale(r), scale(g), scale(b))
    }

    pub fn channels(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// Human-readable name used in notifications.
    pub fn name(&self) -> String {
        let rounded = self.channels().map(|c| (c * 10.0).round() as u8);
        let preset = match rounded {
            [0, 0, 10] => Some("Blue"),
            [5, 0, 5] => Some("Violet"),
            [0, 10, 0] => Some("Green"),
            [10, 0, 0] => Some("Red"),
            [10, 10, 0] => Some("Yellow"),
            [10, 10, 10] => Some("White"),
            [0, 0, 0] => Some("Off"),
            _ => None,
        };
        match preset {
            Some(name) => name.to_string(),
            None => format!(
                "Custom ({}%, {}%, {}%)",
                (self.r * 100.0) as u32,
                (self.g * 100.0) as u32,
                (self.b * 100.0) as u32
            ),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.r, self.g, self.b)
    }
}

fn sanitize(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// How the LED is wired to its PWM outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Shared anode: a channel is lit when its output is pulled low, so the
    /// duty cycle is the inverse of the intensity.
    CommonAnode,
    /// Shared cathode: duty cycle equals intensity.
    CommonCathode,
}

/// Per-channel PWM duty cycles (0.0-1.0) for `color`.
///
/// A channel strictly closer than `off_epsilon` to fully off is forced to
/// exactly fully off so the hardware shows no residual glow. A channel at
/// exactly `off_epsilon` is still driven.
pub fn duty_cycles(color: Color, polarity: Polarity, off_epsilon: f32) -> [f32; 3] {
    color.channels().map(|value| match polarity {
        Polarity::CommonAnode => {
            let out = 1.0 - value;
            if out > 1.0 - off_epsilon {
                1.0
            } else {
                out
            }
        }
        Polarity::CommonCathode => {
            if value < off_epsilon {
                0.0
            } else {
                value
            }
        }
    })
}
