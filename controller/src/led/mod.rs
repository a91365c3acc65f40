//! LED target state and the single loop that drives the physical LED.

pub mod color;
pub mod render;
pub mod store;

pub use color::{duty_cycles, Color, Polarity};
pub use render::run_render_loop;
pub use store::{LedError, LedSnapshot, LedTargetStore, OVERRIDE_COLOR};
