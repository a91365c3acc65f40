use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use super::color::Color;

/// Color forced while a flash override is active.
pub const OVERRIDE_COLOR: Color = Color::WHITE;

#[derive(Debug)]
struct LedState {
    steady: Color,
    override_until: Option<Instant>,
    /// When set, the auto policy owns `steady` and manual writes are refused.
    auto: bool,
}

/// Desired LED output: a steady color, a time-bounded white override, and
/// the flag deciding who may write the steady color.
///
/// Every accessor takes the lock for exactly one read or write, so callers
/// observe each call as a single atomic step. Keeping the auto flag under the
/// same lock as the color lets a manual write and an auto-mode toggle never
/// interleave between the "is auto on?" check and the write.
#[derive(Debug)]
pub struct LedTargetStore {
    state: Mutex<LedState>,
}

/// Point-in-time copy of the store, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedSnapshot {
    pub steady: Color,
    pub effective: Color,
    pub override_active: bool,
    pub auto: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedError {
    #[error("Motion LED auto mode is enabled.")]
    AutoModeActive,
}

impl LedTargetStore {
    pub fn new(auto: bool) -> Self {
        Self {
            state: Mutex::new(LedState {
                steady: Color::OFF,
                override_until: None,
                auto,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unconditionally replace the steady color.
    pub fn set_steady(&self, color: Color) {
        self.lock().steady = color;
    }

    /// Replace the steady color only if auto mode is off.
    pub fn set_steady_manual(&self, color: Color) -> Result<(), LedError> {
        let mut state = self.lock();
        if state.auto {
            return Err(LedError::AutoModeActive);
        }
        state.steady = color;
        Ok(())
    }

    /// Replace the steady color only if auto mode is on. Returns the previous
    /// steady color when the write happened.
    pub fn set_steady_auto(&self, color: Color) -> Option<Color> {
        let mut state = self.lock();
        if !state.auto {
            return None;
        }
        Some(std::mem::replace(&mut state.steady, color))
    }

    /// Start (or restart) the override so it lasts `duration` from `now`.
    /// An override already running is replaced, not extended.
    pub fn set_override(&self, now: Instant, duration: Duration) {
        self.lock().override_until = Some(now + duration);
    }

    /// Effective color at `now`: the override color while it's active,
    /// otherwise the steady color.
    pub fn resolve(&self, now: Instant) -> Color {
        let state = self.lock();
        match state.override_until {
            Some(until) if now < until => OVERRIDE_COLOR,
            _ => state.steady,
        }
    }

    pub fn steady(&self) -> Color {
        self.lock().steady
    }

    pub fn auto_enabled(&self) -> bool {
        self.lock().auto
    }

    /// Flip auto mode and return the new value.
    pub fn toggle_auto(&self) -> bool {
        let mut state = self.lock();
        state.auto = !state.auto;
        state.auto
    }

    pub fn snapshot(&self, now: Instant) -> LedSnapshot {
        let state = self.lock();
        let override_active = matches!(state.override_until, Some(until) if now < until);
        LedSnapshot {
            steady: state.steady,
            effective: if override_active { OVERRIDE_COLOR } else { state.steady },
            override_active,
            auto: state.auto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_off_with_no_override() {
        let store = LedTargetStore::new(true);
        let now = Instant::now();
        assert_eq!(store.resolve(now), Color::OFF);
        assert!(store.auto_enabled());
        assert!(!store.snapshot(now).override_active);
    }

    #[test]
    fn override_wins_until_deadline() {
        let store = LedTargetStore::new(false);
        store.set_steady(Color::new(1.0, 0.0, 0.0));
        let start = Instant::now();
        store.set_override(start, Duration::from_secs(2));

        assert_eq!(store.resolve(start), OVERRIDE_COLOR);
        assert_eq!(store.resolve(start + Duration::from_millis(1999)), OVERRIDE_COLOR);
        assert_eq!(store.resolve(start + Duration::from_secs(2)), Color::new(1.0, 0.0, 0.0));
        assert_eq!(store.resolve(start + Duration::from_secs(5)), Color::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn override_replaces_instead_of_stacking() {
        let store = LedTargetStore::new(false);
        let start = Instant::now();
        store.set_override(start, Duration::from_secs(2));
        store.set_override(start + Duration::from_secs(1), Duration::from_secs(2));

        // Deadline is now start+3s, not start+4s.
        assert_eq!(store.resolve(start + Duration::from_millis(2500)), OVERRIDE_COLOR);
        assert_eq!(store.resolve(start + Duration::from_secs(3)), Color::OFF);

        // A shorter override issued later also replaces the deadline.
        store.set_override(start + Duration::from_secs(3), Duration::from_millis(100));
        assert_eq!(store.resolve(start + Duration::from_millis(3200)), Color::OFF);
    }

    #[test]
    fn manual_write_refused_in_auto_mode() {
        let store = LedTargetStore::new(true);
        store.set_steady(Color::BLUE);
        assert_eq!(
            store.set_steady_manual(Color::new(1.0, 0.0, 0.0)),
            Err(LedError::AutoModeActive)
        );
        assert_eq!(store.steady(), Color::BLUE);

        assert!(!store.toggle_auto());
        store.set_steady_manual(Color::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(store.steady(), Color::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn auto_write_ignored_in_manual_mode() {
        let store = LedTargetStore::new(false);
        store.set_steady(Color::WHITE);
        assert_eq!(store.set_steady_auto(Color::BLUE), None);
        assert_eq!(store.steady(), Color::WHITE);

        store.toggle_auto();
        assert_eq!(store.set_steady_auto(Color::BLUE), Some(Color::WHITE));
        assert_eq!(store.steady(), Color::BLUE);
    }

    #[test]
    fn double_toggle_is_identity() {
        let store = LedTargetStore::new(true);
        store.set_steady(Color::BLUE);
        let before = store.snapshot(Instant::now());
        store.toggle_auto();
        store.toggle_auto();
        assert_eq!(store.snapshot(Instant::now()), before);
    }

    #[test]
    fn concurrent_writers_never_produce_unknown_colors() {
        let store = Arc::new(LedTargetStore::new(false));
        let red = Color::new(1.0, 0.0, 0.0);
        let green = Color::new(0.0, 1.0, 0.0);

        let writers: Vec<_> = [red, green]
            .into_iter()
            .map(|color| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        store.set_steady(color);
                    }
                })
            })
            .collect();

        for _ in 0..10_000 {
            let c = store.resolve(Instant::now());
            assert!(c == red || c == green || c == Color::OFF, "torn color {c}");
        }
        for w in writers {
            w.join().unwrap();
        }
    }
}
