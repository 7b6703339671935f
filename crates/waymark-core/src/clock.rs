//! Game clock.
//!
//! The clock counts ticks and maps them to game time in milliseconds, the
//! unit every transport operation takes as `now`. Game time is derived from
//! the tick counter and never stored independently.

use crate::config::WorldConfig;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter or game time would overflow.
    #[error("clock overflow: cannot advance beyond tick {tick}")]
    Overflow {
        /// The tick the clock stopped at.
        tick: u64,
    },

    /// Invalid time configuration.
    #[error("invalid time configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Tick counter with a fixed amount of game time per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameClock {
    tick: u64,
    ms_per_tick: u64,
}

impl GameClock {
    /// Create a clock at tick 0 from the world configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `game_ms_per_tick` is 0.
    pub fn new(config: &WorldConfig) -> Result<Self, ClockError> {
        Self::from_parts(0, config.game_ms_per_tick)
    }

    /// Create a clock at an arbitrary tick (used when resuming a snapshot).
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `ms_per_tick` is 0 or the
    /// tick's game time does not fit into `u64`.
    pub fn from_parts(tick: u64, ms_per_tick: u64) -> Result<Self, ClockError> {
        if ms_per_tick == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "game_ms_per_tick must be at least 1".to_owned(),
            });
        }
        if tick.checked_mul(ms_per_tick).is_none() {
            return Err(ClockError::InvalidConfig {
                reason: format!("tick {tick} exceeds the game time range"),
            });
        }
        Ok(Self { tick, ms_per_tick })
    }

    /// Advance by one tick. Returns the new game time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Overflow`] if the tick counter or the game
    /// time would exceed `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        let overflow = ClockError::Overflow { tick: self.tick };
        let next = self.tick.checked_add(1).ok_or(overflow)?;
        let now = next
            .checked_mul(self.ms_per_tick)
            .ok_or(ClockError::Overflow { tick: self.tick })?;
        self.tick = next;
        Ok(now)
    }

    /// Current tick number.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Game milliseconds per tick.
    pub const fn ms_per_tick(&self) -> u64 {
        self.ms_per_tick
    }

    /// Current game time in milliseconds.
    pub const fn now_ms(&self) -> u64 {
        // from_parts and advance reject ticks whose product overflows.
        self.tick.saturating_mul(self.ms_per_tick)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_game_time() {
        let mut clock = GameClock::from_parts(0, 250).unwrap();
        assert_eq!(clock.now_ms(), 0);
        assert_eq!(clock.advance().unwrap(), 250);
        assert_eq!(clock.advance().unwrap(), 500);
        assert_eq!(clock.tick(), 2);
    }

    #[test]
    fn zero_ms_per_tick_is_rejected() {
        assert!(matches!(
            GameClock::from_parts(0, 0),
            Err(ClockError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn overflow_is_an_error() {
        let mut clock = GameClock::from_parts(u64::MAX / 2, 2).unwrap();
        assert!(matches!(clock.advance(), Err(ClockError::Overflow { .. })));
        assert_eq!(clock.tick(), u64::MAX / 2);
    }

    #[test]
    fn clock_from_default_world_config() {
        let clock = GameClock::new(&WorldConfig::default()).unwrap();
        assert_eq!(clock.ms_per_tick(), 250);
    }
}
