//! Game clock, tick cycle, and orchestration for the Waymark simulation.
//!
//! The transport crate decides which supply serves which request; this
//! crate gives it a world to run in. A tick advances the clock, replays
//! scenario events, reports carrier outcomes, runs production, and
//! dispatches the transfers of due balance passes.
//!
//! # Modules
//!
//! - [`clock`] -- [`GameClock`]: ticks and game milliseconds.
//! - [`config`] -- Configuration loading from `waymark-config.yaml`.
//! - [`carrier`] -- [`CarrierSystem`] trait and [`TimedCarriers`].
//! - [`production`] -- Production cycles and construction completion.
//! - [`scenario`] -- Scenario files and the grid generator.
//! - [`tick`] -- The per-tick phase sequence.
//! - [`runner`] -- The async simulation loop.
//!
//! [`GameClock`]: clock::GameClock
//! [`CarrierSystem`]: carrier::CarrierSystem
//! [`TimedCarriers`]: carrier::TimedCarriers

pub mod carrier;
pub mod clock;
pub mod config;
pub mod production;
pub mod runner;
pub mod scenario;
pub mod tick;
