#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Breath-profile replay engine (hardware-agnostic).
//!
//! Replays a recorded flow-rate time series through two mass-flow
//! controllers driven in parallel. All hardware access goes through
//! `replay_traits::Actuator`.
//!
//! ## Architecture
//!
//! - **Profile**: CSV loader producing `(elapsed, rate)` samples (`profile`)
//! - **Compensation**: lookahead setpoints with overshoot boost (`compensator`)
//! - **Pacing**: profile-time scheduling with cancellation (`scheduler`)
//! - **Actuation**: paired MFCs with guaranteed zero-and-close (`actuator_pair`)
//! - **Logging**: per-tick record and atomic CSV output (`replay_log`)
//!
//! `replay` ties these together; `Replay::builder()` offers the same loop
//! over boxed MFCs.

pub mod actuator_pair;
pub mod atomic;
pub mod builder;
pub mod compensator;
pub mod config;
pub mod conversions;
pub mod elapsed;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod profile;
pub mod replay_log;
pub mod runner;
pub mod scheduler;
pub mod util;

pub use actuator_pair::{ActuatorFault, ActuatorId, ActuatorOp, ActuatorPair, FaultKind, ShutdownFault};
pub use builder::{Replay, ReplayBuilder, ReplaySession};
pub use compensator::{Compensator, Setpoint, clamp_rate};
pub use config::{CompensatorCfg, PacingCfg};
pub use elapsed::{Drift, ProfileElapsed, RealElapsed};
pub use error::{BuildError, DataRowError, ProfileError, ReplayError, Result};
pub use profile::{FlowSample, Profile, ProfileSchema};
pub use replay_log::{ReplayLog, ReplaySummary, ReplayTick};
pub use runner::{ReplayOutcome, ReplayParams, replay, run};
pub use scheduler::{Pace, Pacer};
