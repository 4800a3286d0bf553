#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core simulator panel logic (transport-agnostic).
//!
//! This crate provides the telemetry injectors and actuator controllers of the
//! panel. All broker interaction goes through the `panel_traits::Transport`
//! trait; randomness through `panel_traits::NoiseSource`; time through
//! `panel_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Filtering**: None, moving average (window 5), scalar Kalman (`filter` module)
//! - **Generation**: base value plus bounded uniform noise (`generator` module)
//! - **Publishing**: `{sensor_id,timestamp,value,raw_value}` JSON (`publisher` module)
//! - **Injector**: one simulated sensor with session-scoped filter state (`injector` module)
//! - **Actuator**: Off/On/Pending toggle reconciled against confirmations (`actuator` module)
//! - **Runtime**: single event loop over ticks, control requests and inbound messages
//!   (`runtime` module), assembled with the type-state [`PanelBuilder`]
//!
//! ## Values
//!
//! All arithmetic is `f64`; values are rounded to two decimals only when a
//! telemetry message is emitted.

pub mod actuator;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod error;
pub mod filter;
pub mod generator;
pub mod injector;
pub mod mocks;
pub mod publisher;
pub mod runtime;
pub mod ticker;
pub mod transport_error;
pub mod util;

pub use actuator::{ActuatorController, ActuatorEvent, ActuatorState, SwitchStatus, ToggleOutcome};
pub use builder::PanelBuilder;
pub use config::{InjectorConfig, SwitchConfig};
pub use error::{BuildError, PanelError, Result};
pub use filter::{FilterKind, FilterState, filter};
pub use injector::{Injector, TickOutcome};
pub use publisher::{Sample, TelemetryMessage};
pub use runtime::{Control, Event, Panel, PanelEvent, PanelHandle};
