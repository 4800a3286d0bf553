//! Noise-filtering pipeline applied to every raw sample.
//!
//! The active strategy and its private state travel together in
//! [`FilterState`]; [`filter`] is the single dispatch point. Everything here
//! is a pure function of its inputs: no clock, no randomness.

use std::collections::VecDeque;

/// Fixed moving-average window.
pub const MA_WINDOW: usize = 5;
/// Process noise of the scalar Kalman filter.
pub const KALMAN_Q: f64 = 0.1;
/// Error estimate the Kalman filter starts from on every (re)start.
pub const KALMAN_INITIAL_ERROR: f64 = 1.0;

/// Filter selection for an injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    #[default]
    None,
    MovingAverage,
    Kalman,
}

impl FilterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::None => "none",
            FilterKind::MovingAverage => "moving_average",
            FilterKind::Kalman => "kalman",
        }
    }
}

/// Scalar Kalman filter state (static-estimate model, no control input).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanState {
    pub estimate: f64,
    pub error_estimate: f64,
    /// Process noise.
    pub q: f64,
    /// Measurement noise.
    pub r: f64,
}

impl KalmanState {
    /// One predict/update cycle; returns the new estimate.
    #[inline]
    fn update(&mut self, raw: f64) -> f64 {
        let predicted_error = self.error_estimate + self.q;
        let gain = predicted_error / (predicted_error + self.r);
        self.estimate += gain * (raw - self.estimate);
        self.error_estimate = (1.0 - gain) * predicted_error;
        self.estimate
    }
}

/// Per-kind filter state. Only the fields a kind needs are carried.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterState {
    None,
    /// Most recent raw samples, oldest first, never longer than [`MA_WINDOW`].
    MovingAverage(VecDeque<f64>),
    Kalman(KalmanState),
}

impl FilterState {
    /// Fresh state for a generation session.
    ///
    /// The Kalman estimate is seeded with the base value and its measurement
    /// noise with the configured noise bound.
    pub fn fresh(kind: FilterKind, base_value: f64, noise_bound: f64) -> Self {
        match kind {
            FilterKind::None => FilterState::None,
            FilterKind::MovingAverage => {
                FilterState::MovingAverage(VecDeque::with_capacity(MA_WINDOW + 1))
            }
            FilterKind::Kalman => FilterState::Kalman(KalmanState {
                estimate: base_value,
                error_estimate: KALMAN_INITIAL_ERROR,
                q: KALMAN_Q,
                r: noise_bound,
            }),
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            FilterState::None => FilterKind::None,
            FilterState::MovingAverage(_) => FilterKind::MovingAverage,
            FilterState::Kalman(_) => FilterKind::Kalman,
        }
    }

    /// Feed one raw sample, updating the state in place.
    pub fn apply(&mut self, raw: f64) -> f64 {
        match self {
            FilterState::None => raw,
            FilterState::MovingAverage(buf) => {
                buf.push_back(raw);
                if buf.len() > MA_WINDOW {
                    buf.pop_front();
                }
                // push_back above guarantees len >= 1
                buf.iter().sum::<f64>() / buf.len() as f64
            }
            FilterState::Kalman(k) => k.update(raw),
        }
    }
}

/// Filter one raw sample, returning the filtered value and the next state.
pub fn filter(raw: f64, state: FilterState) -> (f64, FilterState) {
    let mut next = state;
    let filtered = next.apply(raw);
    (filtered, next)
}
