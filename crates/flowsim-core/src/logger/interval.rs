//! Compression of a value-change stream into `[start, end) -> value` records.

use serde::Serialize;

use crate::Time;

/// A value that held during `[start, end)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogInterval<T> {
    pub start: Time,
    pub end: Time,
    pub value: T,
}

impl<T> LogInterval<T> {
    pub fn new(start: Time, end: Time, value: T) -> Self {
        Self { start, end, value }
    }

    pub fn duration(&self) -> Time {
        self.end - self.start
    }
}

/// Turns a stream of `update(now, value)` calls into the minimal list of intervals.
///
/// Only the last value reported within a time instant counts. At most two intervals are
/// pending at any moment: `alpha` (oldest, not yet emitted) and `beta` (opened at the last
/// instant that was seen). When a new instant arrives, `alpha` is emitted if its value differs
/// from the value `beta` ended with, otherwise `beta` is merged into it.
pub struct IntervalLog<T> {
    same: Box<dyn Fn(&T, &T) -> bool>,
    last_value: Option<T>,
    last_check: Option<Time>,
    alpha_start: Option<Time>,
    alpha_value: Option<T>,
    beta_start: Option<Time>,
    finished: bool,
}

impl<T: Clone> IntervalLog<T> {
    /// Creates a log that merges values considered equal by `same`.
    pub fn new(same: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self {
            same: Box::new(same),
            last_value: None,
            last_check: None,
            alpha_start: None,
            alpha_value: None,
            beta_start: None,
            finished: false,
        }
    }

    /// Reports the value at time `now`. Returns the interval that became final, if any.
    ///
    /// Calls after [`finish`](Self::finish) are ignored.
    pub fn update(&mut self, now: Time, value: T) -> Option<LogInterval<T>> {
        if self.finished {
            return None;
        }
        let mut emitted = None;
        if self.last_check.map_or(true, |t| now > t) {
            match (self.alpha_start, self.beta_start) {
                (None, _) => {
                    self.alpha_start = Some(now);
                }
                (Some(_), None) => {
                    self.beta_start = Some(now);
                    self.alpha_value = self.last_value.clone();
                }
                (Some(alpha_start), Some(beta_start)) => {
                    let beta_value = self.last_value.clone();
                    let alpha_value = self.alpha_value.take();
                    if let (Some(alpha_value), Some(beta_value)) = (alpha_value, beta_value) {
                        if (self.same)(&alpha_value, &beta_value) {
                            self.alpha_value = Some(alpha_value);
                        } else {
                            emitted = Some(LogInterval::new(alpha_start, beta_start, alpha_value));
                            self.alpha_start = Some(beta_start);
                            self.alpha_value = Some(beta_value);
                        }
                    }
                    self.beta_start = Some(now);
                }
            }
            self.last_check = Some(now);
        }
        self.last_value = Some(value);
        emitted
    }

    /// Closes the log at time `now` and returns the pending intervals (zero to two of them).
    pub fn finish(&mut self, now: Time) -> Vec<LogInterval<T>> {
        let mut result = Vec::new();
        if self.finished {
            return result;
        }
        self.finished = true;
        let (Some(alpha_start), Some(last)) = (self.alpha_start, self.last_value.clone()) else {
            return result;
        };
        match (self.beta_start, self.alpha_value.clone()) {
            (Some(beta_start), Some(alpha_value)) => {
                if (self.same)(&alpha_value, &last) {
                    result.push(LogInterval::new(alpha_start, now, alpha_value));
                } else {
                    result.push(LogInterval::new(alpha_start, beta_start, alpha_value));
                    if beta_start != now {
                        result.push(LogInterval::new(beta_start, now, last));
                    }
                }
            }
            _ => {
                if alpha_start != now {
                    result.push(LogInterval::new(alpha_start, now, last));
                }
            }
        }
        result
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<T: Clone + PartialEq + 'static> IntervalLog<T> {
    /// Creates a log that merges exactly equal values.
    pub fn exact() -> Self {
        Self::new(|a: &T, b: &T| a == b)
    }
}

impl IntervalLog<f64> {
    /// Creates a log that merges values closer than `precision`.
    pub fn within(precision: f64) -> Self {
        Self::new(move |a: &f64, b: &f64| (a - b).abs() < precision)
    }
}
