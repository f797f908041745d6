//! Scheduled parameter timelines
//!
//! An [`AudioParam`] holds a committed base value plus a time-ordered list of
//! events. Evaluating at time `t` walks the events that have started by `t`;
//! each event begins from whatever value the previous one had reached at its
//! start time, so curves join without jumps. Events that can no longer
//! influence the future are folded into the base as time advances.
//!
//! Scheduling two events at the same start time keeps only the later write.

/// Below this residual a set-target curve counts as settled
const SETTLED_FACTOR: f64 = 1e-7;

/// One scheduled change
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamEvent {
    /// Jump to `value` at `time`
    SetValue { time: f64, value: f32 },
    /// Approach `target` exponentially from `time` on
    SetTarget {
        time: f64,
        target: f32,
        time_constant: f64,
    },
    /// Move linearly from the value at `start_time` to `value` at `end_time`
    LinearRamp {
        start_time: f64,
        end_time: f64,
        value: f32,
    },
}

impl ParamEvent {
    /// Time the event starts influencing the value
    pub fn start_time(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { time, .. } => time,
            ParamEvent::SetTarget { time, .. } => time,
            ParamEvent::LinearRamp { start_time, .. } => start_time,
        }
    }

    /// Value at `t` given the value `from` the curve started at
    fn evaluate(&self, from: f32, t: f64) -> f32 {
        match *self {
            ParamEvent::SetValue { value, .. } => value,
            ParamEvent::SetTarget {
                time,
                target,
                time_constant,
            } => {
                if time_constant <= 0.0 {
                    return target;
                }
                let factor = (-(t - time) / time_constant).exp();
                target + (from - target) * factor as f32
            }
            ParamEvent::LinearRamp {
                start_time,
                end_time,
                value,
            } => {
                if t >= end_time {
                    return value;
                }
                let progress = ((t - start_time) / (end_time - start_time)) as f32;
                from + (value - from) * progress
            }
        }
    }

    /// True once the event's curve is flat for every time after `t`
    fn is_finished(&self, t: f64) -> bool {
        match *self {
            ParamEvent::SetValue { time, .. } => t >= time,
            ParamEvent::SetTarget {
                time, time_constant, ..
            } => time_constant <= 0.0 || (-(t - time) / time_constant).exp() < SETTLED_FACTOR,
            ParamEvent::LinearRamp { end_time, .. } => t >= end_time,
        }
    }

    /// Value the curve settles on
    fn final_value(&self) -> f32 {
        match *self {
            ParamEvent::SetValue { value, .. } => value,
            ParamEvent::SetTarget { target, .. } => target,
            ParamEvent::LinearRamp { value, .. } => value,
        }
    }

    fn is_finite(&self) -> bool {
        match *self {
            ParamEvent::SetValue { time, value } => time.is_finite() && value.is_finite(),
            ParamEvent::SetTarget {
                time,
                target,
                time_constant,
            } => time.is_finite() && target.is_finite() && time_constant.is_finite(),
            ParamEvent::LinearRamp {
                start_time,
                end_time,
                value,
            } => start_time.is_finite() && end_time.is_finite() && value.is_finite(),
        }
    }
}

/// Automatable parameter
#[derive(Debug, Clone)]
pub struct AudioParam {
    name: &'static str,
    min: f32,
    max: f32,
    /// Value before the first pending event
    base: f32,
    events: Vec<ParamEvent>,
}

impl AudioParam {
    /// Create a parameter
    ///
    /// # Arguments
    /// * `name` - Label used in logs
    /// * `value` - Initial value
    /// * `min` - Lowest value produced
    /// * `max` - Highest value produced
    pub fn new(name: &'static str, value: f32, min: f32, max: f32) -> Self {
        Self {
            name,
            min,
            max,
            base: value.clamp(min, max),
            events: Vec::new(),
        }
    }

    /// Unbounded parameter
    pub fn unbounded(name: &'static str, value: f32) -> Self {
        Self::new(name, value, f32::MIN, f32::MAX)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Pending events in start order
    pub fn events(&self) -> &[ParamEvent] {
        &self.events
    }

    /// True when no event is pending
    pub fn is_static(&self) -> bool {
        self.events.is_empty()
    }

    /// Jump to `value` at `time`
    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::SetValue { time, value });
    }

    /// Approach `target` exponentially starting at `time`
    pub fn set_target_at_time(&mut self, target: f32, time: f64, time_constant: f64) {
        self.insert(ParamEvent::SetTarget {
            time,
            target,
            time_constant,
        });
    }

    /// Ramp linearly from the value at `start_time` to `value` at `end_time`
    pub fn linear_ramp(&mut self, value: f32, start_time: f64, end_time: f64) {
        if end_time <= start_time {
            self.set_value_at_time(value, end_time.max(start_time));
            return;
        }
        self.insert(ParamEvent::LinearRamp {
            start_time,
            end_time,
            value,
        });
    }

    /// Drop every event starting at or after `time`
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.start_time() < time);
    }

    /// Drop events from `time` on and hold the value reached at `time`
    pub fn cancel_and_hold(&mut self, time: f64) {
        let held = self.value_at(time);
        self.cancel_scheduled_values(time);
        self.insert(ParamEvent::SetValue { time, value: held });
    }

    fn insert(&mut self, event: ParamEvent) {
        if !event.is_finite() {
            tracing::warn!(param = self.name, ?event, "ignoring non-finite automation event");
            return;
        }
        let start = event.start_time();
        // last write wins at equal start times
        self.events.retain(|e| e.start_time() != start);
        let idx = self.events.partition_point(|e| e.start_time() < start);
        self.events.insert(idx, event);
    }

    /// Value at time `t`
    pub fn value_at(&self, t: f64) -> f32 {
        let mut value = self.base;
        for (i, event) in self.events.iter().enumerate() {
            if event.start_time() > t {
                break;
            }
            let until = match self.events.get(i + 1) {
                Some(next) if next.start_time() <= t => next.start_time(),
                _ => t,
            };
            value = event.evaluate(value, until);
        }
        value.clamp(self.min, self.max)
    }

    /// Fold events that can no longer influence values at or after `t`
    pub fn advance(&mut self, t: f64) {
        while let Some(first) = self.events.first().copied() {
            match self.events.get(1) {
                Some(next) if next.start_time() <= t => {
                    self.base = first.evaluate(self.base, next.start_time());
                    self.events.remove(0);
                }
                None if first.start_time() <= t && first.is_finished(t) => {
                    self.base = first.final_value();
                    self.events.remove(0);
                }
                _ => break,
            }
        }
    }

    /// Advance to `t` and return the value there (control-rate use)
    pub fn next_value(&mut self, t: f64) -> f32 {
        self.advance(t);
        self.value_at(t)
    }

    /// Fill `out` with per-sample values starting at `start_time`
    pub fn fill(&mut self, start_time: f64, sample_rate: u32, out: &mut [f32]) {
        self.advance(start_time);
        if self.events.is_empty() {
            out.fill(self.base.clamp(self.min, self.max));
            return;
        }
        let period = 1.0 / sample_rate as f64;
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.value_at(start_time + i as f64 * period);
        }
    }
}
