use std::collections::{HashMap, VecDeque};
use std::f64::consts::PI;
use std::hash::Hash;

/// Easing curve applied to the elapsed fraction of a morph.
///
/// Every curve maps 0 to 0 and 1 to 1 and is monotonic in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphCurve {
    Linear,
    /// Slow start: `f²`
    Quadratic,
    /// Slow finish: `1 - (1 - f)²`
    InvQuadratic,
    /// Cosine S-curve
    Sigmoid,
    /// Cosine S-curve over `f²`, so most of the change happens late
    SigmoidAccel,
}

impl MorphCurve {
    pub fn apply(self, f: f64) -> f64 {
        let f = f.clamp(0.0, 1.0);
        match self {
            MorphCurve::Linear => f,
            MorphCurve::Quadratic => f * f,
            MorphCurve::InvQuadratic => 1.0 - (1.0 - f) * (1.0 - f),
            MorphCurve::Sigmoid => 0.5 * (1.0 - (PI * f).cos()),
            MorphCurve::SigmoidAccel => 0.5 * (1.0 - (PI * f * f).cos()),
        }
    }
}

/// Storage that owns the animated variables, addressed by key.
pub trait Animatable<K> {
    fn value(&self, key: &K) -> f64;
    fn set_value(&mut self, key: &K, value: f64);
}

impl<K: Eq + Hash + Clone> Animatable<K> for HashMap<K, f64> {
    fn value(&self, key: &K) -> f64 {
        *self.get(key).unwrap_or_else(|| panic!("animated variable is not registered"))
    }

    fn set_value(&mut self, key: &K, value: f64) {
        self.insert(key.clone(), value);
    }
}

/// Parameters of a morph that has not started yet.
#[derive(Debug, Clone)]
pub struct MorphRequest<D = ()> {
    curve: MorphCurve,
    /// `None` holds the variable at whatever value it has when the morph begins
    target: Option<f64>,
    duration: f64,
    notify_step: bool,
    notify_end: bool,
    data: D,
}

impl MorphRequest<()> {
    pub fn new(curve: MorphCurve, target: f64, duration: f64) -> Self {
        Self {
            curve,
            target: Some(target),
            duration,
            notify_step: false,
            notify_end: false,
            data: (),
        }
    }

    /// A morph that leaves the variable where it is for `duration` seconds.
    /// Chained in front of a real morph it acts as a delay.
    pub fn hold(duration: f64) -> Self {
        Self {
            curve: MorphCurve::Linear,
            target: None,
            duration,
            notify_step: false,
            notify_end: false,
            data: (),
        }
    }
}

impl<D> MorphRequest<D> {
    /// Emit a `Step` event after every intermediate update
    pub fn on_step(mut self) -> Self {
        self.notify_step = true;
        self
    }

    /// Emit a `Finished` event after the last update
    pub fn on_end(mut self) -> Self {
        self.notify_end = true;
        self
    }

    pub fn with_data<E>(self, data: E) -> MorphRequest<E> {
        MorphRequest {
            curve: self.curve,
            target: self.target,
            duration: self.duration,
            notify_step: self.notify_step,
            notify_end: self.notify_end,
            data,
        }
    }
}

/// A running morph of one variable
#[derive(Debug, Clone)]
pub struct Morph<K, D = ()> {
    pub key: K,
    pub curve: MorphCurve,
    pub start_value: f64,
    pub end_value: f64,
    pub t_start: f64,
    pub t_end: f64,
    notify_step: bool,
    notify_end: bool,
    data: D,
    /// Morphs that run on the same variable once this one ends
    chain: VecDeque<MorphRequest<D>>,
}

impl<K, D> Morph<K, D> {
    fn begin(key: K, request: MorphRequest<D>, start_value: f64, now: f64) -> Self {
        Self {
            key,
            curve: request.curve,
            start_value,
            end_value: request.target.unwrap_or(start_value),
            t_start: now,
            t_end: now + request.duration.max(0.0),
            notify_step: request.notify_step,
            notify_end: request.notify_end,
            data: request.data,
            chain: VecDeque::new(),
        }
    }

    /// Elapsed fraction at `now`. Zero-length morphs are always complete.
    pub fn fraction(&self, now: f64) -> f64 {
        if self.t_end <= self.t_start {
            return 1.0;
        }
        ((now - self.t_start) / (self.t_end - self.t_start)).clamp(0.0, 1.0)
    }

    fn value_at(&self, f: f64) -> f64 {
        self.start_value + self.curve.apply(f) * (self.end_value - self.start_value)
    }

    /// Value the variable ends at once the whole chain has run
    fn final_value(&self) -> f64 {
        self.chain
            .iter()
            .fold(self.end_value, |value, request| request.target.unwrap_or(value))
    }
}

/// Why a callback fired
#[derive(Debug, Clone, PartialEq)]
pub enum MorphEvent<K, D = ()> {
    /// Intermediate update of a morph that asked for step notifications
    Step { key: K, value: f64, data: D },
    /// Last update of a morph that asked for end notification
    Finished { key: K, value: f64, data: D },
    /// A frame-scheduled event came due
    Scheduled { data: D },
}

#[derive(Debug, Clone)]
struct ScheduledEvent<D> {
    frames_left: u32,
    data: D,
}

/// Time-based animation of scalar variables.
///
/// At most one morph runs per variable; starting another one on the same
/// variable cancels the first. Events are returned from `tick` instead of
/// being called back, so whatever the owner does in response (including
/// starting new morphs) takes effect on the following tick.
#[derive(Debug, Clone)]
pub struct MorphScheduler<K, D = ()> {
    morphs: Vec<Morph<K, D>>,
    events: Vec<ScheduledEvent<D>>,
    clock: f64,
}

impl<K, D> Default for MorphScheduler<K, D> {
    fn default() -> Self {
        Self {
            morphs: Vec::new(),
            events: Vec::new(),
            clock: 0.0,
        }
    }
}

impl<K: Clone + PartialEq, D: Clone> MorphScheduler<K, D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the most recent tick (morphs started now begin at this time)
    pub fn now(&self) -> f64 {
        self.clock
    }

    /// Move the clock without updating anything
    pub fn set_clock(&mut self, now: f64) {
        self.clock = now;
    }

    /// Begin animating `key` from its current value, replacing any morph
    /// already running on it.
    pub fn start<V: Animatable<K> + ?Sized>(&mut self, values: &V, key: K, request: MorphRequest<D>) {
        self.cancel(&key);
        let start_value = values.value(&key);
        self.morphs.push(Morph::begin(key, request, start_value, self.clock));
    }

    /// Queue `request` behind the morph running on `key`, or start it right
    /// away when the variable is idle.
    pub fn chain<V: Animatable<K> + ?Sized>(&mut self, values: &V, key: K, request: MorphRequest<D>) {
        match self.morphs.iter_mut().find(|m| m.key == key) {
            Some(morph) => morph.chain.push_back(request),
            None => self.start(values, key, request),
        }
    }

    /// Drop the morph (and its chain) on `key`, leaving the variable at its
    /// current value. Returns false when nothing was running.
    pub fn cancel(&mut self, key: &K) -> bool {
        let before = self.morphs.len();
        self.morphs.retain(|m| m.key != *key);
        self.morphs.len() != before
    }

    /// Jump `key` straight to the end of its chain, reporting every
    /// completion that would have fired along the way.
    pub fn force_complete<V: Animatable<K> + ?Sized>(&mut self, values: &mut V, key: &K) -> Vec<MorphEvent<K, D>> {
        let Some(pos) = self.morphs.iter().position(|m| m.key == *key) else {
            return Vec::new();
        };
        let morph = self.morphs.remove(pos);

        let mut events = Vec::new();
        let mut value = morph.end_value;
        values.set_value(key, value);
        if morph.notify_end {
            events.push(MorphEvent::Finished {
                key: key.clone(),
                value,
                data: morph.data,
            });
        }
        for request in morph.chain {
            value = request.target.unwrap_or(value);
            values.set_value(key, value);
            if request.notify_end {
                events.push(MorphEvent::Finished {
                    key: key.clone(),
                    value,
                    data: request.data,
                });
            }
        }
        events
    }

    /// Fire a `Scheduled` event after `nframes` ticks (0 and 1 both mean
    /// the next tick).
    pub fn schedule_event(&mut self, nframes: u32, data: D) {
        self.events.push(ScheduledEvent {
            frames_left: nframes.max(1),
            data,
        });
    }

    /// Advance every morph to `now`, in registration order.
    pub fn tick<V: Animatable<K> + ?Sized>(&mut self, values: &mut V, now: f64) -> Vec<MorphEvent<K, D>> {
        self.clock = now;
        let mut fired = Vec::new();

        let mut i = 0;
        while i < self.morphs.len() {
            let morph = &self.morphs[i];
            let f = morph.fraction(now);
            if f < 1.0 {
                let value = morph.value_at(f);
                values.set_value(&morph.key, value);
                if morph.notify_step {
                    fired.push(MorphEvent::Step {
                        key: morph.key.clone(),
                        value,
                        data: morph.data.clone(),
                    });
                }
                i += 1;
                continue;
            }

            let mut done = self.morphs.remove(i);
            let key = done.key.clone();
            let end_value = done.end_value;
            values.set_value(&key, end_value);
            let successor = done.chain.pop_front();
            let chain = std::mem::take(&mut done.chain);
            if done.notify_end {
                fired.push(MorphEvent::Finished {
                    key: key.clone(),
                    value: end_value,
                    data: done.data,
                });
            }

            // The successor takes over the same slot and begins now
            if let Some(request) = successor {
                let mut next = Morph::begin(key, request, end_value, now);
                next.chain = chain;
                self.morphs.insert(i, next);
                i += 1;
            }
        }

        let mut pending = Vec::with_capacity(self.events.len());
        for mut event in self.events.drain(..) {
            if event.frames_left <= 1 {
                fired.push(MorphEvent::Scheduled { data: event.data });
            } else {
                event.frames_left -= 1;
                pending.push(event);
            }
        }
        self.events = pending;

        fired
    }

    pub fn is_morphing(&self, key: &K) -> bool {
        self.morphs.iter().any(|m| m.key == *key)
    }

    /// True while any morph or scheduled event is outstanding
    pub fn is_active(&self) -> bool {
        !self.morphs.is_empty() || !self.events.is_empty()
    }

    /// Where `key` will end up once its chain finishes
    pub fn target_value(&self, key: &K) -> Option<f64> {
        self.morphs.iter().find(|m| m.key == *key).map(Morph::final_value)
    }

    pub fn morph(&self, key: &K) -> Option<&Morph<K, D>> {
        self.morphs.iter().find(|m| m.key == *key)
    }

    /// Number of running morphs (chained successors not counted)
    pub fn len(&self) -> usize {
        self.morphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.morphs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn vars(pairs: &[(&'static str, f64)]) -> HashMap<&'static str, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    #[should_panic(expected = "animated variable is not registered")]
    fn test_unregistered_variable_panics() {
        let mut scheduler: MorphScheduler<&str, ()> = MorphScheduler::new();
        let values = vars(&[("x", 0.0)]);
        scheduler.start(&values, "y", MorphRequest::new(MorphCurve::Linear, 1.0, 1.0));
    }

    #[test]
    fn test_curve_midpoints() {
        assert!((MorphCurve::Linear.apply(0.5) - 0.5).abs() < EPS);
        assert!((MorphCurve::Quadratic.apply(0.5) - 0.25).abs() < EPS);
        assert!((MorphCurve::InvQuadratic.apply(0.5) - 0.75).abs() < EPS);
        assert!((MorphCurve::Sigmoid.apply(0.5) - 0.5).abs() < EPS);
        // Accelerated sigmoid lags behind the plain one at the midpoint
        assert!(MorphCurve::SigmoidAccel.apply(0.5) < MorphCurve::Sigmoid.apply(0.5));
    }

    #[test]
    fn test_curve_endpoints() {
        for curve in [
            MorphCurve::Linear,
            MorphCurve::Quadratic,
            MorphCurve::InvQuadratic,
            MorphCurve::Sigmoid,
            MorphCurve::SigmoidAccel,
        ] {
            assert!(curve.apply(0.0).abs() < EPS, "{:?} at 0", curve);
            assert!((curve.apply(1.0) - 1.0).abs() < EPS, "{:?} at 1", curve);
        }
    }

    #[test]
    fn test_morph_samples_start_mid_end() {
        let mut values = vars(&[("x", 2.0)]);
        let mut sched: MorphScheduler<&str> = MorphScheduler::new();
        sched.start(&values, "x", MorphRequest::new(MorphCurve::Quadratic, 6.0, 4.0));

        sched.tick(&mut values, 0.0);
        assert!((values["x"] - 2.0).abs() < EPS);

        sched.tick(&mut values, 2.0);
        assert!((values["x"] - (2.0 + 0.25 * 4.0)).abs() < EPS);

        sched.tick(&mut values, 4.0);
        assert_eq!(values["x"], 6.0);
        assert!(!sched.is_morphing(&"x"));
    }

    #[test]
    fn test_restart_replaces_existing_morph() {
        let mut values = vars(&[("x", 0.0)]);
        let mut sched: MorphScheduler<&str> = MorphScheduler::new();
        sched.start(&values, "x", MorphRequest::new(MorphCurve::Linear, 10.0, 10.0));
        sched.tick(&mut values, 5.0);
        assert!((values["x"] - 5.0).abs() < EPS);

        sched.start(&values, "x", MorphRequest::new(MorphCurve::Linear, 0.0, 1.0));
        assert_eq!(sched.len(), 1);
        let morph = sched.morph(&"x").unwrap();
        assert!((morph.start_value - 5.0).abs() < EPS);
        assert_eq!(morph.t_start, 5.0);

        sched.tick(&mut values, 6.0);
        assert_eq!(values["x"], 0.0);
    }

    #[test]
    fn test_cancel_leaves_partial_value() {
        let mut values = vars(&[("x", 0.0)]);
        let mut sched: MorphScheduler<&str> = MorphScheduler::new();
        sched.start(&values, "x", MorphRequest::new(MorphCurve::Linear, 1.0, 2.0));
        sched.tick(&mut values, 1.0);

        assert!(sched.cancel(&"x"));
        assert!(!sched.cancel(&"x"));
        sched.tick(&mut values, 5.0);
        assert!((values["x"] - 0.5).abs() < EPS);
    }

    #[test]
    fn test_force_complete_fires_end() {
        let mut values = vars(&[("x", 0.0)]);
        let mut sched: MorphScheduler<&str, u32> = MorphScheduler::new();
        sched.start(
            &values,
            "x",
            MorphRequest::new(MorphCurve::Sigmoid, 1.0, 3.0).on_end().with_data(7),
        );

        let events = sched.force_complete(&mut values, &"x");
        assert_eq!(values["x"], 1.0);
        assert_eq!(
            events,
            vec![MorphEvent::Finished { key: "x", value: 1.0, data: 7 }]
        );
        assert!(sched.is_empty());
        assert!(sched.force_complete(&mut values, &"x").is_empty());
    }

    #[test]
    fn test_zero_duration_completes_next_tick() {
        let mut values = vars(&[("x", 3.0)]);
        let mut sched: MorphScheduler<&str> = MorphScheduler::new();
        sched.start(&values, "x", MorphRequest::new(MorphCurve::Linear, -1.0, 0.0).on_end());
        sched.start(&values, "x", MorphRequest::new(MorphCurve::Linear, -2.0, -5.0).on_end());

        let events = sched.tick(&mut values, 0.0);
        assert_eq!(values["x"], -2.0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_step_events_skip_final_update() {
        let mut values = vars(&[("x", 0.0)]);
        let mut sched: MorphScheduler<&str> = MorphScheduler::new();
        sched.start(&values, "x", MorphRequest::new(MorphCurve::Linear, 1.0, 1.0).on_step().on_end());

        let mid = sched.tick(&mut values, 0.5);
        assert!(matches!(mid.as_slice(), [MorphEvent::Step { .. }]));
        let end = sched.tick(&mut values, 1.0);
        assert!(matches!(end.as_slice(), [MorphEvent::Finished { .. }]));
    }

    #[test]
    fn test_events_in_registration_order() {
        let mut values = vars(&[("a", 0.0), ("b", 0.0), ("c", 0.0)]);
        let mut sched: MorphScheduler<&str> = MorphScheduler::new();
        for key in ["b", "a", "c"] {
            sched.start(&values, key, MorphRequest::new(MorphCurve::Linear, 1.0, 2.0).on_step());
        }
        let keys: Vec<&str> = sched
            .tick(&mut values, 1.0)
            .into_iter()
            .filter_map(|e| match e {
                MorphEvent::Step { key, .. } => Some(key),
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_chain_promotes_successor() {
        let mut values = vars(&[("x", 0.0)]);
        let mut sched: MorphScheduler<&str> = MorphScheduler::new();
        sched.start(&values, "x", MorphRequest::hold(1.0));
        sched.chain(&values, "x", MorphRequest::new(MorphCurve::Linear, 4.0, 2.0).on_end());
        assert_eq!(sched.target_value(&"x"), Some(4.0));

        sched.tick(&mut values, 0.5);
        assert_eq!(values["x"], 0.0);

        // Hold ends here; successor begins at t = 1.5
        sched.tick(&mut values, 1.5);
        assert_eq!(values["x"], 0.0);
        assert_eq!(sched.morph(&"x").unwrap().t_start, 1.5);

        sched.tick(&mut values, 2.5);
        assert!((values["x"] - 2.0).abs() < EPS);

        let events = sched.tick(&mut values, 3.5);
        assert_eq!(values["x"], 4.0);
        assert_eq!(events.len(), 1);
        assert!(!sched.is_active());
    }

    #[test]
    fn test_chain_on_idle_variable_starts_now() {
        let mut values = vars(&[("x", 1.0)]);
        let mut sched: MorphScheduler<&str> = MorphScheduler::new();
        sched.set_clock(10.0);
        sched.chain(&values, "x", MorphRequest::new(MorphCurve::Linear, 2.0, 1.0));
        sched.tick(&mut values, 11.0);
        assert_eq!(values["x"], 2.0);
    }

    #[test]
    fn test_force_complete_runs_whole_chain() {
        let mut values = vars(&[("x", 0.0)]);
        let mut sched: MorphScheduler<&str> = MorphScheduler::new();
        sched.start(&values, "x", MorphRequest::new(MorphCurve::Linear, 1.0, 1.0).on_end());
        sched.chain(&values, "x", MorphRequest::hold(1.0));
        sched.chain(&values, "x", MorphRequest::new(MorphCurve::Linear, 3.0, 1.0).on_end());

        let events = sched.force_complete(&mut values, &"x");
        assert_eq!(values["x"], 3.0);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_scheduled_event_waits_frames() {
        let mut values: HashMap<&str, f64> = HashMap::new();
        let mut sched: MorphScheduler<&str, &str> = MorphScheduler::new();
        sched.schedule_event(3, "ping");

        assert!(sched.tick(&mut values, 0.0).is_empty());
        assert!(sched.tick(&mut values, 0.1).is_empty());
        assert_eq!(
            sched.tick(&mut values, 0.2),
            vec![MorphEvent::Scheduled { data: "ping" }]
        );
        assert!(!sched.is_active());
    }

    proptest! {
        #[test]
        fn test_curves_monotonic(a in 0.0f64..1.0, b in 0.0f64..1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            for curve in [
                MorphCurve::Linear,
                MorphCurve::Quadratic,
                MorphCurve::InvQuadratic,
                MorphCurve::Sigmoid,
                MorphCurve::SigmoidAccel,
            ] {
                prop_assert!(curve.apply(lo) <= curve.apply(hi) + EPS);
                prop_assert!((0.0..=1.0).contains(&curve.apply(lo)));
            }
        }
    }
}
