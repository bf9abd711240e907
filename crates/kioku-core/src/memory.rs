//! Per-atom forgetting model.
//!
//! Memory for one slot is the nullable pair `(last_refresh, last_relearn)`
//! in day units. Retention decays as `exp(-t / (baseline + s))` where
//! `t` is days since the last refresh and `s = last_refresh - last_relearn`
//! is the spacing the atom has survived so far.

use serde::{Deserialize, Serialize};

/// Tunables for the forgetting model. Day units throughout.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Target recall probability at the scheduled review time.
    pub desired_retention: f64,
    /// Days of memory granted by a single refresh.
    pub baseline_strength: f64,
    /// Horizon of the utility integral, in days.
    pub test_delay: f64,
    /// Minimum wait before an atom may be shown again, in days.
    pub relearn_grace: f64,
}

/// Five minutes, in days.
pub const RELEARN_GRACE_DAYS: f64 = 5.0 / (24.0 * 60.0);

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            desired_retention: 0.95,
            baseline_strength: 20.0,
            test_delay: 20.0,
            relearn_grace: RELEARN_GRACE_DAYS,
        }
    }
}

impl MemoryConfig {
    /// `ln(desired_retention)`; negative for any retention below 1.
    pub fn log_retention(&self) -> f64 {
        self.desired_retention.ln()
    }
}

/// How a touch came about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchMode {
    /// A successful recall (or a first exposure).
    Refresh,
    /// A failed recall; spacing starts over.
    Relearn,
}

/// Review event emitted when a known atom is touched. One per log row.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub time_since_last_refresh: f64,
    pub time_since_last_relearn: f64,
    pub remembered: bool,
}

/// Nullable `(last_refresh, last_relearn)` pair for one memory slot.
///
/// Reachable configurations:
/// - `(None, None)` — unseen
/// - `(Some, None)` — learning (touched once, not yet confirmed)
/// - `(Some, Some)` — known
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    pub last_refresh: Option<f64>,
    pub last_relearn: Option<f64>,
}

impl MemoryState {
    pub fn new(last_refresh: Option<f64>, last_relearn: Option<f64>) -> Self {
        Self {
            last_refresh,
            last_relearn,
        }
    }

    pub fn is_unseen(&self) -> bool {
        self.last_refresh.is_none()
    }

    /// Counts toward `minimum_unknown_frequency` when true.
    pub fn is_unknown(&self) -> bool {
        self.last_relearn.is_none()
    }

    pub fn is_known(&self) -> bool {
        self.last_relearn.is_some()
    }

    /// Spacing `s = last_refresh - last_relearn`. Known atoms only.
    pub fn spacing(&self) -> Option<f64> {
        Some(self.last_refresh? - self.last_relearn?)
    }

    /// Recall probability at `now`. Known atoms only.
    pub fn retention(&self, now: f64, config: &MemoryConfig) -> Option<f64> {
        let t = now - self.last_refresh?;
        let s = self.spacing()?;
        Some(forgetting_curve(t, s, config))
    }

    /// Time at which retention drops to `desired_retention`.
    pub fn next_refresh(&self, config: &MemoryConfig) -> Option<f64> {
        let s = self.spacing()?;
        let last_refresh = self.last_refresh?;
        Some(last_refresh - (config.baseline_strength + s) * config.log_retention())
    }

    /// Whether the atom may be picked for review at `now`.
    pub fn eligible(&self, now: f64, config: &MemoryConfig) -> bool {
        match self.last_refresh {
            Some(last_refresh) if self.last_relearn.is_some() => {
                now - last_refresh >= config.relearn_grace
            }
            _ => false,
        }
    }

    /// Expected information gain from reviewing this atom at `now`.
    ///
    /// `frequency` is the number of sentences linked to the atom and
    /// `total_sentences` the store-wide sentence count. Returns `None` for
    /// atoms that are not eligible; 0 when the store is empty.
    pub fn review_utility(
        &self,
        now: f64,
        frequency: f64,
        total_sentences: f64,
        config: &MemoryConfig,
    ) -> Option<f64> {
        if !self.eligible(now, config) {
            return None;
        }
        if total_sentences <= 0.0 {
            return Some(0.0);
        }
        let last_refresh = self.last_refresh?;
        let last_relearn = self.last_relearn?;
        let t = now - last_refresh;
        let s = last_refresh - last_relearn;
        let b = config.baseline_strength;
        let d = config.test_delay;

        // Gain in horizon-retention from a successful review now, relative
        // to the retention a freshly learned atom would have at the horizon.
        let delta = ((-d / (b + now - last_relearn)).exp() - (-d / (b + s)).exp())
            / (-d / b).exp();
        let r = forgetting_curve(t, s, config);
        Some(frequency * (1.0 - frequency / total_sentences) * (r * (delta - 1.0) + 1.0))
    }

    /// Apply a touch, returning the new state and the review event to log.
    /// The event is present iff the atom was known before the call.
    pub fn touch(
        &self,
        now: f64,
        mode: TouchMode,
        config: &MemoryConfig,
    ) -> (MemoryState, Option<ReviewOutcome>) {
        let next = match mode {
            TouchMode::Relearn => MemoryState::new(Some(now), Some(now)),
            TouchMode::Refresh => match (self.last_refresh, self.last_relearn) {
                (None, _) => MemoryState::new(Some(now), None),
                // A refresh within the grace period does not confirm
                // learning; repeating the call is then a no-op on state.
                (Some(prev), None) if now - prev < config.relearn_grace => {
                    MemoryState::new(Some(now), None)
                }
                (Some(prev), None) => MemoryState::new(Some(now), Some(prev)),
                (Some(_), Some(relearn)) => MemoryState::new(Some(now), Some(relearn)),
            },
        };
        let outcome = match (self.last_refresh, self.last_relearn) {
            (Some(last_refresh), Some(last_relearn)) => Some(ReviewOutcome {
                time_since_last_refresh: now - last_refresh,
                time_since_last_relearn: now - last_relearn,
                remembered: next.last_relearn == self.last_relearn,
            }),
            _ => None,
        };
        (next, outcome)
    }
}

/// `r(t, s) = exp(-t / (baseline + s))`.
pub fn forgetting_curve(t: f64, s: f64, config: &MemoryConfig) -> f64 {
    (-t / (config.baseline_strength + s)).exp()
}

/// Value of turning a currently unknown atom into a known one.
pub fn learn_value(frequency: f64, total_sentences: f64) -> f64 {
    if total_sentences <= 0.0 {
        return 0.0;
    }
    frequency * (1.0 - frequency / total_sentences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> MemoryConfig {
        MemoryConfig::default()
    }

    fn known(last_refresh: f64, last_relearn: f64) -> MemoryState {
        MemoryState::new(Some(last_refresh), Some(last_relearn))
    }

    #[test]
    fn test_forgetting_curve_decreases_with_time() {
        let c = config();
        let r1 = forgetting_curve(1.0, 5.0, &c);
        let r2 = forgetting_curve(10.0, 5.0, &c);
        assert!(r1 > r2);
        assert_relative_eq!(forgetting_curve(0.0, 5.0, &c), 1.0);
    }

    #[test]
    fn test_forgetting_curve_slower_with_spacing() {
        let c = config();
        assert!(forgetting_curve(10.0, 30.0, &c) > forgetting_curve(10.0, 0.0, &c));
    }

    #[test]
    fn test_next_refresh_beyond_last_refresh() {
        let c = config();
        let state = known(100.0, 95.0);
        let next = state.next_refresh(&c).unwrap();
        // -ln(0.95) * (20 + 5) ≈ 1.28 days out
        assert_relative_eq!(next, 100.0 - 25.0 * 0.95f64.ln(), epsilon = 1e-12);
        assert!(next > 100.0);
    }

    #[test]
    fn test_unseen_to_learning_to_known() {
        let c = config();
        let unseen = MemoryState::default();
        assert!(unseen.is_unseen());

        let (learning, outcome) = unseen.touch(100.0, TouchMode::Refresh, &c);
        assert!(outcome.is_none());
        assert_eq!(learning, MemoryState::new(Some(100.0), None));
        assert!(learning.is_unknown());
        assert!(!learning.is_known());

        let (known, outcome) = learning.touch(105.0, TouchMode::Refresh, &c);
        assert!(outcome.is_none(), "promotion itself is not a review event");
        assert_eq!(known, MemoryState::new(Some(105.0), Some(100.0)));
        assert_relative_eq!(known.spacing().unwrap(), 5.0);
    }

    #[test]
    fn test_refresh_idempotent() {
        let c = config();
        let unseen = MemoryState::default();
        let (once, _) = unseen.touch(100.0, TouchMode::Refresh, &c);
        let (twice, _) = once.touch(100.0, TouchMode::Refresh, &c);
        assert_eq!(once, twice);

        let state = known(100.0, 95.0);
        let (once, _) = state.touch(110.0, TouchMode::Refresh, &c);
        let (twice, _) = once.touch(110.0, TouchMode::Refresh, &c);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_refresh_on_known_keeps_relearn_and_logs() {
        let c = config();
        let state = known(100.0, 95.0);
        let (next, outcome) = state.touch(110.0, TouchMode::Refresh, &c);
        assert_eq!(next, known(110.0, 95.0));
        let outcome = outcome.unwrap();
        assert!(outcome.remembered);
        assert_relative_eq!(outcome.time_since_last_refresh, 10.0);
        assert_relative_eq!(outcome.time_since_last_relearn, 15.0);
    }

    #[test]
    fn test_relearn_resets_spacing_and_logs_forgotten() {
        let c = config();
        let state = known(100.0, 80.0);
        let (next, outcome) = state.touch(110.0, TouchMode::Relearn, &c);
        assert_eq!(next, known(110.0, 110.0));
        assert_relative_eq!(next.spacing().unwrap(), 0.0);
        assert!(!outcome.unwrap().remembered);
    }

    #[test]
    fn test_relearn_on_learning_does_not_log() {
        let c = config();
        let learning = MemoryState::new(Some(100.0), None);
        let (next, outcome) = learning.touch(110.0, TouchMode::Relearn, &c);
        assert_eq!(next, known(110.0, 110.0));
        assert!(outcome.is_none());
    }

    #[test]
    fn test_grace_excludes_from_review() {
        let c = config();
        let state = known(100.0, 95.0);
        assert!(!state.eligible(100.0 + c.relearn_grace / 2.0, &c));
        assert!(state.eligible(100.0 + c.relearn_grace, &c));
        assert!(
            state
                .review_utility(100.0, 3.0, 100.0, &c)
                .is_none()
        );
    }

    #[test]
    fn test_learning_not_eligible() {
        let c = config();
        let learning = MemoryState::new(Some(100.0), None);
        assert!(!learning.eligible(200.0, &c));
    }

    #[test]
    fn test_utility_increases_with_elapsed_time() {
        // Equal frequency and spacing; the staler atom is worth more.
        let c = config();
        let now = 200.0;
        let a = known(now - 10.0, now - 15.0); // t = 10, s = 5
        let b = known(now - 20.0, now - 25.0); // t = 20, s = 5
        let ua = a.review_utility(now, 3.0, 100.0, &c).unwrap();
        let ub = b.review_utility(now, 3.0, 100.0, &c).unwrap();
        assert!(ub > ua, "expected U(t=20) > U(t=10): {ub} vs {ua}");
    }

    #[test]
    fn test_utility_zero_without_sentences() {
        let c = config();
        let state = known(100.0, 95.0);
        assert_eq!(state.review_utility(200.0, 3.0, 0.0, &c), Some(0.0));
        assert_eq!(learn_value(3.0, 0.0), 0.0);
    }

    #[test]
    fn test_learn_value_peaks_at_half_coverage() {
        assert!(learn_value(50.0, 100.0) > learn_value(10.0, 100.0));
        assert!(learn_value(50.0, 100.0) > learn_value(90.0, 100.0));
        assert_relative_eq!(learn_value(100.0, 100.0), 0.0);
    }
}
