//! Pure selection helpers used by the scheduler.

use rand::Rng;

/// How strongly the random jitter perturbs novelty scores.
const JITTER_SCALE: f64 = 1.0 / 7.0;

/// Staleness score for choosing which containing sentence to show.
///
/// Never-seen sentences score 0; recently seen ones approach 2. The jitter
/// `ξ/7`, `ξ ∈ (0, 1)`, keeps repeated sessions from always replaying the
/// same sentence. Lower is better.
pub fn novelty(last_seen: Option<f64>, now: f64, rng: &mut impl Rng) -> f64 {
    let seen_penalty = match last_seen {
        None => 0.0,
        Some(seen) => 1.0 + 1.0 / (now - seen).max(f64::MIN_POSITIVE),
    };
    seen_penalty + rng.random::<f64>() * JITTER_SCALE
}

/// Order review candidates best-first: highest utility, ties toward the
/// lowest packed identifier.
pub fn rank_candidates<T>(candidates: &mut Vec<(f64, i64, T)>) {
    candidates.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
}
