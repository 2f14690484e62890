//! Helpers for the sampler around the executor: drawing survivors from
//! log-weights and summarizing them.

use crate::error::{SpuxError, SpuxResult};
use crate::ParticleIndex;
use fastrand::Rng;
use itertools::Itertools;
use tracing::warn;

/// Survivors of one draw plus the fraction of distinct particles kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Redraw {
    pub choice: Vec<ParticleIndex>,
    pub rate: f64,
}

/// `ln(sum(exp(v)))` over the non-NaN values; `-inf` when there are none.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let peak = values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NEG_INFINITY, f64::max);
    if !peak.is_finite() {
        return peak;
    }
    let sum: f64 = values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|v| (v - peak).exp())
        .sum();
    peak + sum.ln()
}

/// `ln(mean(exp(v)))` over the non-NaN values; NaN when there are none.
pub fn log_mean_exp(values: &[f64]) -> f64 {
    let count = values.iter().filter(|v| !v.is_nan()).count();
    if count == 0 {
        return f64::NAN;
    }
    log_sum_exp(values) - (count as f64).ln()
}

/// Multinomial draw of `particles` indices weighted by `exp(log_errors)`.
///
/// NaN errors are never drawn. If every remaining error is `-inf` the
/// remaining particles are drawn uniformly.
pub fn redraw(
    indices: &[ParticleIndex],
    log_errors: &[f64],
    particles: usize,
    rng: &mut Rng,
) -> SpuxResult<Redraw> {
    if indices.is_empty() || indices.len() != log_errors.len() {
        return Err(SpuxError::Validation(format!(
            "need one error per particle, got {} indices and {} errors",
            indices.len(),
            log_errors.len()
        )));
    }

    let valid = log_errors.iter().filter(|e| !e.is_nan()).count();
    if valid == 0 {
        return Err(SpuxError::Validation(
            "every particle error is NaN".to_string(),
        ));
    }

    let scaling = log_sum_exp(log_errors);
    let weights: Vec<f64> = if scaling == f64::NEG_INFINITY {
        warn!("Redraw: all particle errors are -inf, drawing uniformly");
        log_errors
            .iter()
            .map(|e| if e.is_nan() { 0.0 } else { 1.0 / valid as f64 })
            .collect()
    } else {
        log_errors
            .iter()
            .map(|e| if e.is_nan() { 0.0 } else { (e - scaling).exp() })
            .collect()
    };

    let cumulative: Vec<f64> = weights
        .iter()
        .scan(0.0, |acc, w| {
            *acc += w;
            Some(*acc)
        })
        .collect();
    let total = cumulative[cumulative.len() - 1];
    let last = indices.len() - 1;

    let choice: Vec<ParticleIndex> = (0..particles)
        .map(|_| {
            let u = rng.f64() * total;
            let position = cumulative.partition_point(|&c| c <= u).min(last);
            indices[position]
        })
        .collect();

    let rate = choice.iter().unique().count() as f64 / indices.len() as f64;
    Ok(Redraw { choice, rate })
}

/// Raises `particles` to at least one per worker.
pub fn clamp_particles(particles: usize, workers: usize) -> usize {
    if particles < workers {
        warn!(
            "Particles ({}) should not be fewer than workers ({}), raising to {}",
            particles, workers, workers
        );
        workers
    } else {
        particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_particles_are_never_drawn() {
        let mut rng = Rng::with_seed(7);
        let draw = redraw(&[0, 1, 2], &[f64::NAN, 0.0, f64::NAN], 50, &mut rng).unwrap();
        assert!(draw.choice.iter().all(|&i| i == 1));
        assert!((draw.rate - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn all_neg_inf_draws_uniformly_among_valid() {
        let mut rng = Rng::with_seed(11);
        let errors = [f64::NEG_INFINITY, f64::NAN, f64::NEG_INFINITY];
        let draw = redraw(&[0, 1, 2], &errors, 200, &mut rng).unwrap();
        assert!(!draw.choice.contains(&1));
        assert!(draw.choice.contains(&0));
        assert!(draw.choice.contains(&2));
    }

    #[test]
    fn all_nan_is_rejected() {
        let mut rng = Rng::with_seed(1);
        let err = redraw(&[0, 1], &[f64::NAN, f64::NAN], 2, &mut rng).unwrap_err();
        assert!(matches!(err, SpuxError::Validation(_)));
    }

    #[test]
    fn same_seed_same_draw() {
        let errors = [-1.0, -0.5, -3.0, -0.1];
        let a = redraw(&[0, 1, 2, 3], &errors, 16, &mut Rng::with_seed(3)).unwrap();
        let b = redraw(&[0, 1, 2, 3], &errors, 16, &mut Rng::with_seed(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn log_mean_exp_skips_nan() {
        let value = log_mean_exp(&[0.0, f64::NAN, 0.0]);
        assert!(value.abs() < 1e-12);
        assert!(log_mean_exp(&[f64::NAN]).is_nan());
        assert_eq!(log_sum_exp(&[f64::NEG_INFINITY]), f64::NEG_INFINITY);
    }

    #[test]
    fn clamp_raises_to_workers() {
        assert_eq!(clamp_particles(2, 4), 4);
        assert_eq!(clamp_particles(8, 4), 8);
    }
}
