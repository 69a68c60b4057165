//! Survival-model boundary
//!
//! Hazard models are fitted elsewhere. This module compares nested models
//! with a likelihood ratio test and scores risk predictions with Harrell's
//! concordance index.

use log::info;

use crate::clinical::SurvivalRecord;
use crate::error::{FaceAgeError, Result};

/// A fitted proportional-hazards model
pub trait HazardModel {
    /// Log partial likelihood at the fitted coefficients
    fn log_likelihood(&self) -> f64;
    fn coefficients(&self) -> &[f64];
}

/// Minimal fitted model carrying only what the test needs
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    pub log_likelihood: f64,
    pub coefficients: Vec<f64>,
}

impl HazardModel for FittedModel {
    fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

/// Chi-square test between a null model and a model with extra covariates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LikelihoodRatioTest {
    pub statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
}

/// `2·(ll_alt − ll_null)` against a chi-square with the extra coefficient count
pub fn likelihood_ratio_test<N, A>(null: &N, alternative: &A) -> Result<LikelihoodRatioTest>
where
    N: HazardModel + ?Sized,
    A: HazardModel + ?Sized,
{
    let null_params = null.coefficients().len();
    let alt_params = alternative.coefficients().len();
    if alt_params <= null_params {
        return Err(FaceAgeError::invalid_parameter(
            "degrees of freedom",
            format!("{alt_params} - {null_params}"),
        ));
    }
    let degrees_of_freedom = alt_params - null_params;
    let statistic = 2.0 * (alternative.log_likelihood() - null.log_likelihood());
    let p_value = chi_square_sf(statistic, degrees_of_freedom as f64);
    info!(
        "Likelihood ratio test: chi2 = {statistic:.4} on {degrees_of_freedom} df, p = {p_value:.4}"
    );
    Ok(LikelihoodRatioTest {
        statistic,
        degrees_of_freedom,
        p_value,
    })
}

/// Upper tail of the chi-square distribution
#[must_use]
pub fn chi_square_sf(x: f64, k: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    upper_gamma_regularized(k / 2.0, x / 2.0)
}

fn ln_gamma(x: f64) -> f64 {
    // Lanczos, g = 7
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + 7.5;
    let series = COEFFS[1..]
        .iter()
        .enumerate()
        .fold(COEFFS[0], |acc, (i, c)| acc + c / (x + i as f64 + 1.0));
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// `Q(a, x) = Γ(a, x) / Γ(a)`
fn upper_gamma_regularized(a: f64, x: f64) -> f64 {
    const EPS: f64 = 1e-14;
    const MAX_ITER: usize = 500;
    let log_prefactor = -x + a * x.ln() - ln_gamma(a);

    if x < a + 1.0 {
        // series for P, then Q = 1 - P
        let mut term = 1.0 / a;
        let mut sum = term;
        let mut n = a;
        for _ in 0..MAX_ITER {
            n += 1.0;
            term *= x / n;
            sum += term;
            if term.abs() < sum.abs() * EPS {
                break;
            }
        }
        return (1.0 - sum * log_prefactor.exp()).clamp(0.0, 1.0);
    }

    // continued fraction (modified Lentz)
    let tiny = 1e-300;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / tiny;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=MAX_ITER {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < tiny {
            d = tiny;
        }
        c = b + an / c;
        if c.abs() < tiny {
            c = tiny;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    (log_prefactor.exp() * h).clamp(0.0, 1.0)
}

/// Harrell's C for predictions where a higher score means longer survival
///
/// A pair is comparable when the shorter time ends in an event. Tied
/// predictions count one half.
pub fn concordance_index(times: &[f64], scores: &[f64], events: &[bool]) -> Result<f64> {
    if times.len() != scores.len() || times.len() != events.len() {
        return Err(FaceAgeError::shape(format!(
            "{} times, {} scores, {} events",
            times.len(),
            scores.len(),
            events.len()
        )));
    }
    let mut concordant = 0.0;
    let mut comparable = 0usize;
    for i in 0..times.len() {
        if !events[i] {
            continue;
        }
        for j in 0..times.len() {
            let later = times[j] > times[i] || (times[j] == times[i] && !events[j]);
            if i == j || !later {
                continue;
            }
            comparable += 1;
            if scores[j] > scores[i] {
                concordant += 1.0;
            } else if scores[j] == scores[i] {
                concordant += 0.5;
            }
        }
    }
    if comparable == 0 {
        return Err(FaceAgeError::invalid_parameter("comparable pairs", 0));
    }
    Ok(concordant / comparable as f64)
}

/// Concordance of `scores` against curated survival records
pub fn records_concordance(records: &[SurvivalRecord], scores: &[f64]) -> Result<f64> {
    let times: Vec<f64> = records.iter().map(|r| r.survival_time).collect();
    let events: Vec<bool> = records.iter().map(|r| r.event).collect();
    concordance_index(&times, scores, &events)
}
