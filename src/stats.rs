// src/stats.rs

//! Descriptive statistics and the two hypothesis tests run per tier:
//! Shapiro-Wilk for normality (Royston's 1995 approximation) and
//! Kruskal-Wallis H for comparing tiers by rank.

use crate::model::{Tier, TierGroups};
use serde::Serialize;
use std::f64::consts::{PI, SQRT_2};
use std::fmt;
use tracing::debug;

/// Fixed significance level
pub const ALPHA: f64 = 0.05;

/// Smallest sample the normality test accepts
pub const MIN_NORMALITY_SAMPLE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptive {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; `None` below two values
    pub std_dev: Option<f64>,
}

impl Descriptive {
    /// `None` for an empty sample
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = sorted.iter().sum::<f64>() / count as f64;
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        let std_dev = (count >= 2).then(|| {
            let ss: f64 = sorted.iter().map(|x| (x - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        });

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
            std_dev,
        })
    }
}

/// Why a test was not run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Skipped {
    InsufficientSample { size: usize, required: usize },
    InsufficientGroups { groups: usize },
    /// Every observation is identical, so ranks carry no information
    Degenerate,
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skipped::InsufficientSample { size, required } => write!(
                f,
                "sample size too small: {} (minimum {} required)",
                size, required
            ),
            Skipped::InsufficientGroups { groups } => write!(
                f,
                "need at least 2 non-empty groups, got {}",
                groups
            ),
            Skipped::Degenerate => f.write_str("all numbers are identical"),
        }
    }
}

/// A test result or the explicit reason it was not computed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome<T> {
    Computed(T),
    NotComputed(Skipped),
}

impl<T> TestOutcome<T> {
    pub fn computed(&self) -> Option<&T> {
        match self {
            TestOutcome::Computed(value) => Some(value),
            TestOutcome::NotComputed(_) => None,
        }
    }
}

impl<T> From<Result<T, Skipped>> for TestOutcome<T> {
    fn from(result: Result<T, Skipped>) -> Self {
        match result {
            Ok(value) => TestOutcome::Computed(value),
            Err(reason) => TestOutcome::NotComputed(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalityTest {
    pub statistic: f64,
    pub p_value: f64,
    pub is_normal: bool,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupComparison {
    pub statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    pub degrees_of_freedom: usize,
    pub groups_compared: Vec<Tier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierSummary {
    pub tier: Tier,
    pub descriptive: Option<Descriptive>,
    pub normality: TestOutcome<NormalityTest>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticalResult {
    pub tiers: Vec<TierSummary>,
    pub comparison: TestOutcome<GroupComparison>,
}

impl StatisticalResult {
    pub fn tier(&self, tier: Tier) -> Option<&TierSummary> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    pub fn is_significant(&self) -> bool {
        self.comparison.computed().map_or(false, |c| c.significant)
    }
}

pub fn summarize_groups(groups: &TierGroups) -> StatisticalResult {
    summarize(&groups.as_series())
}

/// Descriptive stats and normality per tier, then a rank comparison across
/// the non-empty tiers.
pub fn summarize(series: &[(Tier, Vec<f64>)]) -> StatisticalResult {
    let tiers: Vec<TierSummary> = series
        .iter()
        .map(|(tier, values)| {
            let normality: TestOutcome<NormalityTest> = shapiro_wilk(values).into();
            if let TestOutcome::NotComputed(reason) = &normality {
                debug!("Normality test skipped for {}: {}", tier, reason);
            }
            TierSummary {
                tier: *tier,
                descriptive: Descriptive::of(values),
                normality,
            }
        })
        .collect();

    let present: Vec<(Tier, &[f64])> = series
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(tier, values)| (*tier, values.as_slice()))
        .collect();
    let samples: Vec<&[f64]> = present.iter().map(|(_, values)| *values).collect();

    let comparison: TestOutcome<GroupComparison> = kruskal_wallis(&samples)
        .map(|kw| GroupComparison {
            statistic: kw.statistic,
            p_value: kw.p_value,
            significant: kw.p_value < ALPHA,
            degrees_of_freedom: kw.degrees_of_freedom,
            groups_compared: present.iter().map(|(tier, _)| *tier).collect(),
        })
        .into();

    StatisticalResult { tiers, comparison }
}

/// Shapiro-Wilk W and its p-value.
pub fn shapiro_wilk(values: &[f64]) -> Result<NormalityTest, Skipped> {
    let n = values.len();
    if n < MIN_NORMALITY_SAMPLE {
        return Err(Skipped::InsufficientSample {
            size: n,
            required: MIN_NORMALITY_SAMPLE,
        });
    }

    let mut x = values.to_vec();
    x.sort_by(f64::total_cmp);

    let (statistic, p_value) = if x[n - 1] - x[0] == 0.0 {
        // Zero range: W is 1 by convention
        (1.0, 1.0)
    } else {
        let a = shapiro_coefficients(n);
        let mean = x.iter().sum::<f64>() / n as f64;
        let ssq: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
        let numerator: f64 = a
            .iter()
            .enumerate()
            .map(|(i, ai)| ai * (x[n - 1 - i] - x[i]))
            .sum();
        let w = (numerator * numerator / ssq).min(1.0);
        (w, shapiro_p_value(w, n))
    };

    Ok(NormalityTest {
        statistic,
        p_value,
        is_normal: p_value > ALPHA,
        n,
    })
}

/// The first n/2 antisymmetric weights, largest first
fn shapiro_coefficients(n: usize) -> Vec<f64> {
    const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
    const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];

    let half = n / 2;
    if n == 3 {
        return vec![0.5f64.sqrt()];
    }

    let an = n as f64;
    let m: Vec<f64> = (1..=half)
        .map(|i| normal_quantile((i as f64 - 0.375) / (an + 0.25)))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / an.sqrt();

    let mut a = vec![0.0; half];
    let a1 = poly(&C1, rsn) - m[0] / ssumm2;
    let (first_free, fac) = if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        let fac = ((summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1])
            / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
            .sqrt();
        a[1] = a2;
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
        (1, fac)
    };
    a[0] = a1;
    for i in first_free..half {
        a[i] = -m[i] / fac;
    }
    a
}

fn shapiro_p_value(w: f64, n: usize) -> f64 {
    const G: [f64; 2] = [-2.273, 0.459];
    const C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
    const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
    const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
    const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];

    if w >= 1.0 {
        return 1.0;
    }
    let an = n as f64;
    if n == 3 {
        let p = 6.0 / PI * ((w.sqrt()).asin() - PI / 3.0);
        return p.clamp(0.0, 1.0);
    }

    let mut y = (1.0 - w).ln();
    let (m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if y >= gamma {
            return 1e-99;
        }
        y = -(gamma - y).ln();
        (poly(&C3, an), poly(&C4, an).exp())
    } else {
        let ln_n = an.ln();
        (poly(&C5, ln_n), poly(&C6, ln_n).exp())
    };
    normal_sf((y - m) / s)
}

/// `c[0] + c[1] x + c[2] x^2 + ...`
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, coef| acc * x + coef)
}

#[derive(Debug, Clone, PartialEq)]
pub struct KruskalWallis {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: usize,
}

/// Kruskal-Wallis H over the non-empty `groups`, tie corrected, with a
/// chi-squared p-value on `groups - 1` degrees of freedom.
pub fn kruskal_wallis(groups: &[&[f64]]) -> Result<KruskalWallis, Skipped> {
    let groups: Vec<&[f64]> = groups.iter().copied().filter(|g| !g.is_empty()).collect();
    if groups.len() < 2 {
        return Err(Skipped::InsufficientGroups {
            groups: groups.len(),
        });
    }

    // (value, group index), ranked together
    let mut pooled: Vec<(f64, usize)> = groups
        .iter()
        .enumerate()
        .flat_map(|(g, values)| values.iter().map(move |&v| (v, g)))
        .collect();
    pooled.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total = pooled.len() as f64;
    let mut rank_sums = vec![0.0; groups.len()];
    let mut tie_term = 0.0;

    let mut start = 0;
    while start < pooled.len() {
        let mut end = start + 1;
        while end < pooled.len() && pooled[end].0 == pooled[start].0 {
            end += 1;
        }
        // Ranks start..end (1-based start+1..=end) share their average
        let tied = (end - start) as f64;
        let rank = (start + 1 + end) as f64 / 2.0;
        for &(_, g) in &pooled[start..end] {
            rank_sums[g] += rank;
        }
        tie_term += tied * tied * tied - tied;
        start = end;
    }

    let correction = 1.0 - tie_term / (total * total * total - total);
    if correction <= 0.0 {
        return Err(Skipped::Degenerate);
    }

    let h: f64 = rank_sums
        .iter()
        .zip(&groups)
        .map(|(r, g)| r * r / g.len() as f64)
        .sum::<f64>()
        * 12.0
        / (total * (total + 1.0))
        - 3.0 * (total + 1.0);
    let h = h / correction;
    let df = groups.len() - 1;

    Ok(KruskalWallis {
        statistic: h,
        p_value: chi_squared_sf(h, df as f64),
        degrees_of_freedom: df,
    })
}

// ---- special functions ----

const EPS: f64 = 1e-15;
const TINY: f64 = 1e-300;
const MAX_ITER: usize = 1000;

fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
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
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + G + 0.5;
    let series = COEF[1..]
        .iter()
        .enumerate()
        .fold(COEF[0], |acc, (i, c)| acc + c / (x + i as f64 + 1.0));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// Regularized upper incomplete gamma Q(a, x)
fn gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        1.0
    } else if x.is_infinite() {
        0.0
    } else if x < a + 1.0 {
        1.0 - gamma_p_series(a, x)
    } else {
        gamma_q_fraction(a, x)
    }
}

fn gamma_p_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut del = 1.0 / a;
    let mut sum = del;
    for _ in 0..MAX_ITER {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * EPS {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

/// Lentz's continued fraction for Q(a, x), valid for x >= a + 1
fn gamma_q_fraction(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..MAX_ITER {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

/// Upper tail of the chi-squared distribution
pub fn chi_squared_sf(x: f64, df: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    gamma_q(df / 2.0, x / 2.0)
}

fn erfc(x: f64) -> f64 {
    if x >= 0.0 {
        gamma_q(0.5, x * x)
    } else {
        2.0 - gamma_q(0.5, x * x)
    }
}

/// Standard normal upper tail, P(Z > z)
pub fn normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / SQRT_2)
}

/// Inverse standard normal CDF: Acklam's rational approximation plus one
/// Halley step against `normal_sf`.
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e1,
        2.209460984245205e2,
        -2.759285104469687e2,
        1.383577518672690e2,
        -3.066479806614716e1,
        2.506628277459239,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e1,
        1.615858368580409e2,
        -1.556989798598866e2,
        6.680131188771972e1,
        -1.328068155288572e1,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-3,
        -3.223964580411365e-1,
        -2.400758277161838,
        -2.549732539343734,
        4.374664141464968,
        2.938163982698783,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-3,
        3.224671290700398e-1,
        2.445134137142996,
        3.754408661907416,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    let x = if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    };

    let e = (1.0 - normal_sf(x)) - p;
    let u = e * (2.0 * PI).sqrt() * (x * x / 2.0).exp();
    x - u / (1.0 + x * u / 2.0)
}
