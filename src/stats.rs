//! Small numeric helpers shared by the interval, tempo and trend fitters.
//!
//! `fit_line` follows the contract of scipy's `linregress`: slope, intercept,
//! Pearson r, two-sided p-value for a zero-slope null and the slope's
//! standard error. Callers guarantee at least two points.

use serde::Serialize;

/// Relative tolerance under which a spread is treated as exactly zero.
/// Means of identical floats can differ from the values by an ulp.
pub const ZERO_SPREAD: f64 = 1e-12;

pub fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

/// Sample standard deviation (ddof = 1). Zero for fewer than two values.
pub fn sample_std(v: &[f64]) -> f64 {
    let n = v.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(v);
    let ss: f64 = v.iter().map(|x| (x - m) * (x - m)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Median of a set of finite values (mean of the middle pair for even counts).
pub fn median(v: &mut [f64]) -> f64 {
    v.sort_by(|a, b| a.total_cmp(b));
    let n = v.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    }
}

/// Ordinary least-squares line through `(x, y)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation, clamped to [-1, 1]; 0 when either series is flat.
    pub r: f64,
    pub p_value: f64,
    pub stderr: f64,
}

/// Fit `y` against its own index (x = 0, 1, 2, …).
pub fn fit_indexed(y: &[f64]) -> LinearFit {
    let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
    fit_line(&x, y)
}

/// OLS fit of `y` on `x`. Both slices must have the same length, at least 2.
pub fn fit_line(x: &[f64], y: &[f64]) -> LinearFit {
    debug_assert_eq!(x.len(), y.len());
    debug_assert!(x.len() >= 2);

    let n = x.len();
    let x_mean = mean(x);
    let y_mean = mean(y);

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for i in 0..n {
        let dx = x[i] - x_mean;
        let dy = y[i] - y_mean;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    // Rounding in the mean leaves a constant series with ulp-sized residuals
    let flat_y = syy.sqrt() <= ZERO_SPREAD * (n as f64).sqrt() * y_mean.abs().max(1.0);

    let slope = if sxx > 0.0 && !flat_y { sxy / sxx } else { 0.0 };
    let intercept = y_mean - slope * x_mean;

    let r = if sxx > 0.0 && !flat_y {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    } else {
        0.0
    };

    if n == 2 {
        // A line through two points is exact: significant unless flat
        let p_value = if y[0] == y[1] { 1.0 } else { 0.0 };
        return LinearFit { slope, intercept, r, p_value, stderr: 0.0 };
    }

    let df = (n - 2) as f64;
    let one_minus_r2 = (1.0 - r * r).max(0.0);
    let p_value = if one_minus_r2 == 0.0 {
        0.0
    } else {
        let t = r * (df / one_minus_r2).sqrt();
        student_t_two_sided(t, df)
    };
    let stderr = if sxx > 0.0 {
        (one_minus_r2 * syy / sxx / df).sqrt()
    } else {
        0.0
    };

    LinearFit { slope, intercept, r, p_value, stderr }
}

/// Two-sided tail probability P(|T| > |t|) for Student's t with `df` degrees of freedom.
pub fn student_t_two_sided(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    let x = df / (df + t * t);
    incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

/// Regularized incomplete beta function I_x(a, b).
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The continued fraction converges fastest below the mean; use symmetry above it
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Modified Lentz evaluation of the incomplete-beta continued fraction.
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-15;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        // Even step
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        // Odd step
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Lanczos approximation (g = 7, n = 9) of ln Γ(x) for x > 0.
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
        // Reflection formula
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut a = COEF[0];
    let t = x + G + 0.5;
    for (i, &c) in COEF.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}
