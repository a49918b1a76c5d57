//! Log-space arithmetic and the special functions the distribution
//! measures are built on.

/// log(sum(exp(xs))), stable against large magnitudes.
pub fn logsumexp(xs: &[f64]) -> f64 {
  let m = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  if m == f64::NEG_INFINITY || m == f64::INFINITY {
    return m;
  }
  m + xs.iter().map(|x| (x - m).exp()).sum::<f64>().ln()
}

/// Mirrors numpy's default tolerances.
pub fn allclose(a: f64, b: f64) -> bool {
  (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

/// Lanczos approximation for x > 0.
pub fn ln_gamma(x: f64) -> f64 {
  const COF: [f64; 6] = [
    76.18009172947146,
    -86.50532032941677,
    24.01409824083091,
    -1.231739572450155,
    0.1208650973866179e-2,
    -0.5395239384953e-5,
  ];
  let mut y = x;
  let tmp = x + 5.5;
  let tmp = (x + 0.5) * tmp.ln() - tmp;
  let mut ser = 1.000000000190015;
  for c in COF {
    y += 1.0;
    ser += c / y;
  }
  tmp + (2.5066282746310005 * ser / x).ln()
}

fn gamma_series(a: f64, x: f64) -> f64 {
  let mut ap = a;
  let mut del = 1.0 / a;
  let mut sum = del;
  for _ in 0..300 {
    ap += 1.0;
    del *= x / ap;
    sum += del;
    if del.abs() < sum.abs() * 1e-15 {
      break;
    }
  }
  sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

fn gamma_cf(a: f64, x: f64) -> f64 {
  const TINY: f64 = 1e-300;
  let mut b = x + 1.0 - a;
  let mut c = 1.0 / TINY;
  let mut d = 1.0 / b;
  let mut h = d;
  for i in 1..300 {
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
    if (del - 1.0).abs() < 1e-15 {
      break;
    }
  }
  (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

/// Regularized upper incomplete gamma Q(a, x).
pub fn gamma_q(a: f64, x: f64) -> f64 {
  if x <= 0.0 {
    return 1.0;
  }
  if x < a + 1.0 {
    1.0 - gamma_series(a, x)
  } else {
    gamma_cf(a, x)
  }
}

/// Complementary error function, via the incomplete gamma identity
/// erfc(x) = Q(1/2, x^2) on the non-negative half line.
pub fn erfc(x: f64) -> f64 {
  if x < 0.0 {
    2.0 - erfc(-x)
  } else {
    gamma_q(0.5, x * x)
  }
}
