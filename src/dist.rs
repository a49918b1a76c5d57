use num::{BigRational, ToPrimitive};
use rand::Rng;
use std::fmt;

use crate::interval::{Bound, BoundKind, Interval, IntervalSet, REALS, REALS_POS};
use crate::scalar::{rint, Scalar};
use crate::util::{erfc, gamma_q};

/// A primitive sampling distribution. Parameters are plain data; the
/// measure-theoretic behavior lives in `support` and `logprob`.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseDist {
  Uniform { lo: BigRational, hi: BigRational },
  Normal { mean: f64, std: f64 },
  Exponential { rate: f64 },
  Poisson { mu: f64 },
  Bernoulli { p: f64 },
  PointMass { at: Scalar },
  Atomic { atoms: Vec<(Scalar, f64)> },
}

impl BaseDist {
  pub fn uniform(lo: i64, hi: i64) -> BaseDist {
    BaseDist::Uniform {
      lo: rint(lo),
      hi: rint(hi),
    }
  }

  pub fn uniform_rat(lo: BigRational, hi: BigRational) -> BaseDist {
    BaseDist::Uniform { lo, hi }
  }

  pub fn normal(mean: f64, std: f64) -> BaseDist {
    BaseDist::Normal { mean, std }
  }

  pub fn exponential(rate: f64) -> BaseDist {
    BaseDist::Exponential { rate }
  }

  pub fn poisson(mu: f64) -> BaseDist {
    BaseDist::Poisson { mu }
  }

  pub fn bernoulli(p: f64) -> BaseDist {
    BaseDist::Bernoulli { p }
  }

  pub fn point(at: impl Into<Scalar>) -> BaseDist {
    BaseDist::PointMass { at: at.into() }
  }

  /// Weighted atoms, normalized to total mass one.
  pub fn atomic(atoms: Vec<(Scalar, f64)>) -> BaseDist {
    let total: f64 = atoms.iter().map(|(_, w)| w).sum();
    BaseDist::Atomic {
      atoms: atoms.into_iter().map(|(s, w)| (s, w / total)).collect(),
    }
  }

  pub fn is_discrete(&self) -> bool {
    matches!(
      self,
      BaseDist::Poisson { .. }
        | BaseDist::Bernoulli { .. }
        | BaseDist::PointMass { .. }
        | BaseDist::Atomic { .. }
    )
  }

  pub fn support(&self) -> IntervalSet {
    match self {
      BaseDist::Uniform { lo, hi } => {
        Interval::closed(Scalar::from(lo.clone()), Scalar::from(hi.clone())).into()
      }
      BaseDist::Normal { .. } => REALS.clone(),
      BaseDist::Exponential { .. } | BaseDist::Poisson { .. } => REALS_POS.clone(),
      BaseDist::Bernoulli { .. } => IntervalSet::new(vec![
        Interval::point(Scalar::zero()),
        Interval::point(Scalar::one()),
      ]),
      BaseDist::PointMass { at } => IntervalSet::point(at.clone()),
      BaseDist::Atomic { atoms } => IntervalSet::new(
        atoms
          .iter()
          .map(|(s, _)| Interval::point(s.clone()))
          .collect(),
      ),
    }
  }

  /// Log-mass assigned to the interval set.
  pub fn logprob(&self, set: &IntervalSet) -> f64 {
    match self {
      BaseDist::Uniform { lo, hi } => {
        let lo_f = rational_f(lo);
        let hi_f = rational_f(hi);
        if hi_f <= lo_f {
          return if set.contains(&Scalar::from(lo.clone())) {
            0.0
          } else {
            f64::NEG_INFINITY
          };
        }
        continuous_mass(set, |x| ((x - lo_f) / (hi_f - lo_f)).clamp(0.0, 1.0))
      }
      BaseDist::Normal { mean, std } => continuous_mass(set, |x| {
        0.5 * erfc(-(x - mean) / (std * std::f64::consts::SQRT_2))
      }),
      BaseDist::Exponential { rate } => continuous_mass(set, |x| {
        if x <= 0.0 {
          0.0
        } else {
          -(-rate * x).exp_m1()
        }
      }),
      BaseDist::Poisson { mu } => {
        let mass: f64 = set
          .intervals()
          .iter()
          .map(|iv| poisson_piece(*mu, iv))
          .sum();
        mass.max(0.0).ln()
      }
      BaseDist::Bernoulli { p } => {
        let mut mass = 0.0;
        if set.contains(&Scalar::zero()) {
          mass += 1.0 - p;
        }
        if set.contains(&Scalar::one()) {
          mass += p;
        }
        mass.ln()
      }
      BaseDist::PointMass { at } => {
        if set.contains(at) {
          0.0
        } else {
          f64::NEG_INFINITY
        }
      }
      BaseDist::Atomic { atoms } => {
        let mass: f64 = atoms
          .iter()
          .filter(|(s, _)| set.contains(s))
          .map(|(_, w)| w)
          .sum();
        mass.ln()
      }
    }
  }

  pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
    match self {
      BaseDist::Uniform { lo, hi } => {
        let lo = rational_f(lo);
        let hi = rational_f(hi);
        lo + (hi - lo) * rng.gen::<f64>()
      }
      BaseDist::Normal { mean, std } => mean + std * standard_normal(rng),
      BaseDist::Exponential { rate } => -(1.0 - rng.gen::<f64>()).ln() / rate,
      BaseDist::Poisson { mu } => {
        if *mu >= 30.0 {
          // the multiplicative walk degenerates for large rates
          return (mu + mu.sqrt() * standard_normal(rng)).round().max(0.0);
        }
        let l = (-mu).exp();
        let mut k = 0u64;
        let mut p = 1.0;
        loop {
          k += 1;
          p *= rng.gen::<f64>();
          if p <= l {
            break;
          }
        }
        (k - 1) as f64
      }
      BaseDist::Bernoulli { p } => {
        if rng.gen::<f64>() < *p {
          1.0
        } else {
          0.0
        }
      }
      BaseDist::PointMass { at } => at.approx(),
      BaseDist::Atomic { atoms } => {
        let mut u = rng.gen::<f64>();
        for (s, w) in atoms {
          if u < *w {
            return s.approx();
          }
          u -= w;
        }
        atoms.last().map(|(s, _)| s.approx()).unwrap_or(f64::NAN)
      }
    }
  }
}

fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
  let u1 = 1.0 - rng.gen::<f64>();
  let u2 = rng.gen::<f64>();
  (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn rational_f(r: &BigRational) -> f64 {
  r.to_f64().unwrap_or(f64::NAN)
}

fn continuous_mass(set: &IntervalSet, cdf: impl Fn(f64) -> f64) -> f64 {
  let mut mass = 0.0;
  for iv in set.intervals() {
    let ca = match &iv.lo {
      Bound::NegInf => 0.0,
      Bound::PosInf => 1.0,
      Bound::Fin(s) => cdf(s.approx()),
    };
    let cb = match &iv.hi {
      Bound::PosInf => 1.0,
      Bound::NegInf => 0.0,
      Bound::Fin(s) => cdf(s.approx()),
    };
    mass += (cb - ca).max(0.0);
  }
  mass.min(1.0).ln()
}

fn poisson_cdf(mu: f64, k: i64) -> f64 {
  if k < 0 {
    0.0
  } else {
    gamma_q(k as f64 + 1.0, mu)
  }
}

/// Mass a Poisson distribution puts on one interval, honoring open
/// integer endpoints exactly.
fn poisson_piece(mu: f64, iv: &Interval) -> f64 {
  let k_lo = match &iv.lo {
    Bound::NegInf => 0i64,
    Bound::PosInf => return 0.0,
    Bound::Fin(s) => {
      let k = match s.as_rational() {
        Some(r) => {
          let c = r.ceil().to_integer().to_i64().unwrap_or(i64::MAX / 2);
          if iv.lo_kind == BoundKind::Exclusive && r.is_integer() {
            c + 1
          } else {
            c
          }
        }
        None => s.approx().ceil() as i64,
      };
      k.max(0)
    }
  };
  let k_hi = match &iv.hi {
    Bound::PosInf => None,
    Bound::NegInf => return 0.0,
    Bound::Fin(s) => {
      let k = match s.as_rational() {
        Some(r) => {
          let fl = r.floor().to_integer().to_i64().unwrap_or(i64::MAX / 2);
          if iv.hi_kind == BoundKind::Exclusive && r.is_integer() {
            fl - 1
          } else {
            fl
          }
        }
        None => s.approx().floor() as i64,
      };
      if k < 0 {
        return 0.0;
      }
      Some(k)
    }
  };
  match k_hi {
    None => 1.0 - poisson_cdf(mu, k_lo - 1),
    Some(h) if h < k_lo => 0.0,
    Some(h) => (poisson_cdf(mu, h) - poisson_cdf(mu, k_lo - 1)).max(0.0),
  }
}

impl fmt::Display for BaseDist {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      BaseDist::Uniform { lo, hi } => write!(f, "uniform({}, {})", lo, hi),
      BaseDist::Normal { mean, std } => write!(f, "normal({}, {})", mean, std),
      BaseDist::Exponential { rate } => write!(f, "exponential({})", rate),
      BaseDist::Poisson { mu } => write!(f, "poisson({})", mu),
      BaseDist::Bernoulli { p } => write!(f, "bernoulli({})", p),
      BaseDist::PointMass { at } => write!(f, "δ({})", at),
      BaseDist::Atomic { atoms } => {
        write!(f, "atomic{{")?;
        for (i, (s, w)) in atoms.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{}: {}", s, w)?;
        }
        write!(f, "}}")
      }
    }
  }
}
