use log::debug;
use num::{BigInt, BigRational, Integer, One, Signed, ToPrimitive, Zero};
use std::fmt;

use crate::error::SolveError;
use crate::interval::{Bound, BoundKind, Interval, IntervalSet, REALS, REALS_POS};
use crate::lang::Var;
use crate::poly::{Poly, RootLoc};
use crate::scalar::{rint, Base, Scalar};

/// A univariate chain of invertible maps applied to one base variable.
/// Solving pulls a target interval back through each layer in turn,
/// producing the exact preimage as an interval set.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
  Identity(Var),
  Abs(Box<Transform>),
  Pow(Box<Transform>, BigRational),
  Exp(Box<Transform>, Base),
  Log(Box<Transform>, Base),
  Poly(Box<Transform>, Poly),
}

impl From<Var> for Transform {
  fn from(v: Var) -> Transform {
    Transform::Identity(v)
  }
}

impl Transform {
  pub fn var(v: Var) -> Transform {
    Transform::Identity(v)
  }

  pub fn abs(self) -> Transform {
    Transform::Abs(Box::new(self))
  }

  pub fn pow(self, ex: BigRational) -> Result<Transform, SolveError> {
    if ex.is_zero() {
      return Err(SolveError::MalformedTransform("exponent must be nonzero".into()));
    }
    if ex.is_one() {
      return Ok(self);
    }
    Ok(Transform::Pow(Box::new(self), ex))
  }

  pub fn pow_i(self, k: i64) -> Result<Transform, SolveError> {
    self.pow(rint(k))
  }

  /// Principal q-th root, q nonzero.
  pub fn radical(self, q: i64) -> Result<Transform, SolveError> {
    if q == 0 {
      return Err(SolveError::MalformedTransform("radical degree must be nonzero".into()));
    }
    self.pow(BigRational::new(BigInt::one(), BigInt::from(q)))
  }

  pub fn sqrt(self) -> Transform {
    Transform::Pow(Box::new(self), BigRational::new(BigInt::one(), BigInt::from(2)))
  }

  pub fn recip(self) -> Transform {
    Transform::Pow(Box::new(self), -BigRational::one())
  }

  pub fn exp(self) -> Transform {
    Transform::Exp(Box::new(self), Base::E)
  }

  pub fn exp_base(self, base: Base) -> Transform {
    Transform::Exp(Box::new(self), base)
  }

  pub fn log(self) -> Transform {
    Transform::Log(Box::new(self), Base::E)
  }

  pub fn log_base(self, base: Base) -> Transform {
    Transform::Log(Box::new(self), base)
  }

  pub fn poly(self, p: Poly) -> Result<Transform, SolveError> {
    if p.degree() == 0 {
      return Err(SolveError::MalformedTransform(format!(
        "constant polynomial {}",
        p
      )));
    }
    Ok(Transform::Poly(Box::new(self), p))
  }

  /// a*self + b.
  pub fn affine(self, a: BigRational, b: BigRational) -> Result<Transform, SolveError> {
    self.poly(Poly::new(vec![b, a]))
  }

  pub fn symbol(&self) -> Var {
    match self {
      Transform::Identity(v) => *v,
      Transform::Abs(s)
      | Transform::Pow(s, _)
      | Transform::Exp(s, _)
      | Transform::Log(s, _)
      | Transform::Poly(s, _) => s.symbol(),
    }
  }

  pub fn is_identity(&self) -> bool {
    matches!(self, Transform::Identity(_))
  }

  /// Rebuilds self with its base variable replaced by `inner`.
  pub fn substitute(&self, inner: &Transform) -> Transform {
    match self {
      Transform::Identity(_) => inner.clone(),
      Transform::Abs(s) => Transform::Abs(Box::new(s.substitute(inner))),
      Transform::Pow(s, r) => Transform::Pow(Box::new(s.substitute(inner)), r.clone()),
      Transform::Exp(s, b) => Transform::Exp(Box::new(s.substitute(inner)), b.clone()),
      Transform::Log(s, b) => Transform::Log(Box::new(s.substitute(inner)), b.clone()),
      Transform::Poly(s, p) => Transform::Poly(Box::new(s.substitute(inner)), p.clone()),
    }
  }

  /// Forward numeric evaluation at a sampled base value.
  pub fn apply(&self, x: f64) -> f64 {
    match self {
      Transform::Identity(_) => x,
      Transform::Abs(s) => s.apply(x).abs(),
      Transform::Pow(s, r) => {
        let v = s.apply(x);
        match r.to_i32() {
          Some(k) if r.is_integer() => v.powi(k),
          _ => v.powf(r.to_f64().unwrap_or(f64::NAN)),
        }
      }
      Transform::Exp(s, b) => b.approx().powf(s.apply(x)),
      Transform::Log(s, b) => s.apply(x).ln() / b.approx().ln(),
      Transform::Poly(s, p) => {
        let v = s.apply(x);
        let mut acc = 0.0;
        for c in p.coeffs().iter().rev() {
          acc = acc * v + c.to_f64().unwrap_or(f64::NAN);
        }
        acc
      }
    }
  }

  /// Base-variable values on which every layer of the chain is defined.
  pub fn domain(&self) -> Result<IntervalSet, SolveError> {
    match self {
      Transform::Identity(_) => Ok(REALS.clone()),
      Transform::Abs(s) | Transform::Exp(s, _) | Transform::Poly(s, _) => s.domain(),
      Transform::Log(s, _) => s.solve(&Interval::pos()),
      Transform::Pow(s, r) => {
        let p = r.numer();
        if r.denom().is_one() {
          if p.is_negative() {
            let zeros = s.solve(&Interval::point(Scalar::zero()))?;
            Ok(s.domain()?.difference(&zeros))
          } else {
            s.domain()
          }
        } else if p.is_negative() {
          s.solve(&Interval::pos())
        } else {
          s.solve(&Interval::non_neg())
        }
      }
    }
  }

  /// Superset of the chain's image, used to clip solve targets.
  pub fn range(&self) -> IntervalSet {
    match self {
      Transform::Identity(_) | Transform::Log(_, _) | Transform::Poly(_, _) => REALS.clone(),
      Transform::Abs(_) => REALS_POS.clone(),
      Transform::Exp(_, _) => IntervalSet::from(Interval::pos()),
      Transform::Pow(_, r) => {
        let p = r.numer();
        if r.denom().is_one() {
          match (p.is_negative(), p.is_odd()) {
            (false, true) => REALS.clone(),
            (false, false) => REALS_POS.clone(),
            (true, false) => IntervalSet::from(Interval::pos()),
            (true, true) => REALS.difference(&IntervalSet::point(Scalar::zero())),
          }
        } else if p.is_negative() {
          IntervalSet::from(Interval::pos())
        } else {
          REALS_POS.clone()
        }
      }
    }
  }

  pub fn solve_set(&self, target: &IntervalSet) -> Result<IntervalSet, SolveError> {
    let mut out = IntervalSet::empty();
    for iv in target.intervals() {
      out = out.union(&self.solve(iv)?);
    }
    Ok(out)
  }

  /// Exact preimage of `target` under the chain. The target is clipped
  /// against `range()` first; an empty clip has an empty preimage.
  pub fn solve(&self, target: &Interval) -> Result<IntervalSet, SolveError> {
    debug!("invert {} over {}", self, target);
    let clipped = IntervalSet::from(target.clone()).intersect(&self.range());
    let mut out = IntervalSet::empty();
    for iv in clipped.intervals() {
      out = out.union(&self.solve_clipped(iv)?);
    }
    Ok(out)
  }

  /// Single-level inversion; `target` has been clipped to `range()`.
  fn solve_clipped(&self, target: &Interval) -> Result<IntervalSet, SolveError> {
    match self {
      Transform::Identity(_) => Ok(IntervalSet::from(target.clone())),
      Transform::Abs(s) => {
        let pre = IntervalSet::new(vec![reflect(target), target.clone()]);
        s.solve_set(&pre)
      }
      Transform::Pow(s, r) => solve_pow(s, r, target),
      Transform::Exp(s, base) => {
        let lo = match &target.lo {
          Bound::Fin(v) if v.sign() == std::cmp::Ordering::Greater => {
            (Bound::Fin(Scalar::log(base, v)?), target.lo_kind)
          }
          _ => (Bound::NegInf, BoundKind::Exclusive),
        };
        let hi = match &target.hi {
          Bound::Fin(v) => {
            if v.sign() != std::cmp::Ordering::Greater {
              return Ok(IntervalSet::empty());
            }
            (Bound::Fin(Scalar::log(base, v)?), target.hi_kind)
          }
          Bound::PosInf => (Bound::PosInf, BoundKind::Exclusive),
          Bound::NegInf => return Ok(IntervalSet::empty()),
        };
        s.solve_set(&Interval::new(lo.0, lo.1, hi.0, hi.1).into())
      }
      Transform::Log(s, base) => {
        let lo = match &target.lo {
          Bound::Fin(v) => (Bound::Fin(Scalar::exp(base, v)), target.lo_kind),
          Bound::NegInf => (Bound::Fin(Scalar::zero()), BoundKind::Exclusive),
          Bound::PosInf => return Ok(IntervalSet::empty()),
        };
        let hi = match &target.hi {
          Bound::Fin(v) => (Bound::Fin(Scalar::exp(base, v)), target.hi_kind),
          Bound::PosInf => (Bound::PosInf, BoundKind::Exclusive),
          Bound::NegInf => return Ok(IntervalSet::empty()),
        };
        s.solve_set(&Interval::new(lo.0, lo.1, hi.0, hi.1).into())
      }
      Transform::Poly(s, p) => {
        let upper = match (&target.hi, target.hi_kind) {
          (Bound::PosInf, _) => REALS.clone(),
          (Bound::NegInf, _) => return Ok(IntervalSet::empty()),
          (Bound::Fin(b), kind) => poly_le(p, b, kind == BoundKind::Exclusive)?,
        };
        let violation = match (&target.lo, target.lo_kind) {
          (Bound::NegInf, _) => IntervalSet::empty(),
          (Bound::PosInf, _) => return Ok(IntervalSet::empty()),
          (Bound::Fin(a), BoundKind::Inclusive) => poly_le(p, a, true)?,
          (Bound::Fin(a), BoundKind::Exclusive) => poly_le(p, a, false)?,
        };
        s.solve_set(&upper.difference(&violation))
      }
    }
  }
}

fn reflect(iv: &Interval) -> Interval {
  Interval {
    lo: iv.hi.neg(),
    lo_kind: iv.hi_kind,
    hi: iv.lo.neg(),
    hi_kind: iv.lo_kind,
  }
}

fn solve_pow(
  sub: &Transform,
  r: &BigRational,
  target: &Interval,
) -> Result<IntervalSet, SolveError> {
  let p = r.numer();
  if r.denom().is_one() {
    if p.is_negative() {
      // s^p = (s^-p)^-1: pull the target through a reciprocal first
      let flipped = recip_interval(target)?;
      let back = -p;
      if back.is_one() {
        return sub.solve_set(&flipped);
      }
      return Transform::Pow(Box::new(sub.clone()), BigRational::from_integer(back))
        .solve_set(&flipped);
    }
    let k = p
      .to_u32()
      .ok_or_else(|| SolveError::NotInvertible(format!("exponent too large: {}", r)))?;
    if p.is_odd() {
      let lo = bound_root(&target.lo, k)?;
      let hi = bound_root(&target.hi, k)?;
      return sub.solve_set(&Interval::new(lo, target.lo_kind, hi, target.hi_kind).into());
    }
    // even exponent: principal branch only; |x| is the two-branch form
    let rooted = Interval::new(
      bound_root(&target.lo, k)?,
      target.lo_kind,
      bound_root(&target.hi, k)?,
      target.hi_kind,
    );
    return sub.solve_set(&rooted.into());
  }

  // fractional exponent p/q: principal branch on the non-negative reals
  let e = BigRational::new(r.denom().clone(), p.clone());
  if p.is_negative() {
    let (lo, lo_kind) = match &target.hi {
      Bound::Fin(v) => (Bound::Fin(v.pow(&e)?), target.hi_kind),
      _ => (Bound::Fin(Scalar::zero()), BoundKind::Exclusive),
    };
    let (hi, hi_kind) = match &target.lo {
      Bound::Fin(v) if v.sign() == std::cmp::Ordering::Greater => {
        (Bound::Fin(v.pow(&e)?), target.lo_kind)
      }
      _ => (Bound::PosInf, BoundKind::Exclusive),
    };
    return sub.solve_set(&Interval::new(lo, lo_kind, hi, hi_kind).into());
  }
  let (lo, lo_kind) = match &target.lo {
    Bound::Fin(v) => (Bound::Fin(v.pow(&e)?), target.lo_kind),
    _ => (Bound::NegInf, BoundKind::Exclusive),
  };
  let (hi, hi_kind) = match &target.hi {
    Bound::Fin(v) => (Bound::Fin(v.pow(&e)?), target.hi_kind),
    _ => (Bound::PosInf, BoundKind::Exclusive),
  };
  sub.solve_set(&Interval::new(lo, lo_kind, hi, hi_kind).into())
}

fn bound_root(b: &Bound, k: u32) -> Result<Bound, SolveError> {
  Ok(match b {
    Bound::NegInf => Bound::NegInf,
    Bound::PosInf => Bound::PosInf,
    Bound::Fin(s) => Bound::Fin(s.pow(&BigRational::new(BigInt::one(), BigInt::from(k)))?),
  })
}

/// Image of the target under y -> 1/y, splitting at zero.
fn recip_interval(iv: &Interval) -> Result<IntervalSet, SolveError> {
  let mut out = vec![];
  if let Some(pos) = iv.intersect(&Interval::pos()) {
    let (lo, lo_kind) = match &pos.hi {
      Bound::Fin(v) => (Bound::Fin(v.recip()?), pos.hi_kind),
      _ => (Bound::Fin(Scalar::zero()), BoundKind::Exclusive),
    };
    let (hi, hi_kind) = match &pos.lo {
      Bound::Fin(v) if v.sign() == std::cmp::Ordering::Greater => {
        (Bound::Fin(v.recip()?), pos.lo_kind)
      }
      _ => (Bound::PosInf, BoundKind::Exclusive),
    };
    if let Some(mapped) = Interval::new(lo, lo_kind, hi, hi_kind) {
      out.push(mapped);
    }
  }
  if let Some(neg) = iv.intersect(&Interval::ray_lt(Scalar::zero())) {
    let (lo, lo_kind) = match &neg.hi {
      Bound::Fin(v) if v.sign() == std::cmp::Ordering::Less => {
        (Bound::Fin(v.recip()?), neg.hi_kind)
      }
      _ => (Bound::NegInf, BoundKind::Exclusive),
    };
    let (hi, hi_kind) = match &neg.lo {
      Bound::Fin(v) => (Bound::Fin(v.recip()?), neg.lo_kind),
      _ => (Bound::Fin(Scalar::zero()), BoundKind::Exclusive),
    };
    if let Some(mapped) = Interval::new(lo, lo_kind, hi, hi_kind) {
      out.push(mapped);
    }
  }
  Ok(IntervalSet::new(out))
}

/// {x : p(x) < b} when strict, {x : p(x) <= b} otherwise. The bound
/// must be rational for the root isolation to apply.
fn poly_le(p: &Poly, b: &Scalar, strict: bool) -> Result<IntervalSet, SolveError> {
  let b = b.as_rational().ok_or_else(|| {
    SolveError::NotInvertible(format!("non-rational polynomial bound {}", b))
  })?;
  let shifted = p.sub(&Poly::constant(b.clone()));
  Ok(negative_regions(&shifted, strict))
}

/// Where a polynomial is negative: open intervals between consecutive
/// real roots carrying a negative sample, plus the roots themselves
/// when equality is allowed.
fn negative_regions(q: &Poly, strict: bool) -> IntervalSet {
  if q.is_zero() {
    return if strict { IntervalSet::empty() } else { REALS.clone() };
  }
  if q.degree() == 0 {
    return if q.coeff(0).is_negative() {
      REALS.clone()
    } else {
      IntervalSet::empty()
    };
  }
  let roots = q.real_roots();
  if roots.is_empty() {
    return if q.eval(&BigRational::zero()).is_negative() {
      REALS.clone()
    } else {
      IntervalSet::empty()
    };
  }
  let samples = sample_points(&roots);
  let mut pieces = vec![];
  for (i, s) in samples.iter().enumerate() {
    if q.eval(s).is_negative() {
      let lo = if i == 0 {
        Bound::NegInf
      } else {
        Bound::Fin(Scalar::from_root_loc(roots[i - 1].clone()))
      };
      let hi = if i == roots.len() {
        Bound::PosInf
      } else {
        Bound::Fin(Scalar::from_root_loc(roots[i].clone()))
      };
      if let Some(iv) = Interval::new(lo, BoundKind::Exclusive, hi, BoundKind::Exclusive) {
        pieces.push(iv);
      }
    }
  }
  if !strict {
    for r in &roots {
      pieces.push(Interval::point(Scalar::from_root_loc(r.clone())));
    }
  }
  IntervalSet::new(pieces)
}

fn window(r: &RootLoc) -> (BigRational, BigRational) {
  match r {
    RootLoc::Rational(x) => (x.clone(), x.clone()),
    RootLoc::Cell { lo, hi, .. } => (lo.clone(), hi.clone()),
  }
}

fn narrow(r: &RootLoc) -> RootLoc {
  match r {
    RootLoc::Rational(_) => r.clone(),
    RootLoc::Cell { poly, lo, hi } => {
      let (l, h) = poly.bisect_root(lo, hi);
      if l == h {
        RootLoc::Rational(l)
      } else {
        RootLoc::Cell {
          poly: poly.clone(),
          lo: l,
          hi: h,
        }
      }
    }
  }
}

/// One rational strictly between each pair of consecutive roots, plus
/// one below the first and one above the last. Touching isolation
/// windows are narrowed first so every midpoint avoids the roots.
fn sample_points(roots: &[RootLoc]) -> Vec<BigRational> {
  let mut locs: Vec<RootLoc> = roots.to_vec();
  loop {
    let mut touched = None;
    for i in 0..locs.len() - 1 {
      if window(&locs[i]).1 >= window(&locs[i + 1]).0 {
        touched = Some(if matches!(locs[i + 1], RootLoc::Cell { .. }) {
          i + 1
        } else {
          i
        });
        break;
      }
    }
    match touched {
      None => break,
      Some(i) => locs[i] = narrow(&locs[i]),
    }
  }
  let two = rint(2);
  let mut out = vec![window(&locs[0]).0 - BigRational::one()];
  for i in 0..locs.len() - 1 {
    out.push((window(&locs[i]).1 + window(&locs[i + 1]).0) / &two);
  }
  out.push(window(&locs[locs.len() - 1]).1 + BigRational::one());
  out
}

impl fmt::Display for Transform {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    fn sub_str(t: &Transform) -> String {
      match t {
        Transform::Identity(v) => format!("{}", v),
        other => format!("({})", other),
      }
    }
    match self {
      Transform::Identity(v) => write!(f, "{}", v),
      Transform::Abs(s) => write!(f, "|{}|", s),
      Transform::Pow(s, r) => {
        if r.is_integer() {
          write!(f, "{}^{}", sub_str(s), r)
        } else {
          write!(f, "{}^({})", sub_str(s), r)
        }
      }
      Transform::Exp(s, Base::E) => write!(f, "e^{}", sub_str(s)),
      Transform::Exp(s, b) => write!(f, "{}^{}", b, sub_str(s)),
      Transform::Log(s, Base::E) => write!(f, "ln({})", s),
      Transform::Log(s, b) => write!(f, "log[{}]({})", b, s),
      Transform::Poly(s, p) => p.fmt_with(f, &sub_str(s)),
    }
  }
}
