use num::traits::ToPrimitive;
use num::{BigInt, BigRational, Integer, One, Signed, Zero};
use std::cmp::Ordering;
use std::fmt;

use crate::error::SolveError;
use crate::poly::{rational_nth_root, Poly, RootLoc};

// Bisection / series-refinement caps. Comparisons of constructible
// scalars separate long before these; hitting one is a kernel bug.
const MAX_REFINE: usize = 200;
const CMP_ROUNDS: usize = 12;

pub(crate) fn rint(n: i64) -> BigRational {
  BigRational::from_integer(BigInt::from(n))
}

/// Base of an exponential or logarithm: Euler's number or a positive
/// rational other than one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Base {
  E,
  Rat(BigRational),
}

impl Base {
  pub fn rational(b: BigRational) -> Result<Base, SolveError> {
    if !b.is_positive() || b.is_one() {
      return Err(SolveError::MalformedTransform(format!(
        "base must be positive and distinct from one: {}",
        b
      )));
    }
    Ok(Base::Rat(b))
  }

  pub fn int(b: i64) -> Result<Base, SolveError> {
    Base::rational(rint(b))
  }

  pub fn gt_one(&self) -> bool {
    match self {
      Base::E => true,
      Base::Rat(b) => *b > BigRational::one(),
    }
  }

  pub fn approx(&self) -> f64 {
    match self {
      Base::E => std::f64::consts::E,
      Base::Rat(b) => b.to_f64().unwrap_or(f64::NAN),
    }
  }

  fn ln_enclosure(&self, terms: usize) -> (BigRational, BigRational) {
    match self {
      Base::E => (BigRational::one(), BigRational::one()),
      Base::Rat(b) => ln_enclosure(b, terms),
    }
  }
}

impl fmt::Display for Base {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Base::E => write!(f, "e"),
      Base::Rat(b) => write!(f, "{}", b),
    }
  }
}

/// A real algebraic number: the unique root of a monic square-free
/// polynomial inside the open interval (lo, hi).
#[derive(Debug, Clone, PartialEq)]
pub struct RealRoot {
  poly: Poly,
  lo: BigRational,
  hi: BigRational,
}

/// An exact real scalar, closed under the operations the transform
/// solver needs: rationals, algebraic roots, and symbolic exponential
/// and logarithm forms. Totally ordered; comparisons refine rational
/// enclosures until the operands separate.
#[derive(Debug, Clone)]
pub enum Scalar {
  Rat(BigRational),
  Root(RealRoot),
  Exp { base: Base, arg: Box<Scalar> },
  Log { base: Base, arg: Box<Scalar> },
  Neg(Box<Scalar>),
}

impl From<i64> for Scalar {
  fn from(n: i64) -> Scalar {
    Scalar::Rat(rint(n))
  }
}

impl From<BigRational> for Scalar {
  fn from(r: BigRational) -> Scalar {
    Scalar::Rat(r)
  }
}

impl Scalar {
  pub fn zero() -> Scalar {
    Scalar::Rat(BigRational::zero())
  }

  pub fn one() -> Scalar {
    Scalar::Rat(BigRational::one())
  }

  pub fn rat(n: i64, d: i64) -> Scalar {
    Scalar::Rat(BigRational::new(BigInt::from(n), BigInt::from(d)))
  }

  pub fn from_root_loc(loc: RootLoc) -> Scalar {
    match loc {
      RootLoc::Rational(r) => Scalar::Rat(r),
      RootLoc::Cell { poly, lo, hi } => Scalar::Root(RealRoot { poly, lo, hi }),
    }
  }

  pub fn as_rational(&self) -> Option<&BigRational> {
    match self {
      Scalar::Rat(r) => Some(r),
      _ => None,
    }
  }

  pub fn sign(&self) -> Ordering {
    match self {
      Scalar::Rat(r) => r.cmp(&BigRational::zero()),
      Scalar::Root(a) => root_sign(a),
      Scalar::Exp { .. } => Ordering::Greater,
      Scalar::Log { base, arg } => {
        let c = (**arg).cmp(&Scalar::one());
        if base.gt_one() {
          c
        } else {
          c.reverse()
        }
      }
      Scalar::Neg(x) => x.sign().reverse(),
    }
  }

  pub fn neg(&self) -> Scalar {
    match self {
      Scalar::Rat(r) => Scalar::Rat(-r),
      Scalar::Root(a) => Scalar::Root(neg_root(a)),
      Scalar::Neg(x) => (**x).clone(),
      _ => Scalar::Neg(Box::new(self.clone())),
    }
  }

  /// Multiplication by a rational. Only the scalings the solver needs
  /// have closed forms; the rest fail.
  pub fn mul_rat(&self, c: &BigRational) -> Result<Scalar, SolveError> {
    if c.is_zero() {
      return Ok(Scalar::zero());
    }
    if c.is_one() {
      return Ok(self.clone());
    }
    match self {
      Scalar::Rat(r) => Ok(Scalar::Rat(r * c)),
      Scalar::Root(a) => {
        let (x, y) = (&a.lo * c, &a.hi * c);
        let (lo, hi) = if c.is_negative() { (y, x) } else { (x, y) };
        Ok(Scalar::Root(RealRoot {
          poly: a.poly.scale_arg(c).monic(),
          lo,
          hi,
        }))
      }
      Scalar::Neg(x) => x.mul_rat(&-c),
      _ if *c == -BigRational::one() => Ok(self.neg()),
      _ => Err(SolveError::NotInvertible(format!(
        "cannot scale {} by {}",
        self, c
      ))),
    }
  }

  pub fn recip(&self) -> Result<Scalar, SolveError> {
    match self {
      Scalar::Rat(r) => {
        if r.is_zero() {
          return Err(SolveError::NotInvertible("reciprocal of zero".into()));
        }
        Ok(Scalar::Rat(r.recip()))
      }
      Scalar::Root(a) => {
        if root_sign(a) == Ordering::Equal {
          return Err(SolveError::NotInvertible("reciprocal of zero".into()));
        }
        let mut p = a.poly.clone();
        while p.coeff(0).is_zero() {
          p = p.deflate(&BigRational::zero());
        }
        let (mut lo, mut hi) = (a.lo.clone(), a.hi.clone());
        for _ in 0..MAX_REFINE {
          if lo == hi {
            return Ok(Scalar::Rat(lo.recip()));
          }
          if lo.is_positive() || hi.is_negative() {
            return Ok(Scalar::Root(RealRoot {
              poly: p.reverse().monic(),
              lo: hi.recip(),
              hi: lo.recip(),
            }));
          }
          let t = a.poly.bisect_root(&lo, &hi);
          lo = t.0;
          hi = t.1;
        }
        panic!("reciprocal refinement exceeded {} steps", MAX_REFINE)
      }
      Scalar::Exp { base, arg } => Ok(Scalar::exp(base, &arg.neg())),
      Scalar::Neg(x) => Ok(x.recip()?.neg()),
      Scalar::Log { .. } => Err(SolveError::NotInvertible(format!(
        "reciprocal of {}",
        self
      ))),
    }
  }

  /// base^ex for rational base and exponent. Collapses to a rational
  /// whenever the power is perfect; otherwise yields the isolated real
  /// root of x^q - base^p.
  pub fn rat_pow(base: &BigRational, ex: &BigRational) -> Result<Scalar, SolveError> {
    if ex.is_integer() {
      let k = ex.to_integer();
      if base.is_zero() {
        if k.is_negative() {
          return Err(SolveError::NotInvertible("zero to a negative power".into()));
        }
        return Ok(if k.is_zero() { Scalar::one() } else { Scalar::zero() });
      }
      let ki = k
        .to_i32()
        .ok_or_else(|| SolveError::NotInvertible(format!("exponent too large: {}", ex)))?;
      return Ok(Scalar::Rat(base.pow(ki)));
    }
    let q = ex
      .denom()
      .to_i32()
      .ok_or_else(|| SolveError::NotInvertible(format!("exponent too large: {}", ex)))? as u32;
    let p = ex.numer();
    if base.is_zero() {
      if p.is_negative() {
        return Err(SolveError::NotInvertible("zero to a negative power".into()));
      }
      return Ok(Scalar::zero());
    }
    if base.is_negative() {
      if q % 2 == 0 {
        return Err(SolveError::NotInvertible(format!(
          "even root of negative number {}",
          base
        )));
      }
      let pos = Self::rat_pow(&-base, ex)?;
      return Ok(if p.is_odd() { pos.neg() } else { pos });
    }
    let pi = p
      .to_i32()
      .ok_or_else(|| SolveError::NotInvertible(format!("exponent too large: {}", ex)))?;
    let r = base.pow(pi);
    if let Some(root) = rational_nth_root(&r, q) {
      return Ok(Scalar::Rat(root));
    }
    let mut coeffs = vec![BigRational::zero(); q as usize + 1];
    coeffs[0] = -&r;
    coeffs[q as usize] = BigRational::one();
    let hi = if r > BigRational::one() {
      &r + BigRational::one()
    } else {
      rint(2)
    };
    Ok(Scalar::Root(RealRoot {
      poly: Poly::new(coeffs),
      lo: BigRational::zero(),
      hi,
    }))
  }

  pub fn pow(&self, ex: &BigRational) -> Result<Scalar, SolveError> {
    if ex.is_zero() {
      return Ok(Scalar::one());
    }
    if ex.is_one() {
      return Ok(self.clone());
    }
    if ex.is_integer() {
      return self.pow_int(&ex.to_integer());
    }
    let q = ex
      .denom()
      .to_i32()
      .ok_or_else(|| SolveError::NotInvertible(format!("exponent too large: {}", ex)))? as u32;
    self.root_q(q)?.pow_int(ex.numer())
  }

  fn pow_int(&self, k: &BigInt) -> Result<Scalar, SolveError> {
    if k.is_zero() {
      return Ok(Scalar::one());
    }
    if k.is_one() {
      return Ok(self.clone());
    }
    match self {
      Scalar::Rat(r) => Self::rat_pow(r, &BigRational::from_integer(k.clone())),
      Scalar::Root(a) => {
        if *k == BigInt::from(-1) {
          return self.recip();
        }
        match root_sign(a) {
          Ordering::Equal => {
            if k.is_negative() {
              Err(SolveError::NotInvertible("zero to a negative power".into()))
            } else {
              Ok(Scalar::zero())
            }
          }
          Ordering::Less => {
            let v = Scalar::Root(neg_root(a)).pow_int(k)?;
            Ok(if k.is_odd() { v.neg() } else { v })
          }
          Ordering::Greater => match a.binomial() {
            Some((m, c)) => {
              Self::rat_pow(&c, &BigRational::new(k.clone(), BigInt::from(m)))
            }
            None => Err(SolveError::NotInvertible(format!(
              "integer power of root({})",
              a.poly
            ))),
          },
        }
      }
      Scalar::Exp { base, arg } => Ok(Scalar::exp(
        base,
        &arg.mul_rat(&BigRational::from_integer(k.clone()))?,
      )),
      Scalar::Log { .. } => Err(SolveError::NotInvertible(format!("power of {}", self))),
      Scalar::Neg(x) => {
        let v = x.pow_int(k)?;
        Ok(if k.is_odd() { v.neg() } else { v })
      }
    }
  }

  fn root_q(&self, q: u32) -> Result<Scalar, SolveError> {
    match self {
      Scalar::Rat(r) => Self::rat_pow(r, &BigRational::new(BigInt::one(), BigInt::from(q))),
      Scalar::Root(a) => root_q_of_root(a, q),
      Scalar::Exp { base, arg } => Ok(Scalar::exp(
        base,
        &arg.mul_rat(&BigRational::new(BigInt::one(), BigInt::from(q)))?,
      )),
      Scalar::Log { .. } => Err(SolveError::NotInvertible(format!("root of {}", self))),
      Scalar::Neg(x) => {
        if q % 2 == 0 {
          return Err(SolveError::NotInvertible(format!(
            "even root of negative value {}",
            self
          )));
        }
        Ok(x.root_q(q)?.neg())
      }
    }
  }

  /// base^arg, canonicalizing exp/log cancellation and rational powers.
  pub fn exp(base: &Base, arg: &Scalar) -> Scalar {
    match arg {
      Scalar::Rat(r) => {
        if r.is_zero() {
          return Scalar::one();
        }
        if let Base::Rat(b) = base {
          if let Ok(s) = Self::rat_pow(b, r) {
            return s;
          }
        }
        Scalar::Exp {
          base: base.clone(),
          arg: Box::new(arg.clone()),
        }
      }
      Scalar::Log { base: b2, arg: y } if b2 == base => (**y).clone(),
      Scalar::Neg(inner) => {
        if let Scalar::Log { base: b2, arg: y } = &**inner {
          if b2 == base {
            if let Ok(r) = y.recip() {
              return r;
            }
          }
        }
        Scalar::Exp {
          base: base.clone(),
          arg: Box::new(arg.clone()),
        }
      }
      _ => Scalar::Exp {
        base: base.clone(),
        arg: Box::new(arg.clone()),
      },
    }
  }

  /// log_base(arg) for arg > 0.
  pub fn log(base: &Base, arg: &Scalar) -> Result<Scalar, SolveError> {
    if arg.sign() != Ordering::Greater {
      return Err(SolveError::NotInvertible(format!(
        "logarithm of non-positive value {}",
        arg
      )));
    }
    match arg {
      Scalar::Rat(r) => {
        if r.is_one() {
          return Ok(Scalar::zero());
        }
        if let Base::Rat(b) = base {
          if let Some(k) = int_log(b, r) {
            return Ok(Scalar::Rat(BigRational::from_integer(k)));
          }
        }
        Ok(Scalar::Log {
          base: base.clone(),
          arg: Box::new(arg.clone()),
        })
      }
      Scalar::Exp { base: b2, arg: y } if b2 == base => Ok((**y).clone()),
      _ => Ok(Scalar::Log {
        base: base.clone(),
        arg: Box::new(arg.clone()),
      }),
    }
  }

  fn enclosure(&self, iters: usize) -> (BigRational, BigRational) {
    match self {
      Scalar::Rat(r) => (r.clone(), r.clone()),
      Scalar::Root(a) => a.refined(iters),
      Scalar::Exp { base, arg } => {
        let a = arg.enclosure(iters);
        let b = base.ln_enclosure(iters);
        let t = mul_intervals(&a, &b);
        (exp_enclosure(&t.0, iters).0, exp_enclosure(&t.1, iters).1)
      }
      Scalar::Log { base, arg } => {
        let mut it = iters.max(4);
        let mut a = arg.enclosure(it);
        let mut guard = 0;
        while !a.0.is_positive() {
          it *= 2;
          a = arg.enclosure(it);
          guard += 1;
          if guard > 32 {
            panic!("log argument failed to separate from zero: {}", arg);
          }
        }
        let n = (ln_enclosure(&a.0, iters).0, ln_enclosure(&a.1, iters).1);
        let d = base.ln_enclosure(iters);
        div_intervals(&n, &d)
      }
      Scalar::Neg(x) => {
        let (l, h) = x.enclosure(iters);
        (-h, -l)
      }
    }
  }

  pub fn approx(&self) -> f64 {
    let (lo, hi) = self.enclosure(64);
    ((lo + hi) / rint(2)).to_f64().unwrap_or(f64::NAN)
  }

  fn same_repr(&self, other: &Scalar) -> bool {
    match (self, other) {
      (Scalar::Rat(a), Scalar::Rat(b)) => a == b,
      (Scalar::Root(a), Scalar::Root(b)) => a == b,
      (
        Scalar::Exp { base: b1, arg: a1 },
        Scalar::Exp { base: b2, arg: a2 },
      )
      | (
        Scalar::Log { base: b1, arg: a1 },
        Scalar::Log { base: b2, arg: a2 },
      ) => b1 == b2 && a1.same_repr(a2),
      (Scalar::Neg(a), Scalar::Neg(b)) => a.same_repr(b),
      _ => false,
    }
  }
}

impl Ord for Scalar {
  fn cmp(&self, other: &Scalar) -> Ordering {
    if self.same_repr(other) {
      return Ordering::Equal;
    }
    match (self, other) {
      (Scalar::Rat(a), Scalar::Rat(b)) => a.cmp(b),
      (Scalar::Rat(r), Scalar::Root(t)) => cmp_rat_root(r, t),
      (Scalar::Root(t), Scalar::Rat(r)) => cmp_rat_root(r, t).reverse(),
      (Scalar::Root(a), Scalar::Root(b)) => cmp_roots(a, b),
      _ => cmp_enclosures(self, other),
    }
  }
}

impl PartialOrd for Scalar {
  fn partial_cmp(&self, other: &Scalar) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for Scalar {
  fn eq(&self, other: &Scalar) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Scalar {}

impl RealRoot {
  fn refined(&self, iters: usize) -> (BigRational, BigRational) {
    let (mut lo, mut hi) = (self.lo.clone(), self.hi.clone());
    for _ in 0..iters {
      if lo == hi {
        break;
      }
      let t = self.poly.bisect_root(&lo, &hi);
      lo = t.0;
      hi = t.1;
    }
    (lo, hi)
  }

  /// The defining polynomial, if it has the binomial shape x^m - c.
  fn binomial(&self) -> Option<(usize, BigRational)> {
    let d = self.poly.degree();
    if d < 1 {
      return None;
    }
    for i in 1..d {
      if !self.poly.coeff(i).is_zero() {
        return None;
      }
    }
    let c = -self.poly.coeff(0);
    if c.is_zero() {
      None
    } else {
      Some((d, c))
    }
  }
}

fn neg_root(a: &RealRoot) -> RealRoot {
  RealRoot {
    poly: a.poly.reflect().monic(),
    lo: -&a.hi,
    hi: -&a.lo,
  }
}

fn root_sign(a: &RealRoot) -> Ordering {
  let zero = BigRational::zero();
  let (mut lo, mut hi) = (a.lo.clone(), a.hi.clone());
  for _ in 0..MAX_REFINE {
    if lo == hi {
      return lo.cmp(&zero);
    }
    if lo >= zero {
      return Ordering::Greater;
    }
    if hi <= zero {
      return Ordering::Less;
    }
    if a.poly.eval(&zero).is_zero() {
      return Ordering::Equal;
    }
    let t = a.poly.bisect_root(&lo, &hi);
    lo = t.0;
    hi = t.1;
  }
  panic!("root sign refinement exceeded {} steps", MAX_REFINE)
}

fn cmp_rat_root(r: &BigRational, t: &RealRoot) -> Ordering {
  if t.poly.eval(r).is_zero() && *r > t.lo && *r < t.hi {
    return Ordering::Equal;
  }
  let (mut lo, mut hi) = (t.lo.clone(), t.hi.clone());
  for _ in 0..MAX_REFINE {
    if lo == hi {
      return r.cmp(&lo);
    }
    if *r <= lo {
      return Ordering::Less;
    }
    if *r >= hi {
      return Ordering::Greater;
    }
    let s = t.poly.bisect_root(&lo, &hi);
    lo = s.0;
    hi = s.1;
  }
  panic!("scalar comparison failed to refine after {} bisections", MAX_REFINE)
}

fn cmp_roots(a: &RealRoot, b: &RealRoot) -> Ordering {
  let g = if a.poly == b.poly {
    a.poly.clone()
  } else {
    a.poly.gcd(&b.poly)
  };
  let shared_possible = g.degree() >= 1;
  let (mut alo, mut ahi) = (a.lo.clone(), a.hi.clone());
  let (mut blo, mut bhi) = (b.lo.clone(), b.hi.clone());
  for _ in 0..MAX_REFINE {
    match (alo == ahi, blo == bhi) {
      (true, true) => return alo.cmp(&blo),
      (true, false) => {
        if alo <= blo {
          return Ordering::Less;
        }
        if alo >= bhi {
          return Ordering::Greater;
        }
        if b.poly.eval(&alo).is_zero() {
          return Ordering::Equal;
        }
        let t = b.poly.bisect_root(&blo, &bhi);
        blo = t.0;
        bhi = t.1;
        continue;
      }
      (false, true) => {
        if blo <= alo {
          return Ordering::Greater;
        }
        if blo >= ahi {
          return Ordering::Less;
        }
        if a.poly.eval(&blo).is_zero() {
          return Ordering::Equal;
        }
        let t = a.poly.bisect_root(&alo, &ahi);
        alo = t.0;
        ahi = t.1;
        continue;
      }
      (false, false) => {}
    }
    if ahi <= blo {
      return Ordering::Less;
    }
    if bhi <= alo {
      return Ordering::Greater;
    }
    if shared_possible {
      let lo = if alo < blo { alo.clone() } else { blo.clone() };
      let hi = if ahi > bhi { ahi.clone() } else { bhi.clone() };
      let clean = !a.poly.eval(&lo).is_zero()
        && !a.poly.eval(&hi).is_zero()
        && !b.poly.eval(&lo).is_zero()
        && !b.poly.eval(&hi).is_zero()
        && !g.eval(&lo).is_zero()
        && !g.eval(&hi).is_zero();
      if clean
        && a.poly.count_roots_in(&lo, &hi) == 1
        && b.poly.count_roots_in(&lo, &hi) == 1
        && g.count_roots_in(&lo, &hi) == 1
      {
        return Ordering::Equal;
      }
    }
    let t = a.poly.bisect_root(&alo, &ahi);
    alo = t.0;
    ahi = t.1;
    let t = b.poly.bisect_root(&blo, &bhi);
    blo = t.0;
    bhi = t.1;
  }
  panic!("scalar comparison failed to refine after {} bisections", MAX_REFINE)
}

fn cmp_enclosures(a: &Scalar, b: &Scalar) -> Ordering {
  let mut iters = 8;
  for _ in 0..CMP_ROUNDS {
    let ea = a.enclosure(iters);
    let eb = b.enclosure(iters);
    if ea.1 < eb.0 {
      return Ordering::Less;
    }
    if eb.1 < ea.0 {
      return Ordering::Greater;
    }
    iters *= 2;
  }
  panic!("scalar comparison failed to separate {} and {}", a, b)
}

/// self^(1/q) of an algebraic number: isolate the matching root of
/// p(x^q) by shrinking a rational enclosure of the radical until it
/// overlaps exactly one candidate.
fn root_q_of_root(a: &RealRoot, q: u32) -> Result<Scalar, SolveError> {
  match root_sign(a) {
    Ordering::Equal => Ok(Scalar::zero()),
    Ordering::Less => {
      if q % 2 == 0 {
        return Err(SolveError::NotInvertible(format!(
          "even root of negative number root({})",
          a.poly
        )));
      }
      Ok(root_q_of_root(&neg_root(a), q)?.neg())
    }
    Ordering::Greater => {
      let target = a.poly.compose_power(q as usize).squarefree();
      let roots = target.real_roots();
      let mut iters = 8usize;
      for _ in 0..CMP_ROUNDS {
        let (l, h) = a.refined(iters);
        if !l.is_positive() {
          iters *= 2;
          continue;
        }
        let enc = (
          nth_root_enclosure(&l, q, iters).0,
          nth_root_enclosure(&h, q, iters).1,
        );
        let overlapping: Vec<&RootLoc> = roots
          .iter()
          .filter(|r| match r {
            RootLoc::Rational(m) => *m >= enc.0 && *m <= enc.1,
            RootLoc::Cell { lo, hi, .. } => *lo < enc.1 && *hi > enc.0,
          })
          .collect();
        if overlapping.len() == 1 {
          return Ok(Scalar::from_root_loc(overlapping[0].clone()));
        }
        iters *= 2;
      }
      panic!("radical isolation failed for root({})^(1/{})", a.poly, q)
    }
  }
}

/// Rational bounds on r^(1/q) for r >= 0, by bisection.
fn nth_root_enclosure(r: &BigRational, q: u32, iters: usize) -> (BigRational, BigRational) {
  let one = BigRational::one();
  let mut lo = BigRational::zero();
  let mut hi = if *r > one { r + &one } else { rint(2) };
  for _ in 0..iters {
    let m = (&lo + &hi) / rint(2);
    if m.pow(q as i32) <= *r {
      lo = m;
    } else {
      hi = m;
    }
  }
  (lo, hi)
}

/// Rational bounds on e^x by Taylor series with argument halving.
fn exp_enclosure(x: &BigRational, terms: usize) -> (BigRational, BigRational) {
  let terms = terms.max(4);
  if x.is_negative() {
    let (l, h) = exp_enclosure(&-x, terms);
    return (h.recip(), l.recip());
  }
  let one = BigRational::one();
  let mut y = x.clone();
  let mut halvings = 0u32;
  while y > one {
    y /= rint(2);
    halvings += 1;
  }
  let mut term = one.clone();
  let mut sum = one.clone();
  for k in 1..=terms {
    term = term * &y / rint(k as i64);
    sum += &term;
  }
  let rem = term * &y / rint(terms as i64 + 1) * rint(2);
  let (mut lo, mut hi) = (sum.clone(), sum + rem);
  for _ in 0..halvings {
    lo = &lo * &lo;
    hi = &hi * &hi;
  }
  (lo, hi)
}

/// Rational bounds on ln x for x > 0, by the atanh series after range
/// reduction into [1, 2].
fn ln_enclosure(x: &BigRational, terms: usize) -> (BigRational, BigRational) {
  let terms = terms.max(4);
  let one = BigRational::one();
  debug_assert!(x.is_positive());
  if *x < one {
    let (l, h) = ln_enclosure(&x.recip(), terms);
    return (-h, -l);
  }
  let two = rint(2);
  let mut z = x.clone();
  let mut k = 0i64;
  while z > two {
    z /= &two;
    k += 1;
  }
  let core = ln_core(&z, terms);
  if k == 0 {
    return core;
  }
  let l2 = ln_core(&two, terms);
  (core.0 + rint(k) * &l2.0, core.1 + rint(k) * &l2.1)
}

fn ln_core(z: &BigRational, terms: usize) -> (BigRational, BigRational) {
  // t = (z-1)/(z+1) <= 1/3 on [1, 2], so 1/(1 - t^2) <= 9/8
  let one = BigRational::one();
  let t = (z - &one) / (z + &one);
  let t2 = &t * &t;
  let mut sum = BigRational::zero();
  let mut tp = t;
  for j in 0..terms {
    sum += &tp / rint(2 * j as i64 + 1);
    tp *= &t2;
  }
  let tail = &tp / rint(2 * terms as i64 + 1) * BigRational::new(BigInt::from(9), BigInt::from(8));
  (&sum * rint(2), (&sum + &tail) * rint(2))
}

fn mul_intervals(
  a: &(BigRational, BigRational),
  b: &(BigRational, BigRational),
) -> (BigRational, BigRational) {
  let cands = [&a.0 * &b.0, &a.0 * &b.1, &a.1 * &b.0, &a.1 * &b.1];
  let lo = cands.iter().min().unwrap().clone();
  let hi = cands.iter().max().unwrap().clone();
  (lo, hi)
}

fn div_intervals(
  n: &(BigRational, BigRational),
  d: &(BigRational, BigRational),
) -> (BigRational, BigRational) {
  debug_assert!(d.0.is_positive() || d.1.is_negative());
  let cands = [&n.0 / &d.0, &n.0 / &d.1, &n.1 / &d.0, &n.1 / &d.1];
  let lo = cands.iter().min().unwrap().clone();
  let hi = cands.iter().max().unwrap().clone();
  (lo, hi)
}

/// Integer k with b^k == r, if one exists.
fn int_log(b: &BigRational, r: &BigRational) -> Option<BigInt> {
  let one = BigRational::one();
  if *b < one {
    return int_log(&b.recip(), r).map(|k| -k);
  }
  if *r < one {
    return int_log(b, &r.recip()).map(|k| -k);
  }
  let mut acc = one;
  let mut k = BigInt::zero();
  for _ in 0..64 {
    if acc == *r {
      return Some(k);
    }
    if acc > *r {
      return None;
    }
    acc *= b;
    k += 1;
  }
  None
}

impl fmt::Display for Scalar {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Scalar::Rat(r) => write!(f, "{}", r),
      Scalar::Root(a) => match a.binomial() {
        Some((m, c)) if root_sign(a) == Ordering::Greater => {
          write!(f, "({})^(1/{})", c, m)
        }
        _ => write!(f, "root({}, {}..{})", a.poly, a.lo, a.hi),
      },
      Scalar::Exp { base: Base::E, arg } => write!(f, "e^({})", arg),
      Scalar::Exp { base, arg } => write!(f, "({})^({})", base, arg),
      Scalar::Log { base: Base::E, arg } => write!(f, "ln({})", arg),
      Scalar::Log { base, arg } => write!(f, "log[{}]({})", base, arg),
      Scalar::Neg(x) => write!(f, "-{}", x),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sqrt(n: i64) -> Scalar {
    Scalar::rat_pow(&rint(n), &BigRational::new(BigInt::one(), BigInt::from(2))).unwrap()
  }

  #[test]
  fn perfect_powers_collapse() {
    assert_eq!(sqrt(4), Scalar::from(2));
    assert_eq!(
      Scalar::rat_pow(&rint(27), &BigRational::new(BigInt::from(2), BigInt::from(3))).unwrap(),
      Scalar::from(9)
    );
    assert_eq!(
      Scalar::rat_pow(&rint(-8), &BigRational::new(BigInt::one(), BigInt::from(3))).unwrap(),
      Scalar::from(-2)
    );
  }

  #[test]
  fn surd_ordering() {
    let s2 = sqrt(2);
    assert!(s2 > Scalar::rat(7, 5));
    assert!(s2 < Scalar::rat(3, 2));
    assert_eq!(s2.sign(), Ordering::Greater);
    assert!(s2.neg() < Scalar::zero());
  }

  #[test]
  fn equal_surds_built_differently() {
    // sqrt(8) / 2 == sqrt(2)
    let half = BigRational::new(BigInt::one(), BigInt::from(2));
    let a = sqrt(8).mul_rat(&half).unwrap();
    assert_eq!(a, sqrt(2));
    // 1 / sqrt(2) == 2^(-1/2)
    let b = sqrt(2).recip().unwrap();
    let c = Scalar::rat_pow(&rint(2), &BigRational::new(BigInt::from(-1), BigInt::from(2))).unwrap();
    assert_eq!(b, c);
  }

  #[test]
  fn exp_log_cancellation() {
    let e = Base::E;
    let x = sqrt(2);
    assert_eq!(Scalar::log(&e, &Scalar::exp(&e, &x)).unwrap(), x);
    assert_eq!(Scalar::exp(&e, &Scalar::zero()), Scalar::one());
    let two = Base::int(2).unwrap();
    assert_eq!(Scalar::exp(&two, &Scalar::from(3)), Scalar::from(8));
    assert_eq!(Scalar::log(&two, &Scalar::from(8)).unwrap(), Scalar::from(3));
    assert_eq!(
      Scalar::log(&two, &Scalar::rat(1, 4)).unwrap(),
      Scalar::from(-2)
    );
  }

  #[test]
  fn transcendental_enclosures() {
    // e^2 is between 7 and 8
    let e2 = Scalar::exp(&Base::E, &Scalar::from(2));
    assert!(e2 > Scalar::from(7));
    assert!(e2 < Scalar::from(8));
    assert!(e2.neg() < Scalar::from(-7));
    // log_2(5) is between 2 and 3
    let l = Scalar::log(&Base::int(2).unwrap(), &Scalar::from(5)).unwrap();
    assert!(l > Scalar::from(2));
    assert!(l < Scalar::from(3));
    // ln(1/2) is negative
    let n = Scalar::log(&Base::E, &Scalar::rat(1, 2)).unwrap();
    assert_eq!(n.sign(), Ordering::Less);
  }

  #[test]
  fn powers_of_exp_forms() {
    let e2 = Scalar::exp(&Base::E, &Scalar::from(2));
    let half = BigRational::new(BigInt::one(), BigInt::from(2));
    assert_eq!(
      e2.pow(&half).unwrap(),
      Scalar::exp(&Base::E, &Scalar::one())
    );
    assert_eq!(e2.recip().unwrap(), Scalar::exp(&Base::E, &Scalar::from(-2)));
  }

  #[test]
  fn log_rejects_non_positive() {
    assert!(Scalar::log(&Base::E, &Scalar::zero()).is_err());
    assert!(Scalar::log(&Base::E, &Scalar::from(-3)).is_err());
  }

  #[test]
  fn approx_values() {
    let s2 = sqrt(2);
    assert!((s2.approx() - 1.4142135623730951).abs() < 1e-9);
    let e2 = Scalar::exp(&Base::E, &Scalar::from(2));
    assert!((e2.approx() - 7.38905609893065).abs() < 1e-9);
    let l5 = Scalar::log(&Base::int(2).unwrap(), &Scalar::from(5)).unwrap();
    assert!((l5.approx() - 2.321928094887362).abs() < 1e-9);
  }

  #[test]
  fn base_validation() {
    assert!(Base::int(1).is_err());
    assert!(Base::int(0).is_err());
    assert!(Base::int(-2).is_err());
    assert!(Base::int(2).is_ok());
  }
}
