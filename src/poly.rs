use num::{BigInt, BigRational, One, Signed, Zero};
use std::fmt;

/// Dense univariate polynomial over exact rationals, coefficients in
/// ascending order of degree. The zero polynomial has no coefficients.
#[derive(Clone, PartialEq, Eq)]
pub struct Poly {
  coeffs: Vec<BigRational>,
}

/// Location of one real root: either an exact rational, or an open
/// interval with rational endpoints containing exactly one root of
/// `poly` (which is square-free and monic).
#[derive(Debug, Clone, PartialEq)]
pub enum RootLoc {
  Rational(BigRational),
  Cell {
    poly: Poly,
    lo: BigRational,
    hi: BigRational,
  },
}

fn sgn(x: &BigRational) -> i32 {
  if x.is_zero() {
    0
  } else if x.is_negative() {
    -1
  } else {
    1
  }
}

impl Poly {
  pub fn new(coeffs: Vec<BigRational>) -> Self {
    let mut p = Poly { coeffs };
    p.trim();
    p
  }

  pub fn from_i64(coeffs: &[i64]) -> Self {
    Poly::new(
      coeffs
        .iter()
        .map(|c| BigRational::from_integer(BigInt::from(*c)))
        .collect(),
    )
  }

  pub fn zero() -> Self {
    Poly { coeffs: vec![] }
  }

  pub fn constant(c: BigRational) -> Self {
    Poly::new(vec![c])
  }

  /// The monomial c * x^k.
  pub fn monomial(c: BigRational, k: usize) -> Self {
    let mut coeffs = vec![BigRational::zero(); k + 1];
    coeffs[k] = c;
    Poly::new(coeffs)
  }

  fn trim(&mut self) {
    while self.coeffs.last().map_or(false, |c| c.is_zero()) {
      self.coeffs.pop();
    }
  }

  pub fn is_zero(&self) -> bool {
    self.coeffs.is_empty()
  }

  pub fn degree(&self) -> usize {
    self.coeffs.len().saturating_sub(1)
  }

  pub fn coeff(&self, i: usize) -> BigRational {
    self.coeffs.get(i).cloned().unwrap_or_else(BigRational::zero)
  }

  pub fn coeffs(&self) -> &[BigRational] {
    &self.coeffs
  }

  pub fn leading(&self) -> BigRational {
    self.coeffs.last().cloned().unwrap_or_else(BigRational::zero)
  }

  pub fn eval(&self, x: &BigRational) -> BigRational {
    let mut acc = BigRational::zero();
    for c in self.coeffs.iter().rev() {
      acc = acc * x + c;
    }
    acc
  }

  pub fn neg(&self) -> Self {
    Poly::new(self.coeffs.iter().map(|c| -c).collect())
  }

  pub fn add(&self, other: &Poly) -> Self {
    let n = self.coeffs.len().max(other.coeffs.len());
    let coeffs = (0..n).map(|i| self.coeff(i) + other.coeff(i)).collect();
    Poly::new(coeffs)
  }

  pub fn sub(&self, other: &Poly) -> Self {
    self.add(&other.neg())
  }

  pub fn mul(&self, other: &Poly) -> Self {
    if self.is_zero() || other.is_zero() {
      return Poly::zero();
    }
    let mut coeffs = vec![BigRational::zero(); self.coeffs.len() + other.coeffs.len() - 1];
    for (i, a) in self.coeffs.iter().enumerate() {
      for (j, b) in other.coeffs.iter().enumerate() {
        coeffs[i + j] += a * b;
      }
    }
    Poly::new(coeffs)
  }

  pub fn scale(&self, c: &BigRational) -> Self {
    Poly::new(self.coeffs.iter().map(|a| a * c).collect())
  }

  pub fn derivative(&self) -> Self {
    if self.coeffs.len() <= 1 {
      return Poly::zero();
    }
    let coeffs = self
      .coeffs
      .iter()
      .enumerate()
      .skip(1)
      .map(|(i, c)| c * BigRational::from_integer(BigInt::from(i)))
      .collect();
    Poly::new(coeffs)
  }

  /// Euclidean division: returns (quotient, remainder).
  pub fn divmod(&self, div: &Poly) -> (Poly, Poly) {
    assert!(!div.is_zero(), "polynomial division by zero");
    let mut rem = self.clone();
    let mut quot = vec![BigRational::zero(); self.coeffs.len()];
    while !rem.is_zero() && rem.degree() >= div.degree() {
      let shift = rem.degree() - div.degree();
      let c = rem.leading() / div.leading();
      quot[shift] = c.clone();
      rem = rem.sub(&Poly::monomial(c, shift).mul(div));
    }
    (Poly::new(quot), rem)
  }

  pub fn monic(&self) -> Self {
    if self.is_zero() {
      return Poly::zero();
    }
    self.scale(&self.leading().recip())
  }

  pub fn gcd(&self, other: &Poly) -> Self {
    let mut a = self.clone();
    let mut b = other.clone();
    while !b.is_zero() {
      let r = a.divmod(&b).1;
      a = b;
      b = r;
    }
    a.monic()
  }

  /// The square-free part self / gcd(self, self'). Shares exactly the
  /// roots of self, each with multiplicity one.
  pub fn squarefree(&self) -> Self {
    if self.degree() <= 1 {
      return self.monic();
    }
    let g = self.gcd(&self.derivative());
    if g.degree() == 0 {
      return self.monic();
    }
    self.divmod(&g).0.monic()
  }

  /// p(x^k).
  pub fn compose_power(&self, k: usize) -> Self {
    assert!(k >= 1);
    let mut coeffs = vec![BigRational::zero(); self.coeffs.len().saturating_sub(1) * k + 1];
    for (i, c) in self.coeffs.iter().enumerate() {
      coeffs[i * k] = c.clone();
    }
    Poly::new(coeffs)
  }

  /// p(-x).
  pub fn reflect(&self) -> Self {
    Poly::new(
      self
        .coeffs
        .iter()
        .enumerate()
        .map(|(i, c)| if i % 2 == 1 { -c } else { c.clone() })
        .collect(),
    )
  }

  /// x^n * p(1/x): roots become reciprocals. Requires p(0) != 0.
  pub fn reverse(&self) -> Self {
    assert!(!self.coeff(0).is_zero());
    let mut coeffs = self.coeffs.clone();
    coeffs.reverse();
    Poly::new(coeffs)
  }

  /// p(x/c): roots scale by c. Requires c != 0.
  pub fn scale_arg(&self, c: &BigRational) -> Self {
    assert!(!c.is_zero());
    let mut pow = BigRational::one();
    let coeffs = self
      .coeffs
      .iter()
      .map(|a| {
        let out = a / &pow;
        pow *= c;
        out
      })
      .collect();
    Poly::new(coeffs)
  }

  /// Exact division by (x - r) for a known root r.
  pub fn deflate(&self, r: &BigRational) -> Self {
    let divisor = Poly::new(vec![-r.clone(), BigRational::one()]);
    let (q, rem) = self.divmod(&divisor);
    debug_assert!(rem.is_zero());
    q
  }

  /// Cauchy bound: every real root lies in (-b, b).
  pub fn root_bound(&self) -> BigRational {
    if self.degree() == 0 {
      return BigRational::one();
    }
    let lead = self.leading();
    let max = self
      .coeffs
      .iter()
      .take(self.coeffs.len() - 1)
      .map(|c| (c / &lead).abs())
      .max()
      .unwrap_or_else(BigRational::zero);
    max + BigRational::one()
  }

  fn sturm_chain(&self) -> Vec<Poly> {
    let mut chain = vec![self.clone(), self.derivative()];
    loop {
      let n = chain.len();
      if chain[n - 1].is_zero() {
        chain.pop();
        return chain;
      }
      let r = chain[n - 2].divmod(&chain[n - 1]).1;
      if r.is_zero() {
        return chain;
      }
      chain.push(r.neg());
    }
  }

  /// Number of distinct real roots in (a, b). Neither endpoint may be
  /// a root.
  pub fn count_roots_in(&self, a: &BigRational, b: &BigRational) -> usize {
    let chain = self.sturm_chain();
    sturm_variations_at(&chain, a) - sturm_variations_at(&chain, b)
  }

  /// One bisection step on an interval with a sign change. Returns the
  /// narrowed interval, or (m, m) if the midpoint is the root exactly.
  pub fn bisect_root(&self, lo: &BigRational, hi: &BigRational) -> (BigRational, BigRational) {
    let m = (lo + hi) / BigRational::from_integer(BigInt::from(2));
    let sm = sgn(&self.eval(&m));
    if sm == 0 {
      (m.clone(), m)
    } else if sm == sgn(&self.eval(lo)) {
      (m, hi.clone())
    } else {
      (lo.clone(), m)
    }
  }

  /// All distinct real roots in ascending order. Degree one and
  /// rational-root quadratics come out as `Rational`; everything else
  /// is isolated by Sturm bisection into `Cell`s.
  pub fn real_roots(&self) -> Vec<RootLoc> {
    let sf = self.squarefree();
    match sf.degree() {
      0 => vec![],
      1 => vec![RootLoc::Rational(-sf.coeff(0) / sf.coeff(1))],
      2 => {
        // monic x^2 + bx + c
        let b = sf.coeff(1);
        let c = sf.coeff(0);
        let four = BigRational::from_integer(BigInt::from(4));
        let two = BigRational::from_integer(BigInt::from(2));
        let disc = &b * &b - four * c;
        if disc.is_negative() {
          return vec![];
        }
        if let Some(s) = rational_sqrt(&disc) {
          let r1 = (-&b - &s) / &two;
          let r2 = (-&b + &s) / &two;
          return vec![RootLoc::Rational(r1), RootLoc::Rational(r2)];
        }
        isolate_roots(&sf)
      }
      _ => isolate_roots(&sf),
    }
  }
}

/// Exact square root of a non-negative rational, if one exists.
pub fn rational_sqrt(x: &BigRational) -> Option<BigRational> {
  if x.is_negative() {
    return None;
  }
  let ns = x.numer().sqrt();
  let ds = x.denom().sqrt();
  if &(&ns * &ns) == x.numer() && &(&ds * &ds) == x.denom() {
    Some(BigRational::new(ns, ds))
  } else {
    None
  }
}

/// Exact q-th root of a rational, if one exists. For even q the input
/// must be non-negative and the non-negative root is returned.
pub fn rational_nth_root(x: &BigRational, q: u32) -> Option<BigRational> {
  if x.is_negative() {
    if q % 2 == 0 {
      return None;
    }
    return rational_nth_root(&-x, q).map(|r| -r);
  }
  let ns = x.numer().nth_root(q);
  let ds = x.denom().nth_root(q);
  if &(&ns).pow(q) == x.numer() && &(&ds).pow(q) == x.denom() {
    Some(BigRational::new(ns, ds))
  } else {
    None
  }
}

fn variations(signs: impl Iterator<Item = i32>) -> usize {
  let mut count = 0;
  let mut last = 0;
  for s in signs {
    if s == 0 {
      continue;
    }
    if last != 0 && s != last {
      count += 1;
    }
    last = s;
  }
  count
}

fn sturm_variations_at(chain: &[Poly], x: &BigRational) -> usize {
  variations(chain.iter().map(|p| sgn(&p.eval(x))))
}

/// Sturm isolation of a square-free polynomial's real roots. Rational
/// roots hit by a bisection midpoint are recorded exactly and deflated
/// out; remaining roots come back as cells over the deflated monic
/// polynomial, refined until all locations are pairwise disjoint.
fn isolate_roots(sf: &Poly) -> Vec<RootLoc> {
  let mut p = sf.monic();
  let mut rational = vec![];
  let cells = 'deflation: loop {
    if p.degree() == 0 {
      break vec![];
    }
    let chain = p.sturm_chain();
    let bound = p.root_bound();
    let lo = -&bound;
    let mut cells = vec![];
    let mut stack = vec![(lo, bound)];
    while let Some((a, b)) = stack.pop() {
      let n = sturm_variations_at(&chain, &a) - sturm_variations_at(&chain, &b);
      if n == 0 {
        continue;
      }
      let m = (&a + &b) / BigRational::from_integer(BigInt::from(2));
      if p.eval(&m).is_zero() {
        rational.push(m.clone());
        p = p.deflate(&m);
        continue 'deflation;
      }
      if n == 1 {
        cells.push((a, b));
      } else {
        stack.push((a, m.clone()));
        stack.push((m, b));
      }
    }
    break cells;
  };

  let mut out: Vec<RootLoc> = rational.into_iter().map(RootLoc::Rational).collect();
  let mut cells: Vec<(BigRational, BigRational)> = cells;
  // Narrow cells until no recorded rational root lies inside one and no
  // two cells overlap. All roots are simple, so this terminates.
  loop {
    let mut conflict = None;
    'scan: for (i, (lo, hi)) in cells.iter().enumerate() {
      for r in out.iter() {
        if let RootLoc::Rational(r) = r {
          if r > lo && r < hi {
            conflict = Some(i);
            break 'scan;
          }
        }
      }
      for (j, (lo2, hi2)) in cells.iter().enumerate() {
        if i != j && lo2 < hi && hi2 > lo {
          conflict = Some(i);
          break 'scan;
        }
      }
    }
    match conflict {
      None => break,
      Some(i) => {
        let (lo, hi) = p.bisect_root(&cells[i].0, &cells[i].1);
        if lo == hi {
          out.push(RootLoc::Rational(lo));
          cells.remove(i);
        } else {
          cells[i] = (lo, hi);
        }
      }
    }
  }
  for (lo, hi) in cells {
    out.push(RootLoc::Cell {
      poly: p.clone(),
      lo,
      hi,
    });
  }
  out.sort_by(|a, b| root_key(a).cmp(&root_key(b)));
  out
}

fn root_key(r: &RootLoc) -> (BigRational, BigRational) {
  match r {
    RootLoc::Rational(r) => (r.clone(), r.clone()),
    RootLoc::Cell { lo, hi, .. } => (lo.clone(), hi.clone()),
  }
}

impl Poly {
  /// Formats the polynomial with `var` in place of the indeterminate.
  pub fn fmt_with(&self, f: &mut fmt::Formatter, var: &str) -> fmt::Result {
    if self.is_zero() {
      return write!(f, "0");
    }
    let mut first = true;
    for (i, c) in self.coeffs.iter().enumerate().rev() {
      if c.is_zero() {
        continue;
      }
      if first {
        if c.is_negative() {
          write!(f, "-")?;
        }
        first = false;
      } else if c.is_negative() {
        write!(f, " - ")?;
      } else {
        write!(f, " + ")?;
      }
      let a = c.abs();
      match i {
        0 => write!(f, "{}", a)?,
        _ => {
          if !a.is_one() {
            write!(f, "{}*", a)?;
          }
          if i == 1 {
            write!(f, "{}", var)?;
          } else {
            write!(f, "{}^{}", var, i)?;
          }
        }
      }
    }
    Ok(())
  }
}

impl fmt::Debug for Poly {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    self.fmt_with(f, "x")
  }
}

impl fmt::Display for Poly {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{:?}", self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rat(n: i64, d: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
  }

  #[test]
  fn eval_horner() {
    let p = Poly::from_i64(&[-10, -2, 1]); // x^2 - 2x - 10
    assert_eq!(p.eval(&rat(4, 1)), rat(-2, 1));
    assert_eq!(p.eval(&rat(-2, 1)), rat(-2, 1));
    assert_eq!(p.eval(&rat(0, 1)), rat(-10, 1));
  }

  #[test]
  fn divmod_reconstructs() {
    let p = Poly::from_i64(&[1, 0, -3, 2]);
    let d = Poly::from_i64(&[-1, 1]);
    let (q, r) = p.divmod(&d);
    assert_eq!(q.mul(&d).add(&r), p);
  }

  #[test]
  fn gcd_common_factor() {
    let a = Poly::from_i64(&[-1, 1]).mul(&Poly::from_i64(&[-2, 1]));
    let b = Poly::from_i64(&[-1, 1]).mul(&Poly::from_i64(&[-3, 1]));
    assert_eq!(a.gcd(&b), Poly::from_i64(&[-1, 1]));
  }

  #[test]
  fn squarefree_drops_multiplicity() {
    let p = Poly::from_i64(&[-1, 1]); // x - 1
    let sq = p.mul(&p).mul(&Poly::from_i64(&[2, 1]));
    let sf = sq.squarefree();
    assert_eq!(sf, p.mul(&Poly::from_i64(&[2, 1])).monic());
  }

  #[test]
  fn rational_quadratic_roots() {
    // x^2 - 2x - 15 = (x - 5)(x + 3)
    let p = Poly::from_i64(&[-15, -2, 1]);
    let roots = p.real_roots();
    assert_eq!(
      roots,
      vec![RootLoc::Rational(rat(-3, 1)), RootLoc::Rational(rat(5, 1))]
    );
  }

  #[test]
  fn irrational_quadratic_isolated() {
    // x^2 - 2: cells isolating -sqrt(2) and sqrt(2)
    let p = Poly::from_i64(&[-2, 0, 1]);
    let roots = p.real_roots();
    assert_eq!(roots.len(), 2);
    match (&roots[0], &roots[1]) {
      (RootLoc::Cell { lo: a, hi: b, .. }, RootLoc::Cell { lo: c, hi: d, .. }) => {
        assert!(a < b && b <= c && c < d);
        assert!(b <= &rat(0, 1) && c >= &rat(0, 1));
      }
      other => panic!("expected two cells, got {:?}", other),
    }
  }

  #[test]
  fn deflation_catches_midpoint_root() {
    // x^3 - 2x = x(x^2 - 2): 0 lands on a bisection midpoint
    let p = Poly::from_i64(&[0, -2, 0, 1]);
    let roots = p.real_roots();
    assert_eq!(roots.len(), 3);
    assert!(roots.iter().any(|r| *r == RootLoc::Rational(rat(0, 1))));
  }

  #[test]
  fn negative_discriminant_no_roots() {
    let p = Poly::from_i64(&[1, 0, 1]); // x^2 + 1
    assert!(p.real_roots().is_empty());
  }

  #[test]
  fn nth_roots() {
    assert_eq!(rational_sqrt(&rat(9, 4)), Some(rat(3, 2)));
    assert_eq!(rational_sqrt(&rat(2, 1)), None);
    assert_eq!(rational_nth_root(&rat(-27, 8), 3), Some(rat(-3, 2)));
    assert_eq!(rational_nth_root(&rat(-4, 1), 2), None);
  }
}
