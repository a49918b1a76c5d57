use lazy_static::lazy_static;
use std::cmp::Ordering;
use std::fmt;

use crate::scalar::Scalar;

/// An interval endpoint: finite exact scalar or one of the infinities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
  NegInf,
  Fin(Scalar),
  PosInf,
}

impl Bound {
  pub fn neg(&self) -> Bound {
    match self {
      Bound::NegInf => Bound::PosInf,
      Bound::PosInf => Bound::NegInf,
      Bound::Fin(s) => Bound::Fin(s.neg()),
    }
  }

  pub fn is_finite(&self) -> bool {
    matches!(self, Bound::Fin(_))
  }
}

impl Ord for Bound {
  fn cmp(&self, other: &Bound) -> Ordering {
    use Bound::*;
    match (self, other) {
      (NegInf, NegInf) | (PosInf, PosInf) => Ordering::Equal,
      (NegInf, _) | (_, PosInf) => Ordering::Less,
      (PosInf, _) | (_, NegInf) => Ordering::Greater,
      (Fin(a), Fin(b)) => a.cmp(b),
    }
  }
}

impl PartialOrd for Bound {
  fn partial_cmp(&self, other: &Bound) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
  Inclusive,
  Exclusive,
}

impl BoundKind {
  fn flip(self) -> BoundKind {
    match self {
      BoundKind::Inclusive => BoundKind::Exclusive,
      BoundKind::Exclusive => BoundKind::Inclusive,
    }
  }
}

/// A nonempty real interval. Infinite endpoints are always exclusive;
/// a degenerate interval (lo == hi, both inclusive) is a single point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
  pub lo: Bound,
  pub lo_kind: BoundKind,
  pub hi: Bound,
  pub hi_kind: BoundKind,
}

impl Interval {
  pub fn new(lo: Bound, lo_kind: BoundKind, hi: Bound, hi_kind: BoundKind) -> Option<Interval> {
    let lo_kind = if lo.is_finite() { lo_kind } else { BoundKind::Exclusive };
    let hi_kind = if hi.is_finite() { hi_kind } else { BoundKind::Exclusive };
    match lo.cmp(&hi) {
      Ordering::Less => Some(Interval {
        lo,
        lo_kind,
        hi,
        hi_kind,
      }),
      Ordering::Equal
        if lo_kind == BoundKind::Inclusive && hi_kind == BoundKind::Inclusive =>
      {
        Some(Interval {
          lo,
          lo_kind,
          hi,
          hi_kind,
        })
      }
      _ => None,
    }
  }

  pub fn point(s: Scalar) -> Interval {
    Interval {
      lo: Bound::Fin(s.clone()),
      lo_kind: BoundKind::Inclusive,
      hi: Bound::Fin(s),
      hi_kind: BoundKind::Inclusive,
    }
  }

  pub fn closed(a: impl Into<Scalar>, b: impl Into<Scalar>) -> Option<Interval> {
    Interval::new(
      Bound::Fin(a.into()),
      BoundKind::Inclusive,
      Bound::Fin(b.into()),
      BoundKind::Inclusive,
    )
  }

  pub fn open(a: impl Into<Scalar>, b: impl Into<Scalar>) -> Option<Interval> {
    Interval::new(
      Bound::Fin(a.into()),
      BoundKind::Exclusive,
      Bound::Fin(b.into()),
      BoundKind::Exclusive,
    )
  }

  pub fn ray_lt(x: impl Into<Scalar>) -> Interval {
    Interval {
      lo: Bound::NegInf,
      lo_kind: BoundKind::Exclusive,
      hi: Bound::Fin(x.into()),
      hi_kind: BoundKind::Exclusive,
    }
  }

  pub fn ray_le(x: impl Into<Scalar>) -> Interval {
    Interval {
      lo: Bound::NegInf,
      lo_kind: BoundKind::Exclusive,
      hi: Bound::Fin(x.into()),
      hi_kind: BoundKind::Inclusive,
    }
  }

  pub fn ray_gt(x: impl Into<Scalar>) -> Interval {
    Interval {
      lo: Bound::Fin(x.into()),
      lo_kind: BoundKind::Exclusive,
      hi: Bound::PosInf,
      hi_kind: BoundKind::Exclusive,
    }
  }

  pub fn ray_ge(x: impl Into<Scalar>) -> Interval {
    Interval {
      lo: Bound::Fin(x.into()),
      lo_kind: BoundKind::Inclusive,
      hi: Bound::PosInf,
      hi_kind: BoundKind::Exclusive,
    }
  }

  pub fn all() -> Interval {
    Interval {
      lo: Bound::NegInf,
      lo_kind: BoundKind::Exclusive,
      hi: Bound::PosInf,
      hi_kind: BoundKind::Exclusive,
    }
  }

  /// (0, +inf).
  pub fn pos() -> Interval {
    Interval::ray_gt(Scalar::zero())
  }

  /// [0, +inf).
  pub fn non_neg() -> Interval {
    Interval::ray_ge(Scalar::zero())
  }

  pub fn is_point(&self) -> bool {
    self.lo == self.hi
  }

  pub fn contains(&self, s: &Scalar) -> bool {
    let lo_ok = match &self.lo {
      Bound::NegInf => true,
      Bound::PosInf => false,
      Bound::Fin(l) => match s.cmp(l) {
        Ordering::Greater => true,
        Ordering::Equal => self.lo_kind == BoundKind::Inclusive,
        Ordering::Less => false,
      },
    };
    let hi_ok = match &self.hi {
      Bound::PosInf => true,
      Bound::NegInf => false,
      Bound::Fin(h) => match s.cmp(h) {
        Ordering::Less => true,
        Ordering::Equal => self.hi_kind == BoundKind::Inclusive,
        Ordering::Greater => false,
      },
    };
    lo_ok && hi_ok
  }

  pub fn intersect(&self, other: &Interval) -> Option<Interval> {
    let (lo, lo_kind) = max_lo(
      (&self.lo, self.lo_kind),
      (&other.lo, other.lo_kind),
    );
    let (hi, hi_kind) = min_hi(
      (&self.hi, self.hi_kind),
      (&other.hi, other.hi_kind),
    );
    Interval::new(lo.clone(), lo_kind, hi.clone(), hi_kind)
  }
}

fn max_lo<'a>(
  a: (&'a Bound, BoundKind),
  b: (&'a Bound, BoundKind),
) -> (&'a Bound, BoundKind) {
  match a.0.cmp(b.0) {
    Ordering::Greater => a,
    Ordering::Less => b,
    Ordering::Equal => {
      if a.1 == BoundKind::Exclusive || b.1 == BoundKind::Exclusive {
        (a.0, BoundKind::Exclusive)
      } else {
        (a.0, BoundKind::Inclusive)
      }
    }
  }
}

fn min_hi<'a>(
  a: (&'a Bound, BoundKind),
  b: (&'a Bound, BoundKind),
) -> (&'a Bound, BoundKind) {
  match a.0.cmp(b.0) {
    Ordering::Less => a,
    Ordering::Greater => b,
    Ordering::Equal => {
      if a.1 == BoundKind::Exclusive || b.1 == BoundKind::Exclusive {
        (a.0, BoundKind::Exclusive)
      } else {
        (a.0, BoundKind::Inclusive)
      }
    }
  }
}

fn max_hi(a: (Bound, BoundKind), b: (Bound, BoundKind)) -> (Bound, BoundKind) {
  match a.0.cmp(&b.0) {
    Ordering::Greater => a,
    Ordering::Less => b,
    Ordering::Equal => {
      if a.1 == BoundKind::Inclusive || b.1 == BoundKind::Inclusive {
        (a.0, BoundKind::Inclusive)
      } else {
        (a.0, BoundKind::Exclusive)
      }
    }
  }
}

/// A normalized union of intervals: sorted, pairwise disjoint, and
/// non-adjacent. The normal form makes set equality structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalSet(Vec<Interval>);

impl From<Interval> for IntervalSet {
  fn from(iv: Interval) -> IntervalSet {
    IntervalSet(vec![iv])
  }
}

impl From<Option<Interval>> for IntervalSet {
  fn from(iv: Option<Interval>) -> IntervalSet {
    match iv {
      Some(iv) => IntervalSet(vec![iv]),
      None => IntervalSet::empty(),
    }
  }
}

impl IntervalSet {
  pub fn empty() -> IntervalSet {
    IntervalSet(vec![])
  }

  pub fn point(s: Scalar) -> IntervalSet {
    IntervalSet(vec![Interval::point(s)])
  }

  pub fn new(ivs: Vec<Interval>) -> IntervalSet {
    let mut ivs = ivs;
    ivs.sort_by(|a, b| {
      a.lo
        .cmp(&b.lo)
        .then_with(|| lo_rank(a.lo_kind).cmp(&lo_rank(b.lo_kind)))
    });
    let mut out: Vec<Interval> = vec![];
    for iv in ivs {
      if let Some(last) = out.last_mut() {
        if touches(last, &iv) {
          let (hi, hi_kind) = max_hi((last.hi.clone(), last.hi_kind), (iv.hi, iv.hi_kind));
          last.hi = hi;
          last.hi_kind = hi_kind;
          continue;
        }
      }
      out.push(iv);
    }
    IntervalSet(out)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn intervals(&self) -> &[Interval] {
    &self.0
  }

  pub fn contains(&self, s: &Scalar) -> bool {
    self.0.iter().any(|iv| iv.contains(s))
  }

  pub fn union(&self, other: &IntervalSet) -> IntervalSet {
    let mut ivs = self.0.clone();
    ivs.extend(other.0.iter().cloned());
    IntervalSet::new(ivs)
  }

  pub fn intersect(&self, other: &IntervalSet) -> IntervalSet {
    let mut out = vec![];
    for a in &self.0 {
      for b in &other.0 {
        if let Some(c) = a.intersect(b) {
          out.push(c);
        }
      }
    }
    IntervalSet::new(out)
  }

  /// Set difference self minus other.
  pub fn difference(&self, other: &IntervalSet) -> IntervalSet {
    self.intersect(&other.complement_reals())
  }

  /// Complement relative to the given universe.
  pub fn complement(&self, universe: &IntervalSet) -> IntervalSet {
    self.complement_reals().intersect(universe)
  }

  fn complement_reals(&self) -> IntervalSet {
    let mut out = vec![];
    let mut cursor = (Bound::NegInf, BoundKind::Exclusive);
    for iv in &self.0 {
      if let Some(gap) = Interval::new(
        cursor.0,
        cursor.1,
        iv.lo.clone(),
        iv.lo_kind.flip(),
      ) {
        out.push(gap);
      }
      cursor = (iv.hi.clone(), iv.hi_kind.flip());
    }
    if let Some(tail) = Interval::new(cursor.0, cursor.1, Bound::PosInf, BoundKind::Exclusive) {
      out.push(tail);
    }
    IntervalSet(out)
  }
}

fn lo_rank(k: BoundKind) -> u8 {
  match k {
    BoundKind::Inclusive => 0,
    BoundKind::Exclusive => 1,
  }
}

// Assumes a.lo <= b.lo (sorted order): overlapping or exactly adjacent.
fn touches(a: &Interval, b: &Interval) -> bool {
  match b.lo.cmp(&a.hi) {
    Ordering::Less => true,
    Ordering::Equal => {
      a.hi_kind == BoundKind::Inclusive || b.lo_kind == BoundKind::Inclusive
    }
    Ordering::Greater => false,
  }
}

lazy_static! {
  pub static ref REALS: IntervalSet = IntervalSet::from(Interval::all());
  /// [0, +inf).
  pub static ref REALS_POS: IntervalSet = IntervalSet::from(Interval::non_neg());
}

impl fmt::Display for Interval {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if self.is_point() {
      if let Bound::Fin(s) = &self.lo {
        return write!(f, "{{{}}}", s);
      }
    }
    match self.lo_kind {
      BoundKind::Inclusive => write!(f, "[")?,
      BoundKind::Exclusive => write!(f, "(")?,
    }
    match &self.lo {
      Bound::NegInf => write!(f, "-∞")?,
      Bound::PosInf => write!(f, "∞")?,
      Bound::Fin(s) => write!(f, "{}", s)?,
    }
    write!(f, ", ")?;
    match &self.hi {
      Bound::NegInf => write!(f, "-∞")?,
      Bound::PosInf => write!(f, "∞")?,
      Bound::Fin(s) => write!(f, "{}", s)?,
    }
    match self.hi_kind {
      BoundKind::Inclusive => write!(f, "]"),
      BoundKind::Exclusive => write!(f, ")"),
    }
  }
}

impl fmt::Display for IntervalSet {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if self.0.is_empty() {
      return write!(f, "∅");
    }
    for (i, iv) in self.0.iter().enumerate() {
      if i > 0 {
        write!(f, " ∪ ")?;
      }
      write!(f, "{}", iv)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn s(n: i64) -> Scalar {
    Scalar::from(n)
  }

  #[test]
  fn merge_overlapping() {
    let a = Interval::closed(1, 5).unwrap();
    let b = Interval::closed(3, 8).unwrap();
    let set = IntervalSet::new(vec![a, b]);
    assert_eq!(set, IntervalSet::from(Interval::closed(1, 8).unwrap()));
  }

  #[test]
  fn merge_adjacent_only_with_closed_end() {
    let half_open = IntervalSet::new(vec![
      Interval::new(
        Bound::Fin(s(1)),
        BoundKind::Inclusive,
        Bound::Fin(s(2)),
        BoundKind::Exclusive,
      )
      .unwrap(),
      Interval::closed(2, 3).unwrap(),
    ]);
    assert_eq!(half_open.intervals().len(), 1);

    let both_open = IntervalSet::new(vec![
      Interval::open(1, 2).unwrap(),
      Interval::open(2, 3).unwrap(),
    ]);
    assert_eq!(both_open.intervals().len(), 2);
    assert!(!both_open.contains(&s(2)));
  }

  #[test]
  fn point_merges_into_open_neighbors() {
    let set = IntervalSet::new(vec![
      Interval::open(1, 2).unwrap(),
      Interval::point(s(2)),
      Interval::open(2, 3).unwrap(),
    ]);
    assert_eq!(set, IntervalSet::from(Interval::open(1, 3).unwrap()));
  }

  #[test]
  fn intersection_respects_kinds() {
    let a = IntervalSet::from(Interval::new(
      Bound::Fin(s(0)),
      BoundKind::Inclusive,
      Bound::Fin(s(2)),
      BoundKind::Exclusive,
    )
    .unwrap());
    let b = IntervalSet::from(Interval::open(0, 2).unwrap());
    let c = a.intersect(&b);
    assert_eq!(c, IntervalSet::from(Interval::open(0, 2).unwrap()));
    assert!(!c.contains(&s(0)));
    assert!(c.contains(&Scalar::rat(1, 1)));
  }

  #[test]
  fn complement_round_trip() {
    let set = IntervalSet::new(vec![
      Interval::open(0, 1).unwrap(),
      Interval::closed(3, 4).unwrap(),
    ]);
    let comp = set.complement(&REALS);
    assert!(comp.contains(&s(0)));
    assert!(comp.contains(&s(2)));
    assert!(!comp.contains(&Scalar::rat(7, 2)));
    assert_eq!(comp.complement(&REALS), set);
  }

  #[test]
  fn difference_cuts_holes() {
    let whole = IntervalSet::from(Interval::closed(0, 10).unwrap());
    let hole = IntervalSet::from(Interval::open(2, 3).unwrap());
    let diff = whole.difference(&hole);
    assert!(diff.contains(&s(2)));
    assert!(diff.contains(&s(3)));
    assert!(!diff.contains(&Scalar::rat(5, 2)));
    assert_eq!(diff.intervals().len(), 2);
  }

  #[test]
  fn empty_and_degenerate() {
    assert!(Interval::closed(3, 2).is_none());
    assert!(Interval::open(2, 2).is_none());
    let pt = Interval::closed(2, 2).unwrap();
    assert!(pt.is_point());
    assert!(pt.contains(&s(2)));
  }

  #[test]
  fn infinite_endpoints_forced_open() {
    let iv = Interval::new(
      Bound::NegInf,
      BoundKind::Inclusive,
      Bound::Fin(s(0)),
      BoundKind::Inclusive,
    )
    .unwrap();
    assert_eq!(iv.lo_kind, BoundKind::Exclusive);
  }
}
