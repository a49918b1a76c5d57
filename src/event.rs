use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use crate::error::SolveError;
use crate::interval::{Bound, BoundKind, Interval, IntervalSet, REALS};
use crate::lang::Var;
use crate::scalar::Scalar;
use crate::transform::Transform;

/// A measurable predicate over transformed variables. `Between` is the
/// elementary form; the rest is boolean structure over it.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
  Between(Transform, Interval),
  And(Vec<Event>),
  Or(Vec<Event>),
  Not(Box<Event>),
}

/// Comparison constructors, so guards read the way they are written in
/// the source program: `t(x).lt(3)` for t(x) < 3.
impl Transform {
  pub fn lt(self, x: impl Into<Scalar>) -> Event {
    Event::Between(self, Interval::ray_lt(x))
  }

  pub fn le(self, x: impl Into<Scalar>) -> Event {
    Event::Between(self, Interval::ray_le(x))
  }

  pub fn gt(self, x: impl Into<Scalar>) -> Event {
    Event::Between(self, Interval::ray_gt(x))
  }

  pub fn ge(self, x: impl Into<Scalar>) -> Event {
    Event::Between(self, Interval::ray_ge(x))
  }

  pub fn eq_to(self, x: impl Into<Scalar>) -> Event {
    Event::Between(self, Interval::point(x.into()))
  }

  /// Closed interval [a, b]; an inverted pair denotes the empty event.
  pub fn between(self, a: impl Into<Scalar>, b: impl Into<Scalar>) -> Event {
    match Interval::closed(a, b) {
      Some(iv) => Event::Between(self, iv),
      None => Event::Or(vec![]),
    }
  }

  pub fn in_interval(self, iv: Interval) -> Event {
    Event::Between(self, iv)
  }

  pub fn in_set(self, xs: Vec<Scalar>) -> Event {
    Event::Or(
      xs.into_iter()
        .map(|x| Event::Between(self.clone(), Interval::point(x)))
        .collect(),
    )
  }
}

impl Event {
  pub fn symbols(&self) -> HashSet<Var> {
    let mut out = HashSet::new();
    self.collect_symbols(&mut out);
    out
  }

  fn collect_symbols(&self, out: &mut HashSet<Var>) {
    match self {
      Event::Between(t, _) => {
        out.insert(t.symbol());
      }
      Event::And(es) | Event::Or(es) => {
        for e in es {
          e.collect_symbols(out);
        }
      }
      Event::Not(e) => e.collect_symbols(out),
    }
  }

  /// Exact solution set over the event's single symbol. Negation
  /// complements against the whole line, so values outside a partial
  /// transform's domain count as satisfying the negated event.
  pub fn solve(&self) -> Result<IntervalSet, SolveError> {
    match self {
      Event::Between(t, iv) => t.solve(iv),
      Event::And(es) => {
        let mut acc = REALS.clone();
        for e in es {
          acc = acc.intersect(&e.solve()?);
        }
        Ok(acc)
      }
      Event::Or(es) => {
        let mut acc = IntervalSet::empty();
        for e in es {
          acc = acc.union(&e.solve()?);
        }
        Ok(acc)
      }
      // negation complements against all of ℝ, not the chain's
      // effective domain: ¬(√X < 1) includes the negative reals
      Event::Not(e) => Ok(e.solve()?.complement(&REALS)),
    }
  }

  /// Rewrites each elementary predicate through the transforms recorded
  /// for its symbol, leaving unknown symbols alone.
  pub fn substitute(&self, env: &HashMap<Var, Transform>) -> Event {
    match self {
      Event::Between(t, iv) => match env.get(&t.symbol()) {
        Some(chain) => Event::Between(t.substitute(chain), iv.clone()),
        None => self.clone(),
      },
      Event::And(es) => Event::And(es.iter().map(|e| e.substitute(env)).collect()),
      Event::Or(es) => Event::Or(es.iter().map(|e| e.substitute(env)).collect()),
      Event::Not(e) => Event::Not(Box::new(e.substitute(env))),
    }
  }
}

impl BitAnd for Event {
  type Output = Event;

  fn bitand(self, rhs: Event) -> Event {
    match (self, rhs) {
      (Event::And(mut a), Event::And(b)) => {
        a.extend(b);
        Event::And(a)
      }
      (Event::And(mut a), e) => {
        a.push(e);
        Event::And(a)
      }
      (e, Event::And(mut b)) => {
        b.insert(0, e);
        Event::And(b)
      }
      (a, b) => Event::And(vec![a, b]),
    }
  }
}

impl BitOr for Event {
  type Output = Event;

  fn bitor(self, rhs: Event) -> Event {
    match (self, rhs) {
      (Event::Or(mut a), Event::Or(b)) => {
        a.extend(b);
        Event::Or(a)
      }
      (Event::Or(mut a), e) => {
        a.push(e);
        Event::Or(a)
      }
      (e, Event::Or(mut b)) => {
        b.insert(0, e);
        Event::Or(b)
      }
      (a, b) => Event::Or(vec![a, b]),
    }
  }
}

impl Not for Event {
  type Output = Event;

  fn not(self) -> Event {
    match self {
      Event::Not(e) => *e,
      e => Event::Not(Box::new(e)),
    }
  }
}

fn atom(e: &Event) -> String {
  match e {
    Event::Between(..) => format!("{}", e),
    _ => format!("({})", e),
  }
}

impl fmt::Display for Event {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Event::Between(t, iv) => {
        if iv.is_point() {
          if let Bound::Fin(x) = &iv.lo {
            return write!(f, "{} = {}", t, x);
          }
        }
        match (&iv.lo, &iv.hi, iv.hi_kind) {
          (Bound::NegInf, Bound::Fin(x), BoundKind::Exclusive) => write!(f, "{} < {}", t, x),
          (Bound::NegInf, Bound::Fin(x), BoundKind::Inclusive) => write!(f, "{} ≤ {}", t, x),
          (Bound::Fin(x), Bound::PosInf, _) => match iv.lo_kind {
            BoundKind::Exclusive => write!(f, "{} > {}", t, x),
            BoundKind::Inclusive => write!(f, "{} ≥ {}", t, x),
          },
          _ => write!(f, "{} ∈ {}", t, iv),
        }
      }
      Event::And(es) => {
        if es.is_empty() {
          return write!(f, "⊤");
        }
        for (i, e) in es.iter().enumerate() {
          if i > 0 {
            write!(f, " ∧ ")?;
          }
          write!(f, "{}", atom(e))?;
        }
        Ok(())
      }
      Event::Or(es) => {
        if es.is_empty() {
          return write!(f, "⊥");
        }
        for (i, e) in es.iter().enumerate() {
          if i > 0 {
            write!(f, " ∨ ")?;
          }
          write!(f, "{}", atom(e))?;
        }
        Ok(())
      }
      Event::Not(e) => write!(f, "¬{}", atom(e)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lang::v;

  fn x() -> Transform {
    Transform::var(v("x"))
  }

  #[test]
  fn operators_flatten() {
    let e = (x().lt(1) & x().gt(0)) & x().eq_to(2);
    match e {
      Event::And(es) => assert_eq!(es.len(), 3),
      other => panic!("expected conjunction, got {}", other),
    }
    let e = x().lt(1) | (x().gt(2) | x().eq_to(5));
    match e {
      Event::Or(es) => assert_eq!(es.len(), 3),
      other => panic!("expected disjunction, got {}", other),
    }
  }

  #[test]
  fn double_negation_cancels() {
    let e = x().lt(1);
    assert_eq!(!!e.clone(), e);
  }

  #[test]
  fn negation_complements_the_line() {
    let pre = (!x().le(0)).solve().unwrap();
    assert_eq!(pre, IntervalSet::from(Interval::ray_gt(0)));
  }

  #[test]
  fn conjunction_intersects() {
    let e = x().gt(0) & x().le(3);
    let pre = e.solve().unwrap();
    let expected = Interval::new(
      Bound::Fin(Scalar::from(0)),
      BoundKind::Exclusive,
      Bound::Fin(Scalar::from(3)),
      BoundKind::Inclusive,
    )
    .unwrap();
    assert_eq!(pre, IntervalSet::from(expected));
  }

  #[test]
  fn opposite_rays_cover_the_line() {
    let e = x().ge(0) | x().le(0);
    assert_eq!(e.solve().unwrap(), REALS.clone());
  }

  #[test]
  fn inverted_between_is_empty() {
    let e = x().between(5, 3);
    assert!(e.solve().unwrap().is_empty());
  }

  #[test]
  fn membership_in_finite_set() {
    let e = x().in_set(vec![Scalar::from(1), Scalar::from(4)]);
    let pre = e.solve().unwrap();
    assert!(pre.contains(&Scalar::from(1)));
    assert!(pre.contains(&Scalar::from(4)));
    assert!(!pre.contains(&Scalar::from(2)));
  }

  #[test]
  fn substitute_rewrites_through_env() {
    let mut env = HashMap::new();
    env.insert(v("y"), x().exp());
    // y < 5 with y = e^x becomes e^x < 5
    let e = Transform::var(v("y")).lt(5).substitute(&env);
    assert_eq!(e.symbols().into_iter().collect::<Vec<_>>(), vec![v("x")]);
    let pre = e.solve().unwrap();
    let ln5 = Scalar::log(&crate::scalar::Base::E, &Scalar::from(5)).unwrap();
    assert_eq!(pre, IntervalSet::from(Interval::ray_lt(ln5)));
  }

  #[test]
  fn display_forms() {
    assert_eq!(format!("{}", x().lt(3)), "x < 3");
    assert_eq!(format!("{}", x().ge(0) & x().lt(1)), "x ≥ 0 ∧ x < 1");
    assert_eq!(format!("{}", !x().eq_to(2)), "¬x = 2");
  }
}
