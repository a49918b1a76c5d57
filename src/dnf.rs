use std::collections::HashMap;

use crate::event::Event;
use crate::lang::Var;

/// Negation normal form: `Not` pushed down to the elementary events.
fn nnf(e: &Event) -> Event {
  match e {
    Event::Between(..) => e.clone(),
    Event::And(es) => Event::And(es.iter().map(nnf).collect()),
    Event::Or(es) => Event::Or(es.iter().map(nnf).collect()),
    Event::Not(inner) => nnf_neg(inner),
  }
}

fn nnf_neg(e: &Event) -> Event {
  match e {
    Event::Between(..) => Event::Not(Box::new(e.clone())),
    Event::Not(inner) => nnf(inner),
    Event::And(es) => Event::Or(es.iter().map(nnf_neg).collect()),
    Event::Or(es) => Event::And(es.iter().map(nnf_neg).collect()),
  }
}

/// Clauses of the disjunctive normal form. Each clause is a
/// conjunction of literals: elementary events or their negations.
pub fn to_dnf(e: &Event) -> Vec<Vec<Event>> {
  fn go(e: &Event) -> Vec<Vec<Event>> {
    match e {
      Event::Between(..) | Event::Not(_) => vec![vec![e.clone()]],
      Event::Or(es) => es.iter().flat_map(go).collect(),
      Event::And(es) => {
        let mut clauses: Vec<Vec<Event>> = vec![vec![]];
        for child in es {
          let mut next = vec![];
          for sub in go(child) {
            for clause in &clauses {
              let mut merged = clause.clone();
              merged.extend(sub.iter().cloned());
              next.push(merged);
            }
          }
          clauses = next;
        }
        clauses
      }
    }
  }
  go(&nnf(e))
}

fn literal_symbol(e: &Event) -> Option<Var> {
  e.symbols().into_iter().next()
}

/// Groups a clause's literals by symbol, one conjunction per variable.
pub fn factor_clause(clause: &[Event]) -> HashMap<Var, Event> {
  let mut by: HashMap<Var, Vec<Event>> = HashMap::new();
  for lit in clause {
    if let Some(sym) = literal_symbol(lit) {
      by.entry(sym).or_default().push(lit.clone());
    }
  }
  by.into_iter()
    .map(|(sym, mut es)| {
      let e = if es.len() == 1 {
        es.remove(0)
      } else {
        Event::And(es)
      };
      (sym, e)
    })
    .collect()
}

pub fn factor_dnf(e: &Event) -> Vec<HashMap<Var, Event>> {
  to_dnf(e).iter().map(|c| factor_clause(c)).collect()
}

fn negate_literal(e: &Event) -> Event {
  match e {
    Event::Not(inner) => (**inner).clone(),
    other => Event::Not(Box::new(other.clone())),
  }
}

/// Rewrites a clause list into an equivalent pairwise-disjoint one.
/// Clause i is conjoined with the negation of every earlier clause,
/// and each negated conjunction l1 ∧ .. ∧ lk is expanded as the
/// disjoint pieces ¬l1, l1 ∧ ¬l2, .., l1 ∧ .. ∧ ¬lk.
pub fn disjoint_clauses(clauses: &[Vec<Event>]) -> Vec<Vec<Event>> {
  let mut out = vec![];
  let mut prior: Vec<&Vec<Event>> = vec![];
  for clause in clauses {
    let mut pieces = vec![clause.clone()];
    for guard in &prior {
      let mut next = vec![];
      for piece in &pieces {
        for k in 0..guard.len() {
          let mut ext = piece.clone();
          ext.extend(guard[..k].iter().cloned());
          ext.push(negate_literal(&guard[k]));
          next.push(ext);
        }
      }
      pieces = next;
    }
    out.extend(pieces);
    prior.push(clause);
  }
  out
}

/// Branch guards g1, .., gn become the mutually exclusive events
/// g1, ¬g1 ∧ g2, .., plus the all-negated remainder when a final
/// else branch is present.
pub fn exclusive_events(guards: &[Event], include_else: bool) -> Vec<Event> {
  let mut out = vec![];
  for (i, g) in guards.iter().enumerate() {
    let mut parts: Vec<Event> = guards[..i].iter().map(negate_literal).collect();
    parts.push(g.clone());
    out.push(if parts.len() == 1 {
      parts.remove(0)
    } else {
      Event::And(parts)
    });
  }
  if include_else {
    let mut parts: Vec<Event> = guards.iter().map(negate_literal).collect();
    out.push(match parts.len() {
      0 => Event::And(vec![]),
      1 => parts.remove(0),
      _ => Event::And(parts),
    });
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::interval::IntervalSet;
  use crate::lang::v;
  use crate::scalar::Scalar;
  use crate::transform::Transform;

  fn x() -> Transform {
    Transform::var(v("x"))
  }

  fn y() -> Transform {
    Transform::var(v("y"))
  }

  #[test]
  fn dnf_distributes_and_over_or() {
    // a ∧ (b ∨ c) has clauses {a, b} and {a, c}
    let e = x().lt(1) & (y().gt(2) | y().lt(0));
    let clauses = to_dnf(&e);
    assert_eq!(clauses.len(), 2);
    assert_eq!(clauses[0].len(), 2);
    assert_eq!(clauses[1].len(), 2);
  }

  #[test]
  fn de_morgan_through_nnf() {
    let e = !(x().lt(1) & y().gt(2));
    let clauses = to_dnf(&e);
    assert_eq!(clauses.len(), 2);
    assert_eq!(clauses[0], vec![negate_literal(&x().lt(1))]);
    assert_eq!(clauses[1], vec![negate_literal(&y().gt(2))]);
  }

  #[test]
  fn factoring_groups_by_symbol() {
    let e = (x().lt(1) & y().ge(2) & x().gt(-1)) | x().gt(5);
    let factored = factor_dnf(&e);
    assert_eq!(factored.len(), 2);
    assert_eq!(factored[0].len(), 2);
    match &factored[0][&v("x")] {
      Event::And(es) => assert_eq!(es.len(), 2),
      other => panic!("expected conjunction for x, got {}", other),
    }
    assert_eq!(factored[1].len(), 1);
    assert!(factored[1].contains_key(&v("x")));
  }

  #[test]
  fn disjoint_expansion_covers_without_overlap() {
    // x < 2 and x < 5 overlap; the expansion splits off [2, 5)
    let clauses = vec![vec![x().lt(2)], vec![x().lt(5)]];
    let pieces = disjoint_clauses(&clauses);
    assert_eq!(pieces.len(), 2);
    let solved: Vec<IntervalSet> = pieces
      .iter()
      .map(|c| Event::And(c.clone()).solve().unwrap())
      .collect();
    assert!(solved[0].contains(&Scalar::from(0)));
    assert!(solved[1].contains(&Scalar::from(3)));
    assert!(!solved[1].contains(&Scalar::from(0)));
    assert!(solved[0].intersect(&solved[1]).is_empty());
    let both = solved[0].union(&solved[1]);
    assert_eq!(both, Event::Or(vec![x().lt(2), x().lt(5)]).solve().unwrap());
  }

  #[test]
  fn three_way_guards_are_mutually_exclusive() {
    let guards = vec![x().lt(0), x().lt(3)];
    let events = exclusive_events(&guards, true);
    assert_eq!(events.len(), 3);
    let solved: Vec<IntervalSet> = events.iter().map(|e| e.solve().unwrap()).collect();
    for i in 0..solved.len() {
      for j in i + 1..solved.len() {
        assert!(solved[i].intersect(&solved[j]).is_empty());
      }
    }
    let mut whole = IntervalSet::empty();
    for s in &solved {
      whole = whole.union(s);
    }
    assert_eq!(whole, crate::interval::REALS.clone());
  }

  #[test]
  fn no_else_covers_only_the_guards() {
    let guards = vec![x().lt(0)];
    let events = exclusive_events(&guards, false);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], x().lt(0));
  }
}
