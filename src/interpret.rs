//! Compiles command programs to sum-product networks. Interpretation
//! threads an optional accumulator through the program: `Sample` joins
//! a fresh leaf onto it, and `IfElse` splits it into a mixture whose
//! weights are the exact probabilities of the branch guards.

use log::debug;

use crate::dnf::exclusive_events;
use crate::error::SpnError;
use crate::event::Event;
use crate::lang::{Command, Condition};
use crate::spn::Spn;

impl Command {
  /// Runs the command against an accumulated network. `None` means no
  /// variable has been sampled yet.
  pub fn interpret(&self, spn: Option<Spn>) -> Result<Option<Spn>, SpnError> {
    match self {
      Command::Skip => Ok(spn),
      Command::Sample(x, dist) => {
        let leaf = Spn::leaf(*x, dist.clone());
        match spn {
          None => Ok(Some(leaf)),
          Some(prior) => {
            if prior.get_symbols().contains(x) {
              return Err(SpnError::SymbolReuse(x.to_string()));
            }
            Ok(Some(Spn::product(vec![prior, leaf])?))
          }
        }
      }
      Command::Sequence(cs) => {
        let mut acc = spn;
        for c in cs {
          acc = c.interpret(acc)?;
        }
        Ok(acc)
      }
      Command::Repeat(lo, hi, f) => {
        let body: Vec<Command> = (*lo..*hi).map(|i| f(i)).collect();
        Command::Sequence(body).interpret(spn)
      }
      Command::IfElse(branches) => {
        let prior = spn.ok_or(SpnError::ConditionBeforeSample)?;
        let events = branch_events(branches)?;
        let mut children = vec![];
        let mut weights = vec![];
        for (event, (_, body)) in events.iter().zip(branches) {
          let w = prior.logprob(event)?;
          debug!("branch {} has log-weight {}", event, w);
          let conditioned = prior.condition(event)?;
          let child = body.interpret(Some(conditioned))?.ok_or_else(|| {
            SpnError::MalformedBranchList("branch body erased the state".into())
          })?;
          children.push(child);
          weights.push(w);
        }
        Ok(Some(Spn::sum(children, weights)?))
      }
    }
  }

  /// Interprets from an empty state and insists the program sampled
  /// something.
  pub fn run(&self) -> Result<Spn, SpnError> {
    self.interpret(None)?.ok_or(SpnError::EmptyProgram)
  }
}

/// One event per branch. A trailing `Otherwise` turns the guards into
/// the exclusive sequence g1, ¬g1 ∧ g2, .. with the all-negated
/// remainder last; without it the guards are used as written and must
/// already be exhaustive and pairwise disjoint.
fn branch_events(branches: &[(Condition, Command)]) -> Result<Vec<Event>, SpnError> {
  if branches.is_empty() {
    return Err(SpnError::MalformedBranchList("no branches".into()));
  }
  let mut guards = vec![];
  let mut has_else = false;
  for (i, (cond, _)) in branches.iter().enumerate() {
    match cond {
      Condition::When(e) => guards.push(e.clone()),
      Condition::Otherwise => {
        if i + 1 != branches.len() {
          return Err(SpnError::MalformedBranchList(
            "otherwise before the final branch".into(),
          ));
        }
        has_else = true;
      }
    }
  }
  if has_else {
    Ok(exclusive_events(&guards, true))
  } else {
    Ok(guards)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dist::BaseDist;
  use crate::lang::{v, variable_array};
  use crate::scalar::Scalar;
  use crate::transform::Transform;
  use crate::util::allclose;

  fn x() -> Transform {
    Transform::var(v("x"))
  }

  fn y() -> Transform {
    Transform::var(v("y"))
  }

  #[test]
  fn branch_weights_are_exact_guard_probabilities() {
    let program = Command::sample(v("x"), BaseDist::uniform(0, 10)).then(
      Command::IfElse(vec![
        (
          Condition::When(x().lt(2)),
          Command::Sample(v("y"), BaseDist::point(0)),
        ),
        (
          Condition::Otherwise,
          Command::Sample(v("y"), BaseDist::point(1)),
        ),
      ]),
    );
    let spn = program.run().unwrap();
    assert!(allclose(spn.logprob(&y().eq_to(0)).unwrap(), 0.2f64.ln()));
    assert!(allclose(spn.logprob(&y().eq_to(1)).unwrap(), 0.8f64.ln()));
    let joint = x().gt(5) & y().eq_to(1);
    assert!(allclose(spn.logprob(&joint).unwrap(), 0.5f64.ln()));
  }

  #[test]
  fn exhaustive_guards_cover_the_whole_mass() {
    let program = Command::sample(v("x"), BaseDist::uniform(0, 1)).then(
      Command::IfElse(vec![
        (Condition::When(x().lt(Scalar::rat(1, 3))), Command::Skip),
        (Condition::When(x().lt(Scalar::rat(2, 3))), Command::Skip),
        (Condition::Otherwise, Command::Skip),
      ]),
    );
    let spn = program.run().unwrap();
    assert!(allclose(spn.logprob(&Event::And(vec![])).unwrap(), 0.0));
    assert!(allclose(
      spn.logprob(&x().lt(Scalar::rat(1, 3))).unwrap(),
      (1.0f64 / 3.0).ln()
    ));
  }

  #[test]
  fn condition_before_sample_is_rejected() {
    let program = Command::IfElse(vec![(
      Condition::When(x().lt(0)),
      Command::Skip,
    )]);
    let err = program.run().unwrap_err();
    assert!(matches!(err, SpnError::ConditionBeforeSample));
  }

  #[test]
  fn otherwise_must_come_last() {
    let program = Command::sample(v("x"), BaseDist::uniform(0, 1)).then(
      Command::IfElse(vec![
        (Condition::Otherwise, Command::Skip),
        (Condition::When(x().lt(0)), Command::Skip),
      ]),
    );
    assert!(matches!(
      program.run().unwrap_err(),
      SpnError::MalformedBranchList(_)
    ));
    let empty = Command::sample(v("x"), BaseDist::uniform(0, 1))
      .then(Command::IfElse(vec![]));
    assert!(matches!(
      empty.run().unwrap_err(),
      SpnError::MalformedBranchList(_)
    ));
  }

  #[test]
  fn rebinding_a_symbol_is_rejected() {
    let program = Command::sample(v("x"), BaseDist::uniform(0, 1))
      .then(Command::Sample(v("x"), BaseDist::normal(0.0, 1.0)));
    assert!(matches!(
      program.run().unwrap_err(),
      SpnError::SymbolReuse(_)
    ));
  }

  #[test]
  fn repeat_unrolls_ascending_and_empty_range_is_identity() {
    let xs = variable_array("x", 3);
    let program = Command::repeat(0, 3, move |i| {
      Command::Sample(xs[i as usize], BaseDist::bernoulli(0.5))
    });
    let spn = program.run().unwrap();
    let symbols = spn.get_symbols();
    assert_eq!(symbols.len(), 3);
    assert!(symbols.contains(&v("x[0]")));
    assert!(symbols.contains(&v("x[2]")));

    let empty = Command::repeat(3, 3, |_| Command::Skip);
    assert!(matches!(empty.run().unwrap_err(), SpnError::EmptyProgram));
  }

  #[test]
  fn impossible_guard_without_point_support_is_fatal() {
    let program = Command::sample(v("x"), BaseDist::uniform(0, 1)).then(
      Command::IfElse(vec![
        (Condition::When(x().gt(2)), Command::Skip),
        (Condition::Otherwise, Command::Skip),
      ]),
    );
    assert!(matches!(
      program.run().unwrap_err(),
      SpnError::UnsatisfiableCondition(_)
    ));
  }

  #[test]
  fn point_guard_is_kept_with_vanishing_weight() {
    let program = Command::sample(v("x"), BaseDist::uniform(0, 1)).then(
      Command::IfElse(vec![
        (Condition::When(x().eq_to(Scalar::rat(1, 2))), Command::Skip),
        (Condition::Otherwise, Command::Skip),
      ]),
    );
    let spn = program.run().unwrap();
    assert!(allclose(spn.logprob(&Event::And(vec![])).unwrap(), 0.0));
    assert_eq!(
      spn.logprob(&x().eq_to(Scalar::rat(1, 2))).unwrap(),
      f64::NEG_INFINITY
    );
  }
}
