//! Compiles imperative probabilistic programs into sum-product networks
//! that answer probability queries in closed form.
//!
//! Programs are command trees built with [`Command`]; [`Command::run`]
//! interprets one into an [`Spn`]. Queries are [`Event`] predicates over
//! [`Transform`] chains of a single variable, solved to exact
//! [`IntervalSet`]s and measured by the leaf distributions, so branch
//! weights and conditional probabilities come out exact up to the final
//! log-space float.

mod dist;
pub mod dnf;
mod error;
mod event;
mod interpret;
mod interval;
mod lang;
mod poly;
mod scalar;
mod solver;
mod spn;
mod transform;
mod util;

pub use dist::BaseDist;
pub use error::{SolveError, SpnError};
pub use event::Event;
pub use interval::{Bound, BoundKind, Interval, IntervalSet, REALS, REALS_POS};
pub use lang::{v, variable_array, Command, Condition, Var};
pub use poly::{Poly, RootLoc};
pub use scalar::{Base, Scalar};
pub use solver::solve_event;
pub use spn::{Leaf, Spn};
pub use transform::Transform;
pub use util::allclose;

#[test]
fn smoke() {
  let x = v("x");
  let program = Command::sample(x, BaseDist::uniform(0, 1)).then(Command::IfElse(vec![
    (
      Condition::When(Transform::var(x).lt(Scalar::rat(1, 2))),
      Command::Sample(v("flip"), BaseDist::bernoulli(0.25)),
    ),
    (
      Condition::Otherwise,
      Command::Sample(v("flip"), BaseDist::bernoulli(0.75)),
    ),
  ]));
  let spn = program.run().unwrap();
  let heads = Transform::var(v("flip")).eq_to(1);
  assert!(allclose(spn.logprob(&heads).unwrap(), 0.5f64.ln()));
  let posterior = spn.condition(&heads).unwrap();
  let low = Transform::var(x).lt(Scalar::rat(1, 2));
  assert!(allclose(posterior.logprob(&low).unwrap(), 0.25f64.ln()));
}
