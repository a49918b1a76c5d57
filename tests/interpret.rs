//! Whole programs through the interpreter: exact branch weights,
//! sequencing rules, and loop unrolling.

use test_log::test;

use sumprod::{
  allclose, v, variable_array, BaseDist, Command, Condition, Scalar, SpnError,
  Transform,
};

fn t(name: &str) -> Transform {
  Transform::var(v(name))
}

#[test]
fn diagnosis_posterior_is_exact() {
  let (disease, test_r) = (v("disease"), v("result"));
  let program = Command::sample(disease, BaseDist::bernoulli(0.001)).then(
    Command::IfElse(vec![
      (
        Condition::When(Transform::var(disease).eq_to(1)),
        Command::Sample(test_r, BaseDist::bernoulli(0.99)),
      ),
      (
        Condition::Otherwise,
        Command::Sample(test_r, BaseDist::bernoulli(0.05)),
      ),
    ]),
  );
  let spn = program.run().unwrap();

  let marginal: f64 = 0.001 * 0.99 + 0.999 * 0.05;
  let positive = Transform::var(test_r).eq_to(1);
  assert!(allclose(spn.logprob(&positive).unwrap(), marginal.ln()));

  let posterior = spn.condition(&positive).unwrap();
  let sick = Transform::var(disease).eq_to(1);
  assert!(allclose(
    posterior.logprob(&sick).unwrap(),
    (0.001 * 0.99 / marginal).ln()
  ));
}

#[test]
fn continuous_guard_splits_into_a_mixture() {
  let program = Command::sample(v("x"), BaseDist::normal(0.0, 1.0)).then(
    Command::IfElse(vec![
      (
        Condition::When(t("x").gt(0)),
        Command::Sample(v("y"), BaseDist::uniform(0, 1)),
      ),
      (
        Condition::Otherwise,
        Command::Sample(v("y"), BaseDist::uniform(-1, 0)),
      ),
    ]),
  );
  let spn = program.run().unwrap();
  assert!(allclose(spn.logprob(&t("y").gt(0)).unwrap(), 0.5f64.ln()));
  assert!(allclose(
    spn.logprob(&t("y").le(Scalar::rat(-1, 4))).unwrap(),
    0.375f64.ln()
  ));

  let cold = spn.condition(&t("y").le(Scalar::rat(-1, 4))).unwrap();
  assert!(allclose(cold.logprob(&t("x").le(0)).unwrap(), 0.0));
}

#[test]
fn sequencing_must_sample_before_branching() {
  let branch = Command::IfElse(vec![
    (Condition::When(t("x").gt(0)), Command::Skip),
    (Condition::Otherwise, Command::Skip),
  ]);
  let sample = Command::sample(v("x"), BaseDist::normal(0.0, 1.0));

  assert!(sample.clone().then(branch.clone()).run().is_ok());
  assert!(matches!(
    branch.then(sample).run().unwrap_err(),
    SpnError::ConditionBeforeSample
  ));
}

#[test]
fn repeat_matches_the_explicit_sequence() {
  let flips = variable_array("c", 3);
  let looped = Command::repeat(0, 3, move |i| {
    Command::Sample(flips[i as usize], BaseDist::bernoulli(0.5))
  })
  .run()
  .unwrap();

  let flips = variable_array("c", 3);
  let spelled = Command::sample(flips[0], BaseDist::bernoulli(0.5))
    .then(Command::Sample(flips[1], BaseDist::bernoulli(0.5)))
    .then(Command::Sample(flips[2], BaseDist::bernoulli(0.5)))
    .run()
    .unwrap();

  assert_eq!(looped.get_symbols(), spelled.get_symbols());

  let all_heads = Transform::var(flips[0]).eq_to(1)
    & Transform::var(flips[1]).eq_to(1)
    & Transform::var(flips[2]).eq_to(1);
  let a = looped.logprob(&all_heads).unwrap();
  let b = spelled.logprob(&all_heads).unwrap();
  assert!(allclose(a, b));
  assert!(allclose(a, 0.125f64.ln()));
}

#[test]
fn nested_branches_compound_the_weights() {
  let program = Command::sample(v("p"), BaseDist::uniform(0, 1)).then(
    Command::IfElse(vec![
      (
        Condition::When(t("p").le(Scalar::rat(4, 5))),
        Command::Sample(v("song"), BaseDist::point(1)),
      ),
      (
        Condition::Otherwise,
        Command::IfElse(vec![
          (
            Condition::When(t("p").le(Scalar::rat(19, 20))),
            Command::Sample(v("song"), BaseDist::point(2)),
          ),
          (
            Condition::Otherwise,
            Command::Sample(v("song"), BaseDist::point(3)),
          ),
        ]),
      ),
    ]),
  );
  let spn = program.run().unwrap();

  assert!(allclose(spn.logprob(&t("song").eq_to(1)).unwrap(), 0.8f64.ln()));
  assert!(allclose(spn.logprob(&t("song").eq_to(2)).unwrap(), 0.15f64.ln()));
  assert!(allclose(spn.logprob(&t("song").eq_to(3)).unwrap(), 0.05f64.ln()));

  let second = spn.condition(&t("song").eq_to(2)).unwrap();
  assert!(allclose(
    second.logprob(&t("p").le(Scalar::rat(9, 10))).unwrap(),
    (2.0f64 / 3.0).ln()
  ));
}

#[test]
fn poisson_guard_weights_are_exact() {
  let program = Command::sample(v("n"), BaseDist::poisson(2.0)).then(
    Command::IfElse(vec![
      (
        Condition::When(t("n").le(1)),
        Command::Sample(v("m"), BaseDist::point(0)),
      ),
      (
        Condition::Otherwise,
        Command::Sample(v("m"), BaseDist::point(1)),
      ),
    ]),
  );
  let spn = program.run().unwrap();

  // P(N <= 1) = 3 e^{-2}
  assert!(allclose(
    spn.logprob(&t("m").eq_to(0)).unwrap().exp(),
    3.0 * (-2.0f64).exp()
  ));

  // P(N >= 5, M = 1) = 1 - 7 e^{-2}
  let joint = t("n").ge(5) & t("m").eq_to(1);
  assert!(allclose(
    spn.logprob(&joint).unwrap().exp(),
    1.0 - 7.0 * (-2.0f64).exp()
  ));
}
