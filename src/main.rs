use anyhow::{bail, Result};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use sumprod::{v, BaseDist, Command, Condition, Poly, Scalar, Transform};

fn main() -> Result<()> {
  let args: Vec<String> = std::env::args().skip(1).collect();
  let verbose = args.iter().any(|a| a == "-v" || a == "--verbose");
  let model = args
    .iter()
    .find(|a| !a.starts_with('-'))
    .map(String::as_str)
    .unwrap_or("diagnosis");

  simplelog::TermLogger::init(
    if verbose {
      simplelog::LevelFilter::Debug
    } else {
      simplelog::LevelFilter::Info
    },
    simplelog::Config::default(),
    simplelog::TerminalMode::Mixed,
    simplelog::ColorChoice::Auto,
  )?;

  match model {
    "diagnosis" => diagnosis(),
    "squares" => squares(),
    other => bail!("unknown model `{}` (try: diagnosis, squares)", other),
  }
}

/// A rare condition and an imperfect test for it. The interpreter turns
/// the branch on `disease` into a two-component mixture over `test`,
/// and conditioning on a positive result gives the exact posterior.
fn diagnosis() -> Result<()> {
  let (disease, test) = (v("disease"), v("test"));
  let program = Command::sample(disease, BaseDist::bernoulli(0.001)).then(
    Command::IfElse(vec![
      (
        Condition::When(Transform::var(disease).eq_to(1)),
        Command::Sample(test, BaseDist::bernoulli(0.99)),
      ),
      (
        Condition::Otherwise,
        Command::Sample(test, BaseDist::bernoulli(0.05)),
      ),
    ]),
  );
  let spn = program.run()?;
  info!("network: {}", spn);

  let positive = Transform::var(test).eq_to(1);
  info!("P(test = 1) = {:.6}", spn.logprob(&positive)?.exp());

  let posterior = spn.condition(&positive)?;
  let sick = Transform::var(disease).eq_to(1);
  info!(
    "P(disease = 1 | test = 1) = {:.6}",
    posterior.logprob(&sick)?.exp()
  );

  let mut rng = StdRng::seed_from_u64(0);
  for _ in 0..5 {
    let draw = posterior.sample(&mut rng);
    info!("posterior draw: disease = {}", draw[&disease]);
  }
  Ok(())
}

/// A standard normal pushed through y = x², queried through the exact
/// preimage solver.
fn squares() -> Result<()> {
  let (x, y) = (v("x"), v("y"));
  let square = || Transform::var(x).poly(Poly::from_i64(&[0, 0, 1]));
  let spn = Command::sample(x, BaseDist::normal(0.0, 1.0)).run()?;
  let spn = spn.transform(y, &square()?)?;
  info!("network: {}", spn);

  for c in 1..4 {
    let within = Transform::var(y).le(c);
    info!("P(x² ≤ {}) = {:.6}", c, spn.logprob(&within)?.exp());
  }

  let tail = Transform::var(y).gt(4) & Transform::var(x).gt(0);
  info!("P(x² > 4, x > 0) = {:.6}", spn.logprob(&tail)?.exp());

  let band = square()?.between(Scalar::rat(1, 4), Scalar::rat(9, 4));
  info!(
    "solve ¼ ≤ x² ≤ 9/4  ⟹  {}",
    sumprod::solve_event(&band)?
  );
  Ok(())
}
