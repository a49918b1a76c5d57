use log::debug;

use crate::error::SolveError;
use crate::event::Event;
use crate::interval::IntervalSet;

/// Solves an event over its single free symbol. Events mentioning no
/// symbol have no solution space to report; events mentioning several
/// must first be factored per symbol.
pub fn solve_event(event: &Event) -> Result<IntervalSet, SolveError> {
  let symbols = event.symbols();
  if symbols.is_empty() {
    return Err(SolveError::UnsupportedExpression(format!("{}", event)));
  }
  if symbols.len() > 1 {
    return Err(SolveError::MultivariateExpression(format!("{}", event)));
  }
  let solution = event.solve()?;
  debug!("{}  ⟹  {}", event, solution);
  Ok(solution)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lang::v;
  use crate::transform::Transform;

  #[test]
  fn rejects_symbol_free_events() {
    let err = solve_event(&Event::Or(vec![])).unwrap_err();
    assert!(matches!(err, SolveError::UnsupportedExpression(_)));
  }

  #[test]
  fn rejects_multiple_symbols() {
    let e = Transform::var(v("a")).lt(1) & Transform::var(v("b")).gt(0);
    let err = solve_event(&e).unwrap_err();
    assert!(matches!(err, SolveError::MultivariateExpression(_)));
  }

  #[test]
  fn accepts_single_symbol() {
    let e = Transform::var(v("a")).lt(1) | Transform::var(v("a")).gt(2);
    assert_eq!(solve_event(&e).unwrap().intervals().len(), 2);
  }
}
