use thiserror::Error;

/// Failures of the symbolic solver layer: a predicate (or the transform
/// chain inside it) has no exact solution this kernel can express.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SolveError {
  #[error("expression references more than one symbol: {0}")]
  MultivariateExpression(String),

  #[error("expression has no solvable structure: {0}")]
  UnsupportedExpression(String),

  #[error("no closed-form solution: {0}")]
  NotInvertible(String),

  #[error("malformed transform: {0}")]
  MalformedTransform(String),
}

/// Failures of network construction and querying.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpnError {
  #[error("symbol {0} is already bound or not bound where required")]
  SymbolReuse(String),

  #[error("conditioning event has zero probability: {0}")]
  UnsatisfiableCondition(String),

  #[error("malformed branch list: {0}")]
  MalformedBranchList(String),

  #[error("if-else branch condition evaluated before any sample statement")]
  ConditionBeforeSample,

  #[error("program contains no sample statements")]
  EmptyProgram,

  #[error(transparent)]
  Solve(#[from] SolveError),
}
