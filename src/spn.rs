use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::fmt;

use num::BigRational;

use crate::dist::BaseDist;
use crate::dnf::{disjoint_clauses, factor_clause, to_dnf};
use crate::error::SpnError;
use crate::event::Event;
use crate::interval::{Bound, IntervalSet};
use crate::lang::Var;
use crate::scalar::Scalar;
use crate::transform::Transform;
use crate::util::logsumexp;

/// A leaf holds one base variable, its distribution restricted to a
/// support region, and the chains for every variable derived from it.
/// `logz` is the log-mass the unrestricted distribution puts on the
/// support, so conditional queries renormalize against it.
#[derive(Debug, Clone)]
pub struct Leaf {
  pub symbol: Var,
  pub dist: BaseDist,
  pub support: IntervalSet,
  pub logz: f64,
  pub env: HashMap<Var, Transform>,
}

impl Leaf {
  pub fn new(symbol: Var, dist: BaseDist) -> Leaf {
    let support = dist.support();
    Leaf {
      symbol,
      dist,
      support,
      logz: 0.0,
      env: HashMap::new(),
    }
  }
}

/// Sum-product network over leaf distributions. Products factor over
/// disjoint variable sets; sums mix children over the same variables
/// with log-space weights.
#[derive(Debug, Clone)]
pub enum Spn {
  Leaf(Leaf),
  Product(Vec<Spn>),
  Sum {
    children: Vec<Spn>,
    log_weights: Vec<f64>,
  },
}

impl Spn {
  pub fn leaf(symbol: Var, dist: BaseDist) -> Spn {
    Spn::Leaf(Leaf::new(symbol, dist))
  }

  /// Joins independent components, flattening nested products.
  pub fn product(children: Vec<Spn>) -> Result<Spn, SpnError> {
    let mut flat = vec![];
    for c in children {
      match c {
        Spn::Product(cs) => flat.extend(cs),
        other => flat.push(other),
      }
    }
    if flat.is_empty() {
      return Err(SpnError::MalformedBranchList("empty product".into()));
    }
    let mut seen: HashSet<Var> = HashSet::new();
    for c in &flat {
      for s in c.get_symbols() {
        if !seen.insert(s) {
          return Err(SpnError::SymbolReuse(s.to_string()));
        }
      }
    }
    if flat.len() == 1 {
      return Ok(flat.remove(0));
    }
    Ok(Spn::Product(flat))
  }

  /// Mixes children carrying identical variable sets.
  pub fn sum(children: Vec<Spn>, log_weights: Vec<f64>) -> Result<Spn, SpnError> {
    if children.is_empty() || children.len() != log_weights.len() {
      return Err(SpnError::MalformedBranchList(format!(
        "{} children with {} weights",
        children.len(),
        log_weights.len()
      )));
    }
    if children.len() == 1 {
      let mut children = children;
      return Ok(children.remove(0));
    }
    let first = children[0].get_symbols();
    for c in &children[1..] {
      if c.get_symbols() != first {
        return Err(SpnError::MalformedBranchList(
          "mixture children bind different variables".into(),
        ));
      }
    }
    Ok(Spn::Sum {
      children,
      log_weights,
    })
  }

  pub fn get_symbols(&self) -> HashSet<Var> {
    match self {
      Spn::Leaf(l) => {
        let mut out: HashSet<Var> = l.env.keys().copied().collect();
        out.insert(l.symbol);
        out
      }
      Spn::Product(cs) => cs.iter().flat_map(|c| c.get_symbols()).collect(),
      Spn::Sum { children, .. } => {
        children.iter().flat_map(|c| c.get_symbols()).collect()
      }
    }
  }

  /// Log-probability of an event under the network.
  pub fn logprob(&self, event: &Event) -> Result<f64, SpnError> {
    match self {
      Spn::Leaf(l) => leaf_logprob(l, event),
      Spn::Sum {
        children,
        log_weights,
      } => {
        let mut terms = vec![];
        for (c, w) in children.iter().zip(log_weights) {
          terms.push(w + c.logprob(event)?);
        }
        Ok(logsumexp(&terms))
      }
      Spn::Product(children) => {
        let clauses = disjoint_clauses(&to_dnf(event));
        let mut terms = vec![];
        for clause in &clauses {
          terms.push(product_clause_logprob(children, clause)?);
        }
        Ok(logsumexp(&terms))
      }
    }
  }

  /// Restricts the network to an event, renormalizing every piece.
  pub fn condition(&self, event: &Event) -> Result<Spn, SpnError> {
    match self {
      Spn::Leaf(l) => Ok(Spn::Leaf(leaf_condition(l, event)?)),
      Spn::Sum {
        children,
        log_weights,
      } => {
        let mut kept = vec![];
        let mut weights = vec![];
        for (c, w) in children.iter().zip(log_weights) {
          match c.condition(event) {
            Ok(cc) => {
              let lp = c.logprob(event)?;
              if lp > f64::NEG_INFINITY {
                kept.push(cc);
                weights.push(w + lp);
              }
            }
            Err(SpnError::UnsatisfiableCondition(_)) => continue,
            Err(e) => return Err(e),
          }
        }
        if kept.is_empty() {
          return Err(SpnError::UnsatisfiableCondition(format!("{}", event)));
        }
        let z = logsumexp(&weights);
        let weights = weights.into_iter().map(|w| w - z).collect();
        Spn::sum(kept, weights)
      }
      Spn::Product(children) => {
        let clauses = disjoint_clauses(&to_dnf(event));
        let mut pieces = vec![];
        'clause: for clause in &clauses {
          let factored = factor_clause(clause);
          for (sym, _) in &factored {
            if !children.iter().any(|c| c.get_symbols().contains(sym)) {
              return Err(SpnError::SymbolReuse(sym.to_string()));
            }
          }
          let mut new_children = vec![];
          let mut weight = 0.0;
          for child in children {
            let owned: Vec<&Event> = factored
              .iter()
              .filter(|(sym, _)| child.get_symbols().contains(sym))
              .map(|(_, e)| e)
              .collect();
            if owned.is_empty() {
              new_children.push(child.clone());
              continue;
            }
            let e = conjoin(owned);
            weight += child.logprob(&e)?;
            match child.condition(&e) {
              Ok(cc) => new_children.push(cc),
              Err(SpnError::UnsatisfiableCondition(_)) => continue 'clause,
              Err(err) => return Err(err),
            }
          }
          pieces.push((weight, Spn::Product(new_children)));
        }
        let live: Vec<&(f64, Spn)> =
          pieces.iter().filter(|(w, _)| *w > f64::NEG_INFINITY).collect();
        if live.len() == 1 {
          return Ok(live[0].1.clone());
        }
        if !live.is_empty() {
          let raw: Vec<f64> = live.iter().map(|(w, _)| *w).collect();
          let z = logsumexp(&raw);
          return Spn::sum(
            live.iter().map(|(_, c)| c.clone()).collect(),
            raw.into_iter().map(|w| w - z).collect(),
          );
        }
        // every piece has zero mass; a single degenerate piece can
        // still stand on its own (a point condition, for instance)
        let mut pieces = pieces;
        match pieces.len() {
          1 => Ok(pieces.remove(0).1),
          _ => Err(SpnError::UnsatisfiableCondition(format!("{}", event))),
        }
      }
    }
  }

  /// Introduces `var` as a deterministic function of an existing
  /// variable. The new name must be fresh.
  pub fn transform(&self, var: Var, chain: &Transform) -> Result<Spn, SpnError> {
    let symbols = self.get_symbols();
    if symbols.contains(&var) {
      return Err(SpnError::SymbolReuse(var.to_string()));
    }
    if !symbols.contains(&chain.symbol()) {
      return Err(SpnError::SymbolReuse(chain.symbol().to_string()));
    }
    self.transform_inner(var, chain)
  }

  fn transform_inner(&self, var: Var, chain: &Transform) -> Result<Spn, SpnError> {
    match self {
      Spn::Leaf(l) => {
        let base = chain.symbol();
        let resolved = if base == l.symbol {
          chain.clone()
        } else {
          match l.env.get(&base) {
            Some(inner) => chain.substitute(inner),
            None => return Err(SpnError::SymbolReuse(base.to_string())),
          }
        };
        let mut env = l.env.clone();
        env.insert(var, resolved);
        Ok(Spn::Leaf(Leaf {
          symbol: l.symbol,
          dist: l.dist.clone(),
          support: l.support.clone(),
          logz: l.logz,
          env,
        }))
      }
      Spn::Product(children) => {
        let mut out = vec![];
        for c in children {
          if c.get_symbols().contains(&chain.symbol()) {
            out.push(c.transform_inner(var, chain)?);
          } else {
            out.push(c.clone());
          }
        }
        Ok(Spn::Product(out))
      }
      Spn::Sum {
        children,
        log_weights,
      } => {
        let mut out = vec![];
        for c in children {
          out.push(c.transform_inner(var, chain)?);
        }
        Ok(Spn::Sum {
          children: out,
          log_weights: log_weights.clone(),
        })
      }
    }
  }

  /// Draws one joint assignment, including every derived variable.
  pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> HashMap<Var, f64> {
    let mut out = HashMap::new();
    self.sample_into(rng, &mut out);
    out
  }

  fn sample_into<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut HashMap<Var, f64>) {
    match self {
      Spn::Leaf(l) => {
        let x = sample_leaf(l, rng);
        out.insert(l.symbol, x);
        for (var, chain) in &l.env {
          out.insert(*var, chain.apply(x));
        }
      }
      Spn::Product(children) => {
        for c in children {
          c.sample_into(rng, out);
        }
      }
      Spn::Sum {
        children,
        log_weights,
      } => {
        let u = rng.gen::<f64>();
        let mut acc = 0.0;
        for (c, w) in children.iter().zip(log_weights) {
          acc += w.exp();
          if u < acc {
            c.sample_into(rng, out);
            return;
          }
        }
        if let Some(c) = children.last() {
          c.sample_into(rng, out);
        }
      }
    }
  }
}

fn conjoin(events: Vec<&Event>) -> Event {
  if events.len() == 1 {
    events[0].clone()
  } else {
    Event::And(events.into_iter().cloned().collect())
  }
}

fn leaf_logprob(l: &Leaf, event: &Event) -> Result<f64, SpnError> {
  let e = event.substitute(&l.env);
  for s in e.symbols() {
    if s != l.symbol {
      return Err(SpnError::SymbolReuse(s.to_string()));
    }
  }
  let sol = e.solve()?.intersect(&l.support);
  Ok(l.dist.logprob(&sol) - l.logz)
}

fn leaf_condition(l: &Leaf, event: &Event) -> Result<Leaf, SpnError> {
  let e = event.substitute(&l.env);
  for s in e.symbols() {
    if s != l.symbol {
      return Err(SpnError::SymbolReuse(s.to_string()));
    }
  }
  let sol = e.solve()?.intersect(&l.support);
  if sol.is_empty() {
    return Err(SpnError::UnsatisfiableCondition(format!("{}", event)));
  }
  let mass = l.dist.logprob(&sol);
  if mass == f64::NEG_INFINITY {
    // a measure-zero slice collapses to the point it pins down
    if let [iv] = sol.intervals() {
      if iv.is_point() {
        if let Bound::Fin(at) = &iv.lo {
          return Ok(Leaf {
            symbol: l.symbol,
            dist: BaseDist::PointMass { at: at.clone() },
            support: sol.clone(),
            logz: 0.0,
            env: l.env.clone(),
          });
        }
      }
    }
    return Err(SpnError::UnsatisfiableCondition(format!("{}", event)));
  }
  Ok(Leaf {
    symbol: l.symbol,
    dist: l.dist.clone(),
    support: sol,
    logz: mass,
    env: l.env.clone(),
  })
}

fn product_clause_logprob(children: &[Spn], clause: &[Event]) -> Result<f64, SpnError> {
  let factored = factor_clause(clause);
  let mut lp = 0.0;
  for (sym, e) in &factored {
    let child = children
      .iter()
      .find(|c| c.get_symbols().contains(sym))
      .ok_or_else(|| SpnError::SymbolReuse(sym.to_string()))?;
    lp += child.logprob(e)?;
  }
  Ok(lp)
}

fn sample_leaf<R: Rng + ?Sized>(l: &Leaf, rng: &mut R) -> f64 {
  match &l.dist {
    BaseDist::PointMass { at } => at.approx(),
    BaseDist::Atomic { atoms } => sample_atoms(atoms, &l.support, rng),
    BaseDist::Bernoulli { p } => {
      let atoms = vec![(Scalar::zero(), 1.0 - p), (Scalar::one(), *p)];
      sample_atoms(&atoms, &l.support, rng)
    }
    dist => loop {
      let x = dist.sample(rng);
      if let Some(r) = BigRational::from_float(x) {
        if l.support.contains(&Scalar::from(r)) {
          return x;
        }
      }
    },
  }
}

fn sample_atoms<R: Rng + ?Sized>(
  atoms: &[(Scalar, f64)],
  support: &IntervalSet,
  rng: &mut R,
) -> f64 {
  let live: Vec<&(Scalar, f64)> =
    atoms.iter().filter(|(s, _)| support.contains(s)).collect();
  let total: f64 = live.iter().map(|(_, w)| w).sum();
  let mut u = rng.gen::<f64>() * total;
  for (s, w) in &live {
    if u < *w {
      return s.approx();
    }
    u -= w;
  }
  live.last().map(|(s, _)| s.approx()).unwrap_or(f64::NAN)
}

impl fmt::Display for Spn {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Spn::Leaf(l) => write!(f, "{} ~ {} ∣ {}", l.symbol, l.dist, l.support),
      Spn::Product(cs) => {
        write!(f, "(")?;
        for (i, c) in cs.iter().enumerate() {
          if i > 0 {
            write!(f, " ⊗ ")?;
          }
          write!(f, "{}", c)?;
        }
        write!(f, ")")
      }
      Spn::Sum {
        children,
        log_weights,
      } => {
        write!(f, "(")?;
        for (i, (c, w)) in children.iter().zip(log_weights).enumerate() {
          if i > 0 {
            write!(f, " ⊕ ")?;
          }
          write!(f, "{:.4}·[{}]", w.exp(), c)?;
        }
        write!(f, ")")
      }
    }
  }
}
