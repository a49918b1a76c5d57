use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use string_interner::{DefaultSymbol as Symbol, StringInterner};

use crate::dist::BaseDist;
use crate::event::Event;

thread_local! {
  pub static INTERNER: RefCell<StringInterner> = RefCell::new(StringInterner::default());
}

/// An interned variable symbol. Cheap to copy and compare; the name is
/// only resolved for display.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var(Symbol);

impl Var {
  pub fn new(t: impl Into<String>) -> Self {
    INTERNER.with(|interner| {
      let symbol = interner.borrow_mut().get_or_intern(t.into());
      Var(symbol)
    })
  }
}

pub fn v(t: impl Into<String>) -> Var {
  Var::new(t)
}

/// Symbols `token[0]`, ..., `token[n-1]` for indexed families of
/// variables, typically bound one per iteration of a `Repeat`.
pub fn variable_array(token: impl Into<String>, n: i64) -> Vec<Var> {
  let token = token.into();
  (0..n).map(|i| v(format!("{}[{}]", token, i))).collect()
}

impl fmt::Debug for Var {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    INTERNER.with(|interner| {
      let interner = interner.borrow();
      let s = interner.resolve(self.0).unwrap();
      write!(f, "{}", s)
    })
  }
}

impl fmt::Display for Var {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{:?}", self)
  }
}

/// A branch guard in an `IfElse`. `Otherwise` is only legal as the
/// final branch and denotes the complement of every earlier guard.
#[derive(Debug, Clone)]
pub enum Condition {
  When(Event),
  Otherwise,
}

/// The command language. Programs are built with these constructors
/// and compiled to a network by `Command::interpret`.
#[derive(Clone)]
pub enum Command {
  Skip,
  Sample(Var, BaseDist),
  Sequence(Vec<Command>),
  IfElse(Vec<(Condition, Command)>),
  Repeat(i64, i64, Rc<dyn Fn(i64) -> Command>),
}

impl Command {
  pub fn sample(x: Var, dist: BaseDist) -> Self {
    Command::Sequence(vec![Command::Sample(x, dist)])
  }

  /// Sequential composition, flattening nested sequences.
  pub fn then(self, next: Command) -> Self {
    let mut cs = match self {
      Command::Sequence(cs) => cs,
      c => vec![c],
    };
    match next {
      Command::Sequence(mut ds) => cs.append(&mut ds),
      d => cs.push(d),
    }
    Command::Sequence(cs)
  }

  pub fn repeat(lo: i64, hi: i64, body: impl Fn(i64) -> Command + 'static) -> Self {
    Command::Repeat(lo, hi, Rc::new(body))
  }
}

impl fmt::Debug for Command {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Command::Skip => write!(f, "skip"),
      Command::Sample(x, dist) => write!(f, "{} ~ {:?}", x, dist),
      Command::Sequence(cs) => {
        write!(f, "{{")?;
        for (i, c) in cs.iter().enumerate() {
          if i > 0 {
            write!(f, "; ")?;
          }
          write!(f, "{:?}", c)?;
        }
        write!(f, "}}")
      }
      Command::IfElse(branches) => {
        for (i, (cond, c)) in branches.iter().enumerate() {
          let kw = if i == 0 { "if" } else { "elif" };
          match cond {
            Condition::When(e) => write!(f, "{} {:?} {:?} ", kw, e, c)?,
            Condition::Otherwise => write!(f, "else {:?}", c)?,
          }
        }
        Ok(())
      }
      Command::Repeat(lo, hi, _) => write!(f, "repeat[{}, {})", lo, hi),
    }
  }
}
