//! End-to-end checks of the event solver: transform chains compared
//! against constants, pulled back to exact interval sets.

use maplit::hashset;
use num::BigRational;
use test_log::test;

use sumprod::dnf::factor_dnf;
use sumprod::{
  solve_event, v, Base, Bound, Interval, IntervalSet, Poly, Scalar,
  SolveError, Transform, REALS,
};

fn x() -> Transform {
  Transform::var(v("x0"))
}

fn br(n: i64) -> BigRational {
  BigRational::from_integer(n.into())
}

fn e_to(n: i64) -> Scalar {
  Scalar::exp(&Base::E, &Scalar::rat(n, 1))
}

#[test]
fn log_above_a_constant_is_an_exponential_ray() {
  let sol = solve_event(&x().log().gt(2)).unwrap();
  assert_eq!(sol, IntervalSet::from(Interval::ray_gt(e_to(2))));
}

#[test]
fn contradictory_strict_bounds_are_empty() {
  let e = x().log().gt(2) & x().lt(e_to(2));
  assert!(solve_event(&e).unwrap().is_empty());
}

#[test]
fn weak_bounds_meet_in_a_single_point() {
  let e = x().log().ge(2) & x().le(e_to(2));
  assert_eq!(solve_event(&e).unwrap(), IntervalSet::point(e_to(2)));
}

#[test]
fn opposite_weak_rays_cover_the_line() {
  let e = x().ge(0) | x().le(0);
  assert_eq!(solve_event(&e).unwrap(), REALS.clone());
}

#[test]
fn affine_conjunction_is_an_open_interval() {
  let e = x().affine(br(2), br(10)).unwrap().lt(4)
    & x().affine(br(1), br(10)).unwrap().gt(3);
  let sol = solve_event(&e).unwrap();
  let expected = IntervalSet::from(Interval::open(-7, -3).unwrap());
  assert_eq!(sol, expected);
}

#[test]
fn quadratic_inequality_has_algebraic_endpoints() {
  let p = Poly::new(vec![br(0), br(-2), br(1)]);
  let e = x().poly(p).unwrap().gt(10);
  let sol = solve_event(&e).unwrap();

  // endpoints are the roots of x^2 - 2x - 10, i.e. 1 ± √11
  let roots = Poly::new(vec![br(-10), br(-2), br(1)]).real_roots();
  assert_eq!(roots.len(), 2);
  let lo = Scalar::from_root_loc(roots[0].clone());
  let hi = Scalar::from_root_loc(roots[1].clone());
  let expected = IntervalSet::new(vec![Interval::ray_lt(lo), Interval::ray_gt(hi)]);
  assert_eq!(sol, expected);

  let ends: Vec<f64> = sol
    .intervals()
    .iter()
    .flat_map(|iv| [&iv.lo, &iv.hi])
    .filter_map(|b| match b {
      Bound::Fin(s) => Some(s.approx()),
      _ => None,
    })
    .collect();
  assert!((ends[0] - (1.0 - 11.0f64.sqrt())).abs() < 1e-9);
  assert!((ends[1] - (1.0 + 11.0f64.sqrt())).abs() < 1e-9);
}

#[test]
fn polynomial_of_exponential_exceeds_the_kernel() {
  // (e^x)^2 - 2 e^x > 10 needs ln(1 + √11), which has no closed form
  // in the scalar kernel
  let chain = x()
    .exp()
    .poly(Poly::new(vec![br(0), br(-2), br(1)]))
    .unwrap();
  let err = solve_event(&chain.gt(10)).unwrap_err();
  assert!(matches!(err, SolveError::NotInvertible(_)));
}

#[test]
fn two_symbols_are_rejected() {
  let e = x().lt(3) & Transform::var(v("x1")).lt(3);
  let err = solve_event(&e).unwrap_err();
  assert!(matches!(err, SolveError::MultivariateExpression(_)));
}

#[test]
fn symbols_are_collected_across_the_tree() {
  let e = x().gt(3) & Transform::var(v("x1")).lt(4);
  assert_eq!(e.symbols(), hashset! {v("x0"), v("x1")});

  let e = Transform::var(v("x0")).exp().gt(10)
    & Transform::var(v("x1")).log().lt(4)
    & Transform::var(v("x2")).lt(4);
  assert_eq!(e.symbols(), hashset! {v("x0"), v("x1"), v("x2")});
}

#[test]
fn factoring_partitions_clauses_by_symbol() {
  let one_clause = x().exp().gt(0)
    & x().lt(10)
    & Transform::var(v("x1")).lt(10)
    & !Transform::var(v("x2")).in_set(vec![Scalar::rat(10, 1), Scalar::rat(11, 1)]);
  let dnf = factor_dnf(&one_clause);
  assert_eq!(dnf.len(), 1);
  let groups = &dnf[0];
  assert_eq!(groups.len(), 3);
  assert!(groups.contains_key(&v("x0")));
  assert!(groups.contains_key(&v("x1")));
  assert!(groups.contains_key(&v("x2")));

  let split = x().lt(1) & Transform::var(v("x4")).lt(1) & Transform::var(v("x5")).lt(1);
  let dnf = factor_dnf(&split);
  assert_eq!(dnf.len(), 1);
  assert_eq!(dnf[0].len(), 3);

  let disjunction = (x().exp().gt(0) & x().lt(10) & Transform::var(v("x1")).lt(10))
    | (Transform::var(v("x5")).log().gt(5) & Transform::var(v("x4")).in_set(vec![Scalar::rat(5, 1)]));
  let dnf = factor_dnf(&disjunction);
  assert_eq!(dnf.len(), 2);
  assert_eq!(
    dnf[0].keys().copied().collect::<std::collections::HashSet<_>>(),
    hashset! {v("x0"), v("x1")}
  );
  assert_eq!(
    dnf[1].keys().copied().collect::<std::collections::HashSet<_>>(),
    hashset! {v("x4"), v("x5")}
  );
}
