use std::sync::Arc;

use super::eval::{build_context, invoke_prim, Evaluator, RewriteObserver};
use super::{Command, Context, Pattern, Program, Term, Ty, Value};
use crate::util::error::ErrorKind;

fn int_list(values: &[i64]) -> Value {
    let mut res = Value::ind("nil", Value::Unit);
    for v in values.iter().rev() {
        res = Value::ind("cons", Value::Tuple(vec![Value::Int(*v), res]));
    }
    res
}

#[test]
fn test_prim_ops() {
    assert_eq!(invoke_prim("+", &[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));
    assert_eq!(invoke_prim("<=", &[Value::Int(2), Value::Int(2)]).unwrap(), Value::Bool(true));
    assert_eq!(
        invoke_prim("and", &[Value::Bool(true), Value::Bool(false)]).unwrap(),
        Value::Bool(false)
    );
    let err = invoke_prim("/", &[Value::Int(1), Value::Int(0)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Eval);
    // An arity mismatch is a semantic fault, never a panic.
    let err = invoke_prim("==", &[Value::Int(1)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Eval);
}

#[test]
fn test_eval_if_and_tuple() {
    let mut eval = Evaluator::new();
    let ctx = Context::empty();
    let term = Arc::new(Term::If(
        Term::prim("<", vec![Term::int(1), Term::int(2)]),
        Arc::new(Term::Tuple(vec![Term::int(7), Term::int(2)])),
        Term::value(Value::Unit),
    ));
    let res = eval.eval(&term, &ctx).unwrap();
    assert_eq!(res, Value::Tuple(vec![Value::Int(7), Value::Int(2)]));

    let proj = Arc::new(Term::Proj(Term::value(res), 1, 2));
    assert_eq!(eval.eval(&proj, &ctx).unwrap(), Value::Int(2));
}

#[test]
fn test_eval_recursive_let() {
    // let rec f = fun n -> if n <= 0 then 0 else n + f (n - 1) in f 4
    let body = Arc::new(Term::If(
        Term::prim("<=", vec![Term::var("n"), Term::int(0)]),
        Term::int(0),
        Term::prim(
            "+",
            vec![
                Term::var("n"),
                Term::app(Term::var("f"), Term::prim("-", vec![Term::var("n"), Term::int(1)])),
            ],
        ),
    ));
    let term = Arc::new(Term::Let {
        name: "f".to_string(),
        is_rec: true,
        def: Term::func("n", body),
        body: Term::app(Term::var("f"), Term::int(4)),
    });
    let mut eval = Evaluator::new();
    assert_eq!(eval.eval(&term, &Context::empty()).unwrap(), Value::Int(10));
}

#[test]
fn test_match_list() {
    let cases = vec![
        (Pattern::Cons("nil".to_string(), Box::new(Pattern::Wildcard)), Term::int(-1)),
        (
            Pattern::Cons(
                "cons".to_string(),
                Box::new(Pattern::Tuple(vec![Pattern::var("h"), Pattern::var("t")])),
            ),
            Term::var("h"),
        ),
    ];
    let term = Arc::new(Term::Match(Term::value(int_list(&[3, 1])), cases));
    let mut eval = Evaluator::new();
    assert_eq!(eval.eval(&term, &Context::empty()).unwrap(), Value::Int(3));
}

#[test]
fn test_label_unlabel() {
    let mut eval = Evaluator::new();
    let ctx = Context::empty();
    let labeled = Arc::new(Term::Label(0, Term::int(5)));
    assert_eq!(eval.eval(&labeled, &ctx).unwrap(), Value::compress(0, Value::Int(5)));

    let round = Arc::new(Term::Unlabel(0, labeled.clone()));
    assert_eq!(eval.eval(&round, &ctx).unwrap(), Value::Int(5));

    let bad = Arc::new(Term::Unlabel(1, labeled));
    assert_eq!(eval.eval(&bad, &ctx).unwrap_err().kind(), ErrorKind::Eval);
}

struct CountObserver {
    seen: Vec<(usize, Value)>,
}

impl RewriteObserver for CountObserver {
    fn on_rewrite(&mut self, id: usize, _ctx: &Context, output: &Value) {
        self.seen.push((id, output.clone()));
    }
}

#[test]
fn test_rewrite_observer() {
    let term = Term::prim(
        "+",
        vec![
            Arc::new(Term::Rewrite(0, Term::int(1))),
            Arc::new(Term::Rewrite(1, Term::int(2))),
        ],
    );
    let mut observer = CountObserver { seen: Vec::new() };
    {
        let mut eval = Evaluator::with_observer(&mut observer);
        assert_eq!(eval.eval(&term, &Context::empty()).unwrap(), Value::Int(3));
    }
    assert_eq!(observer.seen, vec![(0, Value::Int(1)), (1, Value::Int(2))]);
}

#[test]
fn test_context_shadowing() {
    let ctx = Context::empty().bind("x", Value::Int(1)).bind("x", Value::Int(2));
    assert_eq!(ctx.get("x").unwrap(), Value::Int(2));
    assert_eq!(ctx.names(), vec!["x".to_string()]);
    assert_eq!(ctx.get("y").unwrap_err().kind(), ErrorKind::Eval);
}

#[test]
fn test_build_context_binds_in_order() {
    let program = Program {
        commands: vec![
            Command::Declare { name: "g".to_string(), ty: Ty::Int, is_input: true },
            Command::Bind {
                name: "double".to_string(),
                ty: Ty::arrow(Ty::Int, Ty::Int),
                term: Term::func("n", Term::prim("+", vec![Term::var("n"), Term::var("n")])),
                is_start: false,
            },
        ],
    };
    let mut eval = Evaluator::new();
    let ctx = build_context(&program, &[("g".to_string(), Value::Int(3))], &mut eval).unwrap();
    assert_eq!(ctx.get("g").unwrap(), Value::Int(3));
    let double = ctx.get("double").unwrap();
    assert_eq!(eval.apply(&double, Value::Int(4)).unwrap(), Value::Int(8));
}

#[test]
fn test_printed_forms() {
    let ty = Ty::compress(0, Ty::Ind("IntList".to_string()));
    assert_eq!(ty.to_string(), "compress[0] IntList");
    assert_eq!(
        Value::Tuple(vec![Value::Int(7), Value::Bool(true)]).to_string(),
        "(7, true)"
    );
    let term = Term::prim("+", vec![Term::var("a"), Term::var("b")]);
    assert_eq!(term.to_string(), "(a + b)");
    assert_eq!(
        super::value_list_string(&[Value::Int(1), Value::Unit]),
        "[1, unit]"
    );
}
