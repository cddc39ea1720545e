use std::sync::Arc;

use super::builder::{build_grammar, OutputFilter};
use super::component::{collect_components, Component};
use super::enumerate::GrammarEnumerateTool;
use super::program::{build_program, const_program, param_program, Op, TypedProgram};
use crate::config::Config;
use crate::lang::{Closure, Command, Context, Pattern, Program, Term, TermRef, Ty, Value};

fn list_ty() -> Ty {
    Ty::Ind("IntList".to_string())
}

fn sum_def() -> TermRef {
    let cases = vec![
        (Pattern::Cons("nil".to_string(), Box::new(Pattern::Wildcard)), Term::int(0)),
        (
            Pattern::Cons(
                "cons".to_string(),
                Box::new(Pattern::Tuple(vec![Pattern::var("h"), Pattern::var("t")])),
            ),
            Term::prim("+", vec![Term::var("h"), Term::app(Term::var("sum"), Term::var("t"))]),
        ),
    ];
    Term::func("xs", Arc::new(Term::Match(Term::var("xs"), cases)))
}

fn sum_program() -> Program {
    Program {
        commands: vec![
            Command::IndDef {
                name: "IntList".to_string(),
                cons_list: vec![
                    ("nil".to_string(), Ty::Unit),
                    ("cons".to_string(), Ty::Tuple(vec![Ty::Int, list_ty()])),
                ],
            },
            Command::Bind {
                name: "sum".to_string(),
                ty: Ty::arrow(list_ty(), Ty::Int),
                term: sum_def(),
                is_start: false,
            },
        ],
    }
}

fn user_names(list: &[Component]) -> Vec<String> {
    list.iter()
        .filter_map(|c| match c {
            Component::User { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_program_size_and_display() {
    let pair = build_program(Op::Prod, vec![param_program(0), param_program(1)]);
    assert_eq!(pair.size(), 3);
    assert_eq!(pair.to_string(), "(prod param0 param1)");

    let access = build_program(Op::Access(0), vec![param_program(0)]);
    assert_eq!(access.size(), 2);

    let sum = build_program(
        Op::Prim("+".to_string()),
        vec![param_program(0), const_program(Value::Int(1))],
    );
    assert_eq!(sum.size(), 5);
    assert_eq!(sum.to_string(), "(+ param0 1)");

    let wrapped = build_program(Op::Direct(Ty::Int), vec![param_program(0)]);
    assert_eq!(wrapped.size(), 1);
    assert_eq!(wrapped.to_string(), "param0");
}

#[test]
fn test_program_run() {
    let pair = build_program(Op::Prod, vec![param_program(0), param_program(1)]);
    let inputs = [Value::Int(7), Value::Int(2)];
    assert_eq!(pair.run(&inputs).unwrap(), Value::Tuple(vec![Value::Int(7), Value::Int(2)]));

    let access = build_program(Op::Access(1), vec![pair.clone()]);
    assert_eq!(access.run(&inputs).unwrap(), Value::Int(2));

    let ite = build_program(
        Op::Ite,
        vec![
            build_program(Op::Prim("<".to_string()), vec![param_program(0), param_program(1)]),
            param_program(0),
            param_program(1),
        ],
    );
    assert_eq!(ite.run(&inputs).unwrap(), Value::Int(2));

    // A user component applies its captured closure to the children.
    let incr = Value::Closure(Arc::new(Closure {
        param: "x".to_string(),
        body: Term::prim("+", vec![Term::var("x"), Term::int(1)]),
        env: Context::empty(),
        fix: None,
    }));
    let comp = build_program(Op::Comp("incr".to_string(), incr), vec![param_program(0)]);
    assert_eq!(comp.run(&[Value::Int(3)]).unwrap(), Value::Int(4));
}

#[test]
fn test_typed_program_same() {
    let a = TypedProgram::new(Ty::Int, param_program(0));
    let b = TypedProgram::new(Ty::Int, param_program(0));
    let c = TypedProgram::new(Ty::Bool, param_program(0));
    assert!(a.same(&b));
    assert!(!a.same(&c));
    assert!(!a.same(&TypedProgram::new(Ty::Int, param_program(1))));
}

#[test]
fn test_component_pool_gating_lists() {
    let config = Config::default();
    let pool = collect_components(&sum_program(), &config).unwrap();
    // Recursive bindings only serve lifting functions.
    assert!(user_names(&pool.compress).contains(&"sum".to_string()));
    assert!(!user_names(&pool.combine).contains(&"sum".to_string()));
    assert!(user_names(&pool.combine).contains(&"cons".to_string()));
    assert!(pool
        .combine
        .iter()
        .any(|c| matches!(c, Component::Operator(op) if op == "==")));
    assert!(!pool
        .combine
        .iter()
        .any(|c| matches!(c, Component::Operator(op) if op == "*")));
    assert!(!pool
        .extract
        .iter()
        .any(|c| matches!(c, Component::Operator(op) if op == "==")));
}

#[test]
fn test_component_pool_switches() {
    let config = Config { enable_nonlinear: true, enable_condition: false, ..Config::default() };
    let pool = collect_components(&sum_program(), &config).unwrap();
    assert!(pool
        .combine
        .iter()
        .any(|c| matches!(c, Component::Operator(op) if op == "*")));
    assert!(!pool.combine.iter().any(|c| matches!(c, Component::Ite)));
}

#[test]
fn test_enumerator_soundness() {
    let config = Config::default();
    let pool = collect_components(&sum_program(), &config).unwrap();
    let grammar =
        build_grammar(&[Ty::Int], &pool.combine, None, &OutputFilter::Exact(Ty::Int), 6).unwrap();
    let mut tool = GrammarEnumerateTool::new(grammar);

    let size_one: Vec<String> =
        tool.acquire_programs(1).unwrap().iter().map(|p| p.prog.to_string()).collect();
    assert_eq!(size_one, vec!["param0", "0", "1"]);

    for size in 1..=6 {
        for program in tool.acquire_programs(size).unwrap().to_vec() {
            assert_eq!(program.prog.size(), size);
            assert_eq!(program.ty, Ty::Int);
        }
    }
    let size_five: Vec<String> =
        tool.acquire_programs(5).unwrap().iter().map(|p| p.prog.to_string()).collect();
    assert!(size_five.contains(&"(+ param0 param0)".to_string()));
}

#[test]
fn test_enumerator_cache_is_monotone() {
    let config = Config::default();
    let pool = collect_components(&sum_program(), &config).unwrap();
    let grammar =
        build_grammar(&[Ty::Int], &pool.combine, None, &OutputFilter::Exact(Ty::Int), 6).unwrap();
    let mut tool = GrammarEnumerateTool::new(grammar);

    let eager: Vec<String> =
        tool.acquire_programs(5).unwrap().iter().map(|p| p.prog.to_string()).collect();
    // Smaller classes were materialized on the way and stay put.
    let lazy: Vec<String> =
        tool.acquire_programs(1).unwrap().iter().map(|p| p.prog.to_string()).collect();
    assert_eq!(lazy, vec!["param0", "0", "1"]);
    assert_eq!(
        tool.acquire_programs(5).unwrap().iter().map(|p| p.prog.to_string()).collect::<Vec<_>>(),
        eager
    );
}

#[test]
fn test_enumerator_fails_fast_past_limit() {
    let config = Config::default();
    let pool = collect_components(&sum_program(), &config).unwrap();
    let grammar =
        build_grammar(&[Ty::Int], &pool.combine, None, &OutputFilter::Exact(Ty::Int), 4).unwrap();
    let mut tool = GrammarEnumerateTool::new(grammar);
    assert!(tool.acquire_programs(4).is_some());
    assert!(tool.acquire_programs(5).is_none());
}

#[test]
fn test_multi_start_extraction_grammar() {
    let config = Config::default();
    let pool = collect_components(&sum_program(), &config).unwrap();
    let inputs = [Ty::Int, Ty::compress(0, list_ty())];
    let grammar =
        build_grammar(&inputs, &pool.extract, None, &OutputFilter::PrimaryOrCompress, 6).unwrap();
    let mut tool = GrammarEnumerateTool::new(grammar);
    let programs = tool.acquire_programs(1).unwrap().to_vec();
    // Both the scalar and the region-typed parameter are reachable at
    // size one, with their own types.
    assert!(programs.iter().any(|p| p.ty == Ty::Int && p.prog.to_string() == "param0"));
    assert!(programs
        .iter()
        .any(|p| p.ty.compress_id() == Some(0) && p.prog.to_string() == "param1"));
}
