use std::sync::Arc;

use test_log::test;

use super::space::FExampleSpace;
use super::{unfold_output_type, AutoLifterSolver, CompressRes, FRes};
use crate::analysis::{build_lift_info, LiftInfo, RewriteTypeInfo};
use crate::config::Config;
use crate::example::Example;
use crate::grammar::{param_program, TypedProgram};
use crate::lang::eval::{build_context, Evaluator};
use crate::lang::{Command, Context, Pattern, Program, Term, TermRef, Ty, Value};

fn list_ty() -> Ty {
    Ty::Ind("IntList".to_string())
}

fn rec_list_fold(name: &str, leaf: TermRef, step: TermRef) -> TermRef {
    // fun xs -> match xs with nil _ -> leaf | cons (h, t) -> step
    let cases = vec![
        (Pattern::Cons("nil".to_string(), Box::new(Pattern::Wildcard)), leaf),
        (
            Pattern::Cons(
                "cons".to_string(),
                Box::new(Pattern::Tuple(vec![Pattern::var("h"), Pattern::var("t")])),
            ),
            Term::prim("+", vec![step, Term::app(Term::var(name), Term::var("t"))]),
        ),
    ];
    Term::func("xs", Arc::new(Term::Match(Term::var("xs"), cases)))
}

fn base_commands() -> Vec<Command> {
    vec![
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
            term: rec_list_fold("sum", Term::int(0), Term::var("h")),
            is_start: false,
        },
    ]
}

fn sum_info() -> LiftInfo {
    let mut commands = base_commands();
    let run_def = Term::func(
        "xs",
        Arc::new(Term::Rewrite(
            0,
            Term::app(Term::var("sum"), Arc::new(Term::Unlabel(0, Term::var("xs")))),
        )),
    );
    commands.push(Command::Bind {
        name: "run".to_string(),
        ty: Ty::arrow(Ty::compress(0, list_ty()), Ty::Int),
        term: run_def,
        is_start: true,
    });
    let infos = vec![RewriteTypeInfo {
        index: 0,
        inp_types: vec![("xs".to_string(), Ty::compress(0, list_ty()))],
        oup_type: Ty::Int,
        command_id: 2,
    }];
    build_lift_info(Arc::new(Program { commands }), infos).unwrap()
}

fn sum_len_info() -> LiftInfo {
    let mut commands = base_commands();
    commands.push(Command::Bind {
        name: "len".to_string(),
        ty: Ty::arrow(list_ty(), Ty::Int),
        term: rec_list_fold("len", Term::int(0), Term::int(1)),
        is_start: false,
    });
    let unlabeled = || Arc::new(Term::Unlabel(0, Term::var("xs")));
    let run_def = Term::func(
        "xs",
        Arc::new(Term::Rewrite(
            0,
            Arc::new(Term::Tuple(vec![
                Term::app(Term::var("sum"), unlabeled()),
                Term::app(Term::var("len"), unlabeled()),
            ])),
        )),
    );
    commands.push(Command::Bind {
        name: "run".to_string(),
        ty: Ty::arrow(Ty::compress(0, list_ty()), Ty::Tuple(vec![Ty::Int, Ty::Int])),
        term: run_def,
        is_start: true,
    });
    let infos = vec![RewriteTypeInfo {
        index: 0,
        inp_types: vec![("xs".to_string(), Ty::compress(0, list_ty()))],
        oup_type: Ty::Tuple(vec![Ty::Int, Ty::Int]),
        command_id: 3,
    }];
    build_lift_info(Arc::new(Program { commands }), infos).unwrap()
}

fn test_config() -> Config {
    Config {
        thread_num: 2,
        data_size_limit: 8,
        enum_size_limit: 6,
        init_example_num: 12,
        ..Config::default()
    }
}

fn int_list(values: &[i64]) -> Value {
    let mut res = Value::ind("nil", Value::Unit);
    for v in values.iter().rev() {
        res = Value::ind("cons", Value::Tuple(vec![Value::Int(*v), res]));
    }
    res
}

#[test]
fn test_unfold_output_type() {
    let ty = Ty::Tuple(vec![
        Ty::Int,
        Ty::Tuple(vec![Ty::compress(0, list_ty()), Ty::Bool]),
    ]);
    let units = unfold_output_type(&ty);
    assert_eq!(units.len(), 3);
    assert_eq!(units[0].path, vec![0]);
    assert_eq!(units[0].ty, Ty::Int);
    assert_eq!(units[1].path, vec![1, 0]);
    assert_eq!(units[1].ty.compress_id(), Some(0));
    assert_eq!(units[2].path, vec![1, 1]);
    assert_eq!(units[2].ty, Ty::Bool);
}

#[test]
fn test_registries_dedup() {
    let mut fres = FRes::default();
    let a = TypedProgram::new(Ty::Int, param_program(0));
    assert_eq!(fres.insert(a.clone()), 0);
    assert_eq!(fres.insert(TypedProgram::new(Ty::Int, param_program(1))), 1);
    // An identical printed form lands on the existing entry.
    assert_eq!(fres.insert(a), 0);
    assert_eq!(fres.len(), 2);

    let mut cres = CompressRes::default();
    let b = TypedProgram::new(Ty::Bool, param_program(0));
    assert_eq!(cres.insert(b.clone()), 0);
    assert_eq!(cres.insert(b), 0);
    assert_eq!(cres.programs.len(), 1);
}

fn space_example(i: i64) -> Arc<Example> {
    Arc::new(Example {
        rewrite_id: 0,
        local_inputs: vec![Value::Int(i)],
        global_inputs: Vec::new(),
        output: Value::Tuple(vec![Value::Int(i), Value::Int(2 * i)]),
    })
}

#[test]
fn test_space_cache_monotone() {
    let mut space = FExampleSpace::new(0);
    for i in 0..4 {
        space.examples.push(space_example(i));
    }
    let prog = TypedProgram::new(Ty::Int, param_program(0));
    assert_eq!(space.run_extract(&prog, 3).unwrap(), Value::Int(3));
    assert_eq!(space.leaf_value(&[1], 2).unwrap(), Value::Int(4));

    // Growing the example list must not disturb filled prefixes.
    for i in 4..8 {
        space.examples.push(space_example(i));
    }
    assert_eq!(space.run_extract(&prog, 7).unwrap(), Value::Int(7));
    assert_eq!(space.run_extract(&prog, 1).unwrap(), Value::Int(1));
    assert_eq!(space.leaf_value(&[1], 6).unwrap(), Value::Int(12));
    assert_eq!(space.leaf_value(&[1], 2).unwrap(), Value::Int(4));
}

#[test]
fn test_solve_sum_end_to_end() {
    let info = sum_info();
    let config = test_config();
    let mut solver = AutoLifterSolver::new(&info, &config).unwrap();
    let solution = solver.solve().unwrap();

    assert_eq!(solution.lift_types, vec![Ty::Int]);
    assert_eq!(solver.fres()[0].len(), 1);

    // The lifting function reproduces sum on a concrete list.
    let mut eval = Evaluator::new();
    let ctx = build_context(&info.program, &[], &mut eval).unwrap();
    let lift = eval.eval(&solution.lift_terms[0], &ctx).unwrap();
    assert_eq!(eval.apply(&lift, int_list(&[1, 2, 3])).unwrap(), Value::Int(6));

    // Post-rewrite, the local variable holds the summary directly.
    let rewritten = Context::empty().bind("xs", Value::Int(9));
    assert_eq!(eval.eval(&solution.combine_terms[0], &rewritten).unwrap(), Value::Int(9));
}

#[test]
fn test_solve_two_component_pair() {
    let info = sum_len_info();
    let config = test_config();
    let mut solver = AutoLifterSolver::new(&info, &config).unwrap();
    let solution = solver.solve().unwrap();

    // Both components of the region's summary are discovered through a
    // single shared extraction.
    assert_eq!(solver.fres()[0].len(), 2);
    assert_eq!(solver.compress_res()[0].programs.len(), 1);
    assert_eq!(solution.lift_types, vec![Ty::Tuple(vec![Ty::Int, Ty::Int])]);

    let mut eval = Evaluator::new();
    let ctx = build_context(&info.program, &[], &mut eval).unwrap();
    let lift = eval.eval(&solution.lift_terms[0], &ctx).unwrap();
    assert_eq!(
        eval.apply(&lift, int_list(&[1, 2, 3])).unwrap(),
        Value::Tuple(vec![Value::Int(6), Value::Int(3)])
    );

    // With the summary (7, 2) in place the combinator reproduces the
    // pair exactly.
    let rewritten =
        Context::empty().bind("xs", Value::Tuple(vec![Value::Int(7), Value::Int(2)]));
    assert_eq!(
        eval.eval(&solution.combine_terms[0], &rewritten).unwrap(),
        Value::Tuple(vec![Value::Int(7), Value::Int(2)])
    );
}
