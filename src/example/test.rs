use std::sync::Arc;

use super::collect::{collect_once, Collector};
use super::gen::{SizeSafeGen, SplitScheme};
use super::pool::ExamplePool;
use crate::analysis::{build_lift_info, LiftInfo, RewriteTypeInfo};
use crate::config::Config;
use crate::lang::{Command, Pattern, Program, Term, TermRef, Ty, Value};
use crate::util::time::TimeGuard;

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

fn sum_info() -> LiftInfo {
    let run_def = Term::func(
        "xs",
        Arc::new(Term::Rewrite(
            0,
            Term::app(Term::var("sum"), Arc::new(Term::Unlabel(0, Term::var("xs")))),
        )),
    );
    let program = Program {
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
            Command::Bind {
                name: "run".to_string(),
                ty: Ty::arrow(Ty::compress(0, list_ty()), Ty::Int),
                term: run_def,
                is_start: true,
            },
        ],
    };
    let infos = vec![RewriteTypeInfo {
        index: 0,
        inp_types: vec![("xs".to_string(), Ty::compress(0, list_ty()))],
        oup_type: Ty::Int,
        command_id: 2,
    }];
    build_lift_info(Arc::new(program), infos).unwrap()
}

fn test_config() -> Config {
    Config { thread_num: 2, data_size_limit: 8, ..Config::default() }
}

fn int_list(values: &[i64]) -> Value {
    let mut res = Value::ind("nil", Value::Unit);
    for v in values.iter().rev() {
        res = Value::ind("cons", Value::Tuple(vec![Value::Int(*v), res]));
    }
    res
}

fn value_size(value: &Value) -> usize {
    match value {
        Value::Unit | Value::Bool(_) | Value::Int(_) => 0,
        Value::Tuple(fields) => fields.iter().map(value_size).sum(),
        Value::Ind(_, body) => 1 + value_size(body),
        Value::Compress(_, body) => value_size(body),
        Value::Closure(_) => 0,
    }
}

#[test]
fn test_split_table_int_pair() {
    let config = test_config();
    let mut gen = SizeSafeGen::new(&config, sum_info().cons_map.clone());
    let splits = gen.possible_splits(&Ty::Tuple(vec![Ty::Int, Ty::Int]), 3).unwrap();
    let expect = vec![
        SplitScheme::Fields(vec![0, 3]),
        SplitScheme::Fields(vec![1, 2]),
        SplitScheme::Fields(vec![2, 1]),
        SplitScheme::Fields(vec![3, 0]),
    ];
    assert_eq!(*splits, expect);
}

#[test]
fn test_split_table_list() {
    let config = test_config();
    let mut gen = SizeSafeGen::new(&config, sum_info().cons_map.clone());
    assert!(gen.possible_splits(&list_ty(), 0).unwrap().is_empty());
    // Only nil fits in one unit; two units admit both constructors.
    let one = gen.possible_splits(&list_ty(), 1).unwrap();
    assert_eq!(one.len(), 1);
    assert!(matches!(&one[0], SplitScheme::Cons(name, _) if name == "nil"));
    assert_eq!(gen.possible_splits(&list_ty(), 2).unwrap().len(), 2);
}

#[test]
fn test_random_value_respects_size_limit() {
    let config = test_config();
    let info = sum_info();
    let mut gen = SizeSafeGen::new(&config, info.cons_map.clone());
    for _ in 0..50 {
        let value = gen.random_value(&Ty::compress(0, list_ty())).unwrap();
        assert!(value_size(&value) <= config.data_size_limit);
        assert!(matches!(value, Value::Compress(0, _)));
    }
}

#[test]
fn test_generation_is_seeded() {
    let config = test_config();
    let info = sum_info();
    let mut a = SizeSafeGen::new(&config, info.cons_map.clone());
    let mut b = SizeSafeGen::new(&config, info.cons_map.clone());
    for _ in 0..20 {
        assert_eq!(
            a.random_value(&list_ty()).unwrap(),
            b.random_value(&list_ty()).unwrap()
        );
    }
}

#[test]
fn test_collect_records_rewrite() {
    let info = sum_info();
    let xs = Value::compress(0, int_list(&[1, 2, 3]));
    let start = Term::app(Term::var("run"), Term::value(xs.clone()));
    let batch = collect_once(&info, &start, Vec::new()).unwrap();
    assert_eq!(batch[0].len(), 1);
    let example = &batch[0][0];
    assert_eq!(example.rewrite_id, 0);
    assert_eq!(example.local_inputs, vec![xs]);
    assert!(example.global_inputs.is_empty());
    assert_eq!(example.output, Value::Int(6));
}

#[test]
fn test_merge_deduplicates() {
    let info = sum_info();
    let config = test_config();
    let mut pool = ExamplePool::new(&info, &config);
    let xs = Value::compress(0, int_list(&[2, 2]));
    let start = Term::app(Term::var("run"), Term::value(xs));
    let mut collector = Collector::new(&info);
    collector.collect(&info, &start, Vec::new()).unwrap();
    collector.collect(&info, &start, Vec::new()).unwrap();
    assert_eq!(collector.recorded(0), 2);
    pool.merge(0, &mut collector, &TimeGuard::unlimited());
    assert_eq!(pool.examples[0].len(), 1);
}

#[test]
fn test_generate_batched_noop_when_satisfied() {
    let info = sum_info();
    let config = test_config();
    let mut pool = ExamplePool::new(&info, &config);
    // Target already met by the empty pool: nothing spawns, nothing moves.
    pool.generate_batched(0, 0, &TimeGuard::unlimited()).unwrap();
    assert!(pool.examples[0].is_empty());
    assert!(!pool.is_finished(0));
}

#[test]
fn test_generate_batched_reaches_target() {
    let info = sum_info();
    let config = test_config();
    let mut pool = ExamplePool::new(&info, &config);
    let guard = TimeGuard::new(std::time::Duration::from_secs(20));
    pool.generate_batched(0, 8, &guard).unwrap();
    assert!(pool.examples[0].len() >= 8 || pool.is_finished(0));
    let before = pool.examples[0].len();
    // A satisfied target returns immediately.
    pool.generate_batched(0, before.min(8), &guard).unwrap();
    assert_eq!(pool.examples[0].len(), before);
}
