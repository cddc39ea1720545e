use std::collections::HashSet;

use log::trace;

use super::program::{Prog, TypedProgram};
use super::{Grammar, Rule};

/// Size-indexed enumerator over a grammar. Size classes are generated
/// lazily in increasing order and cached; the cache only grows, so a
/// class is computed at most once.
pub struct GrammarEnumerateTool {
    grammar: Grammar,
    /// `cache[size][symbol]` holds every program of exactly `size` units
    /// derivable from `symbol`.
    cache: Vec<Vec<Vec<TypedProgram>>>,
}

impl GrammarEnumerateTool {
    pub fn new(grammar: Grammar) -> GrammarEnumerateTool {
        GrammarEnumerateTool { grammar, cache: Vec::new() }
    }

    pub fn size_limit(&self) -> usize {
        self.grammar.size_limit
    }

    /// Every program of exactly `size` units from the start symbol, or
    /// `None` past the grammar's size limit.
    pub fn acquire_programs(&mut self, size: usize) -> Option<&[TypedProgram]> {
        if size > self.grammar.size_limit {
            return None;
        }
        while self.cache.len() <= size {
            self.extend_one();
        }
        Some(&self.cache[size][self.grammar.start])
    }

    fn extend_one(&mut self) {
        let size = self.cache.len();
        let symbol_num = self.grammar.symbols.len();
        let mut layer: Vec<Vec<TypedProgram>> = vec![Vec::new(); symbol_num];
        // Zero-cost wrapper rules reference same-size children, which by
        // construction live at smaller symbol indices and are already in
        // `layer` when the wrapper is reached.
        for sid in 0..symbol_num {
            let symbol = &self.grammar.symbols[sid];
            let mut out = Vec::new();
            let mut seen = HashSet::new();
            for rule in &symbol.rules {
                let own = rule.own_size();
                if own > size {
                    continue;
                }
                if rule.params.is_empty() {
                    if own == size {
                        push_unique(rule, Vec::new(), &symbol.ty, &mut seen, &mut out);
                    }
                    continue;
                }
                let mut stack = Vec::with_capacity(rule.params.len());
                fill_children(
                    rule,
                    0,
                    size - own,
                    &self.cache,
                    &layer,
                    size,
                    &mut stack,
                    &mut |subs| push_unique(rule, subs, &symbol.ty, &mut seen, &mut out),
                );
            }
            layer[sid] = out;
        }
        trace!(
            target: "enum",
            "size {}: {} programs at start",
            size,
            layer[self.grammar.start].len()
        );
        self.cache.push(layer);
    }
}

fn push_unique(
    rule: &Rule,
    subs: Vec<Prog>,
    symbol_ty: &crate::lang::Ty,
    seen: &mut HashSet<String>,
    out: &mut Vec<TypedProgram>,
) {
    let prog = rule.build(subs);
    if seen.insert(prog.to_string()) {
        out.push(TypedProgram::new(rule.result_ty(symbol_ty), prog));
    }
}

/// Distributes `remaining` size units over the rule's children,
/// invoking `emit` for every complete assignment.
#[allow(clippy::too_many_arguments)]
fn fill_children(
    rule: &Rule,
    pos: usize,
    remaining: usize,
    cache: &[Vec<Vec<TypedProgram>>],
    layer: &[Vec<TypedProgram>],
    current_size: usize,
    stack: &mut Vec<Prog>,
    emit: &mut dyn FnMut(Vec<Prog>),
) {
    if pos == rule.params.len() {
        if remaining == 0 {
            emit(stack.clone());
        }
        return;
    }
    let symbol = rule.params[pos];
    for child_size in 0..=remaining {
        let programs = if child_size < current_size {
            &cache[child_size][symbol]
        } else {
            &layer[symbol]
        };
        for program in programs {
            stack.push(program.prog.clone());
            fill_children(
                rule,
                pos + 1,
                remaining - child_size,
                cache,
                layer,
                current_size,
                stack,
                emit,
            );
            stack.pop();
        }
    }
}
