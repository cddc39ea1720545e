use std::collections::HashMap;

use log::trace;

use crate::lang::eval::prim_signature;
use crate::lang::Ty;
use crate::util::error::{Error, ErrorKind, Result};

use super::program::{build_program, param_program, Op, Prog};
use super::{const_program, Component, Grammar, NonTerminal, Rule};

/// A value visible to candidate programs: a parameter, or a projection
/// chain into one.
#[derive(Clone, Debug)]
pub struct ContextEntry {
    pub prog: Prog,
    pub ty: Ty,
}

/// Which result types the grammar's start symbol accepts.
#[derive(Clone, Debug)]
pub enum OutputFilter {
    /// Scalar results; lifting functions produce these.
    Primary,
    /// Scalar or region-typed results; extraction programs may produce a
    /// region value to feed a lifting function.
    PrimaryOrCompress,
    /// Exactly this type; combinator leaves.
    Exact(Ty),
}

impl OutputFilter {
    fn admits(&self, ty: &Ty) -> bool {
        match self {
            OutputFilter::Primary => matches!(ty, Ty::Int | Ty::Bool),
            OutputFilter::PrimaryOrCompress => {
                matches!(ty, Ty::Int | Ty::Bool | Ty::Compress(_, _))
            }
            OutputFilter::Exact(target) => ty == target,
        }
    }
}

/// Arena of typed nonterminals with stable indices.
struct SymbolArena {
    symbols: Vec<NonTerminal>,
    index: HashMap<Ty, usize>,
}

impl SymbolArena {
    fn new() -> SymbolArena {
        SymbolArena { symbols: Vec::new(), index: HashMap::new() }
    }

    fn acquire(&mut self, ty: &Ty) -> usize {
        if let Some(&id) = self.index.get(ty) {
            return id;
        }
        let id = self.symbols.len();
        self.symbols.push(NonTerminal {
            name: format!("s{}[{}]", id, ty),
            ty: ty.clone(),
            rules: Vec::new(),
        });
        self.index.insert(ty.clone(), id);
        id
    }

    fn get(&self, ty: &Ty) -> Option<usize> {
        self.index.get(ty).copied()
    }
}

/// Expands the parameter list into the full visible context: every
/// tuple-typed entry contributes projections of each field, recursively.
pub fn build_context(inp_types: &[Ty], decompose: bool) -> Vec<ContextEntry> {
    let mut entries: Vec<ContextEntry> = inp_types
        .iter()
        .enumerate()
        .map(|(i, ty)| ContextEntry { prog: param_program(i), ty: ty.clone() })
        .collect();
    if !decompose {
        return entries;
    }
    let mut head = 0;
    while head < entries.len() {
        if let Ty::Tuple(fields) = entries[head].ty.clone() {
            for (i, field) in fields.iter().enumerate() {
                let prog = build_program(Op::Access(i), vec![entries[head].prog.clone()]);
                entries.push(ContextEntry { prog, ty: field.clone() });
            }
        }
        head += 1;
    }
    entries
}

fn seed_tuple_closure(arena: &mut SymbolArena, ty: &Ty) {
    arena.acquire(ty);
    if let Ty::Tuple(fields) = ty {
        for field in fields {
            seed_tuple_closure(arena, field);
        }
    }
}

/// Builds a typed grammar over `inp_types` from a component list.
/// `gate` limits user components to those declared at or before the
/// given command index; `None` admits all of them.
pub fn build_grammar(
    inp_types: &[Ty],
    components: &[Component],
    gate: Option<usize>,
    output: &OutputFilter,
    size_limit: usize,
) -> Result<Grammar> {
    let admitted: Vec<&Component> = components
        .iter()
        .filter(|c| gate.map_or(true, |limit| c.command_id() <= limit))
        .collect();
    let decompose = admitted.iter().any(|c| matches!(c, Component::Access));
    let context = build_context(inp_types, decompose);

    let mut arena = SymbolArena::new();
    for entry in &context {
        seed_tuple_closure(&mut arena, &entry.ty);
    }
    arena.acquire(&Ty::Int);
    arena.acquire(&Ty::Bool);
    for component in &admitted {
        match component {
            Component::User { param_types, res_type, .. } => {
                for ty in param_types {
                    seed_tuple_closure(&mut arena, ty);
                }
                seed_tuple_closure(&mut arena, res_type);
            }
            Component::Const(_, ty) => {
                arena.acquire(ty);
            }
            _ => {}
        }
    }
    if let OutputFilter::Exact(ty) = output {
        seed_tuple_closure(&mut arena, ty);
    }

    for entry in &context {
        if let Some(id) = arena.get(&entry.ty) {
            arena.symbols[id].rules.push(Rule::terminal(entry.prog.clone()));
        }
    }
    for component in &admitted {
        match component {
            Component::User { name, value, param_types, res_type, .. } => {
                let params: Option<Vec<usize>> =
                    param_types.iter().map(|ty| arena.get(ty)).collect();
                if let (Some(params), Some(res)) = (params, arena.get(res_type)) {
                    arena.symbols[res]
                        .rules
                        .push(Rule::op(Op::Comp(name.clone(), value.clone()), params));
                }
            }
            Component::Const(value, ty) => {
                if let Some(id) = arena.get(ty) {
                    arena.symbols[id].rules.push(Rule::terminal(const_program(value.clone())));
                }
            }
            Component::Operator(op) => {
                let (param_types, res_type) = prim_signature(op).ok_or_else(|| {
                    Error::with_message(
                        ErrorKind::Internal,
                        format!("operator component {} has no signature", op),
                    )
                })?;
                let params: Option<Vec<usize>> =
                    param_types.iter().map(|ty| arena.get(ty)).collect();
                if let (Some(params), Some(res)) = (params, arena.get(&res_type)) {
                    arena.symbols[res].rules.push(Rule::op(Op::Prim(op.clone()), params));
                }
            }
            Component::Ite => {
                if let Some(cond) = arena.get(&Ty::Bool) {
                    for id in 0..arena.symbols.len() {
                        arena.symbols[id].rules.push(Rule::op(Op::Ite, vec![cond, id, id]));
                    }
                }
            }
            Component::Tuple => {
                for id in 0..arena.symbols.len() {
                    if let Ty::Tuple(fields) = arena.symbols[id].ty.clone() {
                        let params: Option<Vec<usize>> =
                            fields.iter().map(|ty| arena.get(ty)).collect();
                        if let Some(params) = params {
                            arena.symbols[id].rules.push(Rule::op(Op::Prod, params));
                        }
                    }
                }
            }
            Component::Access => {
                for id in 0..arena.symbols.len() {
                    if let Ty::Tuple(fields) = arena.symbols[id].ty.clone() {
                        for (i, field) in fields.iter().enumerate() {
                            if let Some(res) = arena.get(field) {
                                arena.symbols[res]
                                    .rules
                                    .push(Rule::op(Op::Access(i), vec![id]));
                            }
                        }
                    }
                }
            }
        }
    }

    let starts: Vec<usize> = arena
        .symbols
        .iter()
        .enumerate()
        .filter(|(_, s)| output.admits(&s.ty) && !s.rules.is_empty())
        .map(|(id, _)| id)
        .collect();
    let start = match starts.len() {
        0 => {
            return Err(Error::new_const(
                ErrorKind::Exhausted,
                "grammar admits no output symbol",
            ))
        }
        1 => starts[0],
        _ => {
            let rules = starts
                .iter()
                .map(|&id| Rule::op(Op::Direct(arena.symbols[id].ty.clone()), vec![id]))
                .collect();
            let ty = arena.symbols[starts[0]].ty.clone();
            let id = arena.symbols.len();
            arena.symbols.push(NonTerminal { name: "start".to_string(), ty, rules });
            id
        }
    };

    let grammar = Grammar { start, symbols: arena.symbols, size_limit };
    trace!(
        target: "enum",
        "built grammar: {} symbols, {} rules, start {}",
        grammar.symbols.len(),
        grammar.rule_num(),
        grammar.symbols[grammar.start].name
    );
    Ok(grammar)
}
