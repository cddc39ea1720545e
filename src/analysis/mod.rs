
use std::collections::HashMap;
use std::sync::Arc;

use crate::lang::{Command, Program, Symbol, Term, Ty};
use crate::util::error::{Error, ErrorKind, Result};

/// Per-rewrite-point typing information, produced at elaboration time and
/// immutable afterwards.
#[derive(Clone, Debug)]
pub struct RewriteTypeInfo {
    pub index: usize,
    /// Ordered local bindings visible at the point, already filtered to
    /// non-global names; function-typed entries are filtered out here.
    pub inp_types: Vec<(Symbol, Ty)>,
    pub oup_type: Ty,
    /// Index of the enclosing top-level command, used to gate which
    /// components a synthesized replacement may reference.
    pub command_id: usize,
}

/// The elaborated program together with everything the synthesis stages
/// need to know about it.
#[derive(Debug)]
pub struct LiftInfo {
    pub program: Arc<Program>,
    pub rewrite_infos: Vec<RewriteTypeInfo>,
    /// Constructor map of the declared inductive types.
    pub cons_map: HashMap<Symbol, Vec<(Symbol, Ty)>>,
    pub global_names: Vec<Symbol>,
    pub global_types: Vec<Ty>,
    /// Entry points: name and parameter types, in declaration order.
    pub start_list: Vec<(Symbol, Vec<Ty>)>,
    /// Number of compress regions (max region id + 1).
    pub region_num: usize,
}

fn unfold_params(mut ty: &Ty) -> Vec<Ty> {
    let mut params = Vec::new();
    while let Ty::Arrow(inp, oup) = ty {
        params.push((**inp).clone());
        ty = oup;
    }
    params
}

fn max_region_id(ty: &Ty, current: &mut Option<usize>) {
    match ty {
        Ty::Compress(id, body) => {
            *current = Some(current.map_or(*id, |c| c.max(*id)));
            max_region_id(body, current);
        }
        Ty::Arrow(inp, oup) => {
            max_region_id(inp, current);
            max_region_id(oup, current);
        }
        Ty::Tuple(fields) => {
            for field in fields {
                max_region_id(field, current);
            }
        }
        _ => {}
    }
}

fn check_rewrites(term: &Term, num: usize) -> Result<()> {
    let check = |sub: &Term| check_rewrites(sub, num);
    match term {
        Term::Rewrite(id, body) => {
            if *id >= num {
                return Err(Error::with_message(
                    ErrorKind::Elaboration,
                    format!("rewrite point #{} has no type info", id),
                ));
            }
            check(body)
        }
        Term::Value(_) | Term::Var(_) => Ok(()),
        Term::If(c, t, e) => {
            check(c)?;
            check(t)?;
            check(e)
        }
        Term::Prim(_, params) => params.iter().try_for_each(|p| check(p)),
        Term::App(f, p) => {
            check(f)?;
            check(p)
        }
        Term::Func(_, body) => check(body),
        Term::Let { def, body, .. } => {
            check(def)?;
            check(body)
        }
        Term::Tuple(fields) => fields.iter().try_for_each(|f| check(f)),
        Term::Proj(body, _, _) => check(body),
        Term::Match(def, cases) => {
            check(def)?;
            cases.iter().try_for_each(|(_, branch)| check(branch))
        }
        Term::Cons(_, body) | Term::Label(_, body) | Term::Unlabel(_, body) => check(body),
    }
}

/// Whether a local binding may serve as a synthesis input.
pub fn is_valid_input_type(ty: &Ty) -> bool {
    !ty.is_function()
}

/// Organizes a labeled program and its elaboration-time rewrite table
/// into the view consumed by the solver. Fails on malformed input: a
/// rewrite point without type info, or a non-dense rewrite index order.
pub fn build_lift_info(
    program: Arc<Program>,
    rewrite_infos: Vec<RewriteTypeInfo>,
) -> Result<LiftInfo> {
    for (i, info) in rewrite_infos.iter().enumerate() {
        if info.index != i {
            return Err(Error::with_message(
                ErrorKind::Elaboration,
                format!("rewrite info #{} carries index {}", i, info.index),
            ));
        }
    }

    let mut cons_map = HashMap::new();
    let mut global_names = Vec::new();
    let mut global_types = Vec::new();
    let mut start_list = Vec::new();
    let mut last_bind: Option<(Symbol, Vec<Ty>)> = None;

    for command in &program.commands {
        match command {
            Command::IndDef { name, cons_list } => {
                cons_map.insert(name.clone(), cons_list.clone());
            }
            Command::Declare { name, ty, is_input } => {
                if *is_input {
                    global_names.push(name.clone());
                    global_types.push(ty.clone());
                }
            }
            Command::Bind { name, ty, term, is_start } => {
                check_rewrites(term, rewrite_infos.len())?;
                let params = unfold_params(ty);
                if *is_start {
                    start_list.push((name.clone(), params));
                } else {
                    last_bind = Some((name.clone(), params));
                }
            }
        }
    }
    if start_list.is_empty() {
        // Without a declared entry the last binding serves as one.
        match last_bind {
            Some(start) => start_list.push(start),
            None => {
                return Err(Error::new_const(
                    ErrorKind::Elaboration,
                    "program declares no entry point",
                ))
            }
        }
    }

    let mut region = None;
    let rewrite_infos: Vec<RewriteTypeInfo> = rewrite_infos
        .into_iter()
        .map(|info| {
            max_region_id(&info.oup_type, &mut region);
            let inp_types: Vec<_> = info
                .inp_types
                .into_iter()
                .filter(|(_, ty)| is_valid_input_type(ty))
                .inspect(|(_, ty)| max_region_id(ty, &mut region))
                .collect();
            RewriteTypeInfo { inp_types, ..info }
        })
        .collect();
    let region_num = region.map_or(0, |id| id + 1);

    log::debug!(
        target: "analysis",
        "lift info: {} rewrite points, {} regions, {} entries",
        rewrite_infos.len(),
        region_num,
        start_list.len()
    );

    Ok(LiftInfo {
        program,
        rewrite_infos,
        cons_map,
        global_names,
        global_types,
        start_list,
        region_num,
    })
}

impl LiftInfo {
    /// Content type of a region, read off the first input binding whose
    /// type names it.
    pub fn region_content_type(&self, region_id: usize) -> Result<Ty> {
        for info in &self.rewrite_infos {
            for (_, ty) in &info.inp_types {
                if let Ty::Compress(id, body) = ty {
                    if *id == region_id {
                        return Ok((**body).clone());
                    }
                }
            }
        }
        Err(Error::with_message(
            ErrorKind::Elaboration,
            format!("region #{} never occurs as an input", region_id),
        ))
    }

    pub fn cared_vars(&self) -> Vec<Vec<Symbol>> {
        self.rewrite_infos
            .iter()
            .map(|info| info.inp_types.iter().map(|(name, _)| name.clone()).collect())
            .collect()
    }
}
