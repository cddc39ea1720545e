pub mod space;
pub mod plp;
pub mod combine;
#[cfg(test)]
mod test;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};

use crate::analysis::LiftInfo;
use crate::config::Config;
use crate::example::ExamplePool;
use crate::grammar::{
    build_grammar, collect_components, ComponentPool, GrammarEnumerateTool, Op, OutputFilter,
    Prog, TypedProgram,
};
use crate::lang::eval::prim_signature;
use crate::lang::{Symbol, Term, TermRef, Ty, Value};
use crate::util::error::{Error, ErrorKind, Result};
use crate::util::time::TimeGuard;

pub use plp::{AuxCandidate, DeterminationSynthesizer, PlpTask, UnitSynthesizer};
pub use space::FExampleSpace;

/// One leaf of a rewrite point's output type, reached by descending
/// tuple types only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputUnit {
    pub path: Vec<usize>,
    pub ty: Ty,
}

/// Unfolds an output type into its leaves: descent stops at a region, a
/// scalar, or an inductive type.
pub fn unfold_output_type(ty: &Ty) -> Vec<OutputUnit> {
    let mut res = Vec::new();
    let mut path = Vec::new();
    unfold(ty, &mut path, &mut res);
    res
}

fn unfold(ty: &Ty, path: &mut Vec<usize>, out: &mut Vec<OutputUnit>) {
    match ty {
        Ty::Tuple(fields) => {
            for (i, field) in fields.iter().enumerate() {
                path.push(i);
                unfold(field, path, out);
                path.pop();
            }
        }
        _ => out.push(OutputUnit { path: path.clone(), ty: ty.clone() }),
    }
}

/// Accepted lifting function for one region, plus whether the fixpoint
/// loop has already propagated it as a new target.
pub struct FEntry {
    pub program: TypedProgram,
    pub is_extended: bool,
}

/// Append-only per-region registry of accepted lifting functions.
#[derive(Default)]
pub struct FRes {
    pub entries: Vec<FEntry>,
}

impl FRes {
    /// Returns the entry index; inserting a duplicate returns the
    /// existing index without growing the registry.
    pub fn insert(&mut self, program: TypedProgram) -> usize {
        if let Some(id) = self.entries.iter().position(|e| e.program.same(&program)) {
            return id;
        }
        self.entries.push(FEntry { program, is_extended: false });
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append-only per-rewrite-point registry of accepted extraction
/// programs.
#[derive(Default)]
pub struct CompressRes {
    pub programs: Vec<TypedProgram>,
}

impl CompressRes {
    pub fn insert(&mut self, program: TypedProgram) -> usize {
        if let Some(id) = self.programs.iter().position(|p| p.same(&program)) {
            return id;
        }
        self.programs.push(program);
        self.programs.len() - 1
    }
}

/// Result of a full synthesis run: one lifting function per region and
/// one combinator per rewrite point, as terms of the input language for
/// the external rewriter to splice.
pub struct Solution {
    /// Summary type per region: unit, a single component's type, or a
    /// tuple of component types.
    pub lift_types: Vec<Ty>,
    /// Per region: a function from region content to its summary.
    pub lift_terms: Vec<TermRef>,
    /// Per rewrite point: a replacement term over the point's local
    /// bindings and the globals.
    pub combine_terms: Vec<TermRef>,
}

/// Name-resolution tables for turning candidate programs back into
/// surface terms.
pub(crate) struct TermBuildCtx {
    cons_to_ind: HashMap<Symbol, Symbol>,
    comp_res: HashMap<Symbol, Ty>,
}

impl TermBuildCtx {
    fn new(info: &LiftInfo, pool: &ComponentPool) -> TermBuildCtx {
        let mut cons_to_ind = HashMap::new();
        for (ind, cons_list) in &info.cons_map {
            for (cons, _) in cons_list {
                cons_to_ind.insert(cons.clone(), ind.clone());
            }
        }
        let mut comp_res = HashMap::new();
        for component in pool.compress.iter().chain(&pool.extract).chain(&pool.combine) {
            if let crate::grammar::Component::User { name, res_type, .. } = component {
                comp_res.insert(name.clone(), res_type.clone());
            }
        }
        TermBuildCtx { cons_to_ind, comp_res }
    }

    fn ty_of_value(&self, value: &Value) -> Result<Ty> {
        match value {
            Value::Unit => Ok(Ty::Unit),
            Value::Bool(_) => Ok(Ty::Bool),
            Value::Int(_) => Ok(Ty::Int),
            Value::Tuple(fields) => Ok(Ty::Tuple(
                fields.iter().map(|f| self.ty_of_value(f)).collect::<Result<_>>()?,
            )),
            Value::Ind(cons, _) => self
                .cons_to_ind
                .get(cons)
                .map(|ind| Ty::Ind(ind.clone()))
                .ok_or_else(|| {
                    Error::with_message(
                        ErrorKind::Internal,
                        format!("unknown constructor {}", cons),
                    )
                }),
            Value::Compress(id, body) => Ok(Ty::compress(*id, self.ty_of_value(body)?)),
            Value::Closure(_) => Err(Error::new_const(
                ErrorKind::Internal,
                "closure constant in a candidate program",
            )),
        }
    }
}

/// Rebuilds a candidate program as a surface term over the given
/// parameter terms.
pub(crate) fn build_term(
    prog: &Prog,
    params: &[(TermRef, Ty)],
    ctx: &TermBuildCtx,
) -> Result<(TermRef, Ty)> {
    let children: Vec<(TermRef, Ty)> = prog
        .subs
        .iter()
        .map(|sub| build_term(sub, params, ctx))
        .collect::<Result<_>>()?;
    match &prog.op {
        Op::Param(index) => params.get(*index).cloned().ok_or_else(|| {
            Error::with_message(ErrorKind::Internal, format!("missing parameter #{}", index))
        }),
        Op::Const(value) => Ok((Term::value(value.clone()), ctx.ty_of_value(value)?)),
        Op::Prim(op) => {
            let (_, res) = prim_signature(op).ok_or_else(|| {
                Error::with_message(ErrorKind::Internal, format!("unknown operator {}", op))
            })?;
            let terms = children.into_iter().map(|(t, _)| t).collect();
            Ok((Term::prim(op, terms), res))
        }
        Op::Ite => {
            let ty = children[1].1.clone();
            let mut terms = children.into_iter().map(|(t, _)| t);
            let (c, t, e) = match (terms.next(), terms.next(), terms.next()) {
                (Some(c), Some(t), Some(e)) => (c, t, e),
                _ => return Err(ErrorKind::Internal.into()),
            };
            Ok((Arc::new(Term::If(c, t, e)), ty))
        }
        Op::Prod => {
            let tys = children.iter().map(|(_, ty)| ty.clone()).collect();
            let terms = children.into_iter().map(|(t, _)| t).collect();
            Ok((Arc::new(Term::Tuple(terms)), Ty::Tuple(tys)))
        }
        Op::Access(index) => {
            let (term, ty) = children.into_iter().next().ok_or(ErrorKind::Internal)?;
            match ty {
                Ty::Tuple(fields) if *index < fields.len() => Ok((
                    Arc::new(Term::Proj(term, *index, fields.len())),
                    fields[*index].clone(),
                )),
                ty => Err(Error::with_message(
                    ErrorKind::Internal,
                    format!("projection .{} out of {}", index, ty),
                )),
            }
        }
        Op::Comp(name, _) => {
            if let Some(ind) = ctx.cons_to_ind.get(name) {
                let (term, _) = children.into_iter().next().ok_or(ErrorKind::Internal)?;
                return Ok((Arc::new(Term::Cons(name.clone(), term)), Ty::Ind(ind.clone())));
            }
            let res = ctx.comp_res.get(name).cloned().ok_or_else(|| {
                Error::with_message(ErrorKind::Internal, format!("unknown component {}", name))
            })?;
            let mut term = Term::var(name);
            for (child, _) in children {
                term = Term::app(term, child);
            }
            Ok((term, res))
        }
        Op::Direct(ty) => {
            let (term, _) = children.into_iter().next().ok_or(ErrorKind::Internal)?;
            Ok((term, ty.clone()))
        }
    }
}

/// A name based on `base` that collides with nothing in `used`.
pub(crate) fn fresh_name(base: &str, used: &[Symbol]) -> Symbol {
    let mut name = base.to_string();
    while used.iter().any(|u| u == &name) {
        name.push('\'');
    }
    name
}

/// The synthesis driver: owns the example pool, the per-rewrite and
/// per-region grammars, and the two registries; runs the lifting
/// fixpoint and then the combinator stage.
pub struct AutoLifterSolver<'i> {
    info: &'i LiftInfo,
    config: &'i Config,
    pool: ExamplePool<'i>,
    spaces: Vec<FExampleSpace>,
    extract_tools: Vec<GrammarEnumerateTool>,
    lift_tools: Vec<GrammarEnumerateTool>,
    combine_components: Vec<crate::grammar::Component>,
    region_contents: Vec<Ty>,
    fres: Vec<FRes>,
    compress_res: Vec<CompressRes>,
    build_ctx: TermBuildCtx,
    synth: Box<dyn UnitSynthesizer>,
}

impl<'i> AutoLifterSolver<'i> {
    pub fn new(info: &'i LiftInfo, config: &'i Config) -> Result<AutoLifterSolver<'i>> {
        AutoLifterSolver::with_synthesizer(info, config, Box::new(DeterminationSynthesizer))
    }

    pub fn with_synthesizer(
        info: &'i LiftInfo,
        config: &'i Config,
        synth: Box<dyn UnitSynthesizer>,
    ) -> Result<AutoLifterSolver<'i>> {
        let pool_components = collect_components(&info.program, config)?;
        let build_ctx = TermBuildCtx::new(info, &pool_components);
        let limit = config.enum_size_limit;

        let mut region_contents = Vec::with_capacity(info.region_num);
        let mut lift_tools = Vec::with_capacity(info.region_num);
        for region in 0..info.region_num {
            let content_ty = info.region_content_type(region)?;
            let mut inputs = vec![content_ty.clone()];
            inputs.extend(info.global_types.iter().cloned());
            let grammar = build_grammar(
                &inputs,
                &pool_components.compress,
                None,
                &OutputFilter::Primary,
                limit,
            )?;
            lift_tools.push(GrammarEnumerateTool::new(grammar));
            region_contents.push(content_ty);
        }

        let mut extract_tools = Vec::with_capacity(info.rewrite_infos.len());
        for rewrite in &info.rewrite_infos {
            let mut inputs: Vec<Ty> = rewrite.inp_types.iter().map(|(_, ty)| ty.clone()).collect();
            inputs.extend(info.global_types.iter().cloned());
            let grammar = build_grammar(
                &inputs,
                &pool_components.extract,
                Some(rewrite.command_id),
                &OutputFilter::PrimaryOrCompress,
                limit,
            )?;
            extract_tools.push(GrammarEnumerateTool::new(grammar));
        }

        let rewrite_num = info.rewrite_infos.len();
        Ok(AutoLifterSolver {
            info,
            config,
            pool: ExamplePool::new(info, config),
            spaces: (0..rewrite_num).map(FExampleSpace::new).collect(),
            extract_tools,
            lift_tools,
            combine_components: pool_components.combine,
            region_contents,
            fres: (0..info.region_num).map(|_| FRes::default()).collect(),
            compress_res: (0..rewrite_num).map(|_| CompressRes::default()).collect(),
            build_ctx,
            synth,
        })
    }

    pub fn fres(&self) -> &[FRes] {
        &self.fres
    }

    pub fn compress_res(&self) -> &[CompressRes] {
        &self.compress_res
    }

    fn init_examples(&mut self) -> Result<()> {
        for rewrite_id in 0..self.info.rewrite_infos.len() {
            let guard = TimeGuard::new(self.config.example_timeout);
            self.pool
                .generate_batched(rewrite_id, self.config.init_example_num, &guard)?;
            self.spaces[rewrite_id].extend(&self.pool);
        }
        Ok(())
    }

    fn solve_unit(
        &mut self,
        rewrite_id: usize,
        unit: &OutputUnit,
        component: Option<&TypedProgram>,
    ) -> Result<()> {
        let num = self.spaces[rewrite_id].len();
        let mut indices = Vec::new();
        let mut targets = Vec::new();
        for i in 0..num {
            let target = match component {
                None => self.spaces[rewrite_id].leaf_value(&unit.path, i),
                Some(comp) => self.spaces[rewrite_id].component_value(&unit.path, comp, i),
            };
            // A faulting component value drops that example from the task.
            if let Ok(value) = target {
                indices.push(i);
                targets.push(value);
            }
        }
        let target_ty = match component {
            None => unit.ty.clone(),
            Some(comp) => comp.ty.clone(),
        };

        let AutoLifterSolver { spaces, extract_tools, lift_tools, synth, .. } = self;
        let found = synth.synthesize(PlpTask {
            space: &mut spaces[rewrite_id],
            extract_tool: &mut extract_tools[rewrite_id],
            lift_tools,
            indices,
            targets,
            target_ty,
        })?;

        for candidate in found {
            debug!(
                target: "solver",
                "rewrite #{} path {:?}: extraction {}{}",
                rewrite_id,
                unit.path,
                candidate.extract.prog,
                match &candidate.lift {
                    Some((region, lift)) => format!(" lifted by {} (region #{})", lift.prog, region),
                    None => String::new(),
                }
            );
            self.compress_res[rewrite_id].insert(candidate.extract);
            if let Some((region, lift)) = candidate.lift {
                self.fres[region].insert(lift);
            }
        }
        Ok(())
    }

    /// The lifting fixpoint of the whole program: seed every non-region
    /// output leaf, then propagate each accepted lifting function as a
    /// new target at every region leaf until a full pass extends
    /// nothing.
    pub fn solve_auxiliary_programs(&mut self) -> Result<()> {
        let units: Vec<Vec<OutputUnit>> = self
            .info
            .rewrite_infos
            .iter()
            .map(|rewrite| unfold_output_type(&rewrite.oup_type))
            .collect();

        for (rewrite_id, rewrite_units) in units.iter().enumerate() {
            for unit in rewrite_units {
                if unit.ty.compress_id().is_none() {
                    self.solve_unit(rewrite_id, unit, None)?;
                }
            }
        }

        loop {
            let mut progressed = false;
            for region in 0..self.info.region_num {
                let mut entry_id = 0;
                while entry_id < self.fres[region].entries.len() {
                    if self.fres[region].entries[entry_id].is_extended {
                        entry_id += 1;
                        continue;
                    }
                    self.fres[region].entries[entry_id].is_extended = true;
                    progressed = true;
                    let component = self.fres[region].entries[entry_id].program.clone();
                    for (rewrite_id, rewrite_units) in units.iter().enumerate() {
                        for unit in rewrite_units {
                            if unit.ty.compress_id() == Some(region) {
                                self.solve_unit(rewrite_id, unit, Some(&component))?;
                            }
                        }
                    }
                    entry_id += 1;
                }
            }
            if !progressed {
                break;
            }
        }

        for (region, res) in self.fres.iter().enumerate() {
            info!(
                target: "solver",
                "region #{}: {} lifting function(s)",
                region,
                res.len()
            );
        }
        Ok(())
    }

    /// Per region, assembles the lift function term over a fresh content
    /// variable; the globals stay free.
    fn build_lift_results(&self) -> Result<(Vec<Ty>, Vec<TermRef>)> {
        let mut lift_types = Vec::with_capacity(self.info.region_num);
        let mut lift_terms = Vec::with_capacity(self.info.region_num);
        for region in 0..self.info.region_num {
            let content = fresh_name("w", &self.info.global_names);
            let mut params = vec![(Term::var(&content), self.region_contents[region].clone())];
            for (name, ty) in self.info.global_names.iter().zip(&self.info.global_types) {
                params.push((Term::var(name), ty.clone()));
            }
            let mut terms = Vec::new();
            let mut tys = Vec::new();
            for entry in &self.fres[region].entries {
                let (term, ty) = build_term(&entry.program.prog, &params, &self.build_ctx)?;
                terms.push(term);
                tys.push(ty);
            }
            let (summary_ty, body) = match terms.len() {
                0 => (Ty::Unit, Term::value(Value::Unit)),
                1 => (tys.remove(0), terms.remove(0)),
                _ => (Ty::Tuple(tys), Arc::new(Term::Tuple(terms))),
            };
            lift_types.push(summary_ty);
            lift_terms.push(Term::func(&content, body));
        }
        Ok((lift_types, lift_terms))
    }

    /// Runs the whole pipeline: examples, lifting fixpoint, combinators,
    /// final term assembly.
    pub fn solve(&mut self) -> Result<Solution> {
        info!(
            target: "solver",
            "solving: {} rewrite point(s), {} region(s)",
            self.info.rewrite_infos.len(),
            self.info.region_num
        );
        self.init_examples()?;
        self.solve_auxiliary_programs()?;
        let mut combine_terms = Vec::with_capacity(self.info.rewrite_infos.len());
        for rewrite_id in 0..self.info.rewrite_infos.len() {
            combine_terms.push(self.synthesize_combinator(rewrite_id)?);
        }
        let (lift_types, lift_terms) = self.build_lift_results()?;
        Ok(Solution { lift_types, lift_terms, combine_terms })
    }
}
