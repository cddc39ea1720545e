use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::grammar::{build_grammar, GrammarEnumerateTool, OutputFilter, TypedProgram};
use crate::lang::{Symbol, Term, TermRef, Ty, Value};
use crate::util::error::{Error, ErrorKind, Result};
use crate::util::time::TimeGuard;

use super::{build_term, fresh_name, unfold_output_type, AutoLifterSolver};

/// Where one combinator input comes from: a scalar extraction, or one
/// component of a region extraction's lifted summary.
enum InputSource {
    Extract { index: usize },
    LiftComp { index: usize, comp: usize, comp_num: usize },
}

/// One synthesis target of the combinator: a direct output leaf, or an
/// accepted component applied to a region leaf's content.
struct LeafTarget {
    path: Vec<usize>,
    ty: Ty,
    comp_prog: Option<TypedProgram>,
}

impl<'i> AutoLifterSolver<'i> {
    /// Synthesizes the replacement term of one rewrite point: per-leaf
    /// candidates from the combinator grammar, merged into the output
    /// shape, verified against a doubling example set.
    pub(super) fn synthesize_combinator(&mut self, rewrite_id: usize) -> Result<TermRef> {
        let units = unfold_output_type(&self.info.rewrite_infos[rewrite_id].oup_type);
        let mut leaves = Vec::new();
        for unit in &units {
            match unit.ty.compress_id() {
                None => leaves.push(LeafTarget {
                    path: unit.path.clone(),
                    ty: unit.ty.clone(),
                    comp_prog: None,
                }),
                Some(region) => {
                    for entry in &self.fres[region].entries {
                        leaves.push(LeafTarget {
                            path: unit.path.clone(),
                            ty: entry.program.ty.clone(),
                            comp_prog: Some(entry.program.clone()),
                        });
                    }
                }
            }
        }

        let mut sources = Vec::new();
        let mut input_progs: Vec<(TypedProgram, Option<TypedProgram>)> = Vec::new();
        let mut input_tys = Vec::new();
        for (index, program) in self.compress_res[rewrite_id].programs.iter().enumerate() {
            match program.ty.compress_id() {
                None => {
                    sources.push(InputSource::Extract { index });
                    input_progs.push((program.clone(), None));
                    input_tys.push(program.ty.clone());
                }
                Some(region) => {
                    let comp_num = self.fres[region].len();
                    for comp in 0..comp_num {
                        let lift = self.fres[region].entries[comp].program.clone();
                        sources.push(InputSource::LiftComp { index, comp, comp_num });
                        input_tys.push(lift.ty.clone());
                        input_progs.push((program.clone(), Some(lift)));
                    }
                }
            }
        }

        let gate = Some(self.info.rewrite_infos[rewrite_id].command_id);
        let mut tools: HashMap<Ty, GrammarEnumerateTool> = HashMap::new();
        for leaf in &leaves {
            if !tools.contains_key(&leaf.ty) {
                let grammar = build_grammar(
                    &input_tys,
                    &self.combine_components,
                    gate,
                    &OutputFilter::Exact(leaf.ty.clone()),
                    self.config.enum_size_limit,
                )?;
                tools.insert(leaf.ty.clone(), GrammarEnumerateTool::new(grammar));
            }
        }

        let guard = TimeGuard::new(self.config.verify_timeout);
        let mut target_num = self
            .config
            .init_example_num
            .max(self.spaces[rewrite_id].len())
            .max(1);
        loop {
            let leaf_progs = self.solve_leaves(rewrite_id, &leaves, &input_progs, &mut tools)?;
            // Stress the candidate on a doubled example set before
            // accepting it.
            target_num *= 2;
            let example_guard = TimeGuard::new(self.config.example_timeout);
            self.pool.generate_batched(rewrite_id, target_num, &example_guard)?;
            self.spaces[rewrite_id].extend(&self.pool);
            if self.check_leaves(rewrite_id, &leaves, &input_progs, &leaf_progs)? {
                debug!(
                    target: "solver",
                    "combinator for rewrite #{} verified on {} examples",
                    rewrite_id,
                    self.spaces[rewrite_id].len()
                );
                return self.assemble(rewrite_id, &leaves, &leaf_progs, &sources, &input_tys);
            }
            if guard.expired() {
                return Err(Error::with_message(
                    ErrorKind::Timeout,
                    format!("combinator search for rewrite #{} timed out", rewrite_id),
                ));
            }
            debug!(
                target: "solver",
                "combinator for rewrite #{} rejected, retrying with {} examples",
                rewrite_id,
                target_num
            );
        }
    }

    /// (inputs, target) rows for one leaf over the current examples;
    /// examples on which an input or the target faults are left out.
    fn leaf_rows(
        &mut self,
        rewrite_id: usize,
        leaf: &LeafTarget,
        input_progs: &[(TypedProgram, Option<TypedProgram>)],
    ) -> Vec<(Vec<Value>, Value)> {
        let num = self.spaces[rewrite_id].len();
        let mut rows = Vec::with_capacity(num);
        'example: for i in 0..num {
            let mut inputs = Vec::with_capacity(input_progs.len());
            for (extract, lift) in input_progs {
                match self.spaces[rewrite_id].run_aux(extract, lift.as_ref(), i) {
                    Ok(value) => inputs.push(value),
                    Err(_) => continue 'example,
                }
            }
            let target = match &leaf.comp_prog {
                None => self.spaces[rewrite_id].leaf_value(&leaf.path, i),
                Some(comp) => self.spaces[rewrite_id].component_value(&leaf.path, comp, i),
            };
            if let Ok(target) = target {
                rows.push((inputs, target));
            }
        }
        rows
    }

    fn solve_leaves(
        &mut self,
        rewrite_id: usize,
        leaves: &[LeafTarget],
        input_progs: &[(TypedProgram, Option<TypedProgram>)],
        tools: &mut HashMap<Ty, GrammarEnumerateTool>,
    ) -> Result<Vec<TypedProgram>> {
        let mut res = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let rows = self.leaf_rows(rewrite_id, leaf, input_progs);
            let tool = tools.get_mut(&leaf.ty).ok_or(ErrorKind::Internal)?;
            let mut found = None;
            'size: for size in 1..=tool.size_limit() {
                let programs: Vec<TypedProgram> =
                    tool.acquire_programs(size).map(|l| l.to_vec()).unwrap_or_default();
                for program in programs {
                    let consistent = rows.iter().all(|(inputs, target)| {
                        matches!(program.prog.run(inputs), Ok(v) if &v == target)
                    });
                    if consistent {
                        found = Some(program);
                        break 'size;
                    }
                }
            }
            match found {
                Some(program) => res.push(program),
                None => {
                    return Err(Error::with_message(
                        ErrorKind::Exhausted,
                        format!(
                            "no combinator candidate for rewrite #{} at path {:?}",
                            rewrite_id, leaf.path
                        ),
                    ))
                }
            }
        }
        Ok(res)
    }

    /// Replays every held example through the per-leaf candidates.
    fn check_leaves(
        &mut self,
        rewrite_id: usize,
        leaves: &[LeafTarget],
        input_progs: &[(TypedProgram, Option<TypedProgram>)],
        leaf_progs: &[TypedProgram],
    ) -> Result<bool> {
        for (leaf, program) in leaves.iter().zip(leaf_progs) {
            let rows = self.leaf_rows(rewrite_id, leaf, input_progs);
            let consistent = rows.iter().all(|(inputs, target)| {
                matches!(program.prog.run(inputs), Ok(v) if &v == target)
            });
            if !consistent {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Final term assembly: extraction results bound to fresh names in
    /// declaration order (trivial var/constant extractions used inline),
    /// multi-component summaries projected, leaf terms merged back into
    /// the output's shape.
    fn assemble(
        &self,
        rewrite_id: usize,
        leaves: &[LeafTarget],
        leaf_progs: &[TypedProgram],
        sources: &[InputSource],
        input_tys: &[Ty],
    ) -> Result<TermRef> {
        let rewrite = &self.info.rewrite_infos[rewrite_id];
        let mut used: Vec<Symbol> = rewrite.inp_types.iter().map(|(n, _)| n.clone()).collect();
        used.extend(self.info.global_names.iter().cloned());
        let mut params: Vec<(TermRef, Ty)> = rewrite
            .inp_types
            .iter()
            .map(|(name, ty)| (Term::var(name), ty.clone()))
            .collect();
        for (name, ty) in self.info.global_names.iter().zip(&self.info.global_types) {
            params.push((Term::var(name), ty.clone()));
        }

        let mut lets: Vec<(Symbol, TermRef)> = Vec::new();
        let mut bases: Vec<TermRef> = Vec::new();
        for (index, program) in self.compress_res[rewrite_id].programs.iter().enumerate() {
            let (term, _) = build_term(&program.prog, &params, &self.build_ctx)?;
            if term.is_symbolic() {
                bases.push(term);
            } else {
                let name = fresh_name(&format!("c{}", index), &used);
                used.push(name.clone());
                bases.push(Term::var(&name));
                lets.push((name, term));
            }
        }

        let mut input_terms: Vec<(TermRef, Ty)> = Vec::with_capacity(sources.len());
        for (source, ty) in sources.iter().zip(input_tys) {
            let term = match source {
                InputSource::Extract { index } => bases[*index].clone(),
                InputSource::LiftComp { index, comp, comp_num } => {
                    if *comp_num == 1 {
                        bases[*index].clone()
                    } else {
                        Arc::new(Term::Proj(bases[*index].clone(), *comp, *comp_num))
                    }
                }
            };
            input_terms.push((term, ty.clone()));
        }

        let mut by_path: HashMap<Vec<usize>, Vec<TermRef>> = HashMap::new();
        for (leaf, program) in leaves.iter().zip(leaf_progs) {
            let (term, _) = build_term(&program.prog, &input_terms, &self.build_ctx)?;
            by_path.entry(leaf.path.clone()).or_default().push(term);
        }
        let mut path = Vec::new();
        let body = merge_shape(&rewrite.oup_type, &mut path, &by_path);

        Ok(lets.into_iter().rev().fold(body, |body, (name, def)| {
            Arc::new(Term::Let { name, is_rec: false, def, body })
        }))
    }
}

/// Rebuilds the output's tuple shape around the per-leaf terms; a region
/// leaf becomes its summary (unit, single component, or tuple).
fn merge_shape(
    ty: &Ty,
    path: &mut Vec<usize>,
    by_path: &HashMap<Vec<usize>, Vec<TermRef>>,
) -> TermRef {
    match ty {
        Ty::Tuple(fields) => {
            let mut terms = Vec::with_capacity(fields.len());
            for (i, field) in fields.iter().enumerate() {
                path.push(i);
                terms.push(merge_shape(field, path, by_path));
                path.pop();
            }
            Arc::new(Term::Tuple(terms))
        }
        _ => {
            let mut terms = by_path.get(path.as_slice()).cloned().unwrap_or_default();
            match terms.len() {
                0 => Term::value(Value::Unit),
                1 => terms.remove(0),
                _ => Arc::new(Term::Tuple(terms)),
            }
        }
    }
}
