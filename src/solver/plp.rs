use log::trace;

use crate::grammar::{GrammarEnumerateTool, TypedProgram};
use crate::lang::{Ty, Value};
use crate::util::error::{Error, ErrorKind, Result};

use super::space::FExampleSpace;

/// An auxiliary program discovered for one output leaf: an extraction
/// over the rewrite point's inputs, optionally composed with a lifting
/// program over the extracted region's content.
pub struct AuxCandidate {
    pub extract: TypedProgram,
    pub lift: Option<(usize, TypedProgram)>,
}

/// One per-leaf synthesis obligation. `indices` selects the examples
/// whose target value could be computed; `targets` is aligned with it.
pub struct PlpTask<'a> {
    pub space: &'a mut FExampleSpace,
    pub extract_tool: &'a mut GrammarEnumerateTool,
    /// Lifting enumerators, indexed by region id.
    pub lift_tools: &'a mut Vec<GrammarEnumerateTool>,
    pub indices: Vec<usize>,
    pub targets: Vec<Value>,
    pub target_ty: Ty,
}

/// Seam for the per-leaf synthesizer; the solver is parameterized over
/// it so a different search strategy can be plugged in.
pub trait UnitSynthesizer {
    fn synthesize(&mut self, task: PlpTask<'_>) -> Result<Vec<AuxCandidate>>;
}

/// Default per-leaf synthesizer. Enumerates auxiliary programs by
/// increasing total size; a candidate whose values match the targets
/// exactly is returned alone, otherwise candidates are accepted greedily
/// until the selected set functionally determines the target, i.e. no
/// two examples agree on every selected value but disagree on the
/// target.
pub struct DeterminationSynthesizer;

struct Candidate {
    extract: TypedProgram,
    lift: Option<(usize, TypedProgram)>,
    values: Vec<Value>,
}

impl DeterminationSynthesizer {
    fn candidate_values(
        space: &mut FExampleSpace,
        extract: &TypedProgram,
        lift: Option<&TypedProgram>,
        indices: &[usize],
    ) -> Option<Vec<Value>> {
        let mut values = Vec::with_capacity(indices.len());
        for &i in indices {
            // An evaluation fault disqualifies the candidate.
            match space.run_aux(extract, lift, i) {
                Ok(v) => values.push(v),
                Err(_) => return None,
            }
        }
        Some(values)
    }

    fn candidates_of_size(
        task: &mut PlpTask<'_>,
        total: usize,
    ) -> Vec<Candidate> {
        let mut res = Vec::new();
        let extracts: Vec<TypedProgram> = task
            .extract_tool
            .acquire_programs(total)
            .map(|list| list.to_vec())
            .unwrap_or_default();
        for extract in extracts {
            if extract.ty.compress_id().is_some() {
                continue;
            }
            if let Some(values) =
                Self::candidate_values(task.space, &extract, None, &task.indices)
            {
                res.push(Candidate { extract, lift: None, values });
            }
        }
        for extract_size in 1..total {
            let extracts: Vec<TypedProgram> = task
                .extract_tool
                .acquire_programs(extract_size)
                .map(|list| list.to_vec())
                .unwrap_or_default();
            for extract in extracts {
                let region = match extract.ty.compress_id() {
                    Some(region) => region,
                    None => continue,
                };
                let lifts: Vec<TypedProgram> = task.lift_tools[region]
                    .acquire_programs(total - extract_size)
                    .map(|list| list.to_vec())
                    .unwrap_or_default();
                for lift in lifts {
                    if let Some(values) =
                        Self::candidate_values(task.space, &extract, Some(&lift), &task.indices)
                    {
                        res.push(Candidate {
                            extract: extract.clone(),
                            lift: Some((region, lift)),
                            values,
                        });
                    }
                }
            }
        }
        res
    }
}

impl UnitSynthesizer for DeterminationSynthesizer {
    fn synthesize(&mut self, mut task: PlpTask<'_>) -> Result<Vec<AuxCandidate>> {
        // Conflict pairs: example index pairs the selected set must still
        // learn to distinguish.
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for i in 0..task.targets.len() {
            for j in i + 1..task.targets.len() {
                if task.targets[i] != task.targets[j] {
                    pairs.push((i, j));
                }
            }
        }
        if pairs.is_empty() {
            // Constant targets are determined by the empty set.
            return Ok(Vec::new());
        }

        let lift_limit = task
            .lift_tools
            .iter()
            .map(GrammarEnumerateTool::size_limit)
            .max()
            .unwrap_or(0);
        let max_total = task.extract_tool.size_limit() + lift_limit;
        let mut selected: Vec<AuxCandidate> = Vec::new();

        for total in 1..=max_total {
            for candidate in Self::candidates_of_size(&mut task, total) {
                let result_ty = match &candidate.lift {
                    Some((_, lift)) => &lift.ty,
                    None => &candidate.extract.ty,
                };
                if *result_ty == task.target_ty && candidate.values == task.targets {
                    trace!(
                        target: "solver",
                        "leaf solved exactly by {}",
                        candidate.extract.prog
                    );
                    return Ok(vec![AuxCandidate {
                        extract: candidate.extract,
                        lift: candidate.lift,
                    }]);
                }
                let before = pairs.len();
                pairs.retain(|&(i, j)| candidate.values[i] == candidate.values[j]);
                if pairs.len() < before {
                    selected.push(AuxCandidate {
                        extract: candidate.extract,
                        lift: candidate.lift,
                    });
                    if pairs.is_empty() {
                        trace!(
                            target: "solver",
                            "leaf determined by {} auxiliary programs",
                            selected.len()
                        );
                        return Ok(selected);
                    }
                }
            }
        }
        Err(Error::new_const(
            ErrorKind::Exhausted,
            "no auxiliary program set determines the target leaf",
        ))
    }
}
