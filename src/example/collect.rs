use std::sync::Arc;

use log::warn;

use crate::analysis::LiftInfo;
use crate::lang::eval::{build_context, Evaluator, RewriteObserver};
use crate::lang::{Context, Symbol, TermRef, Value};
use crate::util::error::Result;

/// Executes the reference program under a recording evaluator,
/// snapshotting every rewrite point it passes. One collector is owned by
/// one worker; batches are handed to the pool through `take`.
pub struct Collector {
    cared_vars: Vec<Vec<Symbol>>,
    pub batch: Vec<Vec<super::Example>>,
    current_global: Vec<Value>,
}

struct Recorder<'c> {
    cared_vars: &'c [Vec<Symbol>],
    batch: &'c mut Vec<Vec<super::Example>>,
    current_global: &'c [Value],
}

impl RewriteObserver for Recorder<'_> {
    fn on_rewrite(&mut self, id: usize, ctx: &Context, output: &Value) {
        let mut local_inputs = Vec::with_capacity(self.cared_vars[id].len());
        for name in &self.cared_vars[id] {
            match ctx.lookup(name) {
                Some(value) => local_inputs.push(value.clone()),
                None => {
                    warn!(target: "example", "rewrite #{} misses input {}", id, name);
                    return;
                }
            }
        }
        self.batch[id].push(super::Example {
            rewrite_id: id,
            local_inputs,
            global_inputs: self.current_global.to_vec(),
            output: output.clone(),
        });
    }
}

impl Collector {
    pub fn new(info: &LiftInfo) -> Collector {
        Collector {
            cared_vars: info.cared_vars(),
            batch: vec![Vec::new(); info.rewrite_infos.len()],
            current_global: Vec::new(),
        }
    }

    /// Runs the program on one start term. A semantic fault discards
    /// everything the faulted run recorded.
    pub fn collect(&mut self, info: &LiftInfo, start: &TermRef, globals: Vec<Value>) -> Result<()> {
        let marks: Vec<usize> = self.batch.iter().map(Vec::len).collect();
        self.current_global = globals;
        let named: Vec<(String, Value)> = info
            .global_names
            .iter()
            .cloned()
            .zip(self.current_global.iter().cloned())
            .collect();

        let mut recorder = Recorder {
            cared_vars: &self.cared_vars,
            batch: &mut self.batch,
            current_global: &self.current_global,
        };
        let mut eval = Evaluator::with_observer(&mut recorder);
        let run: Result<()> = build_context(&info.program, &named, &mut eval)
            .and_then(|ctx| eval.eval(start, &ctx).map(|_| ()));
        if let Err(e) = run {
            for (list, mark) in self.batch.iter_mut().zip(marks) {
                list.truncate(mark);
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn recorded(&self, rewrite_id: usize) -> usize {
        self.batch[rewrite_id].len()
    }

    pub fn take(&mut self) -> Vec<Vec<super::Example>> {
        let empty = vec![Vec::new(); self.batch.len()];
        std::mem::replace(&mut self.batch, empty)
    }
}

/// Convenience used by tests and single-shot generation: collect one run
/// into fresh example lists.
pub fn collect_once(
    info: &LiftInfo,
    start: &TermRef,
    globals: Vec<Value>,
) -> Result<Vec<Vec<super::ExampleRef>>> {
    let mut collector = Collector::new(info);
    collector.collect(info, start, globals)?;
    Ok(collector
        .take()
        .into_iter()
        .map(|list| list.into_iter().map(Arc::new).collect())
        .collect())
}
