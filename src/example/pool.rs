use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, trace};

use crate::analysis::LiftInfo;
use crate::config::Config;
use crate::lang::{Term, TermRef, Value};
use crate::util::error::{Error, Result};
use crate::util::time::TimeGuard;

use super::collect::Collector;
use super::gen::SizeSafeGen;
use super::{Example, ExampleRef};

/// Unproductive merge attempts tolerated before a rewrite point is
/// marked permanently under-supplied.
const MAX_FAILED_ATTEMPT: usize = 500;

/// Shared, growable store of deduplicated examples per rewrite point.
pub struct ExamplePool<'i> {
    info: &'i LiftInfo,
    thread_num: usize,
    batch_factor: usize,
    gen: SizeSafeGen,
    pub examples: Vec<Vec<ExampleRef>>,
    existing: Vec<HashSet<String>>,
    finished: Vec<bool>,
}

fn lock_or_inner<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn generate_start(info: &LiftInfo, gen: &mut SizeSafeGen) -> Result<(TermRef, Vec<Value>)> {
    let mut globals = Vec::with_capacity(info.global_types.len());
    for ty in &info.global_types {
        globals.push(gen.random_value(ty)?);
    }
    let pick = gen.pick(info.start_list.len());
    let (name, params) = &info.start_list[pick];
    let mut term = Term::var(name);
    for param_ty in params {
        let arg = gen.random_value(param_ty)?;
        term = Term::app(term, Term::value(arg));
    }
    Ok((term, globals))
}

struct ResultState<'p> {
    examples: &'p mut Vec<Vec<ExampleRef>>,
    existing: &'p mut Vec<HashSet<String>>,
    attempt_num: usize,
    all_finished: bool,
    error: Option<Error>,
}

fn merge_into(
    examples: &mut [Vec<ExampleRef>],
    existing: &mut [HashSet<String>],
    main_id: usize,
    batch: Vec<Vec<Example>>,
    guard: &TimeGuard,
) {
    let order =
        std::iter::once(main_id).chain((0..examples.len()).filter(|&i| i != main_id));
    let mut batch: Vec<Option<Vec<Example>>> = batch.into_iter().map(Some).collect();
    for rewrite_id in order {
        let list = match batch.get_mut(rewrite_id).and_then(Option::take) {
            Some(list) => list,
            None => continue,
        };
        for (example_id, example) in list.into_iter().enumerate() {
            let feature = example.to_string();
            if existing[rewrite_id].insert(feature) {
                examples[rewrite_id].push(Arc::new(example));
            }
            if example_id & 255 == 255 && guard.expired() {
                return;
            }
        }
    }
}

impl<'i> ExamplePool<'i> {
    pub fn new(info: &'i LiftInfo, config: &Config) -> ExamplePool<'i> {
        let num = info.rewrite_infos.len();
        ExamplePool {
            info,
            thread_num: config.thread_num.max(1),
            batch_factor: 100,
            gen: SizeSafeGen::new(config, info.cons_map.clone()),
            examples: vec![Vec::new(); num],
            existing: vec![HashSet::new(); num],
            finished: vec![false; num],
        }
    }

    pub fn merge(&mut self, main_id: usize, collector: &mut Collector, guard: &TimeGuard) {
        let batch = collector.take();
        merge_into(&mut self.examples, &mut self.existing, main_id, batch, guard);
    }

    pub fn is_finished(&self, rewrite_id: usize) -> bool {
        self.finished[rewrite_id]
    }

    /// Grows the pool for `rewrite_id` until `target_num` examples exist,
    /// the deadline expires, or generation stops being productive. A
    /// satisfied target returns immediately without spawning workers.
    pub fn generate_batched(
        &mut self,
        rewrite_id: usize,
        target_num: usize,
        guard: &TimeGuard,
    ) -> Result<()> {
        if self.finished[rewrite_id] || target_num <= self.examples[rewrite_id].len() {
            return Ok(());
        }
        debug!(
            target: "example",
            "batched collection for rewrite #{}: {} -> {}",
            rewrite_id,
            self.examples[rewrite_id].len(),
            target_num
        );

        let info = self.info;
        let thread_num = self.thread_num;
        let refill_num = thread_num * self.batch_factor;
        let input = Mutex::new((VecDeque::new(), &mut self.gen));
        let result = Mutex::new(ResultState {
            examples: &mut self.examples,
            existing: &mut self.existing,
            attempt_num: 0,
            all_finished: false,
            error: None,
        });

        std::thread::scope(|scope| {
            for _ in 0..thread_num {
                scope.spawn(|| {
                    let mut collector = Collector::new(info);
                    while !guard.expired() {
                        if let Ok(mut res) = result.try_lock() {
                            if res.all_finished || res.error.is_some() {
                                break;
                            }
                            let batch = collector.take();
                            let ResultState { examples, existing, .. } = &mut *res;
                            let pre_size = examples[rewrite_id].len();
                            merge_into(examples, existing, rewrite_id, batch, guard);
                            if examples[rewrite_id].len() == pre_size {
                                res.attempt_num += 1;
                                if res.attempt_num >= MAX_FAILED_ATTEMPT {
                                    res.all_finished = true;
                                }
                            } else {
                                res.attempt_num = 0;
                            }
                            if res.examples[rewrite_id].len() >= target_num || res.all_finished {
                                break;
                            }
                        }

                        let next = {
                            let mut inp = lock_or_inner(&input);
                            if inp.0.is_empty() {
                                for _ in 0..refill_num {
                                    match generate_start(info, inp.1) {
                                        Ok(item) => inp.0.push_back(item),
                                        Err(e) => {
                                            lock_or_inner(&result).error.get_or_insert(e);
                                            return;
                                        }
                                    }
                                }
                            }
                            inp.0.pop_front()
                        };
                        let (start, globals) = match next {
                            Some(item) => item,
                            None => continue,
                        };

                        // A faulted run was already rolled back; just move on.
                        let _ = collector.collect(info, &start, globals);
                    }
                });
            }
        });

        let mut res = lock_or_inner(&result);
        if let Some(e) = res.error.take() {
            return Err(e);
        }
        if res.all_finished || res.examples[rewrite_id].len() < target_num {
            // Deadline or productivity cutoff: this point stays as-is.
            self.finished[rewrite_id] = true;
        }
        trace!(
            target: "example",
            "rewrite #{} now holds {} examples (finished: {})",
            rewrite_id,
            res.examples[rewrite_id].len(),
            self.finished[rewrite_id]
        );
        Ok(())
    }
}
