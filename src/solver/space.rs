use std::collections::HashMap;

use crate::example::{ExamplePool, ExampleRef};
use crate::grammar::TypedProgram;
use crate::lang::Value;
use crate::util::error::{Error, ErrorKind, Result};

/// Per-rewrite-point view of the example pool with growable result
/// caches. Examples are adopted from the pool by index, so positions are
/// stable; caches are keyed by printed program identity and filled
/// lazily, entry `i` always equaling the program run on example `i`.
pub struct FExampleSpace {
    pub rewrite_id: usize,
    pub examples: Vec<ExampleRef>,
    aux_cache: HashMap<String, Vec<Value>>,
    leaf_cache: HashMap<(Vec<usize>, String), Vec<Value>>,
}

impl FExampleSpace {
    pub fn new(rewrite_id: usize) -> FExampleSpace {
        FExampleSpace {
            rewrite_id,
            examples: Vec::new(),
            aux_cache: HashMap::new(),
            leaf_cache: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Adopts every pool example not yet held. The pool only appends, so
    /// existing indices (and with them every cache prefix) stay valid.
    pub fn extend(&mut self, pool: &ExamplePool<'_>) {
        let source = &pool.examples[self.rewrite_id];
        for example in &source[self.examples.len()..] {
            self.examples.push(example.clone());
        }
    }

    /// Inputs an extraction program sees: local bindings then globals.
    pub fn extract_inputs(&self, index: usize) -> Vec<Value> {
        let example = &self.examples[index];
        let mut inputs = example.local_inputs.clone();
        inputs.extend(example.global_inputs.iter().cloned());
        inputs
    }

    /// Runs an extraction program on example `index`, cached.
    pub fn run_extract(&mut self, program: &TypedProgram, index: usize) -> Result<Value> {
        let examples = &self.examples;
        let entry = self.aux_cache.entry(program.prog.to_string()).or_default();
        while entry.len() <= index {
            let i = entry.len();
            let example = &examples[i];
            let mut inputs = example.local_inputs.clone();
            inputs.extend(example.global_inputs.iter().cloned());
            entry.push(program.prog.run(&inputs)?);
        }
        Ok(entry[index].clone())
    }

    /// Runs an extraction composed with a lifting program: the lift sees
    /// the extracted region's content followed by the globals.
    pub fn run_aux(
        &mut self,
        extract: &TypedProgram,
        lift: Option<&TypedProgram>,
        index: usize,
    ) -> Result<Value> {
        let lift = match lift {
            None => return self.run_extract(extract, index),
            Some(lift) => lift,
        };
        let key = format!("{} . {}", lift.prog, extract.prog);
        if let Some(cached) = self.aux_cache.get(&key) {
            if index < cached.len() {
                return Ok(cached[index].clone());
            }
        }
        let extracted = self.run_extract(extract, index)?;
        let content = match extracted {
            Value::Compress(_, content) => (*content).clone(),
            v => {
                return Err(Error::with_message(
                    ErrorKind::Internal,
                    format!("lift composed with a non-region value {}", v),
                ))
            }
        };
        let mut inputs = vec![content];
        inputs.extend(self.examples[index].global_inputs.iter().cloned());
        let value = lift.prog.run(&inputs)?;
        let entry = self.aux_cache.entry(key).or_default();
        if entry.len() == index {
            entry.push(value.clone());
        }
        Ok(value)
    }

    /// Value of the output leaf at `path` (tuple descent only).
    pub fn leaf_value(&mut self, path: &[usize], index: usize) -> Result<Value> {
        let examples = &self.examples;
        let key = (path.to_vec(), String::new());
        let entry = self.leaf_cache.entry(key).or_default();
        while entry.len() <= index {
            let i = entry.len();
            entry.push(descend(&examples[i].output, path)?);
        }
        Ok(entry[index].clone())
    }

    /// Value of an accepted lift component applied to the region content
    /// found at `path` of the output, cached per (path, component).
    pub fn component_value(
        &mut self,
        path: &[usize],
        component: &TypedProgram,
        index: usize,
    ) -> Result<Value> {
        let examples = &self.examples;
        let key = (path.to_vec(), component.prog.to_string());
        let entry = self.leaf_cache.entry(key).or_default();
        while entry.len() <= index {
            let i = entry.len();
            let leaf = descend(&examples[i].output, path)?;
            let content = match leaf {
                Value::Compress(_, content) => (*content).clone(),
                v => {
                    return Err(Error::with_message(
                        ErrorKind::Internal,
                        format!("component applied to non-region output {}", v),
                    ))
                }
            };
            let mut inputs = vec![content];
            inputs.extend(examples[i].global_inputs.iter().cloned());
            entry.push(component.prog.run(&inputs)?);
        }
        Ok(entry[index].clone())
    }
}

fn descend(value: &Value, path: &[usize]) -> Result<Value> {
    let mut current = value;
    for &index in path {
        match current {
            Value::Tuple(fields) if index < fields.len() => current = &fields[index],
            v => {
                return Err(Error::with_message(
                    ErrorKind::Internal,
                    format!("output path .{} does not fit {}", index, v),
                ))
            }
        }
    }
    Ok(current.clone())
}
