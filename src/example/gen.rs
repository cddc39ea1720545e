use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::lang::{Symbol, Ty, Value};
use crate::util::error::{Error, ErrorKind, Result};

/// One way to spend a size budget on a value of some type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SplitScheme {
    /// Budget per field (empty for scalar leaves).
    Fields(Vec<usize>),
    /// Constructor choice; the remaining budget goes to its content.
    Cons(Symbol, Ty),
}

pub type SplitList = Arc<Vec<SplitScheme>>;

/// Type-driven random value generator. For every (type, size) pair it
/// memoizes the complete set of budget splits, so drawing is uniform over
/// constructors that can actually fill the budget and always terminates.
pub struct SizeSafeGen {
    size_limit: usize,
    int_min: i64,
    int_max: i64,
    cons_map: HashMap<Symbol, Vec<(Symbol, Ty)>>,
    split_map: HashMap<(String, usize), SplitList>,
    rng: StdRng,
}

impl SizeSafeGen {
    pub fn new(config: &Config, cons_map: HashMap<Symbol, Vec<(Symbol, Ty)>>) -> SizeSafeGen {
        SizeSafeGen {
            size_limit: config.data_size_limit,
            int_min: config.int_min,
            int_max: config.int_max,
            cons_map,
            split_map: HashMap::new(),
            rng: StdRng::seed_from_u64(config.random_seed),
        }
    }

    pub fn random_int(&mut self) -> Value {
        Value::Int(self.rng.gen_range(self.int_min..=self.int_max))
    }

    pub fn random_bool(&mut self) -> Value {
        Value::Bool(self.rng.gen())
    }

    /// Uniform index below `n`.
    pub fn pick(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }

    /// Every way to distribute exactly `size` units over a value of
    /// `ty`. A scalar leaf absorbs whatever budget lands on it; a
    /// constructor costs one unit before its content.
    pub fn possible_splits(&mut self, ty: &Ty, size: usize) -> Result<SplitList> {
        let key = (ty.to_string(), size);
        if let Some(cached) = self.split_map.get(&key) {
            return Ok(cached.clone());
        }
        let mut res = Vec::new();
        match ty {
            Ty::Unit | Ty::Bool | Ty::Int => {
                res.push(SplitScheme::Fields(Vec::new()));
            }
            Ty::Tuple(fields) => {
                let mut choices = Vec::with_capacity(fields.len());
                for field in fields {
                    let mut field_choices = Vec::new();
                    for budget in 0..=size {
                        if !self.possible_splits(field, budget)?.is_empty() {
                            field_choices.push(budget);
                        }
                    }
                    choices.push(field_choices);
                }
                let mut current = vec![0usize; fields.len()];
                collect_combinations(0, size, &choices, &mut current, &mut res);
            }
            Ty::Ind(name) => {
                if size > 0 {
                    let cons_list = self.cons_map.get(name).cloned().ok_or_else(|| {
                        Error::with_message(
                            ErrorKind::Elaboration,
                            format!("unknown inductive type {}", name),
                        )
                    })?;
                    for (cons_name, content_ty) in cons_list {
                        if !self.possible_splits(&content_ty, size - 1)?.is_empty() {
                            res.push(SplitScheme::Cons(cons_name, content_ty));
                        }
                    }
                }
            }
            Ty::Compress(_, body) => {
                if !self.possible_splits(body, size)?.is_empty() {
                    res.push(SplitScheme::Fields(vec![size]));
                }
            }
            Ty::Arrow(_, _) => {
                return Err(Error::with_message(
                    ErrorKind::Elaboration,
                    format!("cannot generate a value of function type {}", ty),
                ))
            }
        }
        let res = Arc::new(res);
        self.split_map.insert(key, res.clone());
        Ok(res)
    }

    /// Random value of `ty` with a uniformly drawn feasible AST size.
    pub fn random_value(&mut self, ty: &Ty) -> Result<Value> {
        let feasible: Vec<usize> = (0..=self.size_limit)
            .filter_map(|size| match self.possible_splits(ty, size) {
                Ok(splits) if !splits.is_empty() => Some(Ok(size)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
            .collect::<Result<_>>()?;
        if feasible.is_empty() {
            return Err(Error::with_message(
                ErrorKind::Elaboration,
                format!("no value of type {} fits within size {}", ty, self.size_limit),
            ));
        }
        let size = feasible[self.rng.gen_range(0..feasible.len())];
        self.random_value_sized(ty, size)
    }

    pub fn random_value_sized(&mut self, ty: &Ty, size: usize) -> Result<Value> {
        let splits = self.possible_splits(ty, size)?;
        if splits.is_empty() {
            return Err(Error::with_message(
                ErrorKind::Internal,
                format!("no split for {} at size {}", ty, size),
            ));
        }
        let scheme = splits[self.rng.gen_range(0..splits.len())].clone();
        match ty {
            Ty::Unit => Ok(Value::Unit),
            Ty::Bool => Ok(self.random_bool()),
            Ty::Int => Ok(self.random_int()),
            Ty::Tuple(fields) => {
                let budgets = match scheme {
                    SplitScheme::Fields(budgets) => budgets,
                    _ => return Err(ErrorKind::Internal.into()),
                };
                let mut values = Vec::with_capacity(fields.len());
                for (field, budget) in fields.iter().zip(budgets) {
                    values.push(self.random_value_sized(field, budget)?);
                }
                Ok(Value::Tuple(values))
            }
            Ty::Ind(_) => {
                let (cons_name, content_ty) = match scheme {
                    SplitScheme::Cons(name, ty) => (name, ty),
                    _ => return Err(ErrorKind::Internal.into()),
                };
                let content = self.random_value_sized(&content_ty, size - 1)?;
                Ok(Value::ind(&cons_name, content))
            }
            Ty::Compress(id, body) => {
                let content = self.random_value_sized(body, size)?;
                Ok(Value::compress(*id, content))
            }
            Ty::Arrow(_, _) => Err(ErrorKind::Internal.into()),
        }
    }
}

fn collect_combinations(
    pos: usize,
    budget: usize,
    choices: &[Vec<usize>],
    current: &mut Vec<usize>,
    out: &mut Vec<SplitScheme>,
) {
    if pos == choices.len() {
        if budget == 0 {
            out.push(SplitScheme::Fields(current.clone()));
        }
        return;
    }
    for &choice in &choices[pos] {
        if choice <= budget {
            current[pos] = choice;
            collect_combinations(pos + 1, budget - choice, choices, current, out);
        }
    }
}
