use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::lang::eval::{invoke_prim, Evaluator};
use crate::lang::{Symbol, Ty, Value};
use crate::util::error::{Error, ErrorKind, Result};

/// Operator of a candidate program node.
#[derive(Clone, Debug)]
pub enum Op {
    /// Positional access into the synthesis inputs.
    Param(usize),
    Const(Value),
    /// Primary operator by name.
    Prim(Symbol),
    Ite,
    /// Tuple construction.
    Prod,
    /// Tuple projection.
    Access(usize),
    /// User component: a named top-level binding or constructor, applied
    /// to the children via the evaluator.
    Comp(Symbol, Value),
    /// Type-preserving wrapper installed on multi-type start symbols;
    /// contributes no size.
    Direct(Ty),
}

#[derive(Debug)]
pub struct ProgramData {
    pub op: Op,
    pub subs: Vec<Prog>,
}

pub type Prog = Arc<ProgramData>;

pub fn build_program(op: Op, subs: Vec<Prog>) -> Prog {
    Arc::new(ProgramData { op, subs })
}

pub fn const_program(value: Value) -> Prog {
    build_program(Op::Const(value), Vec::new())
}

pub fn param_program(index: usize) -> Prog {
    build_program(Op::Param(index), Vec::new())
}

impl ProgramData {
    /// Size units of this candidate. Glue operators (tuple construction,
    /// projection, the start wrapper) are cheap so pure rearrangement
    /// stays cheaper than real computation.
    pub fn size(&self) -> usize {
        let own = match self.op {
            Op::Prod | Op::Access(_) => 1,
            Op::Direct(_) => 0,
            _ => 1 + self.subs.len(),
        };
        own + self.subs.iter().map(|s| s.size()).sum::<usize>()
    }

    pub fn run(&self, inputs: &[Value]) -> Result<Value> {
        match &self.op {
            Op::Param(index) => inputs.get(*index).cloned().ok_or_else(|| {
                Error::with_message(
                    ErrorKind::Internal,
                    format!("program accesses missing input #{}", index),
                )
            }),
            Op::Const(value) => Ok(value.clone()),
            Op::Prim(op) => {
                let mut args = Vec::with_capacity(self.subs.len());
                for sub in &self.subs {
                    args.push(sub.run(inputs)?);
                }
                invoke_prim(op, &args)
            }
            Op::Ite => {
                let cond = self.subs[0].run(inputs)?;
                match cond.as_bool() {
                    Some(true) => self.subs[1].run(inputs),
                    Some(false) => self.subs[2].run(inputs),
                    None => Err(Error::with_message(
                        ErrorKind::Eval,
                        format!("ite condition is not a bool: {}", cond),
                    )),
                }
            }
            Op::Prod => {
                let mut fields = Vec::with_capacity(self.subs.len());
                for sub in &self.subs {
                    fields.push(sub.run(inputs)?);
                }
                Ok(Value::Tuple(fields))
            }
            Op::Access(index) => match self.subs[0].run(inputs)? {
                Value::Tuple(fields) if *index < fields.len() => Ok(fields[*index].clone()),
                v => Err(Error::with_message(
                    ErrorKind::Eval,
                    format!("access #{} into {}", index, v),
                )),
            },
            Op::Comp(_, func) => {
                let mut eval = Evaluator::new();
                let mut current = func.clone();
                for sub in &self.subs {
                    let arg = sub.run(inputs)?;
                    current = eval.apply(&current, arg)?;
                }
                Ok(current)
            }
            Op::Direct(_) => self.subs[0].run(inputs),
        }
    }
}

impl Display for ProgramData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.op {
            Op::Param(index) => write!(f, "param{}", index),
            Op::Const(value) => write!(f, "{}", value),
            Op::Prim(op) | Op::Comp(op, _) => {
                write!(f, "({}", op)?;
                for sub in &self.subs {
                    write!(f, " {}", sub)?;
                }
                write!(f, ")")
            }
            Op::Ite => write!(f, "(ite {} {} {})", self.subs[0], self.subs[1], self.subs[2]),
            Op::Prod => {
                write!(f, "(prod")?;
                for sub in &self.subs {
                    write!(f, " {}", sub)?;
                }
                write!(f, ")")
            }
            Op::Access(index) => write!(f, "(access{} {})", index, self.subs[0]),
            Op::Direct(_) => write!(f, "{}", self.subs[0]),
        }
    }
}

/// Candidate program paired with its static type.
#[derive(Clone, Debug)]
pub struct TypedProgram {
    pub ty: Ty,
    pub prog: Prog,
}

impl TypedProgram {
    pub fn new(ty: Ty, prog: Prog) -> TypedProgram {
        TypedProgram { ty, prog }
    }

    /// The single equality predicate behind every registry and cache:
    /// printed-form equality, a documented approximation of semantic
    /// equality.
    pub fn same(&self, other: &TypedProgram) -> bool {
        self.ty == other.ty && self.prog.to_string() == other.prog.to_string()
    }
}

impl Display for TypedProgram {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {}", self.prog, self.ty)
    }
}
