use std::sync::Arc;

use super::{Closure, Command, Context, Pattern, Program, Term, Value};
use crate::util::error::{Error, ErrorKind, Result};

fn eval_error(message: String) -> Error {
    Error::with_message(ErrorKind::Eval, message)
}

/// Applies a primary operator to evaluated arguments.
pub fn invoke_prim(op: &str, args: &[Value]) -> Result<Value> {
    let int = |i: usize| -> Result<i64> {
        args.get(i)
            .and_then(Value::as_int)
            .ok_or_else(|| eval_error(format!("operator {} expects an int argument", op)))
    };
    let boolean = |i: usize| -> Result<bool> {
        args.get(i)
            .and_then(Value::as_bool)
            .ok_or_else(|| eval_error(format!("operator {} expects a bool argument", op)))
    };
    match op {
        "+" => Ok(Value::Int(int(0)?.wrapping_add(int(1)?))),
        "-" => Ok(Value::Int(int(0)?.wrapping_sub(int(1)?))),
        "*" => Ok(Value::Int(int(0)?.wrapping_mul(int(1)?))),
        "/" => {
            let denom = int(1)?;
            if denom == 0 {
                return Err(eval_error("division by zero".to_string()));
            }
            Ok(Value::Int(int(0)? / denom))
        }
        "neg" => Ok(Value::Int(int(0)?.wrapping_neg())),
        "==" => match args {
            [a, b] => Ok(Value::Bool(a == b)),
            _ => Err(eval_error("operator == expects two arguments".to_string())),
        },
        "<" => Ok(Value::Bool(int(0)? < int(1)?)),
        "<=" => Ok(Value::Bool(int(0)? <= int(1)?)),
        ">" => Ok(Value::Bool(int(0)? > int(1)?)),
        ">=" => Ok(Value::Bool(int(0)? >= int(1)?)),
        "and" => Ok(Value::Bool(boolean(0)? && boolean(1)?)),
        "or" => Ok(Value::Bool(boolean(0)? || boolean(1)?)),
        "not" => Ok(Value::Bool(!boolean(0)?)),
        _ => Err(eval_error(format!("unknown primary operator {}", op))),
    }
}

/// Signature and result type of a primary operator, used when installing
/// operator components into grammars.
pub fn prim_signature(op: &str) -> Option<(Vec<super::Ty>, super::Ty)> {
    use super::Ty;
    match op {
        "+" | "-" | "*" | "/" => Some((vec![Ty::Int, Ty::Int], Ty::Int)),
        "neg" => Some((vec![Ty::Int], Ty::Int)),
        "==" | "<" | "<=" | ">" | ">=" => Some((vec![Ty::Int, Ty::Int], Ty::Bool)),
        "and" | "or" => Some((vec![Ty::Bool, Ty::Bool], Ty::Bool)),
        "not" => Some((vec![Ty::Bool], Ty::Bool)),
        _ => None,
    }
}

/// Snapshot hook fired when evaluation passes a rewrite point.
pub trait RewriteObserver {
    fn on_rewrite(&mut self, id: usize, ctx: &Context, output: &Value);
}

/// The reference evaluator. The observer seam is what turns it into the
/// recording evaluator used during example collection.
pub struct Evaluator<'a> {
    observer: Option<&'a mut dyn RewriteObserver>,
}

impl<'a> Evaluator<'a> {
    pub fn new() -> Evaluator<'a> {
        Evaluator { observer: None }
    }

    pub fn with_observer(observer: &'a mut dyn RewriteObserver) -> Evaluator<'a> {
        Evaluator { observer: Some(observer) }
    }

    pub fn eval(&mut self, term: &Term, ctx: &Context) -> Result<Value> {
        match term {
            Term::Value(v) => Ok(v.clone()),
            Term::Var(name) => ctx.get(name),
            Term::If(c, t, e) => {
                let cond = self.eval(c, ctx)?;
                match cond.as_bool() {
                    Some(true) => self.eval(t, ctx),
                    Some(false) => self.eval(e, ctx),
                    None => Err(eval_error(format!("if condition is not a bool: {}", cond))),
                }
            }
            Term::Prim(op, params) => {
                let mut args = Vec::with_capacity(params.len());
                for param in params {
                    args.push(self.eval(param, ctx)?);
                }
                invoke_prim(op, &args)
            }
            Term::App(func, param) => {
                let func = self.eval(func, ctx)?;
                let arg = self.eval(param, ctx)?;
                self.apply(&func, arg)
            }
            Term::Func(param, body) => Ok(Value::Closure(Arc::new(Closure {
                param: param.clone(),
                body: body.clone(),
                env: ctx.clone(),
                fix: None,
            }))),
            Term::Let { name, is_rec, def, body } => {
                let bound = if *is_rec {
                    match self.eval(def, ctx)? {
                        Value::Closure(c) => Value::Closure(Arc::new(Closure {
                            param: c.param.clone(),
                            body: c.body.clone(),
                            env: c.env.clone(),
                            fix: Some(name.clone()),
                        })),
                        v => {
                            return Err(eval_error(format!(
                                "let rec {} must bind a function, got {}",
                                name, v
                            )))
                        }
                    }
                } else {
                    self.eval(def, ctx)?
                };
                self.eval(body, &ctx.bind(name, bound))
            }
            Term::Tuple(fields) => {
                let mut values = Vec::with_capacity(fields.len());
                for field in fields {
                    values.push(self.eval(field, ctx)?);
                }
                Ok(Value::Tuple(values))
            }
            Term::Proj(body, id, size) => {
                let value = self.eval(body, ctx)?;
                match value {
                    Value::Tuple(fields) if fields.len() == *size && *id < fields.len() => {
                        Ok(fields[*id].clone())
                    }
                    v => Err(eval_error(format!("bad projection .{}/{} on {}", id + 1, size, v))),
                }
            }
            Term::Match(def, cases) => {
                let value = self.eval(def, ctx)?;
                for (pattern, branch) in cases {
                    if let Some(branch_ctx) = match_pattern(pattern, &value, ctx) {
                        return self.eval(branch, &branch_ctx);
                    }
                }
                Err(eval_error(format!("no match case covers {}", value)))
            }
            Term::Cons(name, body) => {
                let value = self.eval(body, ctx)?;
                Ok(Value::Ind(name.clone(), Arc::new(value)))
            }
            Term::Label(id, body) => {
                let value = self.eval(body, ctx)?;
                Ok(Value::Compress(*id, Arc::new(value)))
            }
            Term::Unlabel(id, body) => {
                let value = self.eval(body, ctx)?;
                match value {
                    Value::Compress(vid, inner) if vid == *id => Ok((*inner).clone()),
                    v => Err(eval_error(format!("unlabel[{}] applied to {}", id, v))),
                }
            }
            Term::Rewrite(id, body) => {
                let value = self.eval(body, ctx)?;
                if let Some(observer) = self.observer.as_mut() {
                    observer.on_rewrite(*id, ctx, &value);
                }
                Ok(value)
            }
        }
    }

    pub fn apply(&mut self, func: &Value, arg: Value) -> Result<Value> {
        match func {
            Value::Closure(c) => {
                let mut env = c.env.clone();
                if let Some(fix_name) = &c.fix {
                    env = env.bind(fix_name, func.clone());
                }
                let env = env.bind(&c.param, arg);
                self.eval(&c.body, &env)
            }
            v => Err(eval_error(format!("application of a non-function {}", v))),
        }
    }
}

/// Matches `value` against `pattern`, extending `ctx` with the bindings.
pub fn match_pattern(pattern: &Pattern, value: &Value, ctx: &Context) -> Option<Context> {
    match pattern {
        Pattern::Wildcard => Some(ctx.clone()),
        Pattern::Var(name, nested) => {
            let ctx = match nested {
                Some(body) => match_pattern(body, value, ctx)?,
                None => ctx.clone(),
            };
            Some(ctx.bind(name, value.clone()))
        }
        Pattern::Tuple(fields) => match value {
            Value::Tuple(values) if values.len() == fields.len() => {
                let mut ctx = ctx.clone();
                for (field, value) in fields.iter().zip(values.iter()) {
                    ctx = match_pattern(field, value, &ctx)?;
                }
                Some(ctx)
            }
            _ => None,
        },
        Pattern::Cons(name, body) => match value {
            Value::Ind(cons, content) if cons == name => match_pattern(body, content, ctx),
            _ => None,
        },
    }
}

/// Builds the top-level evaluation context of a program: declared inputs
/// come from `globals` (sampled per example by the caller), bindings are
/// evaluated in declaration order. Top-level function bindings may call
/// themselves recursively.
pub fn build_context(
    program: &Program,
    globals: &[(String, Value)],
    eval: &mut Evaluator<'_>,
) -> Result<Context> {
    let mut ctx = Context::empty();
    for command in &program.commands {
        match command {
            Command::IndDef { .. } => {}
            Command::Declare { name, is_input, .. } => {
                if *is_input {
                    let value = globals
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| {
                            Error::with_message(
                                ErrorKind::Elaboration,
                                format!("missing global input {}", name),
                            )
                        })?;
                    ctx = ctx.bind(name, value);
                }
            }
            Command::Bind { name, term, .. } => {
                let value = match eval.eval(term, &ctx)? {
                    Value::Closure(c) if c.fix.is_none() => Value::Closure(Arc::new(Closure {
                        param: c.param.clone(),
                        body: c.body.clone(),
                        env: c.env.clone(),
                        fix: Some(name.clone()),
                    })),
                    v => v,
                };
                ctx = ctx.bind(name, value);
            }
        }
    }
    Ok(ctx)
}
