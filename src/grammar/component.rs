use std::sync::Arc;

use log::debug;

use crate::config::Config;
use crate::lang::eval::Evaluator;
use crate::lang::{Closure, Command, Context, Program, Symbol, Term, Ty, Value};
use crate::util::error::Result;

/// Building blocks a grammar draws its rules from.
#[derive(Clone, Debug)]
pub enum Component {
    /// A top-level binding or constructor, captured as an evaluated
    /// value and applied through the evaluator. `command_id` gates use
    /// by declaration order.
    User {
        name: Symbol,
        value: Value,
        command_id: usize,
        param_types: Vec<Ty>,
        res_type: Ty,
    },
    Const(Value, Ty),
    /// Primary operator by name.
    Operator(Symbol),
    Ite,
    /// Tuple construction.
    Tuple,
    /// Tuple projection; also extends the visible variable context with
    /// projections of every tuple-typed entry.
    Access,
}

impl Component {
    pub fn command_id(&self) -> usize {
        match self {
            Component::User { command_id, .. } => *command_id,
            _ => 0,
        }
    }
}

/// The three component lists of a program, one per grammar family:
/// `compress` builds lifting functions over region contents, `extract`
/// builds extraction programs over a rewrite point's inputs, `combine`
/// builds combinators over component values.
pub struct ComponentPool {
    pub compress: Vec<Component>,
    pub extract: Vec<Component>,
    pub combine: Vec<Component>,
}

fn unfold_arrow(ty: &Ty) -> (Vec<Ty>, Ty) {
    let mut params = Vec::new();
    let mut current = ty;
    while let Ty::Arrow(inp, oup) = current {
        params.push((**inp).clone());
        current = oup;
    }
    (params, current.clone())
}

/// Whether a binding's definition may appear inside extraction and
/// combination candidates: it must stay clear of rewrite points, region
/// labels, recursion, and any name that is itself unusable.
fn is_plain_def(term: &Term, usable: &[Symbol], locals: &mut Vec<Symbol>) -> bool {
    match term {
        Term::Rewrite(_, _) | Term::Label(_, _) | Term::Unlabel(_, _) => false,
        Term::Value(_) => true,
        Term::Var(name) => locals.contains(name) || usable.contains(name),
        Term::If(c, t, e) => {
            is_plain_def(c, usable, locals)
                && is_plain_def(t, usable, locals)
                && is_plain_def(e, usable, locals)
        }
        Term::Prim(_, params) => params.iter().all(|p| is_plain_def(p, usable, locals)),
        Term::App(f, p) => is_plain_def(f, usable, locals) && is_plain_def(p, usable, locals),
        Term::Func(param, body) => {
            locals.push(param.clone());
            let res = is_plain_def(body, usable, locals);
            locals.pop();
            res
        }
        Term::Let { is_rec, name, def, body } => {
            if *is_rec {
                return false;
            }
            if !is_plain_def(def, usable, locals) {
                return false;
            }
            locals.push(name.clone());
            let res = is_plain_def(body, usable, locals);
            locals.pop();
            res
        }
        Term::Tuple(fields) => fields.iter().all(|f| is_plain_def(f, usable, locals)),
        Term::Proj(body, _, _) | Term::Cons(_, body) => is_plain_def(body, usable, locals),
        Term::Match(def, cases) => {
            if !is_plain_def(def, usable, locals) {
                return false;
            }
            cases.iter().all(|(pattern, branch)| {
                let mark = locals.len();
                pattern_names(pattern, locals);
                let res = is_plain_def(branch, usable, locals);
                locals.truncate(mark);
                res
            })
        }
    }
}

fn pattern_names(pattern: &crate::lang::Pattern, out: &mut Vec<Symbol>) {
    use crate::lang::Pattern;
    match pattern {
        Pattern::Wildcard => {}
        Pattern::Var(name, nested) => {
            out.push(name.clone());
            if let Some(body) = nested {
                pattern_names(body, out);
            }
        }
        Pattern::Tuple(fields) => {
            for field in fields {
                pattern_names(field, out);
            }
        }
        Pattern::Cons(_, body) => pattern_names(body, out),
    }
}

fn cons_value(cons: &Symbol) -> Value {
    Value::Closure(Arc::new(Closure {
        param: "x".to_string(),
        body: Arc::new(Term::Cons(cons.clone(), Term::var("x"))),
        env: Context::empty(),
        fix: None,
    }))
}

/// Collects the component lists of a program. Basic operators and
/// constants form the shared backbone; comparison and boolean operators
/// only help combinators; user bindings always serve lifting, and also
/// extraction/combination when their definition is plain.
pub fn collect_components(program: &Program, config: &Config) -> Result<ComponentPool> {
    let mut pool = ComponentPool {
        compress: Vec::new(),
        extract: Vec::new(),
        combine: Vec::new(),
    };

    pool.compress.push(Component::Const(Value::Int(0), Ty::Int));
    for list in [&mut pool.extract, &mut pool.combine] {
        list.push(Component::Const(Value::Int(0), Ty::Int));
        list.push(Component::Const(Value::Int(1), Ty::Int));
    }
    for op in ["+", "-"] {
        for list in [&mut pool.compress, &mut pool.extract, &mut pool.combine] {
            list.push(Component::Operator(op.to_string()));
        }
    }
    for op in ["==", "<", "<=", "and", "or", "not"] {
        pool.combine.push(Component::Operator(op.to_string()));
    }
    if config.enable_nonlinear {
        pool.combine.push(Component::Operator("*".to_string()));
    }
    for list in [&mut pool.compress, &mut pool.extract, &mut pool.combine] {
        if config.enable_condition {
            list.push(Component::Ite);
        }
        list.push(Component::Tuple);
        list.push(Component::Access);
    }

    let mut eval = Evaluator::new();
    let mut ctx = Context::empty();
    let mut usable: Vec<Symbol> = Vec::new();

    for (command_id, command) in program.commands.iter().enumerate() {
        match command {
            Command::IndDef { name, cons_list } => {
                for (cons, content_ty) in cons_list {
                    usable.push(cons.clone());
                    let component = Component::User {
                        name: cons.clone(),
                        value: cons_value(cons),
                        command_id,
                        param_types: vec![content_ty.clone()],
                        res_type: Ty::Ind(name.clone()),
                    };
                    pool.compress.push(component.clone());
                    pool.extract.push(component.clone());
                    pool.combine.push(component);
                }
            }
            // Declared inputs are sampled per example; they enter
            // grammars as parameters, never as components.
            Command::Declare { .. } => {}
            Command::Bind { name, ty, term, .. } => {
                let value = match eval.eval(term, &ctx) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!(target: "enum", "binding {} is not a component: {}", name, e);
                        continue;
                    }
                };
                let value = match value {
                    Value::Closure(c) if c.fix.is_none() => Value::Closure(Arc::new(Closure {
                        param: c.param.clone(),
                        body: c.body.clone(),
                        env: c.env.clone(),
                        fix: Some(name.clone()),
                    })),
                    v => v,
                };
                ctx = ctx.bind(name, value.clone());
                // `name` is not yet usable here, so a self-reference
                // (recursion) disqualifies the definition.
                let mut locals = Vec::new();
                let plain = is_plain_def(term, &usable, &mut locals);
                if plain {
                    usable.push(name.clone());
                }
                let (param_types, res_type) = unfold_arrow(ty);
                if param_types.is_empty() || res_type.is_function() {
                    continue;
                }
                let component = Component::User {
                    name: name.clone(),
                    value,
                    command_id,
                    param_types,
                    res_type,
                };
                pool.compress.push(component.clone());
                if plain {
                    pool.extract.push(component.clone());
                    pool.combine.push(component);
                }
            }
        }
    }

    debug!(
        target: "enum",
        "component pool: {} compress, {} extract, {} combine",
        pool.compress.len(),
        pool.extract.len(),
        pool.combine.len()
    );
    Ok(pool)
}
