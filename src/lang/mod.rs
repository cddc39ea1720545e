pub mod context;
pub mod eval;
#[cfg(test)]
mod test;

use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub use context::Context;

pub type Symbol = String;
pub type TermRef = Arc<Term>;

/// Types of the elaborated input language. Region ids on `Compress` and
/// rewrite indices on terms are assigned upstream; this crate only reads
/// them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Unit,
    Bool,
    Int,
    Arrow(Arc<Ty>, Arc<Ty>),
    Tuple(Vec<Ty>),
    Ind(Symbol),
    Compress(usize, Arc<Ty>),
}

impl Ty {
    pub fn arrow(inp: Ty, oup: Ty) -> Ty {
        Ty::Arrow(Arc::new(inp), Arc::new(oup))
    }

    pub fn compress(id: usize, body: Ty) -> Ty {
        Ty::Compress(id, Arc::new(body))
    }

    pub fn is_function(&self) -> bool {
        match self {
            Ty::Arrow(_, _) => true,
            Ty::Tuple(fields) => fields.iter().any(|f| f.is_function()),
            _ => false,
        }
    }

    pub fn compress_id(&self) -> Option<usize> {
        match self {
            Ty::Compress(id, _) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Pattern {
    Wildcard,
    /// Binds the whole matched value, optionally refining with a nested
    /// pattern (`x@p`).
    Var(Symbol, Option<Box<Pattern>>),
    Tuple(Vec<Pattern>),
    Cons(Symbol, Box<Pattern>),
}

impl Pattern {
    pub fn var(name: &str) -> Pattern {
        Pattern::Var(name.to_string(), None)
    }
}

#[derive(Clone, Debug)]
pub enum Term {
    Value(Value),
    Var(Symbol),
    If(TermRef, TermRef, TermRef),
    /// Application of a primary operator by name (`+`, `<=`, `and`, ...).
    Prim(Symbol, Vec<TermRef>),
    App(TermRef, TermRef),
    Func(Symbol, TermRef),
    Let { name: Symbol, is_rec: bool, def: TermRef, body: TermRef },
    Tuple(Vec<TermRef>),
    /// Zero-based projection out of a tuple of the given arity.
    Proj(TermRef, usize, usize),
    Match(TermRef, Vec<(Pattern, TermRef)>),
    Cons(Symbol, TermRef),
    /// Region introduction carrying the region id.
    Label(usize, TermRef),
    /// Region elimination carrying the region id.
    Unlabel(usize, TermRef),
    /// Rewrite point carrying the synthesis index.
    Rewrite(usize, TermRef),
}

impl Term {
    pub fn var(name: &str) -> TermRef {
        Arc::new(Term::Var(name.to_string()))
    }

    pub fn value(v: Value) -> TermRef {
        Arc::new(Term::Value(v))
    }

    pub fn int(v: i64) -> TermRef {
        Arc::new(Term::Value(Value::Int(v)))
    }

    pub fn app(func: TermRef, param: TermRef) -> TermRef {
        Arc::new(Term::App(func, param))
    }

    pub fn func(param: &str, body: TermRef) -> TermRef {
        Arc::new(Term::Func(param.to_string(), body))
    }

    pub fn prim(op: &str, params: Vec<TermRef>) -> TermRef {
        Arc::new(Term::Prim(op.to_string(), params))
    }

    /// Variables and literals need no let-binding when used as extraction
    /// results.
    pub fn is_symbolic(&self) -> bool {
        matches!(self, Term::Value(_) | Term::Var(_))
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Tuple(Vec<Value>),
    Ind(Symbol, Arc<Value>),
    Compress(usize, Arc<Value>),
    Closure(Arc<Closure>),
}

#[derive(Debug)]
pub struct Closure {
    pub param: Symbol,
    pub body: TermRef,
    pub env: Context,
    /// Name under which the closure re-binds itself on application,
    /// giving recursive bindings without interior mutability.
    pub fix: Option<Symbol>,
}

impl Value {
    pub fn ind(cons: &str, body: Value) -> Value {
        Value::Ind(cons.to_string(), Arc::new(body))
    }

    pub fn compress(id: usize, body: Value) -> Value {
        Value::Compress(id, Arc::new(body))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Tuple(x), Value::Tuple(y)) => x == y,
            (Value::Ind(xc, xb), Value::Ind(yc, yb)) => xc == yc && xb == yb,
            (Value::Compress(xi, xb), Value::Compress(yi, yb)) => xi == yi && xb == yb,
            // Closures compare unequal, as in the reference semantics.
            _ => false,
        }
    }
}

/// Commands of an elaborated program, in declaration order.
#[derive(Clone, Debug)]
pub enum Command {
    /// Monomorphic inductive datatype: constructor name and content type.
    IndDef { name: Symbol, cons_list: Vec<(Symbol, Ty)> },
    /// Declared value; `is_input` marks a global input sampled per example.
    Declare { name: Symbol, ty: Ty, is_input: bool },
    /// Top-level binding; `is_start` marks a declared entry point.
    Bind { name: Symbol, ty: Ty, term: TermRef, is_start: bool },
}

impl Command {
    pub fn name(&self) -> &str {
        match self {
            Command::IndDef { name, .. } => name,
            Command::Declare { name, .. } => name,
            Command::Bind { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Program {
    pub commands: Vec<Command>,
}

impl Display for Ty {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Ty::Unit => write!(f, "unit"),
            Ty::Bool => write!(f, "bool"),
            Ty::Int => write!(f, "int"),
            Ty::Arrow(inp, oup) => write!(f, "({} -> {})", inp, oup),
            Ty::Tuple(fields) => {
                write!(f, "(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 { write!(f, " * ")?; }
                    write!(f, "{}", field)?;
                }
                write!(f, ")")
            }
            Ty::Ind(name) => write!(f, "{}", name),
            Ty::Compress(id, body) => write!(f, "compress[{}] {}", id, body),
        }
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Pattern::Wildcard => write!(f, "_"),
            Pattern::Var(name, None) => write!(f, "{}", name),
            Pattern::Var(name, Some(body)) => write!(f, "{}@{}", name, body),
            Pattern::Tuple(fields) => {
                write!(f, "(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", field)?;
                }
                write!(f, ")")
            }
            Pattern::Cons(name, body) => write!(f, "{} {}", name, body),
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Value(v) => write!(f, "{}", v),
            Term::Var(name) => write!(f, "{}", name),
            Term::If(c, t, e) => write!(f, "(if {} then {} else {})", c, t, e),
            Term::Prim(op, params) => {
                match params.len() {
                    1 => write!(f, "({} {})", op, params[0]),
                    2 => write!(f, "({} {} {})", params[0], op, params[1]),
                    _ => {
                        write!(f, "({}", op)?;
                        for param in params {
                            write!(f, " {}", param)?;
                        }
                        write!(f, ")")
                    }
                }
            }
            Term::App(func, param) => write!(f, "({} {})", func, param),
            Term::Func(param, body) => write!(f, "(fun {} -> {})", param, body),
            Term::Let { name, is_rec, def, body } => {
                let kw = if *is_rec { "let rec" } else { "let" };
                write!(f, "({} {} = {} in {})", kw, name, def, body)
            }
            Term::Tuple(fields) => {
                write!(f, "(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", field)?;
                }
                write!(f, ")")
            }
            Term::Proj(body, id, size) => write!(f, "{}.{}/{}", body, id + 1, size),
            Term::Match(def, cases) => {
                write!(f, "(match {} with", def)?;
                for (pattern, branch) in cases {
                    write!(f, " | {} -> {}", pattern, branch)?;
                }
                write!(f, ")")
            }
            Term::Cons(name, body) => write!(f, "({} {})", name, body),
            Term::Label(id, body) => write!(f, "(label[{}] {})", id, body),
            Term::Unlabel(id, body) => write!(f, "(unlabel[{}] {})", id, body),
            Term::Rewrite(id, body) => write!(f, "(rewrite[{}] {})", id, body),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unit => write!(f, "unit"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Tuple(fields) => {
                write!(f, "(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", field)?;
                }
                write!(f, ")")
            }
            Value::Ind(cons, body) => write!(f, "{} {}", cons, body),
            Value::Compress(id, body) => write!(f, "compress[{}] {}", id, body),
            Value::Closure(c) => write!(f, "<fun {}>", c.param),
        }
    }
}

/// Joined printed form of a value list, the shared dedup key format.
pub fn value_list_string(values: &[Value]) -> String {
    let mut res = String::from("[");
    for (i, value) in values.iter().enumerate() {
        if i > 0 { res.push_str(", "); }
        res.push_str(&value.to_string());
    }
    res.push(']');
    res
}
