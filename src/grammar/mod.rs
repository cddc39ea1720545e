pub mod program;
pub mod component;
pub mod builder;
pub mod enumerate;
#[cfg(test)]
mod test;

use crate::lang::Ty;

pub use builder::{build_grammar, ContextEntry, OutputFilter};
pub use component::{collect_components, Component, ComponentPool};
pub use enumerate::GrammarEnumerateTool;
pub use program::{build_program, const_program, param_program, Op, Prog, ProgramData, TypedProgram};

/// Semantics of a production rule.
#[derive(Clone, Debug)]
pub enum RuleSem {
    /// Terminal rule yielding a fixed program (a context entry or a
    /// constant); the rule has no parameters.
    Direct(Prog),
    /// Operator applied to children drawn from the parameter symbols.
    Op(Op),
}

#[derive(Clone, Debug)]
pub struct Rule {
    pub sem: RuleSem,
    /// Nonterminal indices, one per child.
    pub params: Vec<usize>,
}

impl Rule {
    pub fn terminal(prog: Prog) -> Rule {
        Rule { sem: RuleSem::Direct(prog), params: Vec::new() }
    }

    pub fn op(op: Op, params: Vec<usize>) -> Rule {
        Rule { sem: RuleSem::Op(op), params }
    }

    /// Size units the rule itself contributes, matching
    /// `ProgramData::size` on the program it builds.
    pub fn own_size(&self) -> usize {
        match &self.sem {
            RuleSem::Direct(prog) => prog.size(),
            RuleSem::Op(op) => match op {
                Op::Prod | Op::Access(_) => 1,
                Op::Direct(_) => 0,
                _ => 1 + self.params.len(),
            },
        }
    }

    pub fn build(&self, subs: Vec<Prog>) -> Prog {
        match &self.sem {
            RuleSem::Direct(prog) => prog.clone(),
            RuleSem::Op(op) => build_program(op.clone(), subs),
        }
    }

    /// Result type of a program built by this rule. Start-wrapper rules
    /// carry the wrapped type themselves; every other rule produces its
    /// symbol's type.
    pub fn result_ty(&self, symbol_ty: &Ty) -> Ty {
        match &self.sem {
            RuleSem::Op(Op::Direct(ty)) => ty.clone(),
            _ => symbol_ty.clone(),
        }
    }
}

/// Typed nonterminal; rules are appended during construction and fixed
/// afterwards.
#[derive(Clone, Debug)]
pub struct NonTerminal {
    pub name: String,
    pub ty: Ty,
    pub rules: Vec<Rule>,
}

/// A constructed grammar: an arena of nonterminals with stable indices
/// and a single start symbol.
#[derive(Clone, Debug)]
pub struct Grammar {
    pub start: usize,
    pub symbols: Vec<NonTerminal>,
    /// Enumeration beyond this size fails fast instead of searching
    /// unboundedly.
    pub size_limit: usize,
}

impl Grammar {
    pub fn rule_num(&self) -> usize {
        self.symbols.iter().map(|s| s.rules.len()).sum()
    }
}
