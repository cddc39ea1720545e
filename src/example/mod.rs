pub mod gen;
pub mod collect;
pub mod pool;
#[cfg(test)]
mod test;

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::lang::{value_list_string, Value};

pub use collect::Collector;
pub use gen::SizeSafeGen;
pub use pool::ExamplePool;

/// One recorded execution sample of a rewrite point.
#[derive(Clone, Debug)]
pub struct Example {
    pub rewrite_id: usize,
    /// Aligned with the rewrite point's input bindings.
    pub local_inputs: Vec<Value>,
    /// Aligned with the program's declared global inputs.
    pub global_inputs: Vec<Value>,
    pub output: Value,
}

pub type ExampleRef = Arc<Example>;

impl Display for Example {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{}: local_inputs: {}, global_inputs: {} -> {}",
            self.rewrite_id,
            value_list_string(&self.local_inputs),
            value_list_string(&self.global_inputs),
            self.output
        )
    }
}
