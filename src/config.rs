use std::time::Duration;

/// Numeric configuration for the whole synthesis pass. Built once by the
/// driver and passed by reference into each component's constructor.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum AST size of a randomly generated value.
    pub data_size_limit: usize,
    /// Inclusive range for sampled integers.
    pub int_min: i64,
    pub int_max: i64,
    /// Worker count for batched example collection.
    pub thread_num: usize,
    /// Seed for the example generator.
    pub random_seed: u64,
    /// Time budget for one batched collection call.
    pub example_timeout: Duration,
    /// Time budget for growing examples during combinator verification.
    pub verify_timeout: Duration,
    /// Maximum candidate size enumerated from any grammar.
    pub enum_size_limit: usize,
    /// Number of examples requested before the first synthesis attempt.
    pub init_example_num: usize,
    /// Allow multiplication in combinator grammars.
    pub enable_nonlinear: bool,
    /// Allow if-then-else in candidate programs.
    pub enable_condition: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            data_size_limit: 10,
            int_min: -4,
            int_max: 4,
            thread_num: 4,
            random_seed: 0x1f2e3d4c,
            example_timeout: Duration::from_secs(10),
            verify_timeout: Duration::from_secs(10),
            enum_size_limit: 8,
            init_example_num: 40,
            enable_nonlinear: false,
            enable_condition: true,
        }
    }
}
