use serde::{Deserialize, Serialize};

/// Errors raised by [`SimConfig::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_time_delta must be positive and finite, got {0}")]
    InvalidTimeDelta(f64),
    #[error("planner iteration cap must be at least 1")]
    ZeroIterationCap,
    #[error("planner weight `{name}` must be finite, got {value}")]
    NonFiniteWeight { name: &'static str, value: f64 },
    #[error("dispenser chance `{0}` must be at least 1 (one in N)")]
    ZeroChance(&'static str),
}

/// Tuning of the lookahead planner used by robots.
///
/// The weights are empirical and have no derivation beyond "robots end up
/// delivering articles into packages".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Number of follow-up levels explored after the immediate action.
    pub lookahead_depth: usize,
    /// Execution steps a simulated action may take before it is discarded.
    pub iteration_cap: usize,
    /// Subtracted in proportion to how full the inventory is.
    pub inventory_full_penalty: f64,
    /// Value of each carried article.
    pub article_weight: f64,
    /// Value of each carried pick order.
    pub pick_order_weight: f64,
    /// Value of each article delivered into a package.
    pub delivery_weight: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            lookahead_depth: 1,
            iteration_cap: 100,
            inventory_full_penalty: 5.0,
            article_weight: 1.0,
            pick_order_weight: 2.0,
            delivery_weight: 10.0,
        }
    }
}

/// How often a dispenser emits things on its own, as "one in N" process calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenserConfig {
    pub pick_order_chance: u32,
    pub package_chance: u32,
}

impl Default for DispenserConfig {
    fn default() -> Self {
        Self {
            pick_order_chance: 100,
            package_chance: 400,
        }
    }
}

/// Static configuration of a simulated warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Seed of the world's random source.
    pub seed: u64,
    /// Upper bound for the time step accepted by [`crate::World::tick`].
    pub max_time_delta: f64,
    pub planner: PlannerConfig,
    pub dispenser: DispenserConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED_0F_9AC4,
            max_time_delta: 1.0,
            planner: PlannerConfig::default(),
            dispenser: DispenserConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_time_delta.is_finite() && self.max_time_delta > 0.0) {
            return Err(ConfigError::InvalidTimeDelta(self.max_time_delta));
        }
        if self.planner.iteration_cap == 0 {
            return Err(ConfigError::ZeroIterationCap);
        }
        let weights = [
            ("inventory_full_penalty", self.planner.inventory_full_penalty),
            ("article_weight", self.planner.article_weight),
            ("pick_order_weight", self.planner.pick_order_weight),
            ("delivery_weight", self.planner.delivery_weight),
        ];
        for (name, value) in weights {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteWeight { name, value });
            }
        }
        if self.dispenser.pick_order_chance == 0 {
            return Err(ConfigError::ZeroChance("pick_order_chance"));
        }
        if self.dispenser.package_chance == 0 {
            return Err(ConfigError::ZeroChance("package_chance"));
        }
        Ok(())
    }
}
