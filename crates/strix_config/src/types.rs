//! Option types deserialized from a placer options TOML file.

use serde::{Deserialize, Serialize};

/// The cost formulation used by the annealer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceAlgorithm {
    /// Wirelength only: `delta = delta_bb * bb_norm`.
    BoundingBox,
    /// Wirelength blended with criticality-weighted delay using lagged criticalities.
    #[default]
    CriticalityTiming,
    /// Live setup-slack analysis of every proposed move.
    SlackTiming,
}

impl PlaceAlgorithm {
    /// Returns `true` for both timing-driven formulations.
    pub fn is_timing_driven(self) -> bool {
        matches!(
            self,
            PlaceAlgorithm::CriticalityTiming | PlaceAlgorithm::SlackTiming
        )
    }
}

/// How the temperature is decayed between outer iterations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    /// Alpha is chosen from the observed success rate; exit temperature is
    /// derived from the current cost.
    #[default]
    Auto,
    /// Fixed `alpha_t`, `init_t` and `exit_t` from the options.
    User,
}

/// Strategy for estimating the starting temperature of an auto schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartingTemperature {
    /// Standard deviation of accepted probe-move costs divided by 64.
    #[default]
    StdDev,
    /// Temperature at which rejected probe moves balance accepted ones.
    Equilibrium,
}

/// How the per-temperature move budget scales with problem size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffortScaling {
    /// `inner_num * blocks^(4/3)`.
    #[default]
    Circuit,
    /// `inner_num * tiles^(2/3) * blocks^(2/3)`.
    DeviceCircuit,
}

/// Which move generator to instantiate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveGeneratorKind {
    /// Random block, random target within the range limit.
    Uniform,
    /// A block driving or driven by a highly critical connection.
    CriticalUniform,
}

/// Annealing schedule parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealSchedule {
    /// Auto or user schedule.
    #[serde(rename = "type")]
    pub schedule_type: ScheduleType,
    /// Starting temperature of a user schedule.
    pub init_t: f32,
    /// Temperature decay factor of a user schedule.
    pub alpha_t: f32,
    /// Exit temperature of a user schedule.
    pub exit_t: f32,
    /// Move-budget multiplier applied to the effort scaling.
    pub inner_num: f32,
}

impl Default for AnnealSchedule {
    fn default() -> Self {
        Self {
            schedule_type: ScheduleType::Auto,
            init_t: 100.0,
            alpha_t: 0.8,
            exit_t: 0.01,
            inner_num: 0.5,
        }
    }
}

/// Move generator selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveOpts {
    /// Generator used early in the anneal and when multistate is disabled.
    pub first: MoveGeneratorKind,
    /// Generator used once the agent reaches its late state.
    pub second: MoveGeneratorKind,
}

impl Default for MoveOpts {
    fn default() -> Self {
        Self {
            first: MoveGeneratorKind::Uniform,
            second: MoveGeneratorKind::CriticalUniform,
        }
    }
}

/// All options steering a placement run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacerOpts {
    /// Cost formulation of the annealing phase.
    pub place_algorithm: PlaceAlgorithm,
    /// Cost formulation of the zero-temperature quench.
    pub place_quench_algorithm: PlaceAlgorithm,
    /// Schedule parameters.
    pub anneal_sched: AnnealSchedule,
    /// Starting temperature estimator for the auto schedule.
    pub starting_temperature: StartingTemperature,
    /// Move budget scaling.
    pub effort_scaling: EffortScaling,
    /// Move generator selection.
    pub moves: MoveOpts,
    /// Weight of the timing term, in `[0, 1]`.
    pub timing_tradeoff: f32,
    /// Criticality exponent at the start of the anneal.
    pub td_place_exp_first: f32,
    /// Criticality exponent once the range limit reaches its floor.
    pub td_place_exp_last: f32,
    /// Criticality above which a connection is considered highly critical.
    pub place_crit_limit: f32,
    /// Full timing analysis is performed every this many temperatures.
    pub recompute_crit_iter: u32,
    /// Extra timing updates per temperature (`0` disables).
    pub inner_loop_recompute_divider: u32,
    /// Extra timing updates during quench (`0` disables).
    pub quench_recompute_divider: u32,
    /// Fraction of moves proposed with an unbounded range limit.
    pub rlim_escape_fraction: f32,
    /// Percentage of moves forced to swap two NoC routers.
    pub noc_swap_percentage: u32,
    /// Seed of the placer random number generator.
    pub seed: u64,
    /// Whether to checkpoint and roll back late-anneal regressions.
    pub place_checkpointing: bool,
    /// Whether the move-generator agent switches generators late in the anneal.
    pub place_agent_multistate: bool,
}

impl Default for PlacerOpts {
    fn default() -> Self {
        Self {
            place_algorithm: PlaceAlgorithm::CriticalityTiming,
            place_quench_algorithm: PlaceAlgorithm::CriticalityTiming,
            anneal_sched: AnnealSchedule::default(),
            starting_temperature: StartingTemperature::StdDev,
            effort_scaling: EffortScaling::Circuit,
            moves: MoveOpts::default(),
            timing_tradeoff: 0.5,
            td_place_exp_first: 1.0,
            td_place_exp_last: 8.0,
            place_crit_limit: 0.7,
            recompute_crit_iter: 1,
            inner_loop_recompute_divider: 0,
            quench_recompute_divider: 0,
            rlim_escape_fraction: 0.0,
            noc_swap_percentage: 0,
            seed: 1,
            place_checkpointing: true,
            place_agent_multistate: true,
        }
    }
}

impl PlacerOpts {
    /// Options for a wirelength-only run with the given seed.
    pub fn bounding_box(seed: u64) -> Self {
        Self {
            place_algorithm: PlaceAlgorithm::BoundingBox,
            place_quench_algorithm: PlaceAlgorithm::BoundingBox,
            seed,
            ..Self::default()
        }
    }

    /// Returns `true` if either phase needs a timing analyzer.
    pub fn needs_timing(&self) -> bool {
        self.place_algorithm.is_timing_driven() || self.place_quench_algorithm.is_timing_driven()
    }
}
