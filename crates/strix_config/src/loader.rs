//! Options file loading and validation.

use crate::error::ConfigError;
use crate::types::{PlacerOpts, ScheduleType};
use std::path::Path;

/// Loads and validates placer options from a TOML file.
pub fn load_opts(path: &Path) -> Result<PlacerOpts, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_opts_from_str(&content)
}

/// Parses and validates placer options from a TOML string.
///
/// Missing keys take their defaults.
pub fn load_opts_from_str(content: &str) -> Result<PlacerOpts, ConfigError> {
    let opts: PlacerOpts =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_opts(&opts)?;
    Ok(opts)
}

/// Checks that option values are in range and mutually consistent.
pub fn validate_opts(opts: &PlacerOpts) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

    if !(0.0..=1.0).contains(&opts.timing_tradeoff) {
        return invalid(format!(
            "timing_tradeoff must be in [0, 1], got {}",
            opts.timing_tradeoff
        ));
    }
    if !(0.0..=1.0).contains(&opts.rlim_escape_fraction) {
        return invalid(format!(
            "rlim_escape_fraction must be in [0, 1], got {}",
            opts.rlim_escape_fraction
        ));
    }
    if opts.noc_swap_percentage > 100 {
        return invalid(format!(
            "noc_swap_percentage must be at most 100, got {}",
            opts.noc_swap_percentage
        ));
    }
    if opts.td_place_exp_first < 0.0 || opts.td_place_exp_last < 0.0 {
        return invalid("criticality exponents must be non-negative".to_string());
    }
    if !(0.0..=1.0).contains(&opts.place_crit_limit) {
        return invalid(format!(
            "place_crit_limit must be in [0, 1], got {}",
            opts.place_crit_limit
        ));
    }
    if opts.place_quench_algorithm.is_timing_driven() && !opts.place_algorithm.is_timing_driven() {
        return invalid(
            "a timing-driven quench requires a timing-driven placement algorithm".to_string(),
        );
    }
    if opts.recompute_crit_iter == 0 {
        return invalid("recompute_crit_iter must be at least 1".to_string());
    }
    let sched = &opts.anneal_sched;
    if sched.inner_num <= 0.0 {
        return invalid(format!("inner_num must be positive, got {}", sched.inner_num));
    }
    if sched.schedule_type == ScheduleType::User {
        if !(sched.alpha_t > 0.0 && sched.alpha_t < 1.0) {
            return invalid(format!("alpha_t must be in (0, 1), got {}", sched.alpha_t));
        }
        if sched.init_t < 0.0 || sched.exit_t <= 0.0 {
            return invalid("user schedule needs init_t >= 0 and exit_t > 0".to_string());
        }
    }
    Ok(())
}
