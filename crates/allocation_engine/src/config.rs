/// Tuning knobs for the allocation phases. Constructed once by the caller and
/// passed by reference into each phase; there is no ambient configuration
/// state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub normalization_target: f64,
    pub phase1a: Phase1aConfig,
    pub phase1b: Phase1bConfig,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Phase1aConfig {
    pub tie_tolerance: f64,
    pub max_sacrifice_threshold: f64,
    pub top_options_to_consider: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Phase1bConfig {
    pub tie_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            normalization_target: 1.0,
            phase1a: Phase1aConfig::default(),
            phase1b: Phase1bConfig::default(),
        }
    }
}

impl Default for Phase1aConfig {
    fn default() -> Self {
        Self {
            tie_tolerance: 0.001,
            max_sacrifice_threshold: 0.2,
            top_options_to_consider: 3,
        }
    }
}

impl Default for Phase1bConfig {
    fn default() -> Self {
        Self {
            tie_tolerance: 0.001,
        }
    }
}
