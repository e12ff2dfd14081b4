//! Scenario catalogue for the simulation harness.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// LS-001: Opposite poles pull together with mirrored forces
    Attraction,
    
    /// LS-002: Like poles push apart; closing distance stays clamped
    Repulsion,
    
    /// LS-003: Per-axis range box, diagonal pairs vs single-axis overshoot
    DiagonalCull,
    
    /// LS-004: Toggle electromagnet driven by scripted key edges
    ToggleRelay,
    
    /// LS-005: Passing magnet trips a gaussmeter that drives an electromagnet
    GaussRelay,
    
    /// LS-006: Observer partitioned from the host, then healed
    Partition,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Attraction,
            ScenarioId::Repulsion,
            ScenarioId::DiagonalCull,
            ScenarioId::ToggleRelay,
            ScenarioId::GaussRelay,
            ScenarioId::Partition,
        ]
    }
    
    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Attraction => "attraction",
            ScenarioId::Repulsion => "repulsion",
            ScenarioId::DiagonalCull => "diagonal_cull",
            ScenarioId::ToggleRelay => "toggle_relay",
            ScenarioId::GaussRelay => "gauss_relay",
            ScenarioId::Partition => "partition",
        }
    }
    
    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Attraction => "North and South pole, equal and opposite inverse-square pull",
            ScenarioId::Repulsion => "Two North poles closing in, force bounded by the min-distance clamp",
            ScenarioId::DiagonalCull => "Diagonal pair beyond max distance interacts, single-axis overshoot does not",
            ScenarioId::ToggleRelay => "Toggle electromagnet flips only on key edges, observers follow",
            ScenarioId::GaussRelay => "Gaussmeter classification relayed to an electromagnet one tick later",
            ScenarioId::Partition => "Partitioned observer stays stale until the next change after healing",
        }
    }
    
    /// True when the scenario needs at least one observer to be meaningful.
    pub fn needs_observers(&self) -> bool {
        matches!(self, ScenarioId::Partition)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "attraction" | "ls-001" => Ok(ScenarioId::Attraction),
            "repulsion" | "ls-002" => Ok(ScenarioId::Repulsion),
            "diagonal_cull" | "diagonalcull" | "ls-003" => Ok(ScenarioId::DiagonalCull),
            "toggle_relay" | "togglerelay" | "ls-004" => Ok(ScenarioId::ToggleRelay),
            "gauss_relay" | "gaussrelay" | "ls-005" => Ok(ScenarioId::GaussRelay),
            "partition" | "ls-006" => Ok(ScenarioId::Partition),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
