use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::Float;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub domain: DomainConfig,
    pub physics: PhysicsConfig,
    pub boundary: BoundaryConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub lx: usize,
    pub ly: usize,
}

/// Physics model selector. Exactly one model is active per run.
///
/// `Custom` covers the wave/advective/user-defined family: the equilibrium
/// and forcing closed forms are supplied as hooks when building the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicsModel {
    ShallowWater,
    Heat,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub model: PhysicsModel,
    /// Lattice speed e
    pub lattice_speed: Float,
    /// BGK relaxation time
    pub tau: Float,
    /// Gravitational acceleration used by the shallow-water model
    #[serde(default = "default_gravity")]
    pub gravity: Float,
}

fn default_gravity() -> Float {
    9.8
}

/// Boundary operator selector for one mask category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// Zero-gradient outflow: keep the cell's own previous value
    Open,
    /// Read the wrap-around neighbor's previous value
    Periodic,
    /// No-slip wall: own previous value from the opposite direction
    BounceBack,
    /// Free-slip wall: own previous value from the mirrored direction
    Specular,
    /// Scenario-specific hook registered on the solver
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryConfig {
    pub category_a: BoundaryKind,
    /// Category B operator; when absent, category-B directions fall back to
    /// the category-A operator so they can never keep a stale value.
    #[serde(default)]
    pub category_b: Option<BoundaryKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub steps: usize,
    #[serde(default = "default_report_frequency")]
    pub report_frequency: usize,
}

fn default_report_frequency() -> usize {
    100
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("parsing config file {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unusable parameters before the first timestep.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.domain.lx >= 1 && self.domain.ly >= 1,
            "grid dimensions must be positive, got {}x{}",
            self.domain.lx,
            self.domain.ly
        );
        ensure!(
            self.physics.lattice_speed > 0.0,
            "lattice speed must be positive, got {}",
            self.physics.lattice_speed
        );
        ensure!(
            self.physics.tau > 0.0,
            "relaxation time tau must be positive, got {}",
            self.physics.tau
        );
        ensure!(
            self.simulation.report_frequency >= 1,
            "report frequency must be at least 1"
        );
        Ok(())
    }

    pub fn effective_category_b(&self) -> BoundaryKind {
        self.boundary.category_b.unwrap_or(self.boundary.category_a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            domain: DomainConfig { lx: 8, ly: 8 },
            physics: PhysicsConfig {
                model: PhysicsModel::ShallowWater,
                lattice_speed: 1.0,
                tau: 1.0,
                gravity: 9.8,
            },
            boundary: BoundaryConfig {
                category_a: BoundaryKind::BounceBack,
                category_b: None,
            },
            simulation: SimulationConfig {
                steps: 10,
                report_frequency: 100,
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        base_config().validate().unwrap();
    }

    #[test]
    fn zero_tau_is_rejected() {
        let mut config = base_config();
        config.physics.tau = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let mut config = base_config();
        config.domain.ly = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn category_b_falls_back_to_a() {
        let mut config = base_config();
        assert_eq!(config.effective_category_b(), BoundaryKind::BounceBack);
        config.boundary.category_b = Some(BoundaryKind::Open);
        assert_eq!(config.effective_category_b(), BoundaryKind::Open);
    }

    #[test]
    fn json_round_trip_with_defaults() {
        let json = r#"{
            "domain": { "lx": 4, "ly": 4 },
            "physics": { "model": "shallow_water", "lattice_speed": 1.0, "tau": 1.2 },
            "boundary": { "category_a": "bounce_back" },
            "simulation": { "steps": 5 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.physics.gravity, 9.8);
        assert_eq!(config.simulation.report_frequency, 100);
        assert!(config.boundary.category_b.is_none());
        config.validate().unwrap();
    }
}
