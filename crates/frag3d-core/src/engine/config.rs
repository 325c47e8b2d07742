use crate::core::utils::elements;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(invalid(name, format!("must be a positive number, got {}", value)))
    }
}

fn require_non_negative(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(invalid(
            name,
            format!("must be a non-negative number, got {}", value),
        ))
    }
}

/// Settings of the tree-to-3D assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderConfig {
    /// When false, child fragments keep their library coordinates.
    pub align_building_blocks: bool,
    /// Edge length of the cube in which atom-less vertices are anchored.
    pub anchor_box_edge: f64,
    /// Seed for anchor placement; `None` draws from entropy.
    pub random_seed: Option<u64>,
    pub remove_used_ring_placeholders: bool,
    pub enforce_valence_requirements: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            align_building_blocks: true,
            anchor_box_edge: 20.0,
            random_seed: None,
            remove_used_ring_placeholders: false,
            enforce_valence_requirements: true,
        }
    }
}

#[derive(Default)]
pub struct BuilderConfigBuilder {
    align_building_blocks: Option<bool>,
    anchor_box_edge: Option<f64>,
    random_seed: Option<u64>,
    remove_used_ring_placeholders: Option<bool>,
    enforce_valence_requirements: Option<bool>,
}

impl BuilderConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn align_building_blocks(mut self, align: bool) -> Self {
        self.align_building_blocks = Some(align);
        self
    }
    pub fn anchor_box_edge(mut self, edge: f64) -> Self {
        self.anchor_box_edge = Some(edge);
        self
    }
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }
    pub fn remove_used_ring_placeholders(mut self, remove: bool) -> Self {
        self.remove_used_ring_placeholders = Some(remove);
        self
    }
    pub fn enforce_valence_requirements(mut self, enforce: bool) -> Self {
        self.enforce_valence_requirements = Some(enforce);
        self
    }

    pub fn build(self) -> Result<BuilderConfig, ConfigError> {
        let defaults = BuilderConfig::default();
        Ok(BuilderConfig {
            align_building_blocks: self
                .align_building_blocks
                .unwrap_or(defaults.align_building_blocks),
            anchor_box_edge: require_positive(
                "anchor_box_edge",
                self.anchor_box_edge.unwrap_or(defaults.anchor_box_edge),
            )?,
            random_seed: self.random_seed,
            remove_used_ring_placeholders: self
                .remove_used_ring_placeholders
                .unwrap_or(defaults.remove_used_ring_placeholders),
            enforce_valence_requirements: self
                .enforce_valence_requirements
                .unwrap_or(defaults.enforce_valence_requirements),
        })
    }
}

/// How a pair of ring-closing attractors is judged closable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClosabilityStrategy {
    /// Each attractor must overlap the opposite source atom.
    #[default]
    BondOverlap,
    /// Legacy test comparing source-source separation with the ideal bond length.
    BondComplementarity,
}

/// Attractive potential applied between paired attractors during the search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosingPotential {
    /// Force constant in kcal/mol/Å².
    pub strength: f64,
    /// Distance below which the attraction is switched off.
    pub overlap_distance: f64,
}

impl Default for ClosingPotential {
    fn default() -> Self {
        Self {
            strength: 5.0,
            overlap_distance: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RingClosureConfig {
    pub enabled: bool,
    pub strategy: ClosabilityStrategy,
    pub distance_tolerance: f64,
    pub dot_tolerance: f64,
    pub cap_bond_length: f64,
    pub closing_potential: ClosingPotential,
    pub max_combinations: usize,
    pub explore_alternative_pairings: bool,
}

impl Default for RingClosureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: ClosabilityStrategy::default(),
            distance_tolerance: 1.0,
            dot_tolerance: 0.5,
            cap_bond_length: 1.10,
            closing_potential: ClosingPotential::default(),
            max_combinations: 50,
            explore_alternative_pairings: false,
        }
    }
}

#[derive(Default)]
pub struct RingClosureConfigBuilder {
    enabled: Option<bool>,
    strategy: Option<ClosabilityStrategy>,
    distance_tolerance: Option<f64>,
    dot_tolerance: Option<f64>,
    cap_bond_length: Option<f64>,
    attraction_strength: Option<f64>,
    overlap_distance: Option<f64>,
    max_combinations: Option<usize>,
    explore_alternative_pairings: Option<bool>,
}

impl RingClosureConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }
    pub fn strategy(mut self, strategy: ClosabilityStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }
    pub fn distance_tolerance(mut self, tolerance: f64) -> Self {
        self.distance_tolerance = Some(tolerance);
        self
    }
    pub fn dot_tolerance(mut self, tolerance: f64) -> Self {
        self.dot_tolerance = Some(tolerance);
        self
    }
    pub fn cap_bond_length(mut self, length: f64) -> Self {
        self.cap_bond_length = Some(length);
        self
    }
    pub fn attraction_strength(mut self, strength: f64) -> Self {
        self.attraction_strength = Some(strength);
        self
    }
    pub fn overlap_distance(mut self, distance: f64) -> Self {
        self.overlap_distance = Some(distance);
        self
    }
    pub fn max_combinations(mut self, n: usize) -> Self {
        self.max_combinations = Some(n);
        self
    }
    pub fn explore_alternative_pairings(mut self, explore: bool) -> Self {
        self.explore_alternative_pairings = Some(explore);
        self
    }

    pub fn build(self) -> Result<RingClosureConfig, ConfigError> {
        let defaults = RingClosureConfig::default();

        let dot_tolerance = self.dot_tolerance.unwrap_or(defaults.dot_tolerance);
        if !(0.0..=1.0).contains(&dot_tolerance) {
            return Err(invalid(
                "dot_tolerance",
                format!("must lie in [0, 1], got {}", dot_tolerance),
            ));
        }
        let max_combinations = self.max_combinations.unwrap_or(defaults.max_combinations);
        if max_combinations == 0 {
            return Err(invalid("max_combinations", "must be at least 1"));
        }

        Ok(RingClosureConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            strategy: self.strategy.unwrap_or(defaults.strategy),
            distance_tolerance: require_positive(
                "distance_tolerance",
                self.distance_tolerance
                    .unwrap_or(defaults.distance_tolerance),
            )?,
            dot_tolerance,
            cap_bond_length: require_positive(
                "cap_bond_length",
                self.cap_bond_length.unwrap_or(defaults.cap_bond_length),
            )?,
            closing_potential: ClosingPotential {
                strength: require_non_negative(
                    "attraction_strength",
                    self.attraction_strength
                        .unwrap_or(defaults.closing_potential.strength),
                )?,
                overlap_distance: require_non_negative(
                    "overlap_distance",
                    self.overlap_distance
                        .unwrap_or(defaults.closing_potential.overlap_distance),
                )?,
            },
            max_combinations,
            explore_alternative_pairings: self
                .explore_alternative_pairings
                .unwrap_or(defaults.explore_alternative_pairings),
        })
    }
}

pub const DEFAULT_CYCLE_MARKER: &str = "Final Function Value and Deformation";

/// Locations and settings of the external Tinker conformational search.
#[derive(Debug, Clone, PartialEq)]
pub struct TinkerConfig {
    pub executable: PathBuf,
    pub force_field_parameters: PathBuf,
    pub work_dir: PathBuf,
    pub cycle_marker: String,
    pub search_keywords: Vec<String>,
    pub atom_types: HashMap<String, u32>,
    pub search_directions: u32,
    pub rms_gradient: f64,
}

#[derive(Default)]
pub struct TinkerConfigBuilder {
    executable: Option<PathBuf>,
    force_field_parameters: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    cycle_marker: Option<String>,
    search_keywords: Vec<String>,
    atom_types: HashMap<String, u32>,
    search_directions: Option<u32>,
    rms_gradient: Option<f64>,
}

impl TinkerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executable(mut self, path: PathBuf) -> Self {
        self.executable = Some(path);
        self
    }
    pub fn force_field_parameters(mut self, path: PathBuf) -> Self {
        self.force_field_parameters = Some(path);
        self
    }
    pub fn work_dir(mut self, path: PathBuf) -> Self {
        self.work_dir = Some(path);
        self
    }
    pub fn cycle_marker(mut self, marker: impl Into<String>) -> Self {
        self.cycle_marker = Some(marker.into());
        self
    }
    pub fn search_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.search_keywords.push(keyword.into());
        self
    }
    /// Overrides (or adds) the Tinker atom type of one element symbol.
    pub fn atom_type(mut self, symbol: impl Into<String>, atom_type: u32) -> Self {
        self.atom_types.insert(symbol.into(), atom_type);
        self
    }
    pub fn search_directions(mut self, n: u32) -> Self {
        self.search_directions = Some(n);
        self
    }
    pub fn rms_gradient(mut self, gradient: f64) -> Self {
        self.rms_gradient = Some(gradient);
        self
    }

    pub fn build(self) -> Result<TinkerConfig, ConfigError> {
        let cycle_marker = self
            .cycle_marker
            .unwrap_or_else(|| DEFAULT_CYCLE_MARKER.to_string());
        if cycle_marker.trim().is_empty() {
            return Err(invalid("cycle_marker", "must not be blank"));
        }

        let mut atom_types = elements::default_tinker_types();
        atom_types.extend(self.atom_types);

        Ok(TinkerConfig {
            executable: self
                .executable
                .ok_or(ConfigError::MissingParameter("executable"))?,
            force_field_parameters: self
                .force_field_parameters
                .ok_or(ConfigError::MissingParameter("force_field_parameters"))?,
            work_dir: self
                .work_dir
                .ok_or(ConfigError::MissingParameter("work_dir"))?,
            cycle_marker,
            search_keywords: self.search_keywords,
            atom_types,
            search_directions: self.search_directions.unwrap_or(5),
            rms_gradient: require_positive("rms_gradient", self.rms_gradient.unwrap_or(0.01))?,
        })
    }
}

/// Complete configuration of one build run.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub builder: BuilderConfig,
    pub ring_closure: RingClosureConfig,
    /// Required only when rings are closed through the external search.
    pub tinker: Option<TinkerConfig>,
    /// Symbol → Tinker atom type used for internal coordinates.
    pub atom_types: HashMap<String, u32>,
}

#[derive(Default)]
pub struct BuildConfigBuilder {
    builder: Option<BuilderConfig>,
    ring_closure: Option<RingClosureConfig>,
    tinker: Option<TinkerConfig>,
}

impl BuildConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder(mut self, config: BuilderConfig) -> Self {
        self.builder = Some(config);
        self
    }
    pub fn ring_closure(mut self, config: RingClosureConfig) -> Self {
        self.ring_closure = Some(config);
        self
    }
    pub fn tinker(mut self, config: TinkerConfig) -> Self {
        self.tinker = Some(config);
        self
    }

    pub fn build(self) -> Result<BuildConfig, ConfigError> {
        let atom_types = self
            .tinker
            .as_ref()
            .map(|t| t.atom_types.clone())
            .unwrap_or_else(elements::default_tinker_types);
        Ok(BuildConfig {
            builder: self.builder.unwrap_or_default(),
            ring_closure: self.ring_closure.unwrap_or_default(),
            tinker: self.tinker,
            atom_types,
        })
    }
}
