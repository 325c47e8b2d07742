use crate::cli::BuildArgs;
use crate::error::{CliError, Result};
use frag3d::engine::config as core_config;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

const DEFAULT_WORK_DIR_NAME: &str = "frag3d-tinker";

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialBuilderConfig {
    align_building_blocks: Option<bool>,
    anchor_box_edge: Option<f64>,
    random_seed: Option<u64>,
    remove_used_ring_placeholders: Option<bool>,
    enforce_valence_requirements: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialStrategy {
    BondOverlap,
    BondComplementarity,
}

impl From<PartialStrategy> for core_config::ClosabilityStrategy {
    fn from(p: PartialStrategy) -> Self {
        match p {
            PartialStrategy::BondOverlap => Self::BondOverlap,
            PartialStrategy::BondComplementarity => Self::BondComplementarity,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialRingClosureConfig {
    enabled: Option<bool>,
    strategy: Option<PartialStrategy>,
    distance_tolerance: Option<f64>,
    dot_tolerance: Option<f64>,
    cap_bond_length: Option<f64>,
    attraction_strength: Option<f64>,
    overlap_distance: Option<f64>,
    max_combinations: Option<usize>,
    explore_alternative_pairings: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialTinkerConfig {
    executable: Option<PathBuf>,
    force_field_parameters: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    cycle_marker: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    atom_types: HashMap<String, u32>,
    search_directions: Option<u32>,
    rms_gradient: Option<f64>,
}

/// A job file as written by the user; every field is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialBuildConfig {
    builder: Option<PartialBuilderConfig>,
    ring_closure: Option<PartialRingClosureConfig>,
    tinker: Option<PartialTinkerConfig>,
}

impl PartialBuildConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Layers command-line overrides over the file values and validates the result.
    pub fn merge_with_cli(mut self, args: &BuildArgs) -> Result<core_config::BuildConfig> {
        self.apply_set_values(&args.set_values)?;

        let builder = self.builder.take().unwrap_or_default();
        let ring_closure = self.ring_closure.take().unwrap_or_default();

        let builder_config = Self::merge_builder(builder, args)?;
        let ring_closure_config = Self::merge_ring_closure(ring_closure, args)?;

        let mut config = core_config::BuildConfigBuilder::new()
            .builder(builder_config)
            .ring_closure(ring_closure_config);
        if let Some(tinker) = self.tinker.take() {
            config = config.tinker(Self::merge_tinker(tinker, args)?);
        }
        config.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_builder(
        partial: PartialBuilderConfig,
        args: &BuildArgs,
    ) -> Result<core_config::BuilderConfig> {
        let mut builder = core_config::BuilderConfigBuilder::new();
        if let Some(v) = partial.align_building_blocks {
            builder = builder.align_building_blocks(v);
        }
        if let Some(v) = partial.anchor_box_edge {
            builder = builder.anchor_box_edge(v);
        }
        if let Some(seed) = args.seed.or(partial.random_seed) {
            builder = builder.random_seed(seed);
        }
        if args.remove_ring_placeholders {
            builder = builder.remove_used_ring_placeholders(true);
        } else if let Some(v) = partial.remove_used_ring_placeholders {
            builder = builder.remove_used_ring_placeholders(v);
        }
        if let Some(v) = partial.enforce_valence_requirements {
            builder = builder.enforce_valence_requirements(v);
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_ring_closure(
        partial: PartialRingClosureConfig,
        args: &BuildArgs,
    ) -> Result<core_config::RingClosureConfig> {
        let mut builder = core_config::RingClosureConfigBuilder::new();
        if args.no_ring_closure {
            builder = builder.enabled(false);
        } else if let Some(v) = partial.enabled {
            builder = builder.enabled(v);
        }
        if let Some(v) = partial.strategy {
            builder = builder.strategy(v.into());
        }
        if let Some(v) = partial.distance_tolerance {
            builder = builder.distance_tolerance(v);
        }
        if let Some(v) = partial.dot_tolerance {
            builder = builder.dot_tolerance(v);
        }
        if let Some(v) = partial.cap_bond_length {
            builder = builder.cap_bond_length(v);
        }
        if let Some(v) = partial.attraction_strength {
            builder = builder.attraction_strength(v);
        }
        if let Some(v) = partial.overlap_distance {
            builder = builder.overlap_distance(v);
        }
        if let Some(v) = partial.max_combinations {
            builder = builder.max_combinations(v);
        }
        if let Some(v) = partial.explore_alternative_pairings {
            builder = builder.explore_alternative_pairings(v);
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_tinker(
        partial: PartialTinkerConfig,
        args: &BuildArgs,
    ) -> Result<core_config::TinkerConfig> {
        let work_dir = args
            .work_dir
            .clone()
            .or(partial.work_dir)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_WORK_DIR_NAME));

        let mut builder = core_config::TinkerConfigBuilder::new().work_dir(work_dir);
        if let Some(path) = partial.executable {
            builder = builder.executable(path);
        }
        if let Some(path) = partial.force_field_parameters {
            builder = builder.force_field_parameters(path);
        }
        if let Some(marker) = partial.cycle_marker {
            builder = builder.cycle_marker(marker);
        }
        for keyword in partial.keywords {
            builder = builder.search_keyword(keyword);
        }
        for (symbol, atom_type) in partial.atom_types {
            builder = builder.atom_type(symbol, atom_type);
        }
        if let Some(n) = partial.search_directions {
            builder = builder.search_directions(n);
        }
        if let Some(g) = partial.rms_gradient {
            builder = builder.rms_gradient(g);
        }
        builder
            .build()
            .map_err(|e| CliError::TinkerSetup(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "builder.align-building-blocks" => {
                    self.builder.get_or_insert_with(Default::default).align_building_blocks =
                        Some(parse_value(key, value)?);
                }
                "builder.anchor-box-edge" => {
                    self.builder.get_or_insert_with(Default::default).anchor_box_edge =
                        Some(parse_value(key, value)?);
                }
                "builder.random-seed" => {
                    self.builder.get_or_insert_with(Default::default).random_seed =
                        Some(parse_value(key, value)?);
                }
                "ring-closure.enabled" => {
                    self.ring_closure.get_or_insert_with(Default::default).enabled =
                        Some(parse_value(key, value)?);
                }
                "ring-closure.distance-tolerance" => {
                    self.ring_closure
                        .get_or_insert_with(Default::default)
                        .distance_tolerance = Some(parse_value(key, value)?);
                }
                "ring-closure.dot-tolerance" => {
                    self.ring_closure
                        .get_or_insert_with(Default::default)
                        .dot_tolerance = Some(parse_value(key, value)?);
                }
                "ring-closure.cap-bond-length" => {
                    self.ring_closure
                        .get_or_insert_with(Default::default)
                        .cap_bond_length = Some(parse_value(key, value)?);
                }
                "ring-closure.max-combinations" => {
                    self.ring_closure
                        .get_or_insert_with(Default::default)
                        .max_combinations = Some(parse_value(key, value)?);
                }
                _ => {
                    return Err(CliError::UnsupportedKey(key.to_string()));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!("Invalid value for {}: {}", key, value))
    })
}
