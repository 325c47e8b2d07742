use crate::cli::BuildArgs;
use crate::config::PartialBuildConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use frag3d::{
    core::graph::graph::Graph,
    core::io::{sdf::SdfFile, traits::MolecularFile},
    core::library::FragmentLibrary,
    engine::{
        config::ConfigError, error::EngineError, model::MolecularModel,
        progress::ProgressReporter,
    },
    workflows,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

pub fn run(args: BuildArgs) -> Result<()> {
    if args.num_candidates == 0 {
        return Err(CliError::Argument(
            "--num-candidates must be at least 1".to_string(),
        ));
    }

    let partial_config = match &args.config {
        Some(path) => PartialBuildConfig::from_file(path)?,
        None => PartialBuildConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.merge_with_cli(&args)?;

    info!("Loading building-block library from {:?}", &args.library);
    let library = FragmentLibrary::load(&args.library).map_err(EngineError::from)?;

    info!("Loading graph from {:?}", &args.graph);
    let json = std::fs::read_to_string(&args.graph)?;
    let graph = Graph::from_json(&json, &library).map_err(|e| CliError::FileParsing {
        path: args.graph.clone(),
        source: e.into(),
    })?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Building graph {}...", graph.id);
    let result = match workflows::build::run(&graph, &library, &final_config, &reporter) {
        Ok(result) => result,
        Err(EngineError::NoViableCandidate {
            graph_id,
            reason,
            partial,
        }) => {
            write_partial(&partial, graph_id, &args.output)?;
            return Err(CliError::RingClosureFailed {
                graph_id,
                reason,
                partial: args.output.clone(),
            });
        }
        Err(EngineError::Config(ConfigError::MissingParameter("tinker"))) => {
            return Err(CliError::TinkerSetup(format!(
                "graph {} declares rings to close; pass --no-ring-closure to cap them instead",
                graph.id
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let selected = &result.candidates[..args.num_candidates.min(result.candidates.len())];
    if selected.len() < args.num_candidates {
        warn!(
            "Requested {} candidate(s), only {} available.",
            args.num_candidates,
            selected.len()
        );
    }

    let mut writer = BufWriter::new(File::create(&args.output)?);
    for (rank, candidate) in selected.iter().enumerate() {
        let title = format!("graph_{}_rank_{}", graph.id, rank + 1);
        SdfFile::write_to(candidate.model.structure(), &candidate.sdf_metadata(&title), &mut writer)
            .map_err(EngineError::from)?;

        let status = if candidate.is_complete() {
            "all rings closed"
        } else {
            "rings left open"
        };
        println!(
            "  #{} closed {}/{} rings ({}), quality {:.3}",
            rank + 1,
            candidate.closed,
            candidate.requested,
            status,
            candidate.quality
        );
    }
    writer.flush()?;

    println!(
        "✓ Wrote {} candidate(s) to: {}",
        selected.len(),
        args.output.display()
    );
    Ok(())
}

/// Writes the assembled tree, attractors still in place, when no ring could be evaluated.
fn write_partial(model: &MolecularModel, graph_id: u64, path: &Path) -> Result<()> {
    let title = format!("graph_{}_partial", graph_id);
    let mut writer = BufWriter::new(File::create(path)?);
    SdfFile::write_to(model.structure(), &model.assembled.sdf_metadata(&title), &mut writer)
        .map_err(EngineError::from)?;
    writer.flush()?;
    warn!("Ring closure failed; wrote the open tree to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    const LIBRARY: &str = r#"
[[fragments]]
name = "ethyl"
atoms = [
    { element = "C", position = [0.0, 0.0, 0.0] },
    { element = "C", position = [1.0, 1.0, 0.0] },
]
bonds = [{ atoms = [0, 1] }]
attachment-points = [
    { atom = 0, end-point = [-1.0, 0.3, 0.2] },
    { atom = 1, end-point = [2.0, 0.7, -0.4] },
]

[[fragments]]
name = "plus"
atoms = [{ element = "ATP", position = [0.0, 0.0, 0.0] }]
attachment-points = [{ atom = 0, end-point = [1.0, 0.0, 0.0] }]

[[fragments]]
name = "minus"
atoms = [{ element = "ATM", position = [0.0, 0.0, 0.0] }]
attachment-points = [{ atom = 0, end-point = [1.0, 0.0, 0.0] }]
"#;

    const RING_GRAPH: &str = r#"{
        "graph-id": 5,
        "vertices": [
            { "id": 1, "type": "building-block", "block": { "kind": "fragment", "index": 0 } },
            { "id": 2, "type": "building-block", "block": { "kind": "fragment", "index": 1 }, "ring-closing": true },
            { "id": 3, "type": "building-block", "block": { "kind": "fragment", "index": 2 }, "ring-closing": true }
        ],
        "edges": [
            { "src-vertex": 1, "src-ap": 0, "trg-vertex": 2, "trg-ap": 0 },
            { "src-vertex": 1, "src-ap": 1, "trg-vertex": 3, "trg-ap": 0 }
        ],
        "rings": [{ "head": 2, "tail": 3 }]
    }"#;

    const GRAPH: &str = r#"{
        "graph-id": 3,
        "vertices": [
            { "id": 1, "type": "building-block", "block": { "kind": "fragment", "index": 0 } },
            { "id": 2, "type": "building-block", "block": { "kind": "fragment", "index": 0 } }
        ],
        "edges": [
            { "src-vertex": 1, "src-ap": 1, "trg-vertex": 2, "trg-ap": 0 }
        ]
    }"#;

    fn args(dir: &Path, extra: &[&str]) -> BuildArgs {
        let graph = dir.join("graph.json");
        let library = dir.join("library.toml");
        fs::write(&graph, GRAPH).unwrap();
        fs::write(&library, LIBRARY).unwrap();

        let output = dir.join("out.sdf");
        let mut argv = vec![
            "frag3d".to_string(),
            "build".to_string(),
            "-g".to_string(),
            graph.display().to_string(),
            "-l".to_string(),
            library.display().to_string(),
            "-o".to_string(),
            output.display().to_string(),
            "--seed".to_string(),
            "2".to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        let Commands::Build(args) = Cli::parse_from(argv).command;
        args
    }

    #[test]
    fn acyclic_graph_is_written_as_sdf() {
        let dir = tempdir().unwrap();
        let args = args(dir.path(), &[]);
        let output = args.output.clone();

        run(args).unwrap();

        let sdf = fs::read_to_string(output).unwrap();
        assert!(sdf.starts_with("graph_3_rank_1"));
        assert_eq!(sdf.matches("$$$$").count(), 1);
        assert!(sdf.contains("RING_CLOSURES"));
        assert!(sdf.contains("0/0"));
    }

    #[test]
    fn ring_graph_without_tinker_section_is_a_setup_error() {
        let dir = tempdir().unwrap();
        let args = args(dir.path(), &[]);
        fs::write(&args.graph, RING_GRAPH).unwrap();
        assert!(matches!(run(args), Err(CliError::TinkerSetup(_))));
    }

    #[test]
    fn ring_graph_can_skip_ring_closure() {
        let dir = tempdir().unwrap();
        let args = args(dir.path(), &["--no-ring-closure"]);
        fs::write(&args.graph, RING_GRAPH).unwrap();
        let output = args.output.clone();

        run(args).unwrap();
        let sdf = fs::read_to_string(output).unwrap();
        assert!(sdf.starts_with("graph_5_rank_1"));
        assert!(!sdf.contains("ATP") && !sdf.contains("ATM"));
    }

    #[test]
    #[serial]
    fn failed_ring_closure_writes_the_open_tree() {
        let dir = tempdir().unwrap();
        let work = dir.path().join("work");
        fs::create_dir(&work).unwrap();
        let params = dir.path().join("amber.prm");
        fs::write(&params, "").unwrap();
        let config = dir.path().join("job.toml");
        fs::write(
            &config,
            format!(
                "[tinker]\nexecutable = {:?}\nforce-field-parameters = {:?}\n",
                dir.path().join("no-such-pssrot").display().to_string(),
                params.display().to_string()
            ),
        )
        .unwrap();

        let config_arg = config.display().to_string();
        let work_arg = work.display().to_string();
        let args = args(dir.path(), &["-c", &config_arg, "--work-dir", &work_arg]);
        fs::write(&args.graph, RING_GRAPH).unwrap();
        let output = args.output.clone();

        match run(args) {
            Err(CliError::RingClosureFailed {
                graph_id, partial, ..
            }) => {
                assert_eq!(graph_id, 5);
                assert_eq!(partial, output);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let sdf = fs::read_to_string(output).unwrap();
        assert!(sdf.starts_with("graph_5_partial"));
        assert!(sdf.contains("ATP") && sdf.contains("ATM"));
        assert_eq!(sdf.matches("$$$$").count(), 1);
    }

    #[test]
    fn zero_candidates_is_rejected() {
        let dir = tempdir().unwrap();
        let args = args(dir.path(), &["-n", "0"]);
        assert!(matches!(run(args), Err(CliError::Argument(_))));
    }

    #[test]
    fn malformed_graph_reports_the_path() {
        let dir = tempdir().unwrap();
        let args = args(dir.path(), &[]);
        fs::write(&args.graph, "{ not json").unwrap();
        let graph_path = args.graph.clone();

        match run(args) {
            Err(CliError::FileParsing { path, .. }) => assert_eq!(path, graph_path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_library_is_an_engine_error() {
        let dir = tempdir().unwrap();
        let args = args(dir.path(), &[]);
        fs::remove_file(&args.library).unwrap();
        assert!(matches!(run(args), Err(CliError::Engine(_))));
    }
}
