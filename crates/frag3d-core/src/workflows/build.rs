use crate::core::graph::graph::Graph;
use crate::core::library::BuildingBlockProvider;
use crate::engine::builder::TreeBuilder;
use crate::engine::config::BuildConfig;
use crate::engine::error::EngineError;
use crate::engine::model::MolecularModel;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::ring_closure::{
    Candidate, ConformationalSearch, RingClosureEvaluator, TinkerSearch,
};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Ring-closure candidates, best first. Never empty.
    pub candidates: Vec<Candidate>,
}

impl BuildResult {
    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}

/// Builds a 3D model of `graph`, closing rings through Tinker when configured.
#[instrument(skip_all, name = "build_workflow", fields(graph_id = graph.id))]
pub fn run(
    graph: &Graph,
    library: &dyn BuildingBlockProvider,
    config: &BuildConfig,
    reporter: &ProgressReporter,
) -> Result<BuildResult, EngineError> {
    let tinker = config
        .tinker
        .clone()
        .map(|t| TinkerSearch::new(t, config.ring_closure.closing_potential));
    run_with_search(
        graph,
        library,
        config,
        tinker.as_ref().map(|t| t as &dyn ConformationalSearch),
        reporter,
    )
}

/// Like [`run`], with an explicit conformational search implementation.
pub fn run_with_search(
    graph: &Graph,
    library: &dyn BuildingBlockProvider,
    config: &BuildConfig,
    search: Option<&dyn ConformationalSearch>,
    reporter: &ProgressReporter,
) -> Result<BuildResult, EngineError> {
    // === Phase 1: Tree assembly ===
    let assembled = {
        let _phase = reporter.phase("Assembling Tree");
        let mut builder = TreeBuilder::new(library, config.builder.clone());
        builder.assemble(
            graph,
            config.builder.remove_used_ring_placeholders,
            config.builder.enforce_valence_requirements,
        )?
    };

    // === Phase 2: Internal coordinates ===
    let model = {
        let _phase = reporter.phase("Preparing Internal Coordinates");
        MolecularModel::prepare(assembled, &config.atom_types)?
    };

    // === Phase 3: Ring closure and ranking ===
    let candidates = {
        let _phase = reporter.phase("Closing Rings");
        let evaluator =
            RingClosureEvaluator::new(&config.ring_closure, search, &config.atom_types);
        evaluator.evaluate(graph, model, &format!("graph_{}", graph.id), reporter)?
    };

    let best = &candidates[0];
    reporter.report(Progress::Message(format!(
        "Best candidate closed {}/{} rings",
        best.closed, best.requested
    )));
    info!(
        candidates = candidates.len(),
        atoms = best.model.structure().atom_count(),
        closed = best.closed,
        requested = best.requested,
        "Build workflow complete."
    );
    Ok(BuildResult { candidates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::vertex::VertexKind;
    use crate::core::library::{
        ApTemplate, BlockAtom, BlockBond, BlockKind, BlockRef, BuildingBlock, FragmentLibrary,
    };
    use crate::core::models::ids::VertexId;
    use crate::core::models::topology::BondType;
    use crate::core::zmatrix::ZMatrix;
    use crate::engine::config::{
        BuildConfigBuilder, BuilderConfigBuilder, ConfigError, RingClosureConfigBuilder,
    };
    use crate::engine::ring_closure::SearchRequest;
    use std::sync::Mutex;

    struct EchoSearch;

    impl ConformationalSearch for EchoSearch {
        fn search(&self, request: &SearchRequest<'_>) -> Result<ZMatrix, EngineError> {
            Ok(request.zmatrix.clone())
        }
    }

    struct FailingSearch;

    impl ConformationalSearch for FailingSearch {
        fn search(&self, _: &SearchRequest<'_>) -> Result<ZMatrix, EngineError> {
            Err(EngineError::Internal("search crashed".into()))
        }
    }

    fn atom(element: &str, position: [f64; 3]) -> BlockAtom {
        BlockAtom {
            element: element.into(),
            position,
            charge: 0,
        }
    }

    fn ap(atom: usize, end_point: [f64; 3]) -> ApTemplate {
        ApTemplate {
            atom,
            end_point,
            class: None,
        }
    }

    fn single(pairs: &[[usize; 2]]) -> Vec<BlockBond> {
        pairs
            .iter()
            .map(|&atoms| BlockBond {
                atoms,
                order: BondType::Single,
            })
            .collect()
    }

    fn block(name: &str, atoms: Vec<BlockAtom>, bonds: &[[usize; 2]], aps: Vec<ApTemplate>) -> BuildingBlock {
        BuildingBlock {
            name: name.into(),
            contains_atoms: true,
            atoms,
            bonds: single(bonds),
            attachment_points: aps,
        }
    }

    /// Square chain with facing attractors; blocks use absolute coordinates.
    fn ring_case() -> (FragmentLibrary, Graph) {
        let mut library = FragmentLibrary::new();
        let chain = library.add(
            BlockKind::Scaffold,
            block(
                "butane",
                vec![
                    atom("C", [0.0, 0.0, 0.0]),
                    atom("C", [1.5, 0.0, 0.0]),
                    atom("C", [1.5, 1.5, 0.0]),
                    atom("C", [0.0, 1.5, 0.0]),
                ],
                &[[0, 1], [1, 2], [2, 3]],
                vec![ap(0, [0.0, 1.5, 0.0]), ap(3, [0.0, 0.0, 0.0])],
            ),
        );
        let plus = library.add(
            BlockKind::Fragment,
            block("plus", vec![atom("ATP", [0.0, 1.5, 0.0])], &[], vec![ap(0, [0.0, 0.0, 1.0])]),
        );
        let minus = library.add(
            BlockKind::Fragment,
            block("minus", vec![atom("ATM", [0.0, 0.0, 0.0])], &[], vec![ap(0, [0.0, 0.0, 1.0])]),
        );

        let bb = |block: BlockRef| VertexKind::BuildingBlock { block };
        let mut g = Graph::new(7);
        g.add_vertex(VertexId(1), bb(chain), false, &library).unwrap();
        g.add_vertex(VertexId(2), bb(plus), true, &library).unwrap();
        g.add_vertex(VertexId(3), bb(minus), true, &library).unwrap();
        g.connect(VertexId(1), 0, VertexId(2), 0, BondType::Single).unwrap();
        g.connect(VertexId(1), 1, VertexId(3), 0, BondType::Single).unwrap();
        g.add_ring(VertexId(2), VertexId(3), BondType::Single).unwrap();
        (library, g)
    }

    fn chain_case() -> (FragmentLibrary, Graph) {
        let mut library = FragmentLibrary::new();
        let ethyl = library.add(
            BlockKind::Fragment,
            block(
                "ethyl",
                vec![atom("C", [0.0, 0.0, 0.0]), atom("C", [1.0, 1.0, 0.0])],
                &[[0, 1]],
                vec![ap(0, [-1.0, 0.3, 0.2]), ap(1, [2.0, 0.7, -0.4])],
            ),
        );
        let kind = VertexKind::BuildingBlock { block: ethyl };
        let mut g = Graph::new(3);
        for id in 1..=3 {
            g.add_vertex(VertexId(id), kind.clone(), false, &library).unwrap();
        }
        g.connect(VertexId(1), 1, VertexId(2), 0, BondType::Single).unwrap();
        g.connect(VertexId(2), 1, VertexId(3), 0, BondType::Single).unwrap();
        (library, g)
    }

    fn unaligned() -> BuildConfigBuilder {
        BuildConfigBuilder::new().builder(
            BuilderConfigBuilder::new()
                .align_building_blocks(false)
                .random_seed(11)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn acyclic_graph_needs_no_search() {
        let (library, graph) = chain_case();
        let config = BuildConfigBuilder::new()
            .builder(BuilderConfigBuilder::new().random_seed(2).build().unwrap())
            .build()
            .unwrap();

        let result = run(&graph, &library, &config, &ProgressReporter::new()).unwrap();
        assert_eq!(result.candidates.len(), 1);
        let best = result.best().unwrap();
        assert_eq!(best.model.structure().atom_count(), 6);
        assert_eq!((best.closed, best.requested), (0, 0));
        assert_eq!(best.model.rotatable_bonds.len(), 2);
    }

    #[test]
    fn ring_graph_is_closed_through_the_search() {
        let (library, graph) = ring_case();
        let config = unaligned().build().unwrap();

        let result =
            run_with_search(&graph, &library, &config, Some(&EchoSearch), &ProgressReporter::new())
                .unwrap();
        let best = result.best().unwrap();
        assert!(best.is_complete());
        assert_eq!(best.closed, 1);
        assert_eq!(best.model.structure().bond_count(), 6);

        let meta = best.sdf_metadata("ring");
        assert_eq!(meta.get("UID"), Some("7"));
        assert_eq!(meta.get("RING_CLOSURES"), Some("1/1"));
    }

    #[test]
    fn ring_graph_without_search_fails_fast() {
        let (library, graph) = ring_case();
        let config = unaligned().build().unwrap();

        let err = run(&graph, &library, &config, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::MissingParameter("tinker"))
        ));
    }

    #[test]
    fn failed_ring_closure_keeps_the_assembled_tree() {
        let (library, graph) = ring_case();
        let config = unaligned().build().unwrap();

        let err = run_with_search(
            &graph,
            &library,
            &config,
            Some(&FailingSearch),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        match err {
            EngineError::NoViableCandidate {
                graph_id, partial, ..
            } => {
                assert_eq!(graph_id, 7);
                assert_eq!(partial.structure().atom_count(), 6);
                assert_eq!(partial.structure().bond_count(), 5);
                assert_eq!(partial.assembled.metadata.graph_id, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bondless_attractor_is_capped_when_ring_closure_is_off() {
        let mut library = FragmentLibrary::new();
        let carbon = library.add(
            BlockKind::Scaffold,
            block("methyl", vec![atom("C", [0.0, 0.0, 0.0])], &[], vec![ap(0, [1.0, 0.0, 0.0])]),
        );
        let neutral = library.add(
            BlockKind::Fragment,
            block("neutral", vec![atom("ATN", [1.5, 0.0, 0.0])], &[], vec![ap(0, [0.0, 0.0, 0.0])]),
        );
        let mut graph = Graph::new(12);
        graph
            .add_vertex(VertexId(1), VertexKind::BuildingBlock { block: carbon }, false, &library)
            .unwrap();
        graph
            .add_vertex(VertexId(2), VertexKind::BuildingBlock { block: neutral }, true, &library)
            .unwrap();
        graph
            .connect(VertexId(1), 0, VertexId(2), 0, BondType::None)
            .unwrap();
        let config = unaligned()
            .ring_closure(RingClosureConfigBuilder::new().enabled(false).build().unwrap())
            .build()
            .unwrap();

        let result =
            run_with_search(&graph, &library, &config, None, &ProgressReporter::new()).unwrap();
        let s = result.best().unwrap().model.structure();
        assert_eq!(s.atom_count(), 2);
        assert_eq!(s.bond_count(), 0);
        assert!(s.atoms().iter().all(|a| a.attractor_kind().is_none()));

        let find = |element: &str| s.atoms().iter().find(|a| a.element == element).unwrap().position;
        let cap = config.ring_closure.cap_bond_length;
        assert!(((find("H") - find("C")).norm() - cap).abs() < 1e-9);
    }

    #[test]
    fn removed_placeholders_count_as_closed_rings() {
        let (library, graph) = ring_case();
        let config = BuildConfigBuilder::new()
            .builder(
                BuilderConfigBuilder::new()
                    .align_building_blocks(false)
                    .remove_used_ring_placeholders(true)
                    .build()
                    .unwrap(),
            )
            .ring_closure(RingClosureConfigBuilder::new().build().unwrap())
            .build()
            .unwrap();

        let result = run(&graph, &library, &config, &ProgressReporter::new()).unwrap();
        let best = result.best().unwrap();
        assert_eq!((best.closed, best.requested), (1, 1));
        assert_eq!(best.model.structure().atom_count(), 4);
        assert_eq!(best.model.structure().bond_count(), 4);
    }

    #[test]
    fn phases_are_reported_in_order() {
        let (library, graph) = chain_case();
        let config = BuildConfigBuilder::new().build().unwrap();
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|e| {
            events.lock().unwrap().push(e);
        }));

        run(&graph, &library, &config, &reporter).unwrap();
        drop(reporter);

        let phases: Vec<&'static str> = events
            .into_inner()
            .unwrap()
            .into_iter()
            .filter_map(|e| match e {
                Progress::PhaseStart { name } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                "Assembling Tree",
                "Preparing Internal Coordinates",
                "Closing Rings"
            ]
        );
    }
}
