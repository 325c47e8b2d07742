use super::closability::RingClosure;
use super::ranking::{self, Candidate, separation_score};
use super::rca::{
    AttractorPair, RingClosingAttractor, alternative_pairings, find_attractors, ring_pairs,
    same_pairing,
};
use super::saturation::saturate;
use super::search::{ConformationalSearch, SearchRequest};
use crate::core::graph::graph::Graph;
use crate::engine::config::{ConfigError, RingClosureConfig};
use crate::engine::error::EngineError;
use crate::engine::model::MolecularModel;
use crate::engine::progress::{Progress, ProgressReporter};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Explores ring-closing attractor pairings and commits the ring bonds that the
/// conformational search brings into closable geometry.
pub struct RingClosureEvaluator<'a> {
    config: &'a RingClosureConfig,
    search: Option<&'a dyn ConformationalSearch>,
    atom_types: &'a HashMap<String, u32>,
}

impl<'a> RingClosureEvaluator<'a> {
    pub fn new(
        config: &'a RingClosureConfig,
        search: Option<&'a dyn ConformationalSearch>,
        atom_types: &'a HashMap<String, u32>,
    ) -> Self {
        Self {
            config,
            search,
            atom_types,
        }
    }

    /// Evaluates every candidate pairing and returns the candidates best first.
    ///
    /// Graphs without open rings, and runs with ring closure disabled, yield a
    /// single candidate whose attractors are all capped. A failing combination is
    /// logged and dropped; only when every combination fails is an error returned.
    #[instrument(skip_all, name = "ring_closure", fields(graph_id = graph.id))]
    pub fn evaluate(
        &self,
        graph: &Graph,
        model: MolecularModel,
        name: &str,
        reporter: &ProgressReporter,
    ) -> Result<Vec<Candidate>, EngineError> {
        let attractors = find_attractors(&model.assembled)?;
        let open_rings = graph
            .rings()
            .len()
            .saturating_sub(model.assembled.closed_rings);

        let requested = if self.config.enabled && open_rings > 0 {
            ring_pairs(graph, &attractors)
        } else {
            Vec::new()
        };
        if requested.is_empty() {
            debug!(attractors = attractors.len(), "No rings to close; capping attractors.");
            return Ok(vec![self.passthrough(model, &attractors)?]);
        }

        let search = self
            .search
            .ok_or(ConfigError::MissingParameter("tinker"))?;
        let combinations = self.combinations(requested, &attractors);
        info!(
            combinations = combinations.len(),
            rings = combinations[0].len(),
            "Evaluating ring-closure combinations."
        );

        reporter.report(Progress::TaskStart {
            total_steps: combinations.len() as u64,
        });

        #[cfg(not(feature = "parallel"))]
        let iterator = combinations.iter().enumerate();

        #[cfg(feature = "parallel")]
        let iterator = combinations.par_iter().enumerate();

        let results: Vec<Result<Candidate, EngineError>> = iterator
            .map(|(iteration, pairs)| {
                let result = self.evaluate_combination(
                    search,
                    &model,
                    &attractors,
                    pairs,
                    name,
                    iteration,
                );
                reporter.report(Progress::TaskIncrement);
                result
            })
            .collect();

        reporter.report(Progress::TaskFinish);

        let mut candidates = Vec::with_capacity(results.len());
        let mut last_error = None;
        for (iteration, result) in results.into_iter().enumerate() {
            match result {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => {
                    warn!(iteration, error = %e, "Ring-closure combination failed.");
                    last_error = Some(e);
                }
            }
        }

        if candidates.is_empty() {
            return Err(EngineError::NoViableCandidate {
                graph_id: graph.id,
                reason: last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no combination was evaluated".to_string()),
                partial: Box::new(model),
            });
        }

        let ranked = ranking::rank(candidates);
        info!(
            candidates = ranked.len(),
            best_closed = ranked[0].closed,
            requested = ranked[0].requested,
            "Ring-closure evaluation complete."
        );
        Ok(ranked)
    }

    /// The graph's own pairing first, then distinct alternatives if enabled.
    fn combinations(
        &self,
        requested: Vec<AttractorPair>,
        attractors: &[RingClosingAttractor],
    ) -> Vec<Vec<AttractorPair>> {
        let size = requested.len();
        let mut combinations = vec![requested];
        if self.config.explore_alternative_pairings {
            for alternative in
                alternative_pairings(attractors, size, self.config.max_combinations)
            {
                if combinations.len() >= self.config.max_combinations {
                    break;
                }
                if !combinations.iter().any(|c| same_pairing(c, &alternative)) {
                    combinations.push(alternative);
                }
            }
        }
        combinations
    }

    /// Caps every attractor without attempting any closure.
    pub fn passthrough(
        &self,
        mut model: MolecularModel,
        attractors: &[RingClosingAttractor],
    ) -> Result<Candidate, EngineError> {
        saturate(
            &mut model,
            attractors,
            self.config.cap_bond_length,
            self.atom_types,
        )?;
        let closed = model.assembled.closed_rings;
        let separation = separation_score(model.structure());
        Ok(Candidate {
            model,
            pairs: Vec::new(),
            requested: closed,
            closed,
            quality: 0.0,
            separation,
        })
    }

    #[instrument(skip_all, fields(iteration = iteration))]
    fn evaluate_combination(
        &self,
        search: &dyn ConformationalSearch,
        model: &MolecularModel,
        attractors: &[RingClosingAttractor],
        pairs: &[AttractorPair],
        name: &str,
        iteration: usize,
    ) -> Result<Candidate, EngineError> {
        let mut model = model.clone();
        let mut attractors = attractors.to_vec();

        let attractor_atoms: Vec<(usize, usize)> = pairs
            .iter()
            .map(|p| (attractors[p.head].atom, attractors[p.tail].atom))
            .collect();
        let optimised = search.search(&SearchRequest {
            name,
            iteration,
            zmatrix: &model.zmatrix,
            attractor_pairs: &attractor_atoms,
            rotatable_bonds: &model.rotatable_bonds,
        })?;
        model.zmatrix.absorb_geometry(&optimised)?;
        model.refresh_cartesian()?;

        let mut qualities = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let (head, tail) = (&attractors[pair.head], &attractors[pair.tail]);
            let closure = RingClosure::from_structure(model.structure(), head, tail)
                .ok_or_else(|| {
                    EngineError::Internal(format!(
                        "attractor atoms {} and {} are missing",
                        head.atom, tail.atom
                    ))
                })?;
            let result = closure.evaluate(
                self.config.strategy,
                self.config.distance_tolerance,
                self.config.dot_tolerance,
            );
            debug!(
                head = head.atom,
                tail = tail.atom,
                closable = result.closable,
                quality = result.quality,
                "Checked ring closure."
            );
            if !result.closable {
                continue;
            }

            if pair.bond_type.has_chemical_analogue() {
                let (a, b) = (head.source_atom, tail.source_atom);
                model.add_bond(a, b, pair.bond_type);
            }
            attractors[pair.head].used = true;
            attractors[pair.tail].used = true;
            qualities.push(result.quality);
        }

        model.drop_cyclic_rotatable_bonds();
        saturate(
            &mut model,
            &attractors,
            self.config.cap_bond_length,
            self.atom_types,
        )?;

        let closed = qualities.len();
        let requested = pairs.len();
        if closed < requested {
            let note = format!("closed {} of {} requested rings", closed, requested);
            let metadata = &mut model.assembled.metadata;
            metadata.annotation = Some(match metadata.annotation.take() {
                Some(existing) => format!("{}; {}", existing, note),
                None => note,
            });
        }

        let quality = if qualities.is_empty() {
            f64::INFINITY
        } else {
            qualities.iter().sum::<f64>() / qualities.len() as f64
        };
        let separation = separation_score(model.structure());
        Ok(Candidate {
            model,
            pairs: pairs.to_vec(),
            requested,
            closed,
            quality,
            separation,
        })
    }
}
