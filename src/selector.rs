//! Multi-criteria search over template × material combinations.
//!
//! Every combination is planned independently (on the rayon pool when enabled),
//! then a single reduction pass normalises the raw metrics into scores and
//! sorts the feasible plans into a deterministic ranking.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::catalog::Catalogs;
use crate::design::DesignEvent;
use crate::error::{BlockedAttempt, DesignResult, NoFeasibleDesignError};
use crate::model::{DesignConstraints, MaterialProfile, ProductShape, TieBreak};
use crate::optimizer::{DimensionPlan, EngineConfig, plan_dimensions};
use crate::template::PackagingTemplate;

/// mm² per m².
const MM2_PER_M2: f64 = 1_000_000.0;

/// Per-criterion sub-scores, each in `[0, 1]`, and their weighted sum.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct ScoreBreakdown {
    pub protection: f64,
    pub cost: f64,
    pub sustainability: f64,
    pub compactness: f64,
    pub total: f64,
}

/// A feasible combination with its score, in ranking order.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedCandidate {
    /// Zero-based position in the ranking.
    pub rank: usize,
    pub plan: DimensionPlan,
    /// Blank cost of one box.
    pub cost: f64,
    pub sustainability: f64,
    pub scores: ScoreBreakdown,
}

impl RankedCandidate {
    pub fn outer_volume(&self) -> f64 {
        self.plan.outer.volume()
    }
}

/// Everything the search produced.
#[derive(Clone, Debug)]
pub struct Selection {
    /// Number of combinations evaluated.
    pub attempts: usize,
    /// Feasible combinations, best first.
    pub ranked: Vec<RankedCandidate>,
    /// Rejected combinations in evaluation order.
    pub blocked: Vec<BlockedAttempt>,
}

impl Selection {
    pub fn no_feasible_design(&self) -> NoFeasibleDesignError {
        NoFeasibleDesignError::from_attempts(self.attempts, &self.blocked)
    }
}

/// Raw metrics of one feasible combination, before normalisation.
struct Evaluation {
    plan: DimensionPlan,
    strength_rating: u8,
    cost: f64,
    sustainability: f64,
}

fn evaluate(
    shape: &ProductShape,
    template: &PackagingTemplate,
    material: &MaterialProfile,
    constraints: &DesignConstraints,
    config: &EngineConfig,
) -> Result<Evaluation, BlockedAttempt> {
    match plan_dimensions(shape, template, material, constraints, config) {
        Ok(plan) => {
            let cost = plan.layout.blank_area / MM2_PER_M2 * material.cost_per_m2;
            Ok(Evaluation {
                plan,
                strength_rating: material.strength_rating,
                cost,
                sustainability: material.sustainability_score,
            })
        }
        Err(blocked_by) => Err(BlockedAttempt::new(&template.id, &material.id, blocked_by)),
    }
}

/// Runs the search and ranks every feasible combination.
///
/// # Errors
/// - `CatalogError::UnknownId` when an allow-list names an unknown entry
/// - `NoFeasibleDesignError` when no combination passes the hard constraints
pub fn select(
    shape: &ProductShape,
    catalogs: &Catalogs,
    constraints: &DesignConstraints,
    config: &EngineConfig,
    mut on_event: impl FnMut(&DesignEvent),
) -> DesignResult<Selection> {
    let templates = catalogs
        .templates
        .resolve(constraints.template_allow_list.as_deref())?;
    let materials = catalogs
        .materials
        .resolve(constraints.material_allow_list.as_deref())?;

    let combinations: Vec<(&PackagingTemplate, &MaterialProfile)> = templates
        .iter()
        .flat_map(|&t| materials.iter().map(move |&m| (t, m)))
        .collect();
    on_event(&DesignEvent::SearchStarted {
        templates: templates.len(),
        materials: materials.len(),
        combinations: combinations.len(),
    });

    let results: Vec<Result<Evaluation, BlockedAttempt>> = if config.parallel_search {
        combinations
            .par_iter()
            .map(|(t, m)| evaluate(shape, t, m, constraints, config))
            .collect()
    } else {
        combinations
            .iter()
            .map(|(t, m)| evaluate(shape, t, m, constraints, config))
            .collect()
    };

    let mut feasible = Vec::new();
    let mut blocked = Vec::new();
    for result in results {
        match result {
            Ok(evaluation) => {
                on_event(&DesignEvent::CombinationFeasible {
                    template_id: evaluation.plan.template_id.clone(),
                    material_id: evaluation.plan.material_id.clone(),
                    variant: evaluation.plan.variant,
                    outer: evaluation.plan.outer.to_array(),
                    wall_thickness: evaluation.plan.wall_thickness,
                    cost: evaluation.cost,
                });
                feasible.push(evaluation);
            }
            Err(attempt) => {
                debug!(
                    template = %attempt.template_id,
                    material = %attempt.material_id,
                    constraint = attempt.blocked_by.code(),
                    "combination rejected"
                );
                on_event(&DesignEvent::CombinationRejected {
                    template_id: attempt.template_id.clone(),
                    material_id: attempt.material_id.clone(),
                    constraint: attempt.blocked_by.code().to_string(),
                    reason: attempt.blocked_by.to_string(),
                });
                blocked.push(attempt);
            }
        }
    }

    let selection = Selection {
        attempts: combinations.len(),
        ranked: rank(shape, constraints, config, feasible),
        blocked,
    };

    if selection.ranked.is_empty() {
        let err = selection.no_feasible_design();
        info!(attempts = selection.attempts, %err, "no feasible combination");
        return Err(err.into());
    }

    for candidate in &selection.ranked {
        on_event(&DesignEvent::CandidateRanked {
            rank: candidate.rank,
            template_id: candidate.plan.template_id.clone(),
            material_id: candidate.plan.material_id.clone(),
            score: candidate.scores,
        });
    }
    info!(
        attempts = selection.attempts,
        feasible = selection.ranked.len(),
        best_template = %selection.ranked[0].plan.template_id,
        best_material = %selection.ranked[0].plan.material_id,
        "search finished"
    );
    Ok(selection)
}

/// Normalises the raw metrics and sorts best first.
fn rank(
    shape: &ProductShape,
    constraints: &DesignConstraints,
    config: &EngineConfig,
    feasible: Vec<Evaluation>,
) -> Vec<RankedCandidate> {
    let weights = constraints.weights.normalized();
    let fragility = shape.fragility();
    let min_cost = feasible
        .iter()
        .map(|e| e.cost)
        .fold(f64::INFINITY, f64::min);

    let mut ranked: Vec<RankedCandidate> = feasible
        .into_iter()
        .map(|e| {
            let protection = 0.5 * f64::from(e.strength_rating) / 10.0
                + 0.5 * (e.plan.wall_thickness / fragility.reference_wall_thickness()).min(1.0);
            let cost = if e.cost <= 0.0 { 1.0 } else { (min_cost / e.cost).clamp(0.0, 1.0) };
            let outer_volume = e.plan.outer.volume();
            let compactness = if outer_volume > 0.0 {
                (shape.volume() / outer_volume).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let total = weights.protection * protection
                + weights.cost * cost
                + weights.sustainability * e.sustainability
                + weights.compactness * compactness;
            RankedCandidate {
                rank: 0,
                plan: e.plan,
                cost: e.cost,
                sustainability: e.sustainability,
                scores: ScoreBreakdown {
                    protection,
                    cost,
                    sustainability: e.sustainability,
                    compactness,
                    total,
                },
            }
        })
        .collect();

    let order = config.tie_break_for(constraints);
    ranked.sort_by(|a, b| compare_candidates(a, b, order, config.score_epsilon));
    for (rank, candidate) in ranked.iter_mut().enumerate() {
        candidate.rank = rank;
    }
    ranked
}

/// Bucket of a total score: `round(score / epsilon)`.
///
/// Equality means "same bucket", not "closer than epsilon"; a tolerance
/// comparison would not be transitive and `sort_by` needs a total order.
fn score_bucket(score: f64, epsilon: f64) -> i64 {
    (score / epsilon.max(f64::MIN_POSITIVE)).round() as i64
}

fn compare_candidates(
    a: &RankedCandidate,
    b: &RankedCandidate,
    order: &[TieBreak],
    epsilon: f64,
) -> Ordering {
    let by_score = score_bucket(b.scores.total, epsilon).cmp(&score_bucket(a.scores.total, epsilon));
    order
        .iter()
        .fold(by_score, |acc, tie| {
            acc.then_with(|| match tie {
                TieBreak::OuterVolume => a.outer_volume().total_cmp(&b.outer_volume()),
                TieBreak::Cost => a.cost.total_cmp(&b.cost),
                TieBreak::Sustainability => b.sustainability.total_cmp(&a.sustainability),
            })
        })
        .then_with(|| a.plan.template_id.cmp(&b.plan.template_id))
        .then_with(|| a.plan.material_id.cmp(&b.plan.material_id))
}
