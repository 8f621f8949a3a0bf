//! Design assembly.
//!
//! `DesignEngine` runs the full pipeline for one request: shape analysis,
//! regulatory text derivation, the template × material search and then, for
//! the ranked candidates in order, label packing and support generation until
//! one candidate carries all of its mandatory labels.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::catalog::Catalogs;
use crate::error::{
    BlockedAttempt, DesignError, DesignResult, Infeasibility, NoFeasibleDesignError,
    SupportFeasibilityWarning,
};
use crate::geometry::find_overlaps;
use crate::labels::{LabelFallback, LabelLayout, pack_labels};
use crate::model::{DesignConstraints, Panel, PanelPreference, ProductShape, TextElement};
use crate::optimizer::EngineConfig;
use crate::regulatory::{merge_elements, required_elements};
use crate::selector::{RankedCandidate, ScoreBreakdown, select};
use crate::shape::{MeshInput, ShapeHints, analyze};
use crate::support::{SupportStructure, generate_supports};
use crate::types::Vec3;

/// Progress events emitted while a design request is processed.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DesignEvent {
    /// The search space is known.
    SearchStarted {
        templates: usize,
        materials: usize,
        combinations: usize,
    },
    /// A combination passed every dimensional constraint.
    CombinationFeasible {
        template_id: String,
        material_id: String,
        variant: u32,
        outer: [f64; 3],
        wall_thickness: f64,
        cost: f64,
    },
    /// A combination was blocked by a hard constraint.
    CombinationRejected {
        template_id: String,
        material_id: String,
        constraint: String,
        reason: String,
    },
    CandidateRanked {
        rank: usize,
        template_id: String,
        material_id: String,
        score: ScoreBreakdown,
    },
    /// A label left its preferred panel role.
    LabelFallback {
        rank: usize,
        element_id: String,
        preferred: PanelPreference,
        panel_id: String,
    },
    /// A ranked candidate could not carry its mandatory labels.
    CandidateRejected {
        rank: usize,
        template_id: String,
        material_id: String,
        constraint: String,
        reason: String,
    },
    DesignSelected {
        rank: usize,
        template_id: String,
        material_id: String,
        score: ScoreBreakdown,
    },
    Finished {
        feasible: bool,
        attempts: usize,
        label_attempts: usize,
    },
    Failed {
        code: String,
        message: String,
        constraint: Option<String>,
    },
}

/// One design request.
#[derive(Clone, Debug, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "request_id": "sku-4711",
        "revision": 0,
        "mesh": {
            "vertices": [
                [0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [0.0, 80.0, 0.0], [100.0, 80.0, 0.0],
                [0.0, 0.0, 50.0], [100.0, 0.0, 50.0], [0.0, 80.0, 50.0], [100.0, 80.0, 50.0]
            ]
        },
        "hints": {"category": "electronics"},
        "constraints": {"padding": {"x": 5.0, "y": 5.0, "z": 5.0}, "regulatory_regions": ["EU"]}
    })
)]
pub struct DesignRequest {
    /// Caller-owned id, passed through to the result.
    #[serde(default)]
    #[schema(nullable = true)]
    pub request_id: Option<String>,
    /// Caller-owned revision number, passed through to the result.
    #[serde(default)]
    pub revision: u32,
    pub mesh: MeshInput,
    #[serde(default)]
    pub hints: ShapeHints,
    #[serde(default)]
    pub constraints: DesignConstraints,
}

impl DesignRequest {
    pub fn new(mesh: MeshInput) -> Self {
        Self {
            request_id: None,
            revision: 0,
            mesh,
            hints: ShapeHints::default(),
            constraints: DesignConstraints::default(),
        }
    }

    pub fn with_constraints(mut self, constraints: DesignConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_hints(mut self, hints: ShapeHints) -> Self {
        self.hints = hints;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Feasibility {
    Feasible,
    Infeasible { blocked_by: Infeasibility },
}

/// Non-fatal findings attached to a candidate.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DesignWarning {
    Support { warning: SupportFeasibilityWarning },
    LabelDropped { element_id: String },
    LabelFallback { fallback: LabelFallback },
}

/// A finished, immutable packaging design.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct DesignCandidate {
    request_id: Option<String>,
    revision: u32,
    template_id: String,
    material_id: String,
    variant: u32,
    inner: Vec3,
    outer: Vec3,
    wall_thickness: f64,
    scores: ScoreBreakdown,
    /// Blank cost of one box.
    cost: f64,
    panels: Vec<Panel>,
    supports: SupportStructure,
    labels: LabelLayout,
    feasibility: Feasibility,
    warnings: Vec<DesignWarning>,
}

impl DesignCandidate {
    fn from_ranked(
        request: &DesignRequest,
        ranked: &RankedCandidate,
        supports: SupportStructure,
        labels: LabelLayout,
        feasibility: Feasibility,
    ) -> Self {
        let mut warnings: Vec<DesignWarning> = supports
            .warnings
            .iter()
            .cloned()
            .map(|warning| DesignWarning::Support { warning })
            .collect();
        warnings.extend(labels.dropped.iter().map(|id| DesignWarning::LabelDropped {
            element_id: id.clone(),
        }));
        warnings.extend(
            labels
                .fallbacks
                .iter()
                .cloned()
                .map(|fallback| DesignWarning::LabelFallback { fallback }),
        );

        let plan = &ranked.plan;
        Self {
            request_id: request.request_id.clone(),
            revision: request.revision,
            template_id: plan.template_id.clone(),
            material_id: plan.material_id.clone(),
            variant: plan.variant,
            inner: plan.inner,
            outer: plan.outer,
            wall_thickness: plan.wall_thickness,
            scores: ranked.scores,
            cost: ranked.cost,
            panels: plan.layout.panels.clone(),
            supports,
            labels,
            feasibility,
            warnings,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn material_id(&self) -> &str {
        &self.material_id
    }

    pub fn variant(&self) -> u32 {
        self.variant
    }

    pub fn inner(&self) -> Vec3 {
        self.inner
    }

    pub fn outer(&self) -> Vec3 {
        self.outer
    }

    pub fn wall_thickness(&self) -> f64 {
        self.wall_thickness
    }

    pub fn scores(&self) -> &ScoreBreakdown {
        &self.scores
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn supports(&self) -> &SupportStructure {
        &self.supports
    }

    pub fn labels(&self) -> &LabelLayout {
        &self.labels
    }

    pub fn feasibility(&self) -> &Feasibility {
        &self.feasibility
    }

    pub fn is_feasible(&self) -> bool {
        self.feasibility == Feasibility::Feasible
    }

    pub fn warnings(&self) -> &[DesignWarning] {
        &self.warnings
    }
}

/// Result of a successful request.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct DesignOutcome {
    pub candidate: DesignCandidate,
    pub shape: ProductShape,
    /// Higher ranked candidates that failed label placement.
    pub rejected: Vec<DesignCandidate>,
    /// Template × material combinations evaluated.
    pub attempts: usize,
    /// Ranked candidates that went through label packing.
    pub label_attempts: usize,
}

/// The design engine. Cheap to clone; catalogs are shared.
#[derive(Clone, Debug)]
pub struct DesignEngine {
    catalogs: Catalogs,
    config: EngineConfig,
}

impl DesignEngine {
    pub fn new(catalogs: Catalogs, config: EngineConfig) -> Self {
        Self { catalogs, config }
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Designs a package for one request.
    pub fn design(&self, request: &DesignRequest) -> DesignResult<DesignOutcome> {
        self.design_with_progress(request, |_| {})
    }

    /// Designs a package, reporting progress through `on_event`.
    ///
    /// The last event is always `Finished` on success or `Failed` on error.
    pub fn design_with_progress(
        &self,
        request: &DesignRequest,
        mut on_event: impl FnMut(&DesignEvent),
    ) -> DesignResult<DesignOutcome> {
        match self.run(request, &mut on_event) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(
                    request = request.request_id.as_deref().unwrap_or("-"),
                    code = err.code(),
                    %err,
                    "design request failed"
                );
                on_event(&DesignEvent::from(&err));
                Err(err)
            }
        }
    }

    fn run(
        &self,
        request: &DesignRequest,
        on_event: &mut impl FnMut(&DesignEvent),
    ) -> DesignResult<DesignOutcome> {
        let constraints = &request.constraints;
        constraints.validate()?;
        let shape = analyze(&request.mesh, &request.hints)?;
        info!(
            request = request.request_id.as_deref().unwrap_or("-"),
            revision = request.revision,
            extents = ?shape.extents().to_array(),
            fragility = shape.fragility().code(),
            "design request started"
        );

        let derived = required_elements(&constraints.regulatory_regions, shape.category());
        let elements = merge_elements(derived, &constraints.text_elements);

        let selection = select(&shape, &self.catalogs, constraints, &self.config, &mut *on_event)?;

        let mut rejected = Vec::new();
        let mut label_blocked: Vec<BlockedAttempt> = Vec::new();
        for ranked in selection.ranked.iter().take(1 + self.config.max_label_retries) {
            let plan = &ranked.plan;
            match pack_labels(&plan.layout.panels, &elements, self.config.label_margin) {
                Err(err) => {
                    let blocked_by = Infeasibility::LabelPlacement { error: err };
                    debug!(
                        rank = ranked.rank,
                        template = %plan.template_id,
                        material = %plan.material_id,
                        reason = %blocked_by,
                        "candidate failed label placement"
                    );
                    on_event(&DesignEvent::CandidateRejected {
                        rank: ranked.rank,
                        template_id: plan.template_id.clone(),
                        material_id: plan.material_id.clone(),
                        constraint: blocked_by.code().to_string(),
                        reason: blocked_by.to_string(),
                    });
                    label_blocked.push(BlockedAttempt::new(
                        &plan.template_id,
                        &plan.material_id,
                        blocked_by.clone(),
                    ));
                    rejected.push(DesignCandidate::from_ranked(
                        request,
                        ranked,
                        SupportStructure::default(),
                        LabelLayout::default(),
                        Feasibility::Infeasible { blocked_by },
                    ));
                }
                Ok(labels) => {
                    debug_assert!(find_overlaps(&labels.placements).is_empty());
                    for fallback in &labels.fallbacks {
                        on_event(&DesignEvent::LabelFallback {
                            rank: ranked.rank,
                            element_id: fallback.element_id.clone(),
                            preferred: fallback.preferred,
                            panel_id: fallback.panel_id.clone(),
                        });
                    }
                    let supports = generate_supports(&shape, plan, &self.config);
                    let candidate = DesignCandidate::from_ranked(
                        request,
                        ranked,
                        supports,
                        labels,
                        Feasibility::Feasible,
                    );
                    let label_attempts = rejected.len() + 1;
                    on_event(&DesignEvent::DesignSelected {
                        rank: ranked.rank,
                        template_id: candidate.template_id.clone(),
                        material_id: candidate.material_id.clone(),
                        score: candidate.scores,
                    });
                    on_event(&DesignEvent::Finished {
                        feasible: true,
                        attempts: selection.attempts,
                        label_attempts,
                    });
                    info!(
                        template = %candidate.template_id,
                        material = %candidate.material_id,
                        rank = ranked.rank,
                        score = candidate.scores.total,
                        warnings = candidate.warnings.len(),
                        "design selected"
                    );
                    return Ok(DesignOutcome {
                        candidate,
                        shape,
                        rejected,
                        attempts: selection.attempts,
                        label_attempts,
                    });
                }
            }
        }

        on_event(&DesignEvent::Finished {
            feasible: false,
            attempts: selection.attempts,
            label_attempts: rejected.len(),
        });
        let mut blocked = selection.blocked;
        blocked.extend(label_blocked);
        Err(NoFeasibleDesignError::from_attempts(selection.attempts, &blocked).into())
    }
}

/// Checks the invariants every returned design must hold.
///
/// Returns the first violation as a message.
pub fn check_invariants(
    candidate: &DesignCandidate,
    shape: &ProductShape,
    padding: Vec3,
    elements: &[TextElement],
) -> Result<(), String> {
    let tol = 1e-6;
    for axis in 0..3 {
        let expected_outer = candidate.inner.axis(axis) + 2.0 * candidate.wall_thickness;
        if (candidate.outer.axis(axis) - expected_outer).abs() > tol {
            return Err(format!("outer {axis} is not inner plus two walls"));
        }
        let required = shape.extents().axis(axis) + 2.0 * padding.axis(axis);
        if candidate.inner.axis(axis) + tol < required {
            return Err(format!("inner {axis} leaves less than the padding"));
        }
    }
    for element in elements.iter().filter(|e| e.is_mandatory()) {
        if candidate.labels.placement(&element.id).is_none() {
            return Err(format!("mandatory label '{}' is missing", element.id));
        }
    }
    if let Some((a, b)) = find_overlaps(&candidate.labels.placements).first() {
        return Err(format!(
            "labels '{}' and '{}' overlap",
            candidate.labels.placements[*a].element_id, candidate.labels.placements[*b].element_id
        ));
    }
    Ok(())
}

impl From<&DesignError> for DesignEvent {
    fn from(err: &DesignError) -> Self {
        DesignEvent::Failed {
            code: err.code().to_string(),
            message: err.to_string(),
            constraint: err.blocking_constraint().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::model::{FragilityClass, MaterialProfile, OptimizationWeights, TextKind};
    use crate::template::{PackagingTemplate, Topology};

    fn cube_mesh(side: f64) -> MeshInput {
        let mut vertices = Vec::new();
        for &x in &[0.0, side] {
            for &y in &[0.0, side] {
                for &z in &[0.0, side] {
                    vertices.push([x, y, z]);
                }
            }
        }
        MeshInput::point_cloud(vertices)
    }

    fn low_hints() -> ShapeHints {
        ShapeHints {
            fragility: Some(FragilityClass::Low),
            category: None,
        }
    }

    fn material(id: &str, cost: f64, thickness: (f64, f64)) -> MaterialProfile {
        MaterialProfile {
            id: id.to_string(),
            name: id.to_string(),
            strength_rating: 5,
            areal_density: 500.0,
            cost_per_m2: cost,
            sustainability_score: 0.5,
            recyclable: true,
            min_thickness: thickness.0,
            max_thickness: thickness.1,
        }
    }

    /// A thin cheap board and a thick expensive one, both in an RSC.
    fn thin_and_thick(config: EngineConfig) -> DesignEngine {
        let catalogs = Catalogs::new(
            Catalog::from_entries(vec![
                material("thin", 0.5, (1.0, 2.0)),
                material("thick", 3.0, (10.0, 12.0)),
            ])
            .unwrap(),
            Catalog::from_entries(vec![PackagingTemplate::new(
                "rsc",
                "RSC",
                Topology::RegularSlotted,
                5.0,
                0.1,
                1e7,
                1,
            )])
            .unwrap(),
        );
        DesignEngine::new(catalogs, config)
    }

    /// Needs a 107 mm square with margin: fits 120 mm sides, not 103 mm ones.
    fn wide_label_request() -> DesignRequest {
        let constraints = DesignConstraints::default()
            .with_padding(0.0)
            .with_weights(OptimizationWeights::new(0.0, 1.0, 0.0, 0.0))
            .with_text(
                TextElement::new("hazard", TextKind::MandatoryRegulatory, 105.0 * 105.0)
                    .with_aspect_ratio(1.0),
            );
        DesignRequest::new(cube_mesh(100.0))
            .with_hints(low_hints())
            .with_constraints(constraints)
    }

    #[test]
    fn builtin_catalogs_produce_a_valid_design() {
        let engine = DesignEngine::new(Catalogs::builtin().unwrap(), EngineConfig::default());
        let mut request = DesignRequest::new(cube_mesh(100.0));
        request.request_id = Some("sku-1".to_string());
        request.revision = 3;
        request.constraints = request
            .constraints
            .clone()
            .with_text(TextElement::new("brand", TextKind::Decorative, 1500.0));

        let outcome = engine.design(&request).unwrap();
        let candidate = &outcome.candidate;
        assert!(candidate.is_feasible());
        assert_eq!(candidate.request_id(), Some("sku-1"));
        assert_eq!(candidate.revision(), 3);
        let padding = request
            .constraints
            .effective_padding(outcome.shape.fragility());
        check_invariants(candidate, &outcome.shape, padding, &request.constraints.text_elements)
            .unwrap();
        assert!(candidate.labels().placement("brand").is_some());
    }

    #[test]
    fn regulatory_labels_are_added_for_target_regions() {
        let engine = DesignEngine::new(Catalogs::builtin().unwrap(), EngineConfig::default());
        let mut request = DesignRequest::new(cube_mesh(150.0)).with_hints(ShapeHints {
            fragility: None,
            category: Some("electronics".to_string()),
        });
        request.constraints.regulatory_regions = vec!["EU".to_string()];
        let outcome = engine.design(&request).unwrap();
        let labels = outcome.candidate.labels();
        for id in ["ce-mark", "weee-symbol", "green-dot", "iso-packaging-symbols"] {
            assert!(labels.placement(id).is_some(), "missing {id}");
        }
    }

    #[test]
    fn label_failure_falls_back_to_next_candidate() {
        let engine = thin_and_thick(EngineConfig::default());
        let mut events = Vec::new();
        let outcome = engine
            .design_with_progress(&wide_label_request(), |e| events.push(e.clone()))
            .unwrap();

        assert_eq!(outcome.candidate.material_id(), "thick");
        assert_eq!(outcome.label_attempts, 2);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].material_id(), "thin");
        assert!(matches!(
            outcome.rejected[0].feasibility(),
            Feasibility::Infeasible {
                blocked_by: Infeasibility::LabelPlacement { .. }
            }
        ));
        assert!(matches!(events.first(), Some(DesignEvent::SearchStarted { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, DesignEvent::CandidateRejected { rank: 0, .. })));
        assert!(matches!(
            events.last(),
            Some(DesignEvent::Finished {
                feasible: true,
                label_attempts: 2,
                ..
            })
        ));
    }

    #[test]
    fn exhausted_label_retries_name_the_label_constraint() {
        let config = EngineConfig::builder().max_label_retries(0).build();
        let engine = thin_and_thick(config);
        let mut events = Vec::new();
        let err = engine
            .design_with_progress(&wide_label_request(), |e| events.push(e.clone()))
            .unwrap_err();

        match &err {
            DesignError::NoFeasibleDesign(inner) => {
                assert_eq!(inner.blocking_constraint(), Some("label_placement"));
                assert_eq!(inner.attempts, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            events.last(),
            Some(DesignEvent::Failed { constraint: Some(c), .. }) if c == "label_placement"
        ));
    }

    #[test]
    fn invalid_geometry_is_reported() {
        let engine = DesignEngine::new(Catalogs::builtin().unwrap(), EngineConfig::default());
        let request = DesignRequest::new(MeshInput::point_cloud(vec![[0.0, 0.0, 0.0]]));
        let err = engine.design(&request).unwrap_err();
        assert_eq!(err.code(), "geometry_error");
    }

    #[test]
    fn invalid_constraints_are_rejected_before_analysis() {
        let engine = DesignEngine::new(Catalogs::builtin().unwrap(), EngineConfig::default());
        let mut request = DesignRequest::new(cube_mesh(50.0));
        request.constraints.padding = Vec3::new(-1.0, 0.0, 0.0);
        assert_eq!(engine.design(&request).unwrap_err().code(), "validation_error");
    }

    #[test]
    fn design_request_parses_with_defaults() {
        let raw = r#"{"mesh": {"vertices": [[0,0,0],[1,0,0],[0,1,0],[0,0,1]]}}"#;
        let request: DesignRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.revision, 0);
        assert!(request.request_id.is_none());
        assert_eq!(request.constraints, DesignConstraints::default());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = DesignEvent::Finished {
            feasible: true,
            attempts: 4,
            label_attempts: 1,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "finished");
        assert_eq!(value["attempts"], 4);
    }
}
