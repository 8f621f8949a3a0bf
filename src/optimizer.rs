//! Dimension optimization for one (template, material) pair.
//!
//! Given a product and a candidate template and material, computes the smallest
//! feasible cavity, the wall thickness and the resulting outer box:
//! - padding per side, scaled by fragility
//! - cavity rounded up to the template grid
//! - wall thickness from the material strength, clamped to the usable range
//! - topology variants tried in order until the panel-area limit is met

use std::cmp::Ordering;

use serde::Serialize;
use tracing::trace;
use utoipa::ToSchema;

use crate::error::Infeasibility;
use crate::model::{DesignConstraints, FragilityClass, MaterialProfile, ProductShape, TieBreak};
use crate::template::{PackagingTemplate, TemplateLayout};
use crate::types::{EPSILON_GENERAL, EPSILON_GRID, Vec3};

/// Wall thickness is rounded up to multiples of this (mm).
pub const THICKNESS_STEP: f64 = 0.5;
/// Strength rating the fragility base thickness is calibrated for.
const REFERENCE_STRENGTH: f64 = 5.0;

/// Tunables of the design engine.
///
/// Holds the tolerances and limits that are not part of a single request.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Clearance around every placed label and along panel edges (mm).
    pub label_margin: f64,
    /// Gap kept between support blocks and the cavity walls or product (mm).
    pub structural_clearance: f64,
    /// Smallest cradle footprint side (mm).
    pub min_cradle_side: f64,
    /// Footprint / anchoring panel ratio above which a support is flagged.
    pub support_footprint_ratio: f64,
    /// How many lower-ranked candidates are tried after the first label failure.
    pub max_label_retries: usize,
    /// Tie-break order used when a request does not carry its own.
    pub tie_break: Vec<TieBreak>,
    /// Evaluate combinations on the rayon pool.
    pub parallel_search: bool,
    /// Tolerance when snapping to the template grid.
    pub grid_tolerance: f64,
    /// Width of the score buckets; totals in the same bucket are ties.
    ///
    /// Bucketing keeps the ranking a total order, so two totals closer than
    /// this can still land in neighbouring buckets.
    pub score_epsilon: f64,
}

impl EngineConfig {
    pub const DEFAULT_LABEL_MARGIN: f64 = 2.0;
    pub const DEFAULT_STRUCTURAL_CLEARANCE: f64 = 3.0;
    pub const DEFAULT_MIN_CRADLE_SIDE: f64 = 20.0;
    pub const DEFAULT_SUPPORT_FOOTPRINT_RATIO: f64 = 0.3;
    pub const DEFAULT_MAX_LABEL_RETRIES: usize = 3;
    pub const DEFAULT_PARALLEL_SEARCH: bool = true;
    pub const DEFAULT_GRID_TOLERANCE: f64 = EPSILON_GRID;
    pub const DEFAULT_SCORE_EPSILON: f64 = 1e-9;

    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Tie-break order of a request, falling back to the configured one.
    pub fn tie_break_for<'a>(&'a self, constraints: &'a DesignConstraints) -> &'a [TieBreak] {
        constraints
            .tie_break
            .as_deref()
            .filter(|order| !order.is_empty())
            .unwrap_or(self.tie_break.as_slice())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            label_margin: Self::DEFAULT_LABEL_MARGIN,
            structural_clearance: Self::DEFAULT_STRUCTURAL_CLEARANCE,
            min_cradle_side: Self::DEFAULT_MIN_CRADLE_SIDE,
            support_footprint_ratio: Self::DEFAULT_SUPPORT_FOOTPRINT_RATIO,
            max_label_retries: Self::DEFAULT_MAX_LABEL_RETRIES,
            tie_break: TieBreak::DEFAULT_ORDER.to_vec(),
            parallel_search: Self::DEFAULT_PARALLEL_SEARCH,
            grid_tolerance: Self::DEFAULT_GRID_TOLERANCE,
            score_epsilon: Self::DEFAULT_SCORE_EPSILON,
        }
    }
}

/// Builder for `EngineConfig`.
#[derive(Clone, Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn label_margin(mut self, margin: f64) -> Self {
        self.config.label_margin = margin;
        self
    }

    pub fn structural_clearance(mut self, clearance: f64) -> Self {
        self.config.structural_clearance = clearance;
        self
    }

    pub fn min_cradle_side(mut self, side: f64) -> Self {
        self.config.min_cradle_side = side;
        self
    }

    pub fn support_footprint_ratio(mut self, ratio: f64) -> Self {
        self.config.support_footprint_ratio = ratio;
        self
    }

    pub fn max_label_retries(mut self, retries: usize) -> Self {
        self.config.max_label_retries = retries;
        self
    }

    pub fn tie_break(mut self, order: Vec<TieBreak>) -> Self {
        self.config.tie_break = order;
        self
    }

    pub fn parallel_search(mut self, parallel: bool) -> Self {
        self.config.parallel_search = parallel;
        self
    }

    pub fn grid_tolerance(mut self, tolerance: f64) -> Self {
        self.config.grid_tolerance = tolerance;
        self
    }

    pub fn score_epsilon(mut self, epsilon: f64) -> Self {
        self.config.score_epsilon = epsilon;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// Minimal feasible dimensions of one (template, material) pair.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct DimensionPlan {
    pub template_id: String,
    pub material_id: String,
    /// Padding per side actually applied (after fragility scaling).
    pub padding: Vec3,
    pub inner: Vec3,
    pub outer: Vec3,
    pub wall_thickness: f64,
    pub variant: u32,
    pub layout: TemplateLayout,
}

/// Wall thickness a material of the given strength needs for a fragility class.
///
/// Rounded up to `THICKNESS_STEP`; not yet clamped to a material range.
pub fn required_wall_thickness(fragility: FragilityClass, strength_rating: u8) -> f64 {
    let strength = f64::from(strength_rating.max(1));
    let raw = fragility.base_wall_thickness() * REFERENCE_STRENGTH / strength;
    round_up_to(raw, THICKNESS_STEP)
}

/// Rounds `value` up to a multiple of `step`, leaving exact multiples alone.
pub fn round_up_to(value: f64, step: f64) -> f64 {
    ((value - EPSILON_GRID) / step).ceil() * step
}

/// Computes the minimal feasible dimensions for one combination.
///
/// # Errors
/// The first hard constraint that blocks the combination, checked in pipeline
/// order: strength floor, thickness range, aspect ratio, panel area.
pub fn plan_dimensions(
    shape: &ProductShape,
    template: &PackagingTemplate,
    material: &MaterialProfile,
    constraints: &DesignConstraints,
    config: &EngineConfig,
) -> Result<DimensionPlan, Infeasibility> {
    let fragility = shape.fragility();

    let floor = constraints.strength_floor(fragility);
    if material.strength_rating < floor {
        return Err(Infeasibility::StrengthBelowFloor {
            required: floor,
            actual: material.strength_rating,
        });
    }

    let required = required_wall_thickness(fragility, material.strength_rating);
    let wall_thickness = required.max(material.min_thickness);
    if !material.allows_thickness(wall_thickness, EPSILON_GENERAL) {
        return Err(Infeasibility::ThicknessOutOfRange {
            required: wall_thickness,
            max: material.max_thickness,
        });
    }

    let padding = constraints.effective_padding(fragility);
    let inner = template.snap_inner(shape.extents() + padding * 2.0, config.grid_tolerance);

    let mut blocked = None;
    for variant in 0..template.max_variants {
        let layout = template.layout(inner, wall_thickness, variant);
        match template.check(&layout) {
            Ok(()) => {
                trace!(
                    template = %template.id,
                    material = %material.id,
                    variant,
                    wall_thickness,
                    "dimension plan found"
                );
                return Ok(DimensionPlan {
                    template_id: template.id.clone(),
                    material_id: material.id.clone(),
                    padding,
                    inner,
                    outer: layout.outer,
                    wall_thickness,
                    variant,
                    layout,
                });
            }
            Err(err @ Infeasibility::PanelAreaExceeded { .. }) => blocked = Some(err),
            Err(err) => return Err(err),
        }
    }

    Err(blocked.unwrap_or(Infeasibility::PanelAreaExceeded {
        panel_area: 0.0,
        max_panel_area: template.max_panel_area,
        variants_tried: 0,
    }))
}

/// Compares two values with a tolerance.
pub(crate) fn compare_with_epsilon(a: f64, b: f64, eps: f64) -> Ordering {
    if (a - b).abs() <= eps {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}
