//! Internal support structure.
//!
//! The product sits centred in the cavity. Cradles hold it up from below at the
//! base contacts, braces stop it moving towards walls that are far away. All
//! coordinates are in the cavity frame: origin at the inner minimum corner,
//! axes along the product's principal axes.

use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::error::SupportFeasibilityWarning;
use crate::geometry::point_inside;
use crate::model::{ContactKind, ContactPoint, PanelRole, ProductShape};
use crate::optimizer::{DimensionPlan, EngineConfig};
use crate::types::{BoundingBox, EPSILON_GENERAL, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SupportKind {
    Cradle,
    EdgeBrace,
    CornerBrace,
}

/// One solid support block.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct SupportPrimitive {
    pub id: String,
    pub kind: SupportKind,
    /// Contact point this block holds.
    pub contact: String,
    pub bounds: BoundingBox,
    /// Panel the block rests against.
    pub anchor_panel: String,
}

impl SupportPrimitive {
    /// Area the block covers on its anchoring wall.
    pub fn footprint_area(&self, axis: usize) -> f64 {
        let dims = self.bounds.dimensions();
        (0..3).filter(|&i| i != axis).map(|i| dims.axis(i)).product()
    }
}

/// Generated supports plus non-fatal warnings about them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct SupportStructure {
    pub primitives: Vec<SupportPrimitive>,
    pub warnings: Vec<SupportFeasibilityWarning>,
}

impl SupportStructure {
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn count(&self, kind: SupportKind) -> usize {
        self.primitives.iter().filter(|p| p.kind == kind).count()
    }
}

fn wall_role(axis: usize, positive: bool) -> PanelRole {
    match (axis, positive) {
        (0, false) => PanelRole::Left,
        (0, true) => PanelRole::Right,
        (1, false) => PanelRole::Front,
        (1, true) => PanelRole::Back,
        (_, false) => PanelRole::Bottom,
        (_, true) => PanelRole::Top,
    }
}

/// Generates cradles and braces for a planned box.
pub fn generate_supports(
    shape: &ProductShape,
    plan: &DimensionPlan,
    config: &EngineConfig,
) -> SupportStructure {
    let inner = plan.inner;
    let clearance = config.structural_clearance;
    let fragility = shape.fragility();
    let offset = (inner - shape.extents()) * 0.5;
    let cavity = BoundingBox::new(Vec3::splat(clearance), inner - Vec3::splat(clearance));

    let mut generator = Generator {
        plan,
        config,
        cavity,
        structure: SupportStructure::default(),
    };

    for contact in shape.contacts_of(ContactKind::Base) {
        let at = offset + contact.position;
        let gap = at.z;
        if gap <= clearance + EPSILON_GENERAL {
            continue;
        }
        let side = config.min_cradle_side.max(2.0 * gap);
        let bounds = BoundingBox::new(
            Vec3::new(at.x - side / 2.0, at.y - side / 2.0, clearance),
            Vec3::new(at.x + side / 2.0, at.y + side / 2.0, gap),
        );
        generator.push(SupportKind::Cradle, contact, bounds, 2, false);
    }

    let threshold = fragility.brace_threshold();
    let section = fragility.brace_section();
    for contact in shape
        .contact_points()
        .iter()
        .filter(|c| c.kind != ContactKind::Base)
    {
        let at = offset + contact.position;
        let axis = contact.load_axis();
        let positive = contact.loads_positive();
        // Downward loads resting on a cradle are already carried.
        if axis == 2
            && !positive
            && generator
                .structure
                .primitives
                .iter()
                .any(|p| p.kind == SupportKind::Cradle && point_inside(at, &p.bounds))
        {
            continue;
        }

        let gap = if positive {
            inner.axis(axis) - at.axis(axis)
        } else {
            at.axis(axis)
        };
        if gap <= threshold + EPSILON_GENERAL {
            continue;
        }

        let (lo, hi) = if positive {
            (at.axis(axis), inner.axis(axis) - clearance)
        } else {
            (clearance, at.axis(axis))
        };
        let half = Vec3::splat(section / 2.0);
        let mut bounds = BoundingBox::new(at - half, at + half);
        bounds.min = bounds.min.with_axis(axis, lo);
        bounds.max = bounds.max.with_axis(axis, hi);
        let kind = if contact.kind == ContactKind::Corner {
            SupportKind::CornerBrace
        } else {
            SupportKind::EdgeBrace
        };
        generator.push(kind, contact, bounds, axis, positive);
    }

    debug!(
        template = %plan.template_id,
        primitives = generator.structure.primitives.len(),
        warnings = generator.structure.warnings.len(),
        "supports generated"
    );
    generator.structure
}

struct Generator<'a> {
    plan: &'a DimensionPlan,
    config: &'a EngineConfig,
    cavity: BoundingBox,
    structure: SupportStructure,
}

impl Generator<'_> {
    fn push(
        &mut self,
        kind: SupportKind,
        contact: &ContactPoint,
        bounds: BoundingBox,
        anchor_axis: usize,
        positive: bool,
    ) {
        let bounds = bounds.clamped_to(&self.cavity);
        let dims = bounds.dimensions();
        if dims.x <= EPSILON_GENERAL || dims.y <= EPSILON_GENERAL || dims.z <= EPSILON_GENERAL {
            return;
        }

        let role = wall_role(anchor_axis, positive);
        let anchor_panel = self
            .plan
            .layout
            .panels
            .iter()
            .find(|p| p.role == role)
            .map(|p| p.id.clone())
            .unwrap_or_else(|| format!("{:?}", role).to_lowercase());
        let primitive = SupportPrimitive {
            id: format!("support-{}", self.structure.primitives.len() + 1),
            kind,
            contact: contact.name.clone(),
            bounds,
            anchor_panel,
        };

        let face_area: f64 = (0..3)
            .filter(|&i| i != anchor_axis)
            .map(|i| self.plan.inner.axis(i))
            .product();
        let footprint_area = primitive.footprint_area(anchor_axis);
        let ratio = footprint_area / face_area;
        if ratio > self.config.support_footprint_ratio {
            let warning = SupportFeasibilityWarning {
                support_id: primitive.id.clone(),
                panel_id: primitive.anchor_panel.clone(),
                footprint_area,
                panel_area: face_area,
                ratio,
            };
            warn!(%warning, "oversized support");
            self.structure.warnings.push(warning);
        }
        self.structure.primitives.push(primitive);
    }
}
