//! Parametric box templates.
//!
//! A template maps (inner dimensions, wall thickness, variant) to an outer box,
//! its panels and the flat blank it is cut from. Layouts are pure functions of
//! their inputs.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::error::Infeasibility;
use crate::model::{Panel, PanelRole, ValidationError};
use crate::types::{EPSILON_GENERAL, Vec3, validation};

/// Box topology class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Die-cut roll-end mailer with a tuck-in front.
    RectangularMailer,
    /// Regular slotted container, flaps meet in the middle of top and bottom.
    RegularSlotted,
    /// Tray with a separate lid sliding over it.
    TelescopingTwoPiece,
    /// Slotted container with a die-cut cradle insert.
    CushionedInsert,
}

impl Topology {
    pub fn code(&self) -> &'static str {
        match self {
            Topology::RectangularMailer => "rectangular_mailer",
            Topology::RegularSlotted => "regular_slotted",
            Topology::TelescopingTwoPiece => "telescoping_two_piece",
            Topology::CushionedInsert => "cushioned_insert",
        }
    }
}

fn default_seam_allowance() -> f64 {
    PackagingTemplate::DEFAULT_SEAM_ALLOWANCE
}

/// One entry of the template library.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": "rsc",
        "name": "Regular slotted container",
        "topology": "regular_slotted",
        "granularity": 5.0,
        "min_aspect_ratio": 0.1,
        "max_panel_area": 1000000.0,
        "max_variants": 3
    })
)]
pub struct PackagingTemplate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub topology: Topology,
    /// Inner dimensions are rounded up to multiples of this (mm).
    pub granularity: f64,
    /// Minimum shortest / longest outer side.
    pub min_aspect_ratio: f64,
    /// Largest single panel the converting line can produce (mm²).
    pub max_panel_area: f64,
    /// Number of topology variants, variant 0 being the unsplit layout.
    pub max_variants: u32,
    /// Extra length each split strip needs for its glue seam (mm).
    #[serde(default = "default_seam_allowance")]
    pub seam_allowance: f64,
}

/// Result of a template layout.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct TemplateLayout {
    pub variant: u32,
    pub outer: Vec3,
    pub panels: Vec<Panel>,
    /// Flat material area of the whole blank (mm²).
    pub blank_area: f64,
}

impl TemplateLayout {
    /// Panels eligible for printing, in layout order.
    pub fn printable_panels(&self) -> impl Iterator<Item = &Panel> {
        self.panels.iter().filter(|p| p.is_printable())
    }

    pub fn panel(&self, id: &str) -> Option<&Panel> {
        self.panels.iter().find(|p| p.id == id)
    }

    /// Largest panel area of the layout.
    pub fn largest_panel_area(&self) -> f64 {
        self.panels.iter().map(Panel::area).fold(0.0, f64::max)
    }

    /// Shortest / longest outer side.
    pub fn aspect_ratio(&self) -> f64 {
        self.outer.min_component() / self.outer.max_component()
    }
}

impl PackagingTemplate {
    pub const DEFAULT_SEAM_ALLOWANCE: f64 = 15.0;

    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        topology: Topology,
        granularity: f64,
        min_aspect_ratio: f64,
        max_panel_area: f64,
        max_variants: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            topology,
            granularity,
            min_aspect_ratio,
            max_panel_area,
            max_variants,
            seam_allowance: Self::DEFAULT_SEAM_ALLOWANCE,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid =
            |msg: String| ValidationError::InvalidConfiguration(format!("{}: {}", self.id, msg));
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidConfiguration(
                "template id must not be empty".to_string(),
            ));
        }
        validation::validate_dimension(self.granularity, "Granularity").map_err(invalid)?;
        validation::validate_range(self.min_aspect_ratio, 0.0, 1.0, "Minimum aspect ratio")
            .map_err(invalid)?;
        validation::validate_dimension(self.max_panel_area, "Maximum panel area")
            .map_err(invalid)?;
        validation::validate_non_negative(self.seam_allowance, "Seam allowance")
            .map_err(invalid)?;
        if self.max_variants == 0 {
            return Err(invalid("at least one variant is required".to_string()));
        }
        Ok(())
    }

    /// Rounds inner dimensions up to the template granularity.
    ///
    /// Values already on the grid (within `tolerance`) stay unchanged; anything
    /// further above a grid line moves to the next one.
    pub fn snap_inner(&self, required: Vec3, tolerance: f64) -> Vec3 {
        let snap = |v: f64| (((v - tolerance) / self.granularity).ceil() * self.granularity).max(self.granularity);
        Vec3::new(snap(required.x), snap(required.y), snap(required.z))
    }

    /// Lays out the box for the given cavity, wall and variant.
    pub fn layout(&self, inner: Vec3, wall: f64, variant: u32) -> TemplateLayout {
        let outer = inner + Vec3::splat(2.0 * wall);
        let (l, w, h) = (outer.x, outer.y, outer.z);
        let seam = self.seam_allowance;

        let mut faces = vec![
            Panel::new("front", PanelRole::Front, l, h),
            Panel::new("back", PanelRole::Back, l, h),
            Panel::new("left", PanelRole::Left, w, h),
            Panel::new("right", PanelRole::Right, w, h),
            Panel::new("top", PanelRole::Top, l, w),
            Panel::new("bottom", PanelRole::Bottom, l, w),
        ];

        let mut blank_area = match self.topology {
            Topology::RectangularMailer => (l + 4.0 * h) * (2.0 * w + 2.5 * h),
            Topology::RegularSlotted | Topology::CushionedInsert => {
                (2.0 * (l + w) + seam) * (h + w)
            }
            Topology::TelescopingTwoPiece => {
                let lid_depth = h / 2.0;
                (l + 2.0 * h) * (w + 2.0 * h) + (l + 2.0 * lid_depth) * (w + 2.0 * lid_depth)
            }
        };

        if matches!(
            self.topology,
            Topology::RegularSlotted | Topology::CushionedInsert
        ) {
            // Top and bottom are closed by flaps meeting along a seam.
            for face in faces.iter_mut() {
                if matches!(face.role, PanelRole::Top | PanelRole::Bottom) {
                    face.flat = false;
                }
            }
        }

        if self.topology == Topology::CushionedInsert {
            let insert = Panel::new("insert", PanelRole::Insert, inner.x, inner.y);
            blank_area += 2.0 * insert.area();
            faces.push(insert);
        }

        // Variants split every oversized sheet, the insert included.
        let mut panels = Vec::with_capacity(faces.len());
        for face in faces {
            if variant == 0 || face.area() <= self.max_panel_area + EPSILON_GENERAL {
                panels.push(face);
                continue;
            }
            let strips = variant + 1;
            let (long, short) = if face.width >= face.height {
                (face.width, face.height)
            } else {
                (face.height, face.width)
            };
            let strip_long = long / f64::from(strips) + seam;
            blank_area += f64::from(variant) * seam * short;
            for i in 0..strips {
                let (width, height) = if face.width >= face.height {
                    (strip_long, short)
                } else {
                    (short, strip_long)
                };
                let mut strip = Panel::new(format!("{}-{}", face.id, i + 1), face.role, width, height);
                strip.flat = face.flat;
                panels.push(strip);
            }
        }

        TemplateLayout {
            variant,
            outer,
            panels,
            blank_area,
        }
    }

    /// Feasibility predicate for one layout.
    ///
    /// Aspect ratio is checked first since no variant can change it.
    pub fn check(&self, layout: &TemplateLayout) -> Result<(), Infeasibility> {
        let ratio = layout.aspect_ratio();
        if ratio + EPSILON_GENERAL < self.min_aspect_ratio {
            return Err(Infeasibility::AspectRatio {
                ratio,
                min: self.min_aspect_ratio,
            });
        }
        let largest = layout.largest_panel_area();
        if largest > self.max_panel_area + EPSILON_GENERAL {
            return Err(Infeasibility::PanelAreaExceeded {
                panel_area: largest,
                max_panel_area: self.max_panel_area,
                variants_tried: layout.variant + 1,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EPSILON_GRID;

    fn rsc() -> PackagingTemplate {
        PackagingTemplate::new("rsc", "RSC", Topology::RegularSlotted, 5.0, 0.1, 50_000.0, 3)
    }

    #[test]
    fn snapping_keeps_exact_multiples() {
        let tpl = rsc();
        let snapped = tpl.snap_inner(Vec3::new(110.0, 111.0, 109.99995), EPSILON_GRID);
        assert_eq!(snapped, Vec3::new(110.0, 115.0, 110.0));
        let noisy = tpl.snap_inner(Vec3::new(110.000_000_000_1, 5.0, 0.5), EPSILON_GRID);
        assert_eq!(noisy, Vec3::new(110.0, 5.0, 5.0));
    }

    #[test]
    fn snapping_never_drops_below_requirement() {
        let tpl = rsc();
        let required = Vec3::new(110.00005, 100.0001, 104.9999);
        let snapped = tpl.snap_inner(required, EPSILON_GRID);
        assert_eq!(snapped, Vec3::new(115.0, 105.0, 105.0));
    }

    #[test]
    fn outer_is_inner_plus_two_walls() {
        let tpl = rsc();
        let layout = tpl.layout(Vec3::new(110.0, 110.0, 110.0), 3.0, 0);
        assert_eq!(layout.outer, Vec3::splat(116.0));
        assert_eq!(layout.panels.len(), 6);
        assert!(layout.blank_area > 0.0);
    }

    #[test]
    fn slotted_tops_are_not_printable() {
        let layout = rsc().layout(Vec3::splat(100.0), 2.0, 0);
        let printable: Vec<_> = layout.printable_panels().map(|p| p.id.as_str()).collect();
        assert_eq!(printable, vec!["front", "back", "left", "right"]);

        let mut mailer = rsc();
        mailer.topology = Topology::RectangularMailer;
        assert_eq!(mailer.layout(Vec3::splat(100.0), 2.0, 0).printable_panels().count(), 6);
    }

    #[test]
    fn variants_split_oversized_panels() {
        let tpl = rsc();
        let inner = Vec3::new(300.0, 100.0, 200.0);
        let base = tpl.layout(inner, 2.0, 0);
        assert!(matches!(
            tpl.check(&base),
            Err(Infeasibility::PanelAreaExceeded { variants_tried: 1, .. })
        ));

        let split = tpl.layout(inner, 2.0, 1);
        assert!(split.panel("front-1").is_some());
        assert!(split.panel("front-2").is_some());
        assert!(split.panel("front").is_none());
        assert!(split.panel("left").is_some());
        assert!(split.largest_panel_area() < base.largest_panel_area());
        assert!(split.blank_area > base.blank_area);
        assert!(tpl.check(&split).is_ok());
    }

    #[test]
    fn flat_boxes_fail_aspect_ratio() {
        let tpl = rsc();
        let layout = tpl.layout(Vec3::new(500.0, 100.0, 20.0), 2.0, 0);
        let err = tpl.check(&layout).unwrap_err();
        assert_eq!(err.code(), "aspect_ratio");
    }

    #[test]
    fn cushioned_insert_adds_inner_panel() {
        let mut tpl = rsc();
        tpl.topology = Topology::CushionedInsert;
        let layout = tpl.layout(Vec3::splat(100.0), 2.0, 0);
        let insert = layout.panel("insert").unwrap();
        assert!(!insert.is_printable());
        assert_eq!(layout.panels.len(), 7);
    }

    #[test]
    fn variants_split_an_oversized_insert() {
        let mut tpl = rsc();
        tpl.topology = Topology::CushionedInsert;
        tpl.max_panel_area = 600_000.0;
        let inner = Vec3::new(800.0, 800.0, 300.0);

        let base = tpl.layout(inner, 1.5, 0);
        assert_eq!(base.panel("insert").unwrap().area(), 640_000.0);
        assert!(tpl.check(&base).is_err());

        let split = tpl.layout(inner, 1.5, 1);
        assert!(split.panel("insert").is_none());
        let insert = split.panel("insert-1").unwrap();
        assert_eq!(insert.role, PanelRole::Insert);
        assert!(!insert.is_printable());
        assert!(split.panel("insert-2").is_some());
        assert!(tpl.check(&split).is_ok());
    }

    #[test]
    fn rejects_invalid_templates() {
        let mut tpl = rsc();
        tpl.max_variants = 0;
        assert!(tpl.validate().is_err());
        let mut tpl = rsc();
        tpl.min_aspect_ratio = 1.5;
        assert!(tpl.validate().is_err());
        assert!(rsc().validate().is_ok());
    }
}
