//! Error taxonomy of the design engine.
//!
//! Every failure carries the constraint or catalog gap that caused it so the
//! caller can explain the outcome instead of reporting a generic failure.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::ValidationError;

/// Result type alias for engine operations.
pub type DesignResult<T> = Result<T, DesignError>;

/// Unusable input geometry. Never retried internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("mesh has {found} vertices, at least {required} are required")]
    TooFewVertices { found: usize, required: usize },

    #[error("vertex {index} has a non-finite coordinate")]
    NonFiniteVertex { index: usize },

    #[error("triangle {index} references vertex {vertex}, which does not exist")]
    InvalidTriangle { index: usize, vertex: usize },

    #[error("degenerate extent {length:.3} x {width:.3} x {height:.3} mm; supply cleaner geometry")]
    DegenerateExtent {
        length: f64,
        width: f64,
        height: f64,
    },
}

/// Failures while loading, validating or querying the reference catalogs.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} catalog is empty")]
    Empty { kind: &'static str },

    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    #[error("invalid {kind} '{id}': {reason}")]
    Invalid {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("unknown {kind} id '{id}'")]
    UnknownId { kind: &'static str, id: String },
}

/// A mandatory text element could not be placed on any panel.
#[derive(Debug, Clone, PartialEq, Error, Serialize, ToSchema)]
#[error(
    "mandatory label '{element_id}' needs {required_area:.0} mm² but the largest free area left is {largest_free_area:.0} mm² on {panel_count} panels"
)]
pub struct LabelPlacementError {
    pub element_id: String,
    pub required_area: f64,
    pub largest_free_area: f64,
    pub panel_count: usize,
}

/// Non-fatal signal that a support primitive is suspiciously large.
///
/// Usually means the chosen box is poorly fitted to the product.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SupportFeasibilityWarning {
    pub support_id: String,
    pub panel_id: String,
    pub footprint_area: f64,
    pub panel_area: f64,
    pub ratio: f64,
}

impl fmt::Display for SupportFeasibilityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "support '{}' covers {:.0}% of panel '{}' ({:.0} of {:.0} mm²)",
            self.support_id,
            self.ratio * 100.0,
            self.panel_id,
            self.footprint_area,
            self.panel_area
        )
    }
}

/// The hard constraint that blocked one (template, material) combination.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "constraint", rename_all = "snake_case")]
pub enum Infeasibility {
    /// Material is weaker than the strength floor.
    StrengthBelowFloor { required: u8, actual: u8 },
    /// Required wall is thicker than the material allows.
    ThicknessOutOfRange { required: f64, max: f64 },
    /// Shortest / longest outer side is below the template minimum.
    AspectRatio { ratio: f64, min: f64 },
    /// A panel stays larger than the manufacturing limit after all variants.
    PanelAreaExceeded {
        panel_area: f64,
        max_panel_area: f64,
        variants_tried: u32,
    },
    /// A mandatory label did not fit on the finished box.
    LabelPlacement { error: LabelPlacementError },
}

impl Infeasibility {
    pub fn code(&self) -> &'static str {
        match self {
            Infeasibility::StrengthBelowFloor { .. } => "strength_floor",
            Infeasibility::ThicknessOutOfRange { .. } => "thickness_range",
            Infeasibility::AspectRatio { .. } => "aspect_ratio",
            Infeasibility::PanelAreaExceeded { .. } => "panel_area",
            Infeasibility::LabelPlacement { .. } => "label_placement",
        }
    }

    /// How far through the pipeline the attempt got before it was blocked.
    pub fn stage(&self) -> u8 {
        match self {
            Infeasibility::StrengthBelowFloor { .. } => 0,
            Infeasibility::ThicknessOutOfRange { .. } => 1,
            Infeasibility::AspectRatio { .. } => 2,
            Infeasibility::PanelAreaExceeded { .. } => 3,
            Infeasibility::LabelPlacement { .. } => 4,
        }
    }

    /// Relative amount by which the constraint was missed (0 = just missed).
    pub fn overshoot(&self) -> f64 {
        match self {
            Infeasibility::StrengthBelowFloor { required, actual } => {
                f64::from(required.saturating_sub(*actual)) / f64::from((*required).max(1))
            }
            Infeasibility::ThicknessOutOfRange { required, max } => {
                (required - max).max(0.0) / max.max(f64::EPSILON)
            }
            Infeasibility::AspectRatio { ratio, min } => {
                (min - ratio).max(0.0) / min.max(f64::EPSILON)
            }
            Infeasibility::PanelAreaExceeded {
                panel_area,
                max_panel_area,
                ..
            } => (panel_area - max_panel_area).max(0.0) / max_panel_area.max(f64::EPSILON),
            Infeasibility::LabelPlacement { error: err } => {
                (err.required_area - err.largest_free_area).max(0.0)
                    / err.required_area.max(f64::EPSILON)
            }
        }
    }
}

impl fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Infeasibility::StrengthBelowFloor { required, actual } => write!(
                f,
                "material strength {} is below the strength floor {}",
                actual, required
            ),
            Infeasibility::ThicknessOutOfRange { required, max } => write!(
                f,
                "required wall thickness {:.1} mm exceeds the material maximum {:.1} mm",
                required, max
            ),
            Infeasibility::AspectRatio { ratio, min } => write!(
                f,
                "aspect ratio {:.3} is below the template minimum {:.3}",
                ratio, min
            ),
            Infeasibility::PanelAreaExceeded {
                panel_area,
                max_panel_area,
                variants_tried,
            } => write!(
                f,
                "panel area {:.0} mm² exceeds the maximum panel area {:.0} mm² after {} variants",
                panel_area, max_panel_area, variants_tried
            ),
            Infeasibility::LabelPlacement { error } => write!(f, "{}", error),
        }
    }
}

/// One (template, material) combination that was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BlockedAttempt {
    pub template_id: String,
    pub material_id: String,
    pub blocked_by: Infeasibility,
}

impl BlockedAttempt {
    pub fn new(
        template_id: impl Into<String>,
        material_id: impl Into<String>,
        blocked_by: Infeasibility,
    ) -> Self {
        Self {
            template_id: template_id.into(),
            material_id: material_id.into(),
            blocked_by,
        }
    }
}

/// The whole template × material search produced no usable design.
#[derive(Debug, Clone, PartialEq, Error, Serialize, ToSchema)]
pub struct NoFeasibleDesignError {
    /// Number of combinations that were evaluated.
    pub attempts: usize,
    /// The attempt that got furthest before a constraint blocked it.
    pub best_attempt: Option<BlockedAttempt>,
    /// How often each constraint code blocked an attempt.
    pub blocked_counts: BTreeMap<String, usize>,
}

impl NoFeasibleDesignError {
    /// Builds the error from every rejected attempt, picking the best partial one.
    pub fn from_attempts(attempts: usize, blocked: &[BlockedAttempt]) -> Self {
        let mut blocked_counts = BTreeMap::new();
        for attempt in blocked {
            *blocked_counts
                .entry(attempt.blocked_by.code().to_string())
                .or_insert(0) += 1;
        }

        let best_attempt = blocked
            .iter()
            .min_by(|a, b| {
                b.blocked_by
                    .stage()
                    .cmp(&a.blocked_by.stage())
                    .then_with(|| {
                        a.blocked_by
                            .overshoot()
                            .total_cmp(&b.blocked_by.overshoot())
                    })
                    .then_with(|| a.template_id.cmp(&b.template_id))
                    .then_with(|| a.material_id.cmp(&b.material_id))
            })
            .cloned();

        Self {
            attempts,
            best_attempt,
            blocked_counts,
        }
    }

    /// Code of the constraint that blocked the best attempt.
    pub fn blocking_constraint(&self) -> Option<&'static str> {
        self.best_attempt.as_ref().map(|a| a.blocked_by.code())
    }
}

impl fmt::Display for NoFeasibleDesignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.best_attempt {
            Some(best) => write!(
                f,
                "no feasible design among {} combinations; best attempt template '{}' with material '{}' was blocked by {}: {}",
                self.attempts,
                best.template_id,
                best.material_id,
                best.blocked_by.code(),
                best.blocked_by
            ),
            None => write!(
                f,
                "no feasible design: {} template/material combinations to evaluate",
                self.attempts
            ),
        }
    }
}

/// Top-level error returned by the engine.
#[derive(Debug, Error)]
pub enum DesignError {
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("invalid constraints: {0}")]
    Validation(#[from] ValidationError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("{0}")]
    NoFeasibleDesign(#[from] NoFeasibleDesignError),
}

impl DesignError {
    pub fn code(&self) -> &'static str {
        match self {
            DesignError::Geometry(_) => "geometry_error",
            DesignError::Validation(_) => "validation_error",
            DesignError::Catalog(_) => "catalog_error",
            DesignError::NoFeasibleDesign(_) => "no_feasible_design",
        }
    }

    /// Constraint code that blocked the request, if it failed on one.
    pub fn blocking_constraint(&self) -> Option<&'static str> {
        match self {
            DesignError::NoFeasibleDesign(err) => err.blocking_constraint(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel_block(area: f64) -> Infeasibility {
        Infeasibility::PanelAreaExceeded {
            panel_area: area,
            max_panel_area: 100_000.0,
            variants_tried: 2,
        }
    }

    #[test]
    fn best_attempt_prefers_furthest_stage() {
        let blocked = vec![
            BlockedAttempt::new(
                "mailer",
                "kraft",
                Infeasibility::StrengthBelowFloor {
                    required: 6,
                    actual: 5,
                },
            ),
            BlockedAttempt::new("mailer", "double-wall", panel_block(180_000.0)),
        ];

        let err = NoFeasibleDesignError::from_attempts(2, &blocked);
        let best = err.best_attempt.as_ref().unwrap();
        assert_eq!(best.material_id, "double-wall");
        assert_eq!(err.blocking_constraint(), Some("panel_area"));
        assert_eq!(err.blocked_counts.get("strength_floor"), Some(&1));
        assert_eq!(err.blocked_counts.get("panel_area"), Some(&1));
    }

    #[test]
    fn best_attempt_prefers_smallest_overshoot_within_stage() {
        let blocked = vec![
            BlockedAttempt::new("a", "m1", panel_block(300_000.0)),
            BlockedAttempt::new("b", "m1", panel_block(120_000.0)),
        ];

        let err = NoFeasibleDesignError::from_attempts(2, &blocked);
        assert_eq!(err.best_attempt.unwrap().template_id, "b");
    }

    #[test]
    fn message_names_the_blocking_constraint() {
        let blocked = vec![BlockedAttempt::new("mailer", "kraft", panel_block(150_000.0))];
        let err = NoFeasibleDesignError::from_attempts(1, &blocked);
        let text = err.to_string();
        assert!(text.contains("panel_area"));
        assert!(text.contains("maximum panel area"));
        assert!(text.contains("mailer"));
    }

    #[test]
    fn empty_search_still_explains() {
        let err = NoFeasibleDesignError::from_attempts(0, &[]);
        assert!(err.best_attempt.is_none());
        assert!(err.to_string().contains("0 template/material combinations"));
    }
}
