//! Data model of the packaging design engine.
//!
//! This module defines the input records of an optimization run:
//! - `ProductShape`: immutable geometric summary of the product
//! - `MaterialProfile`: one entry of the material catalog
//! - `Panel`: one flat face of an assembled box
//! - `TextElement`: a piece of label text that has to go onto the box
//! - `DesignConstraints`: everything the caller decides about a request
//!
//! All lengths are millimetres, areas are mm² unless a field says otherwise.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{Rect, Vec3, validation};

/// Validation error for caller-supplied or catalog data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),
    #[error("Invalid text element: {0}")]
    InvalidTextElement(String),
    #[error("Invalid material: {0}")]
    InvalidMaterial(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Ordinal fragility category driving padding and protection requirements.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum FragilityClass {
    Low,
    Medium,
    High,
}

impl Default for FragilityClass {
    fn default() -> Self {
        FragilityClass::Medium
    }
}

impl FragilityClass {
    pub fn code(&self) -> &'static str {
        match self {
            FragilityClass::Low => "low",
            FragilityClass::Medium => "medium",
            FragilityClass::High => "high",
        }
    }

    /// Multiplier applied to the caller's padding.
    pub fn padding_scale(&self) -> f64 {
        match self {
            FragilityClass::Low => 1.0,
            FragilityClass::Medium => 1.1,
            FragilityClass::High => 1.2,
        }
    }

    /// Minimum material strength rating when the caller sets no floor.
    pub fn strength_floor(&self) -> u8 {
        match self {
            FragilityClass::Low => 2,
            FragilityClass::Medium => 4,
            FragilityClass::High => 6,
        }
    }

    /// Wall thickness (mm) a material of strength 5 needs for this class.
    pub fn base_wall_thickness(&self) -> f64 {
        match self {
            FragilityClass::Low => 1.5,
            FragilityClass::Medium => 2.5,
            FragilityClass::High => 4.0,
        }
    }

    /// Wall thickness (mm) at which the thickness half of protection saturates.
    pub fn reference_wall_thickness(&self) -> f64 {
        match self {
            FragilityClass::Low => 2.0,
            FragilityClass::Medium => 3.0,
            FragilityClass::High => 5.0,
        }
    }

    /// Clearance (mm) above which an extreme point needs a brace.
    pub fn brace_threshold(&self) -> f64 {
        match self {
            FragilityClass::Low => 15.0,
            FragilityClass::Medium => 10.0,
            FragilityClass::High => 5.0,
        }
    }

    /// Side length (mm) of a brace cross-section.
    pub fn brace_section(&self) -> f64 {
        match self {
            FragilityClass::Low => 10.0,
            FragilityClass::Medium => 15.0,
            FragilityClass::High => 20.0,
        }
    }

    /// Default class for a product category label.
    pub fn from_category(category: &str) -> Self {
        match category.trim().to_ascii_lowercase().as_str() {
            "glass" | "glassware" | "ceramics" | "electronics" | "optics" => FragilityClass::High,
            "cosmetics" | "food" | "toys" => FragilityClass::Medium,
            _ => FragilityClass::Medium,
        }
    }
}

/// What a contact point is used for by the support generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    /// Part of the lowest-lying cluster along the gravity axis.
    Base,
    /// Extreme point along one principal axis.
    Edge,
    /// Extreme point that also sits near two other box faces.
    Corner,
}

/// A named point on the product that carries load.
///
/// `position` is expressed in the product's local box frame: origin at the
/// minimum corner of the oriented bounding box, axes along its principal axes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContactPoint {
    pub name: String,
    pub kind: ContactKind,
    pub position: Vec3,
    /// Unit vector along a local axis pointing away from the product.
    pub load_direction: Vec3,
}

impl ContactPoint {
    /// Index of the local axis the load acts along.
    pub fn load_axis(&self) -> usize {
        let d = self.load_direction;
        if d.x.abs() >= d.y.abs() && d.x.abs() >= d.z.abs() {
            0
        } else if d.y.abs() >= d.z.abs() {
            1
        } else {
            2
        }
    }

    /// `true` when the load points towards the positive end of its axis.
    pub fn loads_positive(&self) -> bool {
        self.load_direction.axis(self.load_axis()) > 0.0
    }
}

/// Immutable summary of a product, produced once by the shape analyzer.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ProductShape {
    center: Vec3,
    extents: Vec3,
    #[schema(value_type = Vec<Vec<f64>>)]
    rotation: [[f64; 3]; 3],
    volume: f64,
    surface_area: f64,
    fragility: FragilityClass,
    category: Option<String>,
    contact_points: Vec<ContactPoint>,
}

impl ProductShape {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        center: Vec3,
        extents: Vec3,
        rotation: [[f64; 3]; 3],
        volume: f64,
        surface_area: f64,
        fragility: FragilityClass,
        category: Option<String>,
        contact_points: Vec<ContactPoint>,
    ) -> Self {
        Self {
            center,
            extents,
            rotation,
            volume,
            surface_area,
            fragility,
            category,
            contact_points,
        }
    }

    /// World-space center of the oriented bounding box.
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Extents along the principal axes: length >= width, height on the gravity axis.
    pub fn extents(&self) -> Vec3 {
        self.extents
    }

    /// Columns are the local x/y/z axes expressed in world coordinates.
    pub fn rotation(&self) -> [[f64; 3]; 3] {
        self.rotation
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn surface_area(&self) -> f64 {
        self.surface_area
    }

    pub fn fragility(&self) -> FragilityClass {
        self.fragility
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn contact_points(&self) -> &[ContactPoint] {
        &self.contact_points
    }

    /// Contact points of the given kind, in analyzer order.
    pub fn contacts_of(&self, kind: ContactKind) -> impl Iterator<Item = &ContactPoint> {
        self.contact_points.iter().filter(move |c| c.kind == kind)
    }
}

/// One entry of the material catalog.
///
/// # Fields
/// * `strength_rating` - Ordinal 1 (weak) to 10 (strong)
/// * `areal_density` - g/m² at minimum thickness
/// * `cost_per_m2` - Price per square metre of blank
/// * `sustainability_score` - 0.0 (worst) to 1.0 (best)
/// * `min_thickness` / `max_thickness` - Usable wall thickness range in mm
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": "corrugated-single",
        "name": "Single-wall corrugated",
        "strength_rating": 5,
        "areal_density": 540.0,
        "cost_per_m2": 0.9,
        "sustainability_score": 0.8,
        "recyclable": true,
        "min_thickness": 3.0,
        "max_thickness": 5.0
    })
)]
pub struct MaterialProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub strength_rating: u8,
    pub areal_density: f64,
    pub cost_per_m2: f64,
    pub sustainability_score: f64,
    #[serde(default)]
    pub recyclable: bool,
    pub min_thickness: f64,
    pub max_thickness: f64,
}

impl MaterialProfile {
    /// Checks the profile for physically meaningful values.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |msg: String| ValidationError::InvalidMaterial(format!("{}: {}", self.id, msg));

        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidMaterial(
                "material id must not be empty".to_string(),
            ));
        }
        if !(1..=10).contains(&self.strength_rating) {
            return Err(invalid(format!(
                "strength rating must be between 1 and 10, got: {}",
                self.strength_rating
            )));
        }
        validation::validate_dimension(self.areal_density, "Areal density").map_err(invalid)?;
        validation::validate_non_negative(self.cost_per_m2, "Cost per m²").map_err(invalid)?;
        validation::validate_range(self.sustainability_score, 0.0, 1.0, "Sustainability score")
            .map_err(invalid)?;
        validation::validate_dimension(self.min_thickness, "Minimum thickness").map_err(invalid)?;
        validation::validate_dimension(self.max_thickness, "Maximum thickness").map_err(invalid)?;
        if self.min_thickness > self.max_thickness {
            return Err(invalid(format!(
                "minimum thickness {} exceeds maximum thickness {}",
                self.min_thickness, self.max_thickness
            )));
        }
        Ok(())
    }

    /// `true` when `thickness` lies inside the usable range.
    pub fn allows_thickness(&self, thickness: f64, tolerance: f64) -> bool {
        thickness >= self.min_thickness - tolerance && thickness <= self.max_thickness + tolerance
    }
}

/// Which face of the assembled box a panel is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PanelRole {
    Front,
    Back,
    Left,
    Right,
    Top,
    Bottom,
    /// Internal insert or divider, never printed on.
    Insert,
}

/// Panel role a text element asks for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PanelPreference {
    Front,
    Back,
    #[default]
    Any,
}

impl PanelPreference {
    pub fn matches(&self, role: PanelRole) -> bool {
        match self {
            PanelPreference::Front => role == PanelRole::Front,
            PanelPreference::Back => role == PanelRole::Back,
            PanelPreference::Any => true,
        }
    }
}

/// One face of an assembled box.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Panel {
    pub id: String,
    pub role: PanelRole,
    pub width: f64,
    pub height: f64,
    /// Flat faces can carry print; folded or curved ones cannot.
    pub flat: bool,
    pub outer_facing: bool,
}

impl Panel {
    pub fn new(id: impl Into<String>, role: PanelRole, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            role,
            width,
            height,
            flat: true,
            outer_facing: role != PanelRole::Insert,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// The printable surface as a rectangle anchored at the top-left corner.
    pub fn surface(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Eligible for label placement.
    pub fn is_printable(&self) -> bool {
        self.flat && self.outer_facing
    }
}

/// Semantic type of a text element.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    MandatoryRegulatory,
    Descriptive,
    Decorative,
}

impl TextKind {
    /// Packing tier, lower tiers are placed first.
    pub fn tier(&self) -> u8 {
        match self {
            TextKind::MandatoryRegulatory => 0,
            TextKind::Descriptive => 1,
            TextKind::Decorative => 2,
        }
    }
}

fn default_aspect_ratio() -> f64 {
    TextElement::DEFAULT_ASPECT_RATIO
}

fn default_priority() -> f64 {
    1.0
}

/// A piece of label text that has to be printed on the box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": "ce-mark",
        "kind": "mandatory_regulatory",
        "min_area": 400.0,
        "aspect_ratio": 1.0,
        "preferred_role": "back",
        "priority": 1.0
    })
)]
pub struct TextElement {
    pub id: String,
    pub kind: TextKind,
    /// Minimum printed area in mm².
    pub min_area: f64,
    /// Width / height of the printed block.
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f64,
    #[serde(default)]
    pub preferred_role: PanelPreference,
    #[serde(default = "default_priority")]
    pub priority: f64,
    #[serde(default)]
    pub content: Option<String>,
}

impl TextElement {
    pub const DEFAULT_ASPECT_RATIO: f64 = 3.0;

    pub fn new(id: impl Into<String>, kind: TextKind, min_area: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            min_area,
            aspect_ratio: Self::DEFAULT_ASPECT_RATIO,
            preferred_role: PanelPreference::Any,
            priority: 1.0,
            content: None,
        }
    }

    /// Builder-style setter for the preferred panel role.
    pub fn prefer(mut self, role: PanelPreference) -> Self {
        self.preferred_role = role;
        self
    }

    /// Builder-style setter for the block aspect ratio.
    pub fn with_aspect_ratio(mut self, aspect_ratio: f64) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn is_mandatory(&self) -> bool {
        self.kind == TextKind::MandatoryRegulatory
    }

    /// Width and height of the printed block at 0° rotation.
    pub fn block_size(&self) -> (f64, f64) {
        let width = (self.min_area * self.aspect_ratio).sqrt();
        (width, self.min_area / width)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid =
            |msg: String| ValidationError::InvalidTextElement(format!("{}: {}", self.id, msg));
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidTextElement(
                "text element id must not be empty".to_string(),
            ));
        }
        validation::validate_dimension(self.min_area, "Minimum area").map_err(invalid)?;
        validation::validate_dimension(self.aspect_ratio, "Aspect ratio").map_err(invalid)?;
        validation::validate_non_negative(self.priority, "Priority").map_err(invalid)?;
        Ok(())
    }
}

/// Relative importance of the four scoring criteria.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OptimizationWeights {
    pub protection: f64,
    pub cost: f64,
    pub sustainability: f64,
    pub compactness: f64,
}

impl Default for OptimizationWeights {
    fn default() -> Self {
        Self {
            protection: 0.25,
            cost: 0.25,
            sustainability: 0.25,
            compactness: 0.25,
        }
    }
}

impl OptimizationWeights {
    pub fn new(protection: f64, cost: f64, sustainability: f64, compactness: f64) -> Self {
        Self {
            protection,
            cost,
            sustainability,
            compactness,
        }
    }

    fn sum(&self) -> f64 {
        self.protection + self.cost + self.sustainability + self.compactness
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [
            ("protection", self.protection),
            ("cost", self.cost),
            ("sustainability", self.sustainability),
            ("compactness", self.compactness),
        ] {
            validation::validate_non_negative(value, name)
                .map_err(ValidationError::InvalidWeights)?;
        }
        if self.sum() <= 0.0 {
            return Err(ValidationError::InvalidWeights(
                "at least one weight must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Weights scaled to sum to 1.
    pub fn normalized(&self) -> Self {
        let sum = self.sum();
        if sum <= 0.0 {
            return Self::default();
        }
        Self::new(
            self.protection / sum,
            self.cost / sum,
            self.sustainability / sum,
            self.compactness / sum,
        )
    }
}

/// Secondary ordering applied between candidates with equal scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Smaller outer volume first.
    OuterVolume,
    /// Cheaper blank first.
    Cost,
    /// Higher sustainability score first.
    Sustainability,
}

impl TieBreak {
    pub const DEFAULT_ORDER: [TieBreak; 3] =
        [TieBreak::OuterVolume, TieBreak::Cost, TieBreak::Sustainability];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "volume" | "outer_volume" => Some(TieBreak::OuterVolume),
            "cost" => Some(TieBreak::Cost),
            "sustainability" => Some(TieBreak::Sustainability),
            _ => None,
        }
    }

    /// Parses a comma separated list such as `cost,volume`.
    pub fn parse_list(raw: &str) -> Option<Vec<Self>> {
        let mut order = Vec::new();
        for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
            let tie = Self::parse(part)?;
            if !order.contains(&tie) {
                order.push(tie);
            }
        }
        if order.is_empty() { None } else { Some(order) }
    }
}

fn default_padding() -> Vec3 {
    Vec3::splat(DesignConstraints::DEFAULT_PADDING)
}

/// Caller-supplied constraints for one design request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "padding": {"x": 5.0, "y": 5.0, "z": 5.0},
        "weights": {"protection": 0.4, "cost": 0.3, "sustainability": 0.2, "compactness": 0.1},
        "regulatory_regions": ["EU"],
        "text_elements": [
            {"id": "brand", "kind": "decorative", "min_area": 1500.0, "preferred_role": "front"}
        ]
    })
)]
pub struct DesignConstraints {
    /// Minimum clearance per side along each axis, before fragility scaling.
    #[serde(default = "default_padding")]
    pub padding: Vec3,
    #[serde(default)]
    #[schema(nullable = true)]
    pub min_strength_rating: Option<u8>,
    #[serde(default)]
    pub weights: OptimizationWeights,
    #[serde(default)]
    #[schema(nullable = true)]
    pub tie_break: Option<Vec<TieBreak>>,
    #[serde(default)]
    pub regulatory_regions: Vec<String>,
    #[serde(default)]
    pub text_elements: Vec<TextElement>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub material_allow_list: Option<Vec<String>>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub template_allow_list: Option<Vec<String>>,
}

impl Default for DesignConstraints {
    fn default() -> Self {
        Self {
            padding: default_padding(),
            min_strength_rating: None,
            weights: OptimizationWeights::default(),
            tie_break: None,
            regulatory_regions: Vec::new(),
            text_elements: Vec::new(),
            material_allow_list: None,
            template_allow_list: None,
        }
    }
}

impl DesignConstraints {
    pub const DEFAULT_PADDING: f64 = 10.0;

    /// Builder-style setter for uniform padding.
    pub fn with_padding(mut self, per_side: f64) -> Self {
        self.padding = Vec3::splat(per_side);
        self
    }

    pub fn with_weights(mut self, weights: OptimizationWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_text(mut self, element: TextElement) -> Self {
        self.text_elements.push(element);
        self
    }

    /// Padding per side after fragility scaling.
    pub fn effective_padding(&self, fragility: FragilityClass) -> Vec3 {
        self.padding * fragility.padding_scale()
    }

    /// Strength floor from the caller or, failing that, the fragility class.
    pub fn strength_floor(&self, fragility: FragilityClass) -> u8 {
        self.min_strength_rating
            .unwrap_or_else(|| fragility.strength_floor())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [
            ("Padding x", self.padding.x),
            ("Padding y", self.padding.y),
            ("Padding z", self.padding.z),
        ] {
            validation::validate_non_negative(value, name)
                .map_err(ValidationError::InvalidDimension)?;
        }
        if let Some(floor) = self.min_strength_rating {
            if !(1..=10).contains(&floor) {
                return Err(ValidationError::InvalidConfiguration(format!(
                    "strength floor must be between 1 and 10, got: {}",
                    floor
                )));
            }
        }
        self.weights.validate()?;
        if let Some(order) = &self.tie_break {
            if order.is_empty() {
                return Err(ValidationError::InvalidConfiguration(
                    "tie-break order must not be empty".to_string(),
                ));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for element in &self.text_elements {
            element.validate()?;
            if !seen.insert(element.id.as_str()) {
                return Err(ValidationError::InvalidTextElement(format!(
                    "duplicate text element id '{}'",
                    element.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material() -> MaterialProfile {
        MaterialProfile {
            id: "kraft".to_string(),
            name: "Kraft board".to_string(),
            strength_rating: 4,
            areal_density: 350.0,
            cost_per_m2: 0.6,
            sustainability_score: 0.7,
            recyclable: true,
            min_thickness: 1.0,
            max_thickness: 3.0,
        }
    }

    #[test]
    fn material_validation_rejects_inverted_thickness() {
        assert!(material().validate().is_ok());

        let mut broken = material();
        broken.min_thickness = 4.0;
        assert!(matches!(
            broken.validate(),
            Err(ValidationError::InvalidMaterial(_))
        ));

        let mut weak = material();
        weak.strength_rating = 0;
        assert!(weak.validate().is_err());
    }

    #[test]
    fn fragility_orders_and_scales_padding() {
        assert!(FragilityClass::Low < FragilityClass::High);
        let constraints = DesignConstraints::default().with_padding(5.0);
        let padding = constraints.effective_padding(FragilityClass::High);
        assert!((padding.x - 6.0).abs() < 1e-9);
        assert_eq!(
            constraints.effective_padding(FragilityClass::Low),
            Vec3::splat(5.0)
        );
    }

    #[test]
    fn fragility_from_category() {
        assert_eq!(FragilityClass::from_category("Electronics"), FragilityClass::High);
        assert_eq!(FragilityClass::from_category("food"), FragilityClass::Medium);
        assert_eq!(FragilityClass::from_category("books"), FragilityClass::Medium);
    }

    #[test]
    fn weights_normalize_and_validate() {
        let weights = OptimizationWeights::new(2.0, 1.0, 1.0, 0.0);
        let n = weights.normalized();
        assert!((n.protection - 0.5).abs() < 1e-9);
        assert!((n.compactness - 0.0).abs() < 1e-9);

        assert!(OptimizationWeights::new(0.0, 0.0, 0.0, 0.0).validate().is_err());
        assert!(OptimizationWeights::new(-1.0, 1.0, 0.0, 0.0).validate().is_err());
    }

    #[test]
    fn tie_break_list_parsing() {
        assert_eq!(
            TieBreak::parse_list("cost, volume"),
            Some(vec![TieBreak::Cost, TieBreak::OuterVolume])
        );
        assert_eq!(TieBreak::parse_list("cost,cost"), Some(vec![TieBreak::Cost]));
        assert_eq!(TieBreak::parse_list("weight"), None);
        assert_eq!(TieBreak::parse_list(""), None);
    }

    #[test]
    fn text_element_block_preserves_area() {
        let element = TextElement::new("warning", TextKind::MandatoryRegulatory, 1200.0);
        let (w, h) = element.block_size();
        assert!((w * h - 1200.0).abs() < 1e-6);
        assert!((w / h - TextElement::DEFAULT_ASPECT_RATIO).abs() < 1e-6);
        assert!(element.is_mandatory());
    }

    #[test]
    fn constraints_reject_duplicate_text_ids() {
        let constraints = DesignConstraints::default()
            .with_text(TextElement::new("a", TextKind::Descriptive, 100.0))
            .with_text(TextElement::new("a", TextKind::Decorative, 100.0));
        assert!(matches!(
            constraints.validate(),
            Err(ValidationError::InvalidTextElement(_))
        ));
    }

    #[test]
    fn constraints_deserialize_with_defaults() {
        let json = r#"{ "padding": {"x": 5.0, "y": 5.0, "z": 5.0} }"#;
        let constraints: DesignConstraints = serde_json::from_str(json).unwrap();
        assert_eq!(constraints.weights, OptimizationWeights::default());
        assert!(constraints.text_elements.is_empty());
        assert!(constraints.validate().is_ok());
    }

    #[test]
    fn panel_preference_matching() {
        assert!(PanelPreference::Any.matches(PanelRole::Top));
        assert!(PanelPreference::Front.matches(PanelRole::Front));
        assert!(!PanelPreference::Back.matches(PanelRole::Front));
        assert!(!Panel::new("insert", PanelRole::Insert, 10.0, 10.0).is_printable());
    }
}
