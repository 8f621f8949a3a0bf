//! Material catalog and template library.
//!
//! Both catalogs follow the same lifecycle: load (built-in defaults or a JSON
//! file), validate every entry, then freeze into a read-only map shared via `Arc`.
//! Iteration order is by id so the search is deterministic.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::info;

use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::model::{MaterialProfile, ValidationError};
use crate::template::{PackagingTemplate, Topology};

/// An entry that can live in a frozen catalog.
pub trait CatalogEntry: Clone + DeserializeOwned + Send + Sync {
    /// Human readable catalog name used in errors.
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn validate(&self) -> Result<(), ValidationError>;
}

impl CatalogEntry for MaterialProfile {
    const KIND: &'static str = "material";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        MaterialProfile::validate(self)
    }
}

impl CatalogEntry for PackagingTemplate {
    const KIND: &'static str = "template";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        PackagingTemplate::validate(self)
    }
}

/// Frozen, read-only table keyed by id.
#[derive(Debug)]
pub struct Catalog<T> {
    entries: BTreeMap<String, T>,
}

impl<T: CatalogEntry> Catalog<T> {
    /// Validates and freezes a list of entries.
    pub fn from_entries(entries: Vec<T>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty { kind: T::KIND });
        }
        let mut map = BTreeMap::new();
        for entry in entries {
            entry.validate().map_err(|err| CatalogError::Invalid {
                kind: T::KIND,
                id: entry.id().to_string(),
                reason: err.to_string(),
            })?;
            let id = entry.id().to_string();
            if map.contains_key(&id) {
                return Err(CatalogError::DuplicateId { kind: T::KIND, id });
            }
            map.insert(id, entry);
        }
        Ok(Self { entries: map })
    }

    /// Parses a JSON array of entries.
    pub fn from_json_str(raw: &str, source: &Path) -> Result<Self, CatalogError> {
        let entries: Vec<T> = serde_json::from_str(raw).map_err(|err| CatalogError::Parse {
            path: source.to_path_buf(),
            source: err,
        })?;
        Self::from_entries(entries)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|err| CatalogError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        Self::from_json_str(&raw, path)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Entries named by an allow-list, or all entries when there is none.
    ///
    /// # Errors
    /// `CatalogError::UnknownId` for the first id that is not in the catalog.
    pub fn resolve(&self, allow_list: Option<&[String]>) -> Result<Vec<&T>, CatalogError> {
        let Some(ids) = allow_list else {
            return Ok(self.iter().collect());
        };
        let mut selected: Vec<&T> = Vec::with_capacity(ids.len());
        for id in ids {
            let entry = self.get(id).ok_or_else(|| CatalogError::UnknownId {
                kind: T::KIND,
                id: id.clone(),
            })?;
            if !selected.iter().any(|e| e.id() == entry.id()) {
                selected.push(entry);
            }
        }
        selected.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(selected)
    }
}

/// Both catalogs, frozen and shareable across requests.
#[derive(Clone, Debug)]
pub struct Catalogs {
    pub materials: Arc<Catalog<MaterialProfile>>,
    pub templates: Arc<Catalog<PackagingTemplate>>,
}

impl Catalogs {
    pub fn new(materials: Catalog<MaterialProfile>, templates: Catalog<PackagingTemplate>) -> Self {
        Self {
            materials: Arc::new(materials),
            templates: Arc::new(templates),
        }
    }

    /// Built-in defaults.
    pub fn builtin() -> Result<Self, CatalogError> {
        Ok(Self::new(
            Catalog::from_entries(builtin_materials())?,
            Catalog::from_entries(builtin_templates())?,
        ))
    }

    /// Loads configured JSON files, falling back to the built-in tables.
    pub fn load(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let materials = match config.materials_path() {
            Some(path) => Catalog::from_json_file(path)?,
            None => Catalog::from_entries(builtin_materials())?,
        };
        let templates = match config.templates_path() {
            Some(path) => Catalog::from_json_file(path)?,
            None => Catalog::from_entries(builtin_templates())?,
        };
        info!(
            materials = materials.len(),
            templates = templates.len(),
            custom_materials = config.materials_path().is_some(),
            custom_templates = config.templates_path().is_some(),
            "catalogs loaded"
        );
        Ok(Self::new(materials, templates))
    }
}

fn material(
    id: &str,
    name: &str,
    strength_rating: u8,
    areal_density: f64,
    cost_per_m2: f64,
    sustainability_score: f64,
    thickness: (f64, f64),
) -> MaterialProfile {
    MaterialProfile {
        id: id.to_string(),
        name: name.to_string(),
        strength_rating,
        areal_density,
        cost_per_m2,
        sustainability_score,
        recyclable: true,
        min_thickness: thickness.0,
        max_thickness: thickness.1,
    }
}

/// Corrugated, pulp and board grades commonly used for retail shipping boxes.
pub fn builtin_materials() -> Vec<MaterialProfile> {
    let mut chipboard = material("rigid-chipboard", "Rigid chipboard", 7, 1100.0, 2.0, 0.6, (1.5, 3.0));
    chipboard.recyclable = false;
    vec![
        material("e-flute", "E-flute single wall", 4, 420.0, 0.7, 0.8, (1.5, 2.5)),
        material("b-flute", "B-flute single wall", 5, 540.0, 0.9, 0.8, (2.5, 4.0)),
        material("c-flute", "C-flute single wall", 6, 600.0, 1.05, 0.78, (3.5, 5.0)),
        material("bc-double-wall", "BC-flute double wall", 8, 900.0, 1.6, 0.72, (6.0, 8.0)),
        material("molded-pulp", "Molded pulp board", 3, 800.0, 1.2, 0.95, (2.0, 4.0)),
        material("honeycomb-board", "Paper honeycomb board", 9, 1200.0, 2.4, 0.7, (10.0, 30.0)),
        chipboard,
    ]
}

/// The four supported topologies with typical converting limits.
pub fn builtin_templates() -> Vec<PackagingTemplate> {
    vec![
        PackagingTemplate::new(
            "mailer",
            "Roll-end tuck-front mailer",
            Topology::RectangularMailer,
            5.0,
            0.08,
            250_000.0,
            1,
        ),
        PackagingTemplate::new(
            "rsc",
            "Regular slotted container",
            Topology::RegularSlotted,
            5.0,
            0.1,
            1_000_000.0,
            3,
        ),
        PackagingTemplate::new(
            "telescoping",
            "Two-piece telescoping box",
            Topology::TelescopingTwoPiece,
            5.0,
            0.15,
            400_000.0,
            2,
        ),
        PackagingTemplate::new(
            "cushioned",
            "Slotted container with cradle insert",
            Topology::CushionedInsert,
            10.0,
            0.15,
            600_000.0,
            2,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalogs_are_valid_and_sorted() {
        let catalogs = Catalogs::builtin().unwrap();
        assert_eq!(catalogs.materials.len(), builtin_materials().len());
        assert_eq!(catalogs.templates.len(), 4);
        let ids: Vec<_> = catalogs.templates.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["cushioned", "mailer", "rsc", "telescoping"]);
    }

    #[test]
    fn rejects_duplicates_and_empty_lists() {
        let mut materials = builtin_materials();
        materials.push(materials[0].clone());
        assert!(matches!(
            Catalog::from_entries(materials),
            Err(CatalogError::DuplicateId { kind: "material", .. })
        ));
        assert!(matches!(
            Catalog::<PackagingTemplate>::from_entries(Vec::new()),
            Err(CatalogError::Empty { kind: "template" })
        ));
    }

    #[test]
    fn rejects_invalid_entries() {
        let mut materials = builtin_materials();
        materials[1].sustainability_score = 1.5;
        let err = Catalog::from_entries(materials).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid { ref id, .. } if id == "b-flute"));
    }

    #[test]
    fn resolves_allow_lists() {
        let catalogs = Catalogs::builtin().unwrap();
        let all = catalogs.materials.resolve(None).unwrap();
        assert_eq!(all.len(), catalogs.materials.len());

        let allow = vec!["c-flute".to_string(), "b-flute".to_string(), "c-flute".to_string()];
        let picked = catalogs.materials.resolve(Some(&allow)).unwrap();
        let ids: Vec<_> = picked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b-flute", "c-flute"]);

        let unknown = vec!["unobtainium".to_string()];
        assert!(matches!(
            catalogs.materials.resolve(Some(&unknown)),
            Err(CatalogError::UnknownId { kind: "material", .. })
        ));
    }

    #[test]
    fn parses_json_catalogs() {
        let raw = r#"[
            {"id": "box", "topology": "regular_slotted", "granularity": 1.0,
             "min_aspect_ratio": 0.0, "max_panel_area": 1e9, "max_variants": 1}
        ]"#;
        let catalog: Catalog<PackagingTemplate> =
            Catalog::from_json_str(raw, Path::new("inline.json")).unwrap();
        let tpl = catalog.get("box").unwrap();
        assert_eq!(tpl.seam_allowance, PackagingTemplate::DEFAULT_SEAM_ALLOWANCE);

        let broken = Catalog::<MaterialProfile>::from_json_str("{", Path::new("broken.json"));
        assert!(matches!(broken, Err(CatalogError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result =
            Catalog::<MaterialProfile>::from_json_file(Path::new("/nonexistent/materials.json"));
        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }
}
