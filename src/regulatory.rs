//! Regulatory marking requirements.
//!
//! A small built-in table of the markings a box needs for a target region and
//! product category. Every region contributes its category rules plus its
//! packaging rules; the `Global` packaging rules always apply.

use tracing::{debug, warn};

use crate::model::{PanelPreference, TextElement, TextKind};

/// Scope key for rules that apply to every product.
const PACKAGING: &str = "packaging";
const GLOBAL: &str = "Global";

struct Requirement {
    region: &'static str,
    scope: &'static str,
    id: &'static str,
    /// Printed area in mm².
    min_area: f64,
    aspect_ratio: f64,
    preferred_role: PanelPreference,
    content: &'static str,
}

const fn rule(
    region: &'static str,
    scope: &'static str,
    id: &'static str,
    min_area: f64,
    aspect_ratio: f64,
    preferred_role: PanelPreference,
    content: &'static str,
) -> Requirement {
    Requirement {
        region,
        scope,
        id,
        min_area,
        aspect_ratio,
        preferred_role,
        content,
    }
}

const REQUIREMENTS: &[Requirement] = &[
    rule("US", "electronics", "fcc-id", 300.0, 4.0, PanelPreference::Back, "FCC ID"),
    rule(
        "US",
        "electronics",
        "fcc-statement",
        1800.0,
        4.0,
        PanelPreference::Back,
        "This device complies with Part 15 of the FCC Rules.",
    ),
    rule("US", "electronics", "ul-mark", 225.0, 1.0, PanelPreference::Any, "UL"),
    rule("US", "food", "nutrition-facts", 3000.0, 0.6, PanelPreference::Back, "Nutrition Facts"),
    rule("US", "food", "allergen-statement", 600.0, 5.0, PanelPreference::Back, "Contains:"),
    rule("US", "cosmetics", "ingredients-list", 1200.0, 4.0, PanelPreference::Back, "Ingredients"),
    rule(
        "US",
        "cosmetics",
        "external-use-warning",
        400.0,
        5.0,
        PanelPreference::Any,
        "For external use only.",
    ),
    rule(
        "US",
        "toys",
        "small-parts-warning",
        900.0,
        4.0,
        PanelPreference::Front,
        "WARNING: CHOKING HAZARD - Small parts. Not for children under 3 yrs.",
    ),
    rule("US", PACKAGING, "recycling-code", 225.0, 1.0, PanelPreference::Any, "Recyclable"),
    rule("EU", "electronics", "ce-mark", 100.0, 1.4, PanelPreference::Any, "CE"),
    rule("EU", "electronics", "weee-symbol", 150.0, 0.7, PanelPreference::Any, "WEEE"),
    rule("EU", "food", "eu-nutrition", 2500.0, 0.8, PanelPreference::Back, "Nutrition declaration"),
    rule("EU", PACKAGING, "green-dot", 100.0, 1.0, PanelPreference::Any, "Der Grüne Punkt"),
    rule(
        GLOBAL,
        PACKAGING,
        "iso-packaging-symbols",
        400.0,
        3.0,
        PanelPreference::Any,
        "ISO 780 handling symbols",
    ),
];

fn is_known_region(region: &str) -> bool {
    REQUIREMENTS
        .iter()
        .any(|r| r.region.eq_ignore_ascii_case(region))
}

fn applies(req: &Requirement, region: &str, category: Option<&str>) -> bool {
    req.region.eq_ignore_ascii_case(region)
        && (req.scope == PACKAGING || category.is_some_and(|c| req.scope.eq_ignore_ascii_case(c)))
}

/// Mandatory text elements required for the target regions and category.
///
/// Returns elements in table order without duplicates. Unknown regions are
/// logged and only pick up the `Global` rules. No regions means no requirements.
pub fn required_elements(regions: &[String], category: Option<&str>) -> Vec<TextElement> {
    let mut elements: Vec<TextElement> = Vec::new();
    if regions.is_empty() {
        return elements;
    }

    for region in regions {
        let known = is_known_region(region);
        if !known {
            warn!(region = %region, "no regulatory rules for region, applying global rules only");
        }
        let scopes = [region.as_str(), GLOBAL];
        for scope_region in scopes.into_iter().filter(|&s| known || s == GLOBAL) {
            for req in REQUIREMENTS.iter().filter(|r| applies(r, scope_region, category)) {
                if elements.iter().any(|e| e.id == req.id) {
                    continue;
                }
                let mut element = TextElement::new(req.id, TextKind::MandatoryRegulatory, req.min_area)
                    .with_aspect_ratio(req.aspect_ratio)
                    .prefer(req.preferred_role);
                element.content = Some(req.content.to_string());
                elements.push(element);
            }
        }
    }
    debug!(
        regions = ?regions,
        category = category.unwrap_or("-"),
        count = elements.len(),
        "regulatory elements derived"
    );
    elements
}

/// Merges derived elements with caller supplied ones; the caller wins on id clashes.
pub fn merge_elements(derived: Vec<TextElement>, supplied: &[TextElement]) -> Vec<TextElement> {
    let mut merged: Vec<TextElement> = derived
        .into_iter()
        .filter(|d| !supplied.iter().any(|s| s.id == d.id))
        .collect();
    merged.extend(supplied.iter().cloned());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(elements: &[TextElement]) -> Vec<&str> {
        elements.iter().map(|e| e.id.as_str()).collect()
    }

    fn regions(list: &[&str]) -> Vec<String> {
        list.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn no_regions_means_no_requirements() {
        assert!(required_elements(&[], Some("electronics")).is_empty());
    }

    #[test]
    fn us_electronics() {
        let elements = required_elements(&regions(&["US"]), Some("electronics"));
        assert_eq!(
            ids(&elements),
            vec![
                "fcc-id",
                "fcc-statement",
                "ul-mark",
                "recycling-code",
                "iso-packaging-symbols"
            ]
        );
        assert!(elements.iter().all(TextElement::is_mandatory));
    }

    #[test]
    fn regions_are_combined_without_duplicates() {
        let elements = required_elements(&regions(&["eu", "US"]), Some("electronics"));
        let got = ids(&elements);
        assert_eq!(got.iter().filter(|id| **id == "iso-packaging-symbols").count(), 1);
        assert!(got.contains(&"ce-mark"));
        assert!(got.contains(&"weee-symbol"));
        assert!(got.contains(&"green-dot"));
        assert!(got.contains(&"fcc-statement"));
    }

    #[test]
    fn unknown_category_keeps_packaging_rules() {
        let elements = required_elements(&regions(&["EU"]), Some("furniture"));
        assert_eq!(ids(&elements), vec!["green-dot", "iso-packaging-symbols"]);
        let elements = required_elements(&regions(&["EU"]), None);
        assert_eq!(ids(&elements), vec!["green-dot", "iso-packaging-symbols"]);
    }

    #[test]
    fn unknown_region_still_gets_global_rules() {
        let elements = required_elements(&regions(&["Atlantis"]), Some("toys"));
        assert_eq!(ids(&elements), vec!["iso-packaging-symbols"]);
    }

    #[test]
    fn toys_warning_prefers_front() {
        let elements = required_elements(&regions(&["US"]), Some("toys"));
        let warning = elements.iter().find(|e| e.id == "small-parts-warning").unwrap();
        assert_eq!(warning.preferred_role, PanelPreference::Front);
    }

    #[test]
    fn supplied_elements_override_derived_ones() {
        let derived = required_elements(&regions(&["EU"]), None);
        let custom = TextElement::new("green-dot", TextKind::MandatoryRegulatory, 400.0);
        let extra = TextElement::new("logo", TextKind::Decorative, 2000.0);
        let merged = merge_elements(derived, &[custom, extra]);
        assert_eq!(ids(&merged), vec!["iso-packaging-symbols", "green-dot", "logo"]);
        assert_eq!(merged[1].min_area, 400.0);
    }
}
