//! Label packing on the printable box faces.
//!
//! A best-fit guillotine packer: each panel keeps a list of free rectangles,
//! every element goes into the smallest free rectangle that holds it and that
//! rectangle is split into a right and a bottom remainder. The packer is a pure
//! function of its inputs.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::trace;
use utoipa::ToSchema;

use crate::error::LabelPlacementError;
use crate::optimizer::compare_with_epsilon;
use crate::model::{Panel, PanelPreference, TextElement};
use crate::types::{EPSILON_GENERAL, Rect};

/// One element placed on a panel.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct LabelPlacement {
    pub element_id: String,
    pub panel_id: String,
    /// Printed block, margin excluded.
    pub rect: Rect,
    /// Rotated by 90 degrees.
    pub rotated: bool,
}

/// An element that did not fit its preferred panel role and went elsewhere.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct LabelFallback {
    pub element_id: String,
    pub preferred: PanelPreference,
    pub panel_id: String,
}

/// Result of a packing run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct LabelLayout {
    pub placements: Vec<LabelPlacement>,
    /// Optional elements that found no room.
    pub dropped: Vec<String>,
    pub fallbacks: Vec<LabelFallback>,
}

impl LabelLayout {
    pub fn placement(&self, element_id: &str) -> Option<&LabelPlacement> {
        self.placements.iter().find(|p| p.element_id == element_id)
    }
}

/// Packing order: mandatory first, then larger, then more important, then by id.
fn packing_order(a: &TextElement, b: &TextElement) -> Ordering {
    a.kind
        .tier()
        .cmp(&b.kind.tier())
        .then_with(|| b.min_area.total_cmp(&a.min_area))
        .then_with(|| b.priority.total_cmp(&a.priority))
        .then_with(|| a.id.cmp(&b.id))
}

struct FreePanel<'a> {
    panel: &'a Panel,
    free: Vec<Rect>,
}

/// Chosen slot for an element.
#[derive(Clone, Copy)]
struct Fit {
    panel: usize,
    rect: usize,
    area: f64,
    width: f64,
    height: f64,
    rotated: bool,
}

fn best_fit(
    panels: &[FreePanel<'_>],
    candidates: &[usize],
    size: (f64, f64),
) -> Option<Fit> {
    let (width, height) = size;
    let mut best: Option<Fit> = None;
    for &panel_idx in candidates {
        for (rect_idx, rect) in panels[panel_idx].free.iter().enumerate() {
            let orientation = if rect.can_hold(width, height, EPSILON_GENERAL) {
                Some((width, height, false))
            } else if rect.can_hold(height, width, EPSILON_GENERAL) {
                Some((height, width, true))
            } else {
                None
            };
            let Some((w, h, rotated)) = orientation else {
                continue;
            };
            let better = match &best {
                None => true,
                Some(current) => {
                    compare_with_epsilon(rect.area(), current.area, EPSILON_GENERAL)
                        == Ordering::Less
                }
            };
            if better {
                best = Some(Fit {
                    panel: panel_idx,
                    rect: rect_idx,
                    area: rect.area(),
                    width: w,
                    height: h,
                    rotated,
                });
            }
        }
    }
    best
}

/// Packs text elements onto the printable panels.
///
/// # Errors
/// `LabelPlacementError` for the first mandatory element that fits nowhere.
/// Optional elements that fit nowhere are reported in `LabelLayout::dropped`.
pub fn pack_labels(
    panels: &[Panel],
    elements: &[TextElement],
    margin: f64,
) -> Result<LabelLayout, LabelPlacementError> {
    let mut state: Vec<FreePanel<'_>> = panels
        .iter()
        .filter(|p| p.is_printable())
        .map(|panel| FreePanel {
            panel,
            free: panel.surface().inset(margin).into_iter().collect(),
        })
        .collect();
    let all: Vec<usize> = (0..state.len()).collect();

    let mut ordered: Vec<&TextElement> = elements.iter().collect();
    ordered.sort_by(|a, b| packing_order(a, b));

    let mut layout = LabelLayout::default();
    for element in ordered {
        let (w, h) = element.block_size();
        let size = (w + margin, h + margin);

        let preferred: Vec<usize> = all
            .iter()
            .copied()
            .filter(|&i| element.preferred_role.matches(state[i].panel.role))
            .collect();
        let mut fit = best_fit(&state, &preferred, size);
        let mut fell_back = false;
        if fit.is_none() && preferred.len() < all.len() {
            fit = best_fit(&state, &all, size);
            fell_back = fit.is_some();
        }

        let Some(fit) = fit else {
            if element.is_mandatory() {
                let largest_free_area = state
                    .iter()
                    .flat_map(|p| p.free.iter().map(Rect::area))
                    .fold(0.0, f64::max);
                return Err(LabelPlacementError {
                    element_id: element.id.clone(),
                    required_area: size.0 * size.1,
                    largest_free_area,
                    panel_count: state.len(),
                });
            }
            trace!(element = %element.id, "optional label dropped");
            layout.dropped.push(element.id.clone());
            continue;
        };

        let slot = &mut state[fit.panel];
        let rect = slot.free.remove(fit.rect);
        let remainders = [
            Rect::new(rect.x + fit.width, rect.y, rect.width - fit.width, fit.height),
            Rect::new(rect.x, rect.y + fit.height, rect.width, rect.height - fit.height),
        ];
        for (offset, remainder) in remainders
            .into_iter()
            .filter(|r| r.width > EPSILON_GENERAL && r.height > EPSILON_GENERAL)
            .enumerate()
        {
            slot.free.insert(fit.rect + offset, remainder);
        }

        let panel_id = slot.panel.id.clone();
        if fell_back {
            layout.fallbacks.push(LabelFallback {
                element_id: element.id.clone(),
                preferred: element.preferred_role,
                panel_id: panel_id.clone(),
            });
        }
        layout.placements.push(LabelPlacement {
            element_id: element.id.clone(),
            panel_id,
            rect: Rect::new(rect.x, rect.y, fit.width - margin, fit.height - margin),
            rotated: fit.rotated,
        });
    }
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::find_overlaps;
    use crate::model::{PanelRole, TextKind};

    fn panel(id: &str, role: PanelRole, w: f64, h: f64) -> Panel {
        Panel::new(id, role, w, h)
    }

    fn element(id: &str, kind: TextKind, area: f64) -> TextElement {
        TextElement::new(id, kind, area)
    }

    #[test]
    fn first_label_sits_at_margin_corner() {
        let panels = vec![panel("front", PanelRole::Front, 200.0, 100.0)];
        let elements = vec![element("brand", TextKind::Decorative, 4800.0)];
        let layout = pack_labels(&panels, &elements, 2.0).unwrap();
        let placed = layout.placement("brand").unwrap();
        assert_eq!(placed.rect, Rect::new(2.0, 2.0, 120.0, 40.0));
        assert!(!placed.rotated);
    }

    #[test]
    fn rotates_when_only_90_degrees_fits() {
        let panels = vec![panel("side", PanelRole::Left, 100.0, 300.0)];
        let elements = vec![element("warning", TextKind::MandatoryRegulatory, 4800.0)];
        let layout = pack_labels(&panels, &elements, 0.0).unwrap();
        let placed = layout.placement("warning").unwrap();
        assert!(placed.rotated);
        assert_eq!(placed.rect, Rect::new(0.0, 0.0, 40.0, 120.0));
    }

    #[test]
    fn picks_smallest_free_rectangle() {
        let panels = vec![
            panel("front", PanelRole::Front, 200.0, 200.0),
            panel("back", PanelRole::Back, 130.0, 50.0),
        ];
        let elements = vec![element("a", TextKind::Descriptive, 4800.0)];
        let layout = pack_labels(&panels, &elements, 0.0).unwrap();
        assert_eq!(layout.placement("a").unwrap().panel_id, "back");
    }

    #[test]
    fn falls_back_when_preferred_role_is_full() {
        let panels = vec![
            panel("front", PanelRole::Front, 100.0, 100.0),
            panel("back", PanelRole::Back, 300.0, 300.0),
        ];
        let elements =
            vec![element("claim", TextKind::Descriptive, 4800.0).prefer(PanelPreference::Front)];
        let layout = pack_labels(&panels, &elements, 0.0).unwrap();
        assert_eq!(layout.placement("claim").unwrap().panel_id, "back");
        assert_eq!(layout.fallbacks.len(), 1);
        assert_eq!(layout.fallbacks[0].preferred, PanelPreference::Front);
    }

    #[test]
    fn unplaceable_mandatory_label_is_an_error() {
        let panels = vec![panel("front", PanelRole::Front, 50.0, 50.0)];
        let elements = vec![element("fcc", TextKind::MandatoryRegulatory, 4800.0)];
        let err = pack_labels(&panels, &elements, 2.0).unwrap_err();
        assert_eq!(err.element_id, "fcc");
        assert_eq!(err.panel_count, 1);
        assert!((err.largest_free_area - 46.0 * 46.0).abs() < 1e-9);
    }

    #[test]
    fn unplaceable_optional_label_is_dropped() {
        let panels = vec![panel("front", PanelRole::Front, 50.0, 50.0)];
        let elements = vec![
            element("art", TextKind::Decorative, 4800.0),
            element("tagline", TextKind::Descriptive, 100.0),
        ];
        let layout = pack_labels(&panels, &elements, 2.0).unwrap();
        assert_eq!(layout.dropped, vec!["art".to_string()]);
        assert!(layout.placement("tagline").is_some());
    }

    #[test]
    fn ignores_non_printable_panels() {
        let mut top = panel("top", PanelRole::Top, 500.0, 500.0);
        top.flat = false;
        let panels = vec![top, panel("front", PanelRole::Front, 200.0, 100.0)];
        let elements = vec![element("a", TextKind::Descriptive, 300.0)];
        let layout = pack_labels(&panels, &elements, 2.0).unwrap();
        assert_eq!(layout.placement("a").unwrap().panel_id, "front");
    }

    #[test]
    fn mandatory_labels_are_packed_first() {
        // Only one of the two fits; the mandatory one wins despite the lower priority.
        let panels = vec![panel("front", PanelRole::Front, 130.0, 45.0)];
        let mut art = element("art", TextKind::Decorative, 4800.0);
        art.priority = 10.0;
        let elements = vec![art, element("ce", TextKind::MandatoryRegulatory, 4800.0)];
        let layout = pack_labels(&panels, &elements, 0.0).unwrap();
        assert!(layout.placement("ce").is_some());
        assert_eq!(layout.dropped, vec!["art".to_string()]);
    }

    #[test]
    fn packing_is_idempotent_and_overlap_free() {
        let panels = vec![
            panel("front", PanelRole::Front, 300.0, 200.0),
            panel("back", PanelRole::Back, 300.0, 200.0),
            panel("left", PanelRole::Left, 200.0, 200.0),
        ];
        let elements: Vec<TextElement> = (0..12)
            .map(|i| {
                let kind = match i % 3 {
                    0 => TextKind::MandatoryRegulatory,
                    1 => TextKind::Descriptive,
                    _ => TextKind::Decorative,
                };
                element(&format!("e{i}"), kind, 400.0 + 150.0 * f64::from(i))
            })
            .collect();
        let first = pack_labels(&panels, &elements, 2.0).unwrap();
        let second = pack_labels(&panels, &elements, 2.0).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.placements.len(), 12);
        assert!(find_overlaps(&first.placements).is_empty());
    }
}
