//! Element store: the client-side cache of a room's elements plus selection.

use crate::geometry::{self, paint_order};
use crate::selection::{SelectMode, Selection};
use crate::shapes::{Element, ElementId, ElementStyle, Shape};
use kurbo::{Point, Rect};
use std::collections::HashMap;

/// A partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub shape: Option<Shape>,
    pub angle: Option<f64>,
    pub style: Option<ElementStyle>,
    pub locked: Option<bool>,
    pub z_index: Option<i64>,
}

impl ElementPatch {
    pub fn shape(shape: Shape) -> Self {
        Self {
            shape: Some(shape),
            ..Self::default()
        }
    }

    pub fn locked(locked: bool) -> Self {
        Self {
            locked: Some(locked),
            ..Self::default()
        }
    }
}

/// Target of a z-order change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZOrder {
    ToFront,
    ToBack,
}

/// A change the engine wants peers to see.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationIntent {
    Create(Element),
    Update(Element),
    Delete(ElementId),
}

impl MutationIntent {
    pub fn id(&self) -> &str {
        match self {
            MutationIntent::Create(e) | MutationIntent::Update(e) => &e.id,
            MutationIntent::Delete(id) => id,
        }
    }
}

/// The element set and the selection that refers into it.
///
/// Every mutation is total: operating on an id that is not present is a
/// no-op, since a peer may have deleted it first.
#[derive(Debug, Clone, Default)]
pub struct ElementStore {
    elements: HashMap<ElementId, Element>,
    selection: Selection,
}

impl ElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an element, replacing any element with the same id.
    pub fn add(&mut self, element: Element) {
        self.elements.insert(element.id.clone(), element);
    }

    /// Apply a partial update. A locked element only accepts an unlock.
    pub fn update(&mut self, id: &str, patch: ElementPatch) -> bool {
        let Some(element) = self.elements.get_mut(id) else {
            return false;
        };
        if element.locked {
            return match patch.locked {
                Some(locked) => {
                    element.locked = locked;
                    true
                }
                None => false,
            };
        }
        if let Some(shape) = patch.shape {
            element.shape = shape;
        }
        if let Some(angle) = patch.angle {
            element.angle = angle;
        }
        if let Some(style) = patch.style {
            element.style = style;
        }
        if let Some(locked) = patch.locked {
            element.locked = locked;
        }
        if let Some(z) = patch.z_index {
            element.z_index = z;
        }
        true
    }

    /// Remove an element unless it is locked.
    pub fn remove(&mut self, id: &str) -> Option<Element> {
        if self.elements.get(id)?.locked {
            return None;
        }
        self.remove_unchecked(id)
    }

    /// Remove an element regardless of its lock (peer deletes, cancelled gestures).
    pub fn remove_unchecked(&mut self, id: &str) -> Option<Element> {
        self.selection.remove(id);
        self.elements.remove(id)
    }

    /// Overwrite an element wholesale, ignoring locks. Used for peer state
    /// and for replaying live gesture geometry.
    pub fn put(&mut self, element: Element) {
        self.elements.insert(element.id.clone(), element);
    }

    /// Move an element to the front or back of the paint order.
    pub fn reorder(&mut self, id: &str, target: ZOrder) -> bool {
        if !self.elements.contains_key(id) {
            return false;
        }
        let others = self.elements.values().filter(|e| e.id != id).map(|e| e.z_index);
        let z = match target {
            ZOrder::ToFront => others.max().map_or(0, |m| m + 1),
            ZOrder::ToBack => others.min().map_or(0, |m| m - 1),
        };
        self.update(id, ElementPatch { z_index: Some(z), ..ElementPatch::default() })
    }

    /// Change the selection. Ids that are not in the store are ignored.
    pub fn select<I>(&mut self, ids: I, mode: SelectMode)
    where
        I: IntoIterator<Item = ElementId>,
    {
        let ids: Vec<ElementId> = ids
            .into_iter()
            .filter(|id| self.elements.contains_key(id))
            .collect();
        self.selection.apply(ids, mode);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.contains(id)
    }

    /// Selected elements in paint order.
    pub fn selected(&self) -> Vec<&Element> {
        let mut out: Vec<&Element> = self.selection.iter().filter_map(|id| self.elements.get(id)).collect();
        out.sort_by(|a, b| paint_order(a, b));
        out
    }

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Read-only snapshot in paint order (back to front).
    pub fn ordered(&self) -> Vec<&Element> {
        let mut out: Vec<&Element> = self.elements.values().collect();
        out.sort_by(|a, b| paint_order(a, b));
        out
    }

    /// Topmost element under a world point.
    pub fn pick_topmost(&self, point: Point) -> Option<&Element> {
        geometry::pick_topmost(point, self.elements.values())
    }

    /// Ids of elements whose bounds overlap `rect`, in paint order.
    pub fn elements_in_rect(&self, rect: Rect) -> Vec<ElementId> {
        self.ordered()
            .into_iter()
            .filter(|e| geometry::intersects_rect(e, rect))
            .map(|e| e.id.clone())
            .collect()
    }

    /// zIndex that places a new element above everything else.
    pub fn next_z_index(&self) -> i64 {
        self.elements.values().map(|e| e.z_index).max().map_or(0, |m| m + 1)
    }

    /// Copy out the element map and selection.
    pub fn snapshot(&self) -> (HashMap<ElementId, Element>, Selection) {
        (self.elements.clone(), self.selection.clone())
    }

    /// Replace the whole state. Selection ids without an element are dropped.
    pub fn restore(&mut self, elements: HashMap<ElementId, Element>, mut selection: Selection) {
        selection.retain(|id| elements.contains_key(id));
        self.elements = elements;
        self.selection = selection;
    }

    pub fn elements(&self) -> &HashMap<ElementId, Element> {
        &self.elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Frame;

    fn rect(id: &str, z: i64) -> Element {
        let mut e = Element::with_id(id, Shape::Rectangle(Frame::new(Point::ZERO, 10.0, 10.0)));
        e.z_index = z;
        e
    }

    #[test]
    fn test_missing_ids_are_noops() {
        let mut store = ElementStore::new();
        assert!(!store.update("nope", ElementPatch::locked(true)));
        assert!(store.remove("nope").is_none());
        assert!(!store.reorder("nope", ZOrder::ToFront));
        store.select(["nope".to_string()], SelectMode::Replace);
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_locked_element_rejects_edits() {
        let mut store = ElementStore::new();
        store.add(rect("a", 0));
        store.update("a", ElementPatch::locked(true));

        let moved = Shape::Rectangle(Frame::new(Point::new(50.0, 50.0), 10.0, 10.0));
        assert!(!store.update("a", ElementPatch::shape(moved)));
        assert!(store.remove("a").is_none());
        assert_eq!(store.get("a").unwrap().shape.frame().unwrap().position, Point::ZERO);

        assert!(store.update("a", ElementPatch::locked(false)));
        assert!(store.remove("a").is_some());
    }

    #[test]
    fn test_reorder_to_front_and_back() {
        let mut store = ElementStore::new();
        store.add(rect("a", 3));
        store.add(rect("b", 7));
        store.add(rect("c", -2));

        store.reorder("a", ZOrder::ToFront);
        assert_eq!(store.get("a").unwrap().z_index, 8);
        store.reorder("b", ZOrder::ToBack);
        assert_eq!(store.get("b").unwrap().z_index, -3);

        let order: Vec<_> = store.ordered().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_ordered_ties_by_id() {
        let mut store = ElementStore::new();
        store.add(rect("b", 0));
        store.add(rect("a", 0));
        let order: Vec<_> = store.ordered().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_remove_prunes_selection() {
        let mut store = ElementStore::new();
        store.add(rect("a", 0));
        store.add(rect("b", 1));
        store.select(["a".to_string(), "b".to_string()], SelectMode::Replace);
        store.remove("a");
        assert!(!store.is_selected("a"));
        assert!(store.is_selected("b"));
    }

    #[test]
    fn test_elements_in_rect() {
        let mut store = ElementStore::new();
        store.add(rect("a", 0));
        let mut far = rect("far", 1);
        far.shape.translate(kurbo::Vec2::new(500.0, 500.0));
        store.add(far);
        assert_eq!(store.elements_in_rect(Rect::new(5.0, 5.0, 20.0, 20.0)), vec!["a".to_string()]);
    }
}
