//! Bounded undo/redo over element store snapshots.

use crate::canvas::{ElementStore, MutationIntent};
use crate::selection::Selection;
use crate::shapes::{Element, ElementId};
use std::collections::{HashMap, VecDeque};

/// Maximum number of undo states to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

/// Immutable state captured after a committing mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub elements: HashMap<ElementId, Element>,
    pub selection: Selection,
}

impl Snapshot {
    pub fn capture(store: &ElementStore) -> Self {
        let (elements, selection) = store.snapshot();
        Self { elements, selection }
    }

    fn restore_into(&self, store: &mut ElementStore) {
        store.restore(self.elements.clone(), self.selection.clone());
    }
}

/// Undo history.
///
/// `entries[cursor - 1]` is the current state; `cursor == 0` means the
/// baseline. Entries past the cap fold into the baseline.
#[derive(Debug, Clone)]
pub struct History {
    baseline: Snapshot,
    entries: VecDeque<Snapshot>,
    cursor: usize,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_capacity(MAX_UNDO_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            baseline: Snapshot::default(),
            entries: VecDeque::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Record the store's current state, discarding any redo entries.
    pub fn commit(&mut self, store: &ElementStore) {
        self.entries.truncate(self.cursor);
        self.entries.push_back(Snapshot::capture(store));
        if self.entries.len() > self.capacity {
            if let Some(oldest) = self.entries.pop_front() {
                self.baseline = oldest;
            }
        }
        self.cursor = self.entries.len();
    }

    /// Step back one entry and restore it. Returns false if nothing to undo.
    pub fn undo(&mut self, store: &mut ElementStore) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.current().restore_into(store);
        true
    }

    /// Step forward one entry if available.
    pub fn redo(&mut self, store: &mut ElementStore) -> bool {
        if self.cursor >= self.entries.len() {
            return false;
        }
        self.cursor += 1;
        self.current().restore_into(store);
        true
    }

    /// Forget all entries and make the store's state the new baseline.
    pub fn rebase(&mut self, store: &ElementStore) {
        self.baseline = Snapshot::capture(store);
        self.entries.clear();
        self.cursor = 0;
    }

    /// Write a peer's element into every snapshot so undo and redo leave it
    /// alone.
    pub fn track_remote_put(&mut self, element: &Element) {
        for snapshot in self.snapshots_mut() {
            snapshot.elements.insert(element.id.clone(), element.clone());
        }
    }

    /// Drop a peer-deleted element from every snapshot.
    pub fn track_remote_remove(&mut self, id: &str) {
        for snapshot in self.snapshots_mut() {
            snapshot.elements.remove(id);
            snapshot.selection.remove(id);
        }
    }

    fn snapshots_mut(&mut self) -> impl Iterator<Item = &mut Snapshot> {
        std::iter::once(&mut self.baseline).chain(self.entries.iter_mut())
    }

    fn current(&self) -> &Snapshot {
        match self.cursor {
            0 => &self.baseline,
            n => &self.entries[n - 1],
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Intents that turn the `before` element set into `after`, sorted by id.
pub fn diff(
    before: &HashMap<ElementId, Element>,
    after: &HashMap<ElementId, Element>,
) -> Vec<MutationIntent> {
    let mut out = Vec::new();
    for (id, element) in after {
        match before.get(id) {
            None => out.push(MutationIntent::Create(element.clone())),
            Some(old) if old != element => out.push(MutationIntent::Update(element.clone())),
            Some(_) => {}
        }
    }
    for id in before.keys() {
        if !after.contains_key(id) {
            out.push(MutationIntent::Delete(id.clone()));
        }
    }
    out.sort_by(|a, b| a.id().cmp(b.id()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Frame, Shape};
    use kurbo::Point;

    fn rect(id: &str, x: f64) -> Element {
        Element::with_id(id, Shape::Rectangle(Frame::new(Point::new(x, 0.0), 10.0, 10.0)))
    }

    #[test]
    fn test_undo_to_empty_baseline() {
        let mut store = ElementStore::new();
        let mut history = History::new();
        store.add(rect("a", 0.0));
        history.commit(&store);

        assert!(history.undo(&mut store));
        assert!(store.is_empty());
        assert!(!history.undo(&mut store));
        assert!(history.redo(&mut store));
        assert!(store.contains("a"));
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut store = ElementStore::new();
        let mut history = History::new();
        for i in 0..10 {
            store.add(rect(&format!("e{i}"), i as f64));
            history.commit(&store);
        }
        let expected = store.snapshot().0;

        for _ in 0..10 {
            assert!(history.undo(&mut store));
        }
        assert!(store.is_empty());
        for _ in 0..10 {
            assert!(history.redo(&mut store));
        }
        assert_eq!(store.snapshot().0, expected);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_commit_truncates_redo() {
        let mut store = ElementStore::new();
        let mut history = History::new();
        store.add(rect("a", 0.0));
        history.commit(&store);
        store.add(rect("b", 0.0));
        history.commit(&store);

        history.undo(&mut store);
        store.add(rect("c", 0.0));
        history.commit(&store);
        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_cap_discards_oldest() {
        let mut store = ElementStore::new();
        let mut history = History::with_capacity(3);
        for i in 0..5 {
            store.add(rect(&format!("e{i}"), 0.0));
            history.commit(&store);
        }
        assert_eq!(history.len(), 3);
        while history.undo(&mut store) {}
        // Baseline is the oldest discarded entry: e0 and e1 remain.
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_rebase_blocks_undo_past_hydration() {
        let mut store = ElementStore::new();
        let mut history = History::new();
        store.add(rect("hydrated", 0.0));
        history.rebase(&store);
        assert!(!history.undo(&mut store));
        assert!(store.contains("hydrated"));
    }

    #[test]
    fn test_diff_emits_minimal_intents() {
        let mut before = HashMap::new();
        before.insert("keep".to_string(), rect("keep", 0.0));
        before.insert("moved".to_string(), rect("moved", 0.0));
        before.insert("gone".to_string(), rect("gone", 0.0));
        let mut after = before.clone();
        after.remove("gone");
        after.insert("moved".to_string(), rect("moved", 5.0));
        after.insert("new".to_string(), rect("new", 0.0));

        let intents = diff(&before, &after);
        assert_eq!(
            intents,
            vec![
                MutationIntent::Delete("gone".to_string()),
                MutationIntent::Update(rect("moved", 5.0)),
                MutationIntent::Create(rect("new", 0.0)),
            ]
        );
    }

    #[test]
    fn test_remote_changes_survive_undo_redo() {
        let mut store = ElementStore::new();
        let mut history = History::new();
        store.add(rect("local", 0.0));
        history.commit(&store);

        let peer = rect("peer", 50.0);
        store.put(peer.clone());
        history.track_remote_put(&peer);
        let expected = store.snapshot().0;

        assert!(history.undo(&mut store));
        assert!(store.contains("peer"));
        assert!(!store.contains("local"));
        assert!(history.redo(&mut store));
        assert_eq!(store.snapshot().0, expected);

        store.remove_unchecked("peer");
        history.track_remote_remove("peer");
        history.undo(&mut store);
        assert!(!store.contains("peer"));
    }
}
