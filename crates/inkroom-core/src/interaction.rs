//! Pointer-driven interaction engine.
//!
//! One explicit [`InteractionState`] is active at a time. Pointer presses are
//! dispatched on the current tool; moves apply live, non-committing updates to
//! the store; releases commit to history and return the intents peers need.

use crate::camera::Camera;
use crate::canvas::{ElementPatch, ElementStore, MutationIntent, ZOrder};
use crate::collaboration::SyncEvent;
use crate::geometry;
use crate::history::{History, diff};
use crate::input::{Key, KeyEvent, PointerEvent, Shortcut};
use crate::selection::{HandleKind, SelectMode, Selection, apply_resize, handle_tolerance, hit_test_handles};
use crate::shapes::{Element, ElementId, Shape, Stroke};
use crate::tools::{LaserTrails, ToolKind, ToolManager};
use kurbo::{Point, Rect};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// The single active interaction.
#[derive(Debug, Clone, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    /// A shape tool is dragging out a new element.
    Drawing { element_id: ElementId, start: Point },
    /// The hand tool is dragging the view. `last` is in screen space.
    Panning { last: Point },
    /// Selected elements follow the pointer.
    Moving {
        start: Point,
        originals: HashMap<ElementId, Element>,
    },
    /// A resize handle is being dragged.
    Resizing { original: Element, handle: HandleKind },
    /// A selection rectangle is being dragged over empty space.
    MarqueeSelecting {
        start: Point,
        current: Point,
        base: Selection,
    },
    /// Eraser stroke. Each element is erased at most once per stroke.
    Erasing {
        erased: HashSet<ElementId>,
        trail: Stroke,
    },
    /// Laser stroke in progress; never touches the store.
    LaserDrawing { stroke: Stroke, started: Instant },
    /// Typing into a freshly placed text element.
    TextEditing { element_id: ElementId },
}

impl InteractionState {
    pub fn name(&self) -> &'static str {
        match self {
            InteractionState::Idle => "idle",
            InteractionState::Drawing { .. } => "drawing",
            InteractionState::Panning { .. } => "panning",
            InteractionState::Moving { .. } => "moving",
            InteractionState::Resizing { .. } => "resizing",
            InteractionState::MarqueeSelecting { .. } => "marquee-selecting",
            InteractionState::Erasing { .. } => "erasing",
            InteractionState::LaserDrawing { .. } => "laser-drawing",
            InteractionState::TextEditing { .. } => "text-editing",
        }
    }
}

/// Interaction engine: tools, camera, history and the laser collection.
#[derive(Debug, Default)]
pub struct Interaction {
    state: InteractionState,
    pub tools: ToolManager,
    pub camera: Camera,
    history: History,
    laser: LaserTrails,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Switch tools. Finishes any text being edited.
    pub fn set_tool(&mut self, store: &mut ElementStore, tool: ToolKind) -> Vec<MutationIntent> {
        let intents = self.finish_text_editing(store);
        self.tools.set_tool(tool);
        intents
    }

    pub fn pointer_down(&mut self, store: &mut ElementStore, event: PointerEvent) -> Vec<MutationIntent> {
        let mut intents = self.finish_text_editing(store);
        if !matches!(self.state, InteractionState::Idle) {
            return intents;
        }
        let world = self.camera.screen_to_world(event.position);
        let shift = event.modifiers.shift;

        self.state = match self.tools.current_tool {
            ToolKind::Select => self.press_select(store, world, shift),
            ToolKind::Hand => InteractionState::Panning {
                last: event.position,
            },
            ToolKind::Eraser => {
                let mut erased = HashSet::new();
                intents.extend(self.erase_at(store, world, &mut erased));
                InteractionState::Erasing {
                    erased,
                    trail: Stroke::starting_at(world),
                }
            }
            ToolKind::Laser => InteractionState::LaserDrawing {
                stroke: Stroke::starting_at(world),
                started: event.time,
            },
            ToolKind::Text => match self.tools.create_element(world, world) {
                Some(mut element) => {
                    element.z_index = store.next_z_index();
                    let element_id = element.id.clone();
                    store.add(element);
                    store.select([element_id.clone()], SelectMode::Replace);
                    InteractionState::TextEditing { element_id }
                }
                None => InteractionState::Idle,
            },
            tool if tool.is_shape_tool() => match self.tools.create_element(world, world) {
                Some(mut element) => {
                    element.z_index = store.next_z_index();
                    let element_id = element.id.clone();
                    store.add(element);
                    InteractionState::Drawing {
                        element_id,
                        start: world,
                    }
                }
                None => InteractionState::Idle,
            },
            _ => InteractionState::Idle,
        };
        log::debug!("pointer down -> {}", self.state.name());
        intents
    }

    fn press_select(&mut self, store: &mut ElementStore, world: Point, shift: bool) -> InteractionState {
        let tolerance = handle_tolerance(self.camera.zoom);
        for element in store.selected().into_iter().rev() {
            if element.locked {
                continue;
            }
            if let Some(handle) = hit_test_handles(element, world, tolerance) {
                return InteractionState::Resizing {
                    original: element.clone(),
                    handle,
                };
            }
        }

        match store.pick_topmost(world).map(|e| e.id.clone()) {
            Some(id) => {
                if shift {
                    store.select([id.clone()], SelectMode::Toggle);
                    if !store.is_selected(&id) {
                        return InteractionState::Idle;
                    }
                } else if !store.is_selected(&id) {
                    store.select([id], SelectMode::Replace);
                }
                let originals = store
                    .selected()
                    .into_iter()
                    .filter(|e| !e.locked)
                    .map(|e| (e.id.clone(), e.clone()))
                    .collect();
                InteractionState::Moving {
                    start: world,
                    originals,
                }
            }
            None => {
                let base = if shift {
                    store.selection().clone()
                } else {
                    store.clear_selection();
                    Selection::new()
                };
                InteractionState::MarqueeSelecting {
                    start: world,
                    current: world,
                    base,
                }
            }
        }
    }

    /// Apply live feedback for a drag. Only eraser hits produce intents.
    pub fn pointer_move(&mut self, store: &mut ElementStore, event: PointerEvent) -> Vec<MutationIntent> {
        let world = self.camera.screen_to_world(event.position);
        let mut state = std::mem::take(&mut self.state);
        let mut intents = Vec::new();

        match &mut state {
            InteractionState::Idle | InteractionState::TextEditing { .. } => {}
            InteractionState::Drawing { element_id, start } => {
                if let Some(element) = store.get(element_id) {
                    let mut shape = element.shape.clone();
                    if let Shape::Freehand(stroke) = &mut shape {
                        if stroke.points.last() != Some(&world) {
                            stroke.add_point(world);
                        }
                    } else if let Some(resized) = self.tools.create_shape(*start, world) {
                        shape = resized;
                    }
                    store.update(element_id, ElementPatch::shape(shape));
                }
            }
            InteractionState::Panning { last } => {
                self.camera.pan_by(event.position - *last);
                *last = event.position;
            }
            InteractionState::Moving { start, originals } => {
                let delta = world - *start;
                for original in originals.values() {
                    if !store.contains(&original.id) {
                        continue;
                    }
                    let mut moved = original.clone();
                    moved.shape.translate(delta);
                    store.put(moved);
                }
            }
            InteractionState::Resizing { original, handle } => {
                if store.contains(&original.id) {
                    store.put(apply_resize(original, *handle, world));
                }
            }
            InteractionState::MarqueeSelecting { start, current, base } => {
                *current = world;
                let hits = store.elements_in_rect(Rect::from_points(*start, *current));
                store.select(base.iter().cloned(), SelectMode::Replace);
                store.select(hits, SelectMode::Add);
            }
            InteractionState::Erasing { erased, trail } => {
                trail.add_point(world);
                intents = self.erase_at(store, world, erased);
            }
            InteractionState::LaserDrawing { stroke, .. } => stroke.add_point(world),
        }

        self.state = state;
        intents
    }

    /// Finish the gesture: commit its result and return to idle.
    pub fn pointer_up(&mut self, store: &mut ElementStore, event: PointerEvent) -> Vec<MutationIntent> {
        let mut intents = self.pointer_move(store, event);

        match std::mem::take(&mut self.state) {
            InteractionState::Drawing { element_id, .. } => {
                intents.extend(self.commit_new_element(store, &element_id));
            }
            InteractionState::Moving { originals, .. } => {
                let changed: Vec<Element> = originals
                    .iter()
                    .filter_map(|(id, original)| store.get(id).filter(|now| *now != original).cloned())
                    .collect();
                if !changed.is_empty() {
                    self.history.commit(store);
                    intents.extend(changed.into_iter().map(MutationIntent::Update));
                }
            }
            InteractionState::Resizing { original, .. } => {
                if let Some(now) = store.get(&original.id).filter(|now| **now != original).cloned() {
                    self.history.commit(store);
                    intents.push(MutationIntent::Update(now));
                }
            }
            InteractionState::LaserDrawing { stroke, started } => {
                self.laser.push(stroke, started);
            }
            editing @ InteractionState::TextEditing { .. } => self.state = editing,
            InteractionState::Idle
            | InteractionState::Panning { .. }
            | InteractionState::MarqueeSelecting { .. }
            | InteractionState::Erasing { .. } => {}
        }
        intents
    }

    /// Keep a freshly drawn element, or drop it if degenerate.
    fn commit_new_element(&mut self, store: &mut ElementStore, id: &str) -> Vec<MutationIntent> {
        let Some(element) = store.get(id).cloned() else {
            return Vec::new();
        };
        if element.is_degenerate() {
            log::debug!("discarding degenerate {} {}", element.kind(), element.id);
            store.remove_unchecked(id);
            return Vec::new();
        }
        store.select([element.id.clone()], SelectMode::Replace);
        self.history.commit(store);
        if !self.tools.tool_lock {
            self.tools.set_tool(ToolKind::Select);
        }
        vec![MutationIntent::Create(element)]
    }

    /// Remove every not-yet-erased, unlocked element hit at `point`.
    /// Each removal is its own history entry.
    fn erase_at(
        &mut self,
        store: &mut ElementStore,
        point: Point,
        erased: &mut HashSet<ElementId>,
    ) -> Vec<MutationIntent> {
        let hits: Vec<ElementId> = store
            .ordered()
            .into_iter()
            .rev()
            .filter(|e| !e.locked && !erased.contains(&e.id) && geometry::hit_test(point, e))
            .map(|e| e.id.clone())
            .collect();

        let mut intents = Vec::new();
        for id in hits {
            if store.remove(&id).is_some() {
                erased.insert(id.clone());
                self.history.commit(store);
                intents.push(MutationIntent::Delete(id));
            }
        }
        intents
    }

    pub fn key_down(&mut self, store: &mut ElementStore, event: KeyEvent) -> Vec<MutationIntent> {
        if let InteractionState::TextEditing { .. } = self.state {
            if !event.modifiers.command() {
                match event.key {
                    Key::Char(c) => {
                        self.type_text(store, c.encode_utf8(&mut [0; 4]));
                        return Vec::new();
                    }
                    Key::Enter => {
                        self.type_text(store, "\n");
                        return Vec::new();
                    }
                    Key::Backspace => {
                        self.edit_text(store, |t| {
                            t.pop_char();
                        });
                        return Vec::new();
                    }
                    Key::Delete => return Vec::new(),
                    Key::Escape => {}
                }
            }
        }

        let Some(shortcut) = event.shortcut() else {
            return Vec::new();
        };
        match shortcut {
            Shortcut::Undo => self.undo(store),
            Shortcut::Redo => self.redo(store),
            Shortcut::Cancel => self.cancel(store),
            Shortcut::DeleteSelection => {
                let mut intents = self.finish_text_editing(store);
                intents.extend(self.delete_selection(store));
                intents
            }
            Shortcut::BringToFront => self.reorder_selection(store, ZOrder::ToFront),
            Shortcut::SendToBack => self.reorder_selection(store, ZOrder::ToBack),
        }
    }

    /// Append typed text to the element being edited.
    pub fn type_text(&mut self, store: &mut ElementStore, s: &str) {
        self.edit_text(store, |t| t.push_str(s));
    }

    fn edit_text(&mut self, store: &mut ElementStore, edit: impl FnOnce(&mut crate::shapes::Text)) {
        let InteractionState::TextEditing { element_id } = &self.state else {
            return;
        };
        if let Some(mut shape) = store.get(element_id).map(|e| e.shape.clone()) {
            if let Shape::Text(text) = &mut shape {
                edit(text);
            }
            store.update(element_id, ElementPatch::shape(shape));
        }
    }

    /// Leave text editing. Empty text is discarded, anything else is committed.
    pub fn finish_text_editing(&mut self, store: &mut ElementStore) -> Vec<MutationIntent> {
        match std::mem::take(&mut self.state) {
            InteractionState::TextEditing { element_id } => self.commit_new_element(store, &element_id),
            other => {
                self.state = other;
                Vec::new()
            }
        }
    }

    /// Abort the active gesture, restoring original geometry without history.
    pub fn cancel(&mut self, store: &mut ElementStore) -> Vec<MutationIntent> {
        match std::mem::take(&mut self.state) {
            InteractionState::Drawing { element_id, .. } => {
                store.remove_unchecked(&element_id);
            }
            InteractionState::Moving { originals, .. } => {
                for (id, original) in originals {
                    if store.contains(&id) {
                        store.put(original);
                    }
                }
            }
            InteractionState::Resizing { original, .. } => {
                if store.contains(&original.id) {
                    store.put(original);
                }
            }
            InteractionState::MarqueeSelecting { base, .. } => {
                store.select(base.iter().cloned(), SelectMode::Replace);
            }
            editing @ InteractionState::TextEditing { .. } => {
                self.state = editing;
                return self.finish_text_editing(store);
            }
            InteractionState::Idle
            | InteractionState::Panning { .. }
            | InteractionState::Erasing { .. }
            | InteractionState::LaserDrawing { .. } => {}
        }
        Vec::new()
    }

    /// Undo the last commit, returning the intents that bring peers along.
    pub fn undo(&mut self, store: &mut ElementStore) -> Vec<MutationIntent> {
        let mut intents = self.cancel(store);
        let before = store.elements().clone();
        if self.history.undo(store) {
            intents.extend(diff(&before, store.elements()));
        }
        intents
    }

    pub fn redo(&mut self, store: &mut ElementStore) -> Vec<MutationIntent> {
        let mut intents = self.cancel(store);
        let before = store.elements().clone();
        if self.history.redo(store) {
            intents.extend(diff(&before, store.elements()));
        }
        intents
    }

    /// Fold sync events into history.
    ///
    /// Peer changes are written into every snapshot so a local undo never
    /// reverts or deletes them. A hydration rebases the history so undo
    /// cannot reach before the snapshot.
    pub fn apply_sync_events(&mut self, store: &ElementStore, events: &[SyncEvent]) {
        for event in events {
            match event {
                SyncEvent::PeerCreated(id) | SyncEvent::PeerUpdated(id) => {
                    if let Some(element) = store.get(id) {
                        self.history.track_remote_put(element);
                    }
                }
                SyncEvent::PeerDeleted(id) => self.history.track_remote_remove(id),
                SyncEvent::Hydrated { .. } => self.history.rebase(store),
                SyncEvent::Opened | SyncEvent::Closed | SyncEvent::Rejected(_) => {}
            }
        }
    }

    /// Delete the selected, unlocked elements as one commit.
    pub fn delete_selection(&mut self, store: &mut ElementStore) -> Vec<MutationIntent> {
        if !matches!(self.state, InteractionState::Idle) {
            return Vec::new();
        }
        let ids: Vec<ElementId> = store.selection().iter().cloned().collect();
        let intents: Vec<MutationIntent> = ids
            .into_iter()
            .filter(|id| store.remove(id).is_some())
            .map(MutationIntent::Delete)
            .collect();
        if !intents.is_empty() {
            self.history.commit(store);
        }
        intents
    }

    /// Reorder the selection as one commit, preserving its relative order.
    pub fn reorder_selection(&mut self, store: &mut ElementStore, target: ZOrder) -> Vec<MutationIntent> {
        if !matches!(self.state, InteractionState::Idle) {
            return Vec::new();
        }
        let mut ids: Vec<ElementId> = store.selected().into_iter().map(|e| e.id.clone()).collect();
        if target == ZOrder::ToBack {
            ids.reverse();
        }
        let mut intents = Vec::new();
        for id in ids {
            if !store.reorder(&id, target) {
                continue;
            }
            if let Some(element) = store.get(&id) {
                intents.push(MutationIntent::Update(element.clone()));
            }
        }
        if !intents.is_empty() {
            self.history.commit(store);
        }
        intents
    }

    /// Place an externally produced element (image, embed) on top and commit it.
    pub fn insert_element(&mut self, store: &mut ElementStore, mut element: Element) -> Vec<MutationIntent> {
        element.z_index = store.next_z_index();
        store.add(element.clone());
        store.select([element.id.clone()], SelectMode::Replace);
        self.history.commit(store);
        vec![MutationIntent::Create(element)]
    }

    /// The current eraser stroke as a transient element, for rendering.
    pub fn eraser_trail(&self) -> Option<Element> {
        match &self.state {
            InteractionState::Erasing { trail, .. } => {
                Some(Element::with_id("eraser-trail", Shape::EraserStroke(trail.clone())))
            }
            _ => None,
        }
    }

    /// The laser stroke being drawn right now, if any.
    pub fn live_laser(&self) -> Option<Element> {
        match &self.state {
            InteractionState::LaserDrawing { stroke, .. } => {
                Some(Element::with_id("laser-live", Shape::LaserStroke(stroke.clone())))
            }
            _ => None,
        }
    }

    /// Finished laser trails. Call [`LaserTrails::prune`] each frame.
    pub fn laser_trails(&mut self) -> &mut LaserTrails {
        &mut self.laser
    }
}
