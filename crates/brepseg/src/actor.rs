//! Renderable actors, one per bound face.
//!
//! [`ActorRegistry`] owns every actor created through its [`RenderBackend`]
//! and keeps them index-aligned with the [`FaceRecord`]s they were built
//! from: entry `i` always paints face `i`. All paint changes go through the
//! registry so the recorded paint state and the backend never disagree.

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use tracing::debug;

use crate::binder::FaceRecord;
use crate::catalog::{LabelCatalog, Rgb};
use crate::error::{EngineError, EngineResult};
use crate::geometry::FaceHandle;

/// Color plus transparency (`0.0` opaque, `1.0` invisible).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Paint {
    /// Surface color.
    pub color: Rgb,
    /// Transparency in `0.0..=1.0`.
    pub transparency: f32,
}

impl Paint {
    /// Fully opaque paint.
    pub const fn opaque(color: Rgb) -> Self {
        Self {
            color,
            transparency: 0.0,
        }
    }
}

/// Dimmed paints used when faces are pushed into the background.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayStyle {
    /// Paint for hidden categories and for everything outside an isolated
    /// category.
    pub dimmed: Paint,
    /// Paint for every face except the selected one.
    pub selection_dimmed: Paint,
}

impl Default for DisplayStyle {
    fn default() -> Self {
        Self {
            dimmed: Paint {
                color: Rgb::new(255, 255, 255),
                transparency: 0.7,
            },
            selection_dimmed: Paint {
                color: Rgb::new(150, 150, 150),
                transparency: 0.8,
            },
        }
    }
}

/// Presentation-side collaborator that owns the actual renderable resources.
pub trait RenderBackend {
    /// Handle to one renderable actor.
    type Actor;

    /// Create an actor showing `face` with `paint`.
    fn create_actor(&mut self, face: &FaceHandle, paint: Paint) -> EngineResult<Self::Actor>;

    /// Repaint an existing actor.
    fn set_paint(&mut self, actor: &Self::Actor, paint: Paint);

    /// Destroy an actor and free its resources.
    fn release_actor(&mut self, actor: Self::Actor);

    /// Flush pending paint changes to the screen. Called once per registry
    /// operation.
    fn refresh(&mut self) {}
}

/// Registry bookkeeping for one actor.
#[derive(Debug)]
pub struct ActorEntry<A> {
    /// Face this actor shows.
    pub face_index: usize,
    /// Category the face was bound to.
    pub category_id: usize,
    /// Whether the face is currently shown in its category color.
    pub visible: bool,
    /// Whether the face is the current selection.
    pub highlighted: bool,
    paint: Paint,
    actor: A,
}

impl<A> ActorEntry<A> {
    /// Paint last applied to this actor.
    pub fn paint(&self) -> Paint {
        self.paint
    }

    /// The backend handle.
    pub fn actor(&self) -> &A {
        &self.actor
    }
}

/// Owns exactly one live actor set at a time.
pub struct ActorRegistry<B: RenderBackend> {
    backend: B,
    style: DisplayStyle,
    colors: Vec<Rgb>,
    entries: Vec<ActorEntry<B::Actor>>,
}

impl<B: RenderBackend> ActorRegistry<B> {
    /// Create an empty registry drawing through `backend`.
    pub fn new(backend: B, style: DisplayStyle) -> Self {
        Self {
            backend,
            style,
            colors: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Release all actors, then create one per record in its category color.
    ///
    /// If the backend fails part way, the actors created so far are released
    /// and the registry is left empty.
    pub fn rebuild(&mut self, records: &[FaceRecord], catalog: &LabelCatalog) -> EngineResult<()> {
        self.clear();
        self.colors = catalog.categories().iter().map(|c| c.color).collect();

        let mut entries = Vec::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if record.face_index != position {
                self.release_all(entries);
                return Err(EngineError::Render(format!(
                    "record {position} carries face index {}",
                    record.face_index
                )));
            }
            let Some(&color) = self.colors.get(record.category_id) else {
                self.release_all(entries);
                return Err(EngineError::Render(format!(
                    "face {position} has category {} outside the catalog",
                    record.category_id
                )));
            };
            let paint = Paint::opaque(color);
            match self.backend.create_actor(&record.face, paint) {
                Ok(actor) => entries.push(ActorEntry {
                    face_index: record.face_index,
                    category_id: record.category_id,
                    visible: true,
                    highlighted: false,
                    paint,
                    actor,
                }),
                Err(e) => {
                    self.release_all(entries);
                    return Err(e);
                }
            }
        }

        self.entries = entries;
        self.backend.refresh();
        debug!(actors = self.entries.len(), "rebuilt actor set");
        Ok(())
    }

    /// Release every actor.
    pub fn clear(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        if !entries.is_empty() {
            self.release_all(entries);
            self.backend.refresh();
        }
    }

    /// Show or hide every face of `category_id`. Other faces are untouched.
    pub fn set_category_visible(&mut self, category_id: usize, visible: bool) {
        let Some(&color) = self.colors.get(category_id) else {
            return;
        };
        let paint = if visible {
            Paint::opaque(color)
        } else {
            self.style.dimmed
        };
        for i in 0..self.entries.len() {
            if self.entries[i].category_id == category_id {
                self.entries[i].visible = visible;
                self.apply(i, paint);
            }
        }
        self.backend.refresh();
    }

    /// Show `category_id` in full color and dim every other face.
    pub fn isolate_category(&mut self, category_id: usize) {
        for i in 0..self.entries.len() {
            let entry = &self.entries[i];
            let matches = entry.category_id == category_id;
            let paint = if matches {
                self.natural_paint(entry.category_id)
            } else {
                self.style.dimmed
            };
            let entry = &mut self.entries[i];
            entry.visible = matches;
            entry.highlighted = false;
            self.apply(i, paint);
        }
        self.backend.refresh();
    }

    /// Dim every face except `face_index`, which keeps its category color.
    ///
    /// Does nothing if `face_index` is not a displayed face; a stale
    /// selection from a previous model is expected here.
    pub fn select_face(&mut self, face_index: usize) {
        if face_index >= self.entries.len() {
            debug!(face_index, actors = self.entries.len(), "ignoring stale face selection");
            return;
        }
        let dim = self.style.selection_dimmed;
        for i in 0..self.entries.len() {
            let selected = i == face_index;
            let paint = if selected {
                self.natural_paint(self.entries[i].category_id)
            } else {
                dim
            };
            self.entries[i].highlighted = selected;
            self.apply(i, paint);
        }
        self.backend.refresh();
    }

    /// Put every face back in its category color.
    pub fn show_all(&mut self) {
        for i in 0..self.entries.len() {
            let paint = self.natural_paint(self.entries[i].category_id);
            let entry = &mut self.entries[i];
            entry.visible = true;
            entry.highlighted = false;
            self.apply(i, paint);
        }
        self.backend.refresh();
    }

    /// Current paint per face, in face order.
    pub fn paint_state(&self) -> Vec<Paint> {
        self.entries.iter().map(|e| e.paint).collect()
    }

    /// All entries in face order.
    pub fn entries(&self) -> &[ActorEntry<B::Actor>] {
        &self.entries
    }

    /// Number of live actors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no actors are live.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paints used for dimming.
    pub fn style(&self) -> &DisplayStyle {
        &self.style
    }

    /// The render backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn natural_paint(&self, category_id: usize) -> Paint {
        // entries only hold ids that were checked against `colors` in rebuild
        self.colors
            .get(category_id)
            .map(|&c| Paint::opaque(c))
            .unwrap_or(self.style.dimmed)
    }

    fn apply(&mut self, index: usize, paint: Paint) {
        let entry = &mut self.entries[index];
        entry.paint = paint;
        self.backend.set_paint(&entry.actor, paint);
    }

    fn release_all(&mut self, entries: Vec<ActorEntry<B::Actor>>) {
        for entry in entries {
            self.backend.release_actor(entry.actor);
        }
    }
}

impl<B: RenderBackend> Drop for ActorRegistry<B> {
    fn drop(&mut self) {
        self.clear();
    }
}

new_key_type! {
    /// Key of an actor inside a [`PaintBuffer`].
    pub struct ActorKey;
}

/// A face as the [`PaintBuffer`] last painted it.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedActor {
    /// Face entity id.
    pub entity_id: u64,
    /// Current paint.
    pub paint: Paint,
}

/// In-memory render backend.
///
/// Records paint state without drawing anything. Used headless (batch and
/// CLI) and by tests to observe what a real viewer would show.
#[derive(Debug, Default)]
pub struct PaintBuffer {
    actors: SlotMap<ActorKey, BufferedActor>,
    refreshes: usize,
}

impl PaintBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live actors.
    pub fn live_actors(&self) -> usize {
        self.actors.len()
    }

    /// Actor by key, if still live.
    pub fn get(&self, key: ActorKey) -> Option<&BufferedActor> {
        self.actors.get(key)
    }

    /// How many times the registry flushed paint changes.
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }
}

impl RenderBackend for PaintBuffer {
    type Actor = ActorKey;

    fn create_actor(&mut self, face: &FaceHandle, paint: Paint) -> EngineResult<ActorKey> {
        Ok(self.actors.insert(BufferedActor {
            entity_id: face.entity_id,
            paint,
        }))
    }

    fn set_paint(&mut self, actor: &ActorKey, paint: Paint) {
        if let Some(a) = self.actors.get_mut(*actor) {
            a.paint = paint;
        }
    }

    fn release_actor(&mut self, actor: ActorKey) {
        self.actors.remove(actor);
    }

    fn refresh(&mut self) {
        self.refreshes += 1;
    }
}
