//! User intents over the actor registry.
//!
//! There is no stored "current mode": what the user sees is the
//! registry's paint state, and each intent is applied on top of it. The only
//! state kept here is the checkbox row, which belongs to the presentation
//! and is needed to tell which checkboxes changed.

use tracing::debug;

use crate::actor::{ActorRegistry, RenderBackend};

/// Something the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// A category checkbox was set.
    ToggleCategory {
        /// Category behind the checkbox.
        category_id: usize,
        /// New checkbox state.
        checked: bool,
    },
    /// A category button was clicked.
    IsolateCategory(usize),
    /// A face was clicked in the face list.
    SelectFace(usize),
    /// Return every face to its category color.
    ShowAll,
}

/// Translates [`Intent`]s into [`ActorRegistry`] mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityController {
    checked: Vec<bool>,
}

impl VisibilityController {
    /// Controller with `category_count` checked checkboxes.
    pub fn new(category_count: usize) -> Self {
        Self {
            checked: vec![true; category_count],
        }
    }

    /// Recreate the checkbox row after a catalog reload.
    pub fn reset(&mut self, category_count: usize) {
        self.checked = vec![true; category_count];
    }

    /// Checkbox state per category.
    pub fn checkboxes(&self) -> &[bool] {
        &self.checked
    }

    /// Apply one intent.
    pub fn apply<B: RenderBackend>(&mut self, registry: &mut ActorRegistry<B>, intent: Intent) {
        debug!(?intent, "applying visibility intent");
        match intent {
            Intent::ToggleCategory {
                category_id,
                checked,
            } => {
                self.toggle_category(registry, category_id, checked);
            }
            Intent::IsolateCategory(id) => registry.isolate_category(id),
            Intent::SelectFace(index) => registry.select_face(index),
            Intent::ShowAll => {
                self.checked.iter_mut().for_each(|c| *c = true);
                registry.show_all();
            }
        }
    }

    /// Set one checkbox. Returns whether it changed; the registry is only
    /// touched when it did.
    pub fn toggle_category<B: RenderBackend>(
        &mut self,
        registry: &mut ActorRegistry<B>,
        category_id: usize,
        checked: bool,
    ) -> bool {
        let Some(slot) = self.checked.get_mut(category_id) else {
            return false;
        };
        if *slot == checked {
            return false;
        }
        *slot = checked;
        registry.set_category_visible(category_id, checked);
        true
    }

    /// Set the whole checkbox row at once. Each checkbox is compared on its
    /// own and only the changed ones are applied. Returns how many changed.
    ///
    /// Entries beyond the catalog are ignored; missing entries keep their
    /// current state.
    pub fn set_checkboxes<B: RenderBackend>(
        &mut self,
        registry: &mut ActorRegistry<B>,
        states: &[bool],
    ) -> usize {
        states
            .iter()
            .enumerate()
            .filter(|&(id, &checked)| self.toggle_category(registry, id, checked))
            .count()
    }
}
