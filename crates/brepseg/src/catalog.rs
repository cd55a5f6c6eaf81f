//! Category names and colors.
//!
//! A [`LabelCatalog`] is built once per label-mapping load and replaced
//! wholesale on reload. Category ids are positions in the catalog, so they
//! are always contiguous from zero.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};

/// An 8-bit RGB color. Serializes as `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Create a color from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels scaled into `0.0..=1.0`, as most render APIs expect.
    pub fn to_unit(self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

/// Colors assigned to categories in id order, cycled when there are more
/// categories than entries.
pub const DEFAULT_PALETTE: [Rgb; 10] = [
    Rgb::new(255, 0, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(0, 0, 255),
    Rgb::new(255, 255, 0),
    Rgb::new(255, 0, 255),
    Rgb::new(0, 255, 255),
    Rgb::new(255, 128, 0),
    Rgb::new(128, 0, 255),
    Rgb::new(0, 255, 128),
    Rgb::new(128, 255, 0),
];

/// Most gap ids a label mapping may leave for `Class <n>` placeholders.
pub const MAX_PLACEHOLDERS: usize = 1024;

/// A named, colored class a face can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Display name.
    pub name: String,
    /// Paint color.
    pub color: Rgb,
}

/// Ordered category list; the index of a category is its id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCatalog {
    categories: Vec<Category>,
}

impl LabelCatalog {
    /// Build a catalog from explicit categories.
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Build a catalog from names, coloring them from `palette`.
    ///
    /// An empty palette falls back to [`DEFAULT_PALETTE`].
    pub fn from_names<I, S>(names: I, palette: &[Rgb]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let palette = if palette.is_empty() {
            &DEFAULT_PALETTE[..]
        } else {
            palette
        };
        let categories = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Category {
                name: name.into(),
                color: palette[i % palette.len()],
            })
            .collect();
        Self { categories }
    }

    /// Parse a label-mapping document: a JSON object from string-encoded
    /// integer id to display name, e.g. `{"0": "hole", "1": "slot"}`.
    ///
    /// Ids missing below the largest key are filled with `Class <n>`; more than
    /// [`MAX_PLACEHOLDERS`] missing ids is an error.
    pub fn from_mapping_json(json: &str, palette: &[Rgb]) -> EngineResult<Self> {
        let raw: BTreeMap<String, String> =
            serde_json::from_str(json).map_err(|e| EngineError::LabelMapping(e.to_string()))?;

        let mut by_id = BTreeMap::new();
        for (key, name) in raw {
            let id: usize = key.trim().parse().map_err(|_| {
                EngineError::LabelMapping(format!("key '{key}' is not a non-negative integer"))
            })?;
            if by_id.insert(id, name).is_some() {
                return Err(EngineError::LabelMapping(format!("id {id} appears more than once")));
            }
        }

        let Some(&max_id) = by_id.keys().next_back() else {
            return Err(EngineError::LabelMapping("mapping has no entries".into()));
        };

        // keys are distinct and at most max_id, so len - 1 <= max_id
        let missing = max_id - (by_id.len() - 1);
        if missing > MAX_PLACEHOLDERS {
            return Err(EngineError::LabelMapping(format!(
                "id {max_id} would leave {missing} unnamed categories (at most {MAX_PLACEHOLDERS} allowed)"
            )));
        }
        if missing > 0 {
            warn!(missing, max_id, "label mapping has gaps, filling with placeholder names");
        }

        let names = (0..=max_id).map(|id| by_id.remove(&id).unwrap_or_else(|| format!("Class {id}")));
        Ok(Self::from_names(names, palette))
    }

    /// Load a label-mapping file from disk.
    pub fn load(path: impl AsRef<Path>, palette: &[Rgb]) -> EngineResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let catalog = Self::from_mapping_json(&json, palette)?;
        info!(path = %path.display(), categories = catalog.len(), "loaded label mapping");
        Ok(catalog)
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether the catalog has no categories.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Category by id.
    pub fn get(&self, id: usize) -> Option<&Category> {
        self.categories.get(id)
    }

    /// All categories in id order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Name of category `id`, or `Class <id>` if it is not in the catalog.
    pub fn name_or_placeholder(&self, id: usize) -> String {
        self.get(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("Class {id}"))
    }

    /// Clamp a raw inference label into `0..len`.
    ///
    /// Returns the clamped id and whether clamping changed it, or `None` if
    /// the catalog is empty.
    pub fn clamp(&self, raw: i64) -> Option<(usize, bool)> {
        let max = self.len().checked_sub(1)?;
        let clamped = raw.clamp(0, i64::try_from(max).unwrap_or(i64::MAX));
        // clamped is within 0..=max, so the conversion cannot fail
        let id = usize::try_from(clamped).unwrap_or(max);
        Some((id, clamped != raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_cycles() {
        let names: Vec<String> = (0..12).map(|i| format!("c{i}")).collect();
        let catalog = LabelCatalog::from_names(names, &DEFAULT_PALETTE);
        assert_eq!(catalog.len(), 12);
        assert_eq!(catalog.get(0).unwrap().color, Rgb::new(255, 0, 0));
        assert_eq!(catalog.get(10).unwrap().color, Rgb::new(255, 0, 0));
        assert_eq!(catalog.get(11).unwrap().color, Rgb::new(0, 255, 0));
    }

    #[test]
    fn test_mapping_orders_numerically() {
        let json = r#"{"10": "k", "2": "c", "0": "a", "1": "b"}"#;
        let catalog = LabelCatalog::from_mapping_json(json, &[]).unwrap();
        assert_eq!(catalog.len(), 11);
        assert_eq!(catalog.get(2).unwrap().name, "c");
        assert_eq!(catalog.get(3).unwrap().name, "Class 3");
        assert_eq!(catalog.get(10).unwrap().name, "k");
    }

    #[test]
    fn test_mapping_rejects_bad_keys() {
        assert!(LabelCatalog::from_mapping_json(r#"{"x": "a"}"#, &[]).is_err());
        assert!(LabelCatalog::from_mapping_json(r#"{"-1": "a"}"#, &[]).is_err());
        assert!(LabelCatalog::from_mapping_json(r#"{"0": "a", " 0": "b"}"#, &[]).is_err());
        assert!(LabelCatalog::from_mapping_json("{}", &[]).is_err());
        assert!(LabelCatalog::from_mapping_json("[1, 2]", &[]).is_err());
    }

    #[test]
    fn test_mapping_rejects_huge_ids() {
        let err = LabelCatalog::from_mapping_json(r#"{"18446744073709551615": "x"}"#, &[]).unwrap_err();
        assert!(matches!(err, EngineError::LabelMapping(_)));
        assert!(LabelCatalog::from_mapping_json(r#"{"0": "a", "4000000000": "b"}"#, &[]).is_err());

        let at_limit = format!(r#"{{"{}": "last"}}"#, MAX_PLACEHOLDERS);
        let catalog = LabelCatalog::from_mapping_json(&at_limit, &[]).unwrap();
        assert_eq!(catalog.len(), MAX_PLACEHOLDERS + 1);
        let over = format!(r#"{{"{}": "last"}}"#, MAX_PLACEHOLDERS + 1);
        assert!(LabelCatalog::from_mapping_json(&over, &[]).is_err());
    }

    #[test]
    fn test_clamp() {
        let catalog = LabelCatalog::from_names(["a", "b", "c"], &[]);
        assert_eq!(catalog.clamp(1), Some((1, false)));
        assert_eq!(catalog.clamp(-4), Some((0, true)));
        assert_eq!(catalog.clamp(3), Some((2, true)));
        assert_eq!(catalog.clamp(i64::MAX), Some((2, true)));
        assert_eq!(LabelCatalog::default().clamp(0), None);
    }

    #[test]
    fn test_rgb_serializes_as_triple() {
        let json = serde_json::to_string(&Rgb::new(1, 2, 3)).unwrap();
        assert_eq!(json, "[1,2,3]");
        let back: Rgb = serde_json::from_str("[255,128,0]").unwrap();
        assert_eq!(back, Rgb::new(255, 128, 0));
        assert_eq!(Rgb::new(255, 0, 0).to_unit(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_placeholder_name() {
        let catalog = LabelCatalog::from_names(["hole"], &[]);
        assert_eq!(catalog.name_or_placeholder(0), "hole");
        assert_eq!(catalog.name_or_placeholder(7), "Class 7");
    }
}
