//! Interactive segmentation workflow.
//!
//! A [`Session`] is the state behind one viewer window: which model, label
//! mapping and geometry are loaded, the bound records, and the actors
//! showing them. It holds no presentation framework types; a UI layer
//! renders [`Session::face_list`] and [`Session::legend`] and feeds user
//! actions back as [`Intent`]s.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::actor::{ActorRegistry, RenderBackend};
use crate::binder::{BindReport, FaceRecord, LabelBinder};
use crate::catalog::{LabelCatalog, Rgb};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::export::{self, ExportFormat, ExportMeta};
use crate::geometry::{FaceEnumerator, GeometryLoader};
use crate::inference::{InferenceBackend, InferenceRequest};
use crate::stats::CategoryStats;
use crate::visibility::{Intent, VisibilityController};

/// One row of the face list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceListEntry {
    /// Face this row selects.
    pub face_index: usize,
    /// Category of the face.
    pub category_id: usize,
    /// `Face <n>: <category>`, one-based.
    pub text: String,
    /// Category color.
    pub color: Rgb,
}

/// One category row of the legend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    /// Category id.
    pub category_id: usize,
    /// `Category <n>: <name>`, one-based.
    pub text: String,
    /// Category color.
    pub color: Rgb,
    /// Checkbox state.
    pub checked: bool,
}

/// State of one interactive segmentation view.
pub struct Session<B: RenderBackend> {
    loader: Box<dyn GeometryLoader>,
    config: EngineConfig,
    model_path: Option<PathBuf>,
    catalog: LabelCatalog,
    geometry: Option<FaceEnumerator>,
    records: Vec<FaceRecord>,
    registry: ActorRegistry<B>,
    controller: VisibilityController,
}

impl<B: RenderBackend> Session<B> {
    /// Create an empty session.
    pub fn new(loader: Box<dyn GeometryLoader>, backend: B, config: EngineConfig) -> Self {
        let registry = ActorRegistry::new(backend, config.display);
        Self {
            loader,
            config,
            model_path: None,
            catalog: LabelCatalog::default(),
            geometry: None,
            records: Vec::new(),
            registry,
            controller: VisibilityController::default(),
        }
    }

    /// Record the model file. If a `.json` label mapping with the same stem
    /// sits next to it, that mapping is loaded too; returns whether it was.
    pub fn load_model(&mut self, path: impl AsRef<Path>) -> EngineResult<bool> {
        let path = path.as_ref();
        std::fs::metadata(path).map_err(|e| EngineError::io(path, e))?;
        self.model_path = Some(path.to_path_buf());
        info!(path = %path.display(), "model selected");

        let labels = path.with_extension("json");
        if labels.is_file() {
            debug!(path = %labels.display(), "found label mapping next to model");
            self.load_labels(&labels)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Load a label mapping, replacing the current catalog. Any displayed
    /// result was bound to the old catalog and is cleared.
    pub fn load_labels(&mut self, path: impl AsRef<Path>) -> EngineResult<()> {
        let catalog = LabelCatalog::load(path, self.config.palette())?;
        self.clear_display();
        self.catalog = catalog;
        self.controller.reset(self.catalog.len());
        Ok(())
    }

    /// Load a geometry file, replacing the current one and clearing the
    /// display.
    pub fn load_geometry(&mut self, path: impl AsRef<Path>) -> EngineResult<usize> {
        let faces = FaceEnumerator::load(self.loader.as_ref(), path.as_ref())?;
        self.clear_display();
        let count = faces.face_count();
        info!(path = %path.as_ref().display(), faces = count, "geometry loaded");
        self.geometry = Some(faces);
        Ok(count)
    }

    /// Whether a model, a label mapping and geometry are all loaded.
    pub fn is_ready(&self) -> bool {
        self.model_path.is_some() && !self.catalog.is_empty() && self.geometry.is_some()
    }

    /// Bind `raw_labels` to the loaded geometry and display the result.
    pub fn display(&mut self, raw_labels: &[i64]) -> EngineResult<BindReport> {
        let geometry = self
            .geometry
            .as_ref()
            .ok_or_else(|| EngineError::NotReady("no geometry loaded".into()))?;
        if self.catalog.is_empty() {
            return Err(EngineError::NotReady("no label mapping loaded".into()));
        }

        let report = LabelBinder::new(&self.catalog).bind(geometry.faces(), raw_labels)?;

        self.records.clear();
        self.controller.reset(self.catalog.len());
        self.registry.rebuild(&report.records, &self.catalog)?;
        self.records = report.records.clone();
        Ok(report)
    }

    /// Run `backend` on the loaded geometry and display its labels.
    pub fn segment(&mut self, backend: &dyn InferenceBackend, work_dir: &Path) -> EngineResult<BindReport> {
        if !self.is_ready() {
            return Err(EngineError::NotReady(
                "load a model, a label mapping and a geometry file first".into(),
            ));
        }
        let input = self
            .geometry
            .as_ref()
            .map(|g| g.shape().source.clone())
            .ok_or_else(|| EngineError::NotReady("no geometry loaded".into()))?;
        let labels = backend.segment(&InferenceRequest {
            input: &input,
            work_dir,
        })?;
        self.display(&labels)
    }

    /// Apply a user intent to the displayed actors.
    pub fn apply(&mut self, intent: Intent) {
        self.controller.apply(&mut self.registry, intent);
    }

    /// Remove the displayed result, keeping loaded files.
    pub fn clear_display(&mut self) {
        self.registry.clear();
        self.records.clear();
        self.controller.reset(self.catalog.len());
    }

    /// Forget everything.
    pub fn clear_all(&mut self) {
        self.clear_display();
        self.model_path = None;
        self.catalog = LabelCatalog::default();
        self.geometry = None;
        self.controller.reset(0);
    }

    /// Rows for the face list, in face order.
    pub fn face_list(&self) -> Vec<FaceListEntry> {
        self.records
            .iter()
            .map(|r| FaceListEntry {
                face_index: r.face_index,
                category_id: r.category_id,
                text: format!(
                    "Face {}: {}",
                    r.face_index + 1,
                    self.catalog.name_or_placeholder(r.category_id)
                ),
                color: self
                    .catalog
                    .get(r.category_id)
                    .map(|c| c.color)
                    .unwrap_or(Rgb::new(0, 0, 0)),
            })
            .collect()
    }

    /// Rows for the category legend, in id order.
    pub fn legend(&self) -> Vec<LegendEntry> {
        let checked = self.controller.checkboxes();
        self.catalog
            .categories()
            .iter()
            .enumerate()
            .map(|(id, c)| LegendEntry {
                category_id: id,
                text: format!("Category {}: {}", id + 1, c.name),
                color: c.color,
                checked: checked.get(id).copied().unwrap_or(true),
            })
            .collect()
    }

    /// Counts per category over the displayed result.
    pub fn statistics(&self) -> CategoryStats {
        CategoryStats::compute(&self.records, &self.catalog)
    }

    /// Export the displayed result.
    pub fn export(&self, format: ExportFormat, path: &Path) -> EngineResult<()> {
        if self.records.is_empty() {
            return Err(EngineError::NotReady("nothing to export".into()));
        }
        export::export(&self.records, &self.catalog, format, path, &self.export_meta())
    }

    /// Header metadata for exports of this session.
    pub fn export_meta(&self) -> ExportMeta {
        ExportMeta::from_paths(
            self.model_path.as_deref(),
            self.geometry.as_ref().map(|g| g.shape().source.as_path()),
        )
    }

    /// Displayed records.
    pub fn records(&self) -> &[FaceRecord] {
        &self.records
    }

    /// Current catalog.
    pub fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }

    /// Loaded geometry, if any.
    pub fn geometry(&self) -> Option<&FaceEnumerator> {
        self.geometry.as_ref()
    }

    /// Model path, if one was loaded.
    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    /// The actor registry.
    pub fn registry(&self) -> &ActorRegistry<B> {
        &self.registry
    }

    /// The visibility controller.
    pub fn controller(&self) -> &VisibilityController {
        &self.controller
    }
}
