#![warn(missing_docs)]

//! Face result binding and visualization state for B-rep segmentation.
//!
//! A segmentation model predicts one category per face of a solid. This
//! crate keeps three independently produced sequences aligned: the faces of
//! the solid in traversal order, the labels coming back from inference, and
//! the renderable actors showing them.
//!
//! ```text
//! GeometryLoader -> FaceEnumerator -> LabelBinder -> [FaceRecord]
//!                                         ^               |
//!                           InferenceBackend       ActorRegistry <- VisibilityController
//!                                                        |
//!                                                     export
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use brepseg::{
//!     ExportFormat, ExportMeta, FaceEnumerator, LabelBinder, LabelCatalog, StepLoader,
//! };
//!
//! # fn main() -> brepseg::EngineResult<()> {
//! let catalog = LabelCatalog::load("labels.json", &[])?;
//! let faces = FaceEnumerator::load(&StepLoader, Path::new("part.step"))?;
//! let labels = vec![0; faces.face_count()];
//! let report = LabelBinder::new(&catalog).bind(faces.faces(), &labels)?;
//! brepseg::export::export(
//!     &report.records,
//!     &catalog,
//!     ExportFormat::Text,
//!     Path::new("part.txt"),
//!     &ExportMeta::default(),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod batch;
pub mod binder;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod inference;
pub mod session;
pub mod stats;
pub mod visibility;

pub use actor::{ActorEntry, ActorRegistry, DisplayStyle, Paint, PaintBuffer, RenderBackend};
pub use batch::{discover_cad_files, BatchJob, BatchReport, BatchRunner, CancelToken, JobStatus};
pub use binder::{BindReport, BindWarning, FaceRecord, LabelBinder};
pub use catalog::{Category, LabelCatalog, Rgb, DEFAULT_PALETTE, MAX_PLACEHOLDERS};
pub use classify::{Classification, ConfidenceBand};
pub use config::{BatchConfig, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use export::{ExportFormat, ExportMeta, SegmentationDocument};
pub use geometry::{FaceEnumerator, FaceHandle, GeometryLoader, Shape, StepLoader};
pub use inference::{CommandInference, InferenceBackend, InferenceRequest, SidecarInference};
pub use session::{FaceListEntry, LegendEntry, Session};
pub use stats::CategoryStats;
pub use visibility::{Intent, VisibilityController};
