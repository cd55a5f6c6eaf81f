//! Binding enumerated faces to inference labels.
//!
//! Inference and geometry enumeration fail independently, so binding is
//! lenient: a short label array truncates the binding, a long one is cut, and
//! out-of-range labels are clamped. Each of these is reported as a
//! [`BindWarning`] rather than an error.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::LabelCatalog;
use crate::error::{EngineError, EngineResult};
use crate::geometry::FaceHandle;

/// One face bound to a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceRecord {
    /// Position in enumeration order.
    pub face_index: usize,
    /// Clamped category id, always valid for the catalog used to bind.
    pub category_id: usize,
    /// The kernel face this record describes.
    pub face: FaceHandle,
}

/// Non-fatal conditions found while binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BindWarning {
    /// Label and face counts differ.
    LabelMismatch {
        /// Faces enumerated.
        faces: usize,
        /// Labels produced by inference.
        labels: usize,
    },
    /// A raw label was outside the catalog and was clamped.
    OutOfRangeLabel {
        /// Face the label belonged to.
        face_index: usize,
        /// Label as produced by inference.
        raw: i64,
        /// Id it was clamped to.
        clamped_to: usize,
    },
}

/// Output of [`LabelBinder::bind`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    /// Bound records, one per face that received a label.
    pub records: Vec<FaceRecord>,
    /// Faces left without a record because inference produced too few labels.
    pub truncated: usize,
    /// Labels ignored because inference produced more labels than faces.
    pub ignored: usize,
    /// Everything worth telling the caller about.
    pub warnings: Vec<BindWarning>,
}

impl BindReport {
    /// Category id per record, in face order.
    pub fn category_ids(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.category_id).collect()
    }

    /// Face indices whose labels were clamped.
    pub fn clamped_faces(&self) -> Vec<usize> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                BindWarning::OutOfRangeLabel { face_index, .. } => Some(*face_index),
                BindWarning::LabelMismatch { .. } => None,
            })
            .collect()
    }
}

/// Binds face traversals to raw label arrays against a catalog.
#[derive(Debug, Clone, Copy)]
pub struct LabelBinder<'a> {
    catalog: &'a LabelCatalog,
}

impl<'a> LabelBinder<'a> {
    /// Create a binder that clamps into `catalog`.
    pub fn new(catalog: &'a LabelCatalog) -> Self {
        Self { catalog }
    }

    /// Bind `faces` to `raw_labels` index for index.
    ///
    /// Fails only if the catalog is empty, since no label can be valid then.
    pub fn bind<'f, I>(&self, faces: I, raw_labels: &[i64]) -> EngineResult<BindReport>
    where
        I: IntoIterator<Item = &'f FaceHandle>,
    {
        if self.catalog.is_empty() {
            return Err(EngineError::EmptyCatalog);
        }

        let mut report = BindReport::default();
        let mut face_count = 0;
        let mut clamped_count = 0usize;

        for (face_index, face) in faces.into_iter().enumerate() {
            face_count += 1;
            let Some(&raw) = raw_labels.get(face_index) else {
                report.truncated += 1;
                continue;
            };
            let (category_id, clamped) = self.catalog.clamp(raw).ok_or(EngineError::EmptyCatalog)?;
            if clamped {
                clamped_count += 1;
                debug!(face_index, raw, category_id, "clamped out-of-range label");
                report.warnings.push(BindWarning::OutOfRangeLabel {
                    face_index,
                    raw,
                    clamped_to: category_id,
                });
            }
            report.records.push(FaceRecord {
                face_index,
                category_id,
                face: face.clone(),
            });
        }

        report.ignored = raw_labels.len().saturating_sub(face_count);

        if face_count != raw_labels.len() {
            warn!(
                faces = face_count,
                labels = raw_labels.len(),
                truncated = report.truncated,
                ignored = report.ignored,
                "label count does not match face count"
            );
            report.warnings.insert(
                0,
                BindWarning::LabelMismatch {
                    faces: face_count,
                    labels: raw_labels.len(),
                },
            );
        }

        if clamped_count > 0 {
            warn!(clamped = clamped_count, "labels outside the catalog were clamped");
        }

        Ok(report)
    }
}
