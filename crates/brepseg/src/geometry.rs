//! Geometry loading and face enumeration.
//!
//! Parsing CAD files is delegated to a [`GeometryLoader`]. The loaded
//! [`Shape`] is wrapped in a [`FaceEnumerator`], whose traversal order is the
//! single source of truth for face indices everywhere else in the engine.

use std::path::{Path, PathBuf};
use std::slice;

use brepseg_step::read_step_faces;
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Opaque reference to one kernel face.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FaceHandle {
    /// Entity id of the owning solid.
    pub solid_id: u64,
    /// Entity id of the face.
    pub entity_id: u64,
    /// Type name of the underlying surface (e.g. `PLANE`).
    pub surface_type: String,
}

/// A loaded geometry model: every face of every solid in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    /// File the shape was loaded from.
    pub source: PathBuf,
    /// Number of solids in the file.
    pub solid_count: usize,
    faces: Vec<FaceHandle>,
}

impl Shape {
    /// Create a shape from faces already in traversal order.
    pub fn new(source: impl Into<PathBuf>, solid_count: usize, faces: Vec<FaceHandle>) -> Self {
        Self {
            source: source.into(),
            solid_count,
            faces,
        }
    }
}

/// External collaborator that parses a CAD file into a [`Shape`].
///
/// Implementations must return faces in the same order every time the same
/// file is loaded.
pub trait GeometryLoader {
    /// Load the shape stored at `path`.
    fn load(&self, path: &Path) -> EngineResult<Shape>;
}

/// Loader for STEP (ISO 10303-21) files.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepLoader;

impl GeometryLoader for StepLoader {
    fn load(&self, path: &Path) -> EngineResult<Shape> {
        let solids = read_step_faces(path).map_err(|e| EngineError::GeometryLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let faces = solids
            .iter()
            .flat_map(|solid| {
                solid.faces.iter().map(move |face| FaceHandle {
                    solid_id: solid.id,
                    entity_id: face.id,
                    surface_type: face.surface_type.clone(),
                })
            })
            .collect::<Vec<_>>();

        debug!(path = %path.display(), solids = solids.len(), faces = faces.len(), "loaded STEP file");
        Ok(Shape::new(path, solids.len(), faces))
    }
}

/// Deterministic, restartable face traversal over a loaded shape.
#[derive(Debug, Clone)]
pub struct FaceEnumerator {
    shape: Shape,
}

impl FaceEnumerator {
    /// Load `path` through `loader` and wrap the result.
    ///
    /// Fails with [`EngineError::GeometryLoad`] if the loader cannot parse the
    /// file and [`EngineError::EmptyGeometry`] if it has no faces.
    pub fn load<L: GeometryLoader + ?Sized>(loader: &L, path: &Path) -> EngineResult<Self> {
        Self::from_shape(loader.load(path)?)
    }

    /// Wrap an already loaded shape.
    pub fn from_shape(shape: Shape) -> EngineResult<Self> {
        if shape.faces.is_empty() {
            return Err(EngineError::EmptyGeometry { path: shape.source });
        }
        Ok(Self { shape })
    }

    /// A fresh traversal from the first face. Each call restarts.
    pub fn faces(&self) -> Faces<'_> {
        Faces {
            inner: self.shape.faces.iter(),
        }
    }

    /// Number of faces the traversal yields.
    pub fn face_count(&self) -> usize {
        self.shape.faces.len()
    }

    /// The underlying shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

/// Iterator over faces in traversal order.
#[derive(Debug, Clone)]
pub struct Faces<'a> {
    inner: slice::Iter<'a, FaceHandle>,
}

impl<'a> Iterator for Faces<'a> {
    type Item = &'a FaceHandle;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Faces<'_> {}
