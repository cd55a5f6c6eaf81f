//! Per-category face counts.

use crate::binder::FaceRecord;
use crate::catalog::LabelCatalog;

/// Face counts per category over one record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    /// Total number of records.
    pub total: usize,
    /// Count per category id.
    pub counts: Vec<usize>,
}

/// One row of a statistics table.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryShare<'a> {
    /// Category id.
    pub category_id: usize,
    /// Category name.
    pub name: &'a str,
    /// Faces in the category.
    pub count: usize,
    /// `count / total * 100`.
    pub percentage: f64,
}

impl CategoryStats {
    /// Count `records` per category of `catalog`.
    pub fn compute(records: &[FaceRecord], catalog: &LabelCatalog) -> Self {
        let mut counts = vec![0; catalog.len()];
        for record in records {
            if let Some(c) = counts.get_mut(record.category_id) {
                *c += 1;
            }
        }
        Self {
            total: records.len(),
            counts,
        }
    }

    /// Share of category `id` in percent; zero when there are no records.
    pub fn percentage(&self, id: usize) -> f64 {
        match (self.counts.get(id), self.total) {
            (Some(&count), total) if total > 0 => count as f64 / total as f64 * 100.0,
            _ => 0.0,
        }
    }

    /// Categories with at least one face, in id order.
    pub fn nonzero<'a>(&'a self, catalog: &'a LabelCatalog) -> impl Iterator<Item = CategoryShare<'a>> + 'a {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(move |(id, &count)| CategoryShare {
                category_id: id,
                name: catalog.get(id).map(|c| c.name.as_str()).unwrap_or(""),
                count,
                percentage: self.percentage(id),
            })
    }
}
