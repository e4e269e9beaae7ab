//! Minimum-distance check for new facilities
//!
//! Existing facility points are indexed per education level and in one
//! catch-all index. Each new row is inserted into the index it is checked
//! against (and into the catch-all), then its second-nearest neighbor is
//! compared with the threshold; the nearest is always the row itself.
//!
//! Rows are inserted one at a time in upload order, so of two new rows that
//! are too close only the later one is rejected. A rejected row stays in the
//! index.

use registry_common::db::FacilityPoint;
use std::collections::HashMap;

use super::spatial_index::{cartesian, KdTree};
use crate::models::{ImportRow, RowIssue};

/// Per-category spatial indexes, owned by one import run
struct CategoryIndexes {
    by_level: HashMap<String, KdTree>,
    all: KdTree,
}

impl CategoryIndexes {
    fn build(existing: &[FacilityPoint]) -> Self {
        let mut grouped: HashMap<String, Vec<[f64; 3]>> = HashMap::new();
        let mut all = Vec::with_capacity(existing.len());

        for facility in existing {
            let point = cartesian(facility.point);
            all.push(point);
            if !facility.education_level.is_empty() {
                grouped
                    .entry(facility.education_level.clone())
                    .or_default()
                    .push(point);
            }
        }

        Self {
            by_level: grouped
                .into_iter()
                .map(|(level, points)| (level, KdTree::build(points)))
                .collect(),
            all: KdTree::build(all),
        }
    }

    /// Insert `point` and return the index it should be checked against
    fn insert(&mut self, category: Option<&str>, point: [f64; 3]) -> &KdTree {
        self.all.insert(point);
        match category {
            Some(level) => {
                let tree = self.by_level.entry(level.to_string()).or_default();
                tree.insert(point);
                tree
            }
            None => &self.all,
        }
    }
}

/// Rejects new facilities that sit too close to another facility
#[derive(Debug, Clone)]
pub struct SpatialDeduplicator {
    min_distance_km: f64,
}

impl SpatialDeduplicator {
    pub fn new(min_distance_km: f64) -> Self {
        Self { min_distance_km }
    }

    /// Split `rows` into accepted rows and too-close errors
    ///
    /// Only rows without a resolved facility are checked; matched rows pass
    /// through untouched.
    pub fn filter(
        &self,
        existing: &[FacilityPoint],
        rows: Vec<ImportRow>,
    ) -> (Vec<ImportRow>, Vec<RowIssue>) {
        let mut indexes = CategoryIndexes::build(existing);
        let mut accepted = Vec::with_capacity(rows.len());
        let mut errors = Vec::new();
        let meters = self.min_distance_km * 1000.0;

        for row in rows {
            if !row.is_new() {
                accepted.push(row);
                continue;
            }

            let category = row.facility.category();
            let point = cartesian(row.facility.point);
            let tree = indexes.insert(category, point);
            let neighbors = tree.nearest(point, 2);

            match neighbors.get(1) {
                Some(distance) if *distance < self.min_distance_km => {
                    let message = if category.is_some() {
                        format!(
                            "Geopoint is closer than {:.0}m to another with same education level.",
                            meters
                        )
                    } else {
                        format!(
                            "Geopoint is closer than {:.0}m to another. Please specify education_level for better search.",
                            meters
                        )
                    };
                    tracing::debug!(
                        row = row.row_index,
                        distance_km = *distance,
                        "Rejecting facility too close to a neighbor"
                    );
                    errors.push(RowIssue::semantic(row.row_index, message));
                }
                _ => accepted.push(row),
            }
        }

        (accepted, errors)
    }
}
