//! Identity resolution
//!
//! Matches uploaded rows to stored facilities of the region: first by
//! lower-cased external id, then (for rows still unmatched) by lower-cased
//! name. Lookups are chunked to bound query size. Rows that match neither
//! key stay "new" and become creation candidates.

use registry_common::db::FacilityRecord;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::db::RegistryStore;
use crate::error::ImportResult;
use crate::models::{ImportRow, RowIssue};

/// Drop repeated external ids and names within one upload
///
/// Rows are checked in order; the first occurrence wins. A row dropped for
/// its external id does not claim its name.
pub fn find_duplicates(rows: Vec<ImportRow>) -> (Vec<ImportRow>, Vec<RowIssue>) {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());
    let mut warnings = Vec::new();

    for row in rows {
        if let Some(external_id) = &row.facility.external_id {
            if !seen_ids.insert(external_id.to_lowercase()) {
                warnings.push(RowIssue::duplicate(
                    row.row_index,
                    "Bad data provided for school identifier: duplicate entry",
                ));
                continue;
            }
        }

        if let Some(name) = &row.facility.name {
            if !seen_names.insert(name.to_lowercase()) {
                warnings.push(RowIssue::duplicate(
                    row.row_index,
                    "Bad data provided for school name: duplicate entry",
                ));
                continue;
            }
        }

        kept.push(row);
    }

    (kept, warnings)
}

/// Batched lookup of stored facilities for uploaded rows
pub struct IdentityResolver {
    store: Arc<dyn RegistryStore>,
    chunk_size: usize,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn RegistryStore>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Attach facilities matched by external id; returns the match count
    pub async fn resolve_by_external_id(
        &self,
        region_id: i64,
        rows: &mut [ImportRow],
    ) -> ImportResult<usize> {
        let keys: Vec<String> = unique(rows.iter().filter(|r| r.is_new()).filter_map(|r| {
            r.facility.external_id.as_deref().map(str::to_lowercase)
        }));

        let mut matches: HashMap<String, FacilityRecord> = HashMap::new();
        for chunk in keys.chunks(self.chunk_size) {
            let found = self.store.find_by_external_ids(region_id, chunk).await?;
            tracing::debug!(
                region_id,
                requested = chunk.len(),
                found = found.len(),
                "External id lookup batch"
            );
            for facility in found {
                matches.entry(facility.external_id.clone()).or_insert(facility);
            }
        }

        Ok(attach(rows, &matches, |row| {
            row.facility.external_id.as_deref().map(str::to_lowercase)
        }))
    }

    /// Attach facilities matched by name to rows still unmatched
    pub async fn resolve_by_name(&self, region_id: i64, rows: &mut [ImportRow]) -> ImportResult<usize> {
        let keys: Vec<String> = unique(
            rows.iter()
                .filter(|r| r.is_new())
                .filter_map(|r| r.facility.name.as_deref().map(str::to_lowercase)),
        );

        let mut matches: HashMap<String, FacilityRecord> = HashMap::new();
        for chunk in keys.chunks(self.chunk_size) {
            let found = self.store.find_by_names(region_id, chunk).await?;
            tracing::debug!(
                region_id,
                requested = chunk.len(),
                found = found.len(),
                "Name lookup batch"
            );
            for facility in found {
                matches.entry(facility.name_lower.clone()).or_insert(facility);
            }
        }

        Ok(attach(rows, &matches, |row| {
            row.facility.name.as_deref().map(str::to_lowercase)
        }))
    }
}

/// Keys in first-seen order without repeats
fn unique(keys: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.filter(|key| seen.insert(key.clone())).collect()
}

fn attach(
    rows: &mut [ImportRow],
    matches: &HashMap<String, FacilityRecord>,
    key: impl Fn(&ImportRow) -> Option<String>,
) -> usize {
    let mut matched = 0;
    for row in rows.iter_mut().filter(|r| r.is_new()) {
        if let Some(facility) = key(row).and_then(|k| matches.get(&k)) {
            row.existing = Some(facility.clone());
            matched += 1;
        }
    }
    matched
}
