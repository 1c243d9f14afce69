//! Cache building - rebuild a container snapshot from the record store

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::types::CacheEntry;
use crate::core::error::Result;
use crate::core::identity::ContainerId;
use crate::core::registry::Registries;
use crate::core::report::Report;
use crate::core::store::RecordStore;

/// Scan one container and rebuild every stored report
///
/// A record that cannot be rebuilt fails the whole build; no partial entry is
/// ever produced.
pub(super) fn build_entry(
    store: &RecordStore,
    registries: &Registries,
    container: &ContainerId,
    epoch: u64,
) -> Result<CacheEntry> {
    let start = Instant::now();
    let records = store.select_all_for_container(container)?;

    let reports = records
        .iter()
        .map(|record| registries.decode_record(record).map(Arc::<dyn Report>::from))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        %container,
        reports = reports.len(),
        epoch,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "built container cache"
    );
    Ok(CacheEntry::new(container.clone(), epoch, reports))
}
