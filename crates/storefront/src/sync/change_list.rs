use std::collections::BTreeMap;

use storefront_api::ChangeListEntry;

/// Change-list entries reduced to one action per id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionedChanges {
    /// Ascending ids whose latest entry is a delete.
    pub to_delete: Vec<i64>,
    /// Ascending ids whose latest entry is an upsert.
    pub to_upsert: Vec<i64>,
    /// Highest version among the entries newer than the cursor.
    pub max_version: Option<i64>,
}

impl PartitionedChanges {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_upsert.is_empty()
    }

    /// Version the watermark should move to. Never below `current`.
    pub fn target_version(&self, current: i64) -> i64 {
        self.max_version.map_or(current, |max| max.max(current))
    }
}

/// Drops entries at or below `after`, then keeps the latest entry per id.
///
/// "Latest" is the highest change-list version; among entries with equal
/// versions the one that appears later in the feed wins.
pub fn partition_change_list(entries: &[ChangeListEntry], after: i64) -> PartitionedChanges {
    let mut fresh: Vec<(usize, &ChangeListEntry)> = entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.change_list_version > after)
        .collect();
    fresh.sort_by_key(|(position, entry)| (entry.change_list_version, *position));

    let max_version = fresh.last().map(|(_, entry)| entry.change_list_version);

    let mut latest: BTreeMap<i64, bool> = BTreeMap::new();
    for (_, entry) in fresh {
        latest.insert(entry.id, entry.is_delete);
    }

    let mut changes = PartitionedChanges {
        max_version,
        ..Default::default()
    };
    for (id, is_delete) in latest {
        if is_delete {
            changes.to_delete.push(id);
        } else {
            changes.to_upsert.push(id);
        }
    }
    changes
}
