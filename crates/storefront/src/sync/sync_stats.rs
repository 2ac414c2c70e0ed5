use std::fmt;

use storefront_api::EntityType;

use crate::storage::AppliedChanges;

/// Outcome of one committed per-type sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub entity: EntityType,
    pub from_version: i64,
    pub to_version: i64,
    pub deleted: u64,
    pub upserted: u64,
    pub shell_categories: u64,
}

impl SyncStats {
    pub(crate) fn new(
        entity: EntityType,
        from_version: i64,
        to_version: i64,
        applied: AppliedChanges,
    ) -> Self {
        Self {
            entity,
            from_version,
            to_version,
            deleted: applied.deleted,
            upserted: applied.upserted,
            shell_categories: applied.shell_categories,
        }
    }

    /// Nothing new arrived from the remote catalog.
    pub fn is_noop(&self) -> bool {
        self.from_version == self.to_version && self.deleted == 0 && self.upserted == 0
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{} -> v{}: {} upserted, {} deleted",
            self.entity, self.from_version, self.to_version, self.upserted, self.deleted
        )?;
        if self.shell_categories > 0 {
            write!(f, ", {} shell categories", self.shell_categories)?;
        }
        Ok(())
    }
}
