//! Tunable options for loading and migration.

use crate::constants::AUTO_TOC_PAGE_LIMIT;

/// Which sidecar generation wins when both extensions exist for one stem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadPreference {
    #[default]
    PreferCompact,
    PreferLegacy,
}

/// Options for a scan-and-load pass.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Worker threads for the load pipeline; 0 selects the CPU count.
    pub workers: usize,
    pub read_preference: ReadPreference,
    /// New documents shorter than this get one synthesized TOC entry.
    pub auto_toc_page_limit: u32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            read_preference: ReadPreference::default(),
            auto_toc_page_limit: AUTO_TOC_PAGE_LIMIT,
        }
    }
}

impl LoadOptions {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_read_preference(mut self, preference: ReadPreference) -> Self {
        self.read_preference = preference;
        self
    }

    #[must_use]
    pub fn with_auto_toc_page_limit(mut self, limit: u32) -> Self {
        self.auto_toc_page_limit = limit;
        self
    }
}

/// Options for a legacy-sidecar migration sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrateOptions {
    /// Remove the legacy sidecar after a successful verified write.
    pub delete_legacy: bool,
}
