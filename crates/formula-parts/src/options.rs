/// Maximum uncompressed size allowed for a single ZIP entry (package part).
///
/// The per-entry `size` value in a ZIP central directory is attacker-controlled, so reads are
/// bounded explicitly to avoid huge allocations when a part is materialized.
pub const DEFAULT_MAX_PART_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

/// Maximum number of ZIP entries indexed when a package is opened.
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

const ENV_MAX_PART_BYTES: &str = "FORMULA_PARTS_MAX_ZIP_PART_BYTES";
const ENV_MAX_ENTRIES: &str = "FORMULA_PARTS_MAX_ZIP_ENTRIES";

fn env_max_part_bytes() -> u64 {
    std::env::var(ENV_MAX_PART_BYTES)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_MAX_PART_BYTES)
}

fn env_max_entries() -> usize {
    std::env::var(ENV_MAX_ENTRIES)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_ENTRIES)
}

/// Controls resource limits and strictness when opening a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// Upper bound on the inflated size of any one part read through the package.
    pub max_part_bytes: u64,
    /// Upper bound on the number of entries in the ZIP central directory.
    pub max_entries: usize,
    /// If true (the default), opening fails with [`crate::Error::MissingWorkbook`] when neither
    /// workbook part exists.
    ///
    /// When false, the package opens anyway and the error is deferred to
    /// [`crate::SpreadsheetPackage::workbook_reader`].
    pub require_workbook: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            max_part_bytes: env_max_part_bytes(),
            max_entries: env_max_entries(),
            require_workbook: true,
        }
    }
}

impl OpenOptions {
    pub fn with_max_part_bytes(mut self, max: u64) -> Self {
        self.max_part_bytes = max;
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_require_workbook(mut self, require: bool) -> Self {
        self.require_workbook = require;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_override_defaults() {
        let opts = OpenOptions::default()
            .with_max_part_bytes(10)
            .with_max_entries(3)
            .with_require_workbook(false);
        assert_eq!(opts.max_part_bytes, 10);
        assert_eq!(opts.max_entries, 3);
        assert!(!opts.require_workbook);
    }

    #[test]
    fn default_requires_workbook() {
        assert!(OpenOptions::default().require_workbook);
    }
}
