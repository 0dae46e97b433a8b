//! Case- and separator-insensitive index over the entries of a ZIP container.

use std::collections::HashMap;
use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::errors::{Error, Result};

/// A view of one entry inside the archive.
///
/// Holds the central-directory index (used to open the entry) and the entry's name exactly as
/// stored in the container. It does not own any decompressed data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryRef {
    index: usize,
    name: String,
}

impl EntryRef {
    pub fn index(&self) -> usize {
        self.index
    }

    /// The entry name as written by the producer (may use `\` or odd casing).
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Compute the lookup key for a ZIP entry / part name.
///
/// - percent-decodes valid `%xx` sequences
/// - strips leading path separators (`/` or `\`), including when percent-encoded
/// - normalizes `\` to `/`
/// - ASCII-lowercases
///
/// The key is a byte vector (not a `String`) so arbitrary percent-decoded bytes can be represented
/// without requiring valid UTF-8.
pub fn part_name_lookup_key(name: &str) -> Vec<u8> {
    fn hex_val(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let mut bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut in_leading_separators = true;
    while let Some(&b) = bytes.first() {
        let decoded = match (b, bytes.get(1), bytes.get(2)) {
            (b'%', Some(&hi), Some(&lo)) => match (hex_val(hi), hex_val(lo)) {
                (Some(hi), Some(lo)) => {
                    bytes = &bytes[3..];
                    (hi << 4) | lo
                }
                _ => {
                    bytes = &bytes[1..];
                    b
                }
            },
            _ => {
                bytes = &bytes[1..];
                b
            }
        };

        if in_leading_separators && matches!(decoded, b'/' | b'\\') {
            continue;
        }
        in_leading_separators = false;

        out.push(if decoded == b'\\' {
            b'/'
        } else {
            decoded.to_ascii_lowercase()
        });
    }
    out
}

/// True when `a` and `b` name the same part after normalization.
pub fn part_names_equivalent(a: &str, b: &str) -> bool {
    part_name_lookup_key(a) == part_name_lookup_key(b)
}

/// Normalized entry-name index, built once when the container is opened and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    by_key: HashMap<Vec<u8>, EntryRef>,
    names: Vec<String>,
}

impl ArchiveIndex {
    /// Index every file entry of `archive`, refusing containers with more than `max_entries`
    /// entries.
    pub fn build<R: Read + Seek>(archive: &ZipArchive<R>, max_entries: usize) -> Result<Self> {
        let count = archive.len();
        if count > max_entries {
            return Err(Error::TooManyEntries {
                count,
                max: max_entries,
            });
        }
        Ok(Self::from_names(archive.file_names()))
    }

    /// Build an index from entry names in central-directory order.
    ///
    /// Directory entries (names ending in a separator) are skipped but keep their position, so
    /// `EntryRef::index` always matches the archive index. When several entries normalize to the
    /// same key, the one with the lowest index wins.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut index = Self::default();
        for (idx, name) in names.into_iter().enumerate() {
            index.names.push(name.to_string());
            if name.ends_with('/') || name.ends_with('\\') {
                continue;
            }

            let key = part_name_lookup_key(name);
            if let Some(existing) = index.by_key.get(&key) {
                log::debug!(
                    "zip entry `{name}` collides with `{}` after normalization; keeping the first",
                    existing.name
                );
                continue;
            }
            index.by_key.insert(
                key,
                EntryRef {
                    index: idx,
                    name: name.to_string(),
                },
            );
        }
        index
    }

    /// Find the entry for `path`, normalizing it exactly as entry names were normalized.
    pub fn lookup(&self, path: &str) -> Option<&EntryRef> {
        self.by_key.get(&part_name_lookup_key(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Entry names as stored in the container, in central-directory order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of distinct lookup keys.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
