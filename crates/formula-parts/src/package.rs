use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::Arc;

use zip::ZipArchive;

use crate::archive::{ArchiveIndex, EntryRef};
use crate::errors::{Error, Result};
use crate::options::OpenOptions;
use crate::path::{
    comments_part_name, resolve_fixed_part, resolve_target, worksheet_part_name,
    worksheet_rels_part_name, Encoding, PartKind,
};
use crate::reader::{EntryStream, RecordReader};
use crate::rels::{find_comments_target, parse_relationships};

/// Cap initial allocation when reading a ZIP entry; do not trust the declared size for prealloc.
const ENTRY_READ_PREALLOC_BYTES: u64 = 64 * 1024;

/// An opened XLSX / XLSB container.
///
/// Owns the underlying byte stream and the ZIP archive over it. Every reader returned from this
/// type owns its own copy of the part bytes, so readers stay valid across later calls.
///
/// [`close`](Self::close) releases the archive and then the stream. It is idempotent, and `Drop`
/// calls it for owners that forget. Any resolver call after `close` fails with
/// [`Error::Closed`].
///
/// All methods that open entries take `&mut self`; share a package across threads only behind a
/// lock. The entry index itself is immutable and can be shared freely via [`index`](Self::index).
pub struct SpreadsheetPackage<R: Read + Seek> {
    archive: Option<ZipArchive<R>>,
    index: Arc<ArchiveIndex>,
    options: OpenOptions,
}

impl SpreadsheetPackage<File> {
    /// Open a package from a file on disk.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(File::open(path)?)
    }
}

impl SpreadsheetPackage<Cursor<Vec<u8>>> {
    /// Open a package from an in-memory ZIP buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::open(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> SpreadsheetPackage<R> {
    /// Open a package with [`OpenOptions::default`].
    pub fn open(stream: R) -> Result<Self> {
        Self::open_with_options(stream, OpenOptions::default())
    }

    /// Parse the ZIP central directory, build the entry index, and (unless disabled) check that
    /// a workbook part exists.
    ///
    /// Fails with [`Error::Zip`] when `stream` is not a ZIP container and with
    /// [`Error::MissingWorkbook`] when neither `xl/workbook.xml` nor `xl/workbook.bin` exists.
    /// The stream is released on every failure path.
    pub fn open_with_options(stream: R, options: OpenOptions) -> Result<Self> {
        let archive = ZipArchive::new(stream)?;
        let index = ArchiveIndex::build(&archive, options.max_entries)?;

        if options.require_workbook && resolve_fixed_part(&index, PartKind::Workbook).is_none() {
            return Err(Error::MissingWorkbook);
        }
        log::trace!("opened spreadsheet package with {} parts", index.len());

        Ok(Self {
            archive: Some(archive),
            index: Arc::new(index),
            options,
        })
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// The read-only entry index. Safe to clone and read from other threads.
    pub fn index(&self) -> &Arc<ArchiveIndex> {
        &self.index
    }

    /// Entry names as stored in the container, in central-directory order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.index.names()
    }

    /// Whether a part exists, compared case-insensitively and ignoring separator style.
    pub fn contains_part(&self, name: &str) -> bool {
        self.index.contains(name)
    }

    pub fn is_closed(&self) -> bool {
        self.archive.is_none()
    }

    /// Release the archive, then the underlying stream. Calling this again does nothing.
    pub fn close(&mut self) {
        if let Some(archive) = self.archive.take() {
            let stream = archive.into_inner();
            drop(stream);
            log::trace!("closed spreadsheet package");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.archive.is_none() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Inflate one entry, bounded by [`OpenOptions::max_part_bytes`].
    fn open_entry(&mut self, entry: &EntryRef) -> Result<EntryStream> {
        let max = self.options.max_part_bytes;
        let archive = self.archive.as_mut().ok_or(Error::Closed)?;
        let mut file = archive.by_index(entry.index())?;

        let declared = file.size();
        if declared > max {
            return Err(Error::PartTooLarge {
                part: entry.name().to_string(),
                size: declared,
                max,
            });
        }

        // Don't trust ZIP metadata alone: read at most `max + 1` bytes and check what we got.
        let mut buf = Vec::with_capacity(declared.min(ENTRY_READ_PREALLOC_BYTES) as usize);
        let limit = max.checked_add(1).unwrap_or(u64::MAX);
        file.by_ref().take(limit).read_to_end(&mut buf)?;
        let observed = buf.len() as u64;
        if observed > max {
            return Err(Error::PartTooLarge {
                part: entry.name().to_string(),
                size: observed,
                max,
            });
        }

        log::trace!("read part `{}` ({observed} bytes)", entry.name());
        Ok(EntryStream::new(entry.name(), buf))
    }

    /// Raw bytes of any part by name; `None` when the part does not exist.
    pub fn read_part(&mut self, name: &str) -> Result<Option<EntryStream>> {
        self.ensure_open()?;
        match self.index.lookup(name).cloned() {
            Some(entry) => Ok(Some(self.open_entry(&entry)?)),
            None => Ok(None),
        }
    }

    /// Reader for one of the fixed-location parts, XML first, then binary.
    ///
    /// Worksheets, comments and workbook relationships are not fixed-location readers and
    /// always yield `None` here.
    pub fn part_reader(&mut self, kind: PartKind) -> Result<Option<RecordReader>> {
        self.ensure_open()?;
        if !matches!(
            kind,
            PartKind::Workbook | PartKind::SharedStrings | PartKind::Styles
        ) {
            return Ok(None);
        }
        let Some((entry, encoding)) = resolve_fixed_part(&self.index, kind) else {
            return Ok(None);
        };
        let stream = self.open_entry(&entry)?;
        Ok(RecordReader::new(kind, encoding, stream))
    }

    pub fn shared_strings_reader(&mut self) -> Result<Option<RecordReader>> {
        self.part_reader(PartKind::SharedStrings)
    }

    pub fn styles_reader(&mut self) -> Result<Option<RecordReader>> {
        self.part_reader(PartKind::Styles)
    }

    /// Reader for the workbook part. A package without one is not a spreadsheet.
    pub fn workbook_reader(&mut self) -> Result<RecordReader> {
        self.part_reader(PartKind::Workbook)?.ok_or(Error::MissingWorkbook)
    }

    /// Raw workbook relationships part (`xl/_rels/workbook.xml.rels`, else
    /// `xl/_rels/workbook.bin.rels`).
    pub fn workbook_relationships(&mut self) -> Result<Option<EntryStream>> {
        self.ensure_open()?;
        match resolve_fixed_part(&self.index, PartKind::WorkbookRelationships) {
            Some((entry, _)) => Ok(Some(self.open_entry(&entry)?)),
            None => Ok(None),
        }
    }

    /// Reader for a worksheet.
    ///
    /// `sheet_path` is either rooted at the package (`/xl/worksheets/sheet1.xml`) or relative to
    /// `xl/` (`worksheets/sheet1.xml`). The extension picks the encoding; anything other than
    /// `.xml` or `.bin`, or a missing part, yields `None`.
    pub fn worksheet_reader(&mut self, sheet_path: &str) -> Result<Option<RecordReader>> {
        self.ensure_open()?;
        let part = worksheet_part_name(sheet_path);
        let Some(encoding) = Encoding::from_part_name(&part) else {
            log::debug!("worksheet `{part}` has no .xml or .bin extension");
            return Ok(None);
        };
        let Some(entry) = self.index.lookup(&part).cloned() else {
            return Ok(None);
        };
        let stream = self.open_entry(&entry)?;
        Ok(RecordReader::new(PartKind::Worksheet, encoding, stream))
    }

    /// Reader for the comments attached to a worksheet.
    ///
    /// Looks up `xl/worksheets/_rels/<sheet>.xml.rels` and follows the first relationship whose
    /// type ends in `comments`. Returns `None` when there is no relationships part, when it is
    /// malformed, when no comments relationship exists, or when the target part is missing.
    ///
    /// Only XML comments are read. Binary worksheets do not get their `.bin.rels` consulted and
    /// `.bin` comment parts are never opened.
    pub fn comments_reader(&mut self, sheet_path: &str) -> Result<Option<RecordReader>> {
        self.ensure_open()?;
        let sheet_part = worksheet_part_name(sheet_path);
        let rels_part = worksheet_rels_part_name(&sheet_part);
        let Some(rels_entry) = self.index.lookup(&rels_part).cloned() else {
            return Ok(None);
        };

        let rels = self.open_entry(&rels_entry)?;
        let Some(target) = find_comments_target(rels) else {
            return Ok(None);
        };

        let comments_part = comments_part_name(&target);
        let Some(entry) = self.index.lookup(&comments_part).cloned() else {
            log::warn!("`{rels_part}` points at missing comments part `{comments_part}`");
            return Ok(None);
        };
        if Encoding::from_part_name(entry.name()) == Some(Encoding::Binary) {
            log::debug!("binary comments part `{}` is not supported", entry.name());
            return Ok(None);
        }

        let stream = self.open_entry(&entry)?;
        Ok(RecordReader::new(PartKind::Comments, Encoding::Xml, stream))
    }

    /// Worksheet parts listed in the workbook relationships, in document order.
    ///
    /// Names are returned rooted at the package (`/xl/worksheets/sheet1.xml`), the form accepted
    /// by [`worksheet_reader`](Self::worksheet_reader) and
    /// [`comments_reader`](Self::comments_reader). External targets are skipped.
    pub fn worksheet_part_names(&mut self) -> Result<Vec<String>> {
        let Some(rels) = self.workbook_relationships()? else {
            return Ok(Vec::new());
        };
        let source = resolve_fixed_part(&self.index, PartKind::Workbook)
            .map(|(entry, _)| entry.name().replace('\\', "/"))
            .unwrap_or_else(|| "xl/workbook.xml".to_string());

        let relationships = parse_relationships(&rels.into_bytes())?;
        Ok(relationships
            .iter()
            .filter(|rel| rel.is_worksheet() && !rel.is_external())
            .map(|rel| format!("/{}", resolve_target(&source, &rel.target)))
            .collect())
    }
}

impl<R: Read + Seek> Drop for SpreadsheetPackage<R> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<R: Read + Seek> fmt::Debug for SpreadsheetPackage<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpreadsheetPackage")
            .field("parts", &self.index.len())
            .field("closed", &self.is_closed())
            .field("options", &self.options)
            .finish()
    }
}
