//! Canonical part names for the well-known SpreadsheetML parts.

use std::fmt;

use crate::archive::{ArchiveIndex, EntryRef};

/// Root folder for workbook parts inside the package.
pub const PARTS_ROOT: &str = "xl/";

const WORKSHEET_RELS_DIR: &str = "xl/worksheets/_rels/";

/// Physical encoding of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Xml,
    Binary,
}

impl Encoding {
    /// Map a part name's extension to an encoding; `None` for anything but `.xml` / `.bin`.
    pub fn from_part_name(name: &str) -> Option<Self> {
        let (_, ext) = file_name(name).rsplit_once('.')?;
        if ext.eq_ignore_ascii_case("xml") {
            Some(Encoding::Xml)
        } else if ext.eq_ignore_ascii_case("bin") {
            Some(Encoding::Binary)
        } else {
            None
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Xml => f.write_str("xml"),
            Encoding::Binary => f.write_str("bin"),
        }
    }
}

/// The logical sub-resources of a spreadsheet package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    Workbook,
    SharedStrings,
    Styles,
    WorkbookRelationships,
    Worksheet,
    Comments,
}

impl PartKind {
    /// Fixed XML part name, for the kinds that live at a fixed location.
    pub fn xml_part_name(self) -> Option<&'static str> {
        match self {
            PartKind::Workbook => Some("xl/workbook.xml"),
            PartKind::SharedStrings => Some("xl/sharedStrings.xml"),
            PartKind::Styles => Some("xl/styles.xml"),
            PartKind::WorkbookRelationships => Some("xl/_rels/workbook.xml.rels"),
            PartKind::Worksheet | PartKind::Comments => None,
        }
    }

    /// Fixed binary part name, for the kinds that live at a fixed location.
    pub fn binary_part_name(self) -> Option<&'static str> {
        match self {
            PartKind::Workbook => Some("xl/workbook.bin"),
            PartKind::SharedStrings => Some("xl/sharedStrings.bin"),
            PartKind::Styles => Some("xl/styles.bin"),
            PartKind::WorkbookRelationships => Some("xl/_rels/workbook.bin.rels"),
            PartKind::Worksheet | PartKind::Comments => None,
        }
    }

    /// Whether a reader of this kind exists for `encoding`.
    ///
    /// Comments are only read from XML. `xl/comments1.bin` parts are never resolved.
    pub fn supports(self, encoding: Encoding) -> bool {
        !matches!((self, encoding), (PartKind::Comments, Encoding::Binary))
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartKind::Workbook => "workbook",
            PartKind::SharedStrings => "shared strings",
            PartKind::Styles => "styles",
            PartKind::WorkbookRelationships => "workbook relationships",
            PartKind::Worksheet => "worksheet",
            PartKind::Comments => "comments",
        };
        f.write_str(name)
    }
}

/// Resolve a fixed-location part, trying the XML name before the binary name.
pub fn resolve_fixed_part(index: &ArchiveIndex, kind: PartKind) -> Option<(EntryRef, Encoding)> {
    if let Some(entry) = kind.xml_part_name().and_then(|name| index.lookup(name)) {
        return Some((entry.clone(), Encoding::Xml));
    }
    let entry = kind.binary_part_name().and_then(|name| index.lookup(name))?;
    log::debug!("{kind} part has no XML form; using binary part `{}`", entry.name());
    Some((entry.clone(), Encoding::Binary))
}

/// Turn a caller-supplied worksheet reference into a package part name.
///
/// `/xl/worksheets/sheet1.xml` loses its leading slash; anything else is taken as relative to
/// `xl/` (`worksheets/sheet1.xml` becomes `xl/worksheets/sheet1.xml`).
pub fn worksheet_part_name(sheet_path: &str) -> String {
    match sheet_path.strip_prefix('/') {
        Some(rest) if starts_with_parts_root(rest) => rest.to_string(),
        _ => format!("{PARTS_ROOT}{sheet_path}"),
    }
}

fn starts_with_parts_root(path: &str) -> bool {
    path.get(..PARTS_ROOT.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(PARTS_ROOT))
}

/// File name without directory and without its last extension (`xl/worksheets/sheet1.xml` ->
/// `sheet1`).
pub fn file_stem(part_name: &str) -> &str {
    let file_name = file_name(part_name);
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Last path segment, accepting either separator.
pub fn file_name(part_name: &str) -> &str {
    part_name.rsplit(&['/', '\\'][..]).next().unwrap_or(part_name)
}

/// Relationships part for a worksheet.
///
/// Always uses the `.xml.rels` form: relationship parts of binary worksheets
/// (`sheet1.bin.rels`) are not looked up.
pub fn worksheet_rels_part_name(sheet_part: &str) -> String {
    format!("{WORKSHEET_RELS_DIR}{}.xml.rels", file_stem(sheet_part))
}

/// Comments part named by a relationship target.
///
/// Only the file-name portion of the target is kept and placed under `xl/`, so
/// `../comments1.xml` becomes `xl/comments1.xml`.
pub fn comments_part_name(target: &str) -> String {
    format!("{PARTS_ROOT}{}", file_name(target))
}

/// Resolve a relationship `target` against the part that owns the relationship.
///
/// Targets may be relative to the source part's folder (`worksheets/sheet1.xml`) or absolute
/// (`/xl/worksheets/sheet1.xml`). URI fragments are dropped.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or(target);
    if target.is_empty() {
        return normalize(source_part);
    }
    if let Some(target) = target.strip_prefix('/') {
        return normalize(target);
    }

    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}
