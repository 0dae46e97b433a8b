//! Part discovery for XLSX / XLSB spreadsheet packages.
//!
//! Opens the ZIP container, indexes its entries case- and separator-insensitively, and hands out
//! record readers for the workbook, shared strings, styles, worksheets and worksheet comments.
//! Each fixed part is looked up as XML first and as BIFF12 (`.bin`) second.
//!
//! Decoding the records themselves is left to callers.

mod archive;
pub mod biff12;
mod errors;
mod options;
mod package;
pub mod path;
mod reader;
pub mod rels;

pub use archive::{part_name_lookup_key, part_names_equivalent, ArchiveIndex, EntryRef};
pub use errors::{Error, Result};
pub use options::{OpenOptions, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_PART_BYTES};
pub use package::SpreadsheetPackage;
pub use path::{Encoding, PartKind};
pub use reader::{BinaryPartReader, EntryStream, PartRecord, RecordReader, XmlPartReader};
