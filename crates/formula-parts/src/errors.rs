use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("XML attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    /// Neither `xl/workbook.xml` nor `xl/workbook.bin` exists in the container.
    #[error("not a spreadsheet package: missing workbook part (xl/workbook.xml or xl/workbook.bin)")]
    MissingWorkbook,
    #[error("package part is too large to load safely: {part} is {size} bytes (max {max} bytes)")]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("package has too many entries: {count} (max {max})")]
    TooManyEntries { count: usize, max: usize },
    #[error("package has already been closed")]
    Closed,
}
