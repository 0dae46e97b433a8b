//! Record readers over individual package parts.
//!
//! Every reader wraps exactly one opened entry. XML parts are exposed as `quick_xml` events and
//! binary parts as BIFF12 records, both through [`RecordReader::next_record`].

use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom};

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use crate::biff12::{Biff12Reader, Biff12Record};
use crate::errors::Result;
use crate::path::{Encoding, PartKind};

/// The inflated bytes of one package entry.
///
/// Obtained from [`crate::SpreadsheetPackage`]; owned by whoever holds it and independent of
/// later calls on the package.
#[derive(Debug, Clone)]
pub struct EntryStream {
    part_name: String,
    inner: Cursor<Vec<u8>>,
}

impl EntryStream {
    pub(crate) fn new(part_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            part_name: part_name.into(),
            inner: Cursor::new(bytes),
        }
    }

    /// Entry name as stored in the container.
    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    /// Total size in bytes, independent of the current position.
    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get_ref().is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

impl Read for EntryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for EntryStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

impl Seek for EntryStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// Event reader over an XML part.
pub struct XmlPartReader {
    reader: XmlReader<EntryStream>,
    buf: Vec<u8>,
}

impl XmlPartReader {
    fn new(stream: EntryStream) -> Self {
        Self {
            reader: XmlReader::from_reader(stream),
            buf: Vec::new(),
        }
    }

    fn part_name(&self) -> &str {
        self.reader.get_ref().part_name()
    }

    /// Next XML event; `None` once the document is exhausted.
    pub fn read_event(&mut self) -> Result<Option<Event<'_>>> {
        self.buf.clear();
        match self.reader.read_event_into(&mut self.buf)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }

    /// Access the underlying `quick_xml` reader, e.g. to adjust its configuration.
    pub fn xml_reader_mut(&mut self) -> &mut XmlReader<EntryStream> {
        &mut self.reader
    }

    fn into_stream(self) -> EntryStream {
        self.reader.into_inner()
    }
}

/// Record reader over a BIFF12 (`.bin`) part.
pub struct BinaryPartReader {
    part_name: String,
    reader: Biff12Reader<EntryStream>,
    buf: Vec<u8>,
}

impl BinaryPartReader {
    fn new(stream: EntryStream) -> Self {
        Self {
            part_name: stream.part_name().to_string(),
            reader: Biff12Reader::new(stream),
            buf: Vec::new(),
        }
    }

    fn part_name(&self) -> &str {
        &self.part_name
    }

    /// Next record; `None` at a clean end of stream.
    pub fn read_record(&mut self) -> Result<Option<Biff12Record<'_>>> {
        Ok(self.reader.read_record(&mut self.buf)?)
    }

    fn into_stream(self) -> EntryStream {
        self.reader.into_inner()
    }
}

/// One item from a [`RecordReader`].
#[derive(Debug)]
pub enum PartRecord<'a> {
    Xml(Event<'a>),
    Binary(Biff12Record<'a>),
}

/// A reader for one logical part, tagged with the part kind and its encoding.
///
/// Comments are only available as XML.
pub enum RecordReader {
    XmlSharedStrings(XmlPartReader),
    BinarySharedStrings(BinaryPartReader),
    XmlStyles(XmlPartReader),
    BinaryStyles(BinaryPartReader),
    XmlWorkbook(XmlPartReader),
    BinaryWorkbook(BinaryPartReader),
    XmlWorksheet(XmlPartReader),
    BinaryWorksheet(BinaryPartReader),
    XmlComments(XmlPartReader),
}

impl RecordReader {
    /// Wrap an opened entry in the variant for `kind` and `encoding`.
    ///
    /// Returns `None` for combinations that have no reader: workbook relationships (exposed as a
    /// raw [`EntryStream`] instead) and binary comments.
    pub fn new(kind: PartKind, encoding: Encoding, stream: EntryStream) -> Option<Self> {
        let reader = match (kind, encoding) {
            (PartKind::SharedStrings, Encoding::Xml) => {
                RecordReader::XmlSharedStrings(XmlPartReader::new(stream))
            }
            (PartKind::SharedStrings, Encoding::Binary) => {
                RecordReader::BinarySharedStrings(BinaryPartReader::new(stream))
            }
            (PartKind::Styles, Encoding::Xml) => {
                RecordReader::XmlStyles(XmlPartReader::new(stream))
            }
            (PartKind::Styles, Encoding::Binary) => {
                RecordReader::BinaryStyles(BinaryPartReader::new(stream))
            }
            (PartKind::Workbook, Encoding::Xml) => {
                RecordReader::XmlWorkbook(XmlPartReader::new(stream))
            }
            (PartKind::Workbook, Encoding::Binary) => {
                RecordReader::BinaryWorkbook(BinaryPartReader::new(stream))
            }
            (PartKind::Worksheet, Encoding::Xml) => {
                RecordReader::XmlWorksheet(XmlPartReader::new(stream))
            }
            (PartKind::Worksheet, Encoding::Binary) => {
                RecordReader::BinaryWorksheet(BinaryPartReader::new(stream))
            }
            (PartKind::Comments, Encoding::Xml) => {
                RecordReader::XmlComments(XmlPartReader::new(stream))
            }
            (PartKind::Comments, Encoding::Binary) | (PartKind::WorkbookRelationships, _) => {
                return None
            }
        };
        Some(reader)
    }

    pub fn kind(&self) -> PartKind {
        match self {
            RecordReader::XmlSharedStrings(_) | RecordReader::BinarySharedStrings(_) => {
                PartKind::SharedStrings
            }
            RecordReader::XmlStyles(_) | RecordReader::BinaryStyles(_) => PartKind::Styles,
            RecordReader::XmlWorkbook(_) | RecordReader::BinaryWorkbook(_) => PartKind::Workbook,
            RecordReader::XmlWorksheet(_) | RecordReader::BinaryWorksheet(_) => PartKind::Worksheet,
            RecordReader::XmlComments(_) => PartKind::Comments,
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            RecordReader::XmlSharedStrings(_)
            | RecordReader::XmlStyles(_)
            | RecordReader::XmlWorkbook(_)
            | RecordReader::XmlWorksheet(_)
            | RecordReader::XmlComments(_) => Encoding::Xml,
            RecordReader::BinarySharedStrings(_)
            | RecordReader::BinaryStyles(_)
            | RecordReader::BinaryWorkbook(_)
            | RecordReader::BinaryWorksheet(_) => Encoding::Binary,
        }
    }

    /// Entry name of the wrapped part, as stored in the container.
    pub fn part_name(&self) -> &str {
        match self {
            RecordReader::XmlSharedStrings(r)
            | RecordReader::XmlStyles(r)
            | RecordReader::XmlWorkbook(r)
            | RecordReader::XmlWorksheet(r)
            | RecordReader::XmlComments(r) => r.part_name(),
            RecordReader::BinarySharedStrings(r)
            | RecordReader::BinaryStyles(r)
            | RecordReader::BinaryWorkbook(r)
            | RecordReader::BinaryWorksheet(r) => r.part_name(),
        }
    }

    pub fn as_xml(&self) -> Option<&XmlPartReader> {
        match self {
            RecordReader::XmlSharedStrings(r)
            | RecordReader::XmlStyles(r)
            | RecordReader::XmlWorkbook(r)
            | RecordReader::XmlWorksheet(r)
            | RecordReader::XmlComments(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&BinaryPartReader> {
        match self {
            RecordReader::BinarySharedStrings(r)
            | RecordReader::BinaryStyles(r)
            | RecordReader::BinaryWorkbook(r)
            | RecordReader::BinaryWorksheet(r) => Some(r),
            _ => None,
        }
    }

    /// Next XML event or BIFF12 record; `None` at the end of the part.
    pub fn next_record(&mut self) -> Result<Option<PartRecord<'_>>> {
        match self {
            RecordReader::XmlSharedStrings(r)
            | RecordReader::XmlStyles(r)
            | RecordReader::XmlWorkbook(r)
            | RecordReader::XmlWorksheet(r)
            | RecordReader::XmlComments(r) => Ok(r.read_event()?.map(PartRecord::Xml)),
            RecordReader::BinarySharedStrings(r)
            | RecordReader::BinaryStyles(r)
            | RecordReader::BinaryWorkbook(r)
            | RecordReader::BinaryWorksheet(r) => Ok(r.read_record()?.map(PartRecord::Binary)),
        }
    }

    /// Give up the reader and return the wrapped entry stream.
    pub fn into_stream(self) -> EntryStream {
        match self {
            RecordReader::XmlSharedStrings(r)
            | RecordReader::XmlStyles(r)
            | RecordReader::XmlWorkbook(r)
            | RecordReader::XmlWorksheet(r)
            | RecordReader::XmlComments(r) => r.into_stream(),
            RecordReader::BinarySharedStrings(r)
            | RecordReader::BinaryStyles(r)
            | RecordReader::BinaryWorkbook(r)
            | RecordReader::BinaryWorksheet(r) => r.into_stream(),
        }
    }
}

impl std::fmt::Debug for RecordReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReader")
            .field("kind", &self.kind())
            .field("encoding", &self.encoding())
            .field("part_name", &self.part_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_picks_variant_by_kind_and_encoding() {
        let stream = || EntryStream::new("xl/styles.bin", Vec::new());
        let reader = RecordReader::new(PartKind::Styles, Encoding::Binary, stream()).unwrap();
        assert!(matches!(reader, RecordReader::BinaryStyles(_)));
        assert_eq!(reader.kind(), PartKind::Styles);
        assert_eq!(reader.encoding(), Encoding::Binary);
        assert_eq!(reader.part_name(), "xl/styles.bin");

        assert!(RecordReader::new(PartKind::Comments, Encoding::Binary, stream()).is_none());
        assert!(
            RecordReader::new(PartKind::WorkbookRelationships, Encoding::Xml, stream()).is_none()
        );
    }

    #[test]
    fn xml_reader_yields_events_then_none() {
        let stream = EntryStream::new(
            "xl/sharedStrings.xml",
            br#"<sst count="1"><si><t>Hello</t></si></sst>"#.to_vec(),
        );
        let mut reader = RecordReader::new(PartKind::SharedStrings, Encoding::Xml, stream).unwrap();

        let mut texts = Vec::new();
        let mut count = 0;
        while let Some(record) = reader.next_record().unwrap() {
            count += 1;
            if let PartRecord::Xml(Event::Text(text)) = record {
                texts.push(text.unescape().unwrap().into_owned());
            }
        }
        assert_eq!(texts, vec!["Hello".to_string()]);
        assert_eq!(count, 7);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn binary_reader_yields_records() {
        let stream = EntryStream::new(
            "xl/worksheets/sheet1.bin",
            vec![0x81, 0x01, 0x00, 0x82, 0x01, 0x00],
        );
        let mut reader = RecordReader::new(PartKind::Worksheet, Encoding::Binary, stream).unwrap();

        let mut ids = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            match record {
                PartRecord::Binary(rec) => ids.push(rec.id),
                PartRecord::Xml(_) => panic!("binary reader produced an XML event"),
            }
        }
        assert_eq!(ids, vec![0x0181, 0x0182]);
    }

    #[test]
    fn binary_into_stream_keeps_unread_records() {
        let stream = EntryStream::new(
            "xl/workbook.bin",
            vec![0x83, 0x01, 0x00, 0x84, 0x01, 0x00],
        );
        let mut reader = RecordReader::new(PartKind::Workbook, Encoding::Binary, stream).unwrap();
        assert!(matches!(
            reader.next_record().unwrap(),
            Some(PartRecord::Binary(Biff12Record { id: 0x0183, .. }))
        ));

        let mut stream = reader.into_stream();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, vec![0x84, 0x01, 0x00]);
    }

    #[test]
    fn into_stream_returns_the_wrapped_bytes() {
        let stream = EntryStream::new("xl/workbook.xml", b"<workbook/>".to_vec());
        let reader = RecordReader::new(PartKind::Workbook, Encoding::Xml, stream).unwrap();
        let stream = reader.into_stream();
        assert_eq!(stream.part_name(), "xl/workbook.xml");
        assert_eq!(stream.len(), 11);
    }
}
