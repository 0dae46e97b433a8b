//! Relationship documents (`*.rels`).
//!
//! The comments lookup walks a worksheet's relationships part with a pull cursor and stops at
//! the first comments-typed relationship, so large `.rels` parts are never fully materialized.
//! Anything that does not look like a relationships document is treated as "no comments".

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::{NsReader, Reader};

use crate::errors::Result;

/// OPC package relationships namespace.
pub const PACKAGE_RELATIONSHIPS_NS: &[u8] =
    b"http://schemas.openxmlformats.org/package/2006/relationships";

const RELATIONSHIPS_ELEMENT: &[u8] = b"Relationships";
const RELATIONSHIP_ELEMENT: &[u8] = b"Relationship";

/// Relationship types are matched on this suffix. Legacy (`.../comments`) and any other type
/// ending the same way are treated alike.
const COMMENTS_TYPE_SUFFIX: &str = "comments";

const WORKSHEET_TYPE_SUFFIX: &str = "/worksheet";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_uri: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl Relationship {
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.trim().eq_ignore_ascii_case("External"))
    }

    pub fn is_worksheet(&self) -> bool {
        self.type_uri.ends_with(WORKSHEET_TYPE_SUFFIX)
    }
}

/// The node the cursor is positioned on.
#[derive(Debug)]
enum Node {
    /// Nothing read yet.
    Initial,
    Open {
        element: BytesStart<'static>,
        in_rels_ns: bool,
        empty: bool,
    },
    Close,
    /// Text, comments, declarations and other non-element content.
    Content,
    Eof,
}

/// Pull cursor over a relationships document.
///
/// `advance` moves to the next token; `skip` moves past the current element's whole subtree.
struct RelsCursor<R> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    node: Node,
}

impl<R: BufRead> RelsCursor<R> {
    fn new(input: R) -> Self {
        Self {
            reader: NsReader::from_reader(input),
            buf: Vec::new(),
            node: Node::Initial,
        }
    }

    fn advance(&mut self) -> Result<()> {
        self.buf.clear();
        let (ns, event) = self.reader.read_resolved_event_into(&mut self.buf)?;
        let in_rels_ns = matches!(
            ns,
            ResolveResult::Bound(Namespace(uri)) if uri == PACKAGE_RELATIONSHIPS_NS
        );
        self.node = match event {
            Event::Start(start) => Node::Open {
                element: start.into_owned(),
                in_rels_ns,
                empty: false,
            },
            Event::Empty(start) => Node::Open {
                element: start.into_owned(),
                in_rels_ns,
                empty: true,
            },
            Event::End(_) => Node::Close,
            Event::Eof => Node::Eof,
            _ => Node::Content,
        };
        Ok(())
    }

    /// Advance until positioned on an element (or the end of input).
    fn advance_to_element(&mut self) -> Result<()> {
        loop {
            self.advance()?;
            if !matches!(self.node, Node::Content) {
                return Ok(());
            }
        }
    }

    /// Move past the current node. For an element with content this consumes everything up to
    /// and including its end tag.
    ///
    /// The subtree is walked event by event so the reader pops any namespace scope the skipped
    /// element declared when its end tag is read.
    fn skip(&mut self) -> Result<()> {
        if matches!(self.node, Node::Open { empty: false, .. }) {
            let mut depth = 1usize;
            while depth > 0 {
                self.buf.clear();
                match self.reader.read_resolved_event_into(&mut self.buf)?.1 {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => depth -= 1,
                    Event::Eof => {
                        self.node = Node::Eof;
                        return Ok(());
                    }
                    _ => {}
                }
            }
        }
        self.advance()
    }

    fn is_element(&self, local: &[u8]) -> bool {
        matches!(
            &self.node,
            Node::Open { element, in_rels_ns: true, .. } if element.local_name().as_ref() == local
        )
    }

    /// Unescaped value of an attribute on the current element, matched by local name.
    fn attribute(&self, local: &[u8]) -> Option<String> {
        let Node::Open { element, .. } = &self.node else {
            return None;
        };
        element
            .attributes()
            .filter_map(|attr| attr.ok())
            .find(|attr| attr.key.local_name().as_ref() == local)
            .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
    }
}

/// Scan a worksheet relationships document for the first comments relationship and return its
/// raw `Target`.
///
/// Returns `None` when the document is not a `Relationships` element in the package
/// relationships namespace, has no children, or has no comments-typed relationship. If the
/// document breaks part-way through, whatever was found up to that point is returned.
pub fn find_comments_target<R: BufRead>(input: R) -> Option<String> {
    let mut cursor = RelsCursor::new(input);

    if cursor.advance_to_element().is_err() || !cursor.is_element(RELATIONSHIPS_ELEMENT) {
        log::debug!("relationships part does not start with a package Relationships element");
        return None;
    }
    if matches!(cursor.node, Node::Open { empty: true, .. }) {
        return None;
    }
    if cursor.advance().is_err() {
        return None;
    }

    loop {
        match &cursor.node {
            Node::Eof | Node::Close => return None,
            Node::Open { .. } if cursor.is_element(RELATIONSHIP_ELEMENT) => {
                let is_comments = cursor
                    .attribute(b"Type")
                    .is_some_and(|ty| ty.ends_with(COMMENTS_TYPE_SUFFIX));
                if is_comments {
                    let target = cursor.attribute(b"Target");
                    if target.is_none() {
                        log::debug!("comments relationship has no Target attribute");
                    }
                    return target;
                }
            }
            _ => {}
        }

        if let Err(err) = cursor.skip() {
            log::debug!("stopped scanning relationships part: {err}");
            return None;
        }
    }
}

/// Parse every `Relationship` element of a relationships part.
///
/// Entries missing an `Id`, `Type` or `Target` are dropped; duplicates are kept in document order.
pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) | Event::Empty(start)
                if start.local_name().as_ref() == RELATIONSHIP_ELEMENT =>
            {
                let mut id = None;
                let mut target = None;
                let mut type_uri = None;
                let mut target_mode = None;
                for attr in start.attributes() {
                    let attr = attr?;
                    let value = attr.unescape_value()?.into_owned();
                    match attr.key.local_name().as_ref() {
                        b"Id" => id = Some(value),
                        b"Target" => target = Some(value),
                        b"Type" => type_uri = Some(value),
                        b"TargetMode" => target_mode = Some(value),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target), Some(type_uri)) = (id, target, type_uri) {
                    relationships.push(Relationship {
                        id,
                        type_uri,
                        target,
                        target_mode,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMENTS_TYPE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
    const HYPERLINK_TYPE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
    const VML_TYPE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/vmlDrawing";

    fn rels(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{body}</Relationships>"#
        )
    }

    fn rel(id: &str, ty: &str, target: &str) -> String {
        format!(r#"<Relationship Id="{id}" Type="{ty}" Target="{target}"/>"#)
    }

    #[test]
    fn finds_comments_after_other_relationships() {
        let xml = rels(&format!(
            "{}{}{}",
            rel("rId1", HYPERLINK_TYPE, "https://example.com"),
            rel("rId2", VML_TYPE, "../drawings/vmlDrawing1.vml"),
            rel("rId3", COMMENTS_TYPE, "../comments1.xml"),
        ));
        assert_eq!(
            find_comments_target(xml.as_bytes()).as_deref(),
            Some("../comments1.xml")
        );
    }

    #[test]
    fn first_comments_relationship_wins() {
        let xml = rels(&format!(
            "{}{}",
            rel("rId1", COMMENTS_TYPE, "../comments1.xml"),
            rel("rId2", COMMENTS_TYPE, "../comments2.xml"),
        ));
        assert_eq!(
            find_comments_target(xml.as_bytes()).as_deref(),
            Some("../comments1.xml")
        );
    }

    #[test]
    fn scan_stops_before_inspecting_later_content() {
        // The broken markup after the match is never reached.
        let xml = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}<Relationship Type="</Broken>"#,
            rel("rId1", COMMENTS_TYPE, "../comments1.xml"),
        );
        assert_eq!(
            find_comments_target(xml.as_bytes()).as_deref(),
            Some("../comments1.xml")
        );
    }

    #[test]
    fn no_comments_relationship_is_none() {
        let xml = rels(&rel("rId1", HYPERLINK_TYPE, "https://example.com"));
        assert_eq!(find_comments_target(xml.as_bytes()), None);
    }

    #[test]
    fn empty_root_is_none() {
        let xml = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#;
        assert_eq!(find_comments_target(xml.as_bytes()), None);
        assert_eq!(find_comments_target(rels("").as_bytes()), None);
    }

    #[test]
    fn wrong_root_or_namespace_is_none() {
        let wrong_ns = format!(
            r#"<Relationships xmlns="urn:example">{}</Relationships>"#,
            rel("rId1", COMMENTS_TYPE, "../comments1.xml")
        );
        assert_eq!(find_comments_target(wrong_ns.as_bytes()), None);

        let wrong_root = format!(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Types>"#,
            rel("rId1", COMMENTS_TYPE, "../comments1.xml")
        );
        assert_eq!(find_comments_target(wrong_root.as_bytes()), None);

        assert_eq!(find_comments_target(&b""[..]), None);
        assert_eq!(find_comments_target(&b"not xml at all"[..]), None);
    }

    #[test]
    fn prefixed_namespace_is_accepted() {
        let xml = format!(
            r#"<r:Relationships xmlns:r="http://schemas.openxmlformats.org/package/2006/relationships"><r:Relationship Id="rId1" Type="{COMMENTS_TYPE}" Target="../comments9.xml"/></r:Relationships>"#
        );
        assert_eq!(
            find_comments_target(xml.as_bytes()).as_deref(),
            Some("../comments9.xml")
        );
    }

    #[test]
    fn unknown_elements_are_skipped_with_their_subtree() {
        let xml = rels(&format!(
            r#"<!-- producer note --><ext xmlns="urn:vendor"><Relationship Type="{COMMENTS_TYPE}" Target="../wrong.xml"/></ext>{}"#,
            rel("rId1", COMMENTS_TYPE, "../comments1.xml")
        ));
        assert_eq!(
            find_comments_target(xml.as_bytes()).as_deref(),
            Some("../comments1.xml")
        );
    }

    #[test]
    fn skipped_element_namespace_does_not_leak_to_siblings() {
        for ext in [
            r#"<ext xmlns="urn:vendor"><x/></ext>"#,
            r#"<ext xmlns="urn:vendor"><ext><ext/></ext></ext>"#,
            r#"<ext xmlns="urn:vendor"/>"#,
            r#"<v:ext xmlns:v="urn:vendor"><v:x/></v:ext>"#,
            r#"<ext><x xmlns="urn:vendor"/></ext>"#,
        ] {
            let xml = rels(&format!("{ext}{}", rel("rId1", COMMENTS_TYPE, "../comments1.xml")));
            assert_eq!(
                find_comments_target(xml.as_bytes()).as_deref(),
                Some("../comments1.xml"),
                "{ext}"
            );
        }
    }

    #[test]
    fn truncated_subtree_is_none() {
        let xml = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><ext><x/>{}"#,
            rel("rId1", COMMENTS_TYPE, "../comments1.xml")
        );
        assert_eq!(find_comments_target(xml.as_bytes()), None);
    }

    #[test]
    fn non_empty_relationship_elements_are_skipped() {
        let xml = rels(&format!(
            r#"<Relationship Id="rId1" Type="{HYPERLINK_TYPE}" Target="x"><child/></Relationship>{}"#,
            rel("rId2", COMMENTS_TYPE, "../comments1.xml")
        ));
        assert_eq!(
            find_comments_target(xml.as_bytes()).as_deref(),
            Some("../comments1.xml")
        );
    }

    #[test]
    fn malformed_document_before_match_is_none() {
        let xml = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}<a></b>{}</Relationships>"#,
            rel("rId1", HYPERLINK_TYPE, "x"),
            rel("rId2", COMMENTS_TYPE, "../comments1.xml"),
        );
        assert_eq!(find_comments_target(xml.as_bytes()), None);
    }

    #[test]
    fn parse_relationships_keeps_duplicates_and_target_mode() {
        let xml = rels(&format!(
            r#"{}{}<Relationship Id="rId3" Type="{HYPERLINK_TYPE}" Target="https://example.com" TargetMode="External"/>"#,
            rel("rId1", COMMENTS_TYPE, "../comments1.xml"),
            rel("rId1", COMMENTS_TYPE, "../comments1.xml"),
        ));
        let parsed = parse_relationships(xml.as_bytes()).expect("parse relationships");
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0], parsed[1]);
        assert!(parsed[2].is_external());
        assert!(!parsed[0].is_external());
    }
}
