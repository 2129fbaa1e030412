//! Small quick-xml helpers shared by the part readers and the slide writer.

use quick_xml::Reader;
use quick_xml::events::BytesStart;

pub const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
pub const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Escape XML special characters.
#[must_use]
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Reader over an in-memory part with whitespace-only text skipped.
pub fn reader(xml: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    reader
}

/// Value of the unprefixed attribute `name`, unescaped.
pub fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Value of a prefixed `*:id` attribute, i.e. a relationship id such as `r:id`.
pub fn rel_id(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id")
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

pub fn attr_i64(e: &BytesStart<'_>, name: &[u8]) -> Option<i64> {
    attr(e, name).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::Event;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(
            escape_xml("<tag>\"it's\"</tag>"),
            "&lt;tag&gt;&quot;it&apos;s&quot;&lt;/tag&gt;"
        );
    }

    #[test]
    fn test_rel_id_ignores_plain_id() {
        let xml = br#"<p:sldId xmlns:r="x" id="256" r:id="rId7"/>"#;
        let mut reader = reader(xml);
        let Ok(Event::Empty(e)) = reader.read_event() else {
            panic!("expected empty element");
        };
        assert_eq!(rel_id(&e).as_deref(), Some("rId7"));
        assert_eq!(attr_i64(&e, b"id"), Some(256));
        assert_eq!(attr(&e, b"missing"), None);
    }
}
