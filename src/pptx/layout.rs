//! Slide layout catalogue and per-slide layout choice.

use quick_xml::events::Event;

use super::xml::{attr, reader};
use crate::core::models::{LayoutInfo, PlaceholderInfo, SlideKind};
use crate::errors::GenerationError;

/// Placeholder type when `p:ph` has no `type` attribute.
pub const DEFAULT_PLACEHOLDER_TYPE: &str = "obj";

/// Reads a layout's name and placeholders.
///
/// # Errors
///
/// Returns `InvalidTemplate` when the part is not well-formed XML.
pub fn parse_layout(index: usize, xml: &[u8]) -> Result<LayoutInfo, GenerationError> {
    let mut reader = reader(xml);
    let mut name = String::new();
    let mut placeholders = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"cSld" => name = attr(e, b"name").unwrap_or_default(),
                b"ph" => placeholders.push(PlaceholderInfo {
                    kind: attr(e, b"type").unwrap_or_else(|| DEFAULT_PLACEHOLDER_TYPE.to_string()),
                    idx: attr(e, b"idx")
                        .and_then(|v| v.trim().parse().ok())
                        .unwrap_or(0),
                }),
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(LayoutInfo {
        index,
        name,
        placeholder_count: placeholders.len(),
        placeholders,
    })
}

/// Index into `layouts` to use for a slide of `kind`. `layouts` must not be empty.
#[must_use]
pub fn select_layout(kind: SlideKind, layouts: &[LayoutInfo]) -> usize {
    match kind {
        SlideKind::Title => 0,
        SlideKind::Section => layouts
            .iter()
            .position(|l| l.name.to_lowercase().contains("section"))
            .unwrap_or(0),
        SlideKind::Content => {
            if layouts.len() > 1 {
                1
            } else {
                0
            }
        },
    }
}

#[must_use]
pub fn title_placeholder(layout: &LayoutInfo) -> Option<&PlaceholderInfo> {
    layout
        .placeholders
        .iter()
        .find(|p| p.kind == "title" || p.kind == "ctrTitle")
}

#[must_use]
pub fn subtitle_placeholder(layout: &LayoutInfo) -> Option<&PlaceholderInfo> {
    layout.placeholders.iter().find(|p| p.idx == 1)
}

/// First placeholder that takes body text.
#[must_use]
pub fn body_placeholder(layout: &LayoutInfo) -> Option<&PlaceholderInfo> {
    layout
        .placeholders
        .iter()
        .find(|p| p.kind == "body" || p.kind == DEFAULT_PLACEHOLDER_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(index: usize, name: &str, placeholders: &[(&str, u32)]) -> LayoutInfo {
        LayoutInfo {
            index,
            name: name.to_string(),
            placeholder_count: placeholders.len(),
            placeholders: placeholders
                .iter()
                .map(|(kind, idx)| PlaceholderInfo {
                    kind: (*kind).to_string(),
                    idx: *idx,
                })
                .collect(),
        }
    }

    #[test]
    fn test_parse_layout_reads_name_and_placeholders() {
        let xml = br#"<p:sldLayout xmlns:p="p" type="obj"><p:cSld name="Title and Content"><p:spTree>
            <p:sp><p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr></p:sp>
            <p:sp><p:nvSpPr><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr></p:sp>
            <p:sp><p:nvSpPr><p:nvPr><p:ph type="sldNum" sz="quarter" idx="12"/></p:nvPr></p:nvSpPr></p:sp>
            </p:spTree></p:cSld></p:sldLayout>"#;
        let info = parse_layout(1, xml).unwrap();
        assert_eq!(info.index, 1);
        assert_eq!(info.name, "Title and Content");
        assert_eq!(info.placeholder_count, 3);
        assert_eq!(info.placeholders[1].kind, "obj");
        assert_eq!(info.placeholders[1].idx, 1);
        assert_eq!(info.placeholders[2].idx, 12);
    }

    #[test]
    fn test_select_layout() {
        let layouts = vec![
            layout(0, "Title Slide", &[("ctrTitle", 0)]),
            layout(1, "Title and Content", &[("title", 0), ("obj", 1)]),
            layout(2, "Section Header", &[("title", 0), ("body", 1)]),
        ];
        assert_eq!(select_layout(SlideKind::Title, &layouts), 0);
        assert_eq!(select_layout(SlideKind::Content, &layouts), 1);
        assert_eq!(select_layout(SlideKind::Section, &layouts), 2);

        let single = vec![layout(0, "Blank", &[])];
        assert_eq!(select_layout(SlideKind::Content, &single), 0);
        assert_eq!(select_layout(SlideKind::Section, &single), 0);
    }

    #[test]
    fn test_placeholder_lookup() {
        let content = layout(1, "Title and Content", &[("title", 0), ("obj", 1), ("dt", 10)]);
        assert_eq!(title_placeholder(&content).map(|p| p.kind.as_str()), Some("title"));
        assert_eq!(body_placeholder(&content).map(|p| p.idx), Some(1));

        let title = layout(0, "Title Slide", &[("ctrTitle", 0), ("subTitle", 1)]);
        assert_eq!(subtitle_placeholder(&title).map(|p| p.kind.as_str()), Some("subTitle"));
        assert!(body_placeholder(&title).is_none());
    }
}
