//! Theme part parsing: font scheme and colour scheme.

use quick_xml::events::Event;

use super::xml::{attr, reader};
use crate::core::models::{NamedColor, Rgb};
use crate::errors::GenerationError;

const SCHEME_COLORS: [&[u8]; 12] = [
    b"dk1", b"lt1", b"dk2", b"lt2", b"accent1", b"accent2", b"accent3", b"accent4", b"accent5",
    b"accent6", b"hlink", b"folHlink",
];

/// Fonts and colours declared by a theme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeInfo {
    pub name: String,
    /// Latin typeface of the major (heading) font.
    pub major_font: Option<String>,
    /// Latin typeface of the minor (body) font.
    pub minor_font: Option<String>,
    /// Scheme colours that resolve to sRGB, in document order.
    pub colors: Vec<NamedColor>,
}

impl ThemeInfo {
    #[must_use]
    pub fn color(&self, name: &str) -> Option<Rgb> {
        self.colors.iter().find(|c| c.name == name).map(|c| c.rgb)
    }

    /// Resolves `+mj-lt` / `+mn-lt` theme references; other typefaces pass through.
    #[must_use]
    pub fn resolve_typeface(&self, typeface: &str) -> Option<String> {
        match typeface {
            t if t.starts_with("+mj") => self.major_font.clone(),
            t if t.starts_with("+mn") => self.minor_font.clone(),
            "" => None,
            other => Some(other.to_string()),
        }
    }
}

/// Parses a `theme*.xml` part.
///
/// # Errors
///
/// Returns `InvalidTemplate` when the part is not well-formed XML.
pub fn parse_theme(xml: &[u8]) -> Result<ThemeInfo, GenerationError> {
    let mut reader = reader(xml);
    let mut theme = ThemeInfo::default();

    let mut in_major_font = false;
    let mut in_minor_font = false;
    let mut in_color_scheme = false;
    let mut current_color: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let tag_name = e.local_name();
                match tag_name.as_ref() {
                    b"theme" => theme.name = attr(e, b"name").unwrap_or_default(),
                    b"clrScheme" => in_color_scheme = true,
                    b"majorFont" => in_major_font = true,
                    b"minorFont" => in_minor_font = true,
                    b"latin" if in_major_font || in_minor_font => {
                        let typeface = attr(e, b"typeface").filter(|t| !t.is_empty());
                        if in_major_font {
                            theme.major_font = typeface;
                        } else {
                            theme.minor_font = typeface;
                        }
                    },
                    name if in_color_scheme && SCHEME_COLORS.contains(&name) => {
                        current_color = Some(String::from_utf8_lossy(name).into_owned());
                    },
                    b"srgbClr" if in_color_scheme => {
                        let rgb = attr(e, b"val").as_deref().and_then(Rgb::from_hex);
                        if let (Some(name), Some(rgb)) = (current_color.take(), rgb) {
                            theme.colors.push(NamedColor { name, rgb });
                        }
                    },
                    // System colours carry their last rendered value.
                    b"sysClr" if in_color_scheme => {
                        let rgb = attr(e, b"lastClr").as_deref().and_then(Rgb::from_hex);
                        if let (Some(name), Some(rgb)) = (current_color.take(), rgb) {
                            theme.colors.push(NamedColor { name, rgb });
                        }
                    },
                    _ => {},
                }
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"clrScheme" => in_color_scheme = false,
                b"majorFont" => in_major_font = false,
                b"minorFont" => in_minor_font = false,
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(theme)
}

#[cfg(test)]
mod tests {
    use super::*;

    const THEME: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme">
  <a:themeElements>
    <a:clrScheme name="Office">
      <a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>
      <a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>
      <a:dk2><a:srgbClr val="1F497D"/></a:dk2>
      <a:accent1><a:srgbClr val="4F81BD"/></a:accent1>
    </a:clrScheme>
    <a:fontScheme name="Office">
      <a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/></a:majorFont>
      <a:minorFont><a:latin typeface="Calibri"/></a:minorFont>
    </a:fontScheme>
  </a:themeElements>
</a:theme>"#;

    #[test]
    fn test_parse_theme() {
        let theme = parse_theme(THEME.as_bytes()).unwrap();
        assert_eq!(theme.name, "Office Theme");
        assert_eq!(theme.major_font.as_deref(), Some("Calibri Light"));
        assert_eq!(theme.minor_font.as_deref(), Some("Calibri"));
        assert_eq!(theme.colors.len(), 4);
        assert_eq!(theme.color("dk1"), Some(Rgb(0, 0, 0)));
        assert_eq!(theme.color("accent1"), Some(Rgb(0x4F, 0x81, 0xBD)));
        assert_eq!(theme.color("accent2"), None);
    }

    #[test]
    fn test_resolve_typeface() {
        let theme = parse_theme(THEME.as_bytes()).unwrap();
        assert_eq!(theme.resolve_typeface("+mj-lt").as_deref(), Some("Calibri Light"));
        assert_eq!(theme.resolve_typeface("+mn-lt").as_deref(), Some("Calibri"));
        assert_eq!(theme.resolve_typeface("Georgia").as_deref(), Some("Georgia"));
        assert_eq!(ThemeInfo::default().resolve_typeface("+mj-lt"), None);
    }

    #[test]
    fn test_malformed_theme_is_invalid_template() {
        let err = parse_theme(b"<a:theme><a:clrScheme></a:theme>").unwrap_err();
        assert!(matches!(err, GenerationError::InvalidTemplate(_)));
    }
}
