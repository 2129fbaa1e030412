//! Style extraction from an uploaded template.
//!
//! Fonts and colours start from the theme and are then refined by sampling
//! the runs of the first few template slides, where a larger font size is
//! taken as a sign of title text.

use quick_xml::events::{BytesStart, Event};
use tracing::{debug, info};

use super::layout::parse_layout;
use super::package::{PresentationParts, TemplatePackage};
use super::theme::{ThemeInfo, parse_theme};
use super::xml::{attr, attr_i64, reader};
use crate::core::models::{ColorSet, FontSet, Rgb, TemplateImage, TemplateStyle};
use crate::errors::GenerationError;

/// Slides sampled for fonts and for colours.
pub const FONT_SAMPLE_SLIDES: usize = 3;
pub const COLOR_SAMPLE_SLIDES: usize = 2;

/// Run sizes are in hundredths of a point.
const TITLE_SIZE_THRESHOLD: u32 = 2400;
const SUBTITLE_SIZE_THRESHOLD: u32 = 1800;

/// Formatting found on one `a:rPr`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub size: Option<u32>,
    pub typeface: Option<String>,
    pub color: Option<Rgb>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideScan {
    pub runs: Vec<RunStyle>,
    pub images: Vec<TemplateImage>,
}

const SHAPE_ELEMENTS: [&[u8]; 6] = [
    b"sp",
    b"grpSp",
    b"graphicFrame",
    b"cxnSp",
    b"pic",
    b"contentPart",
];

#[derive(Default)]
struct SlideScanner {
    slide_index: usize,
    stack: Vec<Vec<u8>>,
    sp_tree_depth: Option<usize>,
    shape_index: usize,
    pic: Option<(usize, TemplateImage)>,
    run: Option<(usize, RunStyle)>,
    scan: SlideScan,
}

impl SlideScanner {
    fn parent_is(&self, name: &[u8]) -> bool {
        self.stack.last().is_some_and(|p| p.as_slice() == name)
    }

    fn open(&mut self, e: &BytesStart<'_>) {
        let local = e.local_name();
        let name = local.as_ref();
        let depth = self.stack.len();

        if name == b"spTree" && self.sp_tree_depth.is_none() {
            self.sp_tree_depth = Some(depth);
            return;
        }

        if self.sp_tree_depth.is_some_and(|d| depth == d + 1) && SHAPE_ELEMENTS.contains(&name) {
            if name == b"pic" {
                let image = TemplateImage {
                    slide_index: self.slide_index,
                    shape_index: self.shape_index,
                    left: 0,
                    top: 0,
                    width: 0,
                    height: 0,
                };
                self.pic = Some((depth, image));
            }
            self.shape_index += 1;
            return;
        }

        let in_xfrm = self.parent_is(b"xfrm");
        if let (Some((_, image)), true) = (self.pic.as_mut(), in_xfrm) {
            match name {
                b"off" => {
                    image.left = attr_i64(e, b"x").unwrap_or_default();
                    image.top = attr_i64(e, b"y").unwrap_or_default();
                },
                b"ext" => {
                    image.width = attr_i64(e, b"cx").unwrap_or_default();
                    image.height = attr_i64(e, b"cy").unwrap_or_default();
                },
                _ => {},
            }
        }

        if name == b"rPr" {
            let size = attr(e, b"sz").and_then(|v| v.trim().parse().ok());
            self.run = Some((
                depth,
                RunStyle {
                    size,
                    ..RunStyle::default()
                },
            ));
            return;
        }

        let in_solid_fill = self.parent_is(b"solidFill");
        if let Some((run_depth, run)) = self.run.as_mut() {
            match name {
                b"latin" if depth == *run_depth + 1 => {
                    run.typeface = attr(e, b"typeface").filter(|t| !t.is_empty());
                },
                b"srgbClr" if depth == *run_depth + 2 && in_solid_fill => {
                    run.color = attr(e, b"val").as_deref().and_then(Rgb::from_hex);
                },
                _ => {},
            }
        }
    }

    fn close(&mut self, name: &[u8]) {
        let depth = self.stack.len();
        match name {
            b"pic" if self.pic.as_ref().is_some_and(|(d, _)| *d == depth) => {
                if let Some((_, image)) = self.pic.take() {
                    self.scan.images.push(image);
                }
            },
            b"rPr" if self.run.as_ref().is_some_and(|(d, _)| *d == depth) => {
                if let Some((_, run)) = self.run.take() {
                    self.scan.runs.push(run);
                }
            },
            _ => {},
        }
    }
}

/// Collects run formatting and top-level pictures from one slide part.
///
/// # Errors
///
/// Returns `InvalidTemplate` when the part is not well-formed XML.
pub fn scan_slide(slide_index: usize, xml: &[u8]) -> Result<SlideScan, GenerationError> {
    let mut reader = reader(xml);
    let mut scanner = SlideScanner {
        slide_index,
        ..SlideScanner::default()
    };

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                scanner.open(e);
                scanner.stack.push(e.local_name().as_ref().to_vec());
            },
            Event::Empty(ref e) => {
                scanner.open(e);
                scanner.close(e.local_name().as_ref());
            },
            Event::End(ref e) => {
                scanner.stack.pop();
                scanner.close(e.local_name().as_ref());
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(scanner.scan)
}

fn base_fonts(theme: &ThemeInfo) -> FontSet {
    let defaults = FontSet::default();
    let major = theme.major_font.clone();
    let minor = theme.minor_font.clone();
    FontSet {
        title: major.unwrap_or(defaults.title),
        subtitle: minor.clone().unwrap_or(defaults.subtitle),
        body: minor.unwrap_or(defaults.body),
    }
}

fn base_colors(theme: &ThemeInfo) -> ColorSet {
    let mut colors = ColorSet::default();
    if let Some(dark) = theme.color("dk1") {
        colors.title = dark;
        colors.body = dark;
    }
    if let Some(accent) = theme.color("accent1") {
        colors.accent = accent;
    }
    colors
}

/// Later runs win, matching the order a reader meets them.
fn apply_run_fonts(fonts: &mut FontSet, theme: &ThemeInfo, runs: &[RunStyle]) {
    for run in runs {
        let Some(typeface) = run.typeface.as_deref().and_then(|t| theme.resolve_typeface(t))
        else {
            continue;
        };
        match run.size {
            Some(size) if size > TITLE_SIZE_THRESHOLD => fonts.title = typeface,
            Some(size) if size > SUBTITLE_SIZE_THRESHOLD => fonts.subtitle = typeface,
            _ => fonts.body = typeface,
        }
    }
}

fn apply_run_colors(colors: &mut ColorSet, runs: &[RunStyle]) {
    for run in runs {
        let Some(color) = run.color else {
            continue;
        };
        if run.size.is_some_and(|size| size > TITLE_SIZE_THRESHOLD) {
            colors.title = color;
        } else {
            colors.body = color;
        }
    }
}

/// Builds a [`TemplateStyle`] from an opened package.
///
/// # Errors
///
/// Returns `InvalidTemplate` when a part that must be read is missing or malformed.
pub fn style_from_package(
    package: &TemplatePackage,
    parts: &PresentationParts,
) -> Result<TemplateStyle, GenerationError> {
    let theme = match &parts.theme {
        Some(part) => parse_theme(package.require(part)?)?,
        None => ThemeInfo::default(),
    };

    let layouts = parts
        .layouts
        .iter()
        .enumerate()
        .map(|(i, part)| package.require(part).and_then(|xml| parse_layout(i, xml)))
        .collect::<Result<Vec<_>, _>>()?;

    let scans = parts
        .slides
        .iter()
        .enumerate()
        .map(|(i, part)| package.require(part).and_then(|xml| scan_slide(i, xml)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut fonts = base_fonts(&theme);
    for scan in scans.iter().take(FONT_SAMPLE_SLIDES) {
        apply_run_fonts(&mut fonts, &theme, &scan.runs);
    }

    let mut colors = base_colors(&theme);
    for scan in scans.iter().take(COLOR_SAMPLE_SLIDES) {
        apply_run_colors(&mut colors, &scan.runs);
    }

    let images: Vec<TemplateImage> = scans.into_iter().flat_map(|s| s.images).collect();

    debug!(
        "Template theme '{}' with {} scheme colours",
        theme.name,
        theme.colors.len()
    );

    Ok(TemplateStyle {
        fonts,
        colors,
        theme_colors: theme.colors,
        layouts,
        images,
        slide_size: parts.slide_size.unwrap_or_default(),
    })
}

/// Reads the style of a `.pptx` template.
///
/// # Errors
///
/// Returns `InvalidTemplate` for anything that is not a readable presentation.
pub fn extract_style(bytes: &[u8]) -> Result<TemplateStyle, GenerationError> {
    let package = TemplatePackage::open(bytes)?;
    let parts = package.presentation_parts()?;
    let style = style_from_package(&package, &parts)?;

    info!(
        layouts = style.layouts.len(),
        slides = parts.slides.len(),
        "Extracted template style: title font '{}', body font '{}'",
        style.fonts.title,
        style.fonts.body
    );
    Ok(style)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<p:sld xmlns:p="p" xmlns:a="a" xmlns:r="r"><p:cSld><p:spTree>
<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>
<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/></a:xfrm></p:grpSpPr>
<p:sp><p:txBody><a:p>
  <a:r><a:rPr lang="en-US" sz="4400"><a:solidFill><a:srgbClr val="1F3864"/></a:solidFill><a:latin typeface="Georgia"/></a:rPr><a:t>Big</a:t></a:r>
  <a:r><a:rPr lang="en-US" sz="2000"><a:latin typeface="+mn-lt"/></a:rPr><a:t>Medium</a:t></a:r>
  <a:r><a:rPr lang="en-US" sz="1400"><a:ln><a:solidFill><a:srgbClr val="FF0000"/></a:solidFill></a:ln><a:latin typeface="Verdana"/></a:rPr><a:t>Small</a:t></a:r>
  <a:r><a:rPr lang="en-US"/><a:t>Plain</a:t></a:r>
</a:p></p:txBody></p:sp>
<p:pic><p:nvPicPr><p:cNvPr id="4" name="Picture 3"/></p:nvPicPr><p:blipFill/><p:spPr><a:xfrm><a:off x="100" y="200"/><a:ext cx="300" cy="400"/></a:xfrm></p:spPr></p:pic>
</p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn test_scan_slide_collects_runs_and_pictures() {
        let scan = scan_slide(0, SLIDE.as_bytes()).unwrap();
        assert_eq!(scan.runs.len(), 4);
        assert_eq!(
            scan.runs[0],
            RunStyle {
                size: Some(4400),
                typeface: Some("Georgia".to_string()),
                color: Some(Rgb(0x1F, 0x38, 0x64)),
            }
        );
        // Outline colour is not a fill colour.
        assert_eq!(scan.runs[2].color, None);
        assert_eq!(scan.runs[3], RunStyle::default());

        assert_eq!(
            scan.images,
            vec![TemplateImage {
                slide_index: 0,
                shape_index: 1,
                left: 100,
                top: 200,
                width: 300,
                height: 400,
            }]
        );
    }

    #[test]
    fn test_run_heuristics() {
        let theme = ThemeInfo {
            minor_font: Some("Calibri".to_string()),
            ..ThemeInfo::default()
        };
        let scan = scan_slide(0, SLIDE.as_bytes()).unwrap();

        let mut fonts = base_fonts(&theme);
        assert_eq!(fonts.title, "Arial");
        apply_run_fonts(&mut fonts, &theme, &scan.runs);
        assert_eq!(fonts.title, "Georgia");
        assert_eq!(fonts.subtitle, "Calibri");
        assert_eq!(fonts.body, "Verdana");

        let mut colors = base_colors(&theme);
        apply_run_colors(&mut colors, &scan.runs);
        assert_eq!(colors.title, Rgb(0x1F, 0x38, 0x64));
        assert_eq!(colors.body, ColorSet::default().body);
        assert_eq!(colors.accent, ColorSet::default().accent);
    }
}
