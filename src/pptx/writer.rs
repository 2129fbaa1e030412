//! Presentation assembly.
//!
//! The template package is kept as-is apart from its slides: existing slides
//! and their notes are dropped, one slide part is written per [`SlideEntry`],
//! `presentation.xml` gets a fresh slide id list, and anything no longer
//! reachable is pruned before the package is zipped again. Templates without
//! a notes master get a plain one so speaker notes have somewhere to live.

use std::fmt::Write as FmtWrite;

use quick_xml::Reader;
use quick_xml::events::Event;
use quick_xml::name::QName;
use tracing::{debug, info, warn};

use super::layout::{body_placeholder, select_layout, subtitle_placeholder, title_placeholder};
use super::package::{
    ContentTypes, NOTES_MASTER_CONTENT_TYPE, NOTES_SLIDE_CONTENT_TYPE, PRESENTATION_CONTENT_TYPE,
    PresentationParts, RELS_CONTENT_TYPE, Relationship, SLIDE_CONTENT_TYPE,
    TEMPLATE_CONTENT_TYPES, THEME_CONTENT_TYPE, TemplatePackage, next_rel_id, rel_kind,
    rels_part_name, relative_target,
};
use super::style::style_from_package;
use super::xml::{NS_A, NS_P, NS_R, XML_DECLARATION, attr, escape_xml};
use crate::core::models::{
    LayoutInfo, PlaceholderInfo, Rgb, SlideEntry, SlideKind, SlidePlan, TemplateStyle,
};
use crate::errors::GenerationError;

/// EMU per inch.
pub const EMU_PER_INCH: i64 = 914_400;

pub const TITLE_FONT_PT: u32 = 36;
pub const SUBTITLE_FONT_PT: u32 = 24;
pub const BODY_FONT_PT: u32 = 18;

/// First `p:sldId/@id`; lower values are reserved.
const FIRST_SLIDE_ID: u32 = 256;

/// Extension that carries PowerPoint 2010 sections.
const SECTION_EXT_URI: &str = "{521415D9-36F7-43E2-AB2F-B90AF26B5E84}";

/// Position and size in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

/// Text box used for bullets when the layout has no body placeholder.
pub const BODY_BOX: Rect = Rect {
    x: EMU_PER_INCH / 2,
    y: 2 * EMU_PER_INCH,
    cx: 9 * EMU_PER_INCH,
    cy: 5 * EMU_PER_INCH,
};

/// Text box used for the title when the layout has no title placeholder.
#[must_use]
pub fn title_box(slide_width: i64) -> Rect {
    let margin = EMU_PER_INCH / 2;
    Rect {
        x: margin,
        y: EMU_PER_INCH * 3 / 10,
        cx: (slide_width - 2 * margin).max(EMU_PER_INCH),
        cy: EMU_PER_INCH * 5 / 4,
    }
}

#[derive(Debug, Clone, Copy)]
struct RunFormat<'a> {
    size_pt: u32,
    typeface: &'a str,
    color: Option<Rgb>,
}

impl<'a> RunFormat<'a> {
    fn title(style: &'a TemplateStyle) -> Self {
        Self {
            size_pt: TITLE_FONT_PT,
            typeface: &style.fonts.title,
            color: Some(style.colors.title),
        }
    }

    fn subtitle(style: &'a TemplateStyle) -> Self {
        Self {
            size_pt: SUBTITLE_FONT_PT,
            typeface: &style.fonts.subtitle,
            color: None,
        }
    }

    fn body(style: &'a TemplateStyle) -> Self {
        Self {
            size_pt: BODY_FONT_PT,
            typeface: &style.fonts.body,
            color: Some(style.colors.body),
        }
    }
}

/// Removes characters XML 1.0 cannot carry; line breaks become spaces.
fn clean_text(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .filter(|c| !c.is_control() || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}

fn write_run(xml: &mut String, text: &str, format: RunFormat<'_>) -> Result<(), GenerationError> {
    write!(
        xml,
        r#"<a:r><a:rPr lang="en-US" sz="{}" dirty="0">"#,
        format.size_pt * 100
    )?;
    if let Some(color) = format.color {
        write!(
            xml,
            r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#,
            color.to_hex()
        )?;
    }
    write!(
        xml,
        r#"<a:latin typeface="{0}"/><a:cs typeface="{0}"/>"#,
        escape_xml(format.typeface)
    )?;
    write!(xml, "</a:rPr><a:t>{}</a:t></a:r>", escape_xml(&clean_text(text)))?;
    Ok(())
}

fn write_paragraphs(
    xml: &mut String,
    lines: &[&str],
    format: RunFormat<'_>,
    bullets: bool,
) -> Result<(), GenerationError> {
    for line in lines {
        xml.push_str("<a:p>");
        if bullets {
            xml.push_str(r#"<a:pPr marL="342900" indent="-342900">"#);
            xml.push_str(r#"<a:buFont typeface="Arial"/><a:buChar char="•"/></a:pPr>"#);
        }
        write_run(xml, line, format)?;
        xml.push_str("</a:p>");
    }
    Ok(())
}

fn write_placeholder(
    xml: &mut String,
    id: u32,
    name: &str,
    placeholder: &PlaceholderInfo,
    lines: &[&str],
    format: RunFormat<'_>,
) -> Result<(), GenerationError> {
    xml.push_str("<p:sp><p:nvSpPr>");
    write!(xml, r#"<p:cNvPr id="{id}" name="{}"/>"#, escape_xml(name))?;
    xml.push_str(r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph"#);
    if placeholder.kind != "obj" {
        write!(xml, r#" type="{}""#, escape_xml(&placeholder.kind))?;
    }
    if placeholder.idx != 0 {
        write!(xml, r#" idx="{}""#, placeholder.idx)?;
    }
    xml.push_str("/></p:nvPr></p:nvSpPr><p:spPr/>");
    xml.push_str("<p:txBody><a:bodyPr/><a:lstStyle/>");
    write_paragraphs(xml, lines, format, false)?;
    xml.push_str("</p:txBody></p:sp>");
    Ok(())
}

fn write_text_box(
    xml: &mut String,
    id: u32,
    name: &str,
    rect: Rect,
    lines: &[&str],
    format: RunFormat<'_>,
    bullets: bool,
) -> Result<(), GenerationError> {
    xml.push_str("<p:sp><p:nvSpPr>");
    write!(xml, r#"<p:cNvPr id="{id}" name="{}"/>"#, escape_xml(name))?;
    xml.push_str(r#"<p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#);
    xml.push_str("<p:spPr><a:xfrm>");
    write!(xml, r#"<a:off x="{}" y="{}"/>"#, rect.x, rect.y)?;
    write!(xml, r#"<a:ext cx="{}" cy="{}"/>"#, rect.cx, rect.cy)?;
    xml.push_str(r#"</a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);
    xml.push_str(r#"<p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:normAutofit/></a:bodyPr><a:lstStyle/>"#);
    write_paragraphs(xml, lines, format, bullets)?;
    xml.push_str("</p:txBody></p:sp>");
    Ok(())
}

fn write_tree_open(xml: &mut String) {
    xml.push_str("<p:cSld><p:spTree>");
    xml.push_str(r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#);
    xml.push_str(r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/>"#);
    xml.push_str(r#"<a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#);
}

fn write_tree_close(xml: &mut String) {
    xml.push_str("</p:spTree></p:cSld>");
    xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>");
}

/// Slide part XML for one plan entry placed on `layout`.
///
/// # Errors
///
/// Returns `Internal` if formatting fails.
pub fn slide_xml(
    entry: &SlideEntry,
    layout: &LayoutInfo,
    style: &TemplateStyle,
) -> Result<String, GenerationError> {
    let mut xml = String::with_capacity(4096);
    xml.push_str(XML_DECLARATION);
    write!(
        xml,
        r#"<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}">"#
    )?;
    write_tree_open(&mut xml);

    let mut next_id = 2;

    match title_placeholder(layout) {
        Some(ph) => write_placeholder(
            &mut xml,
            next_id,
            "Title 1",
            ph,
            &[entry.title.as_str()],
            RunFormat::title(style),
        )?,
        None => write_text_box(
            &mut xml,
            next_id,
            "Title 1",
            title_box(style.slide_size.width),
            &[entry.title.as_str()],
            RunFormat::title(style),
            false,
        )?,
    }
    next_id += 1;

    let subtitle = entry
        .subtitle
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let (SlideKind::Title | SlideKind::Section, Some(subtitle), Some(ph)) =
        (entry.kind, subtitle, subtitle_placeholder(layout))
    {
        write_placeholder(
            &mut xml,
            next_id,
            "Subtitle 2",
            ph,
            &[subtitle],
            RunFormat::subtitle(style),
        )?;
        next_id += 1;
    }

    let bullets: Vec<&str> = entry
        .content
        .iter()
        .map(String::as_str)
        .filter(|line| !line.trim().is_empty())
        .collect();
    if entry.kind == SlideKind::Content && !bullets.is_empty() {
        match body_placeholder(layout) {
            Some(ph) => write_placeholder(
                &mut xml,
                next_id,
                "Content Placeholder 2",
                ph,
                &bullets,
                RunFormat::body(style),
            )?,
            None => write_text_box(
                &mut xml,
                next_id,
                "Content 2",
                BODY_BOX,
                &bullets,
                RunFormat::body(style),
                true,
            )?,
        }
    }

    write_tree_close(&mut xml);
    xml.push_str("</p:sld>");
    Ok(xml)
}

/// Notes slide XML; each line of `notes` becomes a paragraph.
///
/// # Errors
///
/// Returns `Internal` if formatting fails.
pub fn notes_xml(notes: &str) -> Result<String, GenerationError> {
    let mut xml = String::with_capacity(2048);
    xml.push_str(XML_DECLARATION);
    write!(
        xml,
        r#"<p:notes xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}">"#
    )?;
    write_tree_open(&mut xml);

    xml.push_str(r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Notes Placeholder 1"/>"#);
    xml.push_str(r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#);
    xml.push_str(r#"<p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:spPr/>"#);
    xml.push_str("<p:txBody><a:bodyPr/><a:lstStyle/>");
    for line in notes.lines() {
        write!(
            xml,
            r#"<a:p><a:r><a:rPr lang="en-US" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
            escape_xml(&clean_text(line))
        )?;
    }
    if notes.lines().next().is_none() {
        xml.push_str("<a:p/>");
    }
    xml.push_str("</p:txBody></p:sp>");

    write_tree_close(&mut xml);
    xml.push_str("</p:notes>");
    Ok(xml)
}

fn write_notes_master_placeholder(
    xml: &mut String,
    id: u32,
    name: &str,
    ph: &str,
    rect: Rect,
) -> Result<(), GenerationError> {
    xml.push_str("<p:sp><p:nvSpPr>");
    write!(xml, r#"<p:cNvPr id="{id}" name="{name}"/>"#)?;
    write!(
        xml,
        r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr>{ph}</p:nvPr></p:nvSpPr>"#
    )?;
    write!(
        xml,
        r#"<p:spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        rect.x, rect.y, rect.cx, rect.cy
    )?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr>"#);
    xml.push_str("<p:txBody><a:bodyPr/><a:lstStyle/><a:p/></p:txBody></p:sp>");
    Ok(())
}

/// Notes master with a slide image and a body placeholder on a portrait
/// letter page, for templates that ship without one.
///
/// # Errors
///
/// Returns `Internal` if formatting fails.
pub fn notes_master_xml() -> Result<String, GenerationError> {
    let mut xml = String::with_capacity(2048);
    xml.push_str(XML_DECLARATION);
    write!(
        xml,
        r#"<p:notesMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}">"#
    )?;
    xml.push_str(r#"<p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>"#);
    xml.push_str(r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#);
    xml.push_str(r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/>"#);
    xml.push_str(r#"<a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#);

    write_notes_master_placeholder(
        &mut xml,
        2,
        "Slide Image Placeholder 1",
        r#"<p:ph type="sldImg" idx="2"/>"#,
        Rect {
            x: 685_800,
            y: 1_143_000,
            cx: 5_486_400,
            cy: 3_086_100,
        },
    )?;
    write_notes_master_placeholder(
        &mut xml,
        3,
        "Notes Placeholder 2",
        r#"<p:ph type="body" idx="1"/>"#,
        Rect {
            x: 685_800,
            y: 4_400_550,
            cx: 5_486_400,
            cy: 3_600_450,
        },
    )?;

    xml.push_str("</p:spTree></p:cSld>");
    xml.push_str(r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#);
    xml.push_str("</p:notesMaster>");
    Ok(xml)
}

/// Adds a notes master, backed by a copy of the slide theme, and links it
/// from the presentation. Returns the part name and its relationship id.
fn add_notes_master(
    package: &mut TemplatePackage,
    parts: &PresentationParts,
    presentation_rels: &mut Vec<Relationship>,
    content_types: &mut ContentTypes,
) -> Result<Option<(String, String)>, GenerationError> {
    let Some(theme) = parts.theme.as_deref() else {
        warn!("Template has no theme, speaker notes are skipped");
        return Ok(None);
    };
    let theme_bytes = package.require(theme)?.to_vec();

    let notes_master = package.unused_part_name("ppt/notesMasters/notesMaster");
    let notes_theme = package.unused_part_name("ppt/theme/theme");
    package.set_part(notes_theme.clone(), theme_bytes);
    package.set_part(notes_master.clone(), notes_master_xml()?.into_bytes());
    package.set_relationships(
        &notes_master,
        &[Relationship::internal(
            "rId1",
            rel_kind::THEME,
            relative_target(&notes_master, &notes_theme),
        )],
    );
    content_types.set_override(&notes_master, NOTES_MASTER_CONTENT_TYPE);
    content_types.set_override(&notes_theme, THEME_CONTENT_TYPE);

    presentation_rels.retain(|r| !r.is_kind(rel_kind::NOTES_MASTER));
    let rel_id = next_rel_id(presentation_rels);
    presentation_rels.push(Relationship::internal(
        rel_id.clone(),
        rel_kind::NOTES_MASTER,
        relative_target(&parts.presentation, &notes_master),
    ));

    debug!("Added notes master {} with theme {}", notes_master, notes_theme);
    Ok(Some((notes_master, rel_id)))
}

/// Replaces the slide id list of `presentation.xml` and drops custom shows
/// and sections, which would otherwise point at removed slides. With
/// `notes_master_rel`, the notes master list is replaced by one entry that
/// follows the slide master list.
///
/// # Errors
///
/// Returns `InvalidTemplate` if the part is malformed or has no slide size.
pub fn rewrite_presentation_xml(
    xml: &[u8],
    slide_rel_ids: &[String],
    notes_master_rel: Option<&str>,
) -> Result<Vec<u8>, GenerationError> {
    let mut reader = Reader::from_reader(xml);
    let mut prefix = String::new();
    let mut removals: Vec<(usize, usize)> = Vec::new();
    let mut insert_at: Option<usize> = None;
    let mut masters_end: Option<usize> = None;

    loop {
        let start = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(ref e) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"presentation" => {
                        prefix = e
                            .name()
                            .prefix()
                            .map(|p| format!("{}:", String::from_utf8_lossy(p.as_ref())))
                            .unwrap_or_default();
                    },
                    b"sldIdLst" | b"custShowLst" => {
                        let end_name = e.name().as_ref().to_vec();
                        reader.read_to_end(QName(&end_name))?;
                        removals.push((start, reader.buffer_position() as usize));
                    },
                    b"sldMasterIdLst" => {
                        let end_name = e.name().as_ref().to_vec();
                        reader.read_to_end(QName(&end_name))?;
                        masters_end = Some(reader.buffer_position() as usize);
                    },
                    b"notesMasterIdLst" if notes_master_rel.is_some() => {
                        let end_name = e.name().as_ref().to_vec();
                        reader.read_to_end(QName(&end_name))?;
                        removals.push((start, reader.buffer_position() as usize));
                    },
                    b"ext" if attr(e, b"uri").as_deref() == Some(SECTION_EXT_URI) => {
                        let end_name = e.name().as_ref().to_vec();
                        reader.read_to_end(QName(&end_name))?;
                        removals.push((start, reader.buffer_position() as usize));
                    },
                    b"sldSz" | b"notesSz" if insert_at.is_none() => insert_at = Some(start),
                    _ => {},
                }
            },
            Event::Empty(ref e) => match e.local_name().as_ref() {
                b"sldIdLst" | b"custShowLst" => {
                    removals.push((start, reader.buffer_position() as usize));
                },
                b"notesMasterIdLst" if notes_master_rel.is_some() => {
                    removals.push((start, reader.buffer_position() as usize));
                },
                b"sldMasterIdLst" => masters_end = Some(reader.buffer_position() as usize),
                b"ext" if attr(e, b"uri").as_deref() == Some(SECTION_EXT_URI) => {
                    removals.push((start, reader.buffer_position() as usize));
                },
                b"sldSz" | b"notesSz" if insert_at.is_none() => insert_at = Some(start),
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }

    let insert_at = insert_at.ok_or_else(|| {
        GenerationError::InvalidTemplate("presentation.xml has no slide size".to_string())
    })?;

    let mut id_list = String::with_capacity(64 + slide_rel_ids.len() * 48);
    write!(id_list, r#"<{prefix}sldIdLst xmlns:r="{NS_R}">"#)?;
    for (i, rel_id) in slide_rel_ids.iter().enumerate() {
        write!(
            id_list,
            r#"<{prefix}sldId id="{}" r:id="{}"/>"#,
            FIRST_SLIDE_ID as usize + i,
            escape_xml(rel_id)
        )?;
    }
    write!(id_list, "</{prefix}sldIdLst>")?;

    let mut notes_list = String::new();
    let notes_at = match notes_master_rel {
        Some(rel_id) => {
            write!(
                notes_list,
                r#"<{prefix}notesMasterIdLst xmlns:r="{NS_R}"><{prefix}notesMasterId r:id="{}"/></{prefix}notesMasterIdLst>"#,
                escape_xml(rel_id)
            )?;
            Some(masters_end.ok_or_else(|| {
                GenerationError::InvalidTemplate(
                    "presentation.xml has no slide master list".to_string(),
                )
            })?)
        },
        None => None,
    };

    let mut edits: Vec<(usize, usize, &[u8])> = removals
        .into_iter()
        .map(|(start, end)| (start, end, &b""[..]))
        .collect();
    edits.push((insert_at, insert_at, id_list.as_bytes()));
    if let Some(at) = notes_at {
        edits.push((at, at, notes_list.as_bytes()));
    }
    edits.sort_by_key(|(start, end, _)| (*start, *end));

    let mut out = Vec::with_capacity(xml.len() + id_list.len() + notes_list.len());
    let mut cursor = 0;
    for (start, end, replacement) in edits {
        if start < cursor {
            continue;
        }
        out.extend_from_slice(&xml[cursor..start]);
        out.extend_from_slice(replacement);
        cursor = end;
    }
    out.extend_from_slice(&xml[cursor..]);
    Ok(out)
}

/// Result of [`build_presentation`].
#[derive(Debug)]
pub struct BuiltPresentation {
    pub bytes: Vec<u8>,
    pub slide_count: usize,
    pub style: TemplateStyle,
}

/// Fills `template` with the slides of `plan` and returns the new `.pptx`.
///
/// # Errors
///
/// Returns `InvalidTemplate` when the template cannot be read and `Internal`
/// when the output cannot be written.
pub fn build_presentation(
    template: &[u8],
    plan: &SlidePlan,
) -> Result<BuiltPresentation, GenerationError> {
    let mut package = TemplatePackage::open(template)?;
    let parts = package.presentation_parts()?;
    let style = style_from_package(&package, &parts)?;
    let presentation = parts.presentation.as_str();

    // Old slides go first so their part names can be reused.
    for slide in &parts.slides {
        for notes in package.related(slide, rel_kind::NOTES_SLIDE)? {
            package.remove_part(&rels_part_name(&notes));
            package.remove_part(&notes);
        }
        package.remove_part(&rels_part_name(slide));
        package.remove_part(slide);
    }
    debug!("Removed {} template slides", parts.slides.len());

    let mut presentation_rels: Vec<Relationship> = package
        .relationships(presentation)?
        .into_iter()
        .filter(|r| !r.is_kind(rel_kind::SLIDE))
        .collect();
    let mut content_types = package.content_types()?;
    content_types.ensure_default("rels", RELS_CONTENT_TYPE);
    content_types.ensure_default("xml", "application/xml");

    // A template's main part is served as a presentation; macros do not survive.
    if content_types
        .override_for(presentation)
        .is_some_and(|ct| TEMPLATE_CONTENT_TYPES.iter().any(|t| *t == ct))
    {
        content_types.set_override(presentation, PRESENTATION_CONTENT_TYPE);
        presentation_rels.retain(|r| !r.is_kind(rel_kind::VBA_PROJECT));
        debug!("Converted template main part to a presentation");
    }

    let wants_notes = plan.slides.iter().any(|entry| {
        entry
            .speaker_notes
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty())
    });
    let (notes_master, added_notes_master) = match parts.notes_master.clone() {
        Some(existing) => (Some(existing), None),
        None if wants_notes => {
            match add_notes_master(
                &mut package,
                &parts,
                &mut presentation_rels,
                &mut content_types,
            )? {
                Some((part, rel_id)) => (Some(part), Some(rel_id)),
                None => (None, None),
            }
        },
        None => (None, None),
    };

    let mut slide_rel_ids = Vec::with_capacity(plan.slides.len());
    let mut notes_written = 0;

    for (i, entry) in plan.slides.iter().enumerate() {
        let number = i + 1;
        let layout_index = select_layout(entry.kind, &style.layouts);
        let layout = &style.layouts[layout_index];
        let slide_part = format!("ppt/slides/slide{number}.xml");

        let mut slide_rels = vec![Relationship::internal(
            "rId1",
            rel_kind::SLIDE_LAYOUT,
            relative_target(&slide_part, &parts.layouts[layout_index]),
        )];

        let notes = entry
            .speaker_notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        if let (Some(notes), Some(notes_master)) = (notes, notes_master.as_deref()) {
            let notes_part = format!("ppt/notesSlides/notesSlide{number}.xml");
            slide_rels.push(Relationship::internal(
                "rId2",
                rel_kind::NOTES_SLIDE,
                relative_target(&slide_part, &notes_part),
            ));
            package.set_relationships(
                &notes_part,
                &[
                    Relationship::internal(
                        "rId1",
                        rel_kind::NOTES_MASTER,
                        relative_target(&notes_part, notes_master),
                    ),
                    Relationship::internal(
                        "rId2",
                        rel_kind::SLIDE,
                        relative_target(&notes_part, &slide_part),
                    ),
                ],
            );
            package.set_part(notes_part.clone(), notes_xml(notes)?.into_bytes());
            content_types.set_override(&notes_part, NOTES_SLIDE_CONTENT_TYPE);
            notes_written += 1;
        }

        package.set_part(slide_part.clone(), slide_xml(entry, layout, &style)?.into_bytes());
        package.set_relationships(&slide_part, &slide_rels);
        content_types.set_override(&slide_part, SLIDE_CONTENT_TYPE);

        let rel_id = next_rel_id(&presentation_rels);
        presentation_rels.push(Relationship::internal(
            rel_id.clone(),
            rel_kind::SLIDE,
            relative_target(presentation, &slide_part),
        ));
        slide_rel_ids.push(rel_id);

        debug!(
            "Slide {} ({:?}) uses layout {} '{}'",
            number, entry.kind, layout_index, layout.name
        );
    }

    let presentation_xml = rewrite_presentation_xml(
        package.require(presentation)?,
        &slide_rel_ids,
        added_notes_master.as_deref(),
    )?;
    package.set_part(presentation.to_string(), presentation_xml);
    package.set_relationships(presentation, &presentation_rels);
    package.set_content_types(&content_types);

    let pruned = package.prune_unreachable()?;
    let bytes = package.to_bytes()?;

    info!(
        slides = plan.slides.len(),
        notes = notes_written,
        pruned_parts = pruned.len(),
        "Built presentation of {} bytes",
        bytes.len()
    );

    Ok(BuiltPresentation {
        bytes,
        slide_count: plan.slides.len(),
        style,
    })
}
