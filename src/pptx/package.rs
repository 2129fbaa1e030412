//! OPC package access for `.pptx` files.
//!
//! A [`TemplatePackage`] holds every zip member in memory, keyed by its part
//! name without the leading slash (`ppt/slides/slide1.xml`). Relationship and
//! content-type parts are parsed on demand and written back as whole parts.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::{Cursor, Read, Write};

use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::xml::{XML_DECLARATION, attr, attr_i64, escape_xml, reader, rel_id};
use crate::core::models::SlideSize;
use crate::errors::GenerationError;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";

/// Largest single zip member we are willing to inflate.
pub const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;
/// Inflated size budget for the whole package.
pub const MAX_TOTAL_BYTES: u64 = 256 * 1024 * 1024;
pub const MAX_ENTRIES: usize = 10_000;

const RELATIONSHIP_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PACKAGE_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

pub const RELS_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.relationships+xml";
pub const SLIDE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
pub const NOTES_SLIDE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml";
pub const NOTES_MASTER_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.notesMaster+xml";
pub const THEME_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.theme+xml";
pub const PRESENTATION_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";

/// Main-part content types of `.potx` and `.potm` templates.
pub const TEMPLATE_CONTENT_TYPES: [&str; 2] = [
    "application/vnd.openxmlformats-officedocument.presentationml.template.main+xml",
    "application/vnd.ms-powerpoint.template.macroEnabled.main+xml",
];

/// Relationship kinds by the last path segment of their type URI.
pub mod rel_kind {
    pub const OFFICE_DOCUMENT: &str = "officeDocument";
    pub const SLIDE: &str = "slide";
    pub const SLIDE_LAYOUT: &str = "slideLayout";
    pub const SLIDE_MASTER: &str = "slideMaster";
    pub const NOTES_SLIDE: &str = "notesSlide";
    pub const NOTES_MASTER: &str = "notesMaster";
    pub const THEME: &str = "theme";
    pub const VBA_PROJECT: &str = "vbaProject";
}

#[must_use]
pub fn rel_type_uri(kind: &str) -> String {
    format!("{RELATIONSHIP_BASE}/{kind}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    #[must_use]
    pub fn internal(id: impl Into<String>, kind: &str, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rel_type: rel_type_uri(kind),
            target: target.into(),
            external: false,
        }
    }

    /// Matches on the type's last segment so strict and transitional URIs both work.
    #[must_use]
    pub fn is_kind(&self, kind: &str) -> bool {
        self.rel_type
            .rsplit('/')
            .next()
            .is_some_and(|last| last == kind)
    }
}

/// # Errors
///
/// Returns `InvalidTemplate` when the part is not well-formed XML.
pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, GenerationError> {
    let mut reader = reader(xml);
    let mut rels = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let (Some(id), Some(rel_type), Some(target)) =
                    (attr(e, b"Id"), attr(e, b"Type"), attr(e, b"Target"))
                else {
                    continue;
                };
                let external = attr(e, b"TargetMode").is_some_and(|m| m == "External");
                rels.push(Relationship {
                    id,
                    rel_type,
                    target,
                    external,
                });
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(rels)
}

#[must_use]
pub fn serialize_relationships(rels: &[Relationship]) -> String {
    let mut xml = String::with_capacity(256 + rels.len() * 160);
    xml.push_str(XML_DECLARATION);
    xml.push_str(&format!(r#"<Relationships xmlns="{NS_PACKAGE_RELS}">"#));
    for rel in rels {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}""#,
            escape_xml(&rel.id),
            escape_xml(&rel.rel_type),
            escape_xml(&rel.target)
        ));
        if rel.external {
            xml.push_str(r#" TargetMode="External""#);
        }
        xml.push_str("/>");
    }
    xml.push_str("</Relationships>");
    xml
}

/// First `rIdN` not used in `rels`.
#[must_use]
pub fn next_rel_id(rels: &[Relationship]) -> String {
    let max = rels
        .iter()
        .filter_map(|r| r.id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

/// `ppt/slides/slide1.xml` -> `ppt/slides/_rels/slide1.xml.rels`; the package itself is `""`.
#[must_use]
pub fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None if part.is_empty() => PACKAGE_RELS_PART.to_string(),
        None => format!("_rels/{part}.rels"),
    }
}

fn directory(part: &str) -> &str {
    part.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Resolves a relationship target against its source part.
#[must_use]
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or_default();
    let decoded = percent_decode_str(target).decode_utf8_lossy();

    let joined = match decoded.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => {
            let base = directory(source_part);
            if base.is_empty() {
                decoded.into_owned()
            } else {
                format!("{base}/{decoded}")
            }
        },
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                segments.pop();
            },
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relative reference from `from_part`'s directory to `to_part`.
#[must_use]
pub fn relative_target(from_part: &str, to_part: &str) -> String {
    let from: Vec<&str> = directory(from_part)
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let to: Vec<&str> = to_part.split('/').filter(|s| !s.is_empty()).collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend(&to[common..]);
    parts.join("/")
}

/// Parsed `[Content_Types].xml`. Override part names are stored with their leading slash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    pub defaults: Vec<(String, String)>,
    pub overrides: Vec<(String, String)>,
}

impl ContentTypes {
    /// # Errors
    ///
    /// Returns `InvalidTemplate` when the part is not well-formed XML.
    pub fn parse(xml: &[u8]) -> Result<Self, GenerationError> {
        let mut reader = reader(xml);
        let mut types = Self::default();

        loop {
            match reader.read_event()? {
                Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"Default" => {
                        if let (Some(ext), Some(ct)) =
                            (attr(e, b"Extension"), attr(e, b"ContentType"))
                        {
                            types.defaults.push((ext, ct));
                        }
                    },
                    b"Override" => {
                        if let (Some(part), Some(ct)) =
                            (attr(e, b"PartName"), attr(e, b"ContentType"))
                        {
                            types.overrides.push((part, ct));
                        }
                    },
                    _ => {},
                },
                Event::Eof => break,
                _ => {},
            }
        }

        Ok(types)
    }

    pub fn ensure_default(&mut self, extension: &str, content_type: &str) {
        if !self
            .defaults
            .iter()
            .any(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        {
            self.defaults
                .push((extension.to_string(), content_type.to_string()));
        }
    }

    pub fn set_override(&mut self, part: &str, content_type: &str) {
        let name = format!("/{part}");
        self.remove_override(part);
        self.overrides.push((name, content_type.to_string()));
    }

    pub fn remove_override(&mut self, part: &str) {
        let name = format!("/{part}");
        self.overrides
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
    }

    #[must_use]
    pub fn override_for(&self, part: &str) -> Option<&str> {
        let name = format!("/{part}");
        self.overrides
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
            .map(|(_, ct)| ct.as_str())
    }

    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(512 + self.overrides.len() * 160);
        xml.push_str(XML_DECLARATION);
        xml.push_str(&format!(r#"<Types xmlns="{NS_CONTENT_TYPES}">"#));
        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(ct)
            ));
        }
        for (part, ct) in &self.overrides {
            xml.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(part),
                escape_xml(ct)
            ));
        }
        xml.push_str("</Types>");
        xml
    }
}

/// Part names that make up the presentation, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationParts {
    pub presentation: String,
    pub master: String,
    pub layouts: Vec<String>,
    pub slides: Vec<String>,
    pub notes_master: Option<String>,
    pub theme: Option<String>,
    pub slide_size: Option<SlideSize>,
}

#[derive(Debug, Default)]
struct PresentationIds {
    masters: Vec<String>,
    slides: Vec<String>,
    notes_master: Option<String>,
    slide_size: Option<SlideSize>,
}

fn scan_presentation(xml: &[u8]) -> Result<PresentationIds, GenerationError> {
    let mut reader = reader(xml);
    let mut ids = PresentationIds::default();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"sldMasterId" => ids.masters.extend(rel_id(e)),
                b"sldId" => ids.slides.extend(rel_id(e)),
                b"notesMasterId" => ids.notes_master = rel_id(e),
                b"sldSz" => {
                    if let (Some(width), Some(height)) = (attr_i64(e, b"cx"), attr_i64(e, b"cy")) {
                        ids.slide_size = Some(SlideSize { width, height });
                    }
                },
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(ids)
}

fn scan_layout_ids(xml: &[u8]) -> Result<Vec<String>, GenerationError> {
    let mut reader = reader(xml);
    let mut ids = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"sldLayoutId" =>
            {
                ids.extend(rel_id(e));
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(ids)
}

/// An in-memory `.pptx` package.
#[derive(Debug, Clone, Default)]
pub struct TemplatePackage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl TemplatePackage {
    /// Reads every member of a zip container.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` if the bytes are not a zip archive, if an
    /// entry is too large or corrupt, if the entries inflate past
    /// [`MAX_TOTAL_BYTES`], or if the package has no content types or
    /// package relationships.
    pub fn open(bytes: &[u8]) -> Result<Self, GenerationError> {
        if bytes.is_empty() {
            return Err(GenerationError::InvalidTemplate(
                "template file is empty".to_string(),
            ));
        }

        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        if archive.len() > MAX_ENTRIES {
            return Err(GenerationError::InvalidTemplate(format!(
                "template has {} entries, more than the {MAX_ENTRIES} allowed",
                archive.len()
            )));
        }

        let mut parts = BTreeMap::new();
        let mut total: u64 = 0;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            if file.size() > MAX_PART_BYTES {
                return Err(GenerationError::InvalidTemplate(format!(
                    "entry {name} is larger than {MAX_PART_BYTES} bytes"
                )));
            }

            let remaining = MAX_TOTAL_BYTES - total;
            let mut data = Vec::new();
            (&mut file)
                .take(MAX_PART_BYTES.min(remaining) + 1)
                .read_to_end(&mut data)
                .map_err(|e| {
                    GenerationError::InvalidTemplate(format!("entry {name} is corrupt: {e}"))
                })?;
            if data.len() as u64 > MAX_PART_BYTES {
                return Err(GenerationError::InvalidTemplate(format!(
                    "entry {name} is larger than {MAX_PART_BYTES} bytes"
                )));
            }
            total += data.len() as u64;
            if total > MAX_TOTAL_BYTES {
                return Err(GenerationError::InvalidTemplate(format!(
                    "template inflates to more than {MAX_TOTAL_BYTES} bytes"
                )));
            }
            parts.insert(name, data);
        }

        for required in [CONTENT_TYPES_PART, PACKAGE_RELS_PART] {
            if !parts.contains_key(required) {
                return Err(GenerationError::InvalidTemplate(format!(
                    "missing {required}"
                )));
            }
        }

        debug!("Opened package with {} parts", parts.len());
        Ok(Self { parts })
    }

    #[must_use]
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    /// Part bytes, failing with `InvalidTemplate` when absent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` when no such part exists.
    pub fn require(&self, name: &str) -> Result<&[u8], GenerationError> {
        self.part(name)
            .ok_or_else(|| GenerationError::InvalidTemplate(format!("missing part {name}")))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// First `{stem}{n}.xml` not yet in the package, counting from 1.
    #[must_use]
    pub fn unused_part_name(&self, stem: &str) -> String {
        (1..)
            .map(|n| format!("{stem}{n}.xml"))
            .find(|name| !self.contains(name))
            .unwrap_or_else(|| format!("{stem}.xml"))
    }

    pub fn set_part(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.parts.insert(name.into(), data.into());
    }

    pub fn remove_part(&mut self, name: &str) -> Option<Vec<u8>> {
        self.parts.remove(name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Relationships whose source is `part`; `""` is the package itself.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` if the relationships part is malformed.
    pub fn relationships(&self, part: &str) -> Result<Vec<Relationship>, GenerationError> {
        match self.part(&rels_part_name(part)) {
            Some(xml) => parse_relationships(xml),
            None => Ok(Vec::new()),
        }
    }

    pub fn set_relationships(&mut self, part: &str, rels: &[Relationship]) {
        let name = rels_part_name(part);
        if rels.is_empty() {
            self.parts.remove(&name);
        } else {
            self.parts
                .insert(name, serialize_relationships(rels).into_bytes());
        }
    }

    /// Internal targets of `part` with relationship kind `kind`, resolved to part names.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` if the relationships part is malformed.
    pub fn related(&self, part: &str, kind: &str) -> Result<Vec<String>, GenerationError> {
        Ok(self
            .relationships(part)?
            .into_iter()
            .filter(|r| !r.external && r.is_kind(kind))
            .map(|r| resolve_target(part, &r.target))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `InvalidTemplate` if the content types part is missing or malformed.
    pub fn content_types(&self) -> Result<ContentTypes, GenerationError> {
        ContentTypes::parse(self.require(CONTENT_TYPES_PART)?)
    }

    pub fn set_content_types(&mut self, types: &ContentTypes) {
        self.parts
            .insert(CONTENT_TYPES_PART.to_string(), types.to_xml().into_bytes());
    }

    /// Locates the presentation part, its first slide master, the master's
    /// layouts, existing slides, the notes master and the theme.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` when the package is not a presentation or is
    /// missing a master or layouts.
    pub fn presentation_parts(&self) -> Result<PresentationParts, GenerationError> {
        let presentation = self
            .related("", rel_kind::OFFICE_DOCUMENT)?
            .into_iter()
            .next()
            .filter(|p| self.contains(p))
            .ok_or_else(|| {
                GenerationError::InvalidTemplate(
                    "package has no main presentation part".to_string(),
                )
            })?;

        if !self.contains(&rels_part_name(&presentation)) {
            return Err(GenerationError::InvalidTemplate(format!(
                "missing relationships for {presentation}"
            )));
        }

        let ids = scan_presentation(self.require(&presentation)?)?;
        let rels = self.relationships(&presentation)?;
        let target_of = |id: &str| {
            rels.iter()
                .find(|r| r.id == id && !r.external)
                .map(|r| resolve_target(&presentation, &r.target))
        };

        let master = ids
            .masters
            .first()
            .and_then(|id| target_of(id))
            .or_else(|| {
                rels.iter()
                    .find(|r| r.is_kind(rel_kind::SLIDE_MASTER))
                    .map(|r| resolve_target(&presentation, &r.target))
            })
            .filter(|p| self.contains(p))
            .ok_or_else(|| {
                GenerationError::InvalidTemplate("template has no slide master".to_string())
            })?;

        let master_rels = self.relationships(&master)?;
        let mut layouts = Vec::new();
        for id in scan_layout_ids(self.require(&master)?)? {
            let Some(rel) = master_rels.iter().find(|r| r.id == id && !r.external) else {
                return Err(GenerationError::InvalidTemplate(format!(
                    "slide master references unknown layout {id}"
                )));
            };
            let layout = resolve_target(&master, &rel.target);
            if !self.contains(&layout) {
                return Err(GenerationError::InvalidTemplate(format!(
                    "missing layout part {layout}"
                )));
            }
            layouts.push(layout);
        }
        if layouts.is_empty() {
            return Err(GenerationError::InvalidTemplate(
                "template has no slide layouts".to_string(),
            ));
        }

        let mut slides = Vec::new();
        for id in &ids.slides {
            match target_of(id).filter(|p| self.contains(p)) {
                Some(slide) => slides.push(slide),
                None => warn!("Slide id {} does not resolve to a part", id),
            }
        }

        let notes_master = ids
            .notes_master
            .as_deref()
            .and_then(|id| target_of(id))
            .or_else(|| {
                rels.iter()
                    .find(|r| r.is_kind(rel_kind::NOTES_MASTER) && !r.external)
                    .map(|r| resolve_target(&presentation, &r.target))
            })
            .filter(|p| self.contains(p));

        let theme = self
            .related(&presentation, rel_kind::THEME)?
            .into_iter()
            .chain(self.related(&master, rel_kind::THEME)?)
            .find(|p| self.contains(p));

        Ok(PresentationParts {
            presentation,
            master,
            layouts,
            slides,
            notes_master,
            theme,
            slide_size: ids.slide_size,
        })
    }

    /// Drops every part that cannot be reached from the package relationships,
    /// along with content-type overrides for parts that no longer exist.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` if a reachable relationships part is malformed.
    pub fn prune_unreachable(&mut self) -> Result<Vec<String>, GenerationError> {
        let mut reachable = BTreeSet::from([CONTENT_TYPES_PART.to_string()]);
        let mut queue = VecDeque::from([String::new()]);

        while let Some(source) = queue.pop_front() {
            let rels_name = rels_part_name(&source);
            if self.parts.contains_key(&rels_name) {
                reachable.insert(rels_name);
            }
            for rel in self.relationships(&source)? {
                if rel.external {
                    continue;
                }
                let target = resolve_target(&source, &rel.target);
                if self.parts.contains_key(&target) && reachable.insert(target.clone()) {
                    queue.push_back(target);
                }
            }
        }

        let removed: Vec<String> = self
            .parts
            .keys()
            .filter(|name| !reachable.contains(*name))
            .cloned()
            .collect();
        for name in &removed {
            self.parts.remove(name);
        }

        let mut types = self.content_types()?;
        let before = types.overrides.len();
        types.overrides.retain(|(part, _)| {
            self.parts
                .contains_key(part.trim_start_matches('/'))
        });
        if types.overrides.len() != before {
            self.set_content_types(&types);
        }

        if !removed.is_empty() {
            debug!("Pruned {} unreachable parts", removed.len());
        }
        Ok(removed)
    }

    /// Serializes the package as a zip with `[Content_Types].xml` first.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the zip writer fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, GenerationError> {
        let write_err = |e: zip::result::ZipError| {
            GenerationError::Internal(format!("failed to write pptx container: {e}"))
        };
        let io_err =
            |e: std::io::Error| GenerationError::Internal(format!("failed to write pptx part: {e}"));

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let content_types = self.require(CONTENT_TYPES_PART).map_err(|_| {
            GenerationError::Internal("package lost its content types part".to_string())
        })?;
        zip.start_file(CONTENT_TYPES_PART, options)
            .map_err(write_err)?;
        zip.write_all(content_types).map_err(io_err)?;

        for (name, data) in &self.parts {
            if name == CONTENT_TYPES_PART {
                continue;
            }
            zip.start_file(name.as_str(), options).map_err(write_err)?;
            zip.write_all(data).map_err(io_err)?;
        }

        Ok(zip.finish().map_err(write_err)?.into_inner())
    }
}
