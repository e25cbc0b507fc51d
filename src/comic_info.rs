//! `ComicInfo.xml` metadata: the typed record, its XML codec, and the flat
//! JSON mapping exchanged between the reader, downstream consumers, and the
//! writer.
//!
//! A metadata record is one of three things:
//! - a parsed [`ComicInfo`] (possibly with zero fields),
//! - an "absent" placeholder when the archive has no sidecar,
//! - an "error" placeholder when the sidecar could not be parsed.
//!
//! Only a non-empty parsed record is ever written back into an archive.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use miette::Diagnostic;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the sidecar entry at the archive root.
pub const COMIC_INFO_ENTRY: &str = "ComicInfo.xml";

const ABSENT_INFO: &str = "No ComicInfo.xml found in CBZ file";

/// Errors from decoding or encoding a `ComicInfo.xml` document.
///
/// The reader never surfaces these: a failed parse becomes
/// [`ComicMetadata::Error`].
#[derive(Debug, Error, Diagnostic)]
pub enum ComicInfoError {
    #[error("sidecar is not valid UTF-8: {message}")]
    #[diagnostic(
        code(cbz::comic_info::encoding),
        help("ComicInfo.xml must be UTF-8 encoded.")
    )]
    Encoding { message: String },

    #[error("malformed XML: {message}")]
    #[diagnostic(
        code(cbz::comic_info::malformed),
        help("Check the sidecar for unclosed or mismatched elements.")
    )]
    Malformed { message: String },

    #[error("document has no root element")]
    #[diagnostic(
        code(cbz::comic_info::no_root),
        help("A ComicInfo.xml document needs a <ComicInfo> root element.")
    )]
    NoRoot,

    #[error("failed to serialize ComicInfo.xml: {message}")]
    #[diagnostic(code(cbz::comic_info::write))]
    Write { message: String },
}

pub type ComicInfoResult<T> = std::result::Result<T, ComicInfoError>;

macro_rules! comic_fields {
    ($($variant:ident),+ $(,)?) => {
        /// Plain-text child elements of `<ComicInfo>`, in schema order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ComicField {
            $($variant),+
        }

        impl ComicField {
            /// Every field, in schema order.
            pub const ALL: &'static [ComicField] = &[$(ComicField::$variant),+];

            /// The XML element name (and JSON key) of this field.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

comic_fields!(
    Title,
    Series,
    Number,
    Count,
    Volume,
    AlternateSeries,
    AlternateNumber,
    StoryTitle,
    Summary,
    Notes,
    Year,
    Month,
    Day,
    Writer,
    Penciller,
    Inker,
    Colorist,
    Letterer,
    CoverArtist,
    Editor,
    Publisher,
    Imprint,
    Genre,
    Web,
    PageCount,
    LanguageISO,
    Format,
    BlackAndWhite,
    Manga,
    Characters,
    Teams,
    Locations,
    ScanInformation,
    StoryArc,
    SeriesGroup,
    AgeRating,
    CommunityRating,
);

impl ComicField {
    /// Look a field up by its element name (case-sensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == name)
    }
}

impl std::fmt::Display for ComicField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `<Page .../>` annotation. Attributes outside the known set are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "Image", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "DoublePage", default, skip_serializing_if = "Option::is_none")]
    pub double_page: Option<String>,
    #[serde(rename = "ImageSize", default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
    #[serde(rename = "Key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl PageInfo {
    /// Known attribute names, in output order.
    pub const ATTRIBUTES: [&'static str; 5] = ["Image", "Type", "DoublePage", "ImageSize", "Key"];

    fn slot_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "Image" => Some(&mut self.image),
            "Type" => Some(&mut self.kind),
            "DoublePage" => Some(&mut self.double_page),
            "ImageSize" => Some(&mut self.image_size),
            "Key" => Some(&mut self.key),
            _ => None,
        }
    }

    /// Set a known attribute. Returns `false` for unknown names.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.slot_mut(name) {
            Some(slot) => {
                *slot = Some(value.into());
                true
            }
            None => false,
        }
    }

    /// Present attributes as `(name, value)` pairs in output order.
    pub fn attributes(&self) -> Vec<(&'static str, &str)> {
        let values = [
            &self.image,
            &self.kind,
            &self.double_page,
            &self.image_size,
            &self.key,
        ];
        Self::ATTRIBUTES
            .iter()
            .zip(values)
            .filter_map(|(name, v)| v.as_deref().map(|v| (*name, v)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes().is_empty()
    }
}

/// A parsed `ComicInfo.xml` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComicInfo {
    pub fields: BTreeMap<ComicField, String>,
    pub pages: Vec<PageInfo>,
}

impl ComicInfo {
    pub fn get(&self, field: ComicField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn set(&mut self, field: ComicField, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    pub fn title(&self) -> Option<&str> {
        self.get(ComicField::Title)
    }

    /// A record with no fields and no page annotations.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.pages.is_empty()
    }

    /// Parse a sidecar document.
    ///
    /// The first occurrence of each field element is consulted; empty text
    /// is treated as missing. Field text is kept verbatim, surrounding
    /// whitespace included, and stops at the first nested child element.
    /// Only the first `<Pages>` block is read, and `<Page>` entries carrying
    /// none of the known attributes are dropped.
    pub fn from_xml(xml: &str) -> ComicInfoResult<Self> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
        let mut reader = Reader::from_str(xml);

        let mut info = ComicInfo::default();
        let mut seen: BTreeSet<ComicField> = BTreeSet::new();
        let mut depth = 0usize;
        let mut saw_root = false;
        let mut current: Option<(ComicField, String)> = None;
        let mut field_closed = false;
        let mut in_pages = false;
        let mut pages_read = false;

        loop {
            let event = reader.read_event().map_err(malformed)?;
            match event {
                Event::Start(e) => {
                    depth += 1;
                    let name = element_name(&e);
                    match depth {
                        1 => saw_root = true,
                        2 => {
                            if let Some(field) = ComicField::from_name(&name) {
                                if seen.insert(field) {
                                    current = Some((field, String::new()));
                                    field_closed = false;
                                }
                            } else if name == "Pages" && !pages_read {
                                in_pages = true;
                            }
                        }
                        3 if in_pages && name == "Page" => push_page(&mut info, &e)?,
                        3 => field_closed = true,
                        _ => {}
                    }
                }
                Event::Empty(e) => {
                    let name = element_name(&e);
                    match depth {
                        0 => saw_root = true,
                        1 => {
                            if let Some(field) = ComicField::from_name(&name) {
                                seen.insert(field);
                            } else if name == "Pages" {
                                pages_read = true;
                            }
                        }
                        2 if in_pages && name == "Page" => push_page(&mut info, &e)?,
                        2 => field_closed = true,
                        _ => {}
                    }
                }
                Event::Text(t) if depth == 2 && !field_closed => {
                    if let Some((_, text)) = current.as_mut() {
                        text.push_str(&t.unescape().map_err(malformed)?);
                    }
                }
                Event::CData(c) if depth == 2 && !field_closed => {
                    if let Some((_, text)) = current.as_mut() {
                        text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::End(_) => {
                    if depth == 2 {
                        if let Some((field, text)) = current.take() {
                            if !text.is_empty() {
                                info.fields.insert(field, text);
                            }
                        }
                        if in_pages {
                            in_pages = false;
                            pages_read = true;
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(ComicInfoError::NoRoot);
        }
        if depth != 0 {
            return Err(ComicInfoError::Malformed {
                message: "unexpected end of document".into(),
            });
        }
        Ok(info)
    }

    /// Serialize as a `ComicInfo.xml` document.
    pub fn to_xml(&self) -> ComicInfoResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(write_error)?;
        writer
            .write_event(Event::Start(BytesStart::new("ComicInfo")))
            .map_err(write_error)?;

        for (field, value) in &self.fields {
            writer
                .create_element(field.as_str())
                .write_text_content(BytesText::new(value))
                .map_err(write_error)?;
        }

        if !self.pages.is_empty() {
            writer
                .write_event(Event::Start(BytesStart::new("Pages")))
                .map_err(write_error)?;
            for page in &self.pages {
                let mut element = BytesStart::new("Page");
                for (name, value) in page.attributes() {
                    element.push_attribute((name, value));
                }
                writer
                    .write_event(Event::Empty(element))
                    .map_err(write_error)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("Pages")))
                .map_err(write_error)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("ComicInfo")))
            .map_err(write_error)?;

        String::from_utf8(writer.into_inner()).map_err(|e| ComicInfoError::Write {
            message: e.to_string(),
        })
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (field, value) in &self.fields {
            map.insert(field.as_str().into(), Value::String(value.clone()));
        }
        if !self.pages.is_empty() {
            let pages = self
                .pages
                .iter()
                .filter_map(|p| serde_json::to_value(p).ok())
                .collect();
            map.insert("Pages".into(), Value::Array(pages));
        }
        Value::Object(map)
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let mut info = ComicInfo::default();
        for (key, value) in map {
            if let Some(field) = ComicField::from_name(key) {
                if let Some(text) = scalar_text(value) {
                    if !text.is_empty() {
                        info.fields.insert(field, text);
                    }
                }
            } else if key == "Pages" {
                if let Value::Array(entries) = value {
                    info.pages = entries.iter().filter_map(page_from_value).collect();
                }
            } else {
                tracing::debug!(key = %key, "ignoring unknown metadata key");
            }
        }
        info
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn push_page(info: &mut ComicInfo, e: &BytesStart<'_>) -> ComicInfoResult<()> {
    let mut page = PageInfo::default();
    for attr in e.attributes() {
        let attr = attr.map_err(malformed)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value: Cow<'_, str> = attr.unescape_value().map_err(malformed)?;
        page.set(&key, value.into_owned());
    }
    if !page.is_empty() {
        info.pages.push(page);
    }
    Ok(())
}

fn page_from_value(value: &Value) -> Option<PageInfo> {
    let Value::Object(attrs) = value else {
        return None;
    };
    let attrs: Map<String, Value> = attrs
        .iter()
        .filter_map(|(k, v)| scalar_text(v).map(|text| (k.clone(), Value::String(text))))
        .collect();
    let page: PageInfo = serde_json::from_value(Value::Object(attrs)).ok()?;
    (!page.is_empty()).then_some(page)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn malformed(e: impl std::fmt::Display) -> ComicInfoError {
    ComicInfoError::Malformed {
        message: e.to_string(),
    }
}

fn write_error(e: impl std::fmt::Display) -> ComicInfoError {
    ComicInfoError::Write {
        message: e.to_string(),
    }
}

/// The metadata record attached to an archive's pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComicMetadata {
    /// A parsed sidecar.
    Info(ComicInfo),
    /// The archive has no `ComicInfo.xml`.
    Absent { filename: String },
    /// The sidecar exists but could not be parsed.
    Error { message: String },
}

impl ComicMetadata {
    /// Decode raw sidecar bytes, degrading to [`ComicMetadata::Error`] on failure.
    pub fn from_sidecar(bytes: &[u8]) -> Self {
        let parsed = std::str::from_utf8(bytes)
            .map_err(|e| ComicInfoError::Encoding {
                message: e.to_string(),
            })
            .and_then(ComicInfo::from_xml);
        match parsed {
            Ok(info) => Self::Info(info),
            Err(e) => Self::Error {
                message: format!("Failed to parse ComicInfo.xml: {e}"),
            },
        }
    }

    /// Whether this record should be written into an archive as a sidecar.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Info(info) if !info.is_empty())
    }

    /// The parsed record, if any.
    pub fn info(&self) -> Option<&ComicInfo> {
        match self {
            Self::Info(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent { .. })
    }

    /// Flat JSON mapping form.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Info(info) => info.to_value(),
            Self::Absent { filename } => serde_json::json!({
                "info": ABSENT_INFO,
                "filename": filename,
            }),
            Self::Error { message } => serde_json::json!({ "error": message }),
        }
    }

    /// Pretty-printed JSON form (2-space indent).
    pub fn to_json(&self) -> String {
        // Serializing a `Value` cannot fail.
        serde_json::to_string_pretty(&self.to_value()).unwrap_or_default()
    }

    /// Interpret a JSON mapping produced by [`to_value`](Self::to_value) or by
    /// an external consumer.
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self::Error {
                message: format!("metadata must be a JSON object, got {value}"),
            };
        };
        if let Some(error) = map.get("error") {
            let message = scalar_text(error).unwrap_or_else(|| error.to_string());
            return Self::Error { message };
        }
        let info = ComicInfo::from_map(map);
        if info.is_empty() && map.contains_key("info") {
            let filename = map
                .get("filename")
                .and_then(scalar_text)
                .unwrap_or_default();
            return Self::Absent { filename };
        }
        Self::Info(info)
    }

    /// Parse the JSON string form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::from_value(&value))
    }
}

impl Default for ComicMetadata {
    fn default() -> Self {
        Self::Info(ComicInfo::default())
    }
}
