use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::FileOptions;
use zip::CompressionMethod;

use crate::feed::{Article, MAX_CATEGORIES};
use crate::util::strip_xml_invalid_chars;

const MIMETYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";
const ODF_VERSION: &str = "1.2";

pub const SHEET_NAME: &str = "Articles";

/// Header labels and column widths in centimetres, in output order.
pub const COLUMNS: [(&str, f32); 3 + MAX_CATEGORIES + 1] = [
    ("Titre", 8.0),
    ("Description", 16.0),
    ("URL", 10.0),
    ("Catégorie 1", 5.0),
    ("Catégorie 2", 5.0),
    ("Catégorie 3", 5.0),
    ("Catégorie 4", 5.0),
    ("Catégorie 5", 5.0),
    ("Catégorie 6", 5.0),
    ("Date de publication", 6.0),
];

const NS_OFFICE: &str = "urn:oasis:names:tc:opendocument:xmlns:office:1.0";
const NS_STYLE: &str = "urn:oasis:names:tc:opendocument:xmlns:style:1.0";
const NS_TEXT: &str = "urn:oasis:names:tc:opendocument:xmlns:text:1.0";
const NS_TABLE: &str = "urn:oasis:names:tc:opendocument:xmlns:table:1.0";
const NS_FO: &str = "urn:oasis:names:tc:opendocument:xmlns:xsl-fo-compatible:1.0";
const NS_META: &str = "urn:oasis:names:tc:opendocument:xmlns:meta:1.0";
const NS_MANIFEST: &str = "urn:oasis:names:tc:opendocument:xmlns:manifest:1.0";

/// Errors that can occur while producing the spreadsheet.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Filesystem failure (permissions, missing directory, disk full).
    #[error("Failed to write '{path}'")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to build spreadsheet XML: {0}")]
    Xml(String),
    #[error("Failed to build spreadsheet archive")]
    Zip(#[from] zip::result::ZipError),
}

/// Cell styles, named as they appear in `content.xml`.
#[derive(Clone, Copy)]
enum CellStyle {
    Header,
    Data,
    EvenData,
    Category,
    EvenCategory,
}

impl CellStyle {
    fn name(self) -> &'static str {
        match self {
            CellStyle::Header => "HeaderCell",
            CellStyle::Data => "DataCell",
            CellStyle::EvenData => "EvenCell",
            CellStyle::Category => "CatCell",
            CellStyle::EvenCategory => "EvenCatCell",
        }
    }

    /// Background colour, if any.
    fn background(self) -> Option<&'static str> {
        match self {
            CellStyle::Header => Some("#2C3E50"),
            CellStyle::Data => None,
            CellStyle::EvenData => Some("#F9FAFB"),
            CellStyle::Category => Some("#F0F4F8"),
            CellStyle::EvenCategory => Some("#EEF1F5"),
        }
    }

    const ALL: [CellStyle; 5] = [
        CellStyle::Header,
        CellStyle::Data,
        CellStyle::EvenData,
        CellStyle::Category,
        CellStyle::EvenCategory,
    ];
}

/// Thin wrapper mapping quick-xml write failures to [`WriteError::Xml`].
struct XmlDoc {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlDoc {
    fn new() -> Result<Self, WriteError> {
        let mut doc = Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        };
        doc.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(doc)
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), WriteError> {
        self.writer
            .write_event(event)
            .map_err(|e| WriteError::Xml(e.to_string()))
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), WriteError> {
        let mut element = BytesStart::new(name);
        for attr in attrs {
            element.push_attribute(*attr);
        }
        self.event(Event::Start(element))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), WriteError> {
        let mut element = BytesStart::new(name);
        for attr in attrs {
            element.push_attribute(*attr);
        }
        self.event(Event::Empty(element))
    }

    fn end(&mut self, name: &str) -> Result<(), WriteError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text(&mut self, text: &str) -> Result<(), WriteError> {
        if text.is_empty() {
            return Ok(());
        }
        let clean = strip_xml_invalid_chars(text);
        self.event(Event::Text(BytesText::new(&clean)))
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }
}

/// Renders the articles as a complete ODS package held in memory.
///
/// The sheet has a header row followed by one row per article, in the given
/// order. Every row has exactly [`COLUMNS`]`.len()` cells; missing categories
/// are written as empty cells.
pub fn render_ods(articles: &[Article]) -> Result<Vec<u8>, WriteError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

    // ODF requires the mimetype entry first and uncompressed
    zip.start_file("mimetype", stored)?;
    zip.write_all(MIMETYPE.as_bytes())
        .map_err(zip::result::ZipError::from)?;

    let parts: [(&str, Vec<u8>); 4] = [
        ("META-INF/manifest.xml", manifest_xml()?),
        ("meta.xml", meta_xml()?),
        ("styles.xml", styles_xml()?),
        ("content.xml", content_xml(articles)?),
    ];
    for (name, data) in parts {
        zip.start_file(name, deflated)?;
        zip.write_all(&data).map_err(zip::result::ZipError::from)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Writes the spreadsheet to `path`, replacing any existing file atomically.
///
/// Missing parent directories are created. The document is written to a
/// temporary sibling file, synced, then renamed into place, so a failed run
/// never leaves a truncated spreadsheet behind.
///
/// # Errors
///
/// [`WriteError::Io`] for filesystem failures; [`WriteError::Xml`] or
/// [`WriteError::Zip`] if the document cannot be serialised.
pub fn write_ods(articles: &[Article], path: &Path) -> Result<(), WriteError> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let bytes = render_ods(articles)?;

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| WriteError::Io { path, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    // Randomized temp filename so concurrent runs never share one
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let result = (|| {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(io_err(&temp_path))?;
        file.write_all(&bytes).map_err(io_err(&temp_path))?;
        file.sync_all().map_err(io_err(&temp_path))?;
        drop(file);

        std::fs::rename(&temp_path, path).map_err(io_err(path))
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

fn content_xml(articles: &[Article]) -> Result<Vec<u8>, WriteError> {
    let mut doc = XmlDoc::new()?;

    doc.start(
        "office:document-content",
        &[
            ("xmlns:office", NS_OFFICE),
            ("xmlns:style", NS_STYLE),
            ("xmlns:text", NS_TEXT),
            ("xmlns:table", NS_TABLE),
            ("xmlns:fo", NS_FO),
            ("office:version", ODF_VERSION),
        ],
    )?;

    write_automatic_styles(&mut doc)?;

    doc.start("office:body", &[])?;
    doc.start("office:spreadsheet", &[])?;
    doc.start("table:table", &[("table:name", SHEET_NAME)])?;

    for i in 0..COLUMNS.len() {
        let style = format!("Col{}", i);
        doc.empty(
            "table:table-column",
            &[("table:style-name", style.as_str())],
        )?;
    }

    doc.start("table:table-row", &[])?;
    for (label, _) in COLUMNS {
        write_cell(&mut doc, label, CellStyle::Header)?;
    }
    doc.end("table:table-row")?;

    for (idx, article) in articles.iter().enumerate() {
        let even = idx % 2 == 1;
        let (data, category) = if even {
            (CellStyle::EvenData, CellStyle::EvenCategory)
        } else {
            (CellStyle::Data, CellStyle::Category)
        };

        doc.start("table:table-row", &[])?;
        write_cell(&mut doc, &article.title, data)?;
        write_cell(&mut doc, &article.description, data)?;
        write_cell(&mut doc, &article.url, data)?;
        for slot in 0..MAX_CATEGORIES {
            let value = article.categories.get(slot).map_or("", String::as_str);
            write_cell(&mut doc, value, category)?;
        }
        write_cell(&mut doc, &article.published_date(), data)?;
        doc.end("table:table-row")?;
    }

    doc.end("table:table")?;
    doc.end("office:spreadsheet")?;
    doc.end("office:body")?;
    doc.end("office:document-content")?;

    Ok(doc.finish())
}

fn write_automatic_styles(doc: &mut XmlDoc) -> Result<(), WriteError> {
    doc.start("office:automatic-styles", &[])?;

    for (i, (_, width_cm)) in COLUMNS.iter().enumerate() {
        let name = format!("Col{}", i);
        let width = format!("{}cm", width_cm);
        doc.start(
            "style:style",
            &[("style:name", name.as_str()), ("style:family", "table-column")],
        )?;
        doc.empty(
            "style:table-column-properties",
            &[("style:column-width", width.as_str())],
        )?;
        doc.end("style:style")?;
    }

    for style in CellStyle::ALL {
        doc.start(
            "style:style",
            &[("style:name", style.name()), ("style:family", "table-cell")],
        )?;

        let mut cell_props: Vec<(&str, &str)> = Vec::new();
        if let Some(color) = style.background() {
            cell_props.push(("fo:background-color", color));
        }
        match style {
            CellStyle::Header => cell_props.push(("fo:padding", "0.15cm")),
            _ => {
                cell_props.push(("fo:padding", "0.1cm"));
                cell_props.push(("fo:border-bottom", "0.5pt solid #DEE2E6"));
            }
        }
        doc.empty("style:table-cell-properties", &cell_props)?;

        match style {
            CellStyle::Header => doc.empty(
                "style:text-properties",
                &[
                    ("fo:font-size", "11pt"),
                    ("fo:font-weight", "bold"),
                    ("fo:color", "#FFFFFF"),
                    ("fo:font-family", "Arial"),
                ],
            )?,
            _ => doc.empty(
                "style:text-properties",
                &[("fo:font-size", "10pt"), ("fo:font-family", "Arial")],
            )?,
        }

        doc.end("style:style")?;
    }

    doc.end("office:automatic-styles")
}

fn write_cell(doc: &mut XmlDoc, value: &str, style: CellStyle) -> Result<(), WriteError> {
    doc.start(
        "table:table-cell",
        &[
            ("table:style-name", style.name()),
            ("office:value-type", "string"),
        ],
    )?;
    doc.start("text:p", &[])?;
    doc.text(value)?;
    doc.end("text:p")?;
    doc.end("table:table-cell")
}

fn manifest_xml() -> Result<Vec<u8>, WriteError> {
    let mut doc = XmlDoc::new()?;
    doc.start(
        "manifest:manifest",
        &[("xmlns:manifest", NS_MANIFEST), ("manifest:version", ODF_VERSION)],
    )?;
    doc.empty(
        "manifest:file-entry",
        &[
            ("manifest:full-path", "/"),
            ("manifest:version", ODF_VERSION),
            ("manifest:media-type", MIMETYPE),
        ],
    )?;
    for part in ["content.xml", "styles.xml", "meta.xml"] {
        doc.empty(
            "manifest:file-entry",
            &[("manifest:full-path", part), ("manifest:media-type", "text/xml")],
        )?;
    }
    doc.end("manifest:manifest")?;
    Ok(doc.finish())
}

fn styles_xml() -> Result<Vec<u8>, WriteError> {
    let mut doc = XmlDoc::new()?;
    doc.empty(
        "office:document-styles",
        &[
            ("xmlns:office", NS_OFFICE),
            ("xmlns:style", NS_STYLE),
            ("xmlns:fo", NS_FO),
            ("office:version", ODF_VERSION),
        ],
    )?;
    Ok(doc.finish())
}

fn meta_xml() -> Result<Vec<u8>, WriteError> {
    let generator = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let mut doc = XmlDoc::new()?;
    doc.start(
        "office:document-meta",
        &[
            ("xmlns:office", NS_OFFICE),
            ("xmlns:meta", NS_META),
            ("office:version", ODF_VERSION),
        ],
    )?;
    doc.start("office:meta", &[])?;
    doc.start("meta:generator", &[])?;
    doc.text(&generator)?;
    doc.end("meta:generator")?;
    doc.end("office:meta")?;
    doc.end("office:document-meta")?;
    Ok(doc.finish())
}
