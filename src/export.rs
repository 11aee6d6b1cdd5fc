use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use thiserror::Error;

static SAFE_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w\-_\u0020-\u007E\u00A0-\uFFFF]+$").expect("filename pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Word,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Word => "docx",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Word => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ExportFormat::Pdf => "application/pdf",
        }
    }

    /// Whether this build carries a renderer for the format
    pub fn is_available(self) -> bool {
        match self {
            ExportFormat::Word => cfg!(feature = "docx-export"),
            ExportFormat::Pdf => cfg!(feature = "pdf-export"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{} export unavailable in this build", .0.extension())]
    Unavailable(ExportFormat),

    #[error("Failed to render {format:?} document: {message}")]
    Render {
        format: ExportFormat,
        message: String,
    },
}

/// A rendered document ready to download
#[derive(Debug)]
pub struct ExportedDocument {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Render `text` as a document, one paragraph per line
pub fn export_document(
    format: ExportFormat,
    text: &str,
    filename: &str,
) -> Result<ExportedDocument, ExportError> {
    let bytes = match format {
        ExportFormat::Word => render_docx(text)?,
        ExportFormat::Pdf => render_pdf(text)?,
    };

    Ok(ExportedDocument {
        filename: format!("{}.{}", filename, format.extension()),
        content_type: format.content_type(),
        bytes,
    })
}

/// Reduce a caller-supplied name to one safe path component
pub fn sanitize_filename(requested: Option<&str>, fallback: &str) -> String {
    let Some(requested) = requested else {
        return fallback.to_string();
    };

    let name = Path::new(requested.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .replace('"', "");

    if name.is_empty() || name.len() > 255 || !SAFE_FILENAME.is_match(&name) {
        tracing::debug!("Rejected export filename {:?}", requested);
        return fallback.to_string();
    }
    name
}

#[cfg(feature = "docx-export")]
fn render_docx(text: &str) -> Result<Vec<u8>, ExportError> {
    use docx_rs::{Docx, Paragraph, Run};
    use std::io::Cursor;

    let mut docx = Docx::new();
    for line in text.split('\n') {
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)));
    }

    let mut buf = Cursor::new(Vec::new());
    docx.build().pack(&mut buf).map_err(|e| ExportError::Render {
        format: ExportFormat::Word,
        message: e.to_string(),
    })?;

    Ok(buf.into_inner())
}

#[cfg(not(feature = "docx-export"))]
fn render_docx(_text: &str) -> Result<Vec<u8>, ExportError> {
    Err(ExportError::Unavailable(ExportFormat::Word))
}

#[cfg(feature = "pdf-export")]
fn render_pdf(text: &str) -> Result<Vec<u8>, ExportError> {
    use printpdf::{BuiltinFont, Mm, PdfDocument};

    const PAGE_WIDTH: f32 = 210.0;
    const PAGE_HEIGHT: f32 = 297.0;
    const MARGIN: f32 = 14.0;
    const LINE_HEIGHT: f32 = 5.0;
    const FONT_SIZE: f32 = 11.0;

    let render_err = |e: printpdf::Error| ExportError::Render {
        format: ExportFormat::Pdf,
        message: e.to_string(),
    };

    let (doc, page, layer) =
        PdfDocument::new("translation", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "text");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err)?;

    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in text.split('\n') {
        if y < MARGIN {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "text");
            current = doc.get_page(page).get_layer(layer);
            y = PAGE_HEIGHT - MARGIN;
        }
        current.use_text(line, FONT_SIZE, Mm(MARGIN), Mm(y), &font);
        y -= LINE_HEIGHT;
    }

    doc.save_to_bytes().map_err(render_err)
}

#[cfg(not(feature = "pdf-export"))]
fn render_pdf(_text: &str) -> Result<Vec<u8>, ExportError> {
    Err(ExportError::Unavailable(ExportFormat::Pdf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_filenames() {
        assert_eq!(sanitize_filename(None, "translation"), "translation");
        assert_eq!(sanitize_filename(Some("report"), "translation"), "report");
        assert_eq!(sanitize_filename(Some("../../etc/passwd"), "translation"), "passwd");
        assert_eq!(sanitize_filename(Some("  "), "translation"), "translation");
        assert_eq!(sanitize_filename(Some("a\"b"), "translation"), "ab");
        assert_eq!(sanitize_filename(Some("报告"), "translation"), "报告");
    }

    #[test]
    fn availability_follows_features() {
        assert_eq!(ExportFormat::Word.is_available(), cfg!(feature = "docx-export"));
        assert_eq!(ExportFormat::Pdf.is_available(), cfg!(feature = "pdf-export"));
    }

    #[cfg(feature = "docx-export")]
    #[test]
    fn word_export_is_a_zip_package() {
        let doc = export_document(ExportFormat::Word, "line one\n\nline three", "out").unwrap();
        assert_eq!(doc.filename, "out.docx");
        assert!(doc.bytes.starts_with(b"PK"));
    }

    #[cfg(feature = "pdf-export")]
    #[test]
    fn pdf_export_has_pdf_header() {
        let text = vec!["row"; 120].join("\n");
        let doc = export_document(ExportFormat::Pdf, &text, "out").unwrap();
        assert_eq!(doc.filename, "out.pdf");
        assert!(doc.bytes.starts_with(b"%PDF"));
    }

    #[cfg(not(feature = "pdf-export"))]
    #[test]
    fn pdf_export_reports_unavailable() {
        let err = export_document(ExportFormat::Pdf, "text", "out").unwrap_err();
        assert!(matches!(err, ExportError::Unavailable(ExportFormat::Pdf)));
        assert_eq!(err.to_string(), "pdf export unavailable in this build");
    }
}
