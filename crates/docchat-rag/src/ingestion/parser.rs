//! Multi-format text extraction
//!
//! Each file type routes to one strategy. Failures confined to a single
//! page, sheet or image are recorded as warnings and extraction carries
//! on; an unreachable OCR or vision service aborts the document.

use calamine::Reader;
use std::sync::Arc;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::providers::{OcrProvider, PdfRasterizer, VisionProvider};
use crate::types::{ExtractionStrategy, ExtractionWarning, FileType, Modality};

/// Marker emitted before each word-processor table
pub const TABLE_MARKER: &str = "[TABLE]";
/// Separator between cells of a table or spreadsheet row
pub const CELL_SEPARATOR: &str = " | ";
/// Section label for OCR output
pub const OCR_SECTION: &str = "OCR Extracted Text";
/// Section label for vision-model output
pub const VISION_SECTION: &str = "Vision Model Description";

/// Start of a run of text with one modality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModalitySpan {
    /// Byte offset into `ExtractedText::text`
    pub offset: usize,
    pub modality: Modality,
}

/// Extraction output: text, where each modality begins, and absorbed failures
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub text: String,
    pub spans: Vec<ModalitySpan>,
    pub warnings: Vec<ExtractionWarning>,
    /// Pages, sheets or images seen
    pub units: usize,
}

impl ExtractedText {
    /// Append a section, separated from previous content by a blank line
    pub fn push_section(&mut self, modality: Modality, content: &str) {
        let content = content.trim_end();
        if content.trim().is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push_str("\n\n");
        }
        if self.spans.last().map(|s| s.modality) != Some(modality) {
            self.spans.push(ModalitySpan {
                offset: self.text.len(),
                modality,
            });
        }
        self.text.push_str(content);
    }

    pub fn warn(&mut self, location: impl Into<String>, message: impl Into<String>) {
        let warning = ExtractionWarning::new(location, message);
        tracing::warn!("Extraction skipped {}: {}", warning.location, warning.message);
        self.warnings.push(warning);
    }

    /// Absorb a per-input failure; service outages propagate
    fn absorb(&mut self, location: &str, err: Error) -> Result<()> {
        match err {
            Error::Extraction { message, .. } => {
                self.warn(location, message);
                Ok(())
            }
            e @ (Error::OcrUnavailable(_) | Error::VisionUnavailable(_)) => Err(e),
            other => {
                self.warn(location, other.to_string());
                Ok(())
            }
        }
    }

    /// Modality of the section containing byte `offset`
    pub fn modality_at(&self, offset: usize) -> Modality {
        self.spans
            .iter()
            .take_while(|s| s.offset <= offset)
            .last()
            .map(|s| s.modality)
            .unwrap_or_default()
    }

    pub fn char_count(&self) -> usize {
        self.text.trim().chars().count()
    }
}

/// Format extractor holding the OCR, vision and rasterizer capabilities
pub struct FormatExtractor {
    config: ExtractionConfig,
    ocr: Arc<dyn OcrProvider>,
    vision: Arc<dyn VisionProvider>,
    rasterizer: Arc<dyn PdfRasterizer>,
}

impl FormatExtractor {
    pub fn new(
        config: ExtractionConfig,
        ocr: Arc<dyn OcrProvider>,
        vision: Arc<dyn VisionProvider>,
        rasterizer: Arc<dyn PdfRasterizer>,
    ) -> Self {
        Self {
            config,
            ocr,
            vision,
            rasterizer,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Check the extension before any work is done
    pub fn detect(filename: &str) -> Result<(FileType, ExtractionStrategy)> {
        let file_type = FileType::from_filename(filename);
        match file_type.strategy() {
            Some(strategy) => Ok((file_type, strategy)),
            None => {
                let ext = std::path::Path::new(filename)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("");
                Err(Error::UnsupportedFormat(if ext.is_empty() {
                    format!("'{filename}' has no extension")
                } else {
                    format!(".{ext}")
                }))
            }
        }
    }

    /// Extract text from a file based on its extension
    pub async fn extract(&self, filename: &str, data: &[u8]) -> Result<ExtractedText> {
        let (file_type, strategy) = Self::detect(filename)?;

        let extracted = match strategy {
            ExtractionStrategy::PlainText => Self::extract_text(data),
            ExtractionStrategy::WordProcessor => Self::extract_docx(data)?,
            ExtractionStrategy::Spreadsheet => self.extract_spreadsheet(filename, file_type, data)?,
            ExtractionStrategy::Pdf => self.extract_pdf(data).await?,
            ExtractionStrategy::Image => self.extract_image(data).await?,
        };

        tracing::debug!(
            "Extracted {} chars from {} ({} warnings)",
            extracted.text.len(),
            filename,
            extracted.warnings.len()
        );
        Ok(extracted)
    }

    /// Plain text and markdown pass through unchanged
    fn extract_text(data: &[u8]) -> ExtractedText {
        let content = String::from_utf8_lossy(data);
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

        let mut out = ExtractedText {
            units: 1,
            ..Default::default()
        };
        if !content.trim().is_empty() {
            out.spans.push(ModalitySpan {
                offset: 0,
                modality: Modality::NativeText,
            });
            out.text = content.to_string();
        }
        out
    }

    /// Paragraphs in order, then each table as marker plus separated rows
    fn extract_docx(data: &[u8]) -> Result<ExtractedText> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::extraction("document", format!("unreadable .docx: {e}")))?;

        let mut paragraphs = Vec::new();
        let mut tables = Vec::new();

        for child in &doc.document.children {
            match child {
                docx_rs::DocumentChild::Paragraph(p) => paragraphs.push(paragraph_text(p)),
                docx_rs::DocumentChild::Table(table) => tables.push(table_text(table)),
                _ => {}
            }
        }

        let mut out = ExtractedText {
            units: 1,
            ..Default::default()
        };
        out.push_section(Modality::NativeText, &paragraphs.join("\n"));
        for table in tables {
            out.push_section(Modality::NativeText, &format!("{TABLE_MARKER}\n{table}"));
        }
        Ok(out)
    }

    fn extract_spreadsheet(
        &self,
        filename: &str,
        file_type: FileType,
        data: &[u8],
    ) -> Result<ExtractedText> {
        if file_type == FileType::Csv {
            let sheet = std::path::Path::new(filename)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Sheet1");
            return Ok(self.extract_csv(sheet, data));
        }

        let cursor = std::io::Cursor::new(data);
        let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
            .map_err(|e| Error::extraction("workbook", format!("unreadable spreadsheet: {e}")))?;

        let mut out = ExtractedText::default();
        for sheet_name in workbook.sheet_names() {
            out.units += 1;
            let location = format!("sheet '{sheet_name}'");
            match workbook.worksheet_range(&sheet_name) {
                Ok(range) => {
                    let rows = range
                        .rows()
                        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
                    let sheet = self.render_sheet(&sheet_name, rows);
                    out.push_section(Modality::NativeText, &sheet);
                }
                Err(e) => out.warn(location, e.to_string()),
            }
        }
        Ok(out)
    }

    fn extract_csv(&self, sheet_name: &str, data: &[u8]) -> ExtractedText {
        let mut out = ExtractedText {
            units: 1,
            ..Default::default()
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            // Header plus the capped data rows; the rest is never parsed
            if rows.len() > self.config.max_sheet_rows {
                break;
            }
            match record {
                Ok(record) => rows.push(record.iter().map(str::to_string).collect::<Vec<_>>()),
                Err(e) => out.warn(format!("row {}", i + 1), e.to_string()),
            }
        }

        let sheet = self.render_sheet(sheet_name, rows.into_iter());
        out.push_section(Modality::NativeText, &sheet);
        out
    }

    /// Sheet marker, header row, then at most `max_sheet_rows` data rows
    fn render_sheet<I>(&self, sheet_name: &str, rows: I) -> String
    where
        I: Iterator<Item = Vec<String>>,
    {
        let mut rows = rows.filter(|cells| cells.iter().any(|c| !c.trim().is_empty()));
        let mut sheet = format!("Sheet: {sheet_name}\n");

        if let Some(header) = rows.next() {
            sheet.push_str(&header.join(CELL_SEPARATOR));
            sheet.push('\n');
        }

        let mut emitted = 0;
        for row in rows.by_ref().take(self.config.max_sheet_rows) {
            sheet.push_str(&row.join(CELL_SEPARATOR));
            sheet.push('\n');
            emitted += 1;
        }
        if rows.next().is_some() {
            tracing::debug!(
                "Sheet '{}' truncated to {} data rows",
                sheet_name,
                self.config.max_sheet_rows
            );
        }
        tracing::debug!("Sheet '{}': {} data rows", sheet_name, emitted);
        sheet
    }

    /// Native text per page; short results fall back to rasterize + OCR/vision
    async fn extract_pdf(&self, data: &[u8]) -> Result<ExtractedText> {
        let bytes = data.to_vec();
        let native = tokio::task::spawn_blocking(move || native_pdf_text(&bytes))
            .await
            .unwrap_or_else(|e| NativePdf {
                pages: Vec::new(),
                warnings: vec![ExtractionWarning::new("pdf", format!("text extraction panicked: {e}"))],
            });

        let mut out = ExtractedText {
            units: native.pages.len(),
            ..Default::default()
        };
        for warning in native.warnings {
            out.warn(warning.location, warning.message);
        }
        let native_text = native
            .pages
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        out.push_section(Modality::NativeText, &native_text);

        let wants_fallback = self.config.ocr_enabled || self.config.vision_enabled;
        if out.char_count() >= self.config.pdf_min_text_length || !wants_fallback {
            return Ok(out);
        }

        tracing::info!(
            "PDF has {} chars of native text (< {}); rasterizing for OCR/vision",
            out.char_count(),
            self.config.pdf_min_text_length
        );

        let images = match self.rasterizer.rasterize(data, self.config.rasterize_dpi).await {
            Ok(images) => images,
            Err(Error::OcrUnavailable(message)) if !self.config.ocr_enabled => {
                return Err(Error::VisionUnavailable(message));
            }
            Err(e) => {
                out.absorb("pdf", e)?;
                return Ok(out);
            }
        };
        out.units = out.units.max(images.len());

        for (i, image) in images.iter().enumerate() {
            let page = i + 1;
            self.describe_image(&mut out, image, &format!("Page {page}: "), &format!("page {page}"))
                .await?;
        }
        Ok(out)
    }

    async fn extract_image(&self, data: &[u8]) -> Result<ExtractedText> {
        let mut out = ExtractedText {
            units: 1,
            ..Default::default()
        };
        self.describe_image(&mut out, data, "", "image").await?;
        Ok(out)
    }

    /// Run enabled OCR then vision on one image, appending labeled sections
    async fn describe_image(
        &self,
        out: &mut ExtractedText,
        image: &[u8],
        label_prefix: &str,
        location: &str,
    ) -> Result<()> {
        if self.config.ocr_enabled {
            match self.ocr.recognize(image, &self.config.ocr_languages).await {
                Ok(text) if !text.trim().is_empty() => out.push_section(
                    Modality::OcrText,
                    &format!("=== {label_prefix}{OCR_SECTION} ===\n{}", text.trim()),
                ),
                Ok(_) => tracing::debug!("OCR found no text in {}", location),
                Err(e) => out.absorb(location, e)?,
            }
        }

        if self.config.vision_enabled {
            match self.vision.describe(image).await {
                Ok(text) if !text.trim().is_empty() => out.push_section(
                    Modality::VisionDescription,
                    &format!("=== {label_prefix}{VISION_SECTION} ===\n{}", text.trim()),
                ),
                Ok(_) => tracing::debug!("Vision model returned nothing for {}", location),
                Err(e) => out.absorb(location, e)?,
            }
        }
        Ok(())
    }
}

struct NativePdf {
    pages: Vec<String>,
    warnings: Vec<ExtractionWarning>,
}

/// Page-by-page text via lopdf; whole-file pdf-extract when lopdf cannot load it
fn native_pdf_text(data: &[u8]) -> NativePdf {
    let mut warnings = Vec::new();

    match lopdf::Document::load_mem(data) {
        Ok(doc) => {
            let mut pages = Vec::new();
            for page_number in doc.get_pages().keys() {
                match doc.extract_text(&[*page_number]) {
                    Ok(text) => pages.push(clean_pdf_text(&text)),
                    Err(e) => {
                        pages.push(String::new());
                        warnings.push(ExtractionWarning::new(
                            format!("page {page_number}"),
                            e.to_string(),
                        ));
                    }
                }
            }
            NativePdf { pages, warnings }
        }
        Err(load_err) => {
            tracing::debug!("lopdf could not load PDF ({}); trying pdf-extract", load_err);
            match pdf_extract::extract_text_from_mem(data) {
                Ok(text) => NativePdf {
                    pages: vec![clean_pdf_text(&text)],
                    warnings,
                },
                Err(e) => {
                    warnings.push(ExtractionWarning::new("pdf", e.to_string()));
                    NativePdf {
                        pages: Vec::new(),
                        warnings,
                    }
                }
            }
        }
    }
}

/// Drop NULs and blank lines, trim each line
fn clean_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn paragraph_text(p: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &p.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    docx_rs::RunChild::Text(t) => text.push_str(&t.text),
                    docx_rs::RunChild::Tab(_) => text.push('\t'),
                    _ => {}
                }
            }
        }
    }
    text
}

/// Rows in order, cells joined by the separator
#[allow(irrefutable_let_patterns)]
fn table_text(table: &docx_rs::Table) -> String {
    let mut lines = Vec::new();
    for row in &table.rows {
        let docx_rs::TableChild::TableRow(row) = row else {
            continue;
        };
        let mut cells = Vec::new();
        for cell in &row.cells {
            if let docx_rs::TableRowChild::TableCell(cell) = cell {
                let content = cell
                    .children
                    .iter()
                    .filter_map(|c| match c {
                        docx_rs::TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                cells.push(content.trim().to_string());
            }
        }
        lines.push(cells.join(CELL_SEPARATOR));
    }
    lines.join("\n")
}

fn cell_text(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(s) => s.trim().to_string(),
        calamine::Data::Float(f) => f.to_string(),
        calamine::Data::Int(i) => i.to_string(),
        calamine::Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{NoopOcr, NoopRasterizer, NoopVision};
    use async_trait::async_trait;

    struct FixedOcr(&'static str);

    #[async_trait]
    impl OcrProvider for FixedOcr {
        async fn recognize(&self, _image: &[u8], _languages: &[String]) -> Result<String> {
            Ok(self.0.to_string())
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FixedVision(&'static str);

    #[async_trait]
    impl VisionProvider for FixedVision {
        async fn describe(&self, _image: &[u8]) -> Result<String> {
            Ok(self.0.to_string())
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct DownOcr;

    #[async_trait]
    impl OcrProvider for DownOcr {
        async fn recognize(&self, _image: &[u8], _languages: &[String]) -> Result<String> {
            Err(Error::OcrUnavailable("tesseract not found".into()))
        }
        fn name(&self) -> &str {
            "down"
        }
    }

    /// Two blank "pages"; the bytes never reach a real OCR engine
    struct TwoPages;

    #[async_trait]
    impl PdfRasterizer for TwoPages {
        async fn rasterize(&self, _pdf: &[u8], _dpi: u32) -> Result<Vec<Vec<u8>>> {
            Ok(vec![b"page1".to_vec(), b"page2".to_vec()])
        }
        fn name(&self) -> &str {
            "two"
        }
    }

    struct MissingRasterizer;

    #[async_trait]
    impl PdfRasterizer for MissingRasterizer {
        async fn rasterize(&self, _pdf: &[u8], _dpi: u32) -> Result<Vec<Vec<u8>>> {
            Err(Error::OcrUnavailable("PDF rasterizer pdftoppm not found".into()))
        }
        fn name(&self) -> &str {
            "missing"
        }
    }

    fn noop_extractor(config: ExtractionConfig) -> FormatExtractor {
        FormatExtractor::new(
            config,
            Arc::new(NoopOcr),
            Arc::new(NoopVision),
            Arc::new(NoopRasterizer),
        )
    }

    fn text_only() -> ExtractionConfig {
        ExtractionConfig {
            ocr_enabled: false,
            vision_enabled: false,
            ..ExtractionConfig::default()
        }
    }

    /// Single-page PDF with one line of Courier text
    fn pdf_with_text(text: &str) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let extractor = noop_extractor(text_only());
        let err = extractor.extract("tool.exe", b"MZ").await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(matches!(
            FormatExtractor::detect("Makefile"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_plain_text_passes_through() {
        let extractor = noop_extractor(text_only());
        let text = "Line one\n\n  indented line\n";
        let out = extractor.extract("notes.md", text.as_bytes()).await.unwrap();
        assert_eq!(out.text, text);
        assert_eq!(out.modality_at(5), Modality::NativeText);

        let empty = extractor.extract("empty.txt", b"").await.unwrap();
        assert!(empty.text.is_empty());
    }

    #[tokio::test]
    async fn test_csv_header_and_row_cap() {
        let extractor = noop_extractor(ExtractionConfig {
            max_sheet_rows: 2,
            ..text_only()
        });
        let csv = "region,amount\nnorth,10\nsouth,20\neast,30\n";
        let out = extractor.extract("sales.csv", csv.as_bytes()).await.unwrap();

        assert_eq!(
            out.text,
            "Sheet: sales\nregion | amount\nnorth | 10\nsouth | 20"
        );
    }

    /// OpenDocument spreadsheet with one string-valued table per sheet
    fn ods_workbook(sheets: Vec<(&str, Vec<Vec<&str>>)>) -> Vec<u8> {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut body = String::new();
        for (name, rows) in sheets {
            body.push_str(&format!("<table:table table:name=\"{name}\">"));
            for row in rows {
                body.push_str("<table:table-row>");
                for cell in row {
                    body.push_str(&format!(
                        "<table:table-cell office:value-type=\"string\"><text:p>{cell}</text:p></table:table-cell>"
                    ));
                }
                body.push_str("</table:table-row>");
            }
            body.push_str("</table:table>");
        }
        let content = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" office:version="1.2"><office:body><office:spreadsheet>{body}</office:spreadsheet></office:body></office:document-content>"#
        );

        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/vnd.oasis.opendocument.spreadsheet").unwrap();
        zip.start_file("content.xml", SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_docx_paragraphs_then_tables() {
        use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};

        let cell = |text: &str| TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)));
        let mut buf = std::io::Cursor::new(Vec::new());
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Quarterly summary")))
            .add_table(Table::new(vec![
                TableRow::new(vec![cell("region"), cell("amount")]),
                TableRow::new(vec![cell("north"), cell("10")]),
                TableRow::new(vec![cell("south"), cell("20")]),
            ]))
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Figures are final.")))
            .build()
            .pack(&mut buf)
            .unwrap();

        let extractor = noop_extractor(text_only());
        let out = extractor.extract("report.docx", buf.get_ref()).await.unwrap();

        assert_eq!(
            out.text,
            "Quarterly summary\nFigures are final.\n\n[TABLE]\nregion | amount\nnorth | 10\nsouth | 20"
        );
        assert!(out.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_workbook_marks_each_sheet_and_caps_rows() {
        let extractor = noop_extractor(ExtractionConfig {
            max_sheet_rows: 2,
            ..text_only()
        });
        let data = ods_workbook(vec![
            (
                "Sales",
                vec![
                    vec!["region", "amount"],
                    vec!["north", "ten"],
                    vec!["south", "twenty"],
                    vec!["east", "thirty"],
                ],
            ),
            ("Notes", vec![vec!["topic"], vec!["invoices due"]]),
        ]);

        let out = extractor.extract("book.ods", &data).await.unwrap();

        assert_eq!(
            out.text,
            "Sheet: Sales\nregion | amount\nnorth | ten\nsouth | twenty\n\nSheet: Notes\ntopic\ninvoices due"
        );
        assert_eq!(out.units, 2);
    }

    #[tokio::test]
    async fn test_corrupt_docx_is_extraction_error() {
        let extractor = noop_extractor(text_only());
        let err = extractor.extract("broken.docx", b"not a zip").await.unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[tokio::test]
    async fn test_image_sections_are_labeled() {
        let config = ExtractionConfig {
            ocr_enabled: true,
            vision_enabled: true,
            ..ExtractionConfig::default()
        };
        let extractor = FormatExtractor::new(
            config,
            Arc::new(FixedOcr("INVOICE 42")),
            Arc::new(FixedVision("A scanned invoice.")),
            Arc::new(NoopRasterizer),
        );

        let out = extractor.extract("scan.png", b"png").await.unwrap();
        assert_eq!(
            out.text,
            "=== OCR Extracted Text ===\nINVOICE 42\n\n=== Vision Model Description ===\nA scanned invoice."
        );
        assert_eq!(out.modality_at(0), Modality::OcrText);
        let vision_start = out.text.find("=== Vision").unwrap();
        assert_eq!(out.modality_at(vision_start), Modality::VisionDescription);
    }

    #[tokio::test]
    async fn test_ocr_outage_aborts() {
        let config = ExtractionConfig {
            ocr_enabled: true,
            ..ExtractionConfig::default()
        };
        let extractor = FormatExtractor::new(
            config,
            Arc::new(DownOcr),
            Arc::new(NoopVision),
            Arc::new(NoopRasterizer),
        );
        let err = extractor.extract("scan.jpg", b"jpg").await.unwrap_err();
        assert!(matches!(err, Error::OcrUnavailable(_)));
    }

    #[tokio::test]
    async fn test_pdf_native_text() {
        let extractor = noop_extractor(text_only());
        let pdf = pdf_with_text("Quarterly revenue grew by twelve percent across all regions.");
        let out = extractor.extract("report.pdf", &pdf).await.unwrap();

        assert!(out.text.contains("Quarterly revenue"));
        assert_eq!(out.units, 1);
    }

    #[tokio::test]
    async fn test_short_pdf_falls_back_to_ocr_per_page() {
        let config = ExtractionConfig {
            ocr_enabled: true,
            ..ExtractionConfig::default()
        };
        let extractor = FormatExtractor::new(
            config,
            Arc::new(FixedOcr("scanned words")),
            Arc::new(NoopVision),
            Arc::new(TwoPages),
        );

        let pdf = pdf_with_text("tiny");
        let out = extractor.extract("scan.pdf", &pdf).await.unwrap();

        assert!(out.text.contains("=== Page 1: OCR Extracted Text ===\nscanned words"));
        assert!(out.text.contains("=== Page 2: OCR Extracted Text ==="));
        let ocr_start = out.text.find("=== Page 1").unwrap();
        assert_eq!(out.modality_at(ocr_start), Modality::OcrText);
    }

    #[tokio::test]
    async fn test_missing_rasterizer_blames_the_requested_service() {
        let pdf = pdf_with_text("tiny");

        let vision_only = FormatExtractor::new(
            ExtractionConfig {
                ocr_enabled: false,
                vision_enabled: true,
                ..ExtractionConfig::default()
            },
            Arc::new(NoopOcr),
            Arc::new(FixedVision("a chart")),
            Arc::new(MissingRasterizer),
        );
        let err = vision_only.extract("scan.pdf", &pdf).await.unwrap_err();
        assert!(matches!(err, Error::VisionUnavailable(_)));

        let with_ocr = FormatExtractor::new(
            ExtractionConfig {
                ocr_enabled: true,
                ..ExtractionConfig::default()
            },
            Arc::new(FixedOcr("words")),
            Arc::new(NoopVision),
            Arc::new(MissingRasterizer),
        );
        let err = with_ocr.extract("scan.pdf", &pdf).await.unwrap_err();
        assert!(matches!(err, Error::OcrUnavailable(_)));
    }

    #[tokio::test]
    async fn test_garbage_pdf_is_partial_not_fatal() {
        let extractor = noop_extractor(text_only());
        let out = extractor.extract("bad.pdf", b"%PDF-1.4 garbage").await.unwrap();
        assert!(out.text.trim().is_empty());
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_push_section_spans() {
        let mut out = ExtractedText::default();
        out.push_section(Modality::NativeText, "abc");
        out.push_section(Modality::NativeText, "def");
        out.push_section(Modality::OcrText, "ghi");
        out.push_section(Modality::VisionDescription, "   ");

        assert_eq!(out.text, "abc\n\ndef\n\nghi");
        assert_eq!(out.spans.len(), 2);
        assert_eq!(out.modality_at(4), Modality::NativeText);
        assert_eq!(out.modality_at(10), Modality::OcrText);
    }
}
