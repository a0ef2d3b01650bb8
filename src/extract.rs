//! Multi-format text extraction for uploaded documents.
//!
//! Upload handlers supply bytes plus a declared file kind; this module
//! returns plain UTF-8 text. Paged formats (PDF) extract page-by-page and
//! tolerate per-page failures; structured formats (DOCX) concatenate
//! paragraph text and append table rows; spreadsheets iterate every sheet
//! with a sheet-name marker per sheet.

use std::io::Read;

/// Delimiter between cell values within one table/spreadsheet row.
const CELL_DELIMITER: &str = " | ";

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// File extensions accepted at upload time (without the leading dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt", "xlsx", "xls"];

/// Recognized document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    Txt,
    Xlsx,
    Xls,
}

impl FileKind {
    /// Maps a file extension (without dot, case-insensitive) to a kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            "txt" => Some(FileKind::Txt),
            "xlsx" => Some(FileKind::Xlsx),
            "xls" => Some(FileKind::Xls),
            _ => None,
        }
    }

    /// Derives the kind from a file name, if its extension is recognized.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = std::path::Path::new(name).extension()?.to_str()?;
        Self::from_extension(ext)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Txt => "txt",
            FileKind::Xlsx => "xlsx",
            FileKind::Xls => "xls",
        }
    }
}

/// Extraction error. Per-page and per-sheet failures inside a supported file
/// are logged and skipped instead of surfacing here.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedType(String),
    Pdf(String),
    Ooxml(String),
    Spreadsheet(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedType(ext) => {
                write!(f, "unsupported file type: {}", ext)
            }
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "OOXML extraction failed: {}", e),
            ExtractError::Spreadsheet(e) => write!(f, "spreadsheet extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extracts plain text from document bytes according to the declared kind.
pub fn extract_text(bytes: &[u8], kind: FileKind) -> Result<String, ExtractError> {
    match kind {
        FileKind::Pdf => extract_pdf(bytes),
        FileKind::Docx => extract_docx(bytes),
        FileKind::Txt => Ok(extract_txt(bytes)),
        FileKind::Xlsx => extract_xlsx(bytes),
        FileKind::Xls => extract_xls(bytes),
    }
}

// ============ PDF ============

/// Extracts a PDF page-by-page. Unreadable pages are logged and skipped so a
/// partially corrupt document still yields whatever content is recoverable.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let mut out = String::new();
    for (&page_number, _) in doc.get_pages().iter() {
        match doc.extract_text(&[page_number]) {
            Ok(page_text) => {
                let page_text = page_text.trim();
                if !page_text.is_empty() {
                    out.push_str(&format!("\n--- Page {} ---\n", page_number));
                    out.push_str(page_text);
                }
            }
            Err(e) => {
                tracing::warn!(page = page_number, error = %e, "skipping unreadable PDF page");
                continue;
            }
        }
    }
    Ok(out)
}

// ============ DOCX ============

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Extracts DOCX body text: non-empty paragraph text first, then table rows
/// with cell text joined by [`CELL_DELIMITER`], appended after the paragraphs.
fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let doc_xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;

    let mut paragraphs = String::new();
    let mut tables = String::new();

    let mut reader = quick_xml::Reader::from_reader(doc_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut table_depth = 0usize;
    let mut in_text = false;
    let mut para_buf = String::new();
    let mut cell_buf = String::new();
    let mut row_cells: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" => table_depth += 1,
                b"tc" => cell_buf.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_text => {
                let text = te.unescape().unwrap_or_default();
                if table_depth > 0 {
                    cell_buf.push_str(text.as_ref());
                } else {
                    para_buf.push_str(text.as_ref());
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                b"p" => {
                    if table_depth > 0 {
                        // Paragraph break inside a table cell.
                        if !cell_buf.is_empty() && !cell_buf.ends_with(' ') {
                            cell_buf.push(' ');
                        }
                    } else {
                        let para = para_buf.trim();
                        if !para.is_empty() {
                            paragraphs.push_str(para);
                            paragraphs.push('\n');
                        }
                        para_buf.clear();
                    }
                }
                b"tc" => {
                    let cell = cell_buf.trim();
                    if !cell.is_empty() {
                        row_cells.push(cell.to_string());
                    }
                    cell_buf.clear();
                }
                b"tr" => {
                    if !row_cells.is_empty() {
                        tables.push_str(&row_cells.join(CELL_DELIMITER));
                        tables.push('\n');
                        row_cells.clear();
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let mut out = paragraphs;
    out.push_str(&tables);
    Ok(out)
}

// ============ TXT ============

/// Decodes plain text with an ordered encoding ladder: UTF-8, then UTF-16
/// (BOM-detected), then Windows-1252. The last step is total, mapping the
/// five undefined 1252 bytes to replacement characters, so decoding never
/// fails outright.
fn extract_txt(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    if let Some(s) = decode_utf16_bom(bytes) {
        return s;
    }
    decode_windows_1252(bytes)
}

fn decode_utf16_bom(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 2 {
        return None;
    }
    let little_endian = match (bytes[0], bytes[1]) {
        (0xFF, 0xFE) => true,
        (0xFE, 0xFF) => false,
        _ => return None,
    };
    let units: Vec<u16> = bytes[2..]
        .chunks(2)
        .map(|pair| {
            let (a, b) = (pair[0], *pair.get(1).unwrap_or(&0));
            if little_endian {
                u16::from_le_bytes([a, b])
            } else {
                u16::from_be_bytes([a, b])
            }
        })
        .collect();
    Some(String::from_utf16_lossy(&units))
}

/// Windows-1252 mapping for the 0x80..=0x9F range; everything else matches
/// Latin-1. `\u{FFFD}` marks the five unassigned code points.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}', '\u{017D}', '\u{FFFD}',
    '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
];

fn decode_windows_1252(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => CP1252_HIGH[(b - 0x80) as usize],
            _ => b as char,
        })
        .collect()
}

// ============ XLSX ============

/// Extracts an XLSX workbook: every sheet in workbook declaration order,
/// prefixed with a `--- Sheet: name ---` marker, non-empty cell values
/// joined per row.
fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let entries = worksheet_entries(&mut archive)?;

    let mut out = String::new();
    for (name, path) in &entries {
        let sheet_xml = match read_zip_entry_bounded(&mut archive, path, MAX_XML_ENTRY_BYTES) {
            Ok(xml) => xml,
            Err(e) => {
                tracing::warn!(sheet = %name, error = %e, "skipping unreadable worksheet");
                continue;
            }
        };
        let rows = match extract_xlsx_sheet_rows(&sheet_xml, &shared_strings) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(sheet = %name, error = %e, "skipping unreadable worksheet");
                continue;
            }
        };
        out.push_str(&format!("\n--- Sheet: {} ---\n", name));
        for row in rows {
            out.push_str(&row.join(CELL_DELIMITER));
            out.push('\n');
        }
    }
    Ok(out)
}

/// Pairs each sheet's display name with its worksheet path, in workbook
/// declaration order. Names come from `xl/workbook.xml`; each sheet's
/// `r:id` resolves to a file through `xl/_rels/workbook.xml.rels`, which is
/// the only correct mapping once sheets have been reordered or renamed.
/// Workbooks missing either part fall back to numeric file order.
fn worksheet_entries(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<(String, String)>, ExtractError> {
    if let Some(entries) = resolve_sheets_via_rels(archive)? {
        return Ok(entries);
    }
    let paths = list_worksheet_paths(archive);
    let names = read_sheet_names(archive)?;
    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(idx, path)| {
            let name = names
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("Sheet{}", idx + 1));
            (name, path)
        })
        .collect())
}

/// Resolves `(name, path)` pairs through the workbook relationships part.
/// Returns `None` when the parts are absent or any reference is dangling,
/// in which case the caller falls back to file-name pairing.
fn resolve_sheets_via_rels(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Option<Vec<(String, String)>>, ExtractError> {
    const RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
    if !archive.file_names().any(|n| n == RELS_PATH)
        || !archive.file_names().any(|n| n == "xl/workbook.xml")
    {
        return Ok(None);
    }

    // Relationship id -> target path, e.g. rId1 -> worksheets/sheet1.xml.
    let rels_xml = read_zip_entry_bounded(archive, RELS_PATH, MAX_XML_ENTRY_BYTES)?;
    let mut targets = std::collections::HashMap::new();
    let mut reader = quick_xml::Reader::from_reader(rels_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) | Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut id = None;
                    let mut target = None;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Id" => id = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                            b"Target" => {
                                target = Some(String::from_utf8_lossy(&attr.value).into_owned())
                            }
                            _ => {}
                        }
                    }
                    if let (Some(id), Some(target)) = (id, target) {
                        targets.insert(id, target);
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    // Sheet name + r:id, in declaration order.
    let workbook_xml = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(workbook_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) | Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    let mut name = None;
                    let mut rid = None;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"name" {
                            name = Some(String::from_utf8_lossy(&attr.value).into_owned());
                        } else if attr.key.local_name().as_ref() == b"id" {
                            // r:id, whatever the declared namespace prefix.
                            rid = Some(String::from_utf8_lossy(&attr.value).into_owned());
                        }
                    }
                    match (name, rid) {
                        (Some(name), Some(rid)) => sheets.push((name, rid)),
                        _ => return Ok(None),
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if sheets.is_empty() {
        return Ok(None);
    }

    let mut entries = Vec::with_capacity(sheets.len());
    for (name, rid) in sheets {
        let Some(target) = targets.get(&rid) else {
            return Ok(None);
        };
        // Targets are relative to xl/ unless they start at the root.
        let path = if let Some(absolute) = target.strip_prefix('/') {
            absolute.to_string()
        } else {
            format!("xl/{}", target)
        };
        if !archive.file_names().any(|n| n == path) {
            return Ok(None);
        }
        entries.push((name, path));
    }
    Ok(Some(entries))
}

fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    // A workbook with no string cells has no sharedStrings.xml at all.
    if !archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_si = false;
    let mut in_text = false;
    let mut current = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_text = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_text => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn list_worksheet_paths(archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>) -> Vec<String> {
    let mut paths: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    paths.sort_by_key(|path| {
        path.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    paths
}

/// Reads display names from xl/workbook.xml, in declaration order.
fn read_sheet_names(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    if !archive.file_names().any(|n| n == "xl/workbook.xml") {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)?;
    let mut names = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e))
            | Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"name" {
                            names.push(
                                String::from_utf8_lossy(attr.value.as_ref()).into_owned(),
                            );
                        }
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(names)
}

/// Parses one worksheet into rows of non-empty cell values. Handles shared
/// strings (`t="s"`), inline strings (`t="inlineStr"`), and literal values.
fn extract_xlsx_sheet_rows(
    xml: &[u8],
    shared_strings: &[String],
) -> Result<Vec<Vec<String>>, ExtractError> {
    #[derive(PartialEq)]
    enum CellType {
        SharedString,
        InlineString,
        Literal,
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut row_cells: Vec<String> = Vec::new();
    let mut cell_type = CellType::Literal;
    let mut in_value = false;
    let mut in_inline_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => row_cells.clear(),
                b"c" => {
                    cell_type = CellType::Literal;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"t" {
                            cell_type = match attr.value.as_ref() {
                                b"s" => CellType::SharedString,
                                b"inlineStr" => CellType::InlineString,
                                _ => CellType::Literal,
                            };
                        }
                    }
                }
                b"v" => in_value = true,
                b"t" if cell_type == CellType::InlineString => in_inline_text = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_value || in_inline_text => {
                let raw = te.unescape().unwrap_or_default();
                let value = raw.trim();
                if value.is_empty() {
                    continue;
                }
                if in_inline_text {
                    row_cells.push(value.to_string());
                } else {
                    match cell_type {
                        CellType::SharedString => {
                            if let Ok(i) = value.parse::<usize>() {
                                if let Some(s) = shared_strings.get(i) {
                                    let s = s.trim();
                                    if !s.is_empty() {
                                        row_cells.push(s.to_string());
                                    }
                                }
                            }
                        }
                        _ => row_cells.push(value.to_string()),
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"row" => {
                    if !row_cells.is_empty() {
                        rows.push(std::mem::take(&mut row_cells));
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

// ============ XLS (legacy BIFF) ============

/// Extracts a legacy `.xls` workbook through calamine, rendered with the
/// same sheet-marker and row-join formatting as the XLSX path.
fn extract_xls(bytes: &[u8]) -> Result<String, ExtractError> {
    use calamine::Reader;

    let cursor = std::io::Cursor::new(bytes.to_vec());
    let mut workbook = calamine::Xls::new(cursor)
        .map_err(|e| ExtractError::Spreadsheet(e.to_string()))?;
    let sheet_names = workbook.sheet_names().to_owned();

    let mut out = String::new();
    for name in sheet_names {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!(sheet = %name, error = %e, "skipping unreadable worksheet");
                continue;
            }
        };
        out.push_str(&format!("\n--- Sheet: {} ---\n", name));
        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .filter(|cell| !matches!(cell, calamine::Data::Empty))
                .map(|cell| cell.to_string().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !cells.is_empty() {
                out.push_str(&cells.join(CELL_DELIMITER));
                out.push('\n');
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_allowed_extensions() {
        for ext in ALLOWED_EXTENSIONS {
            assert!(FileKind::from_extension(ext).is_some(), "missing {}", ext);
        }
        assert!(FileKind::from_extension("csv").is_none());
        assert!(FileKind::from_extension("md").is_none());
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(FileKind::from_extension("PDF"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_file_name("Report.DOCX"), Some(FileKind::Docx));
        assert_eq!(FileKind::from_file_name("no_extension"), None);
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", FileKind::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", FileKind::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn invalid_xls_returns_error() {
        let err = extract_text(b"not a workbook", FileKind::Xls).unwrap_err();
        assert!(matches!(err, ExtractError::Spreadsheet(_)));
    }

    #[test]
    fn txt_decodes_utf8() {
        assert_eq!(extract_txt("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn txt_decodes_utf16_le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "héllo".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(extract_txt(&bytes), "héllo");
    }

    #[test]
    fn txt_falls_back_to_windows_1252() {
        // 0x93/0x94 are curly quotes in 1252 and invalid UTF-8.
        let bytes = b"\x93quoted\x94 caf\xe9";
        assert_eq!(extract_txt(bytes), "\u{201C}quoted\u{201D} caf\u{e9}");
    }

    #[test]
    fn txt_maps_undefined_1252_bytes_to_replacement() {
        let bytes = b"\x81\xfe";
        let decoded = extract_txt(bytes);
        assert!(decoded.starts_with('\u{FFFD}'));
    }

    fn xlsx_from_parts(parts: &[(&str, &str)]) -> Vec<u8> {
        use std::io::Write;
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, content) in parts {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    // A workbook whose first declared sheet lives in sheet2.xml: the r:id
    // indirection, not the file number, decides which marker a sheet gets.
    #[test]
    fn xlsx_sheet_names_follow_relationship_ids() {
        let workbook = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
            <sheets>
                <sheet name="Alpha" sheetId="1" r:id="rId2"/>
                <sheet name="Beta" sheetId="2" r:id="rId1"/>
            </sheets>
        </workbook>"#;
        let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
            <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
            <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
        </Relationships>"#;
        let sheet1 = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
            <sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>beta content</t></is></c></row></sheetData>
        </worksheet>"#;
        let sheet2 = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
            <sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>alpha content</t></is></c></row></sheetData>
        </worksheet>"#;
        let bytes = xlsx_from_parts(&[
            ("xl/workbook.xml", workbook),
            ("xl/_rels/workbook.xml.rels", rels),
            ("xl/worksheets/sheet1.xml", sheet1),
            ("xl/worksheets/sheet2.xml", sheet2),
        ]);

        let text = extract_text(&bytes, FileKind::Xlsx).unwrap();
        let alpha_marker = text.find("--- Sheet: Alpha ---").unwrap();
        let alpha_content = text.find("alpha content").unwrap();
        let beta_marker = text.find("--- Sheet: Beta ---").unwrap();
        let beta_content = text.find("beta content").unwrap();
        assert!(alpha_marker < alpha_content && alpha_content < beta_marker);
        assert!(beta_marker < beta_content);
    }

    #[test]
    fn xlsx_without_rels_falls_back_to_file_order() {
        let workbook = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
            <sheets><sheet name="Only" sheetId="1"/></sheets>
        </workbook>"#;
        let sheet1 = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
            <sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>lone cell</t></is></c></row></sheetData>
        </worksheet>"#;
        let bytes = xlsx_from_parts(&[
            ("xl/workbook.xml", workbook),
            ("xl/worksheets/sheet1.xml", sheet1),
        ]);

        let text = extract_text(&bytes, FileKind::Xlsx).unwrap();
        assert!(text.contains("--- Sheet: Only ---"));
        assert!(text.contains("lone cell"));
    }
}
