// OOXML extraction (docx, xlsx) via the zip container and streaming XML parsing


use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::Event;

use super::DocumentChunk;
use crate::{DocQaError, Result};

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb protection)
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum sheets processed per workbook
const MAX_SHEETS: usize = 100;
/// Maximum cells processed per sheet
const MAX_CELLS_PER_SHEET: usize = 100_000;

type ZipFile = zip::ZipArchive<Cursor<Vec<u8>>>;

/// Extract a Word document as a single chunk. Text runs (`w:t`) are
/// concatenated with paragraph boundaries preserved as newlines.
#[inline]
pub fn load_docx(path: &Path) -> Result<Vec<DocumentChunk>> {
    let mut archive = open_archive(path)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;

    // No text trimming here: spacing inside text runs is significant
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());

    let mut out = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(Event::Text(text)) if in_text_run => {
                out.push_str(text.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocQaError::Load(format!("Invalid document XML: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    let source = path.to_string_lossy().into_owned();
    Ok(vec![DocumentChunk::new(out, source)])
}

/// Extract a spreadsheet as one chunk per non-empty sheet, rendered as a
/// pipe-delimited table with a header separator row. All-empty rows and
/// columns are dropped before rendering.
#[inline]
pub fn load_xlsx(path: &Path) -> Result<Vec<DocumentChunk>> {
    let mut archive = open_archive(path)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_names = read_sheet_names(&mut archive)?;
    let sheet_files = list_worksheet_files(&archive);

    let source = path.to_string_lossy().into_owned();
    let mut chunks = Vec::new();

    for (index, entry_name) in sheet_files.into_iter().take(MAX_SHEETS).enumerate() {
        let sheet_name = sheet_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Sheet{}", index + 1));

        let xml = read_entry(&mut archive, &entry_name)?;
        let grid = parse_sheet_grid(&xml, &shared_strings)?;

        if let Some(table) = render_table(&grid) {
            let mut chunk = DocumentChunk::new(
                format!("### Sheet: {}\n\n{}", sheet_name, table),
                source.clone(),
            );
            chunk.metadata.sheet = Some(sheet_name);
            chunks.push(chunk);
        }
    }

    Ok(chunks)
}

fn open_archive(path: &Path) -> Result<ZipFile> {
    let bytes = std::fs::read(path)
        .map_err(|e| DocQaError::Load(format!("Failed to read {}: {}", path.display(), e)))?;
    zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DocQaError::Load(format!("Invalid OOXML container: {}", e)))
}

fn read_entry(archive: &mut ZipFile, name: &str) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .map_err(|e| DocQaError::Load(format!("Missing archive entry {}: {}", name, e)))?;

    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| DocQaError::Load(format!("Failed to read archive entry {}: {}", name, e)))?;

    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(DocQaError::Load(format!(
            "Archive entry {} exceeds size limit",
            name
        )));
    }

    Ok(out)
}

/// Shared string table; each `si` element may hold several text runs which
/// belong to one logical string.
fn read_shared_strings(archive: &mut ZipFile) -> Result<Vec<String>> {
    // Workbooks without string cells have no sharedStrings part at all
    if archive.by_name("xl/sharedStrings.xml").is_err() {
        return Ok(Vec::new());
    }
    let xml = read_entry(archive, "xl/sharedStrings.xml")?;

    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_item = false;
    let mut in_text = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"t" if in_item => in_text = true,
                _ => {}
            },
            Ok(Event::Text(text)) if in_text => {
                current.push_str(text.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => {
                    in_item = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DocQaError::Load(format!(
                    "Invalid shared strings XML: {}",
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Sheet display names from the workbook manifest, in declaration order
fn read_sheet_names(archive: &mut ZipFile) -> Result<Vec<String>> {
    if archive.by_name("xl/workbook.xml").is_err() {
        return Ok(Vec::new());
    }
    let xml = read_entry(archive, "xl/workbook.xml")?;

    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);

    let mut names = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"name" {
                            names.push(
                                attr.unescape_value().unwrap_or_default().into_owned(),
                            );
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocQaError::Load(format!("Invalid workbook XML: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(names)
}

fn list_worksheet_files(archive: &ZipFile) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

#[derive(Clone, Copy, PartialEq)]
enum CellType {
    Shared,
    Inline,
    Raw,
}

/// Parse a worksheet into a dense row/column grid of cell texts
fn parse_sheet_grid(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<(usize, String)> = Vec::new();
    let mut next_col = 0usize;
    let mut cell_col = 0usize;
    let mut cell_type = CellType::Raw;
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut pending: Option<String> = None;
    let mut cell_count = 0usize;
    let mut buf = Vec::new();

    loop {
        if cell_count >= MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    current.clear();
                    next_col = 0;
                }
                b"c" => {
                    let (col, ty) = parse_cell_attributes(&e, next_col);
                    cell_col = col;
                    cell_type = ty;
                    pending = None;
                }
                b"v" => in_value = true,
                b"t" if cell_type == CellType::Inline => in_inline_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"c" {
                    let (col, _) = parse_cell_attributes(&e, next_col);
                    next_col = col + 1;
                }
            }
            Ok(Event::Text(text)) => {
                let value = text.unescape().unwrap_or_default();
                let value = value.trim();
                if in_value {
                    pending = Some(match cell_type {
                        CellType::Shared => value
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i).cloned())
                            .unwrap_or_default(),
                        CellType::Inline | CellType::Raw => value.to_string(),
                    });
                } else if in_inline_text {
                    pending = Some(value.to_string());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"c" => {
                    if let Some(value) = pending.take() {
                        if !value.is_empty() {
                            current.push((cell_col, value));
                            cell_count += 1;
                        }
                    }
                    next_col = cell_col + 1;
                    cell_type = CellType::Raw;
                }
                b"row" => {
                    rows.push(materialize_row(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocQaError::Load(format!("Invalid worksheet XML: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

fn parse_cell_attributes(
    element: &quick_xml::events::BytesStart<'_>,
    default_col: usize,
) -> (usize, CellType) {
    let mut col = default_col;
    let mut cell_type = CellType::Raw;

    for attr in element.attributes().flatten() {
        match attr.key.as_ref() {
            b"r" => {
                if let Some(parsed) = column_index(attr.value.as_ref()) {
                    col = parsed;
                }
            }
            b"t" => {
                cell_type = match attr.value.as_ref() {
                    b"s" => CellType::Shared,
                    b"inlineStr" => CellType::Inline,
                    _ => CellType::Raw,
                };
            }
            _ => {}
        }
    }

    (col, cell_type)
}

/// Column index from a cell reference like `BC12` (A = 0)
fn column_index(cell_ref: &[u8]) -> Option<usize> {
    let mut col = 0usize;
    let mut seen = false;
    for &byte in cell_ref {
        let letter = byte.to_ascii_uppercase();
        if letter.is_ascii_uppercase() {
            col = col * 26 + (letter - b'A' + 1) as usize;
            seen = true;
        } else {
            break;
        }
    }
    if seen { Some(col - 1) } else { None }
}

fn materialize_row(cells: &mut Vec<(usize, String)>) -> Vec<String> {
    let width = cells.iter().map(|(col, _)| col + 1).max().unwrap_or(0);
    let mut row = vec![String::new(); width];
    for (col, value) in cells.drain(..) {
        if col < row.len() {
            row[col] = value;
        }
    }
    row
}

/// Render the grid as a pipe-delimited table; returns None when nothing
/// remains after dropping all-empty rows and columns.
fn render_table(grid: &[Vec<String>]) -> Option<String> {
    let rows: Vec<&Vec<String>> = grid
        .iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .collect();
    if rows.is_empty() {
        return None;
    }

    let width = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    let keep: Vec<usize> = (0..width)
        .filter(|&col| {
            rows.iter()
                .any(|row| row.get(col).is_some_and(|cell| !cell.trim().is_empty()))
        })
        .collect();
    if keep.is_empty() {
        return None;
    }

    let project = |row: &Vec<String>| -> Vec<String> {
        keep.iter()
            .map(|&col| row.get(col).cloned().unwrap_or_default())
            .collect()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(project(rows[0]).join(" | "));
    lines.push(vec!["---"; keep.len()].join("|"));
    for row in rows.iter().skip(1) {
        lines.push(project(row).join(" | "));
    }

    Some(lines.join("\n"))
}
