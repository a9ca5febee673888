//! Print sheet for the committed rows: split into pages of the operator's
//! preferred size, rendered as HTML for the print window or written to XLSX.

use crate::db::{clamp_rows_per_page, Preferences};
use crate::error::PrintError;
use crate::grid::CommittedRow;
use crate::row::RowId;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

pub const PRINT_TITLE: &str = "입고묶기 출력";
pub const PRINT_HEADERS: [&str; 5] = ["사고번호", "서열", "관리번호", "피해자(물)", "상태"];
pub const MANAGER_LABEL: &str = "담당자";
pub const BOOK_NUMBER_LABEL: &str = "권번호";

/// Printable table height on an A4 page.
const PAGE_BODY_HEIGHT_MM: f64 = 240.0;
const MIN_CELL_HEIGHT_MM: f64 = 3.0;
/// Pages with fewer rows are laid out as if they had this many.
const BASELINE_ROWS: usize = 30;

const HEADER_FILL: u32 = 0xDBEAFE;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintLine {
    pub row_id: RowId,
    pub accident_id: String,
    pub series_tag: String,
    pub management_id: String,
    pub subject_id: String,
    pub status: String,
}

impl PrintLine {
    fn cells(&self) -> [&str; 5] {
        [
            &self.accident_id,
            &self.series_tag,
            &self.management_id,
            &self.subject_id,
            &self.status,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintPage {
    pub number: usize,
    pub cell_height_mm: f64,
    pub lines: Vec<PrintLine>,
    /// Empty rows appended so a short page still fills the sheet.
    pub blank_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintDocument {
    pub generated_at: String,
    pub manager_name: String,
    pub book_number: String,
    pub pages: Vec<PrintPage>,
}

impl PrintDocument {
    pub fn line_count(&self) -> usize {
        self.pages.iter().map(|p| p.lines.len()).sum()
    }
}

/// Row height that lets a page of `rows` fill the sheet.
pub fn cell_height_mm(rows: usize) -> f64 {
    (PAGE_BODY_HEIGHT_MM / rows.max(BASELINE_ROWS) as f64).max(MIN_CELL_HEIGHT_MM)
}

/// Lays out every row that has a selection, in grid order.
pub fn build_document(
    rows: &[CommittedRow],
    prefs: &Preferences,
    book_number: &str,
) -> Result<PrintDocument, PrintError> {
    let lines: Vec<PrintLine> = rows
        .iter()
        .filter_map(|r| {
            r.selection.as_ref().map(|s| PrintLine {
                row_id: r.row_id,
                accident_id: s.accident_id.clone(),
                series_tag: s.series_tag.clone(),
                management_id: s.management_id.clone(),
                subject_id: s.subject_id().to_string(),
                status: s.status.clone(),
            })
        })
        .collect();
    if lines.is_empty() {
        return Err(PrintError::NothingToPrint);
    }
    let per_page = clamp_rows_per_page(prefs.max_rows_per_page as i64) as usize;
    let pages = lines
        .chunks(per_page)
        .enumerate()
        .map(|(i, chunk)| PrintPage {
            number: i + 1,
            cell_height_mm: cell_height_mm(chunk.len()),
            lines: chunk.to_vec(),
            blank_rows: BASELINE_ROWS.saturating_sub(chunk.len()),
        })
        .collect();
    Ok(PrintDocument {
        generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        manager_name: prefs.manager_name.clone(),
        book_number: book_number.trim().to_string(),
        pages,
    })
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const PRINT_CSS: &str = "\
* { margin: 0; padding: 0; box-sizing: border-box; font-family: 'Malgun Gothic', Arial, sans-serif; }
body { background: white; padding: 20px; color: black; }
.page { position: relative; min-height: 277mm; }
.page + .page { page-break-before: always; }
table { width: 100%; border-collapse: collapse; border: 2px solid black; margin-bottom: 20px; }
th, td { border: 1px solid black; padding: 2px 4px; text-align: center; font-size: 11px; }
th { background-color: #dbeafe; font-weight: bold; font-size: 12px; -webkit-print-color-adjust: exact; print-color-adjust: exact; }
.footer { display: flex; justify-content: center; gap: 120px; font-size: 16px; page-break-inside: avoid; }
.footer .value { margin-left: 10px; border-bottom: 2px solid black; font-weight: bold; font-size: 18px; min-width: 120px; display: inline-block; }
@page { margin: 1cm; size: A4; }
";

/// Standalone HTML for the print window.
pub fn render_html(doc: &PrintDocument) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n",
        escape_html(PRINT_TITLE),
        PRINT_CSS
    );
    let manager = escape_html(&doc.manager_name);
    let book = escape_html(&doc.book_number);
    for page in &doc.pages {
        let _ = write!(html, "<div class=\"page\" data-page=\"{}\">\n<table>\n<thead><tr>", page.number);
        for h in PRINT_HEADERS {
            let _ = write!(html, "<th style=\"height: {:.1}mm\">{}</th>", page.cell_height_mm, escape_html(h));
        }
        html.push_str("</tr></thead>\n<tbody>\n");
        for line in &page.lines {
            html.push_str("<tr>");
            for cell in line.cells() {
                let _ = write!(html, "<td style=\"height: {:.1}mm\">{}</td>", page.cell_height_mm, escape_html(cell));
            }
            html.push_str("</tr>\n");
        }
        for _ in 0..page.blank_rows {
            html.push_str("<tr>");
            for _ in PRINT_HEADERS {
                let _ = write!(html, "<td style=\"height: {:.1}mm\">&nbsp;</td>", page.cell_height_mm);
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</tbody>\n</table>\n");
        let _ = write!(
            html,
            "<div class=\"footer\"><div>{} : <span class=\"value\">{}</span></div><div>{} : <span class=\"value\">{}</span></div></div>\n</div>\n",
            MANAGER_LABEL, manager, BOOK_NUMBER_LABEL, book
        );
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// Drops control characters (except tab/newline) that Excel rejects in cell text.
fn sanitize_cell(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            let u = c as u32;
            c == '\t' || c == '\n' || c == '\r' || !(u < 0x20 || u == 0x7F || u == 0xFFFE || u == 0xFFFF)
        })
        .collect()
}

/// Column width from the longest value, clamped 10–40.
fn column_widths(doc: &PrintDocument) -> [f64; 5] {
    let mut widths = PRINT_HEADERS.map(|h| h.chars().count() as f64 * 2.0);
    for line in doc.pages.iter().flat_map(|p| &p.lines) {
        for (w, cell) in widths.iter_mut().zip(line.cells()) {
            *w = w.max(cell.chars().count() as f64 * 1.2);
        }
    }
    widths.map(|w| w.clamp(10.0, 40.0))
}

fn default_export_path() -> Result<PathBuf, PrintError> {
    let dir = dirs::download_dir()
        .or_else(dirs::desktop_dir)
        .ok_or(PrintError::NoExportDir)?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let mut p = dir.join(format!("입고묶기_{}.xlsx", stamp));
    let mut counter = 2u32;
    while p.exists() {
        p = dir.join(format!("입고묶기_{}_{}.xlsx", stamp, counter));
        counter += 1;
    }
    Ok(p)
}

/// Writes the document to an XLSX file, one printed page per block with a
/// page break after each footer. Returns the saved path.
pub fn export_xlsx(doc: &PrintDocument, path_override: Option<&str>) -> Result<String, PrintError> {
    let path = match path_override.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => {
            let mut pb = PathBuf::from(p);
            if pb.extension().and_then(|e| e.to_str()) != Some("xlsx") {
                pb.set_extension("xlsx");
            }
            pb
        }
        None => default_export_path()?,
    };
    let path_str = path.to_str().ok_or(PrintError::InvalidPath)?.to_string();

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("출력")?;
    worksheet.set_paper_size(9);

    let header_format = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin)
        .set_background_color(Color::RGB(HEADER_FILL));
    let cell_format = Format::new()
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);
    let footer_format = Format::new().set_bold().set_font_size(14);

    for (col, w) in column_widths(doc).iter().enumerate() {
        worksheet.set_column_width(col as u16, *w)?;
    }

    let mut row: u32 = 0;
    let mut breaks = Vec::with_capacity(doc.pages.len());
    for page in &doc.pages {
        // 1mm is about 2.83pt.
        let height_pt = page.cell_height_mm * 2.83;
        for (col, h) in PRINT_HEADERS.iter().enumerate() {
            worksheet.write_string_with_format(row, col as u16, *h, &header_format)?;
        }
        worksheet.set_row_height(row, height_pt)?;
        row += 1;
        for line in &page.lines {
            for (col, cell) in line.cells().iter().enumerate() {
                worksheet.write_string_with_format(row, col as u16, sanitize_cell(cell), &cell_format)?;
            }
            worksheet.set_row_height(row, height_pt)?;
            row += 1;
        }
        for _ in 0..page.blank_rows {
            for col in 0..PRINT_HEADERS.len() {
                worksheet.write_blank(row, col as u16, &cell_format)?;
            }
            worksheet.set_row_height(row, height_pt)?;
            row += 1;
        }
        row += 1;
        worksheet.write_string_with_format(
            row,
            0,
            format!("{} : {}", MANAGER_LABEL, sanitize_cell(&doc.manager_name)),
            &footer_format,
        )?;
        worksheet.write_string_with_format(
            row,
            3,
            format!("{} : {}", BOOK_NUMBER_LABEL, sanitize_cell(&doc.book_number)),
            &footer_format,
        )?;
        row += 1;
        breaks.push(row);
    }
    breaks.pop();
    if !breaks.is_empty() {
        worksheet.set_page_breaks(&breaks)?;
    }

    workbook.save(&path).map_err(|e: XlsxError| {
        tracing::warn!(path = %path_str, error = %e, "print export failed");
        e
    })?;
    info!(path = %path_str, pages = doc.pages.len(), lines = doc.line_count(), "print sheet exported");
    Ok(path_str)
}
