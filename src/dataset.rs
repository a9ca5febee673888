//! Upload readers: CSV with named headers, tab-separated text pasted from a
//! spreadsheet, and workbooks (first sheet). The last two are positional:
//! A=no, B=accident, C=series, D=subject, E=status, F=closure date,
//! G=management id, I=department, J=manager.

use crate::error::DatasetError;
use crate::store::RecordStore;
use crate::types::{Record, RecordFields};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, DataType, Range, Reader, Sheets};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};

/// Header aliases per field, first non-empty value wins.
const ACCIDENT_HEADERS: &[&str] = &["사고번호", "accidentNumber"];
const SERIES_HEADERS: &[&str] = &["서열", "series"];
const SUBJECT_HEADERS: &[&str] = &["피해물", "차량번호", "carNumber"];
const STATUS_HEADERS: &[&str] = &["상태", "status"];
const CLOSURE_HEADERS: &[&str] = &["종결일자", "closureDate"];
const MANAGEMENT_HEADERS: &[&str] = &["관리번호", "managementNumber"];
const DEPARTMENT_HEADERS: &[&str] = &["부서", "department"];
const MANAGER_HEADERS: &[&str] = &["담당자", "manager"];

/// Positional rows shorter than this carry no subject column and are skipped.
const MIN_POSITIONAL_COLUMNS: usize = 4;

/// Label used as the store source for pasted text.
pub const PASTED_SOURCE: &str = "pasted text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Delimited,
    Workbook,
}

impl DatasetFormat {
    pub fn from_file_name(name: &str) -> Result<Self, DatasetError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(DatasetFormat::Csv),
            "txt" | "tsv" => Ok(DatasetFormat::Delimited),
            "xlsx" | "xlsm" | "xls" => Ok(DatasetFormat::Workbook),
            _ => Err(DatasetError::UnsupportedFormat(name.to_string())),
        }
    }
}

/// Read a dataset from disk, choosing the reader by extension.
pub fn load_path(path: &Path) -> Result<RecordStore, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::NotFound);
    }
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let records = match DatasetFormat::from_file_name(&name)? {
        DatasetFormat::Workbook => {
            let mut workbook = open_workbook_auto(path)?;
            let sheet = first_sheet(&mut workbook)?;
            records_from_range(&sheet)
        }
        format => {
            let bytes = std::fs::read(path)?;
            parse_text(format, &decode_text(&bytes))?
        }
    };
    finish(records, name)
}

/// Read a dataset uploaded from the webview as raw bytes.
pub fn load_bytes(file_name: &str, bytes: Vec<u8>) -> Result<RecordStore, DatasetError> {
    let records = match DatasetFormat::from_file_name(file_name)? {
        DatasetFormat::Workbook => parse_workbook_bytes(bytes)?,
        format => parse_text(format, &decode_text(&bytes))?,
    };
    finish(records, file_name.to_string())
}

/// Rows copied out of a spreadsheet and pasted into the upload box.
pub fn load_pasted_text(text: &str) -> Result<RecordStore, DatasetError> {
    finish(parse_delimited(text), PASTED_SOURCE.to_string())
}

fn finish(records: Vec<Record>, source: String) -> Result<RecordStore, DatasetError> {
    if records.is_empty() {
        warn!(%source, "dataset has no records");
        return Err(DatasetError::NoRecords);
    }
    info!(%source, records = records.len(), "dataset loaded");
    Ok(RecordStore::new(records, Some(source)))
}

fn parse_text(format: DatasetFormat, text: &str) -> Result<Vec<Record>, DatasetError> {
    match format {
        DatasetFormat::Csv => parse_csv(text),
        _ => Ok(parse_delimited(text)),
    }
}

/// UTF-8 with or without BOM; invalid sequences are replaced rather than rejected.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// CSV with a header row. Columns are found by name (Korean or English);
/// blank lines are skipped and records are numbered from 1.
pub fn parse_csv(text: &str) -> Result<Vec<Record>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let columns = |aliases: &[&str]| -> Vec<usize> {
        aliases
            .iter()
            .filter_map(|a| headers.iter().position(|h| h == a))
            .collect()
    };
    let accident = columns(ACCIDENT_HEADERS);
    let series = columns(SERIES_HEADERS);
    let subject = columns(SUBJECT_HEADERS);
    let status = columns(STATUS_HEADERS);
    let closure = columns(CLOSURE_HEADERS);
    let management = columns(MANAGEMENT_HEADERS);
    let department = columns(DEPARTMENT_HEADERS);
    let manager = columns(MANAGER_HEADERS);
    if subject.is_empty() {
        debug!(?headers, "no subject column among CSV headers");
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let pick = |cols: &[usize]| -> String {
            cols.iter()
                .filter_map(|&i| row.get(i))
                .find(|v| !v.is_empty())
                .unwrap_or_default()
                .to_string()
        };
        records.push(Record::from(RecordFields {
            sequence_number: records.len() as i64 + 1,
            accident_id: pick(&accident),
            series_tag: pick(&series),
            subject_id: pick(&subject),
            status: pick(&status),
            closure_date: pick(&closure),
            management_id: pick(&management),
            department: pick(&department),
            manager_name: pick(&manager),
        }));
    }
    Ok(records)
}

/// Tab-separated rows with a header line, columns by position.
pub fn parse_delimited(text: &str) -> Vec<Record> {
    let rows = text
        .trim()
        .lines()
        .skip(1)
        .map(|line| line.split('\t').map(str::to_string).collect::<Vec<_>>());
    records_from_rows(rows)
}

pub fn parse_workbook_bytes(bytes: Vec<u8>) -> Result<Vec<Record>, DatasetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheet = first_sheet(&mut workbook)?;
    Ok(records_from_range(&sheet))
}

fn first_sheet<RS>(workbook: &mut Sheets<RS>) -> Result<Range<Data>, DatasetError>
where
    RS: Read + Seek,
{
    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(DatasetError::NoSheets)?;
    Ok(workbook.worksheet_range(&name)?)
}

/// Date cells come back as `YYYY-MM-DD` (with the time when it is not midnight).
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) if dt.time() == chrono::NaiveTime::MIN => dt.format("%Y-%m-%d").to_string(),
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => cell.to_string(),
        },
        _ => cell.as_string().unwrap_or_default(),
    }
}

fn records_from_range(range: &Range<Data>) -> Vec<Record> {
    let rows = range.rows().skip(1).map(|row| {
        let mut cells: Vec<String> = row
            .iter()
            .map(cell_text)
            .collect();
        // Trailing blanks do not count towards the row length.
        while cells.last().is_some_and(|c| c.trim().is_empty()) {
            cells.pop();
        }
        cells
    });
    records_from_rows(rows)
}

fn records_from_rows<I>(rows: I) -> Vec<Record>
where
    I: Iterator<Item = Vec<String>>,
{
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (i, values) in rows.enumerate() {
        if values.len() < MIN_POSITIONAL_COLUMNS {
            skipped += 1;
            continue;
        }
        let col = |idx: usize| {
            values
                .get(idx)
                .map(|v| v.trim_end_matches('\r').to_string())
                .unwrap_or_default()
        };
        let row_number = i as i64 + 1;
        records.push(Record::from(RecordFields {
            sequence_number: parse_leading_int(&col(0)).unwrap_or(row_number),
            accident_id: col(1),
            series_tag: col(2),
            subject_id: col(3),
            status: col(4),
            closure_date: col(5),
            management_id: col(6),
            department: col(8),
            manager_name: col(9),
        }));
    }
    if skipped > 0 {
        debug!(skipped, "skipped rows with fewer than {} columns", MIN_POSITIONAL_COLUMNS);
    }
    records
}

/// Leading integer of `s`, like "12번" -> 12. Zero counts as missing so the
/// caller falls back to the row number.
fn parse_leading_int(s: &str) -> Option<i64> {
    let t = s.trim();
    let (sign, digits) = match t.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, t.strip_prefix('+').unwrap_or(t)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end]
        .parse::<i64>()
        .ok()
        .map(|n| sign * n)
        .filter(|n| *n != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    #[test]
    fn csv_maps_korean_headers() {
        let text = "사고번호,서열,피해물,상태,종결일자,관리번호,부서,담당자\n\
                    2024-00123,1,서울12가9030,종결,2024-05-01,M-1,보상1팀,홍길동\n\
                    \n\
                    2024-00124,2,자전거,진행,,M-2,보상2팀,김철수\n";
        let records = parse_csv(text).unwrap();
        assert_eq!(records.len(), 2);
        let r = &records[0];
        assert_eq!(r.sequence_number, 1);
        assert_eq!(r.accident_id, "2024-00123");
        assert_eq!(r.subject_id(), "서울12가9030");
        assert_eq!(r.subject_id_last_four(), "9030");
        assert_eq!(r.management_id, "M-1");
        assert_eq!(r.manager_name, "홍길동");
        assert_eq!(records[1].sequence_number, 2);
    }

    #[test]
    fn csv_falls_back_through_aliases() {
        let text = "accidentNumber,피해물,차량번호,manager\nA1,,12-3456,Lee\nA2,bike,99-0000,Kim\n";
        let records = parse_csv(text).unwrap();
        assert_eq!(records[0].subject_id(), "12-3456");
        assert_eq!(records[1].subject_id(), "bike");
        assert_eq!(records[0].manager_name, "Lee");
        assert_eq!(records[0].status, "");
    }

    #[test]
    fn csv_tolerates_short_rows() {
        let text = "사고번호,피해물,담당자\nA1,12-3456\n";
        let records = parse_csv(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].manager_name, "");
    }

    #[test]
    fn delimited_uses_positions_and_skips_short_rows() {
        let text = "no\tacc\tser\tsub\tstat\tclose\tmgmt\tx\tdept\tmgr\r\n\
                    7\t2024-1\tS\t12-3456\t종결\t2024-01-01\tM1\t\t보상\t홍길동\r\n\
                    short\trow\r\n\
                    \t2024-2\tS\t98-3456\n";
        let records = parse_delimited(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence_number, 7);
        assert_eq!(records[0].department, "보상");
        assert_eq!(records[0].manager_name, "홍길동");
        assert_eq!(records[1].sequence_number, 3);
        assert_eq!(records[1].subject_id(), "98-3456");
        assert_eq!(records[1].manager_name, "");
    }

    #[test]
    fn leading_int_parsing() {
        assert_eq!(parse_leading_int(" 12번"), Some(12));
        assert_eq!(parse_leading_int("-3"), Some(-3));
        assert_eq!(parse_leading_int("0"), None);
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_leading_int(""), None);
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(DatasetFormat::from_file_name("a.CSV").unwrap(), DatasetFormat::Csv);
        assert_eq!(DatasetFormat::from_file_name("a.txt").unwrap(), DatasetFormat::Delimited);
        assert_eq!(DatasetFormat::from_file_name("a.xlsx").unwrap(), DatasetFormat::Workbook);
        assert!(matches!(
            DatasetFormat::from_file_name("a.pdf"),
            Err(DatasetError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn empty_upload_is_an_error() {
        assert!(matches!(load_pasted_text("header only"), Err(DatasetError::NoRecords)));
        assert!(matches!(
            load_bytes("x.csv", "사고번호,피해물\n".as_bytes().to_vec()),
            Err(DatasetError::NoRecords)
        ));
    }

    #[test]
    fn csv_upload_strips_bom() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice("사고번호,피해물\nA1,12-3456\n".as_bytes());
        let store = load_bytes("x.csv", bytes).unwrap();
        assert_eq!(store.records()[0].accident_id, "A1");
        assert_eq!(store.source(), Some("x.csv"));
    }

    #[test]
    fn workbook_first_sheet_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let header = ["no", "사고번호", "서열", "피해물", "상태", "종결일자", "관리번호", "", "부서", "담당자"];
        for (c, h) in header.iter().enumerate() {
            sheet.write_string(0, c as u16, *h).unwrap();
        }
        sheet.write_number(1, 0, 1.0).unwrap();
        sheet.write_string(1, 1, "2024-00123").unwrap();
        sheet.write_string(1, 3, "12-3456").unwrap();
        sheet.write_string(1, 9, "홍길동").unwrap();
        sheet.write_string(2, 0, "2").unwrap();
        sheet.write_string(2, 1, "2024-00124").unwrap();
        workbook.save(&path).unwrap();

        let store = load_path(&path).unwrap();
        assert_eq!(store.len(), 1);
        let r = &store.records()[0];
        assert_eq!(r.sequence_number, 1);
        assert_eq!(r.subject_id(), "12-3456");
        assert_eq!(r.manager_name, "홍길동");

        let bytes = std::fs::read(&path).unwrap();
        let from_bytes = load_bytes("data.xlsx", bytes).unwrap();
        assert_eq!(from_bytes.records(), store.records());
    }

    #[test]
    fn workbook_closure_dates_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dates.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "no").unwrap();
        sheet.write_number(1, 0, 1.0).unwrap();
        sheet.write_string(1, 1, "2024-00123").unwrap();
        sheet.write_string(1, 3, "12-3456").unwrap();
        let date = ExcelDateTime::from_ymd(2024, 3, 15).unwrap();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        sheet.write_datetime_with_format(1, 5, &date, &date_format).unwrap();
        workbook.save(&path).unwrap();

        let store = load_path(&path).unwrap();
        assert_eq!(store.records()[0].closure_date, "2024-03-15");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_path(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, DatasetError::NotFound));
    }
}
