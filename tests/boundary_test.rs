//! Boundary Tests for scoresheet
//!
//! Degenerate inputs: too few rows, empty sheets, broken quoting, missing sheets,
//! oversized input, and headers with no recognizable data row.

use chrono::NaiveDate;
use rust_xlsxwriter::*;
use std::io::Cursor;
use scoresheet::{
    HeaderStack, InputFormat, IngestBuilder, MemoryStore, RecordStore, RowMatrix, ScoreSheetError,
    SectionSpec, SectionTable, SheetSelector, Subtype,
};

// Helper module for generating boundary test fixtures
mod fixtures {
    use super::*;

    /// Generate a workbook with one empty sheet
    pub fn generate_empty_sheet() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("EmptySheet")?;
        Ok(workbook.save_to_buffer()?)
    }

    /// Generate a sheet whose used range starts at C3
    pub fn generate_offset_sheet() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(2, 4, "総合得点")?;
        worksheet.write_string(3, 0, "1001")?;
        worksheet.write_number(3, 4, 88.0)?;
        Ok(workbook.save_to_buffer()?)
    }
}

fn importer() -> scoresheet::Importer {
    IngestBuilder::new()
        .with_section_table(SectionTable::new(vec![SectionSpec::new(
            "score",
            Subtype::Current,
            "E",
            "F",
        )]))
        .with_reference_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        .build()
        .unwrap()
}

#[test]
fn test_single_row_is_malformed() {
    let matrix = RowMatrix::from_rows(vec![vec!["ID", "氏名"]]);
    assert!(matches!(
        HeaderStack::resolve(&matrix),
        Err(ScoreSheetError::MalformedInput { .. })
    ));

    let mut store = MemoryStore::new();
    let result = importer().import_matrix(&matrix, &mut store);
    assert!(matches!(result, Err(ScoreSheetError::MalformedInput { .. })));
    assert_eq!(store.customer_count(), 0);
}

#[test]
fn test_empty_sheet_is_malformed() {
    let data = fixtures::generate_empty_sheet().unwrap();
    let mut store = MemoryStore::new();
    let result = importer().import(Cursor::new(data), &mut store);
    assert!(matches!(result, Err(ScoreSheetError::MalformedInput { .. })));
}

#[test]
fn test_used_range_offset_keeps_column_positions() {
    let data = fixtures::generate_offset_sheet().unwrap();
    let mut store = MemoryStore::new();
    let summary = importer().import(Cursor::new(data), &mut store).unwrap();

    assert_eq!(summary.rows_processed, 1);
    let assessment = &store.assessments("1001").unwrap()[0];
    assert_eq!(assessment.score, Some(88.0));
}

#[test]
fn test_nonexistent_sheet() {
    let data = fixtures::generate_empty_sheet().unwrap();
    let importer = IngestBuilder::new()
        .with_sheet_selector(SheetSelector::Name("評価一覧".to_string()))
        .build()
        .unwrap();
    let mut store = MemoryStore::new();
    match importer.import(Cursor::new(data), &mut store) {
        Err(ScoreSheetError::Config(msg)) => assert!(msg.contains("not found")),
        other => panic!("Expected Config error, got {:?}", other),
    }
}

#[test]
fn test_sheet_index_out_of_range() {
    let data = fixtures::generate_empty_sheet().unwrap();
    let importer = IngestBuilder::new()
        .with_sheet_selector(SheetSelector::Index(3))
        .build()
        .unwrap();
    let mut store = MemoryStore::new();
    match importer.import(Cursor::new(data), &mut store) {
        Err(ScoreSheetError::Config(msg)) => assert!(msg.contains("out of range")),
        other => panic!("Expected Config error, got {:?}", other),
    }
}

#[test]
fn test_unterminated_quote_reports_line() {
    let csv = "ID,氏名,発行者,状態,総合得点\n1001,山田,本部,在籍,85\n1002,\"佐藤,本部,在籍,70\n";
    let mut store = MemoryStore::new();
    match importer().import(Cursor::new(csv.as_bytes().to_vec()), &mut store) {
        Err(ScoreSheetError::MalformedInput { row, .. }) => assert_eq!(row, 3),
        other => panic!("Expected MalformedInput, got {:?}", other),
    }
    assert_eq!(store.customer_count(), 0);
}

#[test]
fn test_garbage_workbook_is_parse_error() {
    let importer = IngestBuilder::new()
        .with_input_format(InputFormat::Workbook)
        .build()
        .unwrap();
    let mut store = MemoryStore::new();
    let result = importer.import(Cursor::new(b"PK\x03\x04broken".to_vec()), &mut store);
    assert!(matches!(result, Err(ScoreSheetError::Parse(_))));
}

#[test]
fn test_input_over_limit() {
    let importer = IngestBuilder::new().with_max_input_size(16).build().unwrap();
    let mut store = MemoryStore::new();
    let csv = "ID,氏名\n1001,山田\n1002,佐藤\n";
    let result = importer.import(Cursor::new(csv.as_bytes().to_vec()), &mut store);
    assert!(matches!(
        result,
        Err(ScoreSheetError::MalformedInput { row: 0, .. })
    ));
}

#[test]
fn test_no_data_row_uses_header_fallback() {
    // 先頭列に3桁以上の数字がないため、フォールバック段数（行数-1で打ち切り）を使う
    let matrix = RowMatrix::from_rows(vec![
        vec!["", "今回", ""],
        vec!["ID", "総合得点", "総合評価"],
        vec!["A-1", "85", "AA"],
    ]);
    let stack = HeaderStack::resolve(&matrix).unwrap();
    assert_eq!(stack.depth(), 2);

    let importer = IngestBuilder::new().with_header_fallback(1).build().unwrap();
    let (rows, _) = importer.build_documents(&matrix).unwrap();
    // 1段目のみがヘッダーになり、ラベル行もデータ行として扱われる
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].customer.customer_key, "ID");
}

#[test]
fn test_rows_without_customer_key_are_skipped() {
    let matrix = RowMatrix::from_rows(vec![
        vec!["ID", "氏名", "発行者", "状態", "総合得点"],
        vec!["1001", "山田", "本部", "在籍", "85"],
        vec!["", "メモ", "", "", "99"],
        vec!["　", "", "", "", ""],
    ]);
    let mut store = MemoryStore::new();
    let summary = importer().import_matrix(&matrix, &mut store).unwrap();
    assert_eq!(summary.rows_processed, 1);
    assert_eq!(summary.rows_skipped, 2);
    assert_eq!(store.customer_count(), 1);
}

#[test]
fn test_short_rows_read_as_empty() {
    let matrix = RowMatrix::from_rows(vec![
        vec!["ID", "氏名", "発行者", "状態", "総合得点", "総合評価"],
        vec!["1001", "山田"],
    ]);
    let mut store = MemoryStore::new();
    let summary = importer().import_matrix(&matrix, &mut store).unwrap();
    assert_eq!(summary.rows_processed, 1);
    assert_eq!(summary.documents_written, 0);
    assert_eq!(store.assessments("1001").unwrap()[0].score, None);
}

#[test]
fn test_empty_csv_is_malformed() {
    let mut store = MemoryStore::new();
    let result = importer().import(Cursor::new(Vec::new()), &mut store);
    assert!(matches!(result, Err(ScoreSheetError::MalformedInput { .. })));
}
