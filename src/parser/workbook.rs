//! Workbook Reader
//!
//! calamineを使用してxlsx / xls / odsのシートを`RowMatrix`に読み込む。

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use chrono::{Days, NaiveDate};
use tracing::trace;

use crate::api::SheetSelector;
use crate::error::ScoreSheetError;
use crate::types::{format_number, RowMatrix};

/// ワークブックリーダー
///
/// calamineのラッパーとして、シートの選択と行列への変換を提供します。
pub(crate) struct WorkbookReader {
    workbook: Sheets<Cursor<Vec<u8>>>,
}

impl WorkbookReader {
    /// ワークブックを開く
    ///
    /// # 引数
    ///
    /// * `bytes` - ファイル全体のバイト列（サイズ検査済み）
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookReader)` - ワークブックの読み込みに成功した場合
    /// * `Err(ScoreSheetError::Parse)` - 形式を判別できない、または壊れている場合
    pub fn open(bytes: Vec<u8>) -> Result<Self, ScoreSheetError> {
        let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        Ok(Self { workbook })
    }

    /// すべてのシート名を取得
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    /// シート選択方式に基づいてシート名を決定する
    ///
    /// # 戻り値
    ///
    /// * `Ok(String)` - 選択されたシート名
    /// * `Err(ScoreSheetError::Config)` - シートが見つからない、またはインデックスが範囲外の場合
    pub fn select_sheet(&self, selector: &SheetSelector) -> Result<String, ScoreSheetError> {
        let all_sheet_names = self.sheet_names();

        match selector {
            SheetSelector::Index(index) => {
                all_sheet_names.get(*index).cloned().ok_or_else(|| {
                    ScoreSheetError::Config(format!(
                        "Sheet index {} is out of range (total: {})",
                        index,
                        all_sheet_names.len()
                    ))
                })
            }
            SheetSelector::Name(name) => {
                if !all_sheet_names.contains(name) {
                    return Err(ScoreSheetError::Config(format!("Sheet '{}' not found", name)));
                }
                Ok(name.clone())
            }
        }
    }

    /// シートを読み込む
    ///
    /// 使用範囲がA1から始まらない場合も、列・行の位置がずれないよう先頭を空セルで埋めます。
    pub fn read_sheet(&mut self, sheet_name: &str) -> Result<RowMatrix, ScoreSheetError> {
        let range = self.workbook.worksheet_range(sheet_name)?;
        trace!(sheet = sheet_name, size = ?range.get_size(), "read worksheet");
        Ok(range_to_matrix(&range))
    }
}

/// calamineの範囲を行列に変換する（絶対位置を保つ）
fn range_to_matrix(range: &Range<Data>) -> RowMatrix {
    let Some((start_row, start_col)) = range.start() else {
        return RowMatrix::default();
    };

    let mut rows: Vec<Vec<String>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![String::new(); start_col as usize];
        cells.extend(row.iter().map(cell_text));
        rows.push(cells);
    }
    RowMatrix::new(rows)
}

/// セルの値を文字列にする
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::String(s) => s.clone(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::DateTime(dt) => serial_text(dt.as_f64(), dt.is_duration()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        _ => String::new(),
    }
}

/// Excelのシリアル値を文字列にする
///
/// 日付は`YYYY-MM-DD`、1日未満の値と経過時間は`M:SS`（分は時間を含む通算）。
fn serial_text(serial: f64, is_duration: bool) -> String {
    if is_duration || (0.0..1.0).contains(&serial) {
        let total_seconds = (serial * 86_400.0).round() as u64;
        return format!("{}:{:02}", total_seconds / 60, total_seconds % 60);
    }

    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.checked_add_days(Days::new(serial.floor() as u64)))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| format_number(serial))
}


// ワークブック全体の読み込みは統合テスト（tests/）で、rust_xlsxwriterで生成したファイルを使って検証します。
