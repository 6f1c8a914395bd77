//! Header Stack Resolver Module
//!
//! 複数行にまたがる見出し（ヘッダースタック）を解析し、
//! 列ごとの「最下段の見出し」と「連結見出し」を求めるモジュール。
//!
//! ヘッダーの段数は、先頭セルが3桁以上の数字（顧客ID）である最初の行から求めます。
//! 見つからない場合は固定の段数（既定14段）を使用します。

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScoreSheetError;
use crate::normalize::to_half_width;
use crate::types::RowMatrix;

/// データ行を判定できない場合に使用する既定のヘッダー段数
pub const DEFAULT_HEADER_DEPTH: usize = 14;

/// 連結見出しの区切り文字
pub const COMBINED_SEPARATOR: &str = "/";

static DATA_ROW_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{3,}$").expect("data row id pattern is valid"));

/// 見出しのない列に割り当てるプレースホルダーキー（1始まりの列番号）
pub fn placeholder_key(col: usize) -> String {
    format!("col_{}", col + 1)
}

/// プレースホルダーキー（`col_<n>`）かどうか
pub fn is_placeholder_key(key: &str) -> bool {
    key.strip_prefix("col_")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// データ行の先頭セル（顧客ID）かどうか
fn is_data_row_id(cell: &str) -> bool {
    DATA_ROW_ID_RE.is_match(to_half_width(cell).trim())
}

/// ヘッダー段数を求める
///
/// 先頭セルが`^\d{3,}$`に一致する最初の行の位置を返します。
/// 見つからない場合や、最初に一致したのが先頭行（位置0）の場合は
/// `min(fallback, 行数 - 1)`を返します。
///
/// # エラー
///
/// 行数が2未満の場合は`MalformedInput`を返します。
pub fn detect_header_depth(matrix: &RowMatrix, fallback: usize) -> Result<usize, ScoreSheetError> {
    let row_count = matrix.row_count();
    if row_count < 2 {
        return Err(ScoreSheetError::MalformedInput {
            row: row_count,
            message: "at least one header row and one data row are required".to_string(),
        });
    }

    let detected = (0..row_count).find(|&row| is_data_row_id(matrix.cell(row, 0)));
    Ok(match detected {
        Some(depth) if depth > 0 => depth,
        _ => fallback.clamp(1, row_count - 1),
    })
}

/// 解析済みのヘッダースタック
///
/// 一度だけ計算し、以降は変更しません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderStack {
    /// ヘッダー行（セルはトリム済み、列数は行列の列数に揃える）
    rows: Vec<Vec<String>>,
    lowest: Vec<String>,
    combined: Vec<String>,
}

impl HeaderStack {
    /// 既定のフォールバック段数でヘッダースタックを解析
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use scoresheet::{HeaderStack, RowMatrix};
    ///
    /// let matrix = RowMatrix::from_rows(vec![
    ///     vec!["", "今回", ""],
    ///     vec!["ID", "得点", "評価"],
    ///     vec!["1001", "85", "AA"],
    /// ]);
    /// let stack = HeaderStack::resolve(&matrix).unwrap();
    /// assert_eq!(stack.depth(), 2);
    /// assert_eq!(stack.lowest_at(1), "得点");
    /// assert_eq!(stack.combined_at(1), "今回/得点");
    /// ```
    pub fn resolve(matrix: &RowMatrix) -> Result<Self, ScoreSheetError> {
        Self::resolve_with_fallback(matrix, DEFAULT_HEADER_DEPTH)
    }

    /// フォールバック段数を指定してヘッダースタックを解析
    pub fn resolve_with_fallback(
        matrix: &RowMatrix,
        fallback: usize,
    ) -> Result<Self, ScoreSheetError> {
        let depth = detect_header_depth(matrix, fallback)?;
        let column_count = matrix.column_count();

        let rows: Vec<Vec<String>> = (0..depth)
            .map(|r| {
                (0..column_count)
                    .map(|c| matrix.cell(r, c).trim().to_string())
                    .collect()
            })
            .collect();

        let lowest = (0..column_count)
            .map(|c| {
                rows.iter()
                    .rev()
                    .map(|row| row[c].as_str())
                    .find(|cell| !cell.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| placeholder_key(c))
            })
            .collect();

        let combined = (0..column_count)
            .map(|c| {
                rows.iter()
                    .map(|row| row[c].as_str())
                    .filter(|cell| !cell.is_empty())
                    .collect::<Vec<_>>()
                    .join(COMBINED_SEPARATOR)
            })
            .collect();

        Ok(Self {
            rows,
            lowest,
            combined,
        })
    }

    /// ヘッダー段数（最初のデータ行のインデックス）
    pub fn depth(&self) -> usize {
        self.rows.len()
    }

    /// 列数
    pub fn column_count(&self) -> usize {
        self.lowest.len()
    }

    /// ヘッダー行（トリム済み）
    pub fn header_rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// 列の最下段の見出し（空でない最も下のセル、なければ`col_<c+1>`）
    pub fn lowest_at(&self, col: usize) -> Cow<'_, str> {
        match self.lowest.get(col) {
            Some(label) => Cow::Borrowed(label.as_str()),
            None => Cow::Owned(placeholder_key(col)),
        }
    }

    /// 列の連結見出し（空でないセルを上から`/`で連結）
    pub fn combined_at(&self, col: usize) -> &str {
        self.combined.get(col).map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_matrix() -> RowMatrix {
        RowMatrix::from_rows(vec![
            vec!["顧客", "今回", "", "前回", ""],
            vec!["", "カット", "", "カット", "カラー"],
            vec!["ID", "得点", "評価", "得点", ""],
            vec!["1001", "85", "AA", "80", "A"],
            vec!["1002", "70", "A", "", ""],
        ])
    }

    #[test]
    fn test_detect_depth_from_id_row() {
        assert_eq!(detect_header_depth(&sample_matrix(), 14).unwrap(), 3);
    }

    #[test]
    fn test_detect_depth_full_width_id() {
        let matrix = RowMatrix::from_rows(vec![vec!["ID"], vec!["１２３４"]]);
        assert_eq!(detect_header_depth(&matrix, 14).unwrap(), 1);
    }

    #[test]
    fn test_detect_depth_fallback() {
        let matrix = RowMatrix::from_rows(vec![vec!["a"], vec!["b"], vec!["c"]]);
        assert_eq!(detect_header_depth(&matrix, 14).unwrap(), 2);
        assert_eq!(detect_header_depth(&matrix, 1).unwrap(), 1);
    }

    #[test]
    fn test_two_digit_id_is_not_a_data_row() {
        let matrix = RowMatrix::from_rows(vec![vec!["ID"], vec!["12"], vec!["1001"]]);
        assert_eq!(detect_header_depth(&matrix, 14).unwrap(), 2);
    }

    #[test]
    fn test_id_in_first_row_uses_fallback() {
        let matrix = RowMatrix::from_rows(vec![
            vec!["1000"],
            vec!["h"],
            vec!["1001"],
            vec!["x"],
            vec!["y"],
        ]);
        assert_eq!(detect_header_depth(&matrix, 14).unwrap(), 4);
        assert_eq!(detect_header_depth(&matrix, 2).unwrap(), 2);
    }

    #[test]
    fn test_too_few_rows() {
        let matrix = RowMatrix::from_rows(vec![vec!["ID"]]);
        match detect_header_depth(&matrix, 14) {
            Err(ScoreSheetError::MalformedInput { row, .. }) => assert_eq!(row, 1),
            other => panic!("expected MalformedInput, got {:?}", other),
        }
        assert!(HeaderStack::resolve(&RowMatrix::default()).is_err());
    }

    #[test]
    fn test_lowest_and_combined() {
        let stack = HeaderStack::resolve(&sample_matrix()).unwrap();
        assert_eq!(stack.depth(), 3);
        assert_eq!(stack.column_count(), 5);
        assert_eq!(stack.lowest_at(0), "ID");
        assert_eq!(stack.lowest_at(1), "得点");
        assert_eq!(stack.lowest_at(4), "カラー");
        assert_eq!(stack.combined_at(0), "顧客/ID");
        assert_eq!(stack.combined_at(1), "今回/カット/得点");
        assert_eq!(stack.combined_at(2), "評価");
        assert_eq!(stack.combined_at(4), "カラー");
    }

    #[test]
    fn test_placeholder_for_headerless_column() {
        let matrix = RowMatrix::from_rows(vec![vec!["時間", "", " "], vec!["1001", "5", "30"]]);
        let stack = HeaderStack::resolve(&matrix).unwrap();
        assert_eq!(stack.lowest_at(1), "col_2");
        assert_eq!(stack.lowest_at(2), "col_3");
        assert_eq!(stack.lowest_at(10), "col_11");
        assert_eq!(stack.combined_at(1), "");
    }

    #[test]
    fn test_placeholder_key_detection() {
        assert!(is_placeholder_key("col_1"));
        assert!(is_placeholder_key(&placeholder_key(41)));
        assert!(!is_placeholder_key("col_"));
        assert!(!is_placeholder_key("col_x"));
        assert!(!is_placeholder_key("時間"));
    }
}
