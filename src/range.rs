//! Range Extractor Module
//!
//! 名前付き列範囲と1行分のデータから、Smart-Set規則でフィールドマップを構築するモジュール。

use tracing::trace;

use crate::column::letter_to_index;
use crate::error::ScoreSheetError;
use crate::field_map::FieldMap;
use crate::header::HeaderStack;
use crate::merge::SmartSet;
use crate::normalize::normalize;
use crate::types::ColumnSpan;

/// 列ラベルで指定された範囲（両端を含む）を抽出する
///
/// 各列について`field_key = lowest_at(c)`、`value = normalize(row[c])`を
/// Smart-Set規則で書き込みます。行の末尾を超える列は空として扱います。
///
/// # 引数
///
/// * `stack` - 解析済みのヘッダースタック
/// * `row` - データ行のセル
/// * `start_label` / `end_label` - 列ラベル（"E", "X"など）
/// * `include_empty` - 空の値も書き込むかどうか（比較セクション用）
///
/// # 戻り値
///
/// * `Err(ScoreSheetError::InvalidColumnLabel)` - ラベルが不正な場合
/// * `Err(ScoreSheetError::Config)` - 開始列が終了列より後ろにある場合
///
/// # 使用例
///
/// ```rust
/// use scoresheet::{extract_range, FieldSpec, HeaderStack, RowMatrix};
///
/// let matrix = RowMatrix::from_rows(vec![
///     vec!["ID", "カット", "カラー"],
///     vec!["1001", "８５", "80"],
/// ]);
/// let stack = HeaderStack::resolve(&matrix).unwrap();
/// let block = extract_range(&stack, matrix.row(1), "B", "C", false).unwrap();
///
/// assert_eq!(block.lookup(&FieldSpec::label("カット")), Some("85"));
/// ```
pub fn extract_range(
    stack: &HeaderStack,
    row: &[String],
    start_label: &str,
    end_label: &str,
    include_empty: bool,
) -> Result<FieldMap, ScoreSheetError> {
    let start = letter_to_index(start_label)?;
    let end = letter_to_index(end_label)?;
    if start > end {
        return Err(ScoreSheetError::Config(format!(
            "Invalid column range: {}..{} (start is after end)",
            start_label, end_label
        )));
    }
    Ok(extract_columns(stack, row, start, end, include_empty))
}

/// 検出済みスパンの範囲を抽出する
pub fn extract_span(
    stack: &HeaderStack,
    row: &[String],
    span: &ColumnSpan,
    include_empty: bool,
) -> FieldMap {
    extract_columns(stack, row, span.start, span.end, include_empty)
}

/// 0始まりの列インデックス範囲（両端を含む）を抽出する
pub(crate) fn extract_columns(
    stack: &HeaderStack,
    row: &[String],
    start: usize,
    end: usize,
    include_empty: bool,
) -> FieldMap {
    let mut map = FieldMap::new();
    {
        let mut writer = SmartSet::new(&mut map).preserve_duplicates(include_empty);
        for col in start..=end {
            let value = normalize(row.get(col).map(String::as_str).unwrap_or(""));
            if value.is_empty() && !include_empty {
                continue;
            }
            let key = stack.lowest_at(col);
            trace!(col, key = %key, value = %value, "smart-set");
            writer.set(&key, &value);
        }
    }
    map
}

/// 値を正規化せず、トリムのみで抽出する（自由記述のセクション用）
///
/// 空の値は書き込みません。同じキーの列が複数ある場合は、先の値を`<key>#<n>`に退避します。
pub(crate) fn extract_verbatim(
    stack: &HeaderStack,
    row: &[String],
    start: usize,
    end: usize,
) -> FieldMap {
    let mut map = FieldMap::new();
    for col in start..=end {
        let value = row.get(col).map(|v| v.trim()).unwrap_or("");
        if value.is_empty() {
            continue;
        }
        let key = stack.lowest_at(col);
        if map.raw_get(&key).is_some() {
            map.displace(&key, value.to_string());
        } else {
            map.put(&key, value.to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowMatrix;

    fn six_column_matrix() -> RowMatrix {
        RowMatrix::from_rows(vec![
            vec!["", "Current", "", "Previous", "", ""],
            vec!["ID", "Cut", "Color", "Shampoo", "Blow", "Finish"],
            vec!["1001", "80", "", "75", "70", "AA"],
        ])
    }

    #[test]
    fn test_keys_equal_lowest_header_row() {
        let matrix = six_column_matrix();
        let stack = HeaderStack::resolve(&matrix).unwrap();
        let block = extract_range(&stack, matrix.row(2), "A", "F", true).unwrap();
        let keys: Vec<&str> = block.keys().collect();
        assert_eq!(keys, matrix.row(1).iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_values_skipped() {
        let matrix = six_column_matrix();
        let stack = HeaderStack::resolve(&matrix).unwrap();
        let block = extract_range(&stack, matrix.row(2), "B", "C", false).unwrap();
        let keys: Vec<&str> = block.keys().collect();
        assert_eq!(keys, vec!["Cut"]);
    }

    #[test]
    fn test_values_are_normalized() {
        let matrix = RowMatrix::from_rows(vec![vec!["ID", "評価"], vec!["1001", "ＡＡ （仮）"]]);
        let stack = HeaderStack::resolve(&matrix).unwrap();
        let block = extract_range(&stack, matrix.row(1), "B", "B", false).unwrap();
        assert_eq!(block.raw_get("評価"), Some("AA仮"));
    }

    #[test]
    fn test_columns_past_row_end_read_as_empty() {
        let matrix = six_column_matrix();
        let stack = HeaderStack::resolve(&matrix).unwrap();
        let short_row = vec!["1002".to_string(), "60".to_string()];
        let block = extract_range(&stack, &short_row, "B", "H", true).unwrap();
        assert_eq!(block.raw_get("Cut"), Some("60"));
        assert_eq!(block.raw_get("Finish"), Some(""));
        assert_eq!(block.raw_get("col_8"), Some(""));
    }

    #[test]
    fn test_time_fragments_merge_across_headerless_columns() {
        let matrix = RowMatrix::from_rows(vec![
            vec!["ID", "タイム", "", ""],
            vec!["1001", "5分", "5", "30"],
        ]);
        let stack = HeaderStack::resolve(&matrix).unwrap();
        let block = extract_range(&stack, matrix.row(1), "B", "D", false).unwrap();
        assert_eq!(block.raw_get("タイム"), Some("5分30秒"));
        assert_eq!(block.len(), 1);
    }

    #[test]
    fn test_unit_like_suffix_keeps_own_key() {
        let matrix = RowMatrix::from_rows(vec![vec!["ID", "区分", "得点"], vec!["1001", "1", "80"]]);
        let stack = HeaderStack::resolve(&matrix).unwrap();
        let block = extract_range(&stack, matrix.row(1), "A", "C", false).unwrap();
        assert_eq!(block.raw_get("区分"), Some("1"));
        assert_eq!(block.raw_get("得点"), Some("80"));
        assert_eq!(block.raw_get("区"), None);
    }

    #[test]
    fn test_reversed_range_is_config_error() {
        let matrix = six_column_matrix();
        let stack = HeaderStack::resolve(&matrix).unwrap();
        assert!(matches!(
            extract_range(&stack, matrix.row(2), "F", "A", false),
            Err(ScoreSheetError::Config(_))
        ));
        assert!(matches!(
            extract_range(&stack, matrix.row(2), "1", "A", false),
            Err(ScoreSheetError::InvalidColumnLabel(_))
        ));
    }

    #[test]
    fn test_extract_verbatim_keeps_text() {
        let matrix = RowMatrix::from_rows(vec![
            vec!["ID", "所見", "所見", "備考"],
            vec!["1001", " 根元　１ｃｍ残し ", "ムラなし", ""],
        ]);
        let stack = HeaderStack::resolve(&matrix).unwrap();
        let block = extract_verbatim(&stack, matrix.row(1), 1, 3);
        assert_eq!(block.raw_get("所見#1"), Some("根元　１ｃｍ残し"));
        assert_eq!(block.raw_get("所見"), Some("ムラなし"));
        assert_eq!(block.raw_get("備考"), None);
    }

    #[test]
    fn test_extract_span() {
        let matrix = six_column_matrix();
        let stack = HeaderStack::resolve(&matrix).unwrap();
        let span = ColumnSpan::new("Previous", 3, 5);
        let block = extract_span(&stack, matrix.row(2), &span, false);
        let keys: Vec<&str> = block.keys().collect();
        assert_eq!(keys, vec!["Shampoo", "Blow", "Finish"]);
    }
}
