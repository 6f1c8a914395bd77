//! Group Span Detector Module
//!
//! ヘッダースタックの中から「グループ行」（今回・前回・全国平均などの区分が並ぶ行）を
//! キーワードのスコアで選び、連続する名前付き列範囲（スパン）に分割するモジュール。

use serde::{Deserialize, Serialize};

use crate::header::HeaderStack;
use crate::normalize::normalize;
use crate::types::ColumnSpan;

/// グループラベルが1つもない場合に使用するスパンのキー
pub const CATCH_ALL_SPAN_KEY: &str = "__all__";

/// 既定のグループキーワード
pub const DEFAULT_GROUP_KEYWORDS: &[&str] = &[
    "今回",
    "前回",
    "全国平均",
    "得点",
    "評価",
    "レーダー",
    "比較",
    "タイム",
    "ケア",
    "ワンカラー",
    "current",
    "previous",
    "national average",
    "score",
    "rating",
    "radar",
    "comparison",
    "time",
    "care",
    "one-color",
];

/// グループ行の判定に使用するキーワード一覧
///
/// キーワードは正規化・小文字化した状態で保持します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct GroupKeywords {
    keywords: Vec<String>,
}

impl GroupKeywords {
    /// キーワード一覧から生成（空のキーワードは無視）
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| normalize(k.as_ref()).to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// キーワードの一覧
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// 行のスコア（連結テキスト中のキーワード出現回数の合計）
    pub fn score_row<S: AsRef<str>>(&self, cells: &[S]) -> usize {
        let text: String = cells
            .iter()
            .map(|cell| normalize(cell.as_ref()).to_lowercase())
            .collect();
        self.keywords
            .iter()
            .map(|keyword| text.matches(keyword.as_str()).count())
            .sum()
    }
}

impl Default for GroupKeywords {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_KEYWORDS)
    }
}

impl From<Vec<String>> for GroupKeywords {
    fn from(keywords: Vec<String>) -> Self {
        Self::new(keywords)
    }
}

impl From<GroupKeywords> for Vec<String> {
    fn from(keywords: GroupKeywords) -> Self {
        keywords.keywords
    }
}

/// グループ行のインデックスを求める
///
/// スコアが最大の行を選び、同点の場合は上の行を優先します。
pub fn detect_group_row(stack: &HeaderStack, keywords: &GroupKeywords) -> usize {
    let mut best = (0, 0);
    for (idx, row) in stack.header_rows().iter().enumerate() {
        let score = keywords.score_row(row);
        if score > best.1 {
            best = (idx, score);
        }
    }
    best.0
}

/// 指定されたグループ行からスパンを構築する
///
/// 空でないグループセルごとにスパンを開始し、次の空でないセルの直前
/// （または最終列）までを範囲とします。最初のラベルより左の列はどのスパンにも属しません。
/// グループ行が完全に空の場合は、全列を覆う`"__all__"`スパンを1つ返します。
pub fn spans_from_group_row(group_row: &[String], column_count: usize) -> Vec<ColumnSpan> {
    if column_count == 0 {
        return Vec::new();
    }

    let starts: Vec<(usize, &str)> = group_row
        .iter()
        .take(column_count)
        .enumerate()
        .map(|(c, cell)| (c, cell.trim()))
        .filter(|(_, cell)| !cell.is_empty())
        .collect();

    if starts.is_empty() {
        return vec![ColumnSpan::new(CATCH_ALL_SPAN_KEY, 0, column_count - 1)];
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, (start, key))| {
            let end = starts
                .get(i + 1)
                .map(|(next, _)| next - 1)
                .unwrap_or(column_count - 1);
            ColumnSpan::new(*key, *start, end)
        })
        .collect()
}

/// ヘッダースタックからスパンを検出する
///
/// # 使用例
///
/// ```rust
/// use scoresheet::{detect_spans, GroupKeywords, HeaderStack, RowMatrix};
///
/// let matrix = RowMatrix::from_rows(vec![
///     vec!["", "今回", "", "前回", ""],
///     vec!["ID", "カット", "カラー", "カット", "カラー"],
///     vec!["1001", "85", "80", "70", "75"],
/// ]);
/// let stack = HeaderStack::resolve(&matrix).unwrap();
/// let spans = detect_spans(&stack, &GroupKeywords::default());
///
/// assert_eq!(spans.len(), 2);
/// assert_eq!((spans[0].key.as_str(), spans[0].start, spans[0].end), ("今回", 1, 2));
/// assert_eq!((spans[1].key.as_str(), spans[1].start, spans[1].end), ("前回", 3, 4));
/// ```
pub fn detect_spans(stack: &HeaderStack, keywords: &GroupKeywords) -> Vec<ColumnSpan> {
    let group_idx = detect_group_row(stack, keywords);
    match stack.header_rows().get(group_idx) {
        Some(row) => spans_from_group_row(row, stack.column_count()),
        None => spans_from_group_row(&[], stack.column_count()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowMatrix;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_score_row_counts_occurrences() {
        let keywords = GroupKeywords::default();
        assert_eq!(keywords.score_row(&["今回得点", "前回得点"]), 4);
        assert_eq!(keywords.score_row(&["Current", "PREVIOUS"]), 2);
        assert_eq!(keywords.score_row(&["National Average"]), 1);
        assert_eq!(keywords.score_row(&["ID", "氏名"]), 0);
    }

    #[test]
    fn test_keywords_are_normalized() {
        let keywords = GroupKeywords::new(["ワンカラーリング", "", "ＣＵＲＲＥＮＴ"]);
        assert_eq!(keywords.keywords(), &["ワンカラ-", "current"]);
    }

    #[test]
    fn test_group_row_tie_prefers_upper_row() {
        let matrix = RowMatrix::from_rows(vec![
            vec!["", "今回", "前回"],
            vec!["", "前回", "今回"],
            vec!["1001", "1", "2"],
        ]);
        let stack = HeaderStack::resolve(&matrix).unwrap();
        assert_eq!(detect_group_row(&stack, &GroupKeywords::default()), 0);
    }

    #[test]
    fn test_group_row_highest_score_wins() {
        let matrix = RowMatrix::from_rows(vec![
            vec!["顧客情報", "", ""],
            vec!["", "今回", "前回"],
            vec!["ID", "A", "B"],
            vec!["1001", "1", "2"],
        ]);
        let stack = HeaderStack::resolve(&matrix).unwrap();
        assert_eq!(detect_group_row(&stack, &GroupKeywords::default()), 1);
    }

    #[test]
    fn test_spans_cover_to_last_column() {
        let spans = spans_from_group_row(&strings(&["", "Current", "", "Previous", "", ""]), 6);
        assert_eq!(
            spans,
            vec![
                ColumnSpan::new("Current", 1, 2),
                ColumnSpan::new("Previous", 3, 5)
            ]
        );
    }

    #[test]
    fn test_catch_all_span() {
        let spans = spans_from_group_row(&strings(&["", " ", ""]), 4);
        assert_eq!(spans, vec![ColumnSpan::new(CATCH_ALL_SPAN_KEY, 0, 3)]);
        assert!(spans_from_group_row(&[], 0).is_empty());
    }

    #[test]
    fn test_short_group_row_extends_to_column_count() {
        let spans = spans_from_group_row(&strings(&["今回"]), 3);
        assert_eq!(spans, vec![ColumnSpan::new("今回", 0, 2)]);
    }

    #[test]
    fn test_keywords_serde() {
        let keywords: GroupKeywords = serde_json::from_str(r#"["今回", "Rating"]"#).unwrap();
        assert_eq!(keywords.keywords(), &["今回", "rating"]);
        assert_eq!(
            serde_json::to_string(&keywords).unwrap(),
            r#"["今回","rating"]"#
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_spans_are_disjoint_and_ordered(
                cells in proptest::collection::vec(prop_oneof![Just(""), Just("今回"), Just("前回")], 1..40)
            ) {
                let row = strings(&cells);
                let spans = spans_from_group_row(&row, row.len());
                prop_assert!(!spans.is_empty());
                for pair in spans.windows(2) {
                    prop_assert_eq!(pair[0].end + 1, pair[1].start);
                }
                for span in &spans {
                    prop_assert!(span.start <= span.end);
                }
                prop_assert_eq!(spans.last().map(|s| s.end), Some(row.len() - 1));
            }
        }
    }
}
