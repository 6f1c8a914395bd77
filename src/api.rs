//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 出力ドキュメントのサブタイプ
///
/// セクション（"score", "rank"など）の中で、どの時点・種類の値かを表します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Subtype {
    /// 今回の値
    Current,

    /// 前回の値
    Previous,

    /// 最終（確定）値
    Final,

    /// 全国平均
    Average,

    /// 加工していない値（プロフィールなど）
    Raw,

    /// 比較ブロック（今回・前回をまとめたもの）
    Merged,
}

impl Subtype {
    /// 全サブタイプ
    pub const ALL: [Subtype; 6] = [
        Subtype::Current,
        Subtype::Previous,
        Subtype::Final,
        Subtype::Average,
        Subtype::Raw,
        Subtype::Merged,
    ];

    /// 文字列表現（"current"など）
    pub fn as_str(self) -> &'static str {
        match self {
            Subtype::Current => "current",
            Subtype::Previous => "previous",
            Subtype::Final => "final",
            Subtype::Average => "average",
            Subtype::Raw => "raw",
            Subtype::Merged => "merged",
        }
    }

    /// 文字列からサブタイプを取得
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// セクションの書き込み規則
///
/// 範囲抽出後の値をどのように整えるかを指定します。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum MergeRule {
    /// Smart-Set規則（値を正規化し、分・秒の断片を1つの所要時間にまとめる）
    #[default]
    SmartSet,

    /// Smart-Set規則で抽出した後、値をトレンドコード（1〜3）に変換
    ///
    /// キーにチェックリストコードが含まれていれば、コード単体のキーでも書き込みます。
    Trend,

    /// 値を正規化せずトリムのみ行う（コメントなどの自由記述）
    Verbatim,
}

/// 入力ファイルの形式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum InputFormat {
    /// 先頭バイトから判定（ZIP/OLEシグネチャならワークブック、それ以外は区切り文字テキスト）
    #[default]
    Auto,

    /// xlsx / xls / ods（calamine）
    Workbook,

    /// CSV / TSV
    Delimited,
}

/// シート選択方式
///
/// ワークブック入力のうち、取り込み対象とするシートを指定します。
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SheetSelector {
    /// インデックスで指定（0始まり）
    ///
    /// 例: `SheetSelector::Index(0)` は最初のシート
    Index(usize),

    /// シート名で指定
    ///
    /// 例: `SheetSelector::Name("評価一覧".to_string())`
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

/// プレビュー出力のフォーマット
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum OutputFormat {
    /// Markdown形式（セクションごとのキー・値テーブル）
    ///
    /// # 出力例
    ///
    /// ```markdown
    /// ## 1001 / score.current
    ///
    /// | キー     | 値 |
    /// | -------- | -- |
    /// | 総合得点 | 85 |
    /// ```
    #[default]
    Markdown,

    /// JSON形式（ドキュメントの配列）
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtype_names() {
        for subtype in Subtype::ALL {
            assert_eq!(Subtype::from_name(subtype.as_str()), Some(subtype));
        }
        assert_eq!(Subtype::from_name("latest"), None);
        assert_eq!(Subtype::Merged.to_string(), "merged");
    }

    #[test]
    fn test_subtype_serde() {
        assert_eq!(serde_json::to_string(&Subtype::Average).unwrap(), r#""average""#);
        let subtype: Subtype = serde_json::from_str(r#""previous""#).unwrap();
        assert_eq!(subtype, Subtype::Previous);
    }

    #[test]
    fn test_merge_rule_serde() {
        assert_eq!(serde_json::to_string(&MergeRule::SmartSet).unwrap(), r#""smart_set""#);
        let rule: MergeRule = serde_json::from_str(r#""trend""#).unwrap();
        assert_eq!(rule, MergeRule::Trend);
        assert_eq!(MergeRule::default(), MergeRule::SmartSet);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(SheetSelector::default(), SheetSelector::Index(0));
        assert_eq!(OutputFormat::default(), OutputFormat::Markdown);
        assert_eq!(InputFormat::default(), InputFormat::Auto);
    }
}
