//! Configuration Module
//!
//! 取り込み処理の設定データ（セクション表、固定列、チェック項目マスター）を定義するモジュール。
//!
//! 列範囲はこのセクション表が正とし、見出しの文言は参考情報として扱います。
//! いずれの設定もJSONから読み込めます。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::api::{MergeRule, Subtype};
use crate::column::letter_to_index;
use crate::error::ScoreSheetError;
use crate::types::ChecklistCode;

/// 1つのセクション（`name.subtype → [start, end]`）の定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpec {
    /// セクション名（"score"など）
    pub name: String,
    /// サブタイプ
    pub subtype: Subtype,
    /// 開始列ラベル
    pub start: String,
    /// 終了列ラベル（両端を含む）
    pub end: String,
    /// 書き込み規則
    #[serde(default)]
    pub rule: MergeRule,
    /// 空の値・空のブロックも保持するか（比較セクション）
    #[serde(default)]
    pub keep_empty: bool,
}

impl SectionSpec {
    /// Smart-Set規則のセクションを生成
    pub fn new(
        name: impl Into<String>,
        subtype: Subtype,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            subtype,
            start: start.into(),
            end: end.into(),
            rule: MergeRule::SmartSet,
            keep_empty: false,
        }
    }

    /// 書き込み規則を指定
    pub fn with_rule(mut self, rule: MergeRule) -> Self {
        self.rule = rule;
        self
    }

    /// 空の値・空のブロックを保持する
    pub fn keep_empty(mut self) -> Self {
        self.keep_empty = true;
        self
    }

    /// `"name.subtype"`形式のキー
    pub fn key(&self) -> String {
        format!("{}.{}", self.name, self.subtype)
    }

    /// 列ラベルを0始まりのインデックス範囲に変換する
    pub fn columns(&self) -> Result<(usize, usize), ScoreSheetError> {
        let start = letter_to_index(&self.start)?;
        let end = letter_to_index(&self.end)?;
        if start > end {
            return Err(ScoreSheetError::Config(format!(
                "Section '{}': start column {} is after end column {}",
                self.key(),
                self.start,
                self.end
            )));
        }
        Ok((start, end))
    }
}

/// 既定のセクション表（名前, サブタイプ, 開始列, 終了列, 規則, 空を保持）
const DEFAULT_SECTIONS: &[(&str, Subtype, &str, &str, MergeRule, bool)] = &[
    ("score", Subtype::Current, "E", "X", MergeRule::SmartSet, false),
    ("score", Subtype::Previous, "Y", "AR", MergeRule::SmartSet, false),
    ("score", Subtype::Average, "AS", "BL", MergeRule::SmartSet, false),
    ("rating", Subtype::Current, "BM", "BT", MergeRule::SmartSet, false),
    ("rating", Subtype::Previous, "BU", "CB", MergeRule::SmartSet, false),
    ("score_comparison", Subtype::Merged, "CC", "CV", MergeRule::Trend, true),
    ("care_score", Subtype::Current, "CW", "DF", MergeRule::SmartSet, false),
    ("care_score", Subtype::Previous, "DG", "EF", MergeRule::SmartSet, false),
    ("care_comparison", Subtype::Merged, "EG", "EP", MergeRule::Trend, true),
    ("onecolor_score", Subtype::Current, "EQ", "FH", MergeRule::SmartSet, false),
    ("onecolor_score", Subtype::Previous, "FI", "FZ", MergeRule::SmartSet, false),
    ("onecolor_comparison", Subtype::Merged, "GA", "GJ", MergeRule::Trend, true),
    ("time", Subtype::Current, "GK", "GR", MergeRule::SmartSet, false),
    ("time", Subtype::Previous, "GS", "GZ", MergeRule::SmartSet, false),
    ("time", Subtype::Average, "HA", "HH", MergeRule::SmartSet, false),
    ("time_comparison", Subtype::Merged, "HI", "HL", MergeRule::Trend, true),
    ("radar", Subtype::Current, "HM", "HV", MergeRule::SmartSet, false),
    ("radar", Subtype::Previous, "HW", "IF", MergeRule::SmartSet, false),
    ("radar", Subtype::Average, "IG", "IP", MergeRule::SmartSet, false),
    ("rank", Subtype::Current, "IQ", "JD", MergeRule::SmartSet, false),
    ("rank", Subtype::Previous, "JE", "JR", MergeRule::SmartSet, false),
    ("rank", Subtype::Final, "JS", "JZ", MergeRule::SmartSet, false),
    ("checklist", Subtype::Current, "KA", "MZ", MergeRule::SmartSet, false),
    ("checklist", Subtype::Previous, "NA", "PZ", MergeRule::SmartSet, false),
    ("checklist_comparison", Subtype::Merged, "QA", "SZ", MergeRule::Trend, true),
    ("care_checklist", Subtype::Current, "TA", "TZ", MergeRule::SmartSet, false),
    ("onecolor_checklist", Subtype::Current, "UA", "UZ", MergeRule::SmartSet, false),
    ("comment", Subtype::Current, "VA", "VF", MergeRule::Verbatim, false),
    ("comment", Subtype::Final, "VG", "VJ", MergeRule::Verbatim, false),
    ("profile", Subtype::Raw, "VK", "VZ", MergeRule::SmartSet, false),
];

/// セクション表
///
/// JSONでは`SectionSpec`の配列として表現します。
///
/// # 使用例
///
/// ```rust
/// use scoresheet::{SectionTable, Subtype};
///
/// let table = SectionTable::default();
/// let care = table.get("care_score", Subtype::Previous).unwrap();
/// assert_eq!((care.start.as_str(), care.end.as_str()), ("DG", "EF"));
/// assert!(table.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionTable {
    sections: Vec<SectionSpec>,
}

impl SectionTable {
    /// セクション一覧から生成
    pub fn new(sections: Vec<SectionSpec>) -> Self {
        Self { sections }
    }

    /// JSON配列から読み込む
    pub fn from_json(json: &str) -> Result<Self, ScoreSheetError> {
        Ok(serde_json::from_str(json)?)
    }

    /// セクション一覧（定義順）
    pub fn sections(&self) -> &[SectionSpec] {
        &self.sections
    }

    /// セクション数
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// 名前とサブタイプでセクションを取得
    pub fn get(&self, name: &str, subtype: Subtype) -> Option<&SectionSpec> {
        self.sections
            .iter()
            .find(|s| s.name == name && s.subtype == subtype)
    }

    /// セクションを追加（同じキーがあれば置き換え）
    pub fn insert(&mut self, section: SectionSpec) {
        match self
            .sections
            .iter_mut()
            .find(|s| s.name == section.name && s.subtype == section.subtype)
        {
            Some(existing) => *existing = section,
            None => self.sections.push(section),
        }
    }

    /// セクション表を検証する
    ///
    /// 列ラベルの妥当性、開始列 ≤ 終了列、キーの重複、範囲の重なりを検査します。
    pub fn validate(&self) -> Result<(), ScoreSheetError> {
        let mut keys = BTreeSet::new();
        let mut ranges: Vec<(usize, usize, String)> = Vec::with_capacity(self.sections.len());

        for section in &self.sections {
            if section.name.trim().is_empty() {
                return Err(ScoreSheetError::Config(
                    "Section name must not be empty".to_string(),
                ));
            }
            let key = section.key();
            if !keys.insert(key.clone()) {
                return Err(ScoreSheetError::Config(format!(
                    "Duplicate section '{}'",
                    key
                )));
            }
            let (start, end) = section.columns()?;
            ranges.push((start, end, key));
        }

        ranges.sort();
        for pair in ranges.windows(2) {
            let (_, prev_end, prev_key) = &pair[0];
            let (next_start, _, next_key) = &pair[1];
            if next_start <= prev_end {
                return Err(ScoreSheetError::Config(format!(
                    "Sections '{}' and '{}' overlap",
                    prev_key, next_key
                )));
            }
        }
        Ok(())
    }
}

impl Default for SectionTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_SECTIONS
                .iter()
                .map(|(name, subtype, start, end, rule, keep_empty)| SectionSpec {
                    name: name.to_string(),
                    subtype: *subtype,
                    start: start.to_string(),
                    end: end.to_string(),
                    rule: *rule,
                    keep_empty: *keep_empty,
                })
                .collect(),
        )
    }
}

/// 顧客情報の固定列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerColumns {
    /// 顧客ID
    pub id: String,
    /// 氏名
    pub name: String,
    /// 発行者
    pub issuer: String,
    /// 状態
    pub status: String,
}

impl Default for CustomerColumns {
    fn default() -> Self {
        Self {
            id: "A".to_string(),
            name: "B".to_string(),
            issuer: "C".to_string(),
            status: "D".to_string(),
        }
    }
}

impl CustomerColumns {
    /// 各列をインデックスに変換する（id, name, issuer, status の順）
    pub fn indices(&self) -> Result<[usize; 4], ScoreSheetError> {
        Ok([
            letter_to_index(&self.id)?,
            letter_to_index(&self.name)?,
            letter_to_index(&self.issuer)?,
            letter_to_index(&self.status)?,
        ])
    }
}

/// チェック項目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// チェックリストコード
    pub code: ChecklistCode,
    /// 項目名
    pub label: String,
    /// 項目群（"care", "onecolor"など）
    #[serde(default)]
    pub family: Option<String>,
}

const DEFAULT_CHECKLIST: &[(u8, u8, &str, &str)] = &[
    (1, 1, "カウンセリング", "care"),
    (1, 2, "毛髪診断", "care"),
    (1, 3, "薬剤選定", "care"),
    (2, 1, "ブロッキング", "care"),
    (2, 2, "塗布量", "care"),
    (2, 3, "塗布スピード", "care"),
    (3, 1, "放置時間", "care"),
    (3, 2, "乳化", "care"),
    (3, 3, "シャンプー", "care"),
    (19, 1, "根元塗布", "onecolor"),
    (19, 2, "毛先塗布", "onecolor"),
    (19, 3, "色ムラ", "onecolor"),
    (19, 4, "染まり具合", "onecolor"),
    (20, 1, "仕上がり", "onecolor"),
    (20, 2, "スタイリング", "onecolor"),
];

/// チェック項目マスター（コード順）
///
/// 比較ブロックの矢印を、列位置ではなくチェックリストコードで各項目に対応付けるために使います。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChecklistMaster {
    items: Vec<ChecklistItem>,
}

impl ChecklistMaster {
    /// 項目一覧から生成（コード順に並べ替え）
    pub fn new(mut items: Vec<ChecklistItem>) -> Self {
        items.sort_by_key(|item| item.code);
        Self { items }
    }

    /// JSON配列から読み込む
    pub fn from_json(json: &str) -> Result<Self, ScoreSheetError> {
        let items: Vec<ChecklistItem> = serde_json::from_str(json)?;
        Ok(Self::new(items))
    }

    /// 全項目（コード順）
    pub fn items(&self) -> &[ChecklistItem] {
        &self.items
    }

    /// 項目群で絞り込む
    pub fn family(&self, family: &str) -> impl Iterator<Item = &ChecklistItem> + '_ {
        let family = family.to_string();
        self.items
            .iter()
            .filter(move |item| item.family.as_deref() == Some(family.as_str()))
    }

    /// コードで項目を取得
    pub fn get(&self, code: ChecklistCode) -> Option<&ChecklistItem> {
        self.items.iter().find(|item| item.code == code)
    }

    /// コードの重複を検査する
    pub fn validate(&self) -> Result<(), ScoreSheetError> {
        for pair in self.items.windows(2) {
            if pair[0].code == pair[1].code {
                return Err(ScoreSheetError::Config(format!(
                    "Duplicate checklist code '{}'",
                    pair[0].code
                )));
            }
        }
        Ok(())
    }
}

impl Default for ChecklistMaster {
    fn default() -> Self {
        Self::new(
            DEFAULT_CHECKLIST
                .iter()
                .map(|(major, minor, label, family)| ChecklistItem {
                    code: ChecklistCode::new(*major, *minor),
                    label: label.to_string(),
                    family: Some(family.to_string()),
                })
                .collect(),
        )
    }
}
