//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ScoreSheetError;

/// 正規化前の生の値
///
/// セルや永続化済みペイロードから取り出した値を、デコーダーに渡すための型です。
/// 数値として届く値（Excelの数値セル）と文字列として届く値を区別します。
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// 数値（f64）
    Number(f64),

    /// 文字列
    Text(String),

    /// 空セル
    Empty,
}

impl RawValue {
    /// 値が空かどうかを判定
    ///
    /// 空白のみの文字列も空として扱います。
    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::Number(_) => false,
        }
    }

    /// 値を文字列として取得（正規化前）
    ///
    /// 整数値の数値は小数点なしで出力します（`5.0` → `"5"`）。
    pub fn as_raw_string(&self) -> String {
        match self {
            RawValue::Number(n) => format_number(*n),
            RawValue::Text(s) => s.clone(),
            RawValue::Empty => String::new(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        RawValue::Number(f64::from(value))
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Empty)
    }
}

/// 数値をセル表示用の文字列に変換（整数値は小数点なし）
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// 取り込み対象の行列（行 × セル文字列）
///
/// 行ごとに長さが異なってもよく、最長行までの範囲で矩形として扱います。
/// 短い行の末尾は空セルで埋められているものとみなします。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowMatrix {
    rows: Vec<Vec<String>>,
}

impl RowMatrix {
    /// 行ベクターから行列を生成
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// 任意の文字列イテレーターから行列を生成
    ///
    /// ```rust
    /// use scoresheet::RowMatrix;
    ///
    /// let matrix = RowMatrix::from_rows(vec![vec!["ID", "氏名"], vec!["1001", "山田"]]);
    /// assert_eq!(matrix.row_count(), 2);
    /// assert_eq!(matrix.cell(1, 1), "山田");
    /// ```
    pub fn from_rows<I, R, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// 行数
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 列数（最長行の長さ）
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// 指定された行を取得（範囲外の場合は空スライス）
    pub fn row(&self, row_idx: usize) -> &[String] {
        self.rows.get(row_idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 指定されたセルを取得（範囲外の場合は空文字列）
    pub fn cell(&self, row_idx: usize, col_idx: usize) -> &str {
        self.row(row_idx)
            .get(col_idx)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// 全行のイテレーター
    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// 比較トレンド（前回比の矢印）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendCode {
    /// 上昇（↑）
    Up = 1,
    /// 横ばい（→）
    Flat = 2,
    /// 下降（↓）
    Down = 3,
}

impl TrendCode {
    /// 1〜3のコードから生成（範囲外は`None`）
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TrendCode::Up),
            2 => Some(TrendCode::Flat),
            3 => Some(TrendCode::Down),
            _ => None,
        }
    }

    /// 数値を1〜3に丸めて生成
    ///
    /// 0以下は「トレンドなし」として`None`、3を超える値は`Down`に丸めます。
    pub fn clamped(code: i64) -> Option<Self> {
        if code <= 0 {
            None
        } else {
            Self::from_code(code.min(3))
        }
    }

    /// 数値コード
    pub fn code(self) -> u8 {
        self as u8
    }

    /// 表示用の矢印
    pub fn arrow(self) -> &'static str {
        match self {
            TrendCode::Up => "↑",
            TrendCode::Flat => "→",
            TrendCode::Down => "↓",
        }
    }
}

/// 4段階の評価ランク（B < A < AA < AAA）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RankBand {
    /// B（1）
    B = 1,
    /// A（2）
    A = 2,
    /// AA（3）
    AA = 3,
    /// AAA（4）
    AAA = 4,
}

impl RankBand {
    /// 長いラベルから順に並べたランク一覧
    ///
    /// "AAA"は"AA"と"A"を部分文字列として含むため、判定は必ずこの順序で行います。
    pub const LONGEST_FIRST: [RankBand; 4] =
        [RankBand::AAA, RankBand::AA, RankBand::A, RankBand::B];

    /// 1〜4のレベルから生成（範囲外は`None`）
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(RankBand::B),
            2 => Some(RankBand::A),
            3 => Some(RankBand::AA),
            4 => Some(RankBand::AAA),
            _ => None,
        }
    }

    /// 数値レベル
    pub fn level(self) -> u8 {
        self as u8
    }

    /// ラベル文字列
    pub fn label(self) -> &'static str {
        match self {
            RankBand::B => "B",
            RankBand::A => "A",
            RankBand::AA => "AA",
            RankBand::AAA => "AAA",
        }
    }

    /// ラベル文字列と完全一致するランクを取得
    pub fn from_label(label: &str) -> Option<Self> {
        Self::LONGEST_FIRST
            .into_iter()
            .find(|band| band.label() == label)
    }
}

impl fmt::Display for RankBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

static CHECKLIST_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{1,2})-([0-9]{1,2})(?:[^0-9]|$)")
        .expect("checklist code pattern is valid")
});

/// チェックリストコード（"19-3"など）
///
/// チェック項目マスターと任意のデータマップを、列位置に依存せず結びつけるキーです。
/// シリアライズ時は`"19-3"`形式の文字列になります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChecklistCode {
    /// 大項目番号
    pub major: u8,
    /// 小項目番号
    pub minor: u8,
}

impl ChecklistCode {
    /// 新しいコードを生成
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// 文字列に埋め込まれた最初のコードを抽出
    ///
    /// 入力は正規化済み（全角数字・ダッシュ類が半角化済み）であることを前提とします。
    /// 前後が数字に隣接する場合（"119-3"など）は一致しません。
    pub fn find_in(text: &str) -> Option<Self> {
        let caps = CHECKLIST_CODE_RE.captures(text)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let minor = caps.get(2)?.as_str().parse().ok()?;
        Some(Self { major, minor })
    }
}

impl fmt::Display for ChecklistCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.major, self.minor)
    }
}

impl FromStr for ChecklistCode {
    type Err = ScoreSheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = crate::normalize::normalize(s);
        let (major, minor) = normalized.split_once('-').ok_or_else(|| {
            ScoreSheetError::Config(format!("Invalid checklist code: '{}'", s))
        })?;
        let parse = |part: &str| -> Result<u8, ScoreSheetError> {
            if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(ScoreSheetError::Config(format!(
                    "Invalid checklist code: '{}'",
                    s
                )));
            }
            part.parse()
                .map_err(|_| ScoreSheetError::Config(format!("Invalid checklist code: '{}'", s)))
        };
        Ok(Self {
            major: parse(major)?,
            minor: parse(minor)?,
        })
    }
}

impl TryFrom<String> for ChecklistCode {
    type Error = ScoreSheetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChecklistCode> for String {
    fn from(code: ChecklistCode) -> Self {
        code.to_string()
    }
}

/// 名前付きの連続列範囲（0始まり、両端を含む）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpan {
    /// グループラベル（"今回得点"など）
    pub key: String,
    /// 開始列
    pub start: usize,
    /// 終了列
    pub end: usize,
}

impl ColumnSpan {
    /// 新しいスパンを生成
    pub fn new(key: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            key: key.into(),
            start,
            end,
        }
    }

    /// 指定された列がスパン内にあるかを判定
    pub fn contains(&self, col: usize) -> bool {
        col >= self.start && col <= self.end
    }

    /// スパンの列数
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// スパンは常に1列以上を含む
    pub fn is_empty(&self) -> bool {
        false
    }
}
