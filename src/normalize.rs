//! Text Normalizer Module
//!
//! 日本語の見出し・値を比較用の正規形に変換するモジュール。
//! 全角英数字の半角化、ダッシュ類の統一、括弧・空白の除去、
//! 表記ゆれ（同義語）の畳み込みを順に適用します。
//!
//! 正規化は全域関数（失敗しない）かつ冪等です:
//! `normalize(&normalize(x)) == normalize(x)`。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::RawValue;

/// 表記ゆれの畳み込み表（長い表記 → 短い表記）
///
/// 置換後の文字列は必ず置換前より短いこと（不動点までの反復が停止するため）。
pub const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("ワンカラーリング", "ワンカラー"),
    ("ワンカラ-リング", "ワンカラ-"),
    ("トリートメント", "TR"),
    ("トリ-トメント", "TR"),
    ("全国平均値", "全国平均"),
    ("ヘアケア", "ケア"),
    ("ヘアカラー", "カラー"),
    ("ヘアカラ-", "カラ-"),
    ("所要時間", "時間"),
    ("施術時間", "時間"),
];

/// 全角ASCIIブロック（U+FF01〜U+FF5E）を半角に変換し、全角空白を半角空白にする
pub fn to_half_width(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{3000}' => ' ',
            c => c,
        })
        .collect()
}

/// ダッシュ類かどうか
fn is_dash_variant(c: char) -> bool {
    matches!(
        c,
        '\u{2010}'..='\u{2015}'
            | '\u{2212}'
            | '\u{2500}'
            | '\u{301C}'
            | '\u{30FC}'
            | '\u{FE63}'
            | '\u{FF70}'
            | '~'
    )
}

/// 括弧類かどうか（半角化後に判定する）
fn is_bracket(c: char) -> bool {
    matches!(
        c,
        '(' | ')'
            | '['
            | ']'
            | '{'
            | '}'
            | '<'
            | '>'
            | '【'
            | '】'
            | '「'
            | '」'
            | '『'
            | '』'
            | '〈'
            | '〉'
            | '《'
            | '》'
            | '〔'
            | '〕'
    )
}

/// 半角化・ダッシュ統一・括弧と空白の除去（文字単位の処理）
fn fold_chars(s: &str) -> String {
    to_half_width(s)
        .chars()
        .filter(|c| !c.is_whitespace() && !is_bracket(*c))
        .map(|c| if is_dash_variant(c) { '-' } else { c })
        .collect()
}

/// 同義語を不動点まで畳み込む
fn fold_synonyms(mut s: String) -> String {
    loop {
        let mut changed = false;
        for (long, short) in DEFAULT_SYNONYMS {
            if s.contains(long) {
                s = s.replace(long, short);
                changed = true;
            }
        }
        if !changed {
            return s;
        }
    }
}

/// 文字列を比較用の正規形に変換する
///
/// # 使用例
///
/// ```rust
/// use scoresheet::normalize;
///
/// assert_eq!(normalize("１９－３（カット）"), "19-3カット");
/// assert_eq!(normalize("ワンカラーリング 得点"), "ワンカラ-得点");
/// assert_eq!(normalize(&normalize("全国平均値　")), normalize("全国平均値　"));
/// ```
pub fn normalize(s: &str) -> String {
    fold_synonyms(fold_chars(s))
}

/// 任意の生の値を文字列化してから正規化する
///
/// 数値は整数なら小数点なし、空セルは空文字列になります。
pub fn normalize_value(value: &RawValue) -> String {
    normalize(&value.as_raw_string())
}

/// 正規化済みのキー
///
/// 2つの生ラベルは、`NormalizedKey`が等しいときに限り「同じフィールド」です。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    /// 生ラベルから正規化済みキーを生成
    pub fn new(raw: &str) -> Self {
        Self(normalize(raw))
    }

    /// 文字列として取得
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 空キーかどうか
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// どちらか一方が他方を部分文字列として含むか（空キーは一致しない）
    pub fn overlaps(&self, other: &NormalizedKey) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && (self.0.contains(other.as_str()) || other.0.contains(self.as_str()))
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NormalizedKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
