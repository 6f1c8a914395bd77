//! Rank/Grade Decoder Module
//!
//! セルの生の値（"ＡＡＡ"、3、"ランクB"、"未評価"など）を`RankBand`に変換するモジュール。

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ScoreSheetError;
use crate::normalize::normalize;
use crate::types::{RankBand, RawValue};

/// 未評価を表す語（含まれていれば常に`None`）
pub const UNRATED_MARKER: &str = "未評価";

static BAND_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Z])(AAA|AA|A|B)(?:[^A-Z]|$)").expect("band label pattern is valid")
});
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").expect("number pattern is valid"));

/// 値が「印あり」かどうか（空・`"0"`・`"-"`以外）
pub fn is_truthy_marker(value: &str) -> bool {
    let value = normalize(value);
    !(value.is_empty() || value == "0" || value == "-")
}

/// 文字列中のランクラベルを探す（長いラベルを優先）
///
/// 英字に隣接するラベルは一致しません（"RANK"の"A"など）。
pub fn find_band_label(text: &str) -> Option<RankBand> {
    let upper = normalize(text).to_uppercase();
    let caps = BAND_LABEL_RE.captures(&upper)?;
    RankBand::from_label(caps.get(1)?.as_str())
}

fn band_from_number(n: f64) -> Option<RankBand> {
    if !n.is_finite() {
        return None;
    }
    RankBand::from_level(n.floor() as i64)
}

/// 生の値をランクに変換する
///
/// 判定順序:
///
/// 1. "未評価"を含む場合は`None`
/// 2. 数値は切り捨てて1〜4の範囲なら採用（範囲外は丸めずに`None`扱い）
/// 3. 文字列はラベル（AAA, AA, A, B）を長い順に照合
/// 4. 文字列中の数字を取り出して2.と同様に判定
/// 5. `hint`（列見出しなど）にラベルが含まれ、値が印ありならそのランク
///
/// # 使用例
///
/// ```rust
/// use scoresheet::{decode_rank, RankBand, RawValue};
///
/// assert_eq!(decode_rank(&RawValue::from("ＡＡＡ"), None), Some(RankBand::AAA));
/// assert_eq!(decode_rank(&RawValue::from(3), None), Some(RankBand::AA));
/// assert_eq!(decode_rank(&RawValue::from(7), None), None);
/// assert_eq!(decode_rank(&RawValue::from("○"), Some("ランクAA")), Some(RankBand::AA));
/// ```
pub fn decode_rank(raw: &RawValue, hint: Option<&str>) -> Option<RankBand> {
    let text = raw.as_raw_string();
    if text.contains(UNRATED_MARKER) || normalize(&text).contains(UNRATED_MARKER) {
        return None;
    }

    let direct = match raw {
        RawValue::Empty => None,
        RawValue::Number(n) => band_from_number(*n),
        RawValue::Text(s) => find_band_label(s).or_else(|| {
            let normalized = normalize(s);
            NUMBER_RE
                .find(&normalized)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .and_then(band_from_number)
        }),
    };

    direct.or_else(|| {
        let band = find_band_label(hint?)?;
        is_truthy_marker(&text).then_some(band)
    })
}

/// スコアからランクを決めるしきい値
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankThresholds {
    /// AAAの下限
    pub aaa: f64,
    /// AAの下限
    pub aa: f64,
    /// Aの下限
    pub a: f64,
}

impl Default for RankThresholds {
    fn default() -> Self {
        Self {
            aaa: 90.0,
            aa: 80.0,
            a: 70.0,
        }
    }
}

impl RankThresholds {
    /// しきい値が降順（AAA ≥ AA ≥ A）かつ有限であることを検証
    pub fn validate(&self) -> Result<(), ScoreSheetError> {
        let all_finite = [self.aaa, self.aa, self.a].iter().all(|t| t.is_finite());
        if !all_finite || self.aaa < self.aa || self.aa < self.a {
            return Err(ScoreSheetError::Config(format!(
                "Rank thresholds must be finite and descending (AAA {} >= AA {} >= A {})",
                self.aaa, self.aa, self.a
            )));
        }
        Ok(())
    }
}

/// スコアをしきい値で帯分けする（評価ラベルがない場合の補完用）
pub fn band_for_score(score: f64, thresholds: &RankThresholds) -> RankBand {
    if score >= thresholds.aaa {
        RankBand::AAA
    } else if score >= thresholds.aa {
        RankBand::AA
    } else if score >= thresholds.a {
        RankBand::A
    } else {
        RankBand::B
    }
}
