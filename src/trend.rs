//! Trend/Comparison Sanitizer Module
//!
//! 前回比の矢印・数値を`TrendCode`に変換し、比較ブロックを
//! 「元のキー」と「埋め込まれたチェックリストコード」の両方で引けるように整えるモジュール。

use crate::field_map::FieldMap;
use crate::normalize::normalize;
use crate::types::{ChecklistCode, RawValue, TrendCode};

const UP_GLYPHS: &[&str] = &["↑", "⬆", "↗", "⇧", "up", "上昇"];
const FLAT_GLYPHS: &[&str] = &["→", "➡", "⇒", "flat", "横ばい", "維持"];
const DOWN_GLYPHS: &[&str] = &["↓", "⬇", "↘", "⇩", "down", "下降"];

/// 生の値をトレンドコードに変換する
///
/// 矢印（↑→↓）と1〜3の数字を受け付けます。3を超える数値は3（↓）に丸め、
/// `0`・空・その他の値は`None`（トレンドなし）になります。
///
/// # 使用例
///
/// ```rust
/// use scoresheet::{decode_trend, RawValue, TrendCode};
///
/// assert_eq!(decode_trend(&RawValue::from("↑")), Some(TrendCode::Up));
/// assert_eq!(decode_trend(&RawValue::from("２")), Some(TrendCode::Flat));
/// assert_eq!(decode_trend(&RawValue::from("0")), None);
/// ```
pub fn decode_trend(raw: &RawValue) -> Option<TrendCode> {
    match raw {
        RawValue::Empty => None,
        RawValue::Number(n) if n.is_finite() => TrendCode::clamped(n.floor() as i64),
        RawValue::Number(_) => None,
        RawValue::Text(text) => decode_trend_str(text),
    }
}

/// 文字列をトレンドコードに変換する
pub fn decode_trend_str(text: &str) -> Option<TrendCode> {
    let value = normalize(text).to_lowercase();
    if value.is_empty() {
        return None;
    }
    if let Ok(n) = value.parse::<i64>() {
        return TrendCode::clamped(n);
    }
    if UP_GLYPHS.iter().any(|g| value.contains(g)) {
        Some(TrendCode::Up)
    } else if DOWN_GLYPHS.iter().any(|g| value.contains(g)) {
        Some(TrendCode::Down)
    } else if FLAT_GLYPHS.iter().any(|g| value.contains(g)) {
        Some(TrendCode::Flat)
    } else {
        None
    }
}

/// 比較ブロックを整える
///
/// 各値を`"1"`/`"2"`/`"3"`（判定できない場合は空文字列）に置き換え、
/// キーにチェックリストコードが埋め込まれていれば、そのコード（`"19-3"`）でも書き込みます。
/// 入力のキー順は保たれ、コードキーは末尾に追加されます。
pub fn sanitize_trend_block(block: &FieldMap) -> FieldMap {
    let mut out = FieldMap::new();
    let mut code_entries: Vec<(String, String)> = Vec::new();

    for (key, value) in block.entries() {
        let code = decode_trend_str(value)
            .map(|t| t.code().to_string())
            .unwrap_or_default();
        if let Some(checklist) = ChecklistCode::find_in(&normalize(key)) {
            let code_key = checklist.to_string();
            if code_key != key {
                code_entries.push((code_key, code.clone()));
            }
        }
        out.put(key, code);
    }

    for (code_key, code) in code_entries {
        if out.raw_get(&code_key).is_none() {
            out.put(&code_key, code);
        }
    }
    out
}
