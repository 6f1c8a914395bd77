//! Column Indexer Module
//!
//! スプレッドシートの列ラベル（"A", "AG", "BF", "AAA"）と0始まりの列インデックスを
//! 相互変換するモジュール。

use crate::error::ScoreSheetError;

/// 列ラベルを0始まりの列インデックスに変換する
///
/// 'A'=1〜'Z'=26 の26進数として解釈し、1を引いて0始まりにします
/// （"A"→0, "Z"→25, "AA"→26）。桁数の上限はありません。
/// 全角英字・小文字は半角大文字として受け付けます。
///
/// # 戻り値
///
/// * `Ok(usize)` - 列インデックス
/// * `Err(ScoreSheetError::InvalidColumnLabel)` - 空文字列、または英字以外を含む場合
///
/// # 使用例
///
/// ```rust
/// use scoresheet::letter_to_index;
///
/// assert_eq!(letter_to_index("A").unwrap(), 0);
/// assert_eq!(letter_to_index("AA").unwrap(), 26);
/// assert_eq!(letter_to_index("DG").unwrap(), 110);
/// ```
pub fn letter_to_index(letters: &str) -> Result<usize, ScoreSheetError> {
    let label = crate::normalize::to_half_width(letters.trim()).to_ascii_uppercase();
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ScoreSheetError::InvalidColumnLabel(letters.to_string()));
    }

    let mut value: usize = 0;
    for ch in label.bytes() {
        let digit = (ch - b'A' + 1) as usize;
        value = value
            .checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| ScoreSheetError::InvalidColumnLabel(letters.to_string()))?;
    }

    Ok(value - 1)
}

/// 列インデックスを列ラベルに変換する（0 -> "A", 25 -> "Z", 26 -> "AA"）
///
/// [`letter_to_index`]の逆変換です。
pub fn index_to_letter(mut col: usize) -> String {
    let mut result = String::new();
    loop {
        let remainder = col % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    result
}
