//! Delimited Text Reader
//!
//! CSV / TSV テキストを`RowMatrix`に読み込む。
//! 引用符で囲まれたフィールド（区切り文字・改行・`""`エスケープを含む）に対応し、
//! 文字コードはUTF-8（BOM付き可）を優先、読めなければShift_JISとして解釈します。

use std::borrow::Cow;

use csv::{ReaderBuilder, StringRecord};
use encoding_rs::SHIFT_JIS;
use tracing::{debug, trace};

use crate::error::ScoreSheetError;
use crate::types::RowMatrix;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// バイト列をテキストにデコードする
///
/// UTF-8として正しければそのまま（先頭のBOMは除去）、そうでなければShift_JISで
/// デコードします。
pub(crate) fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (decoded, _, had_errors) = SHIFT_JIS.decode(bytes);
            if had_errors {
                debug!("input contained bytes not valid in Shift_JIS");
            }
            decoded
        }
    }
}

/// 先頭行から区切り文字を推定する（タブがカンマより多ければタブ）
pub(crate) fn sniff_delimiter(text: &str) -> u8 {
    let mut in_quotes = false;
    let (mut tabs, mut commas) = (0usize, 0usize);
    for ch in text.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\n' if !in_quotes => break,
            '\t' if !in_quotes => tabs += 1,
            ',' if !in_quotes => commas += 1,
            _ => {}
        }
    }
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

/// 区切り文字テキストのリーダー
#[derive(Debug, Clone, Copy)]
pub(crate) struct DelimitedReader {
    delimiter: u8,
}

impl DelimitedReader {
    /// 区切り文字を指定してリーダーを生成
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// テキストの先頭行から区切り文字を推定してリーダーを生成
    pub fn sniff(text: &str) -> Self {
        Self::new(sniff_delimiter(text))
    }

    /// バイト列を読み込む
    pub fn read_bytes(bytes: &[u8]) -> Result<RowMatrix, ScoreSheetError> {
        let text = decode_text(bytes);
        Self::sniff(&text).parse(&text)
    }

    /// テキストを行列に分解する
    ///
    /// ヘッダー行も含めてすべての行をそのまま読み込みます（列数は行ごとに異なってよい）。
    ///
    /// # 戻り値
    ///
    /// * `Ok(RowMatrix)` - 読み込みに成功した場合（末尾の空行は含まない）
    /// * `Err(ScoreSheetError::MalformedInput)` - 引用符が閉じられていない場合（行番号は1始まり）
    pub fn parse(&self, text: &str) -> Result<RowMatrix, ScoreSheetError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(text.as_bytes());

        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut last_start: Option<(usize, usize)> = None;
        let mut record = StringRecord::new();
        loop {
            match reader.read_record(&mut record) {
                Ok(true) => {
                    if let Some(position) = record.position() {
                        last_start = Some((position.line() as usize, position.byte() as usize));
                    }
                    rows.push(record.iter().map(str::to_string).collect());
                }
                Ok(false) => break,
                Err(e) => return Err(malformed(&e)),
            }
        }

        // 閉じられていない引用符は、最後のレコードがファイル末尾まで続く形で現れる
        if let Some((line, byte)) = last_start {
            if let Some(offset) = open_quote_line(text.get(byte..).unwrap_or(""), self.delimiter) {
                return Err(ScoreSheetError::MalformedInput {
                    row: line + offset,
                    message: "Unterminated quoted field".to_string(),
                });
            }
        }

        trace!(rows = rows.len(), delimiter = %char::from(self.delimiter), "parsed delimited text");
        Ok(RowMatrix::new(rows))
    }
}

/// csvクレートのエラーを`MalformedInput`に変換する
fn malformed(error: &csv::Error) -> ScoreSheetError {
    ScoreSheetError::MalformedInput {
        row: error.position().map(|p| p.line() as usize).unwrap_or(0),
        message: error.to_string(),
    }
}

/// 最後のレコードの生テキストで、閉じられていない引用符が開いた行（レコード先頭からの差分）
fn open_quote_line(raw: &str, delimiter: u8) -> Option<usize> {
    let (mut in_quotes, mut just_closed, mut field_start) = (false, false, true);
    let (mut newlines, mut opened_at) = (0usize, 0usize);
    for byte in raw.bytes() {
        let escaped = just_closed && byte == b'"';
        just_closed = false;
        match byte {
            b'"' if in_quotes => {
                in_quotes = false;
                just_closed = true;
            }
            b'"' if escaped => in_quotes = true,
            b'"' if field_start => {
                in_quotes = true;
                opened_at = newlines;
            }
            b'\n' => newlines += 1,
            _ => {}
        }
        field_start = !in_quotes && (byte == b'\n' || byte == delimiter);
    }
    in_quotes.then_some(opened_at)
}
