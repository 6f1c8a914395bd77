//! Output Formatters Implementation
//!
//! 各出力フォーマットの実装を提供するモジュール。

use std::io::Write;

use unicode_width::UnicodeWidthStr;

use crate::error::ScoreSheetError;
use crate::store::Document;

/// テーブルの見出し
const KEY_HEADER: &str = "キー";
const VALUE_HEADER: &str = "値";

/// Markdown形式のフォーマッター
///
/// ドキュメントごとに見出しとキー・値の2列テーブルを出力します。
/// 列幅は表示幅（全角文字は2）で揃えます。
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    pub fn render<W: Write>(
        &self,
        documents: &[Document],
        writer: &mut W,
    ) -> Result<(), ScoreSheetError> {
        for (idx, document) in documents.iter().enumerate() {
            if idx > 0 {
                writeln!(writer)?;
            }
            match &document.record_key {
                Some(record) => writeln!(
                    writer,
                    "## {} / {} ({})",
                    document.customer_key,
                    document.section_key(),
                    record
                )?,
                None => writeln!(
                    writer,
                    "## {} / {}",
                    document.customer_key,
                    document.section_key()
                )?,
            }
            writeln!(writer)?;

            let rows: Vec<(String, String)> = document
                .payload
                .entries()
                .map(|(k, v)| (escape_cell(k), escape_cell(v)))
                .collect();
            render_table(&rows, writer)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// キー・値テーブルを出力（内部ヘルパー）
fn render_table<W: Write>(rows: &[(String, String)], writer: &mut W) -> Result<(), ScoreSheetError> {
    // 最小幅は3文字（区切り行の最小幅）
    let key_width = rows
        .iter()
        .map(|(k, _)| k.width())
        .chain([KEY_HEADER.width(), 3])
        .max()
        .unwrap_or(3);
    let value_width = rows
        .iter()
        .map(|(_, v)| v.width())
        .chain([VALUE_HEADER.width(), 3])
        .max()
        .unwrap_or(3);

    write_row(writer, KEY_HEADER, key_width, VALUE_HEADER, value_width)?;
    writeln!(
        writer,
        "|{}|{}|",
        "-".repeat(key_width + 2),
        "-".repeat(value_width + 2)
    )?;
    for (key, value) in rows {
        write_row(writer, key, key_width, value, value_width)?;
    }
    Ok(())
}

fn write_row<W: Write>(
    writer: &mut W,
    key: &str,
    key_width: usize,
    value: &str,
    value_width: usize,
) -> Result<(), ScoreSheetError> {
    writeln!(
        writer,
        "| {}{} | {}{} |",
        key,
        " ".repeat(key_width.saturating_sub(key.width())),
        value,
        " ".repeat(value_width.saturating_sub(value.width()))
    )?;
    Ok(())
}

/// テーブルのセル用にエスケープ（`|`と改行）
fn escape_cell(s: &str) -> String {
    s.trim()
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

/// JSON形式のフォーマッター
///
/// ドキュメントの配列を整形して出力します。
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn render<W: Write>(
        &self,
        documents: &[Document],
        writer: &mut W,
    ) -> Result<(), ScoreSheetError> {
        serde_json::to_writer_pretty(&mut *writer, documents)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Subtype;

    fn documents() -> Vec<Document> {
        vec![
            Document::new(
                "1001",
                Some("1001-20240501".to_string()),
                "score",
                Subtype::Current,
                vec![("総合得点", "85"), ("時間", "5分30秒")]
                    .into_iter()
                    .collect(),
            ),
            Document::new(
                "1001",
                None,
                "comment",
                Subtype::Current,
                vec![("所見", "a|b\nc")].into_iter().collect(),
            ),
        ]
    }

    fn render_markdown(documents: &[Document]) -> String {
        let mut output = Vec::new();
        MarkdownFormatter.render(documents, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_markdown_headings_and_alignment() {
        let output = render_markdown(&documents());
        assert!(output.contains("## 1001 / score.current (1001-20240501)"));
        assert!(output.contains("## 1001 / comment.current\n"));
        assert!(output.contains("| キー     | 値      |"));
        assert!(output.contains("| 総合得点 | 85      |"));
        assert!(output.contains("| 時間     | 5分30秒 |"));
    }

    #[test]
    fn test_markdown_escapes_cells() {
        let output = render_markdown(&documents());
        assert!(output.contains("a\\|b<br>c"));
    }

    #[test]
    fn test_markdown_empty_documents() {
        assert_eq!(render_markdown(&[]), "");
    }

    #[test]
    fn test_json_output() {
        let mut output = Vec::new();
        JsonFormatter.render(&documents(), &mut output).unwrap();
        let parsed: Vec<Document> = serde_json::from_slice(&output).unwrap();
        assert_eq!(parsed, documents());
    }
}
