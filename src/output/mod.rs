//! Output Format Module
//!
//! 取り込み結果のプレビュー出力を、フォーマットごとのenumで切り替えるモジュール。

mod formatters;

use std::io::Write;

use crate::api::OutputFormat;
use crate::error::ScoreSheetError;
use crate::store::Document;

pub use formatters::*;

/// 出力フォーマッター（Strategy Pattern）
///
/// 各出力フォーマット（Markdown, JSON）をenumとして表現します。
#[derive(Debug, Clone, Copy)]
pub enum OutputFormatter {
    Markdown,
    Json,
}

impl OutputFormatter {
    /// 出力フォーマットからフォーマッターを生成
    pub fn from_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Markdown => OutputFormatter::Markdown,
            OutputFormat::Json => OutputFormatter::Json,
        }
    }

    /// ドキュメントを指定されたフォーマットで出力する
    ///
    /// # 引数
    ///
    /// * `documents` - 出力するドキュメント
    /// * `writer` - 出力先のライター
    ///
    /// # 戻り値
    ///
    /// * `Ok(())` - 出力に成功した場合
    /// * `Err(ScoreSheetError)` - 書き込みに失敗した場合
    pub fn render<W: Write>(
        &self,
        documents: &[Document],
        writer: &mut W,
    ) -> Result<(), ScoreSheetError> {
        match self {
            OutputFormatter::Markdown => MarkdownFormatter.render(documents, writer),
            OutputFormatter::Json => JsonFormatter.render(documents, writer),
        }
    }
}
