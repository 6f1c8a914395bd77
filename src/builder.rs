//! Builder Module
//!
//! Fluent Builder APIを提供し、`Importer`インスタンスを段階的に構築する。

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{InputFormat, MergeRule, OutputFormat, SheetSelector, Subtype};
use crate::config::{ChecklistMaster, CustomerColumns, SectionSpec, SectionTable};
use crate::error::ScoreSheetError;
use crate::field_map::FieldMap;
use crate::header::{HeaderStack, DEFAULT_HEADER_DEPTH};
use crate::lookup::{AliasTable, LookupEngine};
use crate::output::OutputFormatter;
use crate::range::{extract_columns, extract_span, extract_verbatim};
use crate::rank::RankThresholds;
use crate::reader::DocumentReader;
use crate::record::{
    derive_assessment, derive_customer, AssessmentRecord, AssessmentSources, CustomerRecord,
};
use crate::security::{read_limited, DEFAULT_MAX_INPUT_SIZE};
use crate::span::{detect_spans, GroupKeywords};
use crate::store::{Document, RecordStore};
use crate::trend::sanitize_trend_block;
use crate::types::{ColumnSpan, RowMatrix};

/// プロフィールのセクション名
const PROFILE_SECTION: &str = "profile";
/// 検出スパンを保存するときのセクション名の接頭辞
const SPAN_SECTION_PREFIX: &str = "span.";

/// 取り込み処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct IngestConfig {
    /// セクション表
    pub sections: SectionTable,

    /// グループ行の判定キーワード
    pub group_keywords: GroupKeywords,

    /// あいまい検索の別名テーブル
    pub aliases: AliasTable,

    /// ランクのしきい値
    pub thresholds: RankThresholds,

    /// ヘッダー段数を判定できない場合のフォールバック
    pub header_fallback: usize,

    /// 顧客情報の固定列
    pub customer_columns: CustomerColumns,

    /// 日付が読めない場合に使う基準日（Noneの場合は構築時の当日）
    pub reference_date: Option<NaiveDate>,

    /// シート選択方式
    pub sheet_selector: SheetSelector,

    /// 入力形式
    pub input_format: InputFormat,

    /// 入力ファイルの最大サイズ（バイト）
    pub max_input_size: u64,

    /// チェック項目マスター
    pub checklist: ChecklistMaster,

    /// 検出したスパンのブロックも保存するか
    pub persist_span_blocks: bool,

    /// プレビュー出力のフォーマット
    pub output_format: OutputFormat,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sections: SectionTable::default(),
            group_keywords: GroupKeywords::default(),
            aliases: AliasTable::default(),
            thresholds: RankThresholds::default(),
            header_fallback: DEFAULT_HEADER_DEPTH,
            customer_columns: CustomerColumns::default(),
            reference_date: None,
            sheet_selector: SheetSelector::default(),
            input_format: InputFormat::Auto,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            checklist: ChecklistMaster::default(),
            persist_span_blocks: false,
            output_format: OutputFormat::Markdown,
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Importer`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust
/// use scoresheet::{IngestBuilder, SheetSelector};
///
/// # fn main() -> Result<(), scoresheet::ScoreSheetError> {
/// let importer = IngestBuilder::new()
///     .with_sheet_selector(SheetSelector::Name("評価一覧".to_string()))
///     .with_header_fallback(3)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct IngestBuilder {
    /// 内部設定（構築中）
    config: IngestConfig,
}

impl IngestBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - セクション表: 既定の30セクション（`SectionTable::default()`）
    /// - ヘッダー段数のフォールバック: 14
    /// - 固定列: A（ID）, B（氏名）, C（発行者）, D（状態）
    /// - 入力形式: 自動判定、シートは先頭
    /// - 入力サイズ上限: 256 MiB
    pub fn new() -> Self {
        Self::default()
    }

    /// セクション表を指定する
    pub fn with_section_table(mut self, sections: SectionTable) -> Self {
        self.config.sections = sections;
        self
    }

    /// グループ行の判定キーワードを指定する
    pub fn with_group_keywords(mut self, keywords: GroupKeywords) -> Self {
        self.config.group_keywords = keywords;
        self
    }

    /// あいまい検索の別名テーブルを指定する
    pub fn with_alias_table(mut self, aliases: AliasTable) -> Self {
        self.config.aliases = aliases;
        self
    }

    /// ランクのしきい値を指定する
    ///
    /// # 制約
    ///
    /// * 有限かつ AAA ≥ AA ≥ A でなければならない
    /// * 制約違反の場合、`build()`時に`ScoreSheetError::Config`を返す
    pub fn with_rank_thresholds(mut self, thresholds: RankThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    /// ヘッダー段数を判定できない場合のフォールバックを指定する（1以上）
    pub fn with_header_fallback(mut self, depth: usize) -> Self {
        self.config.header_fallback = depth;
        self
    }

    /// 顧客情報の固定列を指定する
    pub fn with_customer_columns(mut self, columns: CustomerColumns) -> Self {
        self.config.customer_columns = columns;
        self
    }

    /// 日付が読めない場合に使う基準日を指定する
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.config.reference_date = Some(date);
        self
    }

    /// 取り込み対象のシートを選択する（ワークブック入力のみ）
    pub fn with_sheet_selector(mut self, selector: SheetSelector) -> Self {
        self.config.sheet_selector = selector;
        self
    }

    /// 入力形式を指定する
    pub fn with_input_format(mut self, format: InputFormat) -> Self {
        self.config.input_format = format;
        self
    }

    /// 入力ファイルの最大サイズ（バイト）を指定する
    pub fn with_max_input_size(mut self, bytes: u64) -> Self {
        self.config.max_input_size = bytes;
        self
    }

    /// チェック項目マスターを指定する
    pub fn with_checklist_master(mut self, master: ChecklistMaster) -> Self {
        self.config.checklist = master;
        self
    }

    /// プレビュー出力のフォーマットを指定する
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// 見出しから検出したスパンのブロックも保存するかを指定する
    ///
    /// 有効にすると、各スパンが`span.<キー>`セクション（サブタイプ`raw`）として保存されます。
    pub fn persist_span_blocks(mut self, persist: bool) -> Self {
        self.config.persist_span_blocks = persist;
        self
    }

    /// 設定を検証し、`Importer`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Importer)`: 設定が有効な場合
    /// * `Err(ScoreSheetError::Config)`: 設定が無効な場合
    /// * `Err(ScoreSheetError::InvalidColumnLabel)`: 列ラベルが不正な場合
    ///
    /// # 発生し得るエラー
    ///
    /// * セクションの開始列が終了列より後ろ、範囲の重なり、キーの重複
    /// * しきい値が降順でない
    /// * チェックリストコードの重複
    /// * ヘッダー段数のフォールバック、または入力サイズ上限が0
    pub fn build(self) -> Result<Importer, ScoreSheetError> {
        let config = self.config;

        // 1. セクション表の検証
        config.sections.validate()?;

        // 2. 固定列の検証
        let customer_columns = config.customer_columns.indices()?;

        // 3. しきい値・マスターの検証
        config.thresholds.validate()?;
        config.checklist.validate()?;

        // 4. 数値設定の検証
        if config.header_fallback == 0 {
            return Err(ScoreSheetError::Config(
                "Header fallback depth must be at least 1".to_string(),
            ));
        }
        if config.max_input_size == 0 {
            return Err(ScoreSheetError::Config(
                "Maximum input size must be greater than 0".to_string(),
            ));
        }

        // 5. セクションの列範囲を解決
        let sections = config
            .sections
            .sections()
            .iter()
            .map(|spec| {
                let (start, end) = spec.columns()?;
                Ok(ResolvedSection {
                    spec: spec.clone(),
                    start,
                    end,
                })
            })
            .collect::<Result<Vec<_>, ScoreSheetError>>()?;

        Ok(Importer::new(config, sections, customer_columns))
    }
}

/// 列範囲を解決済みのセクション
#[derive(Debug, Clone)]
struct ResolvedSection {
    spec: SectionSpec,
    start: usize,
    end: usize,
}

/// 1データ行から構築した結果
#[derive(Debug, Clone, PartialEq)]
pub struct RowDocuments {
    /// 行番号（1始まり）
    pub row: usize,
    /// 顧客レコード
    pub customer: CustomerRecord,
    /// 評価レコード
    pub assessment: AssessmentRecord,
    /// セクションごとのドキュメント（セクション表の順）
    pub documents: Vec<Document>,
}

/// 取り込み結果の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// 処理したデータ行
    pub rows_processed: usize,
    /// 顧客キーが空でスキップした行
    pub rows_skipped: usize,
    /// 書き込んだドキュメント数
    pub documents_written: usize,
    /// 書き込んだ顧客・評価レコード数
    pub records_written: usize,
    /// 書き込みに失敗した件数（レコード・ドキュメント）
    pub failed_writes: usize,
}

impl ImportSummary {
    /// 利用者向けの結果メッセージ
    ///
    /// レコードもドキュメントも1件も書き込めなかった場合は単一の失敗メッセージ、
    /// それ以外は件数を返します。
    pub fn message(&self) -> String {
        if self.failed_writes > 0 && self.documents_written == 0 && self.records_written == 0 {
            return format!(
                "Import failed: nothing could be written ({} failed writes)",
                self.failed_writes
            );
        }
        let mut message = format!(
            "Imported {} documents from {} rows",
            self.documents_written, self.rows_processed
        );
        if self.rows_skipped > 0 {
            message.push_str(&format!(", skipped {} rows", self.rows_skipped));
        }
        if self.failed_writes > 0 {
            message.push_str(&format!(", {} writes failed", self.failed_writes));
        }
        message
    }
}

/// 取り込み処理のファサード
///
/// 横長の評価シートを読み込み、セクションごとのドキュメントと
/// 顧客・評価レコードに変換してレコードストアへ書き込みます。
///
/// # 使用例
///
/// ```rust
/// use scoresheet::{IngestBuilder, MemoryStore, RowMatrix, SectionSpec, SectionTable, Subtype};
///
/// # fn main() -> Result<(), scoresheet::ScoreSheetError> {
/// let importer = IngestBuilder::new()
///     .with_section_table(SectionTable::new(vec![
///         SectionSpec::new("score", Subtype::Current, "E", "F"),
///     ]))
///     .build()?;
///
/// let matrix = RowMatrix::from_rows(vec![
///     vec!["ID", "氏名", "発行者", "状態", "総合得点", "総合評価"],
///     vec!["1001", "山田", "本部", "在籍", "85", "AA"],
/// ]);
/// let mut store = MemoryStore::new();
/// let summary = importer.import_matrix(&matrix, &mut store)?;
/// assert_eq!(summary.documents_written, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Importer {
    /// 取り込み設定
    config: IngestConfig,

    /// 列範囲を解決済みのセクション
    sections: Vec<ResolvedSection>,

    /// 固定列（id, name, issuer, status）
    customer_columns: [usize; 4],

    /// あいまい検索エンジン
    engine: LookupEngine,

    /// 基準日
    reference_date: NaiveDate,
}

impl Importer {
    fn new(config: IngestConfig, sections: Vec<ResolvedSection>, customer_columns: [usize; 4]) -> Self {
        let reference_date = config
            .reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        Self {
            engine: LookupEngine::new(config.aliases.clone()),
            config,
            sections,
            customer_columns,
            reference_date,
        }
    }

    /// あいまい検索エンジン
    pub fn engine(&self) -> &LookupEngine {
        &self.engine
    }

    /// 基準日
    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    /// 入力を読み込んで行列にする（サイズ上限を適用）
    pub fn read_matrix<R: Read>(&self, input: R) -> Result<RowMatrix, ScoreSheetError> {
        let bytes = read_limited(input, self.config.max_input_size)?;
        crate::parser::read_matrix(bytes, self.config.input_format, &self.config.sheet_selector)
    }

    /// 入力を取り込み、レコードストアへ書き込む
    ///
    /// # 引数
    ///
    /// * `input` - 入力ファイルのリーダー（xlsx / xls / ods / CSV / TSV）
    /// * `store` - 書き込み先のレコードストア
    ///
    /// # 戻り値
    ///
    /// * `Ok(ImportSummary)` - 取り込みが完了した場合（個々の書き込み失敗は集計に含まれる）
    /// * `Err(ScoreSheetError)` - 入力を読めない、またはヘッダーを解析できない場合
    pub fn import<R: Read, S: RecordStore + ?Sized>(
        &self,
        input: R,
        store: &mut S,
    ) -> Result<ImportSummary, ScoreSheetError> {
        let matrix = self.read_matrix(input)?;
        self.import_matrix(&matrix, store)
    }

    /// ファイルパスを指定して取り込む
    pub fn import_path<S: RecordStore + ?Sized>(
        &self,
        path: impl AsRef<Path>,
        store: &mut S,
    ) -> Result<ImportSummary, ScoreSheetError> {
        let path = path.as_ref();
        info!(path = %path.display(), "importing file");
        let file = BufReader::new(File::open(path)?);
        self.import(file, store)
    }

    /// 読み込み済みの行列を取り込む
    ///
    /// ドキュメントの構築は行ごとに並列に行い、書き込みは行の順に1件ずつ行います。
    /// 書き込みに失敗したレコード・セクションはログに記録してスキップし、
    /// 同じ行の残りのセクションは引き続き書き込みます。
    pub fn import_matrix<S: RecordStore + ?Sized>(
        &self,
        matrix: &RowMatrix,
        store: &mut S,
    ) -> Result<ImportSummary, ScoreSheetError> {
        let (rows, skipped) = self.build_documents(matrix)?;

        let mut summary = ImportSummary {
            rows_processed: rows.len(),
            rows_skipped: skipped,
            ..ImportSummary::default()
        };

        for row in &rows {
            match store.put_customer(&row.customer) {
                Ok(()) => summary.records_written += 1,
                Err(e) => {
                    warn!(row = row.row, customer = %row.customer.customer_key, error = %e, "failed to write customer");
                    summary.failed_writes += 1;
                }
            }
            match store.put_assessment(&row.assessment) {
                Ok(()) => summary.records_written += 1,
                Err(e) => {
                    warn!(row = row.row, record = %row.assessment.record_key, error = %e, "failed to write assessment");
                    summary.failed_writes += 1;
                }
            }
            for document in &row.documents {
                match store.put_document(document) {
                    Ok(()) => summary.documents_written += 1,
                    Err(e) => {
                        warn!(
                            row = row.row,
                            section = %document.section_key(),
                            error = %e,
                            "failed to write section"
                        );
                        summary.failed_writes += 1;
                    }
                }
            }
        }

        info!(
            rows = summary.rows_processed,
            skipped = summary.rows_skipped,
            documents = summary.documents_written,
            records = summary.records_written,
            failed = summary.failed_writes,
            "import finished"
        );
        Ok(summary)
    }

    /// 行列のすべてのデータ行からドキュメントを構築する（書き込みは行わない）
    ///
    /// # 戻り値
    ///
    /// 構築した行（行番号順）と、顧客キーが空でスキップした行数
    pub fn build_documents(
        &self,
        matrix: &RowMatrix,
    ) -> Result<(Vec<RowDocuments>, usize), ScoreSheetError> {
        // 1. ヘッダー解析（ファイルごとに1回）
        let stack = HeaderStack::resolve_with_fallback(matrix, self.config.header_fallback)?;
        let spans = if self.config.persist_span_blocks {
            detect_spans(&stack, &self.config.group_keywords)
        } else {
            Vec::new()
        };
        debug!(
            depth = stack.depth(),
            columns = stack.column_count(),
            spans = spans.len(),
            "resolved header stack"
        );

        // 2. 各データ行の処理を並列化
        let data_rows: Vec<usize> = (stack.depth()..matrix.row_count()).collect();
        let mut built: Vec<(usize, Option<RowDocuments>)> = data_rows
            .par_iter()
            .map(|&row_idx| (row_idx, self.build_row(&stack, &spans, row_idx, matrix.row(row_idx))))
            .collect();

        // 3. 結果を行番号順にソート（並列処理の順序を保証）
        built.sort_by_key(|(idx, _)| *idx);

        let total = built.len();
        let rows: Vec<RowDocuments> = built.into_iter().filter_map(|(_, row)| row).collect();
        let skipped = total - rows.len();
        Ok((rows, skipped))
    }

    /// 1データ行からドキュメントとレコードを構築する
    ///
    /// 顧客キーが空の行は`None`を返します。
    fn build_row(
        &self,
        stack: &HeaderStack,
        spans: &[ColumnSpan],
        row_idx: usize,
        row: &[String],
    ) -> Option<RowDocuments> {
        let cell = |col: usize| row.get(col).map(String::as_str).unwrap_or("");
        let [id, name, issuer, status] = self.customer_columns;
        if cell(id).trim().is_empty() {
            debug!(row = row_idx + 1, "skipping row without customer key");
            return None;
        }

        // 1. セクションごとに抽出
        let blocks: Vec<(&SectionSpec, FieldMap)> = self
            .sections
            .iter()
            .map(|section| (&section.spec, self.extract_section(stack, row, section)))
            .collect();
        let block = |name: &str, subtype: Subtype| {
            blocks
                .iter()
                .find(|(spec, _)| spec.name == name && spec.subtype == subtype)
                .map(|(_, block)| block)
        };

        // 2. レコードの導出
        let profile = blocks
            .iter()
            .find(|(spec, _)| spec.name == PROFILE_SECTION)
            .map(|(_, block)| block);
        let customer = derive_customer(
            [cell(id), cell(name), cell(issuer), cell(status)],
            profile,
            &self.engine,
            self.reference_date,
        );
        let sources = AssessmentSources {
            score: block("score", Subtype::Current),
            care_score: block("care_score", Subtype::Current),
            onecolor_score: block("onecolor_score", Subtype::Current),
            time: block("time", Subtype::Current),
            rating: block("rating", Subtype::Current),
        };
        let assessment = derive_assessment(&customer, &sources, &self.engine, &self.config.thresholds);

        // 3. ドキュメントの構築（空のブロックは比較セクション以外省略）
        let record_key = Some(assessment.record_key.clone());
        let mut documents = Vec::with_capacity(blocks.len() + spans.len());
        for (spec, payload) in blocks {
            if payload.is_blank() && !spec.keep_empty {
                debug!(row = row_idx + 1, section = %spec.key(), "omitting empty section");
                continue;
            }
            documents.push(Document::new(
                customer.customer_key.clone(),
                record_key.clone(),
                spec.name.clone(),
                spec.subtype,
                payload,
            ));
        }
        for span in spans {
            let payload = extract_span(stack, row, span, false);
            if payload.is_blank() {
                continue;
            }
            documents.push(Document::new(
                customer.customer_key.clone(),
                record_key.clone(),
                format!("{}{}", SPAN_SECTION_PREFIX, span.key),
                Subtype::Raw,
                payload,
            ));
        }

        Some(RowDocuments {
            row: row_idx + 1,
            customer,
            assessment,
            documents,
        })
    }

    /// セクションの書き込み規則に従って抽出する
    fn extract_section(&self, stack: &HeaderStack, row: &[String], section: &ResolvedSection) -> FieldMap {
        let ResolvedSection { spec, start, end } = section;
        match spec.rule {
            MergeRule::Verbatim => extract_verbatim(stack, row, *start, *end),
            MergeRule::Trend => {
                sanitize_trend_block(&extract_columns(stack, row, *start, *end, spec.keep_empty))
            }
            _ => extract_columns(stack, row, *start, *end, spec.keep_empty),
        }
    }

    /// 保存済みドキュメントを読むリーダーを生成する
    pub fn reader<'a>(&'a self, documents: &'a [Document]) -> DocumentReader<'a> {
        DocumentReader::new(documents, &self.engine, &self.config.checklist)
    }

    /// ドキュメントを設定された形式で出力する（確認用）
    pub fn render_preview<W: Write>(
        &self,
        documents: &[Document],
        writer: W,
    ) -> Result<(), ScoreSheetError> {
        let mut writer = std::io::BufWriter::new(writer);
        OutputFormatter::from_format(self.config.output_format).render(documents, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// ドキュメントを設定された形式の文字列にする
    pub fn render_preview_to_string(&self, documents: &[Document]) -> Result<String, ScoreSheetError> {
        let mut buffer = Vec::new();
        self.render_preview(documents, &mut buffer)?;

        let result = String::from_utf8(buffer).map_err(|e| {
            ScoreSheetError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        Ok(result)
    }
}
