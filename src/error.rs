//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// scoresheetクレート全体で使用するエラー型
///
/// 取り込み処理（ファイル読み込み、ヘッダー解析、範囲抽出、永続化）で発生する
/// 致命的なエラーを統一的に扱います。
///
/// # エラーの種類
///
/// - `Io`: I/O操作中に発生したエラー
/// - `Parse`: ワークブックの解析中に発生したエラー（calamine由来）
/// - `Json`: JSONのシリアライズ・デシリアライズエラー
/// - `MalformedInput`: 入力そのものが取り込み不能（行数不足、区切り文字の破損など）
/// - `InvalidColumnLabel`: 列ラベル（"AG"など）として解釈できない文字列
/// - `Config`: 設定の検証に失敗したエラー
/// - `Persistence`: レコードストアへの書き込み失敗
///
/// フィールド単位の欠落（値が見つからない）はエラーではなく、
/// 単に「値なし」として扱われます。
///
/// # 使用例
///
/// ```rust
/// use scoresheet::{letter_to_index, ScoreSheetError};
///
/// match letter_to_index("A1") {
///     Err(ScoreSheetError::InvalidColumnLabel(label)) => assert_eq!(label, "A1"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum ScoreSheetError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ワークブックの解析中に発生したエラー
    ///
    /// calamineクレートがファイルを解析する際に発生したエラーです。
    #[error("Failed to parse workbook: {0}")]
    Parse(#[from] calamine::Error),

    /// JSONの変換エラー
    ///
    /// セクション表の読み込みや、JSONストアの読み書きで発生します。
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 入力が取り込み不能な形式であることを示す致命的エラー
    ///
    /// 取り込み全体を中断します。`row`は1始まりの行番号です。
    #[error("Malformed input at row {row}: {message}")]
    MalformedInput {
        /// 問題が検出された行（1始まり）
        row: usize,
        /// エラーの詳細
        message: String,
    },

    /// 列ラベルとして解釈できない文字列
    #[error("Invalid column label: '{0}'")]
    InvalidColumnLabel(String),

    /// 設定の検証に失敗したエラー
    ///
    /// `IngestBuilder::build()`時に検出されます。例えば、セクションの開始列が
    /// 終了列より後ろにある場合や、セクション同士が重なっている場合などです。
    #[error("Configuration error: {0}")]
    Config(String),

    /// レコードストアへの書き込みに失敗したエラー
    ///
    /// 取り込み処理はこのエラーをログに記録してスキップし、
    /// 同じ行の残りのセクションの書き込みを継続します。
    #[error("Failed to persist section '{section}': {message}")]
    Persistence {
        /// 書き込みに失敗したセクション（"score.current"など）
        section: String,
        /// エラーの詳細
        message: String,
    },
}
