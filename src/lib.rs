//! scoresheet - Ingestion and normalization engine for wide Japanese assessment spreadsheets
//!
//! This crate reads a single very wide, multi-header spreadsheet export (xlsx/xls/ods or
//! CSV/TSV), resolves its stacked header rows, extracts fixed column ranges into
//! per-section field maps, merges split minute/second fragments, sanitizes comparison
//! arrows, and writes the result into a [`RecordStore`]. On the read side, a fuzzy lookup
//! engine pulls scores, ranks, trend arrows and radar percentages out of loosely-keyed maps.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use scoresheet::{IngestBuilder, JsonDirStore};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create an importer with the default section table
//!     let importer = IngestBuilder::new().build()?;
//!
//!     // Persist documents as JSON files under ./store
//!     let mut store = JsonDirStore::open("store")?;
//!     let summary = importer.import_path("assessments.xlsx", &mut store)?;
//!     println!("{}", summary.message());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Reading Documents Back
//!
//! ```rust
//! use scoresheet::{
//!     FieldSpec, IngestBuilder, MemoryStore, RecordStore, RowMatrix, SectionSpec, SectionTable,
//!     Subtype,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let importer = IngestBuilder::new()
//!     .with_section_table(SectionTable::new(vec![
//!         SectionSpec::new("score", Subtype::Current, "E", "G"),
//!     ]))
//!     .build()?;
//!
//! let matrix = RowMatrix::from_rows(vec![
//!     vec!["ID", "氏名", "発行者", "状態", "総合得点", "タイム", ""],
//!     vec!["1001", "山田", "本部", "在籍", "８５", "5", "30"],
//! ]);
//! let mut store = MemoryStore::new();
//! importer.import_matrix(&matrix, &mut store)?;
//!
//! let documents = store.documents("1001", None)?;
//! let reader = importer.reader(&documents);
//! assert_eq!(reader.score("score", Subtype::Current, &FieldSpec::new("score", "得点")), Some(85.0));
//! assert_eq!(reader.value("score", Subtype::Current, &FieldSpec::new("time", "時間")), Some("5分30秒"));
//! # Ok(())
//! # }
//! ```

mod api;
mod builder;
mod column;
mod config;
mod error;
mod field_map;
mod header;
mod lookup;
mod merge;
mod normalize;
mod output;
mod parser;
mod range;
mod rank;
mod reader;
mod record;
mod security;
mod span;
mod store;
mod trend;
mod types;

// 公開API
pub use api::{InputFormat, MergeRule, OutputFormat, SheetSelector, Subtype};
pub use builder::{ImportSummary, Importer, IngestBuilder, RowDocuments};
pub use column::{index_to_letter, letter_to_index};
pub use config::{ChecklistItem, ChecklistMaster, CustomerColumns, SectionSpec, SectionTable};
pub use error::ScoreSheetError;
pub use field_map::FieldMap;
pub use header::{
    detect_header_depth, is_placeholder_key, placeholder_key, HeaderStack, DEFAULT_HEADER_DEPTH,
};
pub use lookup::{
    default_engine, lookup, parse_number, AliasTable, FieldMatch, FieldSpec, LookupEngine,
    MatchStep, PositionalCursor, DEFAULT_ALIASES,
};
pub use merge::{aggregate_key, is_time_key, SmartSet, TimeParts};
pub use normalize::{normalize, normalize_value, to_half_width, NormalizedKey, DEFAULT_SYNONYMS};
pub use range::{extract_range, extract_span};
pub use rank::{
    band_for_score, decode_rank, find_band_label, is_truthy_marker, RankThresholds,
    UNRATED_MARKER,
};
pub use reader::{DocumentReader, TrendRow};
pub use record::{
    derive_assessment, derive_customer, parse_date, record_key, AssessmentRecord,
    AssessmentSources, CustomerRecord, CustomerStatus,
};
pub use security::DEFAULT_MAX_INPUT_SIZE;
pub use span::{
    detect_group_row, detect_spans, spans_from_group_row, GroupKeywords, CATCH_ALL_SPAN_KEY,
    DEFAULT_GROUP_KEYWORDS,
};
pub use store::{Document, JsonDirStore, MemoryStore, RecordStore};
pub use trend::{decode_trend, decode_trend_str, sanitize_trend_block};
pub use types::{ChecklistCode, ColumnSpan, RankBand, RawValue, RowMatrix, TrendCode};
