//! Record Store Module
//!
//! 取り込み結果（顧客レコード、評価レコード、セクションごとのドキュメント）を
//! 書き込む永続化層の境界（[`RecordStore`]）と、その参照実装を提供するモジュール。
//!
//! - [`MemoryStore`]: メモリ上の`BTreeMap`に保持する
//! - [`JsonDirStore`]: ディレクトリ配下にJSONファイルとして保存する

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::Subtype;
use crate::error::ScoreSheetError;
use crate::field_map::FieldMap;
use crate::record::{AssessmentRecord, CustomerRecord};
use crate::security::validate_store_key;

/// 評価レコードを持たないドキュメントのディレクトリ名
const NO_RECORD_DIR: &str = "_";

/// 1行 × 1セクション分の出力ドキュメント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// 顧客キー
    pub customer_key: String,
    /// 評価レコードのキー
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_key: Option<String>,
    /// セクション名
    pub section: String,
    /// サブタイプ
    pub subtype: Subtype,
    /// フィールドマップ
    pub payload: FieldMap,
}

impl Document {
    /// 新しいドキュメントを生成
    pub fn new(
        customer_key: impl Into<String>,
        record_key: Option<String>,
        section: impl Into<String>,
        subtype: Subtype,
        payload: FieldMap,
    ) -> Self {
        Self {
            customer_key: customer_key.into(),
            record_key,
            section: section.into(),
            subtype,
            payload,
        }
    }

    /// `"section.subtype"`形式のキー
    pub fn section_key(&self) -> String {
        format!("{}.{}", self.section, self.subtype)
    }
}

/// 取り込み結果の書き込み先
///
/// 書き込みは取り込み処理から1件ずつ順に呼び出されます。
/// 失敗は`ScoreSheetError::Persistence`で返してください。
pub trait RecordStore {
    /// 顧客レコードを書き込む（同じキーは上書き）
    fn put_customer(&mut self, customer: &CustomerRecord) -> Result<(), ScoreSheetError>;

    /// 評価レコードを書き込む（同じキーは上書き）
    fn put_assessment(&mut self, assessment: &AssessmentRecord) -> Result<(), ScoreSheetError>;

    /// ドキュメントを書き込む（同じ顧客・レコード・セクションは上書き）
    fn put_document(&mut self, document: &Document) -> Result<(), ScoreSheetError>;

    /// 顧客レコードを読み出す
    fn customer(&self, customer_key: &str) -> Result<Option<CustomerRecord>, ScoreSheetError>;

    /// 顧客の評価レコードをキー順に読み出す
    fn assessments(&self, customer_key: &str) -> Result<Vec<AssessmentRecord>, ScoreSheetError>;

    /// 顧客のドキュメントを読み出す（`record_key`が`Some`ならそのレコード分のみ）
    fn documents(
        &self,
        customer_key: &str,
        record_key: Option<&str>,
    ) -> Result<Vec<Document>, ScoreSheetError>;
}

type DocumentKey = (String, Option<String>, String, Subtype);

/// メモリ上のレコードストア
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    customers: BTreeMap<String, CustomerRecord>,
    assessments: BTreeMap<(String, String), AssessmentRecord>,
    documents: BTreeMap<DocumentKey, Document>,
}

impl MemoryStore {
    /// 空のストアを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存済みの顧客数
    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }

    /// 保存済みのドキュメント数
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// 全ドキュメント（キー順）
    pub fn all_documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }
}

impl RecordStore for MemoryStore {
    fn put_customer(&mut self, customer: &CustomerRecord) -> Result<(), ScoreSheetError> {
        self.customers
            .insert(customer.customer_key.clone(), customer.clone());
        Ok(())
    }

    fn put_assessment(&mut self, assessment: &AssessmentRecord) -> Result<(), ScoreSheetError> {
        self.assessments.insert(
            (
                assessment.customer_key.clone(),
                assessment.record_key.clone(),
            ),
            assessment.clone(),
        );
        Ok(())
    }

    fn put_document(&mut self, document: &Document) -> Result<(), ScoreSheetError> {
        let key = (
            document.customer_key.clone(),
            document.record_key.clone(),
            document.section.clone(),
            document.subtype,
        );
        self.documents.insert(key, document.clone());
        Ok(())
    }

    fn customer(&self, customer_key: &str) -> Result<Option<CustomerRecord>, ScoreSheetError> {
        Ok(self.customers.get(customer_key).cloned())
    }

    fn assessments(&self, customer_key: &str) -> Result<Vec<AssessmentRecord>, ScoreSheetError> {
        Ok(self
            .assessments
            .iter()
            .filter(|((customer, _), _)| customer == customer_key)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn documents(
        &self,
        customer_key: &str,
        record_key: Option<&str>,
    ) -> Result<Vec<Document>, ScoreSheetError> {
        Ok(self
            .documents
            .values()
            .filter(|doc| doc.customer_key == customer_key)
            .filter(|doc| record_key.is_none() || doc.record_key.as_deref() == record_key)
            .cloned()
            .collect())
    }
}

/// JSONファイルのディレクトリに保存するレコードストア
///
/// レイアウト:
///
/// ```text
/// <root>/customers/<customer>.json
/// <root>/assessments/<customer>/<record>.json
/// <root>/documents/<customer>/<record または _>/<section>.<subtype>.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// ルートディレクトリを指定してストアを開く（なければ作成）
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ScoreSheetError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// ルートディレクトリ
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn checked<'k>(section: &str, key: &'k str) -> Result<&'k str, ScoreSheetError> {
        validate_store_key(key).map_err(|message| ScoreSheetError::Persistence {
            section: section.to_string(),
            message,
        })?;
        Ok(key)
    }

    fn write_json<T: Serialize>(
        &self,
        section: &str,
        path: PathBuf,
        value: &T,
    ) -> Result<(), ScoreSheetError> {
        let persistence = |message: String| ScoreSheetError::Persistence {
            section: section.to_string(),
            message,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| persistence(e.to_string()))?;
        }
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| persistence(e.to_string()))?;

        // 一時ファイルに書いてから置き換える
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| persistence(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| persistence(e.to_string()))?;

        debug!(path = %path.display(), "wrote document");
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ScoreSheetError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// ディレクトリ配下の`.json`ファイルを名前順に列挙する（ディレクトリがなければ空）
    fn json_files(dir: &Path) -> Result<Vec<PathBuf>, ScoreSheetError> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn sub_dirs(dir: &Path) -> Result<Vec<PathBuf>, ScoreSheetError> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut dirs = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

impl RecordStore for JsonDirStore {
    fn put_customer(&mut self, customer: &CustomerRecord) -> Result<(), ScoreSheetError> {
        let key = Self::checked("customer", &customer.customer_key)?;
        let path = self.root.join("customers").join(format!("{}.json", key));
        self.write_json("customer", path, customer)
    }

    fn put_assessment(&mut self, assessment: &AssessmentRecord) -> Result<(), ScoreSheetError> {
        let customer = Self::checked("assessment", &assessment.customer_key)?;
        let record = Self::checked("assessment", &assessment.record_key)?;
        let path = self
            .root
            .join("assessments")
            .join(customer)
            .join(format!("{}.json", record));
        self.write_json("assessment", path, assessment)
    }

    fn put_document(&mut self, document: &Document) -> Result<(), ScoreSheetError> {
        let section = document.section_key();
        let customer = Self::checked(&section, &document.customer_key)?;
        let record = match &document.record_key {
            Some(record) => Self::checked(&section, record)?,
            None => NO_RECORD_DIR,
        };
        let file = Self::checked(&section, &section)?;
        let path = self
            .root
            .join("documents")
            .join(customer)
            .join(record)
            .join(format!("{}.json", file));
        self.write_json(&section, path, document)
    }

    fn customer(&self, customer_key: &str) -> Result<Option<CustomerRecord>, ScoreSheetError> {
        if validate_store_key(customer_key).is_err() {
            return Ok(None);
        }
        let path = self
            .root
            .join("customers")
            .join(format!("{}.json", customer_key));
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(Self::read_json(&path)?))
    }

    fn assessments(&self, customer_key: &str) -> Result<Vec<AssessmentRecord>, ScoreSheetError> {
        if validate_store_key(customer_key).is_err() {
            return Ok(Vec::new());
        }
        let dir = self.root.join("assessments").join(customer_key);
        Self::json_files(&dir)?
            .iter()
            .map(|path| Self::read_json(path))
            .collect()
    }

    fn documents(
        &self,
        customer_key: &str,
        record_key: Option<&str>,
    ) -> Result<Vec<Document>, ScoreSheetError> {
        if validate_store_key(customer_key).is_err() {
            return Ok(Vec::new());
        }
        let customer_dir = self.root.join("documents").join(customer_key);
        let record_dirs = match record_key {
            Some(record) if validate_store_key(record).is_ok() => vec![customer_dir.join(record)],
            Some(_) => Vec::new(),
            None => Self::sub_dirs(&customer_dir)?,
        };

        let mut documents = Vec::new();
        for dir in record_dirs {
            for path in Self::json_files(&dir)? {
                documents.push(Self::read_json(&path)?);
            }
        }
        Ok(documents)
    }
}
