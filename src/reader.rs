//! Document Reader Module
//!
//! 保存済みドキュメントから、得点・ランク・比較矢印・レーダーの割合を
//! あいまい検索で読み出す読み取り側のファサード。

use crate::api::Subtype;
use crate::config::{ChecklistItem, ChecklistMaster};
use crate::field_map::FieldMap;
use crate::lookup::{FieldSpec, LookupEngine, PositionalCursor};
use crate::store::Document;
use crate::types::{RankBand, TrendCode};

/// レーダーチャートのセクション名
const RADAR_SECTION: &str = "radar";

/// 比較矢印の1行（チェック項目とトレンド）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendRow<'a> {
    /// チェック項目
    pub item: &'a ChecklistItem,
    /// トレンド（不明なら`None`）
    pub trend: Option<TrendCode>,
}

/// 1件の評価レコード分のドキュメントを読むリーダー
///
/// # 使用例
///
/// ```rust
/// use scoresheet::{ChecklistMaster, Document, DocumentReader, FieldSpec, LookupEngine, Subtype};
///
/// let payload = vec![("総合得点", "85")].into_iter().collect();
/// let docs = vec![Document::new("1001", None, "score", Subtype::Current, payload)];
/// let engine = LookupEngine::default();
/// let master = ChecklistMaster::default();
///
/// let reader = DocumentReader::new(&docs, &engine, &master);
/// let score = reader.score("score", Subtype::Current, &FieldSpec::new("score", "得点"));
/// assert_eq!(score, Some(85.0));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DocumentReader<'a> {
    documents: &'a [Document],
    engine: &'a LookupEngine,
    master: &'a ChecklistMaster,
}

impl<'a> DocumentReader<'a> {
    /// 新しいリーダーを生成
    pub fn new(
        documents: &'a [Document],
        engine: &'a LookupEngine,
        master: &'a ChecklistMaster,
    ) -> Self {
        Self {
            documents,
            engine,
            master,
        }
    }

    /// セクションのフィールドマップを取得
    pub fn block(&self, section: &str, subtype: Subtype) -> Option<&'a FieldMap> {
        self.documents
            .iter()
            .find(|doc| doc.section == section && doc.subtype == subtype)
            .map(|doc| &doc.payload)
    }

    /// 値を検索する
    pub fn value(&self, section: &str, subtype: Subtype, spec: &FieldSpec) -> Option<&'a str> {
        self.block(section, subtype)
            .and_then(|block| self.engine.lookup(block, spec))
    }

    /// 得点を検索する
    pub fn score(&self, section: &str, subtype: Subtype, spec: &FieldSpec) -> Option<f64> {
        self.block(section, subtype)
            .and_then(|block| self.engine.lookup_number(block, spec))
    }

    /// ランクを検索する
    pub fn rank(&self, section: &str, subtype: Subtype, spec: &FieldSpec) -> Option<RankBand> {
        self.block(section, subtype)
            .and_then(|block| self.engine.lookup_rank(block, spec))
    }

    /// レーダーの割合（0〜100）を検索する
    pub fn radar(&self, subtype: Subtype, spec: &FieldSpec) -> Option<f64> {
        self.block(RADAR_SECTION, subtype)
            .and_then(|block| self.engine.lookup_radar(block, spec))
    }

    /// 指定ラベルのレーダー系列を順に取得する
    pub fn radar_series(&self, subtype: Subtype, labels: &[&str]) -> Vec<(String, Option<f64>)> {
        labels
            .iter()
            .map(|label| {
                let value = self.radar(subtype, &FieldSpec::label(*label));
                (label.to_string(), value)
            })
            .collect()
    }

    /// 比較ブロックの矢印をチェック項目マスターの順に取得する
    ///
    /// `family`に属する項目ごとに、コード・項目名で検索し、見つからなければ
    /// ブロック内の次の未使用の値を使います。ブロックがなければ空を返します。
    pub fn trend_arrows(&self, section: &str, subtype: Subtype, family: &str) -> Vec<TrendRow<'a>> {
        let Some(block) = self.block(section, subtype) else {
            return Vec::new();
        };

        let items: Vec<&'a ChecklistItem> = self.master.family(family).collect();
        let mut cursor = PositionalCursor::new().reserving(items.iter().map(|item| item.code));
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let spec = FieldSpec::checklist(item.code, item.label.clone());
            let (trend, next) = self.engine.lookup_trend(block, &spec, cursor);
            cursor = next;
            rows.push(TrendRow { item, trend });
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChecklistCode;

    fn doc(section: &str, subtype: Subtype, entries: &[(&str, &str)]) -> Document {
        Document::new(
            "1001",
            Some("1001-20240501".to_string()),
            section,
            subtype,
            entries.iter().copied().collect(),
        )
    }

    fn documents() -> Vec<Document> {
        vec![
            doc(
                "score",
                Subtype::Current,
                &[("総合得点", "85"), ("総合評価", "AA")],
            ),
            doc("score", Subtype::Previous, &[("総合得点", "78")]),
            doc(
                "radar",
                Subtype::Current,
                &[("技術", "82.5"), ("接客", "120"), ("知識", "-4")],
            ),
            doc(
                "checklist_comparison",
                Subtype::Merged,
                &[
                    ("19-2 毛先塗布", "3"),
                    ("19-1", "1"),
                    ("col_5", "2"),
                    ("20-1 仕上がり", "↑"),
                ],
            ),
        ]
    }

    #[test]
    fn test_block_and_value() {
        let docs = documents();
        let engine = LookupEngine::default();
        let master = ChecklistMaster::default();
        let reader = DocumentReader::new(&docs, &engine, &master);

        assert!(reader.block("score", Subtype::Current).is_some());
        assert!(reader.block("score", Subtype::Final).is_none());
        assert_eq!(
            reader.value("score", Subtype::Current, &FieldSpec::label("総合得点")),
            Some("85")
        );
        assert_eq!(
            reader.score("score", Subtype::Previous, &FieldSpec::new("score", "得点")),
            Some(78.0)
        );
        assert_eq!(
            reader.rank("score", Subtype::Current, &FieldSpec::new("rating", "評価")),
            Some(RankBand::AA)
        );
    }

    #[test]
    fn test_radar_clamped() {
        let docs = documents();
        let engine = LookupEngine::default();
        let master = ChecklistMaster::default();
        let reader = DocumentReader::new(&docs, &engine, &master);

        let series = reader.radar_series(Subtype::Current, &["技術", "接客", "知識", "表現"]);
        assert_eq!(
            series,
            vec![
                ("技術".to_string(), Some(82.5)),
                ("接客".to_string(), Some(100.0)),
                ("知識".to_string(), Some(0.0)),
                ("表現".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_trend_arrows_follow_master() {
        let docs = documents();
        let engine = LookupEngine::default();
        let master = ChecklistMaster::default();
        let reader = DocumentReader::new(&docs, &engine, &master);

        let rows = reader.trend_arrows("checklist_comparison", Subtype::Merged, "onecolor");
        let codes: Vec<ChecklistCode> = rows.iter().map(|r| r.item.code).collect();
        assert_eq!(codes.len(), 6);
        assert_eq!(codes[0], ChecklistCode::new(19, 1));

        // 19-1 と 19-2 はコードで一致し、列の並びに関係なく対応付けられる
        assert_eq!(rows[0].trend, Some(TrendCode::Up));
        assert_eq!(rows[1].trend, Some(TrendCode::Down));
        // 19-3 は見出しのない列の値を受け取り、20-1 の値は横取りしない
        assert_eq!(rows[2].trend, Some(TrendCode::Flat));
        assert_eq!(rows[3].trend, None);
        assert_eq!(rows[4].trend, Some(TrendCode::Up));
        assert_eq!(rows[5].trend, None);
    }

    #[test]
    fn test_trend_arrows_missing_block() {
        let docs = documents();
        let engine = LookupEngine::default();
        let master = ChecklistMaster::default();
        let reader = DocumentReader::new(&docs, &engine, &master);
        assert!(reader
            .trend_arrows("care_comparison", Subtype::Merged, "care")
            .is_empty());
    }
}
