//! Fuzzy Lookup Engine Module
//!
//! キー表記がゆれたフィールドマップから値を取り出す、汎用のあいまい検索エンジン。
//!
//! 検索は次の順序で行い、最初に見つかった値を返します。
//!
//! 1. **完全一致**: 正規化キーがコードまたはラベルと一致（キーに埋め込まれた
//!    チェックリストコードがコードと一致する場合も含む）
//! 2. **別名一致**: 別名テーブルとフィールド定義の別名に一致
//! 3. **部分一致**: キーがラベル・別名を含む、またはその逆（コード単体は対象外）
//! 4. **位置指定**（比較・トレンド系のみ）: [`PositionalCursor`]が指す次の未使用の値
//! 5. **帯推定**（ランク系のみ）: ラベル + ランク名のキーに印がある場合、最大のランク
//!
//! エンジンは純粋関数の集まりで、`Send + Sync`です。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ScoreSheetError;
use crate::field_map::FieldMap;
use crate::normalize::{normalize, NormalizedKey};
use crate::rank::{decode_rank, is_truthy_marker, UNRATED_MARKER};
use crate::trend::decode_trend_str;
use crate::types::{ChecklistCode, RankBand, RawValue, TrendCode};

/// 既定の別名テーブル（フィールドID → 別名）
pub const DEFAULT_ALIASES: &[(&str, &[&str])] = &[
    ("score", &["得点", "総合得点", "点数", "スコア", "score"]),
    ("care_score", &["ケア得点", "ケア点数", "care score"]),
    ("onecolor_score", &["ワンカラー得点", "ワンカラー点数", "one-color score"]),
    ("time", &["タイム", "時間", "time"]),
    ("rating", &["評価", "総合評価", "ランク", "rating"]),
    ("care_rating", &["ケア評価", "care rating"]),
    ("onecolor_rating", &["ワンカラー評価", "one-color rating"]),
    ("time_rating", &["タイム評価", "時間評価", "time rating"]),
    ("contact", &["連絡先", "電話番号", "電話", "TEL", "メール"]),
    ("gender", &["性別", "gender"]),
    ("age", &["年齢", "年代", "age"]),
    ("store", &["店舗", "店舗名", "サロン", "サロン名", "store"]),
    ("date", &["実施日", "受講日", "評価日", "日付", "date"]),
    ("comment", &["コメント", "講評", "所見", "comment"]),
];

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?[0-9]+(?:\.[0-9]+)?").expect("number pattern is valid"));

static DEFAULT_ENGINE: LazyLock<LookupEngine> = LazyLock::new(LookupEngine::default);

/// 正規化済み文字列から最初の数値を取り出す（"85点" → 85.0）
pub fn parse_number(value: &str) -> Option<f64> {
    let normalized = normalize(value);
    NUMBER_RE
        .find(&normalized)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// 検索対象フィールドの定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// フィールドID（別名テーブルのキー）
    pub id: String,
    /// チェックリストコード
    #[serde(default)]
    pub code: Option<ChecklistCode>,
    /// 表示ラベル
    pub label: String,
    /// 個別の別名
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl FieldSpec {
    /// IDとラベルから生成
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: None,
            label: label.into(),
            aliases: Vec::new(),
        }
    }

    /// ラベルのみで生成（IDはラベルと同じ）
    pub fn label(label: impl Into<String>) -> Self {
        let label = label.into();
        Self::new(label.clone(), label)
    }

    /// チェック項目として生成（IDはコード文字列）
    pub fn checklist(code: ChecklistCode, label: impl Into<String>) -> Self {
        Self {
            id: code.to_string(),
            code: Some(code),
            label: label.into(),
            aliases: Vec::new(),
        }
    }

    /// 別名を追加
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// フィールドID → 別名一覧の静的テーブル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl AliasTable {
    /// 空のテーブルを生成
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// JSON（`{"id": ["別名", ...]}`）から読み込む
    pub fn from_json(json: &str) -> Result<Self, ScoreSheetError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 別名を追加（既存の別名の後ろに追加）
    pub fn insert<I, S>(&mut self, id: impl Into<String>, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .entry(id.into())
            .or_default()
            .extend(aliases.into_iter().map(Into::into));
    }

    /// IDの別名一覧
    pub fn aliases_for(&self, id: &str) -> &[String] {
        self.entries.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (id, aliases) in DEFAULT_ALIASES {
            table.insert(*id, aliases.iter().copied());
        }
        table
    }
}

/// どの段階で一致したか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStep {
    /// 完全一致
    Exact,
    /// 別名一致
    Alias,
    /// 部分一致
    Substring,
    /// 位置指定
    Positional,
}

/// 検索結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMatch<'m> {
    /// 一致したキー（生のキー）
    pub key: &'m str,
    /// 値
    pub value: &'m str,
    /// 一致した段階
    pub step: MatchStep,
}

/// 位置指定検索のカーソル
///
/// 1つのフィールド群（比較ブロックなど）を1回走査する間だけ使う値です。
/// 呼び出しごとに渡して、更新されたものを受け取ります。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionalCursor {
    next: usize,
    claimed_keys: BTreeSet<String>,
    claimed_codes: BTreeSet<ChecklistCode>,
    reserved_codes: BTreeSet<ChecklistCode>,
}

impl PositionalCursor {
    /// 先頭を指すカーソルを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// 後続の項目が完全一致で取得するコードを予約する
    ///
    /// 予約されたコードを持つキーは、位置指定では返されません。
    /// チェック項目マスターの順に走査する場合は、その群のすべてのコードを渡します。
    pub fn reserving<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = ChecklistCode>,
    {
        self.reserved_codes.extend(codes);
        self
    }

    /// 次に調べる位置
    pub fn position(&self) -> usize {
        self.next
    }

    fn claim(&mut self, key: &str, code: Option<ChecklistCode>) {
        self.claimed_keys.insert(key.to_string());
        if let Some(code) = code {
            self.claimed_codes.insert(code);
        }
    }

    fn is_claimed(&self, key: &str, code: Option<ChecklistCode>) -> bool {
        self.claimed_keys.contains(key)
            || code.is_some_and(|c| self.claimed_codes.contains(&c) || self.reserved_codes.contains(&c))
    }
}

/// 正規化済みの検索対象
struct Targets {
    code: Option<ChecklistCode>,
    code_key: Option<NormalizedKey>,
    label: Option<NormalizedKey>,
    aliases: Vec<NormalizedKey>,
}

impl Targets {
    fn new(spec: &FieldSpec, table: &AliasTable) -> Self {
        let non_empty = |key: NormalizedKey| (!key.is_empty()).then_some(key);
        let mut aliases: Vec<NormalizedKey> = Vec::new();
        for alias in table.aliases_for(&spec.id).iter().chain(&spec.aliases) {
            let key = NormalizedKey::new(alias);
            if !key.is_empty() && !aliases.contains(&key) {
                aliases.push(key);
            }
        }
        Self {
            code: spec.code,
            code_key: spec.code.map(|c| NormalizedKey::new(&c.to_string())),
            label: non_empty(NormalizedKey::new(&spec.label)),
            aliases,
        }
    }

    /// 部分一致の対象（コード単体と一致するラベルは除く）
    fn substring_targets(&self) -> impl Iterator<Item = &NormalizedKey> {
        self.label
            .iter()
            .chain(&self.aliases)
            .filter(move |t| Some(*t) != self.code_key.as_ref())
    }
}

/// キーの正規形と埋め込みコード
fn key_info(key: &str) -> (NormalizedKey, Option<ChecklistCode>) {
    let normalized = NormalizedKey::new(key);
    let code = ChecklistCode::find_in(normalized.as_str());
    (normalized, code)
}

/// あいまい検索エンジン
#[derive(Debug, Clone, Default)]
pub struct LookupEngine {
    aliases: AliasTable,
}

impl LookupEngine {
    /// 別名テーブルを指定してエンジンを生成
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    /// 別名テーブル
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// 完全一致・別名一致・部分一致の順で検索する
    pub fn find<'m>(&self, map: &'m FieldMap, spec: &FieldSpec) -> Option<FieldMatch<'m>> {
        let targets = Targets::new(spec, &self.aliases);
        let keyed: Vec<(&str, &str, NormalizedKey, Option<ChecklistCode>)> = map
            .entries()
            .map(|(k, v)| {
                let (normalized, code) = key_info(k);
                (k, v, normalized, code)
            })
            .collect();
        let hit = |key: &'m str, value: &'m str, step| FieldMatch { key, value, step };

        // 1. 完全一致（キーそのもの → 埋め込みコード）
        let exact = keyed
            .iter()
            .find(|(_, _, nk, _)| {
                Some(nk) == targets.label.as_ref() || Some(nk) == targets.code_key.as_ref()
            })
            .or_else(|| {
                keyed
                    .iter()
                    .find(|(_, _, _, code)| targets.code.is_some() && *code == targets.code)
            });
        if let Some(&(k, v, _, _)) = exact {
            return Some(hit(k, v, MatchStep::Exact));
        }

        // 2. 別名一致
        if let Some(&(k, v, _, _)) = keyed
            .iter()
            .find(|(_, _, nk, _)| targets.aliases.contains(nk))
        {
            return Some(hit(k, v, MatchStep::Alias));
        }

        // 3. 部分一致（別のコードを持つキーは対象外）
        for target in targets.substring_targets() {
            let found = keyed.iter().find(|(_, _, nk, code)| {
                let other_code = targets.code.is_some() && code.is_some() && *code != targets.code;
                !other_code && nk.overlaps(target)
            });
            if let Some(&(k, v, _, _)) = found {
                return Some(hit(k, v, MatchStep::Substring));
            }
        }

        None
    }

    /// 値を検索する（段階1〜3）
    pub fn lookup<'m>(&self, map: &'m FieldMap, spec: &FieldSpec) -> Option<&'m str> {
        self.find(map, spec).map(|m| m.value)
    }

    /// 段階1〜3で見つからなければ、カーソルが指す次の未使用の値を返す
    ///
    /// キーのいずれかにチェックリストコードが埋め込まれていればコード順、
    /// そうでなければ挿入順で走査します。段階1〜3で一致したキーは
    /// 使用済みとして記録され、以降の位置指定では飛ばされます。
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use scoresheet::{FieldMap, FieldSpec, LookupEngine, PositionalCursor};
    ///
    /// let block: FieldMap = vec![("col_1", "↑"), ("col_2", "↓")].into_iter().collect();
    /// let engine = LookupEngine::default();
    ///
    /// let cursor = PositionalCursor::new();
    /// let (first, cursor) = engine.lookup_positional(&block, &FieldSpec::label("カット"), cursor);
    /// let (second, _) = engine.lookup_positional(&block, &FieldSpec::label("ブロー"), cursor);
    /// assert_eq!(first.map(|m| m.value), Some("↑"));
    /// assert_eq!(second.map(|m| m.value), Some("↓"));
    /// ```
    pub fn lookup_positional<'m>(
        &self,
        map: &'m FieldMap,
        spec: &FieldSpec,
        mut cursor: PositionalCursor,
    ) -> (Option<FieldMatch<'m>>, PositionalCursor) {
        if let Some(found) = self.find(map, spec) {
            let (_, code) = key_info(found.key);
            cursor.claim(found.key, code);
            return (Some(found), cursor);
        }

        let order = positional_order(map);
        let mut idx = cursor.next;
        while let Some((key, value, code)) = order.get(idx).copied() {
            idx += 1;
            if cursor.is_claimed(key, code) {
                continue;
            }
            cursor.claim(key, code);
            cursor.next = idx;
            let found = FieldMatch {
                key,
                value,
                step: MatchStep::Positional,
            };
            return (Some(found), cursor);
        }
        cursor.next = idx;
        (None, cursor)
    }

    /// トレンドコードを検索する（位置指定を含む）
    pub fn lookup_trend(
        &self,
        map: &FieldMap,
        spec: &FieldSpec,
        cursor: PositionalCursor,
    ) -> (Option<TrendCode>, PositionalCursor) {
        let (found, cursor) = self.lookup_positional(map, spec, cursor);
        (found.and_then(|m| decode_trend_str(m.value)), cursor)
    }

    /// ランクを検索する
    ///
    /// 完全一致・別名一致の値を[`decode_rank`]で判定し（一致したキーをヒントに使用）、
    /// 判定できなければ帯推定、最後に部分一致の値を判定します。
    /// 「ラベル + ランク名」の列が複数並ぶ場合は最大のランクを採用します。
    /// 一致した値が"未評価"の場合は`None`を返します。
    pub fn lookup_rank(&self, map: &FieldMap, spec: &FieldSpec) -> Option<RankBand> {
        let found = self.find(map, spec);
        if let Some(found) = found {
            if found.value.contains(UNRATED_MARKER) {
                return None;
            }
            if found.step != MatchStep::Substring {
                if let Some(band) = decode_rank(&RawValue::from(found.value), Some(found.key)) {
                    return Some(band);
                }
            }
        }
        self.infer_band(map, spec).or_else(|| {
            found
                .filter(|f| f.step == MatchStep::Substring)
                .and_then(|f| decode_rank(&RawValue::from(f.value), Some(f.key)))
        })
    }

    /// 帯推定: 「ラベル + ランク名」のキーに印がある場合、その中で最大のランク
    fn infer_band(&self, map: &FieldMap, spec: &FieldSpec) -> Option<RankBand> {
        let targets = Targets::new(spec, &self.aliases);
        let target_list: Vec<&NormalizedKey> = targets.substring_targets().collect();

        map.entries()
            .filter(|(_, value)| is_truthy_marker(value))
            .filter_map(|(key, _)| {
                let normalized = NormalizedKey::new(key);
                target_list.iter().find_map(|target| {
                    let remainder = normalized.as_str().replacen(target.as_str(), "", 1);
                    if remainder.len() == normalized.as_str().len() {
                        return None;
                    }
                    RankBand::from_label(&remainder.to_uppercase())
                })
            })
            .max()
    }

    /// スコア（数値）を検索する
    pub fn lookup_number(&self, map: &FieldMap, spec: &FieldSpec) -> Option<f64> {
        self.lookup(map, spec).and_then(parse_number)
    }

    /// レーダーチャートの割合を検索する（0〜100に丸める）
    pub fn lookup_radar(&self, map: &FieldMap, spec: &FieldSpec) -> Option<f64> {
        self.lookup_number(map, spec).map(|n| n.clamp(0.0, 100.0))
    }
}

/// 位置指定の走査順
///
/// コードを持つキーをコード順（同じコードは先頭のみ）に並べ、
/// その後ろにコードを持たないキーを挿入順で続けます。
fn positional_order(map: &FieldMap) -> Vec<(&str, &str, Option<ChecklistCode>)> {
    let (mut coded, uncoded): (Vec<_>, Vec<_>) = map
        .entries()
        .map(|(k, v)| (k, v, key_info(k).1))
        .partition(|(_, _, code)| code.is_some());

    coded.sort_by_key(|(_, _, code)| *code);
    coded.dedup_by_key(|(_, _, code)| *code);
    coded.extend(uncoded);
    coded
}

/// 既定の別名テーブルで値を検索する
///
/// # 使用例
///
/// ```rust
/// use scoresheet::{lookup, FieldMap, FieldSpec};
///
/// let block: FieldMap = vec![("総合得点", "85"), ("ケア得点", "40")].into_iter().collect();
/// assert_eq!(lookup(&block, &FieldSpec::new("score", "今回の得点")), Some("85"));
/// ```
pub fn lookup<'m>(map: &'m FieldMap, spec: &FieldSpec) -> Option<&'m str> {
    DEFAULT_ENGINE.lookup(map, spec)
}

/// 既定の別名テーブルで検索エンジンを取得する
pub fn default_engine() -> &'static LookupEngine {
    &DEFAULT_ENGINE
}
