//! Record Module
//!
//! データ行と抽出済みブロックから、顧客レコード・評価レコードを導出するモジュール。

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::field_map::FieldMap;
use crate::lookup::{parse_number, FieldSpec, LookupEngine};
use crate::merge::TimeParts;
use crate::normalize::to_half_width;
use crate::rank::{band_for_score, RankThresholds};
use crate::types::RankBand;

static YMD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})[/\-.]([0-9]{1,2})[/\-.]([0-9]{1,2})(?:[ T].*)?$")
        .expect("Y/M/D pattern is valid")
});
static MDY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{1,2})[/\-.]([0-9]{1,2})[/\-.]([0-9]{4})$").expect("M/D/Y pattern is valid")
});
static COMPACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})([0-9]{2})([0-9]{2})$").expect("compact date pattern is valid")
});
static KANJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})\s*年\s*([0-9]{1,2})\s*月\s*([0-9]{1,2})\s*日")
        .expect("kanji date pattern is valid")
});

/// 日付文字列を解析する
///
/// `Y/M/D`、`M/D/Y`、8桁（`YYYYMMDD`）、`Y年M月D日`を受け付けます。
/// 区切りは`/`・`-`・`.`のいずれでもよく、全角数字も使えます。
///
/// # 使用例
///
/// ```rust
/// use chrono::NaiveDate;
/// use scoresheet::parse_date;
///
/// let expected = NaiveDate::from_ymd_opt(2024, 5, 1);
/// assert_eq!(parse_date("2024/5/1"), expected);
/// assert_eq!(parse_date("05/01/2024"), expected);
/// assert_eq!(parse_date("20240501"), expected);
/// assert_eq!(parse_date("２０２４年５月１日"), expected);
/// assert_eq!(parse_date("未定"), None);
/// ```
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = to_half_width(text);
    let text = text.trim();

    let ymd = |caps: regex::Captures<'_>, y: usize, m: usize, d: usize| -> Option<NaiveDate> {
        let year = caps.get(y)?.as_str().parse().ok()?;
        let month = caps.get(m)?.as_str().parse().ok()?;
        let day = caps.get(d)?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    };

    if let Some(caps) = YMD_RE.captures(text) {
        return ymd(caps, 1, 2, 3);
    }
    if let Some(caps) = MDY_RE.captures(text) {
        return ymd(caps, 3, 1, 2);
    }
    if let Some(caps) = COMPACT_RE.captures(text) {
        return ymd(caps, 1, 2, 3);
    }
    if let Some(caps) = KANJI_RE.captures(text) {
        return ymd(caps, 1, 2, 3);
    }
    None
}

/// 評価レコードのキー（`"<顧客キー>-<YYYYMMDD>"`）
pub fn record_key(customer_key: &str, date: NaiveDate) -> String {
    format!("{}-{}", customer_key, date.format("%Y%m%d"))
}

/// 顧客の状態
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    /// 在籍
    #[default]
    Active,
    /// 休会
    Suspended,
    /// 退会
    Withdrawn,
    /// 新規
    New,
}

impl CustomerStatus {
    /// 状態列の文字列から判定する（部分一致）
    ///
    /// 退会・解約 → `Withdrawn`、休 → `Suspended`、新規 → `New`、それ以外は`Active`
    pub fn from_text(text: &str) -> Self {
        if text.contains("退会") || text.contains("解約") {
            CustomerStatus::Withdrawn
        } else if text.contains('休') {
            CustomerStatus::Suspended
        } else if text.contains("新規") {
            CustomerStatus::New
        } else {
            CustomerStatus::Active
        }
    }
}

/// 顧客レコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// 顧客キー（A列）
    pub customer_key: String,
    /// 氏名（B列）
    pub name: String,
    /// 発行者（C列）
    pub issuer: String,
    /// 状態（D列）
    pub status: CustomerStatus,
    /// 連絡先
    pub contact: Option<String>,
    /// 性別
    pub gender: Option<String>,
    /// 年齢
    pub age: Option<u32>,
    /// 店舗
    pub store: Option<String>,
    /// 実施日（プロフィールにない場合は取り込みの基準日）
    pub date: NaiveDate,
}

/// 評価レコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    /// `"<顧客キー>-<YYYYMMDD>"`
    pub record_key: String,
    /// 顧客キー
    pub customer_key: String,
    /// 実施日
    pub date: NaiveDate,
    /// 総合得点
    pub score: Option<f64>,
    /// ケア得点
    pub care_score: Option<f64>,
    /// ワンカラー得点
    pub onecolor_score: Option<f64>,
    /// タイム得点
    pub time_score: Option<f64>,
    /// 総合評価
    pub rating: Option<RankBand>,
    /// ケア評価
    pub care_rating: Option<RankBand>,
    /// ワンカラー評価
    pub onecolor_rating: Option<RankBand>,
    /// タイム評価
    pub time_rating: Option<RankBand>,
    /// 所要時間（分）
    pub duration_minutes: Option<u32>,
    /// 所要時間（秒）
    pub duration_seconds: Option<u32>,
}

/// プロフィール項目のフィールド定義
pub(crate) fn profile_spec(id: &str) -> FieldSpec {
    match id {
        "contact" => FieldSpec::new("contact", "連絡先"),
        "gender" => FieldSpec::new("gender", "性別"),
        "age" => FieldSpec::new("age", "年齢"),
        "store" => FieldSpec::new("store", "店舗"),
        _ => FieldSpec::new("date", "実施日"),
    }
}

/// 顧客レコードを導出する
///
/// `fixed`は固定列（ID、氏名、発行者、状態）の生の値です。
/// プロフィールの各項目はあいまい検索で取り出し、日付が読めない場合は`reference_date`を使います。
pub fn derive_customer(
    fixed: [&str; 4],
    profile: Option<&FieldMap>,
    engine: &LookupEngine,
    reference_date: NaiveDate,
) -> CustomerRecord {
    let [id, name, issuer, status] = fixed;
    let profile_value = |id: &str| -> Option<String> {
        profile
            .and_then(|block| engine.lookup(block, &profile_spec(id)))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    CustomerRecord {
        customer_key: id.trim().to_string(),
        name: name.trim().to_string(),
        issuer: issuer.trim().to_string(),
        status: CustomerStatus::from_text(status),
        contact: profile_value("contact"),
        gender: profile_value("gender"),
        age: profile_value("age")
            .and_then(|v| parse_number(&v))
            .filter(|n| *n >= 0.0)
            .map(|n| n as u32),
        store: profile_value("store"),
        date: profile_value("date")
            .and_then(|v| parse_date(&v))
            .unwrap_or(reference_date),
    }
}

/// 評価レコードの導出元ブロック
///
/// いずれも今回（current）の値で、この順に検索します。
#[derive(Debug, Clone, Copy, Default)]
pub struct AssessmentSources<'a> {
    /// score.current
    pub score: Option<&'a FieldMap>,
    /// care_score.current
    pub care_score: Option<&'a FieldMap>,
    /// onecolor_score.current
    pub onecolor_score: Option<&'a FieldMap>,
    /// time.current
    pub time: Option<&'a FieldMap>,
    /// rating.current
    pub rating: Option<&'a FieldMap>,
}

impl<'a> AssessmentSources<'a> {
    fn score_blocks(&self) -> impl Iterator<Item = &'a FieldMap> {
        [self.score, self.care_score, self.onecolor_score, self.time]
            .into_iter()
            .flatten()
    }

    /// 得点を検索する（`"5分30秒"`のような時間の値は得点として読まない）
    fn number(&self, engine: &LookupEngine, spec: &FieldSpec) -> Option<f64> {
        self.score_blocks().find_map(|block| {
            engine
                .lookup(block, spec)
                .filter(|v| TimeParts::parse(v).is_none())
                .and_then(parse_number)
        })
    }

    fn rank(&self, engine: &LookupEngine, spec: &FieldSpec) -> Option<RankBand> {
        self.rating
            .into_iter()
            .chain(self.score_blocks())
            .filter(|block| {
                engine
                    .lookup(block, spec)
                    .map_or(true, |v| TimeParts::parse(v).is_none())
            })
            .find_map(|block| engine.lookup_rank(block, spec))
    }
}

/// 評価レコードを導出する
///
/// 評価ラベルが見つからない項目は、得点をしきい値で帯分けして補完します。
pub fn derive_assessment(
    customer: &CustomerRecord,
    sources: &AssessmentSources<'_>,
    engine: &LookupEngine,
    thresholds: &RankThresholds,
) -> AssessmentRecord {
    let score = sources.number(engine, &FieldSpec::new("score", "総合得点"));
    let care_score = sources.number(engine, &FieldSpec::new("care_score", "ケア得点"));
    let onecolor_score = sources.number(engine, &FieldSpec::new("onecolor_score", "ワンカラー得点"));
    let time_score = sources.number(
        engine,
        &FieldSpec::new("time_score", "タイム得点").with_alias("時間得点"),
    );

    let rating_or_band = |spec: FieldSpec, score: Option<f64>| {
        sources
            .rank(engine, &spec)
            .or_else(|| score.map(|s| band_for_score(s, thresholds)))
    };

    let duration = sources
        .time
        .into_iter()
        .chain(sources.score_blocks())
        .filter_map(|block| engine.lookup(block, &FieldSpec::new("time", "時間")))
        .find_map(TimeParts::parse);

    AssessmentRecord {
        record_key: record_key(&customer.customer_key, customer.date),
        customer_key: customer.customer_key.clone(),
        date: customer.date,
        score,
        care_score,
        onecolor_score,
        time_score,
        rating: rating_or_band(FieldSpec::new("rating", "総合評価"), score),
        care_rating: rating_or_band(FieldSpec::new("care_rating", "ケア評価"), care_score),
        onecolor_rating: rating_or_band(
            FieldSpec::new("onecolor_rating", "ワンカラー評価"),
            onecolor_score,
        ),
        time_rating: rating_or_band(FieldSpec::new("time_rating", "タイム評価"), time_score),
        duration_minutes: duration.map(|d| d.minutes.unwrap_or(0)),
        duration_seconds: duration.map(|d| d.seconds.unwrap_or(0)),
    }
}
