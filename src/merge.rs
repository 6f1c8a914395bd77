//! Time Fragment Merger Module ("Smart-Set")
//!
//! 範囲抽出時にフィールドマップへ値を書き込む際の合成規則を実装するモジュール。
//!
//! 元のスプレッドシートは、1つの所要時間を見出しのない隣接列（分・秒）に
//! 分割して持つことがあります。Smart-Setはこれらの断片を
//! `"<分>分<秒:02>秒"`形式の1つの集約フィールドにまとめ、
//! 時間以外の値は自分のキーに書き込みます（既存の値を黙って捨てることはありません）。
//!
//! 素の整数が2つ続いた場合、先に来た方を分、後に来た方を秒として扱います。

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::field_map::FieldMap;
use crate::header::is_placeholder_key;
use crate::normalize::normalize;

static MIN_SEC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)分(?:([0-9]+)秒?)?$").expect("minute/second pattern is valid")
});
static SEC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)秒$").expect("second pattern is valid"));
static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([0-9]+)[:'’′]([0-9]{1,2})["”″]?$"#).expect("clock pattern is valid")
});
static BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("bare integer pattern is valid"));

/// キーに含まれていれば時間系フィールドとみなす語
const TIME_KEY_MARKERS: &[&str] = &["時間", "タイム", "time", "Time", "TIME"];

/// 分・秒の組（どちらかが欠けていてもよい）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeParts {
    /// 分
    pub minutes: Option<u32>,
    /// 秒
    pub seconds: Option<u32>,
}

impl TimeParts {
    /// 分と秒の両方が揃っているか
    pub fn is_complete(&self) -> bool {
        self.minutes.is_some() && self.seconds.is_some()
    }

    /// `other`で値のある部分を上書きした組を返す
    fn overlay(self, other: TimeParts) -> TimeParts {
        TimeParts {
            minutes: other.minutes.or(self.minutes),
            seconds: other.seconds.or(self.seconds),
        }
    }

    /// 正規形の文字列（`"5分30秒"`, `"5分"`, `"30秒"`）
    pub fn canonical(&self) -> String {
        match (self.minutes, self.seconds) {
            (Some(m), Some(s)) => format!("{}分{:02}秒", m, s),
            (Some(m), None) => format!("{}分", m),
            (None, Some(s)) => format!("{}秒", s),
            (None, None) => String::new(),
        }
    }

    /// 時間表記（単位つき）を解析する
    ///
    /// `"M分S秒"`, `"M分"`, `"S秒"`, `"M:SS"`, `"M'SS\""`を受け付けます。
    /// 素の整数は単位が分からないため`None`を返します。
    pub fn parse(value: &str) -> Option<TimeParts> {
        let value = normalize(value);
        if let Some(caps) = MIN_SEC_RE.captures(&value) {
            return Some(TimeParts {
                minutes: caps.get(1)?.as_str().parse().ok(),
                seconds: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            });
        }
        if let Some(caps) = SEC_RE.captures(&value) {
            return Some(TimeParts {
                minutes: None,
                seconds: caps.get(1)?.as_str().parse().ok(),
            });
        }
        if let Some(caps) = CLOCK_RE.captures(&value) {
            return Some(TimeParts {
                minutes: caps.get(1)?.as_str().parse().ok(),
                seconds: caps.get(2)?.as_str().parse().ok(),
            });
        }
        None
    }

    /// 合計秒数
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.minutes.unwrap_or(0)) * 60 + u64::from(self.seconds.unwrap_or(0))
    }
}

/// 書き込まれる値の分類
enum Fragment {
    Marked(TimeParts),
    Bare(u32),
    NotTime,
}

impl Fragment {
    fn classify(value: &str) -> Fragment {
        if let Some(parts) = TimeParts::parse(value) {
            return Fragment::Marked(parts);
        }
        let value = normalize(value);
        if BARE_RE.is_match(&value) {
            if let Ok(n) = value.parse() {
                return Fragment::Bare(n);
            }
        }
        Fragment::NotTime
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Minutes,
    Seconds,
}

/// 時間系のキーかどうか
///
/// 時間を表す語を含むキーと、単位だけのキー（`"分"`, `"(秒)"`）、
/// 括弧付きの単位で終わるキー（`"所要(分)"`）が該当します。
/// `"区分"`や`"配分"`のように末尾が`分`でも語幹が時間でないキーは対象外です。
pub fn is_time_key(key: &str) -> bool {
    has_time_word(key) || split_unit(key).is_some()
}

fn has_time_word(key: &str) -> bool {
    let key = normalize(key);
    TIME_KEY_MARKERS.iter().any(|m| key.contains(m))
}

/// キーを語幹と末尾の単位に分ける（"時間(分)" → ("時間", 分)）
///
/// 括弧のない単位は、語幹が空か時間を表す語の場合だけ単位とみなします。
fn split_unit(key: &str) -> Option<(&str, Unit)> {
    let key = key.trim_end();
    let (body, bracketed) = match key.strip_suffix(|c: char| matches!(c, ')' | '）' | ']' | '］')) {
        Some(inner) => (inner.trim_end(), true),
        None => (key, false),
    };
    let (index, last) = body.char_indices().last()?;
    let unit = match last {
        '分' => Unit::Minutes,
        '秒' => Unit::Seconds,
        _ => return None,
    };
    let stem = body[..index].trim_end();

    if bracketed {
        let stem = stem.strip_suffix(|c: char| matches!(c, '(' | '（' | '[' | '［'))?;
        Some((stem.trim_end(), unit))
    } else if stem.is_empty() || has_time_word(stem) {
        Some((stem, unit))
    } else {
        None
    }
}

/// キー末尾の単位
fn unit_of_key(key: &str) -> Option<Unit> {
    split_unit(key).map(|(_, unit)| unit)
}

/// 集約フィールドのキー（末尾の単位・括弧・空白を取り除いたもの）
///
/// 単位を持たないキーや、取り除いた結果が空になるキーは元のキーをそのまま使います。
pub fn aggregate_key(key: &str) -> String {
    match split_unit(key) {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => key.to_string(),
    }
}

/// 未完成の集約フィールド
#[derive(Debug, Clone)]
struct OpenAggregate {
    key: String,
    parts: TimeParts,
    /// 素の整数を分として受け取り、秒を待っている状態
    bare_pending: bool,
}

/// Smart-Set規則でフィールドマップへ書き込むライター
///
/// 1つの範囲抽出（1行 × 1セクション）の間だけ生存し、
/// 分・秒の断片を待っている集約フィールドの状態を保持します。
///
/// # 使用例
///
/// ```rust
/// use scoresheet::{FieldMap, FieldSpec, SmartSet};
///
/// let mut map = FieldMap::new();
/// let mut writer = SmartSet::new(&mut map);
/// writer.set("時間", "5分");
/// writer.set("col_8", "5");
/// writer.set("col_9", "30");
///
/// assert_eq!(map.lookup(&FieldSpec::label("時間")), Some("5分30秒"));
/// ```
pub struct SmartSet<'a> {
    map: &'a mut FieldMap,
    open: Option<OpenAggregate>,
    preserve_duplicates: bool,
}

impl<'a> SmartSet<'a> {
    /// 既存マップに対するライターを生成
    ///
    /// マップ末尾のエントリーが未完成の時間集約（`"5分"`など）であれば、
    /// その集約を開いた状態から再開します。
    pub fn new(map: &'a mut FieldMap) -> Self {
        let open = map
            .entries()
            .last()
            .filter(|(k, _)| is_time_key(k))
            .and_then(|(k, v)| {
                TimeParts::parse(v)
                    .filter(|parts| !parts.is_complete())
                    .map(|parts| OpenAggregate {
                        key: k.to_string(),
                        parts,
                        bare_pending: false,
                    })
            });
        Self {
            map,
            open,
            preserve_duplicates: false,
        }
    }

    /// 同一キー・同一値の列（冗長列）も位置を保ったまま残すかを指定する
    ///
    /// 比較範囲のように列位置そのものに意味がある場合に使用します。
    pub fn preserve_duplicates(mut self, preserve: bool) -> Self {
        self.preserve_duplicates = preserve;
        self
    }

    /// Smart-Set規則で値を書き込む
    pub fn set(&mut self, key: &str, value: &str) {
        let placeholder = is_placeholder_key(key);

        match Fragment::classify(value) {
            Fragment::Marked(parts) => {
                if placeholder {
                    match self.open.as_ref().map(|o| o.key.clone()) {
                        Some(target) => self.merge_into(&target, parts),
                        None => self.plain_set(key, value),
                    }
                } else {
                    self.merge_into(&aggregate_key(key), parts);
                }
            }
            Fragment::Bare(n) => self.set_bare(key, value, n, placeholder),
            Fragment::NotTime => self.plain_set(key, value),
        }
    }

    fn set_bare(&mut self, key: &str, value: &str, n: u32, placeholder: bool) {
        if !placeholder {
            if let Some(unit) = unit_of_key(key) {
                let parts = match unit {
                    Unit::Minutes => TimeParts {
                        minutes: Some(n),
                        seconds: None,
                    },
                    Unit::Seconds => TimeParts {
                        minutes: None,
                        seconds: Some(n),
                    },
                };
                self.merge_into(&aggregate_key(key), parts);
                return;
            }
        }

        let target = aggregate_key(key);
        let continues_open = self
            .open
            .as_ref()
            .is_some_and(|open| placeholder || open.key == target);

        if continues_open {
            if let Some(mut open) = self.open.take() {
                if open.bare_pending {
                    // 2つ目の素の整数は秒
                    open.parts.seconds = Some(n);
                    self.map.put(&open.key, open.parts.canonical());
                } else {
                    // 1つ目の素の整数は分（集約を上書き）
                    open.parts = TimeParts {
                        minutes: Some(n),
                        seconds: None,
                    };
                    open.bare_pending = true;
                    self.map.put(&open.key, open.parts.canonical());
                    self.open = Some(open);
                }
            }
            return;
        }

        if !placeholder && is_time_key(key) {
            let parts = TimeParts {
                minutes: Some(n),
                seconds: None,
            };
            self.map.put(&target, parts.canonical());
            self.open = Some(OpenAggregate {
                key: target,
                parts,
                bare_pending: true,
            });
            return;
        }

        self.plain_set(key, value);
    }

    /// 時間断片を集約フィールドに合成する
    fn merge_into(&mut self, target: &str, parts: TimeParts) {
        let base = match &self.open {
            Some(open) if open.key == target => open.parts,
            _ => TimeParts::default(),
        };
        let merged = base.overlay(parts);
        let canonical = merged.canonical();

        if let Some(previous) = self.map.raw_get(target) {
            if base == TimeParts::default() && !previous.is_empty() && previous != canonical {
                debug!(key = target, previous, value = %canonical, "overwriting time aggregate");
            }
        }
        self.map.put(target, canonical);

        self.open = if merged.is_complete() {
            None
        } else {
            Some(OpenAggregate {
                key: target.to_string(),
                parts: merged,
                bare_pending: false,
            })
        };
    }

    /// 時間以外の値を自分のキーに書き込む
    fn plain_set(&mut self, key: &str, value: &str) {
        if !is_placeholder_key(key) {
            self.open = None;
        }

        let existing = match self.map.raw_get(key) {
            None => {
                self.map.put(key, value.to_string());
                return;
            }
            Some(existing) => existing.to_string(),
        };

        if !self.preserve_duplicates {
            if existing == value || value.is_empty() {
                return;
            }
            if existing.is_empty() {
                self.map.put(key, value.to_string());
                return;
            }
        }

        if let Some(renamed) = self.map.displace(key, value.to_string()) {
            if !self.preserve_duplicates {
                warn!(
                    key,
                    previous = %existing,
                    value,
                    kept_as = %renamed,
                    "ambiguous field: later column wins"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(map: &FieldMap) -> Vec<(String, String)> {
        map.entries()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_time_parts_parse() {
        assert_eq!(
            TimeParts::parse("5分30秒"),
            Some(TimeParts {
                minutes: Some(5),
                seconds: Some(30)
            })
        );
        assert_eq!(
            TimeParts::parse("１２分"),
            Some(TimeParts {
                minutes: Some(12),
                seconds: None
            })
        );
        assert_eq!(
            TimeParts::parse("45秒"),
            Some(TimeParts {
                minutes: None,
                seconds: Some(45)
            })
        );
        assert_eq!(
            TimeParts::parse("7:05"),
            Some(TimeParts {
                minutes: Some(7),
                seconds: Some(5)
            })
        );
        assert_eq!(
            TimeParts::parse("7'05\""),
            Some(TimeParts {
                minutes: Some(7),
                seconds: Some(5)
            })
        );
        assert_eq!(TimeParts::parse("30"), None);
        assert_eq!(TimeParts::parse("5分で終了"), None);
    }

    #[test]
    fn test_canonical_pads_seconds() {
        let parts = TimeParts {
            minutes: Some(5),
            seconds: Some(3),
        };
        assert_eq!(parts.canonical(), "5分03秒");
        assert_eq!(parts.total_seconds(), 303);
    }

    #[test]
    fn test_total_seconds_large_minutes() {
        let parts = TimeParts {
            minutes: Some(u32::MAX),
            seconds: Some(59),
        };
        assert_eq!(parts.total_seconds(), u64::from(u32::MAX) * 60 + 59);
    }

    #[test]
    fn test_aggregate_key() {
        assert_eq!(aggregate_key("時間(分)"), "時間");
        assert_eq!(aggregate_key("時間（秒）"), "時間");
        assert_eq!(aggregate_key("タイム 秒"), "タイム");
        assert_eq!(aggregate_key("分"), "分");
        assert_eq!(aggregate_key("得点"), "得点");
        assert_eq!(aggregate_key("区分"), "区分");
        assert_eq!(aggregate_key("配分"), "配分");
        assert_eq!(aggregate_key("所要［分］"), "所要");
    }

    #[test]
    fn test_time_key_needs_time_stem() {
        assert!(is_time_key("時間"));
        assert!(is_time_key("タイム秒"));
        assert!(is_time_key("分"));
        assert!(is_time_key("所要(分)"));
        assert!(!is_time_key("区分"));
        assert!(!is_time_key("部分"));
        assert!(!is_time_key("得点"));
    }

    #[test]
    fn test_division_column_is_not_a_time_fragment() {
        let mut map = FieldMap::new();
        {
            let mut writer = SmartSet::new(&mut map);
            writer.set("ID", "1001");
            writer.set("区分", "1");
            writer.set("得点", "80");
        }
        assert_eq!(
            entries(&map),
            vec![
                ("ID".to_string(), "1001".to_string()),
                ("区分".to_string(), "1".to_string()),
                ("得点".to_string(), "80".to_string()),
            ]
        );
    }

    #[test]
    fn test_bare_pair_after_existing_aggregate() {
        let mut map = FieldMap::new();
        {
            let mut writer = SmartSet::new(&mut map);
            writer.set("時間", "5分");
            writer.set("col_12", "5");
            writer.set("col_13", "30");
        }
        assert_eq!(map.raw_get("時間"), Some("5分30秒"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_resume_existing_aggregate() {
        let mut map: FieldMap = vec![("タイム", "5分")].into_iter().collect();
        {
            let mut writer = SmartSet::new(&mut map);
            writer.set("col_4", "5");
            writer.set("col_5", "30");
        }
        assert_eq!(map.raw_get("タイム"), Some("5分30秒"));
    }

    #[test]
    fn test_bare_pair_under_time_header() {
        let mut map = FieldMap::new();
        {
            let mut writer = SmartSet::new(&mut map);
            writer.set("所要時間", "8");
            writer.set("col_3", "7");
        }
        assert_eq!(map.raw_get("所要時間"), Some("8分07秒"));
    }

    #[test]
    fn test_unit_headers_merge() {
        let mut map = FieldMap::new();
        {
            let mut writer = SmartSet::new(&mut map);
            writer.set("時間(分)", "6");
            writer.set("時間(秒)", "5");
        }
        assert_eq!(entries(&map), vec![("時間".to_string(), "6分05秒".to_string())]);
    }

    #[test]
    fn test_marked_seconds_on_placeholder() {
        let mut map = FieldMap::new();
        {
            let mut writer = SmartSet::new(&mut map);
            writer.set("タイム", "9分");
            writer.set("col_2", "15秒");
        }
        assert_eq!(map.raw_get("タイム"), Some("9分15秒"));
    }

    #[test]
    fn test_pre_combined_value() {
        let mut map = FieldMap::new();
        SmartSet::new(&mut map).set("時間", "10:20");
        assert_eq!(map.raw_get("時間"), Some("10分20秒"));
    }

    #[test]
    fn test_bare_integer_without_time_context_is_plain() {
        let mut map = FieldMap::new();
        {
            let mut writer = SmartSet::new(&mut map);
            writer.set("得点", "80");
            writer.set("col_3", "30");
        }
        assert_eq!(
            entries(&map),
            vec![
                ("得点".to_string(), "80".to_string()),
                ("col_3".to_string(), "30".to_string())
            ]
        );
    }

    #[test]
    fn test_named_field_closes_open_aggregate() {
        let mut map = FieldMap::new();
        {
            let mut writer = SmartSet::new(&mut map);
            writer.set("時間", "5分");
            writer.set("評価", "A");
            writer.set("col_9", "30");
        }
        assert_eq!(map.raw_get("時間"), Some("5分"));
        assert_eq!(map.raw_get("col_9"), Some("30"));
    }

    #[test]
    fn test_redundant_column_is_ignored() {
        let mut map = FieldMap::new();
        {
            let mut writer = SmartSet::new(&mut map);
            writer.set("評価", "AA");
            writer.set("評価", "AA");
        }
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_conflict_later_wins_and_keeps_previous() {
        let mut map = FieldMap::new();
        {
            let mut writer = SmartSet::new(&mut map);
            writer.set("評価", "A");
            writer.set("評価", "AAA");
        }
        assert_eq!(
            entries(&map),
            vec![
                ("評価#1".to_string(), "A".to_string()),
                ("評価".to_string(), "AAA".to_string())
            ]
        );
    }

    #[test]
    fn test_empty_does_not_override() {
        let mut map = FieldMap::new();
        {
            let mut writer = SmartSet::new(&mut map);
            writer.set("評価", "A");
            writer.set("評価", "");
        }
        assert_eq!(map.raw_get("評価"), Some("A"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_preserve_duplicates_keeps_every_column() {
        let mut map = FieldMap::new();
        {
            let mut writer = SmartSet::new(&mut map).preserve_duplicates(true);
            writer.set("前回比", "↑");
            writer.set("前回比", "");
            writer.set("前回比", "↑");
        }
        let values: Vec<String> = entries(&map).into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec!["↑", "", "↑"]);
    }
}
