//! Field Map Module
//!
//! 1つの構造化ブロック（`field_key → value`）を保持する、挿入順を保つマップ。
//!
//! 読み出しはあいまい検索エンジン（[`crate::lookup`]）経由でのみ行い、
//! 正規化規則を一箇所に集約します。書き込みは取り込み処理（Smart-Set）が担当します。

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::lookup::FieldSpec;

/// 挿入順を保つフィールドマップ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    /// 空のマップを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// エントリー数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 値がすべて空かどうか（空マップも含む）
    pub fn is_blank(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.is_empty())
    }

    /// 既定の別名テーブルであいまい検索する（[`crate::lookup::lookup`]と同じ）
    pub fn lookup(&self, spec: &FieldSpec) -> Option<&str> {
        crate::lookup::lookup(self, spec)
    }

    /// 挿入順のエントリー
    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 挿入順のキー
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub(crate) fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    /// 生キーの完全一致で値を取得（クレート内部用）
    pub(crate) fn raw_get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|idx| self.entries[idx].1.as_str())
    }

    /// キーが存在すれば値を置き換え、なければ末尾に追加する
    pub(crate) fn put(&mut self, key: &str, value: String) {
        match self.position(key) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// 既存エントリーを`<key>#<n>`に退避し、新しい値を`key`として末尾に追加する
    ///
    /// 退避したキー名を返します。既存エントリーの位置（列順）は変わりません。
    pub(crate) fn displace(&mut self, key: &str, value: String) -> Option<String> {
        let idx = self.position(key)?;
        let mut n = 1;
        let renamed = loop {
            let candidate = format!("{}#{}", key, n);
            if self.position(&candidate).is_none() {
                break candidate;
            }
            n += 1;
        };
        self.entries[idx].0 = renamed.clone();
        self.entries.push((key.to_string(), value));
        Some(renamed)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    /// エントリーを順に追加してマップを生成する（同じキーは後勝ちで上書き）
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            let key: String = k.into();
            map.put(&key, v.into());
        }
        map
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct FieldMapVisitor;

impl<'de> Visitor<'de> for FieldMapVisitor {
    type Value = FieldMap;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of field keys to string values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldMap, A::Error> {
        let mut map = FieldMap::new();
        while let Some((key, value)) = access.next_entry::<String, String>()? {
            map.put(&key, value);
        }
        Ok(map)
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FieldMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_keeps_insertion_order() {
        let mut map = FieldMap::new();
        map.put("b", "2".to_string());
        map.put("a", "1".to_string());
        map.put("b", "3".to_string());
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(map.raw_get("b"), Some("3"));
    }

    #[test]
    fn test_displace_keeps_both_values() {
        let mut map: FieldMap = vec![("評価", "A"), ("得点", "80")].into_iter().collect();
        let renamed = map.displace("評価", "AA".to_string());
        assert_eq!(renamed.as_deref(), Some("評価#1"));
        let entries: Vec<(&str, &str)> = map.entries().collect();
        assert_eq!(
            entries,
            vec![("評価#1", "A"), ("得点", "80"), ("評価", "AA")]
        );

        let renamed = map.displace("評価", "AAA".to_string());
        assert_eq!(renamed.as_deref(), Some("評価#2"));
        assert_eq!(map.raw_get("評価"), Some("AAA"));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_displace_missing_key() {
        let mut map = FieldMap::new();
        assert!(map.displace("x", "1".to_string()).is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn test_is_blank() {
        assert!(FieldMap::new().is_blank());
        let map: FieldMap = vec![("a", ""), ("b", "")].into_iter().collect();
        assert!(map.is_blank());
        let map: FieldMap = vec![("a", ""), ("b", "↑")].into_iter().collect();
        assert!(!map.is_blank());
    }

    #[test]
    fn test_serde_preserves_order() {
        let map: FieldMap = vec![("z", "1"), ("a", "2"), ("m", "3")].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"z":"1","a":"2","m":"3"}"#);

        let back: FieldMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
