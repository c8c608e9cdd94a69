//! Keyword tables that drive field extraction.
//!
//! The tables are data, not logic: they ship with a default set tuned for
//! WeChat Pay / Taobao / Pinduoduo / JD order screens and can be replaced or
//! extended from TOML without touching the extractor.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Bumped whenever the built-in tables change meaningfully.
pub const DEFAULT_TABLES_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum KeywordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse keyword tables: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid keyword tables: {0}")]
    Invalid(String),
}

/// A phrase that marks a line as likely holding a field. Lower priority wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub phrase: String,
    pub priority: u32,
}

/// Anchors kept sorted by priority (ties keep insertion order).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Anchor>", into = "Vec<Anchor>")]
pub struct AnchorTable(Vec<Anchor>);

impl From<Vec<Anchor>> for AnchorTable {
    fn from(mut anchors: Vec<Anchor>) -> Self {
        anchors.sort_by_key(|a| a.priority);
        AnchorTable(anchors)
    }
}

impl From<AnchorTable> for Vec<Anchor> {
    fn from(table: AnchorTable) -> Self {
        table.0
    }
}

impl AnchorTable {
    /// Priorities follow the order given.
    pub fn from_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let anchors = phrases
            .into_iter()
            .zip(0u32..)
            .map(|(phrase, priority)| Anchor {
                phrase: phrase.into(),
                priority,
            })
            .collect::<Vec<_>>();
        AnchorTable::from(anchors)
    }

    pub fn insert(&mut self, phrase: impl Into<String>, priority: u32) {
        let at = self.0.partition_point(|a| a.priority <= priority);
        self.0.insert(
            at,
            Anchor {
                phrase: phrase.into(),
                priority,
            },
        );
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Walk anchors by priority. For each one, only the first line containing
    /// its phrase is probed; the first probe that yields a value wins.
    pub fn first_match<'l, T>(
        &self,
        lines: &[&'l str],
        mut probe: impl FnMut(&'l str) -> Option<T>,
    ) -> Option<(&Anchor, T)> {
        self.0.iter().find_map(|anchor| {
            let line = lines
                .iter()
                .copied()
                .find(|l| l.contains(anchor.phrase.as_str()))?;
            probe(line).map(|value| (anchor, value))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordTables {
    pub version: u32,

    // ── Date ──────────────────────────────────────────────────────────────────
    pub date_anchors: AnchorTable,

    // ── Price ─────────────────────────────────────────────────────────────────
    pub price_anchors: AnchorTable,
    /// On a line containing this marker, the amount right after it wins.
    pub total_marker: String,
    /// Fallback amounts at or above this are treated as stray IDs.
    pub price_ceiling: u64,

    // ── Name ──────────────────────────────────────────────────────────────────
    pub noise_phrases: Vec<String>,
    /// Lines shorter than this (in characters) are noise.
    pub min_name_chars: usize,
    /// Without a store anchor, a title must be longer than this.
    pub fallback_name_chars: usize,
    pub store_markers: Vec<String>,
    pub breadcrumb: String,
    /// How many lines from the top are searched for a store anchor.
    pub store_search_lines: usize,
    /// Reaching a line with any of these ends the title search.
    pub section_stops: Vec<String>,
    pub title_open: String,
    pub title_close: String,
}

impl Default for KeywordTables {
    fn default() -> Self {
        Self {
            version: DEFAULT_TABLES_VERSION,
            date_anchors: AnchorTable::from_phrases(["下单时间", "付款时间", "创建时间", "交易时间"]),
            price_anchors: AnchorTable::from_phrases([
                "实付款", "实付", "成交价", "应付款", "合计", "商品总价",
            ]),
            total_marker: "合计".into(),
            price_ceiling: 10_000_000,
            noise_phrases: strings(&[
                // status bar
                "中国移动", "中国联通", "Wifi", "4G", "5G", "AM", "PM",
                // navigation
                "订单", "交易", "详情", "帮助", "返回", "首页", "搜索", "我的",
                // actions
                "复制", "评价", "再次购买", "再买一单", "查看", "物流", "退款", "售后",
                // logistics
                "发货", "收货", "地址", "配送", "快递", "准时送达", "已签收", "送达",
                // payment
                "微信支付", "支付宝", "优惠", "折扣",
                // date and price rows
                "下单时间", "付款时间", "实付款", "合计", "总价",
                // buttons
                "联系商家", "分享商品", "申请退款",
                // screenshot artifacts
                "互图", "巴图", "描述", "服务", "质量",
            ]),
            min_name_chars: 5,
            fallback_name_chars: 6,
            store_markers: strings(&["旗舰店", "专营店", "超市"]),
            breadcrumb: ">".into(),
            store_search_lines: 12,
            section_stops: strings(&["实付", "合计", "下单"]),
            title_open: "【".into(),
            title_close: "】".into(),
        }
    }
}

impl KeywordTables {
    /// Parse tables from TOML. Keys left out keep their default values.
    pub fn from_toml(content: &str) -> Result<Self, KeywordError> {
        let tables: KeywordTables = toml::from_str(content)?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn load(path: &Path) -> Result<Self, KeywordError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, KeywordError> {
        toml::to_string_pretty(self).map_err(|e| KeywordError::Invalid(e.to_string()))
    }

    pub fn with_noise_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for p in phrases {
            let p = p.into();
            if !self.noise_phrases.contains(&p) {
                self.noise_phrases.push(p);
            }
        }
        self
    }

    pub fn with_price_anchor(mut self, phrase: impl Into<String>, priority: u32) -> Self {
        self.price_anchors.insert(phrase, priority);
        self
    }

    pub fn with_date_anchor(mut self, phrase: impl Into<String>, priority: u32) -> Self {
        self.date_anchors.insert(phrase, priority);
        self
    }

    pub fn validate(&self) -> Result<(), KeywordError> {
        let empty_anchor = self
            .date_anchors
            .iter()
            .chain(self.price_anchors.iter())
            .any(|a| a.phrase.is_empty());
        if empty_anchor {
            return Err(KeywordError::Invalid("anchor phrases must not be empty".into()));
        }
        if self.total_marker.is_empty() {
            return Err(KeywordError::Invalid("total_marker must not be empty".into()));
        }
        if self.noise_phrases.iter().any(String::is_empty)
            || self.store_markers.iter().any(String::is_empty)
            || self.section_stops.iter().any(String::is_empty)
        {
            // An empty phrase would match every line.
            return Err(KeywordError::Invalid("phrase lists must not contain empty strings".into()));
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
