use std::sync::OnceLock;

use chrono::NaiveDate;
use costlens_core::Money;
use rust_decimal::Decimal;
use tracing::debug;

use crate::keywords::KeywordTables;
use crate::types::ExtractedFields;

// Anchor lines also accept y/Y and 元: cleanup cannot catch every misread ¥.
const CURRENCY_GLYPHS: [char; 5] = ['¥', '￥', 'y', 'Y', '元'];

re!(re_date, r"([0-9]{4})[-年.]([0-9]{1,2})[-月.]([0-9]{1,2})");
re!(re_currency_amount, r"[¥￥yY元]\s*([0-9.]+)");
// Without an anchor only a real yen sign counts; "Sony 1000XM5" is not ¥1000.
re!(re_yen_amount, r"[¥￥]\s*([0-9.]+)");
re!(re_quantity_prefix, r"^[0-9]+件");
re!(re_digits_only, r"^[0-9]+$");
re!(re_date_time_only, r"^[0-9\-: ]+$");
re!(re_leading_clock, r"^[0-9]{2}:[0-9]{2}");

// ── Public extraction API ─────────────────────────────────────────────────────

/// Heuristic field extractor for order screenshots, parameterized by
/// [`KeywordTables`]. Extraction never fails; misses are `None`.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    tables: KeywordTables,
}

/// Extract with the built-in keyword tables.
pub fn extract(text: &str) -> ExtractedFields {
    static DEFAULT: OnceLock<Extractor> = OnceLock::new();
    DEFAULT.get_or_init(Extractor::default).extract(text)
}

/// Non-empty, trimmed lines.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

impl Extractor {
    pub fn new(tables: KeywordTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &KeywordTables {
        &self.tables
    }

    /// Extract structured fields from cleaned OCR text. The three fields are
    /// found independently of each other.
    pub fn extract(&self, text: &str) -> ExtractedFields {
        let lines = split_lines(text);
        let fields = ExtractedFields {
            name: self.extract_name(&lines),
            price: self.extract_price(&lines),
            purchase_date: self.extract_date(&lines),
        };
        debug!(
            lines = lines.len(),
            found = fields.field_count(),
            "extracted order fields"
        );
        fields
    }

    // ── Date ─────────────────────────────────────────────────────────────────

    pub fn extract_date(&self, lines: &[&str]) -> Option<NaiveDate> {
        if let Some((anchor, date)) = self.tables.date_anchors.first_match(lines, find_date) {
            debug!(anchor = %anchor.phrase, %date, "date from anchor");
            return Some(date);
        }
        // May pick up an unrelated date; nothing better is known without an anchor.
        lines.iter().find_map(|l| find_date(l))
    }

    // ── Price ────────────────────────────────────────────────────────────────

    pub fn extract_price(&self, lines: &[&str]) -> Option<Money> {
        let marker = self.tables.total_marker.as_str();
        let anchored = self.tables.price_anchors.first_match(lines, |line| {
            if line.contains(marker) {
                // "实付款 共减 ¥19.9 合计 ¥179.1": the total follows the marker.
                if let Some(total) = amount_after_marker(line, marker) {
                    return Some(total);
                }
            }
            // Settled amounts sit rightmost in payment rows.
            currency_amounts(line).last()
        });
        if let Some((anchor, price)) = anchored {
            debug!(anchor = %anchor.phrase, %price, "price from anchor");
            return Some(price);
        }

        let ceiling = Money::new(Decimal::from(self.tables.price_ceiling));
        let price = lines
            .iter()
            .flat_map(|l| yen_amounts(l))
            .filter(|p| p.is_positive() && *p < ceiling)
            .max();
        if let Some(p) = price {
            debug!(price = %p, "price from largest amount");
        }
        price
    }

    // ── Name ─────────────────────────────────────────────────────────────────

    pub fn extract_name(&self, lines: &[&str]) -> Option<String> {
        let t = &self.tables;
        let store = lines
            .iter()
            .take(t.store_search_lines)
            .position(|l| self.is_store_anchor(l));
        let start = store.map_or(0, |i| i + 1);

        let mut candidate = None;
        for &line in &lines[start..] {
            if t.section_stops.iter().any(|s| line.contains(s.as_str())) {
                break;
            }
            if self.is_noise(line) {
                continue;
            }
            if self.is_promo_title(line) {
                debug!(line, "name from promo title marker");
                candidate = Some(line);
                break;
            }
            if store.is_some() {
                debug!(line, "name follows store anchor");
                candidate = Some(line);
                break;
            }
            if char_len(line) > t.fallback_name_chars {
                debug!(line, "name from first long line");
                candidate = Some(line);
                break;
            }
        }

        let name = re_quantity_prefix().replace(candidate?, "");
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    /// UI chrome, logistics, payment rows and other lines that are never a
    /// product title.
    pub fn is_noise(&self, line: &str) -> bool {
        char_len(line) < self.tables.min_name_chars
            || re_digits_only().is_match(line)
            || re_date_time_only().is_match(line)
            || re_leading_clock().is_match(line)
            || self
                .tables
                .noise_phrases
                .iter()
                .any(|p| line.contains(p.as_str()))
    }

    fn is_store_anchor(&self, line: &str) -> bool {
        let t = &self.tables;
        t.store_markers.iter().any(|m| line.contains(m.as_str()))
            || (!t.breadcrumb.is_empty()
                && char_len(line) > 2
                && line.contains(t.breadcrumb.as_str()))
    }

    fn is_promo_title(&self, line: &str) -> bool {
        let t = &self.tables;
        (!t.title_open.is_empty() && line.starts_with(t.title_open.as_str()))
            || (!t.title_close.is_empty() && line.contains(t.title_close.as_str()))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// First `YYYY-M-D` style date on the line, zero-padding handled by `NaiveDate`.
/// Impossible dates (month 13, Feb 30) count as no date.
fn find_date(line: &str) -> Option<NaiveDate> {
    let c = re_date().captures(line)?;
    let y: i32 = c.get(1)?.as_str().parse().ok()?;
    let m: u32 = c.get(2)?.as_str().parse().ok()?;
    let d: u32 = c.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

fn currency_amounts(line: &str) -> impl Iterator<Item = Money> + '_ {
    re_currency_amount()
        .captures_iter(line)
        .filter_map(|c| Money::parse_amount(c.get(1)?.as_str()))
}

fn yen_amounts(line: &str) -> impl Iterator<Item = Money> + '_ {
    re_yen_amount()
        .captures_iter(line)
        .filter_map(|c| Money::parse_amount(c.get(1)?.as_str()))
}

/// The first currency amount after an occurrence of `marker`, with only
/// non-digit, non-currency text in between.
fn amount_after_marker(line: &str, marker: &str) -> Option<Money> {
    line.match_indices(marker).find_map(|(at, _)| {
        let rest = &line[at + marker.len()..];
        let rest = rest.trim_start_matches(|c: char| {
            !c.is_ascii_digit() && c != '\n' && !CURRENCY_GLYPHS.contains(&c)
        });
        let rest = rest.strip_prefix(|c: char| CURRENCY_GLYPHS.contains(&c))?;
        let rest = rest.trim_start();
        if !rest.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        Money::parse_amount(rest)
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::cleanup;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ── Date ─────────────────────────────────────────────────────────────────

    #[test]
    fn date_anchor_priority_beats_line_order() {
        let r = extract("创建时间 2024-01-01\n下单时间 2024-03-15");
        assert_eq!(r.purchase_date, Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn date_chinese_and_dotted_formats() {
        assert_eq!(extract("下单时间 2024年3月5日 10:21").purchase_date, Some(ymd(2024, 3, 5)));
        assert_eq!(extract("付款时间：2024.03.15").purchase_date, Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn date_anchor_without_date_moves_to_next_anchor() {
        let r = extract("下单时间 请稍后\n付款时间 2024-02-02 08:00:01");
        assert_eq!(r.purchase_date, Some(ymd(2024, 2, 2)));
    }

    #[test]
    fn date_falls_back_to_first_dated_line() {
        let r = extract("安踏旗舰店\n预计 2024-05-20 送达\n发票 2024-06-01");
        assert_eq!(r.purchase_date, Some(ymd(2024, 5, 20)));
    }

    #[test]
    fn impossible_date_is_ignored() {
        let r = extract("下单时间 2024-13-45\n交易时间 2024-02-29");
        assert_eq!(r.purchase_date, Some(ymd(2024, 2, 29)));
    }

    #[test]
    fn no_date_is_none() {
        assert!(extract("实付款 ¥5").purchase_date.is_none());
    }

    // ── Price ────────────────────────────────────────────────────────────────

    #[test]
    fn total_marker_wins_on_mixed_line() {
        let r = extract("实付款 共减 ¥19.9 合计 ¥179.1");
        assert_eq!(r.price, Some(money("179.1")));
    }

    #[test]
    fn last_amount_on_anchor_line() {
        let r = extract("实付款 ¥199.00 ¥189.00");
        assert_eq!(r.price, Some(money("189")));
    }

    #[test]
    fn higher_priority_anchor_wins() {
        let r = extract("合计 ¥200.00\n实付款 ¥180.00");
        assert_eq!(r.price, Some(money("180")));
    }

    #[test]
    fn anchor_line_without_amount_falls_through() {
        let r = extract("实付款\n成交价 ¥66");
        assert_eq!(r.price, Some(money("66")));
    }

    #[test]
    fn misread_glyphs_still_count_as_currency() {
        assert_eq!(extract("实付 y 35.5").price, Some(money("35.5")));
        assert_eq!(extract("应付款 元12").price, Some(money("12")));
        assert_eq!(extract("商品总价 ￥88").price, Some(money("88")));
    }

    #[test]
    fn total_marker_without_currency_uses_last_amount() {
        let r = extract("合计 3件 ¥99.00");
        assert_eq!(r.price, Some(money("99")));
    }

    #[test]
    fn fallback_takes_largest_amount_under_ceiling() {
        let r = extract("跑步鞋 ¥299\n运费 ¥12\n编号 ¥123456789");
        assert_eq!(r.price, Some(money("299")));
    }

    #[test]
    fn fallback_ignores_y_inside_latin_text() {
        let r = extract("Sony 1000XM5 头戴式耳机\n运费 ¥0");
        assert!(r.price.is_none());
        let r = extract("Galaxy 24 Ultra 手机壳\n商品 ¥39.9");
        assert_eq!(r.price, Some(money("39.9")));
    }

    #[test]
    fn no_price_pattern_is_none() {
        let r = extract("安踏旗舰店\n【爆款】安踏跑步鞋\n下单时间 2024-03-15");
        assert!(r.price.is_none());
    }

    #[test]
    fn cleaned_latin_y_yields_price() {
        let cleaned = cleanup("实付款 y199");
        assert_eq!(cleaned, "实付款 ¥199");
        assert_eq!(extract(&cleaned).price, Some(money("199")));
    }

    #[test]
    fn amount_after_marker_skips_occurrence_without_amount() {
        assert_eq!(amount_after_marker("合计 共2件 合计 ¥5", "合计"), Some(money("5")));
        assert_eq!(amount_after_marker("合计 ¥", "合计"), None);
        assert_eq!(amount_after_marker("合计 ¥ 7.5元", "合计"), Some(money("7.5")));
    }

    // ── Name ─────────────────────────────────────────────────────────────────

    #[test]
    fn name_rejects_status_bar_and_store_lines() {
        let r = extract("中国移动 4G\n安踏旗舰店\n【爆款】安踏跑步鞋\n实付款 ¥299");
        assert_eq!(r.name.as_deref(), Some("【爆款】安踏跑步鞋"));
    }

    #[test]
    fn name_strips_quantity_prefix() {
        let r = extract("Sony旗舰店\n1件 Sony WH-1000XM5\n实付款 ¥2299");
        assert_eq!(r.name.as_deref(), Some("Sony WH-1000XM5"));
    }

    #[test]
    fn name_line_after_store_anchor_even_if_short() {
        let r = extract("Apple>\n退款 售后\nAirPods\n实付 ¥1299");
        assert_eq!(r.name.as_deref(), Some("AirPods"));
    }

    #[test]
    fn name_fallback_needs_long_line_without_store() {
        let r = extract("20:28 5G\n保温杯\n大容量保温杯男士\n实付 ¥39");
        assert_eq!(r.name.as_deref(), Some("大容量保温杯男士"));
    }

    #[test]
    fn name_search_stops_at_price_section() {
        let r = extract("20:28\n实付款 ¥99\n纯棉圆领短袖T恤");
        assert!(r.name.is_none());
    }

    #[test]
    fn name_promo_marker_mid_line_without_store() {
        // Six characters: too short for the long-line fallback, but the marker wins.
        let r = extract("12:00 5G\n好物】保温杯\n实付 ¥5");
        assert_eq!(r.name.as_deref(), Some("好物】保温杯"));
    }

    #[test]
    fn store_anchor_only_searched_near_top() {
        let lines_with_store_at = |at: usize| {
            let mut text: Vec<String> = (0..at).map(|i| format!("{i:02}:00")).collect();
            text.extend(["某某旗舰店", "Kindle", "电子书阅读器青春版"].map(String::from));
            text.join("\n")
        };
        // Index 11 is inside the window: the short line right after the store wins.
        assert_eq!(extract(&lines_with_store_at(11)).name.as_deref(), Some("Kindle"));
        // Index 12 is past it: only a long line qualifies.
        assert_eq!(
            extract(&lines_with_store_at(12)).name.as_deref(),
            Some("电子书阅读器青春版")
        );
    }

    #[test]
    fn noise_predicate() {
        let e = Extractor::default();
        assert!(e.is_noise("1234"));
        assert!(e.is_noise("20240315"));
        assert!(e.is_noise("2024-03-15 12:00"));
        assert!(e.is_noise("12:30 无线耳机套装"));
        assert!(e.is_noise("申请退款的商品"));
        assert!(!e.is_noise("无线蓝牙耳机"));
    }

    #[test]
    fn quantity_only_line_gives_no_name() {
        let r = extract("某某专营店\n12345件\n实付 ¥5");
        assert!(r.name.is_none());
    }

    // ── Whole record ──────────────────────────────────────────────────────────

    #[test]
    fn fields_are_independent() {
        let r = extract("下单时间 2024-03-15");
        assert!(r.name.is_none());
        assert!(r.price.is_none());
        assert_eq!(r.purchase_date, Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn realistic_taobao_screen() {
        let text = "\
09:41 中国移动 5G
< 订单详情
交易成功
安踏官方旗舰店 >
【爆款】安踏男子跑步鞋轻便透气
颜色分类：黑色 42码
x1
商品总价 ¥329.00
店铺优惠 -¥30.00
实付款 ¥299.00
订单编号 3719201234567890
创建时间 2024-03-14 21:10:05
付款时间 2024-03-14 21:10:30";
        let r = extract(text);
        assert_eq!(r.name.as_deref(), Some("【爆款】安踏男子跑步鞋轻便透气"));
        assert_eq!(r.price, Some(money("299")));
        assert_eq!(r.purchase_date, Some(ymd(2024, 3, 14)));
    }

    #[test]
    fn custom_tables_change_behavior() {
        let text = "某某旗舰店\n颜色分类：黑色 42码\n跑鞋 男款 轻便\n到手价 ¥188\n商品总价 ¥300";

        let stock = extract(text);
        assert_eq!(stock.name.as_deref(), Some("颜色分类：黑色 42码"));
        assert_eq!(stock.price, Some(money("300")));

        let tables = KeywordTables::default()
            .with_noise_phrases(["颜色分类"])
            .with_price_anchor("到手价", 0);
        let r = Extractor::new(tables).extract(text);
        assert_eq!(r.name.as_deref(), Some("跑鞋 男款 轻便"));
        assert_eq!(r.price, Some(money("188")));
    }

    #[test]
    fn custom_date_anchor_outranks_lower_builtin_ones() {
        let text = "创建时间 2024-03-10\n签收时间 2024-03-18";
        assert_eq!(extract(text).purchase_date, Some(ymd(2024, 3, 10)));

        let tables = KeywordTables::default().with_date_anchor("签收时间", 0);
        let r = Extractor::new(tables).extract(text);
        assert_eq!(r.purchase_date, Some(ymd(2024, 3, 18)));
    }

    #[test]
    fn empty_text_gives_empty_record() {
        assert!(extract("").is_empty());
        assert!(extract("\n \n\t").is_empty());
    }

    #[test]
    fn no_panic_on_garbage_input() {
        let _ = extract("!@#$%^&*()\n\0\x01\x02\n¥¥¥...\n合计合计¥\n【");
    }
}
