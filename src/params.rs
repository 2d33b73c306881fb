//! List request parameters, validated once at the HTTP boundary.

use std::collections::HashMap;

/// Page sizes a client may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageLimit {
    One = 1,
    Two = 2,
    Three = 3,
    Five = 5,
    Ten = 10,
    Twenty = 20,
    Thirty = 30,
    Forty = 40,
    Sixty = 60,
}

impl PageLimit {
    pub const ALL: [PageLimit; 9] = [
        PageLimit::One,
        PageLimit::Two,
        PageLimit::Three,
        PageLimit::Five,
        PageLimit::Ten,
        PageLimit::Twenty,
        PageLimit::Thirty,
        PageLimit::Forty,
        PageLimit::Sixty,
    ];

    pub fn get(self) -> u64 {
        self as u64
    }

    /// Parse a raw `limit` value. Anything outside the allowed set is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = parse_int(raw)?;
        Self::ALL.into_iter().find(|limit| limit.get() as i64 == value)
    }
}

impl Default for PageLimit {
    fn default() -> Self {
        PageLimit::Twenty
    }
}

/// Resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub num: u64,
    pub limit: PageLimit,
    pub skip: u64,
}

impl PageInfo {
    /// The skip saturates at `i64::MAX`, the largest offset a store accepts.
    pub fn new(num: u64, limit: PageLimit) -> Self {
        let num = num.max(1);
        Self {
            num,
            limit,
            skip: (num - 1).saturating_mul(limit.get()).min(i64::MAX as u64),
        }
    }

    /// A page past the first whose offset lands beyond the matching records.
    pub fn is_past_end(&self, records_count: u64) -> bool {
        self.num > 1 && self.skip >= records_count
    }
}

/// Inclusive numeric bounds for a range filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub low: f64,
    pub high: f64,
}

impl Range {
    /// Clamp untrusted bounds. `None` when neither bound was given.
    ///
    /// A missing, non-numeric or negative low bound becomes 0; a missing,
    /// non-numeric or inverted high bound becomes `f64::MAX`.
    pub fn sanitize(low: Option<&str>, high: Option<&str>) -> Option<Self> {
        if low.is_none() && high.is_none() {
            return None;
        }
        let low = low
            .and_then(parse_float)
            .filter(|v| *v >= 0.0)
            .unwrap_or(0.0);
        let high = high
            .and_then(parse_float)
            .filter(|v| *v >= low)
            .unwrap_or(f64::MAX);
        Some(Self { low, high })
    }
}

/// Query parameters understood by the list endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub fields: Option<String>,
    /// Requested page, at least 1.
    pub page: u64,
    /// Requested page size, `None` when absent or not an allowed value.
    pub limit: Option<PageLimit>,
    pub price_low: Option<String>,
    pub price_high: Option<String>,
    pub discount_low: Option<String>,
    pub discount_high: Option<String>,
    pub brand: Option<String>,
    pub deals: bool,
    pub sort_by: Option<String>,
    /// Product identifier filter for order history.
    pub product: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            search: None,
            sort: None,
            fields: None,
            page: 1,
            limit: None,
            price_low: None,
            price_high: None,
            discount_low: None,
            discount_high: None,
            brand: None,
            deals: false,
            sort_by: None,
            product: None,
        }
    }
}

impl ListParams {
    pub fn from_query(query: Option<&str>) -> Self {
        Self::from_map(parse_query(query))
    }

    pub fn from_map(mut map: HashMap<String, String>) -> Self {
        let mut take = |key: &str| map.remove(key).filter(|v| !v.trim().is_empty());

        let page = take("page")
            .and_then(|p| parse_int(&p))
            .filter(|p| *p >= 1)
            .unwrap_or(1) as u64;
        let limit = take("limit").and_then(|l| PageLimit::parse(&l));

        Self {
            search: take("search"),
            sort: take("sort"),
            fields: take("fields"),
            page,
            limit,
            price_low: take("price_low"),
            price_high: take("price_high"),
            discount_low: take("discount_low"),
            discount_high: take("discount_high"),
            brand: take("brand"),
            deals: take("deals").is_some_and(|d| d == "true"),
            sort_by: take("sortBy"),
            product: take("product"),
        }
    }

    /// Resolve the page window, using `default_limit` when no valid limit was given.
    pub fn page_info(&self, default_limit: PageLimit) -> PageInfo {
        PageInfo::new(self.page, self.limit.unwrap_or(default_limit))
    }

    pub fn price_range(&self) -> Option<Range> {
        Range::sanitize(self.price_low.as_deref(), self.price_high.as_deref())
    }

    pub fn discount_range(&self) -> Option<Range> {
        Range::sanitize(self.discount_low.as_deref(), self.discount_high.as_deref())
    }
}

/// Leading-integer parse: `"12abc"` is 12, `"abc"` is `None`.
fn parse_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let digits_start = usize::from(s.starts_with(|c: char| c == '-' || c == '+'));
    let digits_end = s[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |i| i + digits_start);
    if digits_end == digits_start {
        return None;
    }
    s[..digits_end].parse().ok()
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse query string into key-value pairs
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(q) = query {
        for part in q.split('&') {
            if let Some((key, value)) = part.split_once('=') {
                map.insert(urldecode(key), urldecode(value));
            }
        }
    }
    map
}

fn urldecode(s: &str) -> String {
    let mut bytes = Vec::with_capacity(s.len());
    let mut iter = s.bytes();
    while let Some(b) = iter.next() {
        match b {
            b'%' => {
                let hex: Vec<u8> = iter.by_ref().take(2).collect();
                match std::str::from_utf8(&hex).ok().and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => bytes.push(byte),
                    None => {
                        bytes.push(b'%');
                        bytes.extend_from_slice(&hex);
                    }
                }
            }
            b'+' => bytes.push(b' '),
            _ => bytes.push(b),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_outside_the_allowed_set_fall_back_to_default() {
        for raw in ["0", "4", "7", "25", "61", "100", "1000000", "-20", "abc", ""] {
            let params = ListParams::from_query(Some(&format!("limit={raw}")));
            assert_eq!(params.page_info(PageLimit::Twenty).limit, PageLimit::Twenty, "limit={raw}");
        }
    }

    #[test]
    fn allowed_limits_are_kept() {
        for limit in PageLimit::ALL {
            let params = ListParams::from_query(Some(&format!("limit={}", limit.get())));
            assert_eq!(params.page_info(PageLimit::Twenty).limit, limit);
        }
    }

    #[test]
    fn handler_default_limit_applies_to_invalid_values() {
        let params = ListParams::from_query(Some("limit=7"));
        assert_eq!(params.page_info(PageLimit::Ten).limit, PageLimit::Ten);
    }

    #[test]
    fn bad_pages_resolve_to_first_page() {
        for raw in ["0", "-3", "abc", ""] {
            let info = ListParams::from_query(Some(&format!("page={raw}"))).page_info(PageLimit::Twenty);
            assert_eq!(info.num, 1, "page={raw}");
            assert_eq!(info.skip, 0, "page={raw}");
        }
        let info = ListParams::from_query(None).page_info(PageLimit::Twenty);
        assert_eq!((info.num, info.skip), (1, 0));
    }

    #[test]
    fn skip_follows_page_and_limit() {
        let info = ListParams::from_query(Some("page=3&limit=20")).page_info(PageLimit::Twenty);
        assert_eq!(info, PageInfo { num: 3, limit: PageLimit::Twenty, skip: 40 });

        let info = ListParams::from_query(Some("page=2x&limit=5")).page_info(PageLimit::Twenty);
        assert_eq!(info.skip, 5);
    }

    #[test]
    fn huge_pages_saturate_instead_of_overflowing() {
        let info = ListParams::from_query(Some("page=9223372036854775807&limit=60")).page_info(PageLimit::Twenty);
        assert_eq!(info.num, i64::MAX as u64);
        assert_eq!(info.skip, i64::MAX as u64);
        assert!(info.is_past_end(1_000_000));

        let info = PageInfo::new(u64::MAX, PageLimit::Sixty);
        assert_eq!(info.skip, i64::MAX as u64);
    }

    #[test]
    fn past_end_only_beyond_first_page() {
        assert!(PageInfo::new(3, PageLimit::Twenty).is_past_end(10));
        assert!(!PageInfo::new(1, PageLimit::Twenty).is_past_end(0));
        assert!(!PageInfo::new(2, PageLimit::Five).is_past_end(6));
        assert!(PageInfo::new(2, PageLimit::Five).is_past_end(5));
    }

    #[test]
    fn ranges_are_clamped() {
        assert_eq!(Range::sanitize(None, None), None);
        assert_eq!(
            Range::sanitize(Some("-5"), Some("10")),
            Some(Range { low: 0.0, high: 10.0 })
        );
        assert_eq!(
            Range::sanitize(Some("50"), Some("10")),
            Some(Range { low: 50.0, high: f64::MAX })
        );
        assert_eq!(
            Range::sanitize(Some("cheap"), Some("nope")),
            Some(Range { low: 0.0, high: f64::MAX })
        );
    }

    #[test]
    fn query_values_are_decoded() {
        let params = ListParams::from_query(Some(
            "search=home%20%26+kitchen&sortBy=rating&deals=true&brand=&fields=name,-_id",
        ));
        assert_eq!(params.search.as_deref(), Some("home & kitchen"));
        assert_eq!(params.sort_by.as_deref(), Some("rating"));
        assert!(params.deals);
        assert_eq!(params.brand, None);
        assert_eq!(params.fields.as_deref(), Some("name,-_id"));
    }

    #[test]
    fn deals_needs_literal_true() {
        assert!(!ListParams::from_query(Some("deals=1")).deals);
    }
}
