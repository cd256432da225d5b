//! 日期与财季工具
//!
//! 页面上的日期格式五花八门（`2024-01-31`、`Jan 31, 2024`、`01/31/2024`、
//! `31 Jan 2024`），统一归一化成 `NaiveDate`，财季统一成 `YYYY_Q#`

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use phf::phf_map;
use regex::Regex;

static MONTHS: phf::Map<&'static str, u32> = phf_map! {
    "jan" => 1, "january" => 1,
    "feb" => 2, "february" => 2,
    "mar" => 3, "march" => 3,
    "apr" => 4, "april" => 4,
    "may" => 5,
    "jun" => 6, "june" => 6,
    "jul" => 7, "july" => 7,
    "aug" => 8, "august" => 8,
    "sep" => 9, "sept" => 9, "september" => 9,
    "oct" => 10, "october" => 10,
    "nov" => 11, "november" => 11,
    "dec" => 12, "december" => 12,
};

const MONTH_PATTERN: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?";

fn iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})").expect("静态正则"))
}

fn us_long_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i){MONTH_PATTERN}\s+(\d{{1,2}}),?\s+(\d{{4}})")).expect("静态正则")
    })
}

fn us_short_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})").expect("静态正则"))
}

fn eu_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)(\d{{1,2}})[-\s]{MONTH_PATTERN}[-\s,]+(\d{{4}})")).expect("静态正则")
    })
}

fn period_res() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            // Q3 2024 / Q3'24 / Q3 FY2024
            Regex::new(r"(?i)^q([1-4])[\s_\-/]*(?:fy)?\s*'?(\d{4}|\d{2})$").expect("静态正则"),
            // 2024 Q3 / 2024_Q3 / FY2024 Q3
            Regex::new(r"(?i)^(?:fy)?\s*(\d{4})[\s_\-/]*q([1-4])$").expect("静态正则"),
            // 3Q24 / 3Q 2024
            Regex::new(r"(?i)^([1-4])q\s*'?(\d{4}|\d{2})$").expect("静态正则"),
        ]
    })
}

/// 把任意格式的日期字符串解析为 `NaiveDate`
///
/// 空字符串、`Unknown` 或无法识别的格式返回 `None`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("unknown") {
        return None;
    }

    if let Some(c) = iso_re().captures(text) {
        return ymd(&c[1], &c[2], &c[3]);
    }

    if let Some(c) = us_long_re().captures(text) {
        let month = month_number(&c[1])?;
        return ymd(&c[3], &month.to_string(), &c[2]);
    }

    if let Some(c) = us_short_re().captures(text) {
        return ymd(&c[3], &c[1], &c[2]);
    }

    if let Some(c) = eu_re().captures(text) {
        let month = month_number(&c[2])?;
        return ymd(&c[3], &month.to_string(), &c[1]);
    }

    ["%d-%m-%Y", "%B %d %Y", "%d %B, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// 把日期格式化成 `YYYY/MM/DD`（输出与日志里统一使用的格式）
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

/// 根据日期所在月份计算财季标签 `YYYY_Q#`
pub fn quarter_label(date: NaiveDate) -> String {
    let quarter = (date.month() - 1) / 3 + 1;
    format!("{}_Q{}", date.year(), quarter)
}

/// 把页面上的财季文本归一化为 `YYYY_Q#`
///
/// 支持 `Q3 2024`、`Q3'24`、`2024 Q3`、`FY2024 Q3`、`3Q24` 等写法
pub fn normalize_period(raw: &str) -> Option<String> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let [quarter_first, year_first, digit_first] = period_res();

    let (year, quarter) = if let Some(c) = quarter_first.captures(text) {
        (c[2].to_string(), c[1].to_string())
    } else if let Some(c) = year_first.captures(text) {
        (c[1].to_string(), c[2].to_string())
    } else if let Some(c) = digit_first.captures(text) {
        (c[2].to_string(), c[1].to_string())
    } else {
        return None;
    };

    let year: i32 = year.parse().ok()?;
    let year = if year < 100 { 2000 + year } else { year };
    Some(format!("{}_Q{}", year, quarter))
}

fn month_number(name: &str) -> Option<u32> {
    let key = name.trim_end_matches('.').to_ascii_lowercase();
    MONTHS.get(key.as_str()).copied()
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-01-31"), Some(d(2024, 1, 31)));
        assert_eq!(parse_date("2024/1/5"), Some(d(2024, 1, 5)));
        assert_eq!(parse_date("Jan 31, 2024"), Some(d(2024, 1, 31)));
        assert_eq!(parse_date("Published Sept. 3, 2024"), Some(d(2024, 9, 3)));
        assert_eq!(parse_date("10/28/2024"), Some(d(2024, 10, 28)));
        assert_eq!(parse_date("31 Jan 2024"), Some(d(2024, 1, 31)));
        assert_eq!(parse_date("7-March-2025"), Some(d(2025, 3, 7)));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("Unknown"), None);
        assert_eq!(parse_date("TBD"), None);
        assert_eq!(parse_date("2024-02-30"), None);
    }

    #[test]
    fn test_quarter_label() {
        assert_eq!(quarter_label(d(2024, 1, 1)), "2024_Q1");
        assert_eq!(quarter_label(d(2024, 6, 30)), "2024_Q2");
        assert_eq!(quarter_label(d(2024, 7, 1)), "2024_Q3");
        assert_eq!(quarter_label(d(2023, 12, 31)), "2023_Q4");
    }

    #[test]
    fn test_normalize_period() {
        assert_eq!(normalize_period("Q3 2024").as_deref(), Some("2024_Q3"));
        assert_eq!(normalize_period("Q3'24").as_deref(), Some("2024_Q3"));
        assert_eq!(normalize_period("2024 Q1").as_deref(), Some("2024_Q1"));
        assert_eq!(normalize_period("2024_Q4").as_deref(), Some("2024_Q4"));
        assert_eq!(normalize_period("FY2025 Q2").as_deref(), Some("2025_Q2"));
        assert_eq!(normalize_period("3Q24").as_deref(), Some("2024_Q3"));
        assert_eq!(normalize_period("Q5 2024"), None);
        assert_eq!(normalize_period("soon"), None);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(d(2024, 3, 9)), "2024/03/09");
    }
}
