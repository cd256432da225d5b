//! 数值字段解析
//!
//! 预估值 / 实际值单元格可能带货币符号、千分位、百分号、括号负数、K/M/B 量级后缀

/// 单元格解析结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    /// 解析成功
    Value(f64),
    /// 单元格为空或是占位符（不算解析失败）
    Empty,
    /// 有内容但无法解析
    Invalid,
}

impl Numeric {
    pub fn value(self) -> Option<f64> {
        match self {
            Numeric::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_invalid(self) -> bool {
        matches!(self, Numeric::Invalid)
    }
}

const EMPTY_MARKERS: &[&str] = &["", "-", "--", "—", "–", "n/a", "na", "none", "null"];
const CURRENCY_CODES: &[&str] = &["usd", "eur", "gbp", "jpy", "cny", "hkd", "cad", "aud", "chf"];

/// 解析单元格文本
pub fn parse_numeric(raw: &str) -> Numeric {
    let text = raw.trim();
    if EMPTY_MARKERS.contains(&text.to_ascii_lowercase().as_str()) {
        return Numeric::Empty;
    }

    let mut s: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '$' | '€' | '£' | '¥' | '%'))
        .collect();

    let lower = s.to_ascii_lowercase();
    for code in CURRENCY_CODES {
        if let Some(rest) = lower.strip_prefix(code) {
            s = s[s.len() - rest.len()..].to_string();
            break;
        }
        if let Some(rest) = lower.strip_suffix(code) {
            s = s[..rest.len()].to_string();
            break;
        }
    }

    let negative_parens = s.starts_with('(') && s.ends_with(')') && s.len() > 2;
    if negative_parens {
        s = s[1..s.len() - 1].to_string();
    }

    let multiplier = match s.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('K') => 1e3,
        Some('M') => 1e6,
        Some('B') => 1e9,
        Some('T') => 1e12,
        _ => 1.0,
    };
    if multiplier != 1.0 {
        s.pop();
    }

    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            let v = v * multiplier;
            Numeric::Value(if negative_parens { -v } else { v })
        }
        _ => Numeric::Invalid,
    }
}
