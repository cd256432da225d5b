use std::fmt::Display;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 记录主键：公司 ticker + 财季
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub ticker: String,
    /// 财季，格式 `YYYY_Q#`
    pub period: String,
}

impl RecordKey {
    pub fn new(ticker: &str, period: &str) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            period: period.trim().to_string(),
        }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ticker, self.period)
    }
}

/// 一条财报事件记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub key: RecordKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<String>,
    /// 预估值
    #[serde(default)]
    pub estimate: Option<f64>,
    /// 实际值（公布前为 null）
    #[serde(default)]
    pub actual: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub estimate_parse_failed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub actual_parse_failed: bool,
    pub source_url: String,
    pub extracted_at: DateTime<Utc>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl Record {
    /// 非空的可选字段数量
    pub fn completeness(&self) -> usize {
        [
            self.company_name.is_some(),
            self.event_date.is_some(),
            self.event_time.is_some(),
            self.estimate.is_some(),
            self.actual.is_some(),
        ]
        .iter()
        .filter(|v| **v)
        .count()
    }

    /// 新提取的记录是否应覆盖已有记录
    ///
    /// - 已有 actual 为空、新记录有 actual：覆盖
    /// - 两边 actual 都有且不同：后写入者胜
    /// - 已有 actual、新记录为空：永不覆盖
    /// - 两边 actual 都为空：只有新记录严格更完整时才覆盖
    pub fn supersedes(&self, existing: &Record) -> bool {
        match (existing.actual, self.actual) {
            (None, Some(_)) => true,
            (Some(old), Some(new)) => old != new,
            (Some(_), None) => false,
            (None, None) => self.completeness() > existing.completeness(),
        }
    }
}
