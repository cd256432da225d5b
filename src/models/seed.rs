use chrono::NaiveDate;

/// 一个爬取单元：一家公司（ticker）的财报日历页面，可选日期范围
///
/// 运行开始时从输入目录读取一次，之后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    /// 唯一标识（有 ticker 用 ticker，否则用 URL）
    pub id: String,
    pub ticker: Option<String>,
    /// 列表页 URL
    pub url: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// 来源文件（仅用于日志）
    pub source: Option<String>,
}

impl Seed {
    /// 由 URL 创建种子，ticker 缺省时尝试从 URL 推断
    pub fn from_url(url: impl Into<String>, ticker: Option<String>) -> Self {
        let url = url.into().trim().to_string();
        let ticker = ticker
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .or_else(|| ticker_from_url(&url));
        let id = ticker.clone().unwrap_or_else(|| url.clone());
        Self {
            id,
            ticker,
            url,
            start_date: None,
            end_date: None,
            source: None,
        }
    }

    /// 由 ticker 和列表页模板创建种子
    pub fn from_ticker(ticker: &str, template: &str) -> Self {
        let ticker = ticker.trim().to_uppercase();
        let url = template.replace("{ticker}", &ticker.to_lowercase());
        Self::from_url(url, Some(ticker))
    }

    pub fn with_bounds(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// 日期是否落在种子的日期范围内（没有日期的记录不做过滤）
    pub fn in_range(&self, date: Option<NaiveDate>) -> bool {
        let Some(date) = date else {
            return true;
        };
        self.start_date.map_or(true, |start| date >= start)
            && self.end_date.map_or(true, |end| date <= end)
    }
}

/// 从 `https://www.morningstar.com/stocks/<exchange>/<ticker>/...` 推断 ticker
pub fn ticker_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let pos = segments.iter().position(|s| s.eq_ignore_ascii_case("stocks"))?;
    segments
        .get(pos + 2)
        .map(|t| t.to_uppercase())
        .filter(|t| !t.is_empty())
}
