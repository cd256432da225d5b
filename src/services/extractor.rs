//! 表格提取能力
//!
//! 纯函数：输入渲染后的 HTML，输出 `Record` 列表。
//! 列按表头文字识别（不按位置），缺失的列得到 null。

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::{ScrapeError, ScrapeResult};
use crate::models::{Record, RecordKey, Seed};
use crate::utils::{normalize_period, parse_date, parse_numeric, quarter_label, Numeric};

/// 空状态标记（"暂无财报事件"）
pub const EMPTY_STATE_SELECTOR: &str =
    ".mds-empty-state, .empty-state, [data-empty-state], .no-data";
/// 页面级公司名
pub const COMPANY_SELECTOR: &str = "div.company-name";
/// 页面级 ticker
pub const TICKER_SELECTOR: &str = "span.ticker";
/// 表格数据行
pub const TABLE_ROW_SELECTOR: &str = "table tbody tr";
/// 分页"下一页"控件
pub const NEXT_PAGE_SELECTOR: &str = "button[aria-label*='Next'], a[aria-label*='Next'], \
     .mds-pagination__next, [data-test='next-page']";
/// 弹窗 / 遮罩的关闭按钮
pub const OVERLAY_CLOSE_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    "button[aria-label='Close']",
    ".modal-close",
    ".overlay-close",
    "[data-dismiss='modal']",
];

/// 可识别的列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Ticker,
    Company,
    Period,
    Date,
    Time,
    Estimate,
    Actual,
}

impl Column {
    /// 按表头文字识别列
    pub fn from_header(label: &str) -> Option<Column> {
        let label = label.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| label.contains(w));

        if has(&["date"]) {
            Some(Column::Date)
        } else if has(&["estimate", "consensus", "forecast", "expected"]) {
            Some(Column::Estimate)
        } else if has(&["time"]) {
            Some(Column::Time)
        } else if has(&["actual", "reported"]) {
            Some(Column::Actual)
        } else if has(&["ticker", "symbol"]) {
            Some(Column::Ticker)
        } else if has(&["company", "name"]) {
            Some(Column::Company)
        } else if has(&["quarter", "period"]) {
            Some(Column::Period)
        } else {
            None
        }
    }
}

/// 提取上下文
#[derive(Debug, Clone)]
pub struct ExtractCtx<'a> {
    pub seed: &'a Seed,
    /// 当前页面 URL（写入 `source_url`）
    pub url: &'a str,
    pub extracted_at: DateTime<Utc>,
}

impl<'a> ExtractCtx<'a> {
    pub fn new(seed: &'a Seed, url: &'a str) -> Self {
        Self {
            seed,
            url,
            extracted_at: Utc::now(),
        }
    }
}

/// 单行的提取结果
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Record(Record),
    Skipped { row: usize, reason: String },
}

/// 从 HTML 中解析出的表格
#[derive(Debug, Clone, Default)]
pub struct RenderedTable {
    /// 列下标 → 识别出的列
    columns: HashMap<usize, Column>,
    rows: Vec<Vec<String>>,
    page_ticker: Option<String>,
    page_company: Option<String>,
    empty_state: bool,
}

impl RenderedTable {
    /// 解析页面
    ///
    /// 有空状态标记时返回空表；既无空状态也无可识别的表格时返回 `MalformedPage`
    pub fn parse(html: &str, url: &str) -> ScrapeResult<RenderedTable> {
        let document = Html::parse_document(html);

        let page_ticker = first_text(&document, TICKER_SELECTOR).map(|t| t.to_uppercase());
        let page_company = first_text(&document, COMPANY_SELECTOR);

        if let Some(mut table) = find_table(&document) {
            table.page_ticker = page_ticker;
            table.page_company = page_company;
            return Ok(table);
        }

        if has_match(&document, EMPTY_STATE_SELECTOR) {
            return Ok(RenderedTable {
                page_ticker,
                page_company,
                empty_state: true,
                ..Default::default()
            });
        }

        Err(ScrapeError::malformed(url, "未找到可识别的财报表格"))
    }

    pub fn is_empty_state(&self) -> bool {
        self.empty_state
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.values().any(|c| *c == column)
    }

    /// 逐行提取（惰性、有限）
    pub fn rows<'t>(&'t self, ctx: &'t ExtractCtx<'t>) -> impl Iterator<Item = RowOutcome> + 't {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
            .map(move |(idx, cells)| self.build_record(idx + 1, cells, ctx))
    }

    fn cell<'c>(&self, cells: &'c [String], column: Column) -> Option<&'c str> {
        self.columns
            .iter()
            .filter(|(_, c)| **c == column)
            .map(|(idx, _)| *idx)
            .min()
            .and_then(|idx| cells.get(idx))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    fn build_record(&self, row: usize, cells: &[String], ctx: &ExtractCtx<'_>) -> RowOutcome {
        // 表格有 ticker 列时只认单元格，空白行不借用页面或种子的 ticker
        let ticker = if self.has_column(Column::Ticker) {
            self.cell(cells, Column::Ticker).map(|t| t.to_uppercase())
        } else {
            self.page_ticker.clone().or_else(|| ctx.seed.ticker.clone())
        };
        let Some(ticker) = ticker else {
            return RowOutcome::Skipped {
                row,
                reason: "无法确定 ticker".to_string(),
            };
        };

        let event_date: Option<NaiveDate> = self.cell(cells, Column::Date).and_then(parse_date);

        // 有财季列时不回退到日历季度，避免两种口径的键混在一张表里
        let period = if self.has_column(Column::Period) {
            self.cell(cells, Column::Period).and_then(normalize_period)
        } else {
            event_date.map(quarter_label)
        };
        let Some(period) = period else {
            return RowOutcome::Skipped {
                row,
                reason: "无法确定财季".to_string(),
            };
        };

        let estimate = self.numeric(cells, Column::Estimate);
        let actual = self.numeric(cells, Column::Actual);

        RowOutcome::Record(Record {
            key: RecordKey::new(&ticker, &period),
            company_name: self
                .cell(cells, Column::Company)
                .map(str::to_string)
                .or_else(|| self.page_company.clone()),
            event_date,
            event_time: self.cell(cells, Column::Time).map(str::to_string),
            estimate: estimate.value(),
            actual: actual.value(),
            estimate_parse_failed: estimate.is_invalid(),
            actual_parse_failed: actual.is_invalid(),
            source_url: ctx.url.to_string(),
            extracted_at: ctx.extracted_at,
        })
    }

    fn numeric(&self, cells: &[String], column: Column) -> Numeric {
        match self.cell(cells, column) {
            Some(text) => parse_numeric(text),
            None => Numeric::Empty,
        }
    }
}

/// 单个页面的提取结果
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<Record>,
    /// 无法解析的行数
    pub skipped: usize,
    /// 超出种子日期范围的行数
    pub out_of_range: usize,
}

impl Extraction {
    /// 有被跳过的行时给出 `ExtractionPartial`（只记录，不重试）
    pub fn partial_warning(&self, url: &str) -> Option<ScrapeError> {
        (self.skipped > 0).then(|| ScrapeError::ExtractionPartial {
            url: url.to_string(),
            skipped: self.skipped,
        })
    }
}

/// 从渲染后的 HTML 中提取记录，并按种子日期范围过滤
pub fn extract(html: &str, ctx: &ExtractCtx<'_>) -> ScrapeResult<Extraction> {
    let table = RenderedTable::parse(html, ctx.url)?;
    let mut extraction = Extraction::default();

    if table.is_empty_state() {
        debug!("页面为空状态: {}", ctx.url);
        return Ok(extraction);
    }

    for outcome in table.rows(ctx) {
        match outcome {
            RowOutcome::Record(record) => {
                if ctx.seed.in_range(record.event_date) {
                    extraction.records.push(record);
                } else {
                    extraction.out_of_range += 1;
                }
            }
            RowOutcome::Skipped { row, reason } => {
                debug!("跳过第 {} 行: {}", row, reason);
                extraction.skipped += 1;
            }
        }
    }

    Ok(extraction)
}

// ========== HTML 辅助函数 ==========

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    document
        .select(&sel)
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn has_match(document: &Html, css: &str) -> bool {
    selector(css).map_or(false, |sel| document.select(&sel).next().is_some())
}

/// 找到第一个能识别出日期或财季列的表格
fn find_table(document: &Html) -> Option<RenderedTable> {
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let head_row_sel = selector("thead tr")?;
    let body_row_sel = selector("tbody tr")?;
    let cell_sel = selector("th, td")?;

    document.select(&table_sel).find_map(|table| {
        let cells_of = |row: ElementRef<'_>| -> Vec<String> {
            row.select(&cell_sel).map(element_text).collect()
        };

        let (header, body): (Vec<String>, Vec<Vec<String>>) =
            match table.select(&head_row_sel).next() {
                Some(head) => (
                    cells_of(head),
                    table.select(&body_row_sel).map(cells_of).collect(),
                ),
                None => {
                    let mut rows = table.select(&row_sel).map(cells_of);
                    let header = rows.next()?;
                    (header, rows.collect())
                }
            };

        let columns: HashMap<usize, Column> = header
            .iter()
            .enumerate()
            .filter_map(|(idx, label)| Column::from_header(label).map(|c| (idx, c)))
            .collect();

        let keyed = columns
            .values()
            .any(|c| matches!(c, Column::Date | Column::Period));
        keyed.then(|| RenderedTable {
            columns,
            rows: body,
            ..Default::default()
        })
    })
}
