use crate::models::seed::Seed;
use crate::utils::dates::parse_date;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// TOML 种子文件结构
#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    seeds: Vec<SeedEntry>,
}

#[derive(Debug, Deserialize)]
struct SeedEntry {
    ticker: Option<String>,
    url: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

/// 从 TOML 文件加载种子
///
/// ```toml
/// [[seeds]]
/// ticker = "AAPL"
/// start_date = "2024-01-01"
/// ```
pub async fn load_toml_seeds(path: &Path, listing_url_template: &str) -> Result<Vec<Seed>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", path.display()))?;

    let file: SeedFile = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", path.display()))?;

    let source = path.to_string_lossy().to_string();
    let mut seeds = Vec::with_capacity(file.seeds.len());
    for (index, entry) in file.seeds.into_iter().enumerate() {
        let seed = match (entry.url.as_deref(), entry.ticker.as_deref()) {
            (Some(url), ticker) if !url.trim().is_empty() => {
                Seed::from_url(url, ticker.map(str::to_string))
            }
            (_, Some(ticker)) if !ticker.trim().is_empty() => {
                Seed::from_ticker(ticker, listing_url_template)
            }
            _ => {
                tracing::warn!("{} 第 {} 个种子缺少 ticker 和 url，已跳过", source, index + 1);
                continue;
            }
        };
        let (Some(start), Some(end)) = (
            parse_bound(entry.start_date.as_deref(), &source, index),
            parse_bound(entry.end_date.as_deref(), &source, index),
        ) else {
            continue;
        };
        seeds.push(seed.with_bounds(start, end).with_source(source.clone()));
    }

    Ok(seeds)
}

/// 从 CSV 文件加载种子
///
/// 每行 `url[,ticker[,start_date[,end_date]]]`，忽略空行、`#` 注释和表头
pub async fn load_csv_seeds(path: &Path) -> Result<Vec<Seed>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取CSV文件: {}", path.display()))?;

    let source = path.to_string_lossy().to_string();
    let mut seeds = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let cols: Vec<&str> = line
            .split(',')
            .map(|c| c.trim().trim_matches('"').trim())
            .collect();
        let url = cols[0];
        if !url.starts_with("http://") && !url.starts_with("https://") {
            if index > 0 {
                tracing::warn!("{} 第 {} 行不是有效网址，已跳过: {}", source, index + 1, url);
            }
            continue;
        }

        let ticker = cols.get(1).map(|t| t.to_string()).filter(|t| !t.is_empty());
        let (Some(start), Some(end)) = (
            parse_bound(cols.get(2).copied(), &source, index),
            parse_bound(cols.get(3).copied(), &source, index),
        ) else {
            continue;
        };
        seeds.push(
            Seed::from_url(url, ticker)
                .with_bounds(start, end)
                .with_source(source.clone()),
        );
    }

    Ok(seeds)
}

/// 从输入目录加载所有种子（`*.toml` 与 `*.csv`），按文件名排序并按 id 去重
pub async fn load_all_seeds(folder_path: &str, listing_url_template: &str) -> Result<Vec<Seed>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;
    while let Some(entry) = entries.next_entry().await? {
        files.push(entry.path());
    }
    files.sort();

    let mut seeds = Vec::new();
    let mut seen = HashSet::new();
    for path in files {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase());
        let loaded = match ext.as_deref() {
            Some("toml") => load_toml_seeds(&path, listing_url_template).await,
            Some("csv") => load_csv_seeds(&path).await,
            _ => continue,
        };

        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match loaded {
            Ok(file_seeds) => {
                tracing::info!("成功加载 {} 个种子", file_seeds.len());
                for seed in file_seeds {
                    if seen.insert(seed.id.clone()) {
                        seeds.push(seed);
                    } else {
                        tracing::warn!(
                            "重复的种子已忽略: {} ({})",
                            seed.id,
                            seed.source.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(seeds)
}

/// 解析日期边界；空值为 `Some(None)`，无法解析时告警并返回 `None`（只跳过这一行）
fn parse_bound(raw: Option<&str>, source: &str, index: usize) -> Option<Option<NaiveDate>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Some(None),
        Some(text) => match parse_date(text) {
            Some(date) => Some(Some(date)),
            None => {
                tracing::warn!("{} 第 {} 项日期无法解析，已跳过: {}", source, index + 1, text);
                None
            }
        },
    }
}
