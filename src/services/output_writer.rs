//! 输出写入能力
//!
//! 按 ticker 分文件保存 JSON 数组：`<output_dir>/<TICKER>.json`。
//! 内存中维护 `RecordKey → 位置` 索引，打开时从已有输出重建，
//! 所以重复运行同一个种子不会产生重复记录。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ScrapeError, ScrapeResult};
use crate::models::{Record, RecordKey};
use crate::retry::RetryPolicy;

/// 多个种子任务共享的写入器（单写者）
pub type SharedWriter = Arc<Mutex<OutputWriter>>;

/// upsert 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    Unchanged,
}

/// 一个输出文件
#[derive(Debug)]
struct Partition {
    path: PathBuf,
    records: Vec<Record>,
    dirty: bool,
}

/// 输出写入器
#[derive(Debug)]
pub struct OutputWriter {
    dir: PathBuf,
    /// 文件名 → 分区（有序，保证刷盘顺序稳定）
    partitions: BTreeMap<String, Partition>,
    index: HashMap<RecordKey, (String, usize)>,
}

impl OutputWriter {
    /// 打开输出目录并重建索引
    ///
    /// 无法读取或解析的已有文件视为致命错误，绝不覆盖
    pub fn open(dir: impl AsRef<Path>) -> ScrapeResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| ScrapeError::writer_io(&dir, e))?;

        let mut writer = Self {
            dir: dir.clone(),
            partitions: BTreeMap::new(),
            index: HashMap::new(),
        };

        let mut files: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|e| ScrapeError::writer_io(&dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "json"))
            .collect();
        files.sort();

        let mut loaded: HashSet<PathBuf> = HashSet::new();
        let mut merged: HashSet<String> = HashSet::new();
        for path in files {
            let file_stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            for record in read_partition(&path)? {
                let stem = safe_file_stem(&record.key.ticker);
                if writer.upsert(record) != UpsertOutcome::Inserted || stem != file_stem {
                    merged.insert(stem);
                }
            }
            loaded.insert(path);
        }

        // 与磁盘内容一致的文件不需要重写
        for (stem, partition) in writer.partitions.iter_mut() {
            partition.dirty = !loaded.contains(&partition.path) || merged.contains(stem);
        }

        info!(
            "📂 输出目录 {}：已有 {} 条记录",
            dir.display(),
            writer.index.len()
        );
        Ok(writer)
    }

    /// 记录总数（等于不同键的数量）
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        let (stem, slot) = self.index.get(key)?;
        self.partitions.get(stem)?.records.get(*slot)
    }

    /// 某个 ticker 的全部记录（按首次提取顺序）
    pub fn records_for(&self, ticker: &str) -> Vec<&Record> {
        let ticker = ticker.trim().to_uppercase();
        self.partitions
            .get(&safe_file_stem(&ticker))
            .map(|p| p.records.iter().filter(|r| r.key.ticker == ticker).collect())
            .unwrap_or_default()
    }

    /// 有未刷盘修改的文件数
    pub fn dirty_partitions(&self) -> usize {
        self.partitions.values().filter(|p| p.dirty).count()
    }

    /// 按键插入或覆盖
    ///
    /// 覆盖规则见 `Record::supersedes`；被覆盖的记录保持原来的位置
    pub fn upsert(&mut self, record: Record) -> UpsertOutcome {
        if let Some((stem, slot)) = self.index.get(&record.key) {
            let partition = match self.partitions.get_mut(stem) {
                Some(p) => p,
                None => return UpsertOutcome::Unchanged,
            };
            let existing = &mut partition.records[*slot];
            if record.supersedes(existing) {
                debug!("覆盖记录 {}", record.key);
                *existing = record;
                partition.dirty = true;
                return UpsertOutcome::Replaced;
            }
            return UpsertOutcome::Unchanged;
        }

        let stem = safe_file_stem(&record.key.ticker);
        let path = self.dir.join(format!("{}.json", stem));
        let partition = self
            .partitions
            .entry(stem.clone())
            .or_insert_with(|| Partition {
                path,
                records: Vec::new(),
                dirty: false,
            });

        self.index
            .insert(record.key.clone(), (stem, partition.records.len()));
        partition.records.push(record);
        partition.dirty = true;
        UpsertOutcome::Inserted
    }

    /// 把有修改的文件写回磁盘
    ///
    /// 先写临时文件再 rename；任何失败都会删除临时文件，原文件保持不变
    pub fn flush(&mut self) -> ScrapeResult<usize> {
        let mut written = 0;
        for partition in self.partitions.values_mut().filter(|p| p.dirty) {
            write_partition(&partition.path, &partition.records)?;
            partition.dirty = false;
            written += 1;
        }
        if written > 0 {
            debug!("💾 已写入 {} 个输出文件", written);
        }
        Ok(written)
    }
}

/// 刷盘，失败时按重试策略退避重试；重试耗尽返回 `WriterIo`（致命）
pub async fn flush_with_retry(writer: &SharedWriter, policy: &RetryPolicy) -> ScrapeResult<usize> {
    let mut attempt = 1;
    loop {
        let result = writer.lock().await.flush();
        match result {
            Ok(written) => return Ok(written),
            Err(e) if policy.should_retry(attempt) => {
                let delay = policy.backoff(attempt);
                warn!(
                    "⚠️ 写入输出失败 (第 {}/{} 次)，{}ms 后重试: {}",
                    attempt,
                    policy.max_attempts,
                    delay.as_millis(),
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// ticker 转为安全的文件名（非字母数字、下划线、连字符的字符替换为 `_`）
pub fn safe_file_stem(ticker: &str) -> String {
    let stem: String = ticker
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}

fn read_partition(path: &Path) -> ScrapeResult<Vec<Record>> {
    let content = fs::read_to_string(path).map_err(|e| ScrapeError::writer_io(path, e))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content).map_err(|e| {
        ScrapeError::writer_io(path, io::Error::new(io::ErrorKind::InvalidData, e))
    })
}

/// 临时文件守卫：未 `commit` 就被 drop 时删除临时文件
struct TempFile {
    path: PathBuf,
    committed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self, target: &Path) -> io::Result<()> {
        fs::rename(&self.path, target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn write_partition(path: &Path, records: &[Record]) -> ScrapeResult<()> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| ScrapeError::writer_io(path, io::Error::new(io::ErrorKind::InvalidData, e)))?;

    let tmp = TempFile::new(path.with_extension("json.tmp"));
    let io_result = (|| -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&tmp.path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(())
    })();
    io_result.map_err(|e| ScrapeError::writer_io(path, e))?;

    tmp.commit(path).map_err(|e| ScrapeError::writer_io(path, e))
}
