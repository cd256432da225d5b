use anyhow::Result;
/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::models::RunSummary;

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(log_file_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let log_header = format!(
        "{}\nMorningstar 财报日历爬取日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 把运行汇总追加到日志文件
pub fn append_summary(log_file_path: &str, summary: &RunSummary) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    writeln!(file, "{}", summary)?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_sessions`: 最大浏览器会话数
pub fn log_startup(max_sessions: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - Morningstar 财报日历爬虫");
    info!("📊 最大浏览器会话数: {}", max_sessions);
    info!("{}", "=".repeat(60));
}

/// 记录种子加载信息
pub fn log_seeds_loaded(total: usize, max_sessions: usize) {
    info!("✓ 找到 {} 个待处理的种子", total);
    info!("📋 最多 {} 个种子并行处理\n", max_sessions);
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 运行汇总
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(summary: &RunSummary, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    for line in summary.to_string().lines() {
        info!("{}", line);
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
