// ==========================================
// 线索导入引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 容错: 缺失或格式错误的值回退到默认值（格式错误记 warn）
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{DecodeOptions, DEFAULT_SAMPLE_LINES};
use crate::importer::separator::DEFAULT_CANDIDATES;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

// ==========================================
// ImportConfig - 导入配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub preview_rows: usize,
    pub sample_lines: usize,
    pub separator_candidates: Vec<char>,
    pub row_commit_timeout_ms: u64,
    pub default_status: String,
    pub default_source: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            preview_rows: defaults::PREVIEW_ROWS,
            sample_lines: DEFAULT_SAMPLE_LINES,
            separator_candidates: DEFAULT_CANDIDATES.to_vec(),
            row_commit_timeout_ms: defaults::ROW_COMMIT_TIMEOUT_MS,
            default_status: defaults::STATUS.to_string(),
            default_source: defaults::SOURCE.to_string(),
        }
    }
}

impl ImportConfig {
    /// 从配置读取器汇总一份快照
    pub async fn load(reader: &dyn ImportConfigReader) -> ImportResult<Self> {
        Ok(Self {
            preview_rows: reader.get_preview_rows().await?,
            sample_lines: reader.get_sample_lines().await?,
            separator_candidates: reader.get_separator_candidates().await?,
            row_commit_timeout_ms: reader.get_row_commit_timeout_ms().await?,
            default_status: reader.get_default_status().await?,
            default_source: reader.get_default_source().await?,
        })
    }

    /// 解码参数
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            sample_lines: self.sample_lines,
            candidates: self.separator_candidates.clone(),
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(|e| config_error("<open>", e))?;
        init_schema(&conn).map_err(|e| config_error("<schema>", e))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ImportResult<Self> {
        {
            let guard = lock(&conn)?;
            configure_sqlite_connection(&guard).map_err(|e| config_error("<pragma>", e))?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = lock(&self.conn)?;

        conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| config_error(key, e))
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, ?3)
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, Utc::now().to_rfc3339()],
        )
        .map_err(|e| config_error(key, e))?;
        Ok(())
    }

    /// 读取并解析数值配置，缺失或格式错误时回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ImportResult<T>
    where
        T: FromStr + Copy + std::fmt::Debug,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    warn!(config_key = key, raw_value = %raw, default = ?default, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }

    fn get_text_or_default(&self, key: &str, default: &str) -> ImportResult<String> {
        match self.get_config_value(key)? {
            Some(raw) if !raw.trim().is_empty() => Ok(raw.trim().to_string()),
            Some(_) => {
                warn!(config_key = key, "配置值为空，使用默认值");
                Ok(default.to_string())
            }
            None => Ok(default.to_string()),
        }
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_preview_rows(&self) -> ImportResult<usize> {
        let value = self.get_parsed_or_default(config_keys::PREVIEW_ROWS, defaults::PREVIEW_ROWS)?;
        if value > defaults::MAX_PREVIEW_ROWS {
            warn!(
                config_key = config_keys::PREVIEW_ROWS,
                value,
                max = defaults::MAX_PREVIEW_ROWS,
                "预览行数超过上限，按上限处理"
            );
            return Ok(defaults::MAX_PREVIEW_ROWS);
        }
        Ok(value)
    }

    async fn get_sample_lines(&self) -> ImportResult<usize> {
        let value = self.get_parsed_or_default(config_keys::SAMPLE_LINES, DEFAULT_SAMPLE_LINES)?;
        if value == 0 {
            warn!(config_key = config_keys::SAMPLE_LINES, "采样行数不能为 0，使用默认值");
            return Ok(DEFAULT_SAMPLE_LINES);
        }
        Ok(value)
    }

    async fn get_separator_candidates(&self) -> ImportResult<Vec<char>> {
        let raw = match self.get_config_value(config_keys::SEPARATOR_CANDIDATES)? {
            Some(v) => v,
            None => return Ok(DEFAULT_CANDIDATES.to_vec()),
        };

        // 存储形式: JSON 字符串数组，例如 [",", ";", "\t"]
        let parsed: Result<Vec<String>, _> = serde_json::from_str(&raw);
        match parsed {
            Ok(items) if !items.is_empty() && items.iter().all(|s| s.chars().count() == 1) => {
                Ok(items.iter().filter_map(|s| s.chars().next()).collect())
            }
            _ => {
                warn!(
                    config_key = config_keys::SEPARATOR_CANDIDATES,
                    raw_value = %raw,
                    "候选分隔符配置无效，使用默认值"
                );
                Ok(DEFAULT_CANDIDATES.to_vec())
            }
        }
    }

    async fn get_row_commit_timeout_ms(&self) -> ImportResult<u64> {
        self.get_parsed_or_default(
            config_keys::ROW_COMMIT_TIMEOUT_MS,
            defaults::ROW_COMMIT_TIMEOUT_MS,
        )
    }

    async fn get_default_status(&self) -> ImportResult<String> {
        self.get_text_or_default(config_keys::DEFAULT_STATUS, defaults::STATUS)
    }

    async fn get_default_source(&self) -> ImportResult<String> {
        self.get_text_or_default(config_keys::DEFAULT_SOURCE, defaults::SOURCE)
    }
}

fn lock(conn: &Arc<Mutex<Connection>>) -> ImportResult<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|e| ImportError::ConfigReadError {
        key: "<lock>".to_string(),
        message: format!("锁获取失败: {}", e),
    })
}

fn config_error(key: &str, err: rusqlite::Error) -> ImportError {
    ImportError::ConfigReadError {
        key: key.to_string(),
        message: err.to_string(),
    }
}

// ==========================================
// 默认值
// ==========================================
pub mod defaults {
    pub const PREVIEW_ROWS: usize = 10;
    pub const MAX_PREVIEW_ROWS: usize = 10;
    pub const ROW_COMMIT_TIMEOUT_MS: u64 = 5_000;
    pub const STATUS: &str = "new";
    pub const SOURCE: &str = "import";
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 预览
    pub const PREVIEW_ROWS: &str = "import.preview_rows";

    // 分隔符推断
    pub const SAMPLE_LINES: &str = "import.sample_lines";
    pub const SEPARATOR_CANDIDATES: &str = "import.separator_candidates"; // JSON 数组

    // 提交
    pub const ROW_COMMIT_TIMEOUT_MS: &str = "import.row_commit_timeout_ms";

    // 线索默认值
    pub const DEFAULT_STATUS: &str = "lead.default_status";
    pub const DEFAULT_SOURCE: &str = "lead.default_source";
}
