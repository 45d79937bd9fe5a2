// ==========================================
// 线索导入引擎 - 配置层
// ==========================================
// 职责: 导入参数管理，支持 config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

use std::path::PathBuf;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, ImportConfig};
pub use import_config_trait::ImportConfigReader;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "LEAD_IMPORT_DB_PATH";

/// 获取默认数据库路径
///
/// # 优先级
/// 1. 环境变量 LEAD_IMPORT_DB_PATH
/// 2. 用户数据目录/lead-import/lead_import.db
/// 3. ./lead_import.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./lead_import.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("lead-import");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("lead_import.db");
        }
    }

    path.to_string_lossy().to_string()
}
