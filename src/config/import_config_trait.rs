// ==========================================
// 线索导入引擎 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入会话所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::importer::error::ImportResult;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入会话启动前读取一次配置快照
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 预览行数
    ///
    /// # 默认值
    /// - 10
    async fn get_preview_rows(&self) -> ImportResult<usize>;

    /// 分隔符推断的采样行数
    ///
    /// # 默认值
    /// - 50
    async fn get_sample_lines(&self) -> ImportResult<usize>;

    /// 候选分隔符（按优先级排列）
    ///
    /// # 默认值
    /// - [',', ';', '\t', '|']
    async fn get_separator_candidates(&self) -> ImportResult<Vec<char>>;

    /// 单行提交超时（毫秒）
    ///
    /// # 默认值
    /// - 5000
    async fn get_row_commit_timeout_ms(&self) -> ImportResult<u64>;

    /// 未映射 status 时的默认值
    async fn get_default_status(&self) -> ImportResult<String>;

    /// 未映射 source 时的默认值
    async fn get_default_source(&self) -> ImportResult<String>;
}
