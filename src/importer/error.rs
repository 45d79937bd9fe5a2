// ==========================================
// 线索导入引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 解码错误(致命) / 映射不完整(可恢复) / 行提交错误(逐行) / 分配前置条件(致命)
// ==========================================

use crate::domain::types::{CanonicalField, SessionState};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 解码错误：输入为空、容器不可读或无有效行
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("输入为空")]
    EmptyInput,

    #[error("表格文件无法读取: {0}")]
    UnreadableContainer(String),

    #[error("表格文件无工作表")]
    NoSheet,

    #[error("文件无有效数据行")]
    NoDataLines,
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for DecodeError {
    fn from(err: calamine::Error) -> Self {
        DecodeError::UnreadableContainer(err.to_string())
    }
}

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件解析失败: {0}")]
    Decode(#[from] DecodeError),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    // ===== 字段映射错误 =====
    #[error("必填字段未映射: {}", format_fields(.missing))]
    MappingIncomplete { missing: Vec<CanonicalField> },

    #[error("列序号越界: {column}（共 {column_count} 列）")]
    ColumnOutOfRange { column: usize, column_count: usize },

    // ===== 提交相关错误 =====
    #[error("行提交失败 (行 {row}): {message}")]
    RowCommit { row: usize, message: String },

    #[error("分配前置条件不满足: 坐席列表为空")]
    AllocationPrecondition,

    // ===== 会话状态错误 =====
    #[error("无效的状态迁移: from={from} to={to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    // ===== 下游错误 =====
    #[error("仓储错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error("错误报告导出失败: {0}")]
    ReportError(String),
}

fn format_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::ReportError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
