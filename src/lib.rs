// ==========================================
// 线索导入引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 表格文件 → 线索记录的导入与对账
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 值对象与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分配与会话编排
pub mod engine;

// 导入层 - 解码/映射/查重
pub mod importer;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    AssigneeStrategy, CanonicalField, DuplicatePolicy, DuplicateVerdict, ImportOutcome,
    ImportRecord, LeadDefaults, RawTable, RowAction, RowError, SessionState, WorkerId,
};

// 导入
pub use importer::{
    auto_map, decode, infer_separator, resolve, split_line, DecodeError, FieldMapping,
    ImportError, ImportResult,
};

// 引擎
pub use engine::{
    allocate, AllocationPlan, CancellationSignal, ImportSession, ReassignmentService,
    SessionConfig,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
