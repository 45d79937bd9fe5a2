// ==========================================
// 线索导入引擎 - 领域模型层
// ==========================================
// 职责: 定义表格、记录、结果等值对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod lead;
pub mod outcome;
pub mod table;
pub mod types;

// 重导出核心类型
pub use lead::{identity_key, AssigneeStrategy, ImportRecord, LeadDefaults};
pub use outcome::{ImportOutcome, RowError};
pub use table::{RawTable, SourceFormat};
pub use types::{
    CanonicalField, DuplicatePolicy, DuplicateVerdict, RowAction, SessionState, WorkerId,
};
