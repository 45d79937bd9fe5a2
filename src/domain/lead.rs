// ==========================================
// 线索导入引擎 - 导入记录
// ==========================================
// 职责: 映射后的单行记录 + 会话级默认属性
// ==========================================

use crate::domain::types::{CanonicalField, WorkerId};
use serde::{Deserialize, Serialize};

// ==========================================
// ImportRecord - 规范化后的导入记录
// ==========================================
// 对齐: leads 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub row_number: usize, // 数据行号（从 1 开始，不含表头）

    // 必填字段
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,

    // 可选字段
    pub country: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,

    // 会话默认值（列值优先）
    pub source: String,
    pub status: String,
    pub desk: Option<String>,
    pub assignee: Option<WorkerId>,
}

impl ImportRecord {
    /// 按标准字段读取值；空值返回 None
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        let value = match field {
            CanonicalField::FirstName => Some(self.first_name.as_str()),
            CanonicalField::LastName => Some(self.last_name.as_str()),
            CanonicalField::Email => Some(self.email.as_str()),
            CanonicalField::Phone => Some(self.phone.as_str()),
            CanonicalField::Country => self.country.as_deref(),
            CanonicalField::City => self.city.as_deref(),
            CanonicalField::Address => self.address.as_deref(),
            CanonicalField::Company => self.company.as_deref(),
            CanonicalField::Source => Some(self.source.as_str()),
            CanonicalField::Status => Some(self.status.as_str()),
            CanonicalField::Notes => self.notes.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// 查重键：去空白 + 小写
    pub fn identity_key(&self, field: CanonicalField) -> Option<String> {
        self.get(field).map(identity_key)
    }
}

/// 标识键规范化
pub fn identity_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// ==========================================
// 分配人策略
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "workers", rename_all = "snake_case")]
pub enum AssigneeStrategy {
    #[default]
    Unassigned,
    /// 全部分配给同一人
    Fixed(WorkerId),
    /// 按行顺序在多人之间均分
    Spread(Vec<WorkerId>),
}

// ==========================================
// LeadDefaults - 会话级默认属性
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadDefaults {
    pub desk: Option<String>,
    pub assignee: AssigneeStrategy,
    pub source: String,
    pub status: String,
}

impl Default for LeadDefaults {
    fn default() -> Self {
        Self {
            desk: None,
            assignee: AssigneeStrategy::Unassigned,
            source: "import".to_string(),
            status: "new".to_string(),
        }
    }
}
