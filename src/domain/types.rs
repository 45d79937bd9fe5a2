// ==========================================
// 线索导入引擎 - 领域类型定义
// ==========================================
// 职责: 标准字段、查重策略、会话状态等枚举
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 标准字段 (Canonical Field)
// ==========================================
// 声明顺序即自动映射的求值顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    FirstName,
    LastName,
    Email,
    Phone,
    Country,
    City,
    Address,
    Company,
    Source,
    Status,
    Notes,
}

impl CanonicalField {
    /// 全部标准字段（声明顺序）
    pub const ALL: [CanonicalField; 11] = [
        CanonicalField::FirstName,
        CanonicalField::LastName,
        CanonicalField::Email,
        CanonicalField::Phone,
        CanonicalField::Country,
        CanonicalField::City,
        CanonicalField::Address,
        CanonicalField::Company,
        CanonicalField::Source,
        CanonicalField::Status,
        CanonicalField::Notes,
    ];

    /// 提交前必须绑定的字段
    pub const REQUIRED: [CanonicalField; 4] = [
        CanonicalField::FirstName,
        CanonicalField::LastName,
        CanonicalField::Email,
        CanonicalField::Phone,
    ];

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }

    /// 字段键（同时也是 leads 表列名）
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::FirstName => "first_name",
            CanonicalField::LastName => "last_name",
            CanonicalField::Email => "email",
            CanonicalField::Phone => "phone",
            CanonicalField::Country => "country",
            CanonicalField::City => "city",
            CanonicalField::Address => "address",
            CanonicalField::Company => "company",
            CanonicalField::Source => "source",
            CanonicalField::Status => "status",
            CanonicalField::Notes => "notes",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        CanonicalField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == key)
            .ok_or_else(|| format!("未知的标准字段: {}", s))
    }
}

// ==========================================
// 查重策略 (Duplicate Policy)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    Skip,      // 重复行不写入
    Overwrite, // 重复行覆盖已有记录
    Insert,    // 全部插入，不论是否重复
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::Skip => write!(f, "skip"),
            DuplicatePolicy::Overwrite => write!(f, "overwrite"),
            DuplicatePolicy::Insert => write!(f, "insert"),
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(DuplicatePolicy::Skip),
            "overwrite" | "update" => Ok(DuplicatePolicy::Overwrite),
            "insert" => Ok(DuplicatePolicy::Insert),
            other => Err(format!("未知的查重策略: {}", other)),
        }
    }
}

// ==========================================
// 查重判定 (Duplicate Verdict)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateVerdict {
    Unique,
    Duplicate,
}

impl fmt::Display for DuplicateVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateVerdict::Unique => write!(f, "unique"),
            DuplicateVerdict::Duplicate => write!(f, "duplicate"),
        }
    }
}

// ==========================================
// 行动作 (Row Action)
// ==========================================
// 由 (策略, 判定) 唯一确定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowAction {
    Insert,
    Update,
    Skip,
}

impl RowAction {
    pub fn decide(policy: DuplicatePolicy, verdict: DuplicateVerdict) -> Self {
        match (policy, verdict) {
            (_, DuplicateVerdict::Unique) => RowAction::Insert,
            (DuplicatePolicy::Skip, DuplicateVerdict::Duplicate) => RowAction::Skip,
            (DuplicatePolicy::Overwrite, DuplicateVerdict::Duplicate) => RowAction::Update,
            (DuplicatePolicy::Insert, DuplicateVerdict::Duplicate) => RowAction::Insert,
        }
    }
}

impl fmt::Display for RowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowAction::Insert => write!(f, "insert"),
            RowAction::Update => write!(f, "update"),
            RowAction::Skip => write!(f, "skip"),
        }
    }
}

// ==========================================
// 导入会话状态 (Session State)
// ==========================================
// Uploaded → Decoded → Mapped → Previewed → Configured → Committed
// 任意状态遇致命错误 → Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Uploaded,
    Decoded,
    Mapped,
    Previewed,
    Configured,
    Committed,
    Failed,
}

impl SessionState {
    /// 终态：不再接受任何迁移
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Committed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uploaded => write!(f, "UPLOADED"),
            SessionState::Decoded => write!(f, "DECODED"),
            SessionState::Mapped => write!(f, "MAPPED"),
            SessionState::Previewed => write!(f, "PREVIEWED"),
            SessionState::Configured => write!(f, "CONFIGURED"),
            SessionState::Committed => write!(f, "COMMITTED"),
            SessionState::Failed => write!(f, "FAILED"),
        }
    }
}

// ==========================================
// 坐席标识 (Worker Id)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
