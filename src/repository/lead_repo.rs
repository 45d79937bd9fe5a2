// ==========================================
// 线索导入引擎 - 线索仓储 Trait
// ==========================================
// 职责: 定义导入引擎依赖的外部协作方接口（不包含实现）
// - LeadRepository: 存储/标识提供方
// - WorkerDirectory: 坐席目录
// 红线: Repository 不含业务规则，只做数据读写
// ==========================================

use crate::domain::lead::ImportRecord;
use crate::domain::types::{CanonicalField, DuplicatePolicy, DuplicateVerdict, WorkerId};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 单条提交的落库方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitKind {
    Inserted,
    Updated,
}

/// 坐席过滤条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFilter {
    pub desk: Option<String>,
    pub active_only: bool,
}

/// 线索过滤条件（批量改派用）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadFilter {
    pub desk: Option<String>,
    pub assignee: Option<WorkerId>,
    pub status: Option<String>,
}

// ==========================================
// LeadRepository Trait
// ==========================================
// 实现者: SqliteLeadRepository
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// 读取目标数据集中已存在的标识值
    ///
    /// # 参数
    /// - identity_field: 查重字段
    ///
    /// # 返回
    /// - 规范化（去空白 + 小写）后的标识集合
    async fn lookup_existing_identities(
        &self,
        identity_field: CanonicalField,
    ) -> RepositoryResult<HashSet<String>>;

    /// 写入单条记录
    ///
    /// # 参数
    /// - record: 导入记录
    /// - policy: 查重策略
    /// - verdict: 查重判定
    ///
    /// # 说明
    /// - overwrite + duplicate → 更新标识相同的已有记录
    /// - 其余情况 → 插入
    async fn commit_record(
        &self,
        record: &ImportRecord,
        identity_field: CanonicalField,
        policy: DuplicatePolicy,
        verdict: DuplicateVerdict,
    ) -> RepositoryResult<CommitKind>;

    /// 按条件列出线索 ID（升序）
    async fn list_lead_ids(&self, filter: &LeadFilter) -> RepositoryResult<Vec<i64>>;

    /// 将一组线索改派给指定坐席
    ///
    /// # 返回
    /// - 实际更新的行数
    async fn assign_leads(&self, lead_ids: &[i64], worker: &WorkerId) -> RepositoryResult<usize>;
}

// ==========================================
// WorkerDirectory Trait
// ==========================================
#[async_trait]
pub trait WorkerDirectory: Send + Sync {
    /// 列出满足条件的坐席（按坐席 ID 升序，保证分配可复现）
    async fn list_workers(&self, filter: &WorkerFilter) -> RepositoryResult<Vec<WorkerId>>;
}
