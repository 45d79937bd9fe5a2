// ==========================================
// 线索导入引擎 - 查重处理器
// ==========================================
// 职责: 按标识字段判定 unique / duplicate，并给出行动作
// 规则: 与同批次更早的记录或已知标识重复 → duplicate
// 约束: 严格按原始行序处理，同样输入得到同样判定序列
// ==========================================

use crate::domain::lead::{identity_key, ImportRecord};
use crate::domain::types::{CanonicalField, DuplicatePolicy, DuplicateVerdict, RowAction};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ==========================================
// Resolution - 单条记录的判定结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub record: ImportRecord,
    pub verdict: DuplicateVerdict,
    pub action: RowAction,
}

// ==========================================
// DuplicateResolver - 有状态的逐行判定器
// ==========================================
// 提交流程中逐行使用：先 classify，写入成功后再 register，
// 保证后续行能看到已写入行的标识键
#[derive(Debug, Clone)]
pub struct DuplicateResolver {
    identity_field: CanonicalField,
    policy: DuplicatePolicy,
    known: HashSet<String>,
    seen: HashSet<String>,
}

impl DuplicateResolver {
    /// # 参数
    /// - identity_field: 查重字段
    /// - known_identities: 目标数据集中已存在的标识（会再做一次规范化）
    /// - policy: 查重策略
    pub fn new<I, S>(identity_field: CanonicalField, known_identities: I, policy: DuplicatePolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known = known_identities
            .into_iter()
            .map(|k| identity_key(k.as_ref()))
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            identity_field,
            policy,
            known,
            seen: HashSet::new(),
        }
    }

    pub fn identity_field(&self) -> CanonicalField {
        self.identity_field
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// 判定单条记录（不改变状态）
    ///
    /// 标识值为空的记录无法比较，视为 unique
    pub fn classify(&self, record: &ImportRecord) -> (DuplicateVerdict, RowAction) {
        let verdict = match record.identity_key(self.identity_field) {
            Some(key) if self.known.contains(&key) || self.seen.contains(&key) => {
                DuplicateVerdict::Duplicate
            }
            _ => DuplicateVerdict::Unique,
        };
        (verdict, RowAction::decide(self.policy, verdict))
    }

    /// 记录已处理行的标识键，后续行对其可见
    pub fn register(&mut self, record: &ImportRecord) {
        if let Some(key) = record.identity_key(self.identity_field) {
            self.seen.insert(key);
        }
    }
}

/// 批量判定（纯函数）
///
/// 每条记录判定后立即登记，等价于"全部写入成功"的提交过程
pub fn resolve<I, S>(
    records: Vec<ImportRecord>,
    identity_field: CanonicalField,
    known_identities: I,
    policy: DuplicatePolicy,
) -> Vec<Resolution>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut resolver = DuplicateResolver::new(identity_field, known_identities, policy);

    records
        .into_iter()
        .map(|record| {
            let (verdict, action) = resolver.classify(&record);
            resolver.register(&record);
            Resolution {
                record,
                verdict,
                action,
            }
        })
        .collect()
}
