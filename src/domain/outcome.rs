// ==========================================
// 线索导入引擎 - 导入结果
// ==========================================
// 用途: 提交阶段的汇总计数 + 逐行错误明细
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// RowError - 单行失败明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,        // 数据行号
    pub identity: Option<String>, // 标识键（如果可解析）
    pub message: String,          // 失败原因
}

// ==========================================
// ImportOutcome - 导入汇总
// ==========================================
// imported 含覆盖更新的行；updated 为其中的更新部分
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
    pub errors: Vec<RowError>,
    pub cancelled: bool,
}

impl ImportOutcome {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// 已处理行数（取消时小于 total）
    pub fn processed(&self) -> usize {
        self.imported + self.skipped + self.failed
    }

    /// 部分成功：有写入也有失败
    pub fn is_partial_success(&self) -> bool {
        self.imported > 0 && self.failed > 0
    }

    pub(crate) fn record_failure(
        &mut self,
        row_number: usize,
        identity: Option<String>,
        message: impl Into<String>,
    ) {
        self.failed += 1;
        self.errors.push(RowError {
            row_number,
            identity,
            message: message.into(),
        });
    }
}
