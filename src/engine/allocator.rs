// ==========================================
// 线索导入引擎 - 均分分配器
// ==========================================
// 规则: n 项分给 k 人，base = n / k，remainder = n % k
//       前 remainder 人各得 base + 1，其余各得 base
//       按原顺序连续切片，按坐席顺序依次分配
// 红线: 纯函数，不访问仓储
// ==========================================

use crate::domain::types::WorkerId;
use crate::importer::error::ImportError;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

/// 分配错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("坐席列表为空，无法分配")]
    NoWorkers,
}

impl From<AllocationError> for ImportError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::NoWorkers => ImportError::AllocationPrecondition,
        }
    }
}

// ==========================================
// Assignment - 单个坐席的分配切片
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment<T> {
    pub worker_id: WorkerId,
    pub count: usize,
    pub start: usize, // 切片在原序列中的起始下标
    pub items: Vec<T>,
}

impl<T> Assignment<T> {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.count
    }
}

// ==========================================
// AllocationPlan - 分配方案（按坐席顺序）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan<T> {
    pub assignments: Vec<Assignment<T>>,
}

impl<T> AllocationPlan<T> {
    /// 被分配的总项数
    pub fn total(&self) -> usize {
        self.assignments.iter().map(|a| a.count).sum()
    }

    /// 各坐席计数（按坐席顺序）
    pub fn counts(&self) -> Vec<(WorkerId, usize)> {
        self.assignments
            .iter()
            .map(|a| (a.worker_id.clone(), a.count))
            .collect()
    }

    /// 按原顺序展开为逐项的坐席序列
    pub fn worker_sequence(&self) -> Vec<WorkerId> {
        self.assignments
            .iter()
            .flat_map(|a| std::iter::repeat(a.worker_id.clone()).take(a.count))
            .collect()
    }
}

/// 计算各坐席的切片区间
///
/// # 返回
/// - Vec<Range<usize>>: 长度等于 worker_count，首尾相接覆盖 0..item_count
pub fn partition(item_count: usize, worker_count: usize) -> Result<Vec<Range<usize>>, AllocationError> {
    if worker_count == 0 {
        return Err(AllocationError::NoWorkers);
    }

    let base = item_count / worker_count;
    let remainder = item_count % worker_count;

    let mut ranges = Vec::with_capacity(worker_count);
    let mut start = 0;
    for i in 0..worker_count {
        let count = if i < remainder { base + 1 } else { base };
        ranges.push(start..start + count);
        start += count;
    }
    Ok(ranges)
}

/// 将 items 按坐席顺序近似均分
///
/// # 错误
/// - AllocationError::NoWorkers: workers 为空
pub fn allocate<T: Clone>(
    items: &[T],
    workers: &[WorkerId],
) -> Result<AllocationPlan<T>, AllocationError> {
    let ranges = partition(items.len(), workers.len())?;

    let assignments = workers
        .iter()
        .zip(ranges)
        .map(|(worker, range)| Assignment {
            worker_id: worker.clone(),
            count: range.len(),
            start: range.start,
            items: items[range].to_vec(),
        })
        .collect();

    Ok(AllocationPlan { assignments })
}
