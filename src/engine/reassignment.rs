// ==========================================
// 线索导入引擎 - 批量改派服务
// ==========================================
// 职责: 按条件选出线索与坐席，生成均分方案（可预览），逐坐席落库
// 红线: 方案是纯计算结果，apply 只执行方案，不重新计算
// ==========================================

use crate::domain::types::WorkerId;
use crate::engine::allocator::{allocate, AllocationPlan};
use crate::importer::error::ImportResult;
use crate::repository::lead_repo::{LeadFilter, LeadRepository, WorkerDirectory, WorkerFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// 改派执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentSummary {
    pub assigned: Vec<(WorkerId, usize)>,
    pub total: usize,
}

// ==========================================
// ReassignmentService
// ==========================================
pub struct ReassignmentService<L, W>
where
    L: LeadRepository + ?Sized,
    W: WorkerDirectory + ?Sized,
{
    leads: Arc<L>,
    workers: Arc<W>,
}

impl<L, W> ReassignmentService<L, W>
where
    L: LeadRepository + ?Sized,
    W: WorkerDirectory + ?Sized,
{
    pub fn new(leads: Arc<L>, workers: Arc<W>) -> Self {
        Self { leads, workers }
    }

    /// 生成改派方案（不落库）
    ///
    /// # 错误
    /// - AllocationPrecondition: 没有满足条件的坐席
    #[instrument(skip(self))]
    pub async fn plan(
        &self,
        lead_filter: &LeadFilter,
        worker_filter: &WorkerFilter,
    ) -> ImportResult<AllocationPlan<i64>> {
        let lead_ids = self.leads.list_lead_ids(lead_filter).await?;
        let workers = self.workers.list_workers(worker_filter).await?;

        let plan = allocate(&lead_ids, &workers)?;
        info!(leads = lead_ids.len(), workers = workers.len(), "改派方案已生成");
        Ok(plan)
    }

    /// 执行方案：逐坐席写入分配人
    #[instrument(skip(self, plan), fields(total = plan.total()))]
    pub async fn apply(&self, plan: &AllocationPlan<i64>) -> ImportResult<ReassignmentSummary> {
        let mut summary = ReassignmentSummary::default();

        for assignment in &plan.assignments {
            if assignment.items.is_empty() {
                summary.assigned.push((assignment.worker_id.clone(), 0));
                continue;
            }
            let updated = self
                .leads
                .assign_leads(&assignment.items, &assignment.worker_id)
                .await?;
            summary.total += updated;
            summary.assigned.push((assignment.worker_id.clone(), updated));
        }

        info!(total = summary.total, "改派完成");
        Ok(summary)
    }

    /// plan + apply
    pub async fn reassign(
        &self,
        lead_filter: &LeadFilter,
        worker_filter: &WorkerFilter,
    ) -> ImportResult<ReassignmentSummary> {
        let plan = self.plan(lead_filter, worker_filter).await?;
        self.apply(&plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lead::ImportRecord;
    use crate::domain::types::{CanonicalField, DuplicatePolicy, DuplicateVerdict};
    use crate::importer::error::ImportError;
    use crate::repository::error::RepositoryResult;
    use crate::repository::lead_repo::CommitKind;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeStore {
        ids: Vec<i64>,
        workers: Vec<WorkerId>,
        calls: Mutex<Vec<(WorkerId, Vec<i64>)>>,
    }

    #[async_trait]
    impl LeadRepository for FakeStore {
        async fn lookup_existing_identities(
            &self,
            _field: CanonicalField,
        ) -> RepositoryResult<HashSet<String>> {
            Ok(HashSet::new())
        }

        async fn commit_record(
            &self,
            _record: &ImportRecord,
            _field: CanonicalField,
            _policy: DuplicatePolicy,
            _verdict: DuplicateVerdict,
        ) -> RepositoryResult<CommitKind> {
            Ok(CommitKind::Inserted)
        }

        async fn list_lead_ids(&self, _filter: &LeadFilter) -> RepositoryResult<Vec<i64>> {
            Ok(self.ids.clone())
        }

        async fn assign_leads(&self, ids: &[i64], worker: &WorkerId) -> RepositoryResult<usize> {
            self.calls.lock().unwrap().push((worker.clone(), ids.to_vec()));
            Ok(ids.len())
        }
    }

    #[async_trait]
    impl WorkerDirectory for FakeStore {
        async fn list_workers(&self, _filter: &WorkerFilter) -> RepositoryResult<Vec<WorkerId>> {
            Ok(self.workers.clone())
        }
    }

    fn store(ids: Vec<i64>, workers: &[&str]) -> Arc<FakeStore> {
        Arc::new(FakeStore {
            ids,
            workers: workers.iter().map(|w| WorkerId::from(*w)).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_reassign_spreads_contiguously() {
        let store = store(vec![10, 11, 12, 13, 14], &["A", "B"]);
        let service = ReassignmentService::new(store.clone(), store.clone());

        let summary = service
            .reassign(&LeadFilter::default(), &WorkerFilter::default())
            .await
            .unwrap();

        assert_eq!(summary.total, 5);
        let calls = store.calls.lock().unwrap();
        assert_eq!(calls[0], (WorkerId::from("A"), vec![10, 11, 12]));
        assert_eq!(calls[1], (WorkerId::from("B"), vec![13, 14]));
    }

    #[tokio::test]
    async fn test_plan_without_workers() {
        let store = store(vec![1, 2], &[]);
        let service = ReassignmentService::new(store.clone(), store);

        let result = service.plan(&LeadFilter::default(), &WorkerFilter::default()).await;
        assert!(matches!(result, Err(ImportError::AllocationPrecondition)));
    }

    #[tokio::test]
    async fn test_plan_is_preview_only() {
        let store = store(vec![1], &["A", "B"]);
        let service = ReassignmentService::new(store.clone(), store.clone());

        let plan = service
            .plan(&LeadFilter::default(), &WorkerFilter::default())
            .await
            .unwrap();
        assert_eq!(plan.total(), 1);
        assert!(store.calls.lock().unwrap().is_empty());

        let summary = service.apply(&plan).await.unwrap();
        assert_eq!(summary.assigned, vec![(WorkerId::from("A"), 1), (WorkerId::from("B"), 0)]);
    }
}
