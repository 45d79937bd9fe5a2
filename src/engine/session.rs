// ==========================================
// 线索导入引擎 - 导入会话编排
// ==========================================
// 状态机: UPLOADED → DECODED → MAPPED → PREVIEWED → CONFIGURED → COMMITTED
//         任意非终态遇致命错误 → FAILED
// 职责: 串联 解码 / 自动映射 / 预览 / 配置 / 逐行查重提交
// 红线: 会话是显式值对象，不依赖全局状态
//       逐行失败只记入结果，不中断批次
// ==========================================

use crate::config::config_manager::defaults;
use crate::config::ImportConfig;
use crate::domain::lead::{AssigneeStrategy, LeadDefaults};
use crate::domain::outcome::ImportOutcome;
use crate::domain::table::{RawTable, SourceFormat};
use crate::domain::types::{
    CanonicalField, DuplicatePolicy, RowAction, SessionState, WorkerId,
};
use crate::engine::allocator::allocate;
use crate::engine::cancellation::CancellationSignal;
use crate::importer::conflict_handler::DuplicateResolver;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{auto_map, map_row, preview_rows, FieldMapping, MappingWarning, PreviewRow};
use crate::importer::file_parser::{DecodedTable, UniversalDecoder};
use crate::repository::lead_repo::{CommitKind, LeadRepository};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// SessionConfig - 提交前的会话配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub identity_field: CanonicalField,
    pub policy: DuplicatePolicy,
    pub defaults: LeadDefaults,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            identity_field: CanonicalField::Email,
            policy: DuplicatePolicy::Skip,
            defaults: LeadDefaults::default(),
        }
    }
}

// ==========================================
// ImportSession - 单个文件的一次导入
// ==========================================
#[derive(Debug)]
pub struct ImportSession {
    id: String,
    file_name: String,
    bytes: Vec<u8>,
    state: SessionState,
    created_at: DateTime<Utc>,
    config: ImportConfig,
    decoded: Option<DecodedTable>,
    mapping: FieldMapping,
    settings: Option<SessionConfig>,
    outcome: Option<ImportOutcome>,
    failure: Option<String>,
}

impl ImportSession {
    /// 创建会话（状态 UPLOADED）
    ///
    /// # 参数
    /// - file_name: 原始文件名（扩展名用于格式判断）
    /// - bytes: 文件内容
    /// - config: 导入配置快照
    pub fn upload(file_name: impl Into<String>, bytes: Vec<u8>, config: ImportConfig) -> Self {
        let session = Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            bytes,
            state: SessionState::Uploaded,
            created_at: Utc::now(),
            config,
            decoded: None,
            mapping: FieldMapping::new(),
            settings: None,
            outcome: None,
            failure: None,
        };

        info!(
            session_id = %session.id,
            file_name = %session.file_name,
            size = session.bytes.len(),
            "导入会话已创建"
        );
        session
    }

    // ===== 只读访问 =====

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn table(&self) -> Option<&RawTable> {
        self.decoded.as_ref().map(|d| &d.table)
    }

    pub fn source_format(&self) -> Option<&SourceFormat> {
        self.decoded.as_ref().map(|d| &d.format)
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub fn mapping_warnings(&self) -> Vec<MappingWarning> {
        self.mapping.warnings()
    }

    pub fn settings(&self) -> Option<&SessionConfig> {
        self.settings.as_ref()
    }

    pub fn outcome(&self) -> Option<&ImportOutcome> {
        self.outcome.as_ref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    // ===== 状态迁移 =====

    /// UPLOADED → DECODED
    ///
    /// 解码失败 → FAILED
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn decode(&mut self) -> ImportResult<&RawTable> {
        self.ensure_state(&[SessionState::Uploaded], SessionState::Decoded)?;

        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_string());

        let decoder = UniversalDecoder::new(self.config.decode_options());
        match decoder.decode(&self.bytes, extension.as_deref()) {
            Ok(decoded) => {
                info!(
                    rows = decoded.table.row_count(),
                    columns = decoded.table.column_count(),
                    format = ?decoded.format,
                    "文件解码完成"
                );
                self.state = SessionState::Decoded;
                let decoded = self.decoded.insert(decoded);
                Ok(&decoded.table)
            }
            Err(e) => {
                let err = ImportError::from(e);
                self.fail(err.to_string());
                Err(err)
            }
        }
    }

    /// DECODED → MAPPED（自动映射，不校验必填）
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn map(&mut self) -> ImportResult<&FieldMapping> {
        self.ensure_state(&[SessionState::Decoded], SessionState::Mapped)?;

        let table = self.decoded_table(SessionState::Mapped)?;
        let mapping = auto_map(table.headers());

        let missing = mapping.missing_required();
        if !missing.is_empty() {
            warn!(missing = ?missing, "自动映射未覆盖全部必填字段");
        }
        for warning in mapping.warnings() {
            warn!(warning = ?warning, "自动映射存在列复用");
        }
        debug!(bound = mapping.bindings().count(), "自动映射完成");

        self.mapping = mapping;
        self.state = SessionState::Mapped;
        Ok(&self.mapping)
    }

    /// 手动绑定字段到列（MAPPED / PREVIEWED 状态有效，状态不变）
    pub fn bind(&mut self, field: CanonicalField, column: usize) -> ImportResult<()> {
        self.ensure_editable()?;
        let column_count = self.decoded_table(self.state)?.column_count();

        let previous = self.mapping.bind_checked(field, column, column_count)?;
        info!(session_id = %self.id, field = %field, column, previous = ?previous, "字段映射已修改");
        Ok(())
    }

    /// 解除字段绑定（MAPPED / PREVIEWED 状态有效，状态不变）
    pub fn unbind(&mut self, field: CanonicalField) -> ImportResult<()> {
        self.ensure_editable()?;
        let previous = self.mapping.unbind(field);
        info!(session_id = %self.id, field = %field, previous = ?previous, "字段映射已解除");
        Ok(())
    }

    /// MAPPED → PREVIEWED（PREVIEWED 下可重复调用）
    ///
    /// 按当前映射返回前 preview_rows 行（上限 10），只读
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn preview(&mut self) -> ImportResult<Vec<PreviewRow>> {
        self.ensure_state(
            &[SessionState::Mapped, SessionState::Previewed],
            SessionState::Previewed,
        )?;

        let table = self.decoded_table(SessionState::Previewed)?;
        let limit = self.config.preview_rows.min(defaults::MAX_PREVIEW_ROWS);
        let rows = preview_rows(table, &self.mapping, limit);
        debug!(preview_rows = rows.len(), "预览已生成");

        self.state = SessionState::Previewed;
        Ok(rows)
    }

    /// PREVIEWED → CONFIGURED
    ///
    /// # 错误
    /// - MappingIncomplete: 必填字段未绑定（保持 PREVIEWED）
    /// - AllocationPrecondition: 均分策略坐席为空（FAILED）
    #[instrument(skip(self, settings), fields(session_id = %self.id, policy = %settings.policy, identity_field = %settings.identity_field))]
    pub fn configure(&mut self, settings: SessionConfig) -> ImportResult<()> {
        self.ensure_state(&[SessionState::Previewed], SessionState::Configured)?;

        if let Err(e) = self.mapping.validate() {
            warn!(error = %e, "映射不完整，保持预览状态");
            return Err(e);
        }

        if let AssigneeStrategy::Spread(workers) = &settings.defaults.assignee {
            if workers.is_empty() {
                let err = ImportError::AllocationPrecondition;
                self.fail(err.to_string());
                return Err(err);
            }
        }

        self.settings = Some(settings);
        self.state = SessionState::Configured;
        info!("会话配置完成");
        Ok(())
    }

    /// CONFIGURED → COMMITTED
    ///
    /// # 流程
    /// 1. 读取已有标识（失败 → FAILED）
    /// 2. 逐行: 映射 → 查重判定（与 resolve 同一规则）→ 提交（带超时）
    /// 3. 提交成功后登记标识，后续行可见
    /// 4. 行边界检查取消信号，已提交的行不回滚
    #[instrument(skip(self, repo, cancel), fields(session_id = %self.id))]
    pub async fn commit<R>(
        &mut self,
        repo: &R,
        cancel: &CancellationSignal,
    ) -> ImportResult<ImportOutcome>
    where
        R: LeadRepository + ?Sized,
    {
        self.ensure_state(&[SessionState::Configured], SessionState::Committed)?;

        let settings = self
            .settings
            .clone()
            .ok_or(ImportError::InvalidTransition {
                from: self.state,
                to: SessionState::Committed,
            })?;
        let identity_field = settings.identity_field;
        let policy = settings.policy;

        // ===== 步骤 1: 已有标识 =====
        let known = match repo.lookup_existing_identities(identity_field).await {
            Ok(known) => known,
            Err(e) => {
                error!(error = %e, "读取已有标识失败");
                let err = ImportError::from(e);
                self.fail(err.to_string());
                return Err(err);
            }
        };
        debug!(known = known.len(), "已有标识加载完成");

        let table = self.decoded_table(SessionState::Committed)?;
        let total = table.row_count();
        let assignees = assignee_sequence(total, &settings.defaults.assignee)?;

        info!(total, policy = %policy, identity_field = %identity_field, "开始提交导入数据");

        let mut resolver = DuplicateResolver::new(identity_field, known.iter(), policy);
        let mut outcome = ImportOutcome::new(total);
        let timeout = Duration::from_millis(self.config.row_commit_timeout_ms);

        // ===== 步骤 2: 逐行处理 =====
        for (row, assignee) in (0..total).zip(assignees) {
            if cancel.is_cancelled() {
                warn!(processed = outcome.processed(), total, "导入已取消");
                outcome.cancelled = true;
                break;
            }

            let record = map_row(table, row, &self.mapping, &settings.defaults, assignee);
            let identity = record.identity_key(identity_field);

            let (verdict, action) = resolver.classify(&record);
            if action == RowAction::Skip {
                debug!(row_number = record.row_number, identity = ?identity, "重复记录已跳过");
                outcome.skipped += 1;
                continue;
            }

            let result =
                tokio::time::timeout(timeout, repo.commit_record(&record, identity_field, policy, verdict))
                    .await;

            match result {
                Ok(Ok(kind)) => {
                    resolver.register(&record);
                    outcome.imported += 1;
                    if kind == CommitKind::Updated {
                        outcome.updated += 1;
                    }
                }
                Ok(Err(e)) => {
                    let err = ImportError::RowCommit {
                        row: record.row_number,
                        message: e.to_string(),
                    };
                    warn!(row_number = record.row_number, error = %e, "单行提交失败");
                    outcome.record_failure(record.row_number, identity, err.to_string());
                }
                Err(_) => {
                    let err = ImportError::RowCommit {
                        row: record.row_number,
                        message: format!("提交超时 ({} ms)", timeout.as_millis()),
                    };
                    warn!(row_number = record.row_number, "单行提交超时");
                    outcome.record_failure(record.row_number, identity, err.to_string());
                }
            }
        }

        info!(
            imported = outcome.imported,
            updated = outcome.updated,
            skipped = outcome.skipped,
            failed = outcome.failed,
            total = outcome.total,
            cancelled = outcome.cancelled,
            "导入提交完成"
        );

        self.outcome = Some(outcome.clone());
        self.state = SessionState::Committed;
        Ok(outcome)
    }

    /// 将会话标记为 FAILED（终态不变）
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        let reason = reason.into();
        error!(session_id = %self.id, from = %self.state, reason = %reason, "导入会话失败");
        self.failure = Some(reason);
        self.state = SessionState::Failed;
    }

    // ===== 内部辅助 =====

    fn ensure_state(&self, allowed: &[SessionState], to: SessionState) -> ImportResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ImportError::InvalidTransition {
                from: self.state,
                to,
            })
        }
    }

    fn ensure_editable(&self) -> ImportResult<()> {
        self.ensure_state(
            &[SessionState::Mapped, SessionState::Previewed],
            SessionState::Mapped,
        )
    }

    fn decoded_table(&self, to: SessionState) -> ImportResult<&RawTable> {
        self.decoded
            .as_ref()
            .map(|d| &d.table)
            .ok_or(ImportError::InvalidTransition {
                from: self.state,
                to,
            })
    }
}

/// 按分配策略生成逐行的分配人
fn assignee_sequence(
    total: usize,
    strategy: &AssigneeStrategy,
) -> ImportResult<Vec<Option<WorkerId>>> {
    match strategy {
        AssigneeStrategy::Unassigned => Ok(vec![None; total]),
        AssigneeStrategy::Fixed(worker) => Ok(vec![Some(worker.clone()); total]),
        AssigneeStrategy::Spread(workers) => {
            let rows: Vec<usize> = (0..total).collect();
            let plan = allocate(&rows, workers)?;
            Ok(plan.worker_sequence().into_iter().map(Some).collect())
        }
    }
}
