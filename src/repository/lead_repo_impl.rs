// ==========================================
// 线索导入引擎 - 线索仓储 SQLite 实现
// ==========================================
// 职责: 实现 LeadRepository / WorkerDirectory（使用 rusqlite）
// 标识比较: identity_key(column)（连接上注册的标量函数），与导入侧标识键规则一致
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::lead::{identity_key, ImportRecord};
use crate::domain::types::{CanonicalField, DuplicatePolicy, DuplicateVerdict, WorkerId};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::lead_repo::{
    CommitKind, LeadFilter, LeadRepository, WorkerDirectory, WorkerFilter,
};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// 已落库的线索（查询视图）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLead {
    pub lead_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub country: Option<String>,
    pub source: String,
    pub status: String,
    pub desk: Option<String>,
    pub assignee: Option<String>,
}

// ==========================================
// SqliteLeadRepository
// ==========================================
pub struct SqliteLeadRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLeadRepository {
    /// 打开数据库并确保表结构存在
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（调用方负责 PRAGMA 与建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 共享底层连接（供 ConfigManager 复用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或更新坐席
    pub fn upsert_worker(
        &self,
        worker_id: &str,
        display_name: &str,
        desk: Option<&str>,
        active: bool,
    ) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO workers (worker_id, display_name, desk, active)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(worker_id) DO UPDATE SET
                display_name = excluded.display_name,
                desk = excluded.desk,
                active = excluded.active
            "#,
            params![worker_id, display_name, desk, active as i32],
        )?;
        Ok(())
    }

    /// 线索总数
    pub fn count_leads(&self) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM leads", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 按标识查询线索（按 lead_id 升序）
    pub fn find_by_identity(
        &self,
        identity_field: CanonicalField,
        value: &str,
    ) -> RepositoryResult<Vec<StoredLead>> {
        let conn = self.lock()?;
        let sql = format!(
            r#"
            SELECT lead_id, first_name, last_name, email, phone, country,
                   source, status, desk, assignee
            FROM leads
            WHERE identity_key({column}) = ?1
            ORDER BY lead_id
            "#,
            column = identity_field.as_str()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![identity_key(value)], |row| {
            Ok(StoredLead {
                lead_id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                email: row.get(3)?,
                phone: row.get(4)?,
                country: row.get(5)?,
                source: row.get(6)?,
                status: row.get(7)?,
                desk: row.get(8)?,
                assignee: row.get(9)?,
            })
        })?;

        let mut leads = Vec::new();
        for lead in rows {
            leads.push(lead?);
        }
        Ok(leads)
    }

    /// 按坐席统计线索数（用于核对分配结果）
    pub fn count_by_assignee(&self, worker: &WorkerId) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM leads WHERE assignee = ?1",
            params![worker.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn insert_lead(conn: &Connection, record: &ImportRecord) -> RepositoryResult<()> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO leads (
                first_name, last_name, email, phone, country, city, address,
                company, notes, source, status, desk, assignee, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14
            )
            "#,
            params![
                record.first_name,
                record.last_name,
                record.email,
                record.phone,
                record.country,
                record.city,
                record.address,
                record.company,
                record.notes,
                record.source,
                record.status,
                record.desk,
                record.assignee.as_ref().map(|w| w.as_str()),
                now,
            ],
        )?;
        Ok(())
    }

    /// 覆盖更新：可选字段为空时保留原值
    fn update_lead(
        conn: &Connection,
        record: &ImportRecord,
        identity_field: CanonicalField,
    ) -> RepositoryResult<usize> {
        let key = record
            .identity_key(identity_field)
            .ok_or_else(|| RepositoryError::FieldValueError {
                field: identity_field.to_string(),
                message: "标识值为空，无法覆盖".to_string(),
            })?;

        let sql = format!(
            r#"
            UPDATE leads SET
                first_name = ?1,
                last_name = ?2,
                email = ?3,
                phone = ?4,
                country = COALESCE(?5, country),
                city = COALESCE(?6, city),
                address = COALESCE(?7, address),
                company = COALESCE(?8, company),
                notes = COALESCE(?9, notes),
                source = ?10,
                status = ?11,
                desk = COALESCE(?12, desk),
                assignee = COALESCE(?13, assignee),
                updated_at = ?14
            WHERE identity_key({column}) = ?15
            "#,
            column = identity_field.as_str()
        );

        let affected = conn.execute(
            &sql,
            params![
                record.first_name,
                record.last_name,
                record.email,
                record.phone,
                record.country,
                record.city,
                record.address,
                record.company,
                record.notes,
                record.source,
                record.status,
                record.desk,
                record.assignee.as_ref().map(|w| w.as_str()),
                Utc::now().to_rfc3339(),
                key,
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "lead".to_string(),
                id: key,
            });
        }
        Ok(affected)
    }
}

#[async_trait]
impl LeadRepository for SqliteLeadRepository {
    async fn lookup_existing_identities(
        &self,
        identity_field: CanonicalField,
    ) -> RepositoryResult<HashSet<String>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT DISTINCT identity_key({column}) FROM leads WHERE identity_key({column}) <> ''",
            column = identity_field.as_str()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut identities = HashSet::new();
        for key in rows {
            identities.insert(key?);
        }
        Ok(identities)
    }

    async fn commit_record(
        &self,
        record: &ImportRecord,
        identity_field: CanonicalField,
        policy: DuplicatePolicy,
        verdict: DuplicateVerdict,
    ) -> RepositoryResult<CommitKind> {
        let conn = self.lock()?;

        match (policy, verdict) {
            (DuplicatePolicy::Overwrite, DuplicateVerdict::Duplicate) => {
                Self::update_lead(&conn, record, identity_field)?;
                Ok(CommitKind::Updated)
            }
            (DuplicatePolicy::Skip, DuplicateVerdict::Duplicate) => {
                Err(RepositoryError::InternalError(format!(
                    "skip 策略下的重复记录不应提交 (行 {})",
                    record.row_number
                )))
            }
            _ => {
                Self::insert_lead(&conn, record)?;
                Ok(CommitKind::Inserted)
            }
        }
    }

    async fn list_lead_ids(&self, filter: &LeadFilter) -> RepositoryResult<Vec<i64>> {
        let conn = self.lock()?;

        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(desk) = &filter.desk {
            conditions.push("desk = ?");
            values.push(desk.clone());
        }
        if let Some(assignee) = &filter.assignee {
            conditions.push("assignee = ?");
            values.push(assignee.as_str().to_string());
        }
        if let Some(status) = &filter.status {
            conditions.push("status = ?");
            values.push(status.clone());
        }

        let mut sql = "SELECT lead_id FROM leads".to_string();
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY lead_id");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, i64>(0))?;

        let mut ids = Vec::new();
        for id in rows {
            ids.push(id?);
        }
        Ok(ids)
    }

    async fn assign_leads(&self, lead_ids: &[i64], worker: &WorkerId) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let now = Utc::now().to_rfc3339();
        let mut count = 0;
        {
            let mut stmt =
                tx.prepare("UPDATE leads SET assignee = ?1, updated_at = ?2 WHERE lead_id = ?3")?;
            for id in lead_ids {
                count += stmt.execute(params![worker.as_str(), now, id])?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }
}

#[async_trait]
impl WorkerDirectory for SqliteLeadRepository {
    async fn list_workers(&self, filter: &WorkerFilter) -> RepositoryResult<Vec<WorkerId>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT worker_id FROM workers
            WHERE (?1 IS NULL OR desk = ?1)
              AND (?2 = 0 OR active = 1)
            ORDER BY worker_id
            "#,
        )?;

        let rows = stmt.query_map(params![filter.desk, filter.active_only as i32], |row| {
            row.get::<_, String>(0)
        })?;

        let mut workers = Vec::new();
        for id in rows {
            workers.push(WorkerId(id?));
        }
        Ok(workers)
    }
}
