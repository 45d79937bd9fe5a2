// ==========================================
// 线索导入引擎 - 命令行入口
// ==========================================
// 用法:
//   lead-import <file> [--db PATH] [--policy skip|overwrite|insert]
//               [--identity email|phone] [--workers DESK]
//
// 流程: 上传 → 解码 → 自动映射 → 预览 → 配置 → 提交，结果以 JSON 输出
// ==========================================

use anyhow::{anyhow, bail, Context};
use lead_import::config::{get_default_db_path, ConfigManager, ImportConfig};
use lead_import::domain::{AssigneeStrategy, CanonicalField, DuplicatePolicy, LeadDefaults};
use lead_import::engine::{CancellationSignal, ImportSession, SessionConfig};
use lead_import::importer::write_error_report;
use lead_import::repository::{SqliteLeadRepository, WorkerDirectory, WorkerFilter};
use lead_import::logging;
use std::path::PathBuf;
use std::sync::Arc;

/// 命令行参数
#[derive(Debug)]
struct CliArgs {
    file: PathBuf,
    db_path: Option<String>,
    policy: DuplicatePolicy,
    identity_field: CanonicalField,
    workers_desk: Option<String>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let mut file = None;
    let mut db_path = None;
    let mut policy = DuplicatePolicy::Skip;
    let mut identity_field = CanonicalField::Email;
    let mut workers_desk = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => db_path = Some(args.next().ok_or_else(|| anyhow!("--db 缺少参数"))?),
            "--policy" => {
                let value = args.next().ok_or_else(|| anyhow!("--policy 缺少参数"))?;
                policy = value.parse().map_err(|e: String| anyhow!(e))?;
            }
            "--identity" => {
                let value = args.next().ok_or_else(|| anyhow!("--identity 缺少参数"))?;
                identity_field = value.parse().map_err(|e: String| anyhow!(e))?;
            }
            "--workers" => {
                workers_desk = Some(args.next().ok_or_else(|| anyhow!("--workers 缺少参数"))?)
            }
            other if other.starts_with("--") => bail!("未知参数: {}", other),
            other => {
                if file.is_some() {
                    bail!("只能指定一个导入文件");
                }
                file = Some(PathBuf::from(other));
            }
        }
    }

    Ok(CliArgs {
        file: file.ok_or_else(|| {
            anyhow!("用法: lead-import <file> [--db PATH] [--policy skip|overwrite|insert] [--identity email|phone] [--workers DESK]")
        })?,
        db_path,
        policy,
        identity_field,
        workers_desk,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // LEAD_IMPORT_LOG_FORMAT=json → JSON 行日志
    match std::env::var("LEAD_IMPORT_LOG_FORMAT").as_deref() {
        Ok("json") => logging::init_json(),
        _ => logging::init(),
    }

    let args = parse_args()?;
    let db_path = args.db_path.clone().unwrap_or_else(get_default_db_path);
    tracing::info!(version = lead_import::VERSION, db_path = %db_path, "线索导入启动");

    let repo = Arc::new(SqliteLeadRepository::new(&db_path).context("无法打开数据库")?);
    let config_manager = ConfigManager::from_connection(repo.connection())?;
    let config = ImportConfig::load(&config_manager).await?;

    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("无法读取文件: {}", args.file.display()))?;
    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let assignee = match &args.workers_desk {
        Some(desk) => {
            let filter = WorkerFilter {
                desk: Some(desk.clone()),
                active_only: true,
            };
            AssigneeStrategy::Spread(repo.list_workers(&filter).await?)
        }
        None => AssigneeStrategy::Unassigned,
    };

    let mut session = ImportSession::upload(file_name, bytes, config.clone());
    session.decode()?;
    session.map()?;
    for warning in session.mapping_warnings() {
        tracing::warn!(warning = ?warning, "映射告警");
    }
    session.preview()?;
    session.configure(SessionConfig {
        identity_field: args.identity_field,
        policy: args.policy,
        defaults: LeadDefaults {
            desk: args.workers_desk.clone(),
            assignee,
            source: config.default_source.clone(),
            status: config.default_status.clone(),
        },
    })?;

    // Ctrl-C → 在行边界停止
    let cancel = CancellationSignal::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let outcome = session.commit(repo.as_ref(), &cancel).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if !outcome.errors.is_empty() {
        write_error_report(&outcome, std::io::stderr())?;
    }
    Ok(())
}
