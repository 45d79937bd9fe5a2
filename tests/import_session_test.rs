// ==========================================
// 导入会话集成测试
// ==========================================
// 测试目标: 上传 → 解码 → 映射 → 预览 → 配置 → 提交（SQLite）
// ==========================================


use lead_import::domain::{
    AssigneeStrategy, CanonicalField, DuplicatePolicy, LeadDefaults, SessionState, WorkerId,
};
use lead_import::engine::{CancellationSignal, ImportSession, SessionConfig};
use lead_import::importer::{error_report_string, ImportError};
use lead_import::logging;
use lead_import::repository::{LeadRepository, WorkerDirectory, WorkerFilter};
use test_helpers::{create_seeded_repo, leads_csv, test_config};

fn configured_session(bytes: Vec<u8>, file_name: &str, settings: SessionConfig) -> ImportSession {
    let mut session = ImportSession::upload(file_name, bytes, test_config());
    session.decode().expect("decode");
    session.map().expect("map");
    session.preview().expect("preview");
    session.configure(settings).expect("configure");
    session
}

#[tokio::test]
async fn test_single_row_end_to_end() {
    logging::init_test();
    let (_tmp, repo) = create_seeded_repo().unwrap();

    let mut session = ImportSession::upload(
        "leads.csv",
        leads_csv(&[["Jane", "Doe", "jane@x.com", "555-0100"]]),
        test_config(),
    );
    session.decode().unwrap();
    let mapping = session.map().unwrap();
    assert_eq!(mapping.get(CanonicalField::FirstName), Some(0));
    assert_eq!(mapping.get(CanonicalField::LastName), Some(1));
    assert_eq!(mapping.get(CanonicalField::Email), Some(2));
    assert_eq!(mapping.get(CanonicalField::Phone), Some(3));

    session.preview().unwrap();
    session.configure(SessionConfig::default()).unwrap();
    assert_eq!(session.state(), SessionState::Configured);

    let outcome = session.commit(&repo, &CancellationSignal::new()).await.unwrap();
    assert_eq!(outcome.imported, 1);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.failed, 0);
    assert_eq!(outcome.total, 1);
    assert_eq!(repo.count_leads().unwrap(), 1);

    let stored = repo.find_by_identity(CanonicalField::Email, "JANE@x.com").unwrap();
    assert_eq!(stored[0].source, "import");
    assert_eq!(stored[0].status, "new");
}

#[tokio::test]
async fn test_skip_against_existing_and_in_batch() {
    let (_tmp, repo) = create_seeded_repo().unwrap();

    let first = leads_csv(&[["Jane", "Doe", "jane@x.com", "1"]]);
    configured_session(first, "a.csv", SessionConfig::default())
        .commit(&repo, &CancellationSignal::new())
        .await
        .unwrap();

    let second = leads_csv(&[
        ["Jane", "Doe", " Jane@X.com", "1"],
        ["Ann", "Lee", "ann@x.com", "2"],
        ["Ann", "Lee", "ANN@x.com", "3"],
    ]);
    let outcome = configured_session(second, "b.csv", SessionConfig::default())
        .commit(&repo, &CancellationSignal::new())
        .await
        .unwrap();

    assert_eq!(outcome.imported, 1);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(repo.count_leads().unwrap(), 2);
}

#[tokio::test]
async fn test_overwrite_updates_existing_lead() {
    let (_tmp, repo) = create_seeded_repo().unwrap();

    configured_session(
        leads_csv(&[["Jane", "Doe", "jane@x.com", "1"]]),
        "a.csv",
        SessionConfig::default(),
    )
    .commit(&repo, &CancellationSignal::new())
    .await
    .unwrap();

    let settings = SessionConfig {
        policy: DuplicatePolicy::Overwrite,
        ..Default::default()
    };
    let outcome = configured_session(
        leads_csv(&[["Janet", "Doe", "jane@x.com", "9"]]),
        "b.csv",
        settings,
    )
    .commit(&repo, &CancellationSignal::new())
    .await
    .unwrap();

    assert_eq!(outcome.imported, 1);
    assert_eq!(outcome.updated, 1);
    let stored = repo.find_by_identity(CanonicalField::Email, "jane@x.com").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].first_name, "Janet");
    assert_eq!(stored[0].phone, "9");
}

#[tokio::test]
async fn test_accented_email_skip_then_overwrite() {
    let (_tmp, repo) = create_seeded_repo().unwrap();

    let first = leads_csv(&[["Jose", "Ruiz", "JOSÉ@x.es", "1"]]);
    let outcome = configured_session(first, "a.csv", SessionConfig::default())
        .commit(&repo, &CancellationSignal::new())
        .await
        .unwrap();
    assert_eq!(outcome.imported, 1);

    let again = leads_csv(&[["Jose", "Ruiz", "josé@x.es", "1"]]);
    let outcome = configured_session(again, "b.csv", SessionConfig::default())
        .commit(&repo, &CancellationSignal::new())
        .await
        .unwrap();
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.imported, 0);

    let settings = SessionConfig {
        policy: DuplicatePolicy::Overwrite,
        ..Default::default()
    };
    let outcome = configured_session(
        leads_csv(&[["José", "Ruiz", "josé@x.es", "2"]]),
        "c.csv",
        settings,
    )
    .commit(&repo, &CancellationSignal::new())
    .await
    .unwrap();

    assert_eq!(outcome.failed, 0);
    assert_eq!(outcome.imported, 1);
    assert_eq!(outcome.updated, 1);
    let stored = repo.find_by_identity(CanonicalField::Email, "JOSÉ@X.ES").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].first_name, "José");
    assert_eq!(stored[0].phone, "2");
}

#[tokio::test]
async fn test_insert_policy_allows_shared_identity() {
    let (_tmp, repo) = create_seeded_repo().unwrap();
    let settings = SessionConfig {
        policy: DuplicatePolicy::Insert,
        ..Default::default()
    };

    let outcome = configured_session(
        leads_csv(&[["A", "B", "x@a.com", "1"], ["C", "D", "x@a.com", "2"]]),
        "a.csv",
        settings,
    )
    .commit(&repo, &CancellationSignal::new())
    .await
    .unwrap();

    assert_eq!(outcome.imported, 2);
    assert_eq!(repo.find_by_identity(CanonicalField::Email, "x@a.com").unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_assignee_is_per_row_failure() {
    let (_tmp, repo) = create_seeded_repo().unwrap();
    let settings = SessionConfig {
        defaults: LeadDefaults {
            assignee: AssigneeStrategy::Fixed(WorkerId::from("ghost")),
            ..Default::default()
        },
        ..Default::default()
    };

    let outcome = configured_session(
        leads_csv(&[["A", "B", "a@a.com", "1"], ["C", "D", "c@a.com", "2"]]),
        "a.csv",
        settings,
    )
    .commit(&repo, &CancellationSignal::new())
    .await
    .unwrap();

    assert_eq!(outcome.failed, 2);
    assert_eq!(outcome.imported, 0);
    assert_eq!(outcome.errors.len(), 2);
    assert_eq!(outcome.errors[1].row_number, 2);

    let report = error_report_string(&outcome).unwrap();
    assert!(report.starts_with("row,identity,message"));
    assert!(report.contains("c@a.com"));
}

#[tokio::test]
async fn test_spread_over_desk_workers() {
    let (_tmp, repo) = create_seeded_repo().unwrap();
    let workers = repo
        .list_workers(&WorkerFilter {
            desk: Some("EU".into()),
            active_only: true,
        })
        .await
        .unwrap();
    assert_eq!(workers, vec![WorkerId::from("w1"), WorkerId::from("w2")]);

    let settings = SessionConfig {
        defaults: LeadDefaults {
            desk: Some("EU".into()),
            assignee: AssigneeStrategy::Spread(workers),
            ..Default::default()
        },
        ..Default::default()
    };
    let rows: Vec<[&str; 4]> = vec![
        ["A", "A", "1@x.com", "1"],
        ["B", "B", "2@x.com", "2"],
        ["C", "C", "3@x.com", "3"],
    ];
    let outcome = configured_session(leads_csv(&rows), "a.csv", settings)
        .commit(&repo, &CancellationSignal::new())
        .await
        .unwrap();

    assert_eq!(outcome.imported, 3);
    assert_eq!(repo.count_by_assignee(&WorkerId::from("w1")).unwrap(), 2);
    assert_eq!(repo.count_by_assignee(&WorkerId::from("w2")).unwrap(), 1);
}

#[tokio::test]
async fn test_cancelled_commit_keeps_nothing_new() {
    let (_tmp, repo) = create_seeded_repo().unwrap();
    let cancel = CancellationSignal::new();
    cancel.cancel();

    let outcome = configured_session(
        leads_csv(&[["A", "B", "a@a.com", "1"]]),
        "a.csv",
        SessionConfig::default(),
    )
    .commit(&repo, &cancel)
    .await
    .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.processed(), 0);
    assert_eq!(repo.count_leads().unwrap(), 0);
}

#[tokio::test]
async fn test_semicolon_file_with_spanish_headers() {
    let (_tmp, repo) = create_seeded_repo().unwrap();
    let text = "\u{feff}Nombre;Apellido;Correo;Teléfono;País\r\n\
                Lucía;García;lucia@x.es;600111222;ES\r\n\
                \r\n\
                Pablo;\"Ruiz; Jr\";pablo@x.es;600333444;ES\r\n";

    let mut session = ImportSession::upload("leads.txt", text.as_bytes().to_vec(), test_config());
    let table = session.decode().unwrap();
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(1, 1), Some("Ruiz; Jr"));

    let mapping = session.map().unwrap();
    assert!(mapping.is_complete());
    assert_eq!(mapping.get(CanonicalField::Country), Some(4));

    session.preview().unwrap();
    session.configure(SessionConfig::default()).unwrap();
    let outcome = session.commit(&repo, &CancellationSignal::new()).await.unwrap();
    assert_eq!(outcome.imported, 2);

    let known = repo.lookup_existing_identities(CanonicalField::Email).await.unwrap();
    assert!(known.contains("lucia@x.es"));
}

#[tokio::test]
async fn test_empty_upload_fails_session() {
    let mut session = ImportSession::upload("empty.csv", Vec::new(), test_config());
    assert!(matches!(session.decode(), Err(ImportError::Decode(_))));
    assert_eq!(session.state(), SessionState::Failed);
}
