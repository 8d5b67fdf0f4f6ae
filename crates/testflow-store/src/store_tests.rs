
use super::*;

async fn store_with_execution() -> (ExecutionStore, Execution) {
    let store = ExecutionStore::in_memory().await.unwrap();
    let exec = Execution::new("go to example.com and check the title", Framework::Playwright);
    store.create_execution(&exec).await.unwrap();
    (store, exec)
}

#[tokio::test]
async fn test_create_and_get_execution() {
    let (store, exec) = store_with_execution().await;

    let loaded = store.get_execution(&exec.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, exec.id);
    assert_eq!(loaded.task, exec.task);
    assert_eq!(loaded.status, ExecutionStatus::Running);
    assert_eq!(loaded.framework, Framework::Playwright);
    assert!(loaded.finished_at.is_none());
}

#[tokio::test]
async fn test_get_unknown_execution() {
    let store = ExecutionStore::in_memory().await.unwrap();
    assert!(store.get_execution("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_finish_execution() {
    let (store, exec) = store_with_execution().await;

    store
        .finish_execution(&exec.id, ExecutionStatus::Passed, 4200, None)
        .await
        .unwrap();

    let loaded = store.get_execution(&exec.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, ExecutionStatus::Passed);
    assert_eq!(loaded.duration_ms, Some(4200));
    assert!(loaded.finished_at.is_some());
}

#[tokio::test]
async fn test_terminal_status_is_immutable() {
    let (store, exec) = store_with_execution().await;

    store
        .finish_execution(&exec.id, ExecutionStatus::Stopped, 100, None)
        .await
        .unwrap();

    let err = store
        .finish_execution(&exec.id, ExecutionStatus::Passed, 200, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));

    let loaded = store.get_execution(&exec.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, ExecutionStatus::Stopped);
    assert_eq!(loaded.duration_ms, Some(100));
}

#[tokio::test]
async fn test_finish_unknown_execution() {
    let store = ExecutionStore::in_memory().await.unwrap();
    let err = store
        .finish_execution("missing", ExecutionStatus::Failed, 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ExecutionNotFound(_)));
}

#[tokio::test]
async fn test_finish_rejects_running_target() {
    let (store, exec) = store_with_execution().await;
    let err = store
        .finish_execution(&exec.id, ExecutionStatus::Running, 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_steps_round_trip() {
    let (store, exec) = store_with_execution().await;

    let steps = vec![
        Step {
            execution_id: exec.id.clone(),
            step_number: 1,
            instruction: "navigate to example.com".to_string(),
            success: true,
            duration_ms: 850,
            screenshot_path: Some("/tmp/shot-1.png".to_string()),
            error: None,
        },
        Step {
            execution_id: exec.id.clone(),
            step_number: 2,
            instruction: "check the title".to_string(),
            success: false,
            duration_ms: 120,
            screenshot_path: None,
            error: Some("title mismatch".to_string()),
        },
    ];
    store.insert_steps(steps).await.unwrap();

    let loaded = store.steps_for(&exec.id).await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].step_number, 1);
    assert!(loaded[0].success);
    assert_eq!(loaded[1].error.as_deref(), Some("title mismatch"));
}

#[tokio::test]
async fn test_duplicate_step_number_rejected() {
    let (store, exec) = store_with_execution().await;

    let step = Step {
        execution_id: exec.id.clone(),
        step_number: 1,
        instruction: "first".to_string(),
        success: true,
        duration_ms: 10,
        screenshot_path: None,
        error: None,
    };
    store.insert_steps(vec![step.clone()]).await.unwrap();
    assert!(store.insert_steps(vec![step]).await.is_err());
}

#[tokio::test]
async fn test_artifacts_round_trip() {
    let (store, exec) = store_with_execution().await;

    let shot = Artifact::new(
        &exec.id,
        ArtifactKind::Screenshot,
        "/tmp/initial.png",
        Some("initial state".to_string()),
    );
    let report = Artifact::new(&exec.id, ArtifactKind::HtmlReport, "/tmp/report.html", None);
    store.insert_artifact(&shot).await.unwrap();
    store.insert_artifact(&report).await.unwrap();

    let all = store.artifacts_for(&exec.id).await.unwrap();
    assert_eq!(all.len(), 2);

    let screenshots = store
        .artifacts_by_kind(&exec.id, ArtifactKind::Screenshot)
        .await
        .unwrap();
    assert_eq!(screenshots.len(), 1);
    assert_eq!(screenshots[0].mime_type, "image/png");

    let by_id = store.get_artifact(&exec.id, &shot.id).await.unwrap();
    assert!(by_id.is_some());
    assert!(store
        .get_artifact("other-exec", &shot.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_requirements_round_trip() {
    let (store, exec) = store_with_execution().await;

    let mappings = vec![
        RequirementMapping {
            requirement_id: "REQ-1".to_string(),
            name: Some("Checkout works".to_string()),
            coverage: CoverageStatus::Covered,
        },
        RequirementMapping {
            requirement_id: "REQ-2".to_string(),
            name: None,
            coverage: CoverageStatus::Partial,
        },
    ];
    store
        .insert_requirements(&exec.id, mappings)
        .await
        .unwrap();

    let loaded = store.requirements_for(&exec.id).await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].requirement_id, "REQ-1");
    assert_eq!(loaded[1].coverage, CoverageStatus::Partial);
}

#[tokio::test]
async fn test_delete_cascades() {
    let (store, exec) = store_with_execution().await;

    store
        .insert_steps(vec![Step {
            execution_id: exec.id.clone(),
            step_number: 1,
            instruction: "step".to_string(),
            success: true,
            duration_ms: 5,
            screenshot_path: None,
            error: None,
        }])
        .await
        .unwrap();
    store
        .insert_artifact(&Artifact::new(
            &exec.id,
            ArtifactKind::Screenshot,
            "/tmp/s.png",
            None,
        ))
        .await
        .unwrap();
    store
        .insert_requirements(
            &exec.id,
            vec![RequirementMapping {
                requirement_id: "REQ-1".to_string(),
                name: None,
                coverage: CoverageStatus::Covered,
            }],
        )
        .await
        .unwrap();

    assert!(store.delete_execution(&exec.id).await.unwrap());

    assert!(store.get_execution(&exec.id).await.unwrap().is_none());
    assert!(store.steps_for(&exec.id).await.unwrap().is_empty());
    assert!(store.artifacts_for(&exec.id).await.unwrap().is_empty());
    assert!(store.requirements_for(&exec.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_unknown_returns_false() {
    let store = ExecutionStore::in_memory().await.unwrap();
    assert!(!store.delete_execution("missing").await.unwrap());
}

#[tokio::test]
async fn test_list_executions_newest_first() {
    let store = ExecutionStore::in_memory().await.unwrap();

    let mut first = Execution::new("first", Framework::Playwright);
    first.started_at = chrono::Utc::now() - chrono::Duration::seconds(60);
    let second = Execution::new("second", Framework::Puppeteer);
    store.create_execution(&first).await.unwrap();
    store.create_execution(&second).await.unwrap();

    let listed = store.list_executions(10, 0).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].task, "second");

    let paged = store.list_executions(1, 1).await.unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].task, "first");
}

#[tokio::test]
async fn test_stats() {
    let store = ExecutionStore::in_memory().await.unwrap();

    let pw_pass = Execution::new("a", Framework::Playwright);
    let pw_fail = Execution::new("b", Framework::Playwright);
    let pp_run = Execution::new("c", Framework::Puppeteer);
    for exec in [&pw_pass, &pw_fail, &pp_run] {
        store.create_execution(exec).await.unwrap();
    }
    store
        .finish_execution(&pw_pass.id, ExecutionStatus::Passed, 1000, None)
        .await
        .unwrap();
    store
        .finish_execution(&pw_fail.id, ExecutionStatus::Failed, 3000, Some("boom".into()))
        .await
        .unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.passed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.running, 1);
    assert_eq!(stats.avg_duration_ms, Some(2000.0));

    assert_eq!(stats.frameworks.len(), 2);
    let pw = stats
        .frameworks
        .iter()
        .find(|f| f.framework == "playwright")
        .unwrap();
    assert_eq!(pw.total, 2);
    assert_eq!(pw.passed, 1);
    assert_eq!(pw.failed, 1);
}

#[tokio::test]
async fn test_stats_empty() {
    let store = ExecutionStore::in_memory().await.unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total, 0);
    assert!(stats.avg_duration_ms.is_none());
    assert!(stats.frameworks.is_empty());
}
