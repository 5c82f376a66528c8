//! Concurrency and cancellation tests.
//!
//! Concurrent workflow calls share one pool. The store's constraints decide
//! races, and the loser must see the specific error kind rather than an
//! internal error. Cancelled operations must leave no partial state.

use rand::rngs::StdRng;
use rand::SeedableRng;
use review_assigner::db;
use review_assigner::models::{NewPullRequest, NewTeamMember};
use review_assigner::services::{with_cancellation, ReviewWorkflow};
use review_assigner::AppError;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio_util::sync::CancellationToken;

async fn setup_workflow(team: &[&str]) -> (TempDir, Arc<ReviewWorkflow>) {
    let dir = tempdir().unwrap();
    let pool = db::initialize(&dir.path().join("test.db")).await.unwrap();
    let wf = ReviewWorkflow::with_rng(pool, StdRng::seed_from_u64(9));

    let members = team
        .iter()
        .map(|id| NewTeamMember::new(*id, id.to_uppercase(), true))
        .collect();
    wf.create_team("T", members).await.unwrap();

    (dir, Arc::new(wf))
}

async fn count_rows(wf: &ReviewWorkflow, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(wf.pool()).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_same_id_has_one_winner() {
    let (_dir, wf) = setup_workflow(&["a", "r1", "r2", "r3"]).await;

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let wf = wf.clone();
            tokio::spawn(async move {
                wf.create_pull_request(NewPullRequest::new("race", format!("attempt {}", i), "a"))
                    .await
            })
        })
        .collect();

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(pr) => {
                created += 1;
                assert_eq!(pr.reviewers.len(), 2);
            }
            Err(AppError::PrExists { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 3);
    assert_eq!(count_rows(&wf, "SELECT COUNT(*) FROM pull_requests").await, 1);
    assert_eq!(count_rows(&wf, "SELECT COUNT(*) FROM pr_reviewers").await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_on_distinct_ids() {
    let (_dir, wf) = setup_workflow(&["a", "r1", "r2", "r3"]).await;

    let results = futures::future::join_all((0..10).map(|i| {
        let wf = wf.clone();
        async move {
            wf.create_pull_request(NewPullRequest::new(format!("p{}", i), "t", "a"))
                .await
        }
    }))
    .await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(count_rows(&wf, "SELECT COUNT(*) FROM pull_requests").await, 10);
    assert_eq!(count_rows(&wf, "SELECT COUNT(*) FROM pr_reviewers").await, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_merges_agree() {
    let (_dir, wf) = setup_workflow(&["a", "r1"]).await;
    wf.create_pull_request(NewPullRequest::new("p1", "t", "a")).await.unwrap();

    let results = futures::future::join_all((0..6).map(|_| {
        let wf = wf.clone();
        async move { wf.merge_pull_request("p1").await }
    }))
    .await;

    let merged: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
    assert!(merged.iter().all(|pr| pr.is_merged()));
    assert!(merged.iter().all(|pr| pr.merged_at == merged[0].merged_at));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reassign_of_same_reviewer() {
    let (_dir, wf) = setup_workflow(&["a", "r1", "r2", "r3", "r4", "r5"]).await;
    let pr = wf.create_pull_request(NewPullRequest::new("p1", "t", "a")).await.unwrap();
    let outgoing = pr.reviewers[0].clone();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let wf = wf.clone();
            let outgoing = outgoing.clone();
            tokio::spawn(async move { wf.reassign_reviewer("p1", &outgoing).await })
        })
        .collect();

    let mut replaced = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => replaced += 1,
            Err(err) => assert_eq!(err.code(), "NOT_ASSIGNED"),
        }
    }
    assert_eq!(replaced, 1);

    let after = wf.get_pull_request("p1").await.unwrap();
    assert_eq!(after.reviewers.len(), 2);
    assert!(!after.has_reviewer(&outgoing));
    assert!(!after.has_reviewer("a"));
}

#[tokio::test]
async fn test_cancelled_before_start_writes_nothing() {
    let (_dir, wf) = setup_workflow(&["a", "r1", "r2"]).await;
    let token = CancellationToken::new();
    token.cancel();

    let result = with_cancellation(
        &token,
        wf.create_pull_request(NewPullRequest::new("p1", "t", "a")),
    )
    .await;

    assert!(matches!(result, Err(AppError::Cancelled)));
    assert_eq!(count_rows(&wf, "SELECT COUNT(*) FROM pull_requests").await, 0);
}

/// Cancel while the create transaction is waiting on the write lock held by
/// another connection. The dropped transaction must roll back.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_mid_transaction_rolls_back() {
    let (_dir, wf) = setup_workflow(&["a", "r1", "r2"]).await;

    let mut blocker = wf.pool().begin().await.unwrap();
    sqlx::query("INSERT INTO teams (name) VALUES ('lock-holder')")
        .execute(&mut *blocker)
        .await
        .unwrap();

    let token = CancellationToken::new();
    let task = {
        let wf = wf.clone();
        let token = token.clone();
        tokio::spawn(async move {
            with_cancellation(
                &token,
                wf.create_pull_request(NewPullRequest::new("p1", "t", "a")),
            )
            .await
        })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    token.cancel();
    let result = task.await.unwrap();
    assert!(matches!(result, Err(AppError::Cancelled)));

    blocker.rollback().await.unwrap();

    assert_eq!(count_rows(&wf, "SELECT COUNT(*) FROM pull_requests").await, 0);
    assert_eq!(count_rows(&wf, "SELECT COUNT(*) FROM pr_reviewers").await, 0);

    // The engine is still usable afterwards.
    let pr = wf
        .create_pull_request(NewPullRequest::new("p1", "t", "a"))
        .await
        .unwrap();
    assert_eq!(pr.reviewers.len(), 2);
}
