//! Integration tests for the job and user repositories.
//!
//! Exercises lifecycle guards, log appends, and owner scoping against a
//! real database.

use sqlx::PgPool;
use tutorgen_core::types::DbId;
use tutorgen_db::models::job::{Job, JobSnapshot, LogEntry};
use tutorgen_db::models::status::JobStatus;
use tutorgen_db::models::user::CreateUser;
use tutorgen_db::repositories::{JobRepo, UserRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn new_user(pool: &PgPool, email: &str) -> DbId {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            full_name: "Store Tests".to_string(),
            password_hash: "$argon2id$unused".to_string(),
        },
    )
    .await
    .expect("user insert should succeed")
    .id
}

async fn new_job(pool: &PgPool, owner_id: DbId) -> Job {
    JobRepo::create(
        pool,
        owner_id,
        &serde_json::json!({ "local_dir": "/tmp/demo" }),
        &LogEntry::info("Initializing", 0, "Job created for source: /tmp/demo"),
    )
    .await
    .expect("job insert should succeed")
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn new_job_is_pending_with_one_seed_log(pool: PgPool) {
    let owner = new_user(&pool, "a@example.com").await;
    let job = new_job(&pool, owner).await;

    assert_eq!(job.status_id, JobStatus::Pending.id());
    assert_eq!(job.progress, 0);
    assert!(job.current_step.is_none());
    assert!(job.result.is_none());
    assert!(job.error_message.is_none());
    assert!(job.completed_at.is_none());
    assert_eq!(job.logs.0.len(), 1);
    assert_eq!(job.logs.0[0].step, "Initializing");

    let snapshot = JobSnapshot::from(job);
    assert_eq!(snapshot.status, "pending");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn job_statuses_table_is_seeded(pool: PgPool) {
    let names: Vec<(i16, String)> =
        sqlx::query_as("SELECT id, name FROM job_statuses ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();

    let expected = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];
    assert_eq!(names.len(), expected.len());
    for ((id, name), status) in names.iter().zip(expected) {
        assert_eq!(*id, status.id());
        assert_eq!(name, status.as_str());
    }
}

// ---------------------------------------------------------------------------
// Transition guards
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn lifecycle_moves_strictly_forward(pool: PgPool) {
    let owner = new_user(&pool, "a@example.com").await;
    let job = new_job(&pool, owner).await;

    // pending -> completed is illegal: completion requires processing.
    assert!(!JobRepo::complete(&pool, job.id, &serde_json::json!({}))
        .await
        .unwrap());

    assert!(JobRepo::mark_processing(&pool, job.id).await.unwrap());
    // A second claim must fail.
    assert!(!JobRepo::mark_processing(&pool, job.id).await.unwrap());

    assert!(JobRepo::complete(&pool, job.id, &serde_json::json!({ "chapters": [] }))
        .await
        .unwrap());

    // Terminal means terminal.
    assert!(!JobRepo::mark_processing(&pool, job.id).await.unwrap());
    assert!(!JobRepo::fail(
        &pool,
        job.id,
        "late",
        &LogEntry::error("Failed", 0, "late")
    )
    .await
    .unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn failing_keeps_progress_and_appends_an_error_entry(pool: PgPool) {
    let owner = new_user(&pool, "a@example.com").await;
    let job = new_job(&pool, owner).await;

    JobRepo::mark_processing(&pool, job.id).await.unwrap();
    JobRepo::update_progress_with_log(
        &pool,
        job.id,
        "Writing chapters",
        40,
        &LogEntry::info("Writing chapters", 40, "Wrote chapter 1"),
    )
    .await
    .unwrap();

    assert!(JobRepo::fail(
        &pool,
        job.id,
        "disk full",
        &LogEntry::error("Writing chapters", 40, "disk full")
    )
    .await
    .unwrap());

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.status_id, JobStatus::Failed.id());
    assert_eq!(job.progress, 40, "failure must not reset progress");
    assert_eq!(job.error_message.as_deref(), Some("disk full"));
    assert!(job.result.is_none());
    assert_eq!(job.logs.0.len(), 3);
    assert!(job
        .logs
        .0
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn progress_updates_are_last_write_wins(pool: PgPool) {
    let owner = new_user(&pool, "a@example.com").await;
    let job = new_job(&pool, owner).await;
    JobRepo::mark_processing(&pool, job.id).await.unwrap();

    JobRepo::update_progress(&pool, job.id, "Fetching source", 60)
        .await
        .unwrap();
    // A later, lower report is accepted as-is (e.g. an internal retry).
    JobRepo::update_progress(&pool, job.id, "Fetching source", 30)
        .await
        .unwrap();

    let job = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(job.progress, 30);
    assert_eq!(job.current_step.as_deref(), Some("Fetching source"));
}

// ---------------------------------------------------------------------------
// Owner scoping and listing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn owner_scoped_lookup_hides_other_users_jobs(pool: PgPool) {
    let alice = new_user(&pool, "alice@example.com").await;
    let bob = new_user(&pool, "bob@example.com").await;
    let job = new_job(&pool, alice).await;

    assert!(JobRepo::find_by_id_for_owner(&pool, job.id, alice)
        .await
        .unwrap()
        .is_some());
    // Same answer for "wrong owner" and "no such job".
    assert!(JobRepo::find_by_id_for_owner(&pool, job.id, bob)
        .await
        .unwrap()
        .is_none());
    assert!(JobRepo::find_by_id_for_owner(&pool, job.id + 1000, alice)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn listing_returns_own_jobs_newest_first(pool: PgPool) {
    let alice = new_user(&pool, "alice@example.com").await;
    let bob = new_user(&pool, "bob@example.com").await;

    let first = new_job(&pool, alice).await;
    let second = new_job(&pool, alice).await;
    new_job(&pool, bob).await;

    let jobs = JobRepo::list_by_owner(&pool, alice).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, second.id);
    assert_eq!(jobs[1].id, first.id);
    assert!(jobs.iter().all(|j| j.owner_id == alice));
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_email_violates_unique_constraint(pool: PgPool) {
    new_user(&pool, "dup@example.com").await;

    let err = UserRepo::create(
        &pool,
        &CreateUser {
            email: "dup@example.com".to_string(),
            full_name: "Other".to_string(),
            password_hash: "$argon2id$unused".to_string(),
        },
    )
    .await
    .expect_err("duplicate email must be rejected");

    match err {
        sqlx::Error::Database(db_err) => {
            assert_eq!(db_err.constraint(), Some("uq_users_email"));
        }
        other => panic!("expected a database error, got {other:?}"),
    }
}
