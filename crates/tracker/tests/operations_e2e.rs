//! End-to-end service flows against PostgreSQL.
//!
//! # Running
//! ```bash
//! DATABASE_URL=postgres://... cargo test -p tracker --test operations_e2e
//! ```
//!
//! Tests are skipped if DATABASE_URL is not set.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use sqlx::PgPool;
use tracker::{
    auth::{JwtService, token_hash},
    clock::Clock,
    config::JwtConfig,
    db::{self, sessions::SessionRepository, users::User},
    domain::{Batch, BatchStatus, OperationStatus, Role},
    services::{
        AuthService, AuthServiceError, BatchService, OperationService, OperationServiceError,
        session_cleanup::cleanup_expired_sessions,
    },
};
use uuid::Uuid;

fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Skip test if database is not available.
macro_rules! skip_without_db {
    () => {
        if database_url().is_none() {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        }
    };
}

async fn create_pool() -> PgPool {
    let url = database_url().expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&url)
        .await
        .expect("Failed to connect to database");
    db::migrate(&pool).await.expect("Failed to run migrations");
    pool
}

fn jwt() -> JwtService {
    JwtService::new(&JwtConfig {
        secret: Arc::new("operations-e2e-secret".to_string().into()),
        algorithm: jsonwebtoken::Algorithm::HS256,
        expiration_hours: 24,
    })
}

/// A future weekday (never Monday or Thursday) unlikely to collide with other runs.
fn unique_open_date(clock: &Clock) -> NaiveDate {
    let offset = (Uuid::new_v4().as_u128() % 15_000) as i64 + 1;
    let mut date = clock.today() + Duration::days(offset);
    while !Batch::D.is_available_on(date) {
        date += Duration::days(1);
    }
    date
}

async fn register(pool: &PgPool, jwt: &JwtService) -> User {
    let email = format!("e2e-{}@example.com", Uuid::new_v4().simple());
    AuthService::new(pool, jwt)
        .register("E2E Tester", &email, "MySecurePass123")
        .await
        .expect("Failed to register user")
        .user
}

#[tokio::test]
async fn auth_flow_register_login_logout() {
    skip_without_db!();
    let pool = create_pool().await;
    let jwt = jwt();
    let auth = AuthService::new(&pool, &jwt);

    let email = format!("Flow-{}@Example.com", Uuid::new_v4().simple());
    let registered = auth
        .register("  Flow User ", &email, "MySecurePass123")
        .await
        .unwrap();
    assert_eq!(registered.user.name, "Flow User");
    assert_eq!(registered.user.email, email.to_lowercase());

    let duplicate = auth.register("Flow User", &email, "MySecurePass123").await;
    assert!(matches!(duplicate, Err(AuthServiceError::EmailExists)));

    let bad = auth.login(&email, "WrongPass123").await;
    assert!(matches!(bad, Err(AuthServiceError::InvalidCredentials)));

    let login = auth.login(&email, "MySecurePass123").await.unwrap();
    let hash = token_hash(&login.token.token);
    let sessions = SessionRepository::new(&pool);
    assert!(
        sessions
            .find_by_user_and_hash(login.user.id, &hash)
            .await
            .unwrap()
            .is_some()
    );

    auth.logout(login.user.id, &hash).await.unwrap();
    assert!(
        sessions
            .find_by_user_and_hash(login.user.id, &hash)
            .await
            .unwrap()
            .is_none()
    );
    // Second logout is harmless.
    auth.logout(login.user.id, &hash).await.unwrap();
}

#[tokio::test]
async fn expired_sessions_are_cleaned_up() {
    skip_without_db!();
    let pool = create_pool().await;
    let user = register(&pool, &jwt()).await;

    let sessions = SessionRepository::new(&pool);
    let expired = sessions
        .create(user.id, "expired-hash", chrono::Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    let removed = cleanup_expired_sessions(&pool).await.unwrap();
    assert!(removed >= 1);
    assert!(
        sessions
            .find_by_user_and_hash(user.id, &expired.token_hash)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn start_and_end_lifecycle() {
    skip_without_db!();
    let pool = create_pool().await;
    let clock = Clock::west_africa();
    let user = register(&pool, &jwt()).await;
    let service = OperationService::new(&pool, &clock);
    let date = unique_open_date(&clock);

    let not_started = service.end(date, Batch::A, Role::Procurement, &user).await;
    assert!(matches!(not_started, Err(OperationServiceError::NotStarted)));

    let started = service
        .start(date, Batch::A, Role::Procurement, &user)
        .await
        .unwrap();
    assert_eq!(started.operation.status, OperationStatus::InProgress);
    assert_eq!(started.operation.started_by.as_deref(), Some("E2E Tester"));
    assert_eq!(started.warning, None);

    let again = service.start(date, Batch::A, Role::Procurement, &user).await;
    match again {
        Err(OperationServiceError::AlreadyStarted {
            started_by,
            started_at,
        }) => {
            assert_eq!(started_by, "E2E Tester");
            assert!(started_at.is_some());
        }
        other => panic!("expected AlreadyStarted, got {other:?}"),
    }

    let next = service
        .start(date, Batch::A, Role::InventoryQcIn, &user)
        .await
        .unwrap();
    assert_eq!(
        next.warning.as_deref(),
        Some("Previous operation 'Procurement' not completed yet")
    );

    let ended = service
        .end(date, Batch::A, Role::Procurement, &user)
        .await
        .unwrap();
    assert_eq!(ended.operation.status, OperationStatus::Completed);
    assert_eq!(ended.operation.duration_minutes, Some(0));

    let twice = service.end(date, Batch::A, Role::Procurement, &user).await;
    assert!(matches!(twice, Err(OperationServiceError::AlreadyCompleted)));

    let check = service
        .check_previous(date, Batch::A, Role::InventoryQcIn)
        .await
        .unwrap();
    assert!(check.is_previous_completed);
    assert!(!check.show_warning);

    let missing = service.get(date, Batch::A, Role::Driver).await;
    assert!(matches!(missing, Err(OperationServiceError::NotFound)));
}

#[tokio::test]
async fn concurrent_starts_have_one_winner() {
    skip_without_db!();
    let pool = create_pool().await;
    let clock = Clock::west_africa();
    let user = register(&pool, &jwt()).await;
    let date = unique_open_date(&clock);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let clock = clock.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            OperationService::new(&pool, &clock)
                .start(date, Batch::B, Role::Manifester, &user)
                .await
                .is_ok()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn driver_completion_and_daily_summary() {
    skip_without_db!();
    let pool = create_pool().await;
    let clock = Clock::west_africa();
    let user = register(&pool, &jwt()).await;
    let operations = OperationService::new(&pool, &clock);
    let batches = BatchService::new(&pool, &clock);
    let date = unique_open_date(&clock);

    let initialized = batches.initialize(date, Batch::C).await.unwrap();
    assert_eq!(initialized.roles.len(), Role::COUNT);
    assert_eq!(initialized.progress.status, BatchStatus::Red);
    // Idempotent.
    batches.initialize(date, Batch::C).await.unwrap();

    let wrong_endpoint = operations.end(date, Batch::C, Role::Driver, &user).await;
    assert!(matches!(
        wrong_endpoint,
        Err(OperationServiceError::DriverRequiresStats)
    ));

    for role in Role::ALL {
        operations.start(date, Batch::C, role, &user).await.unwrap();
        if !role.is_driver() && role != Role::Manifester {
            operations.end(date, Batch::C, role, &user).await.unwrap();
        }
    }

    let too_many = operations
        .end_driver(date, Batch::C, 10, 11, &user)
        .await;
    assert!(matches!(
        too_many,
        Err(OperationServiceError::InvalidDeliveryStats(_))
    ));

    let driver = operations
        .end_driver(date, Batch::C, 150, 142, &user)
        .await
        .unwrap();
    assert_eq!(driver.warning.as_deref(), Some("Roles not completed: Manifester"));
    assert_eq!(driver.operation.on_time_percentage, Some(94.67));

    let detail = batches.detail(date, Batch::C).await.unwrap();
    assert_eq!(detail.progress.completed_count, 10);
    assert_eq!(detail.progress.status, BatchStatus::Yellow);
    assert!(!detail.is_readonly);

    let summary = batches.daily_summary(date).await.unwrap();
    assert_eq!(summary.total_batches, 4);
    assert_eq!(summary.completed_roles, 10);
    assert_eq!(summary.total_orders_delivered, Some(150));
    assert_eq!(summary.overall_on_time_percentage, Some(94.67));

    let board = operations.roles_status(date, Batch::C).await.unwrap();
    assert_eq!(board[9].status, OperationStatus::InProgress);
    assert_eq!(board[10].total_orders, Some(150));
}

#[tokio::test]
async fn past_dates_are_read_only() {
    skip_without_db!();
    let pool = create_pool().await;
    let clock = Clock::west_africa();
    let user = register(&pool, &jwt()).await;
    let service = OperationService::new(&pool, &clock);

    let mut yesterday = clock.today() - Duration::days(1);
    while !Batch::A.is_available_on(yesterday) {
        yesterday -= Duration::days(1);
    }
    let result = service.start(yesterday, Batch::A, Role::Procurement, &user).await;
    assert!(matches!(result, Err(OperationServiceError::ReadOnlyDate)));
}

#[tokio::test]
async fn completion_skips_batch_schedule_check() {
    skip_without_db!();
    let pool = create_pool().await;
    let clock = Clock::west_africa();
    let user = register(&pool, &jwt()).await;
    let service = OperationService::new(&pool, &clock);

    let mut monday = unique_open_date(&clock);
    while Batch::D.is_available_on(monday) {
        monday += Duration::days(1);
    }

    let started = service.start(monday, Batch::D, Role::Procurement, &user).await;
    assert!(matches!(
        started,
        Err(OperationServiceError::BatchNotAvailable { .. })
    ));

    let ended = service.end(monday, Batch::D, Role::Procurement, &user).await;
    assert!(matches!(ended, Err(OperationServiceError::NotStarted)));

    let driver = service.end_driver(monday, Batch::D, 10, 9, &user).await;
    assert!(matches!(driver, Err(OperationServiceError::NotStarted)));
}

#[tokio::test]
async fn dates_past_2100_are_rejected_before_the_database() {
    skip_without_db!();
    let pool = create_pool().await;
    let clock = Clock::west_africa();
    let user = register(&pool, &jwt()).await;
    let operations = OperationService::new(&pool, &clock);
    let date = NaiveDate::from_ymd_opt(2101, 1, 4).unwrap();

    let result = operations.start(date, Batch::A, Role::Procurement, &user).await;
    assert!(matches!(result, Err(OperationServiceError::DateOutOfRange)));

    let initialized = BatchService::new(&pool, &clock).initialize(date, Batch::A).await;
    assert!(matches!(
        initialized,
        Err(tracker::services::BatchServiceError::DateOutOfRange)
    ));
}
