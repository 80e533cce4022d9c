pub mod operations;
pub mod sessions;
pub mod users;

use sqlx::{PgPool, migrate::MigrateError, postgres::PgPoolOptions};

/// Default number of PostgreSQL connections in the pool.
/// Can be overridden via the `TRACKER_PG_MAX_CONNECTIONS` environment variable.
const DEFAULT_MAX_CONNECTIONS: u32 = 15;

/// Gets the maximum number of PostgreSQL connections from the environment.
///
/// Returns the value of `TRACKER_PG_MAX_CONNECTIONS` when it is a positive
/// integer, otherwise `DEFAULT_MAX_CONNECTIONS` (a base of 5 plus 10 overflow).
pub fn get_max_connections() -> u32 {
    std::env::var("TRACKER_PG_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_MAX_CONNECTIONS)
}

pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(get_max_connections())
        .acquire_timeout(std::time::Duration::from_secs(30))
}

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    pool_options().connect(database_url).await
}

/// Pool that only opens connections on first use.
pub fn create_lazy_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    pool_options().connect_lazy(database_url)
}

/// Round-trip a trivial query to confirm the database answers.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
