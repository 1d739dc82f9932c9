//! Database migration support.
//!
//! Embeds and runs SQL migrations from `warden_core/migrations/`. Only the
//! tables this crate owns are created here; users, roles and permissions
//! belong to the administration service.

use sqlx::PgPool;

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
