use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::entities::{audit_logs, users};

pub mod migrator;
pub mod repositories;

pub use repositories::audit::AuditQuery;
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.starts_with(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_email_with_password(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>> {
        self.user_repo().get_by_email_with_password(email).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list_all().await
    }

    pub async fn get_users_by_ids(&self, ids: &[i32]) -> Result<Vec<User>> {
        self.user_repo().get_by_ids(ids).await
    }

    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        password: &str,
        role: &str,
        config: Option<&SecurityConfig>,
    ) -> Result<User> {
        self.user_repo()
            .create(email, name, password, role, config)
            .await
    }

    pub async fn set_user_lock_fields(
        &self,
        id: i32,
        is_locked: bool,
        failed_login: i32,
        locked_at: Option<String>,
    ) -> Result<()> {
        self.user_repo()
            .set_lock_fields(id, is_locked, failed_login, locked_at)
            .await
    }

    pub async fn update_user_password(
        &self,
        id: i32,
        password: &str,
        config: Option<&SecurityConfig>,
    ) -> Result<()> {
        self.user_repo().update_password(id, password, config).await
    }

    pub async fn update_user_role(&self, id: i32, role: &str) -> Result<Option<User>> {
        self.user_repo().update_role(id, role).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    pub async fn verify_user_password(
        &self,
        password_hash: String,
        password: String,
    ) -> Result<bool> {
        self.user_repo().verify_password(password_hash, password).await
    }

    pub async fn record_audit(
        &self,
        action: &str,
        user_id: Option<i32>,
        ip: Option<String>,
        executed_command: Option<String>,
    ) -> Result<()> {
        self.audit_repo()
            .add(action, user_id, ip, executed_command)
            .await
    }

    pub async fn audit_for_user(
        &self,
        user_id: i32,
        errors_only: bool,
        start_date: Option<String>,
        end_date: Option<String>,
        limit: u64,
    ) -> Result<Vec<audit_logs::Model>> {
        self.audit_repo()
            .for_user(user_id, errors_only, start_date, end_date, limit)
            .await
    }

    pub async fn audit_admin_query(
        &self,
        query: &AuditQuery,
    ) -> Result<(Vec<(audit_logs::Model, Option<users::Model>)>, u64)> {
        self.audit_repo().admin_query(query).await
    }

    pub async fn audit_top_actions(&self, limit: u64) -> Result<Vec<(String, i64)>> {
        self.audit_repo().top_actions(limit).await
    }

    pub async fn audit_top_users(&self, limit: u64) -> Result<Vec<(i32, i64)>> {
        self.audit_repo().top_users(limit).await
    }

    pub async fn audit_failures_since(&self, cutoff: &str) -> Result<u64> {
        self.audit_repo().failures_since(cutoff).await
    }
}
