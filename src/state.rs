use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AuditService, AuthService, PathSandbox, PayloadScanner, SeaOrmAuthService, TokenService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub auth: Arc<dyn AuthService>,

    pub audit: Arc<AuditService>,

    pub tokens: Arc<TokenService>,

    pub sandbox: Arc<PathSandbox>,

    pub scanner: PayloadScanner,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let audit = Arc::new(AuditService::new(
            store.clone(),
            config.security.audit_snippet_chars,
        ));

        let tokens = Arc::new(TokenService::new(
            config.security.effective_jwt_secret(),
            chrono::Duration::minutes(config.security.token_ttl_minutes),
        ));

        let sandbox = Arc::new(PathSandbox::from_config(&config.sandbox));
        sandbox.ensure_root()?;

        let auth: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            audit.clone(),
            tokens.clone(),
            &config.security,
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            auth,
            audit,
            tokens,
            sandbox,
            scanner: PayloadScanner::new(),
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
