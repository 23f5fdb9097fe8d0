//! Application state shared by handlers and middleware.

use sqlx::PgPool;
use tempo_core::AppConfig;
use tempo_db::{AccessTokenRepository, MembershipRepository, OrganizationRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pool: PgPool,
    pub organizations: OrganizationRepository,
    pub memberships: MembershipRepository,
    pub access_tokens: AccessTokenRepository,
}

impl AppState {
    pub fn new(config: AppConfig, pool: PgPool) -> Self {
        Self {
            organizations: OrganizationRepository::new(pool.clone()),
            memberships: MembershipRepository::new(pool.clone()),
            access_tokens: AccessTokenRepository::new(pool.clone()),
            config,
            pool,
        }
    }
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
