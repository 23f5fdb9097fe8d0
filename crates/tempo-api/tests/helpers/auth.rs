//! Test user seeding.
//!
//! There is no signup endpoint; user accounts come from an external identity
//! system. Tests therefore insert users directly and mint personal access
//! tokens through the same generate/hash path the service uses.

use sqlx::PgPool;
use tempo_api::auth::token::{generate_access_token, hash_access_token};
use tempo_db::AccessTokenRepository;
use uuid::Uuid;

/// A seeded user with a live access token.
pub struct TestUser {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

impl TestUser {
    /// `Authorization` header value for this user.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Insert a user and mint an access token for them.
pub async fn seed_user(pool: &PgPool, email: &str, display_name: &str) -> TestUser {
    seed_user_inner(pool, email, display_name, false).await
}

/// Insert a platform superadmin. The flag lives on the user record; no
/// membership anywhere is implied.
pub async fn seed_superadmin(pool: &PgPool, email: &str, display_name: &str) -> TestUser {
    seed_user_inner(pool, email, display_name, true).await
}

async fn seed_user_inner(
    pool: &PgPool,
    email: &str,
    display_name: &str,
    is_superadmin: bool,
) -> TestUser {
    let user_id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (email, display_name, is_superadmin) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(email)
    .bind(display_name)
    .bind(is_superadmin)
    .fetch_one(pool)
    .await
    .expect("Failed to insert test user");

    let token = generate_access_token();
    AccessTokenRepository::new(pool.clone())
        .create_token(user_id, &hash_access_token(&token))
        .await
        .expect("Failed to create test access token");

    TestUser {
        user_id,
        email: email.to_string(),
        token,
    }
}
