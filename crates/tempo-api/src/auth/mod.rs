pub mod middleware;
pub mod models;
pub mod token;

pub use middleware::auth_middleware;
pub use models::AuthUser;
