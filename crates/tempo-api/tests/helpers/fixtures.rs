//! API-driven fixtures: short multi-step flows the tests repeat.

use axum_test::TestServer;
use serde_json::{json, Value};

use super::api_path;
use super::auth::TestUser;
use tempo_api::constants::ORGANIZATION_HEADER;

/// Create an organization owned by `user`. Returns the creation body
/// (`organization` plus the founding `membership`).
pub async fn create_organization(client: &TestServer, user: &TestUser, name: &str) -> Value {
    let response = client
        .post(&api_path("/organizations"))
        .add_header("Authorization", user.bearer())
        .json(&json!({ "name": name }))
        .await;
    assert_eq!(
        response.status_code(),
        201,
        "organization creation should succeed: {}",
        response.text()
    );
    response.json::<Value>()
}

/// Create a project in `org` (slug or UUID) as `user`. Returns the project.
pub async fn create_project(
    client: &TestServer,
    user: &TestUser,
    org: &str,
    name: &str,
) -> Value {
    let response = client
        .post(&api_path("/projects"))
        .add_header("Authorization", user.bearer())
        .add_header(ORGANIZATION_HEADER, org.to_string())
        .json(&json!({ "name": name }))
        .await;
    assert_eq!(
        response.status_code(),
        201,
        "project creation should succeed: {}",
        response.text()
    );
    response.json::<Value>()
}

/// Create a client record in `org` as `user`. Returns the client.
pub async fn create_client_record(
    client: &TestServer,
    user: &TestUser,
    org: &str,
    name: &str,
) -> Value {
    let response = client
        .post(&api_path("/clients"))
        .add_header("Authorization", user.bearer())
        .add_header(ORGANIZATION_HEADER, org.to_string())
        .json(&json!({ "name": name }))
        .await;
    assert_eq!(
        response.status_code(),
        201,
        "client creation should succeed: {}",
        response.text()
    );
    response.json::<Value>()
}

/// Invite `invitee` into `org` (as `admin`) and accept the invitation as the
/// invitee. Returns the activated membership.
pub async fn invite_and_accept(
    client: &TestServer,
    admin: &TestUser,
    org: &str,
    invitee: &TestUser,
    role: &str,
) -> Value {
    let invite_response = client
        .post(&api_path(&format!(
            "/organizations/{}/members/invitations",
            org
        )))
        .add_header("Authorization", admin.bearer())
        .json(&json!({ "email": invitee.email, "role": role }))
        .await;
    assert_eq!(
        invite_response.status_code(),
        201,
        "invitation should be issued: {}",
        invite_response.text()
    );
    let invitation = invite_response.json::<Value>();
    let token = invitation["token"]
        .as_str()
        .expect("invitation response carries the plaintext token");

    let accept_response = client
        .post(&api_path("/members/invitations/accept"))
        .add_header("Authorization", invitee.bearer())
        .json(&json!({ "token": token }))
        .await;
    assert_eq!(
        accept_response.status_code(),
        200,
        "invitation acceptance should succeed: {}",
        accept_response.text()
    );
    accept_response.json::<Value>()
}
