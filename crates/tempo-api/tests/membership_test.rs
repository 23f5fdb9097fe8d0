//! Membership lifecycle integration tests: invitations, acceptance,
//! revocation, role changes, and the last-admin invariants.
//!
//! Run with: `cargo test -p tempo-api --test membership_test`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use helpers::auth::seed_user;
use helpers::fixtures::{create_organization, invite_and_accept};
use helpers::{api_path, setup_test_app};
use serde_json::{json, Value};

#[tokio::test]
async fn test_invite_accept_flow_grants_access() {
    let app = setup_test_app().await;
    let client = app.client();

    let alice = seed_user(app.pool(), "alice@acme.test", "Alice").await;
    let dave = seed_user(app.pool(), "dave@acme.test", "Dave").await;

    let acme = create_organization(client, &alice, "Acme").await;
    let acme_slug = acme["organization"]["slug"].as_str().unwrap();

    // Before accepting, Dave is an outsider.
    let response = client
        .get(&api_path(&format!("/organizations/{}", acme_slug)))
        .add_header("Authorization", dave.bearer())
        .await;
    assert_eq!(response.status_code(), 403);

    let invite_response = client
        .post(&api_path(&format!(
            "/organizations/{}/members/invitations",
            acme_slug
        )))
        .add_header("Authorization", alice.bearer())
        .json(&json!({ "email": dave.email, "role": "member" }))
        .await;
    assert_eq!(invite_response.status_code(), 201);

    let invitation = invite_response.json::<Value>();
    assert_eq!(invitation["membership"]["status"], "invited");
    assert_eq!(invitation["membership"]["invited_email"], dave.email.as_str());
    let token = invitation["token"].as_str().unwrap();
    assert!(
        invitation["membership"]["invitation_token_hash"].is_null(),
        "The stored token digest must never be serialized"
    );

    let accept_response = client
        .post(&api_path("/members/invitations/accept"))
        .add_header("Authorization", dave.bearer())
        .json(&json!({ "token": token }))
        .await;
    assert_eq!(accept_response.status_code(), 200);
    let membership = accept_response.json::<Value>();
    assert_eq!(membership["status"], "active");
    assert_eq!(
        membership["user_id"].as_str().unwrap(),
        dave.user_id.to_string()
    );

    // Acceptance makes the organization reachable.
    let response = client
        .get(&api_path(&format!("/organizations/{}", acme_slug)))
        .add_header("Authorization", dave.bearer())
        .await;
    assert_eq!(response.status_code(), 200);

    let response = client
        .get(&api_path(&format!("/organizations/{}/members", acme_slug)))
        .add_header("Authorization", dave.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    let members = response.json::<Value>();
    assert_eq!(
        members.as_array().unwrap().len(),
        2,
        "The member listing should show the founder and the new member"
    );
}

#[tokio::test]
async fn test_invitation_token_is_single_use() {
    let app = setup_test_app().await;
    let client = app.client();

    let alice = seed_user(app.pool(), "alice@acme.test", "Alice").await;
    let dave = seed_user(app.pool(), "dave@acme.test", "Dave").await;

    let acme = create_organization(client, &alice, "Acme").await;
    let acme_slug = acme["organization"]["slug"].as_str().unwrap();

    let invite_response = client
        .post(&api_path(&format!(
            "/organizations/{}/members/invitations",
            acme_slug
        )))
        .add_header("Authorization", alice.bearer())
        .json(&json!({ "email": dave.email, "role": "member" }))
        .await;
    assert_eq!(invite_response.status_code(), 201);
    let token = invite_response.json::<Value>()["token"]
        .as_str()
        .unwrap()
        .to_string();

    let first = client
        .post(&api_path("/members/invitations/accept"))
        .add_header("Authorization", dave.bearer())
        .json(&json!({ "token": token }))
        .await;
    assert_eq!(first.status_code(), 200);

    // The digest is nulled on acceptance, so the same token now matches
    // nothing and fails like any unknown token.
    let second = client
        .post(&api_path("/members/invitations/accept"))
        .add_header("Authorization", dave.bearer())
        .json(&json!({ "token": token }))
        .await;
    assert_eq!(
        second.status_code(),
        400,
        "A consumed invitation token must be rejected on reuse"
    );
    assert_eq!(second.json::<Value>()["code"], "INVALID_OR_EXPIRED_TOKEN");
}

#[tokio::test]
async fn test_unknown_and_expired_invitation_tokens_are_rejected_alike() {
    let app = setup_test_app().await;
    let client = app.client();

    let alice = seed_user(app.pool(), "alice@acme.test", "Alice").await;
    let dave = seed_user(app.pool(), "dave@acme.test", "Dave").await;

    let acme = create_organization(client, &alice, "Acme").await;
    let acme_slug = acme["organization"]["slug"].as_str().unwrap();

    let fabricated = "0".repeat(64);
    let response = client
        .post(&api_path("/members/invitations/accept"))
        .add_header("Authorization", dave.bearer())
        .json(&json!({ "token": fabricated }))
        .await;
    assert_eq!(response.status_code(), 400);
    let unknown_body = response.json::<Value>();

    let invite_response = client
        .post(&api_path(&format!(
            "/organizations/{}/members/invitations",
            acme_slug
        )))
        .add_header("Authorization", alice.bearer())
        .json(&json!({ "email": dave.email, "role": "member" }))
        .await;
    assert_eq!(invite_response.status_code(), 201);
    let invitation = invite_response.json::<Value>();
    let token = invitation["token"].as_str().unwrap();
    let membership_id = invitation["membership"]["id"].as_str().unwrap();

    sqlx::query(
        "UPDATE memberships SET invitation_expires_at = now() - interval '1 day' WHERE id = $1::uuid",
    )
    .bind(membership_id)
    .execute(app.pool())
    .await
    .expect("Failed to age the invitation");

    let response = client
        .post(&api_path("/members/invitations/accept"))
        .add_header("Authorization", dave.bearer())
        .json(&json!({ "token": token }))
        .await;
    assert_eq!(response.status_code(), 400);
    let expired_body = response.json::<Value>();

    assert_eq!(
        unknown_body["error"], expired_body["error"],
        "Unknown and expired tokens must be indistinguishable to the caller"
    );
}

#[tokio::test]
async fn test_duplicate_invitation_conflicts() {
    let app = setup_test_app().await;
    let client = app.client();

    let alice = seed_user(app.pool(), "alice@acme.test", "Alice").await;
    let acme = create_organization(client, &alice, "Acme").await;
    let acme_slug = acme["organization"]["slug"].as_str().unwrap();

    let first = client
        .post(&api_path(&format!(
            "/organizations/{}/members/invitations",
            acme_slug
        )))
        .add_header("Authorization", alice.bearer())
        .json(&json!({ "email": "dave@acme.test", "role": "member" }))
        .await;
    assert_eq!(first.status_code(), 201);

    let second = client
        .post(&api_path(&format!(
            "/organizations/{}/members/invitations",
            acme_slug
        )))
        .add_header("Authorization", alice.bearer())
        .json(&json!({ "email": "Dave@Acme.Test", "role": "admin" }))
        .await;
    assert_eq!(
        second.status_code(),
        409,
        "A pending invitation for the same address (case-insensitive) must conflict"
    );
}

#[tokio::test]
async fn test_revoked_member_loses_access() {
    let app = setup_test_app().await;
    let client = app.client();

    let alice = seed_user(app.pool(), "alice@acme.test", "Alice").await;
    let dave = seed_user(app.pool(), "dave@acme.test", "Dave").await;

    let acme = create_organization(client, &alice, "Acme").await;
    let acme_slug = acme["organization"]["slug"].as_str().unwrap();
    let membership = invite_and_accept(client, &alice, acme_slug, &dave, "member").await;
    let membership_id = membership["id"].as_str().unwrap();

    let response = client
        .delete(&api_path(&format!(
            "/organizations/{}/members/{}",
            acme_slug, membership_id
        )))
        .add_header("Authorization", alice.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["status"], "revoked");

    // Revocation takes effect on the very next request.
    let response = client
        .get(&api_path(&format!("/organizations/{}", acme_slug)))
        .add_header("Authorization", dave.bearer())
        .await;
    assert_eq!(
        response.status_code(),
        403,
        "A revoked member must be denied organization access"
    );

    let response = client
        .get(&api_path(&format!("/organizations/{}/members", acme_slug)))
        .add_header("Authorization", alice.bearer())
        .await;
    let members = response.json::<Value>();
    assert_eq!(
        members.as_array().unwrap().len(),
        1,
        "Revoked rows are audit trail, not listed members"
    );
}

#[tokio::test]
async fn test_cannot_revoke_last_admin() {
    let app = setup_test_app().await;
    let client = app.client();

    let alice = seed_user(app.pool(), "alice@acme.test", "Alice").await;
    let acme = create_organization(client, &alice, "Acme").await;
    let acme_slug = acme["organization"]["slug"].as_str().unwrap();
    let own_membership_id = acme["membership"]["id"].as_str().unwrap();

    let response = client
        .delete(&api_path(&format!(
            "/organizations/{}/members/{}",
            acme_slug, own_membership_id
        )))
        .add_header("Authorization", alice.bearer())
        .await;
    assert_eq!(
        response.status_code(),
        409,
        "Revoking the only active admin must be refused"
    );
    assert_eq!(response.json::<Value>()["code"], "INVARIANT_VIOLATION");

    // The membership table is unchanged.
    let response = client
        .get(&api_path(&format!("/organizations/{}/members", acme_slug)))
        .add_header("Authorization", alice.bearer())
        .await;
    let members = response.json::<Value>();
    let members = members.as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["status"], "active");
    assert_eq!(members[0]["role"], "admin");
}

#[tokio::test]
async fn test_cannot_demote_last_admin() {
    let app = setup_test_app().await;
    let client = app.client();

    let alice = seed_user(app.pool(), "alice@acme.test", "Alice").await;
    let acme = create_organization(client, &alice, "Acme").await;
    let acme_slug = acme["organization"]["slug"].as_str().unwrap();
    let own_membership_id = acme["membership"]["id"].as_str().unwrap();

    let response = client
        .put(&api_path(&format!(
            "/organizations/{}/members/{}/role",
            acme_slug, own_membership_id
        )))
        .add_header("Authorization", alice.bearer())
        .json(&json!({ "role": "member" }))
        .await;
    assert_eq!(
        response.status_code(),
        409,
        "Demoting the only active admin must be refused"
    );
    assert_eq!(response.json::<Value>()["code"], "INVARIANT_VIOLATION");

    // Still exactly one admin, still admin.
    let response = client
        .get(&api_path(&format!("/organizations/{}/members", acme_slug)))
        .add_header("Authorization", alice.bearer())
        .await;
    let members = response.json::<Value>();
    let members = members.as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["role"], "admin");
}

#[tokio::test]
async fn test_admin_can_step_down_once_another_admin_exists() {
    let app = setup_test_app().await;
    let client = app.client();

    let alice = seed_user(app.pool(), "alice@acme.test", "Alice").await;
    let dave = seed_user(app.pool(), "dave@acme.test", "Dave").await;

    let acme = create_organization(client, &alice, "Acme").await;
    let acme_slug = acme["organization"]["slug"].as_str().unwrap();
    let alice_membership_id = acme["membership"]["id"].as_str().unwrap();
    let dave_membership = invite_and_accept(client, &alice, acme_slug, &dave, "member").await;
    let dave_membership_id = dave_membership["id"].as_str().unwrap();

    let response = client
        .put(&api_path(&format!(
            "/organizations/{}/members/{}/role",
            acme_slug, dave_membership_id
        )))
        .add_header("Authorization", alice.bearer())
        .json(&json!({ "role": "admin" }))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["role"], "admin");

    // With two active admins the founder may now step down.
    let response = client
        .put(&api_path(&format!(
            "/organizations/{}/members/{}/role",
            acme_slug, alice_membership_id
        )))
        .add_header("Authorization", alice.bearer())
        .json(&json!({ "role": "member" }))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["role"], "member");

    // And immediately stops being able to use the admin surface.
    let response = client
        .post(&api_path(&format!(
            "/organizations/{}/members/invitations",
            acme_slug
        )))
        .add_header("Authorization", alice.bearer())
        .json(&json!({ "email": "eve@acme.test", "role": "member" }))
        .await;
    assert_eq!(
        response.status_code(),
        403,
        "A demoted admin must lose the admin surface on the next request"
    );
}

#[tokio::test]
async fn test_member_cannot_use_admin_surface() {
    let app = setup_test_app().await;
    let client = app.client();

    let alice = seed_user(app.pool(), "alice@acme.test", "Alice").await;
    let carol = seed_user(app.pool(), "carol@acme.test", "Carol").await;

    let acme = create_organization(client, &alice, "Acme").await;
    let acme_slug = acme["organization"]["slug"].as_str().unwrap();
    invite_and_accept(client, &alice, acme_slug, &carol, "member").await;

    let response = client
        .post(&api_path(&format!(
            "/organizations/{}/members/invitations",
            acme_slug
        )))
        .add_header("Authorization", carol.bearer())
        .json(&json!({ "email": "eve@acme.test", "role": "member" }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = client
        .patch(&api_path(&format!(
            "/organizations/{}/settings",
            acme_slug
        )))
        .add_header("Authorization", carol.bearer())
        .json(&json!({ "timezone": "Europe/Berlin" }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = client
        .delete(&api_path(&format!("/organizations/{}", acme_slug)))
        .add_header("Authorization", carol.bearer())
        .await;
    assert_eq!(
        response.status_code(),
        403,
        "Organization deletion is admin-only"
    );
}

#[tokio::test]
async fn test_member_cannot_revoke_another_member() {
    let app = setup_test_app().await;
    let client = app.client();

    let alice = seed_user(app.pool(), "alice@acme.test", "Alice").await;
    let carol = seed_user(app.pool(), "carol@acme.test", "Carol").await;
    let dave = seed_user(app.pool(), "dave@acme.test", "Dave").await;

    let acme = create_organization(client, &alice, "Acme").await;
    let acme_slug = acme["organization"]["slug"].as_str().unwrap();
    invite_and_accept(client, &alice, acme_slug, &carol, "member").await;
    let dave_membership = invite_and_accept(client, &alice, acme_slug, &dave, "member").await;
    let dave_membership_id = dave_membership["id"].as_str().unwrap();

    let response = client
        .delete(&api_path(&format!(
            "/organizations/{}/members/{}",
            acme_slug, dave_membership_id
        )))
        .add_header("Authorization", carol.bearer())
        .await;
    assert_eq!(
        response.status_code(),
        403,
        "Members must not revoke other members"
    );

    // The target membership is untouched.
    let response = client
        .get(&api_path(&format!("/organizations/{}/members", acme_slug)))
        .add_header("Authorization", alice.bearer())
        .await;
    let members = response.json::<Value>();
    let members = members.as_array().unwrap();
    assert_eq!(members.len(), 3);
    let dave_row = members
        .iter()
        .find(|m| m["id"].as_str() == Some(dave_membership_id))
        .expect("Dave's membership should still be listed");
    assert_eq!(dave_row["status"], "active");
}
