mod common;

use std::sync::Arc;

use common::{FakeBackend, profile};
use portal::PortalError;
use portal::api::tables::USER_PRESENCE;
use portal::models::Role;
use portal::services::presence::{PresenceService, PresenceSignal};
use portal::services::users::{NewUser, UserService};
use reqwest::Method;
use serde_json::json;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_admin_creates_user_through_function() {
    let api = Arc::new(FakeBackend::new());
    let users = UserService::new(api.clone());
    let admin = profile(Role::Admin);

    let created = users
        .create(
            &admin,
            NewUser {
                email: "nova@clinica.test".into(),
                password: None,
                name: "Nova Terapeuta".into(),
                role: Role::Psychologist,
            },
        )
        .await
        .unwrap();

    let invocations = api.invocations();
    assert_eq!(invocations.len(), 1);
    let (name, method, body) = &invocations[0];
    assert_eq!(name, "create-user");
    assert_eq!(*method, Method::POST);
    assert_eq!(body["email"], "nova@clinica.test");
    assert_eq!(body["role"], "psychologist");
    assert_eq!(body["password"], created.password.as_str());
}

#[tokio::test]
async fn test_non_admins_cannot_manage_users() {
    let api = Arc::new(FakeBackend::new());
    let users = UserService::new(api.clone());
    let staff = profile(Role::Staff);
    let target = profile(Role::User);

    let err = users.delete(&staff, target.id).await.unwrap_err();
    assert!(matches!(err, PortalError::Forbidden(_)));
    assert!(users.set_role(&staff, target.id, Role::Admin).await.is_err());
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let api = Arc::new(FakeBackend::new());
    let users = UserService::new(api.clone());
    let admin = profile(Role::Admin);

    assert!(users.delete(&admin, admin.id).await.is_err());
    assert!(api.invocations().is_empty());

    let other = profile(Role::Staff);
    users.delete(&admin, other.id).await.unwrap();
    let invocations = api.invocations();
    let (name, method, body) = &invocations[0];
    assert_eq!(name, "manage-users");
    assert_eq!(*method, Method::DELETE);
    assert_eq!(body, &json!({ "userId": other.id }));
}

#[tokio::test]
async fn test_activation_updates_the_profile_row() {
    let api = Arc::new(FakeBackend::new());
    let pending = api.add_account("novo@clinica.test", "segredo1", Role::User, false);
    let users = UserService::new(api.clone());
    let admin = profile(Role::Admin);

    let activated = users.set_active(&admin, pending.id, true).await.unwrap();
    assert!(activated.active);

    let promoted = users.set_role(&admin, pending.id, Role::Staff).await.unwrap();
    assert_eq!(promoted.role, Role::Staff);
}

#[tokio::test]
async fn test_presence_loop_beats_on_signals_and_on_unload() {
    let api = Arc::new(FakeBackend::new());
    let me = profile(Role::Staff);
    let presence = PresenceService::new(api.clone(), me.id);

    let (signals, receiver) = mpsc::channel(4);
    signals.send(PresenceSignal::VisibilityChange).await.unwrap();
    signals.send(PresenceSignal::Unload).await.unwrap();
    presence.run(receiver).await;

    let upserts = api.calls().iter().filter(|c| *c == "upsert user_presence").count();
    assert_eq!(upserts, 3);
    let rows = api.rows(USER_PRESENCE);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["is_online"], true);
}

#[tokio::test]
async fn test_online_users_joins_profiles() {
    let api = Arc::new(FakeBackend::new());
    let online = api.add_account("ana@clinica.test", "segredo1", Role::Staff, true);
    let offline = api.add_account("bia@clinica.test", "segredo1", Role::Staff, true);
    api.seed(USER_PRESENCE, json!({ "id": online.id, "is_online": true, "last_seen": "2025-01-01T08:00:00Z" }));
    api.seed(USER_PRESENCE, json!({ "id": offline.id, "is_online": false, "last_seen": "2025-01-01T07:00:00Z" }));

    let presence = PresenceService::new(api.clone(), online.id);
    let users = presence.online_users().await.unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, online.id);
}

#[cfg(unix)]
#[tokio::test]
async fn test_resume_after_suspend_counts_as_visible_again() {
    use portal::services::presence::forward_resumes;

    let (signals, mut receiver) = mpsc::channel(4);
    let resumes = forward_resumes(signals).unwrap();

    // what the shell sends on `fg` after Ctrl-Z
    assert_eq!(unsafe { libc::raise(libc::SIGCONT) }, 0);

    let signal = tokio::time::timeout(std::time::Duration::from_secs(5), receiver.recv())
        .await
        .unwrap();
    assert_eq!(signal, Some(PresenceSignal::VisibilityChange));
    resumes.abort();
}
