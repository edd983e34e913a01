use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use taskdeck_client_core::{SessionEvent, SessionState, TransportError};
use taskdeck_shared::{
    const_config::{
        error::ERROR_CODE_BAD_CREDENTIALS,
        operation::{OPERATION_LOGIN, OPERATION_ME, OPERATION_USER_PERMISSIONS},
    },
    uac::{Permissions, RoleLevel, SessionError},
};

use crate::helpers::{spawn_app, wait_until, TEST_PERMISSIONS};

#[tokio::test]
async fn login_populates_session_then_profile_in_background() {
    // Arrange
    let app = spawn_app();

    // Act
    let user = app.login().await.unwrap();

    // Assert - Identity only and tokens stored
    assert_eq!(user.id.as_ref(), "u1");
    assert_eq!(user.email.as_ref(), "a@b.com");
    assert!(user.permissions.is_none());
    assert!(app.client.is_authenticated());
    assert_eq!(app.client.tokens().access_token().unwrap().expose_secret(), "T1");
    assert_eq!(app.client.tokens().refresh_token().unwrap().expose_secret(), "R1");

    // Act - Let the background completion run
    app.wait_for_profile().await;

    // Assert - Role and permissions filled in
    let user = app.client.current_user().unwrap();
    assert_eq!(user.permissions, Some(Permissions::from(TEST_PERMISSIONS)));
    assert_eq!(user.role_level(), Some(RoleLevel::new(30)));
    let permission_request = app
        .transport
        .last_request(OPERATION_USER_PERMISSIONS.name)
        .unwrap();
    assert_eq!(permission_request.bearer_token.as_deref(), Some("T1"));
    assert_eq!(
        permission_request.variables,
        serde_json::json!({ "userId": "u1" })
    );
}

#[tokio::test]
async fn login_sends_credentials_without_bearer() {
    let app = spawn_app();

    app.login().await.unwrap();

    let request = app.transport.last_request(OPERATION_LOGIN.name).unwrap();
    assert_eq!(request.bearer_token, None);
    assert_eq!(request.variables["email"], "a@b.com");
    assert_eq!(request.variables["password"], app.test_user.password.as_str());
}

#[tokio::test]
async fn login_failure_bad_credentials() {
    // Arrange
    let app = spawn_app();
    app.transport.reply_error(
        OPERATION_LOGIN.name,
        "Invalid email or password",
        Some(ERROR_CODE_BAD_CREDENTIALS),
    );

    // Act
    let actual = app.login().await;

    // Assert
    assert_eq!(
        actual.unwrap_err(),
        SessionError::Authentication {
            message: "Invalid email or password".into()
        }
    );
    assert!(!app.client.is_authenticated());
    assert!(app.client.current_user().is_none());
    assert_eq!(app.client.state(), SessionState::Anonymous);
    assert_eq!(app.transport.calls(OPERATION_ME.name), 0);
}

#[tokio::test]
async fn login_failure_network_is_propagated() {
    let app = spawn_app();
    app.transport.reply(
        OPERATION_LOGIN.name,
        Err(TransportError::Network("connection refused".into())),
    );

    let actual = app.login().await.unwrap_err();

    assert!(matches!(actual, SessionError::Network(_)));
    assert!(actual.is_retryable());
    assert!(!app.client.is_authenticated());
}

#[tokio::test]
async fn login_emits_state_changes() {
    // Arrange
    let app = spawn_app();
    let seen = app.capture_events();

    // Act
    app.login().await.unwrap();

    // Assert
    let seen = seen.lock().unwrap().clone();
    let expected = [
        SessionEvent::StateChanged {
            from: SessionState::Anonymous,
            to: SessionState::Authenticating,
        },
        SessionEvent::StateChanged {
            from: SessionState::Authenticating,
            to: SessionState::Authenticated,
        },
        SessionEvent::LoggedIn {
            user_id: "u1".try_into().unwrap(),
        },
    ];
    for event in expected.iter() {
        assert!(seen.contains(event), "missing {event:?} in {seen:?}");
    }
    assert_eq!(app.client.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn profile_failure_leaves_permissions_unknown() {
    // Arrange
    let app = spawn_app();
    app.transport
        .reply_error(OPERATION_USER_PERMISSIONS.name, "boom", None);
    let seen = app.capture_events();

    // Act
    app.login().await.unwrap();
    wait_until(|| {
        seen.lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, SessionEvent::ProfileFetchFailed { .. }))
    })
    .await
    .unwrap();

    // Assert - Still logged in, nothing granted
    assert!(app.client.is_authenticated());
    let user = app.client.current_user().unwrap();
    assert!(user.permissions.is_none());
    assert!(!app.client.has_permission_sync("system_admin"));
}

#[tokio::test]
async fn login_with_notify_calls_back() {
    // Arrange
    let app = spawn_app();
    let was_called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&was_called);

    // Act
    let rx = app
        .client
        .login_with_notify(app.test_user.login_args(), move || {
            flag.store(true, Ordering::SeqCst)
        });
    let outcome = rx.await.unwrap();

    // Assert
    assert_eq!(outcome.unwrap().id.as_ref(), "u1");
    wait_until(|| was_called.load(Ordering::SeqCst)).await.unwrap();
}

#[tokio::test]
async fn set_user_keeps_stored_refresh_token() {
    // Arrange
    let app = spawn_app();
    app.login_with_profile().await;
    let invited = serde_json::from_value(serde_json::json!({
        "id": "u2",
        "email": "c@d.com",
        "permissions": ["stale:read"],
    }))
    .unwrap();

    // Act
    let user = app.client.set_user(invited, "T9".into(), None);

    // Assert
    assert_eq!(user.id.as_ref(), "u2");
    assert!(user.permissions.is_none(), "permissions must be fetched again");
    assert!(!app.client.permission_cache().is_loaded());
    assert_eq!(app.client.tokens().access_token().unwrap().expose_secret(), "T9");
    assert_eq!(app.client.tokens().refresh_token().unwrap().expose_secret(), "R1");
}
