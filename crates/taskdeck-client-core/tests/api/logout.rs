use std::time::Duration;

use taskdeck_client_core::{SessionEvent, SessionState, TransportError};
use taskdeck_shared::const_config::operation::{
    OPERATION_LOGOUT, OPERATION_ME, OPERATION_USER_PERMISSIONS,
};

use crate::helpers::{no_cb, spawn_app, TestApp};

fn assert_logged_out(app: &TestApp) {
    assert!(!app.client.is_authenticated());
    assert!(app.client.current_user().is_none());
    assert!(app.client.tokens().access_token().is_none());
    assert!(app.client.tokens().refresh_token().is_none());
    assert!(!app.client.permission_cache().is_loaded());
    assert!(!app.client.has_permission_sync("system_admin"));
    assert_eq!(app.client.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn logout_twice_with_failing_server() {
    // Arrange
    let app = spawn_app();
    app.login_with_profile().await;
    assert!(app.client.has_permission_sync("system_admin"));
    app.transport.reply(
        OPERATION_LOGOUT.name,
        Err(TransportError::Network("connection reset".into())),
    );

    // Act - First
    app.client.logout().await;

    // Assert - First
    assert_logged_out(&app);

    // Act - Second
    app.client.logout().await;

    // Assert - Second, nothing left to tell the server
    assert_logged_out(&app);
    assert_eq!(app.transport.calls(OPERATION_LOGOUT.name), 1);
}

#[tokio::test]
async fn logout_tells_server_with_current_token() {
    let app = spawn_app();
    app.login_with_profile().await;
    let seen = app.capture_events();

    app.client.logout().await;

    let request = app.transport.last_request(OPERATION_LOGOUT.name).unwrap();
    assert_eq!(request.bearer_token.as_deref(), Some("T1"));
    let seen = seen.lock().unwrap();
    assert!(seen.contains(&SessionEvent::LoggedOut));
    assert!(!seen
        .iter()
        .any(|e| matches!(e, SessionEvent::LogoutNotificationFailed { .. })));
}

#[tokio::test]
async fn failed_server_logout_is_reported() {
    let app = spawn_app();
    app.login_with_profile().await;
    app.transport
        .reply_error(OPERATION_LOGOUT.name, "internal error", None);
    let seen = app.capture_events();

    app.client.logout().await;

    assert_logged_out(&app);
    assert!(seen
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, SessionEvent::LogoutNotificationFailed { .. })));
}

#[tokio::test]
async fn logout_clears_cached_me() {
    // Arrange
    let app = spawn_app();
    app.login_with_profile().await;
    assert_eq!(app.transport.calls(OPERATION_ME.name), 1);

    // Act - Cached within the session
    app.client.me().await.unwrap();

    // Assert
    assert_eq!(app.transport.calls(OPERATION_ME.name), 1);

    // Act - New session
    app.client.logout().await;
    app.login_with_profile().await;
    app.client.me().await.unwrap();

    // Assert
    assert_eq!(app.transport.calls(OPERATION_ME.name), 2);
}

#[tokio::test]
async fn late_permissions_do_not_outlive_logout() {
    // Arrange
    let app = spawn_app();
    app.transport
        .delay(OPERATION_USER_PERMISSIONS.name, Duration::from_millis(50));

    // Act - Log out while the background fetch is still waiting on the server
    app.login().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    app.client.logout().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Assert
    assert_logged_out(&app);
}

#[tokio::test]
async fn logout_with_notify_calls_back() {
    let app = spawn_app();
    app.login_with_profile().await;

    app.client.logout_with_notify(no_cb).await.unwrap();

    assert_logged_out(&app);
}
