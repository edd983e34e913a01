use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use rstest::rstest;
use taskdeck_client_core::{KeyValueStore, MemoryStore, SessionEvent, SessionState};
use taskdeck_shared::{
    const_config::{
        error::ERROR_CODE_UNAUTHENTICATED,
        operation::{OPERATION_LOGIN, OPERATION_REFRESH_TOKEN},
        token::{TOKEN_KEY_ACCESS, TOKEN_KEY_REFRESH},
    },
    time::Seconds,
    token::{AccessToken, TokenPair},
    uac::SessionError,
};

use taskdeck_test_helper::TestUser;
use tokio::task::JoinHandle;

use crate::helpers::{spawn_app, spawn_app_with, wait_until, TestApp};

/// Starts a slow refresh for the logged in user and waits until it is on the
/// wire
async fn start_slow_refresh(app: &TestApp) -> JoinHandle<Result<AccessToken, SessionError>> {
    app.transport
        .delay(OPERATION_REFRESH_TOKEN.name, Duration::from_millis(200));
    let client = app.client.clone();
    let handle = tokio::spawn(async move { client.refresh_tokens().await });
    wait_until(|| app.transport.calls(OPERATION_REFRESH_TOKEN.name) == 1)
        .await
        .unwrap();
    handle
}

/// Logs out and logs in as a different user whose tokens are `TB`/`RB`
async fn switch_user(app: &TestApp) -> TestUser {
    app.client.logout().await;
    let other = TestUser::new("u2", "c@d.com");
    app.transport
        .reply_data(OPERATION_LOGIN.name, other.login_data("TB", "RB"));
    app.client.login(other.login_args()).await.unwrap();
    other
}

#[tokio::test]
async fn concurrent_refreshes_share_one_request() {
    // Arrange
    let app = spawn_app();
    app.client.update_tokens(TokenPair::new("T1", "R1"));
    app.transport
        .delay(OPERATION_REFRESH_TOKEN.name, Duration::from_millis(20));

    // Act
    let outcomes = join_all((0..10).map(|_| app.client.refresh_tokens())).await;

    // Assert
    assert_eq!(app.transport.calls(OPERATION_REFRESH_TOKEN.name), 1);
    for outcome in outcomes {
        assert_eq!(outcome.unwrap().expose_secret(), "T2");
    }
    assert_eq!(app.client.tokens().access_token().unwrap().expose_secret(), "T2");
    assert_eq!(app.client.tokens().refresh_token().unwrap().expose_secret(), "R2");
}

#[tokio::test]
async fn concurrent_refreshes_share_one_failure() {
    // Arrange
    let app = spawn_app();
    app.client.update_tokens(TokenPair::new("T1", "R1"));
    app.transport
        .reply_error(
            OPERATION_REFRESH_TOKEN.name,
            "Refresh token expired",
            Some(ERROR_CODE_UNAUTHENTICATED),
        )
        .delay(OPERATION_REFRESH_TOKEN.name, Duration::from_millis(20));

    // Act
    let outcomes = join_all((0..5).map(|_| app.client.refresh_tokens())).await;

    // Assert
    assert_eq!(app.transport.calls(OPERATION_REFRESH_TOKEN.name), 1);
    let first = outcomes[0].clone().unwrap_err();
    assert!(matches!(first, SessionError::RefreshFailed(_)));
    assert!(first.requires_login());
    for outcome in outcomes {
        assert_eq!(outcome.unwrap_err(), first);
    }
    assert!(app.client.tokens().access_token().is_none());
    assert!(app.client.tokens().refresh_token().is_none());
}

#[tokio::test]
async fn refresh_without_refresh_token_fails_without_request() {
    let app = spawn_app();

    let actual = app.client.refresh_tokens().await;

    assert_eq!(actual.unwrap_err(), SessionError::NoRefreshToken);
    assert_eq!(app.transport.calls(OPERATION_REFRESH_TOKEN.name), 0);
}

#[tokio::test]
async fn refresh_request_never_carries_access_token() {
    let app = spawn_app();
    app.client.update_tokens(TokenPair::new("T1", "R1"));

    app.client.refresh_tokens().await.unwrap();

    let request = app
        .transport
        .last_request(OPERATION_REFRESH_TOKEN.name)
        .unwrap();
    assert_eq!(request.bearer_token, None);
    assert_eq!(request.variables, serde_json::json!({ "refreshToken": "R1" }));
}

#[tokio::test]
async fn failed_refresh_ends_session() {
    // Arrange
    let app = spawn_app();
    app.login_with_profile().await;
    app.transport
        .reply_error(OPERATION_REFRESH_TOKEN.name, "revoked", None);
    let seen = app.capture_events();

    // Act
    let actual = app.client.refresh_tokens().await;

    // Assert
    assert!(actual.unwrap_err().requires_login());
    assert!(app.client.current_user().is_none());
    assert!(!app.client.is_authenticated());
    assert_eq!(app.client.state(), SessionState::Anonymous);
    let seen = seen.lock().unwrap();
    assert!(seen.contains(&SessionEvent::StateChanged {
        from: SessionState::Authenticated,
        to: SessionState::Refreshing,
    }));
    assert!(seen
        .iter()
        .any(|e| matches!(e, SessionEvent::RefreshFailed { .. })));
}

#[tokio::test]
async fn successful_refresh_returns_to_authenticated() {
    let app = spawn_app();
    app.login_with_profile().await;

    app.client.refresh_tokens().await.unwrap();

    assert_eq!(app.client.state(), SessionState::Authenticated);
    assert!(app.client.is_authenticated());
}

#[tokio::test]
async fn hung_refresh_times_out_and_releases_guard() {
    // Arrange
    let app = spawn_app_with(|builder| builder.refresh_timeout(Seconds::new(1)));
    app.client.update_tokens(TokenPair::new("T1", "R1"));
    app.transport
        .delay(OPERATION_REFRESH_TOKEN.name, Duration::from_secs(30));

    // Act
    let actual = app.client.refresh_tokens().await;

    // Assert
    assert!(matches!(actual, Err(SessionError::RefreshFailed(_))));
    assert!(!app.client.is_authenticated());
    assert_eq!(app.transport.calls(OPERATION_REFRESH_TOKEN.name), 1);
}

#[tokio::test]
async fn refresh_completing_after_logout_keeps_tokens_cleared() {
    // Arrange
    let app = spawn_app();
    app.login().await.unwrap();
    let refresh = start_slow_refresh(&app).await;

    // Act
    app.client.logout().await;
    let actual = refresh.await.unwrap();

    // Assert
    assert!(matches!(actual, Err(SessionError::SessionChanged { .. })));
    assert!(app.client.tokens().access_token().is_none());
    assert!(app.client.tokens().refresh_token().is_none());
    assert!(!app.client.is_authenticated());
    assert_eq!(app.client.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn refresh_completing_after_user_switch_is_discarded() {
    // Arrange
    let app = spawn_app();
    app.login().await.unwrap();
    let refresh = start_slow_refresh(&app).await;

    // Act
    let other = switch_user(&app).await;
    let actual = refresh.await.unwrap();

    // Assert - The second user keeps their own tokens
    assert!(matches!(actual, Err(SessionError::SessionChanged { .. })));
    assert_eq!(app.client.current_user().unwrap().id.as_ref(), other.id);
    assert_eq!(app.client.tokens().access_token().unwrap().expose_secret(), "TB");
    assert_eq!(app.client.tokens().refresh_token().unwrap().expose_secret(), "RB");
    assert!(app.client.is_authenticated());
}

#[tokio::test]
async fn refresh_failing_after_user_switch_leaves_new_session() {
    // Arrange
    let app = spawn_app();
    app.login().await.unwrap();
    app.transport.reply_error(
        OPERATION_REFRESH_TOKEN.name,
        "Refresh token expired",
        Some(ERROR_CODE_UNAUTHENTICATED),
    );
    let refresh = start_slow_refresh(&app).await;

    // Act
    let other = switch_user(&app).await;
    let actual = refresh.await.unwrap();

    // Assert
    assert!(matches!(actual, Err(SessionError::SessionChanged { .. })));
    assert_eq!(app.client.current_user().unwrap().id.as_ref(), other.id);
    assert_eq!(app.client.tokens().access_token().unwrap().expose_secret(), "TB");
    assert!(app.client.is_authenticated());
    assert_eq!(app.client.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn refresh_after_user_switch_does_not_join_old_flight() {
    // Arrange
    let app = spawn_app();
    app.login().await.unwrap();
    let stale = start_slow_refresh(&app).await;
    switch_user(&app).await;

    // Act
    let actual = app.client.refresh_tokens().await;

    // Assert - A second request was sent with the new user's refresh token
    assert_eq!(actual.unwrap().expose_secret(), "T2");
    assert_eq!(app.transport.calls(OPERATION_REFRESH_TOKEN.name), 2);
    let request = app
        .transport
        .last_request(OPERATION_REFRESH_TOKEN.name)
        .unwrap();
    assert_eq!(request.variables, serde_json::json!({ "refreshToken": "RB" }));
    assert!(matches!(
        stale.await.unwrap(),
        Err(SessionError::SessionChanged { .. })
    ));
    assert_eq!(app.client.tokens().refresh_token().unwrap().expose_secret(), "R2");
}

#[rstest]
#[case::both_present(true, true, false)]
#[case::both_absent(false, false, false)]
#[case::only_access(true, false, false)]
#[case::only_refresh(false, true, true)]
#[tokio::test]
async fn should_refresh_token_truth_table(
    #[case] has_access: bool,
    #[case] has_refresh: bool,
    #[case] expected: bool,
) {
    // Arrange
    let store = Arc::new(MemoryStore::new());
    let app = spawn_app_with(|builder| {
        builder
            .primary_store(store.clone())
            .fallback_store(store.clone())
    });
    if has_access {
        store.set(TOKEN_KEY_ACCESS, "T1", None).unwrap();
    }
    if has_refresh {
        store.set(TOKEN_KEY_REFRESH, "R1", None).unwrap();
    }

    // Act
    let actual = app.client.should_refresh_token();

    // Assert
    assert_eq!(actual, expected);
}
