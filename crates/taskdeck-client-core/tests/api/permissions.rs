use std::time::Duration;

use futures::future::join_all;
use taskdeck_shared::{
    const_config::operation::{OPERATION_ME, OPERATION_USER_PERMISSIONS},
    uac::{Permissions, RoleLevel, SessionError},
};
use taskdeck_test_helper::{permissions_data, TestUser};

use crate::helpers::spawn_app;

#[tokio::test]
async fn failed_fetch_denies() {
    // Arrange
    let app = spawn_app();
    app.transport
        .reply_error(OPERATION_USER_PERMISSIONS.name, "database down", None);
    app.login().await.unwrap();

    // Assert - Nothing loaded yet
    assert!(!app.client.has_permission_sync("system_admin"));

    // Act
    let allowed = app.client.has_permission("system_admin").await;
    let detailed = app.client.try_has_permission("system_admin").await;

    // Assert
    assert!(!allowed);
    assert!(matches!(detailed, Err(SessionError::PermissionFetch(_))));
    assert!(!app.client.has_permission_sync("system_admin"));
}

#[tokio::test]
async fn suffix_matching_against_loaded_permissions() {
    // Arrange
    let app = spawn_app();
    app.login().await.unwrap();

    // Act
    app.client.preload_permissions().await.unwrap();

    // Assert
    assert!(app.client.has_permission_sync("system_admin"));
    assert!(app.client.has_permission_sync("project_system:read"));
    // `project_system:read` ends with `:read`
    assert!(app.client.has_permission_sync("read"));
    assert!(!app.client.has_permission_sync("task_system:read"));
    assert!(!app.client.has_permission_sync("system:read"));
    assert!(!app.client.has_permission_sync("admin"));
}

#[tokio::test]
async fn concurrent_checks_share_one_fetch() {
    // Arrange
    let app = spawn_app();
    app.transport
        .delay(OPERATION_USER_PERMISSIONS.name, Duration::from_millis(20));
    app.login().await.unwrap();

    // Act
    let answers = join_all((0..5).map(|_| app.client.has_permission("system_admin"))).await;

    // Assert
    assert!(answers.into_iter().all(|allowed| allowed));
    assert_eq!(app.transport.calls(OPERATION_USER_PERMISSIONS.name), 1);
}

#[tokio::test]
async fn preload_is_idempotent() {
    let app = spawn_app();
    app.login_with_profile().await;

    app.client.preload_permissions().await.unwrap();
    app.client.preload_permissions().await.unwrap();

    assert_eq!(app.transport.calls(OPERATION_USER_PERMISSIONS.name), 1);
}

#[tokio::test]
async fn clear_cache_forces_refetch() {
    // Arrange
    let app = spawn_app();
    app.login_with_profile().await;
    app.transport.reply_data(
        OPERATION_USER_PERMISSIONS.name,
        permissions_data(&["task_system:write"]),
    );

    // Act
    app.client.clear_permission_cache();

    // Assert
    assert!(!app.client.has_permission_sync("system_admin"));
    assert!(app.client.has_permission("task_system:write").await);
    assert!(!app.client.has_permission("system_admin").await);
    assert_eq!(app.transport.calls(OPERATION_USER_PERMISSIONS.name), 2);
}

#[tokio::test]
async fn refresh_user_permissions_updates_user() {
    // Arrange
    let app = spawn_app();
    app.login_with_profile().await;
    app.transport.reply_data(
        OPERATION_USER_PERMISSIONS.name,
        permissions_data(&["report:export"]),
    );

    // Act
    let actual = app.client.refresh_user_permissions().await.unwrap();

    // Assert
    let expected = Permissions::from(["report:export"].as_slice());
    assert_eq!(actual, expected);
    assert_eq!(app.client.current_user().unwrap().permissions, Some(expected));
}

#[tokio::test]
async fn no_user_means_no_permissions_and_no_requests() {
    let app = spawn_app();

    assert!(!app.client.has_permission("system_admin").await);
    assert_eq!(
        app.client.refresh_user_permissions().await.unwrap(),
        Permissions::default()
    );
    assert_eq!(app.transport.calls(OPERATION_USER_PERMISSIONS.name), 0);
}

#[tokio::test]
async fn role_level_checks_use_completed_profile() {
    // Arrange
    let app = spawn_app();
    app.login().await.unwrap();

    // Assert - Role not known yet
    assert!(!app.client.has_role_level(RoleLevel::new(10)));

    // Act
    app.wait_for_profile().await;

    // Assert
    assert!(app.client.has_role_level(RoleLevel::new(30)));
    assert!(!app.client.has_role_level(RoleLevel::new(40)));
}

#[tokio::test]
async fn hierarchy_checks_for_level_30() {
    let app = spawn_app();
    app.login_with_profile().await;

    assert!(app.client.can_manage_user(RoleLevel::new(20)));
    assert!(!app.client.can_manage_user(RoleLevel::new(30)));
    assert!(!app.client.can_manage_user(RoleLevel::new(40)));
    assert!(app.client.can_assign_role(RoleLevel::new(30)));
    assert!(!app.client.can_assign_role(RoleLevel::new(40)));
}

#[tokio::test]
async fn top_role_manages_everyone() {
    // Arrange
    let app = spawn_app();
    let top = TestUser::new("u1", "a@b.com");
    app.transport
        .reply_data(OPERATION_ME.name, top.me_data(Some(("r0", "super_admin", 1))));

    // Act
    app.login_with_profile().await;

    // Assert
    assert!(app.client.can_manage_user(RoleLevel::new(100)));
    assert!(app.client.can_assign_role(RoleLevel::new(100)));
}
