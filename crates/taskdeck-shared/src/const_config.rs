//! Stores settings that are not expected to need to change but grouped together
//! for discoverability and reuse. Each constant should be prefixed by the module
//! name to allow importing the constant only and still be readable

use crate::time::Seconds;

pub mod token {
    use super::*;

    /// Lifetime given to the access token in the primary (expiring) store
    pub const TOKEN_ACCESS_LIFETIME: Seconds = Seconds::new(15 * 60);
    /// Lifetime given to the refresh token in the primary (expiring) store
    pub const TOKEN_REFRESH_LIFETIME: Seconds = Seconds::new(7 * 24 * 60 * 60);

    pub const TOKEN_KEY_ACCESS: &str = "access_token";
    pub const TOKEN_KEY_REFRESH: &str = "refresh_token";
}

pub mod client {
    use super::*;

    /// Upper bound on a refresh round trip. Releases the single flight guard if
    /// the server never answers
    pub const CLIENT_REFRESH_TIMEOUT: Seconds = Seconds::new(10);
    /// Upper bound on a permission fetch (same reasoning as the refresh)
    pub const CLIENT_PERMISSION_TIMEOUT: Seconds = Seconds::new(10);
    pub const CLIENT_DEFAULT_ENDPOINT: &str = "http://localhost:4000/graphql";
}

pub mod error {
    /// Value of `extensions.code` the server uses when a request was not
    /// authenticated
    pub const ERROR_CODE_UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    /// Value of `extensions.code` the server uses for rejected credentials
    pub const ERROR_CODE_BAD_CREDENTIALS: &str = "BAD_USER_INPUT";
}

pub mod operation {
    mod operation_spec;
    pub use operation_spec::{OperationKind, OperationSpec};

    pub const OP_ACCEPT_INVITATION: &str = "AcceptInvitation";
    pub const OP_HEALTH_CHECK: &str = "HealthCheck";
    pub const OP_REGISTER: &str = "Register";
    pub const OP_REQUEST_PASSWORD_RESET: &str = "RequestPasswordReset";
    pub const OP_RESET_PASSWORD: &str = "ResetPassword";
    pub const OP_VERIFY_EMAIL: &str = "VerifyEmail";

    /// Operations that may be sent without an access token. Any new
    /// unauthenticated operation must be listed here or it will be reported as
    /// an unauthenticated attempt when no user is logged in
    pub const PUBLIC_OPERATIONS: &[&str] = &[
        OPERATION_LOGIN.name,
        OP_REGISTER,
        OP_REQUEST_PASSWORD_RESET,
        OP_RESET_PASSWORD,
        OP_ACCEPT_INVITATION,
        OP_VERIFY_EMAIL,
        OP_HEALTH_CHECK,
        OPERATION_REFRESH_TOKEN.name,
    ];

    /// Only identity fields are selected to keep login cheap. Role and
    /// permissions are fetched afterwards
    pub const OPERATION_LOGIN: OperationSpec = OperationSpec::mutation(
        "Login",
        "mutation Login($email: String!, $password: String!) {
  login(email: $email, password: $password) {
    accessToken
    refreshToken
    user { id email }
  }
}",
    );

    pub const OPERATION_REFRESH_TOKEN: OperationSpec = OperationSpec::mutation(
        "RefreshToken",
        "mutation RefreshToken($refreshToken: String!) {
  refreshToken(refreshToken: $refreshToken) {
    accessToken
    refreshToken
  }
}",
    );

    pub const OPERATION_LOGOUT: OperationSpec =
        OperationSpec::mutation("Logout", "mutation Logout { logout { message } }");

    pub const OPERATION_ME: OperationSpec = OperationSpec::query(
        "Me",
        "query Me {
  me {
    id
    email
    role { id name level }
  }
}",
    );

    pub const OPERATION_USER_PERMISSIONS: OperationSpec = OperationSpec::query(
        "UserPermissions",
        "query UserPermissions($userId: ID!) { userPermissions(userId: $userId) }",
    );

    pub const OPERATION_HEALTH_CHECK: OperationSpec =
        OperationSpec::query(OP_HEALTH_CHECK, "query HealthCheck { healthCheck }");

    /// Returns true if the operation may be sent without an access token
    pub fn is_public_operation(operation_name: &str) -> bool {
        PUBLIC_OPERATIONS.contains(&operation_name)
    }
}
