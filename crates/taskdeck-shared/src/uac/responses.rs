//! Shapes of the `data` member returned for the session operations

use super::{Permissions, User};
use crate::token::{AccessToken, RefreshToken, TokenPair};

#[derive(Debug, serde::Deserialize)]
pub struct LoginData {
    pub login: LoginPayload,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub user: User,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenData {
    pub refresh_token: TokenPair,
}

#[derive(Debug, serde::Deserialize)]
pub struct MeData {
    pub me: User,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissionsData {
    pub user_permissions: Permissions,
}

#[derive(Debug, serde::Deserialize)]
pub struct LogoutData {
    pub logout: LogoutPayload,
}

#[derive(Debug, serde::Deserialize)]
pub struct LogoutPayload {
    pub message: String,
}

impl LoginPayload {
    pub fn split(self) -> (TokenPair, User) {
        let tokens = TokenPair {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        };
        (tokens, self.user)
    }
}
