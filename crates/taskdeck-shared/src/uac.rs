//! Shared items related to user account control

mod errors;
mod permissions;
mod responses;
mod role;
mod user;

pub use errors::SessionError;
pub use permissions::Permissions;
pub use responses::{LoginData, LoginPayload, LogoutData, MeData, RefreshTokenData, UserPermissionsData};
pub use role::{Role, RoleLevel, RoleName};
pub use user::{Email, User};
