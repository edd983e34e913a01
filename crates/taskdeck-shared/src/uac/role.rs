use std::{fmt::Display, ops::Deref};

use serde::{Deserialize, Serialize};

use crate::{errors::ConversionError, id::RoleId};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
    pub level: RoleLevel,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct RoleName(String);

/// Rank of a role in the hierarchy. Higher is more privileged
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(transparent)]
pub struct RoleLevel(i32);

impl RoleName {
    pub const MAX_LENGTH: usize = 32;

    /// Name of the role at the top of the hierarchy. Holders pass every
    /// hierarchy check regardless of level
    pub const TOP: &'static str = "super_admin";

    pub fn is_top(&self) -> bool {
        self.0 == Self::TOP
    }
}

impl RoleLevel {
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn as_i32(&self) -> i32 {
        self.0
    }
}

impl Role {
    pub fn is_top(&self) -> bool {
        self.name.is_top()
    }

    /// May assign roles at or below its own level
    pub fn can_assign_role(&self, target: RoleLevel) -> bool {
        self.is_top() || self.level >= target
    }

    /// May only manage users strictly below its own level
    pub fn can_manage_user(&self, target: RoleLevel) -> bool {
        self.is_top() || self.level > target
    }
}

impl TryFrom<String> for RoleName {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(ConversionError::Empty);
        }
        if value.len() > Self::MAX_LENGTH {
            return Err(ConversionError::MaxExceeded {
                max: Self::MAX_LENGTH,
                actual: value.len(),
            });
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for RoleName {
    type Error = ConversionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.to_string().try_into()
    }
}

impl From<RoleName> for String {
    fn from(value: RoleName) -> Self {
        value.0
    }
}

impl Deref for RoleName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0[..]
    }
}

impl Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for RoleLevel {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl Display for RoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
