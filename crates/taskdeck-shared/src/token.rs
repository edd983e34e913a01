//! Credentials handed out by the API. Wrapped so they never show up in `Debug`
//! output or traces

use secrecy::{ExposeSecret as _, SecretString};

/// Short lived credential sent with each authenticated request
#[derive(Clone, serde::Deserialize)]
pub struct AccessToken(SecretString);

/// Longer lived credential only used to obtain a new [`AccessToken`]
#[derive(Clone, serde::Deserialize)]
pub struct RefreshToken(SecretString);

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

macro_rules! impl_token {
    ($name: ident) => {
        impl $name {
            pub fn expose_secret(&self) -> &str {
                self.0.expose_secret()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value.into())
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                value.to_string().into()
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.expose_secret() == other.expose_secret()
            }
        }

        impl Eq for $name {}

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($name))
                    .field(&"[REDACTED]")
                    .finish()
            }
        }
    };
}

impl_token!(AccessToken);
impl_token!(RefreshToken);

impl TokenPair {
    pub fn new<A, R>(access_token: A, refresh_token: R) -> Self
    where
        A: Into<AccessToken>,
        R: Into<RefreshToken>,
    {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}
