use std::{collections::BTreeSet, fmt::Debug};

/// The permission strings granted to a user.
///
/// Permission strings are opaque to the client. They are optionally namespaced
/// with a colon (for example `task_system:read`) and are only ever compared
/// using [`Permissions::allows`].
#[derive(serde::Serialize, serde::Deserialize, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    /// Returns true if any held permission is exactly `action` or ends with
    /// `:<action>`.
    ///
    /// The suffix comparison is literal, so `a:b:read` allows `read` and
    /// `b:read`, while `project_system:read` does not allow `system:rea`.
    pub fn allows(&self, action: &str) -> bool {
        self.0.iter().any(|perm| {
            perm == action
                || perm
                    .strip_suffix(action)
                    .is_some_and(|prefix| prefix.ends_with(':'))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for Permissions {
    fn from(value: Vec<String>) -> Self {
        value.into_iter().collect()
    }
}

impl From<&[&str]> for Permissions {
    fn from(value: &[&str]) -> Self {
        value.iter().copied().collect()
    }
}

impl Debug for Permissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}
