use strum::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSpec {
    /// The GraphQL operation name, also used to decide if auth is required
    pub name: &'static str,
    pub document: &'static str,
    pub kind: OperationKind,
}

impl OperationSpec {
    pub const fn query(name: &'static str, document: &'static str) -> Self {
        Self {
            name,
            document,
            kind: OperationKind::Query,
        }
    }

    pub const fn mutation(name: &'static str, document: &'static str) -> Self {
        Self {
            name,
            document,
            kind: OperationKind::Mutation,
        }
    }

    pub fn is_public(&self) -> bool {
        super::is_public_operation(self.name)
    }
}
