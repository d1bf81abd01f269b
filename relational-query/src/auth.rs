//! Role-based authorization.
//!
//! Authorization is a plain check, applied by the transport layer before it evaluates a query:
//! the caller's [`Principal`] must hold at least one of the roles an operation requires. The query
//! engine itself never looks at who is asking.

use crate::error::Error;
use std::collections::BTreeSet;

/// An authenticated caller, as resolved by an identity provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Principal {
    id: String,
    roles: BTreeSet<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_roles<I>(mut self, roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Check that `principal` holds at least one of the `required` roles.
///
/// An operation which requires no roles is open to everyone, including anonymous callers.
/// Otherwise an anonymous caller, or one holding none of the roles, is
/// [`Unauthorized`](Error::Unauthorized).
pub fn authorize<R: AsRef<str>>(principal: Option<&Principal>, required: &[R]) -> Result<(), Error> {
    if required.is_empty() {
        return Ok(());
    }
    match principal {
        Some(principal) if required.iter().any(|role| principal.has_role(role.as_ref())) => Ok(()),
        _ => {
            tracing::debug!(
                "denied {} lacking roles",
                principal.map(Principal::id).unwrap_or("anonymous caller")
            );
            Err(Error::Unauthorized {
                required: required.iter().map(|role| role.as_ref().to_string()).collect(),
            })
        }
    }
}
