//! Role checks for GraphQL fields.

use super::async_graphql::{self as gql, Context, Guard};
use crate::auth::{authorize, Principal};
use async_trait::async_trait;

/// A field guard which admits callers holding any of a set of roles.
///
/// The caller is the [`Principal`] in the request data, if there is one. A guard with no roles
/// admits everyone.
///
/// # Examples
///
/// ```
/// use relational_query::graphql::{Object, RoleGuard};
///
/// struct Admin;
///
/// #[Object]
/// impl Admin {
///     #[graphql(guard = "RoleGuard::new([\"admin\"])")]
///     async fn secret(&self) -> &str {
///         "swordfish"
///     }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleGuard {
    roles: Vec<String>,
}

impl RoleGuard {
    pub fn new<I>(roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

#[async_trait]
impl Guard for RoleGuard {
    async fn check(&self, ctx: &Context<'_>) -> gql::Result<()> {
        authorize(ctx.data_opt::<Principal>(), &self.roles)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graphql::{value, EmptyMutation, EmptySubscription, Object, Request, Schema};
    use crate::init_logging;

    struct Root;

    #[Object]
    impl Root {
        #[graphql(guard = "RoleGuard::new([\"admin\", \"editor\"])")]
        async fn secret(&self) -> &str {
            "swordfish"
        }

        #[graphql(guard = "RoleGuard::default()")]
        async fn public(&self) -> &str {
            "hello"
        }
    }

    #[async_std::test]
    async fn test_role_guard() {
        init_logging();

        let schema = Schema::new(Root, EmptyMutation, EmptySubscription);

        let res = schema.execute("{ public }").await;
        assert_eq!(res.data, value!({ "public": "hello" }));

        let res = schema.execute("{ secret }").await;
        assert_eq!(res.errors.len(), 1);
        assert_eq!(
            res.errors[0].message,
            "unauthorized: requires one of the roles [admin, editor]"
        );

        let reader = Principal::new("u1").with_role("reader");
        let res = schema
            .execute(Request::new("{ secret }").data(reader))
            .await;
        assert_eq!(res.errors.len(), 1);

        let editor = Principal::new("u2").with_role("editor");
        let res = schema
            .execute(Request::new("{ secret }").data(editor))
            .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(res.data, value!({ "secret": "swordfish" }));
    }
}
