//! Thin client contract for the out-of-scope authorization
//! collaborator (§3/§4.6: `authorize(owner, action, resource,
//! roles)`). The signature check that resolves an owner UUID and role
//! set from the request is a separate external collaborator and has
//! no representation here at all.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Action name derived by `loadRequest` from `{method, requestType}`,
/// e.g. `"GetObject"`, `"PutBucket"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action(pub String);

impl Action {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resource path the action targets, e.g. `login/bucket/key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource(pub String);

impl Resource {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("access denied")]
    Denied,
    #[error("authorization collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Request shape for a single authorization check.
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub owner: Uuid,
    pub action: Action,
    pub resource: Resource,
    pub roles: Vec<String>,
}

impl AuthorizeRequest {
    #[must_use]
    pub fn new(
        owner: Uuid,
        action: Action,
        resource: Resource,
        roles: Vec<String>,
    ) -> Self {
        Self {
            owner,
            action,
            resource,
            roles,
        }
    }
}

/// The `authorize` pipeline stage's sole collaborator: given an
/// already-authenticated owner and role set, decide whether the
/// action on the resource is permitted.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, request: &AuthorizeRequest) -> Result<(), AuthError>;
}

/// Test double: permits every action whose name is in an allow-list,
/// denies everything else. Useful for pipeline integration tests that
/// don't exercise authorization logic itself.
pub struct AllowListAuthorizer {
    allowed_actions: Vec<String>,
}

impl AllowListAuthorizer {
    #[must_use]
    pub fn new(allowed_actions: Vec<String>) -> Self {
        Self { allowed_actions }
    }

    #[must_use]
    pub fn allow_all() -> Self {
        Self {
            allowed_actions: vec!["*".to_string()],
        }
    }
}

#[async_trait]
impl Authorizer for AllowListAuthorizer {
    async fn authorize(&self, request: &AuthorizeRequest) -> Result<(), AuthError> {
        if self.allowed_actions.iter().any(|a| a == "*" || a == &request.action.0) {
            Ok(())
        } else {
            Err(AuthError::Denied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allow_list_permits_listed_action() {
        let authz = AllowListAuthorizer::new(vec!["GetObject".to_string()]);
        let req = AuthorizeRequest::new(
            Uuid::nil(),
            Action::new("GetObject"),
            Resource::new("alice/bucket/key"),
            vec!["reader".to_string()],
        );
        authz.authorize(&req).await.unwrap();
    }

    #[tokio::test]
    async fn allow_list_denies_unlisted_action() {
        let authz = AllowListAuthorizer::new(vec!["GetObject".to_string()]);
        let req = AuthorizeRequest::new(
            Uuid::nil(),
            Action::new("DeleteBucket"),
            Resource::new("alice/bucket"),
            vec!["reader".to_string()],
        );
        let err = authz.authorize(&req).await.unwrap_err();
        assert!(matches!(err, AuthError::Denied));
    }

    #[tokio::test]
    async fn allow_all_permits_anything() {
        let authz = AllowListAuthorizer::allow_all();
        let req = AuthorizeRequest::new(
            Uuid::nil(),
            Action::new("DeleteBucket"),
            Resource::new("alice/bucket"),
            vec![],
        );
        authz.authorize(&req).await.unwrap();
    }
}
