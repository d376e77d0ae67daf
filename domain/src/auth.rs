//! The auth gate: one authentication path shared by request/response calls and
//! WebSocket upgrades, and the role/ownership authorization rule.

use crate::directory::Directory;
use crate::error::Error;
use crate::jwt::CredentialCodec;
use crate::user::Role;
use crate::Id;
use log::*;
use serde::Serialize;
use service::config::RoleCheck;
use std::sync::Arc;

/// Who the caller is, as established by a verified credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub subject_id: Id,
    pub role: Role,
}

/// Extracts the token from an `Authorization` header value of the form `Bearer <token>`.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Passes when the identity is an admin, when it owns the resource, or when
/// its role is at least `required_role`. With neither a required role nor an
/// owner only admins pass.
pub fn authorize(
    identity: &Identity,
    required_role: Option<Role>,
    resource_owner_id: Option<Id>,
) -> Result<(), Error> {
    let is_admin = identity.role == Role::Admin;
    let is_owner = resource_owner_id == Some(identity.subject_id);
    let has_role = required_role.is_some_and(|required| identity.role >= required);

    if is_admin || is_owner || has_role {
        Ok(())
    } else {
        debug!(
            "Forbidden: {} ({}) lacks {:?} and does not own {:?}",
            identity.subject_id, identity.role, required_role, resource_owner_id
        );
        Err(Error::forbidden())
    }
}

#[derive(Clone)]
pub struct AuthGate {
    codec: Arc<CredentialCodec>,
    directory: Arc<dyn Directory>,
    role_check: RoleCheck,
}

impl AuthGate {
    pub fn new(
        codec: Arc<CredentialCodec>,
        directory: Arc<dyn Directory>,
        role_check: RoleCheck,
    ) -> Self {
        Self {
            codec,
            directory,
            role_check,
        }
    }

    pub fn codec(&self) -> &CredentialCodec {
        &self.codec
    }

    /// Verifies the presented credential. Under `RoleCheck::Directory` the
    /// role is replaced by the subject's current role, and subjects that no
    /// longer exist are rejected.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Identity, Error> {
        let token = token.ok_or_else(|| {
            debug!("No credential presented");
            Error::unauthenticated()
        })?;
        let mut identity = self.codec.verify(token)?;

        if self.role_check == RoleCheck::Directory {
            match self.directory.lookup_role(identity.subject_id).await? {
                Some(role) => identity.role = role,
                None => {
                    warn!(
                        "Credential for unknown subject {} presented",
                        identity.subject_id
                    );
                    return Err(Error::unauthenticated());
                }
            }
        }

        trace!("Authenticated {} as {}", identity.subject_id, identity.role);
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::{MemoryDirectory, NewUser};
    use std::time::Duration;
    use uuid::Uuid;

    fn identity(role: Role) -> Identity {
        Identity {
            subject_id: Uuid::new_v4(),
            role,
        }
    }

    fn gate(directory: Arc<MemoryDirectory>, role_check: RoleCheck) -> AuthGate {
        let codec = Arc::new(CredentialCodec::new(b"gate-secret", Duration::from_secs(3600)));
        AuthGate::new(codec, directory, role_check)
    }

    fn jane(directory: &MemoryDirectory) -> crate::user::User {
        directory
            .create(NewUser {
                email: "jane@doe.ch".to_string(),
                password: "password123".to_string(),
                display_name: "Jane".to_string(),
                role: None,
            })
            .unwrap()
    }

    #[test]
    fn bearer_token_parses_the_header() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer   "), None);
    }

    #[test]
    fn owners_pass_regardless_of_role() {
        for role in [Role::User, Role::Admin] {
            let caller = identity(role);
            assert!(authorize(&caller, None, Some(caller.subject_id)).is_ok());
            assert!(authorize(&caller, Some(Role::Admin), Some(caller.subject_id)).is_ok());
        }
    }

    #[test]
    fn plain_users_cannot_touch_other_peoples_resources() {
        let caller = identity(Role::User);
        let err = authorize(&caller, None, Some(Uuid::new_v4())).unwrap_err();
        assert!(err.is_forbidden());
        assert!(authorize(&caller, Some(Role::Admin), None).unwrap_err().is_forbidden());
        assert!(authorize(&caller, None, None).unwrap_err().is_forbidden());
    }

    #[test]
    fn admins_pass_everything() {
        let admin = identity(Role::Admin);
        assert!(authorize(&admin, None, Some(Uuid::new_v4())).is_ok());
        assert!(authorize(&admin, Some(Role::Admin), None).is_ok());
        assert!(authorize(&admin, None, None).is_ok());
    }

    #[test]
    fn required_role_is_a_minimum() {
        assert!(authorize(&identity(Role::User), Some(Role::User), None).is_ok());
    }

    #[tokio::test]
    async fn authenticate_rejects_missing_and_invalid_credentials() {
        let gate = gate(Arc::new(MemoryDirectory::new()), RoleCheck::Token);
        assert!(gate.authenticate(None).await.unwrap_err().is_unauthenticated());
        assert!(gate
            .authenticate(Some("garbage"))
            .await
            .unwrap_err()
            .is_unauthenticated());
    }

    #[tokio::test]
    async fn token_policy_keeps_the_role_snapshot() {
        let directory = Arc::new(MemoryDirectory::new());
        let user = jane(&directory);
        let gate = gate(directory.clone(), RoleCheck::Token);
        let credential = gate.codec().issue(user.id, user.role).unwrap();

        directory.set_role(user.id, Role::Admin).unwrap();

        let identity = gate.authenticate(Some(&credential.token)).await.unwrap();
        assert_eq!(identity.role, Role::User);
        assert!(authorize(&identity, Some(Role::Admin), None).is_err());
    }

    #[tokio::test]
    async fn directory_policy_uses_the_current_role() {
        let directory = Arc::new(MemoryDirectory::new());
        let user = jane(&directory);
        let gate = gate(directory.clone(), RoleCheck::Directory);
        let credential = gate.codec().issue(user.id, user.role).unwrap();

        directory.set_role(user.id, Role::Admin).unwrap();

        let identity = gate.authenticate(Some(&credential.token)).await.unwrap();
        assert_eq!(identity.role, Role::Admin);
    }

    #[tokio::test]
    async fn directory_policy_rejects_unknown_subjects() {
        let directory = Arc::new(MemoryDirectory::new());
        let gate = gate(directory, RoleCheck::Directory);
        let credential = gate.codec().issue(Uuid::new_v4(), Role::Admin).unwrap();

        assert!(gate
            .authenticate(Some(&credential.token))
            .await
            .unwrap_err()
            .is_unauthenticated());
    }
}
