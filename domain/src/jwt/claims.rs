//! The claims carried inside a bearer credential.

use crate::user::Role;
use serde::{Deserialize, Serialize};

/// `sub` is the subject's id, `role` the role it held when the credential was
/// issued. `iat` and `exp` are Unix timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CredentialClaims {
    pub(crate) sub: String,
    pub(crate) role: Role,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}
