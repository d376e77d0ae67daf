//! The narrow view of the identity directory the rest of the system depends on.
//!
//! Users and their roles are owned by an external store; the auth gate and the
//! broadcaster only ever read from it through this trait.

use crate::error::Error;
use crate::user::Role;
use crate::Id;
use async_trait::async_trait;

#[async_trait]
pub trait Directory: Send + Sync {
    /// Current role of `subject_id`, or `None` when the subject no longer exists.
    async fn lookup_role(&self, subject_id: Id) -> Result<Option<Role>, Error>;

    /// Every subject currently holding `role`.
    async fn list_subjects_with_role(&self, role: Role) -> Result<Vec<Id>, Error>;
}
