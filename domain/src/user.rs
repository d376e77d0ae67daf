//! Users, roles and the in-memory identity directory.
//!
//! `MemoryDirectory` stands in for the external user store: it answers the
//! [`Directory`] queries used by the auth gate and the broadcaster, and carries
//! the handful of user operations the HTTP layer needs (registration, login
//! verification, role changes).

use crate::auth::{authorize, Identity};
use crate::directory::Directory;
use crate::error::{EntityErrorKind, Error};
use crate::Id;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use email_address::EmailAddress;
use events::{DomainEvent, EventPublisher};
use log::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use utoipa::ToSchema;
use uuid::Uuid;

const MIN_PASSWORD_LENGTH: usize = 8;

/// The closed set of roles. `Admin` is the elevated role: it may manage other
/// users, act on any resource and receives admin-only broadcasts.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(fmt, "user"),
            Role::Admin => write!(fmt, "admin"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct User {
    #[schema(value_type = String, format = Uuid)]
    pub id: Id,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    #[serde(skip)]
    password: String,
}

/// Registration payload, also the shape of each entry in the directory seed file.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: DashMap<Id, User>,
    email_index: DashMap<String, Id>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON array of [`NewUser`] entries.
    pub fn from_seed_file(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let entries: Vec<NewUser> = serde_json::from_str(&contents)?;

        let directory = Self::new();
        for entry in entries {
            let user = directory.create(entry)?;
            debug!("Seeded {} ({}) as {}", user.email, user.id, user.role);
        }
        info!(
            "Loaded {} user(s) from {}",
            directory.users.len(),
            path.display()
        );
        Ok(directory)
    }

    pub fn create(&self, new_user: NewUser) -> Result<User, Error> {
        let email = new_user.email.trim().to_lowercase();
        if !EmailAddress::is_valid(&email) {
            warn!("Rejected user with invalid email {email:?}");
            return Err(Error::entity(EntityErrorKind::Invalid));
        }
        if new_user.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::entity(EntityErrorKind::Invalid));
        }
        let display_name = new_user.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(Error::entity(EntityErrorKind::Invalid));
        }

        match self.email_index.entry(email.clone()) {
            Entry::Occupied(_) => Err(Error::entity(EntityErrorKind::Conflict)),
            Entry::Vacant(slot) => {
                let user = User {
                    id: Uuid::new_v4(),
                    email,
                    display_name,
                    role: new_user.role.unwrap_or_default(),
                    password: password_auth::generate_hash(&new_user.password),
                };
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    pub fn find_by_id(&self, id: Id) -> Result<User, Error> {
        self.users
            .get(&id)
            .map(|user| user.clone())
            .ok_or_else(|| Error::entity(EntityErrorKind::NotFound))
    }

    pub fn find_by_email(&self, email: &str) -> Option<User> {
        let id = *self.email_index.get(&email.trim().to_lowercase())?;
        self.users.get(&id).map(|user| user.clone())
    }

    /// All users ordered by display name.
    pub fn list(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|user| user.clone()).collect();
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        users
    }

    pub fn set_role(&self, id: Id, role: Role) -> Result<User, Error> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| Error::entity(EntityErrorKind::NotFound))?;
        user.role = role;
        Ok(user.clone())
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub fn verify_credentials(&self, credentials: &Credentials) -> Result<User, Error> {
        let user = self
            .find_by_email(&credentials.email)
            .ok_or_else(Error::unauthenticated)?;

        password_auth::verify_password(&credentials.password, &user.password)
            .map_err(|e| Error::unauthenticated().with_source(e))?;

        Ok(user)
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn lookup_role(&self, subject_id: Id) -> Result<Option<Role>, Error> {
        Ok(self.users.get(&subject_id).map(|user| user.role))
    }

    async fn list_subjects_with_role(&self, role: Role) -> Result<Vec<Id>, Error> {
        Ok(self
            .users
            .iter()
            .filter(|user| user.role == role)
            .map(|user| user.id)
            .collect())
    }
}

/// Registers a new user and notifies admins.
///
/// Anyone may register a plain user; asking for the admin role requires an
/// authenticated admin.
pub fn register(
    directory: &MemoryDirectory,
    publisher: &EventPublisher,
    new_user: NewUser,
    requested_by: Option<&Identity>,
) -> Result<User, Error> {
    if new_user.role.unwrap_or_default() == Role::Admin {
        let identity = requested_by.ok_or_else(Error::forbidden)?;
        authorize(identity, Some(Role::Admin), None)?;
    }

    let user = directory.create(new_user)?;
    info!("Registered user {} as {}", user.id, user.role);

    publisher.spawn_publish(DomainEvent::UserCreated {
        user: serde_json::to_value(&user)?,
    });
    Ok(user)
}

/// Changes a user's role in the directory. Callers must already have
/// authorized the acting identity as an admin.
pub fn change_role(
    directory: &MemoryDirectory,
    publisher: &EventPublisher,
    user_id: Id,
    role: Role,
) -> Result<User, Error> {
    let user = directory.set_role(user_id, role)?;
    info!("Changed role of user {user_id} to {role}");

    publisher.spawn_publish(DomainEvent::UserRoleChanged {
        user_id,
        role: role.to_string(),
    });
    Ok(user)
}
