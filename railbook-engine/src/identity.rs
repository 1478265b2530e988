use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Highest privilege level; granted to the bootstrap user.
pub const MAX_PRIVILEGE: u8 = 10;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("User already exists: {0}")]
    DuplicateUser(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Wrong password for user: {0}")]
    WrongPassword(String),

    #[error("User not logged in: {0}")]
    NotLoggedIn(String),

    #[error("User already logged in: {0}")]
    AlreadyLoggedIn(String),

    #[error("Insufficient privilege")]
    PermissionDenied,

    #[error("Invalid profile field: {0}")]
    InvalidProfile(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
    pub privilege: u8,
    #[serde(default)]
    pub logged_in: bool,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
    pub privilege: u8,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub password: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub privilege: Option<u8>,
}

/// Account store and session flags. The booking engine only consumes
/// `is_logged_in` and `privilege_of`; everything else exists to serve the
/// account commands of the line protocol.
pub struct UserDirectory {
    users: HashMap<String, User>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
        }
    }

    /// Adds an account. The very first account bootstraps the system with
    /// max privilege and needs no current user; afterwards the current
    /// user must be logged in and strictly outrank the new account.
    pub fn add_user(
        &mut self,
        current: Option<&str>,
        new_user: NewUser,
    ) -> Result<(), IdentityError> {
        validate_username(&new_user.username)?;
        validate_password(&new_user.password)?;
        validate_email(&new_user.email)?;
        if new_user.name.is_empty() || new_user.name.len() > 20 {
            return Err(IdentityError::InvalidProfile("name".into()));
        }
        if self.users.contains_key(&new_user.username) {
            return Err(IdentityError::DuplicateUser(new_user.username));
        }

        let privilege = if self.users.is_empty() {
            MAX_PRIVILEGE
        } else {
            let current = current.ok_or(IdentityError::PermissionDenied)?;
            let actor = self
                .users
                .get(current)
                .ok_or_else(|| IdentityError::NotFound(current.to_string()))?;
            if !actor.logged_in {
                return Err(IdentityError::NotLoggedIn(current.to_string()));
            }
            if new_user.privilege >= actor.privilege {
                return Err(IdentityError::PermissionDenied);
            }
            new_user.privilege
        };

        tracing::info!(username = %new_user.username, privilege, "user added");
        self.users.insert(
            new_user.username.clone(),
            User {
                username: new_user.username,
                password: new_user.password,
                name: new_user.name,
                email: new_user.email,
                privilege,
                logged_in: false,
            },
        );
        Ok(())
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), IdentityError> {
        let user = self
            .users
            .get_mut(username)
            .ok_or_else(|| IdentityError::NotFound(username.to_string()))?;
        if user.password != password {
            return Err(IdentityError::WrongPassword(username.to_string()));
        }
        if user.logged_in {
            return Err(IdentityError::AlreadyLoggedIn(username.to_string()));
        }
        user.logged_in = true;
        Ok(())
    }

    pub fn logout(&mut self, username: &str) -> Result<(), IdentityError> {
        let user = self
            .users
            .get_mut(username)
            .ok_or_else(|| IdentityError::NotFound(username.to_string()))?;
        if !user.logged_in {
            return Err(IdentityError::NotLoggedIn(username.to_string()));
        }
        user.logged_in = false;
        Ok(())
    }

    pub fn is_logged_in(&self, username: &str) -> bool {
        self.users.get(username).is_some_and(|u| u.logged_in)
    }

    pub fn privilege_of(&self, username: &str) -> Option<u8> {
        self.users.get(username).map(|u| u.privilege)
    }

    /// Self-lookup, or lookup by a logged-in user of strictly higher
    /// privilege.
    pub fn query_profile(&self, current: &str, username: &str) -> Result<&User, IdentityError> {
        let actor = self
            .users
            .get(current)
            .ok_or_else(|| IdentityError::NotFound(current.to_string()))?;
        if !actor.logged_in {
            return Err(IdentityError::NotLoggedIn(current.to_string()));
        }
        let target = self
            .users
            .get(username)
            .ok_or_else(|| IdentityError::NotFound(username.to_string()))?;
        if current != username && actor.privilege <= target.privilege {
            return Err(IdentityError::PermissionDenied);
        }
        Ok(target)
    }

    /// Applies profile changes under the same visibility rule as
    /// `query_profile`; a privilege change must stay below the actor's.
    pub fn modify_profile(
        &mut self,
        current: &str,
        username: &str,
        update: ProfileUpdate,
    ) -> Result<&User, IdentityError> {
        let actor = self
            .users
            .get(current)
            .ok_or_else(|| IdentityError::NotFound(current.to_string()))?;
        if !actor.logged_in {
            return Err(IdentityError::NotLoggedIn(current.to_string()));
        }
        let actor_privilege = actor.privilege;
        let target = self
            .users
            .get(username)
            .ok_or_else(|| IdentityError::NotFound(username.to_string()))?;
        if current != username && actor_privilege <= target.privilege {
            return Err(IdentityError::PermissionDenied);
        }
        if let Some(privilege) = update.privilege {
            if privilege >= actor_privilege {
                return Err(IdentityError::PermissionDenied);
            }
        }
        if let Some(password) = &update.password {
            validate_password(password)?;
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }
        if let Some(name) = &update.name {
            if name.is_empty() || name.len() > 20 {
                return Err(IdentityError::InvalidProfile("name".into()));
            }
        }

        let target = self
            .users
            .get_mut(username)
            .ok_or_else(|| IdentityError::NotFound(username.to_string()))?;
        if let Some(password) = update.password {
            target.password = password;
        }
        if let Some(name) = update.name {
            target.name = name;
        }
        if let Some(email) = update.email {
            target.email = email;
        }
        if let Some(privilege) = update.privilege {
            target.privilege = privilege;
        }
        Ok(target)
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_username(username: &str) -> Result<(), IdentityError> {
    let mut chars = username.chars();
    let valid = match chars.next() {
        Some(first) if username.len() <= 20 => {
            first.is_ascii_alphabetic()
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(IdentityError::InvalidProfile("username".into()))
    }
}

fn validate_password(password: &str) -> Result<(), IdentityError> {
    let valid = (6..=30).contains(&password.len())
        && password.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(IdentityError::InvalidProfile("password".into()))
    }
}

fn validate_email(email: &str) -> Result<(), IdentityError> {
    let valid = !email.is_empty() && email.len() <= 30 && email.contains('@') && email.contains('.');
    if valid {
        Ok(())
    } else {
        Err(IdentityError::InvalidProfile("email".into()))
    }
}
