//! User records.

use serde::{Deserialize, Serialize};

use crate::config::{ServiceConfig, ValidationConfig};
use crate::context::CorrelationContext;
use crate::error::ServiceError;
use crate::services::{generate_id, now_rfc3339, require_id, require_text, simulate_latency, DataAccess, DataError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u32,
    pub name: String,
    pub email: String,
    pub active: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Body of a create or update request. Every field is optional here and
/// checked by the operation that receives it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub active: Option<bool>,
}

impl UserInput {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.active.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserList {
    pub users: Vec<User>,
    pub total: usize,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deleted {
    pub id: String,
    pub message: String,
    pub deleted_at: String,
}

fn fixture(id: u32, name: &str, email: &str, active: bool, created_at: &str) -> User {
    User {
        id,
        name: name.to_string(),
        email: email.to_string(),
        active,
        created_at: created_at.to_string(),
        updated_at: None,
    }
}

fn all_users() -> Vec<User> {
    vec![
        fixture(1, "John Doe", "john@example.com", true, "2024-01-01T10:00:00Z"),
        fixture(2, "Jane Smith", "jane@example.com", true, "2024-01-15T14:30:00Z"),
        fixture(3, "Bob Johnson", "bob@example.com", false, "2024-02-01T09:15:00Z"),
    ]
}

fn find_user(id: &str) -> Result<User, DataError> {
    all_users()
        .into_iter()
        .find(|u| u.id.to_string() == id)
        .ok_or(DataError::NotFound("User"))
}

/// User CRUD behind the `database` breaker.
#[derive(Debug, Clone)]
pub struct UserService {
    data: DataAccess,
    config: ServiceConfig,
    limits: ValidationConfig,
}

impl UserService {
    pub fn new(data: DataAccess, config: ServiceConfig, limits: ValidationConfig) -> Self {
        Self { data, config, limits }
    }

    pub async fn list(&self, ctx: &CorrelationContext) -> Result<UserList, ServiceError> {
        tracing::info!("Fetching all users");
        let delay = self.config.list;
        self.data
            .run("getAllUsers", ctx, move |interrupt| {
                simulate_latency(interrupt, delay)?;
                let users = all_users();
                Ok(UserList {
                    total: users.len(),
                    users,
                    timestamp: chrono::Utc::now().timestamp_millis(),
                })
            })
            .await
    }

    pub async fn get(&self, id: &str, ctx: &CorrelationContext) -> Result<User, ServiceError> {
        let id = require_id(id, "User")?;
        tracing::info!(user_id = %id, "Fetching user");
        let delay = self.config.fetch;
        self.data
            .run("getUserById", ctx, move |interrupt| {
                simulate_latency(interrupt, delay)?;
                find_user(&id)
            })
            .await
    }

    pub async fn create(&self, input: UserInput, ctx: &CorrelationContext) -> Result<User, ServiceError> {
        if input.is_empty() {
            return Err(ServiceError::bad_request("User data must not be empty"));
        }
        let max = self.limits.max_name_length;
        let name = require_text(input.name.as_deref(), "User name is required", "User name", max)?;
        let email = require_text(input.email.as_deref(), "User email is required", "User email", max)?;

        tracing::info!(user_name = %name, "Creating user");
        let (delay, min_id, max_id) = (self.config.create_user, self.config.min_id, self.config.max_id);
        self.data
            .run("createUser", ctx, move |interrupt| {
                simulate_latency(interrupt, delay)?;
                Ok(User {
                    id: generate_id(min_id, max_id),
                    name,
                    email,
                    active: true,
                    created_at: now_rfc3339(),
                    updated_at: None,
                })
            })
            .await
    }

    pub async fn update(&self, id: &str, input: UserInput, ctx: &CorrelationContext) -> Result<User, ServiceError> {
        let id = require_id(id, "User")?;
        if input.is_empty() {
            return Err(ServiceError::bad_request("User data must not be empty"));
        }
        let max = self.limits.max_name_length;
        let name = match input.name.as_deref() {
            Some(n) => Some(require_text(Some(n), "User name must not be blank", "User name", max)?),
            None => None,
        };
        let email = match input.email.as_deref() {
            Some(e) => Some(require_text(Some(e), "User email must not be blank", "User email", max)?),
            None => None,
        };
        let active = input.active;

        tracing::info!(user_id = %id, "Updating user");
        let (fetch, update) = (self.config.fetch, self.config.update);
        self.data
            .run("updateUser", ctx, move |interrupt| {
                simulate_latency(interrupt, fetch)?;
                let mut user = find_user(&id)?;
                simulate_latency(interrupt, update)?;
                if let Some(name) = name {
                    user.name = name;
                }
                if let Some(email) = email {
                    user.email = email;
                }
                if let Some(active) = active {
                    user.active = active;
                }
                user.updated_at = Some(now_rfc3339());
                Ok(user)
            })
            .await
    }

    pub async fn delete(&self, id: &str, ctx: &CorrelationContext) -> Result<Deleted, ServiceError> {
        let id = require_id(id, "User")?;
        tracing::info!(user_id = %id, "Deleting user");
        let (fetch, delete) = (self.config.fetch, self.config.delete);
        self.data
            .run("deleteUser", ctx, move |interrupt| {
                simulate_latency(interrupt, fetch)?;
                find_user(&id)?;
                simulate_latency(interrupt, delete)?;
                Ok(Deleted {
                    id,
                    message: "User deleted successfully".to_string(),
                    deleted_at: now_rfc3339(),
                })
            })
            .await
    }
}
