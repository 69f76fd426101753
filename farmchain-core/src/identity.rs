use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::TradeError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Farmer,
    Distributor,
    Retailer,
    Consumer,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// A registered participant as seen by the trade core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub settlement_address: String,
    pub role: Role,
}

/// The authenticated identity performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Lookup into the user/identity service (KYC and profile management live there).
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>, TradeError>;
}

/// In-process directory for tests and local development.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get_user(&self, id: &str) -> Result<Option<User>, TradeError> {
        Ok(self.users.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_directory_lookup() {
        let directory = MemoryUserDirectory::new();
        directory
            .insert(User {
                id: "farmer-1".to_string(),
                settlement_address: "0xfarmer".to_string(),
                role: Role::Farmer,
            })
            .await;

        let user = directory.get_user("farmer-1").await.unwrap().unwrap();
        assert_eq!(user.settlement_address, "0xfarmer");
        assert!(!user.role.is_admin());
        assert!(directory.get_user("missing").await.unwrap().is_none());
    }
}
