use bson::{DateTime, Uuid};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use blogstore_core::{
    document::Document,
    entity::{Entity, EntityMethod, IndexKind, IndexSpec, WriteEvent, stamp_timestamps, unknown_method},
    error::DocumentStoreError,
};

/// A registered author or reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct User {
    #[serde(default = "Uuid::new")]
    pub id: Uuid,
    #[validate(length(min = 3, max = 50, message = "username must be 3-50 characters"))]
    pub username: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[serde(default)]
    #[validate(range(min = 13, max = 120, message = "age must be between 13 and 120"))]
    pub age: Option<i32>,
    #[serde(default)]
    #[validate(length(max = 500, message = "bio must be at most 500 characters"))]
    pub bio: Option<String>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime>,
    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

fn active_by_default() -> bool {
    true
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new(),
            username: username.into(),
            email: email.into(),
            age: None,
            bio: None,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_age(mut self, age: i32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }
}

impl Document for User {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "users"
    }
}

impl Entity for User {
    type Method = UserMethod;

    fn indexes() -> Vec<IndexSpec> {
        vec![
            IndexSpec::unique("email"),
            IndexSpec::single("username"),
            IndexSpec::compound([("username", IndexKind::Asc), ("email", IndexKind::Asc)]),
        ]
    }

    fn before_write(&mut self, event: WriteEvent, now: DateTime) {
        stamp_timestamps(&mut self.created_at, &mut self.updated_at, event, now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMethod {
    /// Rewrites the user, refreshing `updated_at`.
    UpdateTimestamp,
    Activate,
    Deactivate,
}

impl FromStr for UserMethod {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update_timestamp" => Ok(UserMethod::UpdateTimestamp),
            "activate" => Ok(UserMethod::Activate),
            "deactivate" => Ok(UserMethod::Deactivate),
            other => Err(unknown_method::<User>(other)),
        }
    }
}

impl EntityMethod<User> for UserMethod {
    fn name(&self) -> &'static str {
        match self {
            UserMethod::UpdateTimestamp => "update_timestamp",
            UserMethod::Activate => "activate",
            UserMethod::Deactivate => "deactivate",
        }
    }

    fn apply(&self, user: &mut User) {
        match self {
            UserMethod::UpdateTimestamp => {},
            UserMethod::Activate => user.is_active = true,
            UserMethod::Deactivate => user.is_active = false,
        }
    }
}
