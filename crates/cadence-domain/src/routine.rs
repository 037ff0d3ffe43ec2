use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{Identifiable, NamedEntity, Owned};

/// Named, toggleable grouping of entries. Membership lives on `Entry::routine_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Routine {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Routine {
    pub fn new(user_id: Uuid, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Identifiable for Routine {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Routine {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Owned for Routine {
    fn user_id(&self) -> Uuid {
        self.user_id
    }
}
