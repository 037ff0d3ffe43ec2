use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{FlowKind, Identifiable, NamedEntity, Owned};

/// Groups entries and transactions; its kind must match theirs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub kind: FlowKind,
}

impl Category {
    pub fn new(user_id: Uuid, name: impl Into<String>, kind: FlowKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            kind,
        }
    }
}

impl Identifiable for Category {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Category {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Owned for Category {
    fn user_id(&self) -> Uuid {
        self.user_id
    }
}
