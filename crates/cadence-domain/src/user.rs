use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{common::Identifiable, error::DomainError};

/// Owner of every other record. Carries the zone used to decide what "today" means.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub timezone: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        timezone: impl Into<String>,
        currency: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let user = Self {
            id: Uuid::new_v4(),
            email: email.into(),
            timezone: timezone.into(),
            currency: currency.into(),
            created_at: now,
            updated_at: now,
        };
        user.validate()?;
        Ok(user)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.email.contains('@') {
            return Err(DomainError::InvalidName(format!(
                "`{}` is not an email address",
                self.email
            )));
        }
        self.tz()?;
        let code = self.currency.as_bytes();
        if code.len() != 3 || !code.iter().all(u8::is_ascii_uppercase) {
            return Err(DomainError::InvalidCurrency(self.currency.clone()));
        }
        Ok(())
    }

    /// Parsed IANA zone.
    pub fn tz(&self) -> Result<Tz, DomainError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| DomainError::InvalidTimezone(self.timezone.clone()))
    }
}

impl Identifiable for User {
    fn id(&self) -> Uuid {
        self.id
    }
}
