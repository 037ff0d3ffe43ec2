//! Recurrence rules attached to entries.
//!
//! Users and hosts exchange the loose [`RawRecurrence`] shape
//! (`frequency` + optional `days_of_week` / `day_of_month`). It is converted
//! into [`Recurrence`] on construction and deserialization, so a record that
//! holds a `Recurrence` always satisfies the frequency/sub-field invariant.

use std::fmt;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        };
        f.write_str(label)
    }
}

/// Lower-case English weekday name, e.g. `"monday"`.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Parses a full weekday name. Surrounding whitespace and letter case are ignored.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let normalized = name.trim().to_ascii_lowercase();
    WEEKDAYS
        .into_iter()
        .find(|day| weekday_name(*day) == normalized)
}

/// Compact set of weekdays backed by a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= Self::bit(day);
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in Monday-first order.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEKDAYS.into_iter().filter(|day| self.contains(*day))
    }

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::default();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

/// Loose recurrence shape as entered by users and stored by hosts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawRecurrence {
    pub frequency: Frequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
}

/// A validated recurrence rule.
///
/// `Yearly` recurs on the month and day of the owning entry's start date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecurrence", into = "RawRecurrence")]
pub enum Recurrence {
    Daily,
    Weekly(WeekdaySet),
    Monthly { day: u32 },
    Yearly,
}

impl Recurrence {
    pub fn weekly<I>(days: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = Weekday>,
    {
        let set: WeekdaySet = days.into_iter().collect();
        if set.is_empty() {
            return Err(DomainError::InvalidRecurrence(
                "weekly recurrence needs at least one weekday".into(),
            ));
        }
        Ok(Recurrence::Weekly(set))
    }

    pub fn monthly(day: u32) -> Result<Self, DomainError> {
        if !(1..=31).contains(&day) {
            return Err(DomainError::InvalidRecurrence(format!(
                "day_of_month {day} is outside 1..=31"
            )));
        }
        Ok(Recurrence::Monthly { day })
    }

    /// Re-checks a rule built directly from its variants.
    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Recurrence::Weekly(days) if days.is_empty() => Err(DomainError::InvalidRecurrence(
                "weekly recurrence needs at least one weekday".into(),
            )),
            Recurrence::Monthly { day } => Recurrence::monthly(*day).map(|_| ()),
            _ => Ok(()),
        }
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            Recurrence::Daily => Frequency::Daily,
            Recurrence::Weekly(_) => Frequency::Weekly,
            Recurrence::Monthly { .. } => Frequency::Monthly,
            Recurrence::Yearly => Frequency::Yearly,
        }
    }
}

impl TryFrom<RawRecurrence> for Recurrence {
    type Error = DomainError;

    fn try_from(raw: RawRecurrence) -> Result<Self, Self::Error> {
        let RawRecurrence {
            frequency,
            days_of_week,
            day_of_month,
        } = raw;
        match frequency {
            Frequency::Weekly => {
                if day_of_month.is_some() {
                    return Err(DomainError::InvalidRecurrence(
                        "weekly recurrence cannot carry day_of_month".into(),
                    ));
                }
                let names = days_of_week.unwrap_or_default();
                let mut days = Vec::with_capacity(names.len());
                for name in &names {
                    let day = parse_weekday(name).ok_or_else(|| {
                        DomainError::InvalidRecurrence(format!("unknown weekday `{name}`"))
                    })?;
                    days.push(day);
                }
                Recurrence::weekly(days)
            }
            Frequency::Monthly => {
                if days_of_week.is_some() {
                    return Err(DomainError::InvalidRecurrence(
                        "monthly recurrence cannot carry days_of_week".into(),
                    ));
                }
                let day = day_of_month.ok_or_else(|| {
                    DomainError::InvalidRecurrence("monthly recurrence needs day_of_month".into())
                })?;
                Recurrence::monthly(day)
            }
            Frequency::Daily | Frequency::Yearly => {
                if days_of_week.is_some() || day_of_month.is_some() {
                    return Err(DomainError::InvalidRecurrence(format!(
                        "{frequency} recurrence takes neither days_of_week nor day_of_month"
                    )));
                }
                Ok(if frequency == Frequency::Daily {
                    Recurrence::Daily
                } else {
                    Recurrence::Yearly
                })
            }
        }
    }
}

impl From<Recurrence> for RawRecurrence {
    fn from(rule: Recurrence) -> Self {
        let frequency = rule.frequency();
        match rule {
            Recurrence::Weekly(days) => RawRecurrence {
                frequency,
                days_of_week: Some(days.iter().map(|d| weekday_name(d).to_string()).collect()),
                day_of_month: None,
            },
            Recurrence::Monthly { day } => RawRecurrence {
                frequency,
                days_of_week: None,
                day_of_month: Some(day),
            },
            Recurrence::Daily | Recurrence::Yearly => RawRecurrence {
                frequency,
                days_of_week: None,
                day_of_month: None,
            },
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Weekly(days) => {
                let names: Vec<&str> = days.iter().map(weekday_name).collect();
                write!(f, "weekly on {}", names.join(", "))
            }
            Recurrence::Monthly { day } => write!(f, "monthly on day {day}"),
            other => write!(f, "{}", other.frequency()),
        }
    }
}
