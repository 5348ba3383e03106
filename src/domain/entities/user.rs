//! User entity and repository trait.
//!
//! Profiles are owned by the profile service; this core only reads the fields
//! that discovery and presence depend on, and writes the online flag.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{GeoBounds, GeoPoint};
use crate::shared::error::AppError;

/// Gender as stored on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Parse the database representation. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "male" | "man" | "men" => Some(Self::Male),
            "female" | "woman" | "women" => Some(Self::Female),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }

    /// Every lowercase spelling `parse` maps to this gender.
    pub fn spellings(&self) -> &'static [&'static str] {
        match self {
            Self::Male => &["male", "man", "men"],
            Self::Female => &["female", "woman", "women"],
            Self::Other => &["other"],
        }
    }
}

/// Which genders a user wants to see in discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenderPreference {
    Male,
    Female,
    Other,
    #[default]
    Both,
}

impl GenderPreference {
    /// Parse the database representation; anything unrecognised means no filter.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "male" | "men" => Self::Male,
            "female" | "women" => Self::Female,
            "other" => Self::Other,
            _ => Self::Both,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
            Self::Both => "both",
        }
    }

    /// The single gender this preference asks for; `None` for `Both`.
    pub fn gender(&self) -> Option<Gender> {
        match self {
            Self::Male => Some(Gender::Male),
            Self::Female => Some(Gender::Female),
            Self::Other => Some(Gender::Other),
            Self::Both => None,
        }
    }

    /// Whether a candidate with `gender` passes this preference.
    ///
    /// `Both` accepts everyone, including profiles without a gender.
    pub fn accepts(&self, gender: Option<Gender>) -> bool {
        match self {
            Self::Both => true,
            Self::Male => gender == Some(Gender::Male),
            Self::Female => gender == Some(Gender::Female),
            Self::Other => gender == Some(Gender::Other),
        }
    }
}

/// Discovery preferences of a user. Unset bounds do not filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Preferences {
    pub interested_in: GenderPreference,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub max_distance_km: Option<f64>,
}

/// Represents a user profile as seen by the matching core.
///
/// Maps to `users` joined with `user_preferences`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Snowflake ID (primary key)
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub gender: Option<Gender>,
    pub birthdate: Option<NaiveDate>,
    pub location: Option<GeoPoint>,
    pub preferences: Preferences,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl User {
    /// Age in whole years on `today`, if the birthdate is known.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.birthdate.map(|b| calendar_age(b, today))
    }

    /// Public summary attached to events and match listings.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
            is_online: self.is_online,
            last_seen: self.last_seen,
        }
    }
}

/// The subset of a profile other participants are allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Calendar-year age: the year difference, minus one if this year's birthday
/// has not happened yet. A person is N on their Nth birthday.
///
/// Feb 29 birthdays roll over on Mar 1 in non-leap years.
pub fn calendar_age(birthdate: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - birthdate.year();
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Coarse bounds on the discovery pool that a store applies before the exact
/// filter runs. Each bound admits a superset of what the exact rule keeps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryQuery {
    /// Ids never returned
    pub exclude: Vec<i64>,
    /// Required gender; `None` admits every profile
    pub gender: Option<Gender>,
    /// Inclusive birthdate window. When either end is set, profiles without
    /// a birthdate are left out.
    pub born_on_or_after: Option<NaiveDate>,
    pub born_on_or_before: Option<NaiveDate>,
    /// Located profiles must fall inside; profiles without a location pass
    pub area: Option<GeoBounds>,
}

impl DiscoveryQuery {
    pub fn admits(&self, user: &User) -> bool {
        if self.exclude.contains(&user.id) {
            return false;
        }
        if self.gender.is_some_and(|g| user.gender != Some(g)) {
            return false;
        }
        if self.born_on_or_after.is_some() || self.born_on_or_before.is_some() {
            let Some(birthdate) = user.birthdate else {
                return false;
            };
            if self.born_on_or_after.is_some_and(|d| birthdate < d)
                || self.born_on_or_before.is_some_and(|d| birthdate > d)
            {
                return false;
            }
        }
        match (self.area, user.location) {
            (Some(area), Some(point)) => area.contains(&point),
            _ => true,
        }
    }
}

/// Repository trait for the user profile collaborator.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by their Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Fetch several users at once; missing ids are skipped.
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, AppError>;

    /// Candidate pool for discovery: the users `query` admits, in id order.
    async fn find_discoverable(&self, query: &DiscoveryQuery) -> Result<Vec<User>, AppError>;

    /// Mark the user online.
    async fn set_online(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Mark the user offline with `at` as last seen.
    async fn set_offline(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;
}
