//! Route, schedule, description and rule value objects for a ride.

use crate::error::{DomainError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Longest location description.
pub const MAX_LOCATION_DESCRIPTION: usize = 64;
/// Longest ride description.
pub const MAX_RIDE_DESCRIPTION: usize = 128;
/// Most rules a ride may carry.
pub const MAX_RIDE_RULES: usize = 12;

// ============================================================================
// Location / Route
// ============================================================================

/// A named point on the map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLocation")]
pub struct Location {
    description: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawLocation {
    description: String,
    latitude: f64,
    longitude: f64,
}

impl Location {
    /// Create a location.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank or over-long description, or
    /// coordinates outside the valid latitude/longitude ranges.
    pub fn new(description: impl Into<String>, latitude: f64, longitude: f64) -> Result<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(DomainError::invalid("location", "description must not be blank"));
        }
        if description.chars().count() > MAX_LOCATION_DESCRIPTION {
            return Err(DomainError::invalid(
                "location",
                format!("description must be at most {MAX_LOCATION_DESCRIPTION} characters"),
            ));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(DomainError::invalid("location", "latitude must be within [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(DomainError::invalid(
                "location",
                "longitude must be within [-180, 180]",
            ));
        }
        Ok(Self {
            description,
            latitude,
            longitude,
        })
    }

    /// Human readable name.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl TryFrom<RawLocation> for Location {
    type Error = DomainError;

    fn try_from(raw: RawLocation) -> Result<Self> {
        Self::new(raw.description, raw.latitude, raw.longitude)
    }
}

/// Origin and destination of a ride.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRoute")]
pub struct Route {
    from: Location,
    to: Location,
}

#[derive(Deserialize)]
struct RawRoute {
    from: Location,
    to: Location,
}

impl Route {
    /// Create a route.
    ///
    /// # Errors
    ///
    /// Returns a validation error if both ends are the same location.
    pub fn new(from: Location, to: Location) -> Result<Self> {
        if from == to {
            return Err(DomainError::invalid("route", "origin and destination must differ"));
        }
        Ok(Self { from, to })
    }

    /// Origin.
    #[must_use]
    pub const fn from(&self) -> &Location {
        &self.from
    }

    /// Destination.
    #[must_use]
    pub const fn to(&self) -> &Location {
        &self.to
    }
}

impl TryFrom<RawRoute> for Route {
    type Error = DomainError;

    fn try_from(raw: RawRoute) -> Result<Self> {
        Self::new(raw.from, raw.to)
    }
}

// ============================================================================
// Schedule
// ============================================================================

/// Start and end of a ride.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRideTime")]
pub struct RideTime {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawRideTime {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl RideTime {
    /// Schedule a new ride.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless `now < start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Result<Self> {
        if start <= now {
            return Err(DomainError::invalid("schedule", "start must be in the future"));
        }
        Self::restore(start, end)
    }

    /// Rebuild a stored schedule, which may already be in the past.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless `start < end`.
    pub fn restore(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(DomainError::invalid("schedule", "end must be after start"));
        }
        Ok(Self { start, end })
    }

    /// Departure time.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Arrival time.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

impl TryFrom<RawRideTime> for RideTime {
    type Error = DomainError;

    fn try_from(raw: RawRideTime) -> Result<Self> {
        Self::restore(raw.start, raw.end)
    }
}

// ============================================================================
// Description
// ============================================================================

/// Free-text ride description.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RideDesc(String);

impl RideDesc {
    /// Create a description.
    ///
    /// # Errors
    ///
    /// Returns a validation error if longer than 128 characters.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.chars().count() > MAX_RIDE_DESCRIPTION {
            return Err(DomainError::invalid(
                "description",
                format!("must be at most {MAX_RIDE_DESCRIPTION} characters"),
            ));
        }
        Ok(Self(text))
    }

    /// The text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RideDesc {
    type Error = DomainError;

    fn try_from(text: String) -> Result<Self> {
        Self::new(text)
    }
}

impl From<RideDesc> for String {
    fn from(desc: RideDesc) -> Self {
        desc.0
    }
}

// ============================================================================
// Rules
// ============================================================================

/// A condition the driver sets for passengers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideRule {
    /// No smoking in the car.
    NoSmoking,
    /// Smoking allowed.
    SmokingAllowed,
    /// No pets.
    NoPets,
    /// Pets welcome.
    PetsAllowed,
    /// No eating.
    NoFood,
    /// No drinks.
    NoDrinks,
    /// No loud music.
    NoLoudMusic,
    /// Quiet ride, minimal conversation.
    QuietRide,
    /// Only small bags.
    NoLargeLuggage,
    /// A child seat is provided.
    ChildSeatAvailable,
    /// Women passengers only.
    WomenOnly,
    /// Air conditioning is on.
    AirConditioning,
    /// No phone calls.
    NoPhoneCalls,
    /// Masks required.
    MasksRequired,
}

impl RideRule {
    /// Every rule, in declaration order.
    pub const ALL: [Self; 14] = [
        Self::NoSmoking,
        Self::SmokingAllowed,
        Self::NoPets,
        Self::PetsAllowed,
        Self::NoFood,
        Self::NoDrinks,
        Self::NoLoudMusic,
        Self::QuietRide,
        Self::NoLargeLuggage,
        Self::ChildSeatAvailable,
        Self::WomenOnly,
        Self::AirConditioning,
        Self::NoPhoneCalls,
        Self::MasksRequired,
    ];
}

/// Set of at most 12 rules.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RideRule>", into = "Vec<RideRule>")]
pub struct RideRules(BTreeSet<RideRule>);

impl RideRules {
    /// Create a rule set.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::TooManyRules`] for more than 12 distinct rules.
    pub fn new(rules: impl IntoIterator<Item = RideRule>) -> Result<Self> {
        let set: BTreeSet<RideRule> = rules.into_iter().collect();
        if set.len() > MAX_RIDE_RULES {
            return Err(DomainError::TooManyRules {
                max: MAX_RIDE_RULES,
            });
        }
        Ok(Self(set))
    }

    /// Whether `rule` is set.
    #[must_use]
    pub fn contains(&self, rule: RideRule) -> bool {
        self.0.contains(&rule)
    }

    /// Set with `rule` added.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::TooManyRules`] if the result would exceed 12.
    pub fn with(&self, rule: RideRule) -> Result<Self> {
        let mut set = self.0.clone();
        set.insert(rule);
        if set.len() > MAX_RIDE_RULES {
            return Err(DomainError::TooManyRules {
                max: MAX_RIDE_RULES,
            });
        }
        Ok(Self(set))
    }

    /// Set with `rule` removed.
    #[must_use]
    pub fn without(&self, rule: RideRule) -> Self {
        let mut set = self.0.clone();
        set.remove(&rule);
        Self(set)
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no rule is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in rule order.
    pub fn iter(&self) -> impl Iterator<Item = RideRule> + '_ {
        self.0.iter().copied()
    }
}

impl TryFrom<Vec<RideRule>> for RideRules {
    type Error = DomainError;

    fn try_from(rules: Vec<RideRule>) -> Result<Self> {
        Self::new(rules)
    }
}

impl From<RideRules> for Vec<RideRule> {
    fn from(rules: RideRules) -> Self {
        rules.0.into_iter().collect()
    }
}
