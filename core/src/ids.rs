//! Identifier newtypes.
//!
//! Every entity is keyed by a UUID wrapped in its own type so a `DriverId`
//! can never be passed where a `UserId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a ride
    RideId
);
uuid_id!(
    /// Unique identifier for a ride contract (a booking)
    RideContractId
);
uuid_id!(
    /// Unique identifier for a brokered ride request
    RideRequestId
);
uuid_id!(
    /// Unique identifier for a driver account
    DriverId
);
uuid_id!(
    /// Unique identifier for a fleet owner account
    OwnerId
);
uuid_id!(
    /// Unique identifier for an authenticated user
    UserId
);
uuid_id!(
    /// Unique identifier for a car
    CarId
);
