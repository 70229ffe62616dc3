//! Redis backend for the carpool ride request broker.
//!
//! Proposals from owners to drivers live only for a short window, so they are
//! kept in Redis rather than `PostgreSQL`:
//!
//! - **Entry**: `ride_request:{driver}:{id}` holds the JSON request with a TTL
//! - **Index**: `ride_request:{driver}` is a set of live request ids
//! - **Claim**: `GETDEL` on the entry, so exactly one accept wins
//!
//! # Example
//!
//! ```no_run
//! use carpool_redis::RedisRideRequestBroker;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = RedisRideRequestBroker::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod broker;

pub use broker::RedisRideRequestBroker;
