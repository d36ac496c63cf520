//! Per-entity stores and facades built on [`crate::store::EntityStore`].
//!
//! Each store owns its list pipeline plus the entity-specific mutations.
//! Mutations that change what another store's backend queries would return
//! take that store as an argument and invalidate it explicitly; nothing is
//! invalidated implicitly.

pub mod account;
pub mod admin;
pub mod bikes;
pub mod likes;
pub mod members;
pub mod rentals;

pub use account::AccountService;
pub use admin::AdminService;
pub use bikes::BikeStore;
pub use likes::LikesStore;
pub use members::MemberStore;
pub use rentals::RentalService;
