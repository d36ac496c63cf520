//! Core domain types for the PedalHub bike-rental client.
//!
//! Pure data: entities, pagination envelopes, and query parameter objects.
//! All I/O lives in `pedalhub-client`.

pub mod entities;
pub mod pagination;
pub mod params;

pub use entities::{
    Bike, BikeRentalHistory, CustomerRentalHistory, Member, Photo, Rental, RentalEntry, User,
    UserWithRoles,
};
pub use pagination::{PagedResult, Pagination};
pub use params::{BikeFilter, MemberFilter, Paged, PageParams, QueryKey};
