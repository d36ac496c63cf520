//! Rental operations and history lookups.
//!
//! Renting or returning a bike changes its catalog availability, so both
//! mutations invalidate and refresh the catalog store before reporting
//! success. History lookups fetch the referenced bikes alongside the rental
//! rows so consumers get brand/model without a second lookup of their own.

use crate::api_client::RestClient;
use crate::error::ClientResult;
use crate::notifications::Notifier;
use crate::stores::bikes::BikeStore;
use futures_util::future::try_join_all;
use pedalhub_core::{Bike, BikeRentalHistory, CustomerRentalHistory, Rental, RentalEntry};
use std::collections::HashSet;

pub struct RentalService {
    client: RestClient,
    notifier: Notifier,
}

impl RentalService {
    pub fn new(client: RestClient, notifier: Notifier) -> Self {
        Self { client, notifier }
    }

    /// Rents a bike for the signed-in customer.
    pub async fn rent_bike(&self, bike_id: i64, bikes: &BikeStore) -> ClientResult<()> {
        self.client.rent_bike(bike_id).await?;
        self.notifier.success("Bike rented");
        bikes.refresh_after_mutation().await
    }

    /// Returns a rented bike.
    pub async fn return_bike(&self, bike_id: i64, bikes: &BikeStore) -> ClientResult<()> {
        self.client.return_bike(bike_id).await?;
        self.notifier.success("Bike returned");
        bikes.refresh_after_mutation().await
    }

    /// Rental rows for one bike, enriched with the bike itself.
    pub async fn bike_history(&self, bike_id: i64) -> ClientResult<(Bike, BikeRentalHistory)> {
        let (bike, history) = tokio::join!(
            self.client.get_bike(bike_id),
            self.client.bike_rental_history(bike_id),
        );
        Ok((bike?, history?))
    }

    /// Rental rows for one customer, enriched with every bike the rows
    /// reference. Each distinct bike is fetched once; the GETs are idempotent
    /// and run concurrently.
    pub async fn customer_history(
        &self,
        username: &str,
    ) -> ClientResult<(CustomerRentalHistory, Vec<Bike>)> {
        let history = self.client.customer_rental_history(username).await?;

        let ids = distinct_bike_ids(&history.rentals);
        let bikes = try_join_all(ids.into_iter().map(|id| self.client.get_bike(id))).await?;

        Ok((history, bikes))
    }

    /// One customer's rentals of one bike.
    pub async fn customer_bike_rentals(
        &self,
        bike_id: i64,
        username: &str,
    ) -> ClientResult<Vec<Rental>> {
        self.client.bike_customer_rentals(bike_id, username).await
    }
}

/// Distinct bike ids in row order, first occurrence wins.
fn distinct_bike_ids(rows: &[RentalEntry]) -> Vec<i64> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| seen.insert(row.bike_id))
        .map(|row| row.bike_id)
        .collect()
}
