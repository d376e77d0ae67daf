//! Locations: a Swiss postal code (NPA) and a city, owned by the user who created them.
//!
//! Every mutation is published as a domain event so connected clients see it live.

use crate::auth::{authorize, Identity};
use crate::error::{EntityErrorKind, Error};
use crate::Id;
use dashmap::DashMap;
use events::{DomainEvent, EventPublisher};
use log::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

const NPA_RANGE: std::ops::RangeInclusive<u32> = 1000..=9999;
const MAX_CITY_LENGTH: usize = 60;

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Location {
    #[schema(value_type = String, format = Uuid)]
    pub id: Id,
    pub npa: u32,
    pub city: String,
    #[schema(value_type = String, format = Uuid)]
    pub owner_id: Id,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct NewLocation {
    pub npa: u32,
    pub city: String,
}

/// Partial update, absent fields are left unchanged.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct LocationPatch {
    pub npa: Option<u32>,
    pub city: Option<String>,
}

#[derive(Default)]
pub struct MemoryLocations {
    locations: DashMap<Id, Location>,
}

impl MemoryLocations {
    pub fn new() -> Self {
        Self::default()
    }
}

fn validate_npa(npa: u32) -> Result<u32, Error> {
    if NPA_RANGE.contains(&npa) {
        Ok(npa)
    } else {
        warn!("Rejected location with NPA {npa}");
        Err(Error::entity(EntityErrorKind::Invalid))
    }
}

fn validate_city(city: &str) -> Result<String, Error> {
    let city = city.trim();
    let length = city.chars().count();
    if length == 0 || length > MAX_CITY_LENGTH {
        warn!("Rejected location with a city of {length} characters");
        return Err(Error::entity(EntityErrorKind::Invalid));
    }
    Ok(city.to_string())
}

fn to_event_payload(location: &Location) -> Result<serde_json::Value, Error> {
    serde_json::to_value(location)
        .map_err(|e| Error::entity(EntityErrorKind::Other(e.to_string())).with_source(e))
}

pub fn create(
    locations: &MemoryLocations,
    publisher: &EventPublisher,
    owner: &Identity,
    new_location: NewLocation,
) -> Result<Location, Error> {
    let location = Location {
        id: Uuid::new_v4(),
        npa: validate_npa(new_location.npa)?,
        city: validate_city(&new_location.city)?,
        owner_id: owner.subject_id,
    };
    locations.locations.insert(location.id, location.clone());
    info!(
        "Created location {} ({} {}) for {}",
        location.id, location.npa, location.city, location.owner_id
    );

    publisher.spawn_publish(DomainEvent::LocationCreated {
        location: to_event_payload(&location)?,
        owner_id: location.owner_id,
    });
    Ok(location)
}

pub fn find_by_id(locations: &MemoryLocations, id: Id) -> Result<Location, Error> {
    locations
        .locations
        .get(&id)
        .map(|location| location.clone())
        .ok_or_else(|| Error::entity(EntityErrorKind::NotFound))
}

/// All locations ordered by NPA, then city.
pub fn list(locations: &MemoryLocations) -> Vec<Location> {
    let mut all: Vec<Location> = locations
        .locations
        .iter()
        .map(|location| location.clone())
        .collect();
    all.sort_by(|a, b| a.npa.cmp(&b.npa).then_with(|| a.city.cmp(&b.city)));
    all
}

/// Only the owner or an admin may update a location.
pub fn update(
    locations: &MemoryLocations,
    publisher: &EventPublisher,
    actor: &Identity,
    id: Id,
    patch: LocationPatch,
) -> Result<Location, Error> {
    let npa = patch.npa.map(validate_npa).transpose()?;
    let city = patch.city.as_deref().map(validate_city).transpose()?;

    let updated = {
        let mut location = locations
            .locations
            .get_mut(&id)
            .ok_or_else(|| Error::entity(EntityErrorKind::NotFound))?;
        authorize(actor, None, Some(location.owner_id))?;

        if let Some(npa) = npa {
            location.npa = npa;
        }
        if let Some(city) = city {
            location.city = city;
        }
        location.clone()
    };
    info!("Updated location {} by {}", updated.id, actor.subject_id);

    publisher.spawn_publish(DomainEvent::LocationUpdated {
        location: to_event_payload(&updated)?,
    });
    Ok(updated)
}

/// Only the owner or an admin may delete a location.
pub fn delete(
    locations: &MemoryLocations,
    publisher: &EventPublisher,
    actor: &Identity,
    id: Id,
) -> Result<Location, Error> {
    let existing = find_by_id(locations, id)?;
    authorize(actor, None, Some(existing.owner_id))?;

    let (_, removed) = locations
        .locations
        .remove(&id)
        .ok_or_else(|| Error::entity(EntityErrorKind::NotFound))?;
    info!("Deleted location {} by {}", removed.id, actor.subject_id);

    publisher.spawn_publish(DomainEvent::LocationDeleted {
        location_id: removed.id,
    });
    Ok(removed)
}
