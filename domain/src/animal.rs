//! Lost and found animal reports.
//!
//! A report belongs to the user who filed it and may point at one of the known
//! locations. Like locations, every mutation is published so connected clients
//! see new reports as they come in.

use crate::auth::{authorize, Identity};
use crate::error::{EntityErrorKind, Error};
use crate::location::{self, MemoryLocations};
use crate::Id;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use events::{DomainEvent, EventPublisher};
use log::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

const MAX_TEXT_LENGTH: usize = 500;

/// Whether the animal went missing or was found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AnimalKind {
    #[default]
    Lost,
    Find,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Animal {
    #[schema(value_type = String, format = Uuid)]
    pub id: Id,
    pub name: Option<String>,
    pub age: Option<u32>,
    pub description: String,
    pub fur: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: AnimalKind,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub location_id: Option<Id>,
    #[schema(value_type = String, format = Uuid)]
    pub owner_id: Id,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct NewAnimal {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub description: String,
    pub fur: String,
    /// Defaults to the time of the report.
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "type", default)]
    pub kind: AnimalKind,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub location_id: Option<Id>,
}

/// Partial update, absent fields are left unchanged.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct AnimalPatch {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub description: Option<String>,
    pub fur: Option<String>,
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub kind: Option<AnimalKind>,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub location_id: Option<Id>,
}

#[derive(Default)]
pub struct MemoryAnimals {
    animals: DashMap<Id, Animal>,
}

impl MemoryAnimals {
    pub fn new() -> Self {
        Self::default()
    }
}

fn required_text(field: &str, value: &str) -> Result<String, Error> {
    let value = value.trim();
    let length = value.chars().count();
    if length == 0 || length > MAX_TEXT_LENGTH {
        warn!("Rejected animal with a {field} of {length} characters");
        return Err(Error::entity(EntityErrorKind::Invalid));
    }
    Ok(value.to_string())
}

// An unknown location is a bad request, not a missing animal.
fn known_location(locations: &MemoryLocations, location_id: Id) -> Result<Id, Error> {
    location::find_by_id(locations, location_id)
        .map(|location| location.id)
        .map_err(|_| {
            warn!("Rejected animal referencing unknown location {location_id}");
            Error::entity(EntityErrorKind::Invalid)
        })
}

fn to_event_payload(animal: &Animal) -> Result<serde_json::Value, Error> {
    serde_json::to_value(animal)
        .map_err(|e| Error::entity(EntityErrorKind::Other(e.to_string())).with_source(e))
}

pub fn create(
    animals: &MemoryAnimals,
    locations: &MemoryLocations,
    publisher: &EventPublisher,
    owner: &Identity,
    new_animal: NewAnimal,
) -> Result<Animal, Error> {
    let animal = Animal {
        id: Uuid::new_v4(),
        name: new_animal.name,
        age: new_animal.age,
        description: required_text("description", &new_animal.description)?,
        fur: required_text("fur", &new_animal.fur)?,
        date: new_animal.date.unwrap_or_else(Utc::now),
        kind: new_animal.kind,
        location_id: new_animal
            .location_id
            .map(|id| known_location(locations, id))
            .transpose()?,
        owner_id: owner.subject_id,
    };
    animals.animals.insert(animal.id, animal.clone());
    info!(
        "Created {:?} animal report {} for {}",
        animal.kind, animal.id, animal.owner_id
    );

    publisher.spawn_publish(DomainEvent::AnimalCreated {
        animal: to_event_payload(&animal)?,
        owner_id: animal.owner_id,
    });
    Ok(animal)
}

pub fn find_by_id(animals: &MemoryAnimals, id: Id) -> Result<Animal, Error> {
    animals
        .animals
        .get(&id)
        .map(|animal| animal.clone())
        .ok_or_else(|| Error::entity(EntityErrorKind::NotFound))
}

/// Most recent reports first.
pub fn list(animals: &MemoryAnimals) -> Vec<Animal> {
    let mut all: Vec<Animal> = animals.animals.iter().map(|animal| animal.clone()).collect();
    all.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    all
}

/// Only the owner or an admin may update a report.
pub fn update(
    animals: &MemoryAnimals,
    locations: &MemoryLocations,
    publisher: &EventPublisher,
    actor: &Identity,
    id: Id,
    patch: AnimalPatch,
) -> Result<Animal, Error> {
    let description = patch
        .description
        .as_deref()
        .map(|value| required_text("description", value))
        .transpose()?;
    let fur = patch
        .fur
        .as_deref()
        .map(|value| required_text("fur", value))
        .transpose()?;
    let location_id = patch
        .location_id
        .map(|id| known_location(locations, id))
        .transpose()?;

    let updated = {
        let mut animal = animals
            .animals
            .get_mut(&id)
            .ok_or_else(|| Error::entity(EntityErrorKind::NotFound))?;
        authorize(actor, None, Some(animal.owner_id))?;

        if let Some(name) = patch.name {
            animal.name = Some(name);
        }
        if let Some(age) = patch.age {
            animal.age = Some(age);
        }
        if let Some(description) = description {
            animal.description = description;
        }
        if let Some(fur) = fur {
            animal.fur = fur;
        }
        if let Some(date) = patch.date {
            animal.date = date;
        }
        if let Some(kind) = patch.kind {
            animal.kind = kind;
        }
        if location_id.is_some() {
            animal.location_id = location_id;
        }
        animal.clone()
    };
    info!("Updated animal report {} by {}", updated.id, actor.subject_id);

    publisher.spawn_publish(DomainEvent::AnimalUpdated {
        animal: to_event_payload(&updated)?,
    });
    Ok(updated)
}

/// Only the owner or an admin may delete a report.
pub fn delete(
    animals: &MemoryAnimals,
    publisher: &EventPublisher,
    actor: &Identity,
    id: Id,
) -> Result<Animal, Error> {
    let existing = find_by_id(animals, id)?;
    authorize(actor, None, Some(existing.owner_id))?;

    let (_, removed) = animals
        .animals
        .remove(&id)
        .ok_or_else(|| Error::entity(EntityErrorKind::NotFound))?;
    info!("Deleted animal report {} by {}", removed.id, actor.subject_id);

    publisher.spawn_publish(DomainEvent::AnimalDeleted {
        animal_id: removed.id,
    });
    Ok(removed)
}
