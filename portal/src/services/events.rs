use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use uuid::Uuid;

use crate::api::tables::{self, EVENTS};
use crate::api::{Query, TableApi};
use crate::error::{PortalError, Result};
use crate::models::{Event, EventDraft, Profile};
use crate::store::{self, EntityList, Mutation};

/// Local-only answer to an invitation; never sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    Confirmed,
    Declined,
}

pub fn validate(draft: &EventDraft) -> Result<()> {
    if draft.title.trim().is_empty() {
        return Err(PortalError::validation("event title is required"));
    }
    if draft.start_time >= draft.end_time {
        return Err(PortalError::validation(
            "event must start before it ends",
        ));
    }
    Ok(())
}

pub struct EventService<A> {
    api: Arc<A>,
    events: EntityList<Event>,
    participation: HashMap<Uuid, Participation>,
}

impl<A: TableApi> EventService<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            events: EntityList::default().ordered_by(|a: &Event, b: &Event| a.start_time.cmp(&b.start_time)),
            participation: HashMap::new(),
        }
    }

    pub fn events(&self) -> &[Event] {
        self.events.items()
    }

    pub async fn refresh(&mut self) -> Result<&[Event]> {
        let events = tables::fetch(
            self.api.as_ref(),
            EVENTS,
            &Query::new().order("start_time", true),
        )
        .await?;
        self.events.replace_all(events);
        Ok(self.events.items())
    }

    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<&Event> {
        self.events
            .items()
            .iter()
            .filter(|event| event.end_time > now)
            .collect()
    }

    pub async fn create(&mut self, draft: EventDraft, author: &Profile) -> Result<Event> {
        validate(&draft)?;

        let mut draft = draft;
        draft.created_by = Some(author.id);
        let placeholder = Event {
            id: Uuid::new_v4(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            start_time: draft.start_time,
            end_time: draft.end_time,
            location: draft.location.clone(),
            category: draft.category,
            created_by: draft.created_by,
        };

        let api = self.api.clone();
        let created = store::mutate(&mut self.events, Mutation::Insert(placeholder), async move {
            tables::insert_one(api.as_ref(), EVENTS, &draft).await.map(Some)
        })
        .await?
        .ok_or_else(|| PortalError::NotFound("created event".into()))?;

        info!("created event {} ({})", created.title, created.id);
        Ok(created)
    }

    pub async fn update(&mut self, id: Uuid, draft: EventDraft) -> Result<Event> {
        validate(&draft)?;

        let current = self
            .events
            .get(&id)
            .cloned()
            .ok_or_else(|| PortalError::NotFound(format!("event {id}")))?;
        let edited = Event {
            title: draft.title.clone(),
            description: draft.description.clone(),
            start_time: draft.start_time,
            end_time: draft.end_time,
            location: draft.location.clone(),
            category: draft.category,
            ..current
        };

        let api = self.api.clone();
        store::mutate(&mut self.events, Mutation::Update(edited), async move {
            tables::update_one(api.as_ref(), EVENTS, &Query::new().eq("id", id), &draft)
                .await
                .map(Some)
        })
        .await?
        .ok_or_else(|| PortalError::NotFound(format!("event {id}")))
    }

    pub async fn delete(&mut self, id: Uuid) -> Result<()> {
        let api = self.api.clone();
        store::mutate(&mut self.events, Mutation::Remove(id), async move {
            api.delete(EVENTS, &Query::new().eq("id", id)).await?;
            Ok(None)
        })
        .await?;
        self.participation.remove(&id);
        Ok(())
    }

    pub fn respond(&mut self, id: Uuid, answer: Participation) -> Result<()> {
        if self.events.get(&id).is_none() {
            return Err(PortalError::NotFound(format!("event {id}")));
        }
        self.participation.insert(id, answer);
        Ok(())
    }

    pub fn participation(&self, id: &Uuid) -> Option<Participation> {
        self.participation.get(id).copied()
    }
}
