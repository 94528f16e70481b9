use std::sync::Arc;

use chrono::Utc;
use log::info;
use uuid::Uuid;

use crate::api::tables::{self, NOTICES};
use crate::api::{Query, TableApi};
use crate::error::{PortalError, Result};
use crate::models::{Notice, NoticeDraft, Profile, Sector};
use crate::store::{self, EntityList, Mutation};

fn validate(draft: &NoticeDraft) -> Result<()> {
    if draft.title.trim().is_empty() {
        return Err(PortalError::validation("notice title is required"));
    }
    if draft.content.trim().is_empty() {
        return Err(PortalError::validation("notice content is required"));
    }
    Ok(())
}

pub struct NoticeService<A> {
    api: Arc<A>,
    notices: EntityList<Notice>,
}

impl<A: TableApi> NoticeService<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            notices: EntityList::default().ordered_by(|a: &Notice, b: &Notice| b.created_at.cmp(&a.created_at)),
        }
    }

    pub fn notices(&self) -> &[Notice] {
        self.notices.items()
    }

    /// Newest first, optionally limited to one sector.
    pub async fn refresh(&mut self, sector: Option<&Sector>) -> Result<&[Notice]> {
        let mut query = Query::new().order("created_at", false);
        if let Some(sector) = sector {
            query = query.eq("sector", sector);
        }
        let notices = tables::fetch(self.api.as_ref(), NOTICES, &query).await?;
        self.notices.replace_all(notices);
        Ok(self.notices.items())
    }

    pub async fn create(&mut self, draft: NoticeDraft, author: &Profile) -> Result<Notice> {
        validate(&draft)?;

        let draft = draft.with_author(author.id);
        let placeholder = Notice {
            id: Uuid::new_v4(),
            title: draft.title.clone(),
            content: draft.content.clone(),
            sector: draft.sector.clone(),
            author_id: draft.author_id,
            created_at: Utc::now(),
        };

        let api = self.api.clone();
        let created = store::mutate(&mut self.notices, Mutation::Insert(placeholder), async move {
            tables::insert_one(api.as_ref(), NOTICES, &draft).await.map(Some)
        })
        .await?
        .ok_or_else(|| PortalError::NotFound("created notice".into()))?;

        info!("published notice {}", created.id);
        Ok(created)
    }

    pub async fn update(&mut self, id: Uuid, draft: NoticeDraft) -> Result<Notice> {
        validate(&draft)?;

        let current = self
            .notices
            .get(&id)
            .cloned()
            .ok_or_else(|| PortalError::NotFound(format!("notice {id}")))?;
        let edited = Notice {
            title: draft.title.clone(),
            content: draft.content.clone(),
            sector: draft.sector.clone(),
            ..current
        };

        let api = self.api.clone();
        store::mutate(&mut self.notices, Mutation::Update(edited), async move {
            tables::update_one(api.as_ref(), NOTICES, &Query::new().eq("id", id), &draft)
                .await
                .map(Some)
        })
        .await?
        .ok_or_else(|| PortalError::NotFound(format!("notice {id}")))
    }

    pub async fn delete(&mut self, id: Uuid) -> Result<()> {
        let api = self.api.clone();
        store::mutate(&mut self.notices, Mutation::Remove(id), async move {
            api.delete(NOTICES, &Query::new().eq("id", id)).await?;
            Ok(None)
        })
        .await?;
        Ok(())
    }
}
