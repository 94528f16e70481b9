use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use serde_json::json;
use uuid::Uuid;

use crate::api::tables::{self, POLL_OPTIONS, POLL_VOTES, POLLS};
use crate::api::{Query, TableApi};
use crate::error::{PortalError, Result};
use crate::models::{Poll, PollDraft, PollOption, PollVote, Profile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Cast,
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionTally {
    pub option: PollOption,
    pub votes: usize,
    /// Whether the viewing user holds a vote on this option.
    pub mine: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollSummary {
    pub poll: Poll,
    pub options: Vec<OptionTally>,
}

impl PollSummary {
    pub fn total_votes(&self) -> usize {
        self.options.iter().map(|o| o.votes).sum()
    }

    pub fn find_option(&self, label: &str) -> Option<&PollOption> {
        let label = label.trim().to_lowercase();
        self.options
            .iter()
            .map(|tally| &tally.option)
            .find(|option| option.id.to_string() == label || option.text.trim().to_lowercase() == label)
    }
}

fn normalize_options(options: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut texts = Vec::new();
    for option in options {
        let text = option.trim();
        if text.is_empty() {
            continue;
        }
        if !seen.insert(text.to_lowercase()) {
            return Err(PortalError::validation(format!("option \"{text}\" is repeated")));
        }
        texts.push(text.to_string());
    }

    if texts.len() < 2 {
        return Err(PortalError::validation("a poll needs at least two options"));
    }
    Ok(texts)
}

pub struct PollService<A> {
    api: Arc<A>,
}

impl<A: TableApi> PollService<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Every poll, newest first, with per-option counts as seen by `viewer`.
    pub async fn list(&self, viewer: Uuid) -> Result<Vec<PollSummary>> {
        let api = self.api.as_ref();
        let polls: Vec<Poll> =
            tables::fetch(api, POLLS, &Query::new().order("created_at", false)).await?;
        if polls.is_empty() {
            return Ok(Vec::new());
        }

        let poll_ids: Vec<Uuid> = polls.iter().map(|poll| poll.id).collect();
        let options: Vec<PollOption> = tables::fetch(
            api,
            POLL_OPTIONS,
            &Query::new().is_in("poll_id", &poll_ids),
        )
        .await?;
        let votes: Vec<PollVote> =
            tables::fetch(api, POLL_VOTES, &Query::new().is_in("poll_id", &poll_ids)).await?;

        Ok(summarize(polls, options, &votes, viewer))
    }

    pub async fn summary(&self, poll_id: Uuid, viewer: Uuid) -> Result<PollSummary> {
        self.list(viewer)
            .await?
            .into_iter()
            .find(|summary| summary.poll.id == poll_id)
            .ok_or_else(|| PortalError::NotFound(format!("poll {poll_id}")))
    }

    pub async fn create(
        &self,
        draft: PollDraft,
        options: &[String],
        author: &Profile,
    ) -> Result<PollSummary> {
        if draft.question.trim().is_empty() {
            return Err(PortalError::validation("poll question is required"));
        }
        if let Some(ends_at) = draft.ends_at {
            if ends_at <= Utc::now() {
                return Err(PortalError::validation("poll end date must be in the future"));
            }
        }
        let texts = normalize_options(options)?;

        let mut draft = draft;
        draft.created_by = Some(author.id);
        let poll: Poll = tables::insert_one(self.api.as_ref(), POLLS, &draft).await?;

        let rows: Vec<_> = texts
            .iter()
            .map(|text| json!({ "poll_id": poll.id, "text": text }))
            .collect();
        let inserted = self.api.insert(POLL_OPTIONS, json!(rows)).await?;
        let options = inserted
            .into_iter()
            .map(|row| serde_json::from_value::<PollOption>(row).map_err(PortalError::from))
            .collect::<Result<Vec<_>>>()?;

        info!("created poll {} with {} options", poll.id, options.len());
        Ok(PollSummary {
            poll,
            options: options
                .into_iter()
                .map(|option| OptionTally {
                    option,
                    votes: 0,
                    mine: false,
                })
                .collect(),
        })
    }

    /// Toggles the (user, option) vote: removes it if present, casts it otherwise.
    ///
    /// Votes on other options of the same poll are left alone.
    pub async fn toggle_vote(&self, poll: &Poll, option_id: Uuid, user_id: Uuid) -> Result<VoteOutcome> {
        if !poll.is_open(Utc::now()) {
            return Err(PortalError::validation("this poll is closed"));
        }

        let api = self.api.as_ref();
        let existing: Option<PollVote> = tables::fetch_one(
            api,
            POLL_VOTES,
            &Query::new()
                .eq("poll_id", poll.id)
                .eq("option_id", option_id)
                .eq("user_id", user_id),
        )
        .await?;

        match existing {
            Some(vote) => {
                api.delete(POLL_VOTES, &Query::new().eq("id", vote.id)).await?;
                debug!("withdrew vote {} on option {option_id}", vote.id);
                Ok(VoteOutcome::Withdrawn)
            }
            None => {
                api.insert(
                    POLL_VOTES,
                    json!({ "poll_id": poll.id, "option_id": option_id, "user_id": user_id }),
                )
                .await?;
                debug!("cast vote on option {option_id}");
                Ok(VoteOutcome::Cast)
            }
        }
    }

    pub async fn close(&self, poll_id: Uuid, actor: &Profile) -> Result<Poll> {
        self.managed_poll(poll_id, actor).await?;
        tables::update_one(
            self.api.as_ref(),
            POLLS,
            &Query::new().eq("id", poll_id),
            &json!({ "active": false }),
        )
        .await
    }

    /// Votes and options go first so no orphan rows remain if the poll delete fails.
    pub async fn delete(&self, poll_id: Uuid, actor: &Profile) -> Result<()> {
        self.managed_poll(poll_id, actor).await?;
        let api = self.api.as_ref();
        api.delete(POLL_VOTES, &Query::new().eq("poll_id", poll_id)).await?;
        api.delete(POLL_OPTIONS, &Query::new().eq("poll_id", poll_id)).await?;
        api.delete(POLLS, &Query::new().eq("id", poll_id)).await?;
        info!("deleted poll {poll_id}");
        Ok(())
    }

    async fn managed_poll(&self, poll_id: Uuid, actor: &Profile) -> Result<Poll> {
        let poll: Poll = tables::fetch_one(self.api.as_ref(), POLLS, &Query::new().eq("id", poll_id))
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("poll {poll_id}")))?;
        ensure_can_manage(&poll, actor)?;
        Ok(poll)
    }
}

/// Only the author of a poll or an administrator may close or delete it.
pub fn ensure_can_manage(poll: &Poll, actor: &Profile) -> Result<()> {
    if actor.is_admin() || poll.created_by == Some(actor.id) {
        Ok(())
    } else {
        Err(PortalError::Forbidden(
            "only the author or an administrator can manage this poll".into(),
        ))
    }
}

fn summarize(
    polls: Vec<Poll>,
    options: Vec<PollOption>,
    votes: &[PollVote],
    viewer: Uuid,
) -> Vec<PollSummary> {
    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    let mut mine: HashSet<Uuid> = HashSet::new();
    for vote in votes {
        *counts.entry(vote.option_id).or_default() += 1;
        if vote.user_id == viewer {
            mine.insert(vote.option_id);
        }
    }

    let mut by_poll: HashMap<Uuid, Vec<OptionTally>> = HashMap::new();
    for option in options {
        by_poll.entry(option.poll_id).or_default().push(OptionTally {
            votes: counts.get(&option.id).copied().unwrap_or(0),
            mine: mine.contains(&option.id),
            option,
        });
    }

    polls
        .into_iter()
        .map(|poll| PollSummary {
            options: by_poll.remove(&poll.id).unwrap_or_default(),
            poll,
        })
        .collect()
}
