mod common;

use std::sync::Arc;

use common::{FakeBackend, profile};
use portal::PortalError;
use portal::api::tables::{POLL_OPTIONS, POLL_VOTES, POLLS};
use portal::models::{PollDraft, Role};
use portal::services::polls::{PollService, VoteOutcome};

fn options(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn test_toggling_twice_leaves_no_vote() {
    let api = Arc::new(FakeBackend::new());
    let polls = PollService::new(api.clone());
    let me = profile(Role::Staff);

    let summary = polls
        .create(PollDraft::new("Horário da reunião geral?"), &options(&["8h", "14h"]), &me)
        .await
        .unwrap();
    let option = summary.options[0].option.id;

    assert_eq!(
        polls.toggle_vote(&summary.poll, option, me.id).await.unwrap(),
        VoteOutcome::Cast
    );
    assert_eq!(api.rows(POLL_VOTES).len(), 1);

    assert_eq!(
        polls.toggle_vote(&summary.poll, option, me.id).await.unwrap(),
        VoteOutcome::Withdrawn
    );
    assert!(api.rows(POLL_VOTES).is_empty());

    let after = polls.summary(summary.poll.id, me.id).await.unwrap();
    assert_eq!(after.total_votes(), 0);
    assert!(after.options.iter().all(|tally| !tally.mine));
}

#[tokio::test]
async fn test_votes_on_different_options_coexist() {
    let api = Arc::new(FakeBackend::new());
    let polls = PollService::new(api.clone());
    let me = profile(Role::Psychologist);
    let other = profile(Role::Staff);

    let summary = polls
        .create(PollDraft::new("Temas do próximo treinamento"), &options(&["TEA", "TDAH", "Fala"]), &me)
        .await
        .unwrap();
    let [tea, tdah, _] = [0, 1, 2].map(|i| summary.options[i].option.id);

    polls.toggle_vote(&summary.poll, tea, me.id).await.unwrap();
    polls.toggle_vote(&summary.poll, tdah, me.id).await.unwrap();
    polls.toggle_vote(&summary.poll, tea, other.id).await.unwrap();

    let tally = polls.summary(summary.poll.id, me.id).await.unwrap();
    assert_eq!(tally.total_votes(), 3);
    assert_eq!(tally.options[0].votes, 2);
    assert!(tally.options[0].mine);
    assert!(tally.options[1].mine);
    assert!(!tally.options[2].mine);
}

#[tokio::test]
async fn test_closed_poll_rejects_votes_locally() {
    let api = Arc::new(FakeBackend::new());
    let polls = PollService::new(api.clone());
    let me = profile(Role::Admin);

    let summary = polls
        .create(PollDraft::new("Confraternização?"), &options(&["Sim", "Não"]), &me)
        .await
        .unwrap();
    let closed = polls.close(summary.poll.id, &me).await.unwrap();
    assert!(!closed.active);

    api.reset_calls();
    let err = polls
        .toggle_vote(&closed, summary.options[0].option.id, me.id)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn test_create_needs_two_distinct_options() {
    let api = Arc::new(FakeBackend::new());
    let polls = PollService::new(api.clone());
    let me = profile(Role::Staff);

    for choices in [vec!["Sim"], vec!["Sim", "sim"], vec!["Sim", "  "]] {
        let result = polls
            .create(PollDraft::new("Pergunta"), &options(&choices), &me)
            .await;
        assert!(result.unwrap_err().is_validation());
    }
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn test_delete_removes_options_and_votes() {
    let api = Arc::new(FakeBackend::new());
    let polls = PollService::new(api.clone());
    let me = profile(Role::Admin);

    let summary = polls
        .create(PollDraft::new("Uniforme novo?"), &options(&["Azul", "Verde"]), &me)
        .await
        .unwrap();
    polls
        .toggle_vote(&summary.poll, summary.options[1].option.id, me.id)
        .await
        .unwrap();

    polls.delete(summary.poll.id, &me).await.unwrap();

    assert!(api.rows(POLLS).is_empty());
    assert!(api.rows(POLL_OPTIONS).is_empty());
    assert!(api.rows(POLL_VOTES).is_empty());
}

#[tokio::test]
async fn test_only_author_or_admin_manages_a_poll() {
    let api = Arc::new(FakeBackend::new());
    let polls = PollService::new(api.clone());
    let author = profile(Role::Staff);
    let colleague = profile(Role::Psychologist);
    let admin = profile(Role::Admin);

    let summary = polls
        .create(PollDraft::new("Reunião na sexta?"), &options(&["Sim", "Não"]), &author)
        .await
        .unwrap();
    let poll_id = summary.poll.id;

    api.reset_calls();
    let err = polls.close(poll_id, &colleague).await.unwrap_err();
    assert!(matches!(err, PortalError::Forbidden(_)));
    let err = polls.delete(poll_id, &colleague).await.unwrap_err();
    assert!(matches!(err, PortalError::Forbidden(_)));
    assert!(api.calls().iter().all(|call| call.starts_with("select")));
    assert_eq!(api.rows(POLLS).len(), 1);

    assert!(!polls.close(poll_id, &author).await.unwrap().active);
    polls.delete(poll_id, &admin).await.unwrap();
    assert!(api.rows(POLLS).is_empty());
}
