use std::sync::Once;
use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use readsync_core::{
    update, Author, AwardKey, Banner, Effect, Msg, MutationRequest, ScreenState,
};
use serde_json::{json, Value};

const ITEM: &str = "book-1";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 10, minute, 0).unwrap()
}

fn record(id: u64, text: &str) -> Value {
    json!({
        "id": id,
        "review_text": text,
        "user": {"id": 7, "username": "ada"},
        "added_date": "2025-05-01T09:00:00Z",
        "updated_at": "2025-05-01T09:00:00Z",
    })
}

fn opened(body: Value) -> ScreenState {
    let state = ScreenState::new().with_viewer(Author::new("7", "ada"));
    let (state, effects) = update(
        state,
        Msg::ItemOpened {
            item: ITEM.to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::FetchDiscussion {
            item: ITEM.to_string(),
            reconcile: None,
        }]
    );
    let (state, effects) = update(
        state,
        Msg::DiscussionLoaded {
            item: ITEM.to_string(),
            reconcile: None,
            body,
            received_at: at(0),
        },
    );
    assert!(effects.is_empty());
    state
}

fn ids(state: &ScreenState) -> Vec<(usize, String)> {
    state
        .view()
        .nodes
        .into_iter()
        .map(|row| (row.depth, row.id))
        .collect()
}

fn row(depth: usize, id: &str) -> (usize, String) {
    (depth, id.to_string())
}

fn shown_banner(state: ScreenState) -> (ScreenState, Option<Banner>) {
    let (state, _) = update(
        state,
        Msg::Tick {
            now: Instant::now(),
        },
    );
    let banner = state.view().banner;
    (state, banner)
}

fn confirm(state: ScreenState, mutation_id: u64, body: Value) -> (ScreenState, Vec<Effect>) {
    update(
        state,
        Msg::MutationConfirmed {
            mutation_id,
            body,
            received_at: at(5),
        },
    )
}

#[test]
fn reply_chain_nests_and_delete_takes_subtree() {
    init_logging();
    let state = opened(json!([record(1, "A")]));

    let (state, effects) = update(
        state,
        Msg::PostReply {
            parent_id: "1".into(),
            text: "B".into(),
            at: at(1),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::SendMutation {
            mutation_id: 1,
            item: ITEM.to_string(),
            request: MutationRequest::Reply {
                parent_id: "1".into(),
                text: "B".into(),
            },
        }]
    );
    let view = state.view();
    assert!(view.saving);
    assert!(view.nodes[1].provisional);
    assert_eq!(view.nodes[1].author, "ada");

    let (state, _) = confirm(state, 1, record(2, "B"));
    let (state, _) = update(
        state,
        Msg::PostReply {
            parent_id: "2".into(),
            text: "C".into(),
            at: at(2),
        },
    );
    let (state, _) = confirm(state, 2, record(3, "C"));
    assert_eq!(ids(&state), vec![row(0, "1"), row(1, "2"), row(2, "3")]);
    assert!(!state.view().saving);

    let (state, effects) = update(
        state,
        Msg::DeleteRequested {
            node_id: "2".into(),
            at: at(3),
        },
    );
    assert_eq!(effects.len(), 1);
    assert_eq!(ids(&state), vec![row(0, "1")]);

    let (state, effects) = confirm(state, 3, json!({}));
    assert!(effects.is_empty());
    assert_eq!(ids(&state), vec![row(0, "1")]);
    assert!(!state.mutation_in_flight());
}

#[test]
fn reply_to_missing_parent_leaves_tree_and_reports() {
    init_logging();
    let state = opened(json!([record(1, "A")]));
    let before = state.tree().clone();

    let (state, effects) = update(
        state,
        Msg::PostReply {
            parent_id: "99".into(),
            text: "orphan".into(),
            at: at(1),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.tree(), &before);
    assert!(!state.mutation_in_flight());
    let (_, banner) = shown_banner(state);
    assert_eq!(
        banner,
        Some(Banner::Error {
            message: "node 99 not found in discussion tree".into(),
        })
    );
}

#[test]
fn failed_post_that_landed_adopts_refetched_tree() {
    init_logging();
    let state = opened(json!([record(1, "A")]));
    let (state, _) = update(
        state,
        Msg::PostRoot {
            text: "B".into(),
            at: at(1),
        },
    );

    let (state, effects) = update(
        state,
        Msg::MutationFailed {
            mutation_id: 1,
            message: "response body truncated".into(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::FetchDiscussion {
            item: ITEM.to_string(),
            reconcile: Some(1),
        }]
    );
    assert!(state.view().saving);

    let (state, effects) = update(
        state,
        Msg::DiscussionLoaded {
            item: ITEM.to_string(),
            reconcile: Some(1),
            body: json!([record(1, "A"), record(5, "B")]),
            received_at: at(2),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(ids(&state), vec![row(0, "1"), row(0, "5")]);
    let view = state.view();
    assert!(!view.saving);
    assert_eq!(view.pending_banners, 0);
}

#[test]
fn failed_post_that_did_not_land_rolls_back() {
    init_logging();
    let state = opened(json!([record(1, "A")]));
    let (state, _) = update(
        state,
        Msg::PostRoot {
            text: "B".into(),
            at: at(1),
        },
    );
    assert_eq!(ids(&state), vec![row(0, "1"), row(0, "local-1")]);

    let (state, _) = update(
        state,
        Msg::MutationFailed {
            mutation_id: 1,
            message: "connection reset".into(),
        },
    );
    let (state, _) = update(
        state,
        Msg::DiscussionLoaded {
            item: ITEM.to_string(),
            reconcile: Some(1),
            body: json!([record(1, "A")]),
            received_at: at(2),
        },
    );

    assert_eq!(ids(&state), vec![row(0, "1")]);
    let (_, banner) = shown_banner(state);
    assert_eq!(
        banner,
        Some(Banner::Error {
            message: "Could not save your change".into(),
        })
    );
}

#[test]
fn refetch_failure_restores_baseline() {
    init_logging();
    let state = opened(json!([record(1, "A"), record(2, "B")]));
    let (state, _) = update(
        state,
        Msg::DeleteRequested {
            node_id: "2".into(),
            at: at(1),
        },
    );
    let (state, _) = update(
        state,
        Msg::MutationFailed {
            mutation_id: 1,
            message: "timeout".into(),
        },
    );
    let (state, _) = update(
        state,
        Msg::DiscussionFailed {
            item: ITEM.to_string(),
            reconcile: Some(1),
            message: "offline".into(),
        },
    );

    assert_eq!(ids(&state), vec![row(0, "1"), row(0, "2")]);
    assert!(!state.mutation_in_flight());
}

fn post_then_reload(reload: Value) -> ScreenState {
    let state = opened(json!([record(1, "A")]));
    let (state, _) = update(
        state,
        Msg::PostRoot {
            text: "B".into(),
            at: at(1),
        },
    );
    let (state, _) = update(state, Msg::RefreshRequested);
    let (state, effects) = update(
        state,
        Msg::DiscussionLoaded {
            item: ITEM.to_string(),
            reconcile: None,
            body: reload,
            received_at: at(2),
        },
    );
    assert!(effects.is_empty());
    let (state, effects) = update(
        state,
        Msg::MutationFailed {
            mutation_id: 1,
            message: "connection reset".into(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::FetchDiscussion {
            item: ITEM.to_string(),
            reconcile: Some(1),
        }]
    );
    state
}

#[test]
fn post_seen_in_reload_still_counts_as_landed() {
    init_logging();
    let state = post_then_reload(json!([record(1, "A"), record(5, "B")]));
    let (state, _) = update(
        state,
        Msg::DiscussionLoaded {
            item: ITEM.to_string(),
            reconcile: Some(1),
            body: json!([record(1, "A"), record(5, "B")]),
            received_at: at(3),
        },
    );

    assert_eq!(ids(&state), vec![row(0, "1"), row(0, "5")]);
    assert!(!state.mutation_in_flight());
    let (_, banner) = shown_banner(state);
    assert_eq!(banner, None);
}

#[test]
fn refetch_failure_after_reload_keeps_the_fresher_tree() {
    init_logging();
    let state = post_then_reload(json!([record(1, "A"), record(2, "other reader")]));
    let (state, _) = update(
        state,
        Msg::DiscussionFailed {
            item: ITEM.to_string(),
            reconcile: Some(1),
            message: "offline".into(),
        },
    );

    assert_eq!(ids(&state), vec![row(0, "1"), row(0, "2")]);
    assert!(!state.mutation_in_flight());
}

#[test]
fn edit_that_landed_is_detected_by_text() {
    init_logging();
    let state = opened(json!([record(1, "first draft")]));
    let (state, _) = update(
        state,
        Msg::EditRequested {
            node_id: "1".into(),
            text: "second draft".into(),
            at: at(1),
        },
    );
    assert_eq!(state.view().nodes[0].text, "second draft");
    assert!(state.view().nodes[0].edited);

    let (state, _) = update(
        state,
        Msg::MutationFailed {
            mutation_id: 1,
            message: "timeout".into(),
        },
    );
    let (state, _) = update(
        state,
        Msg::DiscussionLoaded {
            item: ITEM.to_string(),
            reconcile: Some(1),
            body: json!([record(1, "second draft")]),
            received_at: at(2),
        },
    );

    assert_eq!(state.view().nodes[0].text, "second draft");
    assert_eq!(state.view().pending_banners, 0);
}

#[test]
fn second_mutation_waits_for_the_first() {
    init_logging();
    let state = opened(json!([]));
    let (state, first) = update(
        state,
        Msg::PostRoot {
            text: "one".into(),
            at: at(1),
        },
    );
    let (state, second) = update(
        state,
        Msg::PostRoot {
            text: "two".into(),
            at: at(1),
        },
    );

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert_eq!(state.tree().node_count(), 1);
}

#[test]
fn blank_text_is_rejected() {
    init_logging();
    let state = opened(json!([]));
    let (state, effects) = update(
        state,
        Msg::PostRoot {
            text: "   ".into(),
            at: at(1),
        },
    );

    assert!(effects.is_empty());
    assert!(state.tree().is_empty());
    assert_eq!(state.view().pending_banners, 1);
}

#[test]
fn echo_reward_is_granted_once_per_fact() {
    init_logging();
    let state = opened(json!([]));
    let (state, _) = update(
        state,
        Msg::PostRoot {
            text: "B".into(),
            at: at(1),
        },
    );
    let (state, effects) = confirm(
        state,
        1,
        json!({"review": record(5, "B"), "points_earned": 10}),
    );

    let key = AwardKey::new(ITEM, "review_posted");
    assert_eq!(effects, vec![Effect::PersistAward { key: key.clone() }]);
    assert!(state.ledger().contains(&key));
    assert_eq!(ids(&state), vec![row(0, "5")]);

    let (state, _) = update(
        state,
        Msg::PostRoot {
            text: "C".into(),
            at: at(2),
        },
    );
    let (state, effects) = confirm(
        state,
        2,
        json!({"review": record(6, "C"), "notification": {"show": true, "points": 10}}),
    );
    assert!(effects.is_empty());
    assert_eq!(state.ledger().len(), 1);

    // A late duplicate confirmation changes nothing.
    let (next, effects) = confirm(state.clone(), 2, record(6, "C"));
    assert!(effects.is_empty());
    assert_eq!(next.tree(), state.tree());
}

#[test]
fn reload_during_pending_post_keeps_the_provisional_node() {
    init_logging();
    let state = opened(json!([record(1, "A")]));
    let (state, _) = update(
        state,
        Msg::PostRoot {
            text: "mine".into(),
            at: at(1),
        },
    );
    let (state, effects) = update(state, Msg::RefreshRequested);
    assert_eq!(effects.len(), 1);

    let (state, _) = update(
        state,
        Msg::DiscussionLoaded {
            item: ITEM.to_string(),
            reconcile: None,
            body: json!({"results": [record(1, "A"), record(2, "theirs")]}),
            received_at: at(2),
        },
    );

    assert_eq!(
        ids(&state),
        vec![row(0, "1"), row(0, "2"), row(0, "local-1")]
    );
    assert!(state.mutation_in_flight());
}

#[test]
fn discussion_for_another_item_is_ignored() {
    init_logging();
    let state = opened(json!([record(1, "A")]));
    let (next, _) = update(
        state.clone(),
        Msg::DiscussionLoaded {
            item: "book-2".into(),
            reconcile: None,
            body: json!([]),
            received_at: at(1),
        },
    );

    assert_eq!(next.tree(), state.tree());
}

#[test]
fn unparseable_discussion_surfaces_an_error() {
    init_logging();
    let state = opened(json!([record(1, "A")]));
    let (state, _) = update(
        state,
        Msg::DiscussionLoaded {
            item: ITEM.to_string(),
            reconcile: None,
            body: json!("<html>oops</html>"),
            received_at: at(1),
        },
    );

    assert_eq!(ids(&state), vec![row(0, "1")]);
    let (_, banner) = shown_banner(state);
    assert!(matches!(banner, Some(Banner::Error { .. })));
}
