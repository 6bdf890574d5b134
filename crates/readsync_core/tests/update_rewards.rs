use std::sync::Once;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use readsync_core::{
    apply_reward, update, Achievement, AwardKey, AwardLedger, Banner, Effect, Msg, Notification,
    NotificationKind, NotificationQueue, RewardEvent, RewardPayload, ScreenState,
};
use serde_json::json;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn finished(book: &str) -> AwardKey {
    AwardKey::new(book, "finished")
}

fn points(points: u32) -> RewardEvent {
    RewardEvent {
        notification: Notification {
            show: true,
            message: format!("You earned {points} points!"),
            kind: NotificationKind::Success,
            points,
        },
        achievements: Vec::new(),
    }
}

fn badge(name: &str) -> Achievement {
    Achievement {
        id: name.to_lowercase(),
        name: name.into(),
        description: String::new(),
        points: 50,
    }
}

#[test]
fn same_fact_is_rewarded_once_regardless_of_shape() {
    init_logging();
    let structured = RewardPayload::from_value(&json!({
        "notification": {"show": true, "message": "Nice!", "type": "success", "points": 20},
        "achievements": [{"id": 3, "name": "Bookworm", "description": "Finish a book", "points": 50}],
    }))
    .unwrap();
    let legacy = RewardPayload::from_value(&json!({"points_earned": 20})).unwrap();

    let (ledger, first) = apply_reward(AwardLedger::new(), structured, finished("b1"));
    let (ledger, second) = apply_reward(ledger, legacy, finished("b1"));

    let first = first.unwrap();
    assert_eq!(first.notification.points, 20);
    assert_eq!(first.achievements[0].id, "3");
    assert_eq!(second, None);
    assert_eq!(ledger.len(), 1);
}

#[test]
fn fact_is_reported_once_and_reward_persisted() {
    init_logging();
    let state = ScreenState::new();
    let (state, effects) = update(state, Msg::FactReported { key: finished("b1") });
    assert_eq!(effects, vec![Effect::ReportFact { key: finished("b1") }]);

    let (state, effects) = update(state, Msg::FactReported { key: finished("b1") });
    assert!(effects.is_empty());

    let (state, effects) = update(
        state,
        Msg::RewardReceived {
            key: finished("b1"),
            body: json!({"points_earned": 15, "achievement": {"name": "Finisher"}}),
        },
    );
    assert_eq!(effects, vec![Effect::PersistAward { key: finished("b1") }]);
    assert!(state.ledger().contains(&finished("b1")));

    let (state, effects) = update(state, Msg::FactReported { key: finished("b1") });
    assert!(effects.is_empty());

    // Achievement first, then the points banner.
    let now = Instant::now();
    let (state, _) = update(state, Msg::Tick { now });
    assert!(matches!(state.view().banner, Some(Banner::Achievement(_))));
    let (state, _) = update(state, Msg::BannerDismissed { now });
    assert!(matches!(
        state.view().banner,
        Some(Banner::Points { points: 15, .. })
    ));
}

#[test]
fn failed_report_can_be_retried() {
    init_logging();
    let (state, _) = update(ScreenState::new(), Msg::FactReported { key: finished("b2") });
    let (state, _) = update(
        state,
        Msg::RewardFailed {
            key: finished("b2"),
            message: "status 500".into(),
        },
    );
    let (_, effects) = update(state, Msg::FactReported { key: finished("b2") });
    assert_eq!(effects, vec![Effect::ReportFact { key: finished("b2") }]);
}

#[test]
fn body_without_reward_grants_nothing() {
    init_logging();
    let (state, _) = update(ScreenState::new(), Msg::FactReported { key: finished("b3") });
    let (state, effects) = update(
        state,
        Msg::RewardReceived {
            key: finished("b3"),
            body: json!({"status": "ok"}),
        },
    );
    assert!(effects.is_empty());
    assert!(state.ledger().is_empty());
}

#[test]
fn achievements_queue_behind_visible_banner_and_expire() {
    let interval = Duration::from_secs(3);
    let t0 = Instant::now();
    let mut queue = NotificationQueue::new(interval);

    queue.enqueue_event(&points(10));
    assert!(queue.tick(t0));

    queue.enqueue_event(&RewardEvent {
        notification: Notification {
            show: false,
            ..Notification::default()
        },
        achievements: vec![badge("Bookworm")],
    });
    queue.enqueue_event(&points(5));

    assert!(!queue.tick(t0 + Duration::from_secs(1)));
    assert!(matches!(
        queue.visible(),
        Some(Banner::Points { points: 10, .. })
    ));

    assert!(queue.tick(t0 + interval));
    assert_eq!(queue.visible(), Some(&Banner::Achievement(badge("Bookworm"))));

    assert!(queue.tick(t0 + interval * 2));
    assert!(matches!(queue.visible(), Some(Banner::Points { points: 5, .. })));

    assert!(queue.tick(t0 + interval * 3));
    assert_eq!(queue.visible(), None);
    assert_eq!(queue.pending(), 0);
}

#[test]
fn sign_out_clears_ledger() {
    init_logging();
    let restored: AwardLedger = [finished("b1"), finished("b2")].into_iter().collect();
    let (state, _) = update(ScreenState::new(), Msg::LedgerRestored(restored));
    assert_eq!(state.view().awarded_facts, 2);

    let (state, effects) = update(state, Msg::SignedOut);
    assert_eq!(effects, vec![Effect::ClearLedger]);
    assert!(state.ledger().is_empty());
}
