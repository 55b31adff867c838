//! Dispatch cycle: normalization, filtering and fan-out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use regex::Regex;

use chatops_bot::application::{Incoming, Listener};
use chatops_bot::domain::Message;

use crate::common::*;

fn capture(test: &TestBot, listener: Listener) -> Arc<Mutex<Vec<Message>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    test.bot
        .listen(listener.on_message(move |_, msg| {
            sink.lock().push(msg.clone());
            Ok(())
        }))
        .unwrap();
    seen
}

#[tokio::test]
async fn test_health_check_example() {
    let mut test = TestBot::connected().await;
    let (_handle, count) = test.count_messages(Listener::new().mentions_me_only().contains("health"));
    let seen = capture(&test, Listener::new().mentions_me_only());

    test.dispatch(message(ALICE_IM, ALICE, "health check")).await;
    assert_eq!(hits(&count), 1);
    assert!(seen.lock()[0].mentions_me);

    test.dispatch(message(GENERAL, ALICE, "health")).await;
    assert_eq!(hits(&count), 1);
}

#[tokio::test]
async fn test_private_message_always_mentions_me() {
    let mut test = TestBot::connected().await;
    let seen = capture(&test, Listener::new());

    test.dispatch(message(ALICE_IM, ALICE, "")).await;
    test.dispatch(message(ALICE_IM, ALICE, "nothing to see")).await;

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|m| m.mentions_me && m.is_private()));
}

#[tokio::test]
async fn test_self_mention_in_public_channel() {
    let mut test = TestBot::connected().await;
    let seen = capture(&test, Listener::new());

    test.dispatch(message(GENERAL, ALICE, &format!("<@{}> deploy", BOT_ID))).await;
    test.dispatch(message(GENERAL, ALICE, &format!("<@{}> deploy", BOB))).await;

    let seen = seen.lock();
    assert!(seen[0].mentions_me);
    assert!(!seen[1].mentions_me);
}

#[tokio::test]
async fn test_message_is_enriched_from_directory() {
    let mut test = TestBot::connected().await;
    let seen = capture(&test, Listener::new());

    test.dispatch(message(GENERAL, ALICE, "hi")).await;
    test.dispatch(message("CUNKNOWN", "UNKNOWN", "hi")).await;

    let seen = seen.lock();
    assert_eq!(seen[0].from_user.as_ref().unwrap().name, "alice");
    assert_eq!(seen[0].from_channel.as_ref().unwrap().name(), Some("general"));
    assert!(seen[1].from_user.is_none());
    assert!(seen[1].from_channel.is_none());
}

#[tokio::test]
async fn test_own_messages_ignored_unless_requested() {
    let mut test = TestBot::connected().await;
    let (_a, default_count) = test.count_messages(Listener::new());
    let (_b, mine_count) = test.count_messages(Listener::new().match_my_messages());

    test.dispatch(message(GENERAL, BOT_ID, "I said this")).await;

    assert_eq!(hits(&default_count), 0);
    assert_eq!(hits(&mine_count), 1);
}

#[tokio::test]
async fn test_pattern_captures_reach_handler() {
    let mut test = TestBot::connected().await;
    let seen = capture(
        &test,
        Listener::new().matches(Regex::new(r"deploy (\w+) to (\w+)").unwrap()),
    );

    test.dispatch(message(GENERAL, ALICE, "please deploy api to staging")).await;
    test.dispatch(message(GENERAL, ALICE, "no match here")).await;

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].match_group(1), Some("api"));
    assert_eq!(seen[0].match_group(2), Some("staging"));
}

#[tokio::test]
async fn test_allow_lists_by_name_or_id() {
    let mut test = TestBot::connected().await;
    let (_a, by_name) = test.count_messages(Listener::new().from_channels(["#general"]).from_users(["alice"]));
    let (_b, by_id) = test.count_messages(Listener::new().from_users([BOB]));

    test.dispatch(message(GENERAL, ALICE, "one")).await;
    test.dispatch(message(GENERAL, BOB, "two")).await;

    assert_eq!(hits(&by_name), 1);
    assert_eq!(hits(&by_id), 1);
}

#[tokio::test]
async fn test_n_listeners_n_invocations() {
    let mut test = TestBot::connected().await;
    let counts: Vec<_> = (0..8)
        .map(|_| test.count_messages(Listener::new()).1)
        .collect();

    test.dispatch(message(GENERAL, ALICE, "broadcast")).await;

    assert!(counts.iter().all(|c| hits(c) == 1));
}

#[tokio::test]
async fn test_deregistered_listener_never_sees_next_event() {
    let mut test = TestBot::connected().await;
    let (handle, count) = test.count_messages(Listener::new());

    test.dispatch(message(GENERAL, ALICE, "first")).await;
    handle.close();
    test.dispatch(message(GENERAL, ALICE, "second")).await;
    handle.close();
    test.dispatch(message(GENERAL, ALICE, "third")).await;

    assert_eq!(hits(&count), 1);
    assert!(test.dispatcher.registry().is_empty());
}

#[tokio::test]
async fn test_listener_registered_during_event_starts_next_cycle() {
    let mut test = TestBot::connected().await;
    let late = Arc::new(AtomicUsize::new(0));
    let spawned = Arc::new(AtomicUsize::new(0));

    let late_count = Arc::clone(&late);
    let spawn_count = Arc::clone(&spawned);
    test.bot
        .listen(Listener::new().contains("spawn").on_message(move |ctx, _| {
            let c = Arc::clone(&late_count);
            ctx.bot.listen(Listener::new().on_message(move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))?;
            spawn_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();

    test.dispatch(message(GENERAL, ALICE, "spawn")).await;
    assert_eq!(hits(&late), 0);

    test.dispatch(message(GENERAL, ALICE, "hello")).await;
    assert_eq!(hits(&late), 1);
    assert_eq!(hits(&spawned), 1);
}

#[tokio::test]
async fn test_handler_closing_itself() {
    let mut test = TestBot::connected().await;
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    test.bot
        .listen(Listener::new().on_message(move |ctx, _| {
            c.fetch_add(1, Ordering::SeqCst);
            ctx.listener.close();
            Ok(())
        }))
        .unwrap();

    test.dispatch(message(GENERAL, ALICE, "once")).await;
    test.dispatch(message(GENERAL, ALICE, "twice")).await;

    assert_eq!(hits(&count), 1);
}

#[tokio::test]
async fn test_faults_are_isolated() {
    let mut test = TestBot::connected().await;
    test.bot
        .listen(Listener::new().on_message(|_, msg| {
            if msg.text == "boom" {
                panic!("plugin bug");
            }
            Ok(())
        }))
        .unwrap();
    let (_handle, count) = test.count_messages(Listener::new());

    test.dispatch(message(GENERAL, ALICE, "boom")).await;
    test.dispatch(message(GENERAL, ALICE, "fine")).await;

    assert_eq!(hits(&count), 2);
    assert_eq!(test.dispatcher.registry().len(), 2);
}

#[tokio::test]
async fn test_generic_handler_gets_message_or_event() {
    let mut test = TestBot::connected().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    test.bot
        .listen(Listener::new().on_event(move |_, incoming| {
            let label = match incoming {
                Incoming::Message(msg) => format!("message:{}", msg.text),
                Incoming::Event(event) => event.kind().to_string(),
            };
            sink.lock().push(label);
            Ok(())
        }))
        .unwrap();

    test.dispatch(message(GENERAL, ALICE, "hi")).await;
    test.dispatch(r#"{"type":"presence_change","user":"UALICE","presence":"active"}"#)
        .await;
    test.dispatch(r#"{"type":"error","error":{"code":2,"msg":"slow down"}}"#)
        .await;
    test.dispatch(r#"{"type":"team_join"}"#).await;

    assert_eq!(
        *seen.lock(),
        vec![
            "message:hi".to_string(),
            "presence_change".to_string(),
            "protocol_error".to_string(),
            "unknown".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_invalid_listener_rejected_synchronously() {
    let test = TestBot::connected().await;
    assert!(test.bot.listen(Listener::new().contains("x")).is_err());
    assert!(test
        .bot
        .listen(Listener::new().private_only().public_only().on_message(|_, _| Ok(())))
        .is_err());
    assert_eq!(test.dispatcher.registry().queues().pending(), (0, 0));
}
