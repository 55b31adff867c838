//! Reaction overlays and reply handles.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use chatops_bot::application::{Listener, ReactionListener};
use chatops_bot::domain::{ReactionEvent, ReactionKind, ReactionTarget};

use crate::common::*;

fn recording(overlay: ReactionListener) -> (ReactionListener, Arc<Mutex<Vec<ReactionEvent>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let overlay = overlay.on_reaction(move |_, reaction| {
        sink.lock().push(reaction.clone());
        Ok(())
    });
    (overlay, seen)
}

#[tokio::test]
async fn test_reply_then_reaction_example() {
    let mut test = TestBot::connected().await;
    let _sender = test.dispatcher.spawn_sender();

    let reply = test.bot.send_to_channel("#general", "deploy api?").unwrap();
    let sent = reply.delivered().await.unwrap();
    assert_eq!(sent.channel, GENERAL);

    let (overlay, seen) = recording(ReactionListener::new());
    reply.listen_reaction(overlay).await.unwrap();

    test.dispatch(reaction_added(BOT_ID, "+1", GENERAL, sent.ts.as_str())).await;
    assert!(seen.lock().is_empty());

    test.dispatch(reaction_added(ALICE, "+1", GENERAL, sent.ts.as_str())).await;
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].user, ALICE);
    assert_eq!(seen[0].emoji, "+1");
}

#[tokio::test]
async fn test_overlay_only_sees_its_target() {
    let mut test = TestBot::connected().await;
    let (overlay, seen) = recording(ReactionListener::new());
    test.bot
        .listen_reaction(ReactionTarget::Message("1700000000.000001".into()), overlay)
        .unwrap();

    test.dispatch(reaction_added(ALICE, "eyes", GENERAL, "1700000000.000002")).await;
    test.dispatch(reaction_added(ALICE, "eyes", GENERAL, "1700000000.000001")).await;
    test.dispatch(r#"{"type":"reaction_added","user":"UALICE","reaction":"eyes","item":{"type":"file","file":"F1"}}"#).await;

    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn test_file_target() {
    let mut test = TestBot::connected().await;
    let (overlay, seen) = recording(ReactionListener::new());
    test.bot
        .listen_reaction(ReactionTarget::File("F1".into()), overlay)
        .unwrap();

    test.dispatch(r#"{"type":"reaction_added","user":"UBOB","reaction":"tada","item":{"type":"file","file":"F1"}}"#).await;
    test.dispatch(r#"{"type":"reaction_added","user":"UBOB","reaction":"tada","item":{"type":"file_comment","file":"F1","file_comment":"Fc1"}}"#).await;
    test.dispatch(r#"{"type":"reaction_added","user":"UBOB","reaction":"tada","item":{"type":"file","file":"F2"}}"#).await;

    assert_eq!(seen.lock().len(), 2);
}

#[tokio::test]
async fn test_secondary_predicate() {
    let mut test = TestBot::connected().await;
    let ts = "1700000000.000009";
    let (overlay, seen) = recording(
        ReactionListener::new()
            .emojis(["white_check_mark"])
            .from_users([BOB])
            .only(ReactionKind::Added),
    );
    test.bot
        .listen_reaction(ReactionTarget::Message(ts.into()), overlay)
        .unwrap();

    test.dispatch(reaction_added(ALICE, "white_check_mark", GENERAL, ts)).await;
    test.dispatch(reaction_added(BOB, "x", GENERAL, ts)).await;
    test.dispatch(format!(
        r#"{{"type":"reaction_removed","user":"UBOB","reaction":"white_check_mark","item":{{"type":"message","channel":"CGENERAL","ts":"{}"}}}}"#,
        ts
    ))
    .await;
    test.dispatch(reaction_added(BOB, "white_check_mark", GENERAL, ts)).await;

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, ReactionKind::Added);
}

#[tokio::test]
async fn test_overlay_ignores_messages() {
    let mut test = TestBot::connected().await;
    let (overlay, seen) = recording(ReactionListener::new());
    test.bot
        .listen_reaction(ReactionTarget::Message("1700000100.000100".into()), overlay)
        .unwrap();

    test.dispatch(message(GENERAL, ALICE, "not a reaction")).await;
    assert!(seen.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timed_overlay_expires() {
    let mut test = TestBot::connected().await;
    let ts = "1700000000.000003";
    let (overlay, seen) = recording(ReactionListener::new().listen_duration(Duration::from_secs(60)));
    let handle = test
        .bot
        .listen_reaction(ReactionTarget::Message(ts.into()), overlay)
        .unwrap();

    test.dispatch(reaction_added(ALICE, "one", GENERAL, ts)).await;
    tokio::time::sleep(Duration::from_secs(61)).await;
    test.dispatch(reaction_added(ALICE, "two", GENERAL, ts)).await;

    assert_eq!(seen.lock().len(), 1);
    assert!(handle.is_closed());
}

#[tokio::test]
async fn test_overlay_and_plain_listener_share_registry() {
    let mut test = TestBot::connected().await;
    let (overlay, _seen) = recording(ReactionListener::new());
    test.bot
        .listen_reaction(ReactionTarget::Message("1.0".into()), overlay)
        .unwrap();
    test.count_messages(Listener::new());

    test.dispatch(message(GENERAL, ALICE, "hello")).await;
    assert_eq!(test.dispatcher.registry().len(), 2);
}

#[tokio::test]
async fn test_reply_add_reaction() {
    let mut test = TestBot::connected().await;
    let _sender = test.dispatcher.spawn_sender();

    let reply = test.bot.send_outgoing_message("build finished", GENERAL).unwrap();
    let delivery = reply.add_reaction(":rocket:").await.unwrap();
    delivery.wait(Duration::from_secs(5)).await.unwrap();

    let reactions = test.client.reactions.lock();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0].0, "rocket");
    assert_eq!(
        reactions[0].1,
        chatops_bot::domain::ReactionItem::message(GENERAL, "1700000000.000001")
    );
}
