//! Directory cache driven by connection and directory-change events.

use std::sync::atomic::Ordering;

use pretty_assertions::assert_eq;

use chatops_bot::domain::{ConversationKind, DirectorySnapshot, Presence, SelfIdentity};

use crate::common::*;

#[tokio::test]
async fn test_reload_replaces_instead_of_merging() {
    let mut test = TestBot::connected().await;
    assert_eq!(
        test.bot.directory().user_ids(),
        vec![ALICE.to_string(), BOB.to_string(), BOT_ID.to_string()]
    );

    *test.client.snapshot.lock() = DirectorySnapshot {
        myself: SelfIdentity {
            id: BOT_ID.into(),
            name: "opsbot".into(),
        },
        users: vec![user("UCAROL", "carol")],
        channels: vec![channel("COPS", "ops", true)],
        ..Default::default()
    };
    test.dispatch(connected()).await;

    let directory = test.bot.directory();
    assert_eq!(directory.user_ids(), vec!["UCAROL".to_string()]);
    assert_eq!(directory.channel_ids(), vec!["COPS".to_string()]);
    assert!(test.bot.get_user("alice").is_none());
    assert_eq!(test.client.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_identity_comes_from_snapshot() {
    let test = TestBot::connected().await;
    assert_eq!(test.bot.myself().id, BOT_ID);
    assert_eq!(test.bot.myself().name, "opsbot");
}

#[tokio::test]
async fn test_auto_join_skips_member_channels() {
    let mut config = settings();
    config.bot.join_channels = vec!["#general".into(), "#deploys".into()];
    let test = TestBot::connected_with(config).await;

    assert_eq!(*test.client.joined.lock(), vec!["deploys".to_string()]);
    let deploys = test.bot.get_channel_by_name("deploys").unwrap();
    assert!(deploys.is_member);
}

#[tokio::test]
async fn test_channel_lifecycle_events() {
    let mut test = TestBot::connected().await;

    test.dispatch(r#"{"type":"channel_created","channel":{"id":"CNEW","name":"incidents","created":1700000000,"creator":"UALICE"}}"#).await;
    assert!(test.bot.get_channel_by_name("#incidents").is_some());

    test.dispatch(r#"{"type":"channel_rename","channel":{"id":"CNEW","name":"sev1","created":1700000000}}"#).await;
    assert!(test.bot.get_channel_by_name("incidents").is_none());
    assert_eq!(test.bot.get_channel_by_name("sev1").unwrap().id, "CNEW");

    test.dispatch(r#"{"type":"channel_archive","channel":"CNEW","user":"UALICE"}"#).await;
    assert!(test.bot.directory().channel("CNEW").unwrap().is_archived);
    test.dispatch(r#"{"type":"channel_unarchive","channel":"CNEW","user":"UALICE"}"#).await;
    assert!(!test.bot.directory().channel("CNEW").unwrap().is_archived);

    test.dispatch(r#"{"type":"channel_deleted","channel":"CNEW"}"#).await;
    assert!(test.bot.directory().channel("CNEW").is_none());
}

#[tokio::test]
async fn test_group_and_im_events() {
    let mut test = TestBot::connected().await;

    test.dispatch(r#"{"type":"group_joined","channel":{"id":"GSEC","name":"security"}}"#).await;
    let group = test.bot.directory().channel("GSEC").unwrap();
    assert_eq!(group.kind(), ConversationKind::Group);
    assert!(group.is_member);

    test.dispatch(r#"{"type":"group_close","user":"UBOT","channel":"GSEC"}"#).await;
    assert!(test.bot.directory().channel("GSEC").is_none());

    test.dispatch(r#"{"type":"im_open","user":"UBOB","channel":"DBOB"}"#).await;
    assert_eq!(test.bot.get_im_channel_with(BOB).unwrap().id, "DBOB");

    test.dispatch(r#"{"type":"im_close","user":"UBOB","channel":"DBOB"}"#).await;
    assert!(test.bot.get_im_channel_with(BOB).is_none());
}

#[tokio::test]
async fn test_updates_of_unknown_ids_are_ignored() {
    let mut test = TestBot::connected().await;
    let before = test.bot.directory().channel_ids();

    test.dispatch(r#"{"type":"channel_rename","channel":{"id":"CMISSING","name":"ghost"}}"#).await;
    test.dispatch(r#"{"type":"channel_archive","channel":"CMISSING"}"#).await;

    assert_eq!(test.bot.directory().channel_ids(), before);
}

#[tokio::test]
async fn test_presence_and_user_change() {
    let mut test = TestBot::connected().await;

    test.dispatch(r#"{"type":"presence_change","user":"UBOB","presence":"active"}"#).await;
    assert_eq!(test.bot.get_user(BOB).unwrap().presence, Presence::Active);

    test.dispatch(r#"{"type":"user_change","user":{"id":"UBOB","name":"robert","profile":{"email":"bob@example.com"}}}"#).await;
    let bob = test.bot.get_user("bob@example.com").unwrap();
    assert_eq!(bob.name, "robert");
    assert_eq!(bob.presence, Presence::Active);
    assert!(test.bot.get_user("bob").is_none());
}

#[tokio::test]
async fn test_user_lookup_prefers_exact_id() {
    let mut test = TestBot::connected().await;
    test.dispatch(format!(
        r#"{{"type":"user_change","user":{{"id":"UZED","name":"{}"}}}}"#,
        ALICE
    ))
    .await;

    assert_eq!(test.bot.get_user(ALICE).unwrap().id, ALICE);
}
