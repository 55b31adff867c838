//! Managed listeners: deadlines, resets, explicit close, capacity and shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use chatops_bot::application::{Listener, ListenerState};
use chatops_bot::shared::BotError;

use crate::common::*;

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[tokio::test(start_paused = true)]
async fn test_timeout_runs_handler_then_removes() {
    let mut test = TestBot::connected().await;
    let timeouts = Arc::new(AtomicUsize::new(0));
    let t = Arc::clone(&timeouts);
    let (handle, count) = test.count_messages(
        Listener::new()
            .listen_duration(secs(30))
            .on_timeout(move |ctx| {
                assert!(!ctx.listener.is_closed());
                t.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
    );
    assert!(handle.is_managed());

    test.dispatch(message(GENERAL, ALICE, "inside the window")).await;
    assert_eq!(hits(&count), 1);

    sleep(secs(31)).await;
    assert_eq!(hits(&timeouts), 1);
    assert_eq!(handle.state(), ListenerState::Closing);

    test.dispatch(message(GENERAL, ALICE, "too late")).await;
    assert_eq!(hits(&count), 1);
    assert_eq!(handle.state(), ListenerState::Removed);
    assert!(test.dispatcher.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reset_duration_extends_deadline() {
    let mut test = TestBot::connected().await;
    let (handle, _count) = test.count_messages(Listener::new().listen_duration(secs(10)));
    test.dispatch(message(GENERAL, ALICE, "activate")).await;

    sleep(secs(8)).await;
    handle.reset_duration();

    sleep(secs(7)).await;
    assert!(!handle.is_closed(), "deadline should have moved to t=18s");

    sleep(secs(4)).await;
    assert!(handle.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_reset_new_duration() {
    let test = TestBot::connected().await;
    let (handle, _count) = test.count_messages(Listener::new().listen_duration(secs(5)));

    handle.reset_new_duration(secs(60));
    sleep(secs(30)).await;
    assert!(!handle.is_closed());

    handle.reset_new_duration(secs(1));
    sleep(secs(2)).await;
    assert!(handle.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_listen_until_deadline() {
    let test = TestBot::connected().await;
    let (handle, _count) =
        test.count_messages(Listener::new().listen_until(Instant::now() + secs(3)));

    sleep(secs(2)).await;
    assert!(!handle.is_closed());
    sleep(secs(2)).await;
    assert!(handle.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_explicit_close_skips_timeout_handler() {
    let mut test = TestBot::connected().await;
    let timeouts = Arc::new(AtomicUsize::new(0));
    let t = Arc::clone(&timeouts);
    let (handle, count) = test.count_messages(
        Listener::new()
            .listen_duration(secs(30))
            .on_timeout(move |_| {
                t.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
    );
    test.dispatch(message(GENERAL, ALICE, "one")).await;

    handle.close();
    assert_eq!(handle.state(), ListenerState::Closing);
    test.dispatch(message(GENERAL, ALICE, "two")).await;
    assert_eq!(hits(&count), 1);

    sleep(secs(60)).await;
    test.dispatch(message(GENERAL, ALICE, "three")).await;
    assert_eq!(hits(&timeouts), 0);
    assert_eq!(handle.state(), ListenerState::Removed);
    assert_eq!(test.bot.managed_workers().0, 0);
}

#[tokio::test(start_paused = true)]
async fn test_worker_pool_is_bounded() {
    let mut config = settings();
    config.dispatch.max_managed_listeners = 2;
    let mut test = TestBot::connected_with(config).await;

    let (first, _) = test.count_messages(Listener::new().listen_duration(secs(10)));
    let (_second, _) = test.count_messages(Listener::new().listen_duration(secs(10)));
    let third = test.bot.listen(
        Listener::new()
            .listen_duration(secs(10))
            .on_message(|_, _| Ok(())),
    );
    assert!(matches!(third, Err(BotError::ListenerCapacity(2))));

    // Unmanaged listeners are not limited
    test.count_messages(Listener::new());

    first.close();
    sleep(Duration::from_millis(1)).await;
    test.dispatch(message(GENERAL, ALICE, "drain")).await;
    assert!(test
        .bot
        .listen(
            Listener::new()
                .listen_duration(secs(10))
                .on_message(|_, _| Ok(()))
        )
        .is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_workers() {
    let mut test = TestBot::connected().await;
    let (handle, _count) = test.count_messages(Listener::new().listen_duration(secs(300)));
    test.dispatch(message(GENERAL, ALICE, "activate")).await;

    test.bot.shutdown();
    sleep(Duration::from_millis(1)).await;
    assert_eq!(test.bot.managed_workers().0, 0);

    test.dispatch(message(GENERAL, ALICE, "after shutdown")).await;
    assert_eq!(handle.state(), ListenerState::Removed);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_handler_may_reply() {
    let mut test = TestBot::connected().await;
    let _sender = test.dispatcher.spawn_sender();
    test.bot
        .listen(
            Listener::new()
                .listen_duration(secs(5))
                .on_message(|_, _| Ok(()))
                .on_timeout(|ctx| {
                    ctx.bot.send_to_channel("general", "nobody answered")?;
                    Ok(())
                }),
        )
        .unwrap();

    sleep(secs(6)).await;
    test.dispatch(message(GENERAL, ALICE, "tick")).await;
    sleep(Duration::from_millis(50)).await;

    assert_eq!(test.client.sent_texts(), vec!["nobody answered".to_string()]);
}
