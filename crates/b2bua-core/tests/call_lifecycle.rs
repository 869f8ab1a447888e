//! Call lifecycle tests: registration scope, teardown outcomes, cleanup

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use rvoip_b2bua_core::{
    handler_fn, CallHandler, CallLifecycle, DialogRouter, DialogState, DialogStore,
    MemoryDialogStore, SipMethod, TeardownOutcome, UnimplementedCallHandler,
};
use rvoip_rtpengine_core::RelayAction;

fn stores() -> (Arc<MemoryDialogStore>, Arc<MemoryDialogStore>) {
    (
        Arc::new(MemoryDialogStore::new("server")),
        Arc::new(MemoryDialogStore::new("client")),
    )
}

/// Answers without media and returns straight away
fn answering() -> Arc<dyn CallHandler> {
    Arc::new(handler_fn(|dialog| async move {
        let _ = dialog.answer(None).await;
    }))
}

#[tokio::test]
async fn test_dialog_registered_only_while_handler_runs() {
    let (server, client) = stores();
    let signaling = ScriptedSignaling::new(ByeBehavior::Succeed);
    let dialog = new_server_dialog("call-1", services(RecordingRelay::new(), signaling.clone()));

    // Panics inside the handler are caught, so record what it observed
    let registered = Arc::new(AtomicBool::new(false));
    let handler = handler_fn({
        let store = server.clone();
        let registered = registered.clone();
        move |dialog| {
            let store = store.clone();
            let registered = registered.clone();
            async move {
                let active = dialog.state() == DialogState::Active;
                let stored = store.load(dialog.id()).is_some();
                registered.store(active && stored, Ordering::SeqCst);
                let _ = dialog.answer(None).await;
            }
        }
    });
    let lifecycle = CallLifecycle::new(server.clone(), Arc::new(handler));

    let outcome = lifecycle.run(dialog.clone()).await;

    assert!(registered.load(Ordering::SeqCst));
    assert_eq!(outcome, TeardownOutcome::Completed);
    assert_eq!(signaling.byes_sent(), 1);
    assert_eq!(dialog.state(), DialogState::Closed);
    assert!(dialog.media().is_closed());
    assert_eq!(server.len(), 0);

    // Late BYE from the caller no longer matches anything
    let router = DialogRouter::new(server, client);
    let err = router.route(&from_peer(SipMethod::Bye, &dialog)).unwrap_err();
    assert_eq!(err.status().as_u16(), 481);
}

#[tokio::test]
async fn test_peer_bye_skips_our_hangup() {
    let (server, client) = stores();
    let signaling = ScriptedSignaling::new(ByeBehavior::Succeed);
    let dialog = new_server_dialog("call-2", services(RecordingRelay::new(), signaling.clone()));

    let handler = handler_fn(|dialog| async move { dialog.context().cancelled().await });
    let lifecycle = CallLifecycle::new(server.clone(), Arc::new(handler));
    let call = tokio::spawn({
        let dialog = dialog.clone();
        async move { lifecycle.run(dialog).await }
    });

    wait_for(|| server.len() == 1).await;
    let router = DialogRouter::new(server.clone(), client);
    let bye = from_peer(SipMethod::Bye, &dialog);
    let matched = router.route(&bye).unwrap();
    let tx = RecordingTransaction::new();
    matched.dialog.read_bye(&bye, tx.as_ref()).await.unwrap();

    let outcome = call.await.unwrap();
    assert_eq!(outcome, TeardownOutcome::AlreadyEnded);
    assert_eq!(tx.statuses(), vec![200]);
    assert_eq!(signaling.byes_sent(), 0);
    assert_eq!(server.len(), 0);
}

#[tokio::test]
async fn test_stalled_hangup_times_out() {
    let (server, _) = stores();
    let signaling = ScriptedSignaling::new(ByeBehavior::Stall);
    let dialog = new_server_dialog("call-3", services(RecordingRelay::new(), signaling.clone()));

    let lifecycle = CallLifecycle::new(server.clone(), answering())
        .with_teardown_timeout(Duration::from_millis(50));

    let outcome = lifecycle.run(dialog.clone()).await;

    assert_eq!(outcome, TeardownOutcome::TimedOut);
    assert_eq!(signaling.byes_sent(), 1);
    assert!(dialog.is_ended());
    assert_eq!(server.len(), 0);
}

#[tokio::test]
async fn test_failed_hangup_still_cleans_up() {
    let (server, _) = stores();
    let signaling = ScriptedSignaling::new(ByeBehavior::Fail);
    let dialog = new_server_dialog("call-4", services(RecordingRelay::new(), signaling));

    let lifecycle = CallLifecycle::new(server.clone(), answering());
    let outcome = lifecycle.run(dialog.clone()).await;

    assert_eq!(outcome, TeardownOutcome::Failed);
    assert!(dialog.is_ended());
    assert!(dialog.media().is_closed());
    assert_eq!(server.len(), 0);
}

#[tokio::test]
async fn test_panicking_handler_is_deregistered() {
    let (server, _) = stores();
    let signaling = ScriptedSignaling::new(ByeBehavior::Succeed);
    let (dialog, invite_tx) = new_server_call("call-5", services(RecordingRelay::new(), signaling.clone()));

    let handler = handler_fn(|_dialog| async move { panic!("handler bug") });
    let lifecycle = CallLifecycle::new(server.clone(), Arc::new(handler));

    let outcome = lifecycle.run(dialog).await;

    assert_eq!(outcome, TeardownOutcome::Completed);
    assert_eq!(invite_tx.statuses(), vec![480]);
    assert_eq!(signaling.byes_sent(), 0);
    assert_eq!(server.len(), 0);
}

#[tokio::test]
async fn test_unanswered_call_is_rejected_without_bye() {
    let (server, _) = stores();
    let signaling = ScriptedSignaling::new(ByeBehavior::Succeed);
    let (dialog, invite_tx) = new_server_call("call-8", services(RecordingRelay::new(), signaling.clone()));

    let lifecycle = CallLifecycle::new(server.clone(), Arc::new(UnimplementedCallHandler));
    let outcome = lifecycle.run(dialog.clone()).await;

    assert_eq!(outcome, TeardownOutcome::Completed);
    assert_eq!(invite_tx.statuses(), vec![480]);
    assert_eq!(invite_tx.responses()[0].reason, "Temporarily Unavailable");
    assert_eq!(signaling.byes_sent(), 0);
    assert_eq!(dialog.state(), DialogState::Closed);
    assert!(dialog.media().is_closed());
    assert_eq!(server.len(), 0);

    // Hanging up again is refused and sends nothing
    assert!(dialog.hangup().await.is_err());
    assert_eq!(invite_tx.statuses(), vec![480]);
}

#[tokio::test]
async fn test_answered_call_is_ended_with_bye() {
    let (server, _) = stores();
    let signaling = ScriptedSignaling::new(ByeBehavior::Succeed);
    let (dialog, invite_tx) = new_server_call("call-9", services(RecordingRelay::new(), signaling.clone()));

    let outcome = CallLifecycle::new(server, answering()).run(dialog).await;

    assert_eq!(outcome, TeardownOutcome::Completed);
    assert_eq!(invite_tx.statuses(), vec![200]);
    assert_eq!(signaling.byes_sent(), 1);
}

#[tokio::test]
async fn test_teardown_of_ended_call_does_nothing() {
    let (server, _) = stores();
    let signaling = ScriptedSignaling::new(ByeBehavior::Succeed);
    let dialog = new_server_dialog("call-6", services(RecordingRelay::new(), signaling.clone()));
    let lifecycle = CallLifecycle::new(server, Arc::new(UnimplementedCallHandler));

    dialog.read_bye(&from_peer(SipMethod::Bye, &dialog), RecordingTransaction::new().as_ref())
        .await
        .unwrap();

    assert_eq!(lifecycle.teardown(&dialog).await, TeardownOutcome::AlreadyEnded);
    assert_eq!(signaling.byes_sent(), 0);
}

#[tokio::test]
async fn test_relay_session_deleted_after_call() {
    let (server, _) = stores();
    let relay = RecordingRelay::new();
    let dialog = new_server_dialog(
        "call-7",
        services(relay.clone(), ScriptedSignaling::new(ByeBehavior::Succeed)),
    );

    let handler: Arc<dyn CallHandler> = Arc::new(handler_fn(|dialog| async move {
        let offer = dialog.media().remote_sdp().unwrap();
        let local = dialog.offer_media(&offer).await.unwrap();
        dialog.answer(Some(local)).await.unwrap();
    }));
    let lifecycle = CallLifecycle::new(server, handler);

    lifecycle.run(dialog.clone()).await;

    let commands = relay.commands();
    let actions: Vec<_> = commands.iter().map(|c| c.action).collect();
    assert_eq!(actions, vec![RelayAction::Offer, RelayAction::Delete]);

    let delete = &commands[1];
    assert_eq!(delete.params.call_id, "call-7");
    assert_eq!(delete.params.from_tag, "caller-tag");
    assert_eq!(delete.params.to_tag.as_deref(), Some(dialog.local_tag()));
    assert!(delete.params.sdp.is_none());
    assert!(delete.flags.is_empty());
}
