mod common;

use common::*;
use room_core::{PresenceChannel, RoomPolicy, RoomStore};
use room_types::{CloseReason, ParticipantId, RoomError, SessionNotice, SessionPhase};
use std::time::Duration;

#[tokio::test]
async fn test_create_room_builds_active_session() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");

    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    assert_eq!(code.len(), 6);

    let state = alice.state();
    assert_eq!(state.phase, SessionPhase::Active);
    assert!(!state.is_loading);
    assert!(!state.is_complete);
    assert_eq!(state.room.as_ref().unwrap().code, code);
    assert_eq!(state.room.as_ref().unwrap().word_date, TEST_DATE);
    assert_eq!(state.current_player.as_ref().unwrap().nickname, "Alice");
    assert_eq!(state.players.len(), 1);
    assert_eq!(state.players[0].nickname, "Alice");

    assert!(alice.inactivity_armed().await);
    assert!(alice.channel_open().await);
}

#[tokio::test]
async fn test_create_room_rejects_blank_nickname() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");

    let err = alice.create_room("   ", TEST_DATE).await.unwrap_err();
    assert_eq!(err, RoomError::EmptyNickname);
    assert!(alice.state().is_empty());
    assert_eq!(rig.store.room_count(), 0);
}

#[tokio::test]
async fn test_create_room_without_word_leaves_empty_state() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");

    let err = alice.create_room("Alice", "2025-05-26").await.unwrap_err();
    assert!(matches!(err, RoomError::WordNotFound { .. }));

    assert!(alice.state().is_empty());
    assert!(!alice.inactivity_armed().await);
    assert!(!alice.channel_open().await);
    // The room row written before the lookup stays behind.
    assert_eq!(rig.store.room_count(), 1);
}

#[tokio::test]
async fn test_second_create_tears_down_first_room() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");

    alice.create_room("Alice", TEST_DATE).await.unwrap();
    let first_room = alice.state().room_id().unwrap();
    alice.create_room("Alice", TEST_DATE).await.unwrap();
    let second_room = alice.state().room_id().unwrap();

    assert_ne!(first_room, second_room);
    assert!(rig.presence.members(first_room).await.unwrap().is_empty());
    assert_eq!(rig.presence.members(second_room).await.unwrap().len(), 1);
    assert_eq!(rig.presence.room_count(), 1);
    assert!(alice.inactivity_armed().await);
    assert!(alice.channel_open().await);
}

#[tokio::test]
async fn test_join_room_sees_everyone_present() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    let bob = rig.participant("guest_b");

    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    bob.join_room(&code.to_lowercase(), "Bob").await.unwrap();

    let state = wait_for_state(&bob, |s| s.players.len() == 2).await;
    assert_eq!(state.phase, SessionPhase::Active);
    assert_eq!(state.current_player.as_ref().unwrap().nickname, "Bob");

    let state = wait_for_state(&alice, |s| s.players.len() == 2).await;
    let nicknames: Vec<&str> = state.players.iter().map(|p| p.nickname.as_str()).collect();
    assert_eq!(nicknames, vec!["Alice", "Bob"]);
}

#[tokio::test]
async fn test_join_unknown_room_fails() {
    let rig = TestRig::new();
    let bob = rig.participant("guest_b");

    let err = bob.join_room("ZZZZZZ", "Bob").await.unwrap_err();
    assert_eq!(
        err,
        RoomError::RoomNotFound {
            code: "ZZZZZZ".to_string()
        }
    );
    assert!(bob.state().is_empty());

    let err = bob.join_room("", "Bob").await.unwrap_err();
    assert_eq!(err, RoomError::EmptyRoomCode);
}

#[tokio::test]
async fn test_join_closed_room_fails() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    let bob = rig.participant("guest_b");

    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    alice.leave_room().await.unwrap();

    let err = bob.join_room(&code, "Bob").await.unwrap_err();
    assert!(matches!(err, RoomError::RoomNotFound { .. }));
}

#[tokio::test]
async fn test_rejoin_updates_existing_player() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    let room_id = alice.state().room_id().unwrap();

    let bob = rig.participant("guest_b");
    bob.join_room(&code, "Bob").await.unwrap();
    bob.leave_room().await.unwrap();

    let bob_again = rig.participant("guest_b");
    bob_again.join_room(&code, "Bobby").await.unwrap();

    let players = rig.store.players_of(room_id);
    assert_eq!(players.len(), 2);
    let bob_row = players
        .iter()
        .find(|p| p.participant == ParticipantId::Guest("guest_b".to_string()))
        .unwrap();
    assert_eq!(bob_row.nickname, "Bobby");
    assert!(bob_row.is_active);
}

#[tokio::test]
async fn test_full_room_rejects_newcomers_but_not_returning_players() {
    let rig = TestRig::with_policy(RoomPolicy::default().with_max_players(2));
    let alice = rig.participant("guest_a");
    let bob = rig.participant("guest_b");
    let carol = rig.participant("guest_c");

    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    bob.join_room(&code, "Bob").await.unwrap();

    let err = carol.join_room(&code, "Carol").await.unwrap_err();
    assert_eq!(err, RoomError::RoomFull { max: 2 });
    assert!(carol.state().is_empty());

    let bob_elsewhere = rig.participant("guest_b");
    bob_elsewhere.join_room(&code, "Bob").await.unwrap();
}

#[tokio::test]
async fn test_correct_guess_completes_room_for_everyone() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    let bob = rig.participant("guest_b");

    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    bob.join_room(&code, "Bob").await.unwrap();
    let mut bob_notices = bob.notices();

    alice.make_guess(TEST_WORD).await.unwrap();

    let state = wait_for_state(&alice, |s| s.is_complete).await;
    assert_eq!(state.phase, SessionPhase::Complete);
    assert_eq!(state.guesses.len(), 1);
    assert!(state.guesses[0].is_correct);

    let state = wait_for_state(&bob, |s| s.is_complete).await;
    assert_eq!(state.guesses[0].player_nickname, "Alice");

    match next_notice(&mut bob_notices).await {
        SessionNotice::RoomSolved {
            room_code,
            word,
            solved_by,
        } => {
            assert_eq!(room_code, code);
            assert_eq!(word, TEST_WORD);
            assert_eq!(solved_by, "Alice");
        }
        other => panic!("unexpected notice {:?}", other),
    }

    let calls = rig.gateway.calls();
    let err = bob.make_guess("בית").await.unwrap_err();
    assert_eq!(err, RoomError::RoomComplete);
    assert_eq!(rig.gateway.calls(), calls);
    assert_eq!(rig.store.guess_count(), 1);
}

#[tokio::test]
async fn test_duplicate_guess_skips_gateway() {
    let rig = TestRig::new();
    rig.gateway.score("בית", 0.42);
    let alice = rig.participant("guest_a");
    let bob = rig.participant("guest_b");

    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    bob.join_room(&code, "Bob").await.unwrap();

    alice.make_guess("בית").await.unwrap();
    wait_for_state(&bob, |s| s.guesses.len() == 1).await;
    assert_eq!(rig.gateway.calls(), 1);

    let err = bob.make_guess("בַּיִת").await.unwrap_err();
    assert_eq!(
        err,
        RoomError::DuplicateGuess {
            word: "בית".to_string(),
            guessed_by: "Alice".to_string(),
        }
    );
    assert_eq!(err.to_string(), "'בית' was already guessed by Alice");
    assert_eq!(rig.gateway.calls(), 1);
    assert_eq!(rig.store.guess_count(), 1);
}

#[tokio::test]
async fn test_guess_order_converges_across_participants() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    let bob = rig.participant("guest_b");

    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    bob.join_room(&code, "Bob").await.unwrap();

    alice.make_guess("בית").await.unwrap();
    wait_for_state(&bob, |s| s.guesses.len() == 1).await;
    bob.make_guess("עץ").await.unwrap();
    wait_for_state(&alice, |s| s.guesses.len() == 2).await;
    alice.make_guess("ספר").await.unwrap();

    let a = wait_for_state(&alice, |s| s.guesses.len() == 3).await;
    let b = wait_for_state(&bob, |s| s.guesses.len() == 3).await;

    let words = |guesses: &[room_types::Guess]| -> Vec<(i64, String)> {
        guesses
            .iter()
            .map(|g| (g.sequence, g.normalized_word.clone()))
            .collect()
    };
    assert_eq!(words(&a.guesses), words(&b.guesses));
    assert_eq!(
        a.guesses.iter().map(|g| g.sequence).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(a.guesses[1].player_nickname, "Bob");
}

#[tokio::test]
async fn test_rejected_guesses_write_nothing() {
    let rig = TestRig::new();
    rig.gateway.unknown_word("קקק");
    let alice = rig.participant("guest_a");

    let err = alice.make_guess("בית").await.unwrap_err();
    assert_eq!(err, RoomError::NoActiveRoom);

    alice.create_room("Alice", TEST_DATE).await.unwrap();

    let err = alice.make_guess("two words").await.unwrap_err();
    assert!(matches!(err, RoomError::InvalidGuess { .. }));
    assert_eq!(rig.gateway.calls(), 0);

    let err = alice.make_guess("קקק").await.unwrap_err();
    assert_eq!(
        err,
        RoomError::OutOfVocabulary {
            word: "קקק".to_string()
        }
    );
    assert_eq!(rig.store.guess_count(), 0);
    assert_eq!(alice.state().phase, SessionPhase::Active);
}

#[tokio::test]
async fn test_leave_room_clears_everything() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    let bob = rig.participant("guest_b");

    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    let room_id = alice.state().room_id().unwrap();
    bob.join_room(&code, "Bob").await.unwrap();
    wait_for_state(&bob, |s| s.players.len() == 2).await;

    alice.leave_room().await.unwrap();
    assert!(alice.state().is_empty());
    assert!(!alice.inactivity_armed().await);
    assert!(!alice.channel_open().await);

    let state = wait_for_state(&bob, |s| s.players.len() == 1).await;
    assert_eq!(state.players[0].nickname, "Bob");
    assert!(rig.store.room(room_id).unwrap().is_active);

    // Leaving twice is harmless.
    alice.leave_room().await.unwrap();

    bob.leave_room().await.unwrap();
    assert!(!rig.store.room(room_id).unwrap().is_active);
    assert!(rig.store.players_of(room_id).iter().all(|p| !p.is_active));
}

#[tokio::test]
async fn test_leave_cleans_up_even_when_store_fails() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    alice.create_room("Alice", TEST_DATE).await.unwrap();

    rig.store
        .fail_writes
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let err = alice.leave_room().await.unwrap_err();
    assert!(matches!(err, RoomError::Store { .. }));
    assert!(alice.state().is_empty());
    assert!(!alice.channel_open().await);
}

#[tokio::test]
async fn test_score_arriving_after_leave_is_discarded() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    alice.create_room("Alice", TEST_DATE).await.unwrap();

    let gate = rig.gateway.hold();
    let guessing = alice.clone();
    let pending = tokio::spawn(async move { guessing.make_guess("בית").await });
    while rig.gateway.calls() == 0 {
        tokio::task::yield_now().await;
    }

    alice.leave_room().await.unwrap();
    gate.notify_one();

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err, RoomError::StaleSession);
    assert!(err.is_silent());
    assert_eq!(rig.store.guess_count(), 0);
    assert!(alice.state().is_empty());
}

#[tokio::test]
async fn test_cleanup_is_idempotent() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");

    alice.cleanup().await;
    assert!(alice.state().is_empty());

    alice.create_room("Alice", TEST_DATE).await.unwrap();
    alice.reset_session().await;
    alice.cleanup().await;
    assert!(alice.state().is_empty());
    assert!(!alice.inactivity_armed().await);
    assert_eq!(rig.presence.room_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_inactivity_closes_room() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    let room_id = alice.state().room_id().unwrap();
    let mut notices = alice.notices();

    tokio::time::sleep(Duration::from_secs(25 * 60 + 1)).await;

    wait_for_state(&alice, |s| s.is_empty()).await;
    assert!(!alice.inactivity_armed().await);
    assert!(!alice.channel_open().await);
    assert!(!rig.store.room(room_id).unwrap().is_active);
    assert_eq!(
        next_notice(&mut notices).await,
        SessionNotice::RoomClosed {
            room_code: code,
            reason: CloseReason::Inactivity,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_guess_rearms_inactivity() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    alice.create_room("Alice", TEST_DATE).await.unwrap();
    let room_id = alice.state().room_id().unwrap();

    tokio::time::sleep(Duration::from_secs(20 * 60)).await;
    alice.make_guess("בית").await.unwrap();

    tokio::time::sleep(Duration::from_secs(20 * 60)).await;
    assert_eq!(alice.state().phase, SessionPhase::Active);
    assert!(rig.store.room(room_id).unwrap().is_active);

    tokio::time::sleep(Duration::from_secs(6 * 60)).await;
    wait_for_state(&alice, |s| s.is_empty()).await;
    assert!(!rig.store.room(room_id).unwrap().is_active);
}

#[tokio::test(start_paused = true)]
async fn test_other_players_guesses_count_as_activity() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    let bob = rig.participant("guest_b");
    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    bob.join_room(&code, "Bob").await.unwrap();

    tokio::time::sleep(Duration::from_secs(20 * 60)).await;
    bob.make_guess("עץ").await.unwrap();
    wait_for_state(&alice, |s| s.guesses.len() == 1).await;

    tokio::time::sleep(Duration::from_secs(20 * 60)).await;
    assert_eq!(alice.state().phase, SessionPhase::Active);
}

#[tokio::test]
async fn test_store_feed_reaches_only_subscribed_room() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    let bob = rig.participant("guest_b");

    alice.create_room("Alice", TEST_DATE).await.unwrap();
    bob.create_room("Bob", TEST_DATE).await.unwrap();

    alice.make_guess("בית").await.unwrap();
    wait_for_state(&alice, |s| s.guesses.len() == 1).await;
    assert!(bob.state().guesses.is_empty());

    let bob_room = bob.state().room_id().unwrap();
    assert!(rig.store.list_guesses(bob_room).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_inactivity_close_resets_every_viewer() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    let bob = rig.participant("guest_b");
    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    let room_id = alice.state().room_id().unwrap();

    // Bob's own timer runs ten minutes behind Alice's.
    tokio::time::sleep(Duration::from_secs(10 * 60)).await;
    bob.join_room(&code, "Bob").await.unwrap();
    let mut bob_notices = bob.notices();

    tokio::time::sleep(Duration::from_secs(15 * 60 + 5)).await;
    assert!(!rig.store.room(room_id).unwrap().is_active);

    wait_for_state(&bob, |s| s.is_empty()).await;
    assert!(!bob.inactivity_armed().await);
    assert!(!bob.channel_open().await);
    assert_eq!(
        next_notice(&mut bob_notices).await,
        SessionNotice::RoomClosed {
            room_code: code,
            reason: CloseReason::Inactivity,
        }
    );
    assert_eq!(bob.make_guess("בית").await.unwrap_err(), RoomError::NoActiveRoom);
    assert!(alice.state().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_inactivity_close_frees_room_feeds() {
    let rig = TestRig::new();
    let players: Vec<_> = ["guest_a", "guest_b", "guest_c"]
        .iter()
        .map(|guest| rig.participant(guest))
        .collect();
    for player in &players {
        player.create_room("Solo", TEST_DATE).await.unwrap();
    }
    assert_eq!(rig.store.feed().room_count(), 3);

    tokio::time::sleep(Duration::from_secs(25 * 60 + 1)).await;
    for player in &players {
        wait_for_state(player, |s| s.is_empty()).await;
    }
    assert_eq!(rig.store.feed().room_count(), 0);
}

#[tokio::test]
async fn test_room_closed_elsewhere_resets_viewers() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    let bob = rig.participant("guest_b");
    let code = alice.create_room("Alice", TEST_DATE).await.unwrap();
    let room_id = alice.state().room_id().unwrap();
    bob.join_room(&code, "Bob").await.unwrap();
    let mut alice_notices = alice.notices();
    let mut bob_notices = bob.notices();

    rig.store
        .close_room(room_id, CloseReason::Abandoned)
        .await
        .unwrap();

    for (viewer, notices) in [(&alice, &mut alice_notices), (&bob, &mut bob_notices)] {
        wait_for_state(viewer, |s| s.is_empty()).await;
        assert_eq!(
            next_notice(notices).await,
            SessionNotice::RoomClosed {
                room_code: code.clone(),
                reason: CloseReason::Abandoned,
            }
        );
    }
}

#[tokio::test]
async fn test_guess_into_closed_room_resets_session() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    alice.create_room("Alice", TEST_DATE).await.unwrap();
    let room_id = alice.state().room_id().unwrap();

    rig.store.deactivate_quietly(room_id);
    assert_eq!(alice.state().phase, SessionPhase::Active);

    let err = alice.make_guess("בית").await.unwrap_err();
    assert_eq!(err, RoomError::RoomClosed);
    assert!(alice.state().is_empty());
    assert!(!alice.inactivity_armed().await);
    assert_eq!(rig.store.guess_count(), 0);
}

#[tokio::test]
async fn test_leaving_last_does_not_notify_the_leaver() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    alice.create_room("Alice", TEST_DATE).await.unwrap();
    let room_id = alice.state().room_id().unwrap();
    let mut notices = alice.notices();

    alice.leave_room().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!rig.store.room(room_id).unwrap().is_active);
    assert!(notices.try_recv().is_err());
    assert_eq!(rig.store.feed().room_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_guess_during_expiry_waits_for_the_close() {
    let rig = TestRig::new();
    let alice = rig.participant("guest_a");
    alice.create_room("Alice", TEST_DATE).await.unwrap();
    let room_id = alice.state().room_id().unwrap();
    let gate = rig.store.hold_closes();

    tokio::time::sleep(Duration::from_secs(25 * 60 + 1)).await;
    while rig.store.close_calls() == 0 {
        tokio::task::yield_now().await;
    }

    // Expiry is mid-write; the guess must not rearm a timer for a room that
    // is being closed.
    let guessing = alice.clone();
    let pending = tokio::spawn(async move { guessing.make_guess("בית").await });
    tokio::task::yield_now().await;
    gate.notify_one();

    assert_eq!(pending.await.unwrap().unwrap_err(), RoomError::NoActiveRoom);
    assert!(!rig.store.room(room_id).unwrap().is_active);
    assert!(alice.state().is_empty());
    assert!(!alice.inactivity_armed().await);
    assert_eq!(rig.store.guess_count(), 0);
    assert_eq!(rig.gateway.calls(), 0);
}
