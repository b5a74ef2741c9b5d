//! Match state machine integration tests, including the full wager flow
//! from creation through completion.

mod common;

use common::{balance_of, create_player, fund, setup};
use moneymatch::error::CoreError;
use moneymatch::models::matches::MatchType;
use moneymatch::models::transaction::TransactionKind;

#[tokio::test]
async fn full_lifecycle_stake_500_best_of_3() {
    let app = setup();
    let alice = create_player(&app, "alice");
    let bob = create_player(&app, "bob");
    fund(&app, alice, 2_000).await;
    fund(&app, bob, 2_000).await;

    // Create
    let created = app
        .matches
        .create_match(MatchType::Ranked, 500, alice, None, 3)
        .await
        .unwrap();
    assert_eq!(created.status, "CREATED");
    assert_eq!(created.platform_fee_cents, 100); // 10% of 1000
    assert_eq!(created.total_pot_cents, 900);

    let match_id = created.id.parse().unwrap();

    // Accept: both stakes locked
    let accepted = app.matches.accept_match(match_id, bob).await.unwrap();
    assert_eq!(accepted.status, "ACCEPTED");
    assert_eq!(balance_of(&app, alice).await, 1_500);
    assert_eq!(balance_of(&app, bob).await, 1_500);

    let escrow = app.escrow.get_by_match(match_id).await.unwrap().unwrap();
    assert_eq!(escrow.total_amount_cents, 900);
    assert_eq!(escrow.status, "LOCKED");

    // Start
    let started = app.matches.start_match(match_id, alice).await.unwrap();
    assert_eq!(started.status, "IN_PROGRESS");
    assert!(started.started_at.is_some());

    // Complete: alice takes games 1 and 3
    let (completed, results) = app
        .matches
        .complete_match(match_id, alice, vec![alice, bob, alice], bob)
        .await
        .unwrap();
    assert_eq!(completed.status, "COMPLETED");
    assert_eq!(completed.winner_id.as_deref(), Some(alice.to_string().as_str()));
    assert_eq!(results.len(), 3);

    // Winner got the pot, escrow is terminal
    assert_eq!(balance_of(&app, alice).await, 1_500 + 900);
    assert_eq!(balance_of(&app, bob).await, 1_500);
    let escrow = app.escrow.get_by_match(match_id).await.unwrap().unwrap();
    assert_eq!(escrow.status, "RELEASED");

    // Ratings moved symmetrically from 1500
    let ranking_alice = app.rankings.ranking_for(alice).await.unwrap();
    let ranking_bob = app.rankings.ranking_for(bob).await.unwrap();
    assert_eq!(ranking_alice.rating, 1516);
    assert_eq!(ranking_bob.rating, 1484);
    assert_eq!(ranking_alice.wins, 1);
    assert_eq!(ranking_alice.win_streak, 1);
    assert_eq!(ranking_bob.losses, 1);
    assert_eq!(ranking_bob.win_streak, 0);
    assert_eq!(ranking_alice.total_earnings_cents, 900);
}

#[tokio::test]
async fn create_validates_stake_and_best_of() {
    let app = setup();
    let user = create_player(&app, "creator_bounds");

    for (stake, best_of) in [(50, 3), (200_000, 3), (500, 4), (500, 9)] {
        let err = app
            .matches
            .create_match(MatchType::QuickDuel, stake, user, None, best_of)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }
}

#[tokio::test]
async fn create_requires_active_user() {
    let app = setup();
    let ghost = uuid::Uuid::new_v4();
    let err = app
        .matches
        .create_match(MatchType::QuickDuel, 500, ghost, None, 3)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn cannot_accept_own_match() {
    let app = setup();
    let user = create_player(&app, "self_accept");
    fund(&app, user, 1_000).await;

    let created = app
        .matches
        .create_match(MatchType::QuickDuel, 500, user, None, 1)
        .await
        .unwrap();
    let err = app
        .matches
        .accept_match(created.id.parse().unwrap(), user)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CANNOT_ACCEPT_OWN_MATCH");
}

#[tokio::test]
async fn failed_escrow_lock_leaves_match_created() {
    let app = setup();
    let creator = create_player(&app, "no_refund_creator");
    let broke = create_player(&app, "broke_acceptor");
    fund(&app, creator, 1_000).await;
    fund(&app, broke, 100).await; // not enough for a 500 stake

    let created = app
        .matches
        .create_match(MatchType::QuickDuel, 500, creator, None, 3)
        .await
        .unwrap();
    let match_id = created.id.parse().unwrap();

    let err = app.matches.accept_match(match_id, broke).await.unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_BALANCE");

    // The whole transition rolled back: no status flip, no seat, no charge
    let row = app.matches.get_match(match_id).await.unwrap();
    assert_eq!(row.status, "CREATED");
    assert_eq!(app.matches.participants(match_id).await.unwrap().len(), 1);
    assert_eq!(balance_of(&app, creator).await, 1_000);
    assert!(app.escrow.get_by_match(match_id).await.unwrap().is_none());
}

#[tokio::test]
async fn start_requires_accepted_status() {
    let app = setup();
    let user = create_player(&app, "early_start");
    let created = app
        .matches
        .create_match(MatchType::QuickDuel, 500, user, None, 3)
        .await
        .unwrap();

    let err = app
        .matches
        .start_match(created.id.parse().unwrap(), user)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_MATCH_STATE");
}

#[tokio::test]
async fn start_requires_participant() {
    let app = setup();
    let creator = create_player(&app, "start_creator");
    let acceptor = create_player(&app, "start_acceptor");
    let stranger = create_player(&app, "start_stranger");
    fund(&app, creator, 1_000).await;
    fund(&app, acceptor, 1_000).await;

    let created = app
        .matches
        .create_match(MatchType::QuickDuel, 500, creator, None, 3)
        .await
        .unwrap();
    let match_id = created.id.parse().unwrap();
    app.matches.accept_match(match_id, acceptor).await.unwrap();

    let err = app.matches.start_match(match_id, stranger).await.unwrap_err();
    assert_eq!(err.code(), "NOT_PARTICIPANT");
}

#[tokio::test]
async fn complete_rejects_wrong_result_count_and_weak_majority() {
    let app = setup();
    let alice = create_player(&app, "complete_alice");
    let bob = create_player(&app, "complete_bob");
    fund(&app, alice, 1_000).await;
    fund(&app, bob, 1_000).await;

    let created = app
        .matches
        .create_match(MatchType::Ranked, 500, alice, None, 3)
        .await
        .unwrap();
    let match_id = created.id.parse().unwrap();
    app.matches.accept_match(match_id, bob).await.unwrap();
    app.matches.start_match(match_id, alice).await.unwrap();

    // Two results for a best-of-3
    let err = app
        .matches
        .complete_match(match_id, alice, vec![alice, bob], alice)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    // Declared winner only took 1 of 3 games
    let err = app
        .matches
        .complete_match(match_id, alice, vec![alice, bob, bob], alice)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    // Nothing was paid out and the match is still live
    let row = app.matches.get_match(match_id).await.unwrap();
    assert_eq!(row.status, "IN_PROGRESS");
    assert_eq!(balance_of(&app, alice).await, 500);
}

#[tokio::test]
async fn complete_rejects_outsiders() {
    let app = setup();
    let alice = create_player(&app, "outsider_alice");
    let bob = create_player(&app, "outsider_bob");
    let carol = create_player(&app, "outsider_carol");
    fund(&app, alice, 1_000).await;
    fund(&app, bob, 1_000).await;

    let created = app
        .matches
        .create_match(MatchType::Ranked, 500, alice, None, 1)
        .await
        .unwrap();
    let match_id = created.id.parse().unwrap();
    app.matches.accept_match(match_id, bob).await.unwrap();
    app.matches.start_match(match_id, alice).await.unwrap();

    // Outsider as reporter
    let err = app
        .matches
        .complete_match(match_id, alice, vec![alice], carol)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_PARTICIPANT");

    // Outsider as winner
    let err = app
        .matches
        .complete_match(match_id, carol, vec![alice], alice)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_WINNER");
}

#[tokio::test]
async fn cancel_created_match_needs_no_escrow() {
    let app = setup();
    let creator = create_player(&app, "cancel_created");
    let cancelled = {
        let created = app
            .matches
            .create_match(MatchType::QuickDuel, 500, creator, None, 3)
            .await
            .unwrap();
        app.matches
            .cancel_match(created.id.parse().unwrap(), creator, Some("no takers".to_string()))
            .await
            .unwrap()
    };

    assert_eq!(cancelled.status, "CANCELLED");
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("no takers"));
    assert!(app
        .escrow
        .get_by_match(cancelled.id.parse().unwrap())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn cancel_accepted_match_refunds_stakes() {
    let app = setup();
    let creator = create_player(&app, "cancel_creator");
    let acceptor = create_player(&app, "cancel_acceptor");
    fund(&app, creator, 1_000).await;
    fund(&app, acceptor, 1_000).await;

    let created = app
        .matches
        .create_match(MatchType::QuickDuel, 400, creator, None, 3)
        .await
        .unwrap();
    let match_id = created.id.parse().unwrap();
    app.matches.accept_match(match_id, acceptor).await.unwrap();
    assert_eq!(balance_of(&app, acceptor).await, 600);

    // The non-creator participant may cancel while ACCEPTED
    let cancelled = app
        .matches
        .cancel_match(match_id, acceptor, None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, "CANCELLED");
    assert_eq!(balance_of(&app, creator).await, 1_000);
    assert_eq!(balance_of(&app, acceptor).await, 1_000);

    let escrow = app.escrow.get_by_match(match_id).await.unwrap().unwrap();
    assert_eq!(escrow.status, "REFUNDED");
}

#[tokio::test]
async fn cancel_rejects_non_participants_and_finished_matches() {
    let app = setup();
    let creator = create_player(&app, "cancel_auth_creator");
    let acceptor = create_player(&app, "cancel_auth_acceptor");
    let stranger = create_player(&app, "cancel_auth_stranger");
    fund(&app, creator, 1_000).await;
    fund(&app, acceptor, 1_000).await;

    let created = app
        .matches
        .create_match(MatchType::QuickDuel, 400, creator, None, 1)
        .await
        .unwrap();
    let match_id = created.id.parse().unwrap();
    app.matches.accept_match(match_id, acceptor).await.unwrap();

    let err = app
        .matches
        .cancel_match(match_id, stranger, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Authorization(_)));

    app.matches.start_match(match_id, creator).await.unwrap();
    let err = app
        .matches
        .cancel_match(match_id, creator, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_MATCH_STATE");
}

#[tokio::test]
async fn completion_is_safe_to_retry() {
    let app = setup();
    let alice = create_player(&app, "retry_alice");
    let bob = create_player(&app, "retry_bob");
    fund(&app, alice, 1_000).await;
    fund(&app, bob, 1_000).await;

    let created = app
        .matches
        .create_match(MatchType::Ranked, 500, alice, None, 1)
        .await
        .unwrap();
    let match_id = created.id.parse().unwrap();
    app.matches.accept_match(match_id, bob).await.unwrap();
    app.matches.start_match(match_id, bob).await.unwrap();

    app.matches
        .complete_match(match_id, bob, vec![bob], alice)
        .await
        .unwrap();

    // A replayed completion request hits the status guard, not the wallet
    let err = app
        .matches
        .complete_match(match_id, bob, vec![bob], alice)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_MATCH_STATE");
    assert_eq!(balance_of(&app, bob).await, 500 + 900);
}

#[tokio::test]
async fn match_entry_transactions_reference_the_match() {
    let app = setup();
    let alice = create_player(&app, "ref_alice");
    let bob = create_player(&app, "ref_bob");
    fund(&app, alice, 1_000).await;
    fund(&app, bob, 1_000).await;

    let created = app
        .matches
        .create_match(MatchType::QuickDuel, 300, alice, None, 1)
        .await
        .unwrap();
    let match_id = created.id.parse().unwrap();
    app.matches.accept_match(match_id, bob).await.unwrap();

    let filter = moneymatch::models::transaction::TransactionFilter {
        kind: Some(TransactionKind::EscrowLock),
        status: None,
    };
    let rows = app.ledger.history(alice, filter, 10, None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].reference_id.as_deref(), Some(created.id.as_str()));
    assert_eq!(rows[0].reference_type.as_deref(), Some("match"));
}
