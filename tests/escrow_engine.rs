//! Escrow engine integration tests
//!
//! Idempotent locking, single-fire release, refund paths and the dispute
//! hold. Escrow is exercised directly here; the match lifecycle suite covers
//! it end to end.

mod common;

use common::{balance_of, create_player, fund, setup};
use moneymatch::services::compute_pot;
use uuid::Uuid;

#[tokio::test]
async fn lock_funds_debits_both_players_once() {
    let app = setup();
    let p1 = create_player(&app, "escrow_p1");
    let p2 = create_player(&app, "escrow_p2");
    fund(&app, p1, 2_000).await;
    fund(&app, p2, 2_000).await;

    let match_id = Uuid::new_v4();
    let (_, fee) = compute_pot(500, app.config.platform_fee_percent);

    let escrow = app
        .escrow
        .lock_funds(match_id, p1, p2, 500, fee)
        .await
        .unwrap();
    assert_eq!(escrow.status, "LOCKED");
    assert_eq!(
        escrow.total_amount_cents,
        escrow.player1_amount_cents + escrow.player2_amount_cents - escrow.platform_fee_cents
    );

    // Retried lock: same account back, nobody re-charged
    let replay = app
        .escrow
        .lock_funds(match_id, p1, p2, 500, fee)
        .await
        .unwrap();
    assert_eq!(replay.id, escrow.id);
    assert_eq!(balance_of(&app, p1).await, 1_500);
    assert_eq!(balance_of(&app, p2).await, 1_500);
}

#[tokio::test]
async fn release_is_single_fire() {
    let app = setup();
    let p1 = create_player(&app, "escrow_rel_p1");
    let p2 = create_player(&app, "escrow_rel_p2");
    fund(&app, p1, 1_000).await;
    fund(&app, p2, 1_000).await;

    let match_id = Uuid::new_v4();
    let (total, fee) = compute_pot(500, app.config.platform_fee_percent);
    app.escrow
        .lock_funds(match_id, p1, p2, 500, fee)
        .await
        .unwrap();

    let released = app.escrow.release_to_winner(match_id, p1).await.unwrap();
    assert_eq!(released.status, "RELEASED");
    assert_eq!(released.released_to.as_deref(), Some(p1.to_string().as_str()));
    assert_eq!(balance_of(&app, p1).await, 500 + total);

    // Second fire: rejected, and the winner is not paid again
    let err = app.escrow.release_to_winner(match_id, p1).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_ESCROW_STATE");
    assert_eq!(balance_of(&app, p1).await, 500 + total);
}

#[tokio::test]
async fn refund_restores_both_stakes() {
    let app = setup();
    let p1 = create_player(&app, "escrow_ref_p1");
    let p2 = create_player(&app, "escrow_ref_p2");
    fund(&app, p1, 800).await;
    fund(&app, p2, 800).await;

    let match_id = Uuid::new_v4();
    let (_, fee) = compute_pot(300, app.config.platform_fee_percent);
    app.escrow
        .lock_funds(match_id, p1, p2, 300, fee)
        .await
        .unwrap();
    assert_eq!(balance_of(&app, p1).await, 500);

    let refunded = app.escrow.refund_match(match_id, p1, p2).await.unwrap();
    assert_eq!(refunded.status, "REFUNDED");
    assert_eq!(balance_of(&app, p1).await, 800);
    assert_eq!(balance_of(&app, p2).await, 800);

    // Terminal: no release after a refund
    let err = app.escrow.release_to_winner(match_id, p1).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_ESCROW_STATE");
}

#[tokio::test]
async fn hold_freezes_ordinary_release_but_not_refund() {
    let app = setup();
    let p1 = create_player(&app, "escrow_hold_p1");
    let p2 = create_player(&app, "escrow_hold_p2");
    fund(&app, p1, 1_000).await;
    fund(&app, p2, 1_000).await;

    let match_id = Uuid::new_v4();
    let (_, fee) = compute_pot(400, app.config.platform_fee_percent);
    app.escrow
        .lock_funds(match_id, p1, p2, 400, fee)
        .await
        .unwrap();

    let held = app.escrow.hold_for_dispute(match_id).await.unwrap();
    assert_eq!(held.status, "HELD");

    let err = app.escrow.release_to_winner(match_id, p1).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_ESCROW_STATE");

    // Refund stays legal from HELD
    let refunded = app.escrow.refund_match(match_id, p1, p2).await.unwrap();
    assert_eq!(refunded.status, "REFUNDED");
    assert_eq!(balance_of(&app, p1).await, 1_000);
}

#[tokio::test]
async fn hold_requires_locked() {
    let app = setup();
    let p1 = create_player(&app, "escrow_hold2_p1");
    let p2 = create_player(&app, "escrow_hold2_p2");
    fund(&app, p1, 1_000).await;
    fund(&app, p2, 1_000).await;

    let match_id = Uuid::new_v4();
    let (_, fee) = compute_pot(400, app.config.platform_fee_percent);
    app.escrow
        .lock_funds(match_id, p1, p2, 400, fee)
        .await
        .unwrap();
    app.escrow.release_to_winner(match_id, p2).await.unwrap();

    let err = app.escrow.hold_for_dispute(match_id).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_ESCROW_STATE");
}

#[tokio::test]
async fn lock_with_insufficient_funds_charges_nobody_lasting() {
    let app = setup();
    let p1 = create_player(&app, "escrow_short_p1");
    let p2 = create_player(&app, "escrow_short_p2");
    fund(&app, p1, 1_000).await;
    // p2 has no wallet funding at all

    let match_id = Uuid::new_v4();
    let (_, fee) = compute_pot(500, app.config.platform_fee_percent);
    let err = app
        .escrow
        .lock_funds(match_id, p1, p2, 500, fee)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    // The enclosing transaction rolled back player1's debit
    assert_eq!(balance_of(&app, p1).await, 1_000);
    assert!(app.escrow.get_by_match(match_id).await.unwrap().is_none());
}

#[tokio::test]
async fn release_on_missing_escrow_is_not_found() {
    let app = setup();
    let p1 = create_player(&app, "escrow_missing");
    let err = app
        .escrow
        .release_to_winner(Uuid::new_v4(), p1)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}
