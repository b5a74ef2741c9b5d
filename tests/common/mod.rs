//! Shared test fixtures: throwaway SQLite database with migrations applied,
//! fully wired services, and helpers to seed users and balances.

#![allow(dead_code)]

use std::sync::Arc;

use uuid::Uuid;

use moneymatch::config::CoreConfig;
use moneymatch::db::{self, DbPool};
use moneymatch::gateway::StubGateway;
use moneymatch::models::transaction::TransactionKind;
use moneymatch::models::user::{NewUser, User};
use moneymatch::services::{
    DisputeResolver, EscrowEngine, MatchEngine, RankingService, WalletLedger,
};

pub struct TestApp {
    pub pool: DbPool,
    pub config: CoreConfig,
    pub ledger: WalletLedger,
    pub escrow: EscrowEngine,
    pub matches: MatchEngine,
    pub disputes: DisputeResolver,
    pub rankings: RankingService,
}

pub fn setup() -> TestApp {
    let db_path = std::env::temp_dir().join(format!(
        "moneymatch_test_{}.db",
        Uuid::new_v4().simple()
    ));
    let pool = db::init_pool(db_path.to_str().expect("temp path is valid utf-8"))
        .expect("Failed to initialize test database");

    let config = CoreConfig::default();
    let ledger = WalletLedger::new(pool.clone(), Arc::new(StubGateway), config.clone());
    let escrow = EscrowEngine::new(pool.clone(), config.clone());
    let matches = MatchEngine::new(pool.clone(), config.clone());
    let disputes = DisputeResolver::new(pool.clone(), config.clone());
    let rankings = RankingService::new(pool.clone(), config.clone());

    TestApp {
        pool,
        config,
        ledger,
        escrow,
        matches,
        disputes,
        rankings,
    }
}

pub fn create_player(app: &TestApp, username: &str) -> Uuid {
    let id = Uuid::new_v4();
    let mut conn = app.pool.get().expect("Failed to get test connection");
    User::create(&mut conn, NewUser::player(&id.to_string(), username))
        .expect("Failed to create test player");
    id
}

pub fn create_admin(app: &TestApp, username: &str) -> Uuid {
    let id = Uuid::new_v4();
    let mut conn = app.pool.get().expect("Failed to get test connection");
    User::create(&mut conn, NewUser::admin(&id.to_string(), username))
        .expect("Failed to create test admin");
    id
}

/// Seed a wallet with spendable balance
pub async fn fund(app: &TestApp, user_id: Uuid, amount_cents: i64) {
    app.ledger
        .credit(user_id, amount_cents, TransactionKind::Deposit, None, None)
        .await
        .expect("Failed to fund test wallet");
}

pub async fn balance_of(app: &TestApp, user_id: Uuid) -> i64 {
    app.ledger
        .get_wallet(user_id)
        .await
        .expect("Failed to read test wallet")
        .balance_cents
}
