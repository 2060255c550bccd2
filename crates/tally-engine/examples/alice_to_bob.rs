//! Two users and a transfer, end to end.
//!
//! Seeds a fresh chain, registers Alice and Bob through the pool, funds
//! Alice, moves 50 USD to Bob, and prints the resulting balances and
//! chain. Run with `cargo run --example alice_to_bob`.

use std::sync::Arc;

use tally_core::{AccountId, Balance, CurrencyCode};
use tally_engine::{
    seed_genesis, BlockProducer, ChainLinker, CycleOutcome, GenesisConfig, ProducerConfig,
    SystemClock, TransactionDraft, TransactionPool, UserProfile,
};
use tally_store::{MemoryStore, StateRead};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(SystemClock);
    let identity = AccountId::new();
    let usd = CurrencyCode::new("USD");

    seed_genesis(
        store.as_ref(),
        &GenesisConfig::new(identity),
        clock.as_ref(),
    )
    .await?;

    let pool = TransactionPool::new(store.clone(), clock.clone());
    let producer = BlockProducer::new(
        store.clone(),
        ChainLinker::default(),
        clock.clone(),
        ProducerConfig::new(identity).with_produced_by("alice-to-bob-demo"),
    );

    // Register both users and confirm them in one block.
    let alice = AccountId::new();
    let bob = AccountId::new();
    pool.submit(TransactionDraft::user_creation(
        identity,
        alice,
        &UserProfile {
            username: "@alice".to_string(),
            display_name: "Alice".to_string(),
            public_key: "alice-pk".to_string(),
            bio: None,
        },
    )?)
    .await?;
    pool.submit(TransactionDraft::user_creation(
        identity,
        bob,
        &UserProfile {
            username: "@bob".to_string(),
            display_name: "Bob".to_string(),
            public_key: "bob-pk".to_string(),
            bio: None,
        },
    )?)
    .await?;
    producer.produce_block().await?;

    // Fund Alice directly, then move half to Bob through a cycle.
    store
        .seed_balance(Balance {
            owner: alice,
            currency: usd.clone(),
            amount: 100,
            updated_at: chrono::Utc::now(),
        })
        .await;
    pool.submit(TransactionDraft::transfer(alice, bob, 50, usd.clone())?)
        .await?;
    match producer.produce_block().await? {
        CycleOutcome::Sealed(block) => {
            println!(
                "sealed block {} ({} transactions, {} gas)",
                block.height, block.tx_count, block.gas_used
            );
        }
        CycleOutcome::NoPending => println!("nothing to produce"),
    }

    for (name, owner) in [("alice", alice), ("bob", bob)] {
        let amount = store
            .balance(owner, &usd)
            .await?
            .map(|balance| balance.amount)
            .unwrap_or(0);
        println!("{name}: {amount} USD");
    }

    let mut height = 0;
    while let Some(block) = store.block_by_height(height).await? {
        println!(
            "block {}: hash={} previous={} txs={}",
            block.height,
            block.hash.to_hex(),
            block.previous_hash.to_hex(),
            block.tx_count
        );
        height += 1;
    }

    Ok(())
}
