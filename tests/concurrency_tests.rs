mod common;

use common::{engine, general_draft, service_draft};
use condoledger::application::engine::ServicePaymentInput;
use condoledger::domain::money::Amount;
use condoledger::domain::obligation::Family;
use condoledger::error::SettlementError;
use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_concurrent_double_settlement_yields_one_payment() {
    let engine = Arc::new(engine().await);
    let obligation_id = engine
        .create_obligation(general_draft(dec!(100)), 1)
        .await
        .unwrap()
        .id;

    let a = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.settle_general(obligation_id, 1).await })
    };
    let b = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.settle_general(obligation_id, 2).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one settler must win");

    let loser = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser.as_ref().unwrap_err(),
        SettlementError::InvalidState { .. } | SettlementError::Conflict(_)
    ));

    // One payment, one link, no partial state from the loser.
    let links = engine
        .links_for_obligation(Family::General, obligation_id)
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
}

#[tokio::test]
async fn test_concurrent_service_settlement_single_winner() {
    let engine = Arc::new(engine().await);
    let obligation_id = engine.create_obligation(service_draft(), 1).await.unwrap().id;

    let spawn_settle = |receipt: &str| {
        let engine = engine.clone();
        let input = ServicePaymentInput {
            receipt_number: receipt.to_string(),
            payment_date: Utc::now(),
            amount: Amount::new(dec!(80)).unwrap(),
            description: None,
            receipt_photo: "invoice.jpg".to_string(),
            status_id: 2,
        };
        tokio::spawn(async move { engine.settle_service(obligation_id, input, 1).await })
    };

    let a = spawn_settle("C-1");
    let b = spawn_settle("C-2");

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    let links = engine
        .links_for_obligation(Family::Service, obligation_id)
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
}

#[tokio::test]
async fn test_concurrent_settlement_of_distinct_obligations() {
    let engine = Arc::new(engine().await);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let obligation_id = engine
            .create_obligation(general_draft(dec!(10)), 1)
            .await
            .unwrap()
            .id;
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.settle_general(obligation_id, 1).await
        }));
    }

    // Independent obligations never contend with each other.
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
}
