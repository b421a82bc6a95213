mod common;

use chrono::Utc;
use common::{engine, general_draft, service_draft};
use condoledger::application::engine::ServicePaymentInput;
use condoledger::domain::money::{Amount, InterestRate};
use condoledger::domain::obligation::Family;
use condoledger::domain::payment::{AUTO_PAYMENT_PHOTO, PaymentDraft};
use condoledger::domain::status::PaymentStatus;
use condoledger::error::SettlementError;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_flow_a_settles_with_percentage_interest() {
    let engine = engine().await;
    let mut draft = general_draft(dec!(100));
    draft.interest_rate = Some(InterestRate::new(dec!(10)).unwrap());
    let obligation = engine.create_obligation(draft, 1).await.unwrap();

    let view = engine.settle_general(obligation.id, 1).await.unwrap();

    assert_eq!(view.payment.amount.value(), dec!(110.00));
    assert_eq!(view.payment.receipt_number, format!("Expensa-{}", obligation.id));
    assert_eq!(view.payment.receipt_photo, AUTO_PAYMENT_PHOTO);
    assert_eq!(view.obligation.status, PaymentStatus::Paid);

    let links = engine
        .links_for_obligation(Family::General, obligation.id)
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
}

#[tokio::test]
async fn test_flow_a_settles_with_flat_interest() {
    let engine = engine().await;
    let mut draft = general_draft(dec!(100));
    draft.interest_amount = Some(dec!(20));
    let obligation = engine.create_obligation(draft, 1).await.unwrap();

    let view = engine.settle_general(obligation.id, 1).await.unwrap();
    assert_eq!(view.payment.amount.value(), dec!(120));
}

#[tokio::test]
async fn test_flow_a_base_amount_only() {
    let engine = engine().await;
    let obligation = engine
        .create_obligation(general_draft(dec!(100)), 1)
        .await
        .unwrap();

    let view = engine.settle_general(obligation.id, 1).await.unwrap();
    assert_eq!(view.payment.amount.value(), dec!(100));
}

#[tokio::test]
async fn test_flow_a_conflict_when_link_already_exists() {
    // A pending obligation that already carries a manually attached payment
    // must be rejected with Conflict before any new payment is created.
    let engine = engine().await;
    let obligation = engine
        .create_obligation(general_draft(dec!(100)), 1)
        .await
        .unwrap();
    let payment = engine
        .register_payment(
            PaymentDraft {
                family: Family::General,
                receipt_number: "M-1".to_string(),
                payment_date: Utc::now(),
                amount: Amount::new(dec!(30)).unwrap(),
                description: None,
                receipt_photo: "photo".to_string(),
                status: None,
            },
            1,
        )
        .await
        .unwrap();
    engine
        .link_manually(Family::General, obligation.id, payment.id, 1)
        .await
        .unwrap();

    let err = engine.settle_general(obligation.id, 1).await.unwrap_err();
    assert!(matches!(err, SettlementError::Conflict(_)));

    // Retry is idempotent: still one link, status untouched.
    let err = engine.settle_general(obligation.id, 1).await.unwrap_err();
    assert!(matches!(err, SettlementError::Conflict(_)));
    let links = engine
        .links_for_obligation(Family::General, obligation.id)
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    let reread = engine
        .obligation(Family::General, obligation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reread.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_flow_b_trusts_caller_amount() {
    let engine = engine().await;
    let obligation = engine.create_obligation(service_draft(), 1).await.unwrap();

    let view = engine
        .settle_service(
            obligation.id,
            ServicePaymentInput {
                receipt_number: "SRV-2026-17".to_string(),
                payment_date: Utc::now(),
                amount: Amount::new(dec!(42.50)).unwrap(),
                description: Some("partial invoice".to_string()),
                receipt_photo: "invoice.jpg".to_string(),
                status_id: PaymentStatus::Verified.id(),
            },
            1,
        )
        .await
        .unwrap();

    // The base amount of 80 is irrelevant on this path.
    assert_eq!(view.payment.amount.value(), dec!(42.50));
    assert_eq!(view.payment.status, Some(PaymentStatus::Verified));
    assert_eq!(view.obligation.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_flow_b_settles_non_pending_obligation() {
    // The semi-manual flow writes Paid unconditionally; there is no pending
    // precondition on this path.
    let engine = engine().await;
    let mut draft = service_draft();
    draft.status = PaymentStatus::Verified;
    let obligation = engine.create_obligation(draft, 1).await.unwrap();

    let view = engine
        .settle_service(
            obligation.id,
            ServicePaymentInput {
                receipt_number: "SRV-1".to_string(),
                payment_date: Utc::now(),
                amount: Amount::new(dec!(80)).unwrap(),
                description: None,
                receipt_photo: "invoice.jpg".to_string(),
                status_id: PaymentStatus::Paid.id(),
            },
            1,
        )
        .await
        .unwrap();
    assert_eq!(view.obligation.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_delete_blocked_while_linked() {
    let engine = engine().await;
    let obligation = engine
        .create_obligation(general_draft(dec!(100)), 1)
        .await
        .unwrap();
    let view = engine.settle_general(obligation.id, 1).await.unwrap();

    assert!(matches!(
        engine
            .delete_obligation(Family::General, obligation.id, 1)
            .await
            .unwrap_err(),
        SettlementError::Conflict(_)
    ));
    assert!(matches!(
        engine
            .delete_payment(Family::General, view.payment.id, 1)
            .await
            .unwrap_err(),
        SettlementError::Conflict(_)
    ));
}
