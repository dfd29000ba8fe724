//! End-to-end ledger scenarios.

mod common;

use common::{dec, TestHarness, PHONE};
use rust_decimal::Decimal;

use credit_ledger_core::{
    ChargeStatus, DateRange, Decision, LedgerError, RequestStatus, TransactionId, TransactionType,
};
use credit_ledger_service::{ChargeOutcome, DecisionOutcome, DecisionResult};

// ============================================================================
// Credit requests
// ============================================================================

#[test]
fn approved_request_credits_zero_balance() {
    let harness = TestHarness::new();
    let seller = harness.seller("Scenario One");
    assert_eq!(harness.ledger.get_balance(&seller).unwrap(), Decimal::ZERO);

    let request = harness.ledger.submit_credit_request(&seller, dec(10000)).unwrap();
    let outcome = harness.ledger.decide(&request.id, Decision::Approve).unwrap();

    assert_eq!(outcome, DecisionOutcome::Applied(RequestStatus::Approved));
    assert_eq!(harness.ledger.get_balance(&seller).unwrap(), dec(10000));

    let log = harness
        .ledger
        .list_transactions(&seller, DateRange::all(), None)
        .unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].transaction_type, TransactionType::AddCredit);
    assert_eq!(log[0].amount, dec(10000));
    assert_eq!(log[0].balance_after, dec(10000));
    assert!(log[0].phone_number.is_none());

    let stored = harness.ledger.get_credit_request(&request.id).unwrap();
    assert_eq!(stored.status, RequestStatus::Approved);
    harness.assert_balanced(&seller);
}

#[test]
fn redeciding_changes_nothing() {
    let harness = TestHarness::new();
    let seller = harness.seller("Redecide");
    let request = harness.ledger.submit_credit_request(&seller, dec(5000)).unwrap();

    harness.ledger.decide(&request.id, Decision::Reject).unwrap();
    let again = harness.ledger.decide(&request.id, Decision::Approve).unwrap();

    assert_eq!(again, DecisionOutcome::AlreadyDecided(RequestStatus::Rejected));
    assert_eq!(harness.ledger.get_balance(&seller).unwrap(), Decimal::ZERO);
    assert_eq!(harness.log_count(&seller, TransactionType::AddCredit), 0);
}

#[test]
fn repeated_bulk_approval_applies_once() {
    let harness = TestHarness::new();
    let seller = harness.seller("Bulk");
    let ids: Vec<_> = [dec(1000), dec(2000), dec(3000)]
        .into_iter()
        .map(|amount| harness.ledger.submit_credit_request(&seller, amount).unwrap().id)
        .collect();

    let first = harness.ledger.decide_all(&ids, Decision::Approve);
    let second = harness.ledger.decide_all(&ids, Decision::Approve);

    assert!(first
        .iter()
        .all(|report| report.result == DecisionResult::Applied(RequestStatus::Approved)));
    assert!(second
        .iter()
        .all(|report| report.result == DecisionResult::AlreadyDecided(RequestStatus::Approved)));
    assert_eq!(harness.ledger.get_balance(&seller).unwrap(), dec(6000));
    assert_eq!(harness.log_count(&seller, TransactionType::AddCredit), 3);
    assert_eq!(harness.ledger.list_credit_requests(&seller).unwrap().len(), 3);
    harness.assert_balanced(&seller);
}

// ============================================================================
// Charges
// ============================================================================

#[test]
fn covered_charge_completes() {
    let harness = TestHarness::new();
    let seller = harness.seller("Scenario Two");
    harness.fund(&seller, dec(10000));

    let charge_id = TransactionId::generate();
    let outcome = harness.charge_with_id(charge_id, &seller, dec(3000));

    assert_eq!(outcome, ChargeOutcome::Completed { balance_after: dec(7000) });
    assert_eq!(harness.ledger.get_balance(&seller).unwrap(), dec(7000));

    let charge = harness.ledger.get_charge(&charge_id).unwrap();
    assert_eq!(charge.status, ChargeStatus::Completed);
    assert_eq!(charge.amount, dec(3000));
    assert_eq!(charge.phone_number.as_str(), PHONE);

    let sales = harness
        .ledger
        .list_transactions(&seller, DateRange::all(), Some(TransactionType::ChargeSale))
        .unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].id, charge_id);
    assert_eq!(sales[0].amount, dec(-3000));
    assert_eq!(sales[0].balance_after, dec(7000));
    harness.assert_balanced(&seller);
}

#[test]
fn uncovered_charge_fails_and_logs_nothing() {
    let harness = TestHarness::new();
    let seller = harness.seller("Scenario Three");
    harness.fund(&seller, dec(1000));

    let charge_id = TransactionId::generate();
    let outcome = harness.charge_with_id(charge_id, &seller, dec(3000));

    assert_eq!(outcome, ChargeOutcome::InsufficientFunds { balance: dec(1000) });
    assert_eq!(harness.ledger.get_balance(&seller).unwrap(), dec(1000));
    assert_eq!(
        harness.ledger.get_charge(&charge_id).unwrap().status,
        ChargeStatus::Failed
    );
    assert_eq!(harness.log_count(&seller, TransactionType::ChargeSale), 0);
    harness.assert_balanced(&seller);
}

#[test]
fn redelivered_charge_debits_once() {
    let harness = TestHarness::new();
    let seller = harness.seller("Scenario Five");
    harness.fund(&seller, dec(10000));
    let charge_id = TransactionId::generate();

    let first = harness.charge_with_id(charge_id, &seller, dec(2500));
    let second = harness.charge_with_id(charge_id, &seller, dec(2500));

    assert_eq!(first.status(), ChargeStatus::Completed);
    assert_eq!(
        second,
        ChargeOutcome::AlreadyProcessed {
            status: ChargeStatus::Completed
        }
    );
    assert_eq!(harness.ledger.get_balance(&seller).unwrap(), dec(7500));
    assert_eq!(harness.log_count(&seller, TransactionType::ChargeSale), 1);
    assert_eq!(harness.ledger.list_charges(&seller, DateRange::all()).unwrap().len(), 1);
    harness.assert_balanced(&seller);
}

#[test]
fn invalid_charges_never_reach_the_ledger() {
    let harness = TestHarness::new();
    let seller = harness.seller("Validation");
    harness.fund(&seller, dec(10000));

    let bad = [
        (Decimal::ZERO, PHONE),
        (dec(-500), PHONE),
        (Decimal::new(12345, 3), PHONE),
        (dec(500), "phone"),
        (dec(500), "+12"),
    ];
    for (amount, phone) in bad {
        let result = harness.ledger.charge(TransactionId::generate(), seller, amount, phone);
        assert!(matches!(result, Err(LedgerError::Validation(_))), "{amount} {phone}");
    }

    assert!(harness.ledger.list_charges(&seller, DateRange::all()).unwrap().is_empty());
    assert_eq!(harness.ledger.get_balance(&seller).unwrap(), dec(10000));
}

// ============================================================================
// Sellers and reads
// ============================================================================

#[test]
fn unknown_ids_are_not_found() {
    let harness = TestHarness::new();
    let ghost = credit_ledger_core::SellerId::generate();

    assert!(matches!(
        harness.ledger.get_balance(&ghost),
        Err(LedgerError::SellerNotFound { .. })
    ));
    assert!(matches!(
        harness.ledger.charge(TransactionId::generate(), ghost, dec(100), PHONE),
        Err(LedgerError::SellerNotFound { .. })
    ));
    assert!(matches!(
        harness.ledger.get_charge(&TransactionId::generate()),
        Err(LedgerError::ChargeNotFound { .. })
    ));
    assert!(matches!(
        harness
            .ledger
            .get_credit_request(&credit_ledger_core::CreditRequestId::generate()),
        Err(LedgerError::CreditRequestNotFound { .. })
    ));
    assert!(matches!(
        harness.ledger.list_credit_requests(&ghost),
        Err(LedgerError::SellerNotFound { .. })
    ));
    assert!(matches!(
        harness.ledger.list_charges(&ghost, DateRange::all()),
        Err(LedgerError::SellerNotFound { .. })
    ));
    assert!(matches!(
        harness.ledger.list_transactions(&ghost, DateRange::all(), None),
        Err(LedgerError::SellerNotFound { .. })
    ));
}

#[test]
fn seller_delete_is_restricted() {
    let harness = TestHarness::new();
    let idle = harness.seller("Idle");
    let active = harness.seller("Active");
    harness.ledger.submit_credit_request(&active, dec(100)).unwrap();

    assert_eq!(harness.ledger.list_sellers().unwrap().len(), 2);
    harness.ledger.delete_seller(&idle).unwrap();
    assert!(matches!(
        harness.ledger.delete_seller(&active),
        Err(LedgerError::SellerInUse { .. })
    ));
    assert_eq!(harness.ledger.list_sellers().unwrap().len(), 1);
}

#[test]
fn pending_queue_lists_undecided_requests() {
    let harness = TestHarness::new();
    let a = harness.seller("A");
    let b = harness.seller("B");
    let approved = harness.ledger.submit_credit_request(&a, dec(100)).unwrap();
    harness.ledger.submit_credit_request(&a, dec(200)).unwrap();
    harness.ledger.submit_credit_request(&b, dec(300)).unwrap();
    harness.ledger.decide(&approved.id, Decision::Approve).unwrap();

    let pending = harness
        .ledger
        .list_credit_requests_by_status(RequestStatus::Pending)
        .unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|request| request.is_pending()));

    let approved = harness
        .ledger
        .list_credit_requests_by_status(RequestStatus::Approved)
        .unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].seller_id, a);
}

#[test]
fn balance_survives_reopen() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config = credit_ledger_service::LedgerConfig {
        data_dir: temp_dir.path().to_string_lossy().to_string(),
        ..credit_ledger_service::LedgerConfig::default()
    };

    let seller = {
        let ledger = credit_ledger_service::Ledger::open(&config).unwrap();
        let seller = ledger.create_seller("Durable").unwrap().id;
        let request = ledger.submit_credit_request(&seller, dec(4200)).unwrap();
        ledger.decide(&request.id, Decision::Approve).unwrap();
        ledger
            .charge(TransactionId::generate(), seller, dec(200), PHONE)
            .unwrap();
        seller
    };

    let reopened = credit_ledger_service::Ledger::open(&config).unwrap();
    assert_eq!(reopened.get_balance(&seller).unwrap(), dec(4000));
    assert!(reopened.reconcile(&seller).unwrap().balanced);
}
