//! Integration tests for the full lending engine over the in-memory store.
//!
//! Verifies:
//! - conservation and non-negativity over arbitrary movement sequences
//! - set expansion into weighted component movements
//! - session lifecycle: partial returns, over-return rejection, closing
//! - restricted-entity access policy
//! - batch atomicity: a failing line leaves the whole batch unapplied

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use gearlog_auth::{Caller, Role};
use gearlog_core::{ItemId, LendingError, LineId, SessionId, TransactionId, UserId};
use gearlog_inventory::{SetComponent, TransactionKind};
use gearlog_lending::{
    BatchLine, BatchRequest, ProductionMetadata, SessionCheckinLine, SessionCheckinRequest,
    SessionStatus,
};

use crate::store::InMemoryLendingStore;

fn new_store() -> InMemoryLendingStore {
    gearlog_observability::init();
    InMemoryLendingStore::new()
}

fn admin() -> Caller {
    Caller::new(UserId::new(1), Role::Admin)
}

fn standard() -> Caller {
    Caller::new(UserId::new(2), Role::Standard)
}

fn metadata() -> ProductionMetadata {
    ProductionMetadata {
        production_name: "Spring gala".to_string(),
        contact_name: "Rae".to_string(),
        contact_surname: "Lindqvist".to_string(),
        organization: "City Theatre".to_string(),
        email: "rae@example.com".to_string(),
        telephone: "555-0142".to_string(),
        pickup_date: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        restitution_date: Utc.with_ymd_and_hms(2026, 3, 8, 18, 0, 0).unwrap(),
        tech_person: Some("Io".to_string()),
    }
}

fn line(id: ItemId, qty: i64) -> BatchLine {
    BatchLine {
        line_id: LineId::new(id.get()),
        qty,
    }
}

fn checkout(lines: Vec<BatchLine>, with_session: bool) -> BatchRequest {
    BatchRequest {
        kind: TransactionKind::Checkout,
        lines,
        note: None,
        metadata: with_session.then(metadata),
    }
}

fn checkin(lines: Vec<BatchLine>) -> BatchRequest {
    BatchRequest {
        kind: TransactionKind::Checkin,
        lines,
        note: None,
        metadata: None,
    }
}

/// First CHECKOUT transaction recorded for an item under a session.
async fn checkout_transaction_id(
    store: &InMemoryLendingStore,
    session_id: SessionId,
    item_id: ItemId,
) -> TransactionId {
    store
        .transactions()
        .await
        .iter()
        .find(|t| {
            t.session_id == Some(session_id)
                && t.item_id == item_id
                && t.kind == TransactionKind::Checkout
        })
        .map(|t| t.id)
        .expect("checkout transaction should exist")
}

fn return_line(transaction_id: TransactionId, item_id: ItemId, qty: i64) -> SessionCheckinLine {
    SessionCheckinLine {
        transaction_id,
        item_id,
        qty,
    }
}

#[tokio::test]
async fn checkout_then_full_return_closes_the_session() {
    let store = new_store();
    let item = store.insert_item("Wireless mic", 10, false).await;

    let outcome = store
        .execute_batch(&admin(), &checkout(vec![line(item, 4)], true))
        .await
        .unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].applied_qty, 4);
    assert_eq!(outcome.results[0].new_quantity, 6);
    let session = outcome.session.unwrap();
    assert_eq!(session.status, SessionStatus::Open);
    assert_eq!(store.item(item).await.unwrap().quantity, 6);

    let tx_id = checkout_transaction_id(&store, session.id, item).await;
    let outcome = store
        .execute_session_checkin(
            &admin(),
            &SessionCheckinRequest {
                session_id: session.id,
                lines: vec![return_line(tx_id, item, 4)],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.results[0].new_quantity, 10);
    assert_eq!(outcome.session.unwrap().status, SessionStatus::Closed);
    assert_eq!(store.item(item).await.unwrap().quantity, 10);
    assert_eq!(
        store.session(session.id).await.unwrap().status,
        SessionStatus::Closed
    );
}

#[tokio::test]
async fn set_checkout_expands_into_weighted_component_movements() {
    let store = new_store();
    let cable = store.insert_item("XLR cable", 20, false).await;
    let stand = store.insert_item("Mic stand", 10, false).await;
    let kit = store
        .insert_set(
            "Vocal kit",
            false,
            vec![
                SetComponent {
                    item_id: cable,
                    qty_per_set: 2,
                },
                SetComponent {
                    item_id: stand,
                    qty_per_set: 1,
                },
            ],
        )
        .await;

    let outcome = store
        .execute_batch(
            &standard(),
            &checkout(
                vec![BatchLine {
                    line_id: LineId::new(kit.get()),
                    qty: 3,
                }],
                false,
            ),
        )
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 2);
    let cable_result = outcome.results.iter().find(|r| r.item_id == cable).unwrap();
    assert_eq!(cable_result.applied_qty, 6);
    assert_eq!(cable_result.new_quantity, 14);
    assert_eq!(cable_result.set_id, Some(kit));
    let stand_result = outcome.results.iter().find(|r| r.item_id == stand).unwrap();
    assert_eq!(stand_result.applied_qty, 3);
    assert_eq!(stand_result.new_quantity, 7);

    let transactions = store.transactions().await;
    assert_eq!(transactions.len(), 2);
    assert!(transactions.iter().all(|t| t.kind == TransactionKind::Checkout));
}

#[tokio::test]
async fn over_return_is_rejected_and_changes_nothing() {
    let store = new_store();
    let item = store.insert_item("Dimmer pack", 10, false).await;

    let session = store
        .execute_batch(&admin(), &checkout(vec![line(item, 5)], true))
        .await
        .unwrap()
        .session
        .unwrap();
    let tx_id = checkout_transaction_id(&store, session.id, item).await;

    store
        .execute_session_checkin(
            &admin(),
            &SessionCheckinRequest {
                session_id: session.id,
                lines: vec![return_line(tx_id, item, 3)],
            },
        )
        .await
        .unwrap();
    assert_eq!(store.item(item).await.unwrap().quantity, 8);

    let err = store
        .execute_session_checkin(
            &admin(),
            &SessionCheckinRequest {
                session_id: session.id,
                lines: vec![return_line(tx_id, item, 3)],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LendingError::OverReturn {
            item_id: item,
            requested: 3,
            remaining: 2,
        }
    );
    // Nothing moved: stock, session state, and the log are untouched.
    assert_eq!(store.item(item).await.unwrap().quantity, 8);
    assert_eq!(
        store.session(session.id).await.unwrap().status,
        SessionStatus::Open
    );
    assert_eq!(store.transactions().await.len(), 2);
}

#[tokio::test]
async fn session_closes_only_when_every_item_is_returned() {
    let store = new_store();
    let desk = store.insert_item("Mixing desk", 2, false).await;
    let case = store.insert_item("Flight case", 3, false).await;

    let session = store
        .execute_batch(&admin(), &checkout(vec![line(desk, 2), line(case, 3)], true))
        .await
        .unwrap()
        .session
        .unwrap();
    let desk_tx = checkout_transaction_id(&store, session.id, desk).await;
    let case_tx = checkout_transaction_id(&store, session.id, case).await;

    // Returning the desk alone keeps the session open.
    let outcome = store
        .execute_session_checkin(
            &admin(),
            &SessionCheckinRequest {
                session_id: session.id,
                lines: vec![return_line(desk_tx, desk, 2)],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.session.unwrap().status, SessionStatus::Open);

    // Returning the case in a later batch closes it.
    let outcome = store
        .execute_session_checkin(
            &admin(),
            &SessionCheckinRequest {
                session_id: session.id,
                lines: vec![return_line(case_tx, case, 3)],
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.session.unwrap().status, SessionStatus::Closed);

    // Closed is terminal.
    let err = store
        .execute_session_checkin(
            &admin(),
            &SessionCheckinRequest {
                session_id: session.id,
                lines: vec![return_line(case_tx, case, 1)],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, LendingError::SessionClosed(session.id));
}

#[tokio::test]
async fn restricted_item_requires_a_privileged_role() {
    let store = new_store();
    let item = store.insert_item("Laser projector", 4, true).await;

    let err = store
        .execute_batch(&standard(), &checkout(vec![line(item, 1)], false))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LendingError::AccessDenied {
            entity: "Laser projector".to_string()
        }
    );
    assert_eq!(store.item(item).await.unwrap().quantity, 4);
    assert!(store.transactions().await.is_empty());

    // The same request succeeds for an admin.
    store
        .execute_batch(&admin(), &checkout(vec![line(item, 1)], false))
        .await
        .unwrap();
    assert_eq!(store.item(item).await.unwrap().quantity, 3);
}

#[tokio::test]
async fn restricted_set_is_checked_at_the_set_level() {
    let store = new_store();
    let body = store.insert_item("Camera body", 5, false).await;
    let kit = store
        .insert_set(
            "Broadcast kit",
            true,
            vec![SetComponent {
                item_id: body,
                qty_per_set: 1,
            }],
        )
        .await;

    let err = store
        .execute_batch(
            &standard(),
            &checkout(
                vec![BatchLine {
                    line_id: LineId::new(kit.get()),
                    qty: 1,
                }],
                false,
            ),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LendingError::AccessDenied {
            entity: "Broadcast kit".to_string()
        }
    );
    assert_eq!(store.item(body).await.unwrap().quantity, 5);
}

#[tokio::test]
async fn insufficient_stock_aborts_the_whole_batch() {
    let store = new_store();
    let first = store.insert_item("Truss segment", 5, false).await;
    let second = store.insert_item("Chain hoist", 1, false).await;

    let err = store
        .execute_batch(&admin(), &checkout(vec![line(first, 2), line(second, 3)], false))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LendingError::InsufficientStock {
            item_id: second,
            name: "Chain hoist".to_string(),
            requested: 3,
            available: 1,
        }
    );
    // The first line was valid but must not have been applied.
    assert_eq!(store.item(first).await.unwrap().quantity, 5);
    assert_eq!(store.item(second).await.unwrap().quantity, 1);
    assert!(store.transactions().await.is_empty());
}

#[tokio::test]
async fn unknown_line_fails_before_any_stock_moves() {
    let store = new_store();
    let item = store.insert_item("Fog machine", 2, false).await;

    let err = store
        .execute_batch(
            &admin(),
            &checkout(
                vec![
                    line(item, 1),
                    BatchLine {
                        line_id: LineId::new(99),
                        qty: 1,
                    },
                ],
                false,
            ),
        )
        .await
        .unwrap_err();
    assert_eq!(err, LendingError::LineNotFound(LineId::new(99)));
    assert_eq!(store.item(item).await.unwrap().quantity, 2);
}

#[tokio::test]
async fn oversized_checkin_fails_with_a_typed_error() {
    let store = new_store();
    let item = store.insert_item("Patch cable", 10, false).await;

    let err = store
        .execute_batch(&standard(), &checkin(vec![line(item, i64::MAX)]))
        .await
        .unwrap_err();
    assert!(matches!(err, LendingError::InvalidRequest(_)));
    assert_eq!(store.item(item).await.unwrap().quantity, 10);
    assert!(store.transactions().await.is_empty());
}

#[tokio::test]
async fn oversized_set_quantity_fails_with_a_typed_error() {
    let store = new_store();
    let cable = store.insert_item("XLR cable", 20, false).await;
    let kit = store
        .insert_set(
            "Vocal kit",
            false,
            vec![SetComponent {
                item_id: cable,
                qty_per_set: 2,
            }],
        )
        .await;

    let err = store
        .execute_batch(
            &standard(),
            &checkout(
                vec![BatchLine {
                    line_id: LineId::new(kit.get()),
                    qty: i64::MAX,
                }],
                false,
            ),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LendingError::InvalidRequest(_)));
    assert_eq!(store.item(cable).await.unwrap().quantity, 20);
    assert!(store.transactions().await.is_empty());
}

#[tokio::test]
async fn ad_hoc_checkin_restores_stock_without_a_session() {
    let store = new_store();
    let item = store.insert_item("Gaffer tape", 10, false).await;

    let outcome = store
        .execute_batch(&standard(), &checkin(vec![line(item, 5)]))
        .await
        .unwrap();
    assert!(outcome.session.is_none());
    assert_eq!(store.item(item).await.unwrap().quantity, 15);

    let transactions = store.transactions().await;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].kind, TransactionKind::Checkin);
    assert_eq!(transactions[0].session_id, None);
}

#[tokio::test]
async fn checkout_without_metadata_creates_no_session() {
    let store = new_store();
    let item = store.insert_item("Stage box", 6, false).await;

    let outcome = store
        .execute_batch(&standard(), &checkout(vec![line(item, 2)], false))
        .await
        .unwrap();
    assert!(outcome.session.is_none());
    assert!(store.open_sessions().await.is_empty());
}

#[tokio::test]
async fn unknown_session_and_foreign_transaction_references_are_rejected() {
    let store = new_store();
    let item = store.insert_item("Monitor wedge", 8, false).await;

    let err = store
        .execute_session_checkin(
            &admin(),
            &SessionCheckinRequest {
                session_id: SessionId::new(99),
                lines: vec![return_line(TransactionId::new(1), item, 1)],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, LendingError::SessionNotFound(SessionId::new(99)));

    // A transaction outside the session (ad-hoc checkout) cannot be
    // referenced by a session check-in.
    let session = store
        .execute_batch(&admin(), &checkout(vec![line(item, 2)], true))
        .await
        .unwrap()
        .session
        .unwrap();
    store
        .execute_batch(&admin(), &checkout(vec![line(item, 1)], false))
        .await
        .unwrap();
    let foreign_tx = store
        .transactions()
        .await
        .iter()
        .find(|t| t.session_id.is_none())
        .map(|t| t.id)
        .unwrap();

    let err = store
        .execute_session_checkin(
            &admin(),
            &SessionCheckinRequest {
                session_id: session.id,
                lines: vec![return_line(foreign_tx, item, 1)],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, LendingError::LineNotFound(LineId::new(foreign_tx.get())));
}

#[tokio::test]
async fn set_availability_is_derived_from_current_stock() {
    let store = new_store();
    let cable = store.insert_item("XLR cable", 5, false).await;
    let stand = store.insert_item("Mic stand", 9, false).await;
    let kit = store
        .insert_set(
            "Vocal kit",
            false,
            vec![
                SetComponent {
                    item_id: cable,
                    qty_per_set: 2,
                },
                SetComponent {
                    item_id: stand,
                    qty_per_set: 1,
                },
            ],
        )
        .await;

    assert_eq!(store.set_availability(kit).await, Some(2));

    store
        .execute_batch(
            &standard(),
            &checkout(
                vec![BatchLine {
                    line_id: LineId::new(kit.get()),
                    qty: 1,
                }],
                false,
            ),
        )
        .await
        .unwrap();
    // 3 cables left / 2 per set = 1.
    assert_eq!(store.set_availability(kit).await, Some(1));
}

#[tokio::test]
async fn open_sessions_lists_only_open_ones() {
    let store = new_store();
    let item = store.insert_item("Followspot", 4, false).await;

    let first = store
        .execute_batch(&admin(), &checkout(vec![line(item, 1)], true))
        .await
        .unwrap()
        .session
        .unwrap();
    let second = store
        .execute_batch(&admin(), &checkout(vec![line(item, 1)], true))
        .await
        .unwrap()
        .session
        .unwrap();
    assert_eq!(store.open_sessions().await.len(), 2);

    let tx_id = checkout_transaction_id(&store, first.id, item).await;
    store
        .execute_session_checkin(
            &admin(),
            &SessionCheckinRequest {
                session_id: first.id,
                lines: vec![return_line(tx_id, item, 1)],
            },
        )
        .await
        .unwrap();

    let open = store.open_sessions().await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, second.id);

    let totals = store.session_totals(second.id).await;
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].checked_out, 1);
    assert_eq!(totals[0].checked_in, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Conservation and non-negativity over arbitrary ad-hoc movement
    /// sequences.
    #[test]
    fn conservation_holds_over_random_movements(
        ops in proptest::collection::vec((any::<bool>(), 1i64..6), 1..40)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async move {
            let store = new_store();
            let item = store.insert_item("Cable drum", 10, false).await;
            let caller = standard();
            let mut expected = 10i64;

            for (is_checkout, qty) in ops {
                let kind = if is_checkout {
                    TransactionKind::Checkout
                } else {
                    TransactionKind::Checkin
                };
                let req = BatchRequest {
                    kind,
                    lines: vec![line(item, qty)],
                    note: None,
                    metadata: None,
                };
                match store.execute_batch(&caller, &req).await {
                    Ok(outcome) => {
                        expected += kind.signed_delta(qty);
                        assert_eq!(outcome.results[0].new_quantity, expected);
                    }
                    Err(err) => {
                        // Only a would-be-negative checkout may fail, and it
                        // must leave the quantity unchanged.
                        assert!(matches!(err, LendingError::InsufficientStock { .. }));
                        assert!(is_checkout && expected - qty < 0);
                    }
                }
                let current = store.item(item).await.unwrap().quantity;
                assert!(current >= 0);
                assert_eq!(current, expected);
            }

            // initial - sum(checkout) + sum(checkin) == current
            let moved: i64 = store
                .transactions()
                .await
                .iter()
                .map(|t| t.kind.signed_delta(t.qty))
                .sum();
            assert_eq!(10 + moved, store.item(item).await.unwrap().quantity);
        });
    }
}
