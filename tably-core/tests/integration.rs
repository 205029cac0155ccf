//! Integration tests for the tably session flow and history store
//!
//! These drive the core the way the TUI does: session transitions in,
//! settlement and persisted records out.

use serde_json::json;
use tably_core::db::Database;
use tably_core::{RawLineItem, Session, Stage, TipMode, DEFAULT_PARTICIPANT_ID};
use tempfile::TempDir;

const EPS: f64 = 1e-9;

fn raw(name: &str, price: f64) -> RawLineItem {
    RawLineItem {
        name: Some(name.to_string()),
        price: Some(json!(price)),
        quantity: Some(1),
    }
}

// ============================================
// End-to-end session flow
// ============================================

#[test]
fn test_capture_assign_review_finalize() {
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();

    let mut session = Session::new();
    session.start_capture();
    session.complete_capture(vec![raw("Burger", 10.0), raw("Fries", 4.0)]);
    assert_eq!(*session.stage(), Stage::Assigning);

    // Burger -> {A}, Fries -> {A, B}
    let alice = session.add_participant("Alice").expect("added");
    let items: Vec<String> = session.items().iter().map(|i| i.id.clone()).collect();
    session.toggle_item(&items[0], DEFAULT_PARTICIPANT_ID);
    session.toggle_item(&items[1], DEFAULT_PARTICIPANT_ID);
    session.toggle_item(&items[1], &alice);
    assert!(session.is_fully_assigned());

    session.finish_assigning();
    session.set_tax_text("1.40".to_string());
    session.toggle_tip_mode(); // absolute
    session.set_tip_text("2.80".to_string());

    let split = session.current_split();
    assert!((split.subtotal - 14.0).abs() < EPS);
    assert!((split.grand_total - 18.2).abs() < EPS);

    let me = split
        .per_participant
        .iter()
        .find(|s| s.participant.id == DEFAULT_PARTICIPANT_ID)
        .unwrap();
    let her = split
        .per_participant
        .iter()
        .find(|s| s.participant.id == alice)
        .unwrap();
    assert!((me.item_subtotal - 12.0).abs() < EPS);
    assert!((her.item_subtotal - 2.0).abs() < EPS);
    assert!((me.total - 15.6).abs() < EPS);
    assert!((her.total - 2.6).abs() < EPS);
    assert!((me.total + her.total - split.grand_total).abs() < EPS);

    // Finalize: record goes to the store, session resets to Home
    let record = session.finalize(Some("Testaurant".to_string())).unwrap();
    db.save_record(&record).unwrap();
    assert_eq!(*session.stage(), Stage::Home);
    assert_eq!(session.participants().len(), 1);

    let recent = db.load_recent().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].label.as_deref(), Some("Testaurant"));
    assert!((recent[0].total - 18.2).abs() < EPS);
    assert_eq!(recent[0].items.len(), 2);
    assert_eq!(recent[0].participants.len(), 2);
}

#[test]
fn test_reopen_record_from_history() {
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();

    let mut session = Session::new();
    session.start_capture();
    session.complete_capture(vec![raw("Ramen", 16.0)]);
    let item = session.items()[0].id.clone();
    session.toggle_item(&item, DEFAULT_PARTICIPANT_ID);
    session.finish_assigning();
    session.set_tax_text("1.28".to_string());
    session.set_tip_text("20".to_string()); // percent
    let expected = session.current_split();
    db.save_record(&session.finalize(None).unwrap()).unwrap();

    // A later session reopens the record straight into Review
    let record = db.load_recent().unwrap().remove(0);
    let mut reopened = Session::new();
    reopened.open_record(record);
    assert_eq!(*reopened.stage(), Stage::Reviewing);
    assert_eq!(reopened.tip_mode(), TipMode::Absolute);

    let split = reopened.current_split();
    assert!((split.grand_total - expected.grand_total).abs() < EPS);
    assert!((split.tip_amount - expected.tip_amount).abs() < EPS);
}

#[test]
fn test_unattributed_spend_property() {
    // sum(per_participant.total) == attributed subtotal + tax + tip
    let mut session = Session::new();
    session.start_capture();
    session.complete_capture(vec![raw("Shared", 12.0), raw("Orphan", 6.0)]);
    let shared = session.items()[0].id.clone();
    session.toggle_item(&shared, DEFAULT_PARTICIPANT_ID);
    session.finish_assigning();
    session.set_tax_text("1.80".to_string());
    session.toggle_tip_mode();
    session.set_tip_text("3.60".to_string());

    let split = session.current_split();
    assert!((split.subtotal - 18.0).abs() < EPS);

    let attributed_subtotal = 12.0;
    let proportion = attributed_subtotal / split.subtotal;
    let expected_billed =
        attributed_subtotal + split.tax_amount * proportion + split.tip_amount * proportion;
    let billed: f64 = split.per_participant.iter().map(|s| s.total).sum();
    assert!((billed - expected_billed).abs() < EPS);
}

// ============================================
// History store on disk
// ============================================

#[test]
fn test_history_cap_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.db");
    let db = Database::open(&path).unwrap();
    db.migrate().unwrap();

    for n in 0..11 {
        let mut session = Session::new();
        session.start_capture();
        session.complete_capture(vec![raw("Coffee", 3.0 + n as f64)]);
        let item = session.items()[0].id.clone();
        session.toggle_item(&item, DEFAULT_PARTICIPANT_ID);
        session.finish_assigning();
        db.save_record(&session.finalize(Some(format!("visit {}", n))).unwrap())
            .unwrap();
    }

    let recent = db.load_recent().unwrap();
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[0].label.as_deref(), Some("visit 10"));
    assert_eq!(recent[9].label.as_deref(), Some("visit 1"));
}

#[test]
fn test_history_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.db");

    {
        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        let mut session = Session::new();
        session.start_capture();
        session.complete_capture(vec![raw("Pizza", 20.0)]);
        let item = session.items()[0].id.clone();
        session.toggle_item(&item, DEFAULT_PARTICIPANT_ID);
        session.finish_assigning();
        db.save_record(&session.finalize(None).unwrap()).unwrap();
    }

    let db = Database::open(&path).unwrap();
    db.migrate().unwrap();
    let recent = db.load_recent().unwrap();
    assert_eq!(recent.len(), 1);
    assert!((recent[0].items[0].price - 20.0).abs() < EPS);
}
