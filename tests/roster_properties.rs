//! End-to-end checks of the roster operations against a real file.
//!
//! Each test works in its own temp directory with its own config file, so
//! nothing touches the user's home directory.

use std::collections::BTreeMap;
use std::fs;

use student_roster::config::ConfigStore;
use student_roster::manager::{Manager, Session};
use student_roster::model::{Column, ColumnPosition, ColumnType, Schema, Value, ROLL_NUMBER};
use student_roster::storage;
use student_roster::validation::{self, ValidationRules};
use student_roster::{RosterError, ValidationError};
use tempfile::TempDir;

fn roster_with_two_students() -> (TempDir, Manager, Session) {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = Manager::new(ConfigStore::load(dir.path().join("config.json")));
    let schema = Schema::new(vec![
        Column::new("Name", ColumnType::String),
        Column::new("Age", ColumnType::Integer),
        Column::new("Email", ColumnType::String),
    ])
    .unwrap();
    let mut session = manager.create(&dir.path().join("students.csv"), schema).unwrap();

    for (roll, name, age, email) in [
        ("R1", "Ada Lovelace", "20", "ada@gmail.com"),
        ("R2", "Alan Turing", "22", "alan@outlook.com"),
    ] {
        let fields = BTreeMap::from([
            ("Name".to_string(), name.to_string()),
            ("Age".to_string(), age.to_string()),
            ("Email".to_string(), email.to_string()),
        ]);
        manager.add_student(&mut session, roll, &fields).unwrap();
    }
    (dir, manager, session)
}

// =============================================================================
// Round trips and uniqueness
// =============================================================================

#[test]
fn stored_students_read_back_equal() {
    let (_dir, manager, mut session) = roster_with_two_students();
    let in_memory = session.roster().clone();
    manager.view_students(&mut session).unwrap();
    assert_eq!(session.roster(), &in_memory);

    let text = fs::read_to_string(session.path()).unwrap();
    assert_eq!(storage::decode(&text).unwrap(), in_memory);
}

#[test]
fn duplicate_roll_number_always_fails() {
    let (_dir, manager, mut session) = roster_with_two_students();
    let before = fs::read(session.path()).unwrap();

    let valid = BTreeMap::from([
        ("Name".to_string(), "Grace Hopper".to_string()),
        ("Age".to_string(), "30".to_string()),
        ("Email".to_string(), "grace@yahoo.com".to_string()),
    ]);
    let invalid = BTreeMap::from([
        ("Name".to_string(), "Gr4ce".to_string()),
        ("Age".to_string(), "300".to_string()),
        ("Email".to_string(), "nope".to_string()),
    ]);
    for fields in [valid, invalid] {
        let err = manager.add_student(&mut session, "R1", &fields).unwrap_err();
        assert!(matches!(
            err,
            RosterError::Validation(ValidationError::DuplicateRollNumber(_))
        ));
    }
    assert_eq!(fs::read(session.path()).unwrap(), before);
}

#[test]
fn update_to_existing_roll_number_fails() {
    let (_dir, manager, mut session) = roster_with_two_students();
    let before = fs::read(session.path()).unwrap();
    let err = manager
        .update_student(&mut session, "R2", ROLL_NUMBER, "R1")
        .unwrap_err();
    assert!(matches!(
        err,
        RosterError::Validation(ValidationError::DuplicateRollNumber(_))
    ));
    assert_eq!(fs::read(session.path()).unwrap(), before);
}

#[test]
fn rejected_field_update_leaves_file_untouched() {
    let (_dir, manager, mut session) = roster_with_two_students();
    let before = fs::read(session.path()).unwrap();
    for (field, value) in [("Age", "101"), ("Email", "ada@evil.xyz"), ("Name", "")] {
        assert!(manager.update_student(&mut session, "R1", field, value).is_err());
    }
    assert!(matches!(
        manager.replace_column(&mut session, "Phone", "Mobile", ColumnType::String),
        Err(RosterError::NotFound { what: "column", .. })
    ));
    assert_eq!(fs::read(session.path()).unwrap(), before);
}

// =============================================================================
// Validators
// =============================================================================

#[test]
fn age_bounds() {
    for ok in ["5", "100", "42"] {
        assert!(validation::age("Age", ok).is_ok());
    }
    for bad in ["4", "101", "abc", "5.5"] {
        assert!(validation::age("Age", bad).is_err());
    }
}

#[test]
fn email_allow_list() {
    let rules = ValidationRules {
        email_domains: vec!["example.com".to_string()],
        ..ValidationRules::default()
    };
    assert!(validation::email("a@example.com", &rules).is_ok());
    assert!(validation::email("a@@b.com", &rules).is_err());
    assert!(validation::email("a@evil.xyz", &rules).is_err());
    let too_long = format!("{}@example.com", "x".repeat(rules.email_max_length));
    assert!(validation::email(&too_long, &rules).is_err());
}

// =============================================================================
// Schema changes
// =============================================================================

#[test]
fn added_column_is_backfilled() {
    let (_dir, manager, mut session) = roster_with_two_students();
    manager
        .add_column(&mut session, "gpa", ColumnType::Float, "0.0", ColumnPosition::End)
        .unwrap();

    let students = manager.view_students(&mut session).unwrap();
    assert_eq!(students.len(), 2);
    for student in students {
        assert_eq!(student.get("gpa"), Some(&Value::Float(0.0)));
    }
}

#[test]
fn bad_backfill_leaves_file_untouched() {
    let (_dir, manager, mut session) = roster_with_two_students();
    let before = fs::read(session.path()).unwrap();
    let err = manager
        .add_column(&mut session, "gpa", ColumnType::Float, "high", ColumnPosition::End)
        .unwrap_err();
    assert!(matches!(
        err,
        RosterError::Validation(ValidationError::TypeMismatch { .. })
    ));
    assert_eq!(fs::read(session.path()).unwrap(), before);
    assert!(session.roster().schema().column("gpa").is_none());
}

#[test]
fn retyping_non_integral_floats_is_atomic() {
    let (_dir, manager, mut session) = roster_with_two_students();
    manager
        .add_column(&mut session, "gpa", ColumnType::Float, "0.0", ColumnPosition::End)
        .unwrap();
    manager.update_student(&mut session, "R2", "gpa", "3.5").unwrap();
    let before = fs::read(session.path()).unwrap();

    let err = manager
        .replace_column(&mut session, "gpa", "gpa", ColumnType::Integer)
        .unwrap_err();
    assert!(matches!(
        err,
        RosterError::Validation(ValidationError::TypeMismatch { .. })
    ));
    assert_eq!(fs::read(session.path()).unwrap(), before);

    // every value integral: the same change goes through
    manager.update_student(&mut session, "R2", "gpa", "3.0").unwrap();
    manager
        .replace_column(&mut session, "gpa", "gpa", ColumnType::Integer)
        .unwrap();
    assert_eq!(
        session.roster().find("R2").unwrap().get("gpa"),
        Some(&Value::Integer(3))
    );
}

#[test]
fn identity_column_cannot_be_deleted() {
    let (_dir, manager, mut session) = roster_with_two_students();
    let before = fs::read(session.path()).unwrap();
    for name in [ROLL_NUMBER, "Roll Number"] {
        assert!(matches!(
            manager.delete_column(&mut session, name),
            Err(RosterError::ProtectedColumn(_))
        ));
    }
    assert_eq!(fs::read(session.path()).unwrap(), before);
}

#[test]
fn deleted_column_disappears_from_every_row() {
    let (_dir, manager, mut session) = roster_with_two_students();
    manager.delete_column(&mut session, "Email").unwrap();
    let text = fs::read_to_string(session.path()).unwrap();
    assert!(!text.contains("Email"));
    assert!(text.starts_with("roll_number:string,Name:string,Age:integer\n"));
}

// =============================================================================
// Corrupt files
// =============================================================================

#[test]
fn mismatched_row_is_reported_not_dropped() {
    let (_dir, mut manager, mut session) = roster_with_two_students();
    let mut text = fs::read_to_string(session.path()).unwrap();
    text.push_str("R3,{\"Name\":\"Ghost\"}\n");
    fs::write(session.path(), &text).unwrap();

    match manager.view_students(&mut session) {
        Err(RosterError::RowParse {
            line, roll_number, ..
        }) => {
            assert_eq!(line, 4);
            assert_eq!(roll_number, "R3");
        }
        other => panic!("expected a row error, got {other:?}"),
    }

    // mutations refuse to run on a file they cannot read
    let path = session.path().to_path_buf();
    assert!(manager.delete_student(&mut session, "R1").is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), text);
    assert!(matches!(
        manager.change_file_path(&mut session, &path),
        Err(RosterError::RowParse { line: 4, .. })
    ));
}
