use fielddb::{
    Database, DatabaseAction, DatabaseSnapshot, ErrorKind, FieldAction, FieldDbError, FieldValue,
    PermissionTarget, PermissionType, ValueKind,
};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn populated() -> Database {
    let mut db = Database::new("hr", "root", "secret");
    db.create_key_field("Id", ValueKind::Integer, 3).unwrap();
    db.create_item_field("Name", "Id", ValueKind::Text).unwrap();
    db.create_foreign_key_field("Boss", "Id", "Id").unwrap();
    let ada = db.insert("Id", 1).unwrap();
    let bea = db.insert("Id", 2).unwrap();
    db.put("Name", ada, "ada").unwrap();
    db.put("Name", bea, "bea").unwrap();
    db.put("Boss", bea, Some(ada)).unwrap();

    db.add_user("bob", "bobpw").unwrap();
    db.set_permission("bob", PermissionTarget::Database(DatabaseAction::Login), PermissionType::Allow)
        .unwrap();
    db.set_permission(
        "bob",
        PermissionTarget::Field("Name".to_string(), FieldAction::Get),
        PermissionType::Allow,
    )
    .unwrap();
    db
}

fn edit_snapshot(path: &Path, edit: impl FnOnce(&mut Value)) {
    let mut json: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    edit(&mut json);
    fs::write(path, serde_json::to_string(&json).unwrap()).unwrap();
}

#[test]
fn test_save_and_load_roundtrip() {
    // Setup
    let dir = tempdir().unwrap();
    let path = dir.path().join("hr.json");
    let db = populated();
    db.save(&path).unwrap();

    let mut loaded = Database::load(&path, "root", "secret").unwrap();
    assert_eq!(loaded.name(), "hr");
    assert_eq!(loaded.all_fields().unwrap(), db.all_fields().unwrap());
    for row in 0..2 {
        assert_eq!(loaded.get("Id", row).unwrap(), db.get("Id", row).unwrap());
        assert_eq!(loaded.get("Name", row).unwrap(), db.get("Name", row).unwrap());
        assert_eq!(loaded.get("Boss", row).unwrap(), db.get("Boss", row).unwrap());
    }
    assert_eq!(loaded.user_acl("bob").unwrap(), db.user_acl("bob").unwrap());
    assert_eq!(loaded.all_users().unwrap(), vec!["bob".to_string(), "root".to_string()]);

    // The rebuilt index keeps allocating and validating as before.
    assert_eq!(loaded.insert("Id", 3).unwrap(), 2);
    assert_eq!(loaded.insert("Id", 4).unwrap_err().kind(), ErrorKind::ResourceExhausted);
    loaded.delete("Id", 1).unwrap();
    assert_eq!(loaded.get("Boss", 1).unwrap(), FieldValue::Null);
    loaded.delete_field("Id").unwrap();
    assert!(loaded.all_fields().unwrap().is_empty());
}

#[test]
fn test_load_logs_user_in() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hr.json");
    populated().save(&path).unwrap();

    let db = Database::load(&path, "bob", "bobpw").unwrap();
    assert_eq!(db.current_user(), "bob");
    assert_eq!(db.get("Name", 0).unwrap(), FieldValue::from("ada"));
    assert!(db.get("Id", 0).is_err());

    assert!(matches!(
        Database::load(&path, "bob", "nope"),
        Err(FieldDbError::InvalidLogin)
    ));
}

#[test]
fn test_save_and_restore_need_permission() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hr.json");
    let mut db = populated();
    db.save(&path).unwrap();
    db.login("bob", "bobpw").unwrap();

    let err = db.save(dir.path().join("other.json")).unwrap_err();
    assert!(matches!(err, FieldDbError::DatabaseActionDenied { action: DatabaseAction::Save, .. }));
    let err = db.restore(&path).unwrap_err();
    assert!(matches!(err, FieldDbError::DatabaseActionDenied { action: DatabaseAction::Restore, .. }));
    assert!(!dir.path().join("other.json").exists());
}

#[test]
fn test_restore_replaces_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hr.json");
    let mut db = populated();
    db.save(&path).unwrap();

    db.delete_field("Id").unwrap();
    db.delete_user("bob").unwrap();
    db.create_key_field("Scratch", ValueKind::Boolean, 1).unwrap();

    db.restore(&path).unwrap();
    assert!(db.field("Scratch").is_err());
    assert_eq!(db.get("Name", 1).unwrap(), FieldValue::from("bea"));
    db.login("bob", "bobpw").unwrap();
}

#[test]
fn test_tampered_snapshots_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hr.json");
    let mut db = populated();
    db.save(&path).unwrap();

    let tampers: Vec<(&str, Box<dyn Fn(&mut Value)>)> = vec![
        (
            "duplicate key value",
            Box::new(|json: &mut Value| {
                let entries = &mut json["fields"][0]["index"]["entries"];
                let first = entries[0][1].clone();
                entries[1][1] = first;
            }),
        ),
        (
            "foreign key to a free row",
            Box::new(|json: &mut Value| {
                json["fields"][2]["column"][1] = Value::from(2);
            }),
        ),
        (
            "child depth mismatch",
            Box::new(|json: &mut Value| {
                json["fields"][1]["column"]
                    .as_array_mut()
                    .unwrap()
                    .push(Value::Null);
            }),
        ),
        (
            "exhausted field id counter",
            Box::new(|json: &mut Value| {
                json["next_field_id"] = Value::from(u64::MAX);
            }),
        ),
        (
            "key declared with null kind",
            Box::new(|json: &mut Value| {
                json["fields"][0]["kind"] = Value::from("Null");
            }),
        ),
        (
            "unknown format version",
            Box::new(|json: &mut Value| {
                json["format_version"] = Value::from(2);
            }),
        ),
    ];

    for (description, tamper) in tampers {
        let bad = dir.path().join(format!("{}.json", description.replace(' ', "_")));
        fs::copy(&path, &bad).unwrap();
        edit_snapshot(&bad, |json| tamper(json));

        let err = Database::load(&bad, "root", "secret").err();
        assert!(
            matches!(err, Some(FieldDbError::CorruptSnapshot(_))),
            "{description}: {err:?}"
        );
        let err = db.restore(&bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence, "{description}");
    }
    // Nothing was replaced by the failed restores.
    assert_eq!(db.get("Name", 0).unwrap(), FieldValue::from("ada"));
}

#[test]
fn test_snapshot_file_shape() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("hr.json");
    populated().save(&path).unwrap();

    let snapshot: DatabaseSnapshot = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(snapshot.format_version, fielddb::database::SNAPSHOT_FORMAT_VERSION);
    assert_eq!(snapshot.fields.len(), 3);
    assert_eq!(snapshot.users.len(), 2);
    assert_eq!(snapshot.next_field_id, 3);
}
