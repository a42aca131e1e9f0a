use fielddb::{
    Database, DatabaseAction, ErrorKind, FieldAction, FieldDbError, PermissionTarget,
    PermissionType, ValueKind,
};

fn allow_db(db: &mut Database, user: &str, action: DatabaseAction) {
    db.set_permission(user, PermissionTarget::Database(action), PermissionType::Allow)
        .unwrap();
}

/// Root with an `Id`/`Name` schema and a user `bob` that may log in.
fn setup() -> Database {
    let mut db = Database::new("company", "root", "secret");
    db.create_key_field("Id", ValueKind::Integer, 4).unwrap();
    db.create_item_field("Name", "Id", ValueKind::Text).unwrap();
    db.insert("Id", 1).unwrap();
    db.add_user("bob", "bobpw").unwrap();
    allow_db(&mut db, "bob", DatabaseAction::Login);
    db
}

#[test]
fn test_new_user_is_denied_everything() {
    let mut db = setup();
    db.login("bob", "bobpw").unwrap();
    assert_eq!(db.current_user(), "bob");

    let err = db.get("Id", 0).unwrap_err();
    assert!(matches!(
        err,
        FieldDbError::FieldActionDenied { ref user, ref field, action: FieldAction::Get }
            if user == "bob" && field == "Id"
    ));
    let err = db.create_key_field("Other", ValueKind::Text, 1).unwrap_err();
    assert!(matches!(
        err,
        FieldDbError::DatabaseActionDenied { action: DatabaseAction::CreateField, .. }
    ));
    assert!(db.all_fields().unwrap().is_empty());
}

#[test]
fn test_field_permission_layering() {
    use PermissionType::{Allow, Deny, None as NoOpinion};

    // (global Get, field specific Get on Name, expected for Name, expected for Id)
    let cases = vec![
        (None, None, false, false),
        (Some(Allow), None, true, true),
        (Some(Deny), Some(Allow), true, false),
        (Some(Allow), Some(Deny), false, true),
        (Some(Allow), Some(NoOpinion), true, true),
        (Some(NoOpinion), Some(NoOpinion), false, false),
        (None, Some(Allow), true, false),
    ];

    for (global, local, name_allowed, id_allowed) in cases {
        let mut db = setup();
        if let Some(p) = global {
            db.set_permission("bob", PermissionTarget::GlobalField(FieldAction::Get), p)
                .unwrap();
        }
        if let Some(p) = local {
            db.set_permission(
                "bob",
                PermissionTarget::Field("Name".to_string(), FieldAction::Get),
                p,
            )
            .unwrap();
        }
        db.login("bob", "bobpw").unwrap();

        assert_eq!(db.get("Name", 0).is_ok(), name_allowed, "Name with {global:?}/{local:?}");
        assert_eq!(db.get("Id", 0).is_ok(), id_allowed, "Id with {global:?}/{local:?}");
    }
}

#[test]
fn test_root_permissions_cannot_change() {
    let mut db = setup();
    let targets = vec![
        PermissionTarget::Database(DatabaseAction::Login),
        PermissionTarget::GlobalField(FieldAction::Get),
        PermissionTarget::Field("Id".to_string(), FieldAction::Insert),
    ];
    for target in targets {
        for permission in [PermissionType::Allow, PermissionType::Deny, PermissionType::None] {
            let err = db.set_permission("root", target.clone(), permission).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        }
    }
    // Root still does everything.
    db.insert("Id", 2).unwrap();
}

#[test]
fn test_editing_requires_edit_permissions() {
    let mut db = setup();
    db.add_user("carol", "carolpw").unwrap();
    db.login("bob", "bobpw").unwrap();

    let err = db
        .set_permission("carol", PermissionTarget::Database(DatabaseAction::Login), PermissionType::Allow)
        .unwrap_err();
    assert!(matches!(err, FieldDbError::AclEditDenied { .. }));

    db.login("root", "secret").unwrap();
    allow_db(&mut db, "bob", DatabaseAction::EditPermissions);
    db.login("bob", "bobpw").unwrap();
    db.set_permission("carol", PermissionTarget::Database(DatabaseAction::Login), PermissionType::Allow)
        .unwrap();
    // A user may also edit its own list once it holds Edit Permissions.
    db.set_permission("bob", PermissionTarget::GlobalField(FieldAction::Get), PermissionType::Allow)
        .unwrap();
    assert!(db.get("Id", 0).is_ok());
}

#[test]
fn test_login_rules() {
    let mut db = setup();
    assert!(matches!(db.login("bob", "wrong"), Err(FieldDbError::InvalidLogin)));
    assert!(matches!(db.login("nobody", "x"), Err(FieldDbError::InvalidLogin)));
    assert_eq!(db.current_user(), "root");

    db.add_user("dave", "davepw").unwrap();
    let err = db.login("dave", "davepw").unwrap_err();
    assert!(matches!(
        err,
        FieldDbError::DatabaseActionDenied { action: DatabaseAction::Login, .. }
    ));
    assert_eq!(db.current_user(), "root");
}

#[test]
fn test_user_visibility() {
    let mut db = setup();
    allow_db(&mut db, "bob", DatabaseAction::AddUser);
    allow_db(&mut db, "bob", DatabaseAction::DeleteUser);
    db.add_user("carol", "carolpw").unwrap();

    db.login("bob", "bobpw").unwrap();
    db.add_user("erin", "erinpw").unwrap();
    assert_eq!(db.all_users().unwrap(), vec!["erin".to_string()]);

    // Users bob did not create look missing.
    assert!(matches!(db.delete_user("carol"), Err(FieldDbError::UserNotFound(_))));
    assert!(matches!(db.user_acl("carol"), Err(FieldDbError::UserNotFound(_))));
    db.delete_user("erin").unwrap();
    assert!(db.all_users().unwrap().is_empty());

    db.login("root", "secret").unwrap();
    assert_eq!(
        db.all_users().unwrap(),
        vec!["bob".to_string(), "carol".to_string(), "root".to_string()]
    );
}

#[test]
fn test_delete_user_guards() {
    let mut db = setup();
    let err = db.delete_user("root").unwrap_err();
    assert!(matches!(err, FieldDbError::UserCannotDeleteItself(_)));

    allow_db(&mut db, "bob", DatabaseAction::DeleteUser);
    allow_db(&mut db, "bob", DatabaseAction::ViewUsers);
    db.login("bob", "bobpw").unwrap();
    let err = db.delete_user("root").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(matches!(db.delete_user("bob"), Err(FieldDbError::UserCannotDeleteItself(_))));

    db.login("root", "secret").unwrap();
    db.delete_user("bob").unwrap();
    assert!(matches!(db.login("bob", "bobpw"), Err(FieldDbError::InvalidLogin)));
    assert!(matches!(db.add_user("root", "x"), Err(FieldDbError::DuplicateUser(_))));
}

#[test]
fn test_see_field_controls_lookup() {
    let mut db = setup();
    db.set_permission(
        "bob",
        PermissionTarget::Field("Name".to_string(), FieldAction::SeeField),
        PermissionType::Allow,
    )
    .unwrap();
    db.login("bob", "bobpw").unwrap();

    assert_eq!(db.field("Name").unwrap().owner.as_deref(), Some("Id"));
    assert!(matches!(
        db.field("Id"),
        Err(FieldDbError::FieldActionDenied { action: FieldAction::SeeField, .. })
    ));
    let visible: Vec<String> = db.all_fields().unwrap().into_iter().map(|f| f.name).collect();
    assert_eq!(visible, vec!["Name".to_string()]);
}

#[test]
fn test_permission_on_missing_field() {
    let mut db = setup();
    let err = db
        .set_permission(
            "bob",
            PermissionTarget::Field("Ghost".to_string(), FieldAction::Get),
            PermissionType::Allow,
        )
        .unwrap_err();
    assert!(matches!(err, FieldDbError::FieldNotFound(_)));
    let err = db
        .set_permission("ghost", PermissionTarget::GlobalField(FieldAction::Get), PermissionType::Allow)
        .unwrap_err();
    assert!(matches!(err, FieldDbError::UserNotFound(_)));
}
