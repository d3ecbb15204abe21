use excel_analytics::{
    ApiError,
    models::{
        AccountView, ContactPatch, ContactStatus, CreateAccountRequest, FileRecord, LoginRequest,
        NewAnalysis, NewContactMessage, RegisterRequest, Role, UpdateAccountRequest, Validate,
        is_valid_email, normalize_email,
    },
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

fn validation_message(result: Result<(), ApiError>) -> String {
    match result {
        Err(ApiError::Validation(message)) => message,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

// --- Wire format ---

#[test]
fn test_role_wire_names() {
    assert_eq!(serde_json::to_value(Role::Superadmin).unwrap(), json!("superadmin"));
    assert_eq!(
        serde_json::from_value::<Role>(json!("admin")).unwrap(),
        Role::Admin
    );
    assert!(serde_json::from_value::<Role>(json!("Admin")).is_err());
    assert_eq!(Role::try_from("user".to_string()).unwrap(), Role::User);
    assert!(Role::try_from("root".to_string()).is_err());
}

#[test]
fn test_role_order_is_privilege() {
    assert!(Role::Superadmin > Role::Admin);
    assert!(Role::Admin > Role::User);
    assert!(!Role::User.is_admin_level());
    assert!(Role::Admin.is_admin_level());
}

#[test]
fn test_contact_status_wire_names() {
    assert_eq!(
        serde_json::to_value(ContactStatus::InProgress).unwrap(),
        json!("in-progress")
    );
    assert_eq!(ContactStatus::default(), ContactStatus::New);
    let patch: ContactPatch = serde_json::from_value(json!({"status": "resolved"})).unwrap();
    assert_eq!(patch.status, Some(ContactStatus::Resolved));
}

#[test]
fn test_account_view_is_camel_case_without_hash() {
    let view = AccountView {
        id: Uuid::new_v4(),
        name: "Alice".into(),
        email: "alice@example.com".into(),
        role: Role::User,
        created_at: Utc::now(),
    };
    let value = serde_json::to_value(&view).unwrap();
    assert!(value.get("createdAt").is_some());
    assert!(value.get("passwordHash").is_none());
    assert!(value.get("password_hash").is_none());
}

#[test]
fn test_file_record_hides_storage_key() {
    let record = FileRecord {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        name: "sales.xlsx".into(),
        storage_key: "uploads/secret/key.xlsx".into(),
        mimetype: "application/vnd.ms-excel".into(),
        size_bytes: 10,
        row_count: 1,
        rows: json!([{"a": 1}]),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let value = serde_json::to_value(&record).unwrap();
    assert!(value.get("storageKey").is_none());
    assert_eq!(value["ownerId"], json!(record.owner_id));
    assert_eq!(value["rowCount"], json!(1));
}

#[test]
fn test_unknown_fields_are_rejected() {
    let result = serde_json::from_value::<RegisterRequest>(json!({
        "name": "Mallory",
        "email": "m@example.com",
        "password": "pw",
        "role": "superadmin"
    }));
    assert!(result.is_err(), "self-registration must not accept a role");
}

// --- Validation ---

#[test]
fn test_register_requires_every_field() {
    let req = RegisterRequest {
        name: "  ".into(),
        email: "alice@example.com".into(),
        password: "pw".into(),
    };
    assert_eq!(validation_message(req.validate()), "name is required");

    let req = RegisterRequest {
        name: "Alice".into(),
        email: "alice@example.com".into(),
        password: "".into(),
    };
    assert_eq!(validation_message(req.validate()), "password is required");
}

#[test]
fn test_register_rejects_malformed_email() {
    let req = RegisterRequest {
        name: "Alice".into(),
        email: "alice-at-example".into(),
        password: "pw".into(),
    };
    assert_eq!(validation_message(req.validate()), "Enter a valid email");
}

#[test]
fn test_email_shape() {
    assert!(is_valid_email("a@b.co"));
    assert!(is_valid_email("  first.last@sub.example.org "));
    assert!(!is_valid_email("a@b"));
    assert!(!is_valid_email("@b.co"));
    assert!(!is_valid_email("a b@c.de"));
    assert!(!is_valid_email("a@b@c.de"));
    assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
}

#[test]
fn test_login_only_needs_credentials() {
    let req = LoginRequest {
        email: "alice@example.com".into(),
        password: "pw".into(),
        role: None,
    };
    assert!(req.validate().is_ok());
}

#[test]
fn test_partial_updates_reject_blank_values() {
    assert!(UpdateAccountRequest::default().validate().is_ok());

    let blank_name = UpdateAccountRequest {
        name: Some(" ".into()),
        ..Default::default()
    };
    assert_eq!(validation_message(blank_name.validate()), "name is required");

    let bad_email = UpdateAccountRequest {
        email: Some("nope".into()),
        ..Default::default()
    };
    assert_eq!(validation_message(bad_email.validate()), "Enter a valid email");
}

#[test]
fn test_create_account_role_defaults_to_user() {
    let req: CreateAccountRequest = serde_json::from_value(json!({
        "name": "Bob",
        "email": "bob@example.com",
        "password": "pw"
    }))
    .unwrap();
    assert_eq!(req.role, Role::User);
    assert!(req.validate().is_ok());
}

#[test]
fn test_analysis_requires_name_and_result() {
    let missing_result = NewAnalysis {
        file_id: None,
        file_name: "sales.xlsx".into(),
        result: serde_json::Value::Null,
    };
    assert_eq!(validation_message(missing_result.validate()), "result is required");

    let ok: NewAnalysis = serde_json::from_value(json!({
        "fileName": "sales.xlsx",
        "result": {"chart": "bar", "x": "Region", "y": "Total"}
    }))
    .unwrap();
    assert!(ok.validate().is_ok());
}

#[test]
fn test_contact_message_validation() {
    let msg = NewContactMessage {
        name: "Visitor".into(),
        email: "visitor@example".into(),
        message: "Hello".into(),
    };
    assert_eq!(validation_message(msg.validate()), "Enter a valid email");

    let msg = NewContactMessage {
        name: "Visitor".into(),
        email: "visitor@example.com".into(),
        message: "".into(),
    };
    assert_eq!(validation_message(msg.validate()), "message is required");
}
