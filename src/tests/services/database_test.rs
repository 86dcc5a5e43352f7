use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use crate::models::form::{FormChanges, NewForm};
use crate::models::enums::FieldType;
use crate::models::submission::InsertOutcome;
use crate::services::database::DatabaseService;
use crate::tests::common::fixtures::{
    field_input, new_submission, sample_new_form, test_database,
};

#[test]
fn test_create_form_derives_semantic_ids() {
    let (_dir, db) = test_database();

    let form = db.create_form(sample_new_form("Community Dinner")).unwrap();

    let ids: Vec<Option<&str>> = form.fields.iter().map(|f| f.field_id.as_deref()).collect();
    assert_eq!(
        ids,
        vec![
            Some("full_name"),
            Some("email"),
            Some("dietary_restrictions"),
            Some("number_of_guests")
        ]
    );
    assert_eq!(form.fields[2].options.as_ref().map(Vec::len), Some(2));
    assert!(form.is_active);
    assert!(form.portal_form_id.is_none());

    let stored = db.get_form(&form.id).unwrap().unwrap();
    assert_eq!(stored, form);
}

#[test]
fn test_store_survives_reopen() {
    let (dir, db) = test_database();
    let form = db.create_form(sample_new_form("Dinner")).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 18, 30, 0).unwrap();
    db.insert_submission(new_submission(&form.id, "Jane Doe", Some("jane@example.com"), at))
        .unwrap();
    drop(db);

    let reopened = DatabaseService::new(dir.path()).unwrap();
    let submissions = reopened.list_submissions(&form.id).unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].submitted_at, at);
    assert_eq!(submissions[0].responses["number_of_guests"], json!(2));
    assert_eq!(reopened.get_form(&form.id).unwrap().unwrap().fields.len(), 4);
}

#[test]
fn test_insert_submission_is_unique_on_key() {
    let (_dir, db) = test_database();
    let form = db.create_form(sample_new_form("Dinner")).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 18, 30, 0).unwrap();

    let first = match db
        .insert_submission(new_submission(&form.id, "Jane Doe", Some("jane@example.com"), at))
        .unwrap()
    {
        InsertOutcome::Inserted(s) => s,
        other => panic!("expected insert, got {:?}", other),
    };

    match db
        .insert_submission(new_submission(&form.id, "Jane Doe", Some("jane@example.com"), at))
        .unwrap()
    {
        InsertOutcome::Duplicate(existing) => assert_eq!(existing.id, first.id),
        other => panic!("expected duplicate, got {:?}", other),
    }

    // A different email or timestamp is a different submission
    assert!(matches!(
        db.insert_submission(new_submission(&form.id, "Jane Doe", None, at)).unwrap(),
        InsertOutcome::Inserted(_)
    ));
    assert!(matches!(
        db.insert_submission(new_submission(
            &form.id,
            "Jane Doe",
            Some("jane@example.com"),
            at + Duration::seconds(1)
        ))
        .unwrap(),
        InsertOutcome::Inserted(_)
    ));
    assert_eq!(db.count_submissions(&form.id).unwrap(), 3);
}

#[test]
fn test_update_form_replaces_fields_and_clears_nullable() {
    let (_dir, db) = test_database();
    let mut new_form: NewForm = sample_new_form("Dinner");
    new_form.max_entries = Some(50);
    let form = db.create_form(new_form).unwrap();
    let old_field_ids: Vec<String> = form.fields.iter().map(|f| f.id.clone()).collect();

    let changes: FormChanges = serde_json::from_value(json!({
        "title": "Spring Dinner",
        "maxEntries": null,
        "fields": [{ "label": "Contact Email", "fieldType": "EMAIL", "required": true }]
    }))
    .unwrap();
    let updated = db.update_form(&form.id, &changes).unwrap().unwrap();

    assert_eq!(updated.title, "Spring Dinner");
    assert_eq!(updated.max_entries, None);
    assert_eq!(updated.description.as_deref(), Some("Annual community dinner"));
    assert_eq!(updated.fields.len(), 1);
    assert_eq!(updated.fields[0].field_id.as_deref(), Some("contact_email"));
    assert!(!old_field_ids.contains(&updated.fields[0].id));
    assert!(updated.updated_at >= form.updated_at);

    assert!(db.update_form("missing", &changes).unwrap().is_none());
}

#[test]
fn test_list_forms_filters_inactive_and_counts() {
    let (_dir, db) = test_database();
    let open = db.create_form(sample_new_form("Open")).unwrap();
    let closed = db.create_form(sample_new_form("Closed")).unwrap();
    let deactivate = FormChanges {
        is_active: Some(false),
        ..Default::default()
    };
    db.update_form(&closed.id, &deactivate).unwrap();
    db.insert_submission(new_submission(&open.id, "Jane", None, Utc::now()))
        .unwrap();

    let active = db.list_forms(false).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].form.id, open.id);
    assert_eq!(active[0].submission_count, 1);

    let all = db.list_forms(true).unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|summary| summary.form.id == closed.id && !summary.form.is_active));
}

#[test]
fn test_record_portal_sync_and_lookup() {
    let (_dir, db) = test_database();
    let form = db.create_form(sample_new_form("Dinner")).unwrap();
    let at = Utc::now();

    assert!(db.record_portal_sync(&form.id, Some("portal_9"), at).unwrap());
    assert!(!db.record_portal_sync("missing", Some("portal_9"), at).unwrap());

    let found = db.find_form_by_portal_id("portal_9").unwrap().unwrap();
    assert_eq!(found.id, form.id);
    assert_eq!(found.synced_at, Some(at));

    // A later sync without an id keeps the stored one
    db.record_portal_sync(&form.id, None, Utc::now()).unwrap();
    let again = db.get_form(&form.id).unwrap().unwrap();
    assert_eq!(again.portal_form_id.as_deref(), Some("portal_9"));
}

#[test]
fn test_delete_form_cascades() {
    let (_dir, db) = test_database();
    let form = db.create_form(sample_new_form("Dinner")).unwrap();
    let other = db.create_form(sample_new_form("Other")).unwrap();
    db.insert_submission(new_submission(&form.id, "Jane", None, Utc::now()))
        .unwrap();
    db.insert_submission(new_submission(&other.id, "John", None, Utc::now()))
        .unwrap();

    assert!(db.delete_form(&form.id).unwrap());
    assert!(!db.delete_form(&form.id).unwrap());

    assert!(db.get_form(&form.id).unwrap().is_none());
    assert_eq!(db.count_submissions(&form.id).unwrap(), 0);
    assert_eq!(db.count_submissions(&other.id).unwrap(), 1);
    assert_eq!(db.get_form(&other.id).unwrap().unwrap().fields.len(), 4);
}

#[test]
fn test_delete_submission_scoped_to_form() {
    let (_dir, db) = test_database();
    let form = db.create_form(sample_new_form("Dinner")).unwrap();
    let other = db.create_form(sample_new_form("Other")).unwrap();
    let submission = match db
        .insert_submission(new_submission(&form.id, "Jane", None, Utc::now()))
        .unwrap()
    {
        InsertOutcome::Inserted(s) => s,
        other => panic!("expected insert, got {:?}", other),
    };

    assert!(!db.delete_submission(&other.id, &submission.id).unwrap());
    assert!(db.delete_submission(&form.id, &submission.id).unwrap());
    assert!(db.list_submissions(&form.id).unwrap().is_empty());
}

#[test]
fn test_list_submissions_newest_first() {
    let (_dir, db) = test_database();
    let mut new_form = sample_new_form("Dinner");
    new_form.fields = vec![field_input("Name", FieldType::Text, true)];
    let form = db.create_form(new_form).unwrap();
    let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

    db.insert_submission(new_submission(&form.id, "Early", None, early))
        .unwrap();
    db.insert_submission(new_submission(&form.id, "Late", None, late))
        .unwrap();

    let names: Vec<String> = db
        .list_submissions(&form.id)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Late", "Early"]);
}

#[test]
fn test_concurrent_inserts_store_one_submission() {
    let (_dir, db) = test_database();
    let form = db.create_form(sample_new_form("Dinner")).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 18, 30, 0).unwrap();

    let outcomes: Vec<InsertOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let db = &db;
                let form_id = form.id.as_str();
                scope.spawn(move || {
                    db.insert_submission(new_submission(form_id, "Jane Doe", Some("jane@example.com"), at))
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let inserted = outcomes
        .iter()
        .filter(|o| matches!(o, InsertOutcome::Inserted(_)))
        .count();
    assert_eq!(inserted, 1);
    assert_eq!(db.count_submissions(&form.id).unwrap(), 1);
}

#[test]
fn test_capped_insert_refuses_full_form() {
    let (_dir, db) = test_database();
    let form = db.create_form(sample_new_form("Dinner")).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 18, 30, 0).unwrap();

    assert!(matches!(
        db.insert_submission_capped(new_submission(&form.id, "Jane", None, at), Some(1))
            .unwrap(),
        InsertOutcome::Inserted(_)
    ));
    assert_eq!(
        db.insert_submission_capped(new_submission(&form.id, "John", None, at), Some(1))
            .unwrap(),
        InsertOutcome::Full
    );
    // 0 means unlimited
    assert!(matches!(
        db.insert_submission_capped(new_submission(&form.id, "John", None, at), Some(0))
            .unwrap(),
        InsertOutcome::Inserted(_)
    ));
    assert_eq!(db.count_submissions(&form.id).unwrap(), 2);
}

#[test]
fn test_failed_form_write_leaves_no_fields() {
    let (dir, db) = test_database();
    let forms_path = dir.path().join("forms.csv");
    std::fs::remove_file(&forms_path).unwrap();
    std::fs::create_dir(&forms_path).unwrap();

    assert!(db.create_form(sample_new_form("Dinner")).is_err());

    let fields = std::fs::read_to_string(dir.path().join("form_fields.csv")).unwrap();
    assert_eq!(fields.lines().count(), 1, "only the header row remains");
}
