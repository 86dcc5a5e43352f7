use std::sync::Arc;

use crate::client_mock::{setup_mock_portal, setup_unavailable_portal, MockPortal};
use crate::errors::AppError;
use crate::models::portal::PortalSubmissionList;
use crate::services::puller::{PullSummary, SubmissionPuller};
use crate::tests::common::fixtures::{portal_submission, sample_new_form, test_database};

#[tokio::test]
async fn test_second_pull_skips_everything() {
    let (_dir, db) = test_database();
    let form = db.create_form(sample_new_form("Dinner")).unwrap();
    db.record_portal_sync(&form.id, Some("portal_1"), chrono::Utc::now())
        .unwrap();

    let (mock_portal, store) = setup_mock_portal();
    store.add_submission(portal_submission(
        "portal_1",
        "Jane Doe",
        "jane@example.com",
        "2024-05-01T18:30:00Z",
    ));
    let puller = SubmissionPuller::new(Arc::clone(&db), Arc::new(mock_portal));

    let first = puller.pull(None, None).await.unwrap();
    assert_eq!(first, PullSummary { synced: 1, skipped: 0, total: 1 });

    let second = puller.pull(None, None).await.unwrap();
    assert_eq!(second, PullSummary { synced: 0, skipped: 1, total: 1 });

    let stored = db.list_submissions(&form.id).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].member_id, Some(1234));
}

#[tokio::test]
async fn test_pull_resolves_by_local_id_and_skips_unknown() {
    let (_dir, db) = test_database();
    let form = db.create_form(sample_new_form("Dinner")).unwrap();

    let (mock_portal, store) = setup_mock_portal();
    store.add_submission(portal_submission(&form.id, "Jane", "jane@example.com", "2024-05-01T18:30:00Z"));
    store.add_submission(portal_submission("ghost", "John", "john@example.com", "2024-05-01T18:31:00Z"));
    store.add_submission(portal_submission(&form.id, "Bad", "bad@example.com", "not a time"));
    let puller = SubmissionPuller::new(Arc::clone(&db), Arc::new(mock_portal));

    let summary = puller.pull(None, None).await.unwrap();

    assert_eq!(summary, PullSummary { synced: 1, skipped: 2, total: 3 });
    assert_eq!(db.count_submissions(&form.id).unwrap(), 1);
}

#[tokio::test]
async fn test_pull_for_one_form_attributes_items_to_it() {
    let (_dir, db) = test_database();
    let form = db.create_form(sample_new_form("Dinner")).unwrap();
    db.record_portal_sync(&form.id, Some("portal_1"), chrono::Utc::now())
        .unwrap();

    let (mock_portal, store) = setup_mock_portal();
    // The portal keeps our id on forms it published for us
    store.create_form(&crate::services::field_schema::portal_payload(&form, None, None));
    store.add_submission(portal_submission("portal_1", "Jane", "jane@example.com", "2024-05-01T18:30:00Z"));
    let puller = SubmissionPuller::new(Arc::clone(&db), Arc::new(mock_portal));

    let summary = puller.pull(Some(&form.id), None).await.unwrap();

    assert_eq!(summary.synced, 1);
    assert_eq!(db.list_submissions(&form.id).unwrap()[0].name, "Jane");
}

#[tokio::test]
async fn test_pull_for_missing_form_is_not_found() {
    let (_dir, db) = test_database();
    let mut mock_portal = MockPortal::new();
    mock_portal.expect_list_submissions().times(0);
    let puller = SubmissionPuller::new(db, Arc::new(mock_portal));

    let result = puller.pull(Some("missing"), None).await;

    assert!(matches!(result, Err(AppError::NotFound(m)) if m == "Form not found locally"));
}

#[tokio::test]
async fn test_unsuccessful_listing_is_empty() {
    let (_dir, db) = test_database();
    let mut mock_portal = MockPortal::new();
    mock_portal
        .expect_list_submissions()
        .returning(|_| Ok(PortalSubmissionList::default()));
    let puller = SubmissionPuller::new(db, Arc::new(mock_portal));

    assert_eq!(puller.pull(None, None).await.unwrap(), PullSummary::default());
}

#[tokio::test]
async fn test_portal_failure_aborts_pull() {
    let (_dir, db) = test_database();
    let puller = SubmissionPuller::new(db, Arc::new(setup_unavailable_portal()));

    let result = puller.pull(None, None).await;

    assert!(matches!(result, Err(AppError::Portal(_))));
}

#[tokio::test]
async fn test_since_is_forwarded() {
    let (_dir, db) = test_database();
    let mut mock_portal = MockPortal::new();
    mock_portal
        .expect_list_submissions()
        .withf(|query| query.since.as_deref() == Some("2024-05-01T00:00:00+00:00") && query.form_id.is_none())
        .times(1)
        .returning(|_| Ok(PortalSubmissionList::default()));
    let puller = SubmissionPuller::new(db, Arc::new(mock_portal));
    let since = chrono::DateTime::parse_from_rfc3339("2024-05-01T00:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc);

    puller.pull(None, Some(since)).await.unwrap();
}

#[tokio::test]
async fn test_store_error_aborts_pull() {
    let (dir, db) = test_database();
    let form = db.create_form(sample_new_form("Dinner")).unwrap();
    db.record_portal_sync(&form.id, Some("portal_1"), chrono::Utc::now())
        .unwrap();

    // A row whose is_active column cannot be read
    let mut forms = std::fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join("forms.csv"))
        .unwrap();
    std::io::Write::write_all(
        &mut forms,
        b"broken,,Broken,,,,maybe,user1,2024-01-01T00:00:00Z,2024-01-01T00:00:00Z,\n",
    )
    .unwrap();

    let (mock_portal, store) = setup_mock_portal();
    store.add_submission(portal_submission("portal_1", "Jane", "jane@example.com", "2024-05-01T18:30:00Z"));
    let puller = SubmissionPuller::new(Arc::clone(&db), Arc::new(mock_portal));

    let result = puller.pull(None, None).await;

    assert!(matches!(result, Err(AppError::Store(_))));
    assert_eq!(db.count_submissions(&form.id).unwrap(), 0);
}
