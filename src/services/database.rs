use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::common::new_id;
use crate::models::enums::FieldType;
use crate::models::form::{Form, FormChanges, FormField, FormSummary, NewForm};
use crate::models::message::{BatchStatus, Channel, MessageLog};
use crate::models::submission::{DedupKey, InsertOutcome, NewSubmission, Submission};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to acquire store lock")]
    Lock,
}

type Result<T> = std::result::Result<T, StoreError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// A CSV-backed table: one file with a fixed header row
trait Table: Serialize + DeserializeOwned {
    const FILE: &'static str;
    const HEADERS: &'static [&'static str];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FormRow {
    id: String,
    portal_form_id: Option<String>,
    title: String,
    description: Option<String>,
    deadline: Option<DateTime<Utc>>,
    max_entries: Option<u32>,
    is_active: bool,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    synced_at: Option<DateTime<Utc>>,
}

impl Table for FormRow {
    const FILE: &'static str = "forms.csv";
    const HEADERS: &'static [&'static str] = &[
        "id",
        "portal_form_id",
        "title",
        "description",
        "deadline",
        "max_entries",
        "is_active",
        "created_by",
        "created_at",
        "updated_at",
        "synced_at",
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FieldRow {
    id: String,
    form_id: String,
    field_id: Option<String>,
    label: String,
    field_type: FieldType,
    required: bool,
    order: u32,
    options: Option<String>, // JSON array
    placeholder: Option<String>,
}

impl Table for FieldRow {
    const FILE: &'static str = "form_fields.csv";
    const HEADERS: &'static [&'static str] = &[
        "id",
        "form_id",
        "field_id",
        "label",
        "field_type",
        "required",
        "order",
        "options",
        "placeholder",
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SubmissionRow {
    id: String,
    form_id: String,
    member_id: Option<i64>,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    responses: String, // JSON object
    submitted_at: DateTime<Utc>,
}

impl Table for SubmissionRow {
    const FILE: &'static str = "form_submissions.csv";
    const HEADERS: &'static [&'static str] = &[
        "id",
        "form_id",
        "member_id",
        "name",
        "email",
        "phone",
        "responses",
        "submitted_at",
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessageLogRow {
    id: String,
    channel: Channel,
    summary: String,
    recipients: String,  // JSON array
    status: BatchStatus,
    message_ids: String, // JSON array
    error: Option<String>,
    user_id: String,
    created_at: DateTime<Utc>,
}

impl Table for MessageLogRow {
    const FILE: &'static str = "message_logs.csv";
    const HEADERS: &'static [&'static str] = &[
        "id",
        "channel",
        "summary",
        "recipients",
        "status",
        "message_ids",
        "error",
        "user_id",
        "created_at",
    ];
}

impl FormRow {
    fn from_form(form: &Form) -> Self {
        Self {
            id: form.id.clone(),
            portal_form_id: form.portal_form_id.clone(),
            title: form.title.clone(),
            description: form.description.clone(),
            deadline: form.deadline,
            max_entries: form.max_entries,
            is_active: form.is_active,
            created_by: form.created_by.clone(),
            created_at: form.created_at,
            updated_at: form.updated_at,
            synced_at: form.synced_at,
        }
    }

    fn into_form(self, mut fields: Vec<FormField>) -> Form {
        // Stable sort keeps insertion order for equal order indexes
        fields.sort_by_key(|field| field.order);
        Form {
            id: self.id,
            portal_form_id: self.portal_form_id,
            title: self.title,
            description: self.description,
            deadline: self.deadline,
            max_entries: self.max_entries,
            is_active: self.is_active,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            synced_at: self.synced_at,
            fields,
        }
    }
}

impl FieldRow {
    fn from_field(field: &FormField) -> Result<Self> {
        Ok(Self {
            id: field.id.clone(),
            form_id: field.form_id.clone(),
            field_id: field.field_id.clone(),
            label: field.label.clone(),
            field_type: field.field_type,
            required: field.required,
            order: field.order,
            options: field.options.as_ref().map(serde_json::to_string).transpose()?,
            placeholder: field.placeholder.clone(),
        })
    }

    fn into_field(self) -> Result<FormField> {
        Ok(FormField {
            id: self.id,
            form_id: self.form_id,
            field_id: self.field_id,
            label: self.label,
            field_type: self.field_type,
            required: self.required,
            order: self.order,
            options: self.options.as_deref().map(serde_json::from_str).transpose()?,
            placeholder: self.placeholder,
        })
    }
}

impl SubmissionRow {
    fn from_submission(submission: &Submission) -> Result<Self> {
        Ok(Self {
            id: submission.id.clone(),
            form_id: submission.form_id.clone(),
            member_id: submission.member_id,
            name: submission.name.clone(),
            email: submission.email.clone(),
            phone: submission.phone.clone(),
            responses: serde_json::to_string(&submission.responses)?,
            submitted_at: submission.submitted_at,
        })
    }

    fn into_submission(self) -> Result<Submission> {
        Ok(Submission {
            id: self.id,
            form_id: self.form_id,
            member_id: self.member_id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            responses: serde_json::from_str(&self.responses)?,
            submitted_at: self.submitted_at,
        })
    }

    fn key(&self) -> DedupKey<'_> {
        DedupKey {
            form_id: &self.form_id,
            name: &self.name,
            email: self.email.as_deref(),
            submitted_at: self.submitted_at,
        }
    }
}

/// Persistent store for forms, fields, submissions and message logs.
///
/// Each table is a CSV file under the data directory. All access goes
/// through one mutex, which makes every public method atomic with respect
/// to the others; the submission uniqueness check relies on this.
pub struct DatabaseService {
    data_dir: PathBuf,
    file_mutex: Mutex<()>,
}

impl DatabaseService {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(io_error(&data_dir))?;

        let service = Self {
            data_dir,
            file_mutex: Mutex::new(()),
        };

        service.ensure_table::<FormRow>()?;
        service.ensure_table::<FieldRow>()?;
        service.ensure_table::<SubmissionRow>()?;
        service.ensure_table::<MessageLogRow>()?;

        Ok(service)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.file_mutex.lock().map_err(|_| StoreError::Lock)
    }

    fn path_of<T: Table>(&self) -> PathBuf {
        self.data_dir.join(T::FILE)
    }

    fn ensure_table<T: Table>(&self) -> Result<()> {
        let path = self.path_of::<T>();
        if !path.exists() {
            info!("Creating table file at {}", path.display());
            self.write_table::<T>(&[])?;
        }
        Ok(())
    }

    fn read_table<T: Table>(&self) -> Result<Vec<T>> {
        let path = self.path_of::<T>();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&path)(e)),
        };

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut rows = Vec::new();
        for row in reader.deserialize::<T>() {
            rows.push(row?);
        }
        Ok(rows)
    }

    // Rewrites the whole table through a temporary file so a failed write
    // never leaves a truncated table behind
    fn write_table<T: Table>(&self, rows: &[T]) -> Result<()> {
        let path = self.path_of::<T>();
        let tmp_path = path.with_extension("csv.tmp");

        let file = File::create(&tmp_path).map_err(io_error(&tmp_path))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(T::HEADERS)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(io_error(&tmp_path))?;
        drop(writer);

        fs::rename(&tmp_path, &path).map_err(io_error(&path))?;
        Ok(())
    }

    fn append_rows<T: Table>(&self, rows: &[T]) -> Result<()> {
        let path = self.path_of::<T>();
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(io_error(&path))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(io_error(&path))?;
        Ok(())
    }

    fn fields_for(&self, form_id: &str) -> Result<Vec<FormField>> {
        self.read_table::<FieldRow>()?
            .into_iter()
            .filter(|row| row.form_id == form_id)
            .map(FieldRow::into_field)
            .collect()
    }

    fn load_form(&self, predicate: impl Fn(&FormRow) -> bool) -> Result<Option<Form>> {
        match self.read_table::<FormRow>()?.into_iter().find(|row| predicate(row)) {
            Some(row) => {
                let fields = self.fields_for(&row.id)?;
                Ok(Some(row.into_form(fields)))
            }
            None => Ok(None),
        }
    }

    /// Create a form and its fields. Field semantic ids are derived here.
    pub fn create_form(&self, new_form: NewForm) -> Result<Form> {
        let _lock = self.lock()?;

        let now = Utc::now();
        let id = new_id();
        let fields: Vec<FormField> = new_form
            .fields
            .into_iter()
            .enumerate()
            .map(|(index, input)| input.into_field(new_id(), &id, index))
            .collect();

        let form = FormRow {
            id: id.clone(),
            portal_form_id: None,
            title: new_form.title,
            description: new_form.description.filter(|d| !d.is_empty()),
            deadline: new_form.deadline,
            max_entries: new_form.max_entries.filter(|max| *max > 0),
            is_active: true,
            created_by: new_form.created_by,
            created_at: now,
            updated_at: now,
            synced_at: None,
        }
        .into_form(fields);

        let field_rows = form
            .fields
            .iter()
            .map(FieldRow::from_field)
            .collect::<Result<Vec<_>>>()?;

        // Fields first: a form row is only ever visible with its fields
        self.append_rows(&field_rows)?;
        if let Err(e) = self.append_rows(&[FormRow::from_form(&form)]) {
            let mut remaining = self.read_table::<FieldRow>()?;
            remaining.retain(|row| row.form_id != form.id);
            self.write_table(&remaining)?;
            return Err(e);
        }

        info!("Created form {} with {} fields", form.id, form.fields.len());
        Ok(form)
    }

    pub fn get_form(&self, id: &str) -> Result<Option<Form>> {
        let _lock = self.lock()?;
        self.load_form(|row| row.id == id)
    }

    pub fn find_form_by_portal_id(&self, portal_form_id: &str) -> Result<Option<Form>> {
        let _lock = self.lock()?;
        self.load_form(|row| row.portal_form_id.as_deref() == Some(portal_form_id))
    }

    /// Forms with their submission counts, newest first
    pub fn list_forms(&self, include_inactive: bool) -> Result<Vec<FormSummary>> {
        let _lock = self.lock()?;

        let mut fields = self
            .read_table::<FieldRow>()?
            .into_iter()
            .map(FieldRow::into_field)
            .collect::<Result<Vec<_>>>()?;
        let submissions = self.read_table::<SubmissionRow>()?;

        let mut summaries: Vec<FormSummary> = self
            .read_table::<FormRow>()?
            .into_iter()
            .filter(|row| include_inactive || row.is_active)
            .map(|row| {
                let (own, rest): (Vec<_>, Vec<_>) =
                    fields.drain(..).partition(|field| field.form_id == row.id);
                fields = rest;
                let submission_count = submissions.iter().filter(|s| s.form_id == row.id).count();
                FormSummary {
                    form: row.into_form(own),
                    submission_count,
                }
            })
            .collect();

        summaries.sort_by(|a, b| b.form.created_at.cmp(&a.form.created_at));
        Ok(summaries)
    }

    /// Apply a partial update. When `changes.fields` is present the whole
    /// field set is replaced.
    pub fn update_form(&self, id: &str, changes: &FormChanges) -> Result<Option<Form>> {
        let _lock = self.lock()?;

        let mut rows = self.read_table::<FormRow>()?;
        let Some(position) = rows.iter().position(|row| row.id == id) else {
            return Ok(None);
        };

        let mut field_rows = self.read_table::<FieldRow>()?;
        let fields = match &changes.fields {
            Some(inputs) => {
                field_rows.retain(|row| row.form_id != id);
                let replacement: Vec<FormField> = inputs
                    .iter()
                    .cloned()
                    .enumerate()
                    .map(|(index, input)| input.into_field(new_id(), id, index))
                    .collect();
                for field in &replacement {
                    field_rows.push(FieldRow::from_field(field)?);
                }
                debug!("Replaced fields of form {} with {} new fields", id, replacement.len());
                replacement
            }
            None => self.fields_for(id)?,
        };

        let mut form = rows[position].clone().into_form(fields);
        changes.apply_to(&mut form);
        form.updated_at = Utc::now();
        rows[position] = FormRow::from_form(&form);

        if changes.fields.is_some() {
            self.write_table(&field_rows)?;
        }
        self.write_table(&rows)?;

        info!("Updated form {}", id);
        Ok(Some(form))
    }

    /// Remember the portal's id for a form after a successful publish
    pub fn record_portal_sync(
        &self,
        id: &str,
        portal_form_id: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> Result<bool> {
        let _lock = self.lock()?;

        let mut rows = self.read_table::<FormRow>()?;
        let Some(row) = rows.iter_mut().find(|row| row.id == id) else {
            return Ok(false);
        };
        if let Some(portal_form_id) = portal_form_id {
            row.portal_form_id = Some(portal_form_id.to_string());
        }
        row.synced_at = Some(synced_at);

        self.write_table(&rows)?;
        Ok(true)
    }

    /// Hard delete a form together with its fields and submissions
    pub fn delete_form(&self, id: &str) -> Result<bool> {
        let _lock = self.lock()?;

        let mut rows = self.read_table::<FormRow>()?;
        let before = rows.len();
        rows.retain(|row| row.id != id);
        if rows.len() == before {
            return Ok(false);
        }

        let mut fields = self.read_table::<FieldRow>()?;
        fields.retain(|row| row.form_id != id);
        let mut submissions = self.read_table::<SubmissionRow>()?;
        let submissions_before = submissions.len();
        submissions.retain(|row| row.form_id != id);

        self.write_table(&submissions)?;
        self.write_table(&fields)?;
        self.write_table(&rows)?;

        info!(
            "Deleted form {} and {} submissions",
            id,
            submissions_before - submissions.len()
        );
        Ok(true)
    }

    pub fn count_submissions(&self, form_id: &str) -> Result<usize> {
        let _lock = self.lock()?;
        Ok(self
            .read_table::<SubmissionRow>()?
            .iter()
            .filter(|row| row.form_id == form_id)
            .count())
    }

    /// Insert a submission unless one with the same de-duplication key
    /// exists. Check and insert happen under the store lock.
    pub fn insert_submission(&self, new_submission: NewSubmission) -> Result<InsertOutcome> {
        self.insert_submission_capped(new_submission, None)
    }

    /// Like `insert_submission`, but refuses once the form already holds
    /// `max_entries` submissions (`None` or 0 is unlimited). Counting,
    /// de-duplication and the insert share one lock acquisition.
    pub fn insert_submission_capped(
        &self,
        new_submission: NewSubmission,
        max_entries: Option<u32>,
    ) -> Result<InsertOutcome> {
        let _lock = self.lock()?;

        let rows = self.read_table::<SubmissionRow>()?;

        if let Some(max) = max_entries.filter(|max| *max > 0) {
            let count = rows
                .iter()
                .filter(|row| row.form_id == new_submission.form_id)
                .count();
            if count >= max as usize {
                debug!("Form {} is full at {} submissions", new_submission.form_id, count);
                return Ok(InsertOutcome::Full);
            }
        }

        let key = new_submission.dedup_key();
        if let Some(existing) = rows.into_iter().find(|row| row.key() == key) {
            debug!(
                "Submission from {} at {} already stored as {}",
                existing.name, existing.submitted_at, existing.id
            );
            return Ok(InsertOutcome::Duplicate(existing.into_submission()?));
        }

        let submission = Submission {
            id: new_id(),
            form_id: new_submission.form_id,
            member_id: new_submission.member_id,
            name: new_submission.name,
            email: new_submission.email,
            phone: new_submission.phone,
            responses: new_submission.responses,
            submitted_at: new_submission.submitted_at,
        };
        self.append_rows(&[SubmissionRow::from_submission(&submission)?])?;

        info!("Stored submission {} for form {}", submission.id, submission.form_id);
        Ok(InsertOutcome::Inserted(submission))
    }

    /// Submissions for a form, most recent first
    pub fn list_submissions(&self, form_id: &str) -> Result<Vec<Submission>> {
        let _lock = self.lock()?;
        let mut submissions = self
            .read_table::<SubmissionRow>()?
            .into_iter()
            .filter(|row| row.form_id == form_id)
            .map(SubmissionRow::into_submission)
            .collect::<Result<Vec<_>>>()?;
        submissions.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(submissions)
    }

    pub fn delete_submission(&self, form_id: &str, submission_id: &str) -> Result<bool> {
        let _lock = self.lock()?;

        let mut rows = self.read_table::<SubmissionRow>()?;
        let before = rows.len();
        rows.retain(|row| !(row.id == submission_id && row.form_id == form_id));
        if rows.len() == before {
            return Ok(false);
        }

        self.write_table(&rows)?;
        info!("Deleted submission {} from form {}", submission_id, form_id);
        Ok(true)
    }

    pub fn record_message_log(&self, log: &MessageLog) -> Result<()> {
        let _lock = self.lock()?;
        let row = MessageLogRow {
            id: log.id.clone(),
            channel: log.channel,
            summary: log.summary.clone(),
            recipients: serde_json::to_string(&log.recipients)?,
            status: log.status,
            message_ids: serde_json::to_string(&log.message_ids)?,
            error: log.error.clone(),
            user_id: log.user_id.clone(),
            created_at: log.created_at,
        };
        self.append_rows(&[row])
    }

    /// Message logs sent by one user, newest first
    pub fn list_message_logs(&self, user_id: &str) -> Result<Vec<MessageLog>> {
        let _lock = self.lock()?;
        let mut logs = self
            .read_table::<MessageLogRow>()?
            .into_iter()
            .filter(|row| row.user_id == user_id)
            .map(|row| {
                Ok(MessageLog {
                    id: row.id,
                    channel: row.channel,
                    summary: row.summary,
                    recipients: serde_json::from_str(&row.recipients)?,
                    status: row.status,
                    message_ids: serde_json::from_str(&row.message_ids)?,
                    error: row.error,
                    user_id: row.user_id,
                    created_at: row.created_at,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(logs)
    }
}

/// Open the store in the configured data directory
pub fn create_database_service(data_dir: &Path) -> Result<Arc<DatabaseService>> {
    info!("Opening data store at {}", data_dir.display());
    Ok(Arc::new(DatabaseService::new(data_dir)?))
}
