//! Create/edit dialog controller
//!
//! Holds one draft record, its per-field errors and the submit flow. The
//! draft is re-initialised whenever the dialog opens, closes or switches to
//! a different target record.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::entity::{apply_assignments, Entity};
use crate::error::{Result, SubmitError};
use crate::gateway::Gateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

#[derive(Debug, Clone)]
pub struct DialogForm<E: Entity> {
    open: bool,
    target: Option<String>,
    draft: E,
    errors: BTreeMap<String, String>,
    submit_error: Option<String>,
}

impl<E: Entity> Default for DialogForm<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> DialogForm<E> {
    /// A closed dialog.
    pub fn new() -> Self {
        Self {
            open: false,
            target: None,
            draft: E::default_draft(),
            errors: BTreeMap::new(),
            submit_error: None,
        }
    }

    /// Bring the dialog in line with the caller's open flag and target.
    /// Nothing happens unless one of them changed.
    pub fn sync(&mut self, open: bool, target: Option<&E>) {
        let target_id = target.and_then(|t| t.id());
        if open == self.open && target_id == self.target.as_deref() {
            return;
        }
        match (open, target) {
            (false, _) => self.close(),
            (true, Some(record)) => self.open_edit(record),
            (true, None) => self.open_create(),
        }
    }

    pub fn open_create(&mut self) {
        self.reset_with(E::default_draft(), None);
        debug!(entity = E::KEY, "opened create dialog");
    }

    pub fn open_edit(&mut self, record: &E) {
        self.reset_with(record.clone(), record.id().map(str::to_owned));
        debug!(entity = E::KEY, id = ?self.target, "opened edit dialog");
    }

    fn reset_with(&mut self, draft: E, target: Option<String>) {
        self.open = true;
        self.target = target;
        self.draft = draft;
        self.errors.clear();
        self.submit_error = None;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.target = None;
        self.draft = E::default_draft();
        self.errors.clear();
        self.submit_error = None;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn mode(&self) -> FormMode {
        if self.draft.id().is_some() {
            FormMode::Edit
        } else {
            FormMode::Create
        }
    }

    pub fn draft(&self) -> &E {
        &self.draft
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    /// Mutate the draft, then revalidate `field` and any field whose
    /// rule depends on it.
    pub fn update_field(&mut self, field: &str, update: impl FnOnce(&mut E)) -> Option<String> {
        update(&mut self.draft);
        self.revalidate(field)
    }

    /// Assign a raw text value to a (dotted) field, then revalidate it.
    pub fn set_field(&mut self, field: &str, raw: &str) -> Result<Option<String>> {
        self.draft = apply_assignments(&self.draft, &[(field.to_owned(), raw.to_owned())])?;
        Ok(self.revalidate(field))
    }

    fn revalidate(&mut self, field: &str) -> Option<String> {
        let result = self.validate(field);
        if let Some(dependent) = dependent_field(field) {
            if E::FORM_FIELDS.contains(&dependent) {
                self.validate(dependent);
            }
        }
        result
    }

    /// Check one field, recording or clearing its error.
    pub fn validate(&mut self, field: &str) -> Option<String> {
        match self.draft.validate_field(field) {
            Ok(()) => {
                self.errors.remove(field);
                None
            }
            Err(e) => {
                let message = e.to_string();
                self.errors.insert(field.to_owned(), message.clone());
                Some(message)
            }
        }
    }

    /// Check every form field. Returns overall validity.
    pub fn validate_all(&mut self) -> bool {
        self.errors.clear();
        for field in E::FORM_FIELDS {
            if let Err(e) = self.draft.validate_field(field) {
                self.errors.insert((*field).to_owned(), e.to_string());
            }
        }
        self.errors.is_empty()
    }

    /// Validate, then create or update through the gateway depending on
    /// whether the draft carries an id. Success closes the dialog.
    pub async fn submit(&mut self, gateway: &dyn Gateway<E>) -> std::result::Result<E, SubmitError> {
        if !self.validate_all() {
            return Err(SubmitError::Invalid {
                errors: self.errors.clone(),
            });
        }

        let result = match self.draft.id() {
            Some(id) => gateway.update(id, &self.draft).await,
            None => gateway.create(&self.draft).await,
        };

        match result {
            Ok(saved) => {
                info!(entity = E::KEY, id = ?saved.id(), "saved record");
                self.close();
                Ok(saved)
            }
            Err(e) => {
                self.submit_error = Some(e.to_string());
                Err(SubmitError::Gateway(e))
            }
        }
    }
}

/// Field whose rule reads `field`: range ends are checked against their
/// start, and each half of a bilingual name pair against the other.
fn dependent_field(field: &str) -> Option<&'static str> {
    match field {
        "valid_from" => Some("valid_to"),
        "start_date" => Some("end_date"),
        "name_en" => Some("name_he"),
        "name_he" => Some("name_en"),
        _ => None,
    }
}
