//! Draft state for the create/edit user form.
//!
//! A [`UserForm`] owns one draft and its displayed error state from the moment
//! the form opens until it closes. Closing is dropping the form.

use crate::error::SubmitError;
use crate::service::UserService;
use crate::user::{User, UserId};
use crate::validation::{self, Field, FieldErrors};
use chrono::Utc;
use tracing::{debug, error};

/// Top-level fields the user can type into. Username is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Name,
    Email,
    Phone,
    Company,
    Website,
}

impl TextField {
    fn error_key(self) -> Field {
        match self {
            Self::Name => Field::Name,
            Self::Email => Field::Email,
            Self::Phone => Field::Phone,
            Self::Company => Field::Company,
            Self::Website => Field::Website,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    Street,
    City,
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq)]
pub enum Submitted {
    Created(User),
    Updated(User),
}

impl Submitted {
    pub fn record(&self) -> &User {
        match self {
            Self::Created(user) | Self::Updated(user) => user,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserForm {
    draft: User,
    errors: FieldErrors,
    editing: Option<UserId>,
}

impl UserForm {
    /// Open the form, seeding a new username from the current time
    pub fn open(existing: Option<&User>) -> Self {
        Self::open_with_seed(existing, Utc::now().timestamp_millis())
    }

    /// Open the form. An existing record is copied into the draft; otherwise
    /// the draft starts empty with username `USER-<seed>`.
    pub fn open_with_seed(existing: Option<&User>, seed: i64) -> Self {
        let (draft, editing) = match existing {
            Some(user) => {
                let mut draft = user.clone();
                draft.id = None;
                if draft.username.is_empty() {
                    draft.username = format!("USER-{}", user.id_label());
                }
                (draft, user.id)
            }
            None => (
                User {
                    username: format!("USER-{}", seed),
                    ..Default::default()
                },
                None,
            ),
        };

        Self {
            draft,
            errors: FieldErrors::new(),
            editing,
        }
    }

    pub fn title(&self) -> &'static str {
        if self.is_edit() {
            "Edit User"
        } else {
            "Create New User"
        }
    }

    pub fn submit_label(&self) -> &'static str {
        if self.is_edit() {
            "Update User"
        } else {
            "Create User"
        }
    }

    pub fn is_edit(&self) -> bool {
        self.editing.is_some()
    }

    /// Id of the record being edited, if any
    pub fn editing(&self) -> Option<UserId> {
        self.editing
    }

    pub fn draft(&self) -> &User {
        &self.draft
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Overwrite one top-level field and clear only that field's error
    pub fn update_field(&mut self, field: TextField, value: impl Into<String>) {
        let value = value.into();
        match field {
            TextField::Name => self.draft.name = value,
            TextField::Email => self.draft.email = value,
            TextField::Phone => self.draft.phone = value,
            TextField::Company => self.draft.company.name = value,
            TextField::Website => self.draft.website = value,
        }
        self.errors.clear(field.error_key());
    }

    /// Overwrite one address field. Any address edit clears both the street
    /// and city errors.
    pub fn update_address_field(&mut self, field: AddressField, value: impl Into<String>) {
        let value = value.into();
        match field {
            AddressField::Street => self.draft.address.street = value,
            AddressField::City => self.draft.address.city = value,
        }
        self.errors.clear(Field::Street);
        self.errors.clear(Field::City);
    }

    /// Body sent to the service: the draft, plus the original id on edit
    pub fn payload(&self) -> User {
        let mut payload = self.draft.clone();
        payload.id = self.editing;
        payload
    }

    /// Validate and, when clean, create or update through the service.
    ///
    /// A validation failure replaces the error state and makes no call. A
    /// request failure leaves draft and errors untouched so the user can retry.
    pub fn submit(&mut self, service: &dyn UserService) -> Result<Submitted, SubmitError> {
        let errors = validation::validate(&self.draft);
        if !errors.is_empty() {
            debug!(fields = %errors, "submission blocked by validation");
            self.errors = errors.clone();
            return Err(SubmitError::Validation(errors));
        }

        let payload = self.payload();
        let result = match self.editing {
            Some(id) => service.update(id, &payload).map(Submitted::Updated),
            None => service.create(&payload).map(Submitted::Created),
        };

        result.map_err(|e| {
            error!(error = %e, "Error during form submission");
            SubmitError::Request(e)
        })
    }
}
