//! Domain library for the Member Vault.
//!
//! Holds the member record types, ports (traits), error definitions and the
//! service that orchestrates them. Keep adapters and IO concerns out of this
//! crate; the only external crates are serde/chrono for the DTO shapes.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::SystemTime;

/// Store-assigned member identifier.
pub type MemberId = i64;

/// Stored member record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    /// Set once on creation.
    pub date_joined: SystemTime,
    /// Refreshed on every mutation, never earlier than `date_joined`.
    pub updated_on: SystemTime,
    pub is_active: bool,
}

/// Input data for creating a member. The store assigns id and timestamps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub phone_number: String,
}

/// Field-level changes applied to an existing member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberChanges {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub is_active: bool,
}

impl Member {
    /// Build a freshly created record; both timestamps start at `now`.
    pub fn create(id: MemberId, input: NewMember, now: SystemTime) -> Self {
        Self {
            id,
            name: input.name,
            email: input.email,
            phone_number: input.phone_number,
            date_joined: now,
            updated_on: now,
            is_active: true,
        }
    }

    /// Overwrite the mutable fields. `id` and `date_joined` are kept.
    ///
    /// `updated_on` never moves backwards, even if the clock does; since it
    /// starts at `date_joined` it also never precedes the join date.
    pub fn apply(&mut self, changes: MemberChanges, now: SystemTime) {
        self.name = changes.name;
        self.email = changes.email;
        self.phone_number = changes.phone_number;
        self.is_active = changes.is_active;
        self.updated_on = now.max(self.updated_on);
    }
}

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Repository port for persisting and loading members.
///
/// Implementations must keep email unique across all rows (case-insensitive)
/// and perform the uniqueness check in the same unit of work as the write.
pub trait MemberRepository: Send + Sync {
    /// All members in insertion order.
    fn list_all(&self) -> Result<Vec<Member>, CoreError>;
    /// Fails with `NotFound` when no member has this id.
    fn get(&self, id: MemberId) -> Result<Member, CoreError>;
    fn create(&self, input: NewMember, now: SystemTime) -> Result<Member, CoreError>;
    fn update(&self, changes: MemberChanges, now: SystemTime) -> Result<Member, CoreError>;
    /// Hard delete; `Ok(false)` when nothing was removed.
    fn delete(&self, id: MemberId) -> Result<bool, CoreError>;
}

/// A single rejected input field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Core domain errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoreError {
    NotFound(String),
    Conflict(String),
    Validation(Vec<FieldError>),
    Repository(String),
}

impl CoreError {
    pub fn member_not_found(id: MemberId) -> Self {
        CoreError::NotFound(format!("Member with ID {} was not found.", id))
    }

    pub fn email_taken(email: &str) -> Self {
        CoreError::Conflict(format!("A member with email '{}' already exists.", email))
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::NotFound(msg) => write!(f, "{}", msg),
            CoreError::Conflict(msg) => write!(f, "{}", msg),
            CoreError::Validation(errors) => {
                write!(f, "validation failed")?;
                for (i, e) in errors.iter().enumerate() {
                    let sep = if i == 0 { ": " } else { "; " };
                    write!(f, "{}{}: {}", sep, e.field, e.message)?;
                }
                Ok(())
            }
            CoreError::Repository(msg) => write!(f, "repository error: {}", msg),
        }
    }
}

impl Error for CoreError {}

pub mod adapters;
pub mod dto;
pub mod service;
pub mod validate;
