//! Input validation run before a request reaches the service. Each check
//! returns the list of rejected fields; an empty list means valid.

use crate::dto::{CreateMemberDto, UpdateMemberDto};
use crate::{CoreError, FieldError};

pub const NAME_MAX_CHARS: usize = 100;

pub fn validate_name(name: &str) -> Option<FieldError> {
    if name.trim().is_empty() {
        return Some(FieldError::new("name", "Name is required."));
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Some(FieldError::new("name", "Name cannot exceed 100 characters."));
    }
    None
}

/// Light syntax check: exactly one `@`, neither the first nor the last
/// character. Anything else (whitespace, dots, TLDs) is left to the mail
/// system.
pub fn validate_email(email: &str) -> Option<FieldError> {
    if email.trim().is_empty() {
        return Some(FieldError::new("email", "Email is required."));
    }
    let well_formed = match (email.find('@'), email.rfind('@')) {
        (Some(first), Some(last)) => first == last && first > 0 && last + 1 < email.len(),
        _ => false,
    };
    if !well_formed {
        return Some(FieldError::new("email", "A valid email address is required."));
    }
    None
}

pub fn validate_phone_number(phone: &str) -> Option<FieldError> {
    if phone.trim().is_empty() {
        return Some(FieldError::new("phoneNumber", "Phone number is required."));
    }
    None
}

pub fn create_errors(dto: &CreateMemberDto) -> Vec<FieldError> {
    [
        validate_name(&dto.name),
        validate_email(&dto.email),
        validate_phone_number(&dto.phone_number),
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub fn update_errors(dto: &UpdateMemberDto) -> Vec<FieldError> {
    let id = (dto.id <= 0).then(|| FieldError::new("id", "Member ID must be greater than zero."));
    [
        id,
        validate_name(&dto.name),
        validate_email(&dto.email),
        validate_phone_number(&dto.phone_number),
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub fn validate_create(dto: &CreateMemberDto) -> Result<(), CoreError> {
    into_result(create_errors(dto))
}

pub fn validate_update(dto: &UpdateMemberDto) -> Result<(), CoreError> {
    into_result(update_errors(dto))
}

fn into_result(errors: Vec<FieldError>) -> Result<(), CoreError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(errors))
    }
}
