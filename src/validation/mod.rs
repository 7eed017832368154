//! Input validation module

use thiserror::Error;

/// Longest submission id accepted as an object key segment
const MAX_SUBMISSION_ID_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid submission id (letters, digits, '-' and '_' only)")]
    InvalidSubmissionId,

    #[error("Only PDF files are allowed")]
    NotPdf,

    #[error("File too large (max {max_mb}MB)")]
    FileTooLarge { max_mb: usize },

    #[error("No file provided")]
    EmptyFile,
}

/// Require a non-blank string field
pub fn require<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::Required {
            field: field.to_string(),
        }),
    }
}

/// Validate an author email address
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

/// Validate a submission id before it becomes part of an object key
pub fn validate_submission_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_SUBMISSION_ID_LEN {
        return Err(ValidationError::InvalidSubmissionId);
    }

    let is_valid = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !is_valid {
        return Err(ValidationError::InvalidSubmissionId);
    }

    Ok(())
}

/// Only `.pdf` files, compared case-insensitively
pub fn validate_pdf_filename(filename: &str) -> Result<(), ValidationError> {
    if filename.to_lowercase().ends_with(".pdf") {
        Ok(())
    } else {
        Err(ValidationError::NotPdf)
    }
}

/// Validate a declared or received file size against the cap
pub fn validate_file_size(file_size: u64, max_size_bytes: usize) -> Result<(), ValidationError> {
    if file_size > max_size_bytes as u64 {
        return Err(ValidationError::FileTooLarge {
            max_mb: max_size_bytes / (1024 * 1024),
        });
    }
    Ok(())
}

/// Check the magic bytes of an uploaded file
pub fn looks_like_pdf(data: &[u8]) -> bool {
    infer::get(data).map_or(false, |kind| kind.mime_type() == "application/pdf")
}

/// Simple email validation
fn is_valid_email(email: &str) -> bool {
    // Basic check: contains @ and at least one .
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);

    !local.is_empty() && !domain.is_empty() && domain.contains('.') && domain.len() > 2
}
