//! Local form rules for the login and registration inputs.
//!
//! These run before any request is made; a failure never reaches the service.

use qltb_types::wire::RegisterRequest;

use super::error::{AuthError, FieldError, FormField};

const MIN_FULL_NAME_CHARS: usize = 2;
const MIN_PASSWORD_CHARS: usize = 6;
const MIN_STUDENT_ID_DIGITS: usize = 3;
const PHONE_DIGITS: std::ops::RangeInclusive<usize> = 10..=11;
const MIN_DEPARTMENT_CHARS: usize = 2;

/// Registration input as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct RegistrationProfile {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub student_id: Option<String>,
    pub phone: Option<String>,
    pub faculty: Option<String>,
    pub class_name: Option<String>,
}

impl RegistrationProfile {
    /// Checks the form rules and builds the normalized request.
    ///
    /// # Errors
    /// [`AuthError::Validation`] for a failed field rule,
    /// [`AuthError::PasswordMismatch`] when the confirmation differs.
    pub fn to_request(&self) -> Result<RegisterRequest, AuthError> {
        let full_name = self.full_name.trim();
        if full_name.chars().count() < MIN_FULL_NAME_CHARS {
            return Err(invalid(
                FormField::FullName,
                "Full name must be at least 2 characters",
            ));
        }

        let email = normalize_email(&self.email);
        check_email(&email)?;

        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(invalid(
                FormField::Password,
                "Password must be at least 6 characters",
            ));
        }

        if self.password != self.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        let student_id = trimmed(self.student_id.as_deref());
        if let Some(student_id) = &student_id {
            if !student_id.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid(
                    FormField::StudentId,
                    "Student ID may only contain digits",
                ));
            }
            if student_id.len() < MIN_STUDENT_ID_DIGITS {
                return Err(invalid(
                    FormField::StudentId,
                    "Student ID must be at least 3 digits",
                ));
            }
        }

        let phone = trimmed(self.phone.as_deref());
        if let Some(phone) = &phone
            && !(phone.chars().all(|c| c.is_ascii_digit()) && PHONE_DIGITS.contains(&phone.len()))
        {
            return Err(invalid(FormField::Phone, "Invalid phone number"));
        }

        let faculty = trimmed(self.faculty.as_deref());
        check_min_chars(faculty.as_deref(), FormField::Faculty, "Faculty")?;
        let class_name = trimmed(self.class_name.as_deref());
        check_min_chars(class_name.as_deref(), FormField::ClassName, "Class")?;

        Ok(RegisterRequest {
            full_name: full_name.to_string(),
            email,
            password: self.password.clone(),
            student_id,
            phone,
            faculty,
            class_name,
        })
    }
}

fn check_min_chars(value: Option<&str>, field: FormField, label: &str) -> Result<(), AuthError> {
    match value {
        Some(value) if value.chars().count() < MIN_DEPARTMENT_CHARS => Err(invalid(
            field,
            &format!("{label} must be at least 2 characters"),
        )),
        _ => Ok(()),
    }
}

/// Checks the login form and returns the trimmed email.
pub(crate) fn check_login(email: &str, password: &str) -> Result<String, AuthError> {
    let email = email.trim().to_string();
    check_email(&email)?;
    if password.is_empty() {
        return Err(invalid(FormField::Password, "Please enter your password"));
    }
    Ok(email)
}

fn check_email(email: &str) -> Result<(), AuthError> {
    if email.is_empty() {
        return Err(invalid(FormField::Email, "Please enter your email"));
    }
    if !looks_like_email(email) {
        return Err(invalid(FormField::Email, "Invalid email format"));
    }
    Ok(())
}

fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn invalid(field: FormField, message: &str) -> AuthError {
    AuthError::Validation(FieldError::new(field, message))
}
