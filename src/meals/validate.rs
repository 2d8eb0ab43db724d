use std::fmt;

use thiserror::Error;

use super::dto::MealSubmission;

/// Text fields checked for emptiness, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Summary,
    Instructions,
    CreatorName,
    CreatorEmail,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Title => "title",
            Field::Summary => "summary",
            Field::Instructions => "instructions",
            Field::CreatorName => "name",
            Field::CreatorEmail => "email",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(Field),
    #[error("email address must contain '@'")]
    MalformedEmail,
    #[error("an image is required")]
    MissingImage,
    #[error("the image file is empty")]
    EmptyImage,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyField(_) => "empty_field",
            ValidationError::MalformedEmail => "malformed_email",
            ValidationError::MissingImage => "missing_image",
            ValidationError::EmptyImage => "empty_image",
        }
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Checks a submission before anything is written anywhere.
///
/// Stops at the first violation so the caller always gets the same reason
/// for the same input.
pub fn validate(meal: &MealSubmission) -> Result<(), ValidationError> {
    let text_fields = [
        (Field::Title, &meal.title),
        (Field::Summary, &meal.summary),
        (Field::Instructions, &meal.instructions),
        (Field::CreatorName, &meal.creator),
        (Field::CreatorEmail, &meal.creator_email),
    ];
    for (field, value) in text_fields {
        if is_blank(value) {
            return Err(ValidationError::EmptyField(field));
        }
    }

    if !meal.creator_email.contains('@') {
        return Err(ValidationError::MalformedEmail);
    }

    match &meal.image {
        None => Err(ValidationError::MissingImage),
        Some(image) if image.bytes.is_empty() => Err(ValidationError::EmptyImage),
        Some(_) => Ok(()),
    }
}
