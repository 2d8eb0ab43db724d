use bytes::Bytes;
use serde::Serialize;

use super::repo_types::MealRecord;

/// Uploaded image as received from the form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// One meal as submitted by a user; consumed by `MealService::submit`.
#[derive(Debug, Clone, Default)]
pub struct MealSubmission {
    pub title: String,
    pub summary: String,
    pub instructions: String,
    pub creator: String,
    pub creator_email: String,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Serialize)]
pub struct CreatedMealResponse {
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct MealResponse {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub instructions: String,
    pub image: String,
    pub image_url: String,
    pub creator: String,
    pub creator_email: String,
}

impl MealResponse {
    pub fn new(meal: MealRecord, image_url: String) -> Self {
        Self {
            slug: meal.slug,
            title: meal.title,
            summary: meal.summary,
            instructions: meal.instructions,
            image: meal.image,
            image_url,
            creator: meal.creator,
            creator_email: meal.creator_email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealDetails {
    #[serde(flatten)]
    pub meal: MealResponse,
    pub instructions_html: String,
}

impl MealDetails {
    pub fn new(meal: MealResponse) -> Self {
        let instructions_html = meal.instructions.replace('\n', "<br>");
        Self {
            meal,
            instructions_html,
        }
    }
}
