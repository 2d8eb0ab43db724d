use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{CreatedMealResponse, ImageUpload, MealDetails, MealResponse, MealSubmission};
use super::repo_types::MealRecord;
use crate::{error::ApiError, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals))
        .route("/meals/:slug", get(get_meal))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

/// Collects the share form. Missing text fields stay empty and are rejected
/// by validation; unknown fields are ignored.
async fn read_submission(mp: &mut Multipart) -> Result<MealSubmission, ApiError> {
    let mut meal = MealSubmission::default();

    while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => meal.title = field.text().await.map_err(multipart_error)?,
            "summary" => meal.summary = field.text().await.map_err(multipart_error)?,
            "instructions" => meal.instructions = field.text().await.map_err(multipart_error)?,
            "name" => meal.creator = field.text().await.map_err(multipart_error)?,
            "email" => meal.creator_email = field.text().await.map_err(multipart_error)?,
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // browsers send an empty, unnamed part when no file was picked
                if !(file_name.is_empty() && bytes.is_empty()) {
                    meal.image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(meal)
}

/// `/meals/<slug>` with non-ASCII bytes percent-encoded.
fn location_for(slug: &str) -> String {
    let mut path = String::from("/meals/");
    for byte in slug.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            path.push(byte as char);
        } else {
            path.push_str(&format!("%{byte:02X}"));
        }
    }
    path
}

async fn to_response(state: &AppState, meal: MealRecord) -> Result<MealResponse, ApiError> {
    let image_url = state
        .storage
        .object_url(&meal.image)
        .await
        .map_err(ApiError::Storage)?;
    Ok(MealResponse::new(meal, image_url))
}

/// POST /meals (multipart: title, summary, instructions, name, email, image)
#[instrument(skip(state, mp))]
pub async fn create_meal(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<(StatusCode, HeaderMap, Json<CreatedMealResponse>), ApiError> {
    let submission = read_submission(&mut mp).await?;
    let slug = state.meals.submit(submission).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&location_for(&slug)) {
        headers.insert(LOCATION, location);
    }

    info!(%slug, "meal shared");
    Ok((StatusCode::CREATED, headers, Json(CreatedMealResponse { slug })))
}

#[instrument(skip(state))]
pub async fn list_meals(State(state): State<AppState>) -> Result<Json<Vec<MealResponse>>, ApiError> {
    let meals = state.meals.list().await?;
    let mut items = Vec::with_capacity(meals.len());
    for meal in meals {
        items.push(to_response(&state, meal).await?);
    }
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<MealDetails>, ApiError> {
    let meal = state
        .meals
        .get(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(slug.clone()))?;
    Ok(Json(MealDetails::new(to_response(&state, meal).await?)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::meals::services::tests::CountingRepo;
    use crate::storage::fake::RecordingStorage;

    const BOUNDARY: &str = "mealshareboundary";

    fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Body {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn post(body: Body) -> Request<Body> {
        Request::post("/api/v1/meals")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)
            .unwrap()
    }

    async fn json(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn app() -> (axum::Router, Arc<RecordingStorage>) {
        app_with(RecordingStorage::new()).await
    }

    async fn app_with(storage: RecordingStorage) -> (axum::Router, Arc<RecordingStorage>) {
        let storage = Arc::new(storage);
        let repo = Arc::new(CountingRepo::new().await);
        let state = AppState::for_tests(storage.clone(), repo);
        (crate::app::build_app(state), storage)
    }

    const TACOS: &[(&str, &str)] = &[
        ("title", "Tacos"),
        ("summary", "Quick tacos"),
        ("instructions", "Step 1\nStep 2"),
        ("name", "Ana"),
        ("email", "ana@example.com"),
    ];

    #[tokio::test]
    async fn share_then_read_back() {
        let (app, storage) = app().await;

        let res = app
            .clone()
            .oneshot(post(multipart_body(TACOS, Some(("tacos.jpg", &b"\xff\xd8"[..])))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers()[LOCATION], "/meals/tacos");
        assert_eq!(json(res).await["slug"], "tacos");
        assert_eq!(storage.puts()[0].key, "tacos.jpg");

        let res = app
            .clone()
            .oneshot(Request::get("/api/v1/meals/tacos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let meal = json(res).await;
        assert_eq!(meal["image"], "tacos.jpg");
        assert_eq!(meal["image_url"], "https://fake.local/tacos.jpg");
        assert_eq!(meal["instructions_html"], "Step 1<br>Step 2");

        let res = app
            .oneshot(Request::get("/api/v1/meals").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let list = json(res).await;
        assert_eq!(list.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn missing_image_is_unprocessable() {
        let (app, storage) = app().await;
        let res = app.oneshot(post(multipart_body(TACOS, None))).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json(res).await["code"], "missing_image");
        assert!(storage.puts().is_empty());
    }

    #[tokio::test]
    async fn duplicate_title_conflicts() {
        let (app, _) = app().await;
        let first = app
            .clone()
            .oneshot(post(multipart_body(TACOS, Some(("a.jpg", &b"1"[..])))))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(post(multipart_body(TACOS, Some(("b.png", &b"2"[..])))))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(json(second).await["code"], "duplicate_identifier");
    }

    #[tokio::test]
    async fn unknown_meal_is_not_found() {
        let (app, _) = app().await;
        let res = app
            .oneshot(Request::get("/api/v1/meals/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(res).await["code"], "not_found");
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let (app, storage) = app().await;
        let image = vec![0u8; 2 * 1024 * 1024];
        let res = app
            .oneshot(post(multipart_body(TACOS, Some(("tacos.jpg", &image[..])))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json(res).await["code"], "payload_too_large");
        assert!(storage.puts().is_empty());
    }

    #[tokio::test]
    async fn unresolvable_image_url_is_bad_gateway() {
        let (app, _) = app_with(RecordingStorage::without_urls()).await;
        let res = app
            .clone()
            .oneshot(post(multipart_body(TACOS, Some(("tacos.jpg", &b"1"[..])))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        for uri in ["/api/v1/meals/tacos", "/api/v1/meals"] {
            let res = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_GATEWAY, "{uri}");
            assert_eq!(json(res).await["code"], "object_store");
        }
    }

    #[test]
    fn location_percent_encodes_unicode() {
        assert_eq!(location_for("tacos"), "/meals/tacos");
        assert_eq!(location_for("crème"), "/meals/cr%C3%A8me");
    }
}
