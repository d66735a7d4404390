//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the timetable and course catalog endpoints,
//! the router that mounts them, and the master definition for the OpenAPI
//! specification.

use crate::error::{ErrorBody, HttpError};
use crate::web::middleware::require_auth;
use crate::web::protocol::{
    CourseDetailView, CourseView, CreatedTimetable, EditTimetableRequest, MessageResponse,
    SectionRequest, SectionView, TimetableView,
};
use crate::web::state::AppState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use timetable_core::{EngineError, MetadataEdit, Timetable, TimetableId};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_timetable_handler,
        get_timetable_handler,
        copy_timetable_handler,
        edit_timetable_handler,
        delete_timetable_handler,
        add_section_handler,
        remove_section_handler,
        list_courses_handler,
        get_course_handler,
    ),
    components(
        schemas(
            TimetableView,
            SectionView,
            CreatedTimetable,
            EditTimetableRequest,
            SectionRequest,
            MessageResponse,
            CourseView,
            CourseDetailView,
            ErrorBody,
        )
    ),
    tags(
        (name = "Timetables", description = "Build, publish and share clash-free timetables."),
        (name = "Courses", description = "Browse the course catalog.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router
//=========================================================================================

/// Every timetable route sits behind the session cookie check. The course
/// catalog is public.
pub fn router(state: Arc<AppState>) -> Router {
    let catalog = Router::new()
        .route("/course", get(list_courses_handler))
        .route("/course/{id}", get(get_course_handler));

    let timetables = Router::new()
        .route("/timetable/create", post(create_timetable_handler))
        .route(
            "/timetable/{id}",
            get(get_timetable_handler).delete(delete_timetable_handler),
        )
        .route("/timetable/{id}/copy", post(copy_timetable_handler))
        .route("/timetable/{id}/edit", post(edit_timetable_handler))
        .route("/timetable/{id}/add", post(add_section_handler))
        .route("/timetable/{id}/remove", post(remove_section_handler))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    catalog.merge(timetables).with_state(state)
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Ids that do not decode can not name an existing timetable.
fn decode_id(state: &AppState, encoded: &str) -> Result<TimetableId, HttpError> {
    state
        .ids
        .decode(encoded)
        .ok_or_else(|| EngineError::NotFound("timetable".to_string()).into())
}

fn view(state: &AppState, timetable: &Timetable) -> Result<TimetableView, HttpError> {
    TimetableView::from_domain(timetable, &state.ids)
        .map_err(|e| EngineError::Internal(e.to_string()).into())
}

fn created(state: &AppState, timetable: &Timetable) -> Result<impl IntoResponse, HttpError> {
    let id = state
        .ids
        .encode(timetable.id)
        .map_err(|e| HttpError(EngineError::Internal(e.to_string())))?;
    Ok((StatusCode::CREATED, Json(CreatedTimetable { id })))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a new, empty draft timetable for the caller.
#[utoipa::path(
    post,
    path = "/timetable/create",
    tag = "Timetables",
    responses(
        (status = 201, description = "Timetable created", body = CreatedTimetable),
        (status = 401, description = "Missing or invalid session cookie"),
        (status = 404, description = "Caller is not a registered user", body = ErrorBody)
    )
)]
pub async fn create_timetable_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let timetable = state.engine.create_timetable(user_id).await?;
    created(&state, &timetable)
}

/// Fetch a timetable with its sections.
///
/// Private timetables of other users are reported as not found.
#[utoipa::path(
    get,
    path = "/timetable/{id}",
    tag = "Timetables",
    params(("id" = String, Path, description = "Obfuscated timetable id")),
    responses(
        (status = 200, description = "The timetable", body = TimetableView),
        (status = 404, description = "Timetable not found", body = ErrorBody)
    )
)]
pub async fn get_timetable_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<String>,
) -> Result<Json<TimetableView>, HttpError> {
    let id = decode_id(&state, &id)?;
    let timetable = state.engine.get_timetable(user_id, id).await?;
    Ok(Json(view(&state, &timetable)?))
}

/// Copy a visible, non-archived timetable into a new draft owned by the caller.
#[utoipa::path(
    post,
    path = "/timetable/{id}/copy",
    tag = "Timetables",
    params(("id" = String, Path, description = "Obfuscated id of the timetable to copy")),
    responses(
        (status = 201, description = "Copy created", body = CreatedTimetable),
        (status = 404, description = "Timetable not found", body = ErrorBody),
        (status = 409, description = "Source timetable is archived", body = ErrorBody)
    )
)]
pub async fn copy_timetable_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let id = decode_id(&state, &id)?;
    let copy = state.engine.copy_timetable(user_id, id).await?;
    created(&state, &copy)
}

/// Rename, publish or unpublish a timetable.
#[utoipa::path(
    post,
    path = "/timetable/{id}/edit",
    tag = "Timetables",
    params(("id" = String, Path, description = "Obfuscated timetable id")),
    request_body = EditTimetableRequest,
    responses(
        (status = 200, description = "Updated timetable", body = TimetableView),
        (status = 400, description = "Invalid metadata", body = ErrorBody),
        (status = 403, description = "Caller does not own the timetable", body = ErrorBody),
        (status = 409, description = "Lifecycle rule violated", body = ErrorBody),
        (status = 502, description = "Search index could not be updated", body = ErrorBody)
    )
)]
pub async fn edit_timetable_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<String>,
    Json(request): Json<EditTimetableRequest>,
) -> Result<Json<TimetableView>, HttpError> {
    let id = decode_id(&state, &id)?;
    let edit = MetadataEdit {
        name: request.name,
        private: request.is_private,
        draft: request.is_draft,
    };
    let timetable = state.engine.edit_metadata(user_id, id, edit).await?;
    Ok(Json(view(&state, &timetable)?))
}

/// Delete a timetable and drop it from the search index.
#[utoipa::path(
    delete,
    path = "/timetable/{id}",
    tag = "Timetables",
    params(("id" = String, Path, description = "Obfuscated timetable id")),
    responses(
        (status = 200, description = "Timetable deleted", body = MessageResponse),
        (status = 403, description = "Caller does not own the timetable", body = ErrorBody),
        (status = 404, description = "Timetable not found", body = ErrorBody),
        (status = 502, description = "Search index could not be updated", body = ErrorBody)
    )
)]
pub async fn delete_timetable_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, HttpError> {
    let id = decode_id(&state, &id)?;
    state.engine.delete_timetable(user_id, id).await?;
    Ok(Json(MessageResponse {
        message: "timetable deleted".to_string(),
    }))
}

/// Add a section to a draft timetable.
///
/// Refused with 409 on the first class-hour or exam-hour clash found.
#[utoipa::path(
    post,
    path = "/timetable/{id}/add",
    tag = "Timetables",
    params(("id" = String, Path, description = "Obfuscated timetable id")),
    request_body = SectionRequest,
    responses(
        (status = 200, description = "Updated timetable", body = TimetableView),
        (status = 403, description = "Caller does not own the timetable", body = ErrorBody),
        (status = 404, description = "Timetable or section not found", body = ErrorBody),
        (
            status = 409,
            description = "Clash, duplicate section type or lifecycle rule",
            body = ErrorBody
        )
    )
)]
pub async fn add_section_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<String>,
    Json(request): Json<SectionRequest>,
) -> Result<Json<TimetableView>, HttpError> {
    let id = decode_id(&state, &id)?;
    let timetable = state.engine.add_section(user_id, id, request.section_id).await?;
    Ok(Json(view(&state, &timetable)?))
}

/// Remove a section from a timetable.
#[utoipa::path(
    post,
    path = "/timetable/{id}/remove",
    tag = "Timetables",
    params(("id" = String, Path, description = "Obfuscated timetable id")),
    request_body = SectionRequest,
    responses(
        (status = 200, description = "Updated timetable", body = TimetableView),
        (status = 403, description = "Caller does not own the timetable", body = ErrorBody),
        (status = 404, description = "Timetable or section not found", body = ErrorBody),
        (status = 409, description = "Timetable is archived", body = ErrorBody)
    )
)]
pub async fn remove_section_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<String>,
    Json(request): Json<SectionRequest>,
) -> Result<Json<TimetableView>, HttpError> {
    let id = decode_id(&state, &id)?;
    let timetable = state
        .engine
        .remove_section(user_id, id, request.section_id)
        .await?;
    Ok(Json(view(&state, &timetable)?))
}

/// List every course still on offer, ordered by code.
#[utoipa::path(
    get,
    path = "/course",
    tag = "Courses",
    responses(
        (status = 200, description = "Courses on offer", body = Vec<CourseView>)
    )
)]
pub async fn list_courses_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CourseView>>, HttpError> {
    let courses = state.engine.list_courses().await?;
    Ok(Json(courses.into_iter().map(CourseView::from).collect()))
}

/// Fetch a course with all of its sections.
#[utoipa::path(
    get,
    path = "/course/{id}",
    tag = "Courses",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "The course and its sections", body = CourseDetailView),
        (status = 404, description = "Course not found", body = ErrorBody)
    )
)]
pub async fn get_course_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CourseDetailView>, HttpError> {
    let detail = state.engine.course_with_sections(id).await?;
    Ok(Json(detail.into()))
}
