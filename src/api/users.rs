use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use mongodb::bson::Document;

use crate::api::upload::{self, UploadConfig};
use crate::models::{CreateUserForm, User, UserQuery, UserResponse, UserSchema};
use crate::services::UserStore;
use crate::utils::ApiError;

/// Registers the user resource routes and the query config they rely on
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        log::warn!("⚠️ Rejected query string: {}", err);
        ApiError::InvalidParameter.into()
    }))
    .route("/users", web::get().to(list_users))
    .service(
        web::resource("/user")
            .route(web::get().to(get_user))
            .route(web::put().to(update_user))
            .route(web::patch().to(patch_user))
            .route(web::delete().to(delete_user))
            .route(web::post().to(create_user)),
    );
}

fn required_email(query: &UserQuery) -> Result<&str, ApiError> {
    query
        .email
        .as_deref()
        .filter(|email| !email.is_empty())
        .ok_or(ApiError::MissingParameter("email"))
}

/// Update body: empty means no change, otherwise a JSON object
fn parse_changes(body: &[u8]) -> Result<serde_json::Map<String, serde_json::Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Map::new());
    }
    serde_json::from_slice(body).map_err(|e| {
        log::warn!("⚠️ Rejected JSON body: {}", e);
        ApiError::InvalidBody("body must be a JSON object")
    })
}

/// Fields the client may never write: `_id` is immutable and `id` is its JSON alias
fn strip_reserved(doc: &mut Document) {
    doc.remove("_id");
    doc.remove("id");
}

/// GET /users - Lista todos os usuários
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses(
        (status = 200, description = "All users in storage order", body = [UserSchema]),
        (status = 500, description = "Database operation failed")
    )
)]
pub async fn list_users(store: web::Data<dyn UserStore>) -> Result<HttpResponse, ApiError> {
    log::info!("📋 GET /users");

    let users = store.find_all().await?;
    log::info!("✅ Listed {} users", users.len());

    let body: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /user?email= - Busca usuário por email (null se não existir)
#[utoipa::path(
    get,
    path = "/user",
    tag = "Users",
    params(UserQuery),
    responses(
        (status = 200, description = "Matching user, or null", body = UserSchema),
        (status = 400, description = "Missing URL parameter: email"),
        (status = 500, description = "Database operation failed")
    )
)]
pub async fn get_user(
    store: web::Data<dyn UserStore>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, ApiError> {
    let email = required_email(&query)?;
    log::info!("🔍 GET /user - {}", email);

    let user = store.find_by_email(email).await?;
    if user.is_none() {
        log::info!("ℹ️  No user with email {}", email);
    }

    Ok(HttpResponse::Ok().json(user.map(UserResponse::from)))
}

/// PUT /user?email= - Atualiza usuário
#[utoipa::path(
    put,
    path = "/user",
    tag = "Users",
    params(UserQuery),
    request_body(content = UserSchema, description = "Fields to set on the user"),
    responses(
        (status = 200, description = "Updated user, or null", body = UserSchema),
        (status = 400, description = "Missing email or invalid body"),
        (status = 500, description = "Database operation failed")
    )
)]
pub async fn update_user(
    store: web::Data<dyn UserStore>,
    query: web::Query<UserQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    apply_update("PUT", &store, &query, &body).await
}

/// PATCH /user?email= - Atualiza campos específicos do usuário
#[utoipa::path(
    patch,
    path = "/user",
    tag = "Users",
    params(UserQuery),
    request_body(content = UserSchema, description = "Fields to set on the user"),
    responses(
        (status = 200, description = "Updated user, or null", body = UserSchema),
        (status = 400, description = "Missing email or invalid body"),
        (status = 500, description = "Database operation failed")
    )
)]
pub async fn patch_user(
    store: web::Data<dyn UserStore>,
    query: web::Query<UserQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    apply_update("PATCH", &store, &query, &body).await
}

// PUT and PATCH share the same $set semantics
async fn apply_update(
    verb: &str,
    store: &web::Data<dyn UserStore>,
    query: &UserQuery,
    body: &[u8],
) -> Result<HttpResponse, ApiError> {
    let email = required_email(query)?;
    let body = parse_changes(body)?;

    let mut changes = mongodb::bson::to_document(&body).map_err(|e| {
        log::warn!("⚠️ Body cannot be stored: {}", e);
        ApiError::InvalidBody("body cannot be stored")
    })?;
    strip_reserved(&mut changes);

    log::info!("🔧 {} /user - Updating {} ({} fields)", verb, email, changes.len());

    let updated = store.update_by_email(email, changes).await?;
    match &updated {
        Some(_) => log::info!("✅ User updated"),
        None => log::info!("ℹ️  No user with email {}", email),
    }

    Ok(HttpResponse::Ok().json(updated.map(UserResponse::from)))
}

/// DELETE /user?email= - Remove usuário
#[utoipa::path(
    delete,
    path = "/user",
    tag = "Users",
    params(UserQuery),
    responses(
        (status = 200, description = "Removed user, or null", body = UserSchema),
        (status = 400, description = "Missing URL parameter: email"),
        (status = 500, description = "Database operation failed")
    )
)]
pub async fn delete_user(
    store: web::Data<dyn UserStore>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, ApiError> {
    let email = required_email(&query)?;
    log::info!("🗑️  DELETE /user - {}", email);

    let removed = store.remove_by_email(email).await?;
    if removed.is_some() {
        log::info!("✅ User {} deleted", email);
    }

    Ok(HttpResponse::Ok().json(removed.map(UserResponse::from)))
}

/// POST /user - Cria usuário com upload da foto (campo `picture`)
///
/// The picture is written before the record is saved; if the save fails the
/// file is removed again.
#[utoipa::path(
    post,
    path = "/user",
    tag = "Users",
    request_body(content = CreateUserForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Created user", body = UserSchema),
        (status = 400, description = "Missing body, missing picture or malformed form"),
        (status = 413, description = "Picture exceeds the configured limit"),
        (status = 415, description = "Picture is not an image"),
        (status = 500, description = "Upload or database operation failed")
    )
)]
pub async fn create_user(
    store: web::Data<dyn UserStore>,
    uploads: web::Data<UploadConfig>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    log::info!("📝 POST /user");

    let form = upload::read_user_form(&uploads, &mut payload).await?;
    if form.parts == 0 {
        return Err(ApiError::MissingBody);
    }

    let picture = match form.picture {
        Some(picture) => picture,
        None if form.rejected_picture => return Err(ApiError::UnsupportedMediaType),
        None => return Err(ApiError::MissingPicture),
    };

    let mut fields = form.fields;
    strip_reserved(&mut fields);

    let mut user = User::from_document(fields);
    user.picture = Some(picture.stored_path());

    // On error `picture` is dropped uncommitted and the file goes away
    let created = store.insert(user).await?;
    picture.commit();

    log::info!("✅ User created: {}", created.id.map(|id| id.to_hex()).unwrap_or_default());
    Ok(HttpResponse::Created().json(UserResponse::from(created)))
}
