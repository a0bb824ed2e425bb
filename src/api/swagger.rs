use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "User Service API",
        version = "1.0.0",
        description = "CRUD for user records with profile picture upload.\n\n**Identity:** users are addressed by the `email` query parameter.\n\n**Not found:** lookups without a match return `null` with status 200."
    ),
    paths(
        // Users
        crate::api::users::list_users,
        crate::api::users::get_user,
        crate::api::users::update_user,
        crate::api::users::patch_user,
        crate::api::users::delete_user,
        crate::api::users::create_user,

        // Health & Metrics
        crate::api::health::health_check,
        crate::api::metrics::get_metrics,
    ),
    components(
        schemas(
            crate::models::UserSchema,
            crate::models::CreateUserForm,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Users", description = "User records. Lookup, update and delete are filtered by email; create takes a multipart form with a `picture` image."),
        (name = "Health", description = "Health check and request metrics."),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_user_route() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/users"));

        let user = doc.paths.paths.get("/user").unwrap();
        assert!(user.get.is_some());
        assert!(user.put.is_some());
        assert!(user.patch.is_some());
        assert!(user.delete.is_some());
        assert!(user.post.is_some());
    }
}
