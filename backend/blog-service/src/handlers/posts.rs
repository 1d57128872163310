/// Post handlers - HTTP endpoints for post operations
use super::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{Post, PostId, PostInput};
use crate::services::{PostError, PostService};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

fn default_page_size() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    /// Full-text query; when absent the newest posts are listed
    pub q: Option<String>,
    #[serde(default)]
    pub from: i64,
    #[serde(default = "default_page_size")]
    pub size: i64,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: Post,
    /// Set when the post was saved but search or cache could not be updated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_warning: Option<String>,
}

/// Turn a write result into a response, treating post-commit sync failures
/// as success with a warning
fn committed(result: std::result::Result<Post, PostError>) -> Result<PostResponse> {
    match result {
        Ok(post) => Ok(PostResponse {
            post,
            sync_warning: None,
        }),
        Err(err) if err.is_partial_success() => {
            let warning = err.to_string();
            match err.into_committed_post() {
                Some(post) => Ok(PostResponse {
                    post,
                    sync_warning: Some(warning),
                }),
                None => Err(AppError::Internal(warning)),
            }
        }
        Err(err) => Err(err.into()),
    }
}

/// Create a new post
pub async fn create_post(
    service: web::Data<PostService>,
    user: AuthUser,
    body: web::Json<PostInput>,
) -> Result<HttpResponse> {
    tracing::debug!(user_id = user.id, "Create post request");
    let response = committed(service.create(body.into_inner()).await)?;
    Ok(HttpResponse::Created().json(response))
}

/// List recent posts or search them
pub async fn list_posts(
    service: web::Data<PostService>,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse> {
    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let posts = match search {
        Some(q) => service.find_by_title_content(q, query.from, query.size).await?,
        None => service.find_recent(query.from, query.size).await?,
    };

    Ok(HttpResponse::Ok().json(posts))
}

/// Get a post by ID
pub async fn get_post(
    service: web::Data<PostService>,
    post_id: web::Path<PostId>,
) -> Result<HttpResponse> {
    let post = service.find_by_id(post_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Replace a post's content
pub async fn update_post(
    service: web::Data<PostService>,
    user: AuthUser,
    post_id: web::Path<PostId>,
    body: web::Json<PostInput>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    tracing::debug!(user_id = user.id, post_id, "Update post request");
    let response = committed(service.update(post_id, body.into_inner()).await)?;
    Ok(HttpResponse::Ok().json(response))
}

/// Delete a post
pub async fn delete_post(
    service: web::Data<PostService>,
    user: AuthUser,
    post_id: web::Path<PostId>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();
    tracing::debug!(user_id = user.id, post_id, "Delete post request");

    match service.delete(post_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(err) if err.is_partial_success() => Ok(HttpResponse::Ok().json(serde_json::json!({
            "id": post_id,
            "deleted": true,
            "sync_warning": err.to_string(),
        }))),
        Err(err) => Err(err.into()),
    }
}
