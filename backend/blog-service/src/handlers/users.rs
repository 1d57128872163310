/// User handlers - registration, profile, password and login endpoints
use super::auth::AuthUser;
use crate::error::Result;
use crate::models::{ChangePasswordRequest, DeleteAccountRequest, LoginRequest, NewUser, UpdateUser};
use crate::services::UserService;
use actix_web::{web, HttpResponse};

/// Register a new user
pub async fn create_user(
    service: web::Data<UserService>,
    body: web::Json<NewUser>,
) -> Result<HttpResponse> {
    let user = service.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(user))
}

/// Update the caller's profile
pub async fn update_user(
    service: web::Data<UserService>,
    user: AuthUser,
    body: web::Json<UpdateUser>,
) -> Result<HttpResponse> {
    let updated = service.update_profile(user.id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Change the caller's password
pub async fn update_password(
    service: web::Data<UserService>,
    user: AuthUser,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse> {
    let updated = service.update_password(user.id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Delete the caller's account
pub async fn delete_user(
    service: web::Data<UserService>,
    user: AuthUser,
    body: web::Json<DeleteAccountRequest>,
) -> Result<HttpResponse> {
    service.delete(user.id, body.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Exchange credentials for an access token
pub async fn login(
    service: web::Data<UserService>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let response = service.login(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}
