use crate::models::{AuthRequest, NewUser, PasswordChangeRequest, UserInfo};
use crate::store::Repository;
use super::error::ServiceError;
use bcrypt::{hash, verify};
use tracing::{info, warn};
use uuid::Uuid;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 6;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

fn validate_username(raw: &str) -> Result<String, ServiceError> {
    let username = raw.trim();
    let len = username.chars().count();
    if len < MIN_USERNAME_LEN || len > MAX_USERNAME_LEN {
        return Err(ServiceError::invalid(
            "username",
            format!(
                "Username must be between {} and {} characters",
                MIN_USERNAME_LEN, MAX_USERNAME_LEN
            ),
        ));
    }
    Ok(username.to_string())
}

fn validate_password(field: &str, password: &str) -> Result<(), ServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::invalid(
            field,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

pub fn register_user(
    repo: &dyn Repository,
    bcrypt_cost: u32,
    auth_req: AuthRequest,
) -> Result<UserInfo, ServiceError> {
    let username = validate_username(&auth_req.username)?;
    validate_password("password", &auth_req.password)?;

    // Check if user already exists
    if repo.find_user_by_username(&username)?.is_some() {
        return Err(ServiceError::Conflict("Username already exists".to_string()));
    }

    let password_hash = hash(&auth_req.password, bcrypt_cost)?;
    let user = repo.create_user(NewUser {
        id: Uuid::new_v4(),
        username,
        password_hash,
    })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user.into())
}

/// Checks credentials. Unknown users and wrong passwords fail identically.
pub fn login_user(repo: &dyn Repository, auth_req: AuthRequest) -> Result<UserInfo, ServiceError> {
    let username = auth_req.username.trim();
    let found_user = repo.find_user_by_username(username)?;

    match found_user {
        Some(user) if verify(&auth_req.password, &user.password_hash)? => {
            info!(user_id = %user.id, "user logged in");
            Ok(user.into())
        }
        _ => {
            warn!(%username, "failed login attempt");
            Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))
        }
    }
}

pub fn current_user(repo: &dyn Repository, user_id: Uuid) -> Result<UserInfo, ServiceError> {
    repo.find_user(user_id)?
        .map(UserInfo::from)
        .ok_or_else(|| ServiceError::Unauthorized("Session user no longer exists".to_string()))
}

pub fn change_password(
    repo: &dyn Repository,
    bcrypt_cost: u32,
    user_id: Uuid,
    change_req: PasswordChangeRequest,
) -> Result<(), ServiceError> {
    let user = repo
        .find_user(user_id)?
        .ok_or_else(|| ServiceError::Unauthorized("Session user no longer exists".to_string()))?;

    if !verify(&change_req.current_password, &user.password_hash)? {
        return Err(ServiceError::Unauthorized("Current password is incorrect".to_string()));
    }
    validate_password("new_password", &change_req.new_password)?;

    let password_hash = hash(&change_req.new_password, bcrypt_cost)?;
    repo.update_password(user_id, &password_hash)?;
    info!(user_id = %user_id, "password changed");
    Ok(())
}
