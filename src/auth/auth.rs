use crate::config::Config;
use crate::error::AppError;
use crate::{auth::jwt::verify_token, model::role::Role, models::TokenType};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

/// The authenticated caller: an employee id and the role it acts with.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub employee_id: u64,
    pub email: String,
    pub role: Role,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

impl AuthUser {
    /// Decodes an access token from the request headers.
    pub fn from_headers(req: &HttpRequest) -> Result<Self, AppError> {
        let token = bearer(req).ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

        let config = req
            .app_data::<Data<Config>>()
            .ok_or_else(|| AppError::Infrastructure("Config missing".into()))?;

        let claims = verify_token(token, &config.jwt_secret)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        Ok(AuthUser {
            employee_id: claims.employee_id,
            email: claims.sub,
            role: claims.role,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // the auth middleware has usually decoded the token already
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }
        ready(Self::from_headers(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::config::tests::test_config;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn reads_access_token() {
        let config = test_config();
        let token = generate_access_token(4, "ravi@company.com", Role::Admin, &config.jwt_secret, 60).unwrap();
        let req = TestRequest::default()
            .app_data(Data::new(config))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_request();

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.employee_id, 4);
        assert!(user.require_admin().is_ok());
    }

    #[actix_web::test]
    async fn refresh_token_is_not_an_access_token() {
        let config = test_config();
        let (token, _) =
            generate_refresh_token(4, "ravi@company.com", Role::Employee, &config.jwt_secret, 60).unwrap();
        let req = TestRequest::default()
            .app_data(Data::new(config))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_request();

        assert!(matches!(AuthUser::extract(&req).await, Err(AppError::Unauthorized(_))));
    }

    #[actix_web::test]
    async fn employee_is_not_admin() {
        let user = AuthUser {
            employee_id: 9,
            email: "e@company.com".into(),
            role: Role::Employee,
        };
        assert!(matches!(user.require_admin(), Err(AppError::Forbidden(_))));
    }
}
