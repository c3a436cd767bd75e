use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use uuid::Uuid;

use crate::{
    error::{Error, UploadError},
    error_code::ErrorCode,
};

const ISSUER: &str = "tubely-access";

#[derive(Debug, thiserror::Error)]
pub(crate) enum AuthError {
    #[error("Authorization header is missing")]
    MissingToken,

    #[error("Authorization header is not a bearer token")]
    MalformedHeader,

    #[error("Token validation is not configured")]
    Unconfigured,

    #[error("Invalid token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("Token subject is not a user id")]
    InvalidSubject(#[source] uuid::Error),
}

impl AuthError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingToken => ErrorCode::MISSING_TOKEN,
            _ => ErrorCode::INVALID_TOKEN,
        }
    }
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
struct Claims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// Validates HS256 access tokens minted by the account service
pub(crate) struct JwtKeys {
    decoding: DecodingKey,
    validation: Validation,

    #[cfg(test)]
    encoding: jsonwebtoken::EncodingKey,
}

impl JwtKeys {
    pub(crate) fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        JwtKeys {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,

            #[cfg(test)]
            encoding: jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    fn validate(&self, token: &str) -> Result<Uuid, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(AuthError::InvalidToken)?;

        Uuid::parse_str(&data.claims.sub).map_err(AuthError::InvalidSubject)
    }

    #[cfg(test)]
    pub(crate) fn sign(&self, user_id: Uuid, ttl: time::Duration) -> String {
        let now = time::OffsetDateTime::now_utc();

        let claims = Claims {
            iss: ISSUER.to_string(),
            sub: user_id.to_string(),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
        };

        jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &self.encoding).unwrap()
    }
}

fn bearer_token(req: &HttpRequest) -> Result<&str, AuthError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;

    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MalformedHeader)
}

/// The user a request is acting on behalf of
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Authenticated {
    pub(crate) user_id: Uuid,
}

impl Authenticated {
    fn from_req(req: &HttpRequest) -> Result<Self, AuthError> {
        let keys = req
            .app_data::<web::Data<JwtKeys>>()
            .ok_or(AuthError::Unconfigured)?;

        let token = bearer_token(req)?;
        let user_id = keys.validate(token)?;

        Ok(Authenticated { user_id })
    }
}

impl FromRequest for Authenticated {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Self::from_req(req).map_err(|e| {
            tracing::debug!("Rejected request: {e}");
            UploadError::from(e).into()
        }))
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{http::header::AUTHORIZATION, test::TestRequest, web};
    use uuid::Uuid;

    use super::{AuthError, Authenticated, JwtKeys};

    const SECRET: &str = "a-very-secret-secret";

    fn request_with(keys: JwtKeys, header: Option<String>) -> Result<Authenticated, AuthError> {
        let mut req = TestRequest::default().app_data(web::Data::new(keys));

        if let Some(header) = header {
            req = req.insert_header((AUTHORIZATION, header));
        }

        Authenticated::from_req(&req.to_http_request())
    }

    #[test]
    fn accepts_valid_token() {
        let keys = JwtKeys::new(SECRET);
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id, time::Duration::hours(1));

        let authenticated = request_with(keys, Some(format!("Bearer {token}"))).unwrap();

        assert_eq!(authenticated.user_id, user_id);
    }

    #[test]
    fn missing_header() {
        let error = request_with(JwtKeys::new(SECRET), None).unwrap_err();

        assert!(matches!(error, AuthError::MissingToken));
        assert_eq!(error.error_code().as_str(), "missing-token");
    }

    #[test]
    fn not_a_bearer_token() {
        let error =
            request_with(JwtKeys::new(SECRET), Some(String::from("Basic abc"))).unwrap_err();

        assert!(matches!(error, AuthError::MalformedHeader));
    }

    #[test]
    fn wrong_secret() {
        let token = JwtKeys::new("some-other-secret").sign(Uuid::new_v4(), time::Duration::hours(1));

        let error =
            request_with(JwtKeys::new(SECRET), Some(format!("Bearer {token}"))).unwrap_err();

        assert!(matches!(error, AuthError::InvalidToken(_)));
    }

    #[test]
    fn expired_token() {
        let keys = JwtKeys::new(SECRET);
        let token = keys.sign(Uuid::new_v4(), time::Duration::hours(-2));

        let error = request_with(keys, Some(format!("Bearer {token}"))).unwrap_err();

        assert!(matches!(error, AuthError::InvalidToken(_)));
        assert_eq!(error.error_code().as_str(), "invalid-token");
    }
}
