//! Anonymous booking sessions: the `booking_session` cookie or the
//! `x-booking-session` header, the header winning when both are sent.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use salon_core::session::SessionToken;
use std::convert::Infallible;

use crate::state::CookieSettings;

pub const SESSION_COOKIE: &str = "booking_session";
pub const SESSION_HEADER: &str = "x-booking-session";

/// The caller's session, if it sent a well-formed one.
#[derive(Debug, Clone)]
pub struct BookingSession(pub Option<SessionToken>);

impl BookingSession {
    /// Existing token, or a fresh one for first-time visitors.
    pub fn or_mint(self) -> SessionToken {
        self.0.unwrap_or_else(SessionToken::generate)
    }
}

impl<S> FromRequestParts<S> for BookingSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_header = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(SessionToken::parse);
        if from_header.is_some() {
            return Ok(Self(from_header));
        }

        let jar = CookieJar::from_headers(&parts.headers);
        Ok(Self(jar.get(SESSION_COOKIE).and_then(|c| SessionToken::parse(c.value()))))
    }
}

pub fn session_cookie(token: &SessionToken, settings: &CookieSettings) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.secure)
        .max_age(time::Duration::hours(settings.max_age_hours))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Option<SessionToken> {
        let (mut parts, _) = req.into_parts();
        BookingSession::from_request_parts(&mut parts, &()).await.unwrap().0
    }

    #[tokio::test]
    async fn test_header_wins_over_cookie() {
        let header = SessionToken::generate();
        let cookie = SessionToken::generate();
        let req = Request::builder()
            .header(SESSION_HEADER, header.as_str())
            .header("cookie", format!("{}={}", SESSION_COOKIE, cookie))
            .body(())
            .unwrap();

        assert_eq!(extract(req).await, Some(header));
    }

    #[tokio::test]
    async fn test_cookie_is_read() {
        let cookie = SessionToken::generate();
        let req = Request::builder()
            .header("cookie", format!("theme=dark; {}={}", SESSION_COOKIE, cookie))
            .body(())
            .unwrap();

        assert_eq!(extract(req).await, Some(cookie));
    }

    #[tokio::test]
    async fn test_malformed_tokens_are_ignored() {
        let req = Request::builder()
            .header(SESSION_HEADER, "not a token")
            .body(())
            .unwrap();

        assert_eq!(extract(req).await, None);
    }

    #[test]
    fn test_cookie_attributes() {
        let token = SessionToken::generate();
        let cookie = session_cookie(&token, &CookieSettings { secure: true, max_age_hours: 24 });

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(24)));
    }
}
