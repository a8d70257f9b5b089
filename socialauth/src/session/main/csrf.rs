use subtle::ConstantTimeEq;

use crate::session::errors::SessionError;
use crate::session::types::Session;

impl Session {
    /// Compare a client supplied CSRF token with the one bound to this session.
    pub fn verify_csrf_token(&self, token: Option<&str>) -> Result<(), SessionError> {
        let Some(token) = token else {
            tracing::warn!("CSRF token missing on state-changing request");
            return Err(SessionError::CsrfToken("CSRF token missing".to_string()));
        };

        if token
            .as_bytes()
            .ct_eq(self.stored.csrf_token.as_bytes())
            .into()
        {
            Ok(())
        } else {
            tracing::warn!("CSRF token mismatch");
            Err(SessionError::CsrfToken("CSRF token mismatch".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::main::session::create_session;

    #[test]
    fn test_verify_csrf_token() {
        let session = create_session().unwrap();
        let token = session.csrf_token().to_string();

        assert!(session.verify_csrf_token(Some(&token)).is_ok());
        assert!(matches!(
            session.verify_csrf_token(Some("wrong")),
            Err(SessionError::CsrfToken(_))
        ));
        assert!(matches!(
            session.verify_csrf_token(None),
            Err(SessionError::CsrfToken(_))
        ));
    }
}
