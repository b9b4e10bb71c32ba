use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use ring::hmac;
use ring::rand::SystemRandom;
use serde::Serialize;

use crate::error::SecurityError;

/// The only action tokens are currently issued for.
pub const SEARCH_ACTION: &str = "search_text";

const CLOCK_SKEW_SECS: i64 = 60;

/// One render of a host page. Tokens issued against the same context are identical,
/// so a page keeps a single token for as long as it is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    session: String,
    rendered_at: DateTime<Utc>,
}

impl PageContext {
    pub fn new() -> PageContext {
        PageContext::at(Utc::now())
    }

    pub fn at(rendered_at: DateTime<Utc>) -> PageContext {
        PageContext {
            session: nanoid::nanoid!(16),
            rendered_at,
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }
}

impl Default for PageContext {
    fn default() -> Self {
        PageContext::new()
    }
}

/// Opaque proof that a request came from a page we rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AntiForgeryToken(String);

impl AntiForgeryToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AntiForgeryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues and checks HMAC-signed tokens of the form `<session>.<issued>.<tag>`.
pub struct SecurityGate {
    key: hmac::Key,
    max_age: Duration,
}

impl SecurityGate {
    pub fn new(secret: &[u8], max_age: Duration) -> SecurityGate {
        SecurityGate {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            max_age,
        }
    }

    /// A gate whose key lives only as long as this process.
    pub fn with_random_key(max_age: Duration) -> anyhow::Result<SecurityGate> {
        let key = hmac::Key::generate(hmac::HMAC_SHA256, &SystemRandom::new())
            .map_err(|_| anyhow::anyhow!("failed to generate token key"))?;
        Ok(SecurityGate { key, max_age })
    }

    pub fn issue_token(&self, page: &PageContext, action: &str) -> AntiForgeryToken {
        let issued = page.rendered_at.timestamp();
        let tag = hmac::sign(&self.key, signing_input(action, &page.session, issued).as_bytes());
        AntiForgeryToken(format!(
            "{}.{}.{}",
            page.session,
            issued,
            URL_SAFE_NO_PAD.encode(tag.as_ref())
        ))
    }

    /// Fails closed: anything that is not a well-formed, current token for `action`
    /// is rejected.
    pub fn validate_token(&self, token: &str, action: &str) -> Result<(), SecurityError> {
        self.validate_token_at(token, action, Utc::now())
    }

    pub fn validate_token_at(
        &self,
        token: &str,
        action: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SecurityError> {
        let result = self.check(token, action, now);
        if let Err(e) = &result {
            log::warn!("rejected anti-forgery token for action {action}: {e}");
        }
        result
    }

    fn check(&self, token: &str, action: &str, now: DateTime<Utc>) -> Result<(), SecurityError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SecurityError::Missing);
        }

        let mut parts = token.split('.');
        let (Some(session), Some(issued), Some(tag), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(SecurityError::Malformed);
        };
        if session.is_empty() {
            return Err(SecurityError::Malformed);
        }
        let issued: i64 = issued.parse().map_err(|_| SecurityError::Malformed)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| SecurityError::Malformed)?;

        hmac::verify(
            &self.key,
            signing_input(action, session, issued).as_bytes(),
            &tag,
        )
        .map_err(|_| SecurityError::Mismatch)?;

        let age = now.timestamp() - issued;
        if age < -CLOCK_SKEW_SECS || age > self.max_age.num_seconds() {
            return Err(SecurityError::Expired);
        }
        Ok(())
    }
}

fn signing_input(action: &str, session: &str, issued: i64) -> String {
    format!("{action}|{session}|{issued}")
}
