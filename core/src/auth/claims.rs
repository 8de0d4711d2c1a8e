//! Identity claims carried by Azure AD tokens.
//!
//! Only the payload segment is decoded; signatures are checked by the
//! services that consume the token, not by this crate.

use super::types::LoginKind;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct IdentityClaims {
    pub upn: Option<String>,
    pub email: Option<String>,
    pub unique_name: Option<String>,
    pub appid: Option<String>,
    pub tid: Option<String>,
    pub idp: Option<String>,
}

impl IdentityClaims {
    /// Decodes the claims of a JWT, or `None` for opaque tokens.
    pub fn decode(jwt: &str) -> Option<Self> {
        let payload = jwt.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Best display identifier for the signed-in principal.
    ///
    /// Microsoft accounts signed into a directory appear as
    /// `live.com#user@outlook.com` in `unique_name`; the prefix is dropped.
    pub fn user_id(&self) -> Option<String> {
        self.upn
            .clone()
            .or_else(|| self.email.clone())
            .or_else(|| {
                self.unique_name
                    .as_deref()
                    .map(|name| name.rsplit('#').next().unwrap_or(name).to_string())
            })
            .or_else(|| self.appid.clone())
    }

    pub fn login_kind(&self) -> LoginKind {
        let live = self
            .idp
            .as_deref()
            .is_some_and(|idp| idp.to_ascii_lowercase().contains("live.com"))
            || self
                .unique_name
                .as_deref()
                .is_some_and(|name| name.to_ascii_lowercase().starts_with("live.com#"));
        if live {
            LoginKind::LiveId
        } else {
            LoginKind::OrgId
        }
    }
}
