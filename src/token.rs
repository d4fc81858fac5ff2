//! Splitting the pasted login output into tokens

use crate::kubectl::{Credential, OidcCredential};

/// Separator between the identity token and the refresh token
pub const TOKEN_SEPARATOR: char = ';';

/// Tokens pasted by the operator after the browser login
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedTokens {
    pub id_token: String,
    /// Empty when the input carried no refresh token
    pub refresh_token: String,
}

impl std::fmt::Debug for CapturedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedTokens")
            .field("id_token", &format_args!("<{} bytes>", self.id_token.len()))
            .field("has_refresh_token", &self.has_refresh_token())
            .finish()
    }
}

/// Split `raw` on [`TOKEN_SEPARATOR`]: first field is the identity token,
/// second the refresh token, anything after that is ignored.
pub fn extract(raw: &str) -> CapturedTokens {
    let mut fields = raw.split(TOKEN_SEPARATOR);
    let id_token = fields.next().unwrap_or_default().to_string();
    let refresh_token = fields.next().unwrap_or_default().to_string();
    CapturedTokens {
        id_token,
        refresh_token,
    }
}

impl CapturedTokens {
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Static token without a refresh token, OIDC auth-provider with one
    pub fn into_credential(self, client_secret: &str, issuer_url: &str) -> Credential {
        if self.has_refresh_token() {
            Credential::Oidc(OidcCredential {
                client_secret: client_secret.to_string(),
                id_token: self.id_token,
                refresh_token: self.refresh_token,
                issuer_url: issuer_url.to_string(),
            })
        } else {
            Credential::Token(self.id_token)
        }
    }
}
