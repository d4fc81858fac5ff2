//! OpenID Connect provider: discovery, authorization URL and ID token checks

use crate::error::{LoginError, Result};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// OAuth2 client ID registered with every issuer; also the kubeconfig user name
pub const CLIENT_ID: &str = "kubectl-login";
/// Value sent as the `state` parameter of the authorization request
pub const AUTH_STATE: &str = "csrf-protection-state";
/// Scopes requested from the issuer
pub const SCOPES: &[&str] = &["openid", "profile", "email", "groups"];

/// Client settings for one issuer
#[derive(Clone)]
pub struct OidcClient {
    pub issuer: String,
    pub redirect_url: String,
}

/// Claims kubectl-login looks at after verification
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A discovered identity provider
pub trait IdentityProvider {
    /// URL the operator opens to start the authorization-code flow
    fn authorization_url(&self, state: &str) -> Result<Url>;

    /// Check signature, issuer, audience and expiry of `id_token`
    fn verify(&self, id_token: &str) -> Result<IdTokenClaims>;
}

/// Creates providers from issuer settings
pub trait ProviderConnector {
    fn connect(&self, client: &OidcClient) -> Result<Box<dyn IdentityProvider>>;
}

/// Subset of the discovery document
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Deserialize)]
struct JwkKey {
    kty: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
}

/// Discovery URL for `issuer`
pub fn discovery_url(issuer: &str) -> String {
    format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    )
}

/// Build the authorization-code request URL
pub fn build_authorization_url(
    metadata: &ProviderMetadata,
    client: &OidcClient,
    state: &str,
) -> Result<Url> {
    let mut url = Url::parse(&metadata.authorization_endpoint).map_err(|e| {
        LoginError::ProviderDiscoveryFailed {
            issuer: client.issuer.clone(),
            reason: format!("bad authorization endpoint: {}", e),
        }
    })?;
    url.query_pairs_mut()
        .append_pair("client_id", CLIENT_ID)
        .append_pair("redirect_uri", &client.redirect_url)
        .append_pair("response_type", "code")
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("state", state);
    Ok(url)
}

/// Connector doing discovery over HTTPS
pub struct HttpConnector {
    http: reqwest::blocking::Client,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoginError::Other(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

impl ProviderConnector for HttpConnector {
    fn connect(&self, client: &OidcClient) -> Result<Box<dyn IdentityProvider>> {
        let failed = |reason: String| LoginError::ProviderDiscoveryFailed {
            issuer: client.issuer.clone(),
            reason,
        };

        let url = discovery_url(&client.issuer);
        debug!(url = %url, "Fetching OIDC discovery document");

        let metadata: ProviderMetadata = self
            .http
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?
            .json()
            .map_err(|e| failed(format!("invalid discovery document: {}", e)))?;

        if metadata.issuer.trim_end_matches('/') != client.issuer.trim_end_matches('/') {
            return Err(failed(format!(
                "issuer mismatch: discovery document names {}",
                metadata.issuer
            )));
        }

        Ok(Box::new(DiscoveredProvider {
            client: client.clone(),
            metadata,
            http: self.http.clone(),
        }))
    }
}

/// Provider backed by a fetched discovery document
pub struct DiscoveredProvider {
    client: OidcClient,
    metadata: ProviderMetadata,
    http: reqwest::blocking::Client,
}

impl DiscoveredProvider {
    fn fetch_jwks(&self) -> Result<JwksDocument> {
        debug!(url = %self.metadata.jwks_uri, "Fetching JWKS");
        self.http
            .get(&self.metadata.jwks_uri)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| LoginError::TokenInvalid(format!("cannot fetch signing keys: {}", e)))
    }
}

impl IdentityProvider for DiscoveredProvider {
    fn authorization_url(&self, state: &str) -> Result<Url> {
        build_authorization_url(&self.metadata, &self.client, state)
    }

    fn verify(&self, id_token: &str) -> Result<IdTokenClaims> {
        let header =
            decode_header(id_token).map_err(|e| LoginError::TokenInvalid(e.to_string()))?;
        debug!(kid = ?header.kid, alg = ?header.alg, "Decoded ID token header");

        let jwks = self.fetch_jwks()?;
        let key = select_key(&jwks, header.kid.as_deref(), header.alg)?;

        let validation = validation_for(header.alg, &self.metadata.issuer);
        let data = decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(|e| LoginError::TokenInvalid(e.to_string()))?;

        info!(
            sub = %data.claims.sub,
            email = data.claims.email.as_deref().unwrap_or("-"),
            name = data.claims.name.as_deref().unwrap_or("-"),
            "Verified ID token"
        );
        Ok(data.claims)
    }
}

/// Issuer, audience and expiry checks for an ID token
fn validation_for(alg: Algorithm, issuer: &str) -> Validation {
    let mut validation = Validation::new(alg);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[CLIENT_ID]);
    validation.validate_exp = true;
    validation
}

fn key_family(alg: Algorithm) -> Option<&'static str> {
    match alg {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => Some("RSA"),
        Algorithm::ES256 | Algorithm::ES384 => Some("EC"),
        _ => None,
    }
}

/// Pick the JWK matching `kid`, or the first key of the right type
fn select_key(jwks: &JwksDocument, kid: Option<&str>, alg: Algorithm) -> Result<DecodingKey> {
    let family = key_family(alg).ok_or_else(|| {
        LoginError::TokenInvalid(format!("unsupported signing algorithm {:?}", alg))
    })?;

    let jwk = jwks
        .keys
        .iter()
        .filter(|k| k.kty == family)
        .find(|k| kid.is_none() || k.kid.as_deref() == kid)
        .ok_or_else(|| LoginError::TokenInvalid(format!("no signing key for kid {:?}", kid)))?;

    let missing = |field: &str| LoginError::TokenInvalid(format!("signing key lacks '{}'", field));
    let key = match family {
        "RSA" => DecodingKey::from_rsa_components(
            jwk.n.as_deref().ok_or_else(|| missing("n"))?,
            jwk.e.as_deref().ok_or_else(|| missing("e"))?,
        ),
        _ => DecodingKey::from_ec_components(
            jwk.x.as_deref().ok_or_else(|| missing("x"))?,
            jwk.y.as_deref().ok_or_else(|| missing("y"))?,
        ),
    };
    key.map_err(|e| LoginError::TokenInvalid(format!("bad signing key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ProviderMetadata {
        ProviderMetadata {
            issuer: "https://dex.example.com".to_string(),
            authorization_endpoint: "https://dex.example.com/auth".to_string(),
            jwks_uri: "https://dex.example.com/keys".to_string(),
        }
    }

    fn client() -> OidcClient {
        OidcClient {
            issuer: "https://dex.example.com".to_string(),
            redirect_url: "https://login.example.com/callback".to_string(),
        }
    }

    #[test]
    fn test_discovery_url() {
        assert_eq!(
            discovery_url("https://dex.example.com/"),
            "https://dex.example.com/.well-known/openid-configuration"
        );
        assert_eq!(
            discovery_url("https://example.com/dex"),
            "https://example.com/dex/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_authorization_url() {
        let url = build_authorization_url(&metadata(), &client(), AUTH_STATE).unwrap();
        assert_eq!(url.host_str(), Some("dex.example.com"));
        assert_eq!(url.path(), "/auth");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("client_id"), Some(CLIENT_ID));
        assert_eq!(get("redirect_uri"), Some("https://login.example.com/callback"));
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("scope"), Some("openid profile email groups"));
        assert_eq!(get("state"), Some(AUTH_STATE));
    }

    #[test]
    fn test_authorization_url_bad_endpoint() {
        let mut md = metadata();
        md.authorization_endpoint = "not a url".to_string();
        assert!(matches!(
            build_authorization_url(&md, &client(), AUTH_STATE),
            Err(LoginError::ProviderDiscoveryFailed { .. })
        ));
    }

    #[test]
    fn test_metadata_parse() {
        let json = r#"{
            "issuer": "https://dex.example.com",
            "authorization_endpoint": "https://dex.example.com/auth",
            "token_endpoint": "https://dex.example.com/token",
            "jwks_uri": "https://dex.example.com/keys",
            "response_types_supported": ["code"]
        }"#;
        let md: ProviderMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(md.jwks_uri, "https://dex.example.com/keys");
    }

    #[test]
    fn test_select_key_by_kid() {
        let jwks: JwksDocument = serde_json::from_str(
            r#"{"keys": [
                {"kty": "RSA", "kid": "a", "n": "sXch", "e": "AQAB"},
                {"kty": "RSA", "kid": "b", "n": "sXch", "e": "AQAB"}
            ]}"#,
        )
        .unwrap();
        assert!(select_key(&jwks, Some("b"), Algorithm::RS256).is_ok());
        assert!(select_key(&jwks, None, Algorithm::RS256).is_ok());
        assert!(matches!(
            select_key(&jwks, Some("c"), Algorithm::RS256),
            Err(LoginError::TokenInvalid(_))
        ));
        // no EC key present
        assert!(select_key(&jwks, None, Algorithm::ES256).is_err());
        assert!(select_key(&jwks, None, Algorithm::HS256).is_err());
    }

    #[test]
    fn test_select_key_missing_components() {
        let jwks: JwksDocument =
            serde_json::from_str(r#"{"keys": [{"kty": "RSA", "kid": "a"}]}"#).unwrap();
        assert!(matches!(
            select_key(&jwks, Some("a"), Algorithm::RS256),
            Err(LoginError::TokenInvalid(_))
        ));
    }

    #[test]
    fn test_validation_for_sets_issuer_and_audience() {
        let v = validation_for(Algorithm::RS256, "https://dex.example.com");
        assert!(v.iss.as_ref().unwrap().contains("https://dex.example.com"));
        assert!(v.aud.as_ref().unwrap().contains(CLIENT_ID));
        assert!(v.validate_exp);
    }
}
