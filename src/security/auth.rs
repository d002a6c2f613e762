//! HTTP Basic authentication against the resolved realm.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::prelude::*;

use crate::observability::metrics;
use crate::security::credentials::{CredentialStore, Credentials};
use crate::security::login::{LoginModule, LoginModules};
use crate::security::realm::{SecurityRealm, REALM_NAME};

/// Username of the caller, attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Credential checker built once from the realm at startup.
pub enum Authenticator {
    Delegated {
        module_name: String,
        module: Option<Arc<dyn LoginModule>>,
        config_file: PathBuf,
    },
    Single(Credentials),
    File(CredentialStore),
}

impl Authenticator {
    /// Prepare the realm for request checks. The credentials file is read
    /// here and only here; a missing or unreadable file rejects everyone.
    pub fn from_realm(realm: &SecurityRealm, modules: &LoginModules) -> Self {
        match realm {
            SecurityRealm::Delegated {
                module_name,
                config_file,
            } => {
                let module = modules.get(module_name);
                if module.is_none() {
                    tracing::warn!(module = %module_name, "No login module registered under this name; all requests will be rejected");
                }
                Authenticator::Delegated {
                    module_name: module_name.clone(),
                    module,
                    config_file: config_file.clone(),
                }
            }
            SecurityRealm::SingleCredential(creds) => Authenticator::Single(creds.clone()),
            SecurityRealm::FileBacked { path } => match CredentialStore::load(path) {
                Ok(store) => {
                    tracing::info!(path = %path.display(), users = store.len(), "Loaded credentials file");
                    Authenticator::File(store)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Credentials file unusable; all requests will be rejected");
                    Authenticator::File(CredentialStore::default())
                }
            },
        }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self {
            Authenticator::Delegated {
                module, config_file, ..
            } => module
                .as_ref()
                .map(|m| m.authenticate(config_file, username, password))
                .unwrap_or(false),
            Authenticator::Single(creds) => {
                creds.username == username && creds.password == password
            }
            Authenticator::File(store) => store.verify(username, password),
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Authenticator::Delegated { module_name, .. } => {
                write!(f, "Authenticator::Delegated({})", module_name)
            }
            Authenticator::Single(creds) => write!(f, "Authenticator::Single({})", creds.username),
            Authenticator::File(store) => write!(f, "Authenticator::File({} users)", store.len()),
        }
    }
}

/// Parse `Basic <base64(username:password)>`.
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = BASE64_STANDARD.decode(encoded.trim().as_bytes()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

pub async fn basic_auth_middleware(
    State(auth): State<Arc<Authenticator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_basic_auth);

    if let Some((username, password)) = credentials {
        if auth.verify(&username, &password) {
            request.extensions_mut().insert(AuthenticatedUser(username));
            return next.run(request).await;
        }
        tracing::debug!(username = %username, path = %request.uri().path(), "Rejected credentials");
    }

    metrics::record_auth_rejection();
    unauthorized()
}

fn unauthorized() -> Response {
    let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", REALM_NAME))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        "Authentication required",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    struct AllowAdmin;

    impl LoginModule for AllowAdmin {
        fn authenticate(
            &self,
            _config_file: &std::path::Path,
            username: &str,
            _password: &str,
        ) -> bool {
            username == "admin"
        }
    }

    fn app(auth: Authenticator) -> Router {
        Router::new()
            .route(
                "/",
                get(|Extension(user): Extension<AuthenticatedUser>| async move { user.0 }),
            )
            .layer(middleware::from_fn_with_state(Arc::new(auth), basic_auth_middleware))
    }

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", BASE64_STANDARD.encode(format!("{}:{}", user, pass)))
    }

    #[test]
    fn parses_header() {
        assert_eq!(
            parse_basic_auth("Basic dXNlcjpwYXNz"),
            Some(("user".to_string(), "pass".to_string()))
        );
        assert_eq!(
            parse_basic_auth("Basic YWRtaW46cEBzczp3b3Jk"),
            Some(("admin".to_string(), "p@ss:word".to_string()))
        );
        assert_eq!(parse_basic_auth("Bearer abc"), None);
        assert_eq!(parse_basic_auth("Basic !!invalid!!"), None);
        assert_eq!(parse_basic_auth("Basic dXNlcnBhc3M="), None);
    }

    #[tokio::test]
    async fn rejects_missing_and_wrong_credentials() {
        let app = app(Authenticator::Single(Credentials::new("cluster", "cluster")));

        let res = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));

        let res = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::AUTHORIZATION, basic("cluster", "wrong"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn accepts_valid_credentials_and_attaches_user() {
        let app = app(Authenticator::Single(Credentials::new("cluster", "cluster")));

        let res = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::AUTHORIZATION, basic("cluster", "cluster"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"cluster");
    }

    #[test]
    fn delegated_without_module_rejects_everyone() {
        let realm = SecurityRealm::Delegated {
            module_name: "ldap".into(),
            config_file: PathBuf::from("login.conf"),
        };
        let auth = Authenticator::from_realm(&realm, &LoginModules::new());
        assert!(!auth.verify("admin", "admin"));

        let mut modules = LoginModules::new();
        modules.register("ldap", Arc::new(AllowAdmin));
        let auth = Authenticator::from_realm(&realm, &modules);
        assert!(auth.verify("admin", "anything"));
        assert!(!auth.verify("guest", "anything"));
    }

    #[test]
    fn missing_credentials_file_rejects_everyone() {
        let realm = SecurityRealm::FileBacked {
            path: PathBuf::from("/no/such/dir/node.pwd"),
        };
        let auth = Authenticator::from_realm(&realm, &LoginModules::new());
        assert!(!auth.verify("cluster", "cluster"));
    }
}
