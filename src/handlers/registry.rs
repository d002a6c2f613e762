//! Handler mounting.
//!
//! # Responsibilities
//! - Instantiate every discovered handler and inject shared state
//! - Validate and normalize declared context paths
//! - Give each handler its own context and session namespace
//!
//! # Design Decisions
//! - Any bad path fails the whole mount; nothing is bound
//! - Paths are disjoint: no duplicates, no prefixes of one another,
//!   nothing under the fixed endpoints
//! - Handlers see the full request path, like the fixed endpoints do

use std::sync::Arc;

use axum::{body::Body, http::Request, routing::any, Router};
use serde::Serialize;
use thiserror::Error;

use crate::handlers::descriptor::HandlerDescriptor;
use crate::handlers::session::SessionStore;
use crate::handlers::{HandlerContext, MountMode, NodeHandler};
use crate::state::SharedState;

/// Prefix of the fixed REST endpoint group.
pub const API_PREFIX: &str = "/api";

/// Configuration errors found while mounting handlers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MountError {
    #[error("handler '{handler}' declares invalid path '{path}': {reason}")]
    InvalidPath {
        handler: String,
        path: String,
        reason: &'static str,
    },

    #[error("handlers '{first}' and '{second}' both mount at '{path}'")]
    DuplicatePath {
        path: String,
        first: String,
        second: String,
    },

    #[error("handler '{handler}' path '{path}' overlaps '{other}' of handler '{other_handler}'")]
    OverlappingPath {
        handler: String,
        path: String,
        other_handler: String,
        other: String,
    },

    #[error("handler '{handler}' path '{path}' is reserved")]
    ReservedPath { handler: String, path: String },
}

/// Turn a declared path such as `/status/*` into its mount point `/status`.
pub fn normalize_context_path(declared: &str) -> Result<String, &'static str> {
    let trimmed = declared.trim();
    let without_wildcard = trimmed.strip_suffix("/*").unwrap_or(trimmed);
    let path = without_wildcard.trim_end_matches('/');

    if !trimmed.starts_with('/') {
        return Err("must start with '/'");
    }
    if path.contains('*') {
        return Err("only a trailing '/*' wildcard is allowed");
    }
    if path.contains(['{', '}', ':']) {
        return Err("path parameters are not allowed");
    }
    if path.contains("//") {
        return Err("empty path segment");
    }

    Ok(if path.is_empty() { "/".to_string() } else { path.to_string() })
}

/// `prefix` equals `path` or is one of its leading segments.
pub(crate) fn is_segment_prefix(prefix: &str, path: &str) -> bool {
    path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

/// A handler bound at its context path.
pub struct MountedHandler {
    pub name: String,
    pub path: String,
    pub handler: Arc<dyn NodeHandler>,
    pub context: HandlerContext,
}

impl MountedHandler {
    fn routes(&self) -> Router {
        let handler = self.handler.clone();
        let context = self.context.clone();
        let service = any(move |mut request: Request<Body>| {
            let handler = handler.clone();
            let context = context.clone();
            async move {
                request.extensions_mut().insert(context);
                handler.handle(request).await
            }
        });

        Router::new()
            .route(&self.path, service.clone())
            .route(&format!("{}/{{*rest}}", self.path), service)
    }
}

/// Name and path of a mounted handler, for status reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerSummary {
    pub name: String,
    pub path: String,
}

/// All handlers mounted for one server start.
#[derive(Default)]
pub struct MountedHandlerSet {
    handlers: Vec<MountedHandler>,
}

impl MountedHandlerSet {
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn handlers(&self) -> &[MountedHandler] {
        &self.handlers
    }

    pub fn summaries(&self) -> Vec<HandlerSummary> {
        self.handlers
            .iter()
            .map(|h| HandlerSummary {
                name: h.name.clone(),
                path: h.path.clone(),
            })
            .collect()
    }

    /// One router holding every handler's routes.
    pub fn router(&self) -> Router {
        self.handlers
            .iter()
            .fold(Router::new(), |router, h| router.merge(h.routes()))
    }
}

/// Instantiate, set up and validate every descriptor.
///
/// `reserved` lists additional mount points owned by the server (the static
/// resource path); `/` and `/api` are always reserved.
pub fn mount(
    descriptors: &[HandlerDescriptor],
    shared: &SharedState,
    reserved: &[&str],
) -> Result<MountedHandlerSet, MountError> {
    let mut mounted: Vec<MountedHandler> = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        let mut handler = descriptor.instantiate();
        handler.mount(shared.clone(), MountMode::Server);

        let declared = handler.context_path().to_string();
        let path = normalize_context_path(&declared).map_err(|reason| MountError::InvalidPath {
            handler: descriptor.name().to_string(),
            path: declared.clone(),
            reason,
        })?;

        let is_reserved = path == "/"
            || is_segment_prefix(API_PREFIX, &path)
            || reserved
                .iter()
                .any(|r| is_segment_prefix(r, &path) || is_segment_prefix(&path, r));
        if is_reserved {
            return Err(MountError::ReservedPath {
                handler: descriptor.name().to_string(),
                path,
            });
        }

        for other in &mounted {
            if other.path == path {
                return Err(MountError::DuplicatePath {
                    path,
                    first: other.name.clone(),
                    second: descriptor.name().to_string(),
                });
            }
            if is_segment_prefix(&other.path, &path) || is_segment_prefix(&path, &other.path) {
                return Err(MountError::OverlappingPath {
                    handler: descriptor.name().to_string(),
                    path,
                    other_handler: other.name.clone(),
                    other: other.path.clone(),
                });
            }
        }

        tracing::info!(handler = %descriptor.name(), path = %path, "Mounted handler");

        let context = HandlerContext {
            name: descriptor.name().to_string(),
            context_path: path.clone(),
            sessions: SessionStore::new(&path),
        };
        mounted.push(MountedHandler {
            name: descriptor.name().to_string(),
            path,
            handler: Arc::from(handler),
            context,
        });
    }

    Ok(MountedHandlerSet { handlers: mounted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::EchoHandler;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn echo(name: &str, path: &'static str) -> HandlerDescriptor {
        HandlerDescriptor::new(name, move || Box::new(EchoHandler::at(path)))
    }

    #[test]
    fn normalizes_declared_paths() {
        assert_eq!(normalize_context_path("/status/*").unwrap(), "/status");
        assert_eq!(normalize_context_path("/status/").unwrap(), "/status");
        assert_eq!(normalize_context_path("/a/b").unwrap(), "/a/b");
        assert_eq!(normalize_context_path("/*").unwrap(), "/");
        assert!(normalize_context_path("status").is_err());
        assert!(normalize_context_path("/st*tus").is_err());
        assert!(normalize_context_path("/jobs/{id}").is_err());
        assert!(normalize_context_path("/a//b").is_err());
    }

    #[test]
    fn duplicate_paths_fail() {
        let err = mount(
            &[echo("one", "/status/*"), echo("two", "/status")],
            &SharedState::default(),
            &[],
        )
        .err()
        .unwrap();

        assert_eq!(
            err,
            MountError::DuplicatePath {
                path: "/status".into(),
                first: "one".into(),
                second: "two".into(),
            }
        );
    }

    #[test]
    fn overlapping_and_reserved_paths_fail() {
        let overlap = mount(
            &[echo("one", "/jobs"), echo("two", "/jobs/start")],
            &SharedState::default(),
            &[],
        );
        assert!(matches!(overlap, Err(MountError::OverlappingPath { .. })));

        // Sibling names that merely share characters are fine.
        let distinct = [echo("one", "/job"), echo("two", "/jobs")];
        assert!(mount(&distinct, &SharedState::default(), &[]).is_ok());

        for path in ["/", "/api", "/api/jobs", "/resources", "/resources/img"] {
            let result = mount(&[echo("one", path)], &SharedState::default(), &["/resources"]);
            assert!(matches!(result, Err(MountError::ReservedPath { .. })), "{} accepted", path);
        }
    }

    #[test]
    fn each_handler_gets_its_own_sessions_and_state() {
        let shared = SharedState::default();
        shared.jobs.register("j-1", "nightly");

        let set = mount(&[echo("one", "/one/*"), echo("two", "/two/*")], &shared, &[]).unwrap();

        assert_eq!(set.len(), 2);
        let [a, b] = set.handlers() else { panic!("expected two handlers") };
        assert!(!a.context.sessions.same_store(&b.context.sessions));
        assert_eq!(a.context.sessions.namespace(), "/one");
        assert_eq!(
            set.summaries(),
            vec![
                HandlerSummary { name: "one".into(), path: "/one".into() },
                HandlerSummary { name: "two".into(), path: "/two".into() },
            ]
        );
    }

    #[tokio::test]
    async fn routes_exact_and_wildcard_requests() {
        let set = mount(&[echo("one", "/one/*")], &SharedState::default(), &[]).unwrap();
        let router = set.router();

        for uri in ["/one", "/one/deeper/path"] {
            let res = router
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            let body = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
            assert_eq!(std::str::from_utf8(&body).unwrap(), format!("/one {} server", uri));
        }

        let res = router
            .oneshot(Request::builder().uri("/other").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
