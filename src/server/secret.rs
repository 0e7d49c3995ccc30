//! Shared-secret gate for every route.
//!
//! The secret is looked up on each request: `DOCROUTE_API_SECRET` first, then
//! the `api_secret` of the config file. The file is re-read whenever its
//! modification time changes, so the secret can be rotated without a restart.
//! An empty value counts as unset, and with no secret configured every
//! request passes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use subtle::ConstantTimeEq;

use crate::config::{Config, ENV_API_SECRET};

pub const SECRET_HEADER: &str = "x-api-secret";

#[derive(Debug)]
pub struct SecretGate {
    env_var: Option<&'static str>,
    file: Option<FileSecret>,
    fixed: Option<String>,
}

/// `api_secret` of a config file, reloaded when the file changes.
#[derive(Debug)]
struct FileSecret {
    path: PathBuf,
    state: Mutex<FileState>,
}

#[derive(Debug, Default)]
struct FileState {
    modified: Option<SystemTime>,
    secret: Option<String>,
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl FileSecret {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(FileState::default()),
        }
    }

    fn current(&self) -> Option<String> {
        let modified = modified_time(&self.path);
        let mut state = self.state.lock();

        // A missing or unreadable file keeps the last secret that was read
        if modified.is_some() && modified != state.modified {
            match Config::read_api_secret(&self.path) {
                Ok(secret) => {
                    if secret != state.secret {
                        tracing::info!(path = %self.path.display(), "API secret reloaded");
                    }
                    state.secret = secret;
                }
                Err(e) => {
                    tracing::warn!("Keeping previous API secret: {}", e);
                }
            }
            state.modified = modified;
        }

        state.secret.clone()
    }
}

impl SecretGate {
    /// Gate reading `DOCROUTE_API_SECRET` and the config file the service was
    /// started with.
    pub fn from_config(config: &Config) -> Self {
        Self {
            env_var: Some(ENV_API_SECRET),
            file: config.config_file.clone().map(FileSecret::new),
            fixed: None,
        }
    }

    /// Gate with a fixed secret that ignores the environment.
    #[cfg(test)]
    pub fn fixed(secret: Option<String>) -> Self {
        Self {
            env_var: None,
            file: None,
            fixed: secret.filter(|s| !s.is_empty()),
        }
    }

    #[cfg(test)]
    fn watching(env_var: Option<&'static str>, path: PathBuf) -> Self {
        Self {
            env_var,
            file: Some(FileSecret::new(path)),
            fixed: None,
        }
    }

    /// The secret in force right now, if any.
    pub fn current(&self) -> Option<String> {
        self.env_var
            .and_then(|var| std::env::var(var).ok())
            .filter(|s| !s.is_empty())
            .or_else(|| self.file.as_ref().and_then(FileSecret::current))
            .or_else(|| self.fixed.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.current().is_some()
    }
}

fn secrets_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[derive(Serialize)]
struct Unauthorized {
    detail: &'static str,
}

/// Rejects requests whose `x-api-secret` header does not match the secret in force.
pub async fn require_secret(
    State(gate): State<Arc<SecretGate>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = gate.current() else {
        return next.run(request).await;
    };

    let authorized = request
        .headers()
        .get(SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|provided| secrets_match(provided, &expected));
    if authorized {
        return next.run(request).await;
    }

    tracing::warn!(
        method = %request.method(),
        path = %request.uri().path(),
        "rejected request with invalid or missing API secret"
    );
    (
        StatusCode::UNAUTHORIZED,
        Json(Unauthorized {
            detail: "Invalid or missing API secret",
        }),
    )
        .into_response()
}
