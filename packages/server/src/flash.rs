//! One-shot messages carried across a redirect in the `flash` cookie.

use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const FLASH_COOKIE: &str = "flash";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Notice,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Notice,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    /// Hex-encoded JSON, safe for a cookie value.
    pub fn encode(&self) -> String {
        // Serializing a struct of a unit enum and a string cannot fail.
        hex::encode(serde_json::to_vec(self).unwrap_or_default())
    }

    pub fn decode(value: &str) -> Option<Self> {
        let bytes = hex::decode(value).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// `303 See Other` to `to`, optionally setting a flash message.
#[derive(Debug)]
pub struct FlashRedirect {
    pub to: String,
    pub flash: Option<Flash>,
}

impl FlashRedirect {
    pub fn to(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            flash: None,
        }
    }

    pub fn with(flash: Flash, to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            flash: Some(flash),
        }
    }
}

impl IntoResponse for FlashRedirect {
    fn into_response(self) -> Response {
        let mut jar = CookieJar::new();
        if let Some(flash) = self.flash {
            if flash.kind == FlashKind::Error {
                warn!(message = %flash.message, "Flashing error");
            }
            jar = jar.add(Cookie::build((FLASH_COOKIE, flash.encode())).path("/"));
        }
        (jar, Redirect::to(&self.to)).into_response()
    }
}
