//! Mapping from API URLs to local tables.
//!
//! URLs look like `https://host/api/<resource>` or
//! `https://host/api/<resource>/<id>`. Only the four known resource segments
//! are accepted, by exact match.

use crate::error::OfflineError;
use crate::models::EntityKind;

/// A parsed API URL: which collection it addresses and, for item URLs, the
/// trailing record id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub kind: EntityKind,
    pub id: Option<String>,
}

impl Route {
    /// Parses an absolute URL or a bare path.
    pub fn parse(url: &str) -> Result<Self, OfflineError> {
        let unsupported = || OfflineError::UnsupportedEndpoint(url.to_string());

        let path = strip_origin(url);
        let path = path.split(['?', '#']).next().unwrap_or_default();

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        segments
            .by_ref()
            .find(|segment| *segment == "api")
            .ok_or_else(unsupported)?;

        let kind = segments
            .next()
            .and_then(EntityKind::from_segment)
            .ok_or_else(unsupported)?;
        let id = segments.next().map(str::to_string);

        if segments.next().is_some() {
            return Err(unsupported());
        }

        Ok(Self { kind, id })
    }

    pub fn is_item(&self) -> bool {
        self.id.is_some()
    }
}

fn strip_origin(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            rest.find('/').map(|i| &rest[i..]).unwrap_or("")
        }
        None => url,
    }
}

/// Builds remote URLs for the four collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/api/{segment}`
    pub fn collection(&self, kind: EntityKind) -> String {
        format!("{}/api/{}", self.base_url, kind.segment())
    }

    /// `{base}/api/{segment}/{id}`
    pub fn item(&self, kind: EntityKind, id: &str) -> String {
        format!("{}/{}", self.collection(kind), id)
    }
}
