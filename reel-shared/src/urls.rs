//! Turning stored relative paths into absolute URLs
//!
//! Media paths are always stored relative (`/uploads/<name>`). Responses carry
//! absolute URLs built from a configured origin. Resolution is idempotent: a
//! value that already carries a scheme is left alone.

use serde_json::Value;

use crate::AddrInfo;

const SCHEMES: [&str; 2] = ["http://", "https://"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    base: String,
}

impl UrlResolver {
    pub fn new(base: impl AsRef<str>) -> Self {
        Self {
            base: base.as_ref().trim().trim_end_matches('/').to_string(),
        }
    }

    /// Uses `main_url` when it is set and non-empty, otherwise the local listen origin.
    pub fn from_config(main_url: Option<&str>, addr: &AddrInfo) -> Self {
        match main_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => Self::new(url),
            None => Self::new(addr.as_local_url()),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn is_absolute(path: &str) -> bool {
        let lower = path.get(..8).unwrap_or(path).to_ascii_lowercase();
        SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
    }

    /// Resolves a stored path. Empty and already-absolute values come back unchanged.
    pub fn resolve(&self, path: &str) -> String {
        if path.is_empty() || Self::is_absolute(path) {
            return path.to_string();
        }
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    pub fn resolve_in_place(&self, path: &mut String) {
        if !path.is_empty() && !Self::is_absolute(path) {
            *path = self.resolve(path);
        }
    }

    /// Rewrites `field` on a JSON object, or on every object of a JSON array.
    ///
    /// Elements that are not objects, lack the field, or hold a non-string
    /// value are skipped.
    pub fn rewrite(&self, target: &mut Value, field: &str) {
        match target {
            Value::Array(items) => items
                .iter_mut()
                .for_each(|item| self.rewrite_object(item, field)),
            other => self.rewrite_object(other, field),
        }
    }

    fn rewrite_object(&self, target: &mut Value, field: &str) {
        if let Some(Value::String(path)) = target.as_object_mut().and_then(|obj| obj.get_mut(field))
        {
            self.resolve_in_place(path);
        }
    }
}

/// Response types that carry stored media paths.
pub trait ResolveUrls {
    fn resolve_urls(&mut self, resolver: &UrlResolver);

    fn with_resolved_urls(mut self, resolver: &UrlResolver) -> Self
    where
        Self: Sized,
    {
        self.resolve_urls(resolver);
        self
    }
}

impl<T: ResolveUrls> ResolveUrls for Vec<T> {
    fn resolve_urls(&mut self, resolver: &UrlResolver) {
        self.iter_mut().for_each(|item| item.resolve_urls(resolver));
    }
}

impl<T: ResolveUrls> ResolveUrls for Option<T> {
    fn resolve_urls(&mut self, resolver: &UrlResolver) {
        if let Some(inner) = self {
            inner.resolve_urls(resolver);
        }
    }
}
