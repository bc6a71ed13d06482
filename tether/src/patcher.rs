//! # Response Patcher
//!
//! Normalises `creationTimestamp` elements in XML response bodies.
//!
//! Some backends emit `<creationTimestamp>2023-01-01 10:00:00</creationTimestamp>`
//! where clients expect ISO-8601. The patcher rewrites every such value to
//! `2023-01-01T10:00:00Z`, keeping fractional seconds, and updates the
//! `Content-Length` header to the new body length.
//!
//! Bodies that are not valid UTF-8 are left untouched.

use std::borrow::Cow;
use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

pub const CONTENT_LENGTH: &str = "Content-Length";

lazy_static! {
    static ref CREATION_TIMESTAMP: Regex =
        Regex::new(r">\s*([0-9-]+) ([0-9:.]+)Z?\s*</creationTimestamp>").expect("valid creationTimestamp pattern");
}

/// A response whose body and headers can be rewritten in place.
pub trait PatchableResponse {
    fn body(&self) -> &[u8];

    fn set_body(&mut self, body: Vec<u8>);

    fn set_header(&mut self, name: &str, value: String);
}

/// What [`patch_creation_timestamps`] did to a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The body was empty.
    Empty,
    /// The body is not UTF-8 and was left as is.
    Undecodable,
    /// The body was re-encoded; `replacements` may be zero.
    Patched { replacements: usize },
}

/// Plain in-memory response, for callers without their own response type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedResponse {
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl BufferedResponse {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(&name.into(), value.into());
        self
    }

    /// Looks a header up, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

impl PatchableResponse for BufferedResponse {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value);
    }
}

/// Rewrites every `creationTimestamp` value in `text` to ISO-8601.
///
/// Borrows `text` back when nothing matched.
pub fn rewrite_creation_timestamps(text: &str) -> Cow<'_, str> {
    CREATION_TIMESTAMP.replace_all(text, ">${1}T${2}Z</creationTimestamp>")
}

/// Patches `response` in place. See the module docs.
pub fn patch_creation_timestamps<R>(response: &mut R) -> PatchOutcome
where
    R: PatchableResponse + ?Sized,
{
    if response.body().is_empty() {
        return PatchOutcome::Empty;
    }

    let text = match std::str::from_utf8(response.body()) {
        Ok(text) => text,
        Err(err) => {
            info!(error = %err, "response body is not UTF-8; leaving creationTimestamp values as they are");
            return PatchOutcome::Undecodable;
        }
    };

    let replacements = CREATION_TIMESTAMP.find_iter(text).count();
    let patched = rewrite_creation_timestamps(text).into_owned().into_bytes();
    let length = patched.len();

    response.set_body(patched);
    response.set_header(CONTENT_LENGTH, length.to_string());
    debug!(replacements, length, "patched creationTimestamp values");

    PatchOutcome::Patched { replacements }
}
