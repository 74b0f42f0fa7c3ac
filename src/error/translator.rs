//! Provider error translation
//!
//! A provider carries an ordered list of [`ErrorRule`]s. Translation walks the
//! list and the first matching rule wins, so a specific rule placed after a
//! general one with the same status and code is never reached.

use http::Method;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use super::{CloudError, ErrorKind, KindSet};

/// Kind set used instead of the default for one HTTP method
#[derive(Debug, Clone)]
pub struct MethodOverride {
    pub method: Method,
    pub message: String,
    pub kinds: KindSet,
}

/// One entry of a provider's error table
#[derive(Debug, Clone)]
pub struct ErrorRule {
    pub name: String,
    pub status: u16,
    /// Provider error code found in `<Error><Code>`
    pub code: String,
    /// Text matched in bodies that carry no provider code (HTML error pages)
    pub html: Option<String>,
    pub message: String,
    pub kinds: KindSet,
    pub overrides: Vec<MethodOverride>,
}

impl ErrorRule {
    pub fn new(name: &str, status: u16, code: &str, message: &str, kinds: &[ErrorKind]) -> Self {
        Self {
            name: name.to_string(),
            status,
            code: code.to_string(),
            html: None,
            message: message.to_string(),
            kinds: KindSet::of(kinds),
            overrides: Vec::new(),
        }
    }

    pub fn with_html(mut self, signature: &str) -> Self {
        self.html = Some(signature.to_string());
        self
    }

    pub fn with_override(mut self, method: Method, kinds: &[ErrorKind]) -> Self {
        self.overrides.push(MethodOverride {
            method,
            message: self.message.clone(),
            kinds: KindSet::of(kinds),
        });
        self
    }

    /// Match on status plus the provider-specific signature.
    ///
    /// When the body has no provider code, a rule with an html signature
    /// matches bodies containing it, and empty bodies (HEAD responses).
    pub fn matches(&self, status: Option<u16>, code: Option<&str>, body: &[u8]) -> bool {
        if status != Some(self.status) {
            return false;
        }
        match code {
            Some(code) => code == self.code,
            None => match &self.html {
                Some(signature) => body.is_empty() || contains(body, signature.as_bytes()),
                None => false,
            },
        }
    }

    fn resolve(&self, method: &Method) -> (&str, &KindSet) {
        self.overrides
            .iter()
            .find(|o| o.method == *method)
            .map(|o| (o.message.as_str(), &o.kinds))
            .unwrap_or((self.message.as_str(), &self.kinds))
    }
}

/// Which translated conditions callers treat as successful completions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecodePolicy {
    /// Deleting a missing resource completes with `not_found = true`
    pub delete_missing_is_success: bool,
    /// Creating a container the caller already owns completes with
    /// `already_created = true`
    pub create_already_owned_is_success: bool,
}

impl Default for RecodePolicy {
    fn default() -> Self {
        Self {
            delete_missing_is_success: true,
            create_already_owned_is_success: true,
        }
    }
}

/// First-match-wins rule walker
#[derive(Debug, Clone, Default)]
pub struct ErrorTranslator {
    rules: Vec<ErrorRule>,
}

impl ErrorTranslator {
    pub fn new(rules: Vec<ErrorRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ErrorRule] {
        &self.rules
    }

    /// Translate a raw cloud error, or `None` when no rule matches
    pub fn translate(&self, raw: &CloudError, method: &Method) -> Option<CloudError> {
        let body = raw.response().map(|r| r.body.as_ref()).unwrap_or_default();
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.matches(raw.status(), raw.code(), body))?;

        let (message, kinds) = rule.resolve(method);
        debug!(rule = %rule.name, method = %method, kinds = %kinds, "Translated cloud error");
        Some(CloudError::translated(message, kinds.clone(), raw.clone()))
    }

    /// Translate, falling back to the untranslated error
    pub fn translate_or_raw(&self, raw: CloudError, method: &Method) -> CloudError {
        self.translate(&raw, method).unwrap_or(raw)
    }
}

/// Read `<Error><Code>` out of an XML error body
pub(crate) fn extract_error_code(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;

    let mut depth = 0usize;
    let mut in_error = false;
    let mut in_code = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"Error" if depth == 1 => in_error = true,
                    b"Code" if in_error && depth == 2 => in_code = true,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) if in_code => {
                return e.unescape().ok().map(|text| text.into_owned());
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                in_code = false;
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};

    fn rules() -> Vec<ErrorRule> {
        vec![
            ErrorRule::new("container_not_found", 404, "NoSuchBucket", "Container not found.", &[ErrorKind::NotFound])
                .with_html("Not Found"),
            ErrorRule::new("container_invalid_name", 400, "InvalidBucketName", "Invalid container name.", &[ErrorKind::InvalidName])
                .with_override(Method::GET, &[ErrorKind::NotFound, ErrorKind::InvalidName]),
            ErrorRule::new("blob_not_found", 404, "NoSuchKey", "Blob not found.", &[ErrorKind::NotFound])
                .with_html("Not Found"),
        ]
    }

    fn raw(status: u16, body: &'static str) -> CloudError {
        CloudError::from_response(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn test_extract_error_code() {
        let body = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>";
        assert_eq!(extract_error_code(body), Some("NoSuchKey".to_string()));
        assert_eq!(extract_error_code(b"<html>Not Found</html>"), None);
        assert_eq!(extract_error_code(b""), None);
    }

    #[test]
    fn test_nested_code_is_ignored() {
        let body = b"<Error><Details><Code>Nested</Code></Details><Code>Real</Code></Error>";
        assert_eq!(extract_error_code(body), Some("Real".to_string()));
    }

    #[test]
    fn test_first_match_wins() {
        let translator = ErrorTranslator::new(rules());
        let err = raw(404, "<Error><Code>NoSuchKey</Code></Error>");
        let translated = translator.translate(&err, &Method::GET).unwrap();
        assert_eq!(translated.message(), "Blob not found.");
        assert!(translated.is_not_found());
        assert!(!translated.is_invalid_name());

        // Empty body matches the first html-signature rule for the status.
        let translated = translator.translate(&raw(404, ""), &Method::HEAD).unwrap();
        assert_eq!(translated.message(), "Container not found.");
    }

    #[test]
    fn test_method_override() {
        let translator = ErrorTranslator::new(rules());
        let err = raw(400, "<Error><Code>InvalidBucketName</Code></Error>");

        let on_get = translator.translate(&err, &Method::GET).unwrap();
        assert!(on_get.is_not_found());
        assert!(on_get.is_invalid_name());

        let on_put = translator.translate(&err, &Method::PUT).unwrap();
        assert!(!on_put.is_not_found());
        assert!(on_put.is_invalid_name());
    }

    #[test]
    fn test_unmatched_passes_through() {
        let translator = ErrorTranslator::new(rules());
        let err = raw(403, "<Error><Code>AccessDenied</Code></Error>");
        assert!(translator.translate(&err, &Method::GET).is_none());

        let passed = translator.translate_or_raw(err, &Method::GET);
        assert_eq!(passed.code(), Some("AccessDenied"));
        assert!(passed.kinds().is_empty());
    }

    #[test]
    fn test_translated_keeps_raw() {
        let translator = ErrorTranslator::new(rules());
        let err = raw(404, "<Error><Code>NoSuchBucket</Code></Error>");
        let translated = translator.translate(&err, &Method::DELETE).unwrap();
        assert_eq!(translated.status(), Some(404));
        assert_eq!(translated.raw().unwrap().code(), Some("NoSuchBucket"));
        assert!(translated.response().is_some());
    }
}
