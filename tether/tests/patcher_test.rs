use tether::patcher::{
    BufferedResponse, CONTENT_LENGTH, PatchOutcome, PatchableResponse, patch_creation_timestamps,
    rewrite_creation_timestamps,
};

fn body_text(response: &BufferedResponse) -> &str {
    std::str::from_utf8(response.body()).unwrap()
}

#[test]
fn test_space_separated_timestamp_is_rewritten() {
    let mut response = BufferedResponse::new("<creationTimestamp>2023-01-01 10:00:00</creationTimestamp>");

    let outcome = patch_creation_timestamps(&mut response);

    assert_eq!(outcome, PatchOutcome::Patched { replacements: 1 });
    assert_eq!(
        body_text(&response),
        "<creationTimestamp>2023-01-01T10:00:00Z</creationTimestamp>"
    );
    assert_eq!(response.header(CONTENT_LENGTH), Some("59"));
}

#[test]
fn test_fractional_seconds_and_trailing_zone_are_kept() {
    let mut response = BufferedResponse::new("<creationTimestamp>2023-01-01 10:00:00.123456Z</creationTimestamp>");
    patch_creation_timestamps(&mut response);
    assert_eq!(
        body_text(&response),
        "<creationTimestamp>2023-01-01T10:00:00.123456Z</creationTimestamp>"
    );
}

#[test]
fn test_every_occurrence_is_rewritten() {
    let xml = "<list>\
        <item><creationTimestamp>2022-12-31 23:59:59</creationTimestamp></item>\
        <item><creationTimestamp> 2023-06-15 08:30:00.5 </creationTimestamp></item>\
        </list>";
    let mut response = BufferedResponse::new(xml).with_header("Content-Type", "application/xml");

    let outcome = patch_creation_timestamps(&mut response);

    assert_eq!(outcome, PatchOutcome::Patched { replacements: 2 });
    let patched = body_text(&response);
    assert!(patched.contains("<creationTimestamp>2022-12-31T23:59:59Z</creationTimestamp>"));
    assert!(patched.contains("<creationTimestamp>2023-06-15T08:30:00.5Z</creationTimestamp>"));
    assert_eq!(response.header(CONTENT_LENGTH), Some(patched.len().to_string().as_str()));
    assert_eq!(response.header("content-type"), Some("application/xml"));
}

#[test]
fn test_body_without_matches_is_byte_identical() {
    let xml = "<item><creationTimestamp>2023-01-01T10:00:00Z</creationTimestamp></item>";
    let mut response = BufferedResponse::new(xml);

    let outcome = patch_creation_timestamps(&mut response);

    assert_eq!(outcome, PatchOutcome::Patched { replacements: 0 });
    assert_eq!(response.body(), xml.as_bytes());
    assert_eq!(response.header(CONTENT_LENGTH), Some(xml.len().to_string().as_str()));
}

#[test]
fn test_non_utf8_body_is_left_unmodified() {
    let raw = vec![0xff, 0xfe, b'<', b'a', b'>'];
    let mut response = BufferedResponse::new(raw.clone()).with_header(CONTENT_LENGTH, "5");

    let outcome = patch_creation_timestamps(&mut response);

    assert_eq!(outcome, PatchOutcome::Undecodable);
    assert_eq!(response.body(), raw.as_slice());
    assert_eq!(response.header(CONTENT_LENGTH), Some("5"));
}

#[test]
fn test_empty_body_is_skipped() {
    let mut response = BufferedResponse::default();
    assert_eq!(patch_creation_timestamps(&mut response), PatchOutcome::Empty);
    assert!(response.header(CONTENT_LENGTH).is_none());
}

#[test]
fn test_multibyte_content_length_counts_bytes() {
    let mut response = BufferedResponse::new("<n>é</n><creationTimestamp>2023-01-01 10:00:00</creationTimestamp>");
    patch_creation_timestamps(&mut response);
    let expected = "<n>é</n><creationTimestamp>2023-01-01T10:00:00Z</creationTimestamp>".len();
    assert_eq!(response.header(CONTENT_LENGTH), Some(expected.to_string().as_str()));
}

struct RecordingResponse {
    body: Vec<u8>,
    headers: Vec<(String, String)>,
}

impl PatchableResponse for RecordingResponse {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    fn set_header(&mut self, name: &str, value: String) {
        self.headers.push((name.to_string(), value));
    }
}

#[test]
fn test_custom_response_type() {
    let mut response = RecordingResponse {
        body: b"<creationTimestamp>2020-02-02 02:02:02</creationTimestamp>".to_vec(),
        headers: Vec::new(),
    };

    patch_creation_timestamps(&mut response);

    assert_eq!(response.body, b"<creationTimestamp>2020-02-02T02:02:02Z</creationTimestamp>".to_vec());
    assert_eq!(response.headers, vec![("Content-Length".to_string(), "59".to_string())]);
}

#[test]
fn test_rewrite_on_plain_text() {
    assert_eq!(
        rewrite_creation_timestamps("<creationTimestamp>1999-12-31 00:00:00</creationTimestamp>"),
        "<creationTimestamp>1999-12-31T00:00:00Z</creationTimestamp>"
    );
}
