mod common;

use bytes::Bytes;
use http::{Method, StatusCode};

use common::{context, header, MockTransport, Reply, ACCOUNT};
use s3bridge::error::{Error, ErrorKind, TransportError};
use s3bridge::request::{Buffered, RawRequest, Request, RequestOptions, Structured, XmlParser};

fn raw(transport: &std::sync::Arc<MockTransport>, options: RequestOptions) -> RawRequest {
    RawRequest::new(context(), transport.clone(), &options).unwrap()
}

#[tokio::test]
async fn test_end_sends_once() {
    let transport = MockTransport::with([Reply::ok().body("hello")]);
    let mut request = Request::new(raw(&transport, RequestOptions::new(Method::GET, "/")), Buffered);

    let completion = request.end().await.unwrap().unwrap();
    assert_eq!(completion.result, Some(Bytes::from_static(b"hello")));

    assert!(request.end().await.is_none());
    assert!(request.end().await.is_none());
    assert_eq!(transport.sends(), 1);
}

#[tokio::test]
async fn test_no_content_is_null_result() {
    let transport = MockTransport::with([Reply::status(204)]);
    let mut request = Request::new(raw(&transport, RequestOptions::new(Method::DELETE, "/key")), Buffered);

    let completion = request.end().await.unwrap().unwrap();
    assert!(completion.result.is_none());
    assert_eq!(completion.info.unwrap().status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_zero_length_skips_parse() {
    // The body is never read, so the invalid XML cannot fail the parse.
    let transport = MockTransport::with([Reply::ok().header("content-length", "0").body("<not-xml")]);
    let mut request = Request::new(raw(&transport, RequestOptions::new(Method::GET, "/")), Structured(XmlParser));

    let completion = request.end().await.unwrap().unwrap();
    assert!(completion.result.is_none());
}

#[tokio::test]
async fn test_structured_result() {
    let transport = MockTransport::with([Reply::ok()
        .chunk("<Result><Name>pho")
        .chunk("tos</Name></Result>")]);
    let mut request = Request::new(raw(&transport, RequestOptions::new(Method::GET, "/")), Structured(XmlParser))
        .map_results(|root, info| {
            assert_eq!(info.status, StatusCode::OK);
            Ok(root.and_then(|r| r.child_text("Name").map(str::to_string)))
        });

    let completion = request.end().await.unwrap().unwrap();
    assert_eq!(completion.result.as_deref(), Some("photos"));
}

#[tokio::test]
async fn test_parse_failure_is_error() {
    let transport = MockTransport::with([Reply::ok().body("<Result><Open>")]);
    let mut request = Request::new(raw(&transport, RequestOptions::new(Method::GET, "/")), Structured(XmlParser));

    let err = request.end().await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[tokio::test]
async fn test_missing_key_translated() {
    let transport = MockTransport::with([Reply::error(404, "NoSuchKey")]);
    let mut request = Request::new(raw(&transport, RequestOptions::new(Method::GET, "/missing")), Buffered);

    let err = request.end().await.unwrap().unwrap_err();
    let cloud = err.as_cloud().unwrap();
    assert!(cloud.is_not_found());
    assert!(!cloud.is_invalid_name());
    assert_eq!(cloud.status(), Some(404));
    assert_eq!(cloud.code(), Some("NoSuchKey"));
    assert!(cloud.raw().unwrap().message().contains("<Code>NoSuchKey</Code>"));
}

#[tokio::test]
async fn test_invalid_name_on_get_is_also_not_found() {
    let transport = MockTransport::with([Reply::error(400, "InvalidBucketName"), Reply::error(400, "InvalidBucketName")]);

    let mut get = Request::new(raw(&transport, RequestOptions::new(Method::GET, "/")), Buffered);
    let err = get.end().await.unwrap().unwrap_err();
    assert!(err.as_cloud().unwrap().is(ErrorKind::NotFound));
    assert!(err.as_cloud().unwrap().is(ErrorKind::InvalidName));

    let mut put = Request::new(raw(&transport, RequestOptions::new(Method::PUT, "/")), Buffered);
    let err = put.end().await.unwrap().unwrap_err();
    assert!(!err.as_cloud().unwrap().is_not_found());
    assert!(err.as_cloud().unwrap().is_invalid_name());
}

#[tokio::test]
async fn test_unmatched_error_passes_through() {
    let transport = MockTransport::with([Reply::error(500, "InternalError")]);
    let mut request = Request::new(raw(&transport, RequestOptions::new(Method::GET, "/")), Buffered);

    let err = request.end().await.unwrap().unwrap_err();
    let cloud = err.as_cloud().unwrap();
    assert!(cloud.kinds().is_empty());
    assert!(cloud.raw().is_none());
    assert_eq!(cloud.status(), Some(500));
}

#[tokio::test]
async fn test_transport_error_untouched() {
    let transport = MockTransport::with([Reply::Fail(TransportError::Request("connection refused".to_string()))]);
    let mut request = Request::new(raw(&transport, RequestOptions::new(Method::GET, "/")), Buffered);

    let err = request.end().await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Request(ref m)) if m == "connection refused"));
}

#[tokio::test]
async fn test_body_error_single_outcome() {
    let transport = MockTransport::with([Reply::ok()
        .chunk("partial")
        .body_error(TransportError::Body("reset".to_string()))
        .chunk("after")]);
    let mut request = Request::new(raw(&transport, RequestOptions::new(Method::GET, "/")), Buffered);

    let err = request.end().await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Body(_))));
    assert!(request.end().await.is_none());
}

#[tokio::test]
async fn test_error_handler_recodes() {
    let transport = MockTransport::with([Reply::error(404, "NoSuchKey")]);
    let mut request = Request::new(raw(&transport, RequestOptions::new(Method::DELETE, "/gone")), Buffered)
        .map_results(|_, _| Ok(false))
        .on_error(|err, method| {
            assert_eq!(*method, Method::DELETE);
            if err.is_not_found() {
                Ok(true)
            } else {
                Err(err)
            }
        });

    let completion = request.end().await.unwrap().unwrap();
    assert!(completion.result);
    assert_eq!(completion.info.unwrap().status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_signed_on_the_wire() {
    let transport = MockTransport::with([Reply::ok()]);
    let options = RequestOptions::new(Method::PUT, "/photos/puppy.jpg")
        .param("acl", "")
        .header("Content-Type", "image/jpeg")
        .header("Date", "Tue, 27 Mar 2007 21:15:45 +0000")
        .metadata("Color", "blue");
    let mut request = Request::new(raw(&transport, options), Buffered).with_body("data");
    request.end().await.unwrap().unwrap();

    let sent = transport.last();
    assert_eq!(sent.method, Method::PUT);
    assert_eq!(sent.host, "s3.amazonaws.com");
    assert_eq!(sent.port, 80);
    assert_eq!(sent.path, "/photos/puppy.jpg?acl=");
    assert_eq!(sent.body, Bytes::from_static(b"data"));
    assert_eq!(header(&sent, "x-amz-meta-color"), Some("blue"));
    assert_eq!(header(&sent, "host"), Some("s3.amazonaws.com"));

    let auth = header(&sent, "authorization").unwrap();
    assert!(auth.starts_with(&format!("AWS {}:", ACCOUNT)));
}

#[test]
fn test_invalid_header_fails_at_construction() {
    let transport = MockTransport::new();
    let options = RequestOptions::new(Method::GET, "/").header("bad header", "x");
    let err = RawRequest::new(context(), transport.clone(), &options).unwrap_err();
    assert!(matches!(err, Error::Usage(_)));
    assert_eq!(transport.sends(), 0);
}
