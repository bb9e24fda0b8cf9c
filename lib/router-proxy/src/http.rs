//! Body type and canned responses used by the proxy

use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Streaming body used for both directions of a proxied exchange
pub type ProxyBody = UnsyncBoxBody<Bytes, BoxError>;

/// Body text sent with every 502 Bad Gateway response
pub const BAD_GATEWAY_BODY: &str = "Bad gateway";

/// Erase a request or response body into a `ProxyBody` without buffering it
pub fn boxed<B>(body: B) -> ProxyBody
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::<BoxError>::into).boxed_unsync()
}

/// A complete in-memory body
pub fn full(chunk: impl Into<Bytes>) -> ProxyBody {
    Full::new(chunk.into()).map_err(|never| match never {}).boxed_unsync()
}

/// Plain-text response with the given status
pub fn text_response(status: StatusCode, body: &'static str) -> Response<ProxyBody> {
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// Create a 502 Bad Gateway response
pub fn bad_gateway_response() -> Response<ProxyBody> {
    text_response(StatusCode::BAD_GATEWAY, BAD_GATEWAY_BODY)
}
