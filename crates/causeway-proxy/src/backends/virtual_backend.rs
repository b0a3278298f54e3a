//! Pure helpers for the Virtual (first-match composite) backend. The
//! recursive dispatch loop itself lives in `dispatch::Dispatcher`, since it
//! needs to re-enter routing — these are just the path arithmetic and
//! content-type defaulting it needs along the way.

use hyper::{HeaderValue, Response};

use crate::context::ResponseBody;

use super::resource_path;

/// `target_path = source_endpoint.prefix + (request.path − endpoint.prefix)`.
pub fn target_path(request_path: &str, endpoint_prefix: &str, source_prefix: &str) -> String {
    let resource = resource_path(request_path, endpoint_prefix);
    let source_prefix = source_prefix.trim_end_matches('/');
    if resource.is_empty() {
        source_prefix.to_string()
    } else {
        format!("{source_prefix}/{resource}")
    }
}

/// Ensures a successful virtual-source response carries a `content-type`,
/// defaulting to `application/text` when the source left it unset.
pub fn with_default_content_type(mut response: Response<ResponseBody>) -> Response<ResponseBody> {
    if !response.headers().contains_key("content-type") {
        response
            .headers_mut()
            .insert("content-type", HeaderValue::from_static("application/text"));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_path_joins_source_prefix_with_resource() {
        assert_eq!(target_path("/v/users/1", "/v", "/local"), "/local/users/1");
    }

    #[test]
    fn target_path_with_no_resource_is_bare_prefix() {
        assert_eq!(target_path("/v", "/v", "/local"), "/local");
        assert_eq!(target_path("/v/", "/v", "/local"), "/local");
    }
}
