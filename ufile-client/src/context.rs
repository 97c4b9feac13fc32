//! Shared request plumbing for the object APIs

use crate::config::ObjectConfig;
use crate::response::{decode_response, DecodeResponse};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use ufile_core::auth::{ObjectAuthParam, ObjectAuthorizer};
use ufile_net::{headers, HttpRequest, Method, Transport};

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Transport, signer and addressing shared by the client and its sessions
#[derive(Clone)]
pub(crate) struct RequestContext {
    pub transport: Arc<dyn Transport>,
    pub authorizer: Arc<dyn ObjectAuthorizer>,
    pub config: ObjectConfig,
}

impl RequestContext {
    /// `Date` header value
    pub fn request_date() -> String {
        Utc::now().format("%Y%m%d%H%M%S").to_string()
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        self.config.final_host(bucket, key)
    }

    /// A request to `url` with `Date`, `Content-Type` and `Authorization` set
    pub fn signed(
        &self,
        method: Method,
        url: String,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<HttpRequest> {
        let date = Self::request_date();
        let param = ObjectAuthParam::new(method.as_str(), bucket, key)
            .with_content_type(content_type)
            .with_date(&date);
        let authorization = self.authorizer.authorization(&param)?;

        let mut request = HttpRequest::new(method, url)
            .header(headers::DATE, date)
            .header(headers::AUTHORIZATION, authorization);
        if !content_type.is_empty() {
            request = request.header(headers::CONTENT_TYPE, content_type);
        }
        Ok(request)
    }

    pub fn send<T: DecodeResponse>(&self, request: HttpRequest) -> Result<T> {
        let response = self.transport.send(request)?;
        decode_response(response)
    }
}
