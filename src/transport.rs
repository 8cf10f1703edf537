//! HTTP plumbing shared by every endpoint.
//!
//! The service speaks two conventions. Legacy (`/v2`) endpoints answer with a
//! `{code, msg, data}` envelope whose `code` each wrapper validates; newer
//! (`/v3`) endpoints signal failure through the HTTP status and a
//! `{message, reason, metadata}` body. Both paths produce [`NovitaError`] and
//! nothing else.

use crate::client::NovitaClient;
use crate::error::{NovitaError, Result, TRANSPORT_ERROR_CODE};
use crate::types::{V2Envelope, V3ErrorBody, V2_CODE_OK, V3_CODE_OK};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

const SOURCE_HEADER: &str = "x-novita-source";
const AUTH_TYPE_HEADER: &str = "x-novita-auth-type";

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct RequestOpts {
    /// Overrides the `X-Novita-Source` header for this call. An empty value
    /// keeps the configured source.
    pub source: Option<String>,
    /// Aborts the in-flight request when cancelled.
    pub signal: Option<CancellationToken>,
}

impl RequestOpts {
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Which response convention an endpoint follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Convention {
    Legacy,
    V3,
}

/// A single outbound call.
#[derive(Debug)]
pub(crate) struct ApiCall<'a> {
    pub(crate) method: Method,
    pub(crate) path: &'a str,
    pub(crate) body: Option<Value>,
    pub(crate) query: Vec<(&'a str, String)>,
}

impl<'a> ApiCall<'a> {
    pub(crate) fn get(path: &'a str) -> Self {
        Self {
            method: Method::GET,
            path,
            body: None,
            query: Vec::new(),
        }
    }

    pub(crate) fn post(path: &'a str, body: Value) -> Self {
        Self {
            method: Method::POST,
            path,
            body: Some(body),
            query: Vec::new(),
        }
    }

    pub(crate) fn query(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }
}

impl NovitaClient {
    /// Issues a legacy-convention call and returns the decoded body.
    ///
    /// Only HTTP-level failures are handled here; the `{code, msg}` envelope
    /// is checked by [`unwrap_v2`].
    pub(crate) async fn legacy_call(&self, call: ApiCall<'_>, opts: &RequestOpts) -> Result<Value> {
        let (status, text) = self.exchange(&call, opts, Convention::Legacy).await?;

        if !status.is_success() {
            tracing::warn!(path = call.path, %status, "legacy request failed");
            return Err(legacy_http_error(status, &text));
        }

        decode_json(&text)
    }

    /// Issues a new-convention call; any status but `200` is a failure.
    pub(crate) async fn v3_call(&self, call: ApiCall<'_>, opts: &RequestOpts) -> Result<Value> {
        let (status, text) = self.exchange(&call, opts, Convention::V3).await?;

        if status.as_u16() != V3_CODE_OK {
            tracing::warn!(path = call.path, %status, "v3 request failed");
            return Err(v3_http_error(status, &text));
        }

        let body = decode_json(&text)?;
        let error_body = V3ErrorBody::deserialize(&body).unwrap_or_default();
        if let Some(code) = error_body
            .code
            .filter(|code| *code != 0 && *code != i64::from(V3_CODE_OK))
        {
            tracing::warn!(path = call.path, code, "v3 request failed in body");
            return Err(v3_error(code, error_body, status, &text));
        }
        Ok(body)
    }

    fn headers(&self, opts: &RequestOpts, convention: Convention) -> Result<HeaderMap> {
        let config = self.config();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let source = opts
            .source
            .as_deref()
            .filter(|source| !source.is_empty())
            .unwrap_or(config.source());
        headers.insert(SOURCE_HEADER, header_value(source)?);

        match config.api_key() {
            Some(key) => {
                let mut value = header_value(key)?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            None if convention == Convention::V3 => {
                headers.insert(AUTH_TYPE_HEADER, HeaderValue::from_static("anon"));
            }
            None => {}
        }
        Ok(headers)
    }

    /// Sends the request and reads the whole body, honouring cancellation.
    async fn exchange(
        &self,
        call: &ApiCall<'_>,
        opts: &RequestOpts,
        convention: Convention,
    ) -> Result<(StatusCode, String)> {
        let mut url = self.config().endpoint(call.path)?;
        if !call.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(call.query.iter().map(|(k, v)| (*k, v.as_str())));
        }

        tracing::debug!(method = %call.method, %url, "sending request");

        let mut request = self
            .http()
            .request(call.method.clone(), url)
            .headers(self.headers(opts, convention)?);
        if let Some(body) = &call.body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let outcome = match &opts.signal {
            Some(signal) => tokio::select! {
                biased;
                _ = signal.cancelled() => return Err(NovitaError::cancelled()),
                outcome = exchange => outcome,
            },
            None => exchange.await,
        };

        outcome.map_err(|err| {
            tracing::warn!(path = call.path, error = %err, "request did not complete");
            NovitaError::transport(err)
        })
    }
}

/// Validates a legacy envelope and extracts its `data`.
pub(crate) fn unwrap_v2<T: DeserializeOwned>(body: Value) -> Result<T> {
    let envelope: V2Envelope<Value> = serde_json::from_value(body)?;
    if envelope.code != V2_CODE_OK {
        return Err(NovitaError::new(envelope.code, envelope.msg));
    }
    // A success envelope without data decodes as an empty object.
    let data = envelope
        .data
        .unwrap_or_else(|| Value::Object(Default::default()));
    Ok(serde_json::from_value(data)?)
}

/// Decodes a `/v3` success body into the endpoint's response type.
pub(crate) fn unwrap_v3<T: DeserializeOwned>(body: Value) -> Result<T> {
    Ok(serde_json::from_value(body)?)
}

fn decode_json(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(text)?)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|err| {
        NovitaError::new(TRANSPORT_ERROR_CODE, format!("Invalid header value: {}", err))
            .with_cause(err)
    })
}

/// Builds the error for a non-2xx legacy response, preferring the envelope
/// carried in the body when there is one.
fn legacy_http_error(status: StatusCode, text: &str) -> NovitaError {
    match serde_json::from_str::<V2Envelope<Value>>(text) {
        Ok(envelope) if envelope.code != V2_CODE_OK => {
            NovitaError::new(envelope.code, envelope.msg)
        }
        _ => NovitaError::new(i64::from(status.as_u16()), raw_message(status, text)),
    }
}

fn v3_http_error(status: StatusCode, text: &str) -> NovitaError {
    let code = i64::from(status.as_u16());
    match serde_json::from_str::<V3ErrorBody>(text) {
        Ok(body) => v3_error(code, body, status, text),
        Err(_) => NovitaError::new(code, raw_message(status, text)),
    }
}

/// Builds a `/v3` error; a body without `message` keeps the raw text.
fn v3_error(code: i64, body: V3ErrorBody, status: StatusCode, text: &str) -> NovitaError {
    let message = if body.message.is_empty() {
        raw_message(status, text)
    } else {
        body.message
    };
    let mut err = NovitaError::new(code, message).with_reason(body.reason);
    if let Some(metadata) = body.metadata {
        err = err.with_metadata(metadata);
    }
    err
}

fn raw_message(status: StatusCode, text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        status.to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwrap_v2_rejects_non_success_codes() {
        let err = unwrap_v2::<Value>(json!({ "code": 30001, "msg": "invalid model" })).unwrap_err();
        assert_eq!(err.code, 30001);
        assert_eq!(err.message, "invalid model");
    }

    #[test]
    fn unwrap_v2_extracts_data() {
        let data: Value = unwrap_v2(json!({ "code": 0, "msg": "", "data": { "task_id": "t1" } })).unwrap();
        assert_eq!(data, json!({ "task_id": "t1" }));
    }

    #[test]
    fn legacy_http_error_prefers_body_envelope() {
        let err = legacy_http_error(StatusCode::BAD_REQUEST, r#"{"code":2,"msg":"bad"}"#);
        assert_eq!((err.code, err.message.as_str()), (2, "bad"));

        let err = legacy_http_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!((err.code, err.message.as_str()), (502, "upstream down"));
    }

    #[test]
    fn v3_http_error_keeps_reason_and_metadata() {
        let err = v3_http_error(
            StatusCode::FORBIDDEN,
            r#"{"message":"no credits","reason":"NOT_ENOUGH_BALANCE","metadata":{"need":3}}"#,
        );
        assert_eq!(err.code, 403);
        assert_eq!(err.reason, "NOT_ENOUGH_BALANCE");
        assert_eq!(err.metadata.unwrap()["need"], json!(3));
    }

    #[test]
    fn v3_http_error_without_message_keeps_body_text() {
        let err = v3_http_error(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"boom"}"#);
        assert_eq!(err.code, 500);
        assert_eq!(err.message, r#"{"error":"boom"}"#);

        let err = v3_http_error(StatusCode::BAD_GATEWAY, "{}");
        assert_eq!(err.message, "{}");

        let err = v3_http_error(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.message, "502 Bad Gateway");
    }
}
