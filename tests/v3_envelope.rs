mod common;

use common::{anonymous_client_for, client_for, unreachable_url, TEST_API_KEY};
use novita::error::reasons;
use novita::{
    CleanupRequest, LcmTxt2ImgRequest, NovitaClient, RemoveBackgroundRequest, RequestOpts,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn cleanup_request() -> CleanupRequest {
    CleanupRequest {
        image_file: "aW1hZ2U=".to_string(),
        mask_file: "bWFzaw==".to_string(),
    }
}

#[tokio::test]
async fn test_cleanup_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/cleanup"))
        .and(header("authorization", TEST_API_KEY))
        .and(body_json(json!({ "image_file": "aW1hZ2U=", "mask_file": "bWFzaw==" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image_file": "cmVzdWx0",
            "image_type": "png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let image = client.cleanup(&cleanup_request(), &RequestOpts::default()).await.unwrap();

    assert_eq!(image.image_file, "cmVzdWx0");
    assert_eq!(image.image_type, "png");
}

#[tokio::test]
async fn test_non_200_status_carries_reason_and_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/cleanup"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 400,
            "message": "image too large",
            "reason": "INVALID_REQUEST_BODY",
            "metadata": { "max_pixels": 4194304 }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.cleanup(&cleanup_request(), &RequestOpts::default()).await.unwrap_err();

    assert_eq!(err.code, 400);
    assert_eq!(err.message, "image too large");
    assert_eq!(err.reason, "INVALID_REQUEST_BODY");
    assert_eq!(err.metadata.unwrap()["max_pixels"], json!(4194304));
}

#[tokio::test]
async fn test_any_status_other_than_200_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/remove-background"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "image_file": "cmVzdWx0",
            "image_type": "png"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = RemoveBackgroundRequest {
        image_file: "aW1hZ2U=".to_string(),
    };
    let err = client
        .remove_background(&request, &RequestOpts::default())
        .await
        .unwrap_err();

    assert_eq!(err.code, 202);
}

#[tokio::test]
async fn test_error_code_in_200_body_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/cleanup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 429,
            "message": "too many requests",
            "reason": "RATE_LIMIT_EXCEEDED",
            "metadata": { "retry_after": 3 }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.cleanup(&cleanup_request(), &RequestOpts::default()).await.unwrap_err();

    assert_eq!(err.code, 429);
    assert_eq!(err.reason, "RATE_LIMIT_EXCEEDED");
    assert_eq!(err.metadata.unwrap()["retry_after"], json!(3));
}

#[tokio::test]
async fn test_non_json_error_body_keeps_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/cleanup"))
        .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.cleanup(&cleanup_request(), &RequestOpts::default()).await.unwrap_err();

    assert_eq!(err.code, 503);
    assert_eq!(err.message, "service unavailable");
    assert!(err.reason.is_empty());
}

#[tokio::test]
async fn test_json_error_body_without_message_keeps_body_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/cleanup"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "boom" })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.cleanup(&cleanup_request(), &RequestOpts::default()).await.unwrap_err();

    assert_eq!(err.code, 500);
    assert!(err.message.contains("boom"), "message: {}", err.message);
}

#[tokio::test]
async fn test_error_code_in_200_body_without_message_keeps_body_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/cleanup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 500, "error": "boom" })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.cleanup(&cleanup_request(), &RequestOpts::default()).await.unwrap_err();

    assert_eq!(err.code, 500);
    assert!(err.message.contains("boom"), "message: {}", err.message);
}

#[tokio::test]
async fn test_anonymous_v3_call_is_marked_anon() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/lcm-txt2img"))
        .and(header("x-novita-auth-type", "anon"))
        .and(|req: &Request| !req.headers.contains_key("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [
                { "image_file": "Zmlyc3Q=", "image_type": "png" },
                { "image_file": "c2Vjb25k", "image_type": "png" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = anonymous_client_for(&server);
    let request = LcmTxt2ImgRequest {
        prompt: "a cat".to_string(),
        width: 512,
        height: 512,
        image_num: Some(2),
        ..Default::default()
    };
    let response = client.lcm_txt2img(&request, &RequestOpts::default()).await.unwrap();

    assert_eq!(response.images.len(), 2);
    assert_eq!(response.images[1].image_file, "c2Vjb25k");
}

#[tokio::test]
async fn test_authenticated_v3_call_is_not_marked_anon() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/cleanup"))
        .and(|req: &Request| !req.headers.contains_key("x-novita-auth-type"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image_file": "cmVzdWx0",
            "image_type": "png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.cleanup(&cleanup_request(), &RequestOpts::default()).await.unwrap();
}

#[tokio::test]
async fn test_v3_connection_failure_is_code_minus_one() {
    let client = NovitaClient::new_with_url(None, &unreachable_url()).unwrap();

    let err = client.cleanup(&cleanup_request(), &RequestOpts::default()).await.unwrap_err();

    assert_eq!(err.code, -1);
    assert_eq!(err.reason, reasons::NETWORK_ERROR);
}
