//! HTTP endpoint tests
//!
//! Drives the router in-process and decodes the issued tokens to check what
//! they grant.

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use token_service::builder::{AccessToken, Privilege, Service, ServiceType};
use token_service::{OriginPolicy, ServiceConfig, TokenService};
use tower::ServiceExt;

const APP_ID: &str = "970ca35de60c44645bbae8a215061b33";
const APP_CERT: &str = "5cfd2fd1755d40ecb72977518be15d3b";

fn app(origins: &str) -> Router {
    let config = ServiceConfig::new(APP_ID, APP_CERT)
        .unwrap()
        .with_allowed_origins(OriginPolicy::parse(origins));
    TokenService::new(config).router()
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn token(&self, field: &str) -> AccessToken {
        let json = self.json();
        let token = json[field].as_str().unwrap_or_else(|| panic!("no {} in {}", field, json));
        let parsed = AccessToken::parse(token).unwrap();
        assert!(parsed.verify(APP_CERT));
        parsed
    }
}

async fn send(router: Router, request: Request<Body>) -> Reply {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    Reply {
        status,
        headers,
        body,
    }
}

async fn get(router: Router, uri: &str) -> Reply {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

async fn post_json(router: Router, body: &str) -> Reply {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/getToken")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

fn assert_error(reply: &Reply, status: StatusCode) {
    assert_eq!(reply.status, status);
    let json = reply.json();
    assert_eq!(json["status"], status.as_u16());
    assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn test_rtc_publisher_token() {
    let reply = get(app(""), "/rtc/demo/publisher/uid/1001/?expiry=600").await;
    assert_eq!(reply.status, StatusCode::OK);

    let token = reply.token("rtcToken");
    assert_eq!(token.app_id(), APP_ID);
    assert!(token.expire() <= 600);

    match token.service(ServiceType::Rtc) {
        Some(Service::Rtc {
            channel,
            uid,
            privileges,
        }) => {
            assert_eq!(channel, "demo");
            assert_eq!(uid, "1001");
            assert!(privileges.contains(Privilege::JoinChannel));
            assert!(privileges.contains(Privilege::PublishAudioStream));
            assert!(privileges.contains(Privilege::PublishDataStream));
        }
        other => panic!("expected RTC service, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rtc_without_trailing_slash_and_default_expiry() {
    let reply = get(app(""), "/rtc/demo/subscriber/userAccount/alice").await;
    assert_eq!(reply.status, StatusCode::OK);

    let token = reply.token("rtcToken");
    assert!(token.expire() > 3500 && token.expire() <= 3600);
    match token.service(ServiceType::Rtc) {
        Some(Service::Rtc { uid, privileges, .. }) => {
            assert_eq!(uid, "alice");
            assert!(privileges.contains(Privilege::JoinChannel));
            assert!(!privileges.contains(Privilege::PublishAudioStream));
        }
        other => panic!("expected RTC service, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rtc_wildcard_uid() {
    let reply = get(app(""), "/rtc/demo/publisher/uid/0/").await;
    assert_eq!(reply.status, StatusCode::OK);
    match reply.token("rtcToken").service(ServiceType::Rtc) {
        Some(Service::Rtc { uid, .. }) => assert_eq!(uid, ""),
        other => panic!("expected RTC service, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rtc_non_numeric_uid_rejected() {
    let reply = get(app(""), "/rtc/demo/publisher/uid/not-a-number/?expiry=600").await;
    assert_error(&reply, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rtc_bad_expiry_rejected() {
    let reply = get(app(""), "/rtc/demo/publisher/uid/1001/?expiry=abc").await;
    assert_error(&reply, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rtc_unknown_token_type_rejected() {
    let reply = get(app(""), "/rtc/demo/publisher/nonsense/1001/").await;
    assert_error(&reply, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rtm_wildcard_rejected() {
    let reply = get(app(""), "/rtm/0/?expiry=600").await;
    assert_error(&reply, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rtm_token() {
    let reply = get(app(""), "/rtm/alice/?expiry=600").await;
    assert_eq!(reply.status, StatusCode::OK);

    let token = reply.token("rtmToken");
    match token.service(ServiceType::Rtm) {
        Some(Service::Rtm {
            user_id,
            privileges,
        }) => {
            assert_eq!(user_id, "alice");
            assert!(privileges.contains(Privilege::Login));
        }
        other => panic!("expected RTM service, got {:?}", other),
    }
    assert!(token.service(ServiceType::Rtc).is_none());
}

#[tokio::test]
async fn test_rte_wildcard_without_rtm_subject_rejected() {
    let reply = get(app(""), "/rte/demo/publisher/uid/0/?expiry=600").await;
    assert_error(&reply, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rte_tokens() {
    let reply = get(app(""), "/rte/demo/publisher/uid/0/alice/?expiry=600").await;
    assert_eq!(reply.status, StatusCode::OK);

    let rtc = reply.token("rtcToken");
    let rtm = reply.token("rtmToken");
    assert_eq!(rtc.expires_at(), rtm.expires_at());

    match rtm.service(ServiceType::Rtm) {
        Some(Service::Rtm { user_id, .. }) => assert_eq!(user_id, "alice"),
        other => panic!("expected RTM service, got {:?}", other),
    }

    let reply = get(app(""), "/rte/demo/subscriber/uid/1001").await;
    assert_eq!(reply.status, StatusCode::OK);
    match reply.token("rtmToken").service(ServiceType::Rtm) {
        Some(Service::Rtm { user_id, .. }) => assert_eq!(user_id, "1001"),
        other => panic!("expected RTM service, got {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_tokens() {
    let reply = get(app(""), "/chat/app/?expiry=600").await;
    assert_eq!(reply.status, StatusCode::OK);
    match reply.token("chatToken").service(ServiceType::Chat) {
        Some(Service::Chat { privileges, .. }) => {
            assert!(privileges.contains(Privilege::ChatApp))
        }
        other => panic!("expected chat service, got {:?}", other),
    }

    for uri in ["/chat/account/bob/", "/chat/userAccount/bob"] {
        let reply = get(app(""), uri).await;
        assert_eq!(reply.status, StatusCode::OK, "{}", uri);
        match reply.token("chatToken").service(ServiceType::Chat) {
            Some(Service::Chat {
                user_id,
                privileges,
            }) => {
                assert_eq!(user_id, "bob");
                assert!(privileges.contains(Privilege::ChatUser));
            }
            other => panic!("expected chat service, got {:?}", other),
        }
    }

    let reply = get(app(""), "/chat/account/").await;
    assert_error(&reply, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_chat_without_uid_is_app_token() {
    let reply = post_json(app(""), r#"{"tokenType":"chat"}"#).await;
    assert_eq!(reply.status, StatusCode::OK);
    match reply.token("token").service(ServiceType::Chat) {
        Some(Service::Chat { privileges, .. }) => {
            assert!(privileges.contains(Privilege::ChatApp));
            assert!(!privileges.contains(Privilege::ChatUser));
        }
        other => panic!("expected chat service, got {:?}", other),
    }
}

#[tokio::test]
async fn test_post_rtc_without_channel_rejected() {
    let reply = post_json(app(""), r#"{"tokenType":"rtc","uid":"user123"}"#).await;
    assert_error(&reply, StatusCode::BAD_REQUEST);
    assert!(reply.json()["error"].as_str().unwrap().contains("channel"));
}

#[tokio::test]
async fn test_post_variants() {
    let reply = post_json(
        app(""),
        r#"{"tokenType":"rtc","channel":"demo","uid":1001,"role":"publisher","expire":"120"}"#,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.token("token").expire() <= 120);

    let reply = post_json(app(""), r#"{"tokenType":"rtm","uid":"alice","channel":"lobby"}"#).await;
    assert_eq!(reply.status, StatusCode::OK);
    let token = reply.token("token");
    assert!(token.service(ServiceType::Rtm).is_some());
    assert!(token.service(ServiceType::Rtc).is_some());

    let reply = post_json(app(""), r#"{"tokenType":"voice","uid":"alice"}"#).await;
    assert_error(&reply, StatusCode::BAD_REQUEST);

    let reply = post_json(app(""), "{not json").await;
    assert_error(&reply, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ping() {
    let reply = get(app(""), "/ping").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["message"], "pong");
}

#[tokio::test]
async fn test_no_cache_headers_on_every_response() {
    for uri in ["/ping", "/rtm/0/", "/rtm/alice/"] {
        let reply = get(app(""), uri).await;
        assert_eq!(
            reply.headers[header::CACHE_CONTROL],
            "private, no-cache, no-store, must-revalidate"
        );
        assert_eq!(reply.headers[header::EXPIRES], "-1");
        assert_eq!(reply.headers[header::PRAGMA], "no-cache");
    }
}

#[tokio::test]
async fn test_disallowed_origin_rejected() {
    let request = Request::builder()
        .uri("/rtm/alice/")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let reply = send(app("https://app.example"), request).await;

    assert_error(&reply, StatusCode::FORBIDDEN);
    assert_eq!(reply.json()["error"], "Origin not allowed");
    assert_eq!(reply.headers[header::PRAGMA], "no-cache");
}

#[tokio::test]
async fn test_missing_origin_rejected_under_allow_list() {
    let reply = get(app("https://app.example"), "/rtm/alice/").await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_allowed_origin_gets_cors_headers() {
    let request = Request::builder()
        .uri("/rtm/alice/")
        .header(header::ORIGIN, "https://app.example")
        .body(Body::empty())
        .unwrap();
    let reply = send(app("https://other.example,https://app.example"), request).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example"
    );
    assert_eq!(
        reply.headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, OPTIONS"
    );
}

#[tokio::test]
async fn test_preflight() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/getToken")
        .header(header::ORIGIN, "https://app.example")
        .body(Body::empty())
        .unwrap();
    let reply = send(app("*"), request).await;

    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert!(reply.body.is_empty());
    assert_eq!(
        reply.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example"
    );
    assert_eq!(
        reply.headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Origin, Content-Type"
    );
}

#[tokio::test]
async fn test_ping_exempt_from_origin_policy() {
    let request = Request::builder()
        .uri("/ping/")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let reply = send(app("https://app.example"), request).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply
        .headers
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_rte_non_numeric_uid_rejected() {
    let reply = get(app(""), "/rte/demo/publisher/uid/not-a-number/alice/").await;
    assert_error(&reply, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversize_channel_rejected() {
    let body = format!(
        r#"{{"tokenType":"rtc","channel":"{}","uid":"1"}}"#,
        "a".repeat(70_000)
    );
    let reply = post_json(app(""), &body).await;
    assert_error(&reply, StatusCode::BAD_REQUEST);
    assert!(reply.json()["error"].as_str().unwrap().contains("too long"));
}
