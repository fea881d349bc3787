//! Slack events HTTP endpoint
//!
//! Mounts [`SlackEventApp`] on an ntex server. The app itself is shared through
//! the server state, the path comes from its configuration.

use crate::app::{InboundRequest, Outcome, SlackEventApp};
use ntex::{util::Bytes, web};

/// Configures the Slack events route.
///
/// Every method is routed to [`receive`], non-POST requests get the 404 answer.
///
/// # Routes
/// - `POST {path}` - Slack Events API receiver
pub fn slack_events(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).to(receive));
}

/// Webhook receiver endpoint
///
/// The response is built first. Handler invocations are spawned on the worker
/// runtime afterwards and are never awaited here.
pub async fn receive(
    req: web::HttpRequest,
    body: Bytes,
    app: web::types::State<SlackEventApp>,
) -> web::HttpResponse {
    let _span = logfire::span!("slack_events_request").entered();

    let Outcome { response, tasks } = app.handle(&InboundRequest::from_http(&req, body));
    let response = web::HttpResponse::from(response);

    tasks.spawn();

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        freshness::MockClock,
        registry::{EventData, Handler},
    };
    use ntex::{
        http::{StatusCode, header},
        web::test,
    };
    use serde_json::{Value, json};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";
    const PATH: &str = "/slack/events";
    // 2013-08-14T00:00:00Z
    const NOW: i64 = 1_376_438_400;

    fn frozen_app() -> SlackEventApp {
        let mut clock = MockClock::new();
        clock.expect_now().return_const(NOW);
        SlackEventApp::new(SECRET).with_clock(clock)
    }

    fn signed_post(app: &SlackEventApp, body: &str) -> test::TestRequest {
        let timestamp = NOW.to_string();
        let signature = app.verifier().sign(&timestamp, body);

        test::TestRequest::post()
            .uri(PATH)
            .header("X-Slack-Request-Timestamp", timestamp.as_str())
            .header("X-Slack-Signature", signature.as_str())
            .set_payload(body.to_string())
    }

    fn body_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[ntex::test]
    async fn test_get() {
        let events = frozen_app();
        let app = test::init_service(
            web::App::new()
                .state(events.clone())
                .configure(|cfg| slack_events(cfg, PATH)),
        )
        .await;

        let req = test::TestRequest::get().uri(PATH).to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_text(&test::read_body(resp).await),
            "These are not the slackbots you're looking for."
        );
    }

    #[ntex::test]
    async fn test_no_timestamp() {
        let events = frozen_app();
        let app = test::init_service(
            web::App::new()
                .state(events.clone())
                .configure(|cfg| slack_events(cfg, PATH)),
        )
        .await;

        let req = test::TestRequest::post().uri(PATH).to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_text(&test::read_body(resp).await),
            "Request doesn't contain timestamp header"
        );
    }

    #[ntex::test]
    async fn test_invalid_before_timestamp() {
        let events = frozen_app();
        let app = test::init_service(
            web::App::new()
                .state(events.clone())
                .configure(|cfg| slack_events(cfg, PATH)),
        )
        .await;

        let stale = (NOW - 60 * 5 - 1).to_string();
        let req = test::TestRequest::post()
            .uri(PATH)
            .header("X-Slack-Request-Timestamp", stale.as_str())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_text(&test::read_body(resp).await),
            "Invalid timestamp in request header"
        );
    }

    #[ntex::test]
    async fn test_invalid_signature() {
        let events = frozen_app();
        let app = test::init_service(
            web::App::new()
                .state(events.clone())
                .configure(|cfg| slack_events(cfg, PATH)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(PATH)
            .header("X-Slack-Request-Timestamp", NOW.to_string().as_str())
            .header("X-Slack-Signature", "")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_text(&test::read_body(resp).await),
            "Invalid request signature"
        );
    }

    #[ntex::test]
    async fn test_challenge() {
        let events = frozen_app();
        let app = test::init_service(
            web::App::new()
                .state(events.clone())
                .configure(|cfg| slack_events(cfg, PATH)),
        )
        .await;

        let body = json!({
            "token": "Jhj5dZrVaK7ZwHHjRyZWjbDl",
            "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P",
            "type": "url_verification"
        })
        .to_string();
        let resp = test::call_service(&app, signed_post(&events, &body).to_request()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap(),
            "application/json"
        );
        assert_eq!(
            body_text(&test::read_body(resp).await),
            "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"
        );
    }

    #[ntex::test]
    async fn test_event_runs_handler_after_response() {
        let events = frozen_app();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Value>();
        events.on(
            "reaction_added",
            Handler::from_fn(move |data: &EventData| {
                if let Some(envelope) = data.envelope() {
                    tx.send(envelope.clone())?;
                }
                Ok(())
            }),
        );
        let app = test::init_service(
            web::App::new()
                .state(events.clone())
                .configure(|cfg| slack_events(cfg, PATH)),
        )
        .await;

        let body = r#"{"event":{"type":"reaction_added","reaction":"tada"}}"#;
        let resp = test::call_service(&app, signed_post(&events, body).to_request()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("X-Slack-Powered-By").unwrap().to_str().unwrap(),
            events.package_info()
        );
        assert_eq!(body_text(&test::read_body(resp).await), "");

        let received = rx.recv().await.unwrap();
        assert_eq!(
            received,
            json!({"event": {"type": "reaction_added", "reaction": "tada"}})
        );
    }

    #[ntex::test]
    async fn test_async_handler_runs() {
        let events = frozen_app();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        events.once(
            "message",
            Handler::from_async(move |data| {
                let tx = tx.clone();
                async move {
                    let text = data
                        .envelope()
                        .and_then(|e| e["event"]["text"].as_str())
                        .unwrap_or_default()
                        .to_string();
                    tx.send(text)?;
                    Ok(())
                }
            }),
        );
        let app = test::init_service(
            web::App::new()
                .state(events.clone())
                .configure(|cfg| slack_events(cfg, PATH)),
        )
        .await;

        let body = r#"{"event":{"type":"message","text":"hi there"}}"#;
        let resp = test::call_service(&app, signed_post(&events, body).to_request()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(rx.recv().await.unwrap(), "hi there");
        assert!(events.handlers("message").is_empty());
    }

    #[ntex::test]
    async fn test_no_event_type() {
        let events = frozen_app();
        let app = test::init_service(
            web::App::new()
                .state(events.clone())
                .configure(|cfg| slack_events(cfg, PATH)),
        )
        .await;

        let resp =
            test::call_service(&app, signed_post(&events, r#"{"event":{}}"#).to_request()).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_text(&test::read_body(resp).await),
            "No event in request body"
        );
    }

    #[ntex::test]
    async fn test_custom_path() {
        let events = frozen_app().with_event_path("/events");
        let path = events.event_path().to_string();
        let app = test::init_service(
            web::App::new()
                .state(events.clone())
                .configure(|cfg| slack_events(cfg, &path)),
        )
        .await;

        let req = test::TestRequest::get().uri("/events").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_text(&test::read_body(resp).await),
            "These are not the slackbots you're looking for."
        );
    }
}
