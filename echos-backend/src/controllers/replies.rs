//! Operator-triggered replies.
//!
//! Deliveries are keyed by `(channel, message_id)`; a redelivery within the
//! cache's time-to-live is acknowledged without posting again.

use actix_web::{web, HttpResponse, Responder};
use moka::sync::Cache;
use serde::Deserialize;
use std::time::Duration;

use crate::models::TweetId;
use crate::twitter::helpers::{get_tweet_url, parse_tweet_reference};
use crate::twitter::reply_to_tweet;
use crate::AppState;

const DEDUP_CAPACITY: u64 = 10_000;
const DEDUP_TTL: Duration = Duration::from_secs(60 * 60);

pub type DeliveryCache = Cache<(String, String), ()>;

pub fn delivery_cache() -> DeliveryCache {
    Cache::builder()
        .max_capacity(DEDUP_CAPACITY)
        .time_to_live(DEDUP_TTL)
        .build()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TweetIdValue {
    Number(TweetId),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub channel: String,
    pub message_id: String,
    #[serde(default)]
    tweet_url: Option<String>,
    #[serde(default)]
    tweet_id: Option<TweetIdValue>,
}

impl ReplyRequest {
    fn tweet_id(&self) -> Option<TweetId> {
        if let Some(url) = &self.tweet_url {
            return parse_tweet_reference(url);
        }
        match &self.tweet_id {
            Some(TweetIdValue::Number(id)) => Some(*id),
            Some(TweetIdValue::Text(text)) => parse_tweet_reference(text),
            None => None,
        }
    }
}

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/replies").route(web::post().to(create_reply)));
}

async fn create_reply(state: web::Data<AppState>, body: web::Json<ReplyRequest>) -> impl Responder {
    let Some(tweet_id) = body.tweet_id() else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": "A valid tweet_url or tweet_id is required"
        }));
    };

    let key = (body.channel.clone(), body.message_id.clone());
    let entry = state.reply_deliveries.entry(key.clone()).or_insert(());
    if !entry.is_fresh() {
        log::info!(
            "Ignoring duplicate reply request {}:{} for tweet {}",
            body.channel,
            body.message_id,
            tweet_id
        );
        return HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "status": "duplicate",
            "tweet_id": tweet_id.to_string()
        }));
    }

    match reply_to_tweet(&state.agent, tweet_id).await {
        Ok(Some(response_id)) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "status": "posted",
            "tweet_id": tweet_id.to_string(),
            "response_tweet_id": response_id.to_string(),
            "url": get_tweet_url(state.agent.handle(), response_id)
        })),
        Ok(None) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "status": "skipped",
            "tweet_id": tweet_id.to_string()
        })),
        Err(e) => {
            log::error!("Forced reply to {} failed: {}", tweet_id, e);
            state.reply_deliveries.invalidate(&key);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": e
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::{build_evaluation, MockResponseGenerator};
    use crate::controllers::test_support::test_state;
    use crate::twitter::mock::{build_tweet, build_user, MockTwitterApi};
    use actix_web::{test, App};
    use std::sync::Arc;

    fn api_with_tweet() -> Arc<MockTwitterApi> {
        let api = Arc::new(MockTwitterApi::new());
        api.add_user(build_user(2, "luke"));
        api.add_tweet(build_tweet(100, 2, 100, None, "I am a Jedi, like my father before me"));
        api
    }

    #[actix_web::test]
    async fn test_duplicate_delivery_posts_once() {
        let api = api_with_tweet();
        let generator = MockResponseGenerator::new(vec![
            Ok(Some(build_evaluation("join me", 9, 0))),
            Ok(Some(build_evaluation("join me again", 9, 0))),
        ]);
        let state = test_state(api.clone(), generator);
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config_routes)).await;

        let payload = serde_json::json!({
            "channel": "discord",
            "message_id": "m-1",
            "tweet_url": "https://x.com/luke/status/100"
        });
        let first: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/replies").set_json(&payload).to_request(),
        )
        .await;
        let second: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/replies").set_json(&payload).to_request(),
        )
        .await;

        assert_eq!(first["status"], "posted");
        assert_eq!(first["response_tweet_id"], "9001");
        assert_eq!(first["url"], "https://x.com/vader/status/9001");
        assert_eq!(second["status"], "duplicate");
        assert_eq!(api.posted().len(), 1);
    }

    #[actix_web::test]
    async fn test_numeric_tweet_id_and_skipped_reply() {
        let api = api_with_tweet();
        let generator = MockResponseGenerator::new(vec![Ok(Some(build_evaluation("meh", 1, 0)))]);
        let state = test_state(api.clone(), generator);
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/replies")
            .set_json(serde_json::json!({"channel": "slack", "message_id": "m-2", "tweet_id": 100}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "skipped");
        assert!(api.posted().is_empty());
    }

    #[actix_web::test]
    async fn test_missing_reference_is_rejected() {
        let state = test_state(api_with_tweet(), MockResponseGenerator::default());
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/replies")
            .set_json(serde_json::json!({"channel": "slack", "message_id": "m-3", "tweet_url": "not a tweet"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_failed_reply_can_be_retried() {
        let api = Arc::new(MockTwitterApi::new());
        let state = test_state(api, MockResponseGenerator::default());
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config_routes)).await;
        let payload = serde_json::json!({"channel": "slack", "message_id": "m-4", "tweet_id": "555"});

        for _ in 0..2 {
            let req = test::TestRequest::post().uri("/api/replies").set_json(&payload).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
