use async_trait::async_trait;
use landslide_monitor::{
    modules::{
        api::{api_routes, ApiState},
        device::{DeviceStore, StoreOptions},
        mqtt::{CommandPublisher, CommandTransport},
    },
    shared::errors::TransportError,
};
use serde_json::Value;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use warp::http::StatusCode;

#[derive(Default)]
struct RecordingTransport {
    connected: AtomicBool,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl CommandTransport for RecordingTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }
}

fn state(transport: Arc<RecordingTransport>) -> ApiState {
    ApiState {
        store: DeviceStore::new(StoreOptions::default()),
        commands: CommandPublisher::new(transport, "landslide", "ESP32_LANDSLIDE_01"),
    }
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn device_view_before_first_reading() {
    let routes = api_routes(state(Arc::default()));

    let res = warp::test::request()
        .method("GET")
        .path("/api/device")
        .reply(&routes)
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body = json(res.body());
    assert_eq!(body["device"]["loading"], true);
    assert_eq!(body["device"]["live"], false);
    assert_eq!(body["device"]["status"], "normal");
    assert_eq!(body["severity"], "success");
    assert_eq!(body["status_label"], "NORMAL");
    assert_eq!(body["active_alerts"], Value::Array(vec![]));
}

#[tokio::test]
async fn device_view_reflects_applied_readings() {
    let state = state(Arc::default());
    state
        .store
        .apply_reading(br#"{"pitch":32,"roll":50,"rain1h":3}"#)
        .await
        .unwrap();
    let routes = api_routes(state.clone());

    let res = warp::test::request()
        .method("GET")
        .path("/api/device")
        .reply(&routes)
        .await;
    let body = json(res.body());
    assert_eq!(body["device"]["status"], "critical");
    assert_eq!(body["severity"], "danger");
    assert_eq!(body["device"]["live"], true);
    assert_eq!(body["active_alerts"][0]["type"], "Pitch Angle");
    assert_eq!(body["active_alerts"][1]["type"], "Roll Angle");

    let res = warp::test::request()
        .method("GET")
        .path("/api/device/history")
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let history = json(res.body());
    assert_eq!(history.as_array().map(Vec::len), Some(1));
    assert_eq!(history[0]["pitch"], 32.0);

    let res = warp::test::request()
        .method("GET")
        .path("/api/device/alerts")
        .reply(&routes)
        .await;
    assert_eq!(json(res.body()).as_array().map(Vec::len), Some(2));

    state.store.shutdown().await;
}

#[tokio::test]
async fn command_rejected_while_offline() {
    let transport = Arc::new(RecordingTransport::default());
    let routes = api_routes(state(transport.clone()));

    let res = warp::test::request()
        .method("POST")
        .path("/api/device/commands/cmd")
        .json(&serde_json::json!({"action": "reboot"}))
        .reply(&routes)
        .await;

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json(res.body())["code"], 503);
    assert!(transport.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn command_published_while_online() {
    let transport = Arc::new(RecordingTransport::default());
    transport.connected.store(true, Ordering::SeqCst);
    let routes = api_routes(state(transport.clone()));

    let res = warp::test::request()
        .method("POST")
        .path("/api/device/commands/cmd")
        .json(&serde_json::json!({"action": "reboot"}))
        .reply(&routes)
        .await;

    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert_eq!(
        json(res.body())["topic"],
        "landslide/ESP32_LANDSLIDE_01/cmd"
    );

    for _ in 0..50 {
        if !transport.published.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let published = transport.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "landslide/ESP32_LANDSLIDE_01/cmd");
    assert_eq!(json(&published[0].1)["action"], "reboot");
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let routes = api_routes(state(Arc::default()));

    let res = warp::test::request()
        .method("GET")
        .path("/api/nothing")
        .reply(&routes)
        .await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(res.body())["code"], 404);
}

#[tokio::test]
async fn openapi_document_lists_paths() {
    let routes = api_routes(state(Arc::default()));

    let res = warp::test::request()
        .method("GET")
        .path("/api/api-doc.json")
        .reply(&routes)
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    let doc = json(res.body());
    assert!(doc["paths"].get("/api/device").is_some());
    assert!(doc["paths"].get("/api/device/commands/{suffix}").is_some());

    let res = warp::test::request()
        .method("GET")
        .path("/api/api-doc.json/extra")
        .reply(&routes)
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
