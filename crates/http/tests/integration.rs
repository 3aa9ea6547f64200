//! Integration test: bind a real listener, serve the rating API and talk
//! HTTP/1.1 to it through hyper's client connection API.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use ratings_http::serve;
use ratings_service::{RatingService, ServiceConfig};
use ratings_storage::{FsyncPolicy, StorageEngine};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

async fn spawn_server(engine: StorageEngine, config: ServiceConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let service = Arc::new(RatingService::new(Arc::new(RwLock::new(engine)), config));
    tokio::spawn(async move {
        serve(listener, service).await.unwrap();
    });
    addr
}

async fn spawn_memory_server() -> SocketAddr {
    spawn_server(StorageEngine::in_memory(), ServiceConfig::default()).await
}

struct Reply {
    status: StatusCode,
    headers: hyper::HeaderMap,
    body: Value,
}

async fn send(addr: SocketAddr, req: Request<Full<Bytes>>) -> Reply {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = http1::handshake(TokioIo::new(stream)).await.unwrap();
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let response = sender.send_request(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    Reply {
        status,
        headers,
        body: serde_json::from_slice(&bytes).unwrap(),
    }
}

fn put(entity: &str, body: Value) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::PUT)
        .uri(format!("/rating/{}", entity))
        .header("host", "localhost")
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn bodiless(method: Method, uri: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "localhost")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

#[tokio::test]
async fn simple_write_and_read() {
    let addr = spawn_memory_server().await;

    let reply = send(addr, put("e1", json!({"rating": 5, "clocks": {"c0": 1}}))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"rating": 5.0}));

    let reply = send(addr, bodiless(Method::GET, "/rating/e1")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[CONTENT_TYPE], "application/json");
    assert_eq!(
        reply.body,
        json!({"rating": 5.0, "choices": [5.0], "clocks": [{"c0": 1}]})
    );
}

#[tokio::test]
async fn stale_write_keeps_newer_version() {
    let addr = spawn_memory_server().await;

    send(addr, put("e1", json!({"rating": 5, "clocks": {"c0": 5}}))).await;
    let reply = send(addr, put("e1", json!({"rating": 1, "clocks": {"c0": 1}}))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"rating": 5.0}));

    let reply = send(addr, bodiless(Method::GET, "/rating/e1")).await;
    assert_eq!(reply.body["choices"], json!([5.0]));
}

#[tokio::test]
async fn incomparable_then_coalescing_writes() {
    let addr = spawn_memory_server().await;

    send(addr, put("e1", json!({"rating": 5, "clocks": {"c0": 5}}))).await;
    let reply = send(addr, put("e1", json!({"rating": 2, "clocks": {"c1": 3}}))).await;
    assert_eq!(reply.body, json!({"rating": 3.5}));

    let reply = send(addr, bodiless(Method::GET, "/rating/e1")).await;
    assert_eq!(
        reply.body,
        json!({
            "rating": 3.5,
            "choices": [5.0, 2.0],
            "clocks": [{"c0": 5}, {"c1": 3}],
        })
    );

    let reply = send(
        addr,
        put("e1", json!({"rating": 3, "clocks": {"c0": 7, "c1": 10}})),
    )
    .await;
    assert_eq!(reply.body, json!({"rating": 3.0}));

    let reply = send(addr, bodiless(Method::GET, "/rating/e1")).await;
    assert_eq!(
        reply.body,
        json!({"rating": 3.0, "choices": [3.0], "clocks": [{"c0": 7, "c1": 10}]})
    );
}

#[tokio::test]
async fn delete_then_read_absent() {
    let addr = spawn_memory_server().await;

    send(addr, put("e1", json!({"rating": 4, "clocks": {"c0": 1}}))).await;
    let reply = send(addr, bodiless(Method::DELETE, "/rating/e1")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"rating": null}));

    let reply = send(addr, bodiless(Method::GET, "/rating/e1")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"rating": null, "choices": [], "clocks": []}));

    let reply = send(addr, bodiless(Method::DELETE, "/rating/e1")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body["error"].is_string());
}

#[tokio::test]
async fn rejected_requests() {
    let addr = spawn_memory_server().await;

    let req = Request::builder()
        .method(Method::PUT)
        .uri("/rating/e1")
        .header("host", "localhost")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Full::new(Bytes::from("rating=5")))
        .unwrap();
    assert_eq!(
        send(addr, req).await.status,
        StatusCode::UNSUPPORTED_MEDIA_TYPE
    );

    let req = Request::builder()
        .method(Method::GET)
        .uri("/rating/e1")
        .header("host", "localhost")
        .header(ACCEPT, "text/plain")
        .body(Full::new(Bytes::new()))
        .unwrap();
    assert_eq!(send(addr, req).await.status, StatusCode::NOT_ACCEPTABLE);

    let reply = send(addr, put("e1", json!({"rating": "high", "clocks": {"c0": 1}}))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(addr, put("e1", json!({"rating": 1, "clocks": {"c0": -1}}))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    assert_eq!(
        send(addr, bodiless(Method::GET, "/other")).await.status,
        StatusCode::NOT_FOUND
    );
    let reply = send(addr, bodiless(Method::POST, "/rating/e1")).await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(!reply.headers.contains_key(RETRY_AFTER));

    // nothing above stored anything
    let reply = send(addr, bodiless(Method::GET, "/rating/e1")).await;
    assert_eq!(reply.body["rating"], Value::Null);
}

#[tokio::test]
async fn concurrent_clients_all_land() {
    let addr = spawn_memory_server().await;

    let mut handles = Vec::new();
    for i in 0..16 {
        handles.push(tokio::spawn(async move {
            let mut clocks = serde_json::Map::new();
            clocks.insert(format!("client{}", i), json!(1));
            send(addr, put("hot", json!({"rating": 2, "clocks": clocks}))).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().status, StatusCode::OK);
    }

    let reply = send(addr, bodiless(Method::GET, "/rating/hot")).await;
    assert_eq!(reply.body["choices"].as_array().unwrap().len(), 16);
    assert_eq!(reply.body["rating"], json!(2.0));
}

#[tokio::test]
async fn durable_server_keeps_ratings_across_restart() {
    let dir = tempfile::TempDir::new().unwrap();

    let addr = spawn_server(
        StorageEngine::open(dir.path(), FsyncPolicy::Always).unwrap(),
        ServiceConfig::default(),
    )
    .await;
    send(addr, put("e1", json!({"rating": 5, "clocks": {"c0": 5}}))).await;
    send(addr, put("e1", json!({"rating": 2, "clocks": {"c1": 3}}))).await;

    // a second engine over the same directory replays the log
    let addr = spawn_server(
        StorageEngine::open(dir.path(), FsyncPolicy::Always).unwrap(),
        ServiceConfig::default(),
    )
    .await;
    let reply = send(addr, bodiless(Method::GET, "/rating/e1")).await;
    assert_eq!(reply.body["rating"], json!(3.5));
    assert_eq!(reply.body["choices"], json!([5.0, 2.0]));
}
