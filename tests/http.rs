mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use hawser::http::{
    HttpClientConfig, HttpFactory, HttpRequest, HttpServerApp, HttpServerAppConfig, Method,
    StatusCode,
};
use hawser::net::{Endpoint, HostEndpoint};

use support::fetch;

fn app_config(name: &str) -> HttpServerAppConfig {
    HttpServerAppConfig {
        server_name: name.to_string(),
        ..HttpServerAppConfig::default()
    }
}

/// Starts the app on an ephemeral port and returns a client destination.
fn serve(app: &HttpServerApp) -> HostEndpoint {
    app.serve(Endpoint::localhost(0)).unwrap();
    let local = app.local_endpoint().unwrap();
    assert_ne!(local.port(), 0);
    HostEndpoint::new("127.0.0.1", local.port())
}

#[tokio::test]
async fn get_round_trip_with_server_header() {
    let app = HttpServerApp::new(app_config("unit-server"));
    app.get("/test", |_req, res| {
        res.ok("Hello, World!");
    })
    .unwrap();
    let destination = serve(&app);

    let client = HttpFactory::new().create_http_client(destination, HttpClientConfig::default());
    let mut request = HttpRequest::new(Method::Get, "/test");
    request.set_header("Host", "x");

    let response = fetch(&client, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(response.body(), b"Hello, World!");
    assert_eq!(response.header("server"), Some("unit-server"));
}

#[tokio::test]
async fn post_body_reaches_the_handler() {
    let observed = Arc::new(Mutex::new(Vec::new()));
    let app = HttpServerApp::new(app_config("unit-server"));
    let seen = observed.clone();
    app.post("/api/data", move |req, res| {
        seen.lock().unwrap().extend_from_slice(req.body());
        res.created("Data created");
    })
    .unwrap();
    let destination = serve(&app);

    let client = HttpFactory::new().create_http_client(destination, HttpClientConfig::default());
    let mut request = HttpRequest::new(Method::Post, "/api/data");
    request.set_body(&b"{\"key\":\"value\"}"[..]);

    let response = fetch(&client, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::Created);
    assert_eq!(response.body(), b"Data created");
    assert_eq!(observed.lock().unwrap().as_slice(), b"{\"key\":\"value\"}");
}

#[tokio::test]
async fn put_and_delete_round_trips() {
    let app = HttpServerApp::new(app_config("unit-server"));
    app.put("/resource/123", |_req, res| {
        res.ok("Resource updated");
    })
    .unwrap();
    app.del("/resource/456", |_req, res| {
        res.ok("Resource deleted");
    })
    .unwrap();
    let destination = serve(&app);

    let client = HttpFactory::new().create_http_client(destination, HttpClientConfig::default());

    let mut request = HttpRequest::new(Method::Put, "/resource/123");
    request.set_body(&b"updated data"[..]);
    let response = fetch(&client, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(response.body(), b"Resource updated");

    let response = fetch(&client, HttpRequest::new(Method::Delete, "/resource/456"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(response.body(), b"Resource deleted");
}

#[tokio::test]
async fn responses_arrive_in_submission_order() {
    let app = HttpServerApp::new(app_config("unit-server"));
    for path in ["/first", "/second", "/third"] {
        app.get(path, move |req, res| {
            res.ok(req.target());
        })
        .unwrap();
    }
    let destination = serve(&app);

    let client = HttpFactory::new().create_http_client(destination, HttpClientConfig::default());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    for path in ["/first", "/second", "/third"] {
        let tx = tx.clone();
        client.request(HttpRequest::new(Method::Get, path), move |result| {
            let _ = tx.send(result.unwrap().body().to_vec());
        });
    }

    for expected in ["/first", "/second", "/third"] {
        let body = support::next_event(&mut rx).await;
        assert_eq!(body, expected.as_bytes());
    }
}

#[tokio::test]
async fn unmatched_route_is_404_and_bad_target_is_400() {
    let app = HttpServerApp::new(app_config("unit-server"));
    app.get("/known", |_req, res| {
        res.ok("here");
    })
    .unwrap();
    let destination = serve(&app);

    let client = HttpFactory::new().create_http_client(destination, HttpClientConfig::default());

    let response = fetch(&client, HttpRequest::new(Method::Get, "/nonexistent"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NotFound);
    assert_eq!(response.body(), b"404 Not Found");

    // A request-target that is not origin-form.
    let response = fetch(&client, HttpRequest::new(Method::Get, "no-slash"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BadRequest);
    assert_eq!(response.body(), b"400 Bad Request");
}

#[tokio::test]
async fn pipelined_keep_alive_session_answers_in_order() {
    let app = HttpServerApp::new(app_config("unit-server"));
    for path in ["/first", "/second"] {
        app.get(path, move |req, res| {
            res.ok(req.target());
        })
        .unwrap();
    }
    let destination = serve(&app);

    let mut stream = TcpStream::connect(("127.0.0.1", destination.port()))
        .await
        .unwrap();
    stream
        .write_all(b"GET /first HTTP/1.1\r\nHost: x\r\n\r\nGET /second HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();

    let mut wire = Vec::new();
    let mut buf = [0u8; 4096];
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    // The second body arrives last; seeing it means both responses are in.
    while !String::from_utf8_lossy(&wire).contains("/second") {
        let n = tokio::time::timeout_at(deadline, stream.read(&mut buf))
            .await
            .expect("timed out reading responses")
            .unwrap();
        assert_ne!(n, 0, "server closed early");
        wire.extend_from_slice(&buf[..n]);
    }

    let text = String::from_utf8_lossy(&wire);
    let first = text.find("/first").expect("first body missing");
    let second = text.find("/second").expect("second body missing");
    assert!(first < second);
    assert_eq!(text.matches("200 OK").count(), 2);
}

#[tokio::test]
async fn session_close_leaves_server_accepting() {
    let app = HttpServerApp::new(app_config("unit-server"));
    app.get("/ping", |_req, res| {
        res.ok("pong");
    })
    .unwrap();
    let destination = serve(&app);

    // First peer connects, round-trips, then hangs up.
    {
        let mut stream = TcpStream::connect(("127.0.0.1", destination.port()))
            .await
            .unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).contains("pong"));
    }

    // The server keeps serving fresh connections.
    let client = HttpFactory::new().create_http_client(destination, HttpClientConfig::default());
    let response = fetch(&client, HttpRequest::new(Method::Get, "/ping"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(response.body(), b"pong");
}

#[tokio::test]
async fn stopped_server_refuses_new_connections() {
    let app = HttpServerApp::new(app_config("unit-server"));
    app.get("/ping", |_req, res| {
        res.ok("pong");
    })
    .unwrap();
    let destination = serve(&app);
    app.stop().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(TcpStream::connect(("127.0.0.1", destination.port()))
        .await
        .is_err());
}
