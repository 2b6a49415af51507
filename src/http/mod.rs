//! HTTP/1.1 client, server, router and message model.

pub mod app;
pub mod client;
pub mod factory;
pub mod headers;
pub mod message;
pub mod method;
pub mod router;
pub mod server;
pub mod status;

pub use self::app::{
    HttpClientApp, HttpClientAppConfig, HttpServerApp, HttpServerAppConfig,
};
pub use self::client::{HttpClient, HttpClientConfig, ResponseCallback};
pub use self::factory::HttpFactory;
pub use self::headers::Headers;
pub use self::message::{HttpRequest, HttpResponse};
pub use self::method::Method;
pub use self::router::{RouteHandler, Router};
pub use self::server::{HttpServer, HttpServerConfig, HttpServerHandler};
pub use self::status::StatusCode;
