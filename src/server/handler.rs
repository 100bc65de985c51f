// src/server/handler.rs
use hyper::header::{ALLOW, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use std::sync::Arc;
use tower::Service;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::health::CheckContext;
use crate::server::heartbeat::{HeartbeatError, HeartbeatService};

#[derive(Clone)]
pub struct HeartbeatHandler {
    service: Arc<HeartbeatService>,
    path: Arc<str>,
}

impl HeartbeatHandler {
    /// `path` is the full request path, e.g. `/heartbeat`.
    pub fn new(service: Arc<HeartbeatService>, path: impl Into<String>) -> Self {
        Self {
            service,
            path: Arc::from(path.into()),
        }
    }

    pub async fn handle(&self, req: Request<Body>) -> Result<Response<Body>, HeartbeatError> {
        if req.uri().path() != &*self.path {
            return Ok(Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Body::from("Not Found"))?);
        }
        if req.method() != Method::GET {
            return Ok(Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .header(ALLOW, "GET")
                .body(Body::empty())?);
        }

        let request_id = Uuid::new_v4();
        let span = info_span!("heartbeat", %request_id, service = %self.service.service_name());

        async {
            // Dropping this future (client went away) cancels the checks.
            let (ctx, handle) = CheckContext::new();
            let _guard = handle.cancel_on_drop();

            let heartbeat = self.service.check(&ctx).await;
            let body = serde_json::to_vec(&heartbeat)?;

            Ok::<_, HeartbeatError>(
                Response::builder()
                    .status(heartbeat.http_status())
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body))?,
            )
        }
        .instrument(span)
        .await
    }
}

impl Service<Request<Body>> for HeartbeatHandler {
    type Response = Response<Body>;
    type Error = Box<dyn std::error::Error + Send + Sync>;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move {
            handler.handle(req).await.map_err(|e| {
                tracing::error!(%e, "heartbeat error");
                Box::new(e) as Box<dyn std::error::Error + Send + Sync>
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{CheckDescriptor, CheckResult};
    use crate::server::heartbeat::HeartbeatResponse;
    use tower::ServiceExt;

    fn handler(descriptors: Vec<CheckDescriptor>) -> HeartbeatHandler {
        let service = HeartbeatService::new("unit-test", descriptors).unwrap();
        HeartbeatHandler::new(Arc::new(service), "/heartbeat")
    }

    async fn body_of(resp: Response<Body>) -> HeartbeatResponse {
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_healthy_service_returns_ok() {
        let resp = handler(vec![CheckDescriptor::function("db", "database", || {
            CheckResult::ok("ready")
        })])
        .oneshot(Request::get("/heartbeat").body(Body::empty()).unwrap())
        .await
        .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
        let body = body_of(resp).await;
        assert_eq!(body.resource, "unit-test");
        assert_eq!(body.dependencies[0].message, "ready");
    }

    #[tokio::test]
    async fn test_critical_service_returns_unavailable() {
        let resp = handler(vec![
            CheckDescriptor::function("db", "database", || CheckResult::ok("ready")),
            CheckDescriptor::function("queue", "RabbitMQ", || {
                CheckResult::critical("RabbitMQ is not healthy")
            }),
        ])
        .oneshot(Request::get("/heartbeat").body(Body::empty()).unwrap())
        .await
        .unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_of(resp).await;
        assert_eq!(body.status, crate::health::Status::Critical);
        assert_eq!(body.dependencies.len(), 2);
    }

    #[tokio::test]
    async fn test_other_paths_and_methods() {
        let h = handler(Vec::new());

        let resp = h
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = h
            .oneshot(Request::post("/heartbeat").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
