// tests/common/mod.rs
//! Throwaway dependency endpoints for integration tests.

#![allow(dead_code)]

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio::time::sleep;

/// Starts a server that answers every request with `status` after `delay`.
/// Returns its base URL.
pub async fn spawn_backend(status: u16, delay: Duration) -> String {
    let status = StatusCode::from_u16(status).expect("valid status code");

    let make_service = make_service_fn(move |_| async move {
        Ok::<_, Infallible>(service_fn(move |_req: Request<Body>| async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            let mut response = Response::new(Body::from("Hello, client\n"));
            *response.status_mut() = status;
            Ok::<_, Infallible>(response)
        }))
    });

    let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
    let server = Server::bind(&addr).serve(make_service);
    let local = server.local_addr();
    tokio::spawn(server);

    format!("http://{}", local)
}
