//! Helper methods only available for tests
use http::{Method, Request, Response, StatusCode};
use k8s_openapi::NamespaceResourceScope;
use kube::{client::Body, Api, Client, Resource};
use serde::{de::DeserializeOwned, Serialize};
use tower_test::mock::SendResponse;

pub type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

/// Scripted API server standing in for the cluster behind a `kube::Client`
pub struct ApiServerVerifier(ApiServerHandle);

impl ApiServerVerifier {
    pub fn client() -> (Client, ApiServerVerifier) {
        let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        (Client::new(mock_service, "default"), ApiServerVerifier(handle))
    }

    /// An `Api` on the `default` namespace backed by the verifier
    pub fn api<K>() -> (Api<K>, ApiServerVerifier)
    where
        K: Resource<Scope = NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        let (client, verifier) = Self::client();
        (Api::default_namespaced(client), verifier)
    }

    async fn next(&mut self, method: Method, path: &str) -> (Request<Body>, SendResponse<Response<Body>>) {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.method(), method, "unexpected method for {}", request.uri());
        assert_eq!(request.uri().path(), path);
        (request, send)
    }

    pub async fn expect_get<K: Serialize>(&mut self, path: &str, obj: &K) {
        let (_, send) = self.next(Method::GET, path).await;
        send.send_response(json_response(StatusCode::OK, obj));
    }

    pub async fn expect_get_not_found(&mut self, path: &str) {
        let (_, send) = self.next(Method::GET, path).await;
        send.send_response(status_response(StatusCode::NOT_FOUND, "NotFound"));
    }

    /// Accepts a POST to `path`, echoing back and returning the submitted object
    pub async fn expect_create<K: DeserializeOwned>(&mut self, path: &str) -> K {
        let (request, send) = self.next(Method::POST, path).await;
        echo(request, send, StatusCode::CREATED).await
    }

    /// Accepts a PUT to `path`, echoing back and returning the submitted object
    pub async fn expect_replace<K: DeserializeOwned>(&mut self, path: &str) -> K {
        let (request, send) = self.next(Method::PUT, path).await;
        echo(request, send, StatusCode::OK).await
    }

    /// Accepts a PATCH to `path`, returning the raw patch document and answering with `obj`
    pub async fn expect_patch<K: Serialize>(&mut self, path: &str, obj: &K) -> serde_json::Value {
        let (request, send) = self.next(Method::PATCH, path).await;
        let body = request.into_body().collect_bytes().await.unwrap();
        let patch = serde_json::from_slice(&body).expect("valid patch document");
        send.send_response(json_response(StatusCode::OK, obj));
        patch
    }

    /// Accepts a DELETE of `path`, returning the submitted delete options and answering with `obj`
    pub async fn expect_delete<K: Serialize>(&mut self, path: &str, obj: &K) -> serde_json::Value {
        let (request, send) = self.next(Method::DELETE, path).await;
        let body = request.into_body().collect_bytes().await.unwrap();
        let options = serde_json::from_slice(&body).expect("valid delete options");
        send.send_response(json_response(StatusCode::OK, obj));
        options
    }

    /// Answers the next write to `path` with a resourceVersion conflict
    pub async fn respond_conflict(&mut self, path: &str) {
        let (request, send) = self.0.next_request().await.expect("service not called");
        assert_eq!(request.uri().path(), path);
        send.send_response(status_response(StatusCode::CONFLICT, "Conflict"));
    }

    /// Answers the next `method` request on `path` with a failure `Status`
    pub async fn respond_status(&mut self, method: Method, path: &str, status: StatusCode) {
        let (_, send) = self.next(method, path).await;
        let reason = status.canonical_reason().unwrap_or("Failure");
        send.send_response(status_response(status, reason));
    }

    /// Waits for the client side to be dropped, failing on any further request
    pub async fn expect_no_more_requests(&mut self) {
        if let Some((request, _)) = self.0.next_request().await {
            panic!("unexpected request: {} {}", request.method(), request.uri());
        }
    }
}

async fn echo<K: DeserializeOwned>(request: Request<Body>, send: SendResponse<Response<Body>>, status: StatusCode) -> K {
    let body = request.into_body().collect_bytes().await.unwrap();
    let obj = serde_json::from_slice(&body).expect("valid object");
    send.send_response(
        Response::builder()
            .status(status)
            .body(Body::from(body.to_vec()))
            .unwrap(),
    );
    obj
}

fn json_response<K: Serialize>(status: StatusCode, obj: &K) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::from(serde_json::to_vec(obj).unwrap()))
        .unwrap()
}

fn status_response(status: StatusCode, reason: &str) -> Response<Body> {
    let body = serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": reason,
        "reason": reason,
        "code": status.as_u16(),
    });
    json_response(status, &body)
}

pub async fn timeout_after_1s(handle: tokio::task::JoinHandle<()>) {
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("timeout on mock apiserver")
        .expect("scenario succeeded")
}
