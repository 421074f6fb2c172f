//! `--listen` mode: run the publish workflow for each `POST /push`.
//!
//! The job runs to completion before the response goes out, so callers see
//! failures as HTTP errors. Each request carries its own [`Config`].

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

use crate::config::Config;
use crate::error::Error;
use crate::workflow::{self, Report};

/// Runs a publish job for a decoded request.
pub trait Runner: Send + Sync + 'static {
    fn run(&self, config: Config) -> crate::error::Result<Report>;
}

/// [`Runner`] that talks to the GitLab instance named in each request
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveRunner;

impl Runner for LiveRunner {
    fn run(&self, config: Config) -> crate::error::Result<Report> {
        workflow::run(config)
    }
}

pub fn create_router<R: Runner>(runner: Arc<R>) -> Router {
    Router::new()
        .route("/push", post(push::<R>))
        .with_state(runner)
}

async fn push<R: Runner>(
    State(runner): State<Arc<R>>,
    payload: std::result::Result<Json<Config>, JsonRejection>,
) -> Response {
    let Json(config) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Rejected push request: {rejection}");
            return (StatusCode::BAD_REQUEST, "Bad request").into_response();
        }
    };

    let config = config.with_env_overrides();
    info!("Received push request for {}", config.repo_name);

    match tokio::task::spawn_blocking(move || runner.run(config)).await {
        Ok(Ok(report)) => {
            let summary = report.summary();
            info!("{summary}");
            (StatusCode::OK, summary).into_response()
        }
        Ok(Err(e)) => {
            let status = status_for(&e);
            let message = format!("{:#}", anyhow::Error::from(e));
            error!("Push job failed: {message}");
            (status, message).into_response()
        }
        Err(e) => {
            error!("Push job panicked: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Push job panicked").into_response()
        }
    }
}

/// HTTP status reported for a failed job
#[must_use]
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Configuration { .. } | Error::InvalidAddress { .. } => StatusCode::BAD_REQUEST,
        Error::RepositoryOpen { .. } | Error::NamespaceNotFound { .. } => StatusCode::NOT_FOUND,
        Error::Network { .. }
        | Error::Api { .. }
        | Error::ProjectCreation { .. }
        | Error::Push { .. } => StatusCode::BAD_GATEWAY,
        Error::RepositoryConfig { .. } | Error::SshPort { .. } | Error::Credential(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Serve `POST /push` on every interface until SIGINT/SIGTERM
pub async fn serve<R: Runner>(port: u16, runner: Arc<R>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;

    info!("Starting server on port {port}");

    axum::serve(listener, create_router(runner))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::PushOutcome;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Records every config it is handed and answers with a canned result.
    struct FakeRunner {
        seen: Mutex<Vec<Config>>,
        answer: fn() -> crate::error::Result<Report>,
    }

    impl FakeRunner {
        fn new(answer: fn() -> crate::error::Result<Report>) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                answer,
            })
        }
    }

    impl Runner for FakeRunner {
        fn run(&self, config: Config) -> crate::error::Result<Report> {
            self.seen.lock().unwrap().push(config);
            (self.answer)()
        }
    }

    fn pushed() -> crate::error::Result<Report> {
        Ok(Report {
            public_url: String::from("https://gitlab.example.com/team/demo.git"),
            ssh_url: String::from("ssh://git@gitlab.example.com:22/team/demo.git"),
            created: true,
            outcome: PushOutcome::Pushed { updated: 1 },
        })
    }

    fn missing_token() -> crate::error::Result<Report> {
        Err(Error::Configuration {
            missing: vec!["GITLAB_TOKEN"],
        })
    }

    fn push_failed() -> crate::error::Result<Report> {
        Err(Error::Push {
            url: String::from("ssh://git@gitlab.example.com:22/team/demo.git"),
            source: git2::Error::from_str("connection refused"),
        })
    }

    fn json_request(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/push")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_successful_job_returns_ok() {
        let runner = FakeRunner::new(pushed);
        let app = create_router(Arc::clone(&runner));

        let response = app
            .oneshot(json_request(
                r#"{"gitlab_address":"gitlab.example.com","gitlab_group":"team","repo_name":"demo"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Created https://gitlab.example.com/team/demo.git"));

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].gitlab_group, "team");
        assert_eq!(seen[0].repo_name, "demo");
        assert_eq!(seen[0].gitlab_token, "");
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_bad_request() {
        let runner = FakeRunner::new(pushed);
        let app = create_router(Arc::clone(&runner));

        let response = app.oneshot(json_request("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Bad request");
        assert!(runner.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_methods_are_not_allowed() {
        let app = create_router(FakeRunner::new(pushed));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/push")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_configuration_errors_are_reported_to_the_caller() {
        let app = create_router(FakeRunner::new(missing_token));

        let response = app.oneshot(json_request("{}")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("GITLAB_TOKEN"));
    }

    #[tokio::test]
    async fn test_push_failures_are_bad_gateway() {
        let app = create_router(FakeRunner::new(push_failed));

        let response = app.oneshot(json_request("{}")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_text(response).await;
        assert!(body.contains("ssh://git@gitlab.example.com:22/team/demo.git"), "{body}");
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            status_for(&Error::Credential(String::from("none"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&Error::NamespaceNotFound {
                group: String::from("team"),
                address: String::from("gitlab.example.com"),
            }),
            StatusCode::NOT_FOUND
        );
    }
}
