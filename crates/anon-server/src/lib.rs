pub mod server;

pub use server::{AnonServer, router};

#[cfg(test)]
mod tests {
    use super::*;
    use anon_core::{Origin, Registration};
    use anon_engine::{Pipeline, PipelineOptions};
    use anon_sources::MemoryProvider;
    use anon_storage::{MemoryRegistrationStore, MemorySnapshotCache, RegistrationStore};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::Router;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn create_test_app() -> (Router, Arc<MemoryProvider>) {
        let origin = Origin::new("alice", "project", "main");
        let provider = Arc::new(MemoryProvider::new());
        provider.insert_repository(
            &origin,
            "c1",
            vec![
                ("README.md", b"Written by Alice".to_vec()),
                ("src/main.rs", b"fn main() {}".to_vec()),
                ("src/lib.rs", b"// alice".to_vec()),
                ("docs/app.json", b"{\"author\": \"alice\"}".to_vec()),
            ],
        );

        let registrations = Arc::new(MemoryRegistrationStore::new());
        registrations
            .save(&Registration::with_id("abc", origin, vec!["alice".to_string()]))
            .await
            .unwrap();

        let pipeline = Arc::new(Pipeline::new(
            provider.clone(),
            Arc::new(MemorySnapshotCache::new()),
            registrations,
            PipelineOptions::default(),
        ));
        (router(pipeline), provider)
    }

    async fn get(app: &Router, uri: &str) -> axum::response::Response {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_info() {
        let (app, _) = create_test_app().await;
        let response = get(&app, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["name"], "anon");
    }

    #[tokio::test]
    async fn test_root_page_is_redacted_html() {
        let (app, _) = create_test_app().await;
        let response = get(&app, "/repository/abc/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert!(response.headers().contains_key(header::ETAG));

        let body = body_text(response).await;
        assert!(body.contains("Written by XXX"));
    }

    #[tokio::test]
    async fn test_directory_redirects() {
        let (app, _) = create_test_app().await;

        let response = get(&app, "/repository/abc/src").await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/repository/abc/src/");

        let response = get(&app, "/r/abc/src").await;
        assert_eq!(response.headers()[header::LOCATION], "/r/abc/src/");

        let response = get(&app, "/repository/abc").await;
        assert_eq!(response.headers()[header::LOCATION], "/repository/abc/");
    }

    #[tokio::test]
    async fn test_short_route_serves_files() {
        let (app, _) = create_test_app().await;
        let response = get(&app, "/r/abc/src/lib.rs").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("// XXX"));
    }

    #[tokio::test]
    async fn test_website_mode_content_type() {
        let (app, _) = create_test_app().await;
        let response = get(&app, "/repository/abc/docs/app.json").await;
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        assert_eq!(body_text(response).await, "{\"author\": \"XXX\"}");
    }

    #[tokio::test]
    async fn test_not_found_and_unavailable_pages_differ() {
        let (app, provider) = create_test_app().await;

        let response = get(&app, "/repository/missing/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let not_found = body_text(response).await;

        provider.set_unavailable(&Origin::new("alice", "project", "main"), true);
        let response = get(&app, "/repository/abc/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let unavailable = body_text(response).await;

        assert_ne!(not_found, unavailable);
        assert!(unavailable.contains("temporarily empty"));
    }

    #[tokio::test]
    async fn test_etag_not_modified() {
        let (app, _) = create_test_app().await;
        let response = get(&app, "/repository/abc/src/main.rs").await;
        let etag = response.headers()[header::ETAG].clone();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/repository/abc/src/main.rs")
                    .header(header::IF_NONE_MATCH, etag)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    }
}
