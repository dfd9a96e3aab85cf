pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::jobs::handlers as jobs;
use crate::recommend::handlers as recommend;
use crate::records::handlers as records;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Recommendation API
        .route(
            "/api/v1/recommendations",
            get(recommend::handle_recommend_query).post(recommend::handle_recommend_body),
        )
        .route(
            "/api/v1/recommendations/:user_id",
            get(recommend::handle_recommend_path),
        )
        // Ingestion API
        .route(
            "/api/v1/jobs",
            get(records::handle_list_jobs).post(records::handle_create_job),
        )
        .route(
            "/api/v1/profiles/:id",
            get(records::handle_get_profile)
                .post(records::handle_upsert_profile)
                .layer(DefaultBodyLimit::max(records::MAX_PROFILE_UPLOAD_BYTES)),
        )
        // Storage event triggers
        .route("/api/v1/events/storage", post(jobs::handle_storage_event))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use bytes::Bytes;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::embedding::generator::generate_embeddings;
    use crate::embedding::HashEmbedder;
    use crate::jobs::fake::RecordingJobService;
    use crate::storage::{keys, BlobStore, LocalBlobStore};
    use crate::training::classifier::ClassifierKind;
    use crate::training::{train_from_store, TrainingOptions};

    struct Harness {
        _dir: tempfile::TempDir,
        store: Arc<LocalBlobStore>,
        compute: Arc<RecordingJobService>,
        router: Router,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalBlobStore::new(dir.path()));
        let compute = Arc::new(RecordingJobService::default());
        let config = Config {
            top_k: 2,
            sagemaker_role: Some("arn:aws:iam::1:role/sm".to_string()),
            ecr_image_uri: Some("img:latest".to_string()),
            ..Config::default()
        };
        let router = build_router(AppState {
            store: store.clone(),
            compute: compute.clone(),
            config,
        });
        Harness {
            _dir: dir,
            store,
            compute,
            router,
        }
    }

    /// Corpora, embeddings and a published model for three users and three jobs.
    async fn seed_pipeline(store: &LocalBlobStore) {
        store
            .put(
                keys::TRAINING_USERS,
                Bytes::from_static(
                    b"id,user_text_clean\nu1,rust backend developer\nu2,enterprise sales account manager\nu3,rust systems engineer\n",
                ),
                "text/csv",
            )
            .await
            .unwrap();
        store
            .put(
                keys::TRAINING_JOBS,
                Bytes::from_static(
                    b"id,jobroles,company,category,location,jobdescription,job_text_clean\n\
                      j1,Backend Engineer,Acme,Engineering,Remote,,rust backend developer\n\
                      j2,Account Executive,Globex,Sales,NYC,,enterprise sales account manager\n\
                      j3,Systems Engineer,Initech,Engineering,Austin,,rust systems engineer\n",
                ),
                "text/csv",
            )
            .await
            .unwrap();
        generate_embeddings(store, &HashEmbedder::new(64)).await.unwrap();
        let options = TrainingOptions {
            classifier: ClassifierKind::Centroid,
            test_fraction: 0.0,
            ..TrainingOptions::default()
        };
        train_from_store(store, options).await.unwrap();
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let response = h.router.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "jobrec-api");
    }

    #[tokio::test]
    async fn test_recommendation_requires_user_id() {
        let h = harness();
        let response = h
            .router
            .oneshot(get("/api/v1/recommendations"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "user_id is required");
    }

    #[tokio::test]
    async fn test_recommendation_by_query() {
        let h = harness();
        seed_pipeline(&h.store).await;

        let response = h
            .router
            .oneshot(get("/api/v1/recommendations?user_id=u1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["user_id"], "u1");
        assert_eq!(body["predicted_category"], "Engineering");
        let jobs = body["top_jobs"].as_array().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0]["id"], "j1");
        assert_eq!(jobs[0]["company"], "Acme");
    }

    #[tokio::test]
    async fn test_recommendation_post_shapes_and_path_agree() {
        let h = harness();
        seed_pipeline(&h.store).await;

        let direct = h
            .router
            .clone()
            .oneshot(post_json("/api/v1/recommendations", json!({"user_id": "u2"})))
            .await
            .unwrap();
        let gateway = h
            .router
            .clone()
            .oneshot(post_json(
                "/api/v1/recommendations",
                json!({"queryStringParameters": {"user_id": "u2"}}),
            ))
            .await
            .unwrap();
        let path = h
            .router
            .oneshot(get("/api/v1/recommendations/u2"))
            .await
            .unwrap();

        let direct = body_json(direct).await;
        assert_eq!(direct["predicted_category"], "Sales");
        assert_eq!(direct, body_json(gateway).await);
        assert_eq!(direct, body_json(path).await);
    }

    #[tokio::test]
    async fn test_unknown_user_is_404() {
        let h = harness();
        seed_pipeline(&h.store).await;
        let response = h
            .router
            .oneshot(get("/api/v1/recommendations/nobody"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "User nobody not found");
    }

    #[tokio::test]
    async fn test_padded_user_id_is_not_trimmed() {
        let h = harness();
        seed_pipeline(&h.store).await;
        let response = h
            .router
            .oneshot(get("/api/v1/recommendations?user_id=%20u1%20"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "User  u1  not found");
    }

    #[tokio::test]
    async fn test_missing_artifacts_is_500_with_cause() {
        let h = harness();
        let response = h
            .router
            .oneshot(get("/api/v1/recommendations?user_id=u1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("model.tar.gz"));
    }

    #[tokio::test]
    async fn test_training_write_event_submits_processing_job() {
        let h = harness();
        let event = json!({"Records": [{"s3": {
            "bucket": {"name": "job-recommendation-system-dataset"},
            "object": {"key": "training/user_profiles_cleaned.csv"}
        }}]});
        let response = h
            .router
            .oneshot(post_json("/api/v1/events/storage", event))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "submitted");
        assert_eq!(body["job_kind"], "processing");

        let sent = h.compute.processing.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(body["job_name"], sent[0].job_name.as_str());
        assert!(h.compute.training.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_processed_write_event_submits_training_job() {
        let h = harness();
        let event = json!({"Records": [{"s3": {
            "bucket": {"name": "b"},
            "object": {"key": "processed/job_embeddings.npy"}
        }}]});
        let response = h
            .router
            .oneshot(post_json("/api/v1/events/storage", event))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.compute.training.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_other_prefix_is_ignored() {
        let h = harness();
        let event = json!({"Records": [{"s3": {
            "bucket": {"name": "b"},
            "object": {"key": "models/latest/pointer.json"}
        }}]});
        let response = h
            .router
            .oneshot(post_json("/api/v1/events/storage", event))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await["status"], "ignored");
        assert!(h.compute.processing.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_job_writes_dataset_part() {
        let h = harness();
        let response = h
            .router
            .oneshot(post_json(
                "/api/v1/jobs",
                json!({
                    "jobroles": "Data Engineer",
                    "company": "Acme",
                    "category": "Engineering",
                    "jobdescription": "Build pipelines at https://acme.example for the team"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        let key = body["s3_key"].as_str().unwrap();
        assert!(key.starts_with(keys::DATASET_JOBS_PREFIX));

        let stored = h.store.get(key).await.unwrap();
        let text = String::from_utf8(stored.to_vec()).unwrap();
        assert!(text.starts_with("id,jobroles,company,category,location,jobdescription,job_text_clean\n"));
        assert!(!body["record"]["job_text_clean"]
            .as_str()
            .unwrap()
            .contains("https"));
    }

    #[tokio::test]
    async fn test_create_job_requires_category() {
        let h = harness();
        let response = h
            .router
            .oneshot(post_json(
                "/api/v1/jobs",
                json!({"jobroles": "Data Engineer", "category": "  "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_profile_upload_from_form_fields() {
        let h = harness();
        let boundary = "XBOUNDARY";
        let form = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"fullName\"\r\n\r\nAda Lovelace\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"skills\"\r\n\r\nRust, analytical engines\r\n\
             --{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/profiles/u42")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(form))
            .unwrap();

        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["record"]["id"], "u42");
        assert_eq!(body["s3_key"], "dataset/userdetails/u42.csv");
        assert!(body["record"]["user_text_clean"]
            .as_str()
            .unwrap()
            .contains("rust"));
    }

    #[tokio::test]
    async fn test_list_jobs_returns_created_postings() {
        let h = harness();
        let created = h
            .router
            .clone()
            .oneshot(post_json(
                "/api/v1/jobs",
                json!({"jobroles": "Data Engineer", "company": "Acme", "category": "Engineering"}),
            ))
            .await
            .unwrap();
        let created = body_json(created).await;

        let response = h.router.oneshot(get("/api/v1/jobs")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let jobs = body_json(response).await;
        let jobs = jobs.as_array().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0]["id"], created["record"]["id"]);
        assert_eq!(jobs[0]["company"], "Acme");
    }

    #[tokio::test]
    async fn test_read_profile_after_upload_and_unknown_is_404() {
        let h = harness();
        let form = "--B\r\nContent-Disposition: form-data; name=\"skills\"\r\n\r\nRust and Go\r\n--B--\r\n";
        let upload = Request::builder()
            .method("POST")
            .uri("/api/v1/profiles/u7")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=B")
            .body(Body::from(form))
            .unwrap();
        let response = h.router.clone().oneshot(upload).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = h
            .router
            .clone()
            .oneshot(get("/api/v1/profiles/u7"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let profile = body_json(response).await;
        assert_eq!(profile["id"], "u7");
        assert!(profile["user_text_clean"].as_str().unwrap().contains("rust"));

        let response = h
            .router
            .oneshot(get("/api/v1/profiles/u8"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_profile_upload_above_default_body_limit() {
        let h = harness();
        let summary = "rust engineer ".repeat(3 * 1024 * 1024 / 14 + 1);
        assert!(summary.len() > 3 * 1024 * 1024);
        let form = format!(
            "--B\r\nContent-Disposition: form-data; name=\"summary\"\r\n\r\n{summary}\r\n--B--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/profiles/u5")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=B")
            .body(Body::from(form))
            .unwrap();
        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_empty_profile_is_rejected() {
        let h = harness();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/profiles/u1")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=B")
            .body(Body::from("--B--\r\n"))
            .unwrap();
        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
