// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! InferenceServer lifecycle tests
//!
//! Unstarted after bind, Serving once accepting, Stopped after shutdown.
//! Shutdown lets requests already being computed finish.

use fuzzle_inference::api::{InferenceServer, ServerState, WorkerPool};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{test_model, test_service, HashingModel, RunningServer, TEST_DIMENSION};

#[tokio::test]
async fn test_bound_server_is_unstarted() {
    let server = InferenceServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        test_service(test_model()),
        WorkerPool::new(1),
    )
    .await
    .unwrap();

    assert_ne!(server.local_addr().port(), 0);
    assert_eq!(*server.state().borrow(), ServerState::Unstarted);
}

#[tokio::test]
async fn test_bind_conflict_fails() {
    let first = RunningServer::start(1).await;

    let result = InferenceServer::bind(first.addr, test_service(test_model()), WorkerPool::new(1)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_serving_then_stopped() {
    let mut server = RunningServer::start(2).await;
    assert_eq!(*server.state.borrow(), ServerState::Serving);

    let response = reqwest::Client::new()
        .post(format!("{}/v1/embed/text", server.url()))
        .json(&json!({"model": "CLIP_TEXT", "text": "a photo of a cat"}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["embedding"].as_array().unwrap().len(), TEST_DIMENSION);

    server.stop().await.unwrap();
    assert_eq!(*server.state.borrow(), ServerState::Stopped);

    let after = reqwest::Client::new()
        .get(format!("{}/health", server.url()))
        .send()
        .await;
    assert!(after.is_err(), "listener should be closed after shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_requests_beyond_pool_size_queue() {
    let mut server = RunningServer::start(1).await;
    let client = reqwest::Client::new();

    let requests = (0..6).map(|i| {
        let client = client.clone();
        let url = format!("{}/v1/embed/text", server.url());
        async move {
            client
                .post(url)
                .json(&json!({"model": "CLIP_TEXT", "text": format!("queued {}", i)}))
                .send()
                .await
                .map(|r| r.status())
        }
    });
    let statuses = futures_util::future::join_all(requests).await;

    assert!(statuses
        .into_iter()
        .all(|s| s.map(|s| s.is_success()).unwrap_or(false)));
    assert_eq!(
        server
            .model
            .text_calls
            .load(Ordering::SeqCst),
        6
    );

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_drains_in_flight_request() {
    let model = Arc::new(HashingModel::new(TEST_DIMENSION).with_delay(Duration::from_millis(500)));
    let mut server = RunningServer::start_with_model(model.clone(), 1).await;

    let url = format!("{}/v1/embed/text", server.url());
    let request = tokio::spawn(async move {
        reqwest::Client::new()
            .post(url)
            .json(&json!({"model": "CLIP_TEXT", "text": "slow caption"}))
            .send()
            .await
    });

    // Wait until the request is inside the model
    tokio::time::timeout(Duration::from_secs(5), async {
        while model.tokenize_calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("request never reached the model");
    assert_eq!(model.completed.load(Ordering::SeqCst), 0);

    server.stop().await.unwrap();
    assert_eq!(model.completed.load(Ordering::SeqCst), 1);
    assert_eq!(*server.state.borrow(), ServerState::Stopped);

    let response = request.await.unwrap().unwrap();
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["embedding"].as_array().unwrap().len(), TEST_DIMENSION);
}
