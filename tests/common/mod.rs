// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use kube::client::Client;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "integration-token";

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Start a mock Pingdom API answering the two listing endpoints
pub async fn mock_pingdom(contacts: Value, checks: Value) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/alerting/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "contacts": contacts })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/checks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "checks": checks })))
        .mount(&server)
        .await;

    server
}

/// Ingress manifest declaring `hosts`, with `tls_hosts` in a TLS block
pub fn ingress_json(namespace: &str, name: &str, hosts: &[&str], tls_hosts: &[&str]) -> Value {
    let rules: Vec<Value> = hosts
        .iter()
        .map(|host| {
            json!({
                "host": host,
                "http": {
                    "paths": [{
                        "path": "/",
                        "pathType": "Prefix",
                        "backend": {"service": {"name": name, "port": {"number": 80}}}
                    }]
                }
            })
        })
        .collect();

    let mut spec = json!({ "rules": rules });
    if !tls_hosts.is_empty() {
        spec["tls"] = json!([{ "hosts": tls_hosts, "secretName": format!("{name}-tls") }]);
    }

    json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": {"name": name, "namespace": namespace},
        "spec": spec
    })
}

/// One Kubernetes watch-event line
pub fn watch_line(event_type: &str, object: Value) -> String {
    json!({ "type": event_type, "object": object }).to_string()
}
