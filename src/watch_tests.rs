// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `watch.rs`

#[cfg(test)]
mod tests {
    use crate::backend::memory::InMemoryBackend;
    use crate::notification::{DeletedResource, Notification};
    use crate::reconciler::Reconciler;
    use crate::resource::LogicalResource;
    use crate::test_support::{registry_over, FlakyBackend};
    use crate::uptime_errors::MalformedNotification;
    use crate::watch::{decode_watch_event, replay, translate_event, SnapshotStore, WatchEvent};
    use k8s_openapi::api::networking::v1::{Ingress, IngressRule, IngressSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::runtime::watcher;
    use serde_json::json;
    use std::sync::Arc;
    use tracing::Span;

    fn resource(name: &str, hosts: &[&str]) -> LogicalResource {
        hosts
            .iter()
            .fold(LogicalResource::new("default", name), |r, h| r.with_rule(*h))
    }

    fn ingress(name: &str, hosts: &[&str]) -> Ingress {
        Ingress {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                rules: Some(
                    hosts
                        .iter()
                        .map(|h| IngressRule {
                            host: Some((*h).to_string()),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn event_line(event_type: &str, name: &str, hosts: &[&str]) -> String {
        let rules: Vec<_> = hosts.iter().map(|h| json!({"host": h})).collect();
        json!({
            "type": event_type,
            "object": {
                "apiVersion": "networking.k8s.io/v1",
                "kind": "Ingress",
                "metadata": {"name": name, "namespace": "default"},
                "spec": {"rules": rules}
            }
        })
        .to_string()
    }

    // ========== SnapshotStore ==========

    #[test]
    fn test_first_observation_is_added() {
        let mut store = SnapshotStore::new();
        let notification = store.applied(resource("web", &["a.example.com"]));

        assert_eq!(
            notification,
            Notification::Added(resource("web", &["a.example.com"]))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_later_observation_pairs_previous_snapshot() {
        let mut store = SnapshotStore::new();
        store.applied(resource("web", &["a.example.com"]));

        let notification = store.applied(resource("web", &["b.example.com"]));

        assert_eq!(
            notification,
            Notification::Updated {
                previous: resource("web", &["a.example.com"]),
                current: resource("web", &["b.example.com"]),
            }
        );
    }

    #[test]
    fn test_delete_forgets_snapshot() {
        let mut store = SnapshotStore::new();
        store.applied(resource("web", &["a.example.com"]));

        let notification = store.deleted(DeletedResource::Live(resource("web", &["a.example.com"])));

        assert_eq!(notification.kind(), "deleted");
        assert!(store.is_empty());

        // Recreated objects start over as additions
        let again = store.applied(resource("web", &["a.example.com"]));
        assert_eq!(again.kind(), "added");
    }

    #[test]
    fn test_relist_tombstones_vanished_resources() {
        let mut store = SnapshotStore::new();
        store.applied(resource("kept", &["kept.example.com"]));
        store.applied(resource("gone", &["gone.example.com"]));

        store.begin_relist();
        let reobserved = store.applied(resource("kept", &["kept.example.com"]));
        let tombstones = store.finish_relist();

        assert_eq!(
            reobserved,
            Notification::Updated {
                previous: resource("kept", &["kept.example.com"]),
                current: resource("kept", &["kept.example.com"]),
            }
        );
        assert_eq!(
            tombstones,
            vec![Notification::Deleted(DeletedResource::Tombstone {
                key: "default/gone".to_string(),
                last_known: resource("gone", &["gone.example.com"]),
            })]
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_finish_relist_without_begin_is_empty() {
        let mut store = SnapshotStore::new();
        store.applied(resource("web", &["a.example.com"]));

        assert!(store.finish_relist().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_translate_kube_events() {
        let mut store = SnapshotStore::new();

        assert!(translate_event(&mut store, watcher::Event::Init).is_empty());
        let init = translate_event(
            &mut store,
            watcher::Event::InitApply(ingress("web", &["a.example.com"])),
        );
        assert!(translate_event(&mut store, watcher::Event::InitDone).is_empty());
        assert_eq!(init, vec![Notification::Added(resource("web", &["a.example.com"]))]);

        let applied = translate_event(
            &mut store,
            watcher::Event::Apply(ingress("web", &["b.example.com"])),
        );
        assert_eq!(applied[0].kind(), "updated");

        let deleted = translate_event(
            &mut store,
            watcher::Event::Delete(ingress("web", &["b.example.com"])),
        );
        assert_eq!(
            deleted,
            vec![Notification::Deleted(DeletedResource::Live(resource(
                "web",
                &["b.example.com"]
            )))]
        );
    }

    #[test]
    fn test_translate_restart_emits_tombstones() {
        let mut store = SnapshotStore::new();
        translate_event(&mut store, watcher::Event::Apply(ingress("web", &["a.example.com"])));

        translate_event(&mut store, watcher::Event::Init);
        let tombstones = translate_event(&mut store, watcher::Event::InitDone);

        assert_eq!(tombstones.len(), 1);
        assert!(matches!(
            &tombstones[0],
            Notification::Deleted(deleted) if deleted.is_tombstone()
        ));
    }

    #[tokio::test]
    async fn test_repeated_snapshot_retries_failed_create() {
        let backend = Arc::new(FlakyBackend::new(InMemoryBackend::new()));
        let reconciler = Reconciler::new(registry_over(&backend), Span::none());
        let mut store = SnapshotStore::new();
        backend.fail_create_for("example.com");

        reconciler
            .handle(store.applied(resource("web", &["example.com"])))
            .await;
        assert!(backend.hostnames().is_empty());

        backend.heal();
        reconciler
            .handle(store.applied(resource("web", &["example.com"])))
            .await;

        assert_eq!(backend.hostnames(), vec!["example.com".to_string()]);
    }

    // ========== Event decoding ==========

    #[test]
    fn test_decode_added_and_modified() {
        let added = decode_watch_event(&event_line("ADDED", "web", &["a.example.com"])).expect("added");
        let modified =
            decode_watch_event(&event_line("MODIFIED", "web", &["a.example.com"])).expect("modified");

        assert_eq!(added, WatchEvent::Applied(resource("web", &["a.example.com"])));
        assert_eq!(modified, added);
    }

    #[test]
    fn test_decode_deleted_tombstone() {
        let line = json!({
            "type": "DELETED",
            "object": {
                "kind": "DeletedFinalStateUnknown",
                "key": "default/web",
                "obj": {
                    "apiVersion": "networking.k8s.io/v1",
                    "kind": "Ingress",
                    "metadata": {"name": "web", "namespace": "default"}
                }
            }
        })
        .to_string();

        let event = decode_watch_event(&line).expect("deleted");

        assert_eq!(
            event,
            WatchEvent::Deleted(DeletedResource::Tombstone {
                key: "default/web".to_string(),
                last_known: LogicalResource::new("default", "web"),
            })
        );
    }

    #[test]
    fn test_decode_bookmark_and_error() {
        let bookmark = decode_watch_event(r#"{"type":"BOOKMARK","object":{"kind":"Ingress"}}"#)
            .expect("bookmark");
        assert_eq!(bookmark, WatchEvent::Bookmark);

        let error = decode_watch_event(
            r#"{"type":"ERROR","object":{"kind":"Status","message":"too old resource version"}}"#,
        )
        .expect("error event");
        assert_eq!(error, WatchEvent::Error("too old resource version".to_string()));
    }

    #[test]
    fn test_decode_reports_handler_for_wrong_kind() {
        let added = decode_watch_event(r#"{"type":"ADDED","object":{"kind":"Service"}}"#)
            .expect_err("malformed");
        let modified = decode_watch_event(r#"{"type":"MODIFIED","object":"oops"}"#)
            .expect_err("malformed");

        assert!(added.to_string().starts_with("OnAdd unexpected type Service"));
        assert!(modified.to_string().starts_with("OnUpdate unexpected type string"));
    }

    #[test]
    fn test_decode_rejects_bad_envelopes() {
        assert!(matches!(
            decode_watch_event("not json"),
            Err(MalformedNotification::InvalidEvent { .. })
        ));
        assert!(matches!(
            decode_watch_event(r#"{"type":"SYNC","object":{}}"#),
            Err(MalformedNotification::InvalidEvent { .. })
        ));
    }

    // ========== Replay ==========

    #[tokio::test]
    async fn test_replay_reconciles_in_order() {
        let backend = Arc::new(FlakyBackend::new(InMemoryBackend::new()));
        let reconciler = Reconciler::new(registry_over(&backend), Span::none());

        let input = [
            event_line("ADDED", "web", &["a.example.com", "b.example.com"]),
            String::new(),
            event_line("MODIFIED", "web", &["b.example.com", "c.example.com"]),
            r#"{"type":"ADDED","object":{"kind":"ConfigMap"}}"#.to_string(),
            event_line("ADDED", "api", &["api.example.com"]),
            event_line("DELETED", "api", &["api.example.com"]),
        ]
        .join("\n");

        let summary = replay(input.as_bytes(), &reconciler).await.expect("replay");

        assert_eq!(summary.events, 5);
        assert_eq!(summary.notifications, 4);
        assert_eq!(summary.malformed, 1);
        assert_eq!(
            backend.hostnames(),
            vec!["b.example.com".to_string(), "c.example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn test_replay_is_idempotent_across_runs() {
        let backend = Arc::new(FlakyBackend::new(InMemoryBackend::new()));
        let reconciler = Reconciler::new(registry_over(&backend), Span::none());
        let input = event_line("ADDED", "web", &["a.example.com"]);

        replay(input.as_bytes(), &reconciler).await.expect("replay");
        replay(input.as_bytes(), &reconciler).await.expect("replay");

        assert_eq!(backend.inner.create_count(), 1);
    }
}
