// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `registry.rs`

#[cfg(test)]
mod tests {
    use crate::backend::memory::{BackendCall, InMemoryBackend};
    use crate::backend::UptimeBackend;
    use crate::monitor::{Contact, ContactId, MonitorId, MonitorSpec};
    use crate::registry::{select_contact, MonitorRegistry, RegistryConfig};
    use crate::resource::ResourceRef;
    use crate::test_support::{registry_over, FlakyBackend};
    use crate::uptime_errors::RegistryError;
    use std::sync::Arc;
    use std::time::Duration;

    fn spec(hostname: &str) -> MonitorSpec {
        MonitorSpec::for_host(&ResourceRef::new("default", "web"), hostname, false)
    }

    fn contacts() -> Vec<Contact> {
        vec![
            Contact {
                id: ContactId(7),
                name: "On-call".to_string(),
            },
            Contact {
                id: ContactId(8),
                name: "Platform".to_string(),
            },
        ]
    }

    fn seeded() -> Arc<FlakyBackend> {
        Arc::new(FlakyBackend::new(
            InMemoryBackend::new()
                .with_monitor("a.example.com", "default/web (a.example.com:80)", false)
                .with_monitor("b.example.com", "default/web (b.example.com:443)", true),
        ))
    }

    fn list_contact_calls(backend: &FlakyBackend) -> usize {
        backend
            .inner
            .calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::ListContacts))
            .count()
    }

    // ========== Contact selection ==========

    #[test]
    fn test_select_configured_contact() {
        let selected = select_contact(&contacts(), Some(ContactId(8))).expect("contact");
        assert_eq!(selected, ContactId(8));
    }

    #[test]
    fn test_select_first_contact_when_unconfigured() {
        let selected = select_contact(&contacts(), None).expect("contact");
        assert_eq!(selected, ContactId(7));
    }

    #[test]
    fn test_select_unknown_contact_fails() {
        let err = select_contact(&contacts(), Some(ContactId(99))).expect_err("unknown contact");
        assert!(matches!(
            err,
            RegistryError::UnknownContact {
                contact_id: ContactId(99)
            }
        ));
    }

    #[test]
    fn test_select_without_contacts_fails() {
        let err = select_contact(&[], None).expect_err("no contacts");
        assert!(matches!(err, RegistryError::NoContacts));
    }

    // ========== Initialization ==========

    #[tokio::test]
    async fn test_initialize_loads_existing_monitors() {
        let backend = seeded();
        let registry = registry_over(&backend);
        assert!(!registry.is_initialized());

        let contact = registry.initialize().await.expect("initialize");

        assert_eq!(contact, ContactId(1));
        assert!(registry.is_initialized());
        assert_eq!(registry.contact_id(), Some(ContactId(1)));
        assert_eq!(registry.len(), 2);
        assert!(registry.exists("a.example.com").await.expect("exists"));
        assert!(registry.exists("b.example.com").await.expect("exists"));
        assert!(!registry.exists("c.example.com").await.expect("exists"));

        let record = registry
            .get("b.example.com")
            .await
            .expect("get")
            .expect("cached record");
        assert_eq!(record.id, MonitorId(2));
        assert!(record.tls);
    }

    #[tokio::test]
    async fn test_initialize_happens_once() {
        let backend = seeded();
        let registry = registry_over(&backend);

        let (first, second) = tokio::join!(registry.initialize(), registry.initialize());
        first.expect("initialize");
        second.expect("initialize");
        registry.exists("a.example.com").await.expect("exists");

        assert_eq!(list_contact_calls(&backend), 1);
    }

    #[tokio::test]
    async fn test_lookup_initializes_lazily() {
        let backend = seeded();
        let registry = registry_over(&backend);

        assert!(registry.exists("a.example.com").await.expect("exists"));
        assert!(registry.is_initialized());
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let backend = seeded();
        backend.fail_listing(true);
        let registry = registry_over(&backend);

        assert!(registry.initialize().await.is_err());
        assert!(!registry.is_initialized());
        assert!(registry.create(spec("c.example.com")).await.is_err());
        assert_eq!(backend.inner.create_count(), 0);

        backend.heal();
        registry.initialize().await.expect("initialize");
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_initialize_without_contacts_fails() {
        let backend: Arc<dyn UptimeBackend> = Arc::new(InMemoryBackend::with_contacts(Vec::new()));
        let registry = MonitorRegistry::new(backend, RegistryConfig::default());

        let err = registry.initialize().await.expect_err("no contacts");
        assert!(matches!(err, RegistryError::NoContacts));
        assert!(!registry.is_initialized());
    }

    #[tokio::test]
    async fn test_configured_contact_owns_new_monitors() {
        let memory = Arc::new(InMemoryBackend::with_contacts(contacts()));
        let registry = MonitorRegistry::new(
            Arc::clone(&memory) as Arc<dyn UptimeBackend>,
            RegistryConfig {
                contact_id: Some(ContactId(8)),
            },
        );

        registry.create(spec("c.example.com")).await.expect("create");

        let record = registry
            .get("c.example.com")
            .await
            .expect("get")
            .expect("cached record");
        assert_eq!(record.contact_id, Some(ContactId(8)));
        assert_eq!(memory.monitors()[0].contact_id, Some(ContactId(8)));
    }

    #[tokio::test]
    async fn test_listing_ignores_monitors_without_hostname() {
        let backend = Arc::new(FlakyBackend::new(
            InMemoryBackend::new()
                .with_monitor("", "manual check", false)
                .with_monitor("a.example.com", "default/web (a.example.com:80)", false),
        ));
        let registry = registry_over(&backend);

        registry.initialize().await.expect("initialize");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_listing_keeps_last_duplicate() {
        let backend = Arc::new(FlakyBackend::new(
            InMemoryBackend::new()
                .with_monitor("a.example.com", "old", false)
                .with_monitor("a.example.com", "new", false),
        ));
        let registry = registry_over(&backend);

        let record = registry
            .get("a.example.com")
            .await
            .expect("get")
            .expect("cached record");
        assert_eq!(record.id, MonitorId(2));
        assert_eq!(record.name, "new");
    }

    // ========== Create ==========

    #[tokio::test]
    async fn test_create_caches_record() {
        let backend = seeded();
        let registry = registry_over(&backend);

        let id = registry.create(spec("c.example.com")).await.expect("create");

        assert_eq!(id, MonitorId(3));
        assert!(registry.exists("c.example.com").await.expect("exists"));
        assert_eq!(registry.len(), 3);
        assert_eq!(backend.inner.create_count(), 1);
    }

    #[tokio::test]
    async fn test_create_existing_hostname_skips_backend() {
        let backend = seeded();
        let registry = registry_over(&backend);

        let id = registry.create(spec("a.example.com")).await.expect("create");

        assert_eq!(id, MonitorId(1));
        assert_eq!(backend.inner.create_count(), 0);
    }

    #[tokio::test]
    async fn test_create_failure_leaves_cache_unchanged() {
        let backend = seeded();
        backend.fail_create_for("c.example.com");
        let registry = registry_over(&backend);

        let err = registry
            .create(spec("c.example.com"))
            .await
            .expect_err("create should fail");

        assert!(matches!(err, RegistryError::Backend(_)));
        assert!(!registry.exists("c.example.com").await.expect("exists"));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_creates_reach_backend_once() {
        let backend = Arc::new(
            FlakyBackend::new(InMemoryBackend::new()).with_create_delay(Duration::from_millis(50)),
        );
        let registry = registry_over(&backend);

        let (first, second) = tokio::join!(
            registry.create(spec("c.example.com")),
            registry.create(spec("c.example.com"))
        );

        assert_eq!(first.expect("create"), second.expect("create"));
        assert_eq!(backend.inner.create_count(), 1);
        assert_eq!(backend.hostnames(), vec!["c.example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_creates_of_distinct_hostnames() {
        let backend = Arc::new(
            FlakyBackend::new(InMemoryBackend::new()).with_create_delay(Duration::from_millis(20)),
        );
        let registry = registry_over(&backend);

        let (first, second) = tokio::join!(
            registry.create(spec("c.example.com")),
            registry.create(spec("d.example.com"))
        );

        assert_ne!(first.expect("create"), second.expect("create"));
        assert_eq!(registry.len(), 2);
    }

    // ========== Delete ==========

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let backend = seeded();
        let registry = registry_over(&backend);

        registry.delete("a.example.com").await.expect("delete");

        assert!(!registry.exists("a.example.com").await.expect("exists"));
        assert_eq!(backend.hostnames(), vec!["b.example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_absent_hostname_is_noop() {
        let backend = seeded();
        let registry = registry_over(&backend);

        registry.delete("z.example.com").await.expect("delete");

        assert_eq!(backend.inner.delete_count(), 0);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_entry() {
        let backend = seeded();
        backend.fail_delete_for("a.example.com");
        let registry = registry_over(&backend);

        assert!(registry.delete("a.example.com").await.is_err());

        let record = registry
            .get("a.example.com")
            .await
            .expect("get")
            .expect("entry kept");
        assert_eq!(record.id, MonitorId(1));

        backend.heal();
        registry.delete("a.example.com").await.expect("delete");
        assert!(!registry.exists("a.example.com").await.expect("exists"));
    }

    // ========== Replace / sync / snapshot ==========

    #[tokio::test]
    async fn test_replace_recreates_monitor() {
        let backend = seeded();
        let registry = registry_over(&backend);

        let tls_spec = MonitorSpec::for_host(&ResourceRef::new("default", "web"), "a.example.com", true);
        let id = registry.replace(tls_spec).await.expect("replace");

        assert_eq!(id, MonitorId(3));
        let record = registry
            .get("a.example.com")
            .await
            .expect("get")
            .expect("cached record");
        assert!(record.tls);
        assert_eq!(record.name, "default/web (a.example.com:443)");
        assert_eq!(backend.inner.delete_count(), 1);
        assert_eq!(backend.inner.create_count(), 1);
    }

    #[tokio::test]
    async fn test_replace_stops_when_delete_fails() {
        let backend = seeded();
        backend.fail_delete_for("a.example.com");
        let registry = registry_over(&backend);

        let tls_spec = MonitorSpec::for_host(&ResourceRef::new("default", "web"), "a.example.com", true);
        assert!(registry.replace(tls_spec).await.is_err());

        assert_eq!(backend.inner.create_count(), 0);
        let record = registry
            .get("a.example.com")
            .await
            .expect("get")
            .expect("entry kept");
        assert_eq!(record.id, MonitorId(1));
    }

    #[tokio::test]
    async fn test_sync_picks_up_external_monitors() {
        let backend = seeded();
        let registry = registry_over(&backend);
        registry.initialize().await.expect("initialize");

        backend
            .inner
            .create_monitor(&spec("external.example.com"))
            .await
            .expect("external create");
        assert!(!registry.exists("external.example.com").await.expect("exists"));

        let listed = registry.sync().await.expect("sync");

        assert_eq!(listed, 3);
        assert!(registry.exists("external.example.com").await.expect("exists"));
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let backend = seeded();
        let registry = registry_over(&backend);
        registry.initialize().await.expect("initialize");

        let snapshot = registry.snapshot();
        registry.delete("a.example.com").await.expect("delete");

        assert!(snapshot.contains_key("a.example.com"));
        assert_eq!(registry.snapshot().len(), 1);
        assert!(!registry.is_empty());
    }
}
