//! Unit tests for the file storage backend

#[cfg(test)]
mod tests {
    use crate::{ConfigKind, ConfigObject, ConfigStorage, FileStorage, StorageError};
    use crds::{PathMatchType, Route, Upstream, UpstreamSpec, VirtualService, VirtualServiceSpec};
    use futures::StreamExt;
    use std::time::Duration;

    fn upstream(name: &str) -> ConfigObject {
        Upstream::new(name, UpstreamSpec::kubernetes("web", "default", "80")).into()
    }

    fn virtual_service(name: &str, upstream: &str) -> ConfigObject {
        VirtualService::new(
            name,
            VirtualServiceSpec {
                domains: vec!["example.com".to_string()],
                routes: vec![Route {
                    path: "/".to_string(),
                    match_type: PathMatchType::Prefix,
                    upstream: upstream.to_string(),
                }],
            },
        )
        .into()
    }

    #[tokio::test]
    async fn test_new_creates_kind_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("config");

        let storage = FileStorage::new(&root, Duration::from_secs(1)).await.expect("storage");

        assert_eq!(storage.root(), root.as_path());
        assert!(root.join("upstreams").is_dir());
        assert!(root.join("virtualservices").is_dir());
    }

    #[tokio::test]
    async fn test_new_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").expect("write");

        let result = FileStorage::new(&file, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }

    #[tokio::test]
    async fn test_apply_then_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path(), Duration::from_secs(1)).await.expect("storage");

        storage.apply(upstream("default-web-80")).await.expect("apply upstream");
        storage
            .apply(virtual_service("example-com", "default-web-80"))
            .await
            .expect("apply virtual service");

        let snapshot = storage.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.upstreams.len(), 1);
        assert_eq!(snapshot.virtual_services.len(), 1);
        let stored = &snapshot.upstreams["default-web-80"];
        assert_eq!(stored.spec.service_name, "web");
        assert!(dir.path().join("upstreams/default-web-80.yml").is_file());
    }

    #[tokio::test]
    async fn test_snapshot_ignores_non_yaml_and_names_from_file_stem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path(), Duration::from_secs(1)).await.expect("storage");

        std::fs::write(dir.path().join("upstreams/README.txt"), "ignored").expect("write");
        std::fs::write(
            dir.path().join("upstreams/hand-written.yaml"),
            "apiVersion: gloo.solo.io/v1\nkind: Upstream\nmetadata: {}\nspec:\n  serviceName: api\n  serviceNamespace: prod\n  servicePort: http\n",
        )
        .expect("write");

        let snapshot = storage.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.upstreams.len(), 1);
        assert_eq!(snapshot.upstreams["hand-written"].spec.service_port, "http");
    }

    #[tokio::test]
    async fn test_snapshot_reports_malformed_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path(), Duration::from_secs(1)).await.expect("storage");
        std::fs::write(dir.path().join("virtualservices/broken.yml"), "spec: [").expect("write");

        let result = storage.snapshot().await;
        assert!(matches!(result, Err(StorageError::Yaml { .. })));
    }

    #[tokio::test]
    async fn test_apply_rejects_path_like_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path(), Duration::from_secs(1)).await.expect("storage");

        let result = storage.apply(upstream("../escape")).await;
        assert!(matches!(result, Err(StorageError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path(), Duration::from_secs(1)).await.expect("storage");
        storage.apply(upstream("web")).await.expect("apply");

        storage.delete(ConfigKind::Upstream, "web").await.expect("first delete");
        storage.delete(ConfigKind::Upstream, "web").await.expect("second delete");

        assert!(storage.snapshot().await.expect("snapshot").is_empty());
    }

    #[tokio::test]
    async fn test_watch_yields_initial_then_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path(), Duration::from_millis(20)).await.expect("storage");
        let mut watch = storage.watch();

        let initial = watch.next().await.expect("initial").expect("snapshot");
        assert!(initial.is_empty());

        storage.apply(upstream("web")).await.expect("apply");
        let changed = tokio::time::timeout(Duration::from_secs(5), watch.next())
            .await
            .expect("change within timeout")
            .expect("stream open")
            .expect("snapshot");
        assert_eq!(changed.upstreams.len(), 1);
    }
}
