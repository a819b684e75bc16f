//! Unit tests for loop supervision

#[cfg(test)]
mod tests {
    use crate::error::{ControllerError, ErrorKind};
    use crate::options::BootstrapOptions;
    use crate::scope::ServiceRef;
    use crate::stop::StopSignal;
    use crate::supervisor::{spawn_loop, start_loops, INGRESS_LOOP, STATUS_LOOP};
    use crate::test_utils::*;
    use config_storage::{ConfigStorage, MockStorage};
    use futures::StreamExt;
    use std::sync::Arc;
    use std::time::Duration;

    fn options(service: Option<&str>) -> BootstrapOptions {
        let mut options = BootstrapOptions::new("file", Duration::from_millis(10)).expect("valid options");
        options.service_name = service.map(str::to_string);
        options
    }

    fn storage() -> Arc<dyn ConfigStorage> {
        Arc::new(MockStorage::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_primary_loop_without_service() {
        let client = test_client().await;
        let factory = FakeLoopFactory::default();
        let stop = StopSignal::new();

        let loops = start_loops(&factory, &client, storage(), &options(None), &stop).expect("loops start");

        let names: Vec<_> = loops.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec![INGRESS_LOOP]);
        assert_eq!(factory.calls(), (1, 0));

        stop.fire();
        for handle in loops {
            let (_, _, task) = handle.into_parts();
            task.await.expect("loop exits cleanly");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_loop_started_for_service() {
        let client = test_client().await;
        let factory = FakeLoopFactory::default();
        let stop = StopSignal::new();

        let loops = start_loops(&factory, &client, storage(), &options(Some("gloo-system/proxy")), &stop)
            .expect("loops start");

        let names: Vec<_> = loops.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec![INGRESS_LOOP, STATUS_LOOP]);
        assert_eq!(factory.calls(), (1, 1));
        assert_eq!(
            factory.services.lock().expect("lock")[0],
            ServiceRef {
                namespace: "gloo-system".to_string(),
                name: "proxy".to_string(),
            }
        );

        stop.fire();
        for handle in loops {
            let (_, _, task) = handle.into_parts();
            task.await.expect("loop exits cleanly");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_namespace_defaults_to_watch_namespace() {
        let client = test_client().await;
        let factory = FakeLoopFactory::default();
        let stop = StopSignal::new();
        let mut options = options(Some("proxy"));
        options.global_ingress = false;
        options.watch_namespace = Some("apps".to_string());

        let loops = start_loops(&factory, &client, storage(), &options, &stop).expect("loops start");

        assert_eq!(factory.services.lock().expect("lock")[0].namespace, "apps");
        stop.fire();
        for handle in loops {
            let (_, _, task) = handle.into_parts();
            task.await.expect("loop exits cleanly");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_service_starts_nothing() {
        let client = test_client().await;
        let factory = FakeLoopFactory::default();
        let stop = StopSignal::new();

        let result = start_loops(&factory, &client, storage(), &options(Some("a/b/c")), &stop);

        let err = result.expect_err("invalid service reference");
        assert_eq!(err.kind(), ErrorKind::Startup);
        assert!(err.to_string().contains("failed to start load balancer status syncer"));
        assert_eq!(factory.calls().1, 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(factory.ingress.started(), 0, "primary loop must not have been spawned");
    }

    #[tokio::test(start_paused = true)]
    async fn test_namespaced_scope_requires_namespace() {
        let client = test_client().await;
        let factory = FakeLoopFactory::default();
        let mut options = options(None);
        options.global_ingress = false;

        let result = start_loops(&factory, &client, storage(), &options, &StopSignal::new());

        assert!(matches!(result, Err(ControllerError::Startup(_))));
        assert_eq!(factory.calls(), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_loop_does_not_stop_sibling() {
        let stop = StopSignal::new();
        let healthy = CountingReconcile::new();
        let broken = CountingReconcile::failing();

        let healthy_loop = spawn_loop(INGRESS_LOOP, healthy.clone(), Duration::from_millis(10), stop.clone());
        let mut broken_loop = spawn_loop(STATUS_LOOP, broken.clone(), Duration::from_millis(10), stop.clone());

        tokio::time::sleep(Duration::from_millis(55)).await;
        assert!(healthy.completed() >= 3);
        assert!(broken.completed() >= 3);

        let first = broken_loop.errors().recv().await.expect("error reported");
        assert_eq!(first.kind(), ErrorKind::Operational);
        assert!(first.to_string().contains("pass 1 failed"));

        stop.fire();
        let (_, _, task) = healthy_loop.into_parts();
        task.await.expect("healthy loop exits");
        let (_, mut errors, task) = broken_loop.into_parts();
        task.await.expect("broken loop exits");

        // The channel closes once the loop has exited.
        let mut remaining = 0;
        while errors.recv().await.is_some() {
            remaining += 1;
        }
        assert_eq!(remaining + 1, broken.completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_in_flight_pass_finish() {
        let stop = StopSignal::new();
        let slow = CountingReconcile::slow(Duration::from_millis(50));

        let handle = spawn_loop(INGRESS_LOOP, slow.clone(), Duration::from_millis(10), stop.clone());

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(slow.started(), 1);
        assert!(stop.fire());

        let (_, _, task) = handle.into_parts();
        task.await.expect("loop exits");
        assert_eq!(slow.started(), 1, "no pass may start after the stop signal");
        assert_eq!(slow.completed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_runs_pass_before_interval() {
        let stop = StopSignal::new();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        let triggers = futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|()| ((), rx)) });
        let reconciler = CountingReconcile::with_triggers(triggers.boxed());

        let handle = spawn_loop(INGRESS_LOOP, reconciler.clone(), Duration::from_secs(3600), stop.clone());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(reconciler.completed(), 1);

        for _ in 0..3 {
            tx.send(()).expect("loop listening");
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(reconciler.completed(), 2, "burst of notifications coalesces into one pass");

        stop.fire();
        let (_, _, task) = handle.into_parts();
        task.await.expect("loop exits");
    }
}
