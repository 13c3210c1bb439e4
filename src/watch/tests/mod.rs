//! Unit tests for the dedicated thread and the notifier shim.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use crate::core::RegistryError;
use crate::registry::{Hive, MemoryRegistry, NotifyFilter, RegistryBackend, RegistryKey};
use crate::watch::{
    ChangeNotifier, DedicatedThreadNotifier, DedicatedThreadPool, ThreadAgnosticNotifier,
    WORKER_THREAD_NAME, select_notifier,
};

const ROOT: &str = r"SOFTWARE\Contoso\App";

fn open_root(registry: &MemoryRegistry) -> Arc<dyn RegistryKey> {
    registry.create_key(Hive::CurrentUser, ROOT);
    Arc::from(registry.open_root(Hive::CurrentUser, ROOT, false).unwrap().unwrap())
}

mod dedicated_thread {
    use super::*;

    #[tokio::test]
    async fn runs_work_on_the_named_worker() {
        let pool = DedicatedThreadPool::new();
        let seen = Arc::new(Mutex::new(None));
        let record = Arc::clone(&seen);

        let lease = pool
            .run_on_dedicated_thread(move || {
                *record.lock().unwrap() = thread::current().name().map(str::to_string);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some(WORKER_THREAD_NAME));
        assert_eq!(pool.keep_alive_count(), 1);
        assert!(pool.has_live_worker());

        drop(lease);
        assert_eq!(pool.keep_alive_count(), 0);
        assert!(!pool.has_live_worker());
    }

    #[tokio::test]
    async fn concurrent_claims_share_one_worker() {
        let pool = DedicatedThreadPool::new();
        let ids = Arc::new(Mutex::new(Vec::new()));

        let mut leases = Vec::new();
        for _ in 0..3 {
            let ids = Arc::clone(&ids);
            leases.push(
                pool.run_on_dedicated_thread(move || {
                    ids.lock().unwrap().push(thread::current().id());
                    Ok(())
                })
                .await
                .unwrap(),
            );
        }

        let ids = ids.lock().unwrap().clone();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(pool.keep_alive_count(), 3);

        leases.pop();
        assert_eq!(pool.keep_alive_count(), 2);
        assert!(pool.has_live_worker());

        leases.clear();
        assert_eq!(pool.keep_alive_count(), 0);
    }

    #[tokio::test]
    async fn restarts_after_last_release() {
        let pool = DedicatedThreadPool::new();

        let first = pool.run_on_dedicated_thread(|| Ok(())).await.unwrap();
        first.release();
        assert!(!pool.has_live_worker());

        let second = pool.run_on_dedicated_thread(|| Ok(())).await.unwrap();
        assert!(pool.has_live_worker());
        assert_eq!(pool.keep_alive_count(), 1);
        drop(second);
    }

    #[tokio::test]
    async fn failed_action_releases_the_claim() {
        let pool = DedicatedThreadPool::new();

        let err = pool
            .run_on_dedicated_thread(|| Err(RegistryError::Platform { code: 5 }))
            .await
            .unwrap_err();

        assert_eq!(err, RegistryError::Platform { code: 5 });
        assert_eq!(pool.keep_alive_count(), 0);
        assert!(!pool.has_live_worker());
    }

    #[tokio::test]
    async fn panicking_action_is_reported() {
        let pool = DedicatedThreadPool::new();

        let err = pool
            .run_on_dedicated_thread(|| panic!("boom"))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::DedicatedThread { ref details } if details == "boom"));
        assert_eq!(pool.keep_alive_count(), 0);

        // the worker survives a panicking action
        let lease = pool.run_on_dedicated_thread(|| Ok(())).await.unwrap();
        drop(lease);
    }

    #[tokio::test]
    async fn abandoned_request_releases_the_claim() {
        let pool = DedicatedThreadPool::new();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let blocked = pool.run_on_dedicated_thread(move || {
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
            Ok(())
        });
        let outcome = tokio::time::timeout(Duration::from_millis(50), blocked).await;
        assert!(outcome.is_err());

        assert_eq!(pool.keep_alive_count(), 0);
        release_tx.send(()).unwrap();
    }

    #[tokio::test]
    async fn retired_worker_does_not_drain_new_generation_queue() {
        let pool = DedicatedThreadPool::new();
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let blocked = pool.run_on_dedicated_thread(move || {
            started_tx.send(thread::current().id()).unwrap();
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
            Ok(())
        });
        let outcome = tokio::time::timeout(Duration::from_millis(50), blocked).await;
        assert!(outcome.is_err());
        let retired = started_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(pool.keep_alive_count(), 0);

        let ids = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&ids);
        let lease = pool
            .run_on_dedicated_thread(move || {
                record.lock().unwrap().push(thread::current().id());
                Ok(())
            })
            .await
            .unwrap();

        release_tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let record = Arc::clone(&ids);
        let second = pool
            .run_on_dedicated_thread(move || {
                record.lock().unwrap().push(thread::current().id());
                Ok(())
            })
            .await
            .unwrap();
        drop(second);

        let ids = ids.lock().unwrap().clone();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| *id != retired));
        assert_eq!(ids[0], ids[1]);
        assert_eq!(pool.keep_alive_count(), 1);
        assert!(pool.has_live_worker());

        drop(lease);
        assert_eq!(pool.keep_alive_count(), 0);
    }

    #[test]
    fn shared_pool_is_a_singleton() {
        assert!(std::ptr::eq(
            DedicatedThreadPool::shared(),
            DedicatedThreadPool::shared()
        ));
    }
}

mod notifier {
    use super::*;

    #[test]
    fn selection_follows_backend_capability() {
        let pool = DedicatedThreadPool::new();

        let modern = select_notifier(&MemoryRegistry::new(), &pool);
        assert!(modern.is_thread_agnostic());

        let downlevel = select_notifier(&MemoryRegistry::downlevel(), &pool);
        assert!(!downlevel.is_thread_agnostic());
    }

    #[tokio::test]
    async fn thread_agnostic_subscription_fires_on_change() {
        let registry = MemoryRegistry::new();
        let root = open_root(&registry);

        let subscription = ThreadAgnosticNotifier
            .subscribe(Arc::clone(&root), true, NotifyFilter::RELOAD)
            .await
            .unwrap();
        assert!(!subscription.holds_dedicated_thread());
        assert!(!subscription.is_signaled());

        registry.set_value(Hive::CurrentUser, ROOT, "A", "1");

        let fired = subscription
            .changed(Some(Duration::from_secs(1)), None)
            .await
            .unwrap();
        assert!(fired);
    }

    #[tokio::test]
    async fn dedicated_subscription_survives_on_downlevel_store() {
        let registry = MemoryRegistry::downlevel();
        let root = open_root(&registry);
        let notifier = DedicatedThreadNotifier::new(DedicatedThreadPool::new());

        let subscription = notifier
            .subscribe(Arc::clone(&root), true, NotifyFilter::RELOAD)
            .await
            .unwrap();
        assert!(subscription.holds_dedicated_thread());
        assert_eq!(notifier.pool().keep_alive_count(), 1);

        registry.set_value(Hive::CurrentUser, &format!(r"{ROOT}\Child"), "A", "1");

        let fired = subscription
            .changed(Some(Duration::from_secs(1)), None)
            .await
            .unwrap();
        assert!(fired);

        drop(subscription);
        assert_eq!(notifier.pool().keep_alive_count(), 0);
    }

    #[tokio::test]
    async fn thread_agnostic_request_fails_on_downlevel_store() {
        let registry = MemoryRegistry::downlevel();
        let root = open_root(&registry);

        let err = ThreadAgnosticNotifier
            .subscribe(root, true, NotifyFilter::RELOAD)
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::Platform { .. }));
    }

    #[tokio::test]
    async fn rejected_request_releases_the_dedicated_thread() {
        let registry = MemoryRegistry::downlevel();
        let root = open_root(&registry);
        let notifier = DedicatedThreadNotifier::new(DedicatedThreadPool::new());

        registry.fail_next_notification(1018);
        let err = notifier
            .subscribe(root, true, NotifyFilter::RELOAD)
            .await
            .unwrap_err();

        assert_eq!(err, RegistryError::Platform { code: 1018 });
        assert_eq!(notifier.pool().keep_alive_count(), 0);
    }
}
