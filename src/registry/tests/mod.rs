//! Unit tests for the registry module.
//! In-memory only; the directory backend is covered by integration tests.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use std::{thread, time::Duration};

use crate::core::RegistryError;
use crate::registry::{
    Hive, MemoryRegistry, NotifyFilter, RegistryBackend, STATUS_INVALID_PARAMETER, STATUS_SUCCESS,
};
use crate::signal::ManualResetEvent;

const ROOT: &str = r"SOFTWARE\Contoso\App";

mod hive {
    use super::*;

    #[test]
    fn parses_long_short_and_snake_names() {
        assert_eq!("HKEY_CURRENT_USER".parse::<Hive>().unwrap(), Hive::CurrentUser);
        assert_eq!("hkcu".parse::<Hive>().unwrap(), Hive::CurrentUser);
        assert_eq!("local_machine".parse::<Hive>().unwrap(), Hive::LocalMachine);
        assert_eq!("LocalMachine".parse::<Hive>().unwrap(), Hive::LocalMachine);
        assert_eq!(" HKCR ".parse::<Hive>().unwrap(), Hive::ClassesRoot);
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "HKEY_NOWHERE".parse::<Hive>().unwrap_err();
        assert!(matches!(err, RegistryError::UnknownHive(name) if name == "HKEY_NOWHERE"));
    }

    #[test]
    fn only_two_hives_are_supported() {
        let supported: Vec<Hive> = Hive::ALL.into_iter().filter(|h| h.is_supported()).collect();
        assert_eq!(supported, vec![Hive::CurrentUser, Hive::LocalMachine]);

        for hive in [Hive::ClassesRoot, Hive::Users, Hive::PerformanceData, Hive::CurrentConfig] {
            assert_eq!(hive.ensure_supported(), Err(RegistryError::UnsupportedHive(hive)));
        }
    }

    #[test]
    fn defaults_to_local_machine() {
        assert_eq!(Hive::default(), Hive::LocalMachine);
        assert_eq!(Hive::LocalMachine.to_string(), "HKEY_LOCAL_MACHINE");
    }
}

mod filter {
    use super::*;

    #[test]
    fn reload_filter_watches_values_and_subkeys() {
        let filter = NotifyFilter::RELOAD;
        assert!(filter.contains(NotifyFilter::VALUE));
        assert!(filter.contains(NotifyFilter::SUBKEY));
        assert!(!filter.is_thread_agnostic());
    }

    #[test]
    fn change_kinds_strip_threading_modifier() {
        let filter = NotifyFilter::VALUE | NotifyFilter::THREAD_AGNOSTIC;
        assert!(filter.is_thread_agnostic());
        assert_eq!(filter.change_kinds(), NotifyFilter::VALUE);
    }
}

mod memory_backend {
    use super::*;

    #[test]
    fn missing_root_opens_as_none() {
        let registry = MemoryRegistry::new();
        let key = registry.open_root(Hive::CurrentUser, ROOT, false).unwrap();
        assert!(key.is_none());
    }

    #[test]
    fn enumerates_values_and_subkeys_case_insensitively() {
        let registry = MemoryRegistry::new();
        registry.set_value(Hive::CurrentUser, ROOT, "Name", "app");
        registry.set_value(Hive::CurrentUser, &format!(r"{ROOT}\Db"), "", "primary");

        let root = registry
            .open_root(Hive::CurrentUser, r"software\contoso\APP", false)
            .unwrap()
            .unwrap();

        assert_eq!(root.value_names().unwrap(), vec!["Name".to_string()]);
        assert_eq!(root.value("NAME").unwrap().as_deref(), Some("app"));
        assert_eq!(root.subkey_names().unwrap(), vec!["Db".to_string()]);

        let db = root.open_subkey("db", false).unwrap().unwrap();
        assert_eq!(db.name(), r"software\contoso\APP\Db");
        assert_eq!(db.value_names().unwrap(), vec![String::new()]);
        assert_eq!(db.value("").unwrap().as_deref(), Some("primary"));
    }

    #[test]
    fn hives_are_isolated() {
        let registry = MemoryRegistry::new();
        registry.set_value(Hive::LocalMachine, ROOT, "A", "1");

        assert!(registry.open_root(Hive::CurrentUser, ROOT, false).unwrap().is_none());
        assert!(registry.open_root(Hive::LocalMachine, ROOT, false).unwrap().is_some());
    }

    #[test]
    fn null_values_are_present_without_data() {
        let registry = MemoryRegistry::new();
        registry.set_null_value(Hive::CurrentUser, ROOT, "Empty");

        let root = registry.open_root(Hive::CurrentUser, ROOT, false).unwrap().unwrap();
        assert_eq!(root.value_names().unwrap(), vec!["Empty".to_string()]);
        assert_eq!(root.value("Empty").unwrap(), None);
    }

    #[test]
    fn denied_key_fails_reads() {
        let registry = MemoryRegistry::new();
        registry.set_value(Hive::CurrentUser, ROOT, "A", "1");
        let root = registry.open_root(Hive::CurrentUser, ROOT, false).unwrap().unwrap();

        registry.deny_access(Hive::CurrentUser, ROOT);
        assert!(matches!(root.value_names(), Err(RegistryError::Access { .. })));

        registry.allow_access(Hive::CurrentUser, ROOT);
        assert!(root.value_names().is_ok());
    }

    #[test]
    fn deleted_key_fails_reads_on_open_handles() {
        let registry = MemoryRegistry::new();
        registry.set_value(Hive::CurrentUser, &format!(r"{ROOT}\Child"), "A", "1");
        let root = registry.open_root(Hive::CurrentUser, ROOT, false).unwrap().unwrap();
        let child = root.open_subkey("Child", false).unwrap().unwrap();

        assert!(registry.delete_key(Hive::CurrentUser, &format!(r"{ROOT}\Child")));
        assert!(child.value_names().is_err());
        assert!(root.subkey_names().unwrap().is_empty());
    }
}

mod notifications {
    use super::*;

    #[test]
    fn fires_once_for_changes_after_arming() {
        let registry = MemoryRegistry::new();
        registry.set_value(Hive::CurrentUser, ROOT, "A", "1");
        let root = registry.open_root(Hive::CurrentUser, ROOT, false).unwrap().unwrap();

        let event = ManualResetEvent::new();
        let status = root.notify_change_key_value(
            true,
            NotifyFilter::RELOAD | NotifyFilter::THREAD_AGNOSTIC,
            &event,
        );
        assert_eq!(status, STATUS_SUCCESS);
        assert!(!event.is_set());
        assert_eq!(registry.pending_notifications(), 1);

        registry.set_value(Hive::CurrentUser, ROOT, "A", "2");
        assert!(event.is_set());
        assert_eq!(registry.pending_notifications(), 0);
    }

    #[test]
    fn subtree_flag_controls_reach() {
        let registry = MemoryRegistry::new();
        let child = format!(r"{ROOT}\Child");
        registry.set_value(Hive::CurrentUser, &child, "A", "1");
        let root = registry.open_root(Hive::CurrentUser, ROOT, false).unwrap().unwrap();

        let shallow = ManualResetEvent::new();
        let deep = ManualResetEvent::new();
        let agnostic = NotifyFilter::VALUE | NotifyFilter::THREAD_AGNOSTIC;
        root.notify_change_key_value(false, agnostic, &shallow);
        root.notify_change_key_value(true, agnostic, &deep);

        registry.set_value(Hive::CurrentUser, &child, "A", "2");

        assert!(!shallow.is_set());
        assert!(deep.is_set());
    }

    #[test]
    fn filter_mask_is_honoured() {
        let registry = MemoryRegistry::new();
        registry.create_key(Hive::CurrentUser, ROOT);
        let root = registry.open_root(Hive::CurrentUser, ROOT, false).unwrap().unwrap();

        let event = ManualResetEvent::new();
        root.notify_change_key_value(
            true,
            NotifyFilter::SUBKEY | NotifyFilter::THREAD_AGNOSTIC,
            &event,
        );

        registry.set_value(Hive::CurrentUser, ROOT, "A", "1");
        assert!(!event.is_set());

        registry.create_key(Hive::CurrentUser, &format!(r"{ROOT}\New"));
        assert!(event.is_set());
    }

    #[test]
    fn closing_the_handle_drops_its_notifications() {
        let registry = MemoryRegistry::new();
        registry.create_key(Hive::CurrentUser, ROOT);
        let root = registry.open_root(Hive::CurrentUser, ROOT, false).unwrap().unwrap();

        let event = ManualResetEvent::new();
        root.notify_change_key_value(true, NotifyFilter::RELOAD, &event);
        assert_eq!(registry.pending_notifications(), 1);

        drop(root);
        assert_eq!(registry.pending_notifications(), 0);
    }

    #[test]
    fn injected_failure_is_reported_once() {
        let registry = MemoryRegistry::new();
        registry.create_key(Hive::CurrentUser, ROOT);
        let root = registry.open_root(Hive::CurrentUser, ROOT, false).unwrap().unwrap();
        let event = ManualResetEvent::new();

        registry.fail_next_notification(5);
        assert_eq!(root.notify_change_key_value(true, NotifyFilter::RELOAD, &event), 5);
        assert_eq!(
            root.notify_change_key_value(true, NotifyFilter::RELOAD, &event),
            STATUS_SUCCESS
        );
        assert_eq!(registry.notification_requests(), 2);
    }

    #[test]
    fn downlevel_rejects_thread_agnostic_requests() {
        let registry = MemoryRegistry::downlevel();
        registry.create_key(Hive::CurrentUser, ROOT);
        let root = registry.open_root(Hive::CurrentUser, ROOT, false).unwrap().unwrap();

        assert!(!registry.supports_thread_agnostic_notify());
        let status = root.notify_change_key_value(
            true,
            NotifyFilter::RELOAD | NotifyFilter::THREAD_AGNOSTIC,
            &ManualResetEvent::new(),
        );
        assert_eq!(status, STATUS_INVALID_PARAMETER);
    }

    #[test]
    fn thread_bound_notification_dies_with_its_thread() {
        let registry = MemoryRegistry::downlevel();
        registry.create_key(Hive::CurrentUser, ROOT);
        let root = registry.open_root(Hive::CurrentUser, ROOT, false).unwrap().unwrap();
        let event = ManualResetEvent::new();
        let armed = event.clone();

        let root = thread::spawn(move || {
            let status = root.notify_change_key_value(true, NotifyFilter::RELOAD, &armed);
            assert_eq!(status, STATUS_SUCCESS);
            root
        })
        .join()
        .unwrap();

        registry.set_value(Hive::CurrentUser, ROOT, "A", "1");

        assert!(!event.wait_timeout(Duration::from_millis(20)));
        assert_eq!(registry.pending_notifications(), 0);
        drop(root);
    }
}
