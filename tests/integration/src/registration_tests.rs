//! Registration Tests
//!
//! Registration facts against an in-memory registry:
//! - register followed by unregister leaves the store unchanged
//! - re-registration replaces stale facts
//! - "already absent" is tolerated, other failures are not
//! - diagnostic sub-key management

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::*;
use comserver::diagnostics::LoggingConfig;
use comserver::registry::{
    logging_key, ClassContext, MemoryRegistry, RegistryRoot, RegistryStore, RegistryValue, StoreError,
    IMPLEMENTATION_CLASS, IMPLEMENTATION_PATH,
};
use comserver::{
    ClassDescriptor, Clsid, ComError, ComServer, Guid, ProcessImage, Registrar, RegistrationScope,
    ThreadingModel,
};

fn images() -> Vec<ProcessImage> {
    vec![
        ProcessImage::Hosted {
            launcher: PathBuf::from("/opt/Host Tools/host"),
            launcher_args: vec!["-u".to_string()],
            entry: PathBuf::from("/srv/calc/server.bin"),
            host_module: PathBuf::from("/opt/Host Tools/libhost.so"),
        },
        ProcessImage::Executable {
            path: PathBuf::from("/srv/calc/calc"),
        },
        ProcessImage::Module {
            path: PathBuf::from("/srv/calc/libcalc.so"),
        },
    ]
}

fn descriptors() -> Vec<ClassDescriptor> {
    vec![
        calculator_descriptor(),
        calculator_descriptor().with_typelib(Guid::from_u128(0x7171), 2, 5),
        ClassDescriptor::of::<Calculator>(Clsid::from_u128(0x4242), "tests::Bare"),
        ClassDescriptor::of::<Calculator>(Clsid::from_u128(0x4343), "tests::InprocOnly")
            .with_progid("Tests.InprocOnly.1")
            .with_contexts(ClassContext::INPROC_SERVER)
            .with_threading(ThreadingModel::Single),
    ]
}

/// Test: register then unregister restores the exact key set
#[test]
fn test_register_unregister_round_trip() {
    init_logging();

    for scope in [RegistrationScope::Machine, RegistrationScope::PerUser] {
        for image in images() {
            for descriptor in descriptors() {
                let store = seeded_registry();
                // unrelated content that must survive
                store.create_key(RegistryRoot::ClassesRoot, r"Other.App\CLSID").expect("seed");
                let before = store.snapshot();

                let registrar = Registrar::new(store.clone(), image.clone()).with_scope(scope);
                registrar.register(&descriptor).expect("register");
                assert_ne!(store.snapshot(), before, "{:?} wrote nothing", descriptor);
                registrar.unregister(&descriptor, false).expect("unregister");
                assert_eq!(
                    store.snapshot(),
                    before,
                    "orphaned keys for {:?} in {:?} from {:?}",
                    descriptor,
                    scope,
                    image
                );
            }
        }
    }
}

/// Test: every fact is readable after registration
#[test]
fn test_register_writes_readable_facts() {
    init_logging();

    let store = seeded_registry();
    let image = images().remove(0);
    let registrar = Registrar::new(store.clone(), image);
    let descriptor = calculator_descriptor();
    registrar.register(&descriptor).expect("register");

    let class_key = format!(r"CLSID\{}", CALCULATOR_CLSID);
    let read = |path: &str, name: &str| {
        store
            .get_value(RegistryRoot::ClassesRoot, path, name)
            .expect("value")
            .as_str()
            .map(str::to_string)
            .expect("string value")
    };

    assert_eq!(read(&class_key, ""), "Tests Calculator");
    assert_eq!(read(r"Tests.Calculator\CurVer", ""), "Tests.Calculator.1");
    assert_eq!(read(r"Tests.Calculator.1\CLSID", ""), CALCULATOR_CLSID.to_string());
    assert_eq!(
        read(&format!(r"{}\LocalServer32", class_key), ""),
        r#""/opt/Host Tools/host" -u /srv/calc/server.bin"#
    );
    let inproc = format!(r"{}\InprocServer32", class_key);
    assert_eq!(read(&inproc, ""), "/opt/Host Tools/libhost.so");
    assert_eq!(read(&inproc, IMPLEMENTATION_CLASS), "tests::Calculator");
    assert_eq!(read(&inproc, IMPLEMENTATION_PATH), "/srv/calc");
    assert_eq!(read(&inproc, "ThreadingModel"), "Both");
}

/// Test: registering again drops facts the class no longer has
#[test]
fn test_reregister_replaces_stale_facts() {
    init_logging();

    let store = seeded_registry();
    let registrar = Registrar::new(store.clone(), images().remove(0));
    registrar
        .register(&calculator_descriptor().with_typelib(Guid::from_u128(1), 1, 0))
        .expect("register");
    let typelib_key = format!(r"CLSID\{}\TypeLib", CALCULATOR_CLSID);
    assert!(store.contains_key(RegistryRoot::ClassesRoot, &typelib_key));

    registrar.register(&calculator_descriptor()).expect("re-register");
    assert!(!store.contains_key(RegistryRoot::ClassesRoot, &typelib_key));
    let before = {
        let fresh = seeded_registry();
        Registrar::new(fresh.clone(), images().remove(0))
            .register(&calculator_descriptor())
            .expect("register");
        fresh.snapshot()
    };
    assert_eq!(store.snapshot(), before);
}

/// Test: unregistering twice is fine
#[test]
fn test_unregister_is_idempotent() {
    init_logging();

    let store = seeded_registry();
    let before = store.snapshot();
    let registrar = Registrar::new(store.clone(), images().remove(1));
    registrar.register(&calculator_descriptor()).expect("register");
    registrar.unregister(&calculator_descriptor(), false).expect("first");
    registrar.unregister(&calculator_descriptor(), false).expect("second");
    assert_eq!(store.snapshot(), before);
}

/// Store that refuses every deletion
struct ReadOnlyStore(Arc<MemoryRegistry>);

impl RegistryStore for ReadOnlyStore {
    fn create_key(&self, root: RegistryRoot, path: &str) -> Result<(), StoreError> {
        self.0.create_key(root, path)
    }

    fn set_value(&self, root: RegistryRoot, path: &str, name: &str, value: &RegistryValue) -> Result<(), StoreError> {
        self.0.set_value(root, path, name, value)
    }

    fn get_value(&self, root: RegistryRoot, path: &str, name: &str) -> Result<RegistryValue, StoreError> {
        self.0.get_value(root, path, name)
    }

    fn delete_value(&self, root: RegistryRoot, path: &str, _: &str) -> Result<(), StoreError> {
        Err(StoreError::AccessDenied(format!("{}\\{}", root, path)))
    }

    fn delete_key(&self, root: RegistryRoot, path: &str, _: bool) -> Result<(), StoreError> {
        if self.0.contains_key(root, path) {
            Err(StoreError::AccessDenied(format!("{}\\{}", root, path)))
        } else {
            Err(StoreError::NotFound(format!("{}\\{}", root, path)))
        }
    }
}

/// Test: access-denied is re-raised unchanged, absence is tolerated
#[test]
fn test_access_denied_is_not_tolerated() {
    init_logging();

    let inner = seeded_registry();
    let registrar = Registrar::new(Arc::new(ReadOnlyStore(inner.clone())), images().remove(1));

    // nothing registered yet: every delete reports absence, so this succeeds
    registrar.register(&calculator_descriptor()).expect("first register");

    let err = registrar.register(&calculator_descriptor()).unwrap_err();
    assert!(matches!(err, ComError::Registry(StoreError::AccessDenied(_))));
    let err = registrar.unregister(&calculator_descriptor(), false).unwrap_err();
    assert!(matches!(err, ComError::Registry(StoreError::AccessDenied(_))));
}

/// Test: diagnostics sub-key written, read back by the logging loader, cleared
#[test]
fn test_diagnostics_sub_key() {
    init_logging();

    let store = seeded_registry();
    let registrar = Registrar::new(store.clone(), images().remove(2));
    let descriptor = calculator_descriptor();
    let before = store.snapshot();
    registrar.register(&descriptor).expect("register");

    let levels = vec!["comserver=DEBUG".to_string(), "tests=WARNING".to_string()];
    registrar
        .configure_diagnostics(&CALCULATOR_CLSID, &levels, Some("compact"))
        .expect("configure");
    let config = LoggingConfig::load(store.as_ref(), RegistrationScope::Machine, &CALCULATOR_CLSID)
        .expect("load")
        .expect("present");
    assert_eq!(config.directives(), "comserver=debug,tests=warn");

    registrar.clear_diagnostics(&CALCULATOR_CLSID).expect("clear");
    assert!(!store.contains_key(RegistryRoot::ClassesRoot, &logging_key(&CALCULATOR_CLSID)));
    registrar.clear_diagnostics(&CALCULATOR_CLSID).expect("clear again");
    registrar.unregister(&descriptor, false).expect("unregister");
    assert_eq!(store.snapshot(), before);
}

/// Test: a forced unregister also removes foreign subkeys
#[test]
fn test_forced_unregister_removes_subtree() {
    init_logging();

    let store = seeded_registry();
    let before = store.snapshot();
    let registrar = Registrar::new(store.clone(), images().remove(0));
    registrar.register(&calculator_descriptor()).expect("register");
    registrar
        .configure_diagnostics(&CALCULATOR_CLSID, &["x=INFO".to_string()], None)
        .expect("configure");

    assert!(registrar.unregister(&calculator_descriptor(), false).is_err());
    registrar.unregister(&calculator_descriptor(), true).expect("forced");
    assert_eq!(store.snapshot(), before);
}

/// Test: an in-process host resolves a class through its persisted facts
#[test]
fn test_server_resolves_registered_alias() {
    init_logging();

    let store = seeded_registry();
    let alias = Clsid::from_u128(0x5a5a);
    let aliased = ClassDescriptor::of::<Calculator>(alias, "tests::Calculator")
        .with_contexts(ClassContext::INPROC_SERVER);
    Registrar::new(store.clone(), images().remove(0))
        .register(&aliased)
        .expect("register");

    let server = ComServer::builder()
        .class(calculator_descriptor())
        .store(store)
        .build();
    let calc = server.activate(&alias, &ICALCULATOR).expect("resolved through store");
    assert_eq!(calc.downcast::<Calculator>().expect("calculator").add(2), 2);
}
