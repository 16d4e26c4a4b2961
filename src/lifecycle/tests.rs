//! Unit tests for the lifecycle manager
//!
//! # Test Categories
//! 1. Create/destroy - happy path, unknown types, capacity
//! 2. Rollback - a fault at each create stage undoes exactly what ran
//! 3. Teardown - type unregistration under both scopes, shutdown, drop
//! 4. Invariant - reserved ids always equal registered instance ids

use super::*;
use crate::config::DuplicatePolicy;
use crate::device::{DeviceContext, DeviceOps};
use crate::error::CollaboratorError;
use crate::host::memory::{InputFault, MemoryInput, NodeTable};
use crate::host::EventKind;
use crate::providers::Echo;
use crate::registry::CAPACITY;
use proptest::prelude::*;
use rstest::rstest;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

struct Fixture {
    input: Arc<MemoryInput>,
    nodes: Arc<NodeTable>,
    vinput: VInput,
}

fn fixture_with(options: Options) -> Fixture {
    let input = Arc::new(MemoryInput::new());
    let nodes = Arc::new(NodeTable::new());
    let host = Host::new(input.clone(), nodes.clone());
    Fixture {
        input,
        nodes,
        vinput: VInput::with_options(host, options),
    }
}

fn fixture() -> Fixture {
    fixture_with(Options::default())
}

impl Fixture {
    fn with_echo(self) -> Self {
        self.vinput
            .register_type(DeviceType::new("echo", Echo))
            .unwrap();
        self
    }

    /// Nothing of any instance is left behind.
    fn assert_empty(&self) {
        let snap = self.vinput.snapshot();
        assert!(snap.devices.is_empty(), "instances left: {:?}", snap.devices);
        assert!(snap.reserved.is_empty(), "ids left: {:?}", snap.reserved);
        assert!(self.nodes.is_empty());
        assert_eq!(self.input.handle_count(), 0);
    }

    fn assert_consistent(&self) {
        let snap = self.vinput.snapshot();
        assert_eq!(snap.reserved, snap.device_ids());
        assert_eq!(snap.reserved, snap.live_ids());
        assert_eq!(self.nodes.len(), snap.reserved.len());
        assert_eq!(self.input.handle_count(), snap.reserved.len());
        assert_eq!(self.input.published().len(), snap.reserved.len());
    }
}

/// Provider whose `init` fails after touching its state and metadata.
struct FailingInit {
    inits: Arc<AtomicUsize>,
}

impl DeviceOps for FailingInit {
    fn init(&self, dev: &mut DeviceContext<'_>) -> std::result::Result<(), CollaboratorError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        dev.metadata().enable(EventKind::Rel);
        dev.set_state(vec![0u8; 16]);
        Err(CollaboratorError::failed("no such keymap"))
    }

    fn send(
        &self,
        _dev: &mut DeviceContext<'_>,
        payload: &[u8],
    ) -> std::result::Result<usize, CollaboratorError> {
        Ok(payload.len())
    }

    fn read(
        &self,
        _dev: &mut DeviceContext<'_>,
        _buf: &mut [u8],
    ) -> std::result::Result<usize, CollaboratorError> {
        Ok(0)
    }
}

/// Provider whose `init` announces itself and then waits to be released.
struct GatedInit {
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl DeviceOps for GatedInit {
    fn init(&self, _dev: &mut DeviceContext<'_>) -> std::result::Result<(), CollaboratorError> {
        self.entered.wait();
        self.release.wait();
        Ok(())
    }

    fn send(
        &self,
        _dev: &mut DeviceContext<'_>,
        payload: &[u8],
    ) -> std::result::Result<usize, CollaboratorError> {
        Ok(payload.len())
    }

    fn read(
        &self,
        _dev: &mut DeviceContext<'_>,
        _buf: &mut [u8],
    ) -> std::result::Result<usize, CollaboratorError> {
        Ok(0)
    }
}

fn id(raw: usize) -> DeviceId {
    DeviceId::new(raw).unwrap()
}

// ============================================================================
// Create / destroy
// ============================================================================

#[test]
fn test_create_publishes_everything() {
    let fx = fixture().with_echo();
    let created = fx.vinput.create("echo").unwrap();
    assert_eq!(created, id(0));

    assert_eq!(fx.nodes.names(), vec!["vinput0"]);
    let published = fx.input.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].name, "vinput-echo");
    assert_eq!(published[0].phys, "vinput0/input0");
    assert_eq!(fx.vinput.snapshot().live_ids(), vec![created]);
    fx.assert_consistent();
}

#[test]
fn test_create_uses_prefix_match() {
    let fx = fixture().with_echo();
    let created = fx.vinput.create("echo trailing args\n").unwrap();
    let snap = fx.vinput.snapshot();
    assert_eq!(snap.devices[0].type_name, "echo");
    assert_eq!(snap.devices[0].id, created);
}

#[test]
fn test_create_unknown_type_changes_nothing() {
    let fx = fixture().with_echo();
    fx.vinput.create("echo").unwrap();
    let before = fx.vinput.snapshot();

    let err = fx.vinput.create("mouse").unwrap_err();
    assert_eq!(err, VInputError::UnknownType("mouse".to_string()));
    assert!(err.is_not_found());
    assert_eq!(fx.vinput.snapshot(), before);
    fx.assert_consistent();
}

#[test]
fn test_destroy_releases_everything() {
    let fx = fixture().with_echo();
    let created = fx.vinput.create("echo").unwrap();
    fx.vinput.destroy(created).unwrap();
    fx.assert_empty();

    assert_eq!(fx.vinput.destroy(created), Err(VInputError::NoDevice(0)));
}

#[test]
fn test_capacity_boundary_reuses_freed_id() {
    let fx = fixture().with_echo();
    for expected in 0..CAPACITY {
        assert_eq!(fx.vinput.create("echo").unwrap(), id(expected));
    }
    assert_eq!(
        fx.vinput.create("echo"),
        Err(VInputError::Exhausted { capacity: CAPACITY })
    );
    fx.assert_consistent();

    fx.vinput.destroy(id(13)).unwrap();
    assert_eq!(fx.vinput.create("echo").unwrap(), id(13));
    fx.assert_consistent();
}

#[test]
fn test_custom_node_prefix() {
    let options = Options {
        node_prefix: "vdev".to_string(),
        ..Options::default()
    };
    let fx = fixture_with(options).with_echo();
    fx.vinput.create("echo").unwrap();
    assert_eq!(fx.nodes.names(), vec!["vdev0"]);
    assert_eq!(fx.input.published()[0].phys, "vdev0/input0");
}

#[test]
fn test_reject_policy_refuses_overlaps() {
    let options = Options {
        duplicates: DuplicatePolicy::Reject,
        ..Options::default()
    };
    let fx = fixture_with(options).with_echo();
    assert_eq!(
        fx.vinput.register_type(DeviceType::new("echo2", Echo)),
        Err(VInputError::AlreadyRegistered("echo".to_string()))
    );
    assert_eq!(fx.vinput.snapshot().types, vec!["echo"]);
}

// ============================================================================
// Rollback
// ============================================================================

#[test]
fn test_handle_failure_rolls_back() {
    let fx = fixture().with_echo();
    fx.input.inject(InputFault::CreateHandle);
    let err = fx.vinput.create("echo").unwrap_err();
    assert_eq!(
        err,
        VInputError::Collaborator {
            stage: Stage::InputHandle,
            source: CollaboratorError::OutOfMemory,
        }
    );
    fx.assert_empty();
    assert_eq!(fx.vinput.create("echo").unwrap(), id(0));
}

#[test]
fn test_init_failure_rolls_back() {
    let fx = fixture();
    let inits = Arc::new(AtomicUsize::new(0));
    fx.vinput
        .register_type(DeviceType::new(
            "broken",
            FailingInit {
                inits: Arc::clone(&inits),
            },
        ))
        .unwrap();

    let err = fx.vinput.create("broken").unwrap_err();
    assert!(matches!(
        err,
        VInputError::Collaborator {
            stage: Stage::Init,
            ..
        }
    ));
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    fx.assert_empty();
}

#[test]
fn test_node_publish_failure_rolls_back() {
    let fx = fixture().with_echo();
    fx.nodes.fail_next_publish();
    let err = fx.vinput.create("echo").unwrap_err();
    assert_eq!(
        err,
        VInputError::Collaborator {
            stage: Stage::PublishNode,
            source: CollaboratorError::Busy,
        }
    );
    fx.assert_empty();
}

#[test]
fn test_input_publish_failure_unpublishes_node() {
    let fx = fixture().with_echo();
    let survivor = fx.vinput.create("echo").unwrap();

    fx.input.inject(InputFault::Publish);
    let err = fx.vinput.create("echo").unwrap_err();
    assert!(matches!(
        err,
        VInputError::Collaborator {
            stage: Stage::PublishInput,
            ..
        }
    ));

    // Only the failed instance is undone.
    assert_eq!(fx.nodes.names(), vec!["vinput0"]);
    assert_eq!(fx.vinput.snapshot().live_ids(), vec![survivor]);
    fx.assert_consistent();

    assert_eq!(fx.vinput.create("echo").unwrap(), id(1));
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn test_unregister_tears_down_all_types_by_default() {
    let fx = fixture().with_echo();
    let other = DeviceType::new("other", Echo);
    fx.vinput.register_type(Arc::clone(&other)).unwrap();
    fx.vinput.create("echo").unwrap();
    fx.vinput.create("other").unwrap();

    fx.vinput.unregister_type(&other);
    fx.assert_empty();
    assert_eq!(fx.vinput.snapshot().types, vec!["echo"]);
}

#[test]
fn test_unregister_owned_scope_spares_other_types() {
    let options = Options {
        teardown: TeardownScope::Owned,
        ..Options::default()
    };
    let fx = fixture_with(options).with_echo();
    let other = DeviceType::new("other", Echo);
    fx.vinput.register_type(Arc::clone(&other)).unwrap();
    let kept = fx.vinput.create("echo").unwrap();
    fx.vinput.create("other").unwrap();
    fx.vinput.create("other").unwrap();

    fx.vinput.unregister_type(&other);
    assert_eq!(fx.vinput.snapshot().live_ids(), vec![kept]);
    fx.assert_consistent();
    assert!(fx.vinput.create("other").unwrap_err().is_not_found());
}

#[test]
fn test_unregister_unknown_type_is_noop() {
    let fx = fixture().with_echo();
    fx.vinput.create("echo").unwrap();
    fx.vinput.unregister_type(&DeviceType::new("echo", Echo));
    assert_eq!(fx.vinput.snapshot().live_ids(), vec![id(0)]);
}

#[test]
fn test_shutdown_keeps_types() {
    let fx = fixture().with_echo();
    for _ in 0..4 {
        fx.vinput.create("echo").unwrap();
    }
    fx.vinput.shutdown();
    fx.assert_empty();
    assert_eq!(fx.vinput.snapshot().types, vec!["echo"]);
}

#[test]
fn test_drop_releases_host_resources() {
    let fx = fixture().with_echo();
    fx.vinput.create("echo").unwrap();
    fx.vinput.create("echo").unwrap();
    let Fixture { input, nodes, vinput } = fx;
    drop(vinput);
    assert!(nodes.is_empty());
    assert_eq!(input.handle_count(), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_creates_get_distinct_ids() {
    let fx = Arc::new(fixture().with_echo());
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let fx = Arc::clone(&fx);
            thread::spawn(move || {
                let mut got = Vec::new();
                while let Ok(id) = fx.vinput.create("echo") {
                    got.push(id);
                }
                got
            })
        })
        .collect();

    let mut all: Vec<DeviceId> = workers
        .into_iter()
        .flat_map(|w| w.join().unwrap())
        .collect();
    all.sort();
    let expected: Vec<DeviceId> = (0..CAPACITY).map(id).collect();
    assert_eq!(all, expected);
    fx.assert_consistent();
}

#[test]
fn test_destroy_races_with_writes() {
    let fx = Arc::new(fixture().with_echo());
    let target = fx.vinput.create("echo").unwrap();
    let file = fx.vinput.open(target).unwrap();
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut ok = 0usize;
            loop {
                match file.write(b"payload") {
                    Ok(n) => {
                        assert_eq!(n, 7);
                        ok += 1;
                    }
                    Err(e) => {
                        assert_eq!(e, VInputError::NoDevice(0));
                        return ok;
                    }
                }
                if stop.load(Ordering::SeqCst) {
                    return ok;
                }
            }
        })
    };

    thread::sleep(std::time::Duration::from_millis(5));
    fx.vinput.destroy(target).unwrap();
    stop.store(true, Ordering::SeqCst);
    writer.join().unwrap();
    fx.assert_empty();
}

#[test]
fn test_racing_destroys_succeed_once() {
    let fx = Arc::new(fixture().with_echo());
    let target = fx.vinput.create("echo").unwrap();
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let fx = Arc::clone(&fx);
            thread::spawn(move || fx.vinput.destroy(target).is_ok())
        })
        .collect();
    let successes = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);
    fx.assert_empty();
}

#[rstest]
#[case(TeardownScope::All)]
#[case(TeardownScope::Owned)]
fn test_unregister_during_create_leaves_nothing_live(#[case] teardown: TeardownScope) {
    let fx = Arc::new(fixture_with(Options {
        teardown,
        ..Options::default()
    }));
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let gated = DeviceType::new(
        "gated",
        GatedInit {
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        },
    );
    fx.vinput.register_type(Arc::clone(&gated)).unwrap();

    let creator = {
        let fx = Arc::clone(&fx);
        thread::spawn(move || fx.vinput.create("gated"))
    };
    entered.wait();

    // Let init finish only once the type is gone from the registry.
    let releaser = {
        let fx = Arc::clone(&fx);
        thread::spawn(move || {
            while !fx.vinput.snapshot().types.is_empty() {
                thread::yield_now();
            }
            release.wait();
        })
    };

    fx.vinput.unregister_type(&gated);
    releaser.join().unwrap();
    let created = creator.join().unwrap();

    assert_eq!(created, Err(VInputError::UnknownType("gated".to_string())));
    assert!(fx.vinput.snapshot().types.is_empty());
    fx.assert_empty();
}

#[test]
fn test_unregister_after_create_finishes_tears_it_down() {
    let fx = fixture();
    let entered = Arc::new(Barrier::new(1));
    let release = Arc::new(Barrier::new(1));
    let gated = DeviceType::new("gated", GatedInit { entered, release });
    fx.vinput.register_type(Arc::clone(&gated)).unwrap();

    fx.vinput.create("gated").unwrap();
    fx.vinput.unregister_type(&gated);
    fx.assert_empty();
}

// ============================================================================
// Invariant
// ============================================================================

proptest! {
    #[test]
    fn prop_reserved_ids_track_live_instances(
        ops in proptest::collection::vec((any::<bool>(), 0usize..40), 0..120)
    ) {
        let fx = fixture().with_echo();
        for (create, raw) in ops {
            if create {
                let _ = fx.vinput.create("echo");
            } else if let Some(target) = DeviceId::new(raw) {
                let _ = fx.vinput.destroy(target);
            }
            let snap = fx.vinput.snapshot();
            prop_assert_eq!(&snap.reserved, &snap.device_ids());
            prop_assert_eq!(&snap.reserved, &snap.live_ids());
            prop_assert_eq!(fx.nodes.len(), snap.reserved.len());
            prop_assert_eq!(fx.input.handle_count(), snap.reserved.len());
        }
    }
}
