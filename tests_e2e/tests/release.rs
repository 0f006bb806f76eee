//! Release and Fault Tests
//!
//! Every handle can be released twice without harm, and failures halfway
//! through setup leave nothing behind in the kernel.

use core_types::NameScope;
use event_bridge::{BridgeEvent, EventBridge, EventError};
use ipc::SigVal;
use kernel_api::{Duration, KernelError};
use messaging::{Connector, Release, Server, TransportConfig, TransportError};
use resmgr::{ResmgrError, ResourceClient, ResourceManager, IOFLAG_READ};
use sim_kernel::fault_injection::{FaultPlan, MessageFault, ResourceFault};
use sim_kernel::test_utils::with_fault_plan;
use sim_kernel::SimulatedKernel;
use std::sync::Arc;
use tests_e2e::boot;

fn assert_kernel_empty(kernel: &SimulatedKernel) {
    assert_eq!(kernel.channel_count(), 0, "channels left behind");
    assert_eq!(kernel.connection_count(), 0, "connections left behind");
    assert_eq!(kernel.path_count(), 0, "paths left behind");
}

/// Test: releasing twice is a no-op the second time
///
/// This validates that:
/// 1. Connector close, detach and destroy report what they released
/// 2. A second release reports nothing to release instead of failing
/// 3. Timers refuse a second delete
/// 4. The kernel holds nothing afterwards
#[test]
fn test_release_is_idempotent() {
    let kernel = boot();
    let server = Server::attach(
        Arc::clone(&kernel),
        "rel",
        NameScope::Local,
        TransportConfig::raw(),
    )
    .expect("attach failed");

    let mut named = Connector::new(Arc::clone(&kernel));
    named.open_name("rel", NameScope::Local).expect("open failed");
    assert_eq!(named.close().expect("close failed"), Release::Released);
    assert_eq!(named.close().expect("second close failed"), Release::NothingToRelease);
    assert_eq!(named.detach().expect("detach failed"), Release::NothingToRelease);

    let mut own = Connector::new(Arc::clone(&kernel));
    own.create_and_attach(Default::default()).expect("create failed");
    assert_eq!(own.detach().expect("detach failed"), Release::Released);
    assert_eq!(own.detach().expect("second detach failed"), Release::NothingToRelease);
    assert_eq!(own.destroy_channel().expect("destroy failed"), Release::Released);
    assert_eq!(own.destroy_channel().expect("second destroy failed"), Release::NothingToRelease);

    let bridge = EventBridge::new(Arc::clone(&kernel)).expect("bridge failed");
    let mut timer = bridge.timer(1, 1.0, 0.0).expect("timer failed");
    timer.delete().expect("delete failed");
    assert!(matches!(timer.delete(), Err(EventError::NotAttached)));
    bridge.close().expect("bridge close failed");

    server.shutdown().expect("shutdown failed");
    assert_kernel_empty(&kernel);
}

/// Test: a resource manager releases its path and channel on shutdown
#[test]
fn test_resource_manager_shutdown_releases_everything() {
    let kernel = boot();
    let manager: ResourceManager<SimulatedKernel, ()> =
        ResourceManager::builder(Arc::clone(&kernel), "/dev/short")
            .build()
            .expect("build failed");
    assert_eq!(kernel.path_count(), 1);
    manager.shutdown().expect("shutdown failed");
    assert_kernel_empty(&kernel);

    assert!(matches!(
        ResourceClient::open(Arc::clone(&kernel), "/dev/short", IOFLAG_READ),
        Err(ResmgrError::Transport(TransportError::Kernel(_)))
    ));
}

/// Test: setup failures leave no half-built state
///
/// This validates that:
/// 1. Without channels nothing can attach or build
/// 2. A bridge whose connection fails gives its channel back
#[test]
fn test_exhausted_resources_fail_cleanly() {
    with_fault_plan(
        FaultPlan::new().with_resource_fault(ResourceFault::ExhaustChannels),
        |kernel| {
            assert!(Server::attach(
                Arc::clone(&kernel),
                "nochan",
                NameScope::Local,
                TransportConfig::raw()
            )
            .is_err());
            let built = ResourceManager::<SimulatedKernel, ()>::builder(Arc::clone(&kernel), "/dev/nochan")
                .build();
            assert!(built.is_err());
            assert!(EventBridge::new(Arc::clone(&kernel)).is_err());
            assert_kernel_empty(&kernel);
        },
    );

    with_fault_plan(
        FaultPlan::new().with_resource_fault(ResourceFault::ExhaustConnections),
        |kernel| {
            assert!(matches!(
                EventBridge::new(Arc::clone(&kernel)),
                Err(EventError::Transport(TransportError::Kernel(
                    KernelError::ResourceExhausted(_)
                )))
            ));
            assert_kernel_empty(&kernel);
        },
    );
}

/// Test: a dropped pulse code never reaches the bridge
#[test]
fn test_dropped_pulses_are_skipped() {
    with_fault_plan(
        FaultPlan::new().with_message_fault(MessageFault::DropPulseCode { code: 3 }),
        |kernel| {
            let mut bridge = EventBridge::new(Arc::clone(&kernel)).expect("bridge failed");
            let mut timer = bridge.timer(3, 0.5, 0.5).expect("timer failed");
            kernel.advance_time(Duration::from_secs(2));

            bridge.notify(4, SigVal::Int(1)).expect("notify failed");
            assert!(matches!(
                bridge.next_event().expect("next event failed"),
                BridgeEvent::User { code: 4, .. }
            ));
            timer.delete().expect("delete failed");
            bridge.close().expect("close failed");
        },
    );
}
