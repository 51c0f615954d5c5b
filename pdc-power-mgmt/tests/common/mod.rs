#![allow(clippy::unwrap_used, dead_code)]
use core::array;

use embassy_futures::select::select;
use embassy_sync::{mutex::Mutex, signal::Signal};
use embassy_time::{Duration, Instant, Timer, with_timeout};
use embedded_services::GlobalRawMutex;
use pdc_interface::{
    Pdo, Rdo,
    ucsi::{ConnectorStatus, ConnectorStatusChange, PowerOperationMode},
};
use pdc_power_mgmt::{Config, PortConfig, PortId, PortRegistration, PortShared, Service, State, cci::CciCallback};

pub mod mock;

use mock::{FnCall, MockPdc, MockPlatform};

pub const NUM_PORTS: usize = 2;
pub const PORT0: PortId = PortId(0);
pub const PORT1: PortId = PortId(1);

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const PER_CALL_TIMEOUT: Duration = Duration::from_secs(1);

pub type DeviceType = Mutex<GlobalRawMutex, MockPdc>;
pub type ServiceType = Service<'static, DeviceType, MockPlatform>;

pub struct TestPort {
    pub id: PortId,
    pub shared: &'static PortShared,
    pub pdc: &'static DeviceType,
    pub fn_call: &'static Signal<GlobalRawMutex, (usize, FnCall)>,
}

pub struct Harness {
    pub service: &'static ServiceType,
    pub platform: &'static MockPlatform,
    pub ports: [TestPort; NUM_PORTS],
}

impl Harness {
    pub fn port(&self, id: PortId) -> &TestPort {
        self.ports.get(usize::from(id.0)).unwrap()
    }
}

/// Leak a value for the rest of the test, each test builds its own service
fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

pub async fn run_test<F: Future<Output = ()>>(timeout: Duration, test: impl FnOnce(&'static Harness) -> F) {
    run_test_with_config(timeout, Config::default(), test).await;
}

pub async fn run_test_with_config<F: Future<Output = ()>>(
    timeout: Duration,
    config: Config,
    test: impl FnOnce(&'static Harness) -> F,
) {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();

    let ports: [TestPort; NUM_PORTS] = array::from_fn(|i| {
        let shared = leak(PortShared::new());
        let fn_call = leak(Signal::new());
        let name = if i == 0 { "PDC0" } else { "PDC1" };
        TestPort {
            id: PortId(i as u8),
            shared,
            pdc: leak(Mutex::new(MockPdc::new(name, CciCallback::new(shared), fn_call))),
            fn_call,
        }
    });
    let registrations = leak(ports.each_ref().map(|port| PortRegistration::new(port.shared, port.pdc, PortConfig::default())));
    let platform = leak(MockPlatform::default());
    let service = leak(Service::new(registrations.as_slice(), platform, config).unwrap());
    let harness = leak(Harness {
        service,
        platform,
        ports,
    });

    with_timeout(
        timeout,
        select(pdc_power_mgmt::task::task::<_, _, NUM_PORTS>(service), test(harness)),
    )
    .await
    .unwrap();
}

/// Poll until `f` returns true
pub async fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        Timer::after_millis(5).await;
    }
    f()
}

/// Wait for the port to settle in `state` with no command in flight
pub async fn wait_for_state(port: &TestPort, state: State) -> bool {
    wait_until(PER_CALL_TIMEOUT * 3, || port.shared.state() == state).await
}

/// Wait until the PDC has seen a command matching `filter`
pub async fn wait_for_call(port: &TestPort, filter: impl Fn(&FnCall) -> bool) -> bool {
    let deadline = Instant::now() + PER_CALL_TIMEOUT * 3;
    while Instant::now() < deadline {
        if port.pdc.lock().await.count(&filter) > 0 {
            return true;
        }
        Timer::after_millis(5).await;
    }
    false
}

/// Connector status of an attached partner
pub fn attached_status(pd: bool, source: bool) -> ConnectorStatus {
    let mut change = ConnectorStatusChange(0);
    change.set_connect_change(true);
    ConnectorStatus {
        change,
        connect_status: true,
        power_direction: source,
        power_operation_mode: if pd {
            PowerOperationMode::Pd
        } else {
            PowerOperationMode::TypeC1A5
        },
        ..Default::default()
    }
}

pub fn detached_status() -> ConnectorStatus {
    let mut change = ConnectorStatusChange(0);
    change.set_connect_change(true);
    ConnectorStatus {
        change,
        ..Default::default()
    }
}

/// Attach a PD source offering 5 V and 20 V, the RDO selecting 20 V 3 A
pub async fn attach_pd_source_partner(port: &TestPort) {
    let mut pdc = port.pdc.lock().await;
    pdc.src_pdos.clear();
    pdc.src_pdos.push(Pdo::fixed(5000, 3000)).unwrap();
    pdc.src_pdos.push(Pdo::fixed(20_000, 3000)).unwrap();
    let mut rdo = Rdo(0);
    rdo.set_object_position(2);
    pdc.rdo = rdo;
    pdc.simulate_connector_change(attached_status(true, false));
}

/// Wait for the port to finish init and settle unattached
pub async fn wait_ready(port: &TestPort) {
    assert!(wait_for_state(port, State::Unattached).await);
    assert!(wait_for_call(port, |call| matches!(call, FnCall::SetPowerLevel(_))).await);
    assert!(wait_for_state(port, State::Unattached).await);
}
