#![allow(clippy::unwrap_used)]
use embassy_time::{Duration, Timer};
use embedded_services::info;
use pdc_interface::{Pdo, Rdo, ucsi::PdoType};
use pdc_power_mgmt::{
    DualRoleCapability, Error, PortId, State,
    port::{Attachment, ChargeLimit},
    service::PowerRole,
};

mod common;

use common::{
    DEFAULT_TIMEOUT, Harness, PORT0, attach_pd_source_partner, attached_status, detached_status,
    mock::{FnCall, PlatformCall},
    run_test, wait_for_call, wait_for_state, wait_ready, wait_until,
};

const CHARGE_20V_3A: ChargeLimit = ChargeLimit {
    current_ma: 3000,
    voltage_mv: 20_000,
    power_mw: 60_000,
};

fn is_src_pdos(call: &FnCall) -> bool {
    matches!(call, FnCall::GetPdos(request) if request.pdo_type == PdoType::Source)
}

async fn attach_sink(harness: &Harness) {
    let port = harness.port(PORT0);
    wait_ready(port).await;
    attach_pd_source_partner(port).await;
    assert!(wait_for_call(port, |call| *call == FnCall::GetRdo).await);
    // Contract evaluated
    assert!(wait_until(Duration::from_secs(1), || port.shared.status().pdo != Pdo::default()).await);
    assert!(wait_for_state(port, State::SnkAttached).await);
}

fn input_current_limit(harness: &Harness, id: PortId) -> Option<PlatformCall> {
    harness
        .platform
        .last(|call| matches!(call, PlatformCall::InputCurrentLimit(port, _, _) if *port == id))
}

/// PD attach as a sink reads the partner capabilities and selects the PDO named by the RDO
async fn test_sink_attach(harness: &'static Harness) {
    info!("Running test_sink_attach");
    attach_sink(harness).await;

    let port = harness.port(PORT0);
    let status = port.shared.status();
    assert_eq!(status.attachment, Attachment::Sink);
    assert!(status.pd_capable);
    assert_eq!(status.src_pdos.len(), 2);
    assert_eq!(status.rdo.pdo_index(), Some(1));
    assert_eq!(Some(&status.pdo), status.src_pdos.get(1));
    assert_eq!(status.charge, CHARGE_20V_3A);
    // Not the active charge port yet
    assert!(!status.sink_path_enabled);
    assert_eq!(input_current_limit(harness, PORT0), None);

    let service = harness.service;
    assert!(service.is_connected(PORT0).unwrap());
    assert_eq!(service.get_power_role(PORT0).unwrap(), PowerRole::Sink);
    assert_eq!(service.get_src_cap_cnt(PORT0).unwrap(), 2);
    assert_eq!(service.get_task_state_name(PORT0).unwrap(), "Attached.SNK");
    assert!(!service.get_partner_unconstr_power(PORT0).unwrap());
    assert!(!service.get_partner_dual_role_power(PORT0).unwrap());
}

/// Selecting the port as active charge port starts charging, deselecting stops it
async fn test_active_charge(harness: &'static Harness) {
    info!("Running test_active_charge");
    attach_sink(harness).await;
    let port = harness.port(PORT0);
    let service = harness.service;

    service.set_active_charge_port(Some(PORT0)).unwrap();
    assert!(wait_for_call(port, |call| *call == FnCall::SetSinkPath(true)).await);
    assert!(
        wait_until(Duration::from_secs(1), || input_current_limit(harness, PORT0)
            == Some(PlatformCall::InputCurrentLimit(PORT0, 3000, 20_000)))
        .await
    );
    assert_eq!(
        harness
            .platform
            .last(|call| matches!(call, PlatformCall::DualRole(..))),
        Some(PlatformCall::DualRole(PORT0, DualRoleCapability::Dedicated))
    );
    assert!(port.shared.status().sink_path_enabled);

    // Stop charging, the cached contract is dropped with the sink path
    service.set_active_charge_port(None).unwrap();
    assert!(wait_for_call(port, |call| *call == FnCall::SetSinkPath(false)).await);
    assert!(wait_until(Duration::from_secs(1), || !port.shared.status().sink_path_enabled).await);
    let status = port.shared.status();
    assert_eq!(status.charge, ChargeLimit::default());
    assert_eq!(status.pdo, Pdo::default());
    assert!(status.src_pdos.is_empty());
    assert_eq!(
        input_current_limit(harness, PORT0),
        Some(PlatformCall::InputCurrentLimit(PORT0, 0, 0))
    );

    // Same selection again is not a change
    service.set_active_charge_port(None).unwrap();
    let src_pdo_reads = port.pdc.lock().await.count(is_src_pdos);
    assert!(wait_for_state(port, State::SnkAttached).await);
    assert_eq!(port.shared.status().charge, ChargeLimit::default());

    // Charging again goes through a fresh PDO/RDO evaluation
    service.set_active_charge_port(Some(PORT0)).unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || port.shared.status().charge == CHARGE_20V_3A
            && port.shared.status().sink_path_enabled)
        .await
    );
    assert!(port.pdc.lock().await.count(is_src_pdos) > src_pdo_reads);
}

/// Detach drops everything learned about the partner
async fn test_sink_detach(harness: &'static Harness) {
    info!("Running test_sink_detach");
    attach_sink(harness).await;
    let port = harness.port(PORT0);
    harness.service.set_active_charge_port(Some(PORT0)).unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || input_current_limit(harness, PORT0)
            == Some(PlatformCall::InputCurrentLimit(PORT0, 3000, 20_000)))
        .await
    );

    port.pdc.lock().await.simulate_connector_change(detached_status());
    assert!(wait_for_state(port, State::Unattached).await);

    let status = port.shared.status();
    assert_eq!(status.attachment, Attachment::None);
    assert_eq!(status.rdo.0, 0);
    assert_eq!(status.pdo, Pdo::default());
    assert_eq!(status.charge, ChargeLimit::default());
    assert!(status.src_pdos.is_empty());
    assert_eq!(
        input_current_limit(harness, PORT0),
        Some(PlatformCall::InputCurrentLimit(PORT0, 0, 0))
    );
    assert_eq!(
        harness
            .platform
            .last(|call| matches!(call, PlatformCall::DualRole(..))),
        Some(PlatformCall::DualRole(PORT0, DualRoleCapability::Unknown))
    );
    assert!(!harness.service.is_connected(PORT0).unwrap());
    assert_eq!(harness.service.get_src_cap_cnt(PORT0).unwrap(), 0);
}

/// Augmented PDOs are dropped from the cached source capabilities
async fn test_augmented_pdos_filtered(harness: &'static Harness) {
    info!("Running test_augmented_pdos_filtered");
    let port = harness.port(PORT0);
    wait_ready(port).await;

    {
        let mut pdc = port.pdc.lock().await;
        pdc.src_pdos.clear();
        pdc.src_pdos.push(Pdo::fixed(5000, 3000)).unwrap();
        pdc.src_pdos.push(Pdo::fixed(9000, 3000)).unwrap();
        // PPS 3.3-11 V 3 A
        pdc.src_pdos.push(Pdo(0xC0DC_2164)).unwrap();
        let mut rdo = Rdo(0);
        rdo.set_object_position(2);
        pdc.rdo = rdo;
        pdc.simulate_connector_change(attached_status(true, false));
    }
    assert!(wait_until(Duration::from_secs(1), || port.shared.status().pdo != Pdo::default()).await);

    let status = port.shared.status();
    assert_eq!(status.src_pdos.len(), 2);
    assert!(status.src_pdos.iter().all(|pdo| !pdo.is_augmented()));
    assert_eq!(status.charge.voltage_mv, 9000);
    assert_eq!(harness.service.get_src_cap_cnt(PORT0).unwrap(), 2);
}

/// Selecting the port before the partner shows up charges without a second evaluation
async fn test_active_charge_before_attach(harness: &'static Harness) {
    info!("Running test_active_charge_before_attach");
    let port = harness.port(PORT0);
    wait_ready(port).await;
    harness.service.set_active_charge_port(Some(PORT0)).unwrap();

    attach_pd_source_partner(port).await;
    assert!(
        wait_until(Duration::from_secs(1), || input_current_limit(harness, PORT0)
            == Some(PlatformCall::InputCurrentLimit(PORT0, 3000, 20_000)))
        .await
    );
    assert!(wait_for_state(port, State::SnkAttached).await);

    Timer::after_millis(200).await;
    let pdc = port.pdc.lock().await;
    assert_eq!(pdc.count(is_src_pdos), 1);
    assert_eq!(pdc.count(|call| *call == FnCall::SetSinkPath(true)), 1);
}

/// A new RDO is sent to the source and charging follows the new contract
async fn test_request_rdo(harness: &'static Harness) {
    info!("Running test_request_rdo");
    let port = harness.port(PORT0);
    let service = harness.service;
    wait_ready(port).await;

    let mut rdo = Rdo(0);
    rdo.set_object_position(1);
    // Nothing to renegotiate without a PD source
    assert_eq!(service.request_rdo(PORT0, rdo).await, Err(Error::Failed));

    attach_sink(harness).await;
    service.set_active_charge_port(Some(PORT0)).unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || input_current_limit(harness, PORT0)
            == Some(PlatformCall::InputCurrentLimit(PORT0, 3000, 20_000)))
        .await
    );

    port.pdc.lock().await.rdo = rdo;
    assert_eq!(service.request_rdo(PORT0, rdo).await, Ok(()));
    assert!(wait_for_call(port, |call| *call == FnCall::SetRdo(rdo)).await);
    assert!(
        wait_until(Duration::from_secs(1), || input_current_limit(harness, PORT0)
            == Some(PlatformCall::InputCurrentLimit(PORT0, 3000, 5000)))
        .await
    );

    let status = port.shared.status();
    assert_eq!(status.rdo.pdo_index(), Some(0));
    assert_eq!(
        status.charge,
        ChargeLimit {
            current_ma: 3000,
            voltage_mv: 5000,
            power_mw: 15_000,
        }
    );
}

#[tokio::test]
async fn run_test_sink_attach() {
    run_test(DEFAULT_TIMEOUT, test_sink_attach).await;
}

#[tokio::test]
async fn run_test_active_charge() {
    run_test(DEFAULT_TIMEOUT, test_active_charge).await;
}

#[tokio::test]
async fn run_test_sink_detach() {
    run_test(DEFAULT_TIMEOUT, test_sink_detach).await;
}

#[tokio::test]
async fn run_test_augmented_pdos_filtered() {
    run_test(DEFAULT_TIMEOUT, test_augmented_pdos_filtered).await;
}

#[tokio::test]
async fn run_test_active_charge_before_attach() {
    run_test(DEFAULT_TIMEOUT, test_active_charge_before_attach).await;
}

#[tokio::test]
async fn run_test_request_rdo() {
    run_test(DEFAULT_TIMEOUT, test_request_rdo).await;
}
