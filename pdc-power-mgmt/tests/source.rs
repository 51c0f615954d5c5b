#![allow(clippy::unwrap_used)]
use embassy_time::{Duration, Timer};
use embedded_services::info;
use pdc_interface::{
    Pdo,
    ucsi::{PdoType, TypeCCurrent},
};
use pdc_power_mgmt::{State, port::Attachment, service::PowerRole};

mod common;

use common::{
    DEFAULT_TIMEOUT, Harness, PORT0, PORT1, TestPort, attached_status, detached_status, mock::FnCall, run_test,
    wait_for_call, wait_for_state, wait_ready,
};

fn is_power_level(call: &FnCall, current: TypeCCurrent) -> bool {
    *call == FnCall::SetPowerLevel(current)
}

/// Attach a PD sink partner asking for 3 A
async fn attach_3a_sink_partner(port: &TestPort) {
    let mut pdc = port.pdc.lock().await;
    pdc.snk_pdos.clear();
    pdc.snk_pdos.push(Pdo::fixed(5000, 3000)).unwrap();
    pdc.simulate_connector_change(attached_status(true, true));
}

/// PD attach as a source reads the partner sink capabilities
async fn test_source_attach(harness: &'static Harness) {
    info!("Running test_source_attach");
    let port = harness.port(PORT0);
    wait_ready(port).await;

    {
        let mut pdc = port.pdc.lock().await;
        pdc.snk_pdos.clear();
        pdc.snk_pdos.push(Pdo::fixed(5000, 900)).unwrap();
        pdc.simulate_connector_change(attached_status(true, true));
    }
    assert!(
        wait_for_call(port, |call| matches!(call, FnCall::GetPdos(request) if request.pdo_type == PdoType::Sink)).await
    );
    assert!(wait_for_state(port, State::SrcAttached).await);

    let status = port.shared.status();
    assert_eq!(status.attachment, Attachment::Source);
    assert_eq!(status.snk_pdos.len(), 1);
    assert_eq!(harness.service.get_power_role(PORT0).unwrap(), PowerRole::Source);
    // Source capabilities are only reported while sinking
    assert_eq!(harness.service.get_src_cap_cnt(PORT0).unwrap(), 0);

    // A partner content with 1.5 A never claims a 3 A slot
    Timer::after_millis(200).await;
    assert!(!harness.service.arbitrator().is_claimed(PORT0));
    assert_eq!(
        port.pdc
            .lock()
            .await
            .count(|call| is_power_level(call, TypeCCurrent::Current3A0)),
        0
    );
}

/// With a single 3 A slot only the first sink partner gets 3 A until it leaves
async fn test_single_3a_slot(harness: &'static Harness) {
    info!("Running test_single_3a_slot");
    let port0 = harness.port(PORT0);
    let port1 = harness.port(PORT1);
    let arbitrator = harness.service.arbitrator();
    wait_ready(port0).await;
    wait_ready(port1).await;

    attach_3a_sink_partner(port0).await;
    assert!(wait_for_call(port0, |call| is_power_level(call, TypeCCurrent::Current3A0)).await);
    assert!(arbitrator.is_claimed(PORT0));

    attach_3a_sink_partner(port1).await;
    assert!(
        wait_for_call(port1, |call| matches!(call, FnCall::GetPdos(request) if request.pdo_type == PdoType::Sink))
            .await
    );
    assert!(wait_for_state(port1, State::SrcAttached).await);
    Timer::after(Duration::from_millis(300)).await;
    assert!(arbitrator.is_claimed(PORT0));
    assert!(!arbitrator.is_claimed(PORT1));
    assert_eq!(
        port1
            .pdc
            .lock()
            .await
            .count(|call| is_power_level(call, TypeCCurrent::Current3A0)),
        0
    );

    // Port 0 leaves, port 1 takes over the slot and port 0 goes back to the default current
    let default_before = port0
        .pdc
        .lock()
        .await
        .count(|call| is_power_level(call, TypeCCurrent::Current1A5));
    port0.pdc.lock().await.simulate_connector_change(detached_status());
    assert!(wait_for_call(port1, |call| is_power_level(call, TypeCCurrent::Current3A0)).await);
    assert!(arbitrator.is_claimed(PORT1));
    assert!(!arbitrator.is_claimed(PORT0));
    assert!(wait_for_state(port0, State::Unattached).await);
    assert!(
        common::wait_until(Duration::from_secs(1), || {
            port0
                .pdc
                .try_lock()
                .map(|pdc| pdc.count(|call| is_power_level(call, TypeCCurrent::Current1A5)) > default_before)
                .unwrap_or(false)
        })
        .await
    );
}

#[tokio::test]
async fn run_test_source_attach() {
    run_test(DEFAULT_TIMEOUT, test_source_attach).await;
}

#[tokio::test]
async fn run_test_single_3a_slot() {
    run_test(DEFAULT_TIMEOUT, test_single_3a_slot).await;
}
