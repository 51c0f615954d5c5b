use core::array;

use embassy_futures::join::{join, join_array};
use embedded_services::{info, sync::Lockable, warn};
use pdc_interface::Pdc;

use crate::{PortId, platform::Platform, service::Service};

/// Run every port task and the source current arbitrator, never returns
pub async fn task<D: Lockable, P: Platform, const N: usize>(service: &Service<'_, D, P>)
where
    D::Inner: Pdc,
{
    info!("Starting PDC power management task");
    if usize::from(service.get_usb_pd_port_count()) != N {
        warn!(
            "{} ports registered, running {}",
            service.get_usb_pd_port_count(),
            N
        );
    }

    join(
        join_array(array::from_fn::<_, N, _>(|i| {
            service.run_port(PortId(u8::try_from(i).unwrap_or(u8::MAX)))
        })),
        service.run_arbitrator(),
    )
    .await;
}
