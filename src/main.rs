//! BLE UART central firmware for the nRF52840.
//!
//! Scans for the UART echo peripheral, connects, discovers its service and
//! subscribes to notifications. Lines typed on UARTE0 are written to the
//! peripheral; echoed notifications are logged over RTT.

#![no_std]
#![no_main]

mod softdevice;
mod uart_console;

use core::cell::RefCell;

use ble_uart_central::ble::central::Central;
use ble_uart_central::ble::gateway::WriteGateway;
use ble_uart_central::config::CentralConfig;
use ble_uart_central::console::LogSink;
use defmt::{info, unwrap};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::{bind_interrupts, peripherals, uarte};
use embassy_sync::blocking_mutex::Mutex;
use nrf_softdevice::Softdevice;
use panic_probe as _;
use static_cell::StaticCell;

use softdevice::{SharedCentral, SoftdeviceTransport};

bind_interrupts!(struct Irqs {
    UARTE0_UART0 => uarte::InterruptHandler<peripherals::UARTE0>;
});

static GATEWAY: WriteGateway = WriteGateway::new();

fn shared_central() -> &'static SharedCentral {
    static CENTRAL: StaticCell<SharedCentral> = StaticCell::new();
    CENTRAL.init(Mutex::new(RefCell::new(Central::new(
        CentralConfig::new(),
        SoftdeviceTransport,
        LogSink::new(),
        &GATEWAY,
    ))))
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ble-uart-central starting");

    // SoftDevice reserves priorities 0, 1 and 4.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);

    interrupt::UARTE0_UART0.set_priority(Priority::P3);
    let mut uart_config = uarte::Config::default();
    uart_config.parity = uarte::Parity::EXCLUDED;
    uart_config.baudrate = uarte::Baudrate::BAUD115200;
    let uart = uarte::Uarte::new(p.UARTE0, Irqs, p.P0_08, p.P0_06, uart_config);

    let sd: &'static Softdevice = Softdevice::enable(&softdevice::softdevice_config());
    unwrap!(spawner.spawn(softdevice::softdevice_task(sd)));

    let central = shared_central();
    unwrap!(spawner.spawn(softdevice::ble_task(sd, central)));
    unwrap!(spawner.spawn(uart_console::console_task(uart, &GATEWAY)));

    info!("tasks running");
}
