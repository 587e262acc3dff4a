//! UARTE console: every line typed on the serial port goes to the
//! peripheral's write characteristic.

use ble_uart_central::ble::gateway::WriteGateway;
use ble_uart_central::config::CONSOLE_LINE_MAX;
use ble_uart_central::console::LineBuffer;
use defmt::{info, warn};
use embassy_nrf::peripherals::UARTE0;
use embassy_nrf::uarte::Uarte;

use crate::softdevice::SoftdeviceTransport;

const PROMPT: &[u8] = b"> ";

#[embassy_executor::task]
pub async fn console_task(mut uart: Uarte<'static, UARTE0>, gateway: &'static WriteGateway) -> ! {
    let mut line: LineBuffer<CONSOLE_LINE_MAX> = LineBuffer::new();
    let mut byte = [0u8; 1];

    let _ = uart.write(PROMPT).await;
    loop {
        if let Err(e) = uart.read(&mut byte).await {
            warn!("console: read failed: {:?}", e);
            continue;
        }

        let Some(data) = line.push(byte[0]) else {
            continue;
        };

        info!("console: sending {} bytes", data.len());
        if gateway.write(&SoftdeviceTransport, data).is_err() {
            let _ = uart.write(b"not connected\r\n").await;
        }
        let _ = uart.write(PROMPT).await;
    }
}
