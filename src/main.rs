//! relay-panel firmware for the nRF52840 + SoftDevice S140.
//!
//! Tasks:
//!   - `softdevice_task` - runs the SoftDevice event loop.
//!   - `panel_task`      - owns the `Panel`: boot-time auto-connect, then
//!                         serves `PanelCommand`s and the liveness ticker.
//!   - `button_task` ×4  - one per relay, sends `ToggleRelay`.
//!   - `led_task`        - mirrors the session state on LED1.

#![no_std]
#![no_main]

mod flash;
mod radio;
mod ui;

use core::mem;

use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_nrf::gpio::{AnyPin, Pin};
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver};
use embassy_time::{Delay, Duration, Ticker};
use nrf_softdevice::{raw, Flash, Softdevice};
use relay_panel::config::{DEVICE_NAME, LIVENESS_PERIOD_SECS};
use relay_panel::{Panel, PanelCommand, Relay};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::flash::FlashStore;
use crate::radio::SdCentral;
use crate::ui::status_led::{LedObserver, LinkSignal};
use crate::ui::{buttons, status_led, CommandSender, COMMAND_QUEUE_LEN};

type FirmwarePanel = Panel<SdCentral, FlashStore<Flash>, Delay, LedObserver>;

type CommandChannel = Channel<CriticalSectionRawMutex, PanelCommand, COMMAND_QUEUE_LEN>;
type CommandReceiver = Receiver<'static, CriticalSectionRawMutex, PanelCommand, COMMAND_QUEUE_LEN>;

static COMMANDS: CommandChannel = Channel::new();
static LINK_STATE: LinkSignal = LinkSignal::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn panel_task(panel: &'static mut FirmwarePanel, commands: CommandReceiver) -> ! {
    match panel.boot().await {
        Ok(true) => info!("Auto-connected to Primary"),
        Ok(false) => {}
        Err(e) => warn!("Auto-connect failed: {}", e),
    }

    let mut liveness = Ticker::every(Duration::from_secs(LIVENESS_PERIOD_SECS));
    loop {
        match select(commands.receive(), liveness.next()).await {
            Either::First(command) => {
                if let Err(e) = panel.handle(command).await {
                    warn!("{} failed: {}", command, e);
                }
            }
            Either::Second(()) => {
                panel.check_liveness().await;
            }
        }
    }
}

#[embassy_executor::task(pool_size = 4)]
async fn button_task(pin: AnyPin, relay: Relay, tx: CommandSender) -> ! {
    buttons::button_loop(pin, relay, tx).await
}

#[embassy_executor::task]
async fn led_task(pin: AnyPin, signal: &'static LinkSignal) -> ! {
    status_led::led_loop(pin, signal).await
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 23 }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 0,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("relay-panel starting");

    // The SoftDevice reserves interrupt priorities 0, 1 and 4.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);

    let sd: &'static Softdevice = Softdevice::enable(&softdevice_config());
    unwrap!(spawner.spawn(softdevice_task(sd)));

    // nRF52840-DK: buttons 1-4 on P0.11, P0.12, P0.24, P0.25; LED1 on P0.13.
    let button_pins = [
        p.P0_11.degrade(),
        p.P0_12.degrade(),
        p.P0_24.degrade(),
        p.P0_25.degrade(),
    ];
    for (pin, relay) in button_pins.into_iter().zip(Relay::ALL) {
        unwrap!(spawner.spawn(button_task(pin, relay, COMMANDS.sender())));
    }
    unwrap!(spawner.spawn(led_task(p.P0_13.degrade(), &LINK_STATE)));

    static PANEL: StaticCell<FirmwarePanel> = StaticCell::new();
    let panel = PANEL.init(Panel::new(
        SdCentral::new(sd),
        FlashStore::new(Flash::take(sd)),
        Delay,
        LedObserver::new(&LINK_STATE),
    ));
    unwrap!(spawner.spawn(panel_task(panel, COMMANDS.receiver())));
}
