//! rht-peripheral firmware image for nRF52840 + SoftDevice S140.
//!
//! Tasks:
//! - `softdevice_task` runs the SoftDevice event loop.
//! - `ble_task` owns the application [`Peripheral`] and feeds it every
//!   stack event and timer tick, one at a time.

#![no_std]
#![no_main]

mod ble;

use core::mem;

use defmt::{info, unwrap};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_futures::select::{select, select3, Either, Either3};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Delay, Duration, Ticker};
use nrf_softdevice::ble::gatt_server;
use nrf_softdevice::{raw, Softdevice};
use panic_probe as _;
use static_cell::StaticCell;

use ble::timer::TickerTimer;
use ble::{EnvironmentalSensingServiceEvent, Server, ServerEvent, SoftdeviceStack};
use rht_peripheral::config;
use rht_peripheral::si70xx::Si70xx;
use rht_peripheral::stack::{ConnHandle, RhtSensor};
use rht_peripheral::{Event, Peripheral, StatusFlags};

bind_interrupts!(struct Irqs {
    SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

type Sensor = Si70xx<Twim<'static, peripherals::TWISPI0>, Delay>;

/// Events queued by the GATT server callback for the dispatcher.
const EVENT_QUEUE_DEPTH: usize = 4;

/// Reason reported for a closed link; not an HCI status code.
const DISCONNECT_REASON_UNKNOWN: u16 = 0xFFFF;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("rht-peripheral starting");

    // Keep HAL interrupts off the levels reserved by the SoftDevice (0, 1, 4).
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);

    interrupt::SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0.set_priority(Priority::P3);
    let i2c = Twim::new(p.TWISPI0, Irqs, p.P0_26, p.P0_27, twim::Config::default());
    let mut sensor: Sensor = Si70xx::new(i2c, Delay);
    unwrap!(sensor.init());

    let sd = Softdevice::enable(&softdevice_config());
    static SERVER: StaticCell<Server> = StaticCell::new();
    let server = SERVER.init(unwrap!(Server::new(sd)));
    info!("GATT server ready, temperature handle {}", server.temperature_id().0);

    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(ble_task(sd, server, sensor)));
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn ble_task(sd: &'static Softdevice, server: &'static Server, mut sensor: Sensor) {
    let temperature = server.temperature_id();
    let mut app = Peripheral::new(temperature);
    let mut stack = SoftdeviceStack::new(server);
    let mut timer = TickerTimer::new();
    let events: Channel<NoopRawMutex, Event, EVENT_QUEUE_DEPTH> = Channel::new();

    unwrap!(app.handle_event(Event::Boot, &mut stack, &mut timer, &mut sensor));

    loop {
        let conn = unwrap!(stack.advertise(sd).await);
        let connection = ConnHandle(conn.handle().unwrap_or(0));

        unwrap!(app.handle_event(
            Event::ConnectionOpened { connection },
            &mut stack,
            &mut timer,
            &mut sensor
        ));
        unwrap!(app.handle_event(
            Event::ReadRequest {
                connection,
                characteristic: temperature,
                offset: 0,
            },
            &mut stack,
            &mut timer,
            &mut sensor
        ));

        let gatt = gatt_server::run(&conn, server, |e| match e {
            ServerEvent::Ess(EnvironmentalSensingServiceEvent::TemperatureCccdWrite {
                notifications,
            }) => {
                let event = Event::CharacteristicStatus {
                    connection,
                    characteristic: temperature,
                    status: StatusFlags::ClientConfig,
                    client_config: notifications as u16,
                };
                if events.try_send(event).is_err() {
                    defmt::warn!("Event queue full, CCCD write dropped");
                }
            }
        });

        // The SoftDevice serves reads from its attribute table; re-reading
        // keeps that value current for clients that never subscribe.
        let mut refresh = Ticker::every(Duration::from_millis(config::READ_REFRESH_MS as u64));
        let refresh_read = Event::ReadRequest {
            connection,
            characteristic: temperature,
            offset: 0,
        };

        let dispatch = async {
            loop {
                let event = match select3(events.receive(), timer.next(), refresh.next()).await {
                    Either3::First(event) => event,
                    Either3::Second(()) => Event::Tick,
                    Either3::Third(()) => refresh_read,
                };
                unwrap!(app.handle_event(event, &mut stack, &mut timer, &mut sensor));
            }
        };

        if let Either::First(e) = select(gatt, dispatch).await {
            info!("gatt_server run exited: {:?}", e);
        }

        events.clear();
        stack.detach();
        // `gatt_server::run` does not report the HCI disconnect reason.
        unwrap!(app.handle_event(
            Event::ConnectionClosed {
                connection,
                reason: DISCONNECT_REASON_UNKNOWN,
            },
            &mut stack,
            &mut timer,
            &mut sensor
        ));
    }
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
            conn_count: config::BLE_CONN_COUNT,
            event_length: config::BLE_EVENT_LENGTH,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t {
            att_mtu: config::BLE_ATT_MTU,
        }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: config::BLE_CONN_COUNT,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: config::DEVICE_NAME.as_ptr() as _,
            current_len: config::DEVICE_NAME.len() as u16,
            max_len: config::DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}
