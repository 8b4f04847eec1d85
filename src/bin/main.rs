// SPDX-FileCopyrightText: 2026 Sam Hanes <sam@maltera.com>
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use bt_hci::controller::ExternalController;
use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_futures::join::join;
use esp_hal::clock::CpuClock;
use esp_hal::rng::Rng;
use esp_hal::rtc_cntl::Rtc;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::ble::controller::BleConnector;
use satellite::config::Config;
use satellite::mac;
use satellite::platform::EspPlatform;
use satellite::power::{self, Governor, PowerConfig};
use trouble_host::prelude::*;

extern crate alloc;
extern crate esp_backtrace;

macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> =
            static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

const CONNECTIONS_MAX: usize = 1;
const L2CAP_CHANNELS_MAX: usize = 1;

const DEVICE_NAME: &str = "PigsCanFlyLabsLLCProtoType";

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) {
    rtt_target::rtt_init_defmt!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 98767);
    esp_alloc::heap_allocator!(size: 64 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let settings = Config::from_env().unwrap_or_else(|e| {
        error!("bad build configuration, using defaults: {}", e);
        Config::default()
    });

    let mut platform = EspPlatform::new(Rtc::new(peripherals.LPWR));
    let boot_mhz = platform.boot_mhz();

    let min_mhz = settings.min_freq_for(platform.frequencies()).unwrap_or(boot_mhz);
    let idle = match power::auto_sleep(&mut platform, min_mhz, settings.max_freq_mhz) {
        Ok(applied) => applied,
        Err(e) => {
            error!("auto sleep not enabled: {}", e);
            PowerConfig::fixed(boot_mhz)
        }
    };
    let mut governor = Governor::new(platform, PowerConfig::fixed(boot_mhz), idle);

    // the radio reads the base MAC when it starts, so this has to come first
    let trailing = settings.mac_trailing_bits.unwrap_or_else(|| {
        warn!("no fixed MAC suffix configured, drawing one before the radio provides entropy");
        Rng::new().random()
    });
    match governor.run(|platform| mac::mac_setup(platform, trailing)) {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => error!("keeping factory MAC: {}", e),
        Err(e) => error!("could not boost for MAC setup: {}", e),
    }

    let base = governor.platform().base_mac();
    if base.is_in_block() {
        info!("base MAC {} (suffix {=u32:#x})", base, base.trailing_bits());
    } else {
        warn!("base MAC {} is outside our block", base);
    }

    let radio = match governor.run(|_| esp_radio::init()) {
        Ok(radio) => radio,
        Err(e) => {
            warn!("starting radio without boost: {}", e);
            esp_radio::init()
        }
    };
    let radio_controller = mk_static!(
        esp_radio::Controller<'static>,
        radio.expect("Failed to initialize BLE controller")
    );

    let transport =
        BleConnector::new(radio_controller, peripherals.BT, Default::default())
            .unwrap();
    let ble_controller = ExternalController::<_, 1>::new(transport);
    spawner.spawn(ble_task(ble_controller)).ok();

    loop {
        if let Err(e) = governor.throttle() {
            warn!("still running unthrottled: {}", e);
        }
        governor.platform_mut().idle(settings.idle).await;
    }
}

#[embassy_executor::task]
async fn ble_task(controller: ExternalController<BleConnector<'static>, 1>) {
    let mut resources: HostResources<
        DefaultPacketPool,
        CONNECTIONS_MAX,
        L2CAP_CHANNELS_MAX,
    > = HostResources::new();
    let stack = trouble_host::new(controller, &mut resources);
    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let mut adv_data = [0; 31];
    let adv_len = match AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::CompleteLocalName(DEVICE_NAME.as_bytes()),
        ],
        &mut adv_data[..],
    ) {
        Ok(len) => len,
        Err(e) => {
            error!("advertisement does not fit: {:?}", e);
            return;
        }
    };

    let _ = join(runner.run(), async {
        loop {
            info!("advertising as {}", DEVICE_NAME);
            let advertiser = match peripheral
                .advertise(
                    &Default::default(),
                    Advertisement::ConnectableScannableUndirected {
                        adv_data: &adv_data[..adv_len],
                        scan_data: &[],
                    },
                )
                .await
            {
                Ok(advertiser) => advertiser,
                Err(e) => {
                    error!("[adv] error: {:?}", e);
                    return;
                }
            };

            match advertiser.accept().await {
                Ok(conn) => {
                    info!("central connected");
                    let reason = loop {
                        if let ConnectionEvent::Disconnected { reason } = conn.next().await {
                            break reason;
                        }
                    };
                    info!("central disconnected: {:?}", reason);
                }
                Err(e) => warn!("[adv] accept failed: {:?}", e),
            }
        }
    })
    .await;
}
