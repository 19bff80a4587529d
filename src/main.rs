#![no_std]
#![no_main]

use defmt::*;
use embassy_embedded_hal::shared_bus::asynch::i2c::I2cDevice;
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::i2c::{Config as I2cConfig, I2c};
use embassy_stm32::mode::Async;
use embassy_stm32::time::Hertz;
use embassy_stm32::usart::{Config as UartConfig, DataBits, Parity, StopBits, Uart, UartRx, UartTx};
use embassy_stm32::{bind_interrupts, i2c, peripherals, usart};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Timer;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use iot01a_sensor_console::console::{
    format_accel, format_distance, format_gyro, format_id_line, format_mag, format_press_temp,
    Command, CommandMailbox, HELP_LINE, POLL_INTERVAL_MS,
};
use iot01a_sensor_console::drivers::hts221::Hts221;
use iot01a_sensor_console::drivers::lis3mdl::Lis3mdl;
use iot01a_sensor_console::drivers::lps22hb::Lps22hb;
use iot01a_sensor_console::drivers::lsm6dsl::Lsm6dsl;
use iot01a_sensor_console::drivers::vl53l0x::Vl53l0x;

bind_interrupts!(struct UartIrqs {
    USART1 => usart::InterruptHandler<peripherals::USART1>;
});

bind_interrupts!(struct I2cIrqs {
    I2C2_EV => i2c::EventInterruptHandler<peripherals::I2C2>;
    I2C2_ER => i2c::ErrorInterruptHandler<peripherals::I2C2>;
});

// All five sensors sit on I2C2 behind a shared-bus mutex.
type SensorBus = I2cDevice<'static, NoopRawMutex, I2c<'static, Async>>;
static I2C_BUS: StaticCell<Mutex<NoopRawMutex, I2c<'static, Async>>> = StaticCell::new();

static COMMANDS: CommandMailbox = CommandMailbox::new();

// Runtime address for the range sensor, programmed during its init
const RANGE_SENSOR_ADDRESS: u8 = 0x29;

/// Receive half of the console. One byte per read, posted straight to the
/// mailbox; a byte arriving before the previous one is dispatched simply
/// replaces it. Read errors are dropped, the console has no framing to lose.
#[embassy_executor::task]
async fn console_reader(mut rx: UartRx<'static, Async>) {
    let mut byte = [0u8; 1];
    loop {
        if rx.read(&mut byte).await.is_ok() {
            COMMANDS.post(byte[0]);
        }
    }
}

async fn print_line(tx: &mut UartTx<'static, Async>, line: &str) {
    let _ = tx.write(line.as_bytes()).await;
    let _ = tx.write(b"\r\n").await;
}

async fn print_accel(acc_gyro: &mut Lsm6dsl<SensorBus>, tx: &mut UartTx<'static, Async>) {
    let axes = match acc_gyro.get_accel_axes().await {
        Ok(axes) => axes,
        Err(e) => {
            warn!("accelerometer read failed: {}", e);
            [0; 3]
        }
    };
    print_line(tx, format_accel(axes).as_str()).await;
}

async fn print_gyro(acc_gyro: &mut Lsm6dsl<SensorBus>, tx: &mut UartTx<'static, Async>) {
    let axes = match acc_gyro.get_gyro_axes().await {
        Ok(axes) => axes,
        Err(e) => {
            warn!("gyroscope read failed: {}", e);
            [0; 3]
        }
    };
    print_line(tx, format_gyro(axes).as_str()).await;
}

async fn print_mag(magnetometer: &mut Lis3mdl<SensorBus>, tx: &mut UartTx<'static, Async>) {
    let axes = match magnetometer.get_axes().await {
        Ok(axes) => axes,
        Err(e) => {
            warn!("magnetometer read failed: {}", e);
            [0; 3]
        }
    };
    print_line(tx, format_mag(axes).as_str()).await;
}

async fn print_environment(
    hum_temp: &mut Hts221<SensorBus>,
    press_temp: &mut Lps22hb<SensorBus>,
    tx: &mut UartTx<'static, Async>,
) {
    // The HTS221 pair goes to the debug log only; the console line carries
    // the LPS22HB values, matching the demo's fixed output.
    match hum_temp.get_temperature().await {
        Ok(t) => info!("HTS221 temperature: {} C", t),
        Err(e) => warn!("HTS221 temperature read failed: {}", e),
    }
    match hum_temp.get_humidity().await {
        Ok(h) => info!("HTS221 humidity: {} %", h),
        Err(e) => warn!("HTS221 humidity read failed: {}", e),
    }

    let temperature = press_temp.get_temperature().await.unwrap_or_else(|e| {
        warn!("LPS22HB temperature read failed: {}", e);
        0.0
    });
    let pressure = press_temp.get_pressure().await.unwrap_or_else(|e| {
        warn!("LPS22HB pressure read failed: {}", e);
        0.0
    });
    print_line(tx, format_press_temp(temperature, pressure).as_str()).await;
}

async fn print_distance(
    range: &mut Vl53l0x<SensorBus, Output<'static>>,
    tx: &mut UartTx<'static, Async>,
) {
    let distance = match range.read_distance().await {
        Ok(mm) => Some(mm),
        Err(e) => {
            warn!("range read failed: {}", e);
            None
        }
    };
    print_line(tx, format_distance(distance).as_str()).await;
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_stm32::init(Default::default());
    info!("Starting sensor console");

    let mut uart_config = UartConfig::default();
    uart_config.baudrate = 115_200;
    uart_config.parity = Parity::ParityNone;
    uart_config.stop_bits = StopBits::STOP1;
    uart_config.data_bits = DataBits::DataBits8;

    let usart = Uart::new(
        p.USART1,
        p.PB7,
        p.PB6,
        UartIrqs,
        p.DMA2_CH6,
        p.DMA2_CH7,
        uart_config,
    )
    .unwrap();
    let (mut tx, rx) = usart.split();

    let i2c = I2c::new(
        p.I2C2,
        p.PB10,
        p.PB11,
        I2cIrqs,
        p.DMA1_CH4,
        p.DMA1_CH5,
        Hertz(400_000),
        I2cConfig::default(),
    );
    let i2c_bus = I2C_BUS.init(Mutex::new(i2c));

    let mut hum_temp = Hts221::new(I2cDevice::new(i2c_bus));
    let mut press_temp = Lps22hb::new(I2cDevice::new(i2c_bus));
    let mut magnetometer = Lis3mdl::new(I2cDevice::new(i2c_bus));
    let mut acc_gyro = Lsm6dsl::new(I2cDevice::new(i2c_bus));

    let xshut = Output::new(p.PC6, Level::Low, Speed::Low);
    // GPIO1 data-ready line; ranging is polled over the bus instead
    let _range_int = Input::new(p.PC7, Pull::None);
    let mut range = Vl53l0x::new(I2cDevice::new(i2c_bus), xshut);

    // A failed init is logged and the console comes up anyway; the affected
    // readings report zeros (or the range placeholder) until a power cycle.
    if let Err(e) = hum_temp.init().await {
        error!("HTS221 init failed: {}", e);
    }
    if let Err(e) = press_temp.init().await {
        error!("LPS22HB init failed: {}", e);
    }
    if let Err(e) = magnetometer.init().await {
        error!("LIS3MDL init failed: {}", e);
    }
    if let Err(e) = acc_gyro.init().await {
        error!("LSM6DSL init failed: {}", e);
    }
    if let Err(e) = range.init(RANGE_SENSOR_ADDRESS).await {
        error!("VL53L0X init failed: {}", e);
    }

    if let Err(e) = acc_gyro.enable_accel().await {
        error!("LSM6DSL accel enable failed: {}", e);
    }
    if let Err(e) = acc_gyro.enable_gyro().await {
        error!("LSM6DSL gyro enable failed: {}", e);
    }

    spawner.spawn(console_reader(rx)).unwrap();

    let _ = tx.write(b"\x1b[2J\x1b[20A").await;
    let _ = tx.write(b"\r\n--- Ready to roll out! ---\r\n\r\n").await;

    let id = hum_temp.read_id().await.unwrap_or(0);
    print_line(&mut tx, format_id_line("HTS221  humidity & temperature", id).as_str()).await;

    let id = press_temp.read_id().await.unwrap_or(0);
    print_line(&mut tx, format_id_line("LPS22HB pressure & temperature", id).as_str()).await;

    let id = magnetometer.read_id().await.unwrap_or(0);
    print_line(&mut tx, format_id_line("LIS3MDL magnetometer", id).as_str()).await;

    let id = acc_gyro.read_id().await.unwrap_or(0);
    print_line(&mut tx, format_id_line("LSM6DSL accelerometer & gyroscope", id).as_str()).await;

    let _ = tx
        .write(b"\n\r--- Press the button to display parameters ---\n\r")
        .await;

    loop {
        // Taking the byte clears the slot first, so a command arriving while
        // a reporter runs is picked up on the next cycle.
        if let Some(byte) = COMMANDS.take() {
            match Command::parse(byte) {
                Some(Command::Accelerometer) => print_accel(&mut acc_gyro, &mut tx).await,
                Some(Command::Gyroscope) => print_gyro(&mut acc_gyro, &mut tx).await,
                Some(Command::Magnetometer) => print_mag(&mut magnetometer, &mut tx).await,
                Some(Command::Environment) => {
                    print_environment(&mut hum_temp, &mut press_temp, &mut tx).await
                }
                Some(Command::Distance) => print_distance(&mut range, &mut tx).await,
                None => print_line(&mut tx, HELP_LINE).await,
            }
        }
        Timer::after_millis(POLL_INTERVAL_MS).await;
    }
}
