use embassy_time::Timer;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::i2c::I2c;

// I2C Address (7-bit, device default after boot)
const VL53L0X_I2C_ADDRESS: u8 = 0x29;

// Registers
const REG_SYSRANGE_START: u8 = 0x00;
const REG_SYSTEM_INTERRUPT_CLEAR: u8 = 0x0B;
const REG_RESULT_INTERRUPT_STATUS: u8 = 0x13;
const REG_RESULT_RANGE_MM: u8 = 0x1E;
const REG_I2C_SLAVE_DEVICE_ADDRESS: u8 = 0x8A;
const REG_VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV: u8 = 0x89;
const REG_MSRC_CONFIG_CONTROL: u8 = 0x88;
const REG_IDENTIFICATION_MODEL_ID: u8 = 0xC0;

const MODEL_ID_VALUE: u8 = 0xEE;

// Internal stop-variable access goes through this vendor sequence
const REG_INTERNAL_TUNING_1: u8 = 0x80;
const REG_INTERNAL_TUNING_2: u8 = 0xFF;
const REG_STOP_VARIABLE: u8 = 0x91;

const BOOT_DELAY: u64 = 10; // millisec
const POLL_STEP: u64 = 1; // millisec
const RANGING_TIMEOUT_STEPS: u32 = 200;

// Readings at or above this are the device's "no target" sentinel
const OUT_OF_RANGE_MM: u16 = 8190;

fn validate_range(mm: u16) -> Option<u32> {
    if mm >= OUT_OF_RANGE_MM {
        None
    } else {
        Some(u32::from(mm))
    }
}

/// Time-of-flight ranging in single-shot polled mode. Owns the XSHUT line so
/// init can power-cycle the part; the GPIO1 interrupt line is left to the
/// board setup, ranging completion is polled over the bus instead.
pub struct Vl53l0x<I2C, XS> {
    i2c: I2C,
    i2c_address: u8,
    xshut: XS,
    stop_variable: u8,
}

impl<I2C: I2c, XS: OutputPin> Vl53l0x<I2C, XS> {
    pub fn new(i2c: I2C, xshut: XS) -> Self {
        Self {
            i2c,
            i2c_address: VL53L0X_I2C_ADDRESS,
            xshut,
            stop_variable: 0,
        }
    }

    /// Power-cycle the part, confirm the model ID, program the runtime I2C
    /// address and capture the stop variable used by every ranging cycle.
    pub async fn init(&mut self, address: u8) -> Result<(), &'static str> {
        self.xshut.set_low().map_err(|_| "XSHUT drive failed")?;
        Timer::after_millis(BOOT_DELAY).await;
        self.xshut.set_high().map_err(|_| "XSHUT drive failed")?;
        Timer::after_millis(BOOT_DELAY).await;

        if self.read_id().await? != MODEL_ID_VALUE {
            return Err("VL53L0X not detected");
        }

        self.write_reg(REG_I2C_SLAVE_DEVICE_ADDRESS, address & 0x7F)
            .await?;
        self.i2c_address = address & 0x7F;

        // 2.8 V I/O mode
        let vhv = self.read_reg(REG_VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV).await?;
        self.write_reg(REG_VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV, vhv | 0x01)
            .await?;

        // Standard ranging mode
        self.write_reg(REG_MSRC_CONFIG_CONTROL, 0x00).await?;

        self.write_reg(REG_INTERNAL_TUNING_1, 0x01).await?;
        self.write_reg(REG_INTERNAL_TUNING_2, 0x01).await?;
        self.write_reg(REG_SYSRANGE_START, 0x00).await?;
        self.stop_variable = self.read_reg(REG_STOP_VARIABLE).await?;
        self.write_reg(REG_SYSRANGE_START, 0x01).await?;
        self.write_reg(REG_INTERNAL_TUNING_2, 0x00).await?;
        self.write_reg(REG_INTERNAL_TUNING_1, 0x00).await?;

        Ok(())
    }

    pub async fn read_id(&mut self) -> Result<u8, &'static str> {
        self.read_reg(REG_IDENTIFICATION_MODEL_ID).await
    }

    /// One single-shot ranging cycle. Fails on bus errors, on a ranging
    /// timeout and on the device's out-of-range sentinel; the caller decides
    /// how to present the failure.
    pub async fn read_distance(&mut self) -> Result<u32, &'static str> {
        self.write_reg(REG_INTERNAL_TUNING_1, 0x01).await?;
        self.write_reg(REG_INTERNAL_TUNING_2, 0x01).await?;
        self.write_reg(REG_SYSRANGE_START, 0x00).await?;
        self.write_reg(REG_STOP_VARIABLE, self.stop_variable).await?;
        self.write_reg(REG_SYSRANGE_START, 0x01).await?;
        self.write_reg(REG_INTERNAL_TUNING_2, 0x00).await?;
        self.write_reg(REG_INTERNAL_TUNING_1, 0x00).await?;

        let mut steps = 0;
        while self.read_reg(REG_SYSRANGE_START).await? & 0x01 != 0 {
            steps += 1;
            if steps > RANGING_TIMEOUT_STEPS {
                return Err("VL53L0X ranging start timeout");
            }
            Timer::after_millis(POLL_STEP).await;
        }

        let mut steps = 0;
        while self.read_reg(REG_RESULT_INTERRUPT_STATUS).await? & 0x07 == 0 {
            steps += 1;
            if steps > RANGING_TIMEOUT_STEPS {
                return Err("VL53L0X ranging timeout");
            }
            Timer::after_millis(POLL_STEP).await;
        }

        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.i2c_address, &[REG_RESULT_RANGE_MM], &mut buf)
            .await
            .map_err(|_| "VL53L0X register read failed")?;

        self.write_reg(REG_SYSTEM_INTERRUPT_CLEAR, 0x01).await?;

        validate_range(u16::from_be_bytes(buf)).ok_or("VL53L0X out of range")
    }

    async fn read_reg(&mut self, reg: u8) -> Result<u8, &'static str> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.i2c_address, &[reg], &mut buf)
            .await
            .map_err(|_| "VL53L0X register read failed")?;
        Ok(buf[0])
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), &'static str> {
        self.i2c
            .write(self.i2c_address, &[reg, value])
            .await
            .map_err(|_| "VL53L0X register write failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_readings_are_rejected() {
        assert_eq!(validate_range(0), Some(0));
        assert_eq!(validate_range(1234), Some(1234));
        assert_eq!(validate_range(8189), Some(8189));
        assert_eq!(validate_range(8190), None);
        assert_eq!(validate_range(8191), None);
    }
}
