use embassy_time::Timer;
use embedded_hal_async::i2c::I2c;

// I2C Address (7-bit)
const HTS221_I2C_ADDRESS: u8 = 0x5F;

// Registers
const REG_WHO_AM_I: u8 = 0x0F;
const REG_CTRL_REG1: u8 = 0x20;
const REG_HUMIDITY_OUT_L: u8 = 0x28;
const REG_TEMP_OUT_L: u8 = 0x2A;
const REG_CALIB_START: u8 = 0x30;

const WHO_AM_I_VALUE: u8 = 0xBC;

// Set the sub-address MSB for multi-byte transfers
const AUTO_INCREMENT: u8 = 0x80;

// Power on, block data update, 1 Hz output rate
const CTRL_REG1_VALUE: u8 = 0x85;

const POWER_UP_DELAY: u64 = 5; // millisec

/// Factory calibration block, read once at init. Output registers hold raw
/// ADC counts; readings are linear interpolations against these points.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    h0_rh: f32,
    h1_rh: f32,
    t0_degc: f32,
    t1_degc: f32,
    h0_t0_out: i16,
    h1_t0_out: i16,
    t0_out: i16,
    t1_out: i16,
}

impl Calibration {
    pub fn from_raw(raw: &[u8; 16]) -> Self {
        let t0_msb = (raw[5] & 0x03) as u16;
        let t1_msb = ((raw[5] >> 2) & 0x03) as u16;
        Self {
            h0_rh: raw[0] as f32 / 2.0,
            h1_rh: raw[1] as f32 / 2.0,
            t0_degc: ((t0_msb << 8) | raw[2] as u16) as f32 / 8.0,
            t1_degc: ((t1_msb << 8) | raw[3] as u16) as f32 / 8.0,
            h0_t0_out: i16::from_le_bytes([raw[6], raw[7]]),
            h1_t0_out: i16::from_le_bytes([raw[10], raw[11]]),
            t0_out: i16::from_le_bytes([raw[12], raw[13]]),
            t1_out: i16::from_le_bytes([raw[14], raw[15]]),
        }
    }

    pub fn convert_temperature(&self, raw: i16) -> f32 {
        let span = (self.t1_out - self.t0_out) as f32;
        if span == 0.0 {
            return self.t0_degc;
        }
        self.t0_degc + (raw - self.t0_out) as f32 * (self.t1_degc - self.t0_degc) / span
    }

    pub fn convert_humidity(&self, raw: i16) -> f32 {
        let span = (self.h1_t0_out - self.h0_t0_out) as f32;
        if span == 0.0 {
            return self.h0_rh;
        }
        self.h0_rh + (raw - self.h0_t0_out) as f32 * (self.h1_rh - self.h0_rh) / span
    }
}

pub struct Hts221<I2C> {
    i2c: I2C,
    i2c_address: u8,
    calibration: Option<Calibration>,
}

impl<I2C: I2c> Hts221<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            i2c_address: HTS221_I2C_ADDRESS,
            calibration: None,
        }
    }

    pub async fn init(&mut self) -> Result<(), &'static str> {
        Timer::after_millis(POWER_UP_DELAY).await;

        if self.read_id().await? != WHO_AM_I_VALUE {
            return Err("HTS221 not detected");
        }

        let mut raw = [0u8; 16];
        self.read_regs(REG_CALIB_START, &mut raw).await?;
        self.calibration = Some(Calibration::from_raw(&raw));

        self.write_reg(REG_CTRL_REG1, CTRL_REG1_VALUE).await
    }

    pub async fn read_id(&mut self) -> Result<u8, &'static str> {
        self.read_reg(REG_WHO_AM_I).await
    }

    pub async fn get_temperature(&mut self) -> Result<f32, &'static str> {
        let calibration = self.calibration.ok_or("HTS221 not initialized")?;
        let mut buf = [0u8; 2];
        self.read_regs(REG_TEMP_OUT_L, &mut buf).await?;
        Ok(calibration.convert_temperature(i16::from_le_bytes(buf)))
    }

    pub async fn get_humidity(&mut self) -> Result<f32, &'static str> {
        let calibration = self.calibration.ok_or("HTS221 not initialized")?;
        let mut buf = [0u8; 2];
        self.read_regs(REG_HUMIDITY_OUT_L, &mut buf).await?;
        Ok(calibration.convert_humidity(i16::from_le_bytes(buf)))
    }

    async fn read_reg(&mut self, reg: u8) -> Result<u8, &'static str> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.i2c_address, &[reg], &mut buf)
            .await
            .map_err(|_| "HTS221 register read failed")?;
        Ok(buf[0])
    }

    async fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), &'static str> {
        self.i2c
            .write_read(self.i2c_address, &[reg | AUTO_INCREMENT], buf)
            .await
            .map_err(|_| "HTS221 register read failed")
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), &'static str> {
        self.i2c
            .write(self.i2c_address, &[reg, value])
            .await
            .map_err(|_| "HTS221 register write failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_calibration() -> Calibration {
        // H0 = 30 %rH at 0 counts, H1 = 50 %rH at 1000 counts,
        // T0 = 10 C at 0 counts, T1 = 30 C at 2000 counts.
        let mut raw = [0u8; 16];
        raw[0] = 60;
        raw[1] = 100;
        raw[2] = 80;
        raw[3] = 240;
        raw[10..12].copy_from_slice(&1000i16.to_le_bytes());
        raw[14..16].copy_from_slice(&2000i16.to_le_bytes());
        Calibration::from_raw(&raw)
    }

    #[test]
    fn temperature_interpolates_between_calibration_points() {
        let cal = test_calibration();
        assert_eq!(cal.convert_temperature(0), 10.0);
        assert_eq!(cal.convert_temperature(1000), 20.0);
        assert_eq!(cal.convert_temperature(2000), 30.0);
    }

    #[test]
    fn humidity_interpolates_between_calibration_points() {
        let cal = test_calibration();
        assert_eq!(cal.convert_humidity(0), 30.0);
        assert_eq!(cal.convert_humidity(500), 40.0);
        assert_eq!(cal.convert_humidity(1000), 50.0);
    }

    #[test]
    fn degenerate_calibration_does_not_divide_by_zero() {
        let raw = [0u8; 16];
        let cal = Calibration::from_raw(&raw);
        assert_eq!(cal.convert_temperature(1234), 0.0);
        assert_eq!(cal.convert_humidity(1234), 0.0);
    }
}
