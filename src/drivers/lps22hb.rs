use embassy_time::Timer;
use embedded_hal_async::i2c::I2c;

// I2C Address (7-bit)
const LPS22HB_I2C_ADDRESS: u8 = 0x5D;

// Registers
const REG_WHO_AM_I: u8 = 0x0F;
const REG_CTRL_REG1: u8 = 0x10;
const REG_PRESS_OUT_XL: u8 = 0x28;
const REG_TEMP_OUT_L: u8 = 0x2B;

const WHO_AM_I_VALUE: u8 = 0xB1;

// 1 Hz output rate, block data update
const CTRL_REG1_VALUE: u8 = 0x12;

const POWER_UP_DELAY: u64 = 5; // millisec

// Output scaling per datasheet
const PRESSURE_LSB_PER_HPA: f32 = 4096.0;
const TEMPERATURE_LSB_PER_DEGC: f32 = 100.0;

/// Pressure output is a 24-bit two's complement count.
fn pressure_hpa(raw: [u8; 3]) -> f32 {
    let counts = i32::from_le_bytes([raw[0], raw[1], raw[2], 0]) << 8 >> 8;
    counts as f32 / PRESSURE_LSB_PER_HPA
}

fn temperature_degc(raw: i16) -> f32 {
    raw as f32 / TEMPERATURE_LSB_PER_DEGC
}

pub struct Lps22hb<I2C> {
    i2c: I2C,
    i2c_address: u8,
}

impl<I2C: I2c> Lps22hb<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            i2c_address: LPS22HB_I2C_ADDRESS,
        }
    }

    pub async fn init(&mut self) -> Result<(), &'static str> {
        Timer::after_millis(POWER_UP_DELAY).await;

        if self.read_id().await? != WHO_AM_I_VALUE {
            return Err("LPS22HB not detected");
        }

        self.write_reg(REG_CTRL_REG1, CTRL_REG1_VALUE).await
    }

    pub async fn read_id(&mut self) -> Result<u8, &'static str> {
        let mut buf = [0u8; 1];
        self.read_regs(REG_WHO_AM_I, &mut buf).await?;
        Ok(buf[0])
    }

    pub async fn get_pressure(&mut self) -> Result<f32, &'static str> {
        let mut buf = [0u8; 3];
        self.read_regs(REG_PRESS_OUT_XL, &mut buf).await?;
        Ok(pressure_hpa(buf))
    }

    pub async fn get_temperature(&mut self) -> Result<f32, &'static str> {
        let mut buf = [0u8; 2];
        self.read_regs(REG_TEMP_OUT_L, &mut buf).await?;
        Ok(temperature_degc(i16::from_le_bytes(buf)))
    }

    // Register auto-increment (IF_ADD_INC) is enabled out of reset, so
    // multi-byte reads take the plain sub-address.
    async fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), &'static str> {
        self.i2c
            .write_read(self.i2c_address, &[reg], buf)
            .await
            .map_err(|_| "LPS22HB register read failed")
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), &'static str> {
        self.i2c
            .write(self.i2c_address, &[reg, value])
            .await
            .map_err(|_| "LPS22HB register write failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressure_scales_counts_to_hectopascal() {
        // 1000 hPa = 4_096_000 counts = 0x3E8000
        assert_eq!(pressure_hpa([0x00, 0x80, 0x3E]), 1000.0);
        assert_eq!(pressure_hpa([0x00, 0x00, 0x00]), 0.0);
    }

    #[test]
    fn pressure_sign_extends_negative_counts() {
        // -4096 counts = 0xFFF000 as 24-bit two's complement
        assert_eq!(pressure_hpa([0x00, 0xF0, 0xFF]), -1.0);
    }

    #[test]
    fn temperature_scales_counts_to_celsius() {
        assert_eq!(temperature_degc(2345), 23.45);
        assert_eq!(temperature_degc(-520), -5.2);
    }
}
