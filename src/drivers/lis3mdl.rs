use embassy_time::Timer;
use embedded_hal_async::i2c::I2c;

// I2C Address (7-bit)
const LIS3MDL_I2C_ADDRESS: u8 = 0x1E;

// Registers
const REG_WHO_AM_I: u8 = 0x0F;
const REG_CTRL_REG1: u8 = 0x20;
const REG_CTRL_REG2: u8 = 0x21;
const REG_CTRL_REG3: u8 = 0x22;
const REG_CTRL_REG4: u8 = 0x23;
const REG_OUT_X_L: u8 = 0x28;

const WHO_AM_I_VALUE: u8 = 0x3D;

// Set the sub-address MSB for multi-byte transfers
const AUTO_INCREMENT: u8 = 0x80;

// Ultra-high-performance X/Y, 10 Hz
const CTRL_REG1_VALUE: u8 = 0x70;
// +/-4 gauss
const CTRL_REG2_VALUE: u8 = 0x00;
// Continuous-conversion mode
const CTRL_REG3_VALUE: u8 = 0x00;
// Ultra-high-performance Z
const CTRL_REG4_VALUE: u8 = 0x0C;

const POWER_UP_DELAY: u64 = 10; // millisec

// 6842 LSB/gauss at the +/-4 gauss range
const SENSITIVITY_LSB_PER_GAUSS: i32 = 6842;

fn mag_mgauss(raw: i16) -> i32 {
    i32::from(raw) * 1000 / SENSITIVITY_LSB_PER_GAUSS
}

pub struct Lis3mdl<I2C> {
    i2c: I2C,
    i2c_address: u8,
}

impl<I2C: I2c> Lis3mdl<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            i2c_address: LIS3MDL_I2C_ADDRESS,
        }
    }

    pub async fn init(&mut self) -> Result<(), &'static str> {
        Timer::after_millis(POWER_UP_DELAY).await;

        if self.read_id().await? != WHO_AM_I_VALUE {
            return Err("LIS3MDL not detected");
        }

        self.write_reg(REG_CTRL_REG1, CTRL_REG1_VALUE).await?;
        self.write_reg(REG_CTRL_REG2, CTRL_REG2_VALUE).await?;
        self.write_reg(REG_CTRL_REG4, CTRL_REG4_VALUE).await?;
        self.write_reg(REG_CTRL_REG3, CTRL_REG3_VALUE).await
    }

    pub async fn read_id(&mut self) -> Result<u8, &'static str> {
        let mut buf = [0u8; 1];
        self.read_regs(REG_WHO_AM_I, &mut buf).await?;
        Ok(buf[0])
    }

    /// Magnetic field on X/Y/Z in milli-gauss.
    pub async fn get_axes(&mut self) -> Result<[i32; 3], &'static str> {
        let mut buf = [0u8; 6];
        self.read_regs(REG_OUT_X_L, &mut buf).await?;
        Ok([
            mag_mgauss(i16::from_le_bytes([buf[0], buf[1]])),
            mag_mgauss(i16::from_le_bytes([buf[2], buf[3]])),
            mag_mgauss(i16::from_le_bytes([buf[4], buf[5]])),
        ])
    }

    async fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), &'static str> {
        self.i2c
            .write_read(self.i2c_address, &[reg | AUTO_INCREMENT], buf)
            .await
            .map_err(|_| "LIS3MDL register read failed")
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), &'static str> {
        self.i2c
            .write(self.i2c_address, &[reg, value])
            .await
            .map_err(|_| "LIS3MDL register write failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mag_counts_scale_to_milli_gauss() {
        assert_eq!(mag_mgauss(6842), 1000);
        assert_eq!(mag_mgauss(-6842), -1000);
        assert_eq!(mag_mgauss(0), 0);
        assert_eq!(mag_mgauss(342), 49);
    }
}
