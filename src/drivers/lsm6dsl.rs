use embassy_time::Timer;
use embedded_hal_async::i2c::I2c;

// I2C Address (7-bit, SDO/SA0 high)
const LSM6DSL_I2C_ADDRESS: u8 = 0x6A;

// Registers
const REG_WHO_AM_I: u8 = 0x0F;
const REG_CTRL1_XL: u8 = 0x10;
const REG_CTRL2_G: u8 = 0x11;
const REG_CTRL3_C: u8 = 0x12;
const REG_OUTX_L_G: u8 = 0x22;
const REG_OUTX_L_XL: u8 = 0x28;

const WHO_AM_I_VALUE: u8 = 0x6A;

// 104 Hz, +/-2 g
const CTRL1_XL_VALUE: u8 = 0x40;
// 104 Hz, +/-2000 dps
const CTRL2_G_VALUE: u8 = 0x4C;
// Block data update, register auto-increment
const CTRL3_C_VALUE: u8 = 0x44;

const POWER_UP_DELAY: u64 = 15; // millisec

// Sensitivities for the ranges above
const ACCEL_SENSITIVITY_UG_PER_LSB: i32 = 61;
const GYRO_SENSITIVITY_MDPS_PER_LSB: i32 = 70;

fn accel_mg(raw: i16) -> i32 {
    i32::from(raw) * ACCEL_SENSITIVITY_UG_PER_LSB / 1000
}

fn gyro_mdps(raw: i16) -> i32 {
    i32::from(raw) * GYRO_SENSITIVITY_MDPS_PER_LSB
}

fn unpack_axes(buf: [u8; 6], scale: fn(i16) -> i32) -> [i32; 3] {
    [
        scale(i16::from_le_bytes([buf[0], buf[1]])),
        scale(i16::from_le_bytes([buf[2], buf[3]])),
        scale(i16::from_le_bytes([buf[4], buf[5]])),
    ]
}

pub struct Lsm6dsl<I2C> {
    i2c: I2C,
    i2c_address: u8,
}

impl<I2C: I2c> Lsm6dsl<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            i2c_address: LSM6DSL_I2C_ADDRESS,
        }
    }

    /// Identify the part and set the common control bits. The accelerometer
    /// and gyroscope stay powered down until their enables are called.
    pub async fn init(&mut self) -> Result<(), &'static str> {
        Timer::after_millis(POWER_UP_DELAY).await;

        if self.read_id().await? != WHO_AM_I_VALUE {
            return Err("LSM6DSL not detected");
        }

        self.write_reg(REG_CTRL3_C, CTRL3_C_VALUE).await
    }

    pub async fn enable_accel(&mut self) -> Result<(), &'static str> {
        self.write_reg(REG_CTRL1_XL, CTRL1_XL_VALUE).await
    }

    pub async fn enable_gyro(&mut self) -> Result<(), &'static str> {
        self.write_reg(REG_CTRL2_G, CTRL2_G_VALUE).await
    }

    pub async fn read_id(&mut self) -> Result<u8, &'static str> {
        let mut buf = [0u8; 1];
        self.read_regs(REG_WHO_AM_I, &mut buf).await?;
        Ok(buf[0])
    }

    /// Acceleration on X/Y/Z in milli-g.
    pub async fn get_accel_axes(&mut self) -> Result<[i32; 3], &'static str> {
        let mut buf = [0u8; 6];
        self.read_regs(REG_OUTX_L_XL, &mut buf).await?;
        Ok(unpack_axes(buf, accel_mg))
    }

    /// Angular rate on X/Y/Z in milli-degrees per second.
    pub async fn get_gyro_axes(&mut self) -> Result<[i32; 3], &'static str> {
        let mut buf = [0u8; 6];
        self.read_regs(REG_OUTX_L_G, &mut buf).await?;
        Ok(unpack_axes(buf, gyro_mdps))
    }

    async fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), &'static str> {
        self.i2c
            .write_read(self.i2c_address, &[reg], buf)
            .await
            .map_err(|_| "LSM6DSL register read failed")
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), &'static str> {
        self.i2c
            .write(self.i2c_address, &[reg, value])
            .await
            .map_err(|_| "LSM6DSL register write failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accel_counts_scale_to_milli_g() {
        // 1 g at +/-2 g range is 16384 counts
        assert_eq!(accel_mg(16384), 999);
        assert_eq!(accel_mg(-16384), -999);
        assert_eq!(accel_mg(0), 0);
    }

    #[test]
    fn gyro_counts_scale_to_milli_dps() {
        assert_eq!(gyro_mdps(100), 7000);
        assert_eq!(gyro_mdps(-1), -70);
    }

    #[test]
    fn axes_unpack_little_endian_triplets() {
        let buf = [0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80];
        assert_eq!(unpack_axes(buf, gyro_mdps), [70, -70, -32768 * 70]);
    }
}
