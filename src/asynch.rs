//! Async flavour of the driver, over `embedded-hal-async`.
//!
//! Every blocking method has an `_async` twin with the same transaction
//! sequence and the same validation rules.

use embedded_hal_async::i2c::I2c as AsyncI2c;

use crate::fmt::{debug, trace};
use crate::{
    checked, encode_field, fifo_batch, ll, Apds9960, ColorData, Error, Field, GestureData,
    PhotodiodeMask, Register,
};

impl<I2C, E, Delay> Apds9960<I2C, Delay>
where
    I2C: AsyncI2c<Error = E>,
{
    /// Read `buffer.len()` bytes starting at `register` (async version)
    pub async fn read_async(
        &mut self,
        register: Register,
        buffer: &mut [u8],
    ) -> Result<(), Error<E>> {
        trace!("read {:x}, {} bytes", register as u8, buffer.len());
        self.i2c
            .write(self.address, &[register as u8])
            .await
            .map_err(Error::I2c)?;
        for chunk in buffer.chunks_mut(ll::MAX_BURST) {
            self.i2c
                .read(self.address, chunk)
                .await
                .map_err(Error::I2c)?;
        }
        Ok(())
    }

    /// Write `values` starting at `register` in a single transaction (async version)
    pub async fn write_async(&mut self, register: Register, values: &[u8]) -> Result<(), Error<E>> {
        let len = values.len();
        if len > ll::MAX_BURST {
            debug!("write of {} bytes exceeds burst size", len);
            return Err(Error::InvalidArgument);
        }
        trace!("write {:x}, {} bytes", register as u8, len);

        let mut buf = [0u8; ll::MAX_BURST + 1];
        buf[0] = register as u8;
        buf[1..=len].copy_from_slice(values);
        self.i2c
            .write(self.address, &buf[..=len])
            .await
            .map_err(Error::I2c)
    }

    /// Read-modify-write one register (async version)
    pub async fn and_or_register_async(
        &mut self,
        register: Register,
        and_mask: u8,
        or_mask: u8,
    ) -> Result<(), Error<E>> {
        let value = self.read_byte_async(register).await?;
        self.write_byte_async(register, (value & and_mask) | or_mask)
            .await
    }

    /// Send only the register address, with no payload (async version)
    pub async fn address_access_async(&mut self, register: Register) -> Result<(), Error<E>> {
        trace!("address access {:x}", register as u8);
        self.i2c
            .write(self.address, &[register as u8])
            .await
            .map_err(Error::I2c)
    }

    async fn read_byte_async(&mut self, register: Register) -> Result<u8, Error<E>> {
        let mut buf = [0u8; 1];
        self.read_async(register, &mut buf).await?;
        Ok(buf[0])
    }

    async fn write_byte_async(&mut self, register: Register, value: u8) -> Result<(), Error<E>> {
        self.write_async(register, &[value]).await
    }

    async fn modify_async(&mut self, field: Field, value: u8) -> Result<(), Error<E>> {
        let bits = encode_field(field, value)?;
        self.and_or_register_async(field.register, !field.mask(), bits)
            .await
    }

    async fn set_flag_async(&mut self, field: Field, enable: bool) -> Result<(), Error<E>> {
        self.modify_async(field, enable as u8).await
    }

    // Device

    /// Read the ID register (async version)
    pub async fn read_device_id_async(&mut self) -> Result<u8, Error<E>> {
        self.read_byte_async(Register::Id).await
    }

    /// Put the chip to sleep after an interrupt is raised (async version)
    pub async fn set_sleep_after_interrupt_async(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag_async(ll::SAI, enable).await
    }

    /// Set the proximity LED drive strength (async version)
    pub async fn set_led_drive_async(&mut self, led_drive: u8) -> Result<(), Error<E>> {
        self.modify_async(ll::LDRIVE, led_drive).await
    }

    /// Set the LED boost (async version)
    pub async fn set_led_boost_async(&mut self, led_boost: u8) -> Result<(), Error<E>> {
        self.modify_async(ll::LED_BOOST, led_boost).await
    }

    /// Refresh the cached STATUS byte (async version)
    pub async fn update_status_async(&mut self) -> Result<(), Error<E>> {
        let status = self.read_byte_async(Register::Status).await?;
        self.device_status = status;
        Ok(())
    }

    /// Force an interrupt (async version)
    pub async fn force_interrupt_async(&mut self) -> Result<(), Error<E>> {
        self.address_access_async(Register::Iforce).await
    }

    /// Clear the proximity and ALS interrupts in one access (async version)
    pub async fn clear_all_non_gesture_interrupts_async(&mut self) -> Result<(), Error<E>> {
        self.address_access_async(Register::Ciclear).await
    }

    // Proximity engine

    /// Enable or disable the proximity engine (async version)
    pub async fn enable_proximity_engine_async(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag_async(ll::PEN, enable).await
    }

    /// Enable or disable proximity threshold interrupts (async version)
    pub async fn enable_proximity_interrupts_async(
        &mut self,
        enable: bool,
    ) -> Result<(), Error<E>> {
        self.set_flag_async(ll::PIEN, enable).await
    }

    /// Enable or disable proximity saturation interrupts (async version)
    pub async fn enable_proximity_saturation_interrupts_async(
        &mut self,
        enable: bool,
    ) -> Result<(), Error<E>> {
        self.set_flag_async(ll::PSIEN, enable).await
    }

    /// Clear a pending proximity interrupt (async version)
    pub async fn clear_proximity_interrupts_async(&mut self) -> Result<(), Error<E>> {
        self.address_access_async(Register::Piclear).await
    }

    /// Set the proximity gain (async version)
    pub async fn set_proximity_gain_async(&mut self, gain: u8) -> Result<(), Error<E>> {
        self.modify_async(ll::PGAIN, gain).await
    }

    /// Set the proximity interrupt thresholds (async version)
    pub async fn set_proximity_interrupt_thresholds_async(
        &mut self,
        low: u8,
        high: u8,
    ) -> Result<(), Error<E>> {
        self.write_byte_async(Register::Pilt, low).await?;
        self.write_byte_async(Register::Piht, high).await
    }

    /// Set the proximity interrupt persistence (async version)
    pub async fn set_proximity_interrupt_persistence_async(
        &mut self,
        persistence: u8,
    ) -> Result<(), Error<E>> {
        self.modify_async(ll::PPERS, persistence).await
    }

    /// Set the proximity pulse count and length (async version)
    pub async fn set_proximity_pulse_count_and_length_async(
        &mut self,
        pulse_count: u8,
        pulse_length: u8,
    ) -> Result<(), Error<E>> {
        let value = checked(
            ll::encode_pulse(pulse_count, pulse_length),
            "proximity pulse",
        )?;
        self.write_byte_async(Register::Ppulse, value).await
    }

    /// Set the proximity offset corrections (async version)
    pub async fn set_proximity_offset_async(
        &mut self,
        up_right: i8,
        down_left: i8,
    ) -> Result<(), Error<E>> {
        let up_right = checked(ll::encode_offset(up_right), "up/right offset")?;
        let down_left = checked(ll::encode_offset(down_left), "down/left offset")?;

        self.write_byte_async(Register::PoffsetUr, up_right).await?;
        self.write_byte_async(Register::PoffsetDl, down_left).await
    }

    /// Mask photodiodes out of the proximity measurement (async version)
    pub async fn disable_photodiodes_async(
        &mut self,
        mask: PhotodiodeMask,
        gain_compensation: bool,
    ) -> Result<(), Error<E>> {
        let value = (gain_compensation as u8) << ll::PCMP.shift | mask.bits() << ll::PMASK.shift;
        self.and_or_register_async(
            Register::Config3,
            !(ll::PCMP.mask() | ll::PMASK.mask()),
            value,
        )
        .await
    }

    /// Refresh the cached proximity count (async version)
    pub async fn update_proximity_data_async(&mut self) -> Result<(), Error<E>> {
        let proximity = self.read_byte_async(Register::Pdata).await?;
        self.proximity_data = proximity;
        Ok(())
    }

    // ALS engine

    /// Enable or disable the ALS/color engine (async version)
    pub async fn enable_als_engine_async(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag_async(ll::AEN, enable).await
    }

    /// Enable or disable ALS threshold interrupts (async version)
    pub async fn enable_als_interrupts_async(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag_async(ll::AIEN, enable).await
    }

    /// Enable or disable clear photodiode saturation interrupts (async version)
    pub async fn enable_als_saturation_interrupts_async(
        &mut self,
        enable: bool,
    ) -> Result<(), Error<E>> {
        self.set_flag_async(ll::CPSIEN, enable).await
    }

    /// Clear a pending ALS interrupt (async version)
    pub async fn clear_als_interrupts_async(&mut self) -> Result<(), Error<E>> {
        self.address_access_async(Register::Aiclear).await
    }

    /// Set the ALS/color gain (async version)
    pub async fn set_als_gain_async(&mut self, gain: u8) -> Result<(), Error<E>> {
        self.modify_async(ll::AGAIN, gain).await
    }

    /// Set the clear channel interrupt thresholds (async version)
    pub async fn set_als_thresholds_async(&mut self, low: u16, high: u16) -> Result<(), Error<E>> {
        let [low_l, low_h] = low.to_le_bytes();
        let [high_l, high_h] = high.to_le_bytes();
        self.write_async(Register::Ailtl, &[low_l, low_h, high_l, high_h])
            .await
    }

    /// Set the ALS interrupt persistence (async version)
    pub async fn set_als_interrupt_persistence_async(
        &mut self,
        persistence: u8,
    ) -> Result<(), Error<E>> {
        self.modify_async(ll::APERS, persistence).await
    }

    /// Set the ALS integration time in milliseconds (async version)
    pub async fn set_als_integration_time_async(&mut self, time_ms: f32) -> Result<(), Error<E>> {
        let value = checked(ll::encode_cycle_time(time_ms), "integration time")?;
        self.write_byte_async(Register::Atime, value).await
    }

    /// Refresh the cached saturation count (async version)
    pub async fn update_saturation_async(&mut self) -> Result<(), Error<E>> {
        let atime = self.read_byte_async(Register::Atime).await?;
        self.als_saturation = ll::als_saturation(atime);
        Ok(())
    }

    /// Refresh the cached color channels (async version)
    pub async fn update_color_data_async(&mut self) -> Result<(), Error<E>> {
        let mut buf = [0u8; 8];
        self.read_async(Register::Cdatal, &mut buf).await?;
        self.color = ColorData::from_bytes(&buf);
        Ok(())
    }

    // Gesture engine

    /// Enable or disable the gesture engine, proximity first (async version)
    pub async fn enable_gestures_engine_async(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.enable_proximity_engine_async(true).await?;
        self.set_flag_async(ll::GEN, enable).await
    }

    /// Start the gesture state machine immediately (async version)
    pub async fn enter_immediately_gesture_engine_async(&mut self) -> Result<(), Error<E>> {
        self.set_flag_async(ll::GMODE, true).await
    }

    /// Leave the gesture state machine (async version)
    pub async fn exit_gesture_engine_async(&mut self) -> Result<(), Error<E>> {
        self.set_flag_async(ll::GMODE, false).await
    }

    /// Set the gesture proximity enter threshold (async version)
    pub async fn set_gesture_prox_enter_threshold_async(
        &mut self,
        threshold: u8,
    ) -> Result<(), Error<E>> {
        self.write_byte_async(Register::Gpenth, threshold).await
    }

    /// Set the gesture exit threshold (async version)
    pub async fn set_gesture_exit_threshold_async(
        &mut self,
        threshold: u8,
    ) -> Result<(), Error<E>> {
        self.write_byte_async(Register::Gexth, threshold).await
    }

    /// Set the gesture exit mask (async version)
    pub async fn set_gesture_exit_mask_async(
        &mut self,
        mask: PhotodiodeMask,
    ) -> Result<(), Error<E>> {
        self.modify_async(ll::GEXMSK, mask.bits()).await
    }

    /// Set the gesture exit persistence (async version)
    pub async fn set_gesture_exit_persistence_async(
        &mut self,
        persistence: u8,
    ) -> Result<(), Error<E>> {
        self.modify_async(ll::GEXPERS, persistence).await
    }

    /// Set the gesture gain (async version)
    pub async fn set_gesture_gain_async(&mut self, gain: u8) -> Result<(), Error<E>> {
        self.modify_async(ll::GGAIN, gain).await
    }

    /// Set the gesture LED drive strength (async version)
    pub async fn set_gesture_led_drive_async(&mut self, led_drive: u8) -> Result<(), Error<E>> {
        self.modify_async(ll::GLDRIVE, led_drive).await
    }

    /// Set the gesture wait time (async version)
    pub async fn set_gesture_wait_time_async(&mut self, wait_time: u8) -> Result<(), Error<E>> {
        self.modify_async(ll::GWTIME, wait_time).await
    }

    /// Set the per-direction gesture offsets (async version)
    pub async fn set_gesture_offsets_async(
        &mut self,
        up: i8,
        down: i8,
        left: i8,
        right: i8,
    ) -> Result<(), Error<E>> {
        let offsets = [
            (Register::GoffsetU, checked(ll::encode_offset(up), "up offset")?),
            (Register::GoffsetD, checked(ll::encode_offset(down), "down offset")?),
            (Register::GoffsetL, checked(ll::encode_offset(left), "left offset")?),
            (Register::GoffsetR, checked(ll::encode_offset(right), "right offset")?),
        ];
        for (register, value) in offsets {
            self.write_byte_async(register, value).await?;
        }
        Ok(())
    }

    /// Set the gesture pulse count and length (async version)
    pub async fn set_gesture_pulse_count_and_length_async(
        &mut self,
        pulse_count: u8,
        pulse_length: u8,
    ) -> Result<(), Error<E>> {
        let value = checked(ll::encode_pulse(pulse_count, pulse_length), "gesture pulse")?;
        self.write_byte_async(Register::Gpulse, value).await
    }

    /// Select which photodiode pairs collect gesture data (async version)
    pub async fn set_active_photodiodes_pairs_async(
        &mut self,
        up_down_active: bool,
        left_right_active: bool,
    ) -> Result<(), Error<E>> {
        self.modify_async(
            ll::GDIMS,
            (left_right_active as u8) << 1 | up_down_active as u8,
        )
        .await
    }

    /// Enable or disable the gesture interrupt (async version)
    pub async fn enable_gesture_interrupts_async(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag_async(ll::GIEN, enable).await
    }

    /// Set the gesture FIFO interrupt threshold (async version)
    pub async fn set_gesture_fifo_threshold_async(
        &mut self,
        threshold: u8,
    ) -> Result<(), Error<E>> {
        self.modify_async(ll::GFIFOTH, threshold).await
    }

    /// Clear the gesture FIFO and its interrupt (async version)
    pub async fn clear_gesture_engine_interrupts_async(&mut self) -> Result<(), Error<E>> {
        self.set_flag_async(ll::GFIFO_CLR, true).await
    }

    /// Refresh the cached gesture engine running flag (async version)
    pub async fn check_gesture_engine_running_async(&mut self) -> Result<(), Error<E>> {
        let gconf4 = self.read_byte_async(Register::Gconf4).await?;
        self.gesture_engine_running = ll::GMODE.decode(gconf4) != 0;
        Ok(())
    }

    /// Refresh the cached gesture FIFO level (async version)
    pub async fn update_number_of_datasets_in_fifo_async(&mut self) -> Result<(), Error<E>> {
        let level = self.read_byte_async(Register::Gflvl).await?;
        self.datasets_in_fifo = level;
        Ok(())
    }

    /// Refresh the cached gesture status flags (async version)
    pub async fn update_gesture_status_async(&mut self) -> Result<(), Error<E>> {
        let raw = self.read_byte_async(Register::Gstatus).await?;
        self.store_gesture_status(raw);
        Ok(())
    }

    /// Pop one dataset from the gesture FIFO into the cache (async version)
    pub async fn update_gesture_data_async(&mut self) -> Result<(), Error<E>> {
        let mut buf = [0u8; 4];
        self.read_async(Register::GfifoU, &mut buf).await?;
        self.gesture_data = GestureData::from_bytes(&buf);
        Ok(())
    }

    /// Drain up to `out.len()` datasets from the gesture FIFO (async version)
    pub async fn read_gesture_fifo_async(
        &mut self,
        out: &mut [GestureData],
    ) -> Result<usize, Error<E>> {
        let level = self.read_byte_async(Register::Gflvl).await?;
        let count = fifo_batch(level, out.len());

        let mut raw = [0u8; ll::GESTURE_FIFO_DEPTH * 4];
        let raw = &mut raw[..count * 4];
        if count > 0 {
            self.read_async(Register::GfifoU, raw).await?;
        }
        Ok(self.store_gesture_fifo(level, raw, out))
    }

    // Wait engine

    /// Enable or disable the wait engine (async version)
    pub async fn enable_wait_engine_async(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag_async(ll::WEN, enable).await
    }

    /// Set the wait time and the long-wait multiplier (async version)
    pub async fn set_wait_time_async(
        &mut self,
        time_ms: f32,
        long_wait: bool,
    ) -> Result<(), Error<E>> {
        let value = checked(ll::encode_cycle_time(time_ms), "wait time")?;
        self.set_flag_async(ll::WLONG, long_wait).await?;
        self.write_byte_async(Register::Wtime, value).await
    }
}

impl<I2C, E, Delay> Apds9960<I2C, Delay>
where
    I2C: AsyncI2c<Error = E>,
    Delay: embedded_hal_async::delay::DelayNs,
{
    /// Power the chip on or off, then wait for it to settle (async version)
    pub async fn wake_up_async(&mut self, wake_up: bool) -> Result<(), Error<E>> {
        let result = self.set_flag_async(ll::PON, wake_up).await;
        self.delay.delay_ms(10).await;
        result
    }

    /// Power on with every engine running, or switch everything off (async version)
    pub async fn enable_all_engines_and_power_up_async(
        &mut self,
        enable: bool,
    ) -> Result<(), Error<E>> {
        let value = if enable { ll::ENABLE_ALL_ENGINES } else { 0 };
        let result = self.write_byte_async(Register::Enable, value).await;
        self.delay.delay_ms(10).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::delay::{CheckedDelay, Transaction as DelayTransaction};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use futures::executor::block_on;
    extern crate std;
    use std::vec;
    use std::vec::Vec;

    const ADDR: u8 = ll::I2C_ADDRESS;

    #[test]
    fn color_data_async() {
        let expectations = [
            I2cTransaction::write(ADDR, vec![Register::Cdatal as u8]),
            I2cTransaction::read(ADDR, vec![0x34, 0x12, 0x78, 0x56, 0xBC, 0x9A, 0xF0, 0xDE]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut sensor = Apds9960::new(i2c);
        block_on(sensor.update_color_data_async()).unwrap();
        assert_eq!(sensor.color().blue, 0xDEF0);
        assert_eq!(sensor.color().clear, 0x1234);
        let mut i2c = sensor.destroy();
        i2c.done();
    }

    #[test]
    fn read_async_bursts_in_32_byte_chunks() {
        let data: Vec<u8> = (0..64).collect();
        let expectations = [
            I2cTransaction::write(ADDR, vec![Register::GfifoU as u8]),
            I2cTransaction::read(ADDR, data[..32].to_vec()),
            I2cTransaction::read(ADDR, data[32..].to_vec()),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut sensor = Apds9960::new(i2c);
        let mut buf = [0u8; 64];
        block_on(sensor.read_async(Register::GfifoU, &mut buf)).unwrap();
        assert_eq!(&buf[..], &data[..]);
        let mut i2c = sensor.destroy();
        i2c.done();
    }

    #[test]
    fn gestures_engine_async_stops_on_proximity_failure() {
        let expectations = [
            I2cTransaction::write(ADDR, vec![Register::Enable as u8]).with_error(ErrorKind::Other),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut sensor = Apds9960::new(i2c);
        assert!(matches!(
            block_on(sensor.enable_gestures_engine_async(true)),
            Err(Error::I2c(_))
        ));
        let mut i2c = sensor.destroy();
        i2c.done();
    }

    #[test]
    fn invalid_arguments_async_issue_nothing() {
        let i2c = I2cMock::new(&[]);
        let mut sensor = Apds9960::new(i2c);
        assert!(matches!(
            block_on(sensor.set_led_drive_async(4)),
            Err(Error::InvalidArgument)
        ));
        assert!(matches!(
            block_on(sensor.set_wait_time_async(0.5, true)),
            Err(Error::InvalidArgument)
        ));
        assert!(matches!(
            block_on(sensor.set_gesture_offsets_async(0, 0, i8::MIN, 0)),
            Err(Error::InvalidArgument)
        ));
        let mut i2c = sensor.destroy();
        i2c.done();
    }

    #[test]
    fn field_setter_async_read_modify_write() {
        let expectations = [
            I2cTransaction::write(ADDR, vec![Register::Gconf2 as u8]),
            I2cTransaction::read(ADDR, vec![0xFF]),
            I2cTransaction::write(ADDR, vec![Register::Gconf2 as u8, 0xEF]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut sensor = Apds9960::new(i2c);
        block_on(sensor.set_gesture_led_drive_async(crate::LedDrive::Ma50 as u8)).unwrap();
        let mut i2c = sensor.destroy();
        i2c.done();
    }

    #[test]
    fn power_sequencing_async_settles_for_10ms() {
        let expectations = [
            I2cTransaction::write(ADDR, vec![Register::Enable as u8]),
            I2cTransaction::read(ADDR, vec![0x00]),
            I2cTransaction::write(ADDR, vec![Register::Enable as u8, 0x01]),
            I2cTransaction::write(ADDR, vec![Register::Enable as u8, 0x4F]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut delay = CheckedDelay::new(&[
            DelayTransaction::delay_ms(10),
            DelayTransaction::delay_ms(10),
        ]);
        let mut sensor = Apds9960::new_with_delay(i2c, delay.clone());
        block_on(sensor.wake_up_async(true)).unwrap();
        block_on(sensor.enable_all_engines_and_power_up_async(true)).unwrap();
        let mut i2c = sensor.destroy();
        i2c.done();
        delay.done();
    }

    #[test]
    fn power_sequencing_async_settles_after_enable_nack() {
        let expectations = [
            I2cTransaction::write(ADDR, vec![Register::Enable as u8]).with_error(ErrorKind::Other),
            I2cTransaction::write(ADDR, vec![Register::Enable as u8, 0x00])
                .with_error(ErrorKind::Other),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut delay = CheckedDelay::new(&[
            DelayTransaction::delay_ms(10),
            DelayTransaction::delay_ms(10),
        ]);
        let mut sensor = Apds9960::new_with_delay(i2c, delay.clone());
        assert!(matches!(
            block_on(sensor.wake_up_async(false)),
            Err(Error::I2c(_))
        ));
        assert!(matches!(
            block_on(sensor.enable_all_engines_and_power_up_async(false)),
            Err(Error::I2c(_))
        ));
        let mut i2c = sensor.destroy();
        i2c.done();
        delay.done();
    }
}
