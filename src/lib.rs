//! # APDS-9960 Proximity, Ambient Light, RGB and Gesture Sensor Driver
//!
//! This is a platform-agnostic Rust driver for the APDS-9960 digital proximity, ambient light,
//! RGB and gesture sensor, built using the [`embedded-hal`] traits for I2C communication.
//!
//! The APDS-9960 packs four engines behind one register map:
//! - Proximity detection with programmable LED drive, gain, pulses and offsets
//! - Ambient light and RGB color sensing (four 16-bit channels)
//! - Gesture detection with a 32-dataset up/down/left/right FIFO
//! - A wait engine that spaces measurement cycles
//! - I2C interface (address 0x39)
//!
//! ## Features
//!
//! - **Register-level façade**: `read`, `write`, `and_or_register` and `address_access`
//! - **Validated setters**: out-of-range arguments never reach the bus
//! - **Cached readings**: `update_*` calls refresh the values returned by the getters
//! - **Async/await support** with feature gating (optional)
//! - **Logging** through `log` or `defmt` (optional)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use apds9960::{AlsGain, Apds9960, LedDrive};
//!
//! # fn main() -> Result<(), apds9960::Error<embedded_hal::i2c::ErrorKind>> {
//! # let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
//! # let delay = embedded_hal_mock::eh1::delay::NoopDelay;
//! let mut sensor = Apds9960::new_with_delay(i2c, delay);
//!
//! // Power up with every engine running
//! sensor.enable_all_engines_and_power_up(true)?;
//!
//! // Configure the light sensor
//! sensor.set_led_drive(LedDrive::Ma100 as u8)?;
//! sensor.set_als_gain(AlsGain::X4 as u8)?;
//! sensor.set_als_integration_time(100.0)?;
//!
//! // Read color data
//! sensor.update_color_data()?;
//! let color = sensor.color();
//! // println!("C: {} R: {} G: {} B: {}", color.clear, color.red, color.green, color.blue);
//! # let _ = color;
//! # Ok(())
//! # }
//! ```
//!
//! ## Async Usage
//!
//! Enable the `async` feature to use async/await patterns:
//!
//! ```toml
//! [dependencies]
//! apds9960 = { version = "0.1", features = ["async"] }
//! ```
//!
//! ```rust,ignore
//! use apds9960::{Apds9960, ProximityGain};
//!
//! let i2c = /* your async I2C implementation */;
//! let mut sensor = Apds9960::new(i2c);
//!
//! sensor.enable_proximity_engine_async(true).await.unwrap();
//! sensor.set_proximity_gain_async(ProximityGain::X4 as u8).await.unwrap();
//! sensor.update_proximity_data_async().await.unwrap();
//! println!("Proximity: {}", sensor.proximity());
//! ```
//!
//! ## Sharing the bus
//!
//! Multi-step operations such as [`Apds9960::and_or_register`] are not atomic on the bus.
//! The driver owns its bus and every method takes `&mut self`, which serializes access to one
//! sensor. When the bus is shared through an `embedded-hal-bus` device, the bus is only locked
//! per transaction: any other master touching this chip between the read and the write of a
//! read-modify-write will be overwritten.
//!
//! ## Register layer
//!
//! The register map in [`ll`] is a hand-kept `const` table of addresses and bit fields.
//! The bus primitives work at the level of raw masks and payload-free accesses, below what a
//! generated register interface would expose.
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal

#![no_std]
#![deny(missing_docs)]

mod fmt; // must come before the modules using its macros

#[cfg(feature = "async")]
mod asynch;
pub mod ll;

use embedded_hal::i2c::I2c;

use fmt::{debug, trace, warn};
pub use ll::{Field, Register, DEVICE_ID, I2C_ADDRESS};

/// LED drive strength, used by both the proximity and the gesture engine
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum LedDrive {
    /// 100 mA
    Ma100 = 0b00,
    /// 50 mA
    Ma50 = 0b01,
    /// 25 mA
    Ma25 = 0b10,
    /// 12.5 mA
    Ma12_5 = 0b11,
}

/// Additional LED current during proximity and gesture pulses
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum LedBoost {
    /// 100%
    Percent100 = 0b00,
    /// 150%
    Percent150 = 0b01,
    /// 200%
    Percent200 = 0b10,
    /// 300%
    Percent300 = 0b11,
}

/// Proximity gain, also used for the gesture gain
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum ProximityGain {
    /// 1x gain
    X1 = 0b00,
    /// 2x gain
    X2 = 0b01,
    /// 4x gain
    X4 = 0b10,
    /// 8x gain
    X8 = 0b11,
}

/// ALS and color gain
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum AlsGain {
    /// 1x gain
    X1 = 0b00,
    /// 4x gain
    X4 = 0b01,
    /// 16x gain
    X16 = 0b10,
    /// 64x gain
    X64 = 0b11,
}

/// LED pulse length for proximity and gesture pulses
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum PulseLength {
    /// 4 µs
    Us4 = 0b00,
    /// 8 µs
    Us8 = 0b01,
    /// 16 µs
    Us16 = 0b10,
    /// 32 µs
    Us32 = 0b11,
}

/// Number of consecutive gesture-end events before the gesture engine exits
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum GestureExitPersistence {
    /// First gesture end
    After1 = 0b00,
    /// Second gesture end
    After2 = 0b01,
    /// Fourth gesture end
    After4 = 0b10,
    /// Seventh gesture end
    After7 = 0b11,
}

/// Time between gesture detection cycles
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum GestureWaitTime {
    /// 0 ms
    Ms0 = 0b000,
    /// 2.8 ms
    Ms2_8 = 0b001,
    /// 5.6 ms
    Ms5_6 = 0b010,
    /// 8.4 ms
    Ms8_4 = 0b011,
    /// 14 ms
    Ms14 = 0b100,
    /// 22.4 ms
    Ms22_4 = 0b101,
    /// 30.8 ms
    Ms30_8 = 0b110,
    /// 39.2 ms
    Ms39_2 = 0b111,
}

/// Number of datasets in the gesture FIFO that raises the gesture interrupt
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum FifoThreshold {
    /// Interrupt after 1 dataset
    Datasets1 = 0b00,
    /// Interrupt after 4 datasets
    Datasets4 = 0b01,
    /// Interrupt after 8 datasets
    Datasets8 = 0b10,
    /// Interrupt after 16 datasets
    Datasets16 = 0b11,
}

/// Clear, red, green and blue channel counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct ColorData {
    /// Clear channel
    pub clear: u16,
    /// Red channel
    pub red: u16,
    /// Green channel
    pub green: u16,
    /// Blue channel
    pub blue: u16,
}

impl ColorData {
    fn from_bytes(buf: &[u8; 8]) -> Self {
        Self {
            clear: ll::le_u16(buf[0], buf[1]),
            red: ll::le_u16(buf[2], buf[3]),
            green: ll::le_u16(buf[4], buf[5]),
            blue: ll::le_u16(buf[6], buf[7]),
        }
    }
}

/// One gesture FIFO dataset
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct GestureData {
    /// Up photodiode count
    pub up: u8,
    /// Down photodiode count
    pub down: u8,
    /// Left photodiode count
    pub left: u8,
    /// Right photodiode count
    pub right: u8,
}

impl GestureData {
    fn from_bytes(buf: &[u8]) -> Self {
        Self {
            up: buf[0],
            down: buf[1],
            left: buf[2],
            right: buf[3],
        }
    }
}

/// Device status flags, decoded from the STATUS register
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct StatusInfo {
    /// Clear photodiode saturated
    pub clear_photodiode_saturation: bool,
    /// Analog saturation during a proximity or gesture cycle
    pub proximity_gesture_saturation: bool,
    /// Proximity interrupt asserted
    pub proximity_interrupt: bool,
    /// ALS interrupt asserted
    pub als_interrupt: bool,
    /// Gesture interrupt asserted
    pub gesture_interrupt: bool,
    /// A proximity cycle completed since PDATA was last read
    pub proximity_valid: bool,
    /// An ALS cycle completed since the color data was last read
    pub als_valid: bool,
}

impl From<u8> for StatusInfo {
    fn from(status: u8) -> Self {
        Self {
            clear_photodiode_saturation: status & 0x80 != 0,
            proximity_gesture_saturation: status & 0x40 != 0,
            proximity_interrupt: status & 0x20 != 0,
            als_interrupt: status & 0x10 != 0,
            gesture_interrupt: status & 0x04 != 0,
            proximity_valid: status & 0x02 != 0,
            als_valid: status & 0x01 != 0,
        }
    }
}

/// Selects photodiodes by direction.
///
/// Used to mask photodiodes out of the proximity sum and to pick the
/// photodiodes ignored by the gesture exit condition.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct PhotodiodeMask {
    /// Up photodiode
    pub up: bool,
    /// Down photodiode
    pub down: bool,
    /// Left photodiode
    pub left: bool,
    /// Right photodiode
    pub right: bool,
}

impl PhotodiodeMask {
    /// U/D/L/R packed into bits 3:0, the order shared by CONFIG3 and GCONF1
    pub const fn bits(&self) -> u8 {
        (self.up as u8) << 3 | (self.down as u8) << 2 | (self.left as u8) << 1 | self.right as u8
    }
}

/// All possible errors in this crate
#[derive(Debug)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error<E> {
    /// I2C communication error: not acknowledged, or fewer bytes than requested
    I2c(E),
    /// Argument outside the range documented for the register field
    InvalidArgument,
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C error: {e:?}"),
            Error::InvalidArgument => f.write_str("invalid argument"),
        }
    }
}

/// Shift `value` into `field`, rejecting values wider than the field
fn encode_field<E>(field: Field, value: u8) -> Result<u8, Error<E>> {
    field.encode(value).ok_or_else(|| {
        debug!(
            "value {} does not fit field at {:x}",
            value,
            field.register as u8
        );
        Error::InvalidArgument
    })
}

/// Turn an encoder result into an `InvalidArgument` error
fn checked<E, T>(encoded: Option<T>, what: &'static str) -> Result<T, Error<E>> {
    encoded.ok_or_else(|| {
        debug!("rejected {}", what);
        Error::InvalidArgument
    })
}

/// High-level APDS-9960 driver
pub struct Apds9960<I2C, Delay = ()> {
    i2c: I2C,
    delay: Delay,
    address: u8,
    // Last successfully read sensor state
    device_status: u8,
    proximity_data: u8,
    als_saturation: u16,
    color: ColorData,
    datasets_in_fifo: u8,
    gesture_fifo_overflow: bool,
    gesture_fifo_has_data: bool,
    gesture_engine_running: bool,
    gesture_data: GestureData,
}

impl<I2C> Apds9960<I2C, ()> {
    /// Create a new APDS-9960 driver instance without delay support
    pub fn new(i2c: I2C) -> Self {
        Self::with_parts(i2c, (), I2C_ADDRESS)
    }

    /// Create a driver for a chip answering on a non-default address
    pub fn new_with_address(i2c: I2C, address: u8) -> Self {
        Self::with_parts(i2c, (), address)
    }
}

impl<I2C, Delay> Apds9960<I2C, Delay> {
    /// Create a new APDS-9960 driver instance with delay support.
    ///
    /// The delay provider is needed by the power sequencing calls, which wait
    /// for the chip to settle after changing its power state.
    pub fn new_with_delay(i2c: I2C, delay: Delay) -> Self {
        Self::with_parts(i2c, delay, I2C_ADDRESS)
    }

    fn with_parts(i2c: I2C, delay: Delay, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            device_status: 0,
            proximity_data: 0,
            als_saturation: 0,
            color: ColorData::default(),
            datasets_in_fifo: 0,
            gesture_fifo_overflow: false,
            gesture_fifo_has_data: false,
            gesture_engine_running: false,
            gesture_data: GestureData::default(),
        }
    }

    /// Destroy the driver and return the I2C interface
    pub fn destroy(self) -> I2C {
        self.i2c
    }

    /// 7-bit bus address the driver talks to
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Raw STATUS byte from the last [`update_status`](Self::update_status)
    pub fn status_byte(&self) -> u8 {
        self.device_status
    }

    /// Decoded status flags from the last [`update_status`](Self::update_status)
    pub fn status(&self) -> StatusInfo {
        StatusInfo::from(self.device_status)
    }

    /// Proximity count from the last [`update_proximity_data`](Self::update_proximity_data)
    pub fn proximity(&self) -> u8 {
        self.proximity_data
    }

    /// Channel count at which the ALS saturates, from the last
    /// [`update_saturation`](Self::update_saturation)
    pub fn als_saturation(&self) -> u16 {
        self.als_saturation
    }

    /// Color channels from the last [`update_color_data`](Self::update_color_data)
    pub fn color(&self) -> ColorData {
        self.color
    }

    /// Gesture FIFO level from the last FIFO level read
    pub fn datasets_in_fifo(&self) -> u8 {
        self.datasets_in_fifo
    }

    /// Gesture FIFO overflow flag from the last gesture status read
    pub fn gesture_fifo_overflow(&self) -> bool {
        self.gesture_fifo_overflow
    }

    /// Gesture FIFO valid-data flag from the last gesture status read
    pub fn gesture_fifo_has_data(&self) -> bool {
        self.gesture_fifo_has_data
    }

    /// Gesture engine state from the last
    /// [`check_gesture_engine_running`](Self::check_gesture_engine_running)
    pub fn gesture_engine_running(&self) -> bool {
        self.gesture_engine_running
    }

    /// Last gesture dataset read from the FIFO
    pub fn gesture_data(&self) -> GestureData {
        self.gesture_data
    }

    fn store_gesture_status(&mut self, raw: u8) {
        self.gesture_fifo_overflow = ll::GFOV.decode(raw) != 0;
        self.gesture_fifo_has_data = ll::GVALID.decode(raw) != 0;
        if self.gesture_fifo_overflow {
            warn!("gesture FIFO overflow");
        }
    }

    fn store_gesture_fifo(&mut self, level: u8, raw: &[u8], out: &mut [GestureData]) -> usize {
        let mut count = 0usize;
        for (dst, src) in out.iter_mut().zip(raw.chunks_exact(4)) {
            *dst = GestureData::from_bytes(src);
            count += 1;
        }
        self.datasets_in_fifo = level;
        if let Some(last) = count.checked_sub(1) {
            self.gesture_data = out[last];
        }
        count
    }
}

/// Number of datasets [`Apds9960::read_gesture_fifo`] moves for a FIFO level
fn fifo_batch(level: u8, capacity: usize) -> usize {
    (level as usize).min(capacity).min(ll::GESTURE_FIFO_DEPTH)
}

impl<I2C, E, Delay> Apds9960<I2C, Delay>
where
    I2C: I2c<Error = E>,
{
    // =====================================================================
    // Bus primitives
    // =====================================================================

    /// Read `buffer.len()` bytes starting at `register`.
    ///
    /// The register address is sent in its own write transaction, then the
    /// data is read back in bursts of at most 32 bytes. The buffer contents
    /// are unspecified after an error.
    pub fn read(&mut self, register: Register, buffer: &mut [u8]) -> Result<(), Error<E>> {
        trace!("read {:x}, {} bytes", register as u8, buffer.len());
        self.i2c
            .write(self.address, &[register as u8])
            .map_err(Error::I2c)?;
        for chunk in buffer.chunks_mut(ll::MAX_BURST) {
            self.i2c.read(self.address, chunk).map_err(Error::I2c)?;
        }
        Ok(())
    }

    /// Write `values` starting at `register` in a single transaction.
    ///
    /// At most 32 payload bytes are accepted.
    pub fn write(&mut self, register: Register, values: &[u8]) -> Result<(), Error<E>> {
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
            .map_err(Error::I2c)
    }

    /// Read-modify-write one register: `value = (value & and_mask) | or_mask`.
    ///
    /// The read and the write are separate transactions. `&mut self` keeps
    /// other calls on this driver out, but nothing protects against another
    /// bus master writing the register in between.
    pub fn and_or_register(
        &mut self,
        register: Register,
        and_mask: u8,
        or_mask: u8,
    ) -> Result<(), Error<E>> {
        let value = self.read_byte(register)?;
        self.write_byte(register, (value & and_mask) | or_mask)
    }

    /// Send only the register address, with no payload.
    ///
    /// Address-accessing PICLEAR, CICLEAR or AICLEAR clears the matching
    /// interrupt; IFORCE raises one.
    pub fn address_access(&mut self, register: Register) -> Result<(), Error<E>> {
        trace!("address access {:x}", register as u8);
        self.i2c
            .write(self.address, &[register as u8])
            .map_err(Error::I2c)
    }

    fn read_byte(&mut self, register: Register) -> Result<u8, Error<E>> {
        let mut buf = [0u8; 1];
        self.read(register, &mut buf)?;
        Ok(buf[0])
    }

    fn write_byte(&mut self, register: Register, value: u8) -> Result<(), Error<E>> {
        self.write(register, &[value])
    }

    /// Fold `value` into `field`, leaving the rest of the register as is
    fn modify(&mut self, field: Field, value: u8) -> Result<(), Error<E>> {
        let bits = encode_field(field, value)?;
        self.and_or_register(field.register, !field.mask(), bits)
    }

    fn set_flag(&mut self, field: Field, enable: bool) -> Result<(), Error<E>> {
        self.modify(field, enable as u8)
    }

    // =====================================================================
    // Device
    // =====================================================================

    /// Read the ID register; a genuine APDS-9960 reports [`DEVICE_ID`]
    pub fn read_device_id(&mut self) -> Result<u8, Error<E>> {
        self.read_byte(Register::Id)
    }

    /// Put the chip to sleep after an interrupt is raised.
    ///
    /// The chip wakes up again once the interrupt is cleared.
    pub fn set_sleep_after_interrupt(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag(ll::SAI, enable)
    }

    /// Set the LED drive strength used for proximity ([`LedDrive`] value)
    pub fn set_led_drive(&mut self, led_drive: u8) -> Result<(), Error<E>> {
        self.modify(ll::LDRIVE, led_drive)
    }

    /// Set the LED boost applied to proximity and gesture pulses ([`LedBoost`] value)
    pub fn set_led_boost(&mut self, led_boost: u8) -> Result<(), Error<E>> {
        self.modify(ll::LED_BOOST, led_boost)
    }

    /// Refresh the cached STATUS byte
    pub fn update_status(&mut self) -> Result<(), Error<E>> {
        let status = self.read_byte(Register::Status)?;
        self.device_status = status;
        Ok(())
    }

    /// Force an interrupt
    pub fn force_interrupt(&mut self) -> Result<(), Error<E>> {
        self.address_access(Register::Iforce)
    }

    /// Clear the proximity and ALS interrupts in one access
    pub fn clear_all_non_gesture_interrupts(&mut self) -> Result<(), Error<E>> {
        self.address_access(Register::Ciclear)
    }

    // =====================================================================
    // Proximity engine
    // =====================================================================

    /// Enable or disable the proximity engine
    pub fn enable_proximity_engine(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag(ll::PEN, enable)
    }

    /// Enable or disable proximity threshold interrupts
    pub fn enable_proximity_interrupts(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag(ll::PIEN, enable)
    }

    /// Enable or disable interrupts on proximity/gesture analog saturation
    pub fn enable_proximity_saturation_interrupts(
        &mut self,
        enable: bool,
    ) -> Result<(), Error<E>> {
        self.set_flag(ll::PSIEN, enable)
    }

    /// Clear a pending proximity interrupt
    pub fn clear_proximity_interrupts(&mut self) -> Result<(), Error<E>> {
        self.address_access(Register::Piclear)
    }

    /// Set the proximity gain ([`ProximityGain`] value)
    pub fn set_proximity_gain(&mut self, gain: u8) -> Result<(), Error<E>> {
        self.modify(ll::PGAIN, gain)
    }

    /// Set the proximity interrupt thresholds.
    ///
    /// The low threshold is written first; if that fails the high one is not
    /// touched.
    pub fn set_proximity_interrupt_thresholds(
        &mut self,
        low: u8,
        high: u8,
    ) -> Result<(), Error<E>> {
        self.write_byte(Register::Pilt, low)?;
        self.write_byte(Register::Piht, high)
    }

    /// Number of consecutive out-of-range proximity cycles (0..=15) before
    /// the interrupt fires
    pub fn set_proximity_interrupt_persistence(&mut self, persistence: u8) -> Result<(), Error<E>> {
        self.modify(ll::PPERS, persistence)
    }

    /// Set the proximity pulse count (1..=64) and [`PulseLength`]
    pub fn set_proximity_pulse_count_and_length(
        &mut self,
        pulse_count: u8,
        pulse_length: u8,
    ) -> Result<(), Error<E>> {
        let value = checked(
            ll::encode_pulse(pulse_count, pulse_length),
            "proximity pulse",
        )?;
        self.write_byte(Register::Ppulse, value)
    }

    /// Set the proximity offset correction for the up/right and down/left
    /// photodiode pairs, in `-127..=127`
    pub fn set_proximity_offset(&mut self, up_right: i8, down_left: i8) -> Result<(), Error<E>> {
        let up_right = checked(ll::encode_offset(up_right), "up/right offset")?;
        let down_left = checked(ll::encode_offset(down_left), "down/left offset")?;

        self.write_byte(Register::PoffsetUr, up_right)?;
        self.write_byte(Register::PoffsetDl, down_left)
    }

    /// Mask photodiodes out of the proximity measurement.
    ///
    /// `gain_compensation` scales the result up to compensate for the masked
    /// photodiodes.
    pub fn disable_photodiodes(
        &mut self,
        mask: PhotodiodeMask,
        gain_compensation: bool,
    ) -> Result<(), Error<E>> {
        let value = (gain_compensation as u8) << ll::PCMP.shift | mask.bits() << ll::PMASK.shift;
        self.and_or_register(
            Register::Config3,
            !(ll::PCMP.mask() | ll::PMASK.mask()),
            value,
        )
    }

    /// Refresh the cached proximity count
    pub fn update_proximity_data(&mut self) -> Result<(), Error<E>> {
        let proximity = self.read_byte(Register::Pdata)?;
        self.proximity_data = proximity;
        Ok(())
    }

    // =====================================================================
    // ALS engine
    // =====================================================================

    /// Enable or disable the ALS/color engine
    pub fn enable_als_engine(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag(ll::AEN, enable)
    }

    /// Enable or disable ALS threshold interrupts
    pub fn enable_als_interrupts(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag(ll::AIEN, enable)
    }

    /// Enable or disable interrupts on clear photodiode saturation
    pub fn enable_als_saturation_interrupts(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag(ll::CPSIEN, enable)
    }

    /// Clear a pending ALS interrupt
    pub fn clear_als_interrupts(&mut self) -> Result<(), Error<E>> {
        self.address_access(Register::Aiclear)
    }

    /// Set the ALS/color gain ([`AlsGain`] value)
    pub fn set_als_gain(&mut self, gain: u8) -> Result<(), Error<E>> {
        self.modify(ll::AGAIN, gain)
    }

    /// Set the clear channel interrupt thresholds
    pub fn set_als_thresholds(&mut self, low: u16, high: u16) -> Result<(), Error<E>> {
        let [low_l, low_h] = low.to_le_bytes();
        let [high_l, high_h] = high.to_le_bytes();
        self.write(Register::Ailtl, &[low_l, low_h, high_l, high_h])
    }

    /// Number of consecutive out-of-range ALS cycles (0..=15) before the
    /// interrupt fires
    pub fn set_als_interrupt_persistence(&mut self, persistence: u8) -> Result<(), Error<E>> {
        self.modify(ll::APERS, persistence)
    }

    /// Set the ALS integration time in milliseconds, `2.78..=712.0`
    pub fn set_als_integration_time(&mut self, time_ms: f32) -> Result<(), Error<E>> {
        let value = checked(ll::encode_cycle_time(time_ms), "integration time")?;
        self.write_byte(Register::Atime, value)
    }

    /// Refresh the cached saturation count from the integration time
    pub fn update_saturation(&mut self) -> Result<(), Error<E>> {
        let atime = self.read_byte(Register::Atime)?;
        self.als_saturation = ll::als_saturation(atime);
        Ok(())
    }

    /// Refresh the cached clear/red/green/blue channels
    pub fn update_color_data(&mut self) -> Result<(), Error<E>> {
        let mut buf = [0u8; 8];
        self.read(Register::Cdatal, &mut buf)?;
        self.color = ColorData::from_bytes(&buf);
        Ok(())
    }

    // =====================================================================
    // Gesture engine
    // =====================================================================

    /// Enable or disable the gesture engine.
    ///
    /// Gestures need proximity sampling, so the proximity engine is enabled
    /// first. If that fails its error is returned and GEN is left alone.
    pub fn enable_gestures_engine(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.enable_proximity_engine(true)?;
        self.set_flag(ll::GEN, enable)
    }

    /// Start the gesture state machine without waiting for the enter threshold
    pub fn enter_immediately_gesture_engine(&mut self) -> Result<(), Error<E>> {
        self.set_flag(ll::GMODE, true)
    }

    /// Leave the gesture state machine
    pub fn exit_gesture_engine(&mut self) -> Result<(), Error<E>> {
        self.set_flag(ll::GMODE, false)
    }

    /// Proximity count above which the gesture engine starts
    pub fn set_gesture_prox_enter_threshold(&mut self, threshold: u8) -> Result<(), Error<E>> {
        self.write_byte(Register::Gpenth, threshold)
    }

    /// Gesture count below which the gesture engine exits
    pub fn set_gesture_exit_threshold(&mut self, threshold: u8) -> Result<(), Error<E>> {
        self.write_byte(Register::Gexth, threshold)
    }

    /// Photodiodes ignored when checking the gesture exit threshold
    pub fn set_gesture_exit_mask(&mut self, mask: PhotodiodeMask) -> Result<(), Error<E>> {
        self.modify(ll::GEXMSK, mask.bits())
    }

    /// Set the gesture exit persistence ([`GestureExitPersistence`] value)
    pub fn set_gesture_exit_persistence(&mut self, persistence: u8) -> Result<(), Error<E>> {
        self.modify(ll::GEXPERS, persistence)
    }

    /// Set the gesture gain ([`ProximityGain`] value)
    pub fn set_gesture_gain(&mut self, gain: u8) -> Result<(), Error<E>> {
        self.modify(ll::GGAIN, gain)
    }

    /// Set the LED drive strength used for gestures ([`LedDrive`] value)
    pub fn set_gesture_led_drive(&mut self, led_drive: u8) -> Result<(), Error<E>> {
        self.modify(ll::GLDRIVE, led_drive)
    }

    /// Set the time between gesture cycles ([`GestureWaitTime`] value)
    pub fn set_gesture_wait_time(&mut self, wait_time: u8) -> Result<(), Error<E>> {
        self.modify(ll::GWTIME, wait_time)
    }

    /// Set the per-direction gesture offset corrections, each in `-127..=127`
    pub fn set_gesture_offsets(
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
            self.write_byte(register, value)?;
        }
        Ok(())
    }

    /// Set the gesture pulse count (1..=64) and [`PulseLength`]
    pub fn set_gesture_pulse_count_and_length(
        &mut self,
        pulse_count: u8,
        pulse_length: u8,
    ) -> Result<(), Error<E>> {
        let value = checked(ll::encode_pulse(pulse_count, pulse_length), "gesture pulse")?;
        self.write_byte(Register::Gpulse, value)
    }

    /// Select which photodiode pairs collect gesture data.
    ///
    /// Leaving both pairs off writes 0, which the chip treats as both active.
    pub fn set_active_photodiodes_pairs(
        &mut self,
        up_down_active: bool,
        left_right_active: bool,
    ) -> Result<(), Error<E>> {
        self.modify(
            ll::GDIMS,
            (left_right_active as u8) << 1 | up_down_active as u8,
        )
    }

    /// Enable or disable the gesture interrupt
    pub fn enable_gesture_interrupts(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag(ll::GIEN, enable)
    }

    /// Set the FIFO level that raises the gesture interrupt ([`FifoThreshold`] value)
    pub fn set_gesture_fifo_threshold(&mut self, threshold: u8) -> Result<(), Error<E>> {
        self.modify(ll::GFIFOTH, threshold)
    }

    /// Clear the gesture FIFO together with GINT, GVALID, GFOV and GFLVL
    pub fn clear_gesture_engine_interrupts(&mut self) -> Result<(), Error<E>> {
        self.set_flag(ll::GFIFO_CLR, true)
    }

    /// Refresh the cached gesture engine running flag
    pub fn check_gesture_engine_running(&mut self) -> Result<(), Error<E>> {
        let gconf4 = self.read_byte(Register::Gconf4)?;
        self.gesture_engine_running = ll::GMODE.decode(gconf4) != 0;
        Ok(())
    }

    /// Refresh the cached gesture FIFO level
    pub fn update_number_of_datasets_in_fifo(&mut self) -> Result<(), Error<E>> {
        let level = self.read_byte(Register::Gflvl)?;
        self.datasets_in_fifo = level;
        Ok(())
    }

    /// Refresh the cached gesture FIFO overflow and valid-data flags
    pub fn update_gesture_status(&mut self) -> Result<(), Error<E>> {
        let raw = self.read_byte(Register::Gstatus)?;
        self.store_gesture_status(raw);
        Ok(())
    }

    /// Pop one dataset from the gesture FIFO into the cache
    pub fn update_gesture_data(&mut self) -> Result<(), Error<E>> {
        let mut buf = [0u8; 4];
        self.read(Register::GfifoU, &mut buf)?;
        self.gesture_data = GestureData::from_bytes(&buf);
        Ok(())
    }

    /// Drain up to `out.len()` datasets from the gesture FIFO.
    ///
    /// Reads the FIFO level, then bursts the datasets out in one read.
    /// Returns how many datasets were stored in `out`.
    pub fn read_gesture_fifo(&mut self, out: &mut [GestureData]) -> Result<usize, Error<E>> {
        let level = self.read_byte(Register::Gflvl)?;
        let count = fifo_batch(level, out.len());

        let mut raw = [0u8; ll::GESTURE_FIFO_DEPTH * 4];
        let raw = &mut raw[..count * 4];
        if count > 0 {
            self.read(Register::GfifoU, raw)?;
        }
        Ok(self.store_gesture_fifo(level, raw, out))
    }

    // =====================================================================
    // Wait engine
    // =====================================================================

    /// Enable or disable the wait engine
    pub fn enable_wait_engine(&mut self, enable: bool) -> Result<(), Error<E>> {
        self.set_flag(ll::WEN, enable)
    }

    /// Set the wait time between cycles in milliseconds, `2.78..=712.0`.
    ///
    /// With `long_wait` the chip multiplies the wait time by 12.
    pub fn set_wait_time(&mut self, time_ms: f32, long_wait: bool) -> Result<(), Error<E>> {
        let value = checked(ll::encode_cycle_time(time_ms), "wait time")?;
        self.set_flag(ll::WLONG, long_wait)?;
        self.write_byte(Register::Wtime, value)
    }
}

impl<I2C, E, Delay> Apds9960<I2C, Delay>
where
    I2C: I2c<Error = E>,
    Delay: embedded_hal::delay::DelayNs,
{
    /// Power the chip on or off, then wait for it to settle
    pub fn wake_up(&mut self, wake_up: bool) -> Result<(), Error<E>> {
        let result = self.set_flag(ll::PON, wake_up);
        self.delay.delay_ms(10);
        result
    }

    /// Power on with the ALS, proximity, wait and gesture engines running,
    /// or switch everything off. Waits for the chip to settle afterwards.
    pub fn enable_all_engines_and_power_up(&mut self, enable: bool) -> Result<(), Error<E>> {
        let value = if enable { ll::ENABLE_ALL_ENGINES } else { 0 };
        let result = self.write_byte(Register::Enable, value);
        self.delay.delay_ms(10);
        result
    }
}
