//! Low-level register map and bit-field encoders for the APDS-9960
//!
//! Nothing in here touches the bus. Register addresses and field layouts are
//! the datasheet's; the driver in the crate root only combines them with the
//! four bus primitives.
//!
//! The table is written out by hand rather than generated: the driver's
//! read-modify-write with explicit keep masks and its payload-free address
//! accesses sit below what a generated register interface exposes, and a
//! `const` table can be checked in tests without any bus traffic.

/// Default 7-bit I2C address of the APDS-9960
pub const I2C_ADDRESS: u8 = 0x39;

/// Value of the ID register on a genuine APDS-9960
pub const DEVICE_ID: u8 = 0xAB;

/// Maximum number of bytes moved in a single bus transaction segment
pub const MAX_BURST: usize = 32;

/// Depth of the gesture FIFO, in datasets
pub const GESTURE_FIFO_DEPTH: usize = 32;

/// Register addresses
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Register {
    /// Power on and engine enables
    Enable = 0x80,
    /// ALS ADC integration time
    Atime = 0x81,
    /// Wait time
    Wtime = 0x83,
    /// ALS interrupt low threshold, low byte (start of a 4-byte block)
    Ailtl = 0x84,
    /// Proximity interrupt low threshold
    Pilt = 0x89,
    /// Proximity interrupt high threshold
    Piht = 0x8B,
    /// Interrupt persistence filters
    Pers = 0x8C,
    /// Configuration register one (WLONG)
    Config1 = 0x8D,
    /// Proximity pulse count and length
    Ppulse = 0x8E,
    /// Gain control and LED drive
    Control = 0x8F,
    /// Configuration register two (saturation interrupts, LED boost)
    Config2 = 0x90,
    /// Device ID
    Id = 0x92,
    /// Device status
    Status = 0x93,
    /// Clear channel data, low byte (start of the 8-byte color block)
    Cdatal = 0x94,
    /// Proximity data
    Pdata = 0x9C,
    /// Proximity offset for the up/right photodiodes
    PoffsetUr = 0x9D,
    /// Proximity offset for the down/left photodiodes
    PoffsetDl = 0x9E,
    /// Configuration register three (PCMP, SAI, photodiode masks)
    Config3 = 0x9F,
    /// Gesture proximity enter threshold
    Gpenth = 0xA0,
    /// Gesture exit threshold
    Gexth = 0xA1,
    /// Gesture configuration one
    Gconf1 = 0xA2,
    /// Gesture configuration two
    Gconf2 = 0xA3,
    /// Gesture up offset
    GoffsetU = 0xA4,
    /// Gesture down offset
    GoffsetD = 0xA5,
    /// Gesture pulse count and length
    Gpulse = 0xA6,
    /// Gesture left offset
    GoffsetL = 0xA7,
    /// Gesture right offset
    GoffsetR = 0xA9,
    /// Gesture configuration three
    Gconf3 = 0xAA,
    /// Gesture configuration four
    Gconf4 = 0xAB,
    /// Gesture FIFO level
    Gflvl = 0xAE,
    /// Gesture status
    Gstatus = 0xAF,
    /// Force interrupt (address access)
    Iforce = 0xE4,
    /// Proximity interrupt clear (address access)
    Piclear = 0xE5,
    /// Clear all non-gesture interrupts (address access)
    Ciclear = 0xE6,
    /// ALS interrupt clear (address access)
    Aiclear = 0xE7,
    /// Gesture FIFO up value (start of the 4-byte dataset)
    GfifoU = 0xFC,
}

impl From<Register> for u8 {
    fn from(r: Register) -> Self {
        r as u8
    }
}

/// A bit field inside one register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Register holding the field
    pub register: Register,
    /// Position of the least significant bit
    pub shift: u8,
    /// Number of bits
    pub width: u8,
}

impl Field {
    const fn new(register: Register, shift: u8, width: u8) -> Self {
        Self {
            register,
            shift,
            width,
        }
    }

    /// Largest raw value the field can hold
    pub const fn max(&self) -> u8 {
        ((1u16 << self.width) - 1) as u8
    }

    /// Bits occupied by the field, in place
    pub const fn mask(&self) -> u8 {
        self.max() << self.shift
    }

    /// Shift `value` into place, or `None` if it does not fit the field
    pub const fn encode(&self, value: u8) -> Option<u8> {
        if value > self.max() {
            None
        } else {
            Some(value << self.shift)
        }
    }

    /// Extract the field from a register value
    pub const fn decode(&self, register_value: u8) -> u8 {
        (register_value & self.mask()) >> self.shift
    }
}

// ENABLE
/// Power on
pub const PON: Field = Field::new(Register::Enable, 0, 1);
/// ALS enable
pub const AEN: Field = Field::new(Register::Enable, 1, 1);
/// Proximity detect enable
pub const PEN: Field = Field::new(Register::Enable, 2, 1);
/// Wait enable
pub const WEN: Field = Field::new(Register::Enable, 3, 1);
/// ALS interrupt enable
pub const AIEN: Field = Field::new(Register::Enable, 4, 1);
/// Proximity interrupt enable
pub const PIEN: Field = Field::new(Register::Enable, 5, 1);
/// Gesture enable
pub const GEN: Field = Field::new(Register::Enable, 6, 1);

// PERS
/// ALS interrupt persistence
pub const APERS: Field = Field::new(Register::Pers, 0, 4);
/// Proximity interrupt persistence
pub const PPERS: Field = Field::new(Register::Pers, 4, 4);

// CONFIG1
/// Wait long: WTIME is multiplied by 12
pub const WLONG: Field = Field::new(Register::Config1, 1, 1);

// PPULSE / GPULSE share a layout
/// Proximity pulse count minus one
pub const PPULSE: Field = Field::new(Register::Ppulse, 0, 6);
/// Proximity pulse length
pub const PPLEN: Field = Field::new(Register::Ppulse, 6, 2);
/// Gesture pulse count minus one
pub const GPULSE: Field = Field::new(Register::Gpulse, 0, 6);
/// Gesture pulse length
pub const GPLEN: Field = Field::new(Register::Gpulse, 6, 2);

// CONTROL
/// ALS and color gain
pub const AGAIN: Field = Field::new(Register::Control, 0, 2);
/// Proximity gain
pub const PGAIN: Field = Field::new(Register::Control, 2, 2);
/// LED drive strength
pub const LDRIVE: Field = Field::new(Register::Control, 6, 2);

// CONFIG2
/// LED boost
pub const LED_BOOST: Field = Field::new(Register::Config2, 4, 2);
/// Clear photodiode saturation interrupt enable
pub const CPSIEN: Field = Field::new(Register::Config2, 6, 1);
/// Proximity saturation interrupt enable
pub const PSIEN: Field = Field::new(Register::Config2, 7, 1);

// CONFIG3
/// Photodiode masks, R=bit 0, L=1, D=2, U=3
pub const PMASK: Field = Field::new(Register::Config3, 0, 4);
/// Sleep after interrupt
pub const SAI: Field = Field::new(Register::Config3, 4, 1);
/// Proximity gain compensation
pub const PCMP: Field = Field::new(Register::Config3, 5, 1);

// GCONF1
/// Gesture exit persistence
pub const GEXPERS: Field = Field::new(Register::Gconf1, 0, 2);
/// Gesture exit mask, R=bit 2, L=3, D=4, U=5
pub const GEXMSK: Field = Field::new(Register::Gconf1, 2, 4);
/// Gesture FIFO threshold
pub const GFIFOTH: Field = Field::new(Register::Gconf1, 6, 2);

// GCONF2
/// Gesture wait time
pub const GWTIME: Field = Field::new(Register::Gconf2, 0, 3);
/// Gesture LED drive strength
pub const GLDRIVE: Field = Field::new(Register::Gconf2, 3, 2);
/// Gesture gain
pub const GGAIN: Field = Field::new(Register::Gconf2, 5, 2);

// GCONF3
/// Active gesture photodiode pairs
pub const GDIMS: Field = Field::new(Register::Gconf3, 0, 2);

// GCONF4
/// Gesture mode (engine running)
pub const GMODE: Field = Field::new(Register::Gconf4, 0, 1);
/// Gesture interrupt enable
pub const GIEN: Field = Field::new(Register::Gconf4, 1, 1);
/// Gesture FIFO clear
pub const GFIFO_CLR: Field = Field::new(Register::Gconf4, 2, 1);

// GSTATUS
/// Gesture FIFO data valid
pub const GVALID: Field = Field::new(Register::Gstatus, 0, 1);
/// Gesture FIFO overflow
pub const GFOV: Field = Field::new(Register::Gstatus, 1, 1);

/// ENABLE value that powers the chip and starts every engine except the
/// interrupts: PON, AEN, PEN, WEN and GEN.
pub const ENABLE_ALL_ENGINES: u8 = 0b0100_1111;

/// Shortest integration or wait time, one ADC cycle, in milliseconds
pub const CYCLE_TIME_MS: f32 = 2.78;

/// Longest integration or wait time, 256 ADC cycles, in milliseconds
pub const MAX_CYCLE_TIME_MS: f32 = 712.0;

/// Encode a proximity or gesture offset in the chip's sign-magnitude format.
///
/// Bit 7 is the sign and bits 6:0 the magnitude, so `-128` has no encoding
/// and yields `None`.
pub const fn encode_offset(offset: i8) -> Option<u8> {
    if offset == i8::MIN {
        None
    } else if offset < 0 {
        Some(0x80 | (-offset) as u8)
    } else {
        Some(offset as u8)
    }
}

/// Inverse of [`encode_offset`]
pub const fn decode_offset(raw: u8) -> i8 {
    let magnitude = (raw & 0x7F) as i8;
    if raw & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Encode an ALS integration time or wait time (milliseconds) into an
/// ATIME/WTIME register value: `256 - floor(time / 2.78)`.
///
/// Returns `None` outside `[2.78, 712.0]`, NaN included.
pub fn encode_cycle_time(time_ms: f32) -> Option<u8> {
    if !(CYCLE_TIME_MS..=MAX_CYCLE_TIME_MS).contains(&time_ms) {
        return None;
    }
    let cycles = libm::floorf(time_ms / CYCLE_TIME_MS) as u16;
    Some((256 - cycles.min(256)) as u8)
}

/// Encode a pulse register (PPULSE / GPULSE): length in bits 7:6 and
/// `count - 1` in bits 5:0. `count` must be in `1..=64`.
pub const fn encode_pulse(count: u8, length: u8) -> Option<u8> {
    if count == 0 || count > 64 || length > 3 {
        return None;
    }
    Some((length << 6) | (count - 1))
}

/// ALS saturation count for an ATIME register value:
/// `min(65535, (256 - atime) * 1025)`.
pub const fn als_saturation(atime: u8) -> u16 {
    let cycles = (256 - atime as u32) * 1025;
    if cycles < 65535 {
        cycles as u16
    } else {
        65535
    }
}

/// Assemble a little-endian 16-bit channel from its low and high bytes
pub const fn le_u16(low: u8, high: u8) -> u16 {
    (high as u16) << 8 | low as u16
}
