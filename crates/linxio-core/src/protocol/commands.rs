//! Protocol command table
//!
//! Defines the commands understood by LINX-compatible firmware. The codes
//! are protocol constants and must match the firmware exactly.

use serde::{Deserialize, Serialize};

/// Peripheral commands, one per wire operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Link liveness check
    Sync,
    /// Query device family and id
    GetDeviceId,
    /// Query protocol API version
    GetApiVersion,
    /// Query the highest baud rate the device supports
    GetMaxBaudRate,
    /// Request a new link baud rate
    SetBaudRate,
    /// List servo-capable channels
    ServoGetChannels,
    /// Store a 16-bit user id on the device
    SetDeviceUserId,
    /// Read back the stored user id
    GetDeviceUserId,
    /// Query the device's display name
    GetDeviceName,
    /// Drive one or more digital pins
    DigitalWrite,
    /// Sample one or more digital pins
    DigitalRead,
    /// Emit a square wave on a digital channel
    DigitalSquareWave,
    /// Sample one or more analog pins
    AnalogRead,
    /// Drive one or more analog pins
    AnalogWrite,
    /// Set PWM frequency per pin
    PwmSetFrequency,
    /// Set PWM duty cycle per pin
    PwmSetDutyCycle,
    /// Open a UART channel at a baud rate
    UartOpen,
    /// Change an open UART channel's baud rate
    UartSetBaudRate,
    /// Count bytes waiting in a UART receive buffer
    UartGetBytesAvailable,
    /// Read bytes from a UART channel
    UartRead,
    /// Write bytes to a UART channel
    UartWrite,
    /// Close a UART channel
    UartClose,
    /// Open an I2C bus
    I2cOpen,
    /// Set an I2C bus clock frequency
    I2cSetSpeed,
    /// Write bytes to an I2C slave
    I2cWrite,
    /// Read bytes from an I2C slave
    I2cRead,
    /// Close an I2C bus
    I2cClose,
    /// Open an SPI channel
    SpiOpen,
    /// Set an SPI channel's shift direction
    SpiSetBitOrder,
    /// Set an SPI channel's clock frequency
    SpiSetClockFrequency,
    /// Set an SPI channel's clock polarity/phase mode
    SpiSetMode,
    /// Full-duplex SPI transfer
    SpiWriteRead,
    /// Attach servos to channels
    ServoOpen,
    /// Set servo pulse widths
    ServoSetPulseWidth,
    /// Detach servos from channels
    ServoClose,
}

impl Command {
    /// Wire command code, sent big-endian in the request header
    pub fn code(&self) -> u16 {
        match self {
            Command::Sync => 0,
            Command::GetDeviceId => 3,
            Command::GetApiVersion => 4,
            Command::GetMaxBaudRate => 5,
            Command::SetBaudRate => 6,
            Command::ServoGetChannels => 8,
            Command::SetDeviceUserId => 18,
            Command::GetDeviceUserId => 19,
            Command::GetDeviceName => 36,
            Command::DigitalWrite => 65,
            Command::DigitalRead => 66,
            Command::DigitalSquareWave => 67,
            Command::AnalogRead => 100,
            Command::AnalogWrite => 101,
            Command::PwmSetFrequency => 130,
            Command::PwmSetDutyCycle => 131,
            // The firmware routes baud-rate changes through its open
            // handler; both UART commands share one code.
            Command::UartOpen | Command::UartSetBaudRate => 192,
            Command::UartGetBytesAvailable => 194,
            Command::UartRead => 195,
            Command::UartWrite => 196,
            Command::UartClose => 197,
            Command::I2cOpen => 224,
            Command::I2cSetSpeed => 225,
            Command::I2cWrite => 226,
            Command::I2cRead => 227,
            Command::I2cClose => 228,
            Command::SpiOpen => 256,
            Command::SpiSetBitOrder => 257,
            Command::SpiSetClockFrequency => 258,
            Command::SpiSetMode => 259,
            Command::SpiWriteRead => 263,
            Command::ServoOpen => 320,
            Command::ServoSetPulseWidth => 321,
            Command::ServoClose => 322,
        }
    }
}

/// SPI shift direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BitOrder {
    /// Least significant bit first
    LsbFirst,
    /// Most significant bit first
    MsbFirst,
}

impl BitOrder {
    /// Byte emitted on the wire
    pub fn wire(self) -> u8 {
        match self {
            BitOrder::LsbFirst => 0,
            BitOrder::MsbFirst => 1,
        }
    }
}

/// Chip-select polarity for SPI transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CsLogicLevel {
    /// Chip select asserted low
    ActiveLow,
    /// Chip select asserted high
    ActiveHigh,
}

impl CsLogicLevel {
    /// Byte emitted on the wire
    pub fn wire(self) -> u8 {
        match self {
            CsLogicLevel::ActiveLow => 0,
            CsLogicLevel::ActiveHigh => 1,
        }
    }
}

/// End-of-frame handling for I2C transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum I2cEofConfig {
    /// Stop condition after the transfer
    Default,
    /// Repeated start, then stop
    Restart,
    /// Repeated start, no stop
    RestartNoStop,
    /// No stop condition
    NoStop,
}

impl I2cEofConfig {
    /// Byte emitted on the wire
    pub fn wire(self) -> u8 {
        match self {
            I2cEofConfig::Default => 0,
            I2cEofConfig::Restart => 1,
            I2cEofConfig::RestartNoStop => 2,
            I2cEofConfig::NoStop => 3,
        }
    }
}

/// Device family and id reported by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device family byte
    pub family: u8,
    /// Device id within the family
    pub id: u8,
}

/// Protocol API version reported by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersion {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
    /// Subminor version
    pub subminor: u8,
    /// Build number
    pub build: u8,
}
