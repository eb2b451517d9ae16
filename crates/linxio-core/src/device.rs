//! Device session
//!
//! One binary-protocol session bound to a device address. The device owns
//! its sequence counter and a [`ConnectionHandler`]; every command builds a
//! parameter block, wraps it in a request frame, performs one transport
//! exchange, validates the response frame, and decodes the command's
//! payload.
//!
//! Every command takes `&mut self`, so calls against one device are
//! serialized by the borrow checker. The protocol itself does not
//! correlate responses to requests by sequence number; exclusive access is
//! what keeps responses attributable to their requests.

use tracing::trace;

use crate::protocol::{
    encode_request, ApiVersion, BitOrder, Command, CsLogicLevel, DeviceId, I2cEofConfig,
    ParamsBuilder, ProtocolError, ResponseFrame, MAX_PARAMS_LEN, MIN_RESPONSE_LEN,
};
use crate::transport::{ConnectionHandler, WireFormat};

/// Binary protocol endpoint on the device address
const DEVICE_ENDPOINT: &str = "/";

/// Validate parallel pin/value slices and return the wire count byte
fn parallel_count(left: (&str, usize), right: (&str, usize)) -> Result<u8, ProtocolError> {
    if left.1 != right.1 {
        return Err(ProtocolError::InvalidArguments(format!(
            "{} and {} counts differ: {} vs {}",
            left.0, right.0, left.1, right.1
        )));
    }
    u8::try_from(left.1).map_err(|_| {
        ProtocolError::InvalidArguments(format!(
            "too many {}s for a single frame: {}",
            left.0, left.1
        ))
    })
}

/// A session with one physical device
pub struct Device {
    address: String,
    sequence: u16,
    connection: ConnectionHandler,
}

impl Device {
    /// Create a device session using the default HTTP transport
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_connection(address, ConnectionHandler::new())
    }

    /// Create a device session around an existing connection handler
    pub fn with_connection(address: impl Into<String>, connection: ConnectionHandler) -> Self {
        Self {
            address: address.into(),
            sequence: 0,
            connection,
        }
    }

    /// Address this session is bound to
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sequence number the next frame will carry
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// The session's connection handler
    pub fn connection(&self) -> &ConnectionHandler {
        &self.connection
    }

    /// Mutable access for transport replacement; exclusive access
    /// guarantees no exchange is in flight during a swap
    pub fn connection_mut(&mut self) -> &mut ConnectionHandler {
        &mut self.connection
    }

    /// Encode, exchange, and validate one frame
    async fn exchange(
        &mut self,
        command: Command,
        params: &[u8],
    ) -> Result<ResponseFrame, ProtocolError> {
        if params.len() > MAX_PARAMS_LEN {
            return Err(ProtocolError::InvalidArguments(format!(
                "command parameters do not fit a single frame ({} > {} bytes)",
                params.len(),
                MAX_PARAMS_LEN
            )));
        }

        let sequence = self.sequence;
        let frame = encode_request(sequence, command.code(), params);
        self.sequence = self.sequence.wrapping_add(1);

        trace!(?command, sequence, len = frame.len(), "sending frame");

        let raw = self
            .connection
            .transport()
            .write_read(&self.address, DEVICE_ENDPOINT, &frame, WireFormat::Binary)
            .await?;
        let response = ResponseFrame::from_bytes(&raw)?;

        trace!(
            sequence = response.sequence(),
            status = response.status(),
            len = raw.len(),
            "frame received"
        );
        Ok(response)
    }

    // Device management

    /// Liveness check
    pub async fn sync(&mut self) -> Result<(), ProtocolError> {
        self.exchange(Command::Sync, &[]).await?;
        Ok(())
    }

    /// Query the device family and id
    pub async fn get_device_id(&mut self) -> Result<DeviceId, ProtocolError> {
        let response = self.exchange(Command::GetDeviceId, &[]).await?;
        Ok(DeviceId {
            family: response.payload_u8(0)?,
            id: response.payload_u8(1)?,
        })
    }

    /// Query the protocol API version
    pub async fn get_api_version(&mut self) -> Result<ApiVersion, ProtocolError> {
        let response = self.exchange(Command::GetApiVersion, &[]).await?;
        Ok(ApiVersion {
            major: response.payload_u8(0)?,
            minor: response.payload_u8(1)?,
            subminor: response.payload_u8(2)?,
            build: response.payload_u8(3)?,
        })
    }

    /// Query the highest baud rate the device supports
    pub async fn get_max_baud_rate(&mut self) -> Result<u32, ProtocolError> {
        let response = self.exchange(Command::GetMaxBaudRate, &[]).await?;
        response.payload_u32_be(0)
    }

    /// Request a new link baud rate; returns the rate the device applied.
    ///
    /// The firmware emits this reply's 32-bit value at frame offset 4, one
    /// byte earlier than every other command, overlapping the status
    /// position.
    pub async fn set_baud_rate(&mut self, baud_rate: u32) -> Result<u32, ProtocolError> {
        let params = ParamsBuilder::new().u32_be(baud_rate).build();
        let response = self.exchange(Command::SetBaudRate, &params).await?;
        response.u32_be_at(4)
    }

    /// Store a 16-bit user id on the device
    pub async fn set_device_user_id(&mut self, user_id: u16) -> Result<(), ProtocolError> {
        let params = ParamsBuilder::new().u16_be(user_id).build();
        self.exchange(Command::SetDeviceUserId, &params).await?;
        Ok(())
    }

    /// Read back the stored user id
    pub async fn get_device_user_id(&mut self) -> Result<u16, ProtocolError> {
        let response = self.exchange(Command::GetDeviceUserId, &[]).await?;
        response.payload_u16_be(0)
    }

    /// Query the device's display name.
    ///
    /// The byte before the checksum is a terminator, not part of the name.
    pub async fn get_device_name(&mut self) -> Result<String, ProtocolError> {
        let response = self.exchange(Command::GetDeviceName, &[]).await?;
        let raw = response.as_bytes();
        if raw.len() <= MIN_RESPONSE_LEN {
            return Ok(String::new());
        }
        Ok(String::from_utf8_lossy(&raw[5..raw.len() - 2]).into_owned())
    }

    // Digital I/O

    /// Drive a single digital pin
    pub async fn digital_write(&mut self, pin: u8, level: bool) -> Result<(), ProtocolError> {
        self.digital_write_advanced(&[pin], &[level]).await
    }

    /// Drive several digital pins in one frame
    pub async fn digital_write_advanced(
        &mut self,
        pins: &[u8],
        levels: &[bool],
    ) -> Result<(), ProtocolError> {
        let count = parallel_count(("pin", pins.len()), ("level", levels.len()))?;
        let mut params = ParamsBuilder::new().byte(count).bytes(pins);
        for &level in levels {
            params = params.byte(level as u8);
        }
        self.exchange(Command::DigitalWrite, &params.build()).await?;
        Ok(())
    }

    /// Sample a single digital pin
    pub async fn digital_read(&mut self, pin: u8) -> Result<u8, ProtocolError> {
        let response = self.exchange(Command::DigitalRead, &[pin]).await?;
        response.payload_u8(0)
    }

    /// Sample several digital pins in one frame
    pub async fn digital_read_advanced(&mut self, pins: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let response = self.exchange(Command::DigitalRead, pins).await?;
        Ok(response.payload().to_vec())
    }

    /// Emit a square wave on a digital channel; a `None` duration encodes
    /// as zero and runs until reconfigured
    pub async fn digital_square_wave(
        &mut self,
        channel: u8,
        frequency: u32,
        duration: Option<u32>,
    ) -> Result<(), ProtocolError> {
        let params = ParamsBuilder::new()
            .byte(channel)
            .u32_be(frequency)
            .u32_be(duration.unwrap_or(0))
            .build();
        self.exchange(Command::DigitalSquareWave, &params).await?;
        Ok(())
    }

    // Analog I/O

    /// Sample a single analog pin
    pub async fn analog_read(&mut self, pin: u8) -> Result<u8, ProtocolError> {
        let response = self.exchange(Command::AnalogRead, &[pin]).await?;
        response.payload_u8(0)
    }

    /// Sample several analog pins in one frame
    pub async fn analog_read_advanced(&mut self, pins: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let response = self.exchange(Command::AnalogRead, pins).await?;
        Ok(response.payload().to_vec())
    }

    /// Drive a single analog pin
    pub async fn analog_write(&mut self, pin: u8, value: u8) -> Result<(), ProtocolError> {
        self.analog_write_advanced(&[pin], &[value]).await
    }

    /// Drive several analog pins in one frame
    pub async fn analog_write_advanced(
        &mut self,
        pins: &[u8],
        values: &[u8],
    ) -> Result<(), ProtocolError> {
        let count = parallel_count(("pin", pins.len()), ("value", values.len()))?;
        let params = ParamsBuilder::new()
            .byte(count)
            .bytes(pins)
            .bytes(values)
            .build();
        self.exchange(Command::AnalogWrite, &params).await?;
        Ok(())
    }

    // Servo

    /// List servo-capable channels
    pub async fn servo_channels(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let response = self.exchange(Command::ServoGetChannels, &[]).await?;
        Ok(response.payload().to_vec())
    }

    /// Attach servos to the given channels
    pub async fn servo_open(&mut self, channels: &[u8]) -> Result<(), ProtocolError> {
        self.exchange(Command::ServoOpen, channels).await?;
        Ok(())
    }

    /// Set a single servo pulse width in microseconds
    pub async fn servo_set_pulse_width(
        &mut self,
        channel: u8,
        width_us: u16,
    ) -> Result<(), ProtocolError> {
        self.servo_set_pulse_width_advanced(&[channel], &[width_us])
            .await
    }

    /// Set several servo pulse widths in one frame
    pub async fn servo_set_pulse_width_advanced(
        &mut self,
        channels: &[u8],
        widths_us: &[u16],
    ) -> Result<(), ProtocolError> {
        let count = parallel_count(("channel", channels.len()), ("width", widths_us.len()))?;
        let mut params = ParamsBuilder::new().byte(count).bytes(channels);
        for &width in widths_us {
            params = params.u16_be(width);
        }
        self.exchange(Command::ServoSetPulseWidth, &params.build())
            .await?;
        Ok(())
    }

    /// Detach servos from the given channels
    pub async fn servo_close(&mut self, channels: &[u8]) -> Result<(), ProtocolError> {
        self.exchange(Command::ServoClose, channels).await?;
        Ok(())
    }

    // SPI

    /// Open an SPI channel
    pub async fn spi_open(&mut self, channel: u8) -> Result<(), ProtocolError> {
        self.exchange(Command::SpiOpen, &[channel]).await?;
        Ok(())
    }

    /// Set an SPI channel's shift direction
    pub async fn spi_set_bit_order(
        &mut self,
        channel: u8,
        bit_order: BitOrder,
    ) -> Result<(), ProtocolError> {
        self.exchange(Command::SpiSetBitOrder, &[channel, bit_order.wire()])
            .await?;
        Ok(())
    }

    /// Set an SPI channel's clock frequency; returns the frequency the
    /// device actually applied
    pub async fn spi_set_clock_frequency(
        &mut self,
        channel: u8,
        target_frequency: u32,
    ) -> Result<u32, ProtocolError> {
        let params = ParamsBuilder::new()
            .byte(channel)
            .u32_be(target_frequency)
            .build();
        let response = self.exchange(Command::SpiSetClockFrequency, &params).await?;
        response.payload_u32_be(0)
    }

    /// Set an SPI channel's clock polarity/phase mode (0 through 3)
    pub async fn spi_set_mode(&mut self, channel: u8, mode: u8) -> Result<(), ProtocolError> {
        if mode > 3 {
            return Err(ProtocolError::InvalidArguments(format!(
                "SPI mode must be between 0 and 3, got {mode}"
            )));
        }
        self.exchange(Command::SpiSetMode, &[channel, mode]).await?;
        Ok(())
    }

    /// Full-duplex SPI transfer with the frame size taken from the data
    /// length
    pub async fn spi_write_read(
        &mut self,
        channel: u8,
        cs_pin: u8,
        cs_level: CsLogicLevel,
        data: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        let frame_size = u8::try_from(data.len()).map_err(|_| {
            ProtocolError::InvalidArguments(format!(
                "SPI transfer too long for a single frame: {} bytes",
                data.len()
            ))
        })?;
        self.spi_write_read_advanced(channel, frame_size, cs_pin, cs_level, data)
            .await
    }

    /// Full-duplex SPI transfer with an explicit frame size
    pub async fn spi_write_read_advanced(
        &mut self,
        channel: u8,
        frame_size: u8,
        cs_pin: u8,
        cs_level: CsLogicLevel,
        data: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        let params = ParamsBuilder::new()
            .byte(channel)
            .byte(frame_size)
            .byte(cs_pin)
            .byte(cs_level.wire())
            .bytes(data)
            .build();
        let response = self.exchange(Command::SpiWriteRead, &params).await?;
        Ok(response.payload().to_vec())
    }

    // I2C

    /// Open an I2C bus
    pub async fn i2c_open(&mut self, channel: u8) -> Result<(), ProtocolError> {
        self.exchange(Command::I2cOpen, &[channel]).await?;
        Ok(())
    }

    /// Set an I2C bus clock frequency; returns the frequency the device
    /// actually applied
    pub async fn i2c_set_speed(
        &mut self,
        channel: u8,
        target_frequency: u32,
    ) -> Result<u32, ProtocolError> {
        let params = ParamsBuilder::new()
            .byte(channel)
            .u32_be(target_frequency)
            .build();
        let response = self.exchange(Command::I2cSetSpeed, &params).await?;
        response.payload_u32_be(0)
    }

    /// Read bytes from an I2C slave; the slave address is masked to 7 bits
    pub async fn i2c_read(
        &mut self,
        channel: u8,
        slave_address: u8,
        num_bytes: u8,
        timeout_ms: u16,
        eof_config: I2cEofConfig,
    ) -> Result<Vec<u8>, ProtocolError> {
        let params = ParamsBuilder::new()
            .byte(channel)
            .byte(slave_address & 0x7F)
            .byte(num_bytes)
            .u16_be(timeout_ms)
            .byte(eof_config.wire())
            .build();
        let response = self.exchange(Command::I2cRead, &params).await?;
        Ok(response.payload().to_vec())
    }

    /// Write bytes to an I2C slave; the slave address is masked to 7 bits
    pub async fn i2c_write(
        &mut self,
        channel: u8,
        slave_address: u8,
        eof_config: I2cEofConfig,
        data: &[u8],
    ) -> Result<(), ProtocolError> {
        let params = ParamsBuilder::new()
            .byte(channel)
            .byte(slave_address & 0x7F)
            .byte(eof_config.wire())
            .bytes(data)
            .build();
        self.exchange(Command::I2cWrite, &params).await?;
        Ok(())
    }

    /// Close an I2C bus
    pub async fn i2c_close(&mut self, channel: u8) -> Result<(), ProtocolError> {
        self.exchange(Command::I2cClose, &[channel]).await?;
        Ok(())
    }

    // PWM

    /// Set a single pin's PWM duty cycle
    pub async fn pwm_set_duty_cycle(&mut self, pin: u8, duty_cycle: u8) -> Result<(), ProtocolError> {
        self.pwm_set_duty_cycle_advanced(&[pin], &[duty_cycle]).await
    }

    /// Set several pins' PWM duty cycles in one frame
    pub async fn pwm_set_duty_cycle_advanced(
        &mut self,
        pins: &[u8],
        duty_cycles: &[u8],
    ) -> Result<(), ProtocolError> {
        let count = parallel_count(("pin", pins.len()), ("duty cycle", duty_cycles.len()))?;
        let params = ParamsBuilder::new()
            .byte(count)
            .bytes(pins)
            .bytes(duty_cycles)
            .build();
        self.exchange(Command::PwmSetDutyCycle, &params).await?;
        Ok(())
    }

    /// Set several pins' PWM frequencies in one frame, one 32-bit
    /// frequency per pin
    pub async fn pwm_set_frequency_advanced(
        &mut self,
        pins: &[u8],
        frequencies: &[u32],
    ) -> Result<(), ProtocolError> {
        let count = parallel_count(("pin", pins.len()), ("frequency", frequencies.len()))?;
        let mut params = ParamsBuilder::new().byte(count).bytes(pins);
        for &frequency in frequencies {
            params = params.u32_be(frequency);
        }
        self.exchange(Command::PwmSetFrequency, &params.build())
            .await?;
        Ok(())
    }

    // UART

    /// Open a UART channel; returns the baud rate the device actually
    /// applied
    pub async fn uart_open(&mut self, channel: u8, baud_rate: u32) -> Result<u32, ProtocolError> {
        let params = ParamsBuilder::new().byte(channel).u32_be(baud_rate).build();
        let response = self.exchange(Command::UartOpen, &params).await?;
        response.payload_u32_be(0)
    }

    /// Change an open UART channel's baud rate; returns the applied rate
    pub async fn uart_set_baud_rate(
        &mut self,
        channel: u8,
        baud_rate: u32,
    ) -> Result<u32, ProtocolError> {
        let params = ParamsBuilder::new().byte(channel).u32_be(baud_rate).build();
        let response = self.exchange(Command::UartSetBaudRate, &params).await?;
        response.payload_u32_be(0)
    }

    /// Count bytes waiting in a UART receive buffer
    pub async fn uart_bytes_available(&mut self, channel: u8) -> Result<u8, ProtocolError> {
        let response = self
            .exchange(Command::UartGetBytesAvailable, &[channel])
            .await?;
        response.payload_u8(0)
    }

    /// Read up to `num_bytes` from a UART channel
    pub async fn uart_read(&mut self, channel: u8, num_bytes: u8) -> Result<Vec<u8>, ProtocolError> {
        let response = self
            .exchange(Command::UartRead, &[channel, num_bytes])
            .await?;
        Ok(response.payload().to_vec())
    }

    /// Write bytes to a UART channel
    pub async fn uart_write(&mut self, channel: u8, data: &[u8]) -> Result<(), ProtocolError> {
        let params = ParamsBuilder::new().byte(channel).bytes(data).build();
        self.exchange(Command::UartWrite, &params).await?;
        Ok(())
    }

    /// Close a UART channel
    pub async fn uart_close(&mut self, channel: u8) -> Result<(), ProtocolError> {
        self.exchange(Command::UartClose, &[channel]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Transport, TransportError};
    use async_trait::async_trait;

    struct StatusOnlyTransport;

    #[async_trait]
    impl Transport for StatusOnlyTransport {
        fn name(&self) -> &'static str {
            "status-only"
        }

        async fn write_read(
            &self,
            _address: &str,
            _endpoint: &str,
            _payload: &[u8],
            _format: WireFormat,
        ) -> Result<Vec<u8>, TransportError> {
            let mut frame = vec![0xFF, 6, 0, 0, 0];
            frame.push(crate::protocol::checksum(&frame));
            Ok(frame)
        }
    }

    fn device() -> Device {
        Device::with_connection(
            "http://device.local",
            ConnectionHandler::with_transport(Box::new(StatusOnlyTransport)),
        )
    }

    #[tokio::test]
    async fn test_sequence_wraps_at_u16_max() {
        let mut dev = device();
        dev.sequence = u16::MAX;
        dev.sync().await.unwrap();
        assert_eq!(dev.sequence(), 0);
    }

    #[tokio::test]
    async fn test_parallel_count_mismatch_is_local() {
        let mut dev = device();
        let err = dev
            .digital_write_advanced(&[1, 2], &[true])
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidArguments(_)));
        // No sequence number was consumed, so no frame went out.
        assert_eq!(dev.sequence(), 0);
    }

    #[tokio::test]
    async fn test_spi_mode_out_of_range_is_local() {
        let mut dev = device();
        let err = dev.spi_set_mode(0, 4).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidArguments(_)));
        assert_eq!(dev.sequence(), 0);
    }

    #[tokio::test]
    async fn test_oversized_params_rejected_before_exchange() {
        let mut dev = device();
        let data = vec![0u8; 300];
        let err = dev.uart_write(0, &data).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidArguments(_)));
        assert_eq!(dev.sequence(), 0);
    }

    #[test]
    fn test_parallel_count_ok() {
        assert_eq!(parallel_count(("pin", 3), ("value", 3)).unwrap(), 3);
    }
}
