//! Driver defaults.

/// Receive ring slots (capacity 20 bytes).
pub const UART_RX_RING_SIZE: usize = 20 + 1;

/// Transmit ring slots (capacity 128 bytes).
pub const UART_TX_RING_SIZE: usize = 128 + 1;

/// Baud rate programmed by `initialize`.
pub const UART_DEFAULT_BAUD: u32 = 115_200;

/// Bus clock programmed by the I2C host's `initialize`.
pub const I2C_DEFAULT_CLOCK_HZ: u32 = 100_000;

/// Serial clock programmed by the SPI host's `initialize`.
pub const SPI_DEFAULT_CLOCK_HZ: u32 = 1_000_000;

/// Depth of the SPI enhanced-buffer FIFOs.
pub const SPI_FIFO_DEPTH: usize = 4;

/// Byte clocked out while receiving past the end of the transmit data.
pub const SPI_DUMMY_BYTE: u8 = 0xFF;

/// Bytes the SPI client keeps from one chip-select window.
pub const SPI_CLIENT_READ_BUFFER_SIZE: usize = 256;

/// Longest reply the SPI client can stage.
pub const SPI_CLIENT_WRITE_BUFFER_SIZE: usize = 256;

/// Address an I2C client board answers at unless told otherwise.
pub const I2C_CLIENT_DEFAULT_ADDRESS: u16 = 0x54;
