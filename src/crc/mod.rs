use crc::{CRC_16_XMODEM, CRC_32_ISCSI, Crc};

/// CRC16 used by user-friendly address checksums
pub const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC32C used by bag-of-cells checksums
pub const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);
