// Fixed-width byte (de)serialization at arbitrary, possibly unaligned offsets.

pub fn read_u16(data: &[u8]) -> u16 {
    u16::from_le_bytes([data[0], data[1]])
}

pub fn write_u16(data: &mut [u8], num: u16) {
    data[0..2].copy_from_slice(&num.to_le_bytes());
}

pub fn read_i16(data: &[u8]) -> i16 {
    i16::from_le_bytes([data[0], data[1]])
}

pub fn write_i16(data: &mut [u8], num: i16) {
    data[0..2].copy_from_slice(&num.to_le_bytes());
}

pub fn read_u32(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

pub fn write_u32(data: &mut [u8], num: u32) {
    data[0..4].copy_from_slice(&num.to_le_bytes());
}

pub fn read_i32(data: &[u8]) -> i32 {
    i32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

pub fn write_i32(data: &mut [u8], num: i32) {
    data[0..4].copy_from_slice(&num.to_le_bytes());
}

pub fn read_u64(data: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[0..8]);
    u64::from_le_bytes(buf)
}

pub fn write_u64(data: &mut [u8], num: u64) {
    data[0..8].copy_from_slice(&num.to_le_bytes());
}
