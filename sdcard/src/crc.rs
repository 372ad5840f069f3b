/// SD命令与寄存器使用的CRC-7，生成多项式为 x^7 + x^3 + 1。
pub fn crc7(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        for bit in (0..8).rev() {
            let feedback = ((byte >> bit) ^ (crc >> 6)) & 1;
            crc = (crc << 1) & 0x7F;
            if feedback != 0 {
                crc ^= 0x09;
            }
        }
    }
    crc
}

/// CRC-7左移一位，最低位为结束位（恒为1），即寄存器与命令的尾字节。
pub fn crc7_and_stop_bit(data: &[u8]) -> u8 {
    (crc7(data) << 1) | 1
}
