//! 比特流写入器.
//!
//! 按大端位序 (MSB first) 写入, 与 [`BitReader`](crate::bitreader::BitReader) 对应.
//! 提供 H.264 RBSP 所需的 Exp-Golomb 编码与 rbsp_trailing_bits.

/// 比特流写入器
///
/// # 示例
/// ```
/// use vtx_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_bits(0b0001, 4);
/// bw.write_bits(0b01010101, 8);
/// let data = bw.finish();
/// assert_eq!(data, vec![0b10110001, 0b01010101]);
/// ```
pub struct BitWriter {
    /// 输出缓冲区
    data: Vec<u8>,
    /// 当前字节 (正在填充)
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// 以指定容量创建比特流写入器
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            current_byte: 0,
            bit_count: 0,
        }
    }

    /// 获取已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// 是否位于字节边界
    pub fn is_byte_aligned(&self) -> bool {
        self.bit_count == 0
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: u32) {
        self.current_byte = (self.current_byte << 1) | (bit & 1) as u8;
        self.bit_count += 1;
        if self.bit_count >= 8 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 写入 1 个布尔标志位
    pub fn write_flag(&mut self, flag: bool) {
        self.write_bit(u32::from(flag));
    }

    /// 写入 N 个位 (最多 32 位), 值的低 N 位高位在前
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={} 超过 32 位", n);

        let mut remaining = n;
        while remaining > 0 {
            let available = 8 - self.bit_count as u32;
            let to_write = remaining.min(available);

            let shift = remaining - to_write;
            let mask = (1u32 << to_write) - 1;
            let bits = ((value >> shift) & mask) as u8;

            if to_write >= 8 {
                self.current_byte = bits;
            } else {
                self.current_byte = (self.current_byte << to_write) | bits;
            }
            self.bit_count += to_write as u8;

            if self.bit_count >= 8 {
                self.data.push(self.current_byte);
                self.current_byte = 0;
                self.bit_count = 0;
            }

            remaining -= to_write;
        }
    }

    /// 写入无符号 Exp-Golomb 编码 ue(v)
    ///
    /// 码字为 `M` 个前导 0, 后接 `value + 1` 的 `M + 1` 位二进制.
    pub fn write_ue(&mut self, value: u32) {
        let code = u64::from(value) + 1;
        let len = 64 - code.leading_zeros();
        let leading_zeros = len - 1;
        for _ in 0..leading_zeros {
            self.write_bit(0);
        }
        if len > 32 {
            self.write_bit(1);
            self.write_bits(code as u32, len - 1);
        } else {
            self.write_bits(code as u32, len);
        }
    }

    /// 写入有符号 Exp-Golomb 编码 se(v)
    pub fn write_se(&mut self, value: i32) {
        let mapped = if value > 0 {
            (value as u32) * 2 - 1
        } else {
            value.unsigned_abs() * 2
        };
        self.write_ue(mapped);
    }

    /// 写入 rbsp_trailing_bits: 一个停止位 1, 再用 0 对齐到字节边界
    pub fn write_trailing_bits(&mut self) {
        self.write_bit(1);
        self.align_to_byte();
    }

    /// 对齐到字节边界 (用 0 填充)
    pub fn align_to_byte(&mut self) {
        if self.bit_count > 0 {
            let pad = 8 - self.bit_count;
            self.current_byte <<= pad;
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 写入完整字节
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.bit_count == 0 {
            self.data.extend_from_slice(bytes);
        } else {
            for &b in bytes {
                self.write_bits(u32::from(b), 8);
            }
        }
    }

    /// 完成写入, 返回字节数据 (不在字节边界时自动补 0)
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitReader;

    #[test]
    fn test_write_bits_basic() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b1011, 4);
        bw.write_bits(0b0001, 4);
        assert_eq!(bw.finish(), vec![0b10110001]);
    }

    #[test]
    fn test_write_bits_32_bit() {
        let mut bw = BitWriter::new();
        bw.write_bits(0xFF00FF00, 32);
        assert_eq!(bw.finish(), vec![0xFF, 0x00, 0xFF, 0x00]);
    }

    #[test]
    fn test_write_ue_已知码字() {
        let mut bw = BitWriter::new();
        for v in [0, 1, 2, 3] {
            bw.write_ue(v);
        }
        // 1 010 011 00100
        assert_eq!(bw.finish(), vec![0b1010_0110, 0b0100_0000]);
    }

    #[test]
    fn test_exp_golomb_往返() {
        let values = [0u32, 1, 7, 25, 255, 65_535, 1 << 20];
        let signed = [0i32, 1, -1, 17, -300];

        let mut bw = BitWriter::new();
        for &v in &values {
            bw.write_ue(v);
        }
        for &v in &signed {
            bw.write_se(v);
        }
        let data = bw.finish();

        let mut br = BitReader::new(&data);
        for &v in &values {
            assert_eq!(br.read_ue().unwrap(), v);
        }
        for &v in &signed {
            assert_eq!(br.read_se().unwrap(), v);
        }
    }

    #[test]
    fn test_trailing_bits() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b101, 3);
        bw.write_trailing_bits();
        assert!(bw.is_byte_aligned());
        assert_eq!(bw.finish(), vec![0b1011_0000]);

        let mut aligned = BitWriter::new();
        aligned.write_bits(0xAB, 8);
        aligned.write_trailing_bits();
        assert_eq!(aligned.finish(), vec![0xAB, 0x80]);
    }

    #[test]
    fn test_write_bytes_未对齐() {
        let mut bw = BitWriter::new();
        bw.write_bit(1);
        bw.write_bytes(&[0xFF]);
        assert_eq!(bw.bits_written(), 9);
        assert_eq!(bw.finish(), vec![0xFF, 0x80]);
    }
}
