//! NAL 单元聚合.
//!
//! H.26x 编码器一次编码可能产出多个 NAL 单元 (如 IDR 帧前的 SPS/PPS).
//! 聚合策略:
//! - 0 个单元: 不写出 (缓冲型编码器的正常情况);
//! - 1 个单元: 直接写出, 不拷贝;
//! - 多个单元: 按产出顺序拷贝到一块连续暂存区, 只调用一次写入.
//!
//! 暂存区跨帧复用, 容量只增不减.

use vtx_core::{FrameSink, VtxResult};

use crate::codec::{ConvertOutcome, write_packet};

/// NAL 单元聚合器
#[derive(Debug, Default)]
pub struct NalAggregator {
    scratch: Vec<u8>,
}

impl NalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将一次编码产出的单元写入 `sink`
    pub fn write(
        &mut self,
        codec: &str,
        units: &[&[u8]],
        sink: &mut dyn FrameSink,
    ) -> VtxResult<ConvertOutcome> {
        let mut outcome = ConvertOutcome::default();
        match units {
            [] => {}
            [single] => write_packet(codec, sink, single, &mut outcome)?,
            _ => {
                let total: usize = units.iter().map(|u| u.len()).sum();
                self.scratch.clear();
                self.scratch.reserve(total);
                for unit in units {
                    self.scratch.extend_from_slice(unit);
                }
                write_packet(codec, sink, &self.scratch, &mut outcome)?;
            }
        }
        Ok(outcome)
    }

    /// 暂存区当前容量
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtx_core::{FourCc, MemorySink};

    fn sink() -> MemorySink {
        MemorySink::new(FourCc::H264, 64, 64, 0)
    }

    #[test]
    fn test_零个单元不写出() {
        let sink = sink();
        let mut writer = sink.clone();
        let mut agg = NalAggregator::new();
        let outcome = agg.write("test", &[], &mut writer).unwrap();
        assert_eq!(outcome, ConvertOutcome::default());
        assert_eq!(sink.write_calls(), 0);
    }

    #[test]
    fn test_单个单元直接写出() {
        let sink = sink();
        let mut writer = sink.clone();
        let mut agg = NalAggregator::new();
        let unit = [0u8, 0, 0, 1, 0x65, 0xAA];
        let outcome = agg.write("test", &[&unit], &mut writer).unwrap();
        assert_eq!(outcome.packets, 1);
        assert_eq!(sink.packets()[0].as_ref(), &unit);
        // 单单元路径不使用暂存区
        assert_eq!(agg.scratch_capacity(), 0);
    }

    #[test]
    fn test_多个单元合并为一次写入() {
        let sink = sink();
        let mut writer = sink.clone();
        let mut agg = NalAggregator::new();
        let sps: &[u8] = &[0, 0, 0, 1, 0x67, 1, 2, 3];
        let pps: &[u8] = &[0, 0, 0, 1, 0x68, 4];
        let idr: &[u8] = &[0, 0, 0, 1, 0x65, 5, 6, 7, 8, 9];
        let outcome = agg.write("test", &[sps, pps, idr], &mut writer).unwrap();

        assert_eq!(sink.write_calls(), 1);
        assert_eq!(outcome.bytes, sps.len() + pps.len() + idr.len());
        let expected: Vec<u8> = [sps, pps, idr].concat();
        assert_eq!(sink.packets()[0].as_ref(), expected.as_slice());
    }

    #[test]
    fn test_暂存区跨帧复用() {
        let mut writer = sink();
        let mut agg = NalAggregator::new();
        let big = vec![7u8; 1000];
        agg.write("test", &[&big, &big], &mut writer).unwrap();
        let cap = agg.scratch_capacity();
        agg.write("test", &[&big[..10], &big[..10]], &mut writer).unwrap();
        assert_eq!(agg.scratch_capacity(), cap);
    }
}
