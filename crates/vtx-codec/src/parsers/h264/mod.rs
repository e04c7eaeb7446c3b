//! H.264/AVC Annex B 码流工具:
//! - NAL 单元分割与类型识别
//! - 防竞争字节 (emulation prevention) 的插入与移除
//! - NAL 单元封装

pub mod nal;

pub use nal::{
    NalUnit, NalUnitType, add_emulation_prevention, remove_emulation_prevention, split_annex_b,
    write_nal_unit,
};
