//! 线上格式常量（ISO/IEC 19464 §2.3）。
//!
//! 帧头固定 8 字节：4 字节帧大小 + 1 字节 `doff` + 1 字节类型 + 2 字节保留。
//! `doff` 以 4 字节字为单位给出帧体起始偏移，最小值为 2（即帧头本身）。

/// 每个帧固定携带的帧头长度：`size`(4) + `doff`(1) + `type`(1) + 2 字节保留。
pub const FRAME_HEADER_SIZE: u32 = 8;

/// 协议允许的最小帧大小，等于裸帧头长度。
pub const MIN_FRAME_SIZE: u32 = FRAME_HEADER_SIZE;

/// `doff` 字段允许的最小值：帧体偏移至少要覆盖帧头本身的 2 个字。
pub const MIN_DOFF: u8 = 2;

/// `doff` 是以 4 字节为单位的字计数。
pub const DOFF_WORD_SIZE: u32 = 4;

/// 未显式协商时使用的默认最大帧大小。
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 512;

/// `set_max_frame_size` 接受的最小值，与协议最小帧大小一致。
pub const MIN_MAX_FRAME_SIZE: u32 = MIN_FRAME_SIZE;

/// 类型特定区域允许的最大长度：`doff` 取满 255 个字时减去帧头中已经占用的 6 字节。
pub const MAX_TYPE_SPECIFIC_SIZE: usize = 255 * DOFF_WORD_SIZE as usize - 6;
