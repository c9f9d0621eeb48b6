//! 帧编解码错误分类。
//!
//! ## 教案定位（Why）
//! - 规范里把故障划分为参数错误、协议错误、资源错误、订阅错误与编码错误五类，
//!   每一类对“状态是否改变”“是否需要进入终态”有不同的后果；把它们折叠进一个
//!   `Display`/`Error` 字符串会抹掉这些差异，所以这里保留细粒度枚举。
//! - `FrameCodec` 的解码错误是“粘性”的（sticky）：一旦进入 `Error` 状态，
//!   后续所有调用都必须返回同一类错误而不能假装恢复，调用方可以用
//!   `FrameCodecError::is_sticky` 判断是否应当放弃该实例。
//!
//! ## 契约说明（What）
//! - 启用 `std` 特性时派生 [`thiserror::Error`]，可直接接入 `std::error::Error` 生态；
//! - 在 `no_std + alloc` 场景下手写 `Display`，保持两种编译形态下错误信息一致。
#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(feature = "std")]
use thiserror::Error;

/// 帧层编解码过程中可能出现的错误。
///
/// 变体按照规范 §7 的分类分组排列：参数错误、协议错误、资源错误、订阅错误、编码错误。
#[cfg_attr(feature = "std", derive(Error))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCodecError {
    /// `receive_bytes` 收到了零长度缓冲区。
    #[cfg_attr(feature = "std", error("receive_bytes called with an empty buffer"))]
    EmptyReceiveBuffer,

    /// 声明的帧大小小于协议允许的最小值（8 字节）。
    #[cfg_attr(
        feature = "std",
        error("frame size {size} is below the minimum of {min}")
    )]
    FrameTooSmall {
        /// 线上声明的帧大小。
        size: u32,
        /// 允许的最小帧大小，恒为 8。
        min: u32,
    },

    /// 声明的帧大小超过了当前配置的 `max_frame_size`。
    #[cfg_attr(
        feature = "std",
        error("frame size {size} exceeds the configured maximum of {max}")
    )]
    FrameTooLarge {
        /// 线上声明或待编码的帧大小。
        size: u32,
        /// 当前生效的最大帧大小。
        max: u32,
    },

    /// `doff` 字段小于协议允许的最小值（2 个 4 字节字）。
    #[cfg_attr(feature = "std", error("data offset {doff} is below the minimum of 2"))]
    InvalidDataOffset {
        /// 线上声明的 `doff`。
        doff: u8,
    },

    /// `doff*4` 超出了帧自己声明的 `frame_size`，类型特定区域和帧体无法放下。
    #[cfg_attr(
        feature = "std",
        error("data offset {doff} implies a body offset beyond the declared frame size {frame_size}")
    )]
    DataOffsetExceedsFrameSize {
        /// 线上声明的 `doff`。
        doff: u8,
        /// 线上声明的帧大小。
        frame_size: u32,
    },

    /// 解码时为接收缓冲区分配内存失败。
    #[cfg_attr(
        feature = "std",
        error("allocating {requested} bytes for the receive buffer failed")
    )]
    AllocationFailed {
        /// 申请失败的字节数。
        requested: usize,
    },

    /// 编码时类型特定区域长度超过了协议上限（`255*4 - 6`）。
    #[cfg_attr(
        feature = "std",
        error("type-specific size {size} exceeds the protocol maximum of {max}")
    )]
    TypeSpecificTooLarge {
        /// 调用方提供的类型特定区域长度。
        size: usize,
        /// 协议允许的上限，恒为 `255*4 - 6`。
        max: usize,
    },

    /// 试图在解码未完成时把 `max_frame_size` 调小到当前在途帧之下。
    #[cfg_attr(
        feature = "std",
        error(
            "cannot lower max_frame_size to {requested} while a frame of size {in_flight} is being decoded"
        )
    )]
    MaxFrameSizeRejected {
        /// 调用方请求的新上限。
        requested: u32,
        /// 当前在途帧已经声明的大小。
        in_flight: u32,
    },

    /// 试图把 `max_frame_size` 设置为小于协议最小值（8）。
    #[cfg_attr(
        feature = "std",
        error("max_frame_size {requested} is below the protocol minimum of 8")
    )]
    MaxFrameSizeTooSmall {
        /// 调用方请求的新上限。
        requested: u32,
    },

    /// 给定帧类型没有对应的订阅，无法取消订阅。
    #[cfg_attr(
        feature = "std",
        error("no subscription is registered for frame type {frame_type}")
    )]
    SubscriptionNotFound {
        /// 未命中的帧类型。
        frame_type: u8,
    },

    /// 编解码器已经进入吸收态 `Error`，所有后续调用都会立即失败。
    #[cfg_attr(
        feature = "std",
        error("frame codec has entered the terminal error state and cannot be used further")
    )]
    CodecInErrorState,

    /// 输出 sink（真实传输或堆缓冲区）拒绝了写入，通常意味着对端背压或资源耗尽。
    #[cfg_attr(feature = "std", error("output sink rejected a write"))]
    SinkRejected,
}

impl FrameCodecError {
    /// 该错误是否会把解码器钉死在 `Error` 状态（粘性错误）。
    ///
    /// 参数错误（空缓冲区、订阅未找到、`max_frame_size` 校验失败）不会改变解码器
    /// 状态；协议错误与资源错误会。调用方可以据此决定是否需要丢弃并重建实例。
    pub fn is_sticky(self) -> bool {
        matches!(
            self,
            FrameCodecError::FrameTooSmall { .. }
                | FrameCodecError::FrameTooLarge { .. }
                | FrameCodecError::InvalidDataOffset { .. }
                | FrameCodecError::DataOffsetExceedsFrameSize { .. }
                | FrameCodecError::AllocationFailed { .. }
                | FrameCodecError::CodecInErrorState
        )
    }
}

#[cfg(not(feature = "std"))]
impl fmt::Display for FrameCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyReceiveBuffer => {
                write!(f, "receive_bytes called with an empty buffer")
            }
            Self::FrameTooSmall { size, min } => {
                write!(f, "frame size {size} is below the minimum of {min}")
            }
            Self::FrameTooLarge { size, max } => {
                write!(f, "frame size {size} exceeds the configured maximum of {max}")
            }
            Self::InvalidDataOffset { doff } => {
                write!(f, "data offset {doff} is below the minimum of 2")
            }
            Self::DataOffsetExceedsFrameSize { doff, frame_size } => write!(
                f,
                "data offset {doff} implies a body offset beyond the declared frame size {frame_size}"
            ),
            Self::AllocationFailed { requested } => {
                write!(f, "allocating {requested} bytes for the receive buffer failed")
            }
            Self::TypeSpecificTooLarge { size, max } => {
                write!(f, "type-specific size {size} exceeds the protocol maximum of {max}")
            }
            Self::MaxFrameSizeRejected {
                requested,
                in_flight,
            } => write!(
                f,
                "cannot lower max_frame_size to {requested} while a frame of size {in_flight} is being decoded"
            ),
            Self::MaxFrameSizeTooSmall { requested } => write!(
                f,
                "max_frame_size {requested} is below the protocol minimum of 8"
            ),
            Self::SubscriptionNotFound { frame_type } => write!(
                f,
                "no subscription is registered for frame type {frame_type}"
            ),
            Self::CodecInErrorState => write!(
                f,
                "frame codec has entered the terminal error state and cannot be used further"
            ),
            Self::SinkRejected => write!(f, "output sink rejected a write"),
        }
    }
}
