#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

//! # spark-codec-amqp
//!
//! AMQP 1.0 帧层编解码器：在 `spark-core` 生态之外独立成包的零依赖实现。
//!
//! ## 教案定位（Why）
//! - AMQP 1.0 (ISO/IEC 19464 §2.3) 的帧层只关心字节级别的分帧与重组，不涉及
//!   `amqp-value` 的类型系统、会话/链路状态机或传输握手，因此本 crate 刻意不依赖
//!   `spark-core` 的庞大契约面，换取一个可以独立审查、独立发布的最小内核；
//! - 帧编解码是整个协议栈里对性能与正确性要求最苛刻的部分（逐字节流式解析、
//!   严格的帧大小预算、零拷贝出站负载），适合单独沉淀为教案级参考实现。
//!
//! ## 架构总览（How）
//! - [`payload`] 模块提供 [`payload::Payload`]：一个可追加、可克隆、可流式输出的
//!   异构字节片段序列，用于无拷贝地拼装出站帧体；
//! - [`codec`] 模块提供 [`codec::FrameCodec`]：驱动 `receive_bytes`/`encode_frame`
//!   的状态机，按帧类型分发到订阅者，并在编码侧强制最大帧大小约束；
//! - [`frame`] 模块集中存放线上格式常量；[`error`] 模块定义贯穿两者的错误分类。
//!
//! ## 并发与所有权契约（What）
//! - 两个组件都是单线程、同步、非重入的：调用方必须在外部串行化对同一实例的访问；
//! - `FrameCodec` 不拥有传输层，也不执行任何 I/O；调用方负责把字节喂给
//!   `receive_bytes`，并把 `encode_frame` 产生的字节块转发给真实的 socket/管道。
//!
//! ## 风险与边界（Trade-offs）
//! - 不解释帧体语义（`amqp-value` 类型系统属于更上层的关注点）；
//! - 不提供重试、重连或背压策略；这些是会话/连接层的职责。

extern crate alloc;

pub mod codec;
pub mod error;
pub mod frame;
pub mod payload;

pub use codec::{FrameCodec, FrameSink};
pub use error::FrameCodecError;
pub use frame::{DEFAULT_MAX_FRAME_SIZE, MAX_TYPE_SPECIFIC_SIZE, MIN_MAX_FRAME_SIZE};
pub use payload::{CallbackWriter, Payload, Sink};
