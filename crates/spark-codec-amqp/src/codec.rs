//! 帧编解码状态机：把字节流切分成帧，或把帧序列化为字节流。
//!
//! ## 教案定位（Why）
//! - 接收方向的输入是任意切分的字节块：调用方可能一次喂一整条 TCP 报文，
//!   也可能一次只喂一个字节。状态机必须能在任意切分点上暂停并在下一次调用
//!   时从断点继续，而不是假设每次调用都能看到一个完整的帧。
//! - 发送方向反过来：负载体可能很大，或者含有惰性求值的回调片段，不能无脑
//!   物化成一个巨大的 `Vec<u8>` 再整体发出。
//!
//! ## 架构总览（How）
//! - [`DecodeState`] 枚举把解码过程的五个阶段（帧大小、`doff`、帧类型、
//!   类型特定区域、帧体）显式建模出来，每个阶段持有把状态推进到下一阶段所
//!   需要的全部上下文；[`Accumulator`] 封装“攒够 N 字节才算一个阶段完成”
//!   这个反复出现的子问题。
//! - 一旦某次推进返回错误，状态机立即切换到吸收态 [`DecodeState::Error`]
//!   并把这次错误原样保留；该状态是粘性的，后续所有 `receive_bytes`
//!   调用都直接返回 [`crate::FrameCodecError::CodecInErrorState`]，不再
//!   尝试解释后续字节。
//! - 订阅表用定长数组 `[Option<Subscription>; 256]` 按帧类型直接索引，
//!   免去为最多 256 种帧类型维护一棵哈希表或红黑树的开销。
//! - 编码侧的 `is_last` 标记用一个跨越头部和负载的累计字节计数器判定：
//!   当已经写出的字节数等于声明的 `frame_size` 时，当前这块就是最后一块；
//!   长度为零的负载片段会被直接过滤掉，不会被误判成“最后一块”。

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use bytes::BytesMut;

use crate::error::FrameCodecError;
use crate::frame::{DOFF_WORD_SIZE, MIN_DOFF, MIN_FRAME_SIZE, MIN_MAX_FRAME_SIZE};
use crate::payload::{Payload, Sink};

/// 攒够固定数量字节才算完成的小缓冲区，用来表达解码状态机里反复出现的
/// “攒够 N 字节再前进”子问题。
struct Accumulator {
    buf: BytesMut,
    needed: usize,
}

impl Accumulator {
    fn new(needed: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(needed),
            needed,
        }
    }

    /// 从 `input` 里尽量多拿一些字节，返回是否已经攒够。
    fn take(&mut self, input: &mut &[u8]) -> bool {
        let remaining = self.needed - self.buf.len();
        let n = core::cmp::min(remaining, input.len());
        if n > 0 {
            self.buf.extend_from_slice(&input[..n]);
            *input = &input[n..];
        }
        self.buf.len() == self.needed
    }

    fn into_bytes(self) -> BytesMut {
        self.buf
    }
}

enum DecodeState {
    FrameSize(Accumulator),
    Doff {
        frame_size: u32,
    },
    FrameType {
        frame_size: u32,
        doff: u8,
    },
    TypeSpecific {
        frame_size: u32,
        doff: u8,
        frame_type: u8,
        acc: Accumulator,
    },
    FrameBody {
        frame_size: u32,
        frame_type: u8,
        type_specific: BytesMut,
        acc: Accumulator,
    },
    /// 吸收态：一旦进入就不会再离开，`receive_bytes` 对它短路处理。
    Error,
}

impl DecodeState {
    fn fresh() -> Self {
        DecodeState::FrameSize(Accumulator::new(4))
    }

    /// 当前在途帧已经声明的大小，尚未开始一个新帧（或已经出错）时为 `None`。
    fn declared_frame_size(&self) -> Option<u32> {
        match self {
            DecodeState::FrameSize(_) | DecodeState::Error => None,
            DecodeState::Doff { frame_size }
            | DecodeState::FrameType { frame_size, .. }
            | DecodeState::TypeSpecific { frame_size, .. }
            | DecodeState::FrameBody { frame_size, .. } => Some(*frame_size),
        }
    }
}

struct Subscription {
    callback: Box<dyn FnMut(u8, &[u8], &[u8])>,
}

const SUBSCRIPTION_SLOTS: usize = 256;

/// 帧编解码器：维护一个接收方向的状态机、一张按帧类型索引的订阅表，以及
/// 发送方向所需的最大帧大小约束。
///
/// 不拥有传输层，也不执行任何 I/O；调用方负责喂字节进来、把产出的字节块
/// 转发出去。单线程、同步、非重入：规范不要求在回调内部重入
/// `receive_bytes`/`subscribe`/`set_max_frame_size`。
pub struct FrameCodec {
    max_frame_size: u32,
    subscriptions: [Option<Subscription>; SUBSCRIPTION_SLOTS],
    state: DecodeState,
    on_error: Option<Box<dyn FnMut(FrameCodecError)>>,
}

impl FrameCodec {
    /// 创建一个新的编解码器实例。
    ///
    /// `on_error` 在状态机第一次（也是唯一一次）进入吸收态时被调用恰好一次；
    /// 传 `None` 表示调用方只关心 `receive_bytes` 的返回值，不需要额外通知。
    pub fn create(
        max_frame_size: u32,
        on_error: Option<Box<dyn FnMut(FrameCodecError)>>,
    ) -> Result<Self, FrameCodecError> {
        if max_frame_size < MIN_MAX_FRAME_SIZE {
            return Err(FrameCodecError::MaxFrameSizeTooSmall {
                requested: max_frame_size,
            });
        }
        Ok(Self {
            max_frame_size,
            subscriptions: core::array::from_fn(|_| None),
            state: DecodeState::fresh(),
            on_error,
        })
    }

    /// 当前生效的最大帧大小。
    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    /// 调整最大帧大小。
    ///
    /// 如果当前正在解码一个已经声明了 `frame_size` 的帧，且新的上限比那个
    /// 在途帧还小，拒绝这次调整：已经承诺接受的帧不能中途被判定超限。
    /// 编解码器已经处于吸收态时同样拒绝——此时调整上限已经没有意义。
    pub fn set_max_frame_size(&mut self, new_max: u32) -> Result<(), FrameCodecError> {
        if new_max < MIN_MAX_FRAME_SIZE {
            return Err(FrameCodecError::MaxFrameSizeTooSmall { requested: new_max });
        }
        if matches!(self.state, DecodeState::Error) {
            return Err(FrameCodecError::CodecInErrorState);
        }
        if let Some(in_flight) = self.state.declared_frame_size() {
            if new_max < in_flight {
                return Err(FrameCodecError::MaxFrameSizeRejected {
                    requested: new_max,
                    in_flight,
                });
            }
        }
        self.max_frame_size = new_max;
        Ok(())
    }

    /// 为给定帧类型注册回调，替换掉该类型上原先的订阅（如果有的话）。
    pub fn subscribe(&mut self, frame_type: u8, callback: Box<dyn FnMut(u8, &[u8], &[u8])>) {
        self.subscriptions[frame_type as usize] = Some(Subscription { callback });
    }

    /// 取消给定帧类型的订阅。
    pub fn unsubscribe(&mut self, frame_type: u8) -> Result<(), FrameCodecError> {
        if self.subscriptions[frame_type as usize].take().is_none() {
            return Err(FrameCodecError::SubscriptionNotFound { frame_type });
        }
        Ok(())
    }

    /// 喂入一段新到达的字节，推进解码状态机；每当凑齐一个完整帧，就同步
    /// 调用该帧类型对应的订阅回调（如果有的话）。
    ///
    /// 一旦编解码器已经处于吸收态，立即返回
    /// [`FrameCodecError::CodecInErrorState`] 而不触碰输入。
    pub fn receive_bytes(&mut self, data: &[u8]) -> Result<(), FrameCodecError> {
        if matches!(self.state, DecodeState::Error) {
            return Err(FrameCodecError::CodecInErrorState);
        }
        if data.is_empty() {
            return Err(FrameCodecError::EmptyReceiveBuffer);
        }

        let mut input = data;
        while !input.is_empty() {
            if let Err(err) = self.advance(&mut input) {
                self.state = DecodeState::Error;
                if let Some(cb) = self.on_error.as_mut() {
                    cb(err);
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn advance(&mut self, input: &mut &[u8]) -> Result<(), FrameCodecError> {
        let state = core::mem::replace(&mut self.state, DecodeState::Error);
        let next = match state {
            DecodeState::FrameSize(mut acc) => {
                if acc.take(input) {
                    let bytes = acc.into_bytes();
                    let frame_size =
                        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    if frame_size < MIN_FRAME_SIZE {
                        return Err(FrameCodecError::FrameTooSmall {
                            size: frame_size,
                            min: MIN_FRAME_SIZE,
                        });
                    }
                    if frame_size > self.max_frame_size {
                        return Err(FrameCodecError::FrameTooLarge {
                            size: frame_size,
                            max: self.max_frame_size,
                        });
                    }
                    DecodeState::Doff { frame_size }
                } else {
                    DecodeState::FrameSize(acc)
                }
            }
            DecodeState::Doff { frame_size } => {
                let doff = input[0];
                *input = &input[1..];
                if doff < MIN_DOFF {
                    return Err(FrameCodecError::InvalidDataOffset { doff });
                }
                if (doff as u32) * DOFF_WORD_SIZE > frame_size {
                    return Err(FrameCodecError::DataOffsetExceedsFrameSize { doff, frame_size });
                }
                DecodeState::FrameType { frame_size, doff }
            }
            DecodeState::FrameType { frame_size, doff } => {
                let frame_type = input[0];
                *input = &input[1..];
                let frame_body_offset = doff as u32 * DOFF_WORD_SIZE;
                let type_specific_len = (frame_body_offset - 6) as usize;
                DecodeState::TypeSpecific {
                    frame_size,
                    doff,
                    frame_type,
                    acc: Accumulator::new(type_specific_len),
                }
            }
            DecodeState::TypeSpecific {
                frame_size,
                doff,
                frame_type,
                mut acc,
            } => {
                if acc.take(input) {
                    let type_specific = acc.into_bytes();
                    let frame_body_offset = doff as u32 * DOFF_WORD_SIZE;
                    let body_len = (frame_size - frame_body_offset) as usize;
                    DecodeState::FrameBody {
                        frame_size,
                        frame_type,
                        type_specific,
                        acc: Accumulator::new(body_len),
                    }
                } else {
                    DecodeState::TypeSpecific {
                        frame_size,
                        doff,
                        frame_type,
                        acc,
                    }
                }
            }
            DecodeState::FrameBody {
                frame_size,
                frame_type,
                type_specific,
                mut acc,
            } => {
                if acc.take(input) {
                    let body = acc.into_bytes();
                    self.dispatch(frame_type, &type_specific, &body);
                    DecodeState::fresh()
                } else {
                    DecodeState::FrameBody {
                        frame_size,
                        frame_type,
                        type_specific,
                        acc,
                    }
                }
            }
            DecodeState::Error => unreachable!("receive_bytes short-circuits before reaching here"),
        };
        self.state = next;
        Ok(())
    }

    fn dispatch(&mut self, frame_type: u8, type_specific: &[u8], body: &[u8]) {
        let idx = frame_type as usize;
        if let Some(mut sub) = self.subscriptions[idx].take() {
            (sub.callback)(frame_type, type_specific, body);
            self.subscriptions[idx] = Some(sub);
        } else {
            tracing::debug!(frame_type, "dropping frame with no registered subscriber");
        }
    }

    /// 把一个帧编码并写出到 `out`：头部（`frame_size` + `doff` + 类型 +
    /// 类型特定区域 + 填充）之后紧跟负载体的全部片段。
    ///
    /// `out` 在每次写入时都会收到一个 `is_last` 标记，当累计写出的字节数
    /// 达到该帧声明的 `frame_size` 时为 `true`；长度为零的负载片段不会
    /// 产生单独的写入，不会干扰这个判定。
    ///
    /// 类型特定区域会被填充到 `doff*4` 的边界；解码端把这整段（含填充）
    /// 原样交付给订阅回调，无法区分哪些字节是填充。因此只有当
    /// `type_specific.len() % 4 == 2`（此时填充恰好为零）时，解码得到的
    /// 类型特定字节才逐字节等于这里传入的 `type_specific`；否则会多出
    /// 0 到 3 个尾随的零字节。
    pub fn encode_frame(
        &self,
        frame_type: u8,
        type_specific: &[u8],
        payload: &Payload,
        out: &mut dyn FrameSink,
    ) -> Result<(), FrameCodecError> {
        let ts_size = type_specific.len();
        if ts_size > crate::frame::MAX_TYPE_SPECIFIC_SIZE {
            return Err(FrameCodecError::TypeSpecificTooLarge {
                size: ts_size,
                max: crate::frame::MAX_TYPE_SPECIFIC_SIZE,
            });
        }

        let doff = core::cmp::max(MIN_DOFF as u32, ((ts_size + 6) as u32).div_ceil(DOFF_WORD_SIZE));
        let frame_body_offset = doff * DOFF_WORD_SIZE;
        let padding = frame_body_offset as usize - ts_size - 6;

        let body_size = payload.total_len();
        let frame_size = body_size as u32 + frame_body_offset;
        if frame_size > self.max_frame_size {
            return Err(FrameCodecError::FrameTooLarge {
                size: frame_size,
                max: self.max_frame_size,
            });
        }

        let mut header = Vec::with_capacity(frame_body_offset as usize);
        header.extend_from_slice(&frame_size.to_be_bytes());
        header.push(doff as u8);
        header.push(frame_type);
        header.extend_from_slice(type_specific);
        header.extend_from_slice(&vec![0u8; padding]);

        let mut counted = CountedFrameSink {
            out,
            emitted: 0,
            frame_size,
        };
        if !counted.write(&header) {
            return Err(FrameCodecError::SinkRejected);
        }
        payload.stream_output(&mut counted)
    }
}

/// 编码输出目的地：接收帧的字节块以及“这是不是最后一块”的标记。
pub trait FrameSink {
    /// 写入一块字节，返回是否成功。`is_last` 为 `true` 表示这是该帧的
    /// 最后一块（也可能是唯一一块）。
    fn emit(&mut self, chunk: &[u8], is_last: bool) -> bool;
}

struct CountedFrameSink<'a> {
    out: &'a mut dyn FrameSink,
    emitted: u32,
    frame_size: u32,
}

impl Sink for CountedFrameSink<'_> {
    fn write(&mut self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return true;
        }
        self.emitted += bytes.len() as u32;
        let is_last = self.emitted == self.frame_size;
        self.out.emit(bytes, is_last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::CallbackWriter;
    use alloc::rc::Rc;
    use alloc::string::String;
    use core::cell::RefCell;

    /// 收集 `encode_frame` 产出的全部块，记录它们各自的 `is_last` 标记，
    /// 便于断言恰好最后一块被标记、之前的都没有。
    struct RecordingSink {
        chunks: Vec<(Vec<u8>, bool)>,
    }

    impl FrameSink for RecordingSink {
        fn emit(&mut self, chunk: &[u8], is_last: bool) -> bool {
            self.chunks.push((chunk.to_vec(), is_last));
            true
        }
    }

    impl RecordingSink {
        fn flatten(&self) -> Vec<u8> {
            self.chunks.iter().flat_map(|(c, _)| c.iter().copied()).collect()
        }
    }

    fn recorded(frame_type: u8, type_specific: &[u8], payload: &Payload) -> RecordingSink {
        let codec = FrameCodec::create(4096, None).unwrap();
        let mut sink = RecordingSink { chunks: Vec::new() };
        codec
            .encode_frame(frame_type, type_specific, payload, &mut sink)
            .unwrap();
        sink
    }

    // Why: 规范里最小的空帧没有类型特定数据也没有帧体，编码器必须仍然填出
    // 完整的 8 字节帧头（含 2 字节填充），而不是截断成 6 字节。
    // How: 用 doff 最小值 2、空负载编码一个 type=0 的帧。
    // What: 验证最小帧严格等于 frame_body_offset（8 字节），且标记为 is_last。
    #[test]
    fn minimal_empty_frame_is_eight_bytes() {
        let payload = Payload::new();
        let sink = recorded(0x00, &[], &payload);
        assert_eq!(sink.flatten(), vec![0x00, 0x00, 0x00, 0x08, 0x02, 0x00, 0x00, 0x00]);
        assert_eq!(sink.chunks.len(), 1);
        assert!(sink.chunks[0].1);
    }

    #[test]
    fn frame_with_type_specific_and_no_body() {
        let payload = Payload::new();
        let sink = recorded(0x01, &[0xAA, 0xBB, 0xCC], &payload);
        // ts_size=3 => doff = ceil(9/4) = 3, frame_body_offset=12, padding=3, frame_size=12
        assert_eq!(
            sink.flatten(),
            vec![0x00, 0x00, 0x00, 0x0C, 0x03, 0x01, 0xAA, 0xBB, 0xCC, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn frame_with_body_marks_only_last_chunk() {
        let mut payload = Payload::new();
        payload.append_data(b"hello").unwrap();
        let sink = recorded(0x00, &[], &payload);
        assert_eq!(sink.flatten(), {
            let mut v = vec![0x00, 0x00, 0x00, 0x0D, 0x02, 0x00];
            v.extend_from_slice(b"hello");
            v
        });
        assert!(sink.chunks.iter().rev().next().unwrap().1);
        assert!(sink.chunks[..sink.chunks.len() - 1].iter().all(|(_, last)| !last));
    }

    #[test]
    fn empty_payload_parts_are_not_emitted_as_chunks() {
        let mut payload = Payload::new();
        let writer: CallbackWriter = Rc::new(|sink: &mut dyn Sink| sink.write(b""));
        payload.append_callback(writer);
        payload.append_data(b"x").unwrap();
        let sink = recorded(0x00, &[], &payload);
        assert_eq!(sink.chunks.len(), 1);
        assert_eq!(sink.chunks[0].0, b"x");
        assert!(sink.chunks[0].1);
    }

    #[test]
    fn encode_rejects_frame_above_max_frame_size() {
        let codec = FrameCodec::create(MIN_MAX_FRAME_SIZE, None).unwrap();
        let mut payload = Payload::new();
        payload.append_data(&[0u8; 64]).unwrap();
        let mut sink = RecordingSink { chunks: Vec::new() };
        let err = codec
            .encode_frame(0x00, &[], &payload, &mut sink)
            .unwrap_err();
        assert!(matches!(err, FrameCodecError::FrameTooLarge { .. }));
    }

    #[test]
    fn encode_rejects_oversized_type_specific() {
        let codec = FrameCodec::create(4096, None).unwrap();
        let payload = Payload::new();
        let oversized = vec![0u8; crate::frame::MAX_TYPE_SPECIFIC_SIZE + 1];
        let mut sink = RecordingSink { chunks: Vec::new() };
        let err = codec
            .encode_frame(0x00, &oversized, &payload, &mut sink)
            .unwrap_err();
        assert!(matches!(err, FrameCodecError::TypeSpecificTooLarge { .. }));
    }

    fn single_byte_feed(codec: &mut FrameCodec, data: &[u8]) -> Result<(), FrameCodecError> {
        for byte in data {
            codec.receive_bytes(core::slice::from_ref(byte))?;
        }
        Ok(())
    }

    // Why: 调用方可能一次只喂一个字节；状态机必须能在任意切分点上暂停继续。
    // How: 把一个完整的帧逐字节喂给 receive_bytes。
    // What: 订阅回调仍然只在帧完全凑齐时触发恰好一次。
    #[test]
    fn decode_handles_byte_at_a_time_input() {
        let received = Rc::new(RefCell::new(Vec::<(u8, Vec<u8>, Vec<u8>)>::new()));
        let received_inner = Rc::clone(&received);
        let mut codec = FrameCodec::create(4096, None).unwrap();
        codec.subscribe(
            0x10,
            Box::new(move |frame_type, ts, body| {
                received_inner
                    .borrow_mut()
                    .push((frame_type, ts.to_vec(), body.to_vec()));
            }),
        );

        let frame = [0x00u8, 0x00, 0x00, 0x0B, 0x02, 0x10, b'a', b'b', b'c'];
        single_byte_feed(&mut codec, &frame).unwrap();

        let calls = received.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (0x10, Vec::new(), b"abc".to_vec()));
    }

    #[test]
    fn decode_dispatches_multiple_frames_from_one_buffer() {
        let count = Rc::new(RefCell::new(0usize));
        let count_inner = Rc::clone(&count);
        let mut codec = FrameCodec::create(4096, None).unwrap();
        codec.subscribe(0x00, Box::new(move |_, _, _| *count_inner.borrow_mut() += 1));

        let one_frame = [0x00u8, 0x00, 0x00, 0x08, 0x02, 0x00, 0x00, 0x00];
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&one_frame);
        buffer.extend_from_slice(&one_frame);
        codec.receive_bytes(&buffer).unwrap();

        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn decode_ignores_frames_with_no_subscriber() {
        let mut codec = FrameCodec::create(4096, None).unwrap();
        let frame = [0x00u8, 0x00, 0x00, 0x08, 0x02, 0x05, 0x00, 0x00];
        codec.receive_bytes(&frame).unwrap();
    }

    #[test]
    fn decode_rejects_frame_size_below_minimum() {
        let mut codec = FrameCodec::create(4096, None).unwrap();
        let err = codec.receive_bytes(&[0x00, 0x00, 0x00, 0x04]).unwrap_err();
        assert!(matches!(err, FrameCodecError::FrameTooSmall { .. }));
    }

    #[test]
    fn decode_rejects_frame_size_above_max() {
        let mut codec = FrameCodec::create(16, None).unwrap();
        let err = codec.receive_bytes(&[0x00, 0x00, 0x00, 0x20]).unwrap_err();
        assert!(matches!(err, FrameCodecError::FrameTooLarge { .. }));
    }

    #[test]
    fn decode_rejects_doff_below_minimum() {
        let mut codec = FrameCodec::create(4096, None).unwrap();
        let err = codec
            .receive_bytes(&[0x00, 0x00, 0x00, 0x08, 0x01])
            .unwrap_err();
        assert!(matches!(err, FrameCodecError::InvalidDataOffset { doff: 1 }));
    }

    #[test]
    fn decode_rejects_doff_beyond_frame_size() {
        let mut codec = FrameCodec::create(4096, None).unwrap();
        let err = codec
            .receive_bytes(&[0x00, 0x00, 0x00, 0x08, 0x05])
            .unwrap_err();
        assert!(matches!(
            err,
            FrameCodecError::DataOffsetExceedsFrameSize { doff: 5, frame_size: 8 }
        ));
    }

    #[test]
    fn error_state_is_sticky_and_fires_callback_exactly_once() {
        let fired = Rc::new(RefCell::new(0usize));
        let fired_inner = Rc::clone(&fired);
        let mut codec = FrameCodec::create(
            4096,
            Some(Box::new(move |_err| *fired_inner.borrow_mut() += 1)),
        )
        .unwrap();

        assert!(codec.receive_bytes(&[0x00, 0x00, 0x00, 0x04]).is_err());
        assert_eq!(*fired.borrow(), 1);

        for _ in 0..3 {
            let err = codec.receive_bytes(&[0x01]).unwrap_err();
            assert!(matches!(err, FrameCodecError::CodecInErrorState));
        }
        assert_eq!(*fired.borrow(), 1, "error callback must fire exactly once");
    }

    #[test]
    fn receive_bytes_rejects_empty_buffer() {
        let mut codec = FrameCodec::create(4096, None).unwrap();
        let err = codec.receive_bytes(&[]).unwrap_err();
        assert!(matches!(err, FrameCodecError::EmptyReceiveBuffer));
    }

    #[test]
    fn create_rejects_max_frame_size_below_protocol_minimum() {
        let err = FrameCodec::create(4, None).unwrap_err();
        assert!(matches!(err, FrameCodecError::MaxFrameSizeTooSmall { .. }));
    }

    #[test]
    fn set_max_frame_size_rejects_lowering_below_in_flight_frame() {
        let mut codec = FrameCodec::create(4096, None).unwrap();
        // Declare a 64-byte frame but only feed the header so it stays in flight.
        codec.receive_bytes(&[0x00, 0x00, 0x00, 0x40, 0x02, 0x00]).unwrap();
        let err = codec.set_max_frame_size(16).unwrap_err();
        assert!(matches!(
            err,
            FrameCodecError::MaxFrameSizeRejected {
                requested: 16,
                in_flight: 64
            }
        ));
    }

    #[test]
    fn set_max_frame_size_rejects_lowering_while_frame_body_is_in_flight() {
        let mut codec = FrameCodec::create(4096, None).unwrap();
        // Declare a 16-byte frame and feed the full header plus type-specific
        // region, leaving the codec mid-body (`DecodeState::FrameBody`).
        codec
            .receive_bytes(&[0x00, 0x00, 0x00, 0x10, 0x02, 0x00])
            .unwrap();
        let err = codec.set_max_frame_size(8).unwrap_err();
        assert!(matches!(
            err,
            FrameCodecError::MaxFrameSizeRejected {
                requested: 8,
                in_flight: 16
            }
        ));
    }

    #[test]
    fn set_max_frame_size_rejects_once_codec_is_in_error_state() {
        let mut codec = FrameCodec::create(4096, None).unwrap();
        assert!(codec.receive_bytes(&[0x00, 0x00, 0x00, 0x04]).is_err());
        let err = codec.set_max_frame_size(4096).unwrap_err();
        assert!(matches!(err, FrameCodecError::CodecInErrorState));
    }

    #[test]
    fn unsubscribe_missing_subscription_is_an_error() {
        let mut codec = FrameCodec::create(4096, None).unwrap();
        let err = codec.unsubscribe(0x42).unwrap_err();
        assert!(matches!(err, FrameCodecError::SubscriptionNotFound { frame_type: 0x42 }));
    }

    #[test]
    fn subscribe_then_unsubscribe_stops_future_dispatch() {
        let calls = Rc::new(RefCell::new(0usize));
        let calls_inner = Rc::clone(&calls);
        let mut codec = FrameCodec::create(4096, None).unwrap();
        codec.subscribe(0x00, Box::new(move |_, _, _| *calls_inner.borrow_mut() += 1));
        codec.unsubscribe(0x00).unwrap();

        let frame = [0x00u8, 0x00, 0x00, 0x08, 0x02, 0x00, 0x00, 0x00];
        codec.receive_bytes(&frame).unwrap();
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn round_trip_through_encode_and_decode() {
        let mut payload = Payload::new();
        payload.append_string("round-trip").unwrap();

        let encoder = FrameCodec::create(4096, None).unwrap();
        let mut sink = RecordingSink { chunks: Vec::new() };
        encoder
            .encode_frame(0x07, &[0x01, 0x02], &payload, &mut sink)
            .unwrap();
        let wire = sink.flatten();

        let received_body = Rc::new(RefCell::new(String::new()));
        let received_inner = Rc::clone(&received_body);
        let mut decoder = FrameCodec::create(4096, None).unwrap();
        decoder.subscribe(
            0x07,
            Box::new(move |_, _, body| {
                *received_inner.borrow_mut() = String::from_utf8_lossy(body).into_owned();
            }),
        );
        decoder.receive_bytes(&wire).unwrap();
        assert_eq!(*received_body.borrow(), "round-trip");
    }
}
