//! 分段负载缓冲区：一段可追加、可克隆、可流式输出的异构字节片段序列。
//!
//! ## 教案定位（Why）
//! - 出站帧体经常由多个来源拼装：已经在内存里的字节片段，以及要到写出的那一刻
//!   才知道最终内容的惰性片段（比如按需序列化的消息体）。把两者都塞进一个
//!   `Vec<u8>` 要么提前强制求值，要么得自己手搓一套延迟计算协议；
//! - 原始实现用侵入式链表表达“片段序列”，每个节点要么是字节数组要么是回调。
//!   Rust 里没有必要手写链表：`Vec<Part>` 提供同样的“有序、可追加”语义，还免费
//!   拿到缓存友好的连续内存布局和切片操作。
//!
//! ## 架构总览（How）
//! - [`Part::Bytes`] 持有一段自有、可增长的字节数组（[`bytes::BytesMut`]）；
//! - [`Part::Callback`] 持有一个延迟求值的写入函数，其长度在第一次需要时计算一次
//!   并缓存在 [`core::cell::Cell`] 里，避免重复调用产生不一致的长度；
//! - 所有“追加”类操作遵循同一条策略：如果序列最后一个片段是字节数组，就原地
//!   扩容追加；否则才分配新的片段。这样连续的小块写入不会产生片段爆炸。
//!
//! ## 并发契约（What）
//! - `Payload` 不是 `Send`/`Sync`：回调闭包用 [`alloc::rc::Rc`] 持有，按规范
//!   该组件单线程使用，没有必要为跨线程共享的场景多付一次原子引用计数的代价。

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt;

use bytes::BytesMut;

use crate::error::FrameCodecError;

/// 把负载片段写出到目的地的抽象；既可以是真实传输，也可以是纯粹的计数器。
///
/// `write` 返回 `false` 表示目的地拒绝接受更多数据（背压、容量耗尽等），
/// 调用方应当立即停止流式输出并把失败上报给上层。
pub trait Sink {
    /// 写入一段字节，返回是否成功。
    fn write(&mut self, bytes: &[u8]) -> bool;
}

/// 统计累计写入字节数而不保留内容的 sink，用于在不产生副本的情况下求出
/// 含回调片段的负载总长度。
struct CountingSink {
    total: usize,
}

impl Sink for CountingSink {
    fn write(&mut self, bytes: &[u8]) -> bool {
        self.total += bytes.len();
        true
    }
}

/// 把所有写入追加到一段堆缓冲区的 sink，供 [`Payload::stream_to_heap`] 使用。
struct HeapSink<'a> {
    buffer: &'a mut BytesMut,
}

impl Sink for HeapSink<'_> {
    fn write(&mut self, bytes: &[u8]) -> bool {
        self.buffer.extend_from_slice(bytes);
        true
    }
}

/// 延迟写入函数的类型别名：接收一个 sink，返回写入是否成功。
///
/// 单线程场景下用 `Rc` 而不是 `Arc`：克隆负载时需要共享同一个闭包而不重新
/// 求值，但没有跨线程共享的需求，原子引用计数只是白付开销。
pub type CallbackWriter = Rc<dyn Fn(&mut dyn Sink) -> bool>;

struct CallbackPart {
    writer: CallbackWriter,
    cached_len: Cell<Option<usize>>,
}

impl fmt::Debug for CallbackPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackPart")
            .field("cached_len", &self.cached_len.get())
            .finish()
    }
}

#[derive(Debug)]
enum Part {
    Bytes(BytesMut),
    Callback(CallbackPart),
}

/// 一段有序的异构字节片段序列，既能容纳已实现化的字节数组，也能容纳惰性回调。
#[derive(Debug, Default)]
pub struct Payload {
    parts: Vec<Part>,
}

impl Payload {
    /// 创建一个空负载，不预先分配任何片段。
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// 创建一个空负载，并为第一个字节片段预留至少 `bytes` 字节的容量。
    ///
    /// 预留的内存要到第一次 [`Payload::append_data`]/[`Payload::reserve_data`]
    /// 调用时才会真正创建片段；这里只是把容量意图记录下来。
    pub fn with_capacity(bytes: usize) -> Result<Self, FrameCodecError> {
        let mut buf = BytesMut::new();
        buf.try_reserve(bytes)
            .map_err(|_| FrameCodecError::AllocationFailed { requested: bytes })?;
        let parts = if bytes == 0 {
            Vec::new()
        } else {
            let mut v = Vec::with_capacity(1);
            v.push(Part::Bytes(buf));
            v
        };
        Ok(Self { parts })
    }

    /// 丢弃所有片段，使负载恢复到刚创建时的空状态。
    pub fn clear(&mut self) {
        self.parts.clear();
    }

    /// 片段数量，主要用于诊断与测试断言。
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// 是否不含任何会产生输出字节的片段。
    ///
    /// 对回调片段采取保守策略：遇到第一个回调片段就立即判定为非空，而不去
    /// 调用它来确认真实长度——为了回答“是否为空”这个问题去触发一次可能很
    /// 昂贵（或带副作用）的求值是不划算的。
    pub fn is_empty(&self) -> bool {
        for part in &self.parts {
            match part {
                Part::Bytes(b) if !b.is_empty() => return false,
                Part::Bytes(_) => {}
                Part::Callback(_) => return false,
            }
        }
        true
    }

    /// 当前最后一个字节片段还剩多少未使用的容量；没有字节片段时为 0。
    pub fn spare_capacity(&self) -> usize {
        match self.parts.last() {
            Some(Part::Bytes(b)) => b.capacity() - b.len(),
            _ => 0,
        }
    }

    /// 是否含有至少一个回调片段。
    pub fn has_callback_data(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Callback(_)))
    }

    /// 结构性有效性检查。
    ///
    /// 在原始实现里这个检查要确认内部链表指针没有损坏；在 Rust 里 `Vec<Part>`
    /// 的不变量由类型系统在构造期就保证了，没有可能出现损坏的中间状态，
    /// 所以这里恒为 `true`。保留该方法只是为了和上游调用约定保持形状对齐。
    pub fn is_valid(&self) -> bool {
        true
    }

    /// 查看第一个片段的字节内容，仅当它是已经实现化的字节片段时返回。
    ///
    /// 用于调用方希望在不触发回调求值的前提下窥探已有数据的场景；如果负载
    /// 以回调片段开头，或者根本没有片段，返回 `None`。
    pub fn peek_bytes(&self) -> Option<&[u8]> {
        match self.parts.first() {
            Some(Part::Bytes(b)) => Some(&b[..]),
            _ => None,
        }
    }

    /// 追加一段已知字节。
    ///
    /// 遵循三分支策略：
    /// 1. 序列为空，或最后一个片段是回调 —— 分配一个新的字节片段；
    /// 2. 最后一个片段是字节数组 —— 原地扩容并追加，避免片段数量膨胀。
    pub fn append_data(&mut self, data: &[u8]) -> Result<(), FrameCodecError> {
        if data.is_empty() {
            return Ok(());
        }
        match self.parts.last_mut() {
            Some(Part::Bytes(buf)) => {
                buf.try_reserve(data.len())
                    .map_err(|_| FrameCodecError::AllocationFailed {
                        requested: data.len(),
                    })?;
                buf.extend_from_slice(data);
            }
            _ => {
                let mut buf = BytesMut::new();
                buf.try_reserve(data.len())
                    .map_err(|_| FrameCodecError::AllocationFailed {
                        requested: data.len(),
                    })?;
                buf.extend_from_slice(data);
                self.parts.push(Part::Bytes(buf));
            }
        }
        Ok(())
    }

    /// 追加一段 UTF-8 字符串，等价于 `append_data(s.as_bytes())`。
    pub fn append_string(&mut self, s: &str) -> Result<(), FrameCodecError> {
        self.append_data(s.as_bytes())
    }

    /// 在最后一个字节片段中原地预留 `len` 字节并返回可写切片，供调用方直接
    /// 填充而不经过中间缓冲区。
    ///
    /// 和 [`Payload::append_data`] 共享同一条“沿用已有尾部片段”的策略：只有
    /// 当最后一个片段不是字节数组时才分配新片段。
    pub fn reserve_data(&mut self, len: usize) -> Result<&mut [u8], FrameCodecError> {
        if !matches!(self.parts.last(), Some(Part::Bytes(_))) {
            self.parts.push(Part::Bytes(BytesMut::new()));
        }
        let buf = match self.parts.last_mut() {
            Some(Part::Bytes(buf)) => buf,
            _ => unreachable!("a byte part was just pushed above"),
        };
        buf.try_reserve(len)
            .map_err(|_| FrameCodecError::AllocationFailed { requested: len })?;
        let start = buf.len();
        buf.resize(start + len, 0);
        Ok(&mut buf[start..])
    }

    /// 追加一个惰性回调片段：其内容和长度要到流式输出时才会被求值，并且
    /// 只求值一次，结果缓存起来供后续重复查询长度使用。
    pub fn append_callback(&mut self, writer: CallbackWriter) {
        self.parts.push(Part::Callback(CallbackPart {
            writer,
            cached_len: Cell::new(None),
        }));
    }

    /// 把另一个负载的内容以复制的方式追加到自身末尾。
    ///
    /// 字节片段按值复制；回调片段共享同一个 `Rc` 闭包（复制的是“延迟求值”
    /// 这件事本身，而不是预先求值后的字节），各自维护独立的长度缓存。
    pub fn append_payload_as_copy(&mut self, other: &Payload) -> Result<(), FrameCodecError> {
        for part in &other.parts {
            match part {
                Part::Bytes(buf) => self.append_data(&buf[..])?,
                Part::Callback(cb) => self.parts.push(Part::Callback(CallbackPart {
                    writer: Rc::clone(&cb.writer),
                    cached_len: Cell::new(cb.cached_len.get()),
                })),
            }
        }
        Ok(())
    }

    /// 把另一个负载的全部片段移动到自身末尾，消费掉 `other`。
    ///
    /// 这是原始实现里“摘下整条链表接到末尾”操作的直接对应：Rust 的移动语义
    /// 让这个操作天然是零拷贝的，不需要手写指针重接逻辑。
    pub fn move_to_payload_end(&mut self, other: Payload) {
        self.parts.extend(other.parts);
    }

    /// 计算负载的总字节长度，必要时对尚未求值的回调片段求值一次并缓存结果。
    pub fn total_len(&self) -> usize {
        self.parts
            .iter()
            .map(|part| match part {
                Part::Bytes(b) => b.len(),
                Part::Callback(cb) => cb.cached_len.get().unwrap_or_else(|| {
                    let mut sink = CountingSink { total: 0 };
                    (cb.writer)(&mut sink);
                    cb.cached_len.set(Some(sink.total));
                    sink.total
                }),
            })
            .sum()
    }

    /// 把全部片段依次写出到给定 sink：字节片段直接转发，回调片段在这里
    /// 被求值（如果之前没有为了求长度而求值过的话）。
    pub fn stream_output(&self, sink: &mut dyn Sink) -> Result<(), FrameCodecError> {
        for part in &self.parts {
            let ok = match part {
                Part::Bytes(b) => sink.write(&b[..]),
                Part::Callback(cb) => (cb.writer)(sink),
            };
            if !ok {
                return Err(FrameCodecError::SinkRejected);
            }
        }
        Ok(())
    }

    /// 把全部片段流式输出并拼接进一段新分配的堆缓冲区，便于没有自定义
    /// sink 的场景（测试、一次性小负载）直接拿到连续字节。
    pub fn stream_to_heap(&self) -> Result<BytesMut, FrameCodecError> {
        let mut buffer = BytesMut::with_capacity(self.total_len());
        let mut sink = HeapSink {
            buffer: &mut buffer,
        };
        self.stream_output(&mut sink)?;
        Ok(buffer)
    }

    /// 结构性相等：逐片段比较。字节片段按内容比较；回调片段按 `Rc` 指针
    /// 身份比较（两个不同的闭包即便碰巧产生相同字节，也不被视为相等，
    /// 因为比较内容需要求值，而求值可能有副作用）。
    pub fn are_equal(&self, other: &Payload) -> bool {
        if self.parts.len() != other.parts.len() {
            return false;
        }
        self.parts.iter().zip(other.parts.iter()).all(|(a, b)| match (a, b) {
            (Part::Bytes(a), Part::Bytes(b)) => a == b,
            (Part::Callback(a), Part::Callback(b)) => Rc::ptr_eq(&a.writer, &b.writer),
            _ => false,
        })
    }
}

impl Clone for Payload {
    fn clone(&self) -> Self {
        let parts = self
            .parts
            .iter()
            .map(|part| match part {
                Part::Bytes(b) => Part::Bytes(b.clone()),
                Part::Callback(cb) => Part::Callback(CallbackPart {
                    writer: Rc::clone(&cb.writer),
                    cached_len: Cell::new(cb.cached_len.get()),
                }),
            })
            .collect();
        Self { parts }
    }
}
