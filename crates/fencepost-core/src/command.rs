//! Commands recorded into a batch and executed by the device.

use crate::id::BufferId;

/// A single unit of GPU work recorded into a command batch.
///
/// All offsets and sizes are in bytes. The device executes a batch's
/// commands in recording order once the batch is submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchCommand {
    /// Copy `size` bytes from `src` to `dst`.
    CopyBuffer {
        /// Source buffer.
        src: BufferId,
        /// Byte offset into the source buffer.
        src_offset: u64,
        /// Destination buffer.
        dst: BufferId,
        /// Byte offset into the destination buffer.
        dst_offset: u64,
        /// Number of bytes to copy.
        size: u64,
    },
    /// Upload host data into `dst` at `offset`.
    WriteBuffer {
        /// Destination buffer.
        dst: BufferId,
        /// Byte offset into the destination buffer.
        offset: u64,
        /// Bytes to write.
        data: Vec<u8>,
    },
}

impl BatchCommand {
    /// The buffer this command writes to.
    pub fn target(&self) -> BufferId {
        match self {
            Self::CopyBuffer { dst, .. } | Self::WriteBuffer { dst, .. } => *dst,
        }
    }

    /// Number of bytes this command writes.
    pub fn bytes_written(&self) -> u64 {
        match self {
            Self::CopyBuffer { size, .. } => *size,
            Self::WriteBuffer { data, .. } => data.len() as u64,
        }
    }
}
