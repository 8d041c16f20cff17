//! WAL record format.
//!
//! Each record is `op(u8) ‖ klen(u32 LE) ‖ [vlen(u32 LE)] ‖ key ‖ [value]`.
//! `vlen` and `value` are present only when `op == OP_SET`; a `DEL` record
//! is exactly `op ‖ klen ‖ key`.

/// Marks a `SET` record.
pub const OP_SET: u8 = 0x01;
/// Marks a `DEL` record.
pub const OP_DEL: u8 = 0x02;

/// A single logical write, as replayed from or appended to the WAL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Set { key: Vec<u8>, value: Vec<u8> },
    Del { key: Vec<u8> },
}

impl Operation {
    /// Encode this operation as a WAL record.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Operation::Set { key, value } => {
                let mut buf = Vec::with_capacity(1 + 4 + 4 + key.len() + value.len());
                buf.push(OP_SET);
                buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
                buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
                buf.extend_from_slice(key);
                buf.extend_from_slice(value);
                buf
            }
            Operation::Del { key } => {
                let mut buf = Vec::with_capacity(1 + 4 + key.len());
                buf.push(OP_DEL);
                buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
                buf.extend_from_slice(key);
                buf
            }
        }
    }

    /// The key this record applies to.
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Set { key, .. } => key,
            Operation::Del { key } => key,
        }
    }
}
