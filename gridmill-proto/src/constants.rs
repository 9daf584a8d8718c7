//! Wire-level constants shared by every gridmill node.

/// Size of the fixed frame header in bytes:
/// `msg_id[16] | frag_index | meta2 | meta3 | kind | flags`.
pub const HEADER_SIZE: usize = 21;

/// Maximum payload bytes carried by a single frame.
pub const PAYLOAD_MAX: usize = 4096;

/// Maximum on-wire size of one datagram.
pub const FRAME_MAX: usize = HEADER_SIZE + PAYLOAD_MAX;

/// Maximum number of fragments per logical message. The fragment index is a
/// single byte, so a logical payload caps out at 256 * PAYLOAD_MAX = 1 MiB.
pub const MAX_FRAGMENTS: usize = 256;

/// Value of the reserved header bytes.
pub const META_RESERVED: u8 = 0xFF;

/// Flag bit marking the final fragment of a logical message.
pub const FLAG_LAST_FRAGMENT: u8 = 0x01;

/// UDP port masters and workers bind by default. Submitters bind an
/// ephemeral port instead.
pub const DEFAULT_PORT: u16 = 33310;

/// Incomplete reassembly entries idle for this long are dropped.
pub const REASSEMBLY_TIMEOUT_SECS: u64 = 30;

/// Number of completed message ids remembered for duplicate suppression.
pub const RECENT_COMPLETIONS: usize = 1024;
