// Size units
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;
pub const GB: usize = 1024 * MB;

// Size limits
pub const MAX_KEY_SIZE: usize = 100 * KB;
pub const MAX_VALUE_SIZE: usize = 64 * MB;
pub const MAX_NAMESPACE_LEN: usize = 63;

// Namespaces
pub const DEFAULT_NAMESPACE: &str = "arenakv-default";

// Arena layout
pub const DEFAULT_ARENA_CAPACITY: usize = 64 * MB;
pub const MIN_ARENA_CAPACITY: usize = 64 * KB;
pub const ARENA_MAGIC: u64 = 0x4152_454E_414B_5631; // "ARENAKV1"
pub const ARENA_ALIGNMENT: usize = 16;
pub const ARENA_HEADER_ALIGN: usize = 64;
pub const BLOCK_HEADER_SIZE: usize = 16;
pub const MIN_BLOCK_SHIFT: u32 = 5; // 32-byte smallest block
pub const SIZE_CLASSES: usize = 48;
pub const BLOCK_LIVE: u32 = 0xA110_C8ED;
pub const BLOCK_FREE: u32 = 0xF8EE_B10C;

// Index configuration
pub const INDEX_MAGIC: u32 = 0x1DE7_4B1E;
pub const PARTITION_BITS: u32 = 7;
pub const NUM_PARTITIONS: usize = 1 << PARTITION_BITS; // 128 lock partitions
pub const DEFAULT_BUCKETS_LOG2: u32 = PARTITION_BITS;
pub const MAX_BUCKETS_LOG2: u32 = 28;
pub const DEFAULT_MAX_LOAD_PERCENT: u32 = 75;

// Expiry
pub const NO_EXPIRY: u64 = 0;
pub const NANOS_PER_SEC: u64 = 1_000_000_000;
// Entries a sweeper batch may walk per sampled key before giving up
pub const SWEEP_VISIT_FACTOR: usize = 20;
