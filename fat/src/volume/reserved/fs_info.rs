use binrw::binrw;

/// # 文件系统信息
///
/// 仅FAT32格式在用，通常位于#1扇区，
/// 保存着空闲簇的信息。本驱动只读取，从不维护，其中的计数仅供参考。
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsInfo {
    /// 头签名 0x41615252
    lead_sig: u32,

    reserved1: [u8; 480],

    /// 额外签名 0x61417272
    struc_sig: u32,

    /// 剩余空闲簇数量
    /// - 0xFFFFFFFF 表示不知道
    free_count: u32,

    /// 下一个空闲簇
    /// - 0xFFFFFFFF 表示不知道
    nxt_free: u32,

    reserved2: [u8; 12],

    /// 尾签名 0xAA550000
    trail_sig: u32,
}

const LEAD_SIG: u32 = 0x4161_5252;
const STRUC_SIG: u32 = 0x6141_7272;
const TRAIL_SIG: u32 = 0xAA55_0000;
const UNKNOWN: u32 = 0xFFFF_FFFF;

impl FsInfo {
    pub fn new(free_count: Option<u32>, next_free: Option<u32>) -> Self {
        Self {
            lead_sig: LEAD_SIG,
            reserved1: [0; 480],
            struc_sig: STRUC_SIG,
            free_count: free_count.unwrap_or(UNKNOWN),
            nxt_free: next_free.unwrap_or(UNKNOWN),
            reserved2: [0; 12],
            trail_sig: TRAIL_SIG,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lead_sig == LEAD_SIG && self.struc_sig == STRUC_SIG && self.trail_sig == TRAIL_SIG
    }

    pub fn free_count(&self) -> Option<u32> {
        (self.free_count != UNKNOWN).then_some(self.free_count)
    }

    pub fn next_free(&self) -> Option<u32> {
        (self.nxt_free != UNKNOWN).then_some(self.nxt_free)
    }
}
