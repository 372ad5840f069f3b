//! 保留区：启动扇区（BPB）、FSINFO扇区与启动扇区备份

mod bpb;
mod fs_info;

pub use self::{
    bpb::{Bpb, BpbParams, SIGNATURE},
    fs_info::FsInfo,
};
