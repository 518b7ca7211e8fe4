/// 工具函数集合

pub mod capacity;
