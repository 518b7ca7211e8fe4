/// Easy SDS - Controller
///
/// 管理 Dock 连接，并把存储卷、快照、挂载操作调度到目标 Dock

pub mod app_state;
pub mod config;
pub mod controller;
pub mod ws;
