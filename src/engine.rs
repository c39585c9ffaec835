// 该文件是 Beifeng （北风） 项目的一部分。
// src/engine.rs - 推理运行时接口
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

//! 推理运行时被视为黑盒：反序列化引擎、分配设备内存、在绑定的缓冲区上执行前向计算。
//! 具体后端（见 `backend`）只需要实现这里的几个 trait。

use std::sync::Arc;

use thiserror::Error;

use crate::common::ColorOrder;
use crate::detector::preprocess::{LetterboxTransform, PreprocessConfig};
use crate::frame::DeviceImage;
use crate::logging::RuntimeLogger;

mod binding;
mod bundle;
mod memory;

pub(crate) use self::binding::num_classes;
pub use self::binding::{EngineBinding, validate_bindings};
pub use self::bundle::LoadedEngine;
pub use self::memory::{DeviceBuffer, DeviceMemory, HostBuffer, download_f32, upload_f32};

#[derive(Error, Debug)]
pub enum RuntimeError {
  #[error("引擎反序列化失败: {0}")]
  Deserialize(String),
  #[error("设备内存分配失败 ({bytes} 字节): {reason}")]
  Allocation { bytes: usize, reason: String },
  #[error("设备内存拷贝失败: {0}")]
  Copy(String),
  #[error("无法创建执行上下文: {0}")]
  Context(String),
  #[error("推理执行失败: {0}")]
  Execution(String),
  #[error("运行时不支持: {0}")]
  Unsupported(String),
}

/// 引擎声明的一个输入或输出张量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDesc {
  pub name: String,
  pub dims: Vec<i64>,
  pub is_input: bool,
}

impl BindingDesc {
  pub fn input(name: impl Into<String>, dims: Vec<i64>) -> Self {
    Self {
      name: name.into(),
      dims,
      is_input: true,
    }
  }

  pub fn output(name: impl Into<String>, dims: Vec<i64>) -> Self {
    Self {
      name: name.into(),
      dims,
      is_input: false,
    }
  }
}

pub trait Runtime: Send + Sync {
  fn deserialize_engine(
    &self,
    data: &[u8],
    log: &RuntimeLogger,
  ) -> Result<Arc<dyn Engine>, RuntimeError>;

  fn allocate(&self, bytes: usize) -> Result<Box<dyn DeviceBuffer>, RuntimeError>;

  /// 运行时若能直接处理设备内存中的图像则返回预处理器
  fn device_preprocessor(&self) -> Option<&dyn DevicePreprocessor> {
    None
  }
}

pub trait Engine: Send + Sync {
  fn bindings(&self) -> Vec<BindingDesc>;

  /// 执行上下文持有引擎的引用，必须先于引擎销毁
  fn create_execution_context(
    self: Arc<Self>,
  ) -> Result<Box<dyn ExecutionContext>, RuntimeError>;
}

pub trait ExecutionContext: Send {
  /// 同步执行：返回时输出缓冲区已经写满
  fn execute(&mut self, batch_size: usize, memory: &mut DeviceMemory) -> Result<(), RuntimeError>;
}

pub trait DevicePreprocessor: Send + Sync {
  fn letterbox(
    &self,
    image: &DeviceImage,
    order: ColorOrder,
    config: &PreprocessConfig,
    transform: &LetterboxTransform,
    dst: &mut dyn DeviceBuffer,
    dst_offset: usize,
  ) -> Result<(), RuntimeError>;
}
