// 该文件是 Beifeng （北风） 项目的一部分。
// src/engine/bundle.rs - 已加载引擎的资源集合
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

use std::sync::Arc;

use super::{
  DeviceMemory, Engine, EngineBinding, ExecutionContext, Runtime, validate_bindings,
};
use crate::error::{Error, Result};
use crate::logging::{LogLevel, Logger, RuntimeLogger};

/// 引擎、设备内存和执行上下文要么一起存在，要么一起不存在。
///
/// 释放顺序固定为：执行上下文 -> 设备内存 -> 引擎。
pub struct LoadedEngine {
  context: Option<Box<dyn ExecutionContext>>,
  memory: Option<DeviceMemory>,
  engine: Option<Arc<dyn Engine>>,
  input: EngineBinding,
  output: EngineBinding,
}

impl LoadedEngine {
  /// 反序列化并校验引擎，分配设备内存，创建执行上下文。
  /// 任何一步失败时，之前已获得的资源都会按顺序释放。
  pub fn load(runtime: &dyn Runtime, data: &[u8], logger: &Arc<dyn Logger>) -> Result<Self> {
    if data.is_empty() {
      return Err(Error::Model("引擎数据为空".to_string()));
    }

    let runtime_log = RuntimeLogger::new(logger.clone());
    let engine = runtime.deserialize_engine(data, &runtime_log)?;

    let descs = engine.bindings();
    for (idx, desc) in descs.iter().enumerate() {
      logger.logf(
        LogLevel::Debug,
        format_args!(
          "绑定 #{}: {} ({}) {:?}",
          idx,
          desc.name,
          if desc.is_input { "输入" } else { "输出" },
          desc.dims
        ),
      );
    }
    let (input, output) = validate_bindings(&descs)?;

    let memory = DeviceMemory::allocate(runtime, &input, &output)?;
    let context = match engine.clone().create_execution_context() {
      Ok(context) => context,
      Err(err) => {
        drop(memory);
        drop(engine);
        return Err(err.into());
      }
    };

    logger.logf(
      LogLevel::Info,
      format_args!(
        "引擎加载完成: 输入 {:?}, 输出 {:?}",
        input.dims(),
        output.dims()
      ),
    );

    Ok(Self {
      context: Some(context),
      memory: Some(memory),
      engine: Some(engine),
      input,
      output,
    })
  }

  /// 可重复调用
  pub fn release(&mut self) {
    drop(self.context.take());
    drop(self.memory.take());
    drop(self.engine.take());
  }

  pub fn is_live(&self) -> bool {
    self.context.is_some() && self.memory.is_some() && self.engine.is_some()
  }

  pub fn input(&self) -> &EngineBinding {
    &self.input
  }

  pub fn output(&self) -> &EngineBinding {
    &self.output
  }

  pub fn max_batch(&self) -> usize {
    self.input.batch()
  }

  pub fn memory(&self) -> Result<&DeviceMemory> {
    self.memory.as_ref().ok_or(Error::NotLoaded)
  }

  pub fn memory_mut(&mut self) -> Result<&mut DeviceMemory> {
    self.memory.as_mut().ok_or(Error::NotLoaded)
  }

  /// 对已经写入输入缓冲区的前 `batch_size` 张图像执行推理
  pub fn execute(&mut self, batch_size: usize) -> Result<()> {
    if batch_size == 0 || batch_size > self.max_batch() {
      return Err(Error::InvalidInput(format!(
        "批次大小 {} 不在 [1, {}] 内",
        batch_size,
        self.max_batch()
      )));
    }
    match (self.context.as_mut(), self.memory.as_mut()) {
      (Some(context), Some(memory)) => Ok(context.execute(batch_size, memory)?),
      _ => Err(Error::NotLoaded),
    }
  }
}

impl Drop for LoadedEngine {
  fn drop(&mut self) {
    self.release();
  }
}
