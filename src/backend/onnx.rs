// 该文件是 Beifeng （北风） 项目的一部分。
// src/backend/onnx.rs - ONNX Runtime 后端
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

//! CPU 上的 ONNX Runtime。序列化引擎就是校验过的 ONNX 字节，
//! 设备内存是主机内存，没有设备端预处理。

use std::path::Path;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::{Tensor, ValueType};

use crate::builder::{CompileError, EngineCompiler};
use crate::common::Precision;
use crate::engine::{
  BindingDesc, DeviceBuffer, DeviceMemory, Engine, ExecutionContext, HostBuffer, Runtime,
  RuntimeError, download_f32, upload_f32,
};
use crate::logging::{RuntimeLogger, RuntimeSeverity};

const DEFAULT_MAX_BATCH: i64 = 1;

fn open_session(data: &[u8]) -> Result<Session, String> {
  Session::builder()
    .map_err(|e| format!("无法创建会话构建器: {e}"))?
    .with_optimization_level(GraphOptimizationLevel::Level3)
    .map_err(|e| format!("无法设置图优化级别: {e}"))?
    .commit_from_memory(data)
    .map_err(|e| format!("{e}"))
}

fn tensor_dims(value_type: &ValueType) -> Option<Vec<i64>> {
  match value_type {
    ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
    _ => None,
  }
}

/// 动态批次维（负值）替换为 `max_batch`，其余维度保持原样交给绑定校验
fn resolve_dims(mut dims: Vec<i64>, max_batch: i64) -> Vec<i64> {
  if let Some(batch) = dims.first_mut()
    && *batch < 0
  {
    *batch = max_batch;
  }
  dims
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OrtCompiler;

impl EngineCompiler for OrtCompiler {
  fn platform_has_fast_fp16(&self) -> bool {
    false
  }

  fn compile(
    &self,
    model_path: &Path,
    precision: Precision,
    log: &RuntimeLogger,
  ) -> Result<Vec<u8>, CompileError> {
    let data = std::fs::read(model_path).map_err(|e| {
      CompileError::Parse(format!("无法读取模型 {}: {}", model_path.display(), e))
    })?;
    log.log(
      RuntimeSeverity::Verbose,
      &format!("解析 {} ({} 字节), 精度 {}", model_path.display(), data.len(), precision),
    );

    let session = open_session(&data).map_err(CompileError::Parse)?;
    if session.inputs.is_empty() || session.outputs.is_empty() {
      return Err(CompileError::Build("模型没有输入或输出".to_string()));
    }
    log.log(
      RuntimeSeverity::Info,
      &format!(
        "模型校验通过: {} 个输入, {} 个输出",
        session.inputs.len(),
        session.outputs.len()
      ),
    );

    Ok(data)
  }
}

pub struct OrtRuntime {
  max_batch: i64,
}

impl Default for OrtRuntime {
  fn default() -> Self {
    Self {
      max_batch: DEFAULT_MAX_BATCH,
    }
  }
}

impl OrtRuntime {
  pub fn new() -> Self {
    Self::default()
  }

  /// 模型批次维是动态的时候，按这个批次分配内存
  pub fn with_max_batch(mut self, max_batch: usize) -> Self {
    self.max_batch = max_batch.max(1) as i64;
    self
  }
}

impl Runtime for OrtRuntime {
  fn deserialize_engine(
    &self,
    data: &[u8],
    log: &RuntimeLogger,
  ) -> Result<Arc<dyn Engine>, RuntimeError> {
    let session = open_session(data).map_err(RuntimeError::Deserialize)?;

    let mut bindings = Vec::with_capacity(session.inputs.len() + session.outputs.len());
    for input in &session.inputs {
      let dims = tensor_dims(&input.input_type).ok_or_else(|| {
        RuntimeError::Unsupported(format!("输入 '{}' 不是张量", input.name))
      })?;
      bindings.push(BindingDesc::input(&input.name, resolve_dims(dims, self.max_batch)));
    }
    for output in &session.outputs {
      let dims = tensor_dims(&output.output_type).ok_or_else(|| {
        RuntimeError::Unsupported(format!("输出 '{}' 不是张量", output.name))
      })?;
      bindings.push(BindingDesc::output(&output.name, resolve_dims(dims, self.max_batch)));
    }
    log.log(
      RuntimeSeverity::Info,
      &format!("反序列化完成, {} 个绑定", bindings.len()),
    );

    Ok(Arc::new(OrtEngine {
      session: Mutex::new(session),
      bindings,
    }))
  }

  fn allocate(&self, bytes: usize) -> Result<Box<dyn DeviceBuffer>, RuntimeError> {
    Ok(Box::new(HostBuffer::new(bytes)))
  }
}

struct OrtEngine {
  session: Mutex<Session>,
  bindings: Vec<BindingDesc>,
}

impl OrtEngine {
  fn binding(&self, is_input: bool) -> Result<&BindingDesc, RuntimeError> {
    self
      .bindings
      .iter()
      .find(|b| b.is_input == is_input)
      .ok_or_else(|| RuntimeError::Execution("引擎缺少绑定".to_string()))
  }
}

impl Engine for OrtEngine {
  fn bindings(&self) -> Vec<BindingDesc> {
    self.bindings.clone()
  }

  fn create_execution_context(
    self: Arc<Self>,
  ) -> Result<Box<dyn ExecutionContext>, RuntimeError> {
    Ok(Box::new(OrtContext { engine: self }))
  }
}

struct OrtContext {
  engine: Arc<OrtEngine>,
}

impl ExecutionContext for OrtContext {
  fn execute(&mut self, batch_size: usize, memory: &mut DeviceMemory) -> Result<(), RuntimeError> {
    let input = self.engine.binding(true)?;
    let output = self.engine.binding(false)?;
    let shape = match input.dims.as_slice() {
      [_, c, h, w] => [batch_size, *c as usize, *h as usize, *w as usize],
      dims => {
        return Err(RuntimeError::Execution(format!(
          "输入形状不是 NCHW: {:?}",
          dims
        )));
      }
    };

    let mut data = vec![0f32; shape.iter().product()];
    download_f32(memory.input(), 0, &mut data)?;
    let tensor = Tensor::from_array((shape, data.into_boxed_slice()))
      .map_err(|e| RuntimeError::Execution(format!("无法创建输入张量: {e}")))?;

    let mut session = self
      .engine
      .session
      .lock()
      .map_err(|_| RuntimeError::Execution("会话锁已失效".to_string()))?;
    let outputs = session
      .run(ort::inputs![input.name.as_str() => tensor])
      .map_err(|e| RuntimeError::Execution(format!("{e}")))?;
    let (_shape, result) = outputs[output.name.as_str()]
      .try_extract_tensor::<f32>()
      .map_err(|e| RuntimeError::Copy(format!("无法读取输出张量: {e}")))?;
    upload_f32(memory.output_mut(), 0, result)
  }
}
