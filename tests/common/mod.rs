// 该文件是 Beifeng （北风） 项目的一部分。
// tests/common/mod.rs - 集成测试用的模拟运行时
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

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use beifeng::builder::{CompileError, EngineCompiler};
use beifeng::common::{ColorOrder, Precision};
use beifeng::detector::preprocess::{LetterboxTransform, PreprocessConfig, letterbox_host};
use beifeng::engine::{
  BindingDesc, DeviceBuffer, DeviceMemory, DevicePreprocessor, Engine, ExecutionContext,
  Runtime, RuntimeError, download_f32, upload_f32,
};
use beifeng::frame::DeviceImage;
use beifeng::logging::{RuntimeLogger, RuntimeSeverity};

/// 运行时内部发生的事情，按发生顺序记录
#[derive(Default)]
pub struct Journal {
  events: Mutex<Vec<String>>,
  live_buffers: AtomicUsize,
  /// 每次执行时输入缓冲区里前 `batch` 张图像的内容
  inputs: Mutex<Vec<Vec<f32>>>,
  pub fail_execution: AtomicBool,
}

impl Journal {
  pub fn push(&self, event: impl Into<String>) {
    self.events.lock().unwrap().push(event.into());
  }

  pub fn events(&self) -> Vec<String> {
    self.events.lock().unwrap().clone()
  }

  pub fn clear(&self) {
    self.events.lock().unwrap().clear();
    self.inputs.lock().unwrap().clear();
  }

  pub fn live_buffers(&self) -> usize {
    self.live_buffers.load(Ordering::SeqCst)
  }

  pub fn executions(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter(|e| e.starts_with("execute"))
      .collect()
  }

  pub fn inputs(&self) -> Vec<Vec<f32>> {
    self.inputs.lock().unwrap().clone()
  }
}

/// 一个假的模型：固定的绑定形状和每张图像固定的输出
#[derive(Clone)]
pub struct FakeModel {
  pub name: &'static str,
  pub input: Vec<i64>,
  pub output: Vec<i64>,
  /// 第 i 张图像的输出 (boxes * attrs 个元素)；不足时用最后一项
  pub outputs: Vec<Vec<f32>>,
  pub fail_context: bool,
}

impl FakeModel {
  pub fn new(name: &'static str, input: Vec<i64>, output: Vec<i64>) -> Self {
    Self {
      name,
      input,
      output,
      outputs: Vec::new(),
      fail_context: false,
    }
  }

  pub fn with_rows(mut self, rows: Vec<Vec<f32>>) -> Self {
    let per_item = (self.output[1] * self.output[2]) as usize;
    let mut flat: Vec<f32> = rows.into_iter().flatten().collect();
    flat.resize(per_item, 0.0);
    self.outputs.push(flat);
    self
  }

  pub fn failing_context(mut self) -> Self {
    self.fail_context = true;
    self
  }
}

pub struct FakeBuffer {
  data: Vec<u8>,
  journal: Arc<Journal>,
}

impl DeviceBuffer for FakeBuffer {
  fn size(&self) -> usize {
    self.data.len()
  }

  fn upload(&mut self, offset: usize, src: &[u8]) -> Result<(), RuntimeError> {
    let end = offset + src.len();
    if end > self.data.len() {
      return Err(RuntimeError::Copy(format!("越界: {} > {}", end, self.data.len())));
    }
    self.data[offset..end].copy_from_slice(src);
    Ok(())
  }

  fn download(&self, offset: usize, dst: &mut [u8]) -> Result<(), RuntimeError> {
    let end = offset + dst.len();
    if end > self.data.len() {
      return Err(RuntimeError::Copy(format!("越界: {} > {}", end, self.data.len())));
    }
    dst.copy_from_slice(&self.data[offset..end]);
    Ok(())
  }
}

impl Drop for FakeBuffer {
  fn drop(&mut self) {
    self.journal.live_buffers.fetch_sub(1, Ordering::SeqCst);
    self.journal.push(format!("free {}", self.data.len()));
  }
}

struct FakeEngine {
  model: FakeModel,
  journal: Arc<Journal>,
}

impl Drop for FakeEngine {
  fn drop(&mut self) {
    self.journal.push(format!("drop engine {}", self.model.name));
  }
}

impl Engine for FakeEngine {
  fn bindings(&self) -> Vec<BindingDesc> {
    vec![
      BindingDesc::input("images", self.model.input.clone()),
      BindingDesc::output("output", self.model.output.clone()),
    ]
  }

  fn create_execution_context(
    self: Arc<Self>,
  ) -> Result<Box<dyn ExecutionContext>, RuntimeError> {
    if self.model.fail_context {
      return Err(RuntimeError::Context(format!("{} 无法创建上下文", self.model.name)));
    }
    self.journal.push(format!("create context {}", self.model.name));
    Ok(Box::new(FakeContext { engine: self }))
  }
}

struct FakeContext {
  engine: Arc<FakeEngine>,
}

impl Drop for FakeContext {
  fn drop(&mut self) {
    self
      .engine
      .journal
      .push(format!("drop context {}", self.engine.model.name));
  }
}

impl ExecutionContext for FakeContext {
  fn execute(&mut self, batch_size: usize, memory: &mut DeviceMemory) -> Result<(), RuntimeError> {
    let journal = &self.engine.journal;
    let model = &self.engine.model;
    journal.push(format!("execute {} x{}", model.name, batch_size));
    if journal.fail_execution.load(Ordering::SeqCst) {
      return Err(RuntimeError::Execution("模拟的执行失败".to_string()));
    }

    let per_input: usize = model.input[1..].iter().product::<i64>() as usize;
    let mut input = vec![0f32; per_input * batch_size];
    download_f32(memory.input(), 0, &mut input)?;
    journal.inputs.lock().unwrap().push(input);

    let per_output = (model.output[1] * model.output[2]) as usize;
    for slot in 0..batch_size {
      let rows = model
        .outputs
        .get(slot)
        .or_else(|| model.outputs.last())
        .cloned()
        .unwrap_or_else(|| vec![0.0; per_output]);
      upload_f32(memory.output_mut(), slot * per_output, &rows)?;
    }
    Ok(())
  }
}

pub struct FakeDevicePreprocessor;

impl DevicePreprocessor for FakeDevicePreprocessor {
  fn letterbox(
    &self,
    image: &DeviceImage,
    order: ColorOrder,
    config: &PreprocessConfig,
    transform: &LetterboxTransform,
    dst: &mut dyn DeviceBuffer,
    dst_offset: usize,
  ) -> Result<(), RuntimeError> {
    let host = image
      .download()
      .map_err(|e| RuntimeError::Copy(e.to_string()))?;
    let mut out = vec![0f32; config.elements()];
    letterbox_host(&host, order, config, transform, &mut out)
      .map_err(|e| RuntimeError::Execution(e.to_string()))?;
    upload_f32(dst, dst_offset, &out)
  }
}

/// 按引擎字节查表的运行时
pub struct FakeRuntime {
  models: HashMap<Vec<u8>, FakeModel>,
  device: Option<FakeDevicePreprocessor>,
  pub journal: Arc<Journal>,
}

impl FakeRuntime {
  pub fn new() -> Self {
    Self {
      models: HashMap::new(),
      device: None,
      journal: Arc::new(Journal::default()),
    }
  }

  pub fn with_model(mut self, model: FakeModel) -> Self {
    self.models.insert(model.name.as_bytes().to_vec(), model);
    self
  }

  pub fn with_device_preprocessor(mut self) -> Self {
    self.device = Some(FakeDevicePreprocessor);
    self
  }
}

impl Runtime for FakeRuntime {
  fn deserialize_engine(
    &self,
    data: &[u8],
    log: &RuntimeLogger,
  ) -> Result<Arc<dyn Engine>, RuntimeError> {
    let model = self
      .models
      .get(data)
      .cloned()
      .ok_or_else(|| RuntimeError::Deserialize("未知引擎".to_string()))?;
    log.log(RuntimeSeverity::Verbose, &format!("deserialize {}", model.name));
    self.journal.push(format!("deserialize {}", model.name));
    Ok(Arc::new(FakeEngine {
      model,
      journal: self.journal.clone(),
    }))
  }

  fn allocate(&self, bytes: usize) -> Result<Box<dyn DeviceBuffer>, RuntimeError> {
    self.journal.live_buffers.fetch_add(1, Ordering::SeqCst);
    self.journal.push(format!("alloc {}", bytes));
    Ok(Box::new(FakeBuffer {
      data: vec![0u8; bytes],
      journal: self.journal.clone(),
    }))
  }

  fn device_preprocessor(&self) -> Option<&dyn DevicePreprocessor> {
    self
      .device
      .as_ref()
      .map(|d| d as &dyn DevicePreprocessor)
  }
}

/// 一行输出: cx, cy, w, h, objectness, 各类别分数
pub fn row(cx: f32, cy: f32, w: f32, h: f32, obj: f32, classes: &[f32]) -> Vec<f32> {
  let mut row = vec![cx, cy, w, h, obj];
  row.extend_from_slice(classes);
  row
}

/// 32x32 输入、单批次、两类
pub fn single_model() -> FakeModel {
  FakeModel::new("single", vec![1, 3, 32, 32], vec![1, 4, 7]).with_rows(vec![
    row(16.0, 16.0, 8.0, 8.0, 0.9, &[1.0, 0.0]),
    row(16.0, 17.0, 8.0, 8.0, 0.8, &[1.0, 0.0]),
    row(8.0, 8.0, 4.0, 4.0, 0.5, &[0.0, 0.6]),
  ])
}

/// 宽 48 高 64 的输入、批次 2、三类；两张图像的输出不同
pub fn batch_model() -> FakeModel {
  FakeModel::new("batch", vec![2, 3, 64, 48], vec![2, 3, 8])
    .with_rows(vec![row(24.0, 32.0, 10.0, 10.0, 0.9, &[0.0, 1.0, 0.0])])
    .with_rows(vec![row(10.0, 10.0, 6.0, 6.0, 0.7, &[0.0, 0.0, 1.0])])
}

/// 输出属性只有 5 个，不是合法的检测头
pub fn headless_model() -> FakeModel {
  FakeModel::new("headless", vec![1, 3, 32, 32], vec![1, 4, 5])
}

pub fn broken_context_model() -> FakeModel {
  single_model_named("broken").failing_context()
}

fn single_model_named(name: &'static str) -> FakeModel {
  let mut model = single_model();
  model.name = name;
  model
}

/// 把模型文件内容原样当作引擎，文件内容以 `parse-error`/`build-error`/`panic` 开头时模拟失败
pub struct FakeCompiler {
  pub fast_fp16: bool,
}

impl EngineCompiler for FakeCompiler {
  fn platform_has_fast_fp16(&self) -> bool {
    self.fast_fp16
  }

  fn compile(
    &self,
    model_path: &Path,
    precision: Precision,
    log: &RuntimeLogger,
  ) -> Result<Vec<u8>, CompileError> {
    let data = std::fs::read(model_path).map_err(|e| CompileError::Parse(e.to_string()))?;
    log.log(
      RuntimeSeverity::Info,
      &format!("compile {} at {}", model_path.display(), precision),
    );
    if data.starts_with(b"parse-error") {
      return Err(CompileError::Parse("无法解析的节点".to_string()));
    }
    if data.starts_with(b"build-error") {
      return Err(CompileError::Build("没有可用的算子实现".to_string()));
    }
    if data.starts_with(b"panic") {
      panic!("编译器崩溃");
    }
    if data.starts_with(b"empty") {
      return Ok(Vec::new());
    }
    let mut engine = b"engine:".to_vec();
    engine.extend_from_slice(&data);
    Ok(engine)
  }
}
