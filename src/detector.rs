// 该文件是 Beifeng （北风） 项目的一部分。
// src/detector.rs - YOLOv5 目标检测器
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

use std::path::Path;
use std::sync::Arc;

use crate::classes::Classes;
use crate::common::{ColorOrder, DetectorFlags};
use crate::detection::Detection;
use crate::engine::{LoadedEngine, Runtime, download_f32};
use crate::error::{Error, Result, guard};
use crate::frame::{DeviceImage, HostImage, InputImage};
use crate::logging::{LogLevel, Logger, default_logger};

pub mod decode;
pub mod preprocess;

use self::preprocess::{PreprocessConfig, preprocess_into};

pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.4;
pub const DEFAULT_NMS_THRESHOLD: f64 = 0.45;

/// YOLOv5 检测器。
///
/// 生命周期: 新建 -> [`init`](Detector::init) -> [`load_engine`](Detector::load_engine)，
/// 之后可以反复调用 [`detect`](Detector::detect) 与 [`detect_batch`](Detector::detect_batch)。
/// 重新加载引擎会先释放旧引擎的全部资源。
pub struct Detector {
  runtime: Arc<dyn Runtime>,
  logger: Arc<dyn Logger>,
  initialized: bool,
  flags: DetectorFlags,
  classes: Classes,
  score_threshold: f64,
  nms_threshold: f64,
  preprocess: PreprocessConfig,
  engine: Option<LoadedEngine>,
  input_staging: Vec<f32>,
  output_host: Vec<f32>,
}

impl Detector {
  pub fn new(runtime: Arc<dyn Runtime>) -> Self {
    let logger = default_logger();
    let mut classes = Classes::default();
    classes.set_logger(Some(logger.clone()));
    Self {
      runtime,
      logger,
      initialized: false,
      flags: DetectorFlags::default(),
      classes,
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      preprocess: PreprocessConfig::default(),
      engine: None,
      input_staging: Vec::new(),
      output_host: Vec::new(),
    }
  }

  pub fn init(&mut self, flags: DetectorFlags) -> Result<()> {
    self.flags = flags;
    self.initialized = true;
    self.logger.logf(
      LogLevel::Debug,
      format_args!(
        "检测器初始化: 输入通道顺序 {:?}, 预处理 {:?}",
        flags.input_order, flags.preprocessor
      ),
    );
    Ok(())
  }

  pub fn is_initialized(&self) -> bool {
    self.initialized
  }

  pub fn flags(&self) -> DetectorFlags {
    self.flags
  }

  pub fn set_input_order(&mut self, order: ColorOrder) {
    self.flags.input_order = order;
  }

  /// 读取序列化引擎文件并加载
  pub fn load_engine(&mut self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let logger = self.logger.clone();
    guard(logger.as_ref(), "load_engine", || {
      self.ensure_initialized()?;
      logger.logf(LogLevel::Info, format_args!("加载引擎文件: {}", path.display()));
      let data = std::fs::read(path).map_err(|e| Error::filesystem(path, e))?;
      logger.logf(
        LogLevel::Debug,
        format_args!(
          "引擎文件大小: {:.2} MB",
          data.len() as f64 / (1024.0 * 1024.0)
        ),
      );
      self.load_engine_inner(&data)
    })
  }

  /// 从内存中的序列化引擎加载
  pub fn load_engine_bytes(&mut self, data: &[u8]) -> Result<()> {
    let logger = self.logger.clone();
    guard(logger.as_ref(), "load_engine_bytes", || {
      self.ensure_initialized()?;
      self.load_engine_inner(data)
    })
  }

  fn load_engine_inner(&mut self, data: &[u8]) -> Result<()> {
    if let Some(mut old) = self.engine.take() {
      self.logger.info("释放之前加载的引擎");
      old.release();
    }

    let engine = LoadedEngine::load(self.runtime.as_ref(), data, &self.logger)?;
    let dims = engine.input().dims();
    self.preprocess.input_height = dims[2] as u32;
    self.preprocess.input_width = dims[3] as u32;
    self.input_staging = vec![0.0; engine.input().elements_per_item()];
    self.output_host = vec![0.0; engine.output().element_count()];

    let num_classes = crate::engine::num_classes(engine.output());
    if num_classes != self.classes.len() {
      self.logger.logf(
        LogLevel::Warning,
        format_args!(
          "引擎输出 {} 个类别, 类别名称表有 {} 项",
          num_classes,
          self.classes.len()
        ),
      );
    }

    self.engine = Some(engine);
    Ok(())
  }

  /// 释放当前引擎，检测器回到已初始化状态
  pub fn unload_engine(&mut self) {
    if let Some(mut engine) = self.engine.take() {
      engine.release();
    }
  }

  pub fn is_engine_loaded(&self) -> bool {
    self.engine.as_ref().is_some_and(LoadedEngine::is_live)
  }

  /// 引擎一次可处理的最大图像数，未加载时为 0
  pub fn batch_size(&self) -> usize {
    self.engine.as_ref().map_or(0, LoadedEngine::max_batch)
  }

  /// 网络输入尺寸 (宽, 高)
  pub fn inference_size(&self) -> Option<(u32, u32)> {
    self
      .engine
      .as_ref()
      .map(|_| (self.preprocess.input_width, self.preprocess.input_height))
  }

  pub fn num_classes(&self) -> usize {
    self
      .engine
      .as_ref()
      .map_or(0, |e| crate::engine::num_classes(e.output()))
  }

  pub fn classes(&self) -> &Classes {
    &self.classes
  }

  pub fn set_classes(&mut self, mut classes: Classes) {
    classes.set_logger(Some(self.logger.clone()));
    self.classes = classes;
  }

  pub fn score_threshold(&self) -> f64 {
    self.score_threshold
  }

  pub fn set_score_threshold(&mut self, value: f64) -> Result<()> {
    self.score_threshold = self.check_threshold("set_score_threshold", value)?;
    Ok(())
  }

  pub fn nms_threshold(&self) -> f64 {
    self.nms_threshold
  }

  pub fn set_nms_threshold(&mut self, value: f64) -> Result<()> {
    self.nms_threshold = self.check_threshold("set_nms_threshold", value)?;
    Ok(())
  }

  /// 设置归一化参数，`mean` 按 RGB 顺序
  pub fn set_normalization(&mut self, mean: [f32; 3], scale: f32) -> Result<()> {
    if !scale.is_finite() || scale == 0.0 || mean.iter().any(|m| !m.is_finite()) {
      return Err(Error::InvalidInput(format!(
        "非法的归一化参数: mean {:?}, scale {}",
        mean, scale
      )));
    }
    self.preprocess.mean = mean;
    self.preprocess.scale = scale;
    Ok(())
  }

  pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
    self.classes.set_logger(Some(logger.clone()));
    self.logger = logger;
  }

  pub fn logger(&self) -> Arc<dyn Logger> {
    self.logger.clone()
  }

  /// 将主机图像拷贝到运行时的设备内存中
  pub fn upload_image(&self, image: &HostImage) -> Result<DeviceImage> {
    DeviceImage::upload(self.runtime.as_ref(), image)
  }

  pub fn detect<'a>(&mut self, image: impl Into<InputImage<'a>>) -> Result<Vec<Detection>> {
    let image = image.into();
    let logger = self.logger.clone();
    guard(logger.as_ref(), "detect", || {
      let mut results = self.detect_batch_inner(&[image])?;
      results
        .pop()
        .ok_or_else(|| Error::Other("推理未返回结果".to_string()))
    })
  }

  /// 一次推理处理整批图像，结果顺序与输入一致
  pub fn detect_batch(&mut self, images: &[InputImage<'_>]) -> Result<Vec<Vec<Detection>>> {
    let logger = self.logger.clone();
    guard(logger.as_ref(), "detect_batch", || {
      self.detect_batch_inner(images)
    })
  }

  fn detect_batch_inner(&mut self, images: &[InputImage<'_>]) -> Result<Vec<Vec<Detection>>> {
    self.ensure_initialized()?;
    let engine = self.engine.as_mut().ok_or(Error::NotLoaded)?;

    if images.is_empty() {
      return Err(Error::InvalidInput("图像列表为空".to_string()));
    }
    let max_batch = engine.max_batch();
    if images.len() > max_batch {
      return Err(Error::InvalidInput(format!(
        "图像数量 {} 超过引擎最大批次 {}",
        images.len(),
        max_batch
      )));
    }

    let mut transforms = Vec::with_capacity(images.len());
    for (slot, image) in images.iter().enumerate() {
      let memory = engine.memory_mut()?;
      let transform = preprocess_into(
        *image,
        &self.flags,
        &self.preprocess,
        self.runtime.as_ref(),
        &mut self.input_staging,
        memory.input_mut(),
        slot,
      )?;
      transforms.push(transform);
    }

    engine.execute(images.len())?;

    let per_item = engine.output().elements_per_item();
    let attrs = engine.output().dims()[2];
    let used = &mut self.output_host[..images.len() * per_item];
    download_f32(engine.memory()?.output(), 0, used)?;

    let results = transforms
      .iter()
      .zip(used.chunks_exact(per_item))
      .map(|(transform, output)| {
        decode::decode(
          output,
          attrs,
          transform,
          self.score_threshold,
          self.nms_threshold,
          &self.classes,
        )
      })
      .collect();
    Ok(results)
  }

  fn ensure_initialized(&self) -> Result<()> {
    if self.initialized {
      Ok(())
    } else {
      Err(Error::NotInitialized("检测器"))
    }
  }

  fn check_threshold(&self, op: &str, value: f64) -> Result<f64> {
    if value.is_nan() || !(0.0..=1.0).contains(&value) {
      self.logger.logf(
        LogLevel::Error,
        format_args!("{}() 失败: 阈值 {} 不在 [0, 1] 内", op, value),
      );
      return Err(Error::InvalidInput(format!("阈值 {} 不在 [0, 1] 内", value)));
    }
    Ok(value)
  }
}

// 引擎资源要先于运行时释放
impl Drop for Detector {
  fn drop(&mut self) {
    self.unload_engine();
  }
}

impl std::fmt::Debug for Detector {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Detector")
      .field("initialized", &self.initialized)
      .field("engine_loaded", &self.is_engine_loaded())
      .field("flags", &self.flags)
      .field("score_threshold", &self.score_threshold)
      .field("nms_threshold", &self.nms_threshold)
      .finish_non_exhaustive()
  }
}
