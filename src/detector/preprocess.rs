// 该文件是 Beifeng （北风） 项目的一部分。
// src/detector/preprocess.rs - 图像预处理
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

use image::{ImageBuffer, Rgb, imageops};
use tracing::debug;

use crate::common::{ColorOrder, DetectorFlags, PreprocessorKind};
use crate::engine::{DeviceBuffer, Runtime, upload_f32};
use crate::error::{Error, Result};
use crate::frame::{COLOR_CHANNELS, DeviceImage, HostImage, InputImage};

pub const DEFAULT_PAD_VALUE: u8 = 114;
pub const DEFAULT_MEAN: [f32; 3] = [0.0, 0.0, 0.0];
pub const DEFAULT_SCALE: f32 = 1.0 / 255.0;

/// 网络输入尺寸与归一化参数；`mean` 按 RGB 顺序
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessConfig {
  pub input_width: u32,
  pub input_height: u32,
  pub mean: [f32; 3],
  pub scale: f32,
  pub pad_value: u8,
}

impl PreprocessConfig {
  pub fn for_input(input_width: u32, input_height: u32) -> Self {
    Self {
      input_width,
      input_height,
      ..Self::default()
    }
  }

  pub fn normalize(&self, value: u8, channel: usize) -> f32 {
    (value as f32 - self.mean[channel]) * self.scale
  }

  pub fn plane_size(&self) -> usize {
    self.input_width as usize * self.input_height as usize
  }

  pub fn elements(&self) -> usize {
    self.plane_size() * COLOR_CHANNELS
  }
}

impl Default for PreprocessConfig {
  fn default() -> Self {
    Self {
      input_width: 640,
      input_height: 640,
      mean: DEFAULT_MEAN,
      scale: DEFAULT_SCALE,
      pad_value: DEFAULT_PAD_VALUE,
    }
  }
}

/// 等比缩放加居中填充。记录下的参数足以把网络坐标映射回原图。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
  pub src_width: u32,
  pub src_height: u32,
  pub resized_width: u32,
  pub resized_height: u32,
  pub pad_x: u32,
  pub pad_y: u32,
  pub scale_x: f32,
  pub scale_y: f32,
}

impl LetterboxTransform {
  pub fn compute(src_width: u32, src_height: u32, dst_width: u32, dst_height: u32) -> Self {
    let scale = (dst_width as f32 / src_width as f32).min(dst_height as f32 / src_height as f32);
    let resized_width = ((src_width as f32 * scale).round() as u32).clamp(1, dst_width.max(1));
    let resized_height = ((src_height as f32 * scale).round() as u32).clamp(1, dst_height.max(1));
    Self {
      src_width,
      src_height,
      resized_width,
      resized_height,
      pad_x: (dst_width - resized_width) / 2,
      pad_y: (dst_height - resized_height) / 2,
      scale_x: resized_width as f32 / src_width as f32,
      scale_y: resized_height as f32 / src_height as f32,
    }
  }

  /// 原图坐标 -> 网络坐标
  pub fn to_model(&self, x: f32, y: f32) -> (f32, f32) {
    (
      x * self.scale_x + self.pad_x as f32,
      y * self.scale_y + self.pad_y as f32,
    )
  }

  /// 网络坐标 -> 原图坐标
  pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
    (
      (x - self.pad_x as f32) / self.scale_x,
      (y - self.pad_y as f32) / self.scale_y,
    )
  }
}

/// 在主机上完成 letterbox、通道重排与归一化，写出平面 CHW (RGB) 数据。
/// `out` 的长度必须是 `3 * input_width * input_height`。
pub fn letterbox_host(
  image: &HostImage,
  order: ColorOrder,
  config: &PreprocessConfig,
  transform: &LetterboxTransform,
  out: &mut [f32],
) -> Result<()> {
  if out.len() != config.elements() {
    return Err(Error::InvalidInput(format!(
      "预处理缓冲区长度 {} 与网络输入 {} 不符",
      out.len(),
      config.elements()
    )));
  }
  check_dims(image.width(), image.height(), image.channels())?;

  let source: ImageBuffer<Rgb<u8>, &[u8]> =
    ImageBuffer::from_raw(image.width(), image.height(), image.as_bytes())
      .ok_or_else(|| Error::InvalidInput("图像数据与尺寸不符".to_string()))?;

  let resized;
  let pixels: &[u8] = if transform.resized_width == image.width()
    && transform.resized_height == image.height()
  {
    image.as_bytes()
  } else {
    resized = imageops::resize(
      &source,
      transform.resized_width,
      transform.resized_height,
      imageops::FilterType::Triangle,
    );
    resized.as_raw()
  };

  let plane = config.plane_size();
  for c in 0..COLOR_CHANNELS {
    let pad = config.normalize(config.pad_value, c);
    out[c * plane..(c + 1) * plane].fill(pad);
  }

  // RGB 输出通道 c 在源像素中的位置
  let src_channel = match order {
    ColorOrder::Rgb => [0usize, 1, 2],
    ColorOrder::Bgr => [2usize, 1, 0],
  };

  let width = config.input_width as usize;
  let rw = transform.resized_width as usize;
  for y in 0..transform.resized_height as usize {
    let row = (transform.pad_y as usize + y) * width + transform.pad_x as usize;
    for x in 0..rw {
      let px = &pixels[(y * rw + x) * COLOR_CHANNELS..(y * rw + x + 1) * COLOR_CHANNELS];
      for c in 0..COLOR_CHANNELS {
        out[c * plane + row + x] = config.normalize(px[src_channel[c]], c);
      }
    }
  }

  Ok(())
}

fn check_dims(width: u32, height: u32, channels: usize) -> Result<()> {
  if width == 0 || height == 0 {
    return Err(Error::InvalidInput("图像为空".to_string()));
  }
  if channels != COLOR_CHANNELS {
    return Err(Error::InvalidInput(format!(
      "需要 3 通道图像, 实际为 {} 通道",
      channels
    )));
  }
  Ok(())
}

/// 预处理一张图像，写入输入缓冲区的第 `slot` 个位置。
/// 设备端路径不会静默回退到主机端。
pub(crate) fn preprocess_into(
  image: InputImage<'_>,
  flags: &DetectorFlags,
  config: &PreprocessConfig,
  runtime: &dyn Runtime,
  staging: &mut [f32],
  dst: &mut dyn DeviceBuffer,
  slot: usize,
) -> Result<LetterboxTransform> {
  check_dims(image.width(), image.height(), image.channels())?;

  let transform = LetterboxTransform::compute(
    image.width(),
    image.height(),
    config.input_width,
    config.input_height,
  );
  let offset = slot * config.elements();
  debug!(
    "预处理第 {} 张图像: {}x{} -> {}x{}, 填充 ({}, {})",
    slot,
    image.width(),
    image.height(),
    transform.resized_width,
    transform.resized_height,
    transform.pad_x,
    transform.pad_y
  );

  match (image, flags.preprocessor) {
    (InputImage::Host(host), PreprocessorKind::Host) => {
      letterbox_host(host, flags.input_order, config, &transform, staging)?;
      upload_f32(dst, offset, staging)?;
    }
    (InputImage::Host(host), PreprocessorKind::Device) => {
      let device = DeviceImage::upload(runtime, host)?;
      letterbox_device(&device, flags, config, &transform, runtime, dst, offset)?;
    }
    (InputImage::Device(device), PreprocessorKind::Device) => {
      letterbox_device(device, flags, config, &transform, runtime, dst, offset)?;
    }
    (InputImage::Device(_), PreprocessorKind::Host) => {
      return Err(Error::InvalidInput(
        "设备内存中的图像需要启用设备端预处理".to_string(),
      ));
    }
  }

  Ok(transform)
}

fn letterbox_device(
  image: &DeviceImage,
  flags: &DetectorFlags,
  config: &PreprocessConfig,
  transform: &LetterboxTransform,
  runtime: &dyn Runtime,
  dst: &mut dyn DeviceBuffer,
  offset: usize,
) -> Result<()> {
  let preprocessor = runtime.device_preprocessor().ok_or_else(|| {
    Error::DeviceUnavailable("当前运行时不支持设备端预处理".to_string())
  })?;
  preprocessor.letterbox(image, flags.input_order, config, transform, dst, offset)?;
  Ok(())
}
