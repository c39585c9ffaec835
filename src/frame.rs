// 该文件是 Beifeng （北风） 项目的一部分。
// src/frame.rs - 主机与设备图像定义
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

use image::RgbImage;

use crate::common::ColorOrder;
use crate::engine::{DeviceBuffer, Runtime};
use crate::error::{Error, Result};

pub const COLOR_CHANNELS: usize = 3;

/// 主机内存中的 8 位交错图像 (HWC)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostImage {
  width: u32,
  height: u32,
  channels: usize,
  data: Box<[u8]>,
}

impl HostImage {
  pub fn new(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Result<Self> {
    let expected = width as usize * height as usize * channels;
    if data.len() != expected {
      return Err(Error::InvalidInput(format!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        expected,
        data.len()
      )));
    }

    Ok(Self {
      width,
      height,
      channels,
      data: data.into_boxed_slice(),
    })
  }

  /// 以单一颜色填充的三通道图像
  pub fn filled(width: u32, height: u32, pixel: [u8; 3]) -> Self {
    let data: Vec<u8> = pixel
      .iter()
      .copied()
      .cycle()
      .take(width as usize * height as usize * COLOR_CHANNELS)
      .collect();
    Self {
      width,
      height,
      channels: COLOR_CHANNELS,
      data: data.into_boxed_slice(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }

  pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
    if x >= self.width || y >= self.height {
      return None;
    }
    let start = (y as usize * self.width as usize + x as usize) * self.channels;
    self.data.get(start..start + self.channels)
  }

  /// 转为 `image` 的 RGB 图像，`order` 描述当前数据的通道顺序
  pub fn to_rgb_image(&self, order: ColorOrder) -> Result<RgbImage> {
    if self.channels != COLOR_CHANNELS {
      return Err(Error::InvalidInput(format!(
        "需要 3 通道图像, 实际为 {} 通道",
        self.channels
      )));
    }
    let mut data = self.data.to_vec();
    if order == ColorOrder::Bgr {
      for px in data.chunks_exact_mut(COLOR_CHANNELS) {
        px.swap(0, 2);
      }
    }
    RgbImage::from_raw(self.width, self.height, data)
      .ok_or_else(|| Error::Image("图像缓冲区尺寸不匹配".to_string()))
  }
}

impl From<RgbImage> for HostImage {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      channels: COLOR_CHANNELS,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

/// 已经位于设备内存中的图像，布局与 [`HostImage`] 相同
pub struct DeviceImage {
  width: u32,
  height: u32,
  channels: usize,
  buffer: Box<dyn DeviceBuffer>,
}

impl DeviceImage {
  pub fn upload(runtime: &dyn Runtime, image: &HostImage) -> Result<Self> {
    let mut buffer = runtime.allocate(image.as_bytes().len())?;
    buffer.upload(0, image.as_bytes())?;
    Ok(Self {
      width: image.width(),
      height: image.height(),
      channels: image.channels(),
      buffer,
    })
  }

  pub fn download(&self) -> Result<HostImage> {
    let mut data = vec![0u8; self.width as usize * self.height as usize * self.channels];
    self.buffer.download(0, &mut data)?;
    HostImage::new(self.width, self.height, self.channels, data)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  pub fn buffer(&self) -> &dyn DeviceBuffer {
    self.buffer.as_ref()
  }
}

impl std::fmt::Debug for DeviceImage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DeviceImage")
      .field("width", &self.width)
      .field("height", &self.height)
      .field("channels", &self.channels)
      .finish_non_exhaustive()
  }
}

/// 检测接口接受的图像
#[derive(Debug, Clone, Copy)]
pub enum InputImage<'a> {
  Host(&'a HostImage),
  Device(&'a DeviceImage),
}

impl InputImage<'_> {
  pub fn width(&self) -> u32 {
    match self {
      InputImage::Host(img) => img.width(),
      InputImage::Device(img) => img.width(),
    }
  }

  pub fn height(&self) -> u32 {
    match self {
      InputImage::Host(img) => img.height(),
      InputImage::Device(img) => img.height(),
    }
  }

  pub fn channels(&self) -> usize {
    match self {
      InputImage::Host(img) => img.channels(),
      InputImage::Device(img) => img.channels(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.width() == 0 || self.height() == 0
  }
}

impl<'a> From<&'a HostImage> for InputImage<'a> {
  fn from(image: &'a HostImage) -> Self {
    InputImage::Host(image)
  }
}

impl<'a> From<&'a DeviceImage> for InputImage<'a> {
  fn from(image: &'a DeviceImage) -> Self {
    InputImage::Device(image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::common::ResultCode;

  #[test]
  fn new_checks_data_length() {
    let err = HostImage::new(2, 2, 3, vec![0; 11]).unwrap_err();
    assert_eq!(err.code(), ResultCode::InvalidInput);
    assert!(HostImage::new(2, 2, 3, vec![0; 12]).is_ok());
  }

  #[test]
  fn bgr_to_rgb_swaps_channels() {
    let img = HostImage::filled(2, 1, [1, 2, 3]);
    assert_eq!(img.pixel(1, 0), Some(&[1u8, 2, 3][..]));
    assert_eq!(img.pixel(2, 0), None);
    let rgb = img.to_rgb_image(ColorOrder::Bgr).unwrap();
    assert_eq!(rgb.get_pixel(0, 0).0, [3, 2, 1]);
    let rgb = img.to_rgb_image(ColorOrder::Rgb).unwrap();
    assert_eq!(rgb.get_pixel(1, 0).0, [1, 2, 3]);
  }

  #[test]
  fn rgb_image_converts_without_reordering() {
    let rgb = RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
    let host = HostImage::from(rgb);
    assert_eq!((host.width(), host.height(), host.channels()), (3, 2, 3));
    assert_eq!(host.pixel(2, 1), Some(&[10u8, 20, 30][..]));
  }
}
