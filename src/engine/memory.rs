// 该文件是 Beifeng （北风） 项目的一部分。
// src/engine/memory.rs - 设备内存
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

use super::{EngineBinding, Runtime, RuntimeError};

const F32_SIZE: usize = std::mem::size_of::<f32>();

/// 一块设备内存，按字节寻址
pub trait DeviceBuffer: Send + Sync {
  fn size(&self) -> usize;

  /// 主机 -> 设备
  fn upload(&mut self, offset: usize, src: &[u8]) -> Result<(), RuntimeError>;

  /// 设备 -> 主机
  fn download(&self, offset: usize, dst: &mut [u8]) -> Result<(), RuntimeError>;
}

fn check_range(size: usize, offset: usize, len: usize) -> Result<(), RuntimeError> {
  match offset.checked_add(len) {
    Some(end) if end <= size => Ok(()),
    _ => Err(RuntimeError::Copy(format!(
      "越界访问: 偏移 {} 长度 {} 超出缓冲区大小 {}",
      offset, len, size
    ))),
  }
}

/// 主机内存实现，供没有独立设备内存的后端使用
#[derive(Debug, Clone, Default)]
pub struct HostBuffer {
  data: Vec<u8>,
}

impl HostBuffer {
  pub fn new(bytes: usize) -> Self {
    Self {
      data: vec![0u8; bytes],
    }
  }

  pub fn from_bytes(data: Vec<u8>) -> Self {
    Self { data }
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }
}

impl DeviceBuffer for HostBuffer {
  fn size(&self) -> usize {
    self.data.len()
  }

  fn upload(&mut self, offset: usize, src: &[u8]) -> Result<(), RuntimeError> {
    check_range(self.data.len(), offset, src.len())?;
    self.data[offset..offset + src.len()].copy_from_slice(src);
    Ok(())
  }

  fn download(&self, offset: usize, dst: &mut [u8]) -> Result<(), RuntimeError> {
    check_range(self.data.len(), offset, dst.len())?;
    dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
    Ok(())
  }
}

/// 以 f32 元素为单位写入，`offset` 为元素偏移
pub fn upload_f32(
  buffer: &mut dyn DeviceBuffer,
  offset: usize,
  data: &[f32],
) -> Result<(), RuntimeError> {
  buffer.upload(offset * F32_SIZE, bytemuck::cast_slice(data))
}

/// 以 f32 元素为单位读取，`offset` 为元素偏移
pub fn download_f32(
  buffer: &dyn DeviceBuffer,
  offset: usize,
  dst: &mut [f32],
) -> Result<(), RuntimeError> {
  buffer.download(offset * F32_SIZE, bytemuck::cast_slice_mut(dst))
}

/// 每个绑定张量一块设备内存，大小覆盖最大批次
pub struct DeviceMemory {
  input: Box<dyn DeviceBuffer>,
  output: Box<dyn DeviceBuffer>,
}

impl DeviceMemory {
  pub fn allocate(
    runtime: &dyn Runtime,
    input: &EngineBinding,
    output: &EngineBinding,
  ) -> Result<Self, RuntimeError> {
    let input_buffer = runtime.allocate(input.byte_size())?;
    let output_buffer = runtime.allocate(output.byte_size())?;
    Ok(Self {
      input: input_buffer,
      output: output_buffer,
    })
  }

  pub fn input(&self) -> &dyn DeviceBuffer {
    self.input.as_ref()
  }

  pub fn input_mut(&mut self) -> &mut dyn DeviceBuffer {
    self.input.as_mut()
  }

  pub fn output(&self) -> &dyn DeviceBuffer {
    self.output.as_ref()
  }

  pub fn output_mut(&mut self) -> &mut dyn DeviceBuffer {
    self.output.as_mut()
  }
}
