// 该文件是 Beifeng （北风） 项目的一部分。
// src/common.rs - 结果码、精度与检测器标志
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

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// 公开操作的结果码，数值保持稳定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
  /// 调用方违反了前置条件
  InvalidInput = -100,
  /// 尚未初始化
  NotInitialized = -90,
  /// 尚未加载引擎
  NotLoaded = -80,
  /// 模型或引擎结构不可用（例如缺少绑定）
  ModelError = -70,
  /// 文件系统错误
  FilesystemError = -50,
  /// 设备内存相关错误
  DeviceError = -40,
  /// 推理/编译后端自身报告的错误
  BackendError = -30,
  /// 请求了设备端预处理，但当前构建不支持
  DeviceUnavailable = -21,
  /// 图像处理错误
  ImageError = -20,
  /// 内存分配错误
  Alloc = -11,
  /// 其他错误
  Other = -10,
  Success = 0,
}

impl ResultCode {
  pub const ALL: [ResultCode; 12] = [
    ResultCode::InvalidInput,
    ResultCode::NotInitialized,
    ResultCode::NotLoaded,
    ResultCode::ModelError,
    ResultCode::FilesystemError,
    ResultCode::DeviceError,
    ResultCode::BackendError,
    ResultCode::DeviceUnavailable,
    ResultCode::ImageError,
    ResultCode::Alloc,
    ResultCode::Other,
    ResultCode::Success,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ResultCode::InvalidInput => "invalid input",
      ResultCode::NotInitialized => "not initialized",
      ResultCode::NotLoaded => "not loaded",
      ResultCode::ModelError => "model error",
      ResultCode::FilesystemError => "filesystem error",
      ResultCode::DeviceError => "device error",
      ResultCode::BackendError => "backend error",
      ResultCode::DeviceUnavailable => "device preprocessing unavailable",
      ResultCode::ImageError => "image error",
      ResultCode::Alloc => "alloc error",
      ResultCode::Other => "other error",
      ResultCode::Success => "success",
    }
  }

  pub fn value(&self) -> i32 {
    *self as i32
  }

  pub fn from_value(value: i32) -> Option<Self> {
    Self::ALL.iter().copied().find(|code| code.value() == value)
  }
}

impl fmt::Display for ResultCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 引擎构建精度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Precision {
  /// 32 位浮点
  #[default]
  Fp32,
  /// 16 位浮点
  Fp16,
}

impl Precision {
  pub fn as_str(&self) -> &'static str {
    match self {
      Precision::Fp32 => "fp32",
      Precision::Fp16 => "fp16",
    }
  }
}

impl fmt::Display for Precision {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Precision {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "fp32" | "float32" | "full" => Ok(Precision::Fp32),
      "fp16" | "float16" | "half" => Ok(Precision::Fp16),
      other => Err(Error::InvalidInput(format!("未知精度: {}", other))),
    }
  }
}

/// 输入图像的通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorOrder {
  #[default]
  Bgr,
  Rgb,
}

impl ColorOrder {
  pub fn as_str(&self) -> &'static str {
    match self {
      ColorOrder::Bgr => "bgr",
      ColorOrder::Rgb => "rgb",
    }
  }
}

impl fmt::Display for ColorOrder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ColorOrder {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "bgr" => Ok(ColorOrder::Bgr),
      "rgb" => Ok(ColorOrder::Rgb),
      other => Err(Error::InvalidInput(format!("未知通道顺序: {}", other))),
    }
  }
}

/// 预处理在哪一侧执行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PreprocessorKind {
  /// 主机内存中完成缩放与归一化
  #[default]
  Host,
  /// 由推理运行时在设备上完成
  Device,
}

impl PreprocessorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      PreprocessorKind::Host => "host",
      PreprocessorKind::Device => "device",
    }
  }
}

impl fmt::Display for PreprocessorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PreprocessorKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "host" | "cpu" => Ok(PreprocessorKind::Host),
      "device" | "gpu" => Ok(PreprocessorKind::Device),
      other => Err(Error::InvalidInput(format!("未知预处理后端: {}", other))),
    }
  }
}

/// 检测器初始化标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetectorFlags {
  pub input_order: ColorOrder,
  pub preprocessor: PreprocessorKind,
}

impl DetectorFlags {
  pub fn with_input_order(mut self, order: ColorOrder) -> Self {
    self.input_order = order;
    self
  }

  pub fn with_preprocessor(mut self, kind: PreprocessorKind) -> Self {
    self.preprocessor = kind;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn result_code_values_are_stable() {
    assert_eq!(ResultCode::InvalidInput.value(), -100);
    assert_eq!(ResultCode::NotInitialized.value(), -90);
    assert_eq!(ResultCode::NotLoaded.value(), -80);
    assert_eq!(ResultCode::ModelError.value(), -70);
    assert_eq!(ResultCode::DeviceUnavailable.value(), -21);
    assert_eq!(ResultCode::Success.value(), 0);
  }

  #[test]
  fn every_result_code_has_a_rendering() {
    for code in ResultCode::ALL {
      assert!(!code.as_str().is_empty());
      assert_eq!(ResultCode::from_value(code.value()), Some(code));
    }
    assert_eq!(ResultCode::from_value(1), None);
  }

  #[test]
  fn precision_parses_and_renders() {
    assert_eq!("fp16".parse::<Precision>().unwrap(), Precision::Fp16);
    assert_eq!("FP32".parse::<Precision>().unwrap(), Precision::Fp32);
    assert_eq!(Precision::Fp16.to_string(), "fp16");
    let err = "int8".parse::<Precision>().unwrap_err();
    assert_eq!(err.code(), ResultCode::InvalidInput);
  }

  #[test]
  fn flags_default_to_bgr_on_host() {
    let flags = DetectorFlags::default();
    assert_eq!(flags.input_order, ColorOrder::Bgr);
    assert_eq!(flags.preprocessor, PreprocessorKind::Host);
    let flags = flags.with_input_order(ColorOrder::Rgb);
    assert_eq!(flags.input_order, ColorOrder::Rgb);
    assert_eq!("gpu".parse::<PreprocessorKind>().unwrap(), PreprocessorKind::Device);
  }
}
