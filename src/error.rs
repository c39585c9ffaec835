// 该文件是 Beifeng （北风） 项目的一部分。
// src/error.rs - 错误定义
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

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use thiserror::Error;

use crate::common::ResultCode;
use crate::engine::RuntimeError;
use crate::logging::{LogLevel, Logger};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
  #[error("无效输入: {0}")]
  InvalidInput(String),
  #[error("{0} 尚未初始化")]
  NotInitialized(&'static str),
  #[error("尚未加载引擎")]
  NotLoaded,
  #[error("模型错误: {0}")]
  Model(String),
  #[error("文件系统错误: {}: {source}", path.display())]
  Filesystem {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("设备错误: {0}")]
  Device(String),
  #[error("后端错误: {0}")]
  Backend(String),
  #[error("设备端预处理不可用: {0}")]
  DeviceUnavailable(String),
  #[error("图像错误: {0}")]
  Image(String),
  #[error("内存分配错误: {0}")]
  Alloc(String),
  #[error("其他错误: {0}")]
  Other(String),
}

impl Error {
  pub fn code(&self) -> ResultCode {
    match self {
      Error::InvalidInput(_) => ResultCode::InvalidInput,
      Error::NotInitialized(_) => ResultCode::NotInitialized,
      Error::NotLoaded => ResultCode::NotLoaded,
      Error::Model(_) => ResultCode::ModelError,
      Error::Filesystem { .. } => ResultCode::FilesystemError,
      Error::Device(_) => ResultCode::DeviceError,
      Error::Backend(_) => ResultCode::BackendError,
      Error::DeviceUnavailable(_) => ResultCode::DeviceUnavailable,
      Error::Image(_) => ResultCode::ImageError,
      Error::Alloc(_) => ResultCode::Alloc,
      Error::Other(_) => ResultCode::Other,
    }
  }

  /// 命令行前端的失败提示: `op() 失败: <结果码>`
  pub fn report(&self, op: &str) -> String {
    format!("{}() 失败: {}", op, self.code())
  }

  pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Error::Filesystem {
      path: path.into(),
      source,
    }
  }
}

impl From<RuntimeError> for Error {
  fn from(err: RuntimeError) -> Self {
    match err {
      RuntimeError::Deserialize(msg) => Error::Model(msg),
      RuntimeError::Allocation { bytes, reason } => {
        Error::Device(format!("无法分配 {} 字节设备内存: {}", bytes, reason))
      }
      RuntimeError::Copy(msg) => Error::Device(msg),
      RuntimeError::Context(msg) | RuntimeError::Execution(msg) => Error::Backend(msg),
      RuntimeError::Unsupported(msg) => Error::DeviceUnavailable(msg),
    }
  }
}

impl From<image::ImageError> for Error {
  fn from(err: image::ImageError) -> Self {
    Error::Image(err.to_string())
  }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "未知异常".to_string()
  }
}

/// 公开接口的边界：失败都会记录一行日志，
/// 协作方内部的 panic 在这里被吸收并转换为 [`Error::Other`]
pub fn guard<T>(logger: &dyn Logger, op: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
  match panic::catch_unwind(AssertUnwindSafe(f)) {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(err)) => {
      logger.logf(LogLevel::Error, format_args!("{}() 失败: {}", op, err));
      Err(err)
    }
    Err(payload) => {
      let detail = panic_detail(payload.as_ref());
      logger.logf(
        LogLevel::Error,
        format_args!("{}() 失败: 捕获到异常: {}", op, detail),
      );
      Err(Error::Other(detail))
    }
  }
}
