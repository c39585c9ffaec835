// 该文件是 Beifeng （北风） 项目的一部分。
// src/builder.rs - 引擎构建器
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

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::common::Precision;
use crate::error::{Error, Result, guard};
use crate::logging::{LogLevel, Logger, RuntimeLogger, default_logger};

#[derive(Error, Debug)]
pub enum CompileError {
  /// 模型无法读取或解析
  #[error("模型解析失败: {0}")]
  Parse(String),
  /// 编译器内部错误
  #[error("引擎构建失败: {0}")]
  Build(String),
}

/// 把模型描述编译成序列化引擎
pub trait EngineCompiler: Send + Sync {
  fn platform_has_fast_fp16(&self) -> bool;

  fn compile(
    &self,
    model_path: &Path,
    precision: Precision,
    log: &RuntimeLogger,
  ) -> std::result::Result<Vec<u8>, CompileError>;
}

pub struct Builder {
  compiler: Box<dyn EngineCompiler>,
  logger: Arc<dyn Logger>,
  runtime_log: Option<RuntimeLogger>,
}

impl Builder {
  pub fn new(compiler: Box<dyn EngineCompiler>) -> Self {
    Self {
      compiler,
      logger: default_logger(),
      runtime_log: None,
    }
  }

  /// 可重复调用
  pub fn init(&mut self) -> Result<()> {
    self.runtime_log = Some(RuntimeLogger::new(self.logger.clone()));
    Ok(())
  }

  pub fn is_initialized(&self) -> bool {
    self.runtime_log.is_some()
  }

  pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
    if let Some(runtime_log) = self.runtime_log.as_mut() {
      runtime_log.set_logger(logger.clone());
    }
    self.logger = logger;
  }

  pub fn logger(&self) -> Arc<dyn Logger> {
    self.logger.clone()
  }

  /// 编译 `model_path` 并把序列化引擎写到 `output_path`。
  /// 失败时 `output_path` 上不会留下不完整的文件。
  pub fn build_engine(
    &self,
    model_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    precision: Precision,
  ) -> Result<()> {
    let model_path = model_path.as_ref();
    let output_path = output_path.as_ref();
    guard(self.logger.as_ref(), "build_engine", || {
      self.build_engine_inner(model_path, output_path, precision)
    })
  }

  fn build_engine_inner(
    &self,
    model_path: &Path,
    output_path: &Path,
    precision: Precision,
  ) -> Result<()> {
    let runtime_log = self
      .runtime_log
      .as_ref()
      .ok_or(Error::NotInitialized("构建器"))?;

    if precision == Precision::Fp16 && !self.compiler.platform_has_fast_fp16() {
      return Err(Error::InvalidInput(
        "当前平台不支持快速 fp16, 无法以 fp16 精度构建".to_string(),
      ));
    }
    if !model_path.is_file() {
      return Err(Error::Model(format!(
        "无法读取模型文件: {}",
        model_path.display()
      )));
    }

    self.logger.logf(
      LogLevel::Info,
      format_args!(
        "以 {} 精度构建并序列化引擎 {}, 这可能需要一些时间",
        precision,
        model_path.display()
      ),
    );
    let engine = self
      .compiler
      .compile(model_path, precision, runtime_log)
      .map_err(|e| match e {
        CompileError::Parse(msg) => Error::Model(msg),
        CompileError::Build(msg) => Error::Backend(msg),
      })?;
    if engine.is_empty() {
      return Err(Error::Backend("编译器返回了空引擎".to_string()));
    }

    self.logger.logf(
      LogLevel::Info,
      format_args!(
        "写入序列化引擎 ({} 字节): {}",
        engine.len(),
        output_path.display()
      ),
    );
    write_atomic(output_path, &engine)
  }
}

/// 先写到同目录的临时文件，再整体替换目标文件
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };

  let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::filesystem(dir, e))?;
  file
    .write_all(data)
    .and_then(|_| file.as_file().sync_all())
    .map_err(|e| Error::filesystem(file.path(), e))?;
  file
    .persist(path)
    .map_err(|e| Error::filesystem(path, e.error))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn atomic_write_replaces_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.engine");
    std::fs::write(&path, b"old").unwrap();

    write_atomic(&path, b"new engine").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"new engine");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
  }

  #[test]
  fn atomic_write_into_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("model.engine");
    let err = write_atomic(&path, b"x").unwrap_err();
    assert_eq!(err.code(), crate::common::ResultCode::FilesystemError);
    assert!(!path.exists());
  }
}
