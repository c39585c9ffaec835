// 该文件是 Beifeng （北风） 项目的一部分。
// src/logging.rs - 日志接口
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
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
  Debug,
  Info,
  Warning,
  Error,
}

impl LogLevel {
  pub fn as_str(&self) -> &'static str {
    match self {
      LogLevel::Debug => "debug",
      LogLevel::Info => "info",
      LogLevel::Warning => "warning",
      LogLevel::Error => "error",
    }
  }
}

impl fmt::Display for LogLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 日志输出端，任何实现了 `print` 的对象都可以注入到构建器与检测器中
pub trait Logger: Send + Sync {
  fn print(&self, level: LogLevel, msg: &str);

  fn log(&self, level: LogLevel, msg: &str) {
    self.print(level, msg);
  }

  fn logf(&self, level: LogLevel, args: fmt::Arguments<'_>) {
    match args.as_str() {
      Some(msg) => self.print(level, msg),
      None => self.print(level, &args.to_string()),
    }
  }

  fn debug(&self, msg: &str) {
    self.print(LogLevel::Debug, msg);
  }

  fn info(&self, msg: &str) {
    self.print(LogLevel::Info, msg);
  }

  fn warning(&self, msg: &str) {
    self.print(LogLevel::Warning, msg);
  }

  fn error(&self, msg: &str) {
    self.print(LogLevel::Error, msg);
  }
}

/// 默认实现：每条消息输出一行到标准输出
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutLogger;

impl Logger for StdoutLogger {
  fn print(&self, level: LogLevel, msg: &str) {
    println!("|yolov5|{}|{}", level, msg);
  }
}

/// 转发到 `tracing`，由 `tracing-subscriber` 决定输出位置
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
  fn print(&self, level: LogLevel, msg: &str) {
    match level {
      LogLevel::Debug => tracing::debug!("{}", msg),
      LogLevel::Info => tracing::info!("{}", msg),
      LogLevel::Warning => tracing::warn!("{}", msg),
      LogLevel::Error => tracing::error!("{}", msg),
    }
  }
}

/// 将日志保存在内存中，便于调用方事后检查
#[derive(Debug, Default)]
pub struct MemoryLogger {
  lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
  pub fn lines(&self) -> Vec<(LogLevel, String)> {
    match self.lines.lock() {
      Ok(lines) => lines.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }

  pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
    self
      .lines()
      .iter()
      .any(|(l, msg)| *l == level && msg.contains(needle))
  }
}

impl Logger for MemoryLogger {
  fn print(&self, level: LogLevel, msg: &str) {
    let mut lines = match self.lines.lock() {
      Ok(lines) => lines,
      Err(poisoned) => poisoned.into_inner(),
    };
    lines.push((level, msg.to_string()));
  }
}

pub fn default_logger() -> Arc<dyn Logger> {
  Arc::new(StdoutLogger)
}

/// 推理运行时自带的诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeSeverity {
  InternalError,
  Error,
  Warning,
  Info,
  Verbose,
}

impl From<RuntimeSeverity> for LogLevel {
  fn from(severity: RuntimeSeverity) -> Self {
    match severity {
      RuntimeSeverity::InternalError | RuntimeSeverity::Error => LogLevel::Error,
      RuntimeSeverity::Warning => LogLevel::Warning,
      RuntimeSeverity::Info => LogLevel::Info,
      RuntimeSeverity::Verbose => LogLevel::Debug,
    }
  }
}

/// 把运行时的诊断通道接到 [`Logger`] 上
#[derive(Clone)]
pub struct RuntimeLogger {
  logger: Option<Arc<dyn Logger>>,
}

impl RuntimeLogger {
  pub fn new(logger: Arc<dyn Logger>) -> Self {
    Self {
      logger: Some(logger),
    }
  }

  pub fn silent() -> Self {
    Self { logger: None }
  }

  pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
    self.logger = Some(logger);
  }

  pub fn log(&self, severity: RuntimeSeverity, msg: &str) {
    if let Some(logger) = &self.logger {
      logger.logf(severity.into(), format_args!("[Runtime] {}", msg));
    }
  }
}

impl fmt::Debug for RuntimeLogger {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RuntimeLogger")
      .field("attached", &self.logger.is_some())
      .finish()
  }
}
