// 该文件是 Beifeng （北风） 项目的一部分。
// tests/builder.rs - 引擎构建器集成测试
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

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use beifeng::logging::{LogLevel, MemoryLogger};
use beifeng::{Builder, Detector, DetectorFlags, Precision, ResultCode};

use common::{FakeCompiler, FakeRuntime, single_model};

fn builder(fast_fp16: bool) -> (Builder, Arc<MemoryLogger>) {
  let logger = Arc::new(MemoryLogger::default());
  let mut builder = Builder::new(Box::new(FakeCompiler { fast_fp16 }));
  builder.set_logger(logger.clone());
  builder.init().unwrap();
  (builder, logger)
}

fn model_file(dir: &Path, content: &[u8]) -> PathBuf {
  let path = dir.join("model.onnx");
  std::fs::write(&path, content).unwrap();
  path
}

fn files_in(dir: &Path) -> Vec<String> {
  let mut names: Vec<String> = std::fs::read_dir(dir)
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  names.sort();
  names
}

#[test]
fn builds_and_writes_the_engine() {
  let (builder, logger) = builder(false);
  let dir = tempfile::tempdir().unwrap();
  let model = model_file(dir.path(), b"yolo");
  let output = dir.path().join("model.engine");

  builder.build_engine(&model, &output, Precision::Fp32).unwrap();
  assert_eq!(std::fs::read(&output).unwrap(), b"engine:yolo");
  assert!(logger.contains(LogLevel::Info, "[Runtime] compile"));
  assert_eq!(files_in(dir.path()), vec!["model.engine", "model.onnx"]);
}

#[test]
fn existing_engine_is_overwritten() {
  let (builder, _) = builder(true);
  let dir = tempfile::tempdir().unwrap();
  let model = model_file(dir.path(), b"v2");
  let output = dir.path().join("model.engine");
  std::fs::write(&output, b"stale engine contents").unwrap();

  builder.build_engine(&model, &output, Precision::Fp16).unwrap();
  assert_eq!(std::fs::read(&output).unwrap(), b"engine:v2");
}

#[test]
fn uninitialized_builder_refuses_to_build() {
  let builder = Builder::new(Box::new(FakeCompiler { fast_fp16: true }));
  assert!(!builder.is_initialized());
  let dir = tempfile::tempdir().unwrap();
  let model = model_file(dir.path(), b"yolo");
  let err = builder
    .build_engine(&model, dir.path().join("out.engine"), Precision::Fp32)
    .unwrap_err();
  assert_eq!(err.code(), ResultCode::NotInitialized);
}

#[test]
fn fp16_without_hardware_support_is_invalid_input() {
  let (builder, logger) = builder(false);
  let dir = tempfile::tempdir().unwrap();
  let model = model_file(dir.path(), b"yolo");
  let output = dir.path().join("model.engine");

  let err = builder.build_engine(&model, &output, Precision::Fp16).unwrap_err();
  assert_eq!(err.code(), ResultCode::InvalidInput);
  assert!(!output.exists());
  assert!(logger.contains(LogLevel::Error, "build_engine() 失败"));
}

#[test]
fn compiler_failures_map_onto_result_codes() {
  let cases: [(&[u8], ResultCode); 4] = [
    (b"parse-error", ResultCode::ModelError),
    (b"build-error", ResultCode::BackendError),
    (b"empty", ResultCode::BackendError),
    (b"panic", ResultCode::Other),
  ];

  for (content, code) in cases {
    let (builder, logger) = builder(false);
    let dir = tempfile::tempdir().unwrap();
    let model = model_file(dir.path(), content);
    let output = dir.path().join("model.engine");

    let err = builder.build_engine(&model, &output, Precision::Fp32).unwrap_err();
    assert_eq!(err.code(), code, "{}", String::from_utf8_lossy(content));
    assert!(!output.exists());
    assert_eq!(files_in(dir.path()), vec!["model.onnx"]);
    assert!(logger.contains(LogLevel::Error, "build_engine() 失败"));
  }
}

#[test]
fn missing_model_is_a_model_error() {
  let (builder, _) = builder(false);
  let dir = tempfile::tempdir().unwrap();
  let err = builder
    .build_engine(
      dir.path().join("missing.onnx"),
      dir.path().join("out.engine"),
      Precision::Fp32,
    )
    .unwrap_err();
  assert_eq!(err.code(), ResultCode::ModelError);
}

#[test]
fn unwritable_output_is_a_filesystem_error() {
  let (builder, _) = builder(false);
  let dir = tempfile::tempdir().unwrap();
  let model = model_file(dir.path(), b"yolo");
  let err = builder
    .build_engine(&model, dir.path().join("no").join("such").join("out.engine"), Precision::Fp32)
    .unwrap_err();
  assert_eq!(err.code(), ResultCode::FilesystemError);
}

#[test]
fn built_engine_loads_into_a_detector() {
  let (builder, _) = builder(false);
  let dir = tempfile::tempdir().unwrap();
  let model = model_file(dir.path(), b"single");
  let output = dir.path().join("model.engine");
  builder.build_engine(&model, &output, Precision::Fp32).unwrap();

  // 构建器给引擎加了前缀，运行时按完整字节查表
  let mut renamed = single_model();
  renamed.name = "engine:single";
  let mut detector = Detector::new(Arc::new(FakeRuntime::new().with_model(renamed)));
  detector.set_logger(Arc::new(MemoryLogger::default()));
  detector.init(DetectorFlags::default()).unwrap();
  detector.load_engine(&output).unwrap();
  assert!(detector.is_engine_loaded());
}
