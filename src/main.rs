// 该文件是 Beifeng （北风） 项目的一部分。
// src/main.rs - 检测程序入口
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

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};
use url::Url;

use beifeng::{
  Builder, ColorOrder, Detector, FromUrl, Precision,
  backend::{OrtCompiler, OrtRuntime},
  config::DetectorConfig,
  input::InputWrapper,
  logging::{Logger, TracingLogger},
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};

/// Beifeng 参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径，同目录下的 `.engine` 文件不存在时先构建
  #[arg(long, value_name = "MODEL")]
  pub model: PathBuf,
  /// 输入来源 (image:///a.jpg | folder:///dir)
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径 (image:///out.png | folder:///dir?record=json)
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 构建引擎的精度 (fp32|fp16)
  #[arg(long, default_value_t = Precision::Fp32)]
  pub precision: Precision,
  /// 动态批次模型的最大批次
  #[arg(long, default_value_t = 1)]
  pub max_batch: usize,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  #[command(flatten)]
  pub detector: DetectorConfig,
}

/// 公开操作失败时打印操作名与结果码，以结果码退出
fn or_exit<T>(op: &str, result: beifeng::Result<T>) -> T {
  match result {
    Ok(value) => value,
    Err(err) => {
      error!("{}", err.report(op));
      std::process::exit(err.code().value());
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let logger: Arc<dyn Logger> = Arc::new(TracingLogger);

  info!("模型文件路径: {}", args.model.display());
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let engine_path = args.model.with_extension("engine");
  if !engine_path.exists() {
    info!("引擎文件 {} 不存在, 开始构建", engine_path.display());
    let mut builder = Builder::new(Box::new(OrtCompiler));
    builder.set_logger(logger.clone());
    or_exit("init", builder.init());
    or_exit(
      "build_engine",
      builder.build_engine(&args.model, &engine_path, args.precision),
    );
  }

  let runtime = OrtRuntime::new().with_max_batch(args.max_batch);
  let mut detector = Detector::new(Arc::new(runtime));
  detector.set_logger(logger);
  or_exit("apply", args.detector.apply(&mut detector));
  // 解码出的帧都是 RGB
  if detector.flags().input_order != ColorOrder::Rgb {
    debug!("输入帧为 RGB, 忽略通道顺序 {}", detector.flags().input_order);
    detector.set_input_order(ColorOrder::Rgb);
  }
  or_exit("load_engine", detector.load_engine(&engine_path));

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_interrupt_handler()
    .run_task(input, &mut detector, output)?;

  Ok(())
}
