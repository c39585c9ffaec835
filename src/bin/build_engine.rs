// 该文件是 Beifeng （北风） 项目的一部分。
// src/bin/build_engine.rs - 引擎构建程序
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
use tracing::{error, info};

use beifeng::{Builder, Precision, backend::OrtCompiler, logging::TracingLogger};

/// 把 ONNX 模型编译成序列化引擎
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(long, value_name = "MODEL")]
  pub model: PathBuf,
  /// 引擎输出路径，默认与模型同名、扩展名为 `.engine`
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<PathBuf>,
  /// 构建精度 (fp32|fp16)
  #[arg(long, default_value_t = Precision::Fp32)]
  pub precision: Precision,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let output = args
    .output
    .unwrap_or_else(|| args.model.with_extension("engine"));

  let mut builder = Builder::new(Box::new(OrtCompiler));
  builder.set_logger(Arc::new(TracingLogger));
  builder.init()?;

  if let Err(err) = builder.build_engine(&args.model, &output, args.precision) {
    error!("{}", err.report("build_engine"));
    std::process::exit(err.code().value());
  }

  info!("引擎已写入 {}", output.display());
  Ok(())
}
