// 该文件是 Beifeng （北风） 项目的一部分。
// src/config.rs - 检测器配置
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

use clap::Args;

use crate::classes::Classes;
use crate::common::{ColorOrder, DetectorFlags, PreprocessorKind};
use crate::detector::{DEFAULT_NMS_THRESHOLD, DEFAULT_SCORE_THRESHOLD, Detector};
use crate::error::Result;

/// 检测器的可调参数，可直接嵌入命令行参数
#[derive(Args, Debug, Clone, PartialEq)]
pub struct DetectorConfig {
  /// 置信度阈值
  #[arg(long, default_value_t = DEFAULT_SCORE_THRESHOLD)]
  pub score_threshold: f64,
  /// NMS IoU 阈值
  #[arg(long, default_value_t = DEFAULT_NMS_THRESHOLD)]
  pub nms_threshold: f64,
  /// 输入图像通道顺序 (bgr|rgb)
  #[arg(long, default_value_t = ColorOrder::Bgr)]
  pub input_order: ColorOrder,
  /// 预处理后端 (host|device)
  #[arg(long, default_value_t = PreprocessorKind::Host)]
  pub preprocessor: PreprocessorKind,
  /// 类别名称文件，每行一个
  #[arg(long)]
  pub classes: Option<PathBuf>,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      input_order: ColorOrder::Bgr,
      preprocessor: PreprocessorKind::Host,
      classes: None,
    }
  }
}

impl DetectorConfig {
  pub fn flags(&self) -> DetectorFlags {
    DetectorFlags::default()
      .with_input_order(self.input_order)
      .with_preprocessor(self.preprocessor)
  }

  /// 初始化检测器并应用阈值与类别表；任何一项非法都会原样返回错误
  pub fn apply(&self, detector: &mut Detector) -> Result<()> {
    detector.init(self.flags())?;
    detector.set_score_threshold(self.score_threshold)?;
    detector.set_nms_threshold(self.nms_threshold)?;
    if let Some(path) = &self.classes {
      let mut classes = Classes::default();
      classes.set_logger(Some(detector.logger()));
      classes.load_file(path)?;
      detector.set_classes(classes);
    }
    Ok(())
  }
}
