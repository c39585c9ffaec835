// 该文件是 Beifeng （北风） 项目的一部分。
// src/classes.rs - 类别名称表
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
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::logging::{LogLevel, Logger};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 类别 id 到名称的映射，id 必须落在 `[0, len)` 内
#[derive(Clone)]
pub struct Classes {
  names: Vec<String>,
  logger: Option<Arc<dyn Logger>>,
}

impl Default for Classes {
  fn default() -> Self {
    Self {
      names: COCO_CLASSES.iter().map(|s| s.to_string()).collect(),
      logger: None,
    }
  }
}

impl fmt::Debug for Classes {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Classes")
      .field("names", &self.names)
      .finish_non_exhaustive()
  }
}

impl Classes {
  pub fn new() -> Self {
    Self::default()
  }

  /// 用新的名称列表整体替换当前表；空列表会被拒绝，原表保持不变
  pub fn load(&mut self, names: Vec<String>) -> Result<()> {
    if names.is_empty() {
      self.log(LogLevel::Error, format_args!("load() 失败: 类别名称列表为空"));
      return Err(Error::InvalidInput("类别名称列表为空".to_string()));
    }

    self.names = names;
    self.log(
      LogLevel::Info,
      format_args!("已加载 {} 个类别", self.names.len()),
    );
    Ok(())
  }

  /// 从文本文件加载，每行一个类别名称，空行忽略
  pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
      self.log(
        LogLevel::Error,
        format_args!("无法读取类别文件 {}: {}", path.display(), e),
      );
      Error::filesystem(path, e)
    })?;

    let names = content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();
    self.load(names)
  }

  pub fn is_loaded(&self) -> bool {
    !self.names.is_empty()
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn names(&self) -> &[String] {
    &self.names
  }

  pub fn get_name(&self, class_id: i32) -> Result<&str> {
    match self.name(class_id) {
      Some(name) => Ok(name),
      None => {
        self.log(
          LogLevel::Error,
          format_args!("getName() 失败: 没有类别 '{}' 的信息", class_id),
        );
        Err(Error::InvalidInput(format!("类别 id 超出范围: {}", class_id)))
      }
    }
  }

  /// 不记录日志的查找
  pub fn name(&self, class_id: i32) -> Option<&str> {
    usize::try_from(class_id)
      .ok()
      .and_then(|idx| self.names.get(idx))
      .map(String::as_str)
  }

  pub fn set_logger(&mut self, logger: Option<Arc<dyn Logger>>) {
    self.logger = logger;
  }

  fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
    if let Some(logger) = &self.logger {
      logger.logf(level, args);
    }
  }
}
