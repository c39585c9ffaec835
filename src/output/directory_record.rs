// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  detection::Detection,
  input::Frame,
  output::{
    Render,
    draw::{Draw, DrawError, Record, RecordFormat},
    draw_from_url,
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
}

pub enum DrawWrapper {
  /// 保存画好框的图像
  Draw(Box<Draw>),
  /// 保存原图，检测结果写到同名文本文件
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &Frame,
    detections: &[Detection],
    fps: Option<u32>,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        let mut image = frame.image.clone();
        draw.visualize(&mut image, detections, fps);
        image.save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.image.save(path)?;
        record.record(detections, path)?;
      }
    };

    Ok(())
  }

  fn from_query(kind: Option<&str>, draw: Draw) -> Self {
    match kind {
      Some("id") => DrawWrapper::Record(Record {
        format: RecordFormat::Id,
      }),
      Some("json") => DrawWrapper::Record(Record {
        format: RecordFormat::Json,
      }),
      Some(_) => DrawWrapper::Record(Record {
        format: RecordFormat::Name,
      }),
      None => DrawWrapper::Draw(Box::new(draw)),
    }
  }
}

/// `folder:///dir[?record=name|id|json][&always][&font=...]`。
/// 文件按日期分目录: `dir/YYYY/MM/DD/HH-MM-SS-XXXX.png`；
/// 没有检测结果的帧只有在 `always` 时才保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: Mutex<u16>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| v.into_owned());
    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let draw = draw_from_url(uri)?;

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw: DrawWrapper::from_query(kind.as_deref(), draw),
      frame_counter: Mutex::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let mut counter = match self.frame_counter.lock() {
      Ok(counter) => counter,
      Err(poisoned) => poisoned.into_inner(),
    };
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(
    &self,
    frame: &Frame,
    detections: &[Detection],
    fps: Option<u32>,
  ) -> Result<(), Self::Error> {
    if !self.always && detections.is_empty() {
      debug!("第 {} 帧没有检测结果, 不保存", frame.index);
      return Ok(());
    }
    let path = self.frame_path()?;
    self.draw.save_result(&path, frame, detections, fps)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::Rect;
  use image::RgbImage;

  fn saved_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
      for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else {
          files.push(path);
        }
      }
    }
    files.sort();
    files
  }

  fn frame() -> Frame {
    Frame {
      image: RgbImage::new(16, 16),
      source: None,
      index: 0,
    }
  }

  fn output_url(dir: &Path, query: &str) -> url::Url {
    url::Url::parse(&format!("folder://{}{}", dir.display(), query)).unwrap()
  }

  #[test]
  fn empty_frames_are_skipped_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryRecordOutput::from_url(&output_url(dir.path(), "")).unwrap();
    output.render_result(&frame(), &[], None).unwrap();
    assert!(saved_files(dir.path()).is_empty());

    let output = DirectoryRecordOutput::from_url(&output_url(dir.path(), "?always")).unwrap();
    output.render_result(&frame(), &[], None).unwrap();
    assert_eq!(saved_files(dir.path()).len(), 1);
  }

  #[test]
  fn record_mode_writes_image_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let output =
      DirectoryRecordOutput::from_url(&output_url(dir.path(), "?record=json")).unwrap();
    let detection = Detection::new(2, Rect::new(1, 1, 4, 4), 0.6);
    output.render_result(&frame(), &[detection], None).unwrap();

    let files = saved_files(dir.path());
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|p| p.extension().is_some_and(|e| e == "json")));
    assert!(files.iter().any(|p| p.extension().is_some_and(|e| e == "png")));
  }
}
