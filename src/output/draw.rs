// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect as PixelRect;
use thiserror::Error;

use crate::detection::Detection;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const BOX_THICKNESS: i32 = 4;
const BOX_COLOR: [u8; 3] = [153, 51, 255];
const TEXT_COLOR: [u8; 3] = [255, 255, 255];
const FPS_COLOR: [u8; 3] = [0, 255, 0];
const FPS_POSITION: (i32, i32) = (10, 30);

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(String),
}

/// 没有配置字体时只画框，不画文字
pub struct Draw {
  font: Option<FontArc>,
  font_size: f32,
  thickness: i32,
  box_color: [u8; 3],
  text_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      thickness: BOX_THICKNESS,
      box_color: BOX_COLOR,
      text_color: TEXT_COLOR,
    }
  }
}

impl Draw {
  pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    Self::with_font_bytes(data)
  }

  pub fn with_font_bytes(data: Vec<u8>) -> Result<Self, DrawError> {
    let font = FontArc::try_from_vec(data).map_err(|e| DrawError::InvalidFont(e.to_string()))?;
    Ok(Self {
      font: Some(font),
      ..Self::default()
    })
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
      self.draw_box(image, detection);
      if let Some(font) = &self.font {
        self.draw_label(image, detection, font);
      }
    }
  }

  pub fn draw_fps(&self, image: &mut RgbImage, fps: u32) {
    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        Rgb(FPS_COLOR),
        FPS_POSITION.0,
        FPS_POSITION.1,
        PxScale::from(self.font_size),
        font,
        &format!("FPS: {}", fps),
      );
    }
  }

  /// 画框、标签，以及可选的帧率
  pub fn visualize(&self, image: &mut RgbImage, detections: &[Detection], fps: Option<u32>) {
    self.draw_detections(image, detections);
    if let Some(fps) = fps {
      self.draw_fps(image, fps);
    }
  }

  // 线宽向框内收缩
  fn draw_box(&self, image: &mut RgbImage, detection: &Detection) {
    let rect = detection.bounding_box();
    for t in 0..self.thickness {
      let width = rect.width - 2 * t;
      let height = rect.height - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      draw_hollow_rect_mut(
        image,
        PixelRect::at(rect.x + t, rect.y + t).of_size(width as u32, height as u32),
        Rgb(self.box_color),
      );
    }
  }

  fn draw_label(&self, image: &mut RgbImage, detection: &Detection, font: &FontArc) {
    let name = if detection.class_name().is_empty() {
      detection.class_id().to_string()
    } else {
      detection.class_name().to_string()
    };
    let label = format!("{}: {:.2}", name, detection.score());
    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, font, &label);
    if text_width == 0 || text_height == 0 {
      return;
    }

    let rect = detection.bounding_box();
    let label_y = (rect.y - text_height as i32).max(0);
    draw_filled_rect_mut(
      image,
      PixelRect::at(rect.x, label_y).of_size(text_width, text_height),
      Rgb(self.box_color),
    );
    draw_text_mut(
      image,
      Rgb(self.text_color),
      rect.x,
      label_y,
      scale,
      font,
      &label,
    );
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
  /// `name, score, x, y, w, h`
  Name,
  /// `id, score, x, y, w, h`
  Id,
  Json,
}

/// 以文本记录检测结果，与保存的图像同名
#[derive(Debug, Clone, Copy)]
pub struct Record {
  pub format: RecordFormat,
}

impl Record {
  pub fn extension(&self) -> &'static str {
    match self.format {
      RecordFormat::Json => "json",
      RecordFormat::Name | RecordFormat::Id => "txt",
    }
  }

  pub fn render(&self, detections: &[Detection]) -> Result<String, serde_json::Error> {
    if self.format == RecordFormat::Json {
      let items: Vec<serde_json::Value> = detections
        .iter()
        .map(|d| {
          let rect = d.bounding_box();
          serde_json::json!({
            "class_id": d.class_id(),
            "class_name": d.class_name(),
            "score": d.score(),
            "box": {
              "x": rect.x,
              "y": rect.y,
              "width": rect.width,
              "height": rect.height,
            },
          })
        })
        .collect();
      return serde_json::to_string_pretty(&items);
    }

    let lines: Vec<String> = detections
      .iter()
      .map(|d| {
        let label = match self.format {
          RecordFormat::Name => d.class_name().to_string(),
          _ => d.class_id().to_string(),
        };
        let rect = d.bounding_box();
        format!(
          "{}, {:.4}, {}, {}, {}, {}",
          label,
          d.score(),
          rect.x,
          rect.y,
          rect.width,
          rect.height
        )
      })
      .collect();
    Ok(lines.join("\n"))
  }

  /// 写到 `path` 替换扩展名后的文件
  pub fn record(&self, detections: &[Detection], path: &Path) -> Result<(), std::io::Error> {
    let content = self.render(detections).map_err(std::io::Error::other)?;
    std::fs::write(path.with_extension(self.extension()), content)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::Rect;

  fn person() -> Detection {
    let mut d = Detection::new(0, Rect::new(2, 3, 16, 14), 0.875);
    d.set_class_name("person");
    d
  }

  #[test]
  fn box_outline_is_drawn_inside_the_rect() {
    let mut image = RgbImage::new(30, 30);
    Draw::default().draw_detections(&mut image, &[person()]);
    assert_eq!(image.get_pixel(2, 3).0, BOX_COLOR);
    assert_eq!(image.get_pixel(5, 6).0, BOX_COLOR);
    // 线宽 4 之内的中心像素不变
    assert_eq!(image.get_pixel(10, 10).0, [0, 0, 0]);
    assert_eq!(image.get_pixel(1, 1).0, [0, 0, 0]);
  }

  #[test]
  fn degenerate_and_outside_boxes_do_not_panic() {
    let mut image = RgbImage::new(8, 8);
    let boxes = [
      Detection::new(1, Rect::new(0, 0, 0, 0), 0.5),
      Detection::new(1, Rect::new(-5, -5, 30, 30), 0.5),
      Detection::new(1, Rect::new(100, 100, 5, 5), 0.5),
    ];
    Draw::default().visualize(&mut image, &boxes, Some(30));
  }

  #[test]
  fn text_records_use_names_or_ids() {
    let by_name = Record {
      format: RecordFormat::Name,
    };
    assert_eq!(by_name.render(&[person()]).unwrap(), "person, 0.8750, 2, 3, 16, 14");
    let by_id = Record {
      format: RecordFormat::Id,
    };
    assert_eq!(by_id.render(&[person()]).unwrap(), "0, 0.8750, 2, 3, 16, 14");
  }

  #[test]
  fn json_record_is_written_next_to_the_image() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("frame.png");
    Record {
      format: RecordFormat::Json,
    }
    .record(&[person()], &image_path)
    .unwrap();

    let text = std::fs::read_to_string(dir.path().join("frame.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value[0]["class_name"], "person");
    assert_eq!(value[0]["box"]["width"], 16);
  }

  #[test]
  fn invalid_font_is_rejected() {
    assert!(matches!(
      Draw::with_font_bytes(b"not a font".to_vec()),
      Err(DrawError::InvalidFont(_))
    ));
  }
}
