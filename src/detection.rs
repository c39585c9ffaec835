// 该文件是 Beifeng （北风） 项目的一部分。
// src/detection.rs - 检测结果
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

/// 轴对齐矩形，整数像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

impl Rect {
  pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  /// 由左上角与右下角构造，坐标四舍五入到整数像素
  pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    let left = x1.round() as i32;
    let top = y1.round() as i32;
    let right = x2.round() as i32;
    let bottom = y2.round() as i32;
    Self::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top))
  }

  /// 超出 i32 范围时饱和
  pub fn right(&self) -> i32 {
    self.x.saturating_add(self.width)
  }

  pub fn bottom(&self) -> i32 {
    self.y.saturating_add(self.height)
  }

  /// 面积；宽或高非正时为 0
  pub fn area(&self) -> i64 {
    if self.width <= 0 || self.height <= 0 {
      0
    } else {
      self.width as i64 * self.height as i64
    }
  }

  pub fn intersection(&self, other: &Rect) -> Option<Rect> {
    let x1 = self.x.max(other.x);
    let y1 = self.y.max(other.y);
    let x2 = self.right().min(other.right());
    let y2 = self.bottom().min(other.bottom());
    if x2 <= x1 || y2 <= y1 {
      None
    } else {
      Some(Rect::new(x1, y1, x2.saturating_sub(x1), y2.saturating_sub(y1)))
    }
  }

  /// 交并比；不相交或任一面积非正时为 0
  pub fn iou(&self, other: &Rect) -> f64 {
    let area_a = self.area();
    let area_b = other.area();
    if area_a == 0 || area_b == 0 {
      return 0.0;
    }
    let inter = self.intersection(other).map(|r| r.area()).unwrap_or(0);
    let union = area_a + area_b - inter;
    if union <= 0 {
      0.0
    } else {
      inter as f64 / union as f64
    }
  }
}

/// 模型在图像中检测到的一个目标
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  class_id: i32,
  bounding_box: Rect,
  score: f64,
  class_name: String,
}

impl Default for Detection {
  fn default() -> Self {
    Self {
      class_id: -1,
      bounding_box: Rect::default(),
      score: 0.0,
      class_name: String::new(),
    }
  }
}

impl Detection {
  pub fn new(class_id: i32, bounding_box: Rect, score: f64) -> Self {
    Self {
      class_id,
      bounding_box,
      score,
      class_name: String::new(),
    }
  }

  pub fn class_id(&self) -> i32 {
    self.class_id
  }

  pub fn bounding_box(&self) -> &Rect {
    &self.bounding_box
  }

  pub fn score(&self) -> f64 {
    self.score
  }

  pub fn class_name(&self) -> &str {
    &self.class_name
  }

  pub fn set_class_name(&mut self, name: impl Into<String>) {
    self.class_name = name.into();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_detection_is_unset() {
    let d = Detection::default();
    assert_eq!(d.class_id(), -1);
    assert_eq!(d.score(), 0.0);
    assert!(d.class_name().is_empty());
  }

  #[test]
  fn iou_is_symmetric() {
    let a = Rect::new(10, 10, 50, 50);
    let b = Rect::new(30, 20, 40, 60);
    assert_eq!(a.iou(&b), b.iou(&a));
    assert!(a.iou(&b) > 0.0 && a.iou(&b) < 1.0);
  }

  #[test]
  fn iou_with_itself_is_one() {
    let a = Rect::new(3, 4, 20, 7);
    assert_eq!(a.iou(&a), 1.0);
  }

  #[test]
  fn iou_of_disjoint_or_degenerate_boxes_is_zero() {
    let a = Rect::new(0, 0, 10, 10);
    assert_eq!(a.iou(&Rect::new(20, 20, 5, 5)), 0.0);
    // 仅共享一条边
    assert_eq!(a.iou(&Rect::new(10, 0, 10, 10)), 0.0);
    let empty = Rect::new(2, 2, 0, 5);
    assert_eq!(empty.iou(&empty), 0.0);
    assert_eq!(a.iou(&Rect::new(2, 2, -3, 4)), 0.0);
  }

  #[test]
  fn iou_matches_hand_computation() {
    let a = Rect::new(10, 10, 50, 50);
    let b = Rect::new(10, 10, 50, 30);
    assert!((a.iou(&b) - 0.6).abs() < 1e-12);
  }

  #[test]
  fn boxes_near_the_integer_limits_do_not_overflow() {
    let far = Rect::new(i32::MAX - 5, 0, 10, 10);
    assert_eq!(far.right(), i32::MAX);
    assert_eq!(far.iou(&Rect::new(0, 0, 10, 10)), 0.0);
    let iou = far.iou(&Rect::new(i32::MAX - 5, 0, 5, 10));
    assert!(iou > 0.0 && iou <= 1.0);

    let wide = Rect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
    let huge = Rect::new(-10, -10, i32::MAX, i32::MAX);
    let iou = wide.iou(&huge);
    assert!((0.0..=1.0).contains(&iou));
  }

  #[test]
  fn corners_round_to_pixels() {
    let r = Rect::from_corners(0.4, 1.6, 10.5, 20.49);
    assert_eq!(r, Rect::new(0, 2, 11, 18));
  }
}
