// 该文件是 Beifeng （北风） 项目的一部分。
// src/detector/decode.rs - 输出解码与非极大值抑制
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

use std::collections::BTreeMap;

use tracing::debug;

use super::preprocess::LetterboxTransform;
use crate::classes::Classes;
use crate::detection::{Detection, Rect};

/// 每个候选框的前 5 个值: cx, cy, w, h, objectness
const BOX_ATTRS: usize = 5;

/// 阈值过滤后、NMS 之前的候选框
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub class_id: i32,
  pub score: f64,
  pub rect: Rect,
}

/// 解析单张图像的网络输出。`output` 按行存放，每行 `attrs` 个值。
/// 置信度为 objectness 与最大类别分数之积，低于阈值（或为 NaN）的被丢弃。
pub fn decode_candidates(
  output: &[f32],
  attrs: usize,
  transform: &LetterboxTransform,
  score_threshold: f64,
) -> Vec<Candidate> {
  if attrs <= BOX_ATTRS {
    return Vec::new();
  }

  let max_x = transform.src_width as f32;
  let max_y = transform.src_height as f32;
  let mut candidates = Vec::new();

  for row in output.chunks_exact(attrs) {
    let objectness = row[4];
    let scores = &row[BOX_ATTRS..];

    // 取第一个最大值，NaN 分数不参与比较
    let mut argmax: Option<(usize, f32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
      if !score.is_nan() && argmax.is_none_or(|(_, best)| score > best) {
        argmax = Some((idx, score));
      }
    }
    let Some((class_id, best)) = argmax else {
      continue;
    };

    let confidence = objectness as f64 * best as f64;
    if !(confidence >= score_threshold) {
      continue;
    }

    let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
    let (x1, y1) = transform.to_source(cx - w / 2.0, cy - h / 2.0);
    let (x2, y2) = transform.to_source(cx + w / 2.0, cy + h / 2.0);

    candidates.push(Candidate {
      class_id: class_id as i32,
      score: confidence,
      rect: Rect::from_corners(
        x1.clamp(0.0, max_x),
        y1.clamp(0.0, max_y),
        x2.clamp(0.0, max_x),
        y2.clamp(0.0, max_y),
      ),
    });
  }

  candidates
}

/// 按类别独立进行非极大值抑制。
/// 结果按类别 id 升序，同一类别内按分数降序。
pub fn nms(candidates: Vec<Candidate>, nms_threshold: f64) -> Vec<Candidate> {
  let mut by_class: BTreeMap<i32, Vec<Candidate>> = BTreeMap::new();
  for candidate in candidates {
    by_class.entry(candidate.class_id).or_default().push(candidate);
  }

  let mut kept = Vec::new();
  for (_, mut group) in by_class {
    // 稳定排序，分数相同时保留原始顺序
    group.sort_by(|a, b| b.score.total_cmp(&a.score));

    let start = kept.len();
    for candidate in group {
      let suppressed = kept[start..]
        .iter()
        .any(|k: &Candidate| k.rect.iou(&candidate.rect) > nms_threshold);
      if !suppressed {
        kept.push(candidate);
      }
    }
  }

  kept
}

/// 解码、NMS 并填写类别名称
pub fn decode(
  output: &[f32],
  attrs: usize,
  transform: &LetterboxTransform,
  score_threshold: f64,
  nms_threshold: f64,
  classes: &Classes,
) -> Vec<Detection> {
  let candidates = decode_candidates(output, attrs, transform, score_threshold);
  let total = candidates.len();
  let kept = nms(candidates, nms_threshold);
  debug!("候选框 {} 个, NMS 后保留 {} 个", total, kept.len());

  kept
    .into_iter()
    .map(|c| {
      let mut detection = Detection::new(c.class_id, c.rect, c.score);
      if let Some(name) = classes.name(c.class_id) {
        detection.set_class_name(name);
      }
      detection
    })
    .collect()
}
