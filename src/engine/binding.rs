// 该文件是 Beifeng （北风） 项目的一部分。
// src/engine/binding.rs - 引擎绑定
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

use super::BindingDesc;
use crate::error::{Error, Result};

const INPUT_RANK: usize = 4;
const OUTPUT_RANK: usize = 3;
const INPUT_CHANNELS: usize = 3;
/// cx, cy, w, h, objectness
const BOX_ATTRS: usize = 5;

/// 已加载引擎的一个张量绑定，形状在引擎生命周期内固定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineBinding {
  name: String,
  index: usize,
  dims: Vec<usize>,
  /// 单张图像的元素个数（不含批次维）
  elements_per_item: usize,
  /// 整个批次的元素个数
  element_count: usize,
}

impl EngineBinding {
  fn from_desc(index: usize, desc: &BindingDesc) -> Result<Self> {
    let mut dims = Vec::with_capacity(desc.dims.len());
    for &d in &desc.dims {
      if d <= 0 {
        return Err(Error::Model(format!(
          "绑定 '{}' 含有非法维度 {:?}",
          desc.name, desc.dims
        )));
      }
      dims.push(d as usize);
    }

    if dims.is_empty() {
      return Err(Error::Model(format!("绑定 '{}' 没有维度", desc.name)));
    }

    let elements_per_item = dims[1..].iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
    let element_count = elements_per_item.and_then(|n| n.checked_mul(dims[0]));
    match (elements_per_item, element_count) {
      (Some(elements_per_item), Some(element_count)) => Ok(Self {
        name: desc.name.clone(),
        index,
        dims,
        elements_per_item,
        element_count,
      }),
      _ => Err(Error::Model(format!("绑定 '{}' 的尺寸溢出", desc.name))),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn dims(&self) -> &[usize] {
    &self.dims
  }

  pub fn batch(&self) -> usize {
    self.dims[0]
  }

  pub fn elements_per_item(&self) -> usize {
    self.elements_per_item
  }

  pub fn element_count(&self) -> usize {
    self.element_count
  }

  pub fn byte_size(&self) -> usize {
    self.element_count * std::mem::size_of::<f32>()
  }
}

/// 检查引擎恰好有一个 `[N,3,H,W]` 输入和一个 `[N,boxes,5+classes]` 输出
pub fn validate_bindings(descs: &[BindingDesc]) -> Result<(EngineBinding, EngineBinding)> {
  let inputs: Vec<(usize, &BindingDesc)> =
    descs.iter().enumerate().filter(|(_, d)| d.is_input).collect();
  let outputs: Vec<(usize, &BindingDesc)> =
    descs.iter().enumerate().filter(|(_, d)| !d.is_input).collect();

  if inputs.len() != 1 {
    return Err(Error::Model(format!(
      "预期引擎输入数量为 1, 实际为 {}",
      inputs.len()
    )));
  }
  if outputs.len() != 1 {
    return Err(Error::Model(format!(
      "预期引擎输出数量为 1, 实际为 {}",
      outputs.len()
    )));
  }

  let (input_idx, input_desc) = inputs[0];
  let (output_idx, output_desc) = outputs[0];
  let input = EngineBinding::from_desc(input_idx, input_desc)?;
  let output = EngineBinding::from_desc(output_idx, output_desc)?;

  if input.dims().len() != INPUT_RANK || input.dims()[1] != INPUT_CHANNELS {
    return Err(Error::Model(format!(
      "输入绑定 '{}' 形状 {:?} 不是 [N,3,H,W]",
      input.name(),
      input.dims()
    )));
  }
  if output.dims().len() != OUTPUT_RANK || output.dims()[2] <= BOX_ATTRS {
    return Err(Error::Model(format!(
      "输出绑定 '{}' 形状 {:?} 不是 [N,boxes,5+classes]",
      output.name(),
      output.dims()
    )));
  }
  if input.batch() != output.batch() {
    return Err(Error::Model(format!(
      "输入批次 {} 与输出批次 {} 不一致",
      input.batch(),
      output.batch()
    )));
  }

  Ok((input, output))
}

/// 每个候选框的类别数
pub(crate) fn num_classes(output: &EngineBinding) -> usize {
  output.dims()[2] - BOX_ATTRS
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::common::ResultCode;

  fn yolo_descs() -> Vec<BindingDesc> {
    vec![
      BindingDesc::input("images", vec![2, 3, 640, 640]),
      BindingDesc::output("output", vec![2, 25200, 85]),
    ]
  }

  #[test]
  fn accepts_yolov5_layout() {
    let (input, output) = validate_bindings(&yolo_descs()).unwrap();
    assert_eq!(input.name(), "images");
    assert_eq!(input.index(), 0);
    assert_eq!(input.batch(), 2);
    assert_eq!(input.elements_per_item(), 3 * 640 * 640);
    assert_eq!(input.byte_size(), 2 * 3 * 640 * 640 * 4);
    assert_eq!(output.index(), 1);
    assert_eq!(output.element_count(), 2 * 25200 * 85);
    assert_eq!(num_classes(&output), 80);
  }

  #[test]
  fn rejects_missing_or_extra_bindings() {
    let only_input = vec![BindingDesc::input("images", vec![1, 3, 640, 640])];
    assert_eq!(
      validate_bindings(&only_input).unwrap_err().code(),
      ResultCode::ModelError
    );

    let mut extra = yolo_descs();
    extra.push(BindingDesc::output("aux", vec![2, 10, 85]));
    assert_eq!(validate_bindings(&extra).unwrap_err().code(), ResultCode::ModelError);
  }

  #[test]
  fn rejects_unexpected_shapes() {
    let cases = [
      vec![
        BindingDesc::input("images", vec![1, 1, 640, 640]),
        BindingDesc::output("output", vec![1, 25200, 85]),
      ],
      vec![
        BindingDesc::input("images", vec![1, 3, 640, 640]),
        BindingDesc::output("output", vec![1, 25200, 5]),
      ],
      vec![
        BindingDesc::input("images", vec![1, 3, 640, 640]),
        BindingDesc::output("output", vec![2, 25200, 85]),
      ],
      vec![
        BindingDesc::input("images", vec![-1, 3, 640, 640]),
        BindingDesc::output("output", vec![1, 25200, 85]),
      ],
    ];
    for descs in cases {
      assert_eq!(validate_bindings(&descs).unwrap_err().code(), ResultCode::ModelError);
    }
  }
}
