// 该文件是 Beifeng （北风） 项目的一部分。
// src/task.rs - 检测任务
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

use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};
use std::thread;

use tracing::{info, warn};

use crate::detector::Detector;
use crate::frame::{HostImage, InputImage};
use crate::input::Frame;
use crate::output::Render;

pub trait Task<I, O>: Sized {
  type Error;
  fn run_task(self, input: I, detector: &mut Detector, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一帧
pub struct OneShotTask;

impl<RE, I, O> Task<I, O> for OneShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: &mut Detector, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let image = frame.to_host_image();
    let detections = detector.detect(&image)?;
    let elapsed = now.elapsed();
    info!("推理完成，检测到 {} 个目标，耗时: {:.2?}", detections.len(), elapsed);
    output.render_result(&frame, &detections, None)?;
    info!("渲染完成");

    Ok(())
  }
}

/// 按引擎的最大批次成批处理所有输入帧，直到输入耗尽、达到帧数上限或收到 Ctrl-C
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理函数；每个进程只能安装一次
  pub fn with_interrupt_handler(mut self) -> Self {
    self.handle_interrupt = true;
    self
  }

  fn interrupt_channel(&self) -> anyhow::Result<Option<Receiver<()>>> {
    if !self.handle_interrupt {
      return Ok(None);
    }

    let (tx, rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(Some(rx))
  }
}

impl<RE, I, O> Task<I, O> for ContinuousTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: &mut Detector, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let interrupt = self.interrupt_channel()?;
    let batch = detector.batch_size().max(1);
    info!("每批处理 {} 帧", batch);

    let mut processed = 0usize;
    loop {
      let limit = match self.frame_number {
        Some(n) if processed >= n => {
          info!("达到指定帧数 {}, 退出任务循环", processed);
          break;
        }
        Some(n) => batch.min(n - processed),
        None => batch,
      };

      let frames: Vec<Frame> = input.by_ref().take(limit).collect();
      if frames.is_empty() {
        break;
      }

      let now = Instant::now();
      let images: Vec<HostImage> = frames.iter().map(Frame::to_host_image).collect();
      let inputs: Vec<InputImage<'_>> = images.iter().map(InputImage::from).collect();
      let results = detector.detect_batch(&inputs)?;
      let elapsed_a = now.elapsed();

      let fps = (frames.len() as f64 / elapsed_a.as_secs_f64().max(1e-6)).round() as u32;
      for (frame, detections) in frames.iter().zip(results.iter()) {
        output.render_result(frame, detections, Some(fps))?;
      }
      let elapsed_b = now.elapsed();
      processed += frames.len();
      info!(
        "第 {} 帧处理完成，推理耗时: {:.2?} / {:.2?}",
        processed, elapsed_a, elapsed_b
      );

      if interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", processed);
    Ok(())
  }
}
