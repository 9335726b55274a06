// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/task.rs - 回放任务
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
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::{
  input::LandmarkSample,
  output::Render,
  service::{PredictionResult, SignService},
};

pub trait Task<I, O>: Sized {
  type Error;
  fn run_task(self, input: I, service: &SignService, output: O) -> Result<TaskSummary, Self::Error>;
}

/// 任务统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
  pub processed: usize,
  pub accepted: usize,
  pub labelled: usize,
  pub matched: usize,
}

impl TaskSummary {
  fn record(&mut self, sample: &LandmarkSample, result: &PredictionResult, sentinel: &str) {
    self.processed += 1;
    if result.prediction != sentinel {
      self.accepted += 1;
    }
    if let Some(expected) = sample.expected.as_deref() {
      self.labelled += 1;
      if expected == result.prediction {
        self.matched += 1;
      }
    }
  }

  /// 带标注样本上的准确率
  pub fn accuracy(&self) -> Option<f32> {
    (self.labelled > 0).then(|| self.matched as f32 / self.labelled as f32)
  }
}

fn process_sample<O, RE>(
  mut sample: LandmarkSample,
  service: &SignService,
  output: &O,
  summary: &mut TaskSummary,
) -> Result<(), anyhow::Error>
where
  O: Render<LandmarkSample, PredictionResult, Error = RE>,
  RE: std::error::Error + Sync + Send + 'static,
{
  // 标注可能是同义词，统一成规范标签再与预测比较
  if let Some(expected) = sample.expected.take() {
    sample.expected = Some(service.config().synonyms().canonical(&expected).to_string());
  }

  let now = Instant::now();
  let result = service.predict_request(&sample.request);
  let elapsed_a = now.elapsed();
  output.render_result(&sample, &result)?;
  let elapsed_b = now.elapsed();
  debug!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);

  summary.record(&sample, &result, service.config().sentinel());
  Ok(())
}

pub struct OneShotTask;

impl<RE, I, O> Task<I, O> for OneShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = LandmarkSample>,
  O: Render<LandmarkSample, PredictionResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, service: &SignService, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let sample = input.next().ok_or_else(|| anyhow::anyhow!("没有输入样本"))?;
    let mut summary = TaskSummary::default();
    process_sample(sample, service, &output, &mut summary)?;
    info!("任务完成，退出");
    Ok(summary)
  }
}

/// 逐条处理输入，直到输入耗尽、达到指定条数或收到中断信号
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  interrupt: Option<Receiver<()>>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 中断信号的接收端，通常由 Ctrl-C 处理函数发送
  pub fn with_interrupt(mut self, interrupt: Receiver<()>) -> Self {
    self.interrupt = Some(interrupt);
    self
  }

  fn interrupted(&self) -> bool {
    self
      .interrupt
      .as_ref()
      .map(|rx| rx.try_recv().is_ok())
      .unwrap_or(false)
  }
}

impl<RE, I, O> Task<I, O> for ContinuousTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = LandmarkSample>,
  O: Render<LandmarkSample, PredictionResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, service: &SignService, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let mut summary = TaskSummary::default();
    for sample in input {
      debug!("处理第 {} 条样本", sample.index);
      process_sample(sample, service, &output, &mut summary)?;

      if self
        .frame_number
        .map(|n| summary.processed >= n)
        .unwrap_or(false)
      {
        info!("达到指定条数 {}, 退出任务循环", summary.processed);
        break;
      }
      if self.interrupted() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!(
      "任务完成: 处理 {} 条, 接受 {} 条, 标注 {} 条, 命中 {} 条",
      summary.processed, summary.accepted, summary.labelled, summary.matched
    );
    Ok(summary)
  }
}
