// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/input/csv_landmark.rs - CSV 关键点录制文件输入
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

use std::fs::File;

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::LandmarkSample, service::PredictRequest};

#[derive(Error, Debug)]
pub enum CsvLandmarkInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("CSV 错误: {0}")]
  CsvError(#[from] csv::Error),
}

/// 每行若干数值列，末列若不是数值则视为标注标签。
///
/// 与训练数据同样的格式，可以直接回放训练集。
/// 整行没有任何数值列（例如表头）时跳过该行。
pub struct CsvLandmarkInput {
  records: StringRecordsIntoIter<File>,
  index: usize,
}

impl FromUrlWithScheme for CsvLandmarkInput {
  const SCHEME: &'static str = "csv";
}

impl FromUrl for CsvLandmarkInput {
  type Error = CsvLandmarkInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(CsvLandmarkInputError::SchemeMismatch);
    }

    info!("打开 CSV 输入: {}", url.path());
    let reader = ReaderBuilder::new()
      .has_headers(false)
      .flexible(true)
      .from_path(url.path())?;

    Ok(CsvLandmarkInput {
      records: reader.into_records(),
      index: 0,
    })
  }
}

fn parse_record(record: &StringRecord) -> Option<(Vec<f32>, Option<String>)> {
  let fields: Vec<&str> = record.iter().map(str::trim).collect();
  let (last, rest) = fields.split_last()?;

  let (numeric, expected) = match last.parse::<f32>() {
    Ok(_) => (fields.as_slice(), None),
    Err(_) if last.is_empty() => (rest, None),
    Err(_) => (rest, Some(last.to_string())),
  };
  if numeric.is_empty() {
    return None;
  }

  let landmarks = numeric
    .iter()
    .map(|field| field.parse::<f32>().ok())
    .collect::<Option<Vec<f32>>>()?;
  Some((landmarks, expected))
}

impl Iterator for CsvLandmarkInput {
  type Item = LandmarkSample;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let record = match self.records.next()? {
        Ok(record) => record,
        Err(e) => {
          warn!("读取 CSV 行失败, 跳过: {}", e);
          continue;
        }
      };

      match parse_record(&record) {
        Some((landmarks, expected)) => {
          self.index += 1;
          return Some(LandmarkSample {
            index: self.index,
            request: PredictRequest::from_landmarks(landmarks),
            expected,
          });
        }
        None => debug!("跳过非数值行: {:?}", record.position().map(|p| p.line())),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn reads_labelled_and_unlabelled_rows() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "x0,x1,x2,label").unwrap();
    writeln!(file, "0.1,0.2,0.3,NO").unwrap();
    writeln!(file, "0.4,0.5,0.6").unwrap();
    writeln!(file, "0.7,bad,0.9,YES").unwrap();
    writeln!(file, "1.0,1.1,1.2,THANK YOU").unwrap();
    file.flush().unwrap();

    let url = Url::parse(&format!("csv://{}", file.path().display())).unwrap();
    let samples: Vec<_> = CsvLandmarkInput::from_url(&url).unwrap().collect();

    assert_eq!(samples.len(), 3);
    assert_eq!(samples[0].index, 1);
    assert_eq!(samples[0].expected.as_deref(), Some("NO"));
    assert_eq!(samples[0].request.landmarks, Some(vec![0.1, 0.2, 0.3]));
    assert_eq!(samples[1].expected, None);
    assert_eq!(samples[1].request.landmarks, Some(vec![0.4, 0.5, 0.6]));
    assert_eq!(samples[2].index, 3);
    assert_eq!(samples[2].expected.as_deref(), Some("THANK YOU"));
  }

  #[test]
  fn other_scheme_is_rejected() {
    let url = Url::parse("jsonl:///tmp/none.jsonl").unwrap();
    assert!(matches!(
      CsvLandmarkInput::from_url(&url),
      Err(CsvLandmarkInputError::SchemeMismatch)
    ));
  }
}
