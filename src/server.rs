// 该文件是 Shouyu （手语摩斯） 项目的一部分。
// src/server.rs - HTTP 推理接口
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

use axum::{
  Json, Router,
  body::Bytes,
  extract::{Query, State},
  http::StatusCode,
  routing::{get, post},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
  morse,
  service::{PredictRequest, PredictionResult, SignService},
};

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
  pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
  pub status: String,
  pub service: String,
  pub version: String,
  pub layout_width: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct MorseQuery {
  pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MorseRequest {
  pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MorseResponse {
  pub morse: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecodeRequest {
  pub morse: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecodeResponse {
  pub text: String,
}

/// 构造全部路由，跨域策略放开给浏览器前端
pub fn router(service: SignService) -> Router {
  Router::new()
    .route("/", get(root))
    .route("/health", get(health))
    .route("/predict-sign", post(predict_sign))
    .route("/morse", post(text_to_morse))
    .route("/morse/decode", post(morse_to_text))
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http())
    .with_state(service)
}

async fn root() -> Json<StatusResponse> {
  Json(StatusResponse {
    status: "API running".to_string(),
  })
}

async fn health(State(service): State<SignService>) -> Json<HealthResponse> {
  Json(HealthResponse {
    status: "healthy".to_string(),
    service: env!("CARGO_PKG_NAME").to_string(),
    version: env!("CARGO_PKG_VERSION").to_string(),
    layout_width: service.layout().width(),
  })
}

/// 形状错误与低置信度都返回 200 和哨兵结果
async fn predict_sign(
  State(service): State<SignService>,
  Json(request): Json<PredictRequest>,
) -> Json<PredictionResult> {
  let fallback = service.no_detection();
  let result = tokio::task::spawn_blocking(move || service.predict_request(&request)).await;
  match result {
    Ok(prediction) => Json(prediction),
    Err(e) => {
      error!("推理任务异常退出: {}", e);
      Json(fallback)
    }
  }
}

/// 文本既可以放在查询参数 `text` 中，也可以放在 JSON 请求体中
async fn text_to_morse(
  Query(query): Query<MorseQuery>,
  body: Bytes,
) -> Result<Json<MorseResponse>, (StatusCode, String)> {
  let text = match query.text {
    Some(text) => text,
    None if body.is_empty() => String::new(),
    None => {
      serde_json::from_slice::<MorseRequest>(&body)
        .map_err(|e| {
          warn!("摩斯请求解析失败: {}", e);
          (StatusCode::BAD_REQUEST, e.to_string())
        })?
        .text
    }
  };

  Ok(Json(MorseResponse {
    morse: morse::encode(&text),
  }))
}

async fn morse_to_text(Json(request): Json<DecodeRequest>) -> Json<DecodeResponse> {
  Json(DecodeResponse {
    text: morse::decode(&request.morse),
  })
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("无法监听中断信号: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到中断信号，准备退出...");
}

/// 在给定监听器上运行服务直到收到 Ctrl-C
pub async fn serve(listener: TcpListener, service: SignService) -> Result<(), ServerError> {
  info!("服务监听于 {}", listener.local_addr()?);
  axum::serve(listener, router(service))
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!("服务已停止");
  Ok(())
}
