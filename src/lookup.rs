//! The lookup pipeline: acquire a position, ask the backend, parse the reply.

use crate::api::RequestError;
use crate::insights::InsightRequester;
use crate::location::{GeolocationError, Geolocator};
use crate::models::{Coordinates, GroundingSource, LocationData};
use crate::parser::{self, ParseError};
use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Every way a lookup cycle can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("geolocation unsupported")]
    GeolocationUnsupported,
    #[error("location permission denied")]
    PermissionDenied,
    #[error("geolocation timed out")]
    GeolocationTimeout,
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
    #[error("backend unreachable: {0}")]
    BackendNetworkError(String),
    #[error("{0}")]
    BackendError(String),
    #[error("no JSON found in backend reply")]
    NoJsonFound,
    #[error("malformed JSON in backend reply: {0}")]
    MalformedJson(String),
}

impl LookupError {
    /// Short message shown in the error banner.
    pub fn user_message(&self) -> &'static str {
        match self {
            LookupError::GeolocationUnsupported => "您的设备不支持地理定位功能",
            LookupError::PermissionDenied => "无法获取位置权限: 您拒绝了定位请求",
            LookupError::GeolocationTimeout => "获取位置超时，请重试",
            LookupError::PositionUnavailable(_) => "暂时无法确定您的位置",
            LookupError::BackendNetworkError(_) => "无法连接到 AI 服务，请检查网络连接",
            LookupError::BackendError(_) => "AI 服务返回错误，请稍后重试",
            LookupError::NoJsonFound => "AI 未返回地理资讯，请重试",
            LookupError::MalformedJson(_) => "无法解析地理资讯，请重试",
        }
    }
}

impl From<GeolocationError> for LookupError {
    fn from(e: GeolocationError) -> Self {
        match e {
            GeolocationError::Unsupported => Self::GeolocationUnsupported,
            GeolocationError::PermissionDenied => Self::PermissionDenied,
            GeolocationError::Timeout(_) => Self::GeolocationTimeout,
            GeolocationError::PositionUnavailable(msg) => Self::PositionUnavailable(msg),
        }
    }
}

impl From<RequestError> for LookupError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Network(msg) => Self::BackendNetworkError(msg),
            err @ RequestError::Backend { .. } => Self::BackendError(err.to_string()),
        }
    }
}

impl From<ParseError> for LookupError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::NoJsonFound => Self::NoJsonFound,
            ParseError::MalformedJson { reason, .. } => Self::MalformedJson(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupReport {
    pub coords: Coordinates,
    pub data: LocationData,
    pub sources: Vec<GroundingSource>,
    pub raw_text: String,
    pub completed_at: DateTime<Local>,
}

/// A failed cycle. Whatever was gathered before the failure is kept so the
/// view can still show coordinates, citations and the raw reply.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupFailure {
    pub error: LookupError,
    pub coords: Option<Coordinates>,
    pub sources: Vec<GroundingSource>,
    pub raw_text: Option<String>,
}

impl LookupFailure {
    fn new(error: LookupError) -> Self {
        Self {
            error,
            coords: None,
            sources: Vec::new(),
            raw_text: None,
        }
    }
}

pub type LookupOutcome = Result<LookupReport, LookupFailure>;

pub struct Lookup {
    geolocator: Geolocator,
    requester: InsightRequester,
}

impl Lookup {
    pub fn new(geolocator: Geolocator, requester: InsightRequester) -> Self {
        Self {
            geolocator,
            requester,
        }
    }

    /// Runs one full cycle. Never panics on bad backend output; every
    /// failure comes back as a [`LookupFailure`].
    pub async fn run(&self) -> LookupOutcome {
        let coords = match self.geolocator.acquire().await {
            Ok(coords) => coords,
            Err(e) => {
                warn!("Geolocation failed: {}", e);
                return Err(LookupFailure::new(e.into()));
            }
        };

        let insights = match self.requester.request_insights(coords).await {
            Ok(insights) => insights,
            Err(e) => {
                error!("Backend request failed: {}", e);
                return Err(LookupFailure {
                    coords: Some(coords),
                    ..LookupFailure::new(e.into())
                });
            }
        };

        match parser::parse(&insights.raw_text) {
            Ok(data) => {
                debug!("Raw response: {}", insights.raw_text);
                info!(
                    "Lookup complete: {} ({} attraction(s))",
                    data.location_name,
                    data.attractions.len()
                );
                Ok(LookupReport {
                    coords,
                    data,
                    sources: insights.sources,
                    raw_text: insights.raw_text,
                    completed_at: Local::now(),
                })
            }
            Err(e) => {
                warn!("Failed to parse backend reply: {}", e);
                warn!("Raw response: {}", insights.raw_text);
                Err(LookupFailure {
                    error: e.into(),
                    coords: Some(coords),
                    sources: insights.sources,
                    raw_text: Some(insights.raw_text),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_failure_has_a_distinct_message() {
        let errors = [
            LookupError::GeolocationUnsupported,
            LookupError::PermissionDenied,
            LookupError::GeolocationTimeout,
            LookupError::PositionUnavailable(String::new()),
            LookupError::BackendNetworkError(String::new()),
            LookupError::BackendError(String::new()),
            LookupError::NoJsonFound,
            LookupError::MalformedJson(String::new()),
        ];
        let mut messages: Vec<_> = errors.iter().map(LookupError::user_message).collect();
        messages.sort_unstable();
        messages.dedup();
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn component_errors_map_onto_taxonomy() {
        assert_eq!(
            LookupError::from(GeolocationError::Timeout(std::time::Duration::from_secs(10))),
            LookupError::GeolocationTimeout
        );
        assert_eq!(
            LookupError::from(RequestError::Network("refused".into())),
            LookupError::BackendNetworkError("refused".into())
        );
        assert!(matches!(
            LookupError::from(RequestError::backend("quota")),
            LookupError::BackendError(msg) if msg.contains("quota")
        ));
        assert_eq!(LookupError::from(ParseError::NoJsonFound), LookupError::NoJsonFound);
    }
}
