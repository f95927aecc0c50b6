//! Builds the grounded location prompt and collects the reply.

use crate::api::{
    Content, GenerateContentRequest, GenerateContentResponse, InsightBackend, LatLng, Part,
    RequestError, RetrievalConfig, Tool, ToolConfig,
};
use crate::models::{Coordinates, GroundingSource};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Raw model text plus the citations attached to it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Insights {
    pub raw_text: String,
    pub sources: Vec<GroundingSource>,
}

pub struct InsightRequester {
    backend: Arc<dyn InsightBackend>,
}

impl InsightRequester {
    pub fn new(backend: Arc<dyn InsightBackend>) -> Self {
        Self { backend }
    }

    pub async fn request_insights(&self, coords: Coordinates) -> Result<Insights, RequestError> {
        let request = build_request(coords);
        debug!(
            "Requesting insights for ({}, {})",
            coords.latitude, coords.longitude
        );

        let response = self.backend.generate(&request).await?;
        if !response.search_queries().is_empty() {
            debug!("Grounding queries: {:?}", response.search_queries());
        }
        let insights = Insights {
            raw_text: response.text(),
            sources: extract_sources(&response),
        };

        if insights.raw_text.is_empty() {
            warn!(
                "Backend returned no text (finish reason: {})",
                response.finish_reason().unwrap_or("unknown")
            );
        } else {
            info!(
                "Backend replied with {} chars and {} source(s)",
                insights.raw_text.chars().count(),
                insights.sources.len()
            );
        }
        Ok(insights)
    }
}

pub fn build_request(coords: Coordinates) -> GenerateContentRequest {
    // responseSchema / responseMimeType can't be combined with tools, so the
    // JSON shape is only asked for in the prompt.
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(prompt(coords)),
            }],
        }],
        tools: vec![Tool::GoogleSearch {}, Tool::GoogleMaps {}],
        tool_config: Some(ToolConfig {
            retrieval_config: RetrievalConfig {
                lat_lng: LatLng {
                    latitude: coords.latitude,
                    longitude: coords.longitude,
                },
            },
        }),
    }
}

pub fn prompt(coords: Coordinates) -> String {
    format!(
        r#"我现在的位置是 Latitude: {lat}, Longitude: {lon}.

请利用 Google Search 和 Google Maps 帮我完成以下任务:
1. 确认我现在所在的具体地名和街道 (Address & Location Name).
2. 搜寻此位置现在的实时天气 (Temperature, Condition, Wind Speed, Wind Direction).
3. 搜寻附近 4-5 个值得去的景点或地标.
4. 对于每个景点，请计算或估计它相对于我现在的方位的方向 (例如: 东北, 南, 西北) 和大约距离.

请以纯 JSON 格式输出结果，格式如下 (不要包含任何 markdown 格式以外的文字):
```json
{{
  "locationName": "当前地名",
  "address": "当前完整地址",
  "weather": {{
    "temperature": "25°C",
    "condition": "多云",
    "windSpeed": "15 km/h",
    "windDirection": "西北"
  }},
  "attractions": [
    {{
      "name": "景点名称",
      "description": "简短描述 (20字以内)",
      "bearing": "方向 (例如: 东北)",
      "distance": "距离 (例如: 500m)",
      "type": "类别 (例如: 公园, 餐厅, 博物馆)"
    }}
  ]
}}
```"#,
        lat = coords.latitude,
        lon = coords.longitude
    )
}

/// One source per web or maps citation that has both a title and a URI.
pub fn extract_sources(response: &GenerateContentResponse) -> Vec<GroundingSource> {
    let Some(metadata) = response
        .candidates
        .first()
        .and_then(|c| c.grounding_metadata.as_ref())
    else {
        return Vec::new();
    };

    metadata
        .grounding_chunks
        .iter()
        .flat_map(|chunk| [chunk.web.as_ref(), chunk.maps.as_ref()])
        .flatten()
        .filter_map(|citation| {
            let title = citation.title.as_deref().filter(|t| !t.is_empty())?;
            let uri = citation.uri.as_deref().filter(|u| !u.is_empty())?;
            Some(GroundingSource {
                title: title.to_string(),
                uri: uri.to_string(),
            })
        })
        .collect()
}
