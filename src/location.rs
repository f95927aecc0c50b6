//! User location resolution for GeoGuide.
//!
//! [`Geolocator`] turns the configured [`PositionSource`] into a single
//! async `acquire` call with browser-like semantics: a session permission
//! gate, a query timeout and an optional maximum age for a previously
//! obtained fix. Sources available out of the box are IP geolocation
//! ([`IpPositionSource`]) and fixed coordinates ([`ManualPositionSource`]).

use crate::config::{IpService, LocationConfig, LocationMode};
use crate::models::Coordinates;
use async_trait::async_trait;
use ipgeolocate::{Locator, Service};
use reqwest::Client;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("geolocation is not supported on this system")]
    Unsupported,
    #[error("location permission denied")]
    PermissionDenied,
    #[error("timed out after {0:?} waiting for a position")]
    Timeout(Duration),
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    /// Zero means a fresh query every time.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_millis(10_000),
            maximum_age: Duration::ZERO,
        }
    }
}

impl From<&LocationConfig> for PositionOptions {
    fn from(cfg: &LocationConfig) -> Self {
        Self {
            enable_high_accuracy: cfg.enable_high_accuracy,
            timeout: Duration::from_millis(cfg.timeout_ms),
            maximum_age: Duration::from_millis(cfg.maximum_age_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Prompt,
    Granted,
    Denied,
}

/// Something that can produce the current position.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, GeolocationError>;
}

/// Asks the user whether location access is allowed.
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    async fn ask(&self) -> bool;
}

pub struct Geolocator {
    source: Option<Box<dyn PositionSource>>,
    options: PositionOptions,
    prompt: Arc<dyn PermissionPrompt>,
    permission: Mutex<PermissionState>,
    last_fix: Mutex<Option<(Instant, Coordinates)>>,
}

impl Geolocator {
    /// A `None` source means the host has no geolocation capability.
    pub fn new(
        source: Option<Box<dyn PositionSource>>,
        options: PositionOptions,
        permission: PermissionState,
        prompt: Arc<dyn PermissionPrompt>,
    ) -> Self {
        Self {
            source,
            options,
            prompt,
            permission: Mutex::new(permission),
            last_fix: Mutex::new(None),
        }
    }

    /// Builds the geolocator described by `[location]` in `config.toml`.
    pub fn from_config(cfg: &LocationConfig, prompt: Arc<dyn PermissionPrompt>) -> Self {
        let source: Option<Box<dyn PositionSource>> = match cfg.mode {
            LocationMode::Ip => Some(Box::new(IpPositionSource::new(
                cfg.ip_service,
                cfg.public_ip_url.clone(),
            ))),
            LocationMode::Manual => Some(Box::new(ManualPositionSource::new(
                cfg.manual_lat,
                cfg.manual_lon,
            ))),
            LocationMode::Disabled => None,
        };
        Self::new(source, cfg.into(), cfg.permission, prompt)
    }

    pub fn permission(&self) -> PermissionState {
        *self.permission.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn acquire(&self) -> Result<Coordinates, GeolocationError> {
        let Some(source) = self.source.as_ref() else {
            warn!("Geolocation requested but no position source is configured");
            return Err(GeolocationError::Unsupported);
        };

        self.check_permission().await?;

        if let Some(coords) = self.cached_fix() {
            debug!("Reusing cached fix ({}, {})", coords.latitude, coords.longitude);
            return Ok(coords);
        }

        debug!(
            "Querying position (high accuracy: {}, timeout: {:?})",
            self.options.enable_high_accuracy, self.options.timeout
        );
        let coords = tokio::time::timeout(
            self.options.timeout,
            source.current_position(&self.options),
        )
        .await
        .map_err(|_| GeolocationError::Timeout(self.options.timeout))??;

        *self.last_fix.lock().unwrap_or_else(|e| e.into_inner()) = Some((Instant::now(), coords));
        info!("Position acquired - ({}, {})", coords.latitude, coords.longitude);
        Ok(coords)
    }

    async fn check_permission(&self) -> Result<(), GeolocationError> {
        match self.permission() {
            PermissionState::Granted => Ok(()),
            PermissionState::Denied => Err(GeolocationError::PermissionDenied),
            PermissionState::Prompt => {
                let granted = self.prompt.ask().await;
                let state = if granted {
                    PermissionState::Granted
                } else {
                    PermissionState::Denied
                };
                info!("Location permission answered: {:?}", state);
                *self.permission.lock().unwrap_or_else(|e| e.into_inner()) = state;
                if granted {
                    Ok(())
                } else {
                    Err(GeolocationError::PermissionDenied)
                }
            }
        }
    }

    fn cached_fix(&self) -> Option<Coordinates> {
        if self.options.maximum_age.is_zero() {
            return None;
        }
        let last_fix = *self.last_fix.lock().unwrap_or_else(|e| e.into_inner());
        last_fix
            .filter(|(at, _)| at.elapsed() <= self.options.maximum_age)
            .map(|(_, coords)| coords)
    }
}

/// Geolocates the host's public IP address.
pub struct IpPositionSource {
    client: Client,
    service: IpService,
    public_ip_url: String,
}

impl IpPositionSource {
    pub fn new(service: IpService, public_ip_url: String) -> Self {
        Self {
            client: Client::new(),
            service,
            public_ip_url,
        }
    }

    async fn public_ip(&self) -> Result<String, GeolocationError> {
        let ip = self
            .client
            .get(&self.public_ip_url)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| GeolocationError::PositionUnavailable(e.to_string()))?
            .text()
            .await
            .map_err(|e| GeolocationError::PositionUnavailable(e.to_string()))?;
        Ok(ip.trim().to_string())
    }
}

#[async_trait]
impl PositionSource for IpPositionSource {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        if options.enable_high_accuracy {
            debug!("High accuracy requested; IP geolocation is city-level at best");
        }
        let ip = self.public_ip().await?;

        match Locator::get(&ip, service_for(self.service)).await {
            Ok(loc) => {
                let lat = loc.latitude.parse::<f64>().ok();
                let lon = loc.longitude.parse::<f64>().ok();
                lat.zip(lon)
                    .and_then(|(lat, lon)| Coordinates::new(lat, lon))
                    .ok_or_else(|| {
                        GeolocationError::PositionUnavailable(format!(
                            "service returned unusable coordinates ({}, {})",
                            loc.latitude, loc.longitude
                        ))
                    })
            }
            Err(e) => {
                error!("Error using geolocation service: {}", e);
                Err(GeolocationError::PositionUnavailable(e.to_string()))
            }
        }
    }
}

fn service_for(service: IpService) -> Service {
    match service {
        IpService::IpApi => Service::IpApi,
        IpService::IpApiCo => Service::IpApiCo,
        IpService::IpWhois => Service::IpWhois,
        IpService::FreeGeoIp => Service::FreeGeoIp,
    }
}

/// Fixed coordinates from the config file.
pub struct ManualPositionSource {
    latitude: f64,
    longitude: f64,
}

impl ManualPositionSource {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[async_trait]
impl PositionSource for ManualPositionSource {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        Coordinates::new(self.latitude, self.longitude).ok_or_else(|| {
            GeolocationError::PositionUnavailable(format!(
                "manual coordinates out of range ({}, {})",
                self.latitude, self.longitude
            ))
        })
    }
}
