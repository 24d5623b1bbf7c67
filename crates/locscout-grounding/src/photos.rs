//! Venue photo lookup through the Google Places web service.

use std::time::Duration;

use async_trait::async_trait;
use locscout_core::LocationCandidate;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::GroundingError;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";
const MAX_PHOTOS: usize = 5;

/// Photo URLs for one venue. `place_id` is set when the lookup had to resolve
/// it from the venue's name and address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacePhotos {
    pub urls: Vec<String>,
    pub attributions: Vec<String>,
    pub place_id: Option<String>,
}

impl PlacePhotos {
    /// Copies the photos onto `candidate`, filling in a resolved place id.
    pub fn attach(self, candidate: &mut LocationCandidate) {
        candidate.photo_urls = self.urls;
        candidate.photo_attributions = self.attributions;
        if candidate.google_place_id.is_none() {
            candidate.google_place_id = self.place_id;
        }
    }
}

#[async_trait]
pub trait PhotoLookup: Send + Sync {
    /// `prefer_interior` skips the leading photo, which is usually a facade,
    /// when enough photos exist.
    ///
    /// # Errors
    ///
    /// Returns [`GroundingError`] only when no request could be built at all.
    /// Provider failures degrade to fewer or no photos.
    async fn photos_for(
        &self,
        candidate: &LocationCandidate,
        prefer_interior: bool,
    ) -> Result<PlacePhotos, GroundingError>;
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    result: Option<DetailsResult>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailsResult {
    #[serde(default)]
    photos: Vec<PlacePhoto>,
}

#[derive(Debug, Deserialize)]
struct PlacePhoto {
    #[serde(default)]
    photo_reference: Option<String>,
    #[serde(default)]
    html_attributions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FindPlaceResponse {
    #[serde(default)]
    candidates: Vec<FoundPlace>,
}

#[derive(Debug, Deserialize)]
struct FoundPlace {
    #[serde(default)]
    place_id: Option<String>,
}

fn select_photos(photos: &[PlacePhoto], prefer_interior: bool) -> &[PlacePhoto] {
    if prefer_interior && photos.len() > 3 {
        &photos[1..photos.len().min(MAX_PHOTOS + 1)]
    } else {
        &photos[..photos.len().min(MAX_PHOTOS)]
    }
}

/// Place Details photos with a Street View fallback.
pub struct GooglePlacesPhotos {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GooglePlacesPhotos {
    /// # Errors
    ///
    /// Returns [`GroundingError::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, GroundingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Points the client at a different host. Used by tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn url(
        &self,
        path: &str,
        endpoint: &'static str,
        params: &[(&str, &str)],
    ) -> Result<Url, GroundingError> {
        let mut all: Vec<(&str, &str)> = params.to_vec();
        all.push(("key", self.api_key.as_str()));
        Url::parse_with_params(&format!("{}/{path}", self.base_url), &all).map_err(|e| {
            GroundingError::InvalidUrl {
                endpoint,
                reason: e.to_string(),
            }
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        endpoint: &'static str,
    ) -> Result<T, GroundingError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GroundingError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint,
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| GroundingError::Deserialize {
            context: endpoint,
            source,
        })
    }

    async fn find_place_id(&self, candidate: &LocationCandidate) -> Result<Option<String>, GroundingError> {
        let input = format!("{} {}", candidate.venue_name, candidate.formatted_address);
        let url = self.url(
            "place/findplacefromtext/json",
            "find place",
            &[
                ("input", input.trim()),
                ("inputtype", "textquery"),
                ("fields", "place_id"),
            ],
        )?;
        let found: FindPlaceResponse = self.get_json(url, "find place").await?;
        Ok(found
            .candidates
            .into_iter()
            .find_map(|c| c.place_id.filter(|id| !id.is_empty())))
    }

    async fn place_photos(
        &self,
        place_id: &str,
        prefer_interior: bool,
    ) -> Result<(Vec<String>, Vec<String>), GroundingError> {
        let url = self.url(
            "place/details/json",
            "place details",
            &[("place_id", place_id), ("fields", "photos")],
        )?;
        let details: DetailsResponse = self.get_json(url, "place details").await?;
        let photos = details.result.unwrap_or_default().photos;

        let mut urls = Vec::new();
        let mut attributions = Vec::new();
        for photo in select_photos(&photos, prefer_interior) {
            let Some(reference) = photo.photo_reference.as_deref() else {
                continue;
            };
            let url = self.url(
                "place/photo",
                "place photo",
                &[("maxwidth", "800"), ("photo_reference", reference)],
            )?;
            urls.push(url.to_string());
            attributions.extend(photo.html_attributions.iter().cloned());
        }
        Ok((urls, attributions))
    }

    fn street_view(&self, candidate: &LocationCandidate) -> Result<Option<String>, GroundingError> {
        if candidate.latitude.abs() < f64::EPSILON || candidate.longitude.abs() < f64::EPSILON {
            return Ok(None);
        }
        let location = format!("{},{}", candidate.latitude, candidate.longitude);
        let url = self.url(
            "streetview",
            "street view",
            &[
                ("size", "800x600"),
                ("location", location.as_str()),
                ("fov", "90"),
                ("pitch", "0"),
            ],
        )?;
        Ok(Some(url.to_string()))
    }
}

#[async_trait]
impl PhotoLookup for GooglePlacesPhotos {
    async fn photos_for(
        &self,
        candidate: &LocationCandidate,
        prefer_interior: bool,
    ) -> Result<PlacePhotos, GroundingError> {
        let mut photos = PlacePhotos::default();

        let place_id = match candidate.google_place_id.clone() {
            Some(id) => Some(id),
            None => match self.find_place_id(candidate).await {
                Ok(found) => {
                    photos.place_id.clone_from(&found);
                    found
                }
                Err(e) => {
                    tracing::debug!(venue = %candidate.venue_name, error = %e, "find place failed");
                    None
                }
            },
        };

        if let Some(place_id) = place_id {
            match self.place_photos(&place_id, prefer_interior).await {
                Ok((urls, attributions)) => {
                    photos.urls = urls;
                    photos.attributions = attributions;
                }
                Err(e) => {
                    tracing::warn!(venue = %candidate.venue_name, error = %e, "place details failed");
                }
            }
        }

        if photos.urls.is_empty() {
            if let Some(url) = self.street_view(candidate)? {
                tracing::debug!(venue = %candidate.venue_name, "using street view fallback");
                photos.urls.push(url);
            }
        }
        Ok(photos)
    }
}
