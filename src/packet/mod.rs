//! Packet backend implementation over the provider's REST API.

mod error;
mod wire;

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::backend::{
    Backend, BackendFuture, Device, DeviceRequest, Organization, Project, ProjectRequest,
};
use wire::{CreateDeviceBody, CreateProjectBody, DeviceBody, OrganizationList, ProjectBody};

pub use error::PacketBackendError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const ORGANIZATIONS_PER_PAGE: u32 = 100;

/// Most organization pages fetched while authenticating.
pub const MAX_ORGANIZATION_PAGES: u32 = 100;

/// Backend that talks to the Packet API with an `X-Auth-Token` credential.
#[derive(Clone, Debug)]
pub struct PacketBackend {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl PacketBackend {
    /// Constructs a backend for the given API base URL and credential.
    ///
    /// # Errors
    ///
    /// Returns [`PacketBackendError::Config`] when either value is blank or
    /// the HTTP client cannot be built.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, PacketBackendError> {
        let base_url = api_url.into().trim().trim_end_matches('/').to_owned();
        let token = api_key.into().trim().to_owned();
        if base_url.is_empty() {
            return Err(PacketBackendError::Config(String::from("API URL is empty")));
        }
        if token.is_empty() {
            return Err(PacketBackendError::Config(String::from("API key is empty")));
        }

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| PacketBackendError::Config(err.to_string()))?;

        Ok(Self {
            http,
            api_url: base_url,
            api_key: token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("Accept", "application/json")
            .header("X-Auth-Token", &self.api_key)
    }

    async fn send(action: &str, builder: RequestBuilder) -> Result<Response, PacketBackendError> {
        let response = builder
            .send()
            .await
            .map_err(|err| PacketBackendError::Transport {
                action: action.to_owned(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(PacketBackendError::Api {
            action: action.to_owned(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_owned(),
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        action: &str,
        builder: RequestBuilder,
    ) -> Result<T, PacketBackendError> {
        let response = Self::send(action, builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| PacketBackendError::Decode {
                action: action.to_owned(),
                message: err.to_string(),
            })
    }

    async fn fetch_organizations(&self) -> Result<Vec<Organization>, PacketBackendError> {
        let mut organizations = Vec::new();
        let mut page: u32 = 1;
        loop {
            let builder = self
                .request(Method::GET, "organizations")
                .query(&[("page", page), ("per_page", ORGANIZATIONS_PER_PAGE)]);
            let listing: OrganizationList = Self::send_json("list organizations", builder).await?;
            let more = listing.has_next_page() && !listing.organizations.is_empty();
            organizations.extend(listing.organizations.into_iter().map(Organization::from));
            if !more {
                return Ok(organizations);
            }
            if page >= MAX_ORGANIZATION_PAGES {
                warn!(pages = page, "organization listing truncated");
                return Ok(organizations);
            }
            page = page.saturating_add(1);
        }
    }
}

impl Backend for PacketBackend {
    type Error = PacketBackendError;

    fn list_organizations(&self) -> BackendFuture<'_, Vec<Organization>, Self::Error> {
        Box::pin(async move { self.fetch_organizations().await })
    }

    fn create_project<'a>(
        &'a self,
        request: &'a ProjectRequest,
    ) -> BackendFuture<'a, Project, Self::Error> {
        Box::pin(async move {
            let path = format!("organizations/{}/projects", request.organization_id);
            let builder = self
                .request(Method::POST, &path)
                .json(&CreateProjectBody::from(request));
            let body: ProjectBody = Self::send_json("create project", builder).await?;
            Ok(body.into_project(&request.organization_id))
        })
    }

    fn delete_project<'a>(&'a self, project_id: &'a str) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let path = format!("projects/{project_id}");
            Self::send("delete project", self.request(Method::DELETE, &path)).await?;
            Ok(())
        })
    }

    fn create_device<'a>(
        &'a self,
        request: &'a DeviceRequest,
    ) -> BackendFuture<'a, Device, Self::Error> {
        Box::pin(async move {
            request.validate()?;
            let path = format!("projects/{}/devices", request.project_id);
            let builder = self
                .request(Method::POST, &path)
                .json(&CreateDeviceBody::from(request));
            let body: DeviceBody = Self::send_json("create device", builder).await?;
            Ok(Device::from(body))
        })
    }

    fn get_device<'a>(&'a self, device_id: &'a str) -> BackendFuture<'a, Device, Self::Error> {
        Box::pin(async move {
            let path = format!("devices/{device_id}");
            let body: DeviceBody =
                Self::send_json("get device", self.request(Method::GET, &path)).await?;
            Ok(Device::from(body))
        })
    }

    fn delete_device<'a>(&'a self, device_id: &'a str) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let path = format!("devices/{device_id}");
            Self::send("delete device", self.request(Method::DELETE, &path)).await?;
            Ok(())
        })
    }
}
