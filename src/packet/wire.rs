//! Request and response bodies exchanged with the Packet API.

use serde::{Deserialize, Serialize};

use crate::backend::{Device, DeviceRequest, DeviceState, Organization, Project, ProjectRequest};

#[derive(Debug, Deserialize)]
pub(super) struct OrganizationList {
    #[serde(default)]
    pub(super) organizations: Vec<OrganizationBody>,
    #[serde(default)]
    pub(super) meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PageMeta {
    #[serde(default)]
    pub(super) next: Option<Href>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Href {
    #[serde(default)]
    pub(super) href: Option<String>,
}

impl OrganizationList {
    pub(super) fn has_next_page(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|meta| meta.next.as_ref())
            .and_then(|next| next.href.as_deref())
            .is_some_and(|href| !href.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct OrganizationBody {
    id: String,
    #[serde(default)]
    name: String,
}

impl From<OrganizationBody> for Organization {
    fn from(value: OrganizationBody) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CreateProjectBody<'a> {
    organization_id: &'a str,
    name: &'a str,
}

impl<'a> From<&'a ProjectRequest> for CreateProjectBody<'a> {
    fn from(value: &'a ProjectRequest) -> Self {
        Self {
            organization_id: &value.organization_id,
            name: &value.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ProjectBody {
    id: String,
    #[serde(default)]
    name: String,
}

impl ProjectBody {
    pub(super) fn into_project(self, organization_id: &str) -> Project {
        Project {
            id: self.id,
            name: self.name,
            organization_id: organization_id.to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CreateDeviceBody<'a> {
    hostname: &'a str,
    plan: &'a str,
    facility: &'a str,
    operating_system: &'a str,
}

impl<'a> From<&'a DeviceRequest> for CreateDeviceBody<'a> {
    fn from(value: &'a DeviceRequest) -> Self {
        Self {
            hostname: &value.hostname,
            plan: &value.plan,
            facility: &value.facility,
            operating_system: &value.operating_system,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct CodeRef {
    #[serde(default)]
    code: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct SlugRef {
    #[serde(default)]
    slug: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct DeviceBody {
    id: String,
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
    #[serde(default)]
    facility: CodeRef,
    #[serde(default)]
    plan: SlugRef,
    #[serde(default)]
    operating_system: SlugRef,
}

impl From<DeviceBody> for Device {
    fn from(value: DeviceBody) -> Self {
        Self {
            id: value.id,
            hostname: value.hostname,
            facility: value.facility.code,
            plan: value.plan.slug,
            operating_system: value.operating_system.slug,
            state: DeviceState::from_provider(&value.state),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
