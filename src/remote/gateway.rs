//! Typed access to the REST resources.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use super::error::RemoteError;
use super::transport::Transport;
use super::wire::{FamilyMemberDto, ImageRef, MealDto, RecordEatenRequest};
use crate::models::{MealId, MemberId};

const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct RemoteGateway {
    transport: Arc<dyn Transport>,
}

impl RemoteGateway {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Sends a request and decodes the JSON response.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, RemoteError> {
        let bytes = self.transport.send(method, endpoint, body).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(endpoint, error = %e, "Failed to decode response");
            RemoteError::Decode(e.to_string())
        })
    }

    /// Sends a request whose response body is ignored.
    pub async fn execute_no_content(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), RemoteError> {
        self.transport.send(method, endpoint, body).await?;
        Ok(())
    }

    pub async fn is_reachable(&self) -> bool {
        self.transport.probe().await
    }

    // ========== Images ==========

    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<ImageRef, RemoteError> {
        let body = self
            .transport
            .upload("images/upload", UPLOAD_FIELD, file_name, bytes)
            .await?;
        serde_json::from_slice(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    pub async fn delete_image(&self, key: &str) -> Result<(), RemoteError> {
        self.execute_no_content(Method::DELETE, &format!("images/{}", key), None)
            .await
    }

    // ========== Meals ==========

    pub async fn list_meals(&self) -> Result<Vec<MealDto>, RemoteError> {
        self.execute(Method::GET, "meals", None).await
    }

    pub async fn get_meal(&self, id: MealId) -> Result<MealDto, RemoteError> {
        self.execute(Method::GET, &format!("meals/{}", id), None).await
    }

    pub async fn create_meal(&self, meal: &MealDto) -> Result<MealDto, RemoteError> {
        self.execute(Method::POST, "meals", Some(to_body(meal)?)).await
    }

    pub async fn update_meal(&self, meal: &MealDto) -> Result<MealDto, RemoteError> {
        self.execute(Method::PUT, &format!("meals/{}", meal.id), Some(to_body(meal)?))
            .await
    }

    pub async fn delete_meal(&self, id: MealId) -> Result<(), RemoteError> {
        self.execute_no_content(Method::DELETE, &format!("meals/{}", id), None)
            .await
    }

    pub async fn record_eaten(
        &self,
        id: MealId,
        members: &[MemberId],
    ) -> Result<MealDto, RemoteError> {
        let body = RecordEatenRequest {
            family_member_ids: members.iter().map(MemberId::as_uuid).collect(),
        };
        self.execute(
            Method::POST,
            &format!("meals/{}/eaten", id),
            Some(to_body(&body)?),
        )
        .await
    }

    // ========== Family members ==========

    pub async fn list_members(&self) -> Result<Vec<FamilyMemberDto>, RemoteError> {
        self.execute(Method::GET, "family-members", None).await
    }

    pub async fn get_member(&self, id: MemberId) -> Result<FamilyMemberDto, RemoteError> {
        self.execute(Method::GET, &format!("family-members/{}", id), None)
            .await
    }

    pub async fn create_member(
        &self,
        member: &FamilyMemberDto,
    ) -> Result<FamilyMemberDto, RemoteError> {
        self.execute(Method::POST, "family-members", Some(to_body(member)?))
            .await
    }

    pub async fn update_member(
        &self,
        member: &FamilyMemberDto,
    ) -> Result<FamilyMemberDto, RemoteError> {
        self.execute(
            Method::PUT,
            &format!("family-members/{}", member.id),
            Some(to_body(member)?),
        )
        .await
    }

    pub async fn delete_member(&self, id: MemberId) -> Result<(), RemoteError> {
        self.execute_no_content(Method::DELETE, &format!("family-members/{}", id), None)
            .await
    }

    pub async fn add_favorite(&self, member: MemberId, meal: MealId) -> Result<(), RemoteError> {
        self.execute_no_content(
            Method::POST,
            &format!("family-members/{}/favorites/{}", member, meal),
            None,
        )
        .await
    }

    pub async fn remove_favorite(&self, member: MemberId, meal: MealId) -> Result<(), RemoteError> {
        self.execute_no_content(
            Method::DELETE,
            &format!("family-members/{}/favorites/{}", member, meal),
            None,
        )
        .await
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<serde_json::Value, RemoteError> {
    serde_json::to_value(value).map_err(|e| RemoteError::Decode(e.to_string()))
}
