//! In-memory stand-in for the REST service, used by unit tests.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::error::RemoteError;
use super::transport::Transport;
use super::wire::{FamilyMemberDto, ImageRef, MealDto, RecordEatenRequest};

#[derive(Default)]
struct State {
    offline: bool,
    meals: BTreeMap<Uuid, MealDto>,
    members: BTreeMap<Uuid, FamilyMemberDto>,
    images: BTreeMap<String, usize>,
    failures: Vec<(Method, String, RemoteError)>,
    requests: Vec<String>,
}

#[derive(Default)]
pub struct FakeServer {
    state: Mutex<State>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Makes every `method endpoint` request fail with `error` until cleared.
    pub fn fail(&self, method: Method, endpoint: impl Into<String>, error: RemoteError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((method, endpoint.into(), error));
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn insert_meal(&self, meal: MealDto) {
        self.state.lock().unwrap().meals.insert(meal.id, meal);
    }

    pub fn insert_member(&self, member: FamilyMemberDto) {
        self.state.lock().unwrap().members.insert(member.id, member);
    }

    pub fn meals(&self) -> Vec<MealDto> {
        self.state.lock().unwrap().meals.values().cloned().collect()
    }

    pub fn members(&self) -> Vec<FamilyMemberDto> {
        self.state.lock().unwrap().members.values().cloned().collect()
    }

    pub fn image_count(&self) -> usize {
        self.state.lock().unwrap().images.len()
    }

    /// Requests seen so far, formatted as `METHOD endpoint`.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    fn admit(&self, method: &Method, endpoint: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(format!("{} {}", method, endpoint));

        if state.offline {
            return Err(RemoteError::Unreachable("connection refused".to_string()));
        }
        if let Some((_, _, error)) = state
            .failures
            .iter()
            .find(|(m, e, _)| m == method && e == endpoint)
        {
            return Err(error.clone());
        }
        Ok(())
    }

    fn route(
        &self,
        method: &Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Vec<u8>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        let segments: Vec<&str> = endpoint.split('/').collect();

        match (method.as_str(), segments.as_slice()) {
            ("GET", ["meals"]) => json(&state.meals.values().collect::<Vec<_>>()),
            ("GET", ["meals", id]) => json(state.meals.get(&parse(id)?).ok_or(RemoteError::NotFound)?),
            ("POST", ["meals"]) => {
                let mut meal: MealDto = decode(body)?;
                meal.updated_at = Some(Utc::now());
                state.meals.insert(meal.id, meal.clone());
                json(&meal)
            }
            ("PUT", ["meals", id]) => {
                let id = parse(id)?;
                if !state.meals.contains_key(&id) {
                    return Err(RemoteError::NotFound);
                }
                let mut meal: MealDto = decode(body)?;
                meal.updated_at = Some(Utc::now());
                state.meals.insert(id, meal.clone());
                json(&meal)
            }
            ("DELETE", ["meals", id]) => {
                state.meals.remove(&parse(id)?).ok_or(RemoteError::NotFound)?;
                Ok(Vec::new())
            }
            ("POST", ["meals", id, "eaten"]) => {
                let request: RecordEatenRequest = decode(body)?;
                let meal = state
                    .meals
                    .get_mut(&parse(id)?)
                    .ok_or(RemoteError::NotFound)?;
                meal.eaten_count += 1;
                meal.last_eaten = Some(Utc::now());
                for member in request.family_member_ids {
                    if !meal.eaten_by.contains(&member) {
                        meal.eaten_by.push(member);
                    }
                }
                meal.updated_at = Some(Utc::now());
                json(&meal.clone())
            }
            ("GET", ["family-members"]) => json(&state.members.values().collect::<Vec<_>>()),
            ("GET", ["family-members", id]) => {
                json(state.members.get(&parse(id)?).ok_or(RemoteError::NotFound)?)
            }
            ("POST", ["family-members"]) => {
                let mut member: FamilyMemberDto = decode(body)?;
                member.updated_at = Some(Utc::now());
                state.members.insert(member.id, member.clone());
                json(&member)
            }
            ("PUT", ["family-members", id]) => {
                let id = parse(id)?;
                if !state.members.contains_key(&id) {
                    return Err(RemoteError::NotFound);
                }
                let mut member: FamilyMemberDto = decode(body)?;
                member.updated_at = Some(Utc::now());
                state.members.insert(id, member.clone());
                json(&member)
            }
            ("DELETE", ["family-members", id]) => {
                state
                    .members
                    .remove(&parse(id)?)
                    .ok_or(RemoteError::NotFound)?;
                Ok(Vec::new())
            }
            ("POST", ["family-members", id, "favorites", meal]) => {
                let meal = parse(meal)?;
                let member = state
                    .members
                    .get_mut(&parse(id)?)
                    .ok_or(RemoteError::NotFound)?;
                if !member.favorite_meal_ids.contains(&meal) {
                    member.favorite_meal_ids.push(meal);
                }
                Ok(Vec::new())
            }
            ("DELETE", ["family-members", id, "favorites", meal]) => {
                let meal = parse(meal)?;
                let member = state
                    .members
                    .get_mut(&parse(id)?)
                    .ok_or(RemoteError::NotFound)?;
                member.favorite_meal_ids.retain(|m| *m != meal);
                Ok(Vec::new())
            }
            ("DELETE", ["images", key]) => {
                state.images.remove(*key).ok_or(RemoteError::NotFound)?;
                Ok(Vec::new())
            }
            _ => Err(RemoteError::NotFound),
        }
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Vec<u8>, RemoteError> {
        self.admit(&method, endpoint)?;
        self.route(&method, endpoint, body)
    }

    async fn upload(
        &self,
        endpoint: &str,
        _field: &str,
        _file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<u8>, RemoteError> {
        self.admit(&Method::POST, endpoint)?;

        let key = Uuid::new_v4().to_string();
        let image = ImageRef {
            url: format!("https://cdn.test/images/{}.jpg", key),
            key: key.clone(),
        };
        self.state.lock().unwrap().images.insert(key, bytes.len());
        json(&image)
    }

    async fn probe(&self) -> bool {
        !self.state.lock().unwrap().offline
    }
}

fn parse(id: &str) -> Result<Uuid, RemoteError> {
    Uuid::parse_str(id).map_err(|_| RemoteError::NotFound)
}

fn decode<T: serde::de::DeserializeOwned>(
    body: Option<serde_json::Value>,
) -> Result<T, RemoteError> {
    let body = body.ok_or(RemoteError::Client {
        status: 400,
        message: Some("missing body".to_string()),
    })?;
    serde_json::from_value(body).map_err(|e| RemoteError::Client {
        status: 400,
        message: Some(e.to_string()),
    })
}

fn json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, RemoteError> {
    serde_json::to_vec(value).map_err(|e| RemoteError::Decode(e.to_string()))
}
