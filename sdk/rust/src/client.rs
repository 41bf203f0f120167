use reqwest::{Client, Method, Response};
use serde::Serialize;

/// Status and body of an admin call. Mutations answer with a plain result
/// string (`success`, `not found`, `store write failed`, `compile failed: <id>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminReply {
    pub status: u16,
    pub body: String,
}

impl AdminReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON (for list/get/status).
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

pub struct AdminClient {
    client: Client,
    admin_url: String,
    api_key: String,
}

impl AdminClient {
    pub fn new(admin_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            admin_url: admin_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn status(&self) -> Result<AdminReply, reqwest::Error> {
        self.call(Method::GET, "/admin/status", None::<&()>).await
    }

    pub async fn list_routes(&self) -> Result<AdminReply, reqwest::Error> {
        self.call(Method::GET, "/admin/routes", None::<&()>).await
    }

    pub async fn get_route(&self, id: &str) -> Result<AdminReply, reqwest::Error> {
        self.call(Method::GET, &format!("/admin/route/{}", id), None::<&()>).await
    }

    pub async fn add_route<T: Serialize>(&self, route: &T) -> Result<AdminReply, reqwest::Error> {
        self.call(Method::POST, "/admin/route", Some(route)).await
    }

    pub async fn update_route<T: Serialize>(&self, route: &T) -> Result<AdminReply, reqwest::Error> {
        self.call(Method::PUT, "/admin/route", Some(route)).await
    }

    pub async fn delete_route(&self, id: &str) -> Result<AdminReply, reqwest::Error> {
        self.call(Method::DELETE, &format!("/admin/route/{}", id), None::<&()>).await
    }

    pub async fn replace_routes<T: Serialize>(&self, routes: &[T]) -> Result<AdminReply, reqwest::Error> {
        self.call(Method::PUT, "/admin/routes", Some(&routes)).await
    }

    pub async fn refresh(&self) -> Result<AdminReply, reqwest::Error> {
        self.call(Method::POST, "/admin/refresh", None::<&()>).await
    }

    async fn call<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&T>,
    ) -> Result<AdminReply, reqwest::Error> {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.admin_url, path))
            .bearer_auth(&self.api_key);
        if let Some(body) = body {
            req = req.json(body);
        }
        into_reply(req.send().await?).await
    }
}

async fn into_reply(resp: Response) -> Result<AdminReply, reqwest::Error> {
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    Ok(AdminReply { status, body })
}
