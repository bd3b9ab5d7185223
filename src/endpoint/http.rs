use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use std::error::Error as _;
use url::Url;

use super::{ ChatEndpoint, EndpointReply };
use crate::error::ChatError;
use crate::models::payload::ChatRequest;

#[derive(Debug, Clone)]
pub struct HttpChatEndpoint {
    http: HttpClient,
    url: Url,
}

impl HttpChatEndpoint {
    pub fn new(url: Url) -> Self {
        Self {
            http: HttpClient::new(),
            url,
        }
    }

    pub fn with_client(http: HttpClient, url: Url) -> Self {
        Self { http, url }
    }
}

/// Transport failures (refused, reset, closed mid-exchange) all read as an
/// unreachable server. Only builder, redirect and decode failures keep their message.
fn classify(err: reqwest::Error) -> ChatError {
    if err.is_timeout() {
        ChatError::Timeout
    } else if err.is_connect() || err.is_request() || err.is_body() || caused_by_io(&err) {
        ChatError::NetworkUnreachable
    } else {
        ChatError::client(err.to_string())
    }
}

fn caused_by_io(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if cause.is::<std::io::Error>() {
            return true;
        }
        source = cause.source();
    }
    false
}

#[async_trait]
impl ChatEndpoint for HttpChatEndpoint {
    async fn post(&self, request: &ChatRequest) -> Result<EndpointReply, ChatError> {
        let resp = self.http.post(self.url.clone()).json(request).send().await.map_err(classify)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(classify)?;
        debug!("Chat endpoint answered {} with {} bytes", status, body.len());
        Ok(EndpointReply { status, body })
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
