// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("cannot reach {url} -- check that the dbgear server is running ({source})")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server error ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("{message} (status {status})")]
    Application { status: String, message: String },

    #[error("decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("invalid server url {0:?} -- set server.base_url to an http(s) address")]
    InvalidUrl(String),
}

impl ClientError {
    /// Whether the failure should reach the user as a notice.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}
