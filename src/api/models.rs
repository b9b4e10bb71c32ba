use serde::{Deserialize, Serialize};

use crate::data_models::{SearchResponse, SearchResult};
use crate::error::ErrorKind;
use crate::pipeline::BackendStatus;

/// Form body posted by a widget.
#[derive(Debug, Deserialize)]
pub struct AjaxRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub instance_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    pub data: EnvelopeData,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeData {
    Results {
        results: Vec<SearchResult>,
        count: u64,
        html: String,
    },
    Failure {
        message: String,
        kind: ErrorKind,
        html: String,
    },
}

impl Envelope {
    pub fn success(response: SearchResponse, html: String) -> Envelope {
        Envelope {
            success: true,
            data: EnvelopeData::Results {
                results: response.results,
                count: response.count,
                html,
            },
        }
    }

    pub fn failure(message: String, kind: ErrorKind, html: String) -> Envelope {
        Envelope {
            success: false,
            data: EnvelopeData::Failure {
                message,
                kind,
                html,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WidgetParams {
    pub placeholder: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusReport {
    pub base_url: String,
    pub status: BackendStatus,
}
