// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! XML-RPC codec for `pingback.ping`.
//!
//! Decodes inbound method calls into a [`PingbackRequest`] and renders
//! [`PingbackResponse`] values as XML-RPC method responses. Documents with
//! a DTD are refused by the underlying parser, which rules out entity
//! expansion attacks.

use crate::error::{PingbackError, Result};
use crate::models::{PingbackRequest, PingbackResponse};
use roxmltree::{Document, Node};
use tracing::debug;
use url::Url;

/// The only method this endpoint serves.
pub const PINGBACK_METHOD: &str = "pingback.ping";

/// Parser for inbound pingback calls.
#[derive(Debug, Clone)]
pub struct RequestParser {
    accepted_content_types: Vec<String>,
}

impl RequestParser {
    /// Create a parser accepting the given content types.
    pub fn new(accepted_content_types: Vec<String>) -> Self {
        Self {
            accepted_content_types: accepted_content_types
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }

    /// Check the Content-Type header, ignoring parameters such as charset.
    pub fn check_content_type(&self, content_type: Option<&str>) -> Result<()> {
        let ct = content_type.map(|s| s.split(';').next().unwrap_or(s).trim().to_lowercase());

        match &ct {
            Some(actual) if self.accepted_content_types.contains(actual) => Ok(()),
            _ => {
                debug!(content_type = ?ct, expected = ?self.accepted_content_types, "Content-Type invalid");
                Err(PingbackError::MalformedRequest(format!(
                    "unsupported content type {:?}",
                    ct.as_deref().unwrap_or_default()
                )))
            }
        }
    }

    /// Decode a request body. When `content_type` is given it is checked first.
    pub fn parse_ping_request(&self, body: &str, content_type: Option<&str>) -> Result<PingbackRequest> {
        if content_type.is_some() {
            self.check_content_type(content_type)?;
        }
        parse_method_call(body)
    }
}

/// Decode a `pingback.ping` XML-RPC method call.
pub fn parse_method_call(body: &str) -> Result<PingbackRequest> {
    let doc = Document::parse(body)
        .map_err(|e| PingbackError::MalformedRequest(format!("invalid XML: {e}")))?;

    let root = doc.root_element();
    if root.tag_name().name() != "methodCall" {
        return Err(PingbackError::MalformedRequest(format!(
            "expected methodCall, found {}",
            root.tag_name().name()
        )));
    }

    let method = child(root, "methodName")
        .and_then(|n| n.text())
        .map(str::trim)
        .ok_or_else(|| PingbackError::MalformedRequest("missing methodName".to_string()))?;

    if method != PINGBACK_METHOD {
        return Err(PingbackError::UnknownMethod(method.to_string()));
    }

    let params: Vec<String> = match child(root, "params") {
        Some(params) => params
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "param")
            .map(param_string)
            .collect::<Result<_>>()?,
        None => Vec::new(),
    };

    let [source, target] = params.as_slice() else {
        return Err(PingbackError::MalformedRequest(format!(
            "expected 2 parameters, got {}",
            params.len()
        )));
    };

    Ok(PingbackRequest {
        source: parse_uri("source", source)?,
        target: parse_uri("target", target)?,
    })
}

/// Parse an absolute http(s) URI with a host.
pub fn parse_uri(param: &'static str, raw: &str) -> Result<Url> {
    let invalid = || PingbackError::InvalidUri {
        param,
        uri: raw.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        debug!(param, uri = %raw, "Invalid URI (bad scheme or no host)");
        return Err(invalid());
    }
    Ok(url)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// Extract a string from `<param><value>..</value></param>`.
///
/// Accepts `<string>` and untyped values.
fn param_string(param: Node<'_, '_>) -> Result<String> {
    let value = child(param, "value")
        .ok_or_else(|| PingbackError::MalformedRequest("param without value".to_string()))?;

    let text = match value.children().find(|n| n.is_element()) {
        Some(typed) if typed.tag_name().name() == "string" => typed.text().unwrap_or_default(),
        Some(typed) => {
            return Err(PingbackError::MalformedRequest(format!(
                "expected string parameter, found {}",
                typed.tag_name().name()
            )))
        }
        None => value.text().unwrap_or_default(),
    };

    Ok(text.trim().to_string())
}

impl PingbackResponse {
    /// Render as an XML-RPC `methodResponse`.
    pub fn to_xml(&self) -> String {
        if self.success {
            format!(
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                    "<methodResponse><params><param><value><string>{}</string></value></param></params></methodResponse>"
                ),
                escape(&self.message)
            )
        } else {
            format!(
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                    "<methodResponse><fault><value><struct>",
                    "<member><name>faultCode</name><value><int>{}</int></value></member>",
                    "<member><name>faultString</name><value><string>{}</string></value></member>",
                    "</struct></value></fault></methodResponse>"
                ),
                self.fault_code.code(),
                escape(&self.message)
            )
        }
    }
}

/// Encode a `pingback.ping` call, as a pingback client would send it.
pub fn encode_ping_call(source: &str, target: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "<methodCall><methodName>{}</methodName><params>",
            "<param><value><string>{}</string></value></param>",
            "<param><value><string>{}</string></value></param>",
            "</params></methodCall>"
        ),
        PINGBACK_METHOD,
        escape(source),
        escape(target)
    )
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
