// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for flood and abuse simulation.

use pingback_receiver::xmlrpc::encode_ping_call;
use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of IP addresses for testing.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Generate a pool of source URLs for testing.
pub fn generate_sources(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("https://source-{}.example.com/post/{}", i / 10, i % 10))
        .collect()
}

/// `pingback.ping` bodies for each source against one target.
pub fn generate_ping_bodies(sources: &[String], target: &str) -> Vec<String> {
    sources
        .iter()
        .map(|source| encode_ping_call(source, target))
        .collect()
}

/// Content-Type values paired with whether the parser should accept them.
pub fn generate_content_types() -> Vec<(Option<&'static str>, bool)> {
    vec![
        (Some("text/xml"), true),
        (Some("text/xml; charset=utf-8"), true),
        (Some("application/xml"), true),
        (Some("TEXT/XML"), true),
        (None, true),
        (Some("application/json"), false),
        (Some("text/plain"), false),
        (Some("application/x-www-form-urlencoded"), false),
        (Some(""), false),
    ]
}

/// Bodies that must be rejected as malformed without touching the network.
pub fn generate_malformed_bodies() -> Vec<&'static str> {
    vec![
        "",
        "not xml at all",
        "<methodCall>",
        "<methodCall><methodName>pingback.ping</methodName></methodCall>",
        concat!(
            "<methodCall><methodName>pingback.ping</methodName><params>",
            "<param><value><string>https://a.example/p</string></value></param>",
            "</params></methodCall>"
        ),
        concat!(
            "<methodCall><methodName>pingback.ping</methodName><params>",
            "<param><value><string>https://a.example/p</string></value></param>",
            "<param><value><string>https://blog.example/posts/hello-world</string></value></param>",
            "<param><value><string>extra</string></value></param>",
            "</params></methodCall>"
        ),
        concat!(
            "<methodCall><methodName>pingback.ping</methodName><params>",
            "<param><value><int>1</int></value></param>",
            "<param><value><string>https://blog.example/posts/hello-world</string></value></param>",
            "</params></methodCall>"
        ),
    ]
}

/// Source URIs that are not fetchable web pages.
pub fn generate_invalid_sources() -> Vec<&'static str> {
    vec![
        "not-a-url",
        "ftp://files.example/post",
        "javascript:alert(1)",
        "file:///etc/passwd",
        "data:text/html,hi",
        "",
    ]
}

/// An XXE attempt referencing a local file through an external entity.
pub fn xxe_body() -> String {
    concat!(
        r#"<?xml version="1.0"?>"#,
        r#"<!DOCTYPE methodCall [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>"#,
        "<methodCall><methodName>pingback.ping</methodName><params>",
        "<param><value><string>&xxe;</string></value></param>",
        "<param><value><string>https://blog.example/posts/hello-world</string></value></param>",
        "</params></methodCall>"
    )
    .to_string()
}

/// Entity expansion bomb.
pub fn billion_laughs_body() -> String {
    concat!(
        r#"<?xml version="1.0"?>"#,
        r#"<!DOCTYPE lolz [<!ENTITY lol "lol"><!ENTITY lol2 "&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;">]>"#,
        "<methodCall><methodName>&lol2;</methodName></methodCall>"
    )
    .to_string()
}
