// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Item link resolution for QR codes.
//
// A printed label is scanned long after the request that printed it, from a
// device that may sit outside the proxy. The link must therefore be absolute,
// must carry the ingress prefix when there is one, and must never carry a
// query string (ingress session tokens expire).
//
// Precedence is a table of rules rather than nested branches so each step can
// be asserted on its own:
//
//   scheme: X-Forwarded-Proto → request scheme → "http"
//   host:   X-Forwarded-Host  → Host header    → request authority
//   prefix: X-Ingress-Path    → X-Forwarded-Prefix → server root path

use std::fmt;

use tracing::{debug, warn};

use stocktag_core::error::{Result, StocktagError};

/// Which part of the URL a rule supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlPart {
    Scheme,
    Host,
    Prefix,
}

/// Where a rule reads its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// A request header (lowercase name).
    Header(&'static str),
    /// The scheme the server saw.
    RequestScheme,
    /// The authority the server saw (`host[:port]`).
    RequestAuthority,
    /// The ASGI-style root path the app is mounted under.
    RootPath,
    /// Fixed fallback value.
    Fallback(&'static str),
}

/// One row of the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub part: UrlPart,
    pub source: Source,
}

const fn rule(part: UrlPart, source: Source) -> Rule {
    Rule { part, source }
}

/// Rules in precedence order. Within a part, the first rule that yields a
/// usable value wins.
pub const RULES: &[Rule] = &[
    rule(UrlPart::Scheme, Source::Header("x-forwarded-proto")),
    rule(UrlPart::Scheme, Source::RequestScheme),
    rule(UrlPart::Scheme, Source::Fallback("http")),
    rule(UrlPart::Host, Source::Header("x-forwarded-host")),
    rule(UrlPart::Host, Source::Header("host")),
    rule(UrlPart::Host, Source::RequestAuthority),
    rule(UrlPart::Prefix, Source::Header("x-ingress-path")),
    rule(UrlPart::Prefix, Source::Header("x-forwarded-prefix")),
    rule(UrlPart::Prefix, Source::RootPath),
];

/// The parts of an incoming request that matter for link building.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    scheme: Option<String>,
    authority: Option<String>,
    root_path: Option<String>,
    /// Lowercase header names with raw values.
    headers: Vec<(String, String)>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    pub fn with_root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = Some(root_path.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Case-insensitive header lookup; blank values count as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn read(&self, source: Source) -> Option<&str> {
        let raw = match source {
            Source::Header(name) => self.header(name),
            Source::RequestScheme => self.scheme.as_deref(),
            Source::RequestAuthority => self.authority.as_deref(),
            Source::RootPath => self.root_path.as_deref(),
            Source::Fallback(value) => Some(value),
        }?;
        // Proxies append to forwarded headers: "https, http".
        raw.split(',').next().map(str::trim).filter(|v| !v.is_empty())
    }
}

/// How a link was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The configured base URL was used, with a scheme added when it had none.
    Configured,
    /// Built from the request: the winning source for each part.
    Derived {
        scheme: Source,
        host: Source,
        prefix: Option<Source>,
    },
}

/// Absolute item URL ready for QR encoding. Built fresh per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    url: String,
    resolution: Resolution,
}

impl ResolvedUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn into_string(self) -> String {
        self.url
    }
}

impl fmt::Display for ResolvedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Resolve the public link for `item_id`.
///
/// Only fails when neither the configuration nor the request yields a host;
/// every other oddity produces a best-effort URL, since the worst outcome of
/// a slightly wrong link is a QR code that does not scan.
pub fn resolve(
    item_id: i64,
    ctx: &RequestContext,
    configured_base_url: Option<&str>,
) -> Result<ResolvedUrl> {
    let item_path = format!("/item/{item_id}");

    if let Some(base) = configured_base_url
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .and_then(|b| absolute_base(ctx, strip_query(b)))
    {
        let url = join_absolute(&base, &item_path);
        debug!(%url, "item link from configured base URL");
        return Ok(ResolvedUrl {
            url,
            resolution: Resolution::Configured,
        });
    }

    let (scheme_source, scheme) = first_match(ctx, UrlPart::Scheme, valid_scheme)
        .unwrap_or((Source::Fallback("http"), "http".to_string()));

    let Some((host_source, host)) = first_match(ctx, UrlPart::Host, valid_host) else {
        warn!(item_id, "no usable host in request; cannot build item link");
        return Err(StocktagError::Configuration(
            "no base URL configured and no host in request".into(),
        ));
    };

    let prefix = first_match(ctx, UrlPart::Prefix, |v| {
        let normalised = normalise_prefix(v);
        (!normalised.is_empty()).then_some(normalised)
    });

    let (prefix_source, prefix) = match prefix {
        Some((source, value)) => (Some(source), value),
        None => (None, String::new()),
    };

    let url = join_absolute(&format!("{scheme}://{host}{prefix}"), &item_path);
    debug!(%url, ?scheme_source, ?host_source, ?prefix_source, "item link from request");

    Ok(ResolvedUrl {
        url,
        resolution: Resolution::Derived {
            scheme: scheme_source,
            host: host_source,
            prefix: prefix_source,
        },
    })
}

/// Make a configured base absolute. A bare `host[:port]` borrows the
/// request's scheme; a base with no usable host is ignored.
fn absolute_base(ctx: &RequestContext, base: &str) -> Option<String> {
    let base = match base.split_once("://") {
        Some(_) => base.to_string(),
        None => {
            let (_, scheme) = first_match(ctx, UrlPart::Scheme, valid_scheme)
                .unwrap_or((Source::Fallback("http"), "http".to_string()));
            format!("{scheme}://{}", base.trim_start_matches('/'))
        }
    };

    let host = base
        .split_once("://")
        .map(|(_, rest)| rest.split('/').next().unwrap_or(rest))
        .unwrap_or_default();
    if host.is_empty() || valid_host(host).is_none() {
        warn!(base = %base, "configured base URL has no usable host; deriving from request");
        return None;
    }
    Some(base)
}

/// Walk the table for `part`, returning the first value `accept` keeps.
fn first_match<F>(ctx: &RequestContext, part: UrlPart, accept: F) -> Option<(Source, String)>
where
    F: Fn(&str) -> Option<String>,
{
    RULES
        .iter()
        .filter(|r| r.part == part)
        .find_map(|r| ctx.read(r.source).and_then(&accept).map(|v| (r.source, v)))
}

fn valid_scheme(value: &str) -> Option<String> {
    let ok = value
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    ok.then(|| value.to_ascii_lowercase())
}

fn valid_host(value: &str) -> Option<String> {
    let ok = !value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'));
    ok.then(|| value.to_string())
}

/// `api//hassio_ingress/abc/` → `/api/hassio_ingress/abc`; `/` → empty.
fn normalise_prefix(raw: &str) -> String {
    let segments: Vec<&str> = strip_query(raw)
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        String::new()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn strip_query(raw: &str) -> &str {
    raw.split(['?', '#']).next().unwrap_or(raw)
}

/// Append `path` to `base`, collapsing repeated separators after the scheme.
fn join_absolute(base: &str, path: &str) -> String {
    let (scheme, rest) = match base.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, base),
    };

    let mut tail = String::with_capacity(rest.len() + path.len());
    for c in rest.trim_end_matches('/').chars().chain(path.chars()) {
        if c == '/' && tail.ends_with('/') {
            continue;
        }
        tail.push(c);
    }

    match scheme {
        Some(scheme) => format!("{scheme}://{tail}"),
        None => tail,
    }
}
